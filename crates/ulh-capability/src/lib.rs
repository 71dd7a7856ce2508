// SPDX-License-Identifier: MIT OR Apache-2.0
//! The sandbox capability surface (C8 support, spec §4.7): the `ultralight.*`
//! namespace a running app sees — per-user key-value storage, cross-app
//! memory, a BYOK AI call, inter-app invocation, and merged environment
//! variables. Each capability is a fixed, narrow trait (Design Notes §9
//! "a fixed interface per capability") so the sandbox engine's bridge code
//! has exactly one shape to wire per capability, never a generic RPC dispatch.
//!
//! This crate defines the adapters and the surface object the Sandbox
//! Gateway binds to a single user/app/call; it does not run untrusted code
//! itself.
#![warn(missing_docs)]

mod ai;
mod env;
mod inter_app;
mod kv;
mod memory;

pub use ai::{AiProvider, AiRequest, AiResponse, AiUsage, Byok};
pub use env::merge;
pub use inter_app::InterAppInvoker;
pub use kv::{InMemoryKv, KvBackend, QueryPage};
pub use memory::{default_scope, InMemoryMemory, MemoryBackend};

use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;

use serde_json::Value;

/// Error surfaced by a capability backend. The surface object is
/// responsible for translating these into the non-throwing contracts
/// individual capabilities promise (e.g. `ai()` never propagates this; it
/// folds failures into `AiResponse.error`).
#[derive(Debug, Error)]
pub enum CapabilityError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("capability not available: {0}")]
    Unavailable(String),
}

/// The capability surface bound to one user, one app, and the bearer token
/// of the current call. Handed to the sandbox engine alongside the code
/// text, function name, and argument list (spec §4.7).
pub struct CapabilitySurface {
    user_id: String,
    app_id: String,
    bearer_token: String,
    kv: Arc<dyn KvBackend>,
    memory: Arc<dyn MemoryBackend>,
    ai_provider: Arc<dyn AiProvider>,
    inter_app: Arc<dyn InterAppInvoker>,
    byok: Option<Byok>,
    env_vars: BTreeMap<String, String>,
}

impl CapabilitySurface {
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        user_id: impl Into<String>,
        app_id: impl Into<String>,
        bearer_token: impl Into<String>,
        kv: Arc<dyn KvBackend>,
        memory: Arc<dyn MemoryBackend>,
        ai_provider: Arc<dyn AiProvider>,
        inter_app: Arc<dyn InterAppInvoker>,
        byok: Option<Byok>,
        env_vars: BTreeMap<String, String>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            app_id: app_id.into(),
            bearer_token: bearer_token.into(),
            kv,
            memory,
            ai_provider,
            inter_app,
            byok,
            env_vars,
        }
    }

    pub async fn store(&self, key: &str, value: Value) -> Result<(), CapabilityError> {
        self.kv.store(&self.user_id, &self.app_id, key, value).await
    }

    pub async fn load(&self, key: &str) -> Result<Option<Value>, CapabilityError> {
        self.kv.load(&self.user_id, &self.app_id, key).await
    }

    pub async fn list(&self, prefix: Option<&str>) -> Result<Vec<String>, CapabilityError> {
        self.kv.list(&self.user_id, &self.app_id, prefix).await
    }

    pub async fn query(
        &self,
        prefix: &str,
        limit: Option<usize>,
        offset: Option<usize>,
    ) -> Result<QueryPage, CapabilityError> {
        self.kv.query(&self.user_id, &self.app_id, prefix, limit, offset).await
    }

    pub async fn remove(&self, key: &str) -> Result<(), CapabilityError> {
        self.kv.remove(&self.user_id, &self.app_id, key).await
    }

    pub async fn remember(
        &self,
        key: &str,
        value: Value,
        scope: Option<&str>,
    ) -> Result<(), CapabilityError> {
        let owned_scope;
        let scope = match scope {
            Some(s) => s,
            None => {
                owned_scope = default_scope(&self.app_id);
                &owned_scope
            }
        };
        self.memory.remember(&self.user_id, scope, key, value).await
    }

    pub async fn recall(&self, key: &str, scope: Option<&str>) -> Result<Option<Value>, CapabilityError> {
        let owned_scope;
        let scope = match scope {
            Some(s) => s,
            None => {
                owned_scope = default_scope(&self.app_id);
                &owned_scope
            }
        };
        self.memory.recall(&self.user_id, scope, key).await
    }

    /// BYOK LLM call. Never returns `Err`: an absent key or a provider
    /// failure both fold into `AiResponse.error` at zero cost (spec §4.7).
    pub async fn ai(&self, request: AiRequest) -> AiResponse {
        let Some(byok) = &self.byok else {
            return AiResponse::unconfigured();
        };
        match self.ai_provider.call(byok, request).await {
            Ok(response) => response,
            Err(e) => AiResponse {
                error: Some(e.to_string()),
                ..AiResponse::default()
            },
        }
    }

    /// Inter-app invocation, reusing the current call's bearer token.
    pub async fn call(
        &self,
        app_id: &str,
        function_name: &str,
        args: Value,
    ) -> Result<Value, CapabilityError> {
        self.inter_app
            .call(&self.bearer_token, app_id, function_name, args)
            .await
    }

    #[must_use]
    pub fn env(&self) -> &BTreeMap<String, String> {
        &self.env_vars
    }
}

/// Coarse permission strings the gateway attaches to every invocation
/// record, regardless of which capabilities the call actually exercises
/// (spec §4.7).
pub const COARSE_PERMISSIONS: &[&str] = &["memory:read", "memory:write", "ai:call", "net:fetch", "app:call"];

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct FailingAi;

    #[async_trait::async_trait]
    impl AiProvider for FailingAi {
        async fn call(&self, _byok: &Byok, _request: AiRequest) -> Result<AiResponse, CapabilityError> {
            Err(CapabilityError::Transport("provider down".into()))
        }
    }

    struct EchoInterApp;

    #[async_trait::async_trait]
    impl InterAppInvoker for EchoInterApp {
        async fn call(
            &self,
            bearer_token: &str,
            _app_id: &str,
            _function_name: &str,
            args: Value,
        ) -> Result<Value, CapabilityError> {
            Ok(json!({"bearer": bearer_token, "args": args}))
        }
    }

    fn surface(byok: Option<Byok>, ai_provider: Arc<dyn AiProvider>) -> CapabilitySurface {
        CapabilitySurface::new(
            "u1",
            "app1",
            "tok-abc",
            Arc::new(InMemoryKv::new()),
            Arc::new(InMemoryMemory::new()),
            ai_provider,
            Arc::new(EchoInterApp),
            byok,
            BTreeMap::from([("A".to_string(), "1".to_string())]),
        )
    }

    #[tokio::test]
    async fn kv_roundtrips_through_the_surface() {
        let s = surface(None, Arc::new(FailingAi));
        s.store("k", json!(42)).await.unwrap();
        assert_eq!(s.load("k").await.unwrap(), Some(json!(42)));
    }

    #[tokio::test]
    async fn remember_defaults_scope_to_current_app() {
        let s = surface(None, Arc::new(FailingAi));
        s.remember("k", json!(1), None).await.unwrap();
        assert_eq!(s.recall("k", Some("app:app1")).await.unwrap(), Some(json!(1)));
    }

    #[tokio::test]
    async fn ai_without_byok_returns_unconfigured_error() {
        let s = surface(None, Arc::new(FailingAi));
        let response = s.ai(AiRequest::default()).await;
        assert_eq!(response.error.as_deref(), Some("BYOK not configured"));
        assert_eq!(response.cost_cents(), 0);
    }

    #[tokio::test]
    async fn ai_provider_failure_folds_into_response_error() {
        let byok = Byok { provider: "openrouter".into(), decrypted_key: "k".into() };
        let s = surface(Some(byok), Arc::new(FailingAi));
        let response = s.ai(AiRequest::default()).await;
        assert!(response.error.is_some());
    }

    #[tokio::test]
    async fn inter_app_call_reuses_bearer_token() {
        let s = surface(None, Arc::new(FailingAi));
        let result = s.call("other-app", "fn", json!({"x": 1})).await.unwrap();
        assert_eq!(result["bearer"], json!("tok-abc"));
    }

    #[test]
    fn env_reflects_constructor_value() {
        let s = surface(None, Arc::new(FailingAi));
        assert_eq!(s.env().get("A"), Some(&"1".to_string()));
    }
}
