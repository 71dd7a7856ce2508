// SPDX-License-Identifier: MIT OR Apache-2.0
//! `AppState`: every long-lived component the dispatcher threads through a
//! request, assembled once at startup.

use std::sync::{Arc, Weak};

use ulh_cache::{CodeCache, PermissionCache, SessionSequencer};
use ulh_capability::{AiProvider, InterAppInvoker, KvBackend, MemoryBackend};
use ulh_config::HostConfig;
use ulh_queue::WorkQueue;
use ulh_ratelimit::RateLimiter;
use ulh_repository::{
    ApiTokenRepository, AppRepository, BalanceLedger, ObjectStore, PermissionRepository, ProfileRepository,
    SecretStore, UserRepository,
};
use ulh_sandbox::SandboxGateway;

use crate::inter_app::LocalInterAppInvoker;

/// Everything the dispatch pipeline needs, shared across every request.
pub struct AppState {
    pub config: HostConfig,

    pub apps: Arc<dyn AppRepository>,
    pub users: Arc<dyn UserRepository>,
    pub tokens: Arc<dyn ApiTokenRepository>,
    pub permissions: Arc<dyn PermissionRepository>,
    pub ledger: Arc<dyn BalanceLedger>,
    pub object_store: Arc<dyn ObjectStore>,
    pub secrets: Arc<dyn SecretStore>,
    pub profiles: Arc<dyn ProfileRepository>,

    pub code_cache: CodeCache,
    pub permission_cache: PermissionCache,
    pub sequencer: SessionSequencer,
    pub rate_limiter: RateLimiter,
    pub sandbox: SandboxGateway,

    /// Bounded queue fronting call-log delivery; `try_enqueue` never blocks
    /// the response path (Design Notes §9 "best-effort writes").
    pub call_log_queue: WorkQueue<ulh_audit::CallLogRecord>,

    pub ai_provider: Arc<dyn AiProvider>,
    pub kv_backend: Arc<dyn KvBackend>,
    pub memory_backend: Arc<dyn MemoryBackend>,
    pub inter_app: Arc<dyn InterAppInvoker>,
}

/// Construction parameters for [`AppState::new`]; everything that isn't
/// self-referential (the inter-app invoker is built with
/// [`Arc::new_cyclic`] so it can recursively dispatch through `self`).
pub struct AppStateDeps {
    pub config: HostConfig,
    pub apps: Arc<dyn AppRepository>,
    pub users: Arc<dyn UserRepository>,
    pub tokens: Arc<dyn ApiTokenRepository>,
    pub permissions: Arc<dyn PermissionRepository>,
    pub ledger: Arc<dyn BalanceLedger>,
    pub object_store: Arc<dyn ObjectStore>,
    pub secrets: Arc<dyn SecretStore>,
    pub profiles: Arc<dyn ProfileRepository>,
    pub code_cache: CodeCache,
    pub permission_cache: PermissionCache,
    pub sequencer: SessionSequencer,
    pub rate_limiter: RateLimiter,
    pub sandbox: SandboxGateway,
    pub call_log_queue: WorkQueue<ulh_audit::CallLogRecord>,
    pub ai_provider: Arc<dyn AiProvider>,
    pub kv_backend: Arc<dyn KvBackend>,
    pub memory_backend: Arc<dyn MemoryBackend>,
}

impl AppState {
    /// Build the shared state, wiring `inter_app` to reuse the caller's
    /// bearer token for local `tools/call` re-dispatch (spec §4.7's
    /// `ultralight.call` capability) via a weak back-reference.
    #[must_use]
    pub fn new(deps: AppStateDeps) -> Arc<Self> {
        Arc::new_cyclic(|weak: &Weak<AppState>| AppState {
            config: deps.config,
            apps: deps.apps,
            users: deps.users,
            tokens: deps.tokens,
            permissions: deps.permissions,
            ledger: deps.ledger,
            object_store: deps.object_store,
            secrets: deps.secrets,
            profiles: deps.profiles,
            code_cache: deps.code_cache,
            permission_cache: deps.permission_cache,
            sequencer: deps.sequencer,
            rate_limiter: deps.rate_limiter,
            sandbox: deps.sandbox,
            call_log_queue: deps.call_log_queue,
            ai_provider: deps.ai_provider,
            kv_backend: deps.kv_backend,
            memory_backend: deps.memory_backend,
            inter_app: Arc::new(LocalInterAppInvoker { state: weak.clone() }),
        })
    }
}
