// SPDX-License-Identifier: MIT OR Apache-2.0
//! Inter-app invocation (spec §4.7 `ultralight.call`): dispatches a local
//! `tools/call` against another app, reusing the caller's bearer token so
//! the callee's own admission chain runs exactly as it would for a direct
//! client call.

use std::sync::Weak;

use async_trait::async_trait;
use serde_json::Value;
use ulh_capability::{CapabilityError, InterAppInvoker};
use ulh_protocol::CallToolParams;

use crate::state::AppState;

pub struct LocalInterAppInvoker {
    pub state: Weak<AppState>,
}

#[async_trait]
impl InterAppInvoker for LocalInterAppInvoker {
    async fn call(&self, bearer_token: &str, app_id: &str, function_name: &str, args: Value) -> Result<Value, CapabilityError> {
        let state = self
            .state
            .upgrade()
            .ok_or_else(|| CapabilityError::Unavailable("host is shutting down".to_string()))?;

        let params = CallToolParams { name: function_name.to_string(), arguments: args };
        let body = serde_json::json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "tools/call",
            "params": params,
        })
        .to_string();

        let auth_header = format!("Bearer {bearer_token}");
        let response =
            crate::dispatch::handle_request(&state, app_id, Some(&auth_header), None, body.as_bytes()).await;

        let (parts, body) = response.into_parts();
        let bytes = axum::body::to_bytes(body, usize::MAX)
            .await
            .map_err(|e| CapabilityError::Transport(e.to_string()))?;
        let value: Value =
            serde_json::from_slice(&bytes).map_err(|e| CapabilityError::Transport(e.to_string()))?;

        if !parts.status.is_success() {
            let message = value["error"]["message"].as_str().unwrap_or("inter-app call failed").to_string();
            return Err(CapabilityError::Transport(message));
        }
        if let Some(error) = value.get("error") {
            let message = error["message"].as_str().unwrap_or("inter-app call failed").to_string();
            return Err(CapabilityError::Transport(message));
        }

        Ok(value["result"].clone())
    }
}
