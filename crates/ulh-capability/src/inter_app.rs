//! Inter-app invocation (`ultralight.call`, spec §4.7). The adapter MUST
//! reuse the caller's bearer token so the target app sees the same user
//! identity as the original request.

use async_trait::async_trait;
use serde_json::Value;

use crate::CapabilityError;

#[async_trait]
pub trait InterAppInvoker: Send + Sync {
    /// Issue a local `tools/call` against `app_id` as the bearer identified
    /// by `bearer_token`, and unwrap the MCP content envelope down to its
    /// raw result value.
    async fn call(
        &self,
        bearer_token: &str,
        app_id: &str,
        function_name: &str,
        args: Value,
    ) -> Result<Value, CapabilityError>;
}
