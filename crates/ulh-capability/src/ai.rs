//! BYOK LLM access (`ultralight.ai`, spec §4.7). Never throws: an absent or
//! unusable key surfaces as `AiResponse.error`, at zero cost, so a sandboxed
//! call never has to special-case a missing provider.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::CapabilityError;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AiRequest {
    pub messages: Vec<Value>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub max_tokens: Option<u64>,
    #[serde(default)]
    pub tools: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AiUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cost_cents: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AiResponse {
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub usage: Option<AiUsage>,
    #[serde(default)]
    pub error: Option<String>,
}

impl AiResponse {
    #[must_use]
    pub fn unconfigured() -> Self {
        Self {
            error: Some("BYOK not configured".into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn cost_cents(&self) -> i64 {
        self.usage.as_ref().map_or(0, |u| u.cost_cents)
    }
}

/// A caller's bring-your-own-key configuration, resolved by the Setup
/// Orchestrator (spec §4.6 step 4) before the surface is built.
#[derive(Debug, Clone)]
pub struct Byok {
    pub provider: String,
    pub decrypted_key: String,
}

/// Adapter to the actual LLM provider (OpenRouter is the canonical target;
/// legacy provider names route identically per spec §4.7).
#[async_trait]
pub trait AiProvider: Send + Sync {
    async fn call(&self, byok: &Byok, request: AiRequest) -> Result<AiResponse, CapabilityError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unconfigured_has_zero_cost() {
        let r = AiResponse::unconfigured();
        assert_eq!(r.cost_cents(), 0);
        assert_eq!(r.error.as_deref(), Some("BYOK not configured"));
    }

    #[test]
    fn cost_cents_reads_from_usage() {
        let r = AiResponse {
            content: Some("hi".into()),
            model: Some("gpt".into()),
            usage: Some(AiUsage { input_tokens: 10, output_tokens: 5, cost_cents: 3 }),
            error: None,
        };
        assert_eq!(r.cost_cents(), 3);
    }
}
