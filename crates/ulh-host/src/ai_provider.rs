// SPDX-License-Identifier: MIT OR Apache-2.0
//! BYOK-backed AI capability (spec §4.7 `ai()`): OpenRouter is the canonical
//! target; legacy provider names route to the same endpoint since
//! OpenRouter itself fans out to the underlying model.

use async_trait::async_trait;
use serde_json::json;
use ulh_capability::{AiProvider, AiRequest, AiResponse, AiUsage, Byok, CapabilityError};

const OPENROUTER_URL: &str = "https://openrouter.ai/api/v1/chat/completions";

/// Calls OpenRouter's chat-completions endpoint with the caller's BYOK key.
pub struct OpenRouterAiProvider {
    client: reqwest::Client,
}

impl OpenRouterAiProvider {
    #[must_use]
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl AiProvider for OpenRouterAiProvider {
    async fn call(&self, byok: &Byok, request: AiRequest) -> Result<AiResponse, CapabilityError> {
        let body = json!({
            "model": request.model.clone().unwrap_or_else(|| "openrouter/auto".to_string()),
            "messages": request.messages,
            "temperature": request.temperature,
            "max_tokens": request.max_tokens,
            "tools": request.tools,
        });

        let response = self
            .client
            .post(OPENROUTER_URL)
            .bearer_auth(&byok.decrypted_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| CapabilityError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(CapabilityError::Transport(format!("openrouter returned {status}: {text}")));
        }

        let parsed: serde_json::Value =
            response.json().await.map_err(|e| CapabilityError::Transport(e.to_string()))?;

        let content = parsed["choices"][0]["message"]["content"].as_str().map(str::to_string);
        let model = parsed["model"].as_str().map(str::to_string);
        let usage = parsed.get("usage").map(|u| AiUsage {
            input_tokens: u["prompt_tokens"].as_u64().unwrap_or(0),
            output_tokens: u["completion_tokens"].as_u64().unwrap_or(0),
            cost_cents: u["cost_cents"].as_i64().unwrap_or(0),
        });

        Ok(AiResponse { content, model, usage, error: None })
    }
}
