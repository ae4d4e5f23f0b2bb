//! LLM HTTP client using reqwest.
//!
//! The model generates text only — routing and counting stay in Rust. Used
//! exclusively by the synthesis handlers (EXPLAIN, COMPARE, RECOMMEND, FAQ,
//! fallback) after the routing decision is made. Error mapping covers 401,
//! 429, and 5xx responses.

use serde_json::json;

use crate::{config::Config, error::RouterError};

/// Maximum tokens requested per synthesis call.
const MAX_TOKENS: u32 = 1_024;

/// HTTP client for the Anthropic Messages API.
pub struct LlmClient {
    client: reqwest::Client,
}

impl Default for LlmClient {
    fn default() -> Self {
        Self::new()
    }
}

impl LlmClient {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    /// Generate text for a single system + user prompt pair.
    pub async fn generate(
        &self,
        config: &Config,
        system: &str,
        user_content: &str,
    ) -> Result<String, RouterError> {
        let body = json!({
            "model":      config.llm_model,
            "max_tokens": MAX_TOKENS,
            "system":     system,
            "messages":   [{ "role": "user", "content": user_content }],
        });

        let url = format!("{}/v1/messages", config.anthropic_base_url);
        let response = self
            .client
            .post(&url)
            .header("x-api-key", &config.anthropic_api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(match status.as_u16() {
                401 => RouterError::Llm("authentication failed (401): check API key".to_string()),
                429 => RouterError::Llm("rate limited (429): retry later".to_string()),
                s if s >= 500 => {
                    RouterError::Llm(format!("server error ({}): {}", s, detail))
                }
                s => RouterError::Llm(format!("unexpected status ({}): {}", s, detail)),
            });
        }

        let raw: serde_json::Value = response.json().await?;
        Self::extract_text(&raw)
    }

    /// Pull the first text block out of a Messages API response.
    fn extract_text(raw: &serde_json::Value) -> Result<String, RouterError> {
        let text = raw["content"]
            .as_array()
            .and_then(|blocks| {
                blocks
                    .iter()
                    .find(|b| b["type"] == "text")
                    .and_then(|b| b["text"].as_str())
            })
            .map(|s| s.to_string());

        text.ok_or_else(|| {
            RouterError::Llm("response contained no text content block".to_string())
        })
    }
}
