use async_trait::async_trait;
use std::time::Duration;

use crate::core::error::{CoreError, CoreResult};

/// Produces reply text for a candidate tweet. Generation failures are normal
/// job-level failures; the orchestrator records them and moves on.
#[async_trait]
pub trait ReplyGenerator: Send + Sync {
    async fn generate(&self, tweet_text: &str, system_prompt: &str) -> CoreResult<String>;
}

/// OpenAI-compatible chat-completions backend.
pub struct HttpReplyGenerator {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    timeout_secs: u64,
}

impl HttpReplyGenerator {
    pub fn new(
        endpoint: &str,
        api_key: &str,
        model: &str,
        timeout_secs: u64,
    ) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;
        Ok(Self {
            http,
            endpoint: endpoint.to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            timeout_secs,
        })
    }
}

#[async_trait]
impl ReplyGenerator for HttpReplyGenerator {
    async fn generate(&self, tweet_text: &str, system_prompt: &str) -> CoreResult<String> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": system_prompt },
                { "role": "user", "content": tweet_text },
            ],
        });

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    CoreError::Timeout(self.timeout_secs)
                } else {
                    CoreError::RemoteCall(e.to_string())
                }
            })?;

        let status = response.status();
        let value: serde_json::Value = response
            .json()
            .await
            .map_err(|e| CoreError::RemoteCall(format!("invalid generation response: {}", e)))?;

        if !status.is_success() {
            return Err(CoreError::RemoteCall(format!(
                "generation endpoint returned {}",
                status
            )));
        }

        value["choices"][0]["message"]["content"]
            .as_str()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| CoreError::RemoteCall("generation returned no text".to_string()))
    }
}
