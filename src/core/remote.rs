use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::core::error::{CoreError, CoreResult};

/// A candidate tweet returned by the search operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TweetRef {
    pub id: String,
    pub url: String,
    pub text: String,
    pub author: String,
}

/// Successful reply outcome as reported by the automation API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplyOutcome {
    pub reply_id: String,
    pub reply_url: String,
}

/// Wrapper around the external social-network automation API. Every call
/// carries a hard wall-clock timeout; a hang surfaces as `CoreError::Timeout`
/// rather than blocking the dispatch loop.
#[async_trait]
pub trait RemoteActionClient: Send + Sync {
    async fn post_reply(
        &self,
        tweet_id: &str,
        text: &str,
        account: &str,
        cookie: &str,
        media: Option<&str>,
    ) -> CoreResult<ReplyOutcome>;

    async fn like_tweet(&self, tweet_id: &str, account: &str, cookie: &str) -> CoreResult<()>;

    async fn send_dm(
        &self,
        recipient: &str,
        message: &str,
        account: &str,
        cookie: &str,
    ) -> CoreResult<()>;

    async fn search(
        &self,
        terms: &[String],
        account: &str,
        cookie: &str,
        max: usize,
    ) -> CoreResult<Vec<TweetRef>>;
}

/// HTTP implementation posting JSON to the configured automation API.
pub struct HttpActionClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    timeout_secs: u64,
}

impl HttpActionClient {
    pub fn new(base_url: &str, api_key: &str, timeout_secs: u64) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            timeout_secs,
        })
    }

    async fn call(&self, path: &str, body: serde_json::Value) -> CoreResult<serde_json::Value> {
        let url = format!("{}/{}", self.base_url, path);
        let request = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send();

        // The dispatch loop must never block on a misbehaving remote call.
        let response = tokio::time::timeout(Duration::from_secs(self.timeout_secs), request)
            .await
            .map_err(|_| CoreError::Timeout(self.timeout_secs))?
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
            .map_err(|e| CoreError::RemoteCall(format!("invalid response body: {}", e)))?;

        if !status.is_success() {
            let detail = value
                .get("error")
                .and_then(|v| v.as_str())
                .unwrap_or("no detail");
            return Err(CoreError::RemoteCall(format!(
                "automation API returned {}: {}",
                status, detail
            )));
        }
        if value.get("success").and_then(|v| v.as_bool()) == Some(false) {
            let detail = value
                .get("error")
                .and_then(|v| v.as_str())
                .unwrap_or("unspecified failure");
            return Err(CoreError::RemoteCall(detail.to_string()));
        }
        Ok(value)
    }
}

#[async_trait]
impl RemoteActionClient for HttpActionClient {
    async fn post_reply(
        &self,
        tweet_id: &str,
        text: &str,
        account: &str,
        cookie: &str,
        media: Option<&str>,
    ) -> CoreResult<ReplyOutcome> {
        let value = self
            .call(
                "reply",
                serde_json::json!({
                    "tweet_id": tweet_id,
                    "text": text,
                    "account": account,
                    "cookie": cookie,
                    "media": media,
                }),
            )
            .await?;

        let reply_id = value
            .get("reply_id")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();
        let reply_url = value
            .get("reply_url")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();
        Ok(ReplyOutcome { reply_id, reply_url })
    }

    async fn like_tweet(&self, tweet_id: &str, account: &str, cookie: &str) -> CoreResult<()> {
        self.call(
            "like",
            serde_json::json!({
                "tweet_id": tweet_id,
                "account": account,
                "cookie": cookie,
            }),
        )
        .await?;
        Ok(())
    }

    async fn send_dm(
        &self,
        recipient: &str,
        message: &str,
        account: &str,
        cookie: &str,
    ) -> CoreResult<()> {
        self.call(
            "dm",
            serde_json::json!({
                "recipient": recipient,
                "message": message,
                "account": account,
                "cookie": cookie,
            }),
        )
        .await?;
        Ok(())
    }

    async fn search(
        &self,
        terms: &[String],
        account: &str,
        cookie: &str,
        max: usize,
    ) -> CoreResult<Vec<TweetRef>> {
        let value = self
            .call(
                "search",
                serde_json::json!({
                    "terms": terms,
                    "account": account,
                    "cookie": cookie,
                    "max": max,
                }),
            )
            .await?;

        let tweets = value
            .get("tweets")
            .cloned()
            .unwrap_or_else(|| serde_json::json!([]));
        serde_json::from_value(tweets)
            .map_err(|e| CoreError::RemoteCall(format!("malformed search results: {}", e)))
    }
}

#[cfg(test)]
pub mod mock {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Scripted stand-in for the automation API. Counts calls so tests can
    /// assert that cancelled jobs never reach the remote side.
    pub struct MockActionClient {
        pub reply_calls: AtomicUsize,
        pub like_calls: AtomicUsize,
        pub dm_calls: AtomicUsize,
        pub search_calls: AtomicUsize,
        reply_script: Mutex<VecDeque<CoreResult<ReplyOutcome>>>,
        search_results: Mutex<Vec<TweetRef>>,
        search_error: Mutex<Option<String>>,
        pub reply_latency: Option<Duration>,
        pub search_latency: Option<Duration>,
    }

    impl MockActionClient {
        pub fn new() -> Self {
            Self {
                reply_calls: AtomicUsize::new(0),
                like_calls: AtomicUsize::new(0),
                dm_calls: AtomicUsize::new(0),
                search_calls: AtomicUsize::new(0),
                reply_script: Mutex::new(VecDeque::new()),
                search_results: Mutex::new(Vec::new()),
                search_error: Mutex::new(None),
                reply_latency: None,
                search_latency: None,
            }
        }

        pub fn with_reply_latency(mut self, latency: Duration) -> Self {
            self.reply_latency = Some(latency);
            self
        }

        pub fn with_search_latency(mut self, latency: Duration) -> Self {
            self.search_latency = Some(latency);
            self
        }

        /// Queue the outcome of the next `post_reply` call. When the script
        /// is exhausted, replies succeed with a synthetic URL.
        pub fn script_reply(&self, outcome: CoreResult<ReplyOutcome>) {
            self.reply_script.lock().unwrap().push_back(outcome);
        }

        pub fn set_search_results(&self, tweets: Vec<TweetRef>) {
            *self.search_results.lock().unwrap() = tweets;
        }

        pub fn fail_search(&self, error: &str) {
            *self.search_error.lock().unwrap() = Some(error.to_string());
        }
    }

    #[async_trait]
    impl RemoteActionClient for MockActionClient {
        async fn post_reply(
            &self,
            tweet_id: &str,
            _text: &str,
            _account: &str,
            _cookie: &str,
            _media: Option<&str>,
        ) -> CoreResult<ReplyOutcome> {
            self.reply_calls.fetch_add(1, Ordering::SeqCst);
            if let Some(latency) = self.reply_latency {
                tokio::time::sleep(latency).await;
            }
            let scripted = self.reply_script.lock().unwrap().pop_front();
            match scripted {
                Some(outcome) => outcome,
                None => Ok(ReplyOutcome {
                    reply_id: format!("r-{}", tweet_id),
                    reply_url: format!("https://x.com/i/status/r-{}", tweet_id),
                }),
            }
        }

        async fn like_tweet(
            &self,
            _tweet_id: &str,
            _account: &str,
            _cookie: &str,
        ) -> CoreResult<()> {
            self.like_calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn send_dm(
            &self,
            _recipient: &str,
            _message: &str,
            _account: &str,
            _cookie: &str,
        ) -> CoreResult<()> {
            self.dm_calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn search(
            &self,
            _terms: &[String],
            _account: &str,
            _cookie: &str,
            max: usize,
        ) -> CoreResult<Vec<TweetRef>> {
            self.search_calls.fetch_add(1, Ordering::SeqCst);
            if let Some(latency) = self.search_latency {
                tokio::time::sleep(latency).await;
            }
            if let Some(error) = self.search_error.lock().unwrap().clone() {
                return Err(CoreError::RemoteCall(error));
            }
            let mut tweets = self.search_results.lock().unwrap().clone();
            tweets.truncate(max);
            Ok(tweets)
        }
    }
}
