mod execution;
mod scheduling;
mod state_machine;

use std::sync::Arc;
use std::time::Duration;

use crate::core::accounts::{Account, AccountStore};
use crate::core::delay::DelayGenerator;
use crate::core::events::EventBus;
use crate::core::jobs::engine::{BulkItem, EngineConfig, JobEngine};
use crate::core::jobs::{ReplyPayload, SubmitOptions};
use crate::core::remote::mock::MockActionClient;

fn test_accounts() -> Arc<AccountStore> {
    Arc::new(AccountStore::new(vec![Account {
        name: "acct1".into(),
        cookie: "cookie1".into(),
        available_for_random: true,
    }]))
}

fn test_engine(client: Arc<MockActionClient>, cfg: EngineConfig) -> Arc<JobEngine> {
    JobEngine::new(
        test_accounts(),
        client,
        Arc::new(DelayGenerator::from_seed(99)),
        EventBus::new(),
        cfg,
    )
}

fn fast_config() -> EngineConfig {
    EngineConfig {
        tick_interval: Duration::from_millis(20),
        dm_delay_secs: (0, 0),
        ..EngineConfig::default()
    }
}

fn reply(tweet_id: &str) -> ReplyPayload {
    ReplyPayload {
        tweet_id: tweet_id.to_string(),
        text: format!("hello {}", tweet_id),
        account: "acct1".to_string(),
        media: None,
        tweet_url: None,
    }
}

fn bulk(items: Vec<ReplyPayload>) -> Vec<BulkItem> {
    items
        .into_iter()
        .map(|payload| BulkItem {
            payload,
            options: SubmitOptions::default(),
        })
        .collect()
}

/// Poll until the predicate holds or the timeout elapses.
async fn wait_until<F, Fut>(timeout: Duration, mut check: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if check().await {
            return;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not reached within {:?}",
            timeout
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
