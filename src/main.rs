mod config;
mod core;
mod interfaces;
mod logging;

use anyhow::Result;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::info;

use crate::core::accounts::AccountStore;
use crate::core::autorun::AutoRun;
use crate::core::calendar::CalendarScheduler;
use crate::core::delay::DelayGenerator;
use crate::core::events::{EventBus, spawn_heartbeat};
use crate::core::jobs::engine::JobEngine;
use crate::core::lifecycle::{BackgroundTask, LifecycleManager};
use crate::core::remote::{HttpActionClient, RemoteActionClient};
use crate::core::textgen::{HttpReplyGenerator, ReplyGenerator};
use crate::interfaces::web::{ApiServer, ApiServerConfig};

fn config_path() -> PathBuf {
    std::env::var("RAIDPILOT_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("raidpilot.toml"))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cfg = config::Config::load(&config_path())?;

    let (log_tx, _keepalive) = tokio::sync::broadcast::channel::<String>(256);
    tracing_subscriber::fmt()
        .with_writer(logging::LogFanout {
            sender: log_tx.clone(),
        })
        .init();
    info!("raidpilot daemon starting");

    if cfg.accounts.is_empty() {
        tracing::warn!("no accounts configured; submissions will be rejected");
    }

    let events = EventBus::new();
    let delays = Arc::new(DelayGenerator::new());
    let accounts = Arc::new(AccountStore::new(cfg.accounts.clone()));
    let client: Arc<dyn RemoteActionClient> = Arc::new(HttpActionClient::new(
        &cfg.automation_api.base_url,
        &cfg.automation_api.api_key,
        cfg.automation_api.timeout_secs,
    )?);
    let generator: Arc<dyn ReplyGenerator> = Arc::new(HttpReplyGenerator::new(
        &cfg.generation.endpoint,
        &cfg.generation.api_key,
        &cfg.generation.model,
        cfg.generation.timeout_secs,
    )?);

    let engine = JobEngine::new(
        accounts.clone(),
        client.clone(),
        delays.clone(),
        events.clone(),
        cfg.engine_config(),
    );
    let autorun = AutoRun::new(
        engine.clone(),
        accounts.clone(),
        client,
        generator,
        delays.clone(),
        events.clone(),
        cfg.autorun_config(),
    );
    let calendar = CalendarScheduler::new(
        autorun.clone(),
        delays,
        events.clone(),
        cfg.calendar_config(),
    );

    let mut lifecycle = LifecycleManager::new();
    {
        let engine = engine.clone();
        lifecycle.attach(Arc::new(Mutex::new(BackgroundTask::new(
            "job dispatch loop",
            move || engine.spawn_dispatch_loop(),
        ))));
    }
    {
        let calendar = calendar.clone();
        lifecycle.attach(Arc::new(Mutex::new(BackgroundTask::new(
            "calendar tick loop",
            move || calendar.spawn_tick_loop(),
        ))));
    }
    {
        let events = events.clone();
        let period = Duration::from_secs(cfg.heartbeat_secs);
        lifecycle.attach(Arc::new(Mutex::new(BackgroundTask::new(
            "sse heartbeat",
            move || spawn_heartbeat(events, period),
        ))));
    }
    lifecycle.attach(Arc::new(Mutex::new(ApiServer::new(ApiServerConfig {
        engine,
        autorun,
        calendar,
        accounts,
        events,
        log_tx,
        raid_delay_secs: cfg.delays.raid_reply_secs,
        api_host: cfg.api_host.clone(),
        api_port: cfg.api_port,
    }))));

    lifecycle.start().await?;
    tokio::signal::ctrl_c().await?;
    lifecycle.shutdown().await?;
    info!("raidpilot daemon stopped");
    Ok(())
}
