mod handlers;
mod router;

use anyhow::Result;
use async_trait::async_trait;
use axum::extract::State;
use axum::response::sse::{Event, Sse};
use std::convert::Infallible;
use std::sync::Arc;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::{Stream, StreamExt};
use tracing::info;

use crate::core::accounts::AccountStore;
use crate::core::autorun::AutoRun;
use crate::core::calendar::CalendarScheduler;
use crate::core::events::{BusEvent, EventBus};
use crate::core::jobs::engine::JobEngine;
use crate::core::lifecycle::LifecycleComponent;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) engine: Arc<JobEngine>,
    pub(crate) autorun: Arc<AutoRun>,
    pub(crate) calendar: Arc<CalendarScheduler>,
    pub(crate) accounts: Arc<AccountStore>,
    pub(crate) events: EventBus,
    pub(crate) log_tx: tokio::sync::broadcast::Sender<String>,
    pub(crate) raid_delay_secs: (u64, u64),
    pub(crate) api_port: u16,
}

impl AppState {
    pub(crate) fn raid_spacing(&self) -> (u64, u64) {
        self.raid_delay_secs
    }
}

pub struct ApiServerConfig {
    pub engine: Arc<JobEngine>,
    pub autorun: Arc<AutoRun>,
    pub calendar: Arc<CalendarScheduler>,
    pub accounts: Arc<AccountStore>,
    pub events: EventBus,
    pub log_tx: tokio::sync::broadcast::Sender<String>,
    pub raid_delay_secs: (u64, u64),
    pub api_host: String,
    pub api_port: u16,
}

pub struct ApiServer {
    state: AppState,
    api_host: String,
    api_port: u16,
}

impl ApiServer {
    pub fn new(config: ApiServerConfig) -> Self {
        Self {
            state: AppState {
                engine: config.engine,
                autorun: config.autorun,
                calendar: config.calendar,
                accounts: config.accounts,
                events: config.events,
                log_tx: config.log_tx,
                raid_delay_secs: config.raid_delay_secs,
                api_port: config.api_port,
            },
            api_host: config.api_host,
            api_port: config.api_port,
        }
    }
}

fn sse_event(event: &BusEvent) -> Event {
    Event::default()
        .event(event.name())
        .data(serde_json::to_string(event).unwrap_or_default())
}

/// Live state stream. A connecting client first receives the full jobs,
/// auto-run, and scheduler snapshots, so a reconnect is never without state;
/// incremental events and heartbeats follow.
async fn sse_events_endpoint(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let receiver = state.events.subscribe();

    let (jobs, summary) = state.engine.snapshot().await;
    let autorun = state.autorun.snapshot().await;
    let entries = state.calendar.list().await;
    let initial = [
        BusEvent::JobsSnapshot { jobs, summary },
        BusEvent::AutoRunState { state: autorun },
        BusEvent::SchedulerState { entries },
    ];
    let snapshot_stream =
        tokio_stream::iter(initial.into_iter().map(|e| Ok(sse_event(&e))));

    let live_stream = BroadcastStream::new(receiver).filter_map(|msg| match msg {
        Ok(event) => Some(Ok(sse_event(&event))),
        // A lagged client dropped events; it recovers from the next snapshot.
        Err(_) => None,
    });

    Sse::new(snapshot_stream.chain(live_stream))
}

/// Raw daemon log tail for the dashboard console panel.
async fn sse_logs_endpoint(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let receiver = state.log_tx.subscribe();
    let stream = BroadcastStream::new(receiver).map(|msg| match msg {
        Ok(line) => Ok(Event::default().data(line)),
        Err(_) => Ok(Event::default().data("Log stream lagged")),
    });
    Sse::new(stream)
}

#[async_trait]
impl LifecycleComponent for ApiServer {
    async fn on_init(&mut self) -> Result<()> {
        info!("API Server Interface initializing...");
        Ok(())
    }

    async fn on_start(&mut self) -> Result<()> {
        let state = self.state.clone();
        let addr = format!("{}:{}", self.api_host, self.api_port);

        tokio::spawn(async move {
            let app = router::build_api_router(state);
            match tokio::net::TcpListener::bind(&addr).await {
                Ok(listener) => {
                    info!("API Server running at http://{addr}");
                    if let Err(e) = axum::serve(listener, app).await {
                        tracing::error!("API Server crashed: {}", e);
                    }
                }
                Err(e) => tracing::error!("API Server failed to bind {}: {}", addr, e),
            }
        });
        Ok(())
    }

    async fn on_shutdown(&mut self) -> Result<()> {
        info!("API Server Interface shutting down...");
        Ok(())
    }
}
