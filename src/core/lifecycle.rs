use anyhow::Result;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

#[async_trait::async_trait]
pub trait LifecycleComponent {
    async fn on_init(&mut self) -> Result<()> {
        Ok(())
    }
    async fn on_start(&mut self) -> Result<()> {
        Ok(())
    }
    async fn on_shutdown(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Drives the daemon's components through init → start → shutdown.
pub struct LifecycleManager {
    components: Vec<Arc<Mutex<dyn LifecycleComponent + Send + Sync>>>,
}

impl LifecycleManager {
    pub fn new() -> Self {
        Self {
            components: Vec::new(),
        }
    }

    pub fn attach(&mut self, component: Arc<Mutex<dyn LifecycleComponent + Send + Sync>>) {
        self.components.push(component);
    }

    pub async fn start(&mut self) -> Result<()> {
        info!("Lifecycle Phase: Init");
        for comp in &self.components {
            comp.lock().await.on_init().await?;
        }

        info!("Lifecycle Phase: Start");
        for comp in &self.components {
            comp.lock().await.on_start().await?;
        }

        info!("Lifecycle Phase: Ready");
        Ok(())
    }

    pub async fn shutdown(&mut self) -> Result<()> {
        info!("Lifecycle Phase: Shutdown");
        for comp in &self.components {
            if let Err(e) = comp.lock().await.on_shutdown().await {
                warn!("Component shutdown error: {}", e);
            }
        }
        Ok(())
    }
}

impl Default for LifecycleManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Wraps a background loop (dispatch, calendar tick, heartbeat) as a
/// lifecycle component so shutdown can abort it.
pub struct BackgroundTask {
    name: &'static str,
    spawn: Option<Box<dyn FnOnce() -> tokio::task::JoinHandle<()> + Send + Sync>>,
    handle: Option<tokio::task::JoinHandle<()>>,
}

impl BackgroundTask {
    pub fn new(
        name: &'static str,
        spawn: impl FnOnce() -> tokio::task::JoinHandle<()> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name,
            spawn: Some(Box::new(spawn)),
            handle: None,
        }
    }
}

#[async_trait::async_trait]
impl LifecycleComponent for BackgroundTask {
    async fn on_start(&mut self) -> Result<()> {
        if let Some(spawn) = self.spawn.take() {
            info!("Starting background task: {}", self.name);
            self.handle = Some(spawn());
        }
        Ok(())
    }

    async fn on_shutdown(&mut self) -> Result<()> {
        if let Some(handle) = self.handle.take() {
            handle.abort();
            info!("Stopped background task: {}", self.name);
        }
        Ok(())
    }
}
