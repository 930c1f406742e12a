pub mod app;
pub mod commands;
pub mod config;
pub mod error;
pub mod monitor;
pub mod process;
pub mod supervisor;

use anyhow::Result;
use std::sync::Arc;
use tracing::info;

use app::{APP_NAME, APP_VERSION};
use config::{Preferences, Settings};
use monitor::{Monitor, TracingPresenter};
use supervisor::{Pm2Client, Supervisor};

/// Load preferences, resolve the pm2 environment once, and poll until Ctrl-C
pub fn run() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    info!("Starting {} v{}", APP_NAME, APP_VERSION);

    let prefs = Preferences::load();
    let settings = config::install_global(Settings::resolve(&prefs));
    let supervisor: Arc<dyn Supervisor> = Arc::new(Pm2Client::new(settings.clone()));

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async move {
        let (monitor, handle) = Monitor::new(supervisor, settings, Arc::new(TracingPresenter));
        let task = tokio::spawn(monitor.run());

        tokio::signal::ctrl_c().await?;
        info!("Shutting down");

        handle.shutdown();
        task.await?;
        Ok::<(), anyhow::Error>(())
    })
}
