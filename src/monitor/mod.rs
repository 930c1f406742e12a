//! Monitor loop
//! Owns the process-list cache and the command dispatcher, polls pm2 on a
//! timer and runs user actions on worker threads. Everything the user should
//! see goes out through a `Presenter`.
pub mod menu;
pub mod presenter;

pub use menu::{MenuAction, MenuEntry};
pub use presenter::{Presenter, TracingPresenter};

use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tracing::{debug, error, info};

use crate::commands::{CommandDispatcher, Notice, SupervisorCommand};
use crate::config::{Preferences, SharedSettings};
use crate::error::SnapshotError;
use crate::process::ProcessListCache;
use crate::supervisor::{CommandResult, Supervisor};

/// Requests accepted by a running monitor
#[derive(Debug, Clone)]
pub enum MonitorMessage {
    Refresh,
    Run {
        command: SupervisorCommand,
        target: Option<String>,
    },
    StartNew(String),
    UpdatePreferences(Preferences),
    Shutdown,
}

/// Cheap, cloneable sender for a running monitor
#[derive(Debug, Clone)]
pub struct MonitorHandle {
    tx: mpsc::UnboundedSender<MonitorMessage>,
}

impl MonitorHandle {
    /// Returns false once the monitor has stopped
    pub fn send(&self, message: MonitorMessage) -> bool {
        self.tx.send(message).is_ok()
    }

    pub fn refresh(&self) -> bool {
        self.send(MonitorMessage::Refresh)
    }

    pub fn run(&self, command: SupervisorCommand, target: Option<&str>) -> bool {
        self.send(MonitorMessage::Run {
            command,
            target: target.map(str::to_string),
        })
    }

    pub fn start_new(&self, command_line: &str) -> bool {
        self.send(MonitorMessage::StartNew(command_line.to_string()))
    }

    pub fn update_preferences(&self, prefs: Preferences) -> bool {
        self.send(MonitorMessage::UpdatePreferences(prefs))
    }

    pub fn shutdown(&self) -> bool {
        self.send(MonitorMessage::Shutdown)
    }
}

enum Wake {
    Tick,
    Message(Option<MonitorMessage>),
}

pub struct Monitor<P: Presenter> {
    cache: Arc<ProcessListCache>,
    dispatcher: Arc<CommandDispatcher>,
    settings: SharedSettings,
    presenter: Arc<P>,
    preferences_path: Option<PathBuf>,
    tx: mpsc::UnboundedSender<MonitorMessage>,
    rx: mpsc::UnboundedReceiver<MonitorMessage>,
    last_error: Option<SnapshotError>,
}

impl<P: Presenter> Monitor<P> {
    pub fn new(
        supervisor: Arc<dyn Supervisor>,
        settings: SharedSettings,
        presenter: Arc<P>,
    ) -> (Self, MonitorHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        let monitor = Self {
            cache: Arc::new(ProcessListCache::new(supervisor.clone())),
            dispatcher: Arc::new(CommandDispatcher::new(supervisor)),
            settings,
            presenter,
            preferences_path: None,
            tx: tx.clone(),
            rx,
            last_error: None,
        };
        (monitor, MonitorHandle { tx })
    }

    /// Persist preference updates here instead of the default location
    pub fn with_preferences_path(mut self, path: PathBuf) -> Self {
        self.preferences_path = Some(path);
        self
    }

    pub fn cache(&self) -> Arc<ProcessListCache> {
        self.cache.clone()
    }

    /// Poll and serve requests until `Shutdown`
    pub async fn run(mut self) {
        info!("Monitor started");
        self.refresh().await;

        let mut timer = self.timer();
        loop {
            let wake = tokio::select! {
                _ = tick(&mut timer) => Wake::Tick,
                message = self.rx.recv() => Wake::Message(message),
            };

            match wake {
                Wake::Tick => self.refresh().await,
                Wake::Message(None) | Wake::Message(Some(MonitorMessage::Shutdown)) => break,
                Wake::Message(Some(MonitorMessage::Refresh)) => self.refresh().await,
                Wake::Message(Some(MonitorMessage::Run { command, target })) => {
                    self.spawn_command(command, target)
                }
                Wake::Message(Some(MonitorMessage::StartNew(command_line))) => {
                    self.spawn_start_new(command_line)
                }
                Wake::Message(Some(MonitorMessage::UpdatePreferences(prefs))) => {
                    self.update_preferences(prefs);
                    timer = self.timer();
                }
            }
        }

        info!("Monitor stopped");
    }

    fn timer(&self) -> Option<Interval> {
        let period = self.settings.current().auto_refresh?;
        debug!("Auto refresh every {:?}", period);
        let mut interval = tokio::time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Some(interval)
    }

    // Awaited in the loop, so refreshes never overlap
    async fn refresh(&mut self) {
        let cache = self.cache.clone();
        let snapshot = match tokio::task::spawn_blocking(move || cache.refresh()).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                error!("Refresh worker failed: {}", e);
                return;
            }
        };

        self.presenter.show_snapshot(&snapshot);

        let error = snapshot.error().cloned();
        if let Some(e) = &error {
            if self.last_error.as_ref() != Some(e) {
                self.presenter.show_notice(&Notice::for_snapshot_error(e));
            }
        }
        self.last_error = error;
    }

    fn spawn_command(&self, command: SupervisorCommand, target: Option<String>) {
        let dispatcher = self.dispatcher.clone();
        let presenter = self.presenter.clone();
        let tx = self.tx.clone();

        tokio::spawn(async move {
            let worker_target = target.clone();
            let outcome = tokio::task::spawn_blocking(move || {
                dispatcher.dispatch(command, worker_target.as_deref())
            })
            .await
            .unwrap_or_else(|e| Ok(worker_failed(e)));

            presenter.show_notice(&Notice::for_command(command, target.as_deref(), &outcome));

            if command.mutates() && matches!(&outcome, Ok(result) if result.success()) {
                let _ = tx.send(MonitorMessage::Refresh);
            }
        });
    }

    fn spawn_start_new(&self, command_line: String) {
        let dispatcher = self.dispatcher.clone();
        let presenter = self.presenter.clone();
        let tx = self.tx.clone();

        tokio::spawn(async move {
            let outcome = tokio::task::spawn_blocking(move || dispatcher.start_new(&command_line))
                .await
                .unwrap_or_else(|e| Ok(worker_failed(e)));

            presenter.show_notice(&Notice::for_new_process(&outcome));

            if matches!(&outcome, Ok(result) if result.success()) {
                let _ = tx.send(MonitorMessage::Refresh);
            }
        });
    }

    fn update_preferences(&mut self, prefs: Preferences) {
        let saved = match &self.preferences_path {
            Some(path) => prefs.save_to(path),
            None => prefs.save().map(|_| ()),
        };

        // Applied for this session even if the file couldn't be written
        let current = self.settings.current();
        self.settings.replace(current.with_preferences(&prefs));
        info!("Preferences applied: pm2 at {:?}", prefs.pm2_path);

        self.presenter
            .show_notice(&Notice::for_preferences(saved.map_err(|e| e.to_string())));
    }
}

fn worker_failed(e: tokio::task::JoinError) -> CommandResult {
    CommandResult::launch_failed(format!("pm2 worker failed: {}", e))
}

async fn tick(timer: &mut Option<Interval>) {
    match timer {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}
