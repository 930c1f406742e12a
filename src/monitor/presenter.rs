use tracing::{error, info, warn};

use super::menu::{self, MenuEntry};
use crate::commands::{Notice, NoticeKind};
use crate::process::ProcessSnapshot;

/// Whatever draws the status menu and shows dialogs or notifications.
/// Called from the monitor's tasks, so implementations marshal onto their
/// own UI thread if they need one.
pub trait Presenter: Send + Sync + 'static {
    fn show_snapshot(&self, snapshot: &ProcessSnapshot);
    fn show_notice(&self, notice: &Notice);
}

/// Headless presenter that writes everything to the log
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingPresenter;

impl Presenter for TracingPresenter {
    fn show_snapshot(&self, snapshot: &ProcessSnapshot) {
        if let Some(e) = snapshot.error() {
            warn!("No process data: {}", e);
        }

        for entry in menu::build(snapshot) {
            if let MenuEntry::Submenu { title, .. } = entry {
                info!("  {}", title);
            }
        }
        info!("{} process(es) at {}", snapshot.len(), snapshot.taken_at());
    }

    fn show_notice(&self, notice: &Notice) {
        match (notice.kind, notice.success) {
            (NoticeKind::Toast, _) => info!("[{}] {}", notice.title, notice.message),
            (NoticeKind::Alert, true) => info!("{}\n{}", notice.title, notice.message),
            (NoticeKind::Alert, false) => error!("{}\n{}", notice.title, notice.message),
        }
    }
}
