use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::SupervisorCommand;
use crate::app::APP_NAME;
use crate::error::{DispatchError, SnapshotError};
use crate::supervisor::CommandResult;

/// Transient notification or a dialog the user has to dismiss
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeKind {
    Toast,
    Alert,
}

/// Message for the user. Every outcome, good or bad, is reported as one of these.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub id: Uuid,
    pub kind: NoticeKind,
    pub success: bool,
    pub title: String,
    pub message: String,
}

impl Notice {
    fn new(kind: NoticeKind, success: bool, title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            success,
            title: title.into(),
            message: message.into(),
        }
    }

    pub fn toast(message: impl Into<String>) -> Self {
        Self::new(NoticeKind::Toast, true, APP_NAME, message)
    }

    pub fn alert(success: bool, title: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(NoticeKind::Alert, success, title, message)
    }

    /// Report for a dispatched command
    pub fn for_command(
        command: SupervisorCommand,
        target: Option<&str>,
        outcome: &Result<CommandResult, DispatchError>,
    ) -> Self {
        let result = match outcome {
            Ok(result) => result,
            Err(e) => return Self::alert(false, format!("Error with {}", command), e.to_string()),
        };
        let name = target.unwrap_or_default();

        // `pm2 logs` streams until killed, so a timeout with output is the normal ending
        if command == SupervisorCommand::Logs {
            if let Some(captured) = result.output_before_timeout() {
                return Self::alert(true, "PM2 Logs", captured);
            }
        }

        match (command, result.success()) {
            (SupervisorCommand::Info, true) => {
                Self::alert(true, format!("Process Info: {}", name), result.output.clone())
            }
            (SupervisorCommand::Info, false) => {
                Self::alert(false, "Error Getting Info", result.output.clone())
            }
            (SupervisorCommand::Logs, true) => Self::alert(true, "PM2 Logs", result.output.clone()),
            (SupervisorCommand::Logs, false) => {
                Self::alert(false, "Error Getting Logs", result.output.clone())
            }
            (_, true) => Self::toast(format!("Process {} successful for {}", command, name)),
            (_, false) => Self::alert(false, format!("Error with {}", command), result.output.clone()),
        }
    }

    /// Report for `pm2 start <command line>`
    pub fn for_new_process(outcome: &Result<CommandResult, DispatchError>) -> Self {
        match outcome {
            Ok(result) if result.success() => Self::toast("Process started successfully"),
            Ok(result) => Self::alert(false, "Error Starting Process", result.output.clone()),
            Err(e) => Self::alert(false, "Error Starting Process", e.to_string()),
        }
    }

    pub fn for_snapshot_error(error: &SnapshotError) -> Self {
        Self::alert(false, "PM2 Unavailable", error.to_string())
    }

    pub fn for_preferences(outcome: Result<(), String>) -> Self {
        match outcome {
            Ok(()) => Self::toast("Preferences saved"),
            Err(e) => Self::alert(false, "Error Saving Preferences", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mutating_success_is_toast() {
        let notice = Notice::for_command(
            SupervisorCommand::Restart,
            Some("api"),
            &Ok(CommandResult::new(0, "done")),
        );
        assert_eq!(notice.kind, NoticeKind::Toast);
        assert!(notice.success);
        assert_eq!(notice.message, "Process restart successful for api");
    }

    #[test]
    fn test_failures_share_the_alert_path() {
        let exit = Notice::for_command(
            SupervisorCommand::Stop,
            Some("api"),
            &Ok(CommandResult::new(1, "[PM2][ERROR] Process api not found")),
        );
        let launch = Notice::for_command(
            SupervisorCommand::Stop,
            Some("api"),
            &Ok(CommandResult::launch_failed("Could not launch pm2: No such file")),
        );
        let precondition = Notice::for_command(
            SupervisorCommand::Stop,
            None,
            &Err(DispatchError::MissingTarget {
                command: SupervisorCommand::Stop,
            }),
        );

        for notice in [&exit, &launch, &precondition] {
            assert_eq!(notice.kind, NoticeKind::Alert);
            assert!(!notice.success);
            assert_eq!(notice.title, "Error with stop");
        }
        assert_eq!(exit.message, "[PM2][ERROR] Process api not found");
    }

    #[test]
    fn test_info_and_logs_show_output() {
        let info = Notice::for_command(
            SupervisorCommand::Info,
            Some("api"),
            &Ok(CommandResult::new(0, "status: online")),
        );
        assert_eq!(info.title, "Process Info: api");
        assert_eq!(info.message, "status: online");

        let logs = Notice::for_command(SupervisorCommand::Logs, None, &Ok(CommandResult::new(2, "boom")));
        assert_eq!(logs.title, "Error Getting Logs");
        assert!(!logs.success);
    }

    #[test]
    fn test_logs_cut_off_by_timeout_are_shown() {
        let streamed = CommandResult::timed_out(
            std::time::Duration::from_secs(60),
            "0|api | listening on 3000\n0|api | GET / 200",
        );
        let logs = Notice::for_command(SupervisorCommand::Logs, None, &Ok(streamed.clone()));
        assert_eq!(logs.title, "PM2 Logs");
        assert!(logs.success);
        assert_eq!(logs.message, "0|api | listening on 3000\n0|api | GET / 200");

        let silent = CommandResult::timed_out(std::time::Duration::from_secs(60), "");
        let logs = Notice::for_command(SupervisorCommand::Logs, None, &Ok(silent));
        assert_eq!(logs.title, "Error Getting Logs");
        assert!(!logs.success);

        // Only logs are expected to stream
        let info = Notice::for_command(SupervisorCommand::Info, Some("api"), &Ok(streamed));
        assert_eq!(info.title, "Error Getting Info");
    }

    #[test]
    fn test_new_process_notices() {
        assert_eq!(
            Notice::for_new_process(&Ok(CommandResult::new(0, ""))).message,
            "Process started successfully"
        );
        let failed = Notice::for_new_process(&Err(DispatchError::EmptyCommand));
        assert_eq!(failed.title, "Error Starting Process");
        assert_eq!(failed.kind, NoticeKind::Alert);
    }
}
