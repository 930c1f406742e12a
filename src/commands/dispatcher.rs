use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use crate::error::DispatchError;
use crate::supervisor::{CommandInvocation, CommandResult, Supervisor};

/// Lines of history requested by `logs`
pub const LOG_LINES: u32 = 50;

/// User-facing actions, named after the pm2 subcommands they run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SupervisorCommand {
    Start,
    Stop,
    Restart,
    Delete,
    Info,
    Logs,
}

impl SupervisorCommand {
    pub const ALL: [SupervisorCommand; 6] = [
        SupervisorCommand::Start,
        SupervisorCommand::Stop,
        SupervisorCommand::Restart,
        SupervisorCommand::Delete,
        SupervisorCommand::Info,
        SupervisorCommand::Logs,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SupervisorCommand::Start => "start",
            SupervisorCommand::Stop => "stop",
            SupervisorCommand::Restart => "restart",
            SupervisorCommand::Delete => "delete",
            SupervisorCommand::Info => "info",
            SupervisorCommand::Logs => "logs",
        }
    }

    pub fn needs_target(&self) -> bool {
        !matches!(self, SupervisorCommand::Logs)
    }

    /// Whether success changes the process list
    pub fn mutates(&self) -> bool {
        matches!(
            self,
            SupervisorCommand::Start
                | SupervisorCommand::Stop
                | SupervisorCommand::Restart
                | SupervisorCommand::Delete
        )
    }
}

impl std::fmt::Display for SupervisorCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Argument vector for `command`, validated before anything runs
pub fn build_invocation(
    command: SupervisorCommand,
    target: Option<&str>,
) -> Result<CommandInvocation, DispatchError> {
    if command == SupervisorCommand::Logs {
        return Ok(CommandInvocation::new([
            "logs".to_string(),
            "--lines".to_string(),
            LOG_LINES.to_string(),
        ]));
    }

    match target.filter(|t| !t.trim().is_empty()) {
        Some(target) => Ok(CommandInvocation::new([command.as_str(), target])),
        None => Err(DispatchError::MissingTarget { command }),
    }
}

/// `pm2 start <command line>` for a process pm2 doesn't know yet
pub fn new_process_invocation(command_line: &str) -> Result<CommandInvocation, DispatchError> {
    let command_line = command_line.trim();
    if command_line.is_empty() {
        return Err(DispatchError::EmptyCommand);
    }
    Ok(CommandInvocation::new(["start", command_line]))
}

/// Sends control commands to pm2. Refreshing the process list afterwards is
/// left to the caller.
pub struct CommandDispatcher {
    supervisor: Arc<dyn Supervisor>,
}

impl CommandDispatcher {
    pub fn new(supervisor: Arc<dyn Supervisor>) -> Self {
        Self { supervisor }
    }

    pub fn dispatch(
        &self,
        command: SupervisorCommand,
        target: Option<&str>,
    ) -> Result<CommandResult, DispatchError> {
        let invocation = build_invocation(command, target)?;
        Ok(self.run(invocation))
    }

    pub fn start_new(&self, command_line: &str) -> Result<CommandResult, DispatchError> {
        let invocation = new_process_invocation(command_line)?;
        Ok(self.run(invocation))
    }

    fn run(&self, invocation: CommandInvocation) -> CommandResult {
        info!("pm2 {}", invocation);
        let result = self.supervisor.execute(&invocation);
        info!("pm2 {} -> exit code {}", invocation, result.exit_code);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::ProcessListCache;
    use crate::supervisor::testing::StubSupervisor;

    #[test]
    fn test_invocation_per_command() {
        let expected: [(SupervisorCommand, &[&str]); 6] = [
            (SupervisorCommand::Start, &["start", "api"]),
            (SupervisorCommand::Stop, &["stop", "api"]),
            (SupervisorCommand::Restart, &["restart", "api"]),
            (SupervisorCommand::Delete, &["delete", "api"]),
            (SupervisorCommand::Info, &["info", "api"]),
            (SupervisorCommand::Logs, &["logs", "--lines", "50"]),
        ];

        for (command, args) in expected {
            let invocation = build_invocation(command, Some("api")).unwrap();
            assert_eq!(invocation.args(), args, "{command}");
        }
    }

    #[test]
    fn test_logs_ignores_target() {
        assert_eq!(
            build_invocation(SupervisorCommand::Logs, None).unwrap(),
            build_invocation(SupervisorCommand::Logs, Some("api")).unwrap()
        );
    }

    #[test]
    fn test_missing_target_rejected_before_execution() {
        let stub = Arc::new(StubSupervisor::default());
        let dispatcher = CommandDispatcher::new(stub.clone());

        for command in SupervisorCommand::ALL.into_iter().filter(|c| c.needs_target()) {
            assert_eq!(
                dispatcher.dispatch(command, None),
                Err(DispatchError::MissingTarget { command })
            );
            assert_eq!(
                dispatcher.dispatch(command, Some("  ")),
                Err(DispatchError::MissingTarget { command })
            );
        }
        assert!(stub.calls().is_empty());
    }

    #[test]
    fn test_result_is_returned_verbatim() {
        let stub = Arc::new(StubSupervisor::always(CommandResult::new(7, "supervisor said no")));
        let dispatcher = CommandDispatcher::new(stub);

        let result = dispatcher.dispatch(SupervisorCommand::Stop, Some("api")).unwrap();
        assert_eq!(result, CommandResult::new(7, "supervisor said no"));
    }

    #[test]
    fn test_start_new_uses_whole_command_line() {
        let stub = Arc::new(StubSupervisor::default());
        let dispatcher = CommandDispatcher::new(stub.clone());

        dispatcher.start_new("  node server.js --port 3000 ").unwrap();
        assert_eq!(
            stub.calls(),
            vec![CommandInvocation::new(["start", "node server.js --port 3000"])]
        );
        assert_eq!(dispatcher.start_new("   "), Err(DispatchError::EmptyCommand));
        assert_eq!(stub.calls().len(), 1);
    }

    #[test]
    fn test_restart_leaves_snapshot_alone_until_refresh() {
        let stub = Arc::new(StubSupervisor::default());
        stub.push(CommandResult::new(0, r#"[{"name":"api","pm2_env":{"status":"stopped"}}]"#));
        stub.push(CommandResult::new(0, "restarted"));
        stub.push(CommandResult::new(0, r#"[{"name":"api","pm2_env":{"status":"online"}}]"#));

        let cache = ProcessListCache::new(stub.clone());
        let dispatcher = CommandDispatcher::new(stub.clone());

        let before = cache.refresh();
        let result = dispatcher.dispatch(SupervisorCommand::Restart, Some("api")).unwrap();
        assert!(result.success());
        assert_eq!(cache.latest(), before);

        let after = cache.refresh();
        assert_eq!(after.records()[0].status, crate::process::ProcessStatus::Online);
        assert_eq!(
            stub.calls(),
            vec![
                CommandInvocation::new(["jlist"]),
                CommandInvocation::new(["restart", "api"]),
                CommandInvocation::new(["jlist"]),
            ]
        );
    }
}
