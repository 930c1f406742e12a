//! Error types for the monitor core

use crate::commands::SupervisorCommand;

/// Rejected before anything is sent to the supervisor
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DispatchError {
    #[error("'{command}' needs a process name")]
    MissingTarget { command: SupervisorCommand },

    #[error("Enter a command to start, e.g. \"node server.js\"")]
    EmptyCommand,
}

/// Why a snapshot carries no records
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SnapshotError {
    #[error("{message}")]
    Launch { message: String },

    #[error("pm2 exited with code {code}: {output}")]
    Exit { code: i32, output: String },

    #[error("Could not parse process list: {reason}")]
    Parse { reason: String },

    #[error("{message}")]
    TimedOut { message: String },
}

/// Preferences persistence errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Could not determine config directory")]
    NoConfigDir,

    #[error("Failed to access preferences at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to (de)serialize preferences: {0}")]
    Json(#[from] serde_json::Error),
}

/// Failure to run a child process to completion
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("{0}")]
    Spawn(#[source] std::io::Error),

    /// Spawned, but waiting on the child failed; the child has been killed
    #[error("{0}")]
    Wait(#[source] std::io::Error),
}
