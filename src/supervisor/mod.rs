//! Supervisor boundary
//! Everything that talks to the pm2 executable goes through the `Supervisor`
//! trait so the cache and dispatcher can be driven by stubs in tests
pub mod client;
pub mod env;

pub use client::Pm2Client;

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Arguments for one pm2 invocation, fixed at construction
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CommandInvocation(Vec<String>);

impl CommandInvocation {
    pub fn new<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(args.into_iter().map(Into::into).collect())
    }

    pub fn args(&self) -> &[String] {
        &self.0
    }
}

impl std::fmt::Display for CommandInvocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.join(" "))
    }
}

/// Exit code and merged stdout/stderr of one invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandResult {
    pub exit_code: i32,
    pub output: String,
}

impl CommandResult {
    /// The executable could not be started at all
    pub const LAUNCH_FAILED: i32 = -1;
    /// The child was killed after exceeding the configured timeout
    pub const TIMED_OUT: i32 = -2;

    pub fn new(exit_code: i32, output: impl Into<String>) -> Self {
        Self {
            exit_code,
            output: output.into(),
        }
    }

    pub fn launch_failed(message: impl Into<String>) -> Self {
        Self::new(Self::LAUNCH_FAILED, message)
    }

    pub fn timed_out(after: Duration, partial_output: &str) -> Self {
        let mut output = partial_output.to_string();
        if !output.is_empty() && !output.ends_with('\n') {
            output.push('\n');
        }
        output.push_str(&format!("pm2 timed out after {}s", after.as_secs_f32()));
        Self::new(Self::TIMED_OUT, output)
    }

    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    pub fn is_launch_failure(&self) -> bool {
        self.exit_code == Self::LAUNCH_FAILED
    }

    pub fn is_timeout(&self) -> bool {
        self.exit_code == Self::TIMED_OUT
    }

    /// What the child printed before it was killed, without the timeout line.
    /// `None` unless this is a timeout with some output.
    pub fn output_before_timeout(&self) -> Option<&str> {
        if !self.is_timeout() {
            return None;
        }
        let (captured, _) = self.output.rsplit_once('\n')?;
        Some(captured).filter(|c| !c.trim().is_empty())
    }
}

/// Runs invocations against the external supervisor.
/// Calls block the current thread until the child exits.
pub trait Supervisor: Send + Sync {
    fn execute(&self, invocation: &CommandInvocation) -> CommandResult;
}
