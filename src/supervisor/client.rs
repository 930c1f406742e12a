use parking_lot::Mutex;
use std::io::{ErrorKind, Read};
use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use super::{CommandInvocation, CommandResult, Supervisor};
use crate::app::SUPERVISOR_BINARY;
use crate::config::{Settings, SharedSettings};
use crate::error::RunError;

const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(25);
const DRAIN_GRACE: Duration = Duration::from_millis(500);

/// Runs pm2 as a child process using the session settings
#[derive(Debug, Clone)]
pub struct Pm2Client {
    settings: SharedSettings,
}

impl Pm2Client {
    pub fn new(settings: SharedSettings) -> Self {
        Self { settings }
    }

    /// Configured path if it exists, otherwise pm2 looked up on the resolved PATH
    pub fn resolve_executable(settings: &Settings) -> PathBuf {
        if settings.pm2_path.is_file() {
            return settings.pm2_path.clone();
        }

        match which::which_in(SUPERVISOR_BINARY, Some(&settings.search_path), &settings.home) {
            Ok(found) => {
                debug!(
                    "Configured pm2 path {:?} missing, found {:?} on PATH",
                    settings.pm2_path, found
                );
                found
            }
            Err(e) => {
                debug!("pm2 not found on PATH ({}), deferring to spawn", e);
                PathBuf::from(SUPERVISOR_BINARY)
            }
        }
    }
}

impl Supervisor for Pm2Client {
    fn execute(&self, invocation: &CommandInvocation) -> CommandResult {
        let settings = self.settings.current();
        let program = Self::resolve_executable(&settings);

        debug!("Running {:?} {}", program, invocation);

        let mut command = Command::new(&program);
        command
            .args(invocation.args())
            .env("PATH", &settings.search_path)
            .env("HOME", &settings.home)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        match run_captured(command, settings.command_timeout) {
            Ok(Captured {
                status: Some(status),
                output,
            }) => {
                let exit_code = exit_code(status);
                debug!("pm2 {} exited with {} ({} bytes)", invocation, exit_code, output.len());
                CommandResult::new(exit_code, output)
            }
            Ok(Captured { status: None, output }) => {
                let limit = settings.command_timeout.unwrap_or_default();
                warn!("pm2 {} killed after {:?}", invocation, limit);
                CommandResult::timed_out(limit, &output)
            }
            Err(e) => {
                warn!("Running {:?} failed: {}", program, e);
                failure_result(&e, &settings.search_path)
            }
        }
    }
}

/// Output of a finished (or abandoned) child
pub(crate) struct Captured {
    /// `None` when the child was killed at the deadline
    pub status: Option<ExitStatus>,
    pub output: String,
}

/// Spawn `command` and collect whatever of stdout/stderr it pipes into a
/// single buffer, in the order the chunks arrive.
///
/// The deadline covers the child itself. Once it has exited or been killed,
/// readers get `DRAIN_GRACE` to empty the pipes; a background grandchild
/// holding them open past that is abandoned with whatever was read so far.
pub(crate) fn run_captured(
    mut command: Command,
    timeout: Option<Duration>,
) -> Result<Captured, RunError> {
    let mut child = command
        .stdin(Stdio::null())
        .spawn()
        .map_err(RunError::Spawn)?;
    let deadline = timeout.map(|limit| Instant::now() + limit);

    let buffer = Arc::new(Mutex::new(Vec::new()));
    let (done_tx, done_rx) = mpsc::channel();
    let mut readers = 0;
    if let Some(stdout) = child.stdout.take() {
        drain(stdout, buffer.clone(), done_tx.clone());
        readers += 1;
    }
    if let Some(stderr) = child.stderr.take() {
        drain(stderr, buffer.clone(), done_tx.clone());
        readers += 1;
    }
    drop(done_tx);

    let status = match wait_for_exit(&mut child, deadline) {
        Ok(status) => status,
        Err(e) => {
            let _ = child.kill();
            let _ = child.wait();
            return Err(RunError::Wait(e));
        }
    };
    if status.is_none() {
        let _ = child.kill();
        let _ = child.wait();
    }

    if !wait_for_readers(&done_rx, readers, Instant::now() + DRAIN_GRACE) {
        debug!("Output pipes still open {:?} after exit, keeping what was read", DRAIN_GRACE);
    }

    let output = String::from_utf8_lossy(&buffer.lock()).into_owned();
    Ok(Captured { status, output })
}

fn wait_for_exit(child: &mut Child, deadline: Option<Instant>) -> std::io::Result<Option<ExitStatus>> {
    let Some(deadline) = deadline else {
        return child.wait().map(Some);
    };

    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if Instant::now() >= deadline {
            return Ok(None);
        }
        std::thread::sleep(WAIT_POLL_INTERVAL);
    }
}

/// True if every reader hit end of file before `until`
fn wait_for_readers(done: &Receiver<()>, mut pending: usize, until: Instant) -> bool {
    while pending > 0 {
        let left = until.saturating_duration_since(Instant::now());
        match done.recv_timeout(left) {
            Ok(()) => pending -= 1,
            Err(RecvTimeoutError::Disconnected) => return true,
            Err(RecvTimeoutError::Timeout) => return false,
        }
    }
    true
}

fn drain<R>(mut source: R, sink: Arc<Mutex<Vec<u8>>>, done: Sender<()>)
where
    R: Read + Send + 'static,
{
    std::thread::spawn(move || {
        let mut chunk = [0u8; 4096];
        loop {
            match source.read(&mut chunk) {
                Ok(0) => break,
                Ok(n) => sink.lock().extend_from_slice(&chunk[..n]),
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(_) => break,
            }
        }
        let _ = done.send(());
    });
}

/// Result reported when pm2 never produced an exit status
fn failure_result(error: &RunError, search_path: &str) -> CommandResult {
    match error {
        RunError::Spawn(e) => CommandResult::launch_failed(format!(
            "Could not launch pm2: {}. PATH used: {}",
            e, search_path
        )),
        RunError::Wait(e) => {
            CommandResult::launch_failed(format!("Lost track of pm2 after it started: {}", e))
        }
    }
}

/// Real exit code, or 128 + signal for a signalled child (shell convention)
fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }

    1
}
