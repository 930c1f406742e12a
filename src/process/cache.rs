use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::model::{parse_jlist, ProcessSnapshot};
use crate::error::SnapshotError;
use crate::supervisor::{CommandInvocation, CommandResult, Supervisor};

/// Latest view of `pm2 jlist`. Each refresh builds a new snapshot and swaps
/// it in whole; readers hold on to the `Arc` they were given.
pub struct ProcessListCache {
    supervisor: Arc<dyn Supervisor>,
    latest: RwLock<Arc<ProcessSnapshot>>,
    // Held for the whole of a refresh so two never overlap
    refresh_gate: Mutex<()>,
}

impl ProcessListCache {
    pub fn new(supervisor: Arc<dyn Supervisor>) -> Self {
        Self {
            supervisor,
            latest: RwLock::new(Arc::new(ProcessSnapshot::loaded(Vec::new()))),
            refresh_gate: Mutex::new(()),
        }
    }

    /// Query pm2 and replace the snapshot. Blocks on the subprocess, and on
    /// any refresh already in flight.
    pub fn refresh(&self) -> Arc<ProcessSnapshot> {
        let _gate = self.refresh_gate.lock();

        let result = self.supervisor.execute(&CommandInvocation::new(["jlist"]));
        let snapshot = Arc::new(snapshot_from(result));

        match snapshot.error() {
            None => debug!("Process list refreshed: {} processes", snapshot.len()),
            Some(e) => warn!("Process list refresh failed: {}", e),
        }

        *self.latest.write() = snapshot.clone();
        snapshot
    }

    /// Last snapshot produced, without polling
    pub fn latest(&self) -> Arc<ProcessSnapshot> {
        self.latest.read().clone()
    }
}

fn snapshot_from(result: CommandResult) -> ProcessSnapshot {
    if result.is_launch_failure() {
        return ProcessSnapshot::failed(SnapshotError::Launch {
            message: result.output,
        });
    }
    if result.is_timeout() {
        return ProcessSnapshot::failed(SnapshotError::TimedOut {
            message: result.output,
        });
    }
    if !result.success() {
        return ProcessSnapshot::failed(SnapshotError::Exit {
            code: result.exit_code,
            output: result.output,
        });
    }

    match parse_jlist(&result.output) {
        Ok(records) => {
            info!("Parsed {} processes from pm2", records.len());
            ProcessSnapshot::loaded(records)
        }
        Err(e) => {
            let preview: String = result.output.chars().take(200).collect();
            debug!("Unparseable jlist output: {}", preview);
            ProcessSnapshot::failed(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::ProcessStatus;
    use crate::supervisor::testing::StubSupervisor;
    use std::time::Duration;

    const JLIST: &str = r#"[
        {"name":"api","pm_id":0,"pm2_env":{"status":"online"}},
        {"name":"worker","pm_id":1,"pm2_env":{"status":"stopped"}},
        {"name":"cron","pm_id":2,"pm2_env":{"status":"errored"}}
    ]"#;

    fn cache_with(stub: Arc<StubSupervisor>) -> ProcessListCache {
        ProcessListCache::new(stub)
    }

    #[test]
    fn test_refresh_runs_jlist() {
        let stub = Arc::new(StubSupervisor::always(CommandResult::new(0, "[]")));
        let cache = cache_with(stub.clone());
        cache.refresh();
        assert_eq!(stub.calls(), vec![CommandInvocation::new(["jlist"])]);
    }

    #[test]
    fn test_valid_jlist_matches_input() {
        let stub = Arc::new(StubSupervisor::always(CommandResult::new(0, JLIST)));
        let cache = cache_with(stub);

        let snapshot = cache.refresh();
        assert!(snapshot.is_ok());

        let got: Vec<(&str, ProcessStatus, Option<u64>)> = snapshot
            .records()
            .iter()
            .map(|r| (r.name.as_str(), r.status, r.pm_id()))
            .collect();
        assert_eq!(
            got,
            vec![
                ("api", ProcessStatus::Online, Some(0)),
                ("worker", ProcessStatus::Stopped, Some(1)),
                ("cron", ProcessStatus::Errored, Some(2)),
            ]
        );
        assert_eq!(cache.latest(), snapshot);
    }

    #[test]
    fn test_not_json_is_parse_error() {
        let stub = Arc::new(StubSupervisor::always(CommandResult::new(0, "not json")));
        let snapshot = cache_with(stub).refresh();

        assert!(matches!(snapshot.error(), Some(SnapshotError::Parse { .. })));
        assert_eq!(snapshot.len(), 0);
    }

    #[test]
    fn test_launch_failure_does_not_keep_stale_records() {
        let stub = Arc::new(StubSupervisor::default());
        stub.push(CommandResult::new(0, JLIST));
        stub.push(CommandResult::launch_failed("any message"));
        let cache = cache_with(stub);

        assert_eq!(cache.refresh().len(), 3);

        let snapshot = cache.refresh();
        assert_eq!(
            snapshot.error(),
            Some(&SnapshotError::Launch {
                message: "any message".into()
            })
        );
        assert!(snapshot.is_empty());
        assert!(cache.latest().is_empty());
    }

    #[test]
    fn test_nonzero_exit_and_timeout_are_errors() {
        let stub = Arc::new(StubSupervisor::default());
        stub.push(CommandResult::new(7, "supervisor said no"));
        stub.push(CommandResult::timed_out(Duration::from_secs(60), ""));
        let cache = cache_with(stub);

        assert_eq!(
            cache.refresh().error(),
            Some(&SnapshotError::Exit {
                code: 7,
                output: "supervisor said no".into()
            })
        );
        assert!(matches!(
            cache.refresh().error(),
            Some(SnapshotError::TimedOut { .. })
        ));
    }

    #[test]
    fn test_latest_before_first_refresh_is_empty() {
        let stub = Arc::new(StubSupervisor::default());
        let cache = cache_with(stub.clone());
        let snapshot = cache.latest();
        assert!(snapshot.is_ok());
        assert!(snapshot.is_empty());
        assert!(stub.calls().is_empty());
    }

    #[test]
    fn test_concurrent_refreshes_do_not_overlap() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        struct SlowSupervisor {
            in_flight: AtomicUsize,
            max_seen: AtomicUsize,
        }

        impl Supervisor for SlowSupervisor {
            fn execute(&self, _: &CommandInvocation) -> CommandResult {
                let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                self.max_seen.fetch_max(now, Ordering::SeqCst);
                std::thread::sleep(Duration::from_millis(20));
                self.in_flight.fetch_sub(1, Ordering::SeqCst);
                CommandResult::new(0, "[]")
            }
        }

        let slow = Arc::new(SlowSupervisor {
            in_flight: AtomicUsize::new(0),
            max_seen: AtomicUsize::new(0),
        });
        let cache = Arc::new(ProcessListCache::new(slow.clone()));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let cache = cache.clone();
                std::thread::spawn(move || cache.refresh())
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(slow.max_seen.load(Ordering::SeqCst), 1);
    }
}
