//! Bookkeeping for pipelines launched in the background.

use std::fs;
use std::process::Child;
use tracing::{debug, warn};

/// A process launched as part of a background pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub pid: u32,
    pub command_line: String,
}

/// Identifiers of background processes, in registration order.
///
/// Entries are never removed: a job whose process already exited is still
/// listed. Child handles handed over with [`JobTable::adopt`] are kept
/// separately so that finished processes can be reaped without touching the
/// listing.
#[derive(Debug, Default)]
pub struct JobTable {
    jobs: Vec<Job>,
    unreaped: Vec<Child>,
}

impl JobTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry for `pid`.
    pub fn register(&mut self, pid: u32, command_line: impl Into<String>) {
        let command_line = command_line.into();
        debug!(pid, %command_line, "registered background job");
        self.jobs.push(Job { pid, command_line });
    }

    /// Register a background child and keep its handle for reaping.
    pub fn adopt(&mut self, child: Child, command_line: &str) -> u32 {
        let pid = child.id();
        self.register(pid, command_line);
        self.unreaped.push(child);
        pid
    }

    /// Keep a child only for reaping; it does not show up in [`list`](Self::list).
    pub(crate) fn orphan(&mut self, child: Child) {
        debug!(pid = child.id(), "left partially launched stage running");
        self.unreaped.push(child);
    }

    /// All registered jobs, oldest first.
    pub fn list(&self) -> &[Job] {
        &self.jobs
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Collect the exit status of every kept child that has finished.
    ///
    /// Returns how many children were reaped. Never blocks.
    pub fn reap(&mut self) -> usize {
        let before = self.unreaped.len();
        self.unreaped.retain_mut(|child| match child.try_wait() {
            Ok(Some(status)) => {
                debug!(pid = child.id(), %status, "reaped background process");
                false
            }
            Ok(None) => true,
            Err(e) => {
                warn!(pid = child.id(), error = %e, "cannot poll background process");
                false
            }
        });
        before - self.unreaped.len()
    }
}

/// Best-effort human-readable name of a running process.
///
/// Reads `/proc/<pid>/comm`; returns an empty string when the process is gone
/// or the platform has no such file.
pub fn process_label(pid: u32) -> String {
    fs::read_to_string(format!("/proc/{pid}/comm"))
        .map(|comm| comm.trim_end().to_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::process::Command;
    use std::thread;
    use std::time::{Duration, Instant};

    #[test]
    fn jobs_are_listed_in_registration_order() {
        let mut jobs = JobTable::new();
        assert!(jobs.is_empty());

        jobs.register(42, "sleep 10 &");
        jobs.register(7, "cat | wc &");

        assert_eq!(jobs.len(), 2);
        assert_eq!(
            jobs.list(),
            &[
                Job { pid: 42, command_line: "sleep 10 &".into() },
                Job { pid: 7, command_line: "cat | wc &".into() },
            ]
        );
    }

    #[test]
    fn reaping_keeps_finished_jobs_listed() {
        let mut jobs = JobTable::new();
        let child = Command::new("true").spawn().expect("spawn true");
        let pid = jobs.adopt(child, "true &");

        let deadline = Instant::now() + Duration::from_secs(5);
        let mut reaped = 0;
        while reaped == 0 && Instant::now() < deadline {
            reaped = jobs.reap();
            thread::sleep(Duration::from_millis(10));
        }

        assert_eq!(reaped, 1);
        assert_eq!(jobs.reap(), 0);
        assert_eq!(jobs.list(), &[Job { pid, command_line: "true &".into() }]);
    }

    #[test]
    fn orphans_are_reaped_but_not_listed() {
        let mut jobs = JobTable::new();
        let mut child = Command::new("true").spawn().expect("spawn true");
        child.wait().expect("wait true");
        jobs.orphan(child);

        assert!(jobs.is_empty());
        assert_eq!(jobs.reap(), 1);
    }

    #[test]
    #[cfg(target_os = "linux")]
    fn label_of_live_and_missing_processes() {
        let mut child = Command::new("sleep").arg("5").spawn().expect("spawn sleep");
        assert_eq!(process_label(child.id()), "sleep");
        child.kill().ok();
        child.wait().ok();

        assert_eq!(process_label(u32::MAX), "");
    }
}
