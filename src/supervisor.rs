//! Restarts the crawl process until it finishes.
//!
//! The crawl runs as a child process. Progress is judged from the checkpoint
//! file: every unit of work rewrites it, so a file that stops changing means
//! the browser is stuck and the child is killed and started again. The
//! checkpoint lets the new child continue where the old one stopped.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant, SystemTime};

use anyhow::{Context, Result};
use tokio::process::{Child, Command};
use tracing::{debug, error, info, warn};

/// Exit code of a crawl that finished every query.
pub const EXIT_OK: i32 = 0;
/// Exit code of a crawl that failed and may be restarted.
pub const EXIT_FAILURE: i32 = 1;
/// Exit code of a crawl that must not be restarted (attempt ceiling reached).
pub const EXIT_FATAL: i32 = 2;

/// How a child process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildExit {
    Success,
    Fatal,
    /// Non-zero exit, or killed by a signal (`None`).
    Failed(Option<i32>),
    /// Killed by the supervisor for making no progress.
    Stalled,
}

impl ChildExit {
    pub fn from_code(code: Option<i32>) -> Self {
        match code {
            Some(EXIT_OK) => ChildExit::Success,
            Some(EXIT_FATAL) => ChildExit::Fatal,
            other => ChildExit::Failed(other),
        }
    }
}

/// Final result of a supervised run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorOutcome {
    Completed { restarts: u32 },
    Fatal { restarts: u32 },
    GaveUp { restarts: u32 },
}

impl SupervisorOutcome {
    /// Exit code the supervisor itself should return.
    pub fn exit_code(&self) -> i32 {
        match self {
            SupervisorOutcome::Completed { .. } => EXIT_OK,
            SupervisorOutcome::Fatal { .. } => EXIT_FATAL,
            SupervisorOutcome::GaveUp { .. } => EXIT_FAILURE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Restart,
    Stop(SupervisorOutcome),
}

/// What to do after a child exits, given how many restarts already happened.
pub fn decide(exit: ChildExit, restarts: u32, max_restarts: u32) -> Decision {
    match exit {
        ChildExit::Success => Decision::Stop(SupervisorOutcome::Completed { restarts }),
        ChildExit::Fatal => Decision::Stop(SupervisorOutcome::Fatal { restarts }),
        ChildExit::Failed(_) | ChildExit::Stalled if restarts >= max_restarts => {
            Decision::Stop(SupervisorOutcome::GaveUp { restarts })
        }
        ChildExit::Failed(_) | ChildExit::Stalled => Decision::Restart,
    }
}

/// Tracks the checkpoint's modification time.
#[derive(Debug)]
pub struct ProgressWatch {
    path: PathBuf,
    last_seen: Option<SystemTime>,
    last_change: Instant,
}

impl ProgressWatch {
    pub fn new(path: impl Into<PathBuf>, now: Instant) -> Self {
        let path = path.into();
        let last_seen = modified(&path);
        Self {
            path,
            last_seen,
            last_change: now,
        }
    }

    /// Record the current mtime; returns how long ago progress was last seen.
    pub fn poll(&mut self, now: Instant) -> Duration {
        let current = modified(&self.path);
        if current != self.last_seen {
            debug!("Checkpoint {} changed", self.path.display());
            self.last_seen = current;
            self.last_change = now;
        }
        now.saturating_duration_since(self.last_change)
    }

    pub fn is_stalled(&mut self, now: Instant, timeout: Duration) -> bool {
        self.poll(now) >= timeout
    }
}

fn modified(path: &std::path::Path) -> Option<SystemTime> {
    std::fs::metadata(path).and_then(|m| m.modified()).ok()
}

/// Supervisor settings.
#[derive(Debug, Clone)]
pub struct SupervisorOptions {
    /// Executable to run, normally the current `jobcrawl` binary.
    pub program: PathBuf,
    pub args: Vec<String>,
    /// Checkpoint file watched for progress.
    pub state_file: PathBuf,
    pub stall_timeout: Duration,
    pub max_restarts: u32,
    pub poll_interval: Duration,
    pub restart_delay: Duration,
}

impl SupervisorOptions {
    pub fn new(program: impl Into<PathBuf>, state_file: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            state_file: state_file.into(),
            stall_timeout: Duration::from_secs(600),
            max_restarts: 20,
            poll_interval: Duration::from_secs(5),
            restart_delay: Duration::from_secs(10),
        }
    }
}

/// Run the child until it succeeds, fails fatally or the restart limit is hit.
pub async fn supervise(options: &SupervisorOptions) -> Result<SupervisorOutcome> {
    let mut restarts = 0;
    loop {
        info!(
            "Starting crawl process (run {}): {} {}",
            restarts + 1,
            options.program.display(),
            options.args.join(" ")
        );
        let child = Command::new(&options.program)
            .args(&options.args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("Failed to start {}", options.program.display()))?;

        let exit = watch(child, options).await?;
        match decide(exit, restarts, options.max_restarts) {
            Decision::Stop(outcome) => {
                match outcome {
                    SupervisorOutcome::Completed { .. } => info!("Crawl finished"),
                    SupervisorOutcome::Fatal { .. } => {
                        error!("Crawl stopped with a fatal error, not restarting")
                    }
                    SupervisorOutcome::GaveUp { restarts } => {
                        error!("Giving up after {} restarts", restarts)
                    }
                }
                return Ok(outcome);
            }
            Decision::Restart => {
                restarts += 1;
                warn!(
                    "Crawl process ended with {:?}; restarting in {:?} ({}/{})",
                    exit, options.restart_delay, restarts, options.max_restarts
                );
                tokio::time::sleep(options.restart_delay).await;
            }
        }
    }
}

async fn watch(mut child: Child, options: &SupervisorOptions) -> Result<ChildExit> {
    let mut progress = ProgressWatch::new(&options.state_file, Instant::now());
    let mut ticker = tokio::time::interval(options.poll_interval);

    loop {
        tokio::select! {
            status = child.wait() => {
                let status = status.context("Failed to wait for crawl process")?;
                return Ok(ChildExit::from_code(status.code()));
            }
            _ = ticker.tick() => {
                if progress.is_stalled(Instant::now(), options.stall_timeout) {
                    warn!(
                        "No checkpoint progress for {:?}, killing crawl process",
                        options.stall_timeout
                    );
                    child.kill().await.context("Failed to kill crawl process")?;
                    return Ok(ChildExit::Stalled);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_child_exit_from_code() {
        assert_eq!(ChildExit::from_code(Some(0)), ChildExit::Success);
        assert_eq!(ChildExit::from_code(Some(2)), ChildExit::Fatal);
        assert_eq!(ChildExit::from_code(Some(1)), ChildExit::Failed(Some(1)));
        assert_eq!(ChildExit::from_code(None), ChildExit::Failed(None));
    }

    #[test]
    fn test_decide() {
        assert_eq!(
            decide(ChildExit::Success, 3, 5),
            Decision::Stop(SupervisorOutcome::Completed { restarts: 3 })
        );
        assert_eq!(
            decide(ChildExit::Fatal, 0, 5),
            Decision::Stop(SupervisorOutcome::Fatal { restarts: 0 })
        );
        assert_eq!(decide(ChildExit::Failed(Some(1)), 4, 5), Decision::Restart);
        assert_eq!(decide(ChildExit::Stalled, 0, 5), Decision::Restart);
        assert_eq!(
            decide(ChildExit::Stalled, 5, 5),
            Decision::Stop(SupervisorOutcome::GaveUp { restarts: 5 })
        );
    }

    #[test]
    fn test_outcome_exit_codes() {
        assert_eq!(SupervisorOutcome::Completed { restarts: 1 }.exit_code(), 0);
        assert_eq!(SupervisorOutcome::Fatal { restarts: 0 }.exit_code(), 2);
        assert_eq!(SupervisorOutcome::GaveUp { restarts: 9 }.exit_code(), 1);
    }

    #[test]
    fn test_progress_watch_detects_stall_and_change() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");
        let start = Instant::now();
        let mut watch = ProgressWatch::new(&path, start);

        let later = start + Duration::from_secs(30);
        assert!(watch.is_stalled(later, Duration::from_secs(10)));

        std::fs::write(&path, "{}").unwrap();
        assert_eq!(watch.poll(later), Duration::ZERO);
        assert!(!watch.is_stalled(later + Duration::from_secs(5), Duration::from_secs(10)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_supervise_stops_on_fatal_exit() {
        let dir = TempDir::new().unwrap();
        let mut options = SupervisorOptions::new("sh", dir.path().join("state.json"));
        options.args = vec!["-c".to_string(), "exit 2".to_string()];
        options.restart_delay = Duration::ZERO;

        let outcome = supervise(&options).await.unwrap();
        assert_eq!(outcome, SupervisorOutcome::Fatal { restarts: 0 });
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_supervise_gives_up_after_max_restarts() {
        let dir = TempDir::new().unwrap();
        let mut options = SupervisorOptions::new("sh", dir.path().join("state.json"));
        options.args = vec!["-c".to_string(), "exit 1".to_string()];
        options.restart_delay = Duration::ZERO;
        options.max_restarts = 2;

        let outcome = supervise(&options).await.unwrap();
        assert_eq!(outcome, SupervisorOutcome::GaveUp { restarts: 2 });
    }
}
