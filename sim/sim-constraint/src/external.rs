//! External motion input: a supervised update command and the move file
//! it writes.

use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use sim_types::{Result, SimError};
use tracing::{debug, warn};

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// A shell command run with a deadline.
///
/// A run that exits unsuccessfully or outlives its timeout is killed and
/// retried; after the last retry the failure is an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupervisedCommand {
    command: String,
    timeout: Duration,
    retries: u32,
}

impl SupervisedCommand {
    /// Create a command with a 60 s timeout and no retries.
    #[must_use]
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            timeout: Duration::from_secs(60),
            retries: 0,
        }
    }

    /// Set the timeout of one attempt.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set how many times a failed attempt is repeated.
    #[must_use]
    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    /// The command line.
    #[must_use]
    pub fn command(&self) -> &str {
        &self.command
    }

    /// Run until one attempt succeeds.
    pub fn run(&self) -> Result<()> {
        let mut reason = String::new();
        for attempt in 0..=self.retries {
            match self.attempt() {
                Ok(()) => {
                    debug!(command = %self.command, attempt, "update command finished");
                    return Ok(());
                }
                Err(failure) => {
                    warn!(command = %self.command, attempt, %failure, "update command failed");
                    reason = failure;
                }
            }
        }
        Err(SimError::ExternalCommand {
            command: self.command.clone(),
            reason,
        })
    }

    fn spawn(&self) -> std::io::Result<Child> {
        #[cfg(unix)]
        let mut command = {
            let mut c = Command::new("sh");
            c.arg("-c").arg(&self.command);
            c
        };
        #[cfg(not(unix))]
        let mut command = {
            let mut c = Command::new("cmd");
            c.arg("/C").arg(&self.command);
            c
        };
        command
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
    }

    fn attempt(&self) -> std::result::Result<(), String> {
        let mut child = self.spawn().map_err(|e| format!("cannot start: {e}"))?;
        let started = Instant::now();
        loop {
            match child.try_wait() {
                Ok(Some(status)) if status.success() => return Ok(()),
                Ok(Some(status)) => return Err(format!("exited with {status}")),
                Ok(None) if started.elapsed() >= self.timeout => {
                    // The child may have exited between the poll and the kill
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(format!("timed out after {:?}", self.timeout));
                }
                Ok(None) => thread::sleep(POLL_INTERVAL),
                Err(e) => return Err(format!("cannot wait: {e}")),
            }
        }
    }
}

/// Velocity and angular velocity read from a move file.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MoveTarget {
    /// Imposed velocity.
    pub velocity: Vector3<f64>,
    /// Imposed angular velocity.
    pub omega: Vector3<f64>,
}

impl MoveTarget {
    /// Parse the first six whitespace-separated scalars.
    pub fn parse(text: &str) -> std::result::Result<Self, String> {
        let mut values = [0.0; 6];
        let mut tokens = text.split_whitespace();
        for (i, value) in values.iter_mut().enumerate() {
            let token = tokens
                .next()
                .ok_or_else(|| format!("expected 6 values, found {i}"))?;
            *value = token
                .parse()
                .map_err(|_| format!("value {} ('{token}') is not a number", i + 1))?;
        }
        Ok(Self {
            velocity: Vector3::new(values[0], values[1], values[2]),
            omega: Vector3::new(values[3], values[4], values[5]),
        })
    }

    /// Read a move file.
    pub fn read(path: &Path) -> Result<Self> {
        let move_file = |reason: String| SimError::MoveFile {
            path: path.display().to_string(),
            reason,
        };
        let text = std::fs::read_to_string(path).map_err(|e| move_file(e.to_string()))?;
        Self::parse(&text).map_err(move_file)
    }
}

/// Where the target comes from and when it is refreshed.
#[derive(Debug, Clone)]
pub struct MoveSource {
    path: PathBuf,
    command: Option<SupervisedCommand>,
    interval: f64,
    cached: Option<MoveTarget>,
    last_run: Option<f64>,
}

impl MoveSource {
    /// Read `path` every step.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            command: None,
            interval: 0.0,
            cached: None,
            last_run: None,
        }
    }

    /// Run `command` before rereading the file.
    #[must_use]
    pub fn with_command(mut self, command: SupervisedCommand) -> Self {
        self.command = Some(command);
        self
    }

    /// Refresh only when simulation time crosses a multiple of `interval`.
    #[must_use]
    pub fn with_interval(mut self, interval: f64) -> Self {
        self.interval = interval;
        self
    }

    /// The move file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the step ending at `time` refreshes the target.
    #[must_use]
    pub fn is_update(&self, time: f64, dt: f64) -> bool {
        if self.interval <= 0.0 {
            return true;
        }
        (time / self.interval).floor() > ((time - dt) / self.interval).floor()
    }

    /// The target for the step ending at `time`.
    ///
    /// The command runs at most once per update time; the file is reread on
    /// every update and whenever no target is cached yet.
    pub fn target(&mut self, time: f64, dt: f64) -> Result<MoveTarget> {
        let update = self.is_update(time, dt);
        if update && self.last_run != Some(time) {
            if let Some(command) = &self.command {
                command.run()?;
            }
            self.last_run = Some(time);
            self.cached = None;
        }
        match self.cached {
            Some(target) => Ok(target),
            None => {
                let target = MoveTarget::read(&self.path)?;
                self.cached = Some(target);
                Ok(target)
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_first_six_values() {
        let target = MoveTarget::parse("1 2 3\n4 5 6\n7 8").unwrap();
        assert_eq!(target.velocity, Vector3::new(1.0, 2.0, 3.0));
        assert_eq!(target.omega, Vector3::new(4.0, 5.0, 6.0));
    }

    #[test]
    fn test_parse_errors() {
        assert!(MoveTarget::parse("1 2 3").unwrap_err().contains("found 3"));
        assert!(MoveTarget::parse("1 2 x 4 5 6").unwrap_err().contains("'x'"));
    }

    #[test]
    fn test_missing_file() {
        let err = MoveTarget::read(Path::new("/nonexistent/move.txt")).unwrap_err();
        assert!(matches!(err, SimError::MoveFile { .. }));
    }

    #[test]
    fn test_interval_ticks() {
        let source = MoveSource::new("unused").with_interval(0.1);
        assert!(!source.is_update(0.05, 0.01));
        assert!(source.is_update(0.1, 0.01));
        assert!(!source.is_update(0.15, 0.01));
        assert!(MoveSource::new("unused").is_update(0.15, 0.01));
    }

    #[test]
    fn test_target_is_cached_between_updates() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "1 0 0 0 0 1").unwrap();
        let mut source = MoveSource::new(file.path()).with_interval(1.0);

        assert_eq!(source.target(0.5, 0.1).unwrap().velocity.x, 1.0);
        std::fs::write(file.path(), "2 0 0 0 0 1").unwrap();
        // not an update step: cached value
        assert_eq!(source.target(0.6, 0.1).unwrap().velocity.x, 1.0);
        // crosses t = 1
        assert_eq!(source.target(1.0, 0.1).unwrap().velocity.x, 2.0);
    }

    #[cfg(unix)]
    #[test]
    fn test_command_success_and_failure() {
        assert!(SupervisedCommand::new("true").run().is_ok());
        let err = SupervisedCommand::new("exit 3").with_retries(2).run().unwrap_err();
        assert!(matches!(err, SimError::ExternalCommand { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn test_command_timeout_kills() {
        let started = Instant::now();
        let err = SupervisedCommand::new("sleep 10")
            .with_timeout(Duration::from_millis(100))
            .run()
            .unwrap_err();
        assert!(err.to_string().contains("timed out"));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[cfg(unix)]
    #[test]
    fn test_command_runs_before_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("move.txt");
        let command = SupervisedCommand::new(format!("echo 0 0 7 0 0 0 > {}", path.display()));
        let mut source = MoveSource::new(&path).with_command(command);
        assert_eq!(source.target(0.1, 0.1).unwrap().velocity.z, 7.0);
    }
}
