//! Error type shared by configuration, launch and the scheduling loop.

use std::fmt;
use std::io;
use std::path::PathBuf;

use crate::process::Pid;

/// Everything that can stop a simulation run.
///
/// Empty ready queues, quantum exhaustion and I/O completion are ordinary
/// scheduling events and never show up here.
#[derive(Debug)]
pub enum SimError {
    /// Rejected option value, reported before any worker exists
    Config(String),
    /// TOML configuration file could not be read or parsed
    ConfigFile { path: PathBuf, reason: String },
    /// Random-number file could not be read or holds no values
    RandomFile { path: PathBuf, reason: String },
    /// Worker thread could not be spawned
    Launch { pid: Pid, source: io::Error },
    /// Worker channel closed while the process was still live
    WorkerLost(Pid),
    /// Worker did not answer a `Run` within the reply timeout
    WorkerUnresponsive(Pid),
    /// Pid is already waiting in the ready queue
    AlreadyQueued(Pid),
    /// Ready queue has no free slot
    QueueFull,
    /// Tick limit reached with live processes left
    TickLimit(u64),
    /// Scheduler bookkeeping no longer adds up
    Invariant(String),
}

impl fmt::Display for SimError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "invalid configuration: {}", msg),
            Self::ConfigFile { path, reason } => {
                write!(f, "config file {}: {}", path.display(), reason)
            }
            Self::RandomFile { path, reason } => {
                write!(f, "random file {}: {}", path.display(), reason)
            }
            Self::Launch { pid, source } => write!(f, "failed to launch {}: {}", pid, source),
            Self::WorkerLost(pid) => write!(f, "worker {} disappeared", pid),
            Self::WorkerUnresponsive(pid) => write!(f, "worker {} did not answer in time", pid),
            Self::AlreadyQueued(pid) => write!(f, "{} is already in the ready queue", pid),
            Self::QueueFull => write!(f, "ready queue overflow"),
            Self::TickLimit(ticks) => {
                write!(f, "tick limit of {} reached before all processes finished", ticks)
            }
            Self::Invariant(msg) => write!(f, "scheduler invariant broken: {}", msg),
        }
    }
}

impl std::error::Error for SimError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Launch { source, .. } => Some(source),
            _ => None,
        }
    }
}

pub type SimResult<T> = Result<T, SimError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_process() {
        let err = SimError::WorkerUnresponsive(Pid(3));
        assert_eq!(err.to_string(), "worker P3 did not answer in time");

        let err = SimError::Launch {
            pid: Pid(0),
            source: io::Error::new(io::ErrorKind::Other, "no threads left"),
        };
        assert!(err.to_string().contains("P0"));
        assert!(std::error::Error::source(&err).is_some());
    }
}
