//! Simulation configuration: defaults, TOML file loading, range parsing and
//! validation.

use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{SimError, SimResult};

pub const DEFAULT_PROCESSES: usize = 10;
/// One thread per process; more than this is refused up front.
pub const MAX_PROCESSES: usize = 4096;
pub const DEFAULT_QUANTUM: u32 = 1;
pub const DEFAULT_CPU_BURST: TickRange = TickRange { min: 1, max: 10 };
pub const DEFAULT_IO_WAIT: TickRange = TickRange { min: 1, max: 5 };
pub const DEFAULT_EXIT_PROBABILITY: f64 = 0.5;
pub const DEFAULT_TICK_MS: u64 = 100;
pub const DEFAULT_REPLY_TIMEOUT_MS: u64 = 1000;

/// Inclusive range of tick counts, written `MIN:MAX` (or `MIN-MAX`) on the
/// command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickRange {
    pub min: u32,
    pub max: u32,
}

impl TickRange {
    pub fn new(min: u32, max: u32) -> Self {
        Self { min, max }
    }

    /// Single-value range, handy for scripted runs.
    pub fn fixed(ticks: u32) -> Self {
        Self::new(ticks, ticks)
    }

    /// Number of values in the range, 0 if it is inverted.
    pub fn span(&self) -> u32 {
        if self.min > self.max {
            return 0;
        }
        (self.max - self.min).saturating_add(1)
    }

    pub fn contains(&self, ticks: u32) -> bool {
        (self.min..=self.max).contains(&ticks)
    }

    fn validate(&self, what: &str) -> SimResult<()> {
        if self.min == 0 {
            return Err(SimError::Config(format!("{} minimum must be at least 1", what)));
        }
        if self.min > self.max {
            return Err(SimError::Config(format!(
                "{} range {} has min > max",
                what, self
            )));
        }
        Ok(())
    }
}

impl fmt::Display for TickRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.min, self.max)
    }
}

impl FromStr for TickRange {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let re = Regex::new(r"^(\d+)\s*[:\-]\s*(\d+)$").map_err(|e| e.to_string())?;
        let caps = re
            .captures(s.trim())
            .ok_or_else(|| format!("invalid range: {}. Must be MIN:MAX", s))?;
        let min = caps[1].parse::<u32>().map_err(|e| e.to_string())?;
        let max = caps[2].parse::<u32>().map_err(|e| e.to_string())?;
        Ok(TickRange { min, max })
    }
}

/// What `enqueue_ready` does with a pid that is already queued.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReenqueuePolicy {
    /// Leave the queue untouched and carry on
    #[default]
    Ignore,
    /// Fail with `SimError::AlreadyQueued`
    Reject,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimConfig {
    pub processes: usize,
    pub quantum: u32,
    pub cpu_burst: TickRange,
    pub io_wait: TickRange,
    pub exit_probability: f64,
    /// Milliseconds between timer ticks; 0 runs ticks back to back.
    pub tick_ms: u64,
    pub reply_timeout_ms: u64,
    pub max_ticks: Option<u64>,
    pub seed: Option<u64>,
    pub reenqueue: ReenqueuePolicy,
}

impl Default for SimConfig {
    fn default() -> Self {
        SimConfig {
            processes: DEFAULT_PROCESSES,
            quantum: DEFAULT_QUANTUM,
            cpu_burst: DEFAULT_CPU_BURST,
            io_wait: DEFAULT_IO_WAIT,
            exit_probability: DEFAULT_EXIT_PROBABILITY,
            tick_ms: DEFAULT_TICK_MS,
            reply_timeout_ms: DEFAULT_REPLY_TIMEOUT_MS,
            max_ticks: None,
            seed: None,
            reenqueue: ReenqueuePolicy::default(),
        }
    }
}

impl SimConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    pub fn load(path: &Path) -> SimResult<Self> {
        let text = fs::read_to_string(path).map_err(|e| SimError::ConfigFile {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Self::from_toml_str(&text).map_err(|e| SimError::ConfigFile {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    pub fn validate(&self) -> SimResult<()> {
        if self.processes == 0 {
            return Err(SimError::Config("need at least one process".into()));
        }
        if self.processes > MAX_PROCESSES {
            return Err(SimError::Config(format!(
                "{} processes requested, at most {} supported",
                self.processes, MAX_PROCESSES
            )));
        }
        if self.quantum == 0 {
            return Err(SimError::Config("time quantum must be at least 1".into()));
        }
        self.cpu_burst.validate("cpu burst")?;
        self.io_wait.validate("io wait")?;
        if !(0.0..=1.0).contains(&self.exit_probability) {
            return Err(SimError::Config(format!(
                "exit probability {} is outside [0, 1]",
                self.exit_probability
            )));
        }
        if self.reply_timeout_ms == 0 {
            return Err(SimError::Config("reply timeout must be at least 1 ms".into()));
        }
        if self.max_ticks == Some(0) {
            return Err(SimError::Config("tick limit must be at least 1".into()));
        }
        Ok(())
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }

    pub fn reply_timeout(&self) -> Duration {
        Duration::from_millis(self.reply_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let cfg = SimConfig::default();
        assert_eq!(cfg.processes, 10);
        assert_eq!(cfg.cpu_burst, TickRange::new(1, 10));
        assert_eq!(cfg.io_wait, TickRange::new(1, 5));
        cfg.validate().unwrap();
    }

    #[test]
    fn ranges_parse_with_colon_or_dash() {
        assert_eq!("2:8".parse::<TickRange>(), Ok(TickRange::new(2, 8)));
        assert_eq!(" 3-3 ".parse::<TickRange>(), Ok(TickRange::fixed(3)));
        assert!("8".parse::<TickRange>().is_err());
        assert!("a:b".parse::<TickRange>().is_err());
        assert!("-1:4".parse::<TickRange>().is_err());
    }

    #[test]
    fn validate_rejects_bad_values() {
        let bad = [
            SimConfig { processes: 0, ..SimConfig::default() },
            SimConfig { processes: MAX_PROCESSES + 1, ..SimConfig::default() },
            SimConfig { processes: usize::MAX, ..SimConfig::default() },
            SimConfig { quantum: 0, ..SimConfig::default() },
            SimConfig { cpu_burst: TickRange::new(5, 2), ..SimConfig::default() },
            SimConfig { io_wait: TickRange::new(0, 2), ..SimConfig::default() },
            SimConfig { exit_probability: 1.5, ..SimConfig::default() },
            SimConfig { reply_timeout_ms: 0, ..SimConfig::default() },
            SimConfig { max_ticks: Some(0), ..SimConfig::default() },
        ];
        for cfg in bad {
            assert!(matches!(cfg.validate(), Err(SimError::Config(_))), "{:?}", cfg);
        }
    }

    #[test]
    fn span_counts_values_and_tolerates_inverted_ranges() {
        assert_eq!(TickRange::new(2, 8).span(), 7);
        assert_eq!(TickRange::fixed(3).span(), 1);
        assert_eq!(TickRange::new(5, 2).span(), 0);
        assert_eq!(TickRange::new(0, u32::MAX).span(), u32::MAX);
    }

    #[test]
    fn default_reenqueue_policy_ignores() {
        assert_eq!(ReenqueuePolicy::default(), ReenqueuePolicy::Ignore);
        assert_eq!(SimConfig::default().reenqueue, ReenqueuePolicy::Ignore);
    }

    #[test]
    fn toml_overrides_only_given_keys() {
        let cfg = SimConfig::from_toml_str(
            r#"
            processes = 4
            quantum = 3
            cpu_burst = { min = 2, max = 6 }
            reenqueue = "reject"
            seed = 42
            "#,
        )
        .unwrap();
        assert_eq!(cfg.processes, 4);
        assert_eq!(cfg.quantum, 3);
        assert_eq!(cfg.cpu_burst, TickRange::new(2, 6));
        assert_eq!(cfg.io_wait, DEFAULT_IO_WAIT);
        assert_eq!(cfg.reenqueue, ReenqueuePolicy::Reject);
        assert_eq!(cfg.seed, Some(42));
    }

    #[test]
    fn toml_rejects_unknown_keys() {
        assert!(SimConfig::from_toml_str("procs = 3").is_err());
    }

    #[test]
    fn missing_config_file_is_reported_with_path() {
        let err = SimConfig::load(Path::new("/nonexistent/rrsim.toml")).unwrap_err();
        assert!(matches!(err, SimError::ConfigFile { .. }));
        assert!(err.to_string().contains("/nonexistent/rrsim.toml"));
    }
}
