//! Pluggable sources of burst lengths, I/O waits and the exit-or-I/O choice.
//!
//! The controller owns one [`Policy`]; every worker gets its own
//! [`WorkerPolicy`] carved out of it at launch, so workers never share a
//! random stream across threads.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::{SimConfig, TickRange};
use crate::process::Pid;

/// Decisions a worker makes on its own.
pub trait WorkerPolicy: Send {
    /// Length of the next CPU burst, in ticks (at least 1).
    fn next_burst(&mut self) -> u32;
    /// Called when a burst is exhausted: true to exit, false to request I/O.
    fn exit_after_burst(&mut self) -> bool;
}

/// Decisions the controller makes, plus the factory for worker policies.
pub trait Policy {
    fn worker_policy(&mut self, pid: Pid) -> Box<dyn WorkerPolicy>;
    /// Ticks a process sleeps after requesting I/O (at least 1).
    fn io_wait(&mut self, pid: Pid) -> u32;
}

pub struct RandomPolicy {
    rng: StdRng,
    cpu_burst: TickRange,
    io_wait: TickRange,
    exit_probability: f64,
}

impl RandomPolicy {
    pub fn new(cfg: &SimConfig) -> Self {
        let rng = match cfg.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        RandomPolicy {
            rng,
            cpu_burst: cfg.cpu_burst,
            io_wait: cfg.io_wait,
            exit_probability: cfg.exit_probability,
        }
    }
}

impl Policy for RandomPolicy {
    fn worker_policy(&mut self, _pid: Pid) -> Box<dyn WorkerPolicy> {
        Box::new(RandomWorker {
            rng: StdRng::seed_from_u64(self.rng.gen()),
            cpu_burst: self.cpu_burst,
            exit_probability: self.exit_probability,
        })
    }

    fn io_wait(&mut self, _pid: Pid) -> u32 {
        self.rng.gen_range(self.io_wait.min..=self.io_wait.max)
    }
}

struct RandomWorker {
    rng: StdRng,
    cpu_burst: TickRange,
    exit_probability: f64,
}

impl WorkerPolicy for RandomWorker {
    fn next_burst(&mut self) -> u32 {
        self.rng.gen_range(self.cpu_burst.min..=self.cpu_burst.max)
    }

    fn exit_after_burst(&mut self) -> bool {
        self.rng.gen_bool(self.exit_probability)
    }
}

/// Fixed behavior for one process. Each list is consumed in order and its
/// last value repeats once it runs out.
#[derive(Debug, Clone, Default)]
pub struct Script {
    bursts: Vec<u32>,
    exits: Vec<bool>,
    io_waits: Vec<u32>,
}

impl Script {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs one burst of `ticks` and exits.
    pub fn single_burst(ticks: u32) -> Self {
        Self::new().bursts([ticks]).exits([true])
    }

    pub fn bursts(mut self, bursts: impl IntoIterator<Item = u32>) -> Self {
        self.bursts = bursts.into_iter().collect();
        self
    }

    pub fn exits(mut self, exits: impl IntoIterator<Item = bool>) -> Self {
        self.exits = exits.into_iter().collect();
        self
    }

    pub fn io_waits(mut self, waits: impl IntoIterator<Item = u32>) -> Self {
        self.io_waits = waits.into_iter().collect();
        self
    }
}

fn nth_or_last<T: Copy>(values: &[T], idx: usize, fallback: T) -> T {
    values.get(idx).or_else(|| values.last()).copied().unwrap_or(fallback)
}

/// Deterministic policy driven by one [`Script`] per process.
#[derive(Debug, Clone, Default)]
pub struct ScriptedPolicy {
    scripts: Vec<Script>,
    io_cursor: Vec<usize>,
}

impl ScriptedPolicy {
    pub fn new(scripts: Vec<Script>) -> Self {
        let io_cursor = vec![0; scripts.len()];
        ScriptedPolicy { scripts, io_cursor }
    }

    fn script(&self, pid: Pid) -> Script {
        self.scripts.get(pid.index()).cloned().unwrap_or_default()
    }
}

impl Policy for ScriptedPolicy {
    fn worker_policy(&mut self, pid: Pid) -> Box<dyn WorkerPolicy> {
        let script = self.script(pid);
        Box::new(ScriptedWorker {
            bursts: script.bursts,
            exits: script.exits,
            next_burst: 0,
            next_exit: 0,
        })
    }

    fn io_wait(&mut self, pid: Pid) -> u32 {
        let idx = pid.index();
        if idx >= self.io_cursor.len() {
            self.io_cursor.resize(idx + 1, 0);
        }
        let cursor = self.io_cursor[idx];
        self.io_cursor[idx] += 1;
        let waits = self.scripts.get(idx).map(|s| s.io_waits.as_slice()).unwrap_or(&[]);
        nth_or_last(waits, cursor, 1).max(1)
    }
}

struct ScriptedWorker {
    bursts: Vec<u32>,
    exits: Vec<bool>,
    next_burst: usize,
    next_exit: usize,
}

impl WorkerPolicy for ScriptedWorker {
    fn next_burst(&mut self) -> u32 {
        let burst = nth_or_last(&self.bursts, self.next_burst, 1);
        self.next_burst += 1;
        burst.max(1)
    }

    fn exit_after_burst(&mut self) -> bool {
        let exit = nth_or_last(&self.exits, self.next_exit, true);
        self.next_exit += 1;
        exit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_policy_stays_in_range() {
        let cfg = SimConfig {
            seed: Some(7),
            cpu_burst: TickRange::new(2, 4),
            io_wait: TickRange::new(3, 3),
            ..SimConfig::default()
        };
        let mut policy = RandomPolicy::new(&cfg);
        let mut worker = policy.worker_policy(Pid(0));
        for _ in 0..200 {
            assert!(cfg.cpu_burst.contains(worker.next_burst()));
            assert_eq!(policy.io_wait(Pid(0)), 3);
        }
    }

    #[test]
    fn same_seed_gives_same_workers() {
        let cfg = SimConfig { seed: Some(99), ..SimConfig::default() };
        let mut a = RandomPolicy::new(&cfg);
        let mut b = RandomPolicy::new(&cfg);
        let mut wa = a.worker_policy(Pid(1));
        let mut wb = b.worker_policy(Pid(1));
        for _ in 0..20 {
            assert_eq!(wa.next_burst(), wb.next_burst());
            assert_eq!(wa.exit_after_burst(), wb.exit_after_burst());
        }
    }

    #[test]
    fn exit_probability_extremes_are_honored() {
        for (p, expect) in [(0.0, false), (1.0, true)] {
            let cfg = SimConfig { seed: Some(1), exit_probability: p, ..SimConfig::default() };
            let mut worker = RandomPolicy::new(&cfg).worker_policy(Pid(0));
            assert!((0..50).all(|_| worker.exit_after_burst() == expect));
        }
    }

    #[test]
    fn script_repeats_its_last_value() {
        let mut policy = ScriptedPolicy::new(vec![Script::new()
            .bursts([3, 1])
            .exits([false, false, true])
            .io_waits([2, 4])]);
        let mut worker = policy.worker_policy(Pid(0));
        assert_eq!(worker.next_burst(), 3);
        assert_eq!(worker.next_burst(), 1);
        assert_eq!(worker.next_burst(), 1);
        assert!(!worker.exit_after_burst());
        assert!(!worker.exit_after_burst());
        assert!(worker.exit_after_burst());
        assert_eq!(policy.io_wait(Pid(0)), 2);
        assert_eq!(policy.io_wait(Pid(0)), 4);
        assert_eq!(policy.io_wait(Pid(0)), 4);
    }

    #[test]
    fn unscripted_process_runs_one_tick_and_exits() {
        let mut policy = ScriptedPolicy::new(Vec::new());
        let mut worker = policy.worker_policy(Pid(5));
        assert_eq!(worker.next_burst(), 1);
        assert!(worker.exit_after_burst());
        assert_eq!(policy.io_wait(Pid(5)), 1);
    }
}
