use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use crate::config::{SimConfig, TickRange};
use crate::error::{SimError, SimResult};
use crate::policy::{Policy, WorkerPolicy};
use crate::process::Pid;

/// Replays the numbers of a random file. The first token is the count,
/// the following tokens are the values; the stream wraps around when
/// exhausted.
#[derive(Debug, Clone)]
pub struct RandGenerator {
    pub filename: PathBuf,
    values: Vec<u32>,
    ofs: usize,
}

impl RandGenerator {
    pub fn new(filename: &Path) -> SimResult<Self> {
        let mut contents = String::new();
        File::open(filename)
            .and_then(|mut file| file.read_to_string(&mut contents))
            .map_err(|e| Self::fail(filename, e.to_string()))?;
        Self::from_contents(filename, &contents)
    }

    pub fn from_contents(filename: &Path, contents: &str) -> SimResult<Self> {
        let mut tokens = contents.split_whitespace();
        let count: usize = tokens
            .next()
            .ok_or_else(|| Self::fail(filename, "file is empty".into()))?
            .parse()
            .map_err(|_| Self::fail(filename, "first line must be the value count".into()))?;

        let values = tokens
            .take(count)
            .map(|s| s.parse::<u32>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| Self::fail(filename, e.to_string()))?;
        if values.is_empty() {
            return Err(Self::fail(filename, "no random values".into()));
        }

        Ok(RandGenerator {
            filename: filename.to_path_buf(),
            values,
            ofs: 0,
        })
    }

    fn fail(filename: &Path, reason: String) -> SimError {
        SimError::RandomFile {
            path: filename.to_path_buf(),
            reason,
        }
    }

    pub fn get_rand(&mut self) -> u32 {
        let value = self.values[self.ofs];
        self.ofs = (self.ofs + 1) % self.values.len();
        value
    }

    /// Value in `range`, as `min + rand % span`.
    pub fn pick(&mut self, range: TickRange) -> u32 {
        range.min + self.get_rand() % range.span().max(1)
    }

    /// Independent replay of the same file, starting where the next value
    /// of this stream points.
    pub fn fork(&mut self) -> RandGenerator {
        let start = self.get_rand() as usize % self.values.len();
        RandGenerator {
            filename: self.filename.clone(),
            values: self.values.clone(),
            ofs: start,
        }
    }
}

const CHOICE_SCALE: u32 = 10_000;

fn chooses_exit(generator: &mut RandGenerator, probability: f64) -> bool {
    f64::from(generator.get_rand() % CHOICE_SCALE) < probability * f64::from(CHOICE_SCALE)
}

/// Policy that draws every decision from a random file.
pub struct RandFilePolicy {
    generator: RandGenerator,
    cpu_burst: TickRange,
    io_wait: TickRange,
    exit_probability: f64,
}

impl RandFilePolicy {
    pub fn new(generator: RandGenerator, cfg: &SimConfig) -> Self {
        RandFilePolicy {
            generator,
            cpu_burst: cfg.cpu_burst,
            io_wait: cfg.io_wait,
            exit_probability: cfg.exit_probability,
        }
    }
}

impl Policy for RandFilePolicy {
    fn worker_policy(&mut self, _pid: Pid) -> Box<dyn WorkerPolicy> {
        Box::new(RandFileWorker {
            generator: self.generator.fork(),
            cpu_burst: self.cpu_burst,
            exit_probability: self.exit_probability,
        })
    }

    fn io_wait(&mut self, _pid: Pid) -> u32 {
        self.generator.pick(self.io_wait)
    }
}

struct RandFileWorker {
    generator: RandGenerator,
    cpu_burst: TickRange,
    exit_probability: f64,
}

impl WorkerPolicy for RandFileWorker {
    fn next_burst(&mut self) -> u32 {
        self.generator.pick(self.cpu_burst)
    }

    fn exit_after_burst(&mut self) -> bool {
        chooses_exit(&mut self.generator, self.exit_probability)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn generator(contents: &str) -> RandGenerator {
        RandGenerator::from_contents(Path::new("rfile"), contents).unwrap()
    }

    #[test]
    fn reads_count_then_values_and_wraps() {
        let mut g = generator("3\n10\n20\n30\n40\n");
        assert_eq!(g.get_rand(), 10);
        assert_eq!(g.get_rand(), 20);
        assert_eq!(g.get_rand(), 30);
        assert_eq!(g.get_rand(), 10);
    }

    #[test]
    fn pick_maps_into_range() {
        let mut g = generator("4 0 9 10 23");
        let range = TickRange::new(1, 10);
        let picks: Vec<u32> = (0..4).map(|_| g.pick(range)).collect();
        assert_eq!(picks, vec![1, 10, 1, 4]);
    }

    #[test]
    fn bad_files_are_rejected() {
        for contents in ["", "x 1 2", "0", "2 5 five"] {
            let err = RandGenerator::from_contents(Path::new("rfile"), contents).unwrap_err();
            assert!(matches!(err, SimError::RandomFile { .. }), "{}", contents);
        }
        assert!(RandGenerator::new(Path::new("/nonexistent/rfile")).is_err());
    }

    #[test]
    fn file_policy_is_reproducible() {
        let cfg = SimConfig::default();
        let g = generator("6 17 4 9981 3 42 5000");
        let mut a = RandFilePolicy::new(g.clone(), &cfg);
        let mut b = RandFilePolicy::new(g, &cfg);
        let mut wa = a.worker_policy(Pid(0));
        let mut wb = b.worker_policy(Pid(0));
        for _ in 0..12 {
            let burst = wa.next_burst();
            assert!(cfg.cpu_burst.contains(burst));
            assert_eq!(burst, wb.next_burst());
            assert_eq!(wa.exit_after_burst(), wb.exit_after_burst());
        }
        assert_eq!(a.io_wait(Pid(0)), b.io_wait(Pid(0)));
    }
}
