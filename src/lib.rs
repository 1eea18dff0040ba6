//! Round-robin CPU scheduler simulation.
//!
//! A [`Controller`] plays the kernel: it owns the PCB table, the ready queue
//! and the sleep set, and on every timer tick charges the running process,
//! wakes finished sleepers, preempts, and dispatches. Each simulated process
//! is a worker thread that only runs when told to and answers over a
//! channel.
//!
//! ```no_run
//! use rrsim::{Controller, RandomPolicy, SimConfig};
//!
//! let cfg = SimConfig { processes: 4, quantum: 2, ..SimConfig::default() };
//! let policy = RandomPolicy::new(&cfg);
//! let report = Controller::launch(cfg, Box::new(policy))?.run()?;
//! println!("{}", report);
//! # Ok::<(), rrsim::SimError>(())
//! ```

pub mod trace;

pub mod config;
pub mod controller;
pub mod error;
pub mod logger;
pub mod policy;
pub mod process;
pub mod queue;
pub mod rand_generator;
pub mod scheduler;
pub mod stats;
pub mod worker;

pub use config::{ReenqueuePolicy, SimConfig, TickRange};
pub use controller::Controller;
pub use error::{SimError, SimResult};
pub use policy::{Policy, RandomPolicy, Script, ScriptedPolicy, WorkerPolicy};
pub use process::{Pcb, Pid, ProcState};
pub use rand_generator::{RandFilePolicy, RandGenerator};
pub use scheduler::{Scheduler, TickReport, Verdict};
pub use stats::{ProcStats, Report};
