//! Round-robin state machine over the PCB table, the ready queue and the
//! sleep set.
//!
//! Nothing in here knows about threads or channels. The controller calls the
//! phases of a tick in order (`advance_clock`, `tick_sleep_set`,
//! `charge_running`, `reset_quanta_if_spent`, `dispatch`) and forwards the
//! resulting decisions to the workers.

use log::debug;

use crate::config::{ReenqueuePolicy, SimConfig};
use crate::error::{SimError, SimResult};
use crate::process::{Pcb, PcbTable, Pid, ProcState};
use crate::queue::{ReadyQueue, SleepSet};
use crate::stats::Report;
use crate::worker::Reply;

/// What happened to the running process when it was charged a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Burst and quantum both left, keeps the CPU
    Continue,
    /// Quantum exhausted, back to the tail of the ready queue
    Preempted,
    /// Asked for I/O, sleeping for `io_wait` ticks
    Blocked { io_wait: u32 },
    /// Process finished
    Exited,
}

/// Everything that happened during one tick.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    pub tick: u64,
    /// Sleepers whose I/O completed, in the order they were re-queued
    pub woken: Vec<Pid>,
    pub charged: Option<(Pid, Verdict)>,
    pub quantum_reset: bool,
    pub dispatched: Option<Pid>,
    /// Every process is done; no further ticks
    pub halted: bool,
}

pub struct Scheduler {
    table: PcbTable,
    ready: ReadyQueue,
    sleeping: SleepSet,
    running: Option<Pid>,
    tick: u64,
    quantum: u32,
    reenqueue: ReenqueuePolicy,
    quantum_resets: u32,
}

impl Scheduler {
    /// Creates all PCBs at tick 0 and queues them in pid order.
    pub fn new(cfg: &SimConfig) -> SimResult<Self> {
        cfg.validate()?;
        let mut sched = Scheduler {
            table: PcbTable::new(cfg.processes, cfg.quantum),
            ready: ReadyQueue::with_capacity(cfg.processes),
            sleeping: SleepSet::new(),
            running: None,
            tick: 0,
            quantum: cfg.quantum,
            reenqueue: cfg.reenqueue,
            quantum_resets: 0,
        };
        for pid in sched.table.pids().collect::<Vec<_>>() {
            sched.enqueue_ready(pid)?;
        }
        Ok(sched)
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn running(&self) -> Option<Pid> {
        self.running
    }

    pub fn pcb(&self, pid: Pid) -> &Pcb {
        self.table.get(pid)
    }

    pub fn table(&self) -> &PcbTable {
        &self.table
    }

    pub fn ready_queue(&self) -> &ReadyQueue {
        &self.ready
    }

    pub fn sleep_set(&self) -> &SleepSet {
        &self.sleeping
    }

    pub fn quantum_resets(&self) -> u32 {
        self.quantum_resets
    }

    pub fn done_count(&self) -> usize {
        self.table.count_in(ProcState::Done)
    }

    pub fn all_done(&self) -> bool {
        self.table.all_done()
    }

    pub fn advance_clock(&mut self) -> u64 {
        self.tick += 1;
        self.tick
    }

    /// Puts `pid` at the tail of the ready queue.
    ///
    /// Returns `Ok(false)` when nothing changed: the process is done, or it
    /// is already queued and the re-enqueue policy is `Ignore`.
    pub fn enqueue_ready(&mut self, pid: Pid) -> SimResult<bool> {
        if self.table.get(pid).is_done() {
            return Ok(false);
        }
        if self.ready.contains(pid) {
            return match self.reenqueue {
                ReenqueuePolicy::Ignore => {
                    debug!("{} already queued, ignoring", pid);
                    Ok(false)
                }
                ReenqueuePolicy::Reject => Err(SimError::AlreadyQueued(pid)),
            };
        }
        self.ready.push(pid)?;
        self.sleeping.remove(pid);
        if self.running == Some(pid) {
            self.running = None;
        }

        let tick = self.tick;
        let pcb = self.table.get_mut(pid);
        pcb.state = ProcState::Ready;
        pcb.ready_since = tick;
        pcb.times_enqueued += 1;
        Ok(true)
    }

    /// Pops the head of the ready queue and books the time it waited there.
    pub fn dequeue_ready(&mut self) -> Option<Pid> {
        while let Some(pid) = self.ready.pop() {
            let tick = self.tick;
            let pcb = self.table.get_mut(pid);
            if pcb.is_done() {
                continue;
            }
            let waited = tick - pcb.ready_since;
            pcb.wait_ticks += waited;
            pcb.longest_wait = pcb.longest_wait.max(waited);
            return Some(pid);
        }
        None
    }

    pub fn enqueue_sleep(&mut self, pid: Pid, ticks: u32) -> bool {
        if self.table.get(pid).is_done() {
            return false;
        }
        self.ready.remove(pid);
        if self.running == Some(pid) {
            self.running = None;
        }
        let pcb = self.table.get_mut(pid);
        pcb.state = ProcState::Sleeping;
        pcb.io_wait = ticks;
        self.sleeping.insert(pid);
        true
    }

    /// Counts every sleeper down by one tick. Those reaching zero move to
    /// the ready queue and are returned in scan order.
    pub fn tick_sleep_set(&mut self) -> SimResult<Vec<Pid>> {
        let mut expired = Vec::new();
        let table = &mut self.table;
        self.sleeping.retain(|&pid| {
            let pcb = table.get_mut(pid);
            if pcb.is_done() {
                return false;
            }
            pcb.io_wait = pcb.io_wait.saturating_sub(1);
            if pcb.io_wait == 0 {
                expired.push(pid);
                return false;
            }
            true
        });
        for &pid in &expired {
            self.enqueue_ready(pid)?;
        }
        Ok(expired)
    }

    /// Charges the running process one tick given its worker's reply.
    /// `io_wait` is only consulted when the process asks for I/O.
    pub fn charge_running(
        &mut self,
        reply: Reply,
        io_wait: impl FnOnce(Pid) -> u32,
    ) -> SimResult<Option<(Pid, Verdict)>> {
        let pid = match self.running {
            Some(pid) => pid,
            None => return Ok(None),
        };

        let pcb = self.table.get_mut(pid);
        pcb.quantum = pcb.quantum.saturating_sub(1);
        let quantum_left = pcb.quantum;

        let verdict = match reply {
            Reply::Exited => {
                pcb.last_burst_seen = Some(0);
                self.finish(pid);
                Verdict::Exited
            }
            Reply::IoRequest => {
                pcb.last_burst_seen = Some(0);
                let ticks = io_wait(pid).max(1);
                self.enqueue_sleep(pid, ticks);
                Verdict::Blocked { io_wait: ticks }
            }
            Reply::Ran { remaining } => {
                pcb.last_burst_seen = Some(remaining);
                if quantum_left == 0 {
                    self.running = None;
                    self.enqueue_ready(pid)?;
                    Verdict::Preempted
                } else {
                    Verdict::Continue
                }
            }
        };
        Ok(Some((pid, verdict)))
    }

    /// Marks `pid` done and drops it from every queue.
    ///
    /// Returns false, changing nothing, if it was already done.
    pub fn finish(&mut self, pid: Pid) -> bool {
        if self.table.get(pid).is_done() {
            debug!("{} already done, ignoring exit", pid);
            return false;
        }
        self.sleeping.remove(pid);
        self.ready.remove(pid);
        if self.running == Some(pid) {
            self.running = None;
        }
        let tick = self.tick;
        let pcb = self.table.get_mut(pid);
        pcb.state = ProcState::Done;
        pcb.completion_tick = Some(tick);
        pcb.io_wait = 0;
        true
    }

    /// Refills every live quantum when none is left anywhere.
    pub fn reset_quanta_if_spent(&mut self) -> bool {
        if !self.table.all_quanta_spent() {
            return false;
        }
        let quantum = self.quantum;
        for pcb in self.table.live_mut() {
            pcb.quantum = quantum;
        }
        self.quantum_resets += 1;
        true
    }

    /// Gives the CPU to the head of the ready queue if it is free.
    pub fn dispatch(&mut self) -> Option<Pid> {
        if self.running.is_some() {
            return None;
        }
        let pid = self.dequeue_ready()?;
        let tick = self.tick;
        let quantum = self.quantum;
        let pcb = self.table.get_mut(pid);
        pcb.state = ProcState::Running;
        pcb.quantum = quantum;
        pcb.dispatches += 1;
        if pcb.first_run_tick.is_none() {
            pcb.first_run_tick = Some(tick);
        }
        self.running = Some(pid);
        Some(pid)
    }

    pub fn check_invariants(&self) -> SimResult<()> {
        let fail = |msg: String| Err(SimError::Invariant(msg));

        let running = self.table.count_in(ProcState::Running);
        if running > 1 {
            return fail(format!("{} processes running at tick {}", running, self.tick));
        }
        match self.running {
            Some(pid) if self.table.get(pid).state != ProcState::Running => {
                return fail(format!("{} holds the CPU but is {:?}", pid, self.table.get(pid).state));
            }
            None if running == 1 => {
                return fail(format!("a process is Running but the CPU is idle at tick {}", self.tick));
            }
            _ => {}
        }

        for pid in self.ready.iter() {
            if self.table.get(pid).state != ProcState::Ready {
                return fail(format!("{} queued but {:?}", pid, self.table.get(pid).state));
            }
        }
        if self.table.count_in(ProcState::Ready) != self.ready.len() {
            return fail("ready queue does not match Ready processes".into());
        }
        for pid in self.sleeping.iter() {
            if self.table.get(pid).state != ProcState::Sleeping {
                return fail(format!("{} sleeping but {:?}", pid, self.table.get(pid).state));
            }
        }
        if self.table.count_in(ProcState::Sleeping) != self.sleeping.len() {
            return fail("sleep set does not match Sleeping processes".into());
        }

        let accounted = self.ready.len()
            + usize::from(self.running.is_some())
            + self.sleeping.len()
            + self.done_count();
        if accounted != self.table.len() {
            return fail(format!(
                "{} processes accounted for, expected {}",
                accounted,
                self.table.len()
            ));
        }
        Ok(())
    }

    pub fn report(&self) -> Report {
        Report::from_table(&self.table, self.tick, self.quantum_resets)
    }
}
