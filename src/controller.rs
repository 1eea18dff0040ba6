//! The kernel side of the simulation: owns the scheduler and the workers and
//! turns timer ticks into scheduling decisions.
//!
//! All PCB and queue mutation happens on the thread that drives the
//! controller. Notifications that arrive between ticks are buffered and
//! drained at the start of the next tick; the reply to the outstanding `Run`
//! is always collected at the tick boundary, so an exit is seen by exactly
//! one tick.

use std::collections::VecDeque;
use std::time::Instant;

use crossbeam_channel::{select, tick, unbounded, Receiver, RecvTimeoutError};
use log::{debug, error, info, trace, warn};

use crate::config::SimConfig;
use crate::error::{SimError, SimResult};
use crate::policy::Policy;
use crate::process::Pid;
use crate::scheduler::{Scheduler, TickReport, Verdict};
use crate::stats::Report;
use crate::worker::{Command, Notification, Reply, WorkerHandle};
use crate::{q_trace, v_trace};

pub struct Controller {
    sched: Scheduler,
    workers: Vec<Option<WorkerHandle>>,
    notify_rx: Receiver<Notification>,
    pending: VecDeque<Notification>,
    policy: Box<dyn Policy>,
    cfg: SimConfig,
}

impl Controller {
    /// Validates `cfg`, spawns one worker per process and performs the
    /// tick-0 dispatch. Either all N workers start or none is left running.
    pub fn launch(cfg: SimConfig, mut policy: Box<dyn Policy>) -> SimResult<Controller> {
        let sched = Scheduler::new(&cfg)?;
        let (notify_tx, notify_rx) = unbounded();

        let mut workers = Vec::with_capacity(cfg.processes);
        for pid in sched.table().pids() {
            let handle = WorkerHandle::spawn(pid, policy.worker_policy(pid), notify_tx.clone())
                .map_err(|source| {
                    error!("could not launch {}: {}", pid, source);
                    SimError::Launch { pid, source }
                })?;
            v_trace!("  {} created", pid);
            workers.push(Some(handle));
        }
        drop(notify_tx);
        info!("launched {} workers", workers.len());

        let mut ctl = Controller {
            sched,
            workers,
            notify_rx,
            pending: VecDeque::new(),
            policy,
            cfg,
        };
        v_trace!("==== [tick 0] ====");
        ctl.dispatch()?;
        ctl.trace_queues();
        Ok(ctl)
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.sched
    }

    /// Runs ticks until every process is done, pacing them with the timer
    /// unless the tick interval is zero.
    pub fn run(mut self) -> SimResult<Report> {
        let interval = self.cfg.tick_interval();
        let ticker = if interval.is_zero() {
            None
        } else {
            Some(tick(interval))
        };

        loop {
            if let Some(ticker) = &ticker {
                self.wait_for_tick(ticker);
            }
            let report = self.step()?;
            if report.halted {
                break;
            }
            if let Some(limit) = self.cfg.max_ticks {
                if report.tick >= limit {
                    warn!("giving up after {} ticks, {} processes live", limit,
                        self.sched.table().len() - self.sched.done_count());
                    return Err(SimError::TickLimit(limit));
                }
            }
        }

        info!("all processes done after {} ticks", self.sched.tick());
        v_trace!("\nall processes done");
        Ok(self.sched.report())
    }

    /// One timer tick.
    pub fn step(&mut self) -> SimResult<TickReport> {
        let tick = self.sched.advance_clock();
        v_trace!("==== [tick {}] ====", tick);
        let mut report = TickReport {
            tick,
            ..TickReport::default()
        };

        self.drain();

        report.woken = self.sched.tick_sleep_set()?;
        for &pid in &report.woken {
            v_trace!("  [io-done] {} finished I/O -> ready queue", pid);
            self.send(pid, Command::Resume)?;
        }

        if let Some(pid) = self.sched.running() {
            let reply = self.await_reply(pid)?;
            let policy = &mut self.policy;
            report.charged = self.sched.charge_running(reply, |pid| policy.io_wait(pid))?;
            if let Some((pid, verdict)) = report.charged {
                self.apply(pid, verdict)?;
            }
        }

        if !self.sched.all_done() && self.sched.reset_quanta_if_spent() {
            v_trace!("  [reset] every live quantum spent, refilled to {}", self.cfg.quantum);
            report.quantum_reset = true;
        }

        report.dispatched = self.dispatch()?;
        self.trace_queues();
        report.halted = self.sched.all_done();

        if cfg!(debug_assertions) {
            self.sched.check_invariants()?;
        }
        Ok(report)
    }

    fn dispatch(&mut self) -> SimResult<Option<Pid>> {
        let pid = match self.sched.dispatch() {
            Some(pid) => pid,
            None => return Ok(None),
        };
        v_trace!("  [dispatch] {} gets the cpu (quantum {})", pid, self.sched.pcb(pid).quantum);
        self.send(pid, Command::Run)?;
        Ok(Some(pid))
    }

    fn apply(&mut self, pid: Pid, verdict: Verdict) -> SimResult<()> {
        match verdict {
            Verdict::Continue => {
                let pcb = self.sched.pcb(pid);
                v_trace!(
                    "  [run] {} (quantum left {}, burst left {})",
                    pid,
                    pcb.quantum,
                    pcb.last_burst_seen.unwrap_or(0)
                );
                self.send(pid, Command::Run)?;
            }
            Verdict::Preempted => {
                v_trace!("  [preempt] {} quantum spent -> ready queue", pid);
            }
            Verdict::Blocked { io_wait } => {
                v_trace!("  [io] {} requested I/O -> sleep set ({} ticks)", pid, io_wait);
            }
            Verdict::Exited => {
                v_trace!("  [exit] {} finished", pid);
                self.reap(pid);
            }
        }
        Ok(())
    }

    fn send(&self, pid: Pid, cmd: Command) -> SimResult<()> {
        match self.workers.get(pid.index()).and_then(Option::as_ref) {
            Some(handle) => handle.send(cmd),
            None => Err(SimError::WorkerLost(pid)),
        }
    }

    fn reap(&mut self, pid: Pid) {
        if let Some(mut handle) = self.workers.get_mut(pid.index()).and_then(Option::take) {
            handle.join();
            debug!("{} reaped", handle.pid());
        }
    }

    /// Takes everything queued on the notification channel. Replies from
    /// the running process stay buffered for `await_reply`.
    fn drain(&mut self) {
        self.pending.extend(self.notify_rx.try_iter());
        let running = self.sched.running();
        let mut keep = VecDeque::with_capacity(self.pending.len());
        while let Some(note) = self.pending.pop_front() {
            if Some(note.pid) == running {
                keep.push_back(note);
            } else {
                self.stray(note);
            }
        }
        self.pending = keep;
    }

    fn await_reply(&mut self, pid: Pid) -> SimResult<Reply> {
        loop {
            while let Some(note) = self.pending.pop_front() {
                if note.pid == pid {
                    return Ok(note.reply);
                }
                self.stray(note);
            }
            match self.notify_rx.recv_timeout(self.cfg.reply_timeout()) {
                Ok(note) => self.pending.push_back(note),
                Err(RecvTimeoutError::Timeout) => return Err(SimError::WorkerUnresponsive(pid)),
                Err(RecvTimeoutError::Disconnected) => return Err(SimError::WorkerLost(pid)),
            }
        }
    }

    /// Notification from a process that does not hold the CPU.
    fn stray(&mut self, note: Notification) {
        match note.reply {
            Reply::Exited => {
                if self.sched.finish(note.pid) {
                    warn!("{} exited out of turn", note.pid);
                    self.reap(note.pid);
                } else {
                    debug!("duplicate exit from {}", note.pid);
                }
            }
            other => warn!("ignoring {:?} from {}, it is not running", other, note.pid),
        }
    }

    fn wait_for_tick(&mut self, ticker: &Receiver<Instant>) {
        loop {
            select! {
                recv(ticker) -> _ => return,
                recv(self.notify_rx) -> msg => match msg {
                    Ok(note) => {
                        trace!("buffered {:?}", note);
                        self.pending.push_back(note);
                    }
                    Err(_) => {
                        let _ = ticker.recv();
                        return;
                    }
                },
            }
        }
    }

    fn trace_queues(&self) {
        let ready: Vec<String> = self.sched.ready_queue().iter().map(|p| p.to_string()).collect();
        let sleeping: Vec<String> = self
            .sched
            .sleep_set()
            .iter()
            .map(|p| format!("{}({})", p, self.sched.pcb(p).io_wait))
            .collect();
        let running = self
            .sched
            .running()
            .map_or_else(|| "-".to_string(), |p| p.to_string());
        q_trace!(
            "  [queues] ready: [{}] | sleep: [{}] | running: {} | done: {}/{}",
            ready.join(", "),
            sleeping.join(", "),
            running,
            self.sched.done_count(),
            self.sched.table().len()
        );
    }
}

impl Drop for Controller {
    fn drop(&mut self) {
        let live: Vec<WorkerHandle> = self.workers.iter_mut().filter_map(Option::take).collect();
        if live.is_empty() {
            return;
        }
        debug!("stopping {} workers", live.len());
        for handle in &live {
            let _ = handle.send(Command::Terminate);
        }
        for mut handle in live {
            handle.join();
        }
    }
}
