//! Simulated user process: one thread that sits dormant until the controller
//! tells it to run a tick.
//!
//! The worker owns its CPU-burst counter. Every `Run` is answered by exactly
//! one [`Notification`]: `Ran` while the burst lasts, then `Exited` or
//! `IoRequest` when it runs out. After an I/O request the worker stays
//! blocked until `Resume`, then starts a fresh burst.

use std::io;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{unbounded, Receiver, Sender};
use log::{debug, trace, warn};

use crate::error::{SimError, SimResult};
use crate::policy::WorkerPolicy;
use crate::process::Pid;

/// Controller to worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Execute one tick of the current burst
    Run,
    /// I/O finished, start a new burst
    Resume,
    /// Stop now
    Terminate,
}

/// Worker's answer to a `Run`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reply {
    /// Burst continues with `remaining` ticks left
    Ran { remaining: u32 },
    /// Burst exhausted, process wants I/O
    IoRequest,
    /// Burst exhausted, process is gone
    Exited,
}

/// Worker to controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Notification {
    pub pid: Pid,
    pub reply: Reply,
}

struct Worker {
    pid: Pid,
    policy: Box<dyn WorkerPolicy>,
    commands: Receiver<Command>,
    notify: Sender<Notification>,
}

enum Blocked {
    Resumed,
    Stopped,
}

impl Worker {
    fn run(mut self) {
        let mut burst = self.policy.next_burst();
        debug!("{} started, first burst {}", self.pid, burst);

        while let Ok(cmd) = self.commands.recv() {
            match cmd {
                Command::Run => {
                    burst = burst.saturating_sub(1);
                    if burst > 0 {
                        if !self.reply(Reply::Ran { remaining: burst }) {
                            return;
                        }
                        continue;
                    }
                    if self.policy.exit_after_burst() {
                        self.reply(Reply::Exited);
                        debug!("{} exiting", self.pid);
                        return;
                    }
                    if !self.reply(Reply::IoRequest) {
                        return;
                    }
                    match self.wait_for_resume() {
                        Blocked::Resumed => {
                            burst = self.policy.next_burst();
                            trace!("{} resumed, new burst {}", self.pid, burst);
                        }
                        Blocked::Stopped => return,
                    }
                }
                Command::Resume => warn!("{} got Resume while not blocked", self.pid),
                Command::Terminate => break,
            }
        }
        debug!("{} terminated", self.pid);
    }

    fn wait_for_resume(&self) -> Blocked {
        while let Ok(cmd) = self.commands.recv() {
            match cmd {
                Command::Resume => return Blocked::Resumed,
                Command::Run => warn!("{} got Run while blocked on I/O", self.pid),
                Command::Terminate => break,
            }
        }
        debug!("{} terminated while blocked", self.pid);
        Blocked::Stopped
    }

    fn reply(&self, reply: Reply) -> bool {
        self.notify
            .send(Notification { pid: self.pid, reply })
            .is_ok()
    }
}

/// Controller-side handle of a worker thread.
pub struct WorkerHandle {
    pid: Pid,
    commands: Sender<Command>,
    thread: Option<JoinHandle<()>>,
}

impl WorkerHandle {
    pub fn spawn(
        pid: Pid,
        policy: Box<dyn WorkerPolicy>,
        notify: Sender<Notification>,
    ) -> io::Result<WorkerHandle> {
        let (tx, rx) = unbounded();
        let worker = Worker {
            pid,
            policy,
            commands: rx,
            notify,
        };
        let thread = thread::Builder::new()
            .name(format!("worker-{}", pid.index()))
            .spawn(move || worker.run())?;
        Ok(WorkerHandle {
            pid,
            commands: tx,
            thread: Some(thread),
        })
    }

    pub fn pid(&self) -> Pid {
        self.pid
    }

    pub fn send(&self, cmd: Command) -> SimResult<()> {
        self.commands
            .send(cmd)
            .map_err(|_| SimError::WorkerLost(self.pid))
    }

    /// Waits for the thread to end. Only call once the worker has exited or
    /// been told to terminate.
    pub fn join(&mut self) {
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!("{} panicked", self.pid);
            }
        }
    }

    pub fn terminate(&mut self) {
        let _ = self.commands.send(Command::Terminate);
        self.join();
    }
}

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        if self.thread.is_some() {
            self.terminate();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::{Policy, Script, ScriptedPolicy};
    use std::time::Duration;

    const WAIT: Duration = Duration::from_secs(5);

    fn spawn(script: Script) -> (WorkerHandle, Receiver<Notification>) {
        let (tx, rx) = unbounded();
        let mut policy = ScriptedPolicy::new(vec![script]);
        let handle = WorkerHandle::spawn(Pid(0), policy.worker_policy(Pid(0)), tx).unwrap();
        (handle, rx)
    }

    fn run(handle: &WorkerHandle, rx: &Receiver<Notification>) -> Reply {
        handle.send(Command::Run).unwrap();
        let note = rx.recv_timeout(WAIT).unwrap();
        assert_eq!(note.pid, Pid(0));
        note.reply
    }

    #[test]
    fn counts_down_then_exits() {
        let (mut handle, rx) = spawn(Script::single_burst(3));
        assert_eq!(run(&handle, &rx), Reply::Ran { remaining: 2 });
        assert_eq!(run(&handle, &rx), Reply::Ran { remaining: 1 });
        assert_eq!(run(&handle, &rx), Reply::Exited);
        handle.join();
        assert!(handle.send(Command::Run).is_err());
    }

    #[test]
    fn io_request_blocks_until_resume() {
        let (mut handle, rx) = spawn(Script::new().bursts([1, 2]).exits([false, true]));
        assert_eq!(run(&handle, &rx), Reply::IoRequest);

        // ignored while blocked
        handle.send(Command::Run).unwrap();
        assert!(rx.recv_timeout(Duration::from_millis(50)).is_err());

        handle.send(Command::Resume).unwrap();
        assert_eq!(run(&handle, &rx), Reply::Ran { remaining: 1 });
        assert_eq!(run(&handle, &rx), Reply::Exited);
        handle.join();
    }

    #[test]
    fn terminate_stops_a_dormant_worker() {
        let (mut handle, rx) = spawn(Script::single_burst(10));
        handle.terminate();
        assert!(rx.recv_timeout(Duration::from_millis(50)).is_err());
        assert!(handle.send(Command::Run).is_err());
    }
}
