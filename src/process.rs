use std::fmt;

/// Index of a simulated process, stable for the whole run (0..N-1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Pid(pub usize);

impl Pid {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for Pid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcState {
    Ready,
    Running,
    Sleeping,
    Done,
}

impl ProcState {
    pub fn is_live(self) -> bool {
        self != ProcState::Done
    }
}

/// Process control block. Owned by the scheduler; workers never see it.
#[derive(Debug, Clone)]
pub struct Pcb {
    pub pid: Pid,
    pub state: ProcState,
    pub quantum: u32,
    pub io_wait: u32,
    /// Remaining burst as last reported by the worker. Trace only.
    pub last_burst_seen: Option<u32>,

    // stats
    pub creation_tick: u64,
    pub first_run_tick: Option<u64>,
    pub completion_tick: Option<u64>,
    pub ready_since: u64,
    pub wait_ticks: u64,
    pub longest_wait: u64,
    pub times_enqueued: u32,
    pub dispatches: u32,
}

impl Pcb {
    pub fn new(pid: Pid, quantum: u32, creation_tick: u64) -> Pcb {
        Pcb {
            pid,
            state: ProcState::Ready,
            quantum,
            io_wait: 0,
            last_burst_seen: None,
            creation_tick,
            first_run_tick: None,
            completion_tick: None,
            ready_since: creation_tick,
            wait_ticks: 0,
            longest_wait: 0,
            times_enqueued: 0,
            dispatches: 0,
        }
    }

    pub fn is_done(&self) -> bool {
        self.state == ProcState::Done
    }

    pub fn response_time(&self) -> Option<u64> {
        self.first_run_tick.map(|t| t - self.creation_tick)
    }

    pub fn turnaround_time(&self) -> Option<u64> {
        self.completion_tick.map(|t| t - self.creation_tick)
    }
}

/// Fixed-size table of PCBs indexed by [`Pid`].
#[derive(Debug, Clone)]
pub struct PcbTable {
    entries: Vec<Pcb>,
}

impl PcbTable {
    pub fn new(count: usize, quantum: u32) -> PcbTable {
        PcbTable {
            entries: (0..count).map(|i| Pcb::new(Pid(i), quantum, 0)).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, pid: Pid) -> &Pcb {
        &self.entries[pid.index()]
    }

    pub fn get_mut(&mut self, pid: Pid) -> &mut Pcb {
        &mut self.entries[pid.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = &Pcb> {
        self.entries.iter()
    }

    pub fn live_mut(&mut self) -> impl Iterator<Item = &mut Pcb> {
        self.entries.iter_mut().filter(|p| !p.is_done())
    }

    pub fn pids(&self) -> impl Iterator<Item = Pid> {
        (0..self.entries.len()).map(Pid)
    }

    pub fn count_in(&self, state: ProcState) -> usize {
        self.entries.iter().filter(|p| p.state == state).count()
    }

    pub fn all_done(&self) -> bool {
        self.entries.iter().all(Pcb::is_done)
    }

    /// True when no live process has quantum left. False when nothing is live.
    pub fn all_quanta_spent(&self) -> bool {
        let mut live = self.entries.iter().filter(|p| !p.is_done()).peekable();
        live.peek().is_some() && live.all(|p| p.quantum == 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_table_is_ready_at_tick_zero() {
        let table = PcbTable::new(4, 2);
        assert_eq!(table.len(), 4);
        assert_eq!(table.count_in(ProcState::Ready), 4);
        assert!(table.iter().all(|p| p.quantum == 2 && p.first_run_tick.is_none()));
        assert_eq!(table.get(Pid(3)).pid, Pid(3));
    }

    #[test]
    fn quanta_spent_ignores_done_processes() {
        let mut table = PcbTable::new(3, 1);
        assert!(!table.all_quanta_spent());

        table.get_mut(Pid(0)).quantum = 0;
        table.get_mut(Pid(1)).quantum = 0;
        assert!(!table.all_quanta_spent());

        table.get_mut(Pid(2)).state = ProcState::Done;
        assert!(table.all_quanta_spent());

        for pcb in table.live_mut() {
            pcb.state = ProcState::Done;
        }
        assert!(table.all_done());
        assert!(!table.all_quanta_spent());
    }

    #[test]
    fn timing_metrics_are_relative_to_creation() {
        let mut pcb = Pcb::new(Pid(0), 1, 2);
        assert_eq!(pcb.response_time(), None);
        pcb.first_run_tick = Some(5);
        pcb.completion_tick = Some(9);
        assert_eq!(pcb.response_time(), Some(3));
        assert_eq!(pcb.turnaround_time(), Some(7));
    }
}
