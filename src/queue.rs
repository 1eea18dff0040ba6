//! Ready queue and sleep set.
//!
//! Both hold pids only; the per-process state lives in the PCB table.

use crate::error::{SimError, SimResult};
use crate::process::Pid;

/// Bounded circular FIFO. One slot is kept free so `head == tail`
/// always means empty.
#[derive(Debug, Clone)]
pub struct ReadyQueue {
    slots: Vec<Option<Pid>>,
    head: usize,
    tail: usize,
}

impl ReadyQueue {
    /// Queue able to hold `capacity` pids (`capacity + 1` slots).
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: vec![None; capacity + 1],
            head: 0,
            tail: 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.head == self.tail
    }

    pub fn is_full(&self) -> bool {
        (self.tail + 1) % self.slots.len() == self.head
    }

    pub fn len(&self) -> usize {
        (self.tail + self.slots.len() - self.head) % self.slots.len()
    }

    pub fn push(&mut self, pid: Pid) -> SimResult<()> {
        if self.is_full() {
            return Err(SimError::QueueFull);
        }
        self.slots[self.tail] = Some(pid);
        self.tail = (self.tail + 1) % self.slots.len();
        Ok(())
    }

    pub fn pop(&mut self) -> Option<Pid> {
        if self.is_empty() {
            return None;
        }
        let pid = self.slots[self.head].take();
        self.head = (self.head + 1) % self.slots.len();
        pid
    }

    pub fn contains(&self, pid: Pid) -> bool {
        self.iter().any(|p| p == pid)
    }

    /// Drops `pid` from the queue, keeping the order of the others.
    pub fn remove(&mut self, pid: Pid) -> bool {
        if !self.contains(pid) {
            return false;
        }
        let kept: Vec<Pid> = self.iter().filter(|&p| p != pid).collect();
        self.slots.iter_mut().for_each(|s| *s = None);
        self.head = 0;
        self.tail = 0;
        for p in kept {
            self.slots[self.tail] = Some(p);
            self.tail += 1;
        }
        true
    }

    /// Pids from head to tail.
    pub fn iter(&self) -> impl Iterator<Item = Pid> + '_ {
        let len = self.slots.len();
        (0..self.len()).filter_map(move |i| self.slots[(self.head + i) % len])
    }
}

/// Unordered set of sleeping pids, compacted in place on removal.
#[derive(Debug, Clone, Default)]
pub struct SleepSet {
    members: Vec<Pid>,
}

impl SleepSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn insert(&mut self, pid: Pid) {
        if !self.contains(pid) {
            self.members.push(pid);
        }
    }

    pub fn contains(&self, pid: Pid) -> bool {
        self.members.contains(&pid)
    }

    pub fn remove(&mut self, pid: Pid) -> bool {
        let before = self.members.len();
        self.members.retain(|&p| p != pid);
        self.members.len() != before
    }

    /// Keeps the members for which `f` returns true, in scan order.
    pub fn retain(&mut self, f: impl FnMut(&Pid) -> bool) {
        self.members.retain(f);
    }

    pub fn iter(&self) -> impl Iterator<Item = Pid> + '_ {
        self.members.iter().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ready_queue_is_fifo_across_wraparound() {
        let mut q = ReadyQueue::with_capacity(3);
        for round in 0..5 {
            q.push(Pid(round)).unwrap();
            q.push(Pid(round + 10)).unwrap();
            assert_eq!(q.len(), 2);
            assert_eq!(q.pop(), Some(Pid(round)));
            assert_eq!(q.pop(), Some(Pid(round + 10)));
        }
        assert!(q.is_empty());
        assert_eq!(q.pop(), None);
    }

    #[test]
    fn ready_queue_holds_exactly_its_capacity() {
        let mut q = ReadyQueue::with_capacity(2);
        q.push(Pid(0)).unwrap();
        q.push(Pid(1)).unwrap();
        assert!(q.is_full());
        assert!(matches!(q.push(Pid(2)), Err(SimError::QueueFull)));
        assert_eq!(q.iter().collect::<Vec<_>>(), vec![Pid(0), Pid(1)]);
    }

    #[test]
    fn ready_queue_remove_keeps_order() {
        let mut q = ReadyQueue::with_capacity(4);
        q.push(Pid(9)).unwrap();
        q.pop();
        for i in 0..4 {
            q.push(Pid(i)).unwrap();
        }
        assert!(q.remove(Pid(1)));
        assert!(!q.remove(Pid(1)));
        assert_eq!(q.iter().collect::<Vec<_>>(), vec![Pid(0), Pid(2), Pid(3)]);
        q.push(Pid(7)).unwrap();
        assert_eq!(q.len(), 4);
        assert_eq!(q.pop(), Some(Pid(0)));
    }

    #[test]
    fn sleep_set_compacts_on_removal() {
        let mut s = SleepSet::new();
        s.insert(Pid(4));
        s.insert(Pid(2));
        s.insert(Pid(4));
        s.insert(Pid(7));
        assert_eq!(s.len(), 3);
        assert!(s.remove(Pid(2)));
        assert_eq!(s.iter().collect::<Vec<_>>(), vec![Pid(4), Pid(7)]);
        s.retain(|&p| p != Pid(4));
        assert!(!s.contains(Pid(4)));
        assert_eq!(s.len(), 1);
    }
}
