//! Per-process timing statistics and the final summary table.

use std::fmt;

use crate::process::{PcbTable, Pid};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcStats {
    pub pid: Pid,
    pub wait: u64,
    pub response: Option<u64>,
    pub turnaround: Option<u64>,
    pub times_enqueued: u32,
    pub longest_wait: u64,
    pub dispatches: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    pub procs: Vec<ProcStats>,
    pub total_ticks: u64,
    pub quantum_resets: u32,
}

fn mean(values: impl Iterator<Item = u64>) -> f64 {
    let (sum, count) = values.fold((0u64, 0u64), |(s, c), v| (s + v, c + 1));
    if count == 0 {
        0.0
    } else {
        sum as f64 / count as f64
    }
}

impl Report {
    pub fn from_table(table: &PcbTable, total_ticks: u64, quantum_resets: u32) -> Report {
        let procs = table
            .iter()
            .map(|pcb| ProcStats {
                pid: pcb.pid,
                wait: pcb.wait_ticks,
                response: pcb.response_time(),
                turnaround: pcb.turnaround_time(),
                times_enqueued: pcb.times_enqueued,
                longest_wait: pcb.longest_wait,
                dispatches: pcb.dispatches,
            })
            .collect();
        Report {
            procs,
            total_ticks,
            quantum_resets,
        }
    }

    pub fn get(&self, pid: Pid) -> Option<&ProcStats> {
        self.procs.get(pid.index())
    }

    pub fn avg_wait(&self) -> f64 {
        mean(self.procs.iter().map(|p| p.wait))
    }

    pub fn avg_response(&self) -> f64 {
        mean(self.procs.iter().filter_map(|p| p.response))
    }

    pub fn avg_turnaround(&self) -> f64 {
        mean(self.procs.iter().filter_map(|p| p.turnaround))
    }
}

struct Cell(Option<u64>);

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(v) => fmt::Display::fmt(&v, f),
            None => f.pad("-"),
        }
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{:>5} {:>8} {:>8} {:>8} {:>8}", "PID", "WAIT", "RESP", "TURN", "ENQ")?;
        for p in &self.procs {
            writeln!(
                f,
                "{:>5} {:>8} {:>8} {:>8} {:>8}",
                p.pid.to_string(),
                p.wait,
                Cell(p.response),
                Cell(p.turnaround),
                p.times_enqueued
            )?;
        }
        writeln!(
            f,
            "{:>5} {:>8.2} {:>8.2} {:>8.2}",
            "AVG",
            self.avg_wait(),
            self.avg_response(),
            self.avg_turnaround()
        )?;
        write!(
            f,
            "SUM: {} ticks, {} processes, {} quantum resets",
            self.total_ticks,
            self.procs.len(),
            self.quantum_resets
        )
    }
}
