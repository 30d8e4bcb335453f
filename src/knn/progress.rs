//! Progress observation for batch evaluation.
//!
//! Purely observational: sinks receive read-only snapshots of the workers'
//! counters on every tick and the final aggregate on completion, and can be
//! swapped or omitted without altering any classification result.

use std::io::{self, Write};
use std::time::Duration;

use crate::knn::evaluate::Evaluation;

/// Read-only view of one worker's counters at a single instant.
#[derive(Debug, Clone)]
pub struct WorkerSnapshot {
    /// Worker index.
    pub worker: usize,
    /// Number of test images in the worker's shard.
    pub shard_len: u64,
    /// Images classified so far.
    pub classified: u64,
    /// Misclassifications so far.
    pub errors: u64,
    /// Estimated remaining time, from the most recent per-image duration.
    pub eta: Duration,
    /// Whether the worker has finished its shard.
    pub finished: bool,
}

/// Snapshot of every worker, taken once per tick.
#[derive(Debug, Clone)]
pub struct ProgressSnapshot {
    /// Per-worker views, in shard order.
    pub workers: Vec<WorkerSnapshot>,
}

/// Receives evaluation progress events.
///
/// Both methods default to no-ops so a sink only implements the events it
/// cares about.
pub trait ProgressSink {
    /// Called once per tick while workers run, and a final time once every
    /// worker has finished.
    fn on_tick(&mut self, _snapshot: &ProgressSnapshot) {}

    /// Called once after all workers have joined, with the aggregate result.
    fn on_complete(&mut self, _evaluation: &Evaluation) {}
}

/// Sink that discards all events.
#[derive(Debug, Default)]
pub struct NullSink;

impl ProgressSink for NullSink {}

/// Sink that renders a single overwriting progress line per tick and the
/// final error rate on completion.
#[derive(Debug)]
pub struct ConsoleReporter<W: Write> {
    out: W,
}

impl ConsoleReporter<io::Stdout> {
    /// Reporter writing to stdout.
    pub fn stdout() -> Self {
        Self { out: io::stdout() }
    }
}

impl<W: Write> ConsoleReporter<W> {
    /// Reporter writing to an arbitrary writer.
    pub fn new(out: W) -> Self {
        Self { out }
    }
}

impl<W: Write> ProgressSink for ConsoleReporter<W> {
    fn on_tick(&mut self, snapshot: &ProgressSnapshot) {
        let mut line = String::new();
        for w in &snapshot.workers {
            line.push_str(&format!(
                "worker {}: {} errors, {}/{} done, eta {:.1}s  ",
                w.worker,
                w.errors,
                w.classified,
                w.shard_len,
                w.eta.as_secs_f64()
            ));
        }
        let _ = write!(self.out, "{line}\r");
        let _ = self.out.flush();
    }

    fn on_complete(&mut self, evaluation: &Evaluation) {
        let _ = writeln!(self.out, "\nerror rate: {:.2}%", evaluation.error_rate_percent());
        let _ = self.out.flush();
    }
}
