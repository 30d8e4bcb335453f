//! Nearest-neighbor classification and batch evaluation.

pub mod classifier;
pub mod evaluate;
pub mod metric;
pub mod progress;

pub use classifier::KnnClassifier;
pub use evaluate::{BatchEvaluator, Evaluation, ShardReport};
pub use metric::Metric;
pub use progress::{ConsoleReporter, NullSink, ProgressSink, ProgressSnapshot, WorkerSnapshot};
