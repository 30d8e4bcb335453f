//! Concurrent batch evaluation of a classifier over a held-out test set.
//!
//! The test set is split into contiguous shards, one scoped worker per
//! shard. Every worker owns a private classifier clone over the shared
//! reference set and publishes its error count, progress and ETA through
//! atomics, which the calling thread polls into progress events until all
//! workers have finished.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, warn};

use crate::data::image::LabeledImage;
use crate::error::{Error, Result};
use crate::knn::classifier::KnnClassifier;
use crate::knn::progress::{NullSink, ProgressSink, ProgressSnapshot, WorkerSnapshot};

/// Live counters one worker publishes while classifying its shard.
#[derive(Debug, Default)]
struct WorkerProgress {
    errors: AtomicU64,
    classified: AtomicU64,
    eta_micros: AtomicU64,
    finished: AtomicBool,
}

/// Marks a worker finished on every exit path, including unwinding.
struct FinishGuard<'a>(&'a WorkerProgress);

impl Drop for FinishGuard<'_> {
    fn drop(&mut self) {
        self.0.finished.store(true, Ordering::Release);
    }
}

/// Outcome of one worker's shard.
#[derive(Debug, Clone)]
pub struct ShardReport {
    /// Worker index, also the shard's position in the partition.
    pub worker: usize,
    /// Index of the shard's first test image.
    pub start: usize,
    /// Number of test images assigned to the shard.
    pub len: usize,
    /// How many images the worker actually classified. Less than `len` if
    /// the worker was cancelled or faulted.
    pub classified: u64,
    /// Misclassifications among the classified images.
    pub errors: u64,
    /// Description of the fault that stopped the shard early, if any.
    pub fault: Option<String>,
}

/// Aggregate result of a batch evaluation.
#[derive(Debug, Clone)]
pub struct Evaluation {
    /// Size of the full test set.
    pub total_samples: usize,
    /// Per-worker shard outcomes, in shard order.
    pub shards: Vec<ShardReport>,
}

impl Evaluation {
    /// Total misclassifications across all shards, partial shards included.
    pub fn total_errors(&self) -> u64 {
        self.shards.iter().map(|s| s.errors).sum()
    }

    /// Total images actually classified across all shards.
    pub fn classified(&self) -> u64 {
        self.shards.iter().map(|s| s.classified).sum()
    }

    /// Error rate as a percentage of the full test set.
    pub fn error_rate_percent(&self) -> f64 {
        100.0 * self.total_errors() as f64 / self.total_samples as f64
    }

    /// Shards that stopped early on a fault.
    pub fn failed_shards(&self) -> impl Iterator<Item = &ShardReport> {
        self.shards.iter().filter(|s| s.fault.is_some())
    }
}

/// Evaluates a classifier's error rate over a test set with a fixed number
/// of parallel workers.
///
/// The partition never changes which images are classified or how: the
/// aggregate error count for any valid worker count equals the count from a
/// single sequential pass.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use std::time::Duration;
/// use mnist_knn::{BatchEvaluator, KnnClassifier, LabeledImage, Metric};
///
/// let training = Arc::new(vec![
///     LabeledImage::new(1, 1, vec![0], 0).unwrap(),
///     LabeledImage::new(1, 1, vec![255], 1).unwrap(),
/// ]);
/// let test = vec![
///     LabeledImage::new(1, 1, vec![5], 0).unwrap(),
///     LabeledImage::new(1, 1, vec![5], 1).unwrap(),
/// ];
///
/// let knn = KnnClassifier::new(1, Metric::Taxicab, training).unwrap();
/// let evaluation = BatchEvaluator::new(knn)
///     .with_tick(Duration::from_millis(10))
///     .evaluate(&test, 2)
///     .unwrap();
/// assert_eq!(evaluation.total_errors(), 1);
/// assert_eq!(evaluation.error_rate_percent(), 50.0);
/// ```
#[derive(Debug, Clone)]
pub struct BatchEvaluator {
    classifier: KnnClassifier,
    tick: Duration,
    cancel: Option<Arc<AtomicBool>>,
}

impl BatchEvaluator {
    /// Creates an evaluator with a 1 second progress tick and no
    /// cancellation flag.
    pub fn new(classifier: KnnClassifier) -> Self {
        Self {
            classifier,
            tick: Duration::from_secs(1),
            cancel: None,
        }
    }

    /// Customize the interval between progress snapshots.
    pub fn with_tick(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }

    /// Attach a cooperative cancellation flag. Workers check it between
    /// images and stop early once it is set; partial counts are reported.
    pub fn with_cancel(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Evaluates the test set without progress reporting.
    pub fn evaluate(&self, test: &[LabeledImage], workers: usize) -> Result<Evaluation> {
        self.evaluate_with(test, workers, &mut NullSink)
    }

    /// Evaluates the test set, streaming progress snapshots into `sink`.
    ///
    /// Splits `test` into `workers` contiguous shards of `len / workers`
    /// images, the remainder going to the last shard, and runs one worker
    /// per shard. Each worker classifies its shard sequentially against its
    /// private classifier clone, counting mismatches against the
    /// ground-truth labels and re-estimating its remaining time from the
    /// most recent per-image duration.
    ///
    /// A worker stopped by a classification error or a panic is reported as
    /// a failed shard carrying its partial counts; the other shards are
    /// unaffected.
    ///
    /// # Errors
    ///
    /// Returns `InvalidParameter` if `workers` is zero or exceeds the test
    /// set size. Both are rejected before any worker starts.
    pub fn evaluate_with(
        &self,
        test: &[LabeledImage],
        workers: usize,
        sink: &mut dyn ProgressSink,
    ) -> Result<Evaluation> {
        if workers == 0 {
            return Err(Error::invalid_parameter("worker count must be positive"));
        }
        if workers > test.len() {
            return Err(Error::invalid_parameter(format!(
                "worker count {workers} exceeds test set size {}",
                test.len()
            )));
        }

        let part = test.len() / workers;
        let shards: Vec<(usize, usize)> = (0..workers)
            .map(|i| {
                let start = i * part;
                let len = if i == workers - 1 {
                    test.len() - start
                } else {
                    part
                };
                (start, len)
            })
            .collect();
        debug!(
            "evaluating {} images across {workers} workers, {part} per shard",
            test.len()
        );

        let progress: Vec<WorkerProgress> =
            (0..workers).map(|_| WorkerProgress::default()).collect();
        let cancel = self.cancel.clone();

        let reports: Vec<ShardReport> = thread::scope(|scope| {
            let handles: Vec<_> = shards
                .iter()
                .enumerate()
                .map(|(worker, &(start, len))| {
                    let classifier = self.classifier.clone();
                    let shard = &test[start..start + len];
                    let worker_progress = &progress[worker];
                    let cancel = cancel.as_deref();
                    scope.spawn(move || run_shard(classifier, shard, worker_progress, cancel))
                })
                .collect();

            loop {
                let all_done = progress
                    .iter()
                    .all(|p| p.finished.load(Ordering::Acquire));
                sink.on_tick(&snapshot(&progress, &shards));
                if all_done {
                    break;
                }
                thread::sleep(self.tick);
            }

            handles
                .into_iter()
                .enumerate()
                .map(|(worker, handle)| {
                    let (start, len) = shards[worker];
                    let fault = match handle.join() {
                        Ok(fault) => fault,
                        Err(_) => Some("worker panicked".to_string()),
                    };
                    ShardReport {
                        worker,
                        start,
                        len,
                        classified: progress[worker].classified.load(Ordering::Relaxed),
                        errors: progress[worker].errors.load(Ordering::Relaxed),
                        fault,
                    }
                })
                .collect()
        });

        for report in reports.iter().filter(|r| r.fault.is_some()) {
            warn!(
                "worker {} failed after {} of {} images: {}",
                report.worker,
                report.classified,
                report.len,
                report.fault.as_deref().unwrap_or_default()
            );
        }

        let evaluation = Evaluation {
            total_samples: test.len(),
            shards: reports,
        };
        sink.on_complete(&evaluation);
        Ok(evaluation)
    }
}

/// One worker's classification loop. Counts and the ETA go through the
/// shared atomics; the return value is the fault that stopped the shard
/// early, if any.
fn run_shard(
    classifier: KnnClassifier,
    shard: &[LabeledImage],
    progress: &WorkerProgress,
    cancel: Option<&AtomicBool>,
) -> Option<String> {
    let _guard = FinishGuard(progress);
    let total = shard.len() as u64;
    let mut done = 0u64;

    for image in shard {
        if cancel.map_or(false, |c| c.load(Ordering::Relaxed)) {
            break;
        }
        let started = Instant::now();
        match classifier.predict(image) {
            Ok(predicted) => {
                if predicted != image.label() {
                    progress.errors.fetch_add(1, Ordering::Relaxed);
                }
            }
            Err(e) => return Some(e.to_string()),
        }
        done += 1;
        progress.classified.store(done, Ordering::Relaxed);

        // Most recent per-image duration only, not a running average.
        let eta = started.elapsed().as_micros() as u64 * (total - done);
        progress.eta_micros.store(eta, Ordering::Relaxed);
    }
    None
}

fn snapshot(progress: &[WorkerProgress], shards: &[(usize, usize)]) -> ProgressSnapshot {
    let workers = progress
        .iter()
        .zip(shards)
        .enumerate()
        .map(|(worker, (p, &(_, len)))| WorkerSnapshot {
            worker,
            shard_len: len as u64,
            classified: p.classified.load(Ordering::Relaxed),
            errors: p.errors.load(Ordering::Relaxed),
            eta: Duration::from_micros(p.eta_micros.load(Ordering::Relaxed)),
            finished: p.finished.load(Ordering::Acquire),
        })
        .collect();
    ProgressSnapshot { workers }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knn::metric::Metric;

    fn uniform(value: u8, label: u8) -> LabeledImage {
        LabeledImage::new(2, 2, vec![value; 4], label).unwrap()
    }

    fn classifier() -> KnnClassifier {
        let training = Arc::new(vec![uniform(0, 0), uniform(255, 1)]);
        KnnClassifier::new(1, Metric::Taxicab, training).unwrap()
    }

    /// Ten dim images, all predicted 0 under k=1/taxicab; three carry
    /// label 1 and are therefore misclassified.
    fn test_set() -> Vec<LabeledImage> {
        (0..10)
            .map(|i| uniform(10, u8::from(i % 3 == 0 && i > 0)))
            .collect()
    }

    fn evaluator() -> BatchEvaluator {
        BatchEvaluator::new(classifier()).with_tick(Duration::from_millis(1))
    }

    #[test]
    fn test_partition_invariance() {
        let test = test_set();

        let sequential: u64 = test
            .iter()
            .map(|img| u64::from(classifier().predict(img).unwrap() != img.label()))
            .sum();
        assert_eq!(sequential, 3);

        for workers in [1, 2, 5] {
            let evaluation = evaluator().evaluate(&test, workers).unwrap();
            assert_eq!(evaluation.total_errors(), sequential);
            assert_eq!(evaluation.classified(), 10);
            assert_eq!(evaluation.total_samples, 10);
            assert_eq!(evaluation.error_rate_percent(), 30.0);
        }
    }

    #[test]
    fn test_remainder_goes_to_last_shard() {
        let test = test_set();
        let evaluation = evaluator().evaluate(&test, 3).unwrap();

        let sizes: Vec<usize> = evaluation.shards.iter().map(|s| s.len).collect();
        assert_eq!(sizes, vec![3, 3, 4]);
        let starts: Vec<usize> = evaluation.shards.iter().map(|s| s.start).collect();
        assert_eq!(starts, vec![0, 3, 6]);
        assert!(evaluation.failed_shards().next().is_none());
    }

    #[test]
    fn test_invalid_worker_counts() {
        let test = test_set();
        assert!(matches!(
            evaluator().evaluate(&test, 0),
            Err(Error::InvalidParameter(_))
        ));
        assert!(matches!(
            evaluator().evaluate(&test, 11),
            Err(Error::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_cancellation_reports_partial_counts() {
        let cancel = Arc::new(AtomicBool::new(true));
        let evaluation = evaluator()
            .with_cancel(Arc::clone(&cancel))
            .evaluate(&test_set(), 2)
            .unwrap();

        // Flag was set before any work started, so nothing is classified,
        // but every shard still reports rather than being dropped.
        assert_eq!(evaluation.classified(), 0);
        assert_eq!(evaluation.total_errors(), 0);
        assert_eq!(evaluation.shards.len(), 2);
        assert!(evaluation.failed_shards().next().is_none());
    }

    #[test]
    fn test_faulted_shard_keeps_partial_counts() {
        let mut test = test_set();
        // A ragged image in the second shard stops that worker with a
        // dimension mismatch once it reaches it.
        test[7] = LabeledImage::new(1, 4, vec![10; 4], 0).unwrap();

        let evaluation = evaluator().evaluate(&test, 2).unwrap();

        let failed: Vec<_> = evaluation.failed_shards().collect();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].worker, 1);
        assert_eq!(failed[0].classified, 2);

        // First shard is untouched by the second shard's fault.
        assert_eq!(evaluation.shards[0].classified, 5);
        assert!(evaluation.shards[0].fault.is_none());
        assert_eq!(evaluation.classified(), 7);
    }

    #[test]
    fn test_progress_events_reach_the_sink() {
        struct CountingSink {
            ticks: usize,
            completed: Option<u64>,
        }

        impl ProgressSink for CountingSink {
            fn on_tick(&mut self, snapshot: &ProgressSnapshot) {
                assert_eq!(snapshot.workers.len(), 2);
                self.ticks += 1;
            }

            fn on_complete(&mut self, evaluation: &Evaluation) {
                self.completed = Some(evaluation.total_errors());
            }
        }

        let mut sink = CountingSink {
            ticks: 0,
            completed: None,
        };
        evaluator()
            .evaluate_with(&test_set(), 2, &mut sink)
            .unwrap();

        assert!(sink.ticks >= 1);
        assert_eq!(sink.completed, Some(3));
    }
}
