use std::cmp::Ordering;
use std::collections::{BTreeMap, BinaryHeap};
use std::sync::Arc;

use rayon::prelude::*;

use crate::data::image::LabeledImage;
use crate::error::{Error, Result};
use crate::knn::metric::Metric;

/// A neighbor candidate: the distance from the query to one reference image
/// together with that image's index in the reference ordering.
///
/// Candidates live only for the duration of a single `predict` call; nothing
/// is ever written back onto the shared reference images.
///
/// Ordered as a max-heap entry so the heap root is always the worst of the
/// k best candidates seen so far: a larger distance is "greater", and on
/// equal distance a larger index is "greater" (so the lower index wins ties
/// deterministically). `f64::total_cmp` gives the total order `f64` itself
/// lacks.
#[derive(Debug, Clone, Copy)]
struct Candidate {
    distance: f64,
    index: usize,
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Candidate {}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        self.distance
            .total_cmp(&other.distance)
            .then_with(|| self.index.cmp(&other.index))
    }
}

/// A k-nearest-neighbor classifier over a shared, read-only reference set.
///
/// Cloning a classifier clones the `Arc`, not the reference images, so each
/// parallel worker can hold a private instance over the same training data.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use mnist_knn::{KnnClassifier, LabeledImage, Metric};
///
/// let training = Arc::new(vec![
///     LabeledImage::new(1, 2, vec![0, 0], 0).unwrap(),
///     LabeledImage::new(1, 2, vec![100, 100], 1).unwrap(),
///     LabeledImage::new(1, 2, vec![200, 200], 1).unwrap(),
/// ]);
/// let knn = KnnClassifier::new(3, Metric::Euclidean, training).unwrap();
/// assert_eq!(knn.predict(&LabeledImage::new(1, 2, vec![150, 150], 0).unwrap()).unwrap(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct KnnClassifier {
    k: usize,
    metric: Metric,
    training: Arc<Vec<LabeledImage>>,
}

impl KnnClassifier {
    /// Constructs a classifier.
    ///
    /// # Errors
    ///
    /// Returns `InvalidParameter` if the reference set is empty or `k` is
    /// outside `[1, training.len()]`.
    pub fn new(k: usize, metric: Metric, training: Arc<Vec<LabeledImage>>) -> Result<Self> {
        if training.is_empty() {
            return Err(Error::invalid_parameter("reference set must not be empty"));
        }
        if k == 0 || k > training.len() {
            return Err(Error::invalid_parameter(format!(
                "k must be in [1, {}], got {k}",
                training.len()
            )));
        }
        Ok(Self {
            k,
            metric,
            training,
        })
    }

    /// Number of neighbors considered per query.
    pub fn k(&self) -> usize {
        self.k
    }

    /// The metric used to score reference images against a query.
    pub fn metric(&self) -> Metric {
        self.metric
    }

    /// Number of images in the reference set.
    pub fn training_len(&self) -> usize {
        self.training.len()
    }

    /// Predicts the label of a single query image by majority vote among its
    /// k nearest reference images.
    ///
    /// Equal distances prefer the reference image with the lower index; vote
    /// ties prefer the smallest label value. Repeated calls with the same
    /// inputs always return the same label.
    ///
    /// # Errors
    ///
    /// Returns `DimensionMismatch` if the query's grid dimensions differ
    /// from the reference set's.
    ///
    /// # Complexity
    ///
    /// * Time: O(n * d + n log k) for n reference images of d pixels each
    /// * Space: O(k)
    pub fn predict(&self, query: &LabeledImage) -> Result<u8> {
        if query.dims() != self.training[0].dims() {
            return Err(Error::dimension_mismatch(self.training[0].dims(), query.dims()));
        }
        let nearest = self.find_k_nearest(query)?;
        Ok(self.majority_vote(&nearest))
    }

    /// Predicts labels for multiple query images in parallel.
    ///
    /// Results are in query order; the first failing query aborts the batch.
    pub fn predict_batch(&self, queries: &[LabeledImage]) -> Result<Vec<u8>> {
        queries.par_iter().map(|q| self.predict(q)).collect()
    }

    /// Returns the k candidates with the smallest distances to `query`,
    /// maintained in a bounded max-heap rather than sorting all n distances.
    fn find_k_nearest(&self, query: &LabeledImage) -> Result<Vec<Candidate>> {
        let mut heap = BinaryHeap::with_capacity(self.k);
        for (index, reference) in self.training.iter().enumerate() {
            let candidate = Candidate {
                distance: self.metric.distance(query, reference)?,
                index,
            };
            if heap.len() < self.k {
                heap.push(candidate);
            } else if let Some(worst) = heap.peek() {
                if candidate < *worst {
                    heap.pop();
                    heap.push(candidate);
                }
            }
        }
        Ok(heap.into_vec())
    }

    /// Majority vote over the candidate labels; vote ties go to the
    /// smallest label because the counts are walked in ascending label
    /// order and only a strictly greater count displaces the leader.
    fn majority_vote(&self, nearest: &[Candidate]) -> u8 {
        let mut counts = BTreeMap::new();
        for candidate in nearest {
            *counts.entry(self.training[candidate.index].label()).or_insert(0usize) += 1;
        }

        let mut winner = 0u8;
        let mut winner_count = 0usize;
        for (label, count) in counts {
            if count > winner_count {
                winner = label;
                winner_count = count;
            }
        }
        winner
    }
}
