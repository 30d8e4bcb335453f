//! k-nearest-neighbor digit recognition.
//!
//! Classifies grayscale digit images by majority vote among the k closest
//! images of a labeled reference set, and measures the classifier's error
//! rate over a held-out test set using parallel batch evaluation with live
//! progress reporting.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use mnist_knn::{KnnClassifier, LabeledImage, Metric};
//!
//! let training = Arc::new(vec![
//!     LabeledImage::new(2, 2, vec![0, 0, 0, 0], 0).unwrap(),
//!     LabeledImage::new(2, 2, vec![255, 255, 255, 255], 1).unwrap(),
//! ]);
//! let classifier = KnnClassifier::new(1, Metric::Taxicab, training).unwrap();
//!
//! let query = LabeledImage::new(2, 2, vec![10, 10, 10, 10], 0).unwrap();
//! assert_eq!(classifier.predict(&query).unwrap(), 0);
//! ```

pub mod data;
pub mod error;
pub mod knn;

pub use data::{load, load_files, LabeledImage};
pub use error::{Error, Result};
pub use knn::{BatchEvaluator, ConsoleReporter, Evaluation, KnnClassifier, Metric, ProgressSink};
