//! Labeled image entity and IDX dataset reader.

pub mod idx;
pub mod image;

pub use idx::{load, load_files};
pub use image::LabeledImage;
