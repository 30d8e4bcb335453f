use std::fmt;
use std::str::FromStr;

use crate::data::image::LabeledImage;
use crate::error::{Error, Result};

/// Dissimilarity metric between two equal-dimension pixel grids.
///
/// Both variants are deterministic, symmetric, and zero exactly when the two
/// grids are pixel-identical.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    /// Sum of absolute per-pixel differences (taxicab geometry).
    Taxicab,
    /// Square root of the sum of squared per-pixel differences.
    Euclidean,
}

impl Metric {
    /// Computes the distance between two images.
    ///
    /// Differences are accumulated in a `u64`, which holds the worst case of
    /// `255^2` per pixel over any realistic grid size without overflow.
    ///
    /// # Errors
    ///
    /// Returns `DimensionMismatch` if the grids differ in rows or columns.
    pub fn distance(&self, a: &LabeledImage, b: &LabeledImage) -> Result<f64> {
        if a.dims() != b.dims() {
            return Err(Error::dimension_mismatch(a.dims(), b.dims()));
        }
        let sum: u64 = match self {
            Metric::Taxicab => a
                .pixels()
                .iter()
                .zip(b.pixels())
                .map(|(&x, &y)| u64::from(x.abs_diff(y)))
                .sum(),
            Metric::Euclidean => a
                .pixels()
                .iter()
                .zip(b.pixels())
                .map(|(&x, &y)| {
                    let d = u64::from(x.abs_diff(y));
                    d * d
                })
                .sum(),
        };
        Ok(match self {
            Metric::Taxicab => sum as f64,
            Metric::Euclidean => (sum as f64).sqrt(),
        })
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Metric::Taxicab => write!(f, "taxicab"),
            Metric::Euclidean => write!(f, "euclidean"),
        }
    }
}

impl FromStr for Metric {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "taxicab" => Ok(Metric::Taxicab),
            "euclidean" => Ok(Metric::Euclidean),
            other => Err(Error::invalid_parameter(format!(
                "unknown metric '{other}', expected 'taxicab' or 'euclidean'"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::Rng;

    fn image(pixels: Vec<u8>) -> LabeledImage {
        LabeledImage::new(2, 2, pixels, 0).unwrap()
    }

    #[test]
    fn test_taxicab_concrete() {
        let a = image(vec![0, 0, 0, 0]);
        let b = image(vec![255, 255, 255, 255]);
        let q = image(vec![10, 10, 10, 10]);

        assert_relative_eq!(Metric::Taxicab.distance(&q, &a).unwrap(), 40.0);
        assert_relative_eq!(Metric::Taxicab.distance(&q, &b).unwrap(), 980.0);
    }

    #[test]
    fn test_euclidean_concrete() {
        let a = image(vec![0, 0, 0, 0]);
        let b = image(vec![255, 255, 255, 255]);
        let q = image(vec![10, 10, 10, 10]);

        assert_relative_eq!(Metric::Euclidean.distance(&q, &a).unwrap(), 20.0);
        assert_relative_eq!(Metric::Euclidean.distance(&q, &b).unwrap(), 490.0);
    }

    #[test]
    fn test_symmetry_on_random_grids() {
        let mut rng = rand::thread_rng();
        for _ in 0..50 {
            let a = image((0..4).map(|_| rng.gen()).collect());
            let b = image((0..4).map(|_| rng.gen()).collect());
            for metric in [Metric::Taxicab, Metric::Euclidean] {
                assert_relative_eq!(
                    metric.distance(&a, &b).unwrap(),
                    metric.distance(&b, &a).unwrap()
                );
            }
        }
    }

    #[test]
    fn test_identity() {
        let a = image(vec![3, 1, 4, 1]);
        for metric in [Metric::Taxicab, Metric::Euclidean] {
            assert_relative_eq!(metric.distance(&a, &a).unwrap(), 0.0);
        }
    }

    #[test]
    fn test_dimension_mismatch() {
        let a = image(vec![0, 0, 0, 0]);
        let b = LabeledImage::new(1, 4, vec![0, 0, 0, 0], 0).unwrap();
        assert!(matches!(
            Metric::Taxicab.distance(&a, &b),
            Err(Error::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_parse_and_display() {
        assert_eq!("taxicab".parse::<Metric>().unwrap(), Metric::Taxicab);
        assert_eq!("Euclidean".parse::<Metric>().unwrap(), Metric::Euclidean);
        assert!("cosine".parse::<Metric>().is_err());
        assert_eq!(Metric::Taxicab.to_string(), "taxicab");
    }
}
