use thiserror::Error;

/// Result type for all fallible operations in this crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced by dataset loading, classifier construction and
/// classification itself.
#[derive(Debug, Error)]
pub enum Error {
    /// Two pixel grids were compared but their dimensions differ.
    #[error("dimension mismatch: expected {expected_rows}x{expected_cols}, found {found_rows}x{found_cols}")]
    DimensionMismatch {
        expected_rows: usize,
        expected_cols: usize,
        found_rows: usize,
        found_cols: usize,
    },

    /// A parameter was rejected before any work began.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// The dataset byte streams are malformed or inconsistent.
    #[error("malformed dataset: {0}")]
    DataFormat(String),

    /// An underlying I/O failure while reading a dataset.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Creates an `InvalidParameter` error with the given message.
    pub fn invalid_parameter(msg: impl Into<String>) -> Self {
        Error::InvalidParameter(msg.into())
    }

    /// Creates a `DataFormat` error with the given message.
    pub fn data_format(msg: impl Into<String>) -> Self {
        Error::DataFormat(msg.into())
    }

    /// Creates a `DimensionMismatch` error from two `(rows, cols)` pairs.
    pub fn dimension_mismatch(expected: (usize, usize), found: (usize, usize)) -> Self {
        Error::DimensionMismatch {
            expected_rows: expected.0,
            expected_cols: expected.1,
            found_rows: found.0,
            found_cols: found.1,
        }
    }
}
