//! Error types for the versioned store.

use thiserror::Error;

/// Result type for versioned store operations.
pub type MvccResult<T> = Result<T, MvccError>;

/// Errors that can occur while building a versioned store.
///
/// Reads and writes against a constructed store cannot fail; the only
/// failures are configuration mistakes caught at construction time.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MvccError {
    /// The requested skiplist height is outside the supported range.
    #[error("invalid skiplist max height {requested}: must be between 1 and {max}")]
    InvalidMaxHeight {
        /// The requested height.
        requested: usize,
        /// The largest supported height.
        max: usize,
    },
}
