use thiserror::Error;

/// Errors returned by buffer, pool and frame operations.
#[derive(Error, Debug)]
pub enum AvError {
    /// An allocation failed or its size does not fit in memory.
    #[error("out of memory: failed to allocate {requested} bytes")]
    OutOfMemory {
        /// Bytes asked for; `usize::MAX` when the size itself overflowed.
        requested: usize,
    },

    /// The operation is not allowed in the object's current state.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// An index past the end of a plane, buffer or channel list.
    #[error("index {index} out of range (len {len})")]
    OutOfRange {
        /// The requested index.
        index: usize,
        /// Number of valid entries.
        len: usize,
    },

    /// Two frames or buffers have incompatible shapes.
    #[error("format mismatch: {0}")]
    FormatMismatch(String),

    /// A channel layout is inconsistent.
    #[error("invalid channel layout: {0}")]
    InvalidLayout(String),

    /// Valid input this crate has no support for.
    #[error("unsupported: {0}")]
    Unsupported(String),

    /// Malformed bytes, e.g. a truncated side-data payload.
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// I/O error while reading or writing configuration.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl AvError {
    pub(crate) fn oom(requested: usize) -> Self {
        AvError::OutOfMemory { requested }
    }
}

/// Result type for avcore operations.
pub type Result<T> = std::result::Result<T, AvError>;
