use thiserror::Error;

/// Errors raised by the in-memory chunk representation.
#[derive(Debug, Error)]
pub(crate) enum ChunkError {
    /// A value did not fit the array's bit width, or the index was past its capacity.
    #[error("value {value} at index {index} does not fit a {bits}-bit array of capacity {capacity}")]
    OutOfRange {
        index: usize,
        value: u32,
        bits: u8,
        capacity: usize,
    },
    #[error("malformed chunk data: {0}")]
    Malformed(String),
}

/// Errors raised by a [`crate::storage::StorageProvider`].
///
/// A missing chunk or dimension is not an error; providers report it as `Ok(None)`.
#[derive(Debug, Error)]
pub(crate) enum StorageError {
    #[error("storage I/O failure: {0}")]
    Io(#[from] std::io::Error),
    #[error("could not (de)serialize stored data: {0}")]
    Json(#[from] serde_json::Error),
    #[error("stored chunk is malformed: {0}")]
    Malformed(#[from] ChunkError),
    #[error("storage backend unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Error)]
pub(crate) enum ProtError {
    #[error("player connection closed")]
    Disconnected,
    #[error("dimension {0} is no longer running")]
    DimensionGone(String),
    /// The stream cannot be resynchronised after this.
    #[error("bad packet frame: {0}")]
    BadFrame(String),
    #[error("keep alive id mismatch: expected {0}, got {1}")]
    KeepAliveIdMismatch(i64, i64),
    #[error("{0}")]
    Any(String),
}

impl ProtError {
    pub(crate) fn is_fatal(&self) -> bool {
        match self {
            ProtError::Disconnected => true,
            ProtError::DimensionGone(_) => true,
            ProtError::KeepAliveIdMismatch(_, _) => true,
            ProtError::BadFrame(_) => true,
            ProtError::Any(_) => false,
        }
    }
}

impl From<String> for ProtError {
    fn from(s: String) -> Self {
        ProtError::Any(s)
    }
}

/// Failures that stop the server from starting.
#[derive(Debug, Error)]
pub(crate) enum ServerError {
    #[error("could not bind: {0}")]
    Io(#[from] std::io::Error),
    #[error("could not open the world: {0}")]
    Storage(#[from] StorageError),
}
