use thiserror::Error;

/// Failures raised by the bounded append buffer
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BufferError {
    #[error("buffer full: write of {requested} bytes exceeds remaining {available} of {capacity} bytes")]
    Full {
        requested: usize,
        available: usize,
        capacity: usize,
    },
}

/// Failures raised by the keyed pool registry
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PoolError {
    #[error("pool '{key}' was registered with a different object type")]
    TypeMismatch { key: String },
}

impl BufferError {
    pub fn is_full(&self) -> bool {
        matches!(self, BufferError::Full { .. })
    }
}

impl From<BufferError> for std::io::Error {
    fn from(err: BufferError) -> Self {
        std::io::Error::new(std::io::ErrorKind::WriteZero, err)
    }
}
