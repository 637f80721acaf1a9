use std::fmt;

/// Result type for ward-runtime operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur in the runtime layer
#[derive(Debug)]
pub enum Error {
    /// Substrate (state/registry/telemetry) error
    Core(ward_core::Error),

    /// IO operation failed
    Io(std::io::Error),

    /// JSON encode/decode failed
    Json(serde_json::Error),

    /// Memory worker is unreachable or misbehaving
    Worker(crate::memory::MemoryError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Core(err) => write!(f, "Core error: {}", err),
            Error::Io(err) => write!(f, "IO error: {}", err),
            Error::Json(err) => write!(f, "JSON error: {}", err),
            Error::Worker(err) => write!(f, "Memory worker error: {}", err),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Core(err) => Some(err),
            Error::Io(err) => Some(err),
            Error::Json(err) => Some(err),
            Error::Worker(err) => Some(err),
        }
    }
}

impl From<ward_core::Error> for Error {
    fn from(err: ward_core::Error) -> Self {
        Error::Core(err)
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Json(err)
    }
}

impl From<crate::memory::MemoryError> for Error {
    fn from(err: crate::memory::MemoryError) -> Self {
        Error::Worker(err)
    }
}
