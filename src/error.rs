use thiserror::Error;

/// Result type alias for terrain operations
pub type Result<T> = std::result::Result<T, TerrainError>;

/// Errors that can occur in the terrain engine.
///
/// Everything here is recoverable: callers treat missing or corrupt chunk
/// files as "no data loaded" and carry on with procedural defaults.
#[derive(Error, Debug)]
pub enum TerrainError {
    /// The buffer does not start with the chunk magic header.
    /// Treated as "no saved data", not as a fault.
    #[error("not a terrain chunk file (bad magic)")]
    NotTerrainFile,

    /// The payload declares a format version this build does not know.
    /// Rejected outright instead of guessing at the layout.
    #[error("unknown chunk format version {0}")]
    UnknownVersion(i32),

    /// The file had the right magic but the payload could not be trusted.
    #[error("corrupt chunk data: {0}")]
    Corrupt(String),

    /// Invalid configuration or mismatched input data.
    #[error("configuration error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("manifest error: {0}")]
    Manifest(#[from] serde_json::Error),
}
