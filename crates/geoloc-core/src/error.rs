//! Error types. There is no local recovery anywhere in the engine: every
//! failure propagates to the caller and aborts the operation.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, GeolocError>;

#[derive(Debug, Error)]
pub enum GeolocError {
    /// File could not be opened or read; carries the offending path.
    #[error("{path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Any malformed content while parsing a stored model.
    #[error("File error reading model")]
    ModelParse,

    /// Malformed input record, e.g. a non-numeric coordinate field.
    #[error("line {line}: {reason}")]
    CorpusParse { line: usize, reason: String },

    /// A longitude granularity that cannot describe a grid: zero or odd.
    #[error("longranularity must be even and positive, got {0}")]
    InvalidGranularity(usize),

    /// Direct feature-store lookup for a name the store has never seen.
    /// Indicates a programming bug, not a user error; the classifiers
    /// guard with a presence check and never hit this.
    #[error("feature not found: {0}")]
    FeatureNotFound(String),
}

impl GeolocError {
    pub fn io(path: &std::path::Path, source: std::io::Error) -> Self {
        Self::Io { path: path.display().to_string(), source }
    }
}
