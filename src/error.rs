/// Error taxonomy shared across the crate
///
/// Each concern gets its own enum so callers can match on exactly the
/// failures they are expected to recover from:
/// - `DecodeError` / `ClassifyError` abort a submission before any write
/// - `RemoteError` is recovered by the reconciliation engine
/// - `ModelLoadError` is recovered once at startup

use thiserror::Error;

/// Image bytes could not be decoded
#[derive(Debug, Error)]
#[error("Failed to decode image: {0}")]
pub struct DecodeError(pub String);

impl From<image::ImageError> for DecodeError {
    fn from(err: image::ImageError) -> Self {
        DecodeError(err.to_string())
    }
}

/// Classification failures
#[derive(Debug, Error)]
pub enum ClassifyError {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("Inference failed: {0}")]
    Inference(String),

    #[error("Classifier worker failed: {0}")]
    Worker(String),
}

/// Model could not be loaded at startup
#[derive(Debug, Error)]
pub enum ModelLoadError {
    #[error("Model file not readable: {0}")]
    Io(#[from] std::io::Error),

    #[error("Model file malformed: {0}")]
    Format(#[from] serde_json::Error),

    #[error("Model invalid: {0}")]
    Invalid(String),
}

/// Remote tree store failures
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RemoteError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Not found")]
    NotFound,

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// Local store failures
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Delete was refused or could not be applied anywhere
#[derive(Debug, Error)]
pub enum DeleteError {
    #[error("Only the uploader can delete this tree")]
    Unauthorized,

    #[error(transparent)]
    Remote(RemoteError),

    #[error(transparent)]
    Cache(#[from] CacheError),
}

/// Submission workflow failures
#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("Failed to read image: {0}")]
    Read(#[from] std::io::Error),

    #[error(transparent)]
    Classify(#[from] ClassifyError),

    #[error(transparent)]
    Cache(#[from] CacheError),
}

/// Configuration loading failures
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config file not readable: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config file malformed: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Could not determine {0} directory")]
    NoDirectory(&'static str),
}

/// Application could not be assembled at startup
#[derive(Debug, Error)]
pub enum InitError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error("Remote client setup failed: {0}")]
    Remote(#[from] RemoteError),
}
