use thiserror::Error;

#[derive(Error, Debug)]
pub enum UpdaterError {
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    #[error("Scan failed: {0}")]
    Scan(String),

    #[error("Registry request failed: {0}")]
    Registry(String),

    #[error("Unsupported registry: {0}")]
    UnsupportedRegistry(String),

    #[error("Failed to apply update: {0}")]
    Apply(String),

    #[error("Git operation failed: {0}")]
    GitOperation(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, UpdaterError>;
