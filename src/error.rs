use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Upload failed for '{key}': {source}")]
    UploadFailed {
        key: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Backend error: {0}")]
    Backend(#[from] anyhow::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T, E = StorageError> = std::result::Result<T, E>;

impl StorageError {
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        StorageError::InvalidInput(msg.into())
    }

    pub fn configuration(msg: impl Into<String>) -> Self {
        StorageError::Configuration(msg.into())
    }
}
