use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Invalid artifact name '{name}': {reason}")]
    InvalidName { name: String, reason: String },

    #[error("Storage authentication failed: {0}")]
    Auth(String),

    #[error("Upload failed with status {status}: {message}")]
    Upload { status: u16, message: String },

    #[error("Storage network error: {0}")]
    Network(String),

    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Storage configuration error: {0}")]
    Config(String),
}

impl StorageError {
    pub fn invalid_name(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidName {
            name: name.into(),
            reason: reason.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}
