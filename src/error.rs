use thiserror::Error;
use tracing::{error, warn};

#[derive(Debug, Clone, Error)]
pub enum PublishError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("IO error: {0}")]
    Io(String),

    #[error("Archive format error: {0}")]
    ArchiveFormat(String),

    #[error("Can't parse record HTTP request: {0}")]
    RequestParse(String),

    #[error("Can't parse record HTTP response: {0}")]
    ResponseParse(String),

    #[error("Response record at offset {offset} has no preceding request record")]
    OrphanResponse { offset: u64 },

    #[error("Error reading body: {0}")]
    BodyRead(String),

    #[error("Upload failed: {0}")]
    Upload(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Task join error: {0}")]
    Join(String),
}

impl PublishError {
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            PublishError::BodyRead(_) => ErrorSeverity::Low,
            PublishError::Upload(_) => ErrorSeverity::Medium,
            PublishError::ArchiveFormat(_)
            | PublishError::RequestParse(_)
            | PublishError::ResponseParse(_)
            | PublishError::OrphanResponse { .. } => ErrorSeverity::High,
            PublishError::Configuration(_)
            | PublishError::Io(_)
            | PublishError::Serialization(_)
            | PublishError::Join(_) => ErrorSeverity::Critical,
        }
    }

    /// Log as `<context>: <error>`, at `warn` for low severity and `error` otherwise.
    pub fn log(&self, context: &str) {
        match self.severity() {
            ErrorSeverity::Low => warn!("{}: {}", context, self),
            ErrorSeverity::Medium | ErrorSeverity::High | ErrorSeverity::Critical => {
                error!("{}: {}", context, self)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl From<std::io::Error> for PublishError {
    fn from(err: std::io::Error) -> Self {
        PublishError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for PublishError {
    fn from(err: serde_json::Error) -> Self {
        PublishError::Serialization(err.to_string())
    }
}

impl From<object_store::Error> for PublishError {
    fn from(err: object_store::Error) -> Self {
        PublishError::Upload(err.to_string())
    }
}

impl From<tokio::task::JoinError> for PublishError {
    fn from(err: tokio::task::JoinError) -> Self {
        PublishError::Join(err.to_string())
    }
}
