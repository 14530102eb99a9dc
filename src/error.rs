use thiserror::Error;
use tonic::{Code, Status};

/// Error types for interceptor operations.
#[derive(Debug, Error)]
pub enum InterceptorError {
    /// Configuration error occurred while building an interceptor.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The caller did not present acceptable credentials.
    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),

    /// A message did not have the type the handler expected.
    #[error("Unexpected message type: expected {expected}")]
    UnexpectedMessage { expected: &'static str },

    /// JSON configuration could not be parsed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<InterceptorError> for Status {
    fn from(err: InterceptorError) -> Self {
        match err {
            InterceptorError::Configuration(msg) => Status::new(Code::InvalidArgument, msg),
            InterceptorError::Unauthenticated(msg) => Status::new(Code::Unauthenticated, msg),
            err @ InterceptorError::UnexpectedMessage { .. } => {
                Status::new(Code::Internal, err.to_string())
            }
            InterceptorError::Json(err) => Status::new(Code::InvalidArgument, err.to_string()),
        }
    }
}

/// Result type for interceptor operations.
pub type Result<T> = std::result::Result<T, InterceptorError>;
