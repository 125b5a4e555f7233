use thiserror::Error;

/// Error type for provider operations
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Fjall database error: {0}")]
    FjallError(#[from] fjall::Error),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("UTF-8 error: {0}")]
    Utf8Error(#[from] std::string::FromUtf8Error),
    #[error("Serialization error: {0}")]
    SerializationError(String),
    #[error("Object not found: {0}")]
    ObjectNotFound(String),
    #[error("Reference not found: {0}")]
    ReferenceNotFound(String),
    #[error("Change not found: {0}")]
    ChangeNotFound(String),
    #[error("Missing patch set {0}")]
    PatchSetNotFound(String),
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),
}

/// Alias for Result using ProviderError
pub type ProviderResult<T> = Result<T, ProviderError>;
