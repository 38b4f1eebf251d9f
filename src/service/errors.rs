use thiserror::Error;

use crate::storage::StorageError;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("invalid URL: {0}")]
    InvalidUrl(String),
    #[error("invalid alias: {0}")]
    InvalidAlias(String),
    #[error("short code '{0}' is already taken")]
    CodeTaken(String),
}

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("link not found")]
    NotFound,
    #[error("link belongs to another owner")]
    NotOwner,
    #[error("storage unavailable: {0}")]
    StorageUnavailable(#[source] StorageError),
}

impl From<StorageError> for ServiceError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::LinkNotFound => ServiceError::NotFound,
            other => ServiceError::StorageUnavailable(other),
        }
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;
