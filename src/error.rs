//! Domain errors surfaced by the retrieval service.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RetrievalError {
    /// The store could not be reached or failed mid-request.
    #[error("document store unavailable: {0:#}")]
    StoreUnavailable(anyhow::Error),

    /// The identifier is not a well-formed store identifier. Never forwarded
    /// to the store.
    #[error("invalid worksheet id: {0}")]
    InvalidIdentifier(String),

    #[error("worksheet not found: {0}")]
    NotFound(String),
}

impl From<anyhow::Error> for RetrievalError {
    fn from(err: anyhow::Error) -> Self {
        RetrievalError::StoreUnavailable(err)
    }
}

pub type Result<T> = std::result::Result<T, RetrievalError>;
