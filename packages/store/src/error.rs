use thiserror::Error;

/// Error returned by every [`crate::ShowcaseStore`] operation.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A mutation targeted a record that does not exist.
    #[error("{0} not found")]
    NotFound(&'static str),

    /// A unique field already holds this value on another record.
    #[error("{field} is already taken")]
    Conflict { field: &'static str },

    /// The input was rejected before reaching the backend.
    #[error("{0}")]
    Validation(String),

    /// The backend failed.
    #[error("store backend error: {0}")]
    Backend(String),
}

pub type StoreResult<T> = Result<T, StoreError>;
