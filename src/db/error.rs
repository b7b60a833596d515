use thiserror::Error;

/// Errors raised by the storage layer.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Invalid(String),

    #[error("credential error: {0}")]
    Credential(#[from] crate::crypto::CredentialError),

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

impl StoreError {
    /// Map a unique-constraint failure to `Conflict`, leaving other errors untouched.
    pub fn on_unique(err: sqlx::Error, message: impl Into<String>) -> Self {
        match &err {
            sqlx::Error::Database(db_err) if db_err.message().contains("UNIQUE constraint failed") => {
                StoreError::Conflict(message.into())
            }
            _ => StoreError::Database(err),
        }
    }
}
