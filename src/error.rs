use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A statement rejected by the server.
    #[error("{0}")]
    Statement(crate::ErrorDescriptor),

    #[error("Statement timed out after {0:?}")]
    Timeout(Duration),

    #[error("Resource exhausted: {0}")]
    ResourceExhausted(String),

    #[error("Execution cancelled")]
    Cancelled,

    #[error("Another script is already running on this connection")]
    Busy,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T = ()> = std::result::Result<T, Error>;

impl From<confique::Error> for Error {
    fn from(value: confique::Error) -> Self {
        Error::Config(value.to_string())
    }
}
