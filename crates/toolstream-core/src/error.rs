use thiserror::Error;

use crate::api::{ApiError, StreamError};
use crate::tool_stream::ToolStreamError;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error(transparent)]
    Stream(#[from] StreamError),
    #[error(transparent)]
    ToolStream(#[from] ToolStreamError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Configuration error: {0}")]
    Configuration(String),
    #[error("Cancelled")]
    Cancelled,
}

impl Error {
    pub fn is_cancelled(&self) -> bool {
        matches!(
            self,
            Error::Cancelled
                | Error::Stream(StreamError::Cancelled)
                | Error::Api(ApiError::Cancelled { .. })
        )
    }
}
