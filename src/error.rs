use std::time::Duration;

use thiserror::Error;

use crate::config::Mode;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("key [{0}] not exist")]
    KeyNotFound(String),

    #[error(transparent)]
    Store(#[from] tikv_client::Error),

    #[error("gRPC error: {0}")]
    Rpc(#[from] tonic::Status),

    #[error("PD error: {0}")]
    Pd(String),

    #[error("Region error: {0}")]
    Region(String),

    #[error("TiKV error: {0}")]
    Server(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{operation} is not supported in {mode} mode")]
    Unsupported { operation: &'static str, mode: Mode },

    #[error("Timeout error: no response from PD within {0:?}")]
    Timeout(Duration),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether this error belongs to the "key does not exist" class.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::KeyNotFound(_))
    }

    pub(crate) fn not_found(key: &[u8]) -> Self {
        Error::KeyNotFound(String::from_utf8_lossy(key).into_owned())
    }
}
