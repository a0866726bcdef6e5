use std::net::SocketAddr;
use std::time::Duration;

pub type Result<T> = std::result::Result<T, Error>;

/// Boxed error produced by an HTTP body stream
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The listen address could not be parsed or resolved
    #[error("invalid address '{addr}': {reason}")]
    InvalidAddress { addr: String, reason: String },

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to accept connection: {0}")]
    Accept(#[source] std::io::Error),

    /// The request path has a malformed percent escape
    #[error("invalid escape in path '{0}'")]
    InvalidPath(String),

    #[error("failed to read request body: {0}")]
    ReadBody(#[source] BoxError),

    #[error("request body exceeds {limit} bytes")]
    BodyTooLarge { limit: usize },

    #[error("timed out reading request body after {0:?}")]
    ReadTimeout(Duration),

    #[error("store lock poisoned")]
    LockPoisoned,
}

impl Error {
    pub fn invalid_address(addr: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidAddress {
            addr: addr.into(),
            reason: reason.into(),
        }
    }
}
