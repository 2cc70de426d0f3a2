//! Error types for the test server lifecycle

use std::io;
use std::net::SocketAddr;

use thiserror::Error;

/// Result alias used throughout the crate
pub type Result<T, E = ServerError> = std::result::Result<T, E>;

/// Errors raised while setting up, deploying to, starting or stopping a server
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("unable to create working directory: {0}")]
    Setup(#[source] io::Error),

    #[error("invalid configuration: {0}")]
    Config(#[from] figment::Error),

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    #[error("server already running on {0}")]
    AlreadyStarted(SocketAddr),

    #[error("initializer '{name}' failed: {source}")]
    Initializer {
        name: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync + 'static>,
    },

    #[error("context '{0}' is already deployed")]
    AlreadyDeployed(String),

    #[error("path '{0}' is already mapped")]
    DuplicateMapping(String),

    #[error("server terminated with error: {0}")]
    Shutdown(#[source] io::Error),

    #[error("server task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl ServerError {
    /// True for errors raised by `start()` before the server accepted connections
    pub fn is_startup(&self) -> bool {
        matches!(
            self,
            ServerError::Bind { .. } | ServerError::AlreadyStarted(_) | ServerError::Initializer { .. }
        )
    }
}
