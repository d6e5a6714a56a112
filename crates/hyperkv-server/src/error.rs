//! Server error types.

use hyperkv_keyspace::KeyspaceError;
use hyperkv_storage::StorageError;
use hyperkv_wire::WireError;
use thiserror::Error;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

/// Errors that can occur during server operations.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Wire protocol error.
    #[error("wire protocol error: {0}")]
    Wire(#[from] WireError),

    /// Keyspace error.
    #[error("keyspace error: {0}")]
    Keyspace(#[from] KeyspaceError),

    /// Storage error.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// I/O error.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// Connection closed.
    #[error("connection closed")]
    ConnectionClosed,

    /// Maximum connections reached.
    #[error("maximum connections reached: {0}")]
    MaxConnectionsReached(usize),

    /// Bind failed.
    #[error("failed to bind to {addr}: {source}")]
    BindFailed {
        addr: std::net::SocketAddr,
        source: std::io::Error,
    },

    /// TLS error.
    #[error("TLS error: {0}")]
    Tls(String),

    /// Authentication failed or required.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Command understood but arguments invalid.
    #[error("syntax error")]
    Syntax,

    /// Command not recognized.
    #[error("unknown command '{0}'")]
    UnknownCommand(String),

    /// Command not valid in the connection's current state (e.g. a data
    /// command while Subscribed).
    #[error("command not allowed in this context: {0}")]
    WrongContext(String),

    /// Invalid or unresolvable configuration at startup.
    #[error("configuration error: {0}")]
    Config(String),

    /// Server shutdown.
    #[error("server shutdown")]
    Shutdown,
}
