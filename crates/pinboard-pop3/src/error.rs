//! Error types for POP3 operations.

use std::io;

/// Result type alias for POP3 operations.
pub type Result<T> = std::result::Result<T, Error>;

/// POP3 error types.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// TLS error.
    #[error("TLS error: {0}")]
    Tls(#[from] rustls::Error),

    /// Hostname cannot be used for TLS server name verification.
    #[error("Invalid hostname: {0}")]
    InvalidHostname(String),

    /// Server answered with a negative status line.
    #[error("POP3 error: {message}")]
    Server {
        /// Text the server sent after the status indicator.
        message: String,
    },

    /// Protocol error (malformed or unexpected response).
    #[error("Protocol error: {0}")]
    Protocol(String),
}

impl Error {
    /// Creates a server error from the text following `-ERR`.
    #[must_use]
    pub fn server(message: impl Into<String>) -> Self {
        Self::Server {
            message: message.into(),
        }
    }

    /// Returns true if the server rejected the command, as opposed to the
    /// transport failing or the response being unreadable.
    #[must_use]
    pub const fn is_negative_response(&self) -> bool {
        matches!(self, Self::Server { .. })
    }

    /// Returns true if the underlying connection is no longer usable.
    #[must_use]
    pub const fn is_connection_lost(&self) -> bool {
        matches!(self, Self::Io(_) | Self::Tls(_))
    }
}
