//! Error types for the core library.

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur in core operations.
#[derive(Debug, Error)]
pub enum Error {
    /// POP3 operation failed (negative reply, malformed reply or network I/O).
    #[error("POP3 error: {0}")]
    Protocol(#[from] pinboard_pop3::Error),

    /// MIME structure could not be parsed.
    #[error("MIME error: {0}")]
    Mime(#[from] pinboard_mime::Error),

    /// Message content is unusable (e.g. missing Date header).
    #[error("Parse error: {0}")]
    Parse(String),

    /// Storing one attachment failed, which aborts the whole record.
    #[error("Attachment {filename:?} failed: {source}")]
    Attachment {
        /// Filename announced by the message part.
        filename: String,
        /// Underlying failure.
        source: Box<Self>,
    },

    /// Every collision-avoiding name for an attachment is taken.
    #[error("No free file name for {} after {attempts} attempts", base.display())]
    NameExhausted {
        /// Path of the unsuffixed candidate.
        base: PathBuf,
        /// Number of names tried.
        attempts: u32,
    },

    /// Filesystem I/O failed.
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        /// File or directory involved.
        path: PathBuf,
        /// Underlying failure.
        source: std::io::Error,
    },

    /// Stored file is corrupt or truncated.
    #[error("Cannot decode {}: {reason}", path.display())]
    Decode {
        /// File that failed to decode.
        path: PathBuf,
        /// What was wrong with it.
        reason: String,
    },

    /// Image payload could not be decoded or resized.
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration file is not valid JSON.
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// Background task panicked or was cancelled.
    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl Error {
    /// Wraps an I/O error with the path it occurred on.
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Returns true if the error means the POP3 connection is gone.
    #[must_use]
    pub const fn is_connection_lost(&self) -> bool {
        matches!(self, Self::Protocol(e) if e.is_connection_lost())
    }
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
