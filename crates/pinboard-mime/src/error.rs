//! Errors raised while taking a message apart.

/// Result type alias for MIME operations.
pub type Result<T> = std::result::Result<T, Error>;

/// MIME parsing and decoding errors.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Content-Type value without a usable `type/subtype`.
    #[error("Invalid content type: {0}")]
    InvalidContentType(String),

    /// Malformed Quoted-Printable data or an unknown transfer encoding.
    #[error("Invalid encoding: {0}")]
    InvalidEncoding(String),

    /// Base64 body or encoded word is corrupt.
    #[error("Invalid base64 data: {0}")]
    Base64(#[from] base64::DecodeError),

    /// Decoded bytes were expected to be UTF-8 and are not.
    #[error("Invalid UTF-8 text: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    /// `multipart/*` part without a boundary parameter.
    #[error("Multipart part has no boundary")]
    MissingBoundary,

    /// Boundary never found, or multiparts nested too deeply.
    #[error("Invalid multipart structure: {0}")]
    InvalidMultipart(String),
}
