//! # pinboard-mime
//!
//! MIME message parsing for mail ingestion.
//!
//! ## Features
//!
//! - **Message parsing**: nested multipart entities flattened into leaf parts
//! - **Decoding**: Base64, Quoted-Printable, RFC 2047 words, legacy charsets
//! - **Classification**: body text, attachments and inline parts
//!
//! ## Quick Start
//!
//! ```
//! use pinboard_mime::Message;
//!
//! let raw = "From: sender@example.com\r\n\
//!            Subject: Test\r\n\
//!            Content-Type: text/plain\r\n\
//!            \r\n\
//!            Hello, World!";
//!
//! let message = Message::parse(raw)?;
//! assert_eq!(message.subject(), Some("Test"));
//! assert_eq!(message.text_part()?.as_deref(), Some("Hello, World!"));
//! assert_eq!(message.attachments().count(), 0);
//! # Ok::<(), pinboard_mime::Error>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod content_type;
mod disposition;
mod error;
mod header;
mod message;
mod params;

pub mod encoding;

pub use content_type::ContentType;
pub use disposition::{ContentDisposition, DispositionKind};
pub use error::{Error, Result};
pub use header::{Headers, decode_value};
pub use message::{MAX_NESTING_DEPTH, Message, Part, TransferEncoding};
pub use params::Parameters;
