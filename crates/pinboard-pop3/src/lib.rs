//! # pinboard-pop3
//!
//! An async POP3 client library implementing the retrieval subset of RFC 1939.
//!
//! ## Features
//!
//! - **Type-state connection management**: USER/PASS must succeed before any
//!   maildrop command compiles
//! - **Retrieval commands**: STAT, LIST, RETR, DELE, NOOP, RSET, QUIT
//! - **TLS support**: Implicit TLS (port 995) via rustls
//! - **Multi-line responses**: Terminator detection and dot-unstuffing
//!
//! ## Quick Start
//!
//! ```ignore
//! use pinboard_pop3::Client;
//! use pinboard_pop3::connection::connect_tls;
//!
//! #[tokio::main]
//! async fn main() -> pinboard_pop3::Result<()> {
//!     let stream = connect_tls("pop.example.com", 995).await?;
//!     let client = Client::from_stream(stream).await?;
//!     let mut client = client.authenticate("user@example.com", "password").await?;
//!
//!     for listing in client.list_all().await? {
//!         let raw = client.retr(listing.id).await?;
//!         println!("{} octets:\n{}", listing.size, String::from_utf8_lossy(&raw));
//!     }
//!
//!     client.quit().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Connection States
//!
//! ```text
//! ┌───────────────┐                        ┌─────────────┐
//! │ Authorization │ ─── authenticate() ──→ │ Transaction │
//! └───────────────┘                        └─────────────┘
//!         │                                       │
//!         └────────────── quit() ─────────────────┘
//! ```
//!
//! The client never retries. Retry and reconnect policy belongs to the caller.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod command;
pub mod connection;
mod error;
pub mod parser;
pub mod types;

pub use command::{Command, MessageId};
pub use connection::{Authorization, Client, POP3S_PORT, Pop3Stream, Transaction, connect_tls};
pub use error::{Error, Result};
pub use types::{MaildropStat, ScanListing};
