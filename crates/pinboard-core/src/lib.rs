//! # pinboard-core
//!
//! Mail ingest for pinboard.
//!
//! This crate provides:
//! - A polling POP3 crawler that emits one [`Record`] per message
//! - Message parsing with image extraction
//! - Normalized raw RGBA image files under collision-free names
//! - The binary `.cmsg` record store
//! - JSON crawler configuration
//!
//! ```no_run
//! use pinboard_core::{CrawlerConfig, Crawler, MailCrawler};
//! use tokio::sync::mpsc;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn run() -> pinboard_core::Result<()> {
//! let config = CrawlerConfig::load(&CrawlerConfig::default_path())?;
//! config.validate()?;
//!
//! let (tx, mut rx) = mpsc::channel(16);
//! let cancel = CancellationToken::new();
//! let crawler = MailCrawler::from_config(&config);
//! tokio::spawn(crawler.crawl(tx, cancel.clone(), config.poll_interval));
//!
//! while let Some(record) = rx.recv().await {
//!     println!("{}", record.filename());
//! }
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod attachment;
pub mod config;
mod error;
pub mod record;
pub mod service;

pub use attachment::{AttachmentStore, RawImage};
pub use config::CrawlerConfig;
pub use error::{Error, Result};
pub use record::{RECORD_EXTENSION, Record, RecordKind, RecordStore};
pub use service::{
    Connector, Crawler, MailCrawler, MessageParser, Session, Timing, TlsConnector,
    connect_and_login,
};
