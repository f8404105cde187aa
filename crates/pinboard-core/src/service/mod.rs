//! The ingest services.
//!
//! [`session`] opens authenticated POP3 sessions, [`parser`] turns fetched
//! mail into records and [`crawler`] drives both on a polling loop.

pub mod crawler;
pub mod parser;
pub mod session;

pub use crawler::{Crawler, MailCrawler, Timing};
pub use parser::MessageParser;
pub use session::{Connector, Session, TlsConnector, connect_and_login};
