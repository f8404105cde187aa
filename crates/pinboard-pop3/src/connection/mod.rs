//! POP3 connection management with type-state pattern.

mod client;
mod stream;

pub use client::{Authorization, Client, Transaction};
pub use stream::{POP3S_PORT, Pop3Stream, connect_tls};
