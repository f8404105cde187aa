//! Core POP3 types.

use crate::command::MessageId;

/// Maildrop summary returned by STAT.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MaildropStat {
    /// Number of messages not marked as deleted.
    pub count: u32,
    /// Total size of those messages in octets.
    pub size: u64,
}

/// One line of a LIST scan listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanListing {
    /// Message number.
    pub id: MessageId,
    /// Message size in octets.
    pub size: u64,
}

impl ScanListing {
    /// Creates a scan listing entry.
    #[must_use]
    pub const fn new(id: MessageId, size: u64) -> Self {
        Self { id, size }
    }
}
