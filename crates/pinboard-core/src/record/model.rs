//! Record model types.

use std::path::PathBuf;

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

/// Extension of stored record files.
pub const RECORD_EXTENSION: &str = "cmsg";

/// Source a record was harvested from.
///
/// Stored as its variant index, so the order of variants is part of the
/// file format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum RecordKind {
    /// Unknown source.
    #[default]
    Undefined,
    /// Post from a social feed.
    SocialPost,
    /// Mail message.
    Email,
}

impl RecordKind {
    /// Get display name for the kind.
    #[must_use]
    pub const fn display_name(&self) -> &'static str {
        match self {
            Self::Undefined => "Undefined",
            Self::SocialPost => "Social post",
            Self::Email => "Email",
        }
    }
}

/// One harvested message, ready for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Source kind.
    pub kind: RecordKind,
    /// Date the message was written, in the sender's offset.
    pub timestamp: DateTime<FixedOffset>,
    /// Sender as shown in the From header.
    pub sender_name: String,
    /// Subject line.
    pub short_text: String,
    /// Plain-text body.
    pub long_text: String,
    /// Normalized image files, in message order.
    pub image_names: Vec<PathBuf>,
    /// Video files (not produced by the mail crawler).
    pub video_names: Vec<PathBuf>,
    /// Audio files (not produced by the mail crawler).
    pub audio_names: Vec<PathBuf>,
}

impl Record {
    /// Creates an email record.
    #[must_use]
    pub fn email(
        timestamp: DateTime<FixedOffset>,
        sender_name: impl Into<String>,
        short_text: impl Into<String>,
        long_text: impl Into<String>,
        image_names: Vec<PathBuf>,
    ) -> Self {
        Self {
            kind: RecordKind::Email,
            timestamp,
            sender_name: sender_name.into(),
            short_text: short_text.into(),
            long_text: long_text.into(),
            image_names,
            video_names: Vec::new(),
            audio_names: Vec::new(),
        }
    }

    /// Deterministic file name derived from timestamp and sender.
    ///
    /// `Pin-YYYYMMDD-HHMMSS-<sender>.cmsg`, with the time in the record's
    /// own offset. Separators and dots become `-`, angle brackets and quotes
    /// are dropped, and runs of `-` collapse to one.
    #[must_use]
    pub fn filename(&self) -> String {
        let raw = format!(
            "Pin-{}-{}",
            self.timestamp.format("%Y%m%d-%H%M%S"),
            self.sender_name
        );

        let mut name = String::with_capacity(raw.len() + RECORD_EXTENSION.len() + 1);
        for c in raw.chars() {
            let c = match c {
                '<' | '>' | '"' => continue,
                '@' | '.' | '/' | '\\' | ':' => '-',
                c if c.is_whitespace() || c.is_control() => '-',
                c => c,
            };
            if c == '-' && name.ends_with('-') {
                continue;
            }
            name.push(c);
        }
        while name.ends_with('-') {
            name.pop();
        }

        name.push('.');
        name.push_str(RECORD_EXTENSION);
        name
    }
}
