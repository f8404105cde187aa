//! POP3 response parser.

use std::borrow::Cow;

use crate::command::MessageId;
use crate::error::{Error, Result};
use crate::types::{MaildropStat, ScanListing};

/// Status indicator of a positive response.
pub const SUCCESS_MARKER: &str = "+OK";

/// Status indicator of a negative response.
pub const ERROR_MARKER: &str = "-ERR";

/// Line terminating a multi-line response.
pub const TERMINATOR: &[u8] = b".";

/// Parses a status line and returns the text following `+OK`.
///
/// - Positive: `+OK 2 320` yields `"2 320"`, a bare `+OK` yields `""`
/// - Negative: `-ERR no such message` yields [`Error::Server`]
///
/// # Errors
///
/// Returns [`Error::Server`] for a negative response and [`Error::Protocol`]
/// for a line carrying neither status indicator.
pub fn parse_status(line: &str) -> Result<String> {
    if let Some(rest) = line.strip_prefix(SUCCESS_MARKER)
        && (rest.is_empty() || rest.starts_with(' '))
    {
        return Ok(rest.trim_start().to_string());
    }

    if let Some(rest) = line.strip_prefix(ERROR_MARKER) {
        return Err(Error::server(rest.trim()));
    }

    Err(Error::Protocol(format!("Unexpected status line: {line}")))
}

/// Parses the payload of a STAT response: `<count> <size> ...`.
///
/// Anything after the first two fields is ignored.
///
/// # Errors
///
/// Returns an error if the payload does not start with two integers.
pub fn parse_stat(payload: &str) -> Result<MaildropStat> {
    let mut fields = payload.split_whitespace();
    let count = parse_field(fields.next(), payload)?;
    let size = parse_field(fields.next(), payload)?;
    Ok(MaildropStat { count, size })
}

/// Parses one scan listing line: `<id> <size> ...`.
///
/// # Errors
///
/// Returns an error if the line does not start with two integers.
pub fn parse_scan_listing(line: &str) -> Result<ScanListing> {
    let mut fields = line.split_whitespace();
    let id: MessageId = parse_field(fields.next(), line)?;
    let size = parse_field(fields.next(), line)?;
    Ok(ScanListing::new(id, size))
}

fn parse_field<T: std::str::FromStr>(field: Option<&str>, line: &str) -> Result<T> {
    field
        .and_then(|f| f.parse().ok())
        .ok_or_else(|| Error::Protocol(format!("Invalid server response: {line}")))
}

/// Checks if a line terminates a multi-line response.
#[must_use]
pub fn is_terminator(line: &[u8]) -> bool {
    line == TERMINATOR
}

/// Removes the escape dot from a line of a multi-line response.
///
/// Only lines with content after the leading dot are touched, so the
/// terminator itself is never altered.
#[must_use]
pub fn unstuff_line(line: &[u8]) -> &[u8] {
    match line.strip_prefix(b".") {
        Some(rest) if !rest.is_empty() => rest,
        _ => line,
    }
}

/// Escapes a payload line for transmission inside a multi-line response.
#[must_use]
pub fn stuff_line(line: &[u8]) -> Cow<'_, [u8]> {
    if line.starts_with(b".") {
        let mut stuffed = Vec::with_capacity(line.len() + 1);
        stuffed.push(b'.');
        stuffed.extend_from_slice(line);
        Cow::Owned(stuffed)
    } else {
        Cow::Borrowed(line)
    }
}
