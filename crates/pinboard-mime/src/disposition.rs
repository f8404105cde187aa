//! Content-Disposition handling (RFC 2183).

use crate::params::{Parameters, split_structured};

/// Presentation style requested for a body part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispositionKind {
    /// Displayed automatically with the message.
    Inline,
    /// Kept apart from the message body.
    Attachment,
    /// Any other token (treated like `attachment` by RFC 2183).
    Other(String),
}

/// Parsed Content-Disposition header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentDisposition {
    /// Disposition type.
    pub kind: DispositionKind,
    /// Parameters such as `filename` or `size`.
    pub parameters: Parameters,
}

impl ContentDisposition {
    /// Parses a Content-Disposition value. Never fails: an empty type is
    /// reported as [`DispositionKind::Other`].
    #[must_use]
    pub fn parse(s: &str) -> Self {
        let (token, parameters) = split_structured(s);
        let kind = match token.to_ascii_lowercase().as_str() {
            "inline" => DispositionKind::Inline,
            "attachment" => DispositionKind::Attachment,
            other => DispositionKind::Other(other.to_string()),
        };

        Self { kind, parameters }
    }

    /// Returns the filename parameter if present.
    #[must_use]
    pub fn filename(&self) -> Option<&str> {
        self.parameters.get("filename")
    }

    /// Checks if the part is an attachment.
    #[must_use]
    pub const fn is_attachment(&self) -> bool {
        matches!(self.kind, DispositionKind::Attachment)
    }

    /// Checks if the part is inline.
    #[must_use]
    pub const fn is_inline(&self) -> bool {
        matches!(self.kind, DispositionKind::Inline)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_attachment() {
        let cd = ContentDisposition::parse("attachment; filename=\"holiday photo.jpg\"");
        assert!(cd.is_attachment());
        assert_eq!(cd.filename(), Some("holiday photo.jpg"));
    }

    #[test]
    fn test_parse_inline_case_insensitive() {
        let cd = ContentDisposition::parse("INLINE; FILENAME=logo.png");
        assert!(cd.is_inline());
        assert_eq!(cd.filename(), Some("logo.png"));
    }

    #[test]
    fn test_parse_without_parameters() {
        let cd = ContentDisposition::parse("inline");
        assert!(cd.is_inline());
        assert_eq!(cd.filename(), None);
    }

    #[test]
    fn test_parse_extended_filename() {
        let cd = ContentDisposition::parse("attachment; filename*=UTF-8''Stra%C3%9Fe.png");
        assert_eq!(cd.filename(), Some("Straße.png"));
    }

    #[test]
    fn test_parse_unknown_kind() {
        let cd = ContentDisposition::parse("form-data; name=field");
        assert_eq!(cd.kind, DispositionKind::Other("form-data".to_string()));
        assert!(!cd.is_attachment());
        assert!(!cd.is_inline());
    }
}
