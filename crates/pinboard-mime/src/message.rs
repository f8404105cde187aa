//! MIME message structure and handling.

use crate::content_type::ContentType;
use crate::disposition::ContentDisposition;
use crate::encoding::{decode_base64, decode_charset, decode_quoted_printable_bytes};
use crate::error::{Error, Result};
use crate::header::{Headers, decode_value};
use std::fmt;

/// Deepest multipart nesting accepted by [`Message::parse`].
pub const MAX_NESTING_DEPTH: usize = 16;

/// Transfer encoding types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferEncoding {
    /// 7-bit ASCII.
    SevenBit,
    /// 8-bit binary.
    EightBit,
    /// Base64 encoding.
    Base64,
    /// Quoted-Printable encoding.
    QuotedPrintable,
    /// Binary (no encoding).
    Binary,
}

impl TransferEncoding {
    /// Parses transfer encoding from string.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "8bit" => Self::EightBit,
            "base64" => Self::Base64,
            "quoted-printable" => Self::QuotedPrintable,
            "binary" => Self::Binary,
            _ => Self::SevenBit, // Default (includes "7bit")
        }
    }
}

impl fmt::Display for TransferEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SevenBit => write!(f, "7bit"),
            Self::EightBit => write!(f, "8bit"),
            Self::Base64 => write!(f, "base64"),
            Self::QuotedPrintable => write!(f, "quoted-printable"),
            Self::Binary => write!(f, "binary"),
        }
    }
}

/// Leaf MIME part: a body that is not itself multipart.
#[derive(Debug, Clone)]
pub struct Part {
    /// Part headers.
    pub headers: Headers,
    /// Part body (raw bytes, still transfer-encoded).
    pub body: Vec<u8>,
}

impl Part {
    /// Creates a new part.
    #[must_use]
    pub const fn new(headers: Headers, body: Vec<u8>) -> Self {
        Self { headers, body }
    }

    /// Gets the content type.
    ///
    /// A missing or malformed header yields `text/plain`, per RFC 2045.
    #[must_use]
    pub fn content_type(&self) -> ContentType {
        content_type_of(&self.headers)
    }

    /// Gets the transfer encoding.
    #[must_use]
    pub fn transfer_encoding(&self) -> TransferEncoding {
        self.headers
            .get("content-transfer-encoding")
            .map_or(TransferEncoding::SevenBit, TransferEncoding::parse)
    }

    /// Gets the parsed Content-Disposition header, if any.
    #[must_use]
    pub fn disposition(&self) -> Option<ContentDisposition> {
        self.headers
            .get("content-disposition")
            .map(ContentDisposition::parse)
    }

    /// Returns the suggested filename.
    ///
    /// Looks at the disposition `filename` first, then the content type
    /// `name`. RFC 2047 encoded words are decoded when possible.
    #[must_use]
    pub fn filename(&self) -> Option<String> {
        let raw = self
            .disposition()
            .and_then(|d| d.filename().map(str::to_string))
            .or_else(|| self.content_type().name().map(str::to_string))?;

        Some(decode_value(&raw))
    }

    /// Checks if the part is an attachment.
    ///
    /// Unknown disposition types count as attachments (RFC 2183 §2.8).
    #[must_use]
    pub fn is_attachment(&self) -> bool {
        self.disposition().is_some_and(|d| !d.is_inline())
    }

    /// Checks if the part is inline content other than the message text.
    ///
    /// True for an explicit `inline` disposition, and for non-text parts
    /// without any disposition header.
    #[must_use]
    pub fn is_inline(&self) -> bool {
        match self.disposition() {
            Some(disposition) => disposition.is_inline(),
            None => !self.content_type().is_text(),
        }
    }

    /// Decodes the body according to the transfer encoding.
    ///
    /// # Errors
    ///
    /// Returns an error if decoding fails.
    pub fn decode_body(&self) -> Result<Vec<u8>> {
        match self.transfer_encoding() {
            TransferEncoding::Base64 => {
                let cleaned: Vec<u8> = self
                    .body
                    .iter()
                    .copied()
                    .filter(|byte| !byte.is_ascii_whitespace())
                    .collect();
                decode_base64(cleaned)
            }
            TransferEncoding::QuotedPrintable => Ok(decode_quoted_printable_bytes(&self.body)),
            _ => Ok(self.body.clone()),
        }
    }

    /// Gets the decoded body as a string in the part's charset.
    ///
    /// A missing charset parameter is read as UTF-8.
    ///
    /// # Errors
    ///
    /// Returns an error if the transfer encoding cannot be decoded.
    pub fn body_text(&self) -> Result<String> {
        let decoded = self.decode_body()?;
        let content_type = self.content_type();
        let charset = content_type.charset().unwrap_or("utf-8");
        Ok(decode_charset(&decoded, charset))
    }
}

/// Parsed MIME message.
///
/// Multipart structure is flattened: `parts` holds every leaf part in
/// document order. A single-part message has exactly one part carrying the
/// top-level headers.
#[derive(Debug, Clone)]
pub struct Message {
    /// Message headers.
    pub headers: Headers,
    /// Leaf parts in document order.
    pub parts: Vec<Part>,
}

impl Message {
    /// Parses a raw RFC 5322 message. Line endings may be CRLF or LF.
    ///
    /// Bodies are kept as octets; text is only decoded once the part's
    /// charset is known.
    ///
    /// # Errors
    ///
    /// Returns an error if a multipart entity lacks its boundary, nests
    /// deeper than [`MAX_NESTING_DEPTH`], or contains no delimiter.
    pub fn parse(raw: impl AsRef<[u8]>) -> Result<Self> {
        let (head, body) = split_headers_body(raw.as_ref());
        let headers = Headers::parse_bytes(head);

        let mut parts = Vec::new();
        collect_parts(headers.clone(), body, 0, &mut parts)?;

        Ok(Self { headers, parts })
    }

    /// Gets the content type.
    #[must_use]
    pub fn content_type(&self) -> ContentType {
        content_type_of(&self.headers)
    }

    /// Gets the From header.
    #[must_use]
    pub fn from(&self) -> Option<&str> {
        self.headers.get("from")
    }

    /// Gets the Subject header.
    #[must_use]
    pub fn subject(&self) -> Option<&str> {
        self.headers.get("subject")
    }

    /// Gets the Date header.
    #[must_use]
    pub fn date(&self) -> Option<&str> {
        self.headers.get("date")
    }

    /// Gets a header with RFC 2047 encoded words decoded.
    ///
    /// Malformed encoded words leave the raw value in place.
    #[must_use]
    pub fn decoded_header(&self, name: &str) -> Option<String> {
        self.headers.decoded(name)
    }

    /// Finds the first text/plain part that is not an attachment.
    ///
    /// # Errors
    ///
    /// Returns an error if the part's transfer encoding cannot be decoded.
    pub fn text_part(&self) -> Result<Option<String>> {
        self.body_part("text", "plain")
    }

    /// Finds the first text/html part that is not an attachment.
    ///
    /// # Errors
    ///
    /// Returns an error if the part's transfer encoding cannot be decoded.
    pub fn html_part(&self) -> Result<Option<String>> {
        self.body_part("text", "html")
    }

    /// Iterates over parts with an attachment disposition.
    pub fn attachments(&self) -> impl Iterator<Item = &Part> {
        self.parts.iter().filter(|part| part.is_attachment())
    }

    /// Iterates over inline parts that are not the message text.
    pub fn inlines(&self) -> impl Iterator<Item = &Part> {
        self.parts.iter().filter(|part| part.is_inline())
    }

    fn body_part(&self, main_type: &str, sub_type: &str) -> Result<Option<String>> {
        self.parts
            .iter()
            .find(|part| !part.is_attachment() && part.content_type().is(main_type, sub_type))
            .map(Part::body_text)
            .transpose()
    }
}

fn content_type_of(headers: &Headers) -> ContentType {
    headers
        .get("content-type")
        .and_then(|value| ContentType::parse(value).ok())
        .unwrap_or_else(ContentType::text_plain)
}

/// Splits an entity at the first empty line.
fn split_headers_body(entity: &[u8]) -> (&[u8], &[u8]) {
    if let Some(body) = entity
        .strip_prefix(b"\r\n")
        .or_else(|| entity.strip_prefix(b"\n"))
    {
        return (&entity[..0], body);
    }

    let crlf = find(entity, b"\r\n\r\n").map(|idx| (idx, 4));
    let lf = find(entity, b"\n\n").map(|idx| (idx, 2));
    let separator = match (crlf, lf) {
        (Some(a), Some(b)) => Some(if a.0 <= b.0 { a } else { b }),
        (a, b) => a.or(b),
    };

    match separator {
        Some((idx, len)) => (&entity[..idx], &entity[idx + len..]),
        None => (entity, &entity[entity.len()..]),
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

/// Walks an entity and appends its leaf parts to `out`.
fn collect_parts(headers: Headers, body: &[u8], depth: usize, out: &mut Vec<Part>) -> Result<()> {
    let content_type = content_type_of(&headers);
    if !content_type.is_multipart() {
        out.push(Part::new(headers, body.to_vec()));
        return Ok(());
    }

    if depth >= MAX_NESTING_DEPTH {
        return Err(Error::InvalidMultipart(format!(
            "nested deeper than {MAX_NESTING_DEPTH} levels"
        )));
    }
    let boundary = content_type.boundary().ok_or(Error::MissingBoundary)?;

    for section in split_multipart(body, boundary)? {
        let (head, content) = split_headers_body(section);
        collect_parts(Headers::parse_bytes(head), content, depth + 1, out)?;
    }
    Ok(())
}

/// Splits a multipart body into its sections.
///
/// The preamble and epilogue are discarded. A body missing its closing
/// delimiter keeps the last open section.
fn split_multipart<'a>(body: &'a [u8], boundary: &str) -> Result<Vec<&'a [u8]>> {
    let delimiter = format!("--{boundary}");
    let mut sections = Vec::new();
    let mut open: Option<usize> = None;
    let mut offset = 0;

    for line in body.split_inclusive(|&byte| byte == b'\n') {
        let rest = line.trim_ascii_end().strip_prefix(delimiter.as_bytes());
        if let Some(rest) = rest
            && (rest.is_empty() || rest == b"--")
        {
            if let Some(start) = open.take() {
                sections.push(strip_line_break(&body[start..offset]));
            }
            if rest == b"--" {
                return Ok(sections);
            }
            open = Some(offset + line.len());
        }
        offset += line.len();
    }

    match open {
        Some(start) => sections.push(&body[start..]),
        None if sections.is_empty() => {
            return Err(Error::InvalidMultipart(format!(
                "no delimiter for boundary {boundary:?}"
            )));
        }
        None => {}
    }
    Ok(sections)
}

/// Removes the line break that belongs to the following delimiter.
fn strip_line_break(section: &[u8]) -> &[u8] {
    section
        .strip_suffix(b"\r\n")
        .or_else(|| section.strip_suffix(b"\n"))
        .unwrap_or(section)
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;

    const MIXED: &str = concat!(
        "From: =?utf-8?Q?J=C3=BCrgen?= <j@example.com>\r\n",
        "Subject: Photos\r\n",
        "Date: Tue, 1 Jul 2025 10:00:00 +0200\r\n",
        "Content-Type: multipart/mixed; boundary=\"outer\"\r\n",
        "\r\n",
        "This is a preamble.\r\n",
        "--outer\r\n",
        "Content-Type: multipart/alternative; boundary=inner\r\n",
        "\r\n",
        "--inner\r\n",
        "Content-Type: text/plain; charset=utf-8\r\n",
        "Content-Transfer-Encoding: quoted-printable\r\n",
        "\r\n",
        "Sch=C3=B6ne Gr=C3=BC=C3=9Fe\r\n",
        "--inner\r\n",
        "Content-Type: text/html\r\n",
        "\r\n",
        "<p>Hi</p>\r\n",
        "--inner--\r\n",
        "--outer\r\n",
        "Content-Type: image/png\r\n",
        "Content-Disposition: attachment; filename=\"a.png\"\r\n",
        "Content-Transfer-Encoding: base64\r\n",
        "\r\n",
        "iVBORw0K\r\n",
        "GgoA\r\n",
        "--outer\r\n",
        "Content-Type: image/jpeg; name=\"logo.jpg\"\r\n",
        "Content-ID: <logo>\r\n",
        "\r\n",
        "raw\r\n",
        "--outer--\r\n",
        "epilogue\r\n",
    );

    #[test]
    fn test_transfer_encoding_parse() {
        assert_eq!(TransferEncoding::parse("7bit"), TransferEncoding::SevenBit);
        assert_eq!(TransferEncoding::parse("base64"), TransferEncoding::Base64);
        assert_eq!(
            TransferEncoding::parse("Quoted-Printable"),
            TransferEncoding::QuotedPrintable
        );
    }

    #[test]
    fn test_part_body_text_charset() {
        let headers = Headers::parse("Content-Type: text/plain; charset=iso-8859-1\n");
        let part = Part::new(headers, b"caf\xe9".to_vec());

        assert_eq!(part.body_text().unwrap(), "café");
    }

    #[test]
    fn test_part_body_text_defaults_to_utf8() {
        let part = Part::new(Headers::default(), "Grüße".as_bytes().to_vec());
        assert_eq!(part.body_text().unwrap(), "Grüße");
    }

    #[test]
    fn test_parse_single_part() {
        let raw = "From: a@example.com\nSubject: Test\n\nHello, World!\n";
        let message = Message::parse(raw).unwrap();

        assert_eq!(message.from(), Some("a@example.com"));
        assert_eq!(message.subject(), Some("Test"));
        assert_eq!(message.parts.len(), 1);
        assert_eq!(message.text_part().unwrap().unwrap(), "Hello, World!\n");
        assert_eq!(message.attachments().count(), 0);
        assert_eq!(message.inlines().count(), 0);
    }

    #[test]
    fn test_parse_nested_multipart() {
        let message = Message::parse(MIXED).unwrap();

        assert_eq!(message.parts.len(), 4);
        assert_eq!(message.text_part().unwrap().unwrap(), "Schöne Grüße");
        assert_eq!(message.html_part().unwrap().unwrap(), "<p>Hi</p>");
        assert_eq!(
            message.decoded_header("from").unwrap(),
            "Jürgen <j@example.com>"
        );
    }

    #[test]
    fn test_attachments_and_inlines() {
        let message = Message::parse(MIXED).unwrap();

        let attachments: Vec<_> = message.attachments().collect();
        assert_eq!(attachments.len(), 1);
        assert_eq!(attachments[0].filename().as_deref(), Some("a.png"));
        assert_eq!(
            attachments[0].decode_body().unwrap(),
            b"\x89PNG\r\n\x1a\n\0"
        );

        let inlines: Vec<_> = message.inlines().collect();
        assert_eq!(inlines.len(), 1);
        assert_eq!(inlines[0].filename().as_deref(), Some("logo.jpg"));
        assert_eq!(inlines[0].body, b"raw");
    }

    #[test]
    fn test_filename_from_continued_parameter() {
        let headers = Headers::parse(concat!(
            "Content-Type: image/jpeg\n",
            "Content-Disposition: attachment;\n",
            " filename*0=\"holiday photo from the \";\n",
            " filename*1=\"beach.jpg\"\n",
        ));
        let part = Part::new(headers, Vec::new());
        assert_eq!(
            part.filename().as_deref(),
            Some("holiday photo from the beach.jpg")
        );
    }

    #[test]
    fn test_attached_text_is_not_the_body() {
        let raw = concat!(
            "Content-Type: multipart/mixed; boundary=b\n",
            "\n",
            "--b\n",
            "Content-Type: text/plain\n",
            "Content-Disposition: attachment; filename=notes.txt\n",
            "\n",
            "attached\n",
            "--b\n",
            "Content-Type: text/html\n",
            "\n",
            "<b>body</b>\n",
            "--b--\n",
        );
        let message = Message::parse(raw).unwrap();

        assert_eq!(message.text_part().unwrap(), None);
        assert_eq!(message.html_part().unwrap().unwrap(), "<b>body</b>");
    }

    #[test]
    fn test_parse_missing_boundary() {
        let raw = "Content-Type: multipart/mixed\r\n\r\n--x\r\n\r\nbody\r\n--x--\r\n";
        assert!(matches!(Message::parse(raw), Err(Error::MissingBoundary)));
    }

    #[test]
    fn test_parse_without_delimiters() {
        let raw = "Content-Type: multipart/mixed; boundary=zz\r\n\r\nnothing here\r\n";
        assert!(matches!(
            Message::parse(raw),
            Err(Error::InvalidMultipart(_))
        ));
    }

    #[test]
    fn test_parse_unterminated_multipart() {
        let raw = "Content-Type: multipart/mixed; boundary=zz\n\n--zz\n\ntail text\n";
        let message = Message::parse(raw).unwrap();
        assert_eq!(message.parts.len(), 1);
        assert_eq!(message.text_part().unwrap().unwrap(), "tail text\n");
    }

    #[test]
    fn test_parse_nesting_limit() {
        let mut raw = String::new();
        for depth in 0..=MAX_NESTING_DEPTH {
            raw.push_str(&format!(
                "Content-Type: multipart/mixed; boundary=b{depth}\n\n--b{depth}\n"
            ));
        }
        raw.push_str("\nleaf\n");

        assert!(matches!(
            Message::parse(&raw),
            Err(Error::InvalidMultipart(_))
        ));
    }

    #[test]
    fn test_quoted_printable_soft_break_before_end() {
        let single = "Content-Transfer-Encoding: quoted-printable\n\nHello wor=\nld=";
        let message = Message::parse(single).unwrap();
        assert_eq!(message.text_part().unwrap().unwrap(), "Hello world");

        let multipart = concat!(
            "Content-Type: multipart/mixed; boundary=b\n",
            "\n",
            "--b\n",
            "Content-Transfer-Encoding: quoted-printable\n",
            "\n",
            "Hello=\n",
            "--b--\n",
        );
        let message = Message::parse(multipart).unwrap();
        assert_eq!(message.text_part().unwrap().unwrap(), "Hello");
    }

    #[test]
    fn test_8bit_body_decoded_with_part_charset() {
        let raw: &[u8] = b"Content-Type: multipart/mixed; boundary=b\r\n\r\n\
--b\r\n\
Content-Type: text/plain; charset=iso-8859-1\r\n\
Content-Transfer-Encoding: 8bit\r\n\r\n\
caf\xe9\r\n\
--b--\r\n";
        let message = Message::parse(raw).unwrap();
        assert_eq!(message.parts[0].body, b"caf\xe9");
        assert_eq!(message.text_part().unwrap().unwrap(), "café");
    }

    #[test]
    fn test_malformed_content_type_is_text() {
        let raw = "Content-Type: garbage\n\nplain body";
        let message = Message::parse(raw).unwrap();
        assert_eq!(message.text_part().unwrap().unwrap(), "plain body");
    }
}
