//! Turns raw mail text into a [`Record`].

use std::path::PathBuf;

use chrono::{DateTime, FixedOffset};
use pinboard_mime::{Message, Part};
use tracing::{debug, info};

use crate::attachment::AttachmentStore;
use crate::record::Record;
use crate::{Error, Result};

/// Content types stored as images. Everything else is skipped.
const IMAGE_TYPES: [(&str, &str); 2] = [("image", "jpeg"), ("image", "png")];

/// Builds records from fetched messages, storing their images on the way.
#[derive(Debug, Clone)]
pub struct MessageParser {
    attachments: AttachmentStore,
}

impl MessageParser {
    /// Create a parser writing images into `attachments`.
    #[must_use]
    pub const fn new(attachments: AttachmentStore) -> Self {
        Self { attachments }
    }

    /// Attachment store used for images.
    #[must_use]
    pub const fn attachments(&self) -> &AttachmentStore {
        &self.attachments
    }

    /// Parses one message from its raw octets.
    ///
    /// The Date header is checked before any image is written. If storing
    /// any image fails, images already written for this message are removed.
    ///
    /// # Errors
    ///
    /// - [`Error::Mime`] if the MIME structure is broken
    /// - [`Error::Parse`] if the Date header is missing or unreadable, or the
    ///   body cannot be decoded
    /// - [`Error::Attachment`] if an image cannot be stored
    pub fn parse(&self, raw: impl AsRef<[u8]>) -> Result<Record> {
        let message = Message::parse(raw)?;

        let date = message
            .date()
            .ok_or_else(|| Error::Parse("missing Date header".to_string()))?;
        let timestamp = parse_date(date)?;

        let sender_name = message.decoded_header("from").unwrap_or_default();
        let short_text = message.decoded_header("subject").unwrap_or_default();
        let long_text = body_text(&message)?;

        let image_names = self.store_images(&message)?;

        info!(
            sender = %sender_name,
            subject = %short_text,
            images = image_names.len(),
            "Parsed message"
        );
        Ok(Record::email(
            timestamp,
            sender_name,
            short_text,
            long_text,
            image_names,
        ))
    }

    /// Stores attachments first, then inline parts.
    fn store_images(&self, message: &Message) -> Result<Vec<PathBuf>> {
        let mut stored = Vec::new();

        for part in message.attachments().chain(message.inlines()) {
            let content_type = part.content_type();
            if !IMAGE_TYPES
                .iter()
                .any(|(main, sub)| content_type.is(main, sub))
            {
                debug!(content_type = %content_type.essence(), "Skipping part");
                continue;
            }

            match self.store_image(part) {
                Ok(path) => stored.push(path),
                Err((filename, source)) => {
                    self.attachments.discard(&stored);
                    return Err(Error::Attachment {
                        filename,
                        source: Box::new(source),
                    });
                }
            }
        }

        Ok(stored)
    }

    fn store_image(&self, part: &Part) -> std::result::Result<PathBuf, (String, Error)> {
        let filename = part.filename().unwrap_or_default();
        let bytes = part
            .decode_body()
            .map_err(|e| (filename.clone(), Error::Mime(e)))?;

        self.attachments
            .store(&bytes, strip_extension(&filename))
            .map_err(|e| (filename, e))
    }
}

/// Parses an RFC 2822 date, tolerating a trailing comment such as `(UTC)`.
fn parse_date(value: &str) -> Result<DateTime<FixedOffset>> {
    let value = value.trim();
    let value = match value.rfind('(') {
        Some(idx) if value.ends_with(')') => value[..idx].trim_end(),
        _ => value,
    };

    DateTime::parse_from_rfc2822(value)
        .map_err(|e| Error::Parse(format!("invalid Date header {value:?}: {e}")))
}

/// First plain-text body, else the first HTML body converted to text.
fn body_text(message: &Message) -> Result<String> {
    if let Some(text) = message.text_part()? {
        return Ok(text);
    }
    match message.html_part()? {
        Some(html) => {
            htmd::convert(&html).map_err(|e| Error::Parse(format!("cannot convert HTML body: {e}")))
        }
        None => Ok(String::new()),
    }
}

/// Drops the last `.ext` unless the dot starts the name.
fn strip_extension(filename: &str) -> &str {
    match filename.rfind('.') {
        Some(idx) if idx > 0 => &filename[..idx],
        _ => filename,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::attachment::RawImage;
    use crate::record::RecordKind;
    use image::{ImageFormat, Rgba, RgbaImage};
    use pinboard_mime::encoding::encode_base64;
    use std::io::Cursor;

    fn png_base64(width: u32, height: u32) -> String {
        let img = RgbaImage::from_pixel(width, height, Rgba([1, 2, 3, 255]));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, ImageFormat::Png).unwrap();
        encode_base64(&out.into_inner())
    }

    fn image_part(disposition: &str, content_type: &str, filename: &str, body: &str) -> String {
        format!(
            "--b\nContent-Type: {content_type}\nContent-Disposition: {disposition}; filename=\"{filename}\"\nContent-Transfer-Encoding: base64\n\n{body}\n"
        )
    }

    fn message(date: Option<&str>, parts: &[String]) -> String {
        let mut raw = String::new();
        raw.push_str("From: =?utf-8?Q?Ren=C3=A9?= <rene@example.com>\n");
        raw.push_str("Subject: Garden news\n");
        if let Some(date) = date {
            raw.push_str(&format!("Date: {date}\n"));
        }
        raw.push_str("Content-Type: multipart/mixed; boundary=b\n\n");
        raw.push_str("--b\nContent-Type: text/plain; charset=utf-8\n\nTomatoes!\n");
        for part in parts {
            raw.push_str(part);
        }
        raw.push_str("--b--\n");
        raw
    }

    fn parser(dir: &std::path::Path) -> MessageParser {
        MessageParser::new(AttachmentStore::new(dir))
    }

    #[test]
    fn test_parse_text_message() {
        let dir = tempfile::tempdir().unwrap();
        let raw = message(Some("Thu, 3 Jul 2025 08:15:00 +0200"), &[]);

        let record = parser(dir.path()).parse(&raw).unwrap();
        assert_eq!(record.kind, RecordKind::Email);
        assert_eq!(record.sender_name, "René <rene@example.com>");
        assert_eq!(record.short_text, "Garden news");
        assert_eq!(record.long_text, "Tomatoes!");
        assert_eq!(record.timestamp.to_rfc3339(), "2025-07-03T08:15:00+02:00");
        assert!(record.image_names.is_empty());
    }

    #[test]
    fn test_parse_stores_attachments_then_inlines() {
        let dir = tempfile::tempdir().unwrap();
        let raw = message(
            Some("Thu, 3 Jul 2025 08:15:00 +0200"),
            &[
                image_part("inline", "image/png", "inline one.png", &png_base64(2, 2)),
                image_part("attachment", "image/png", "IMG_0001.PNG", &png_base64(3, 1)),
                image_part("attachment", "application/pdf", "doc.pdf", "JVBERi0="),
            ],
        );

        let record = parser(dir.path()).parse(&raw).unwrap();
        assert_eq!(
            record.image_names,
            vec![dir.path().join("IMG_0001.rgba"), dir.path().join("inlineone.rgba")]
        );

        let raw_image = RawImage::load(&record.image_names[0]).unwrap();
        assert_eq!((raw_image.width, raw_image.height), (3, 1));
    }

    #[test]
    fn test_parse_missing_date_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let raw = message(
            None,
            &[image_part("attachment", "image/png", "a.png", &png_base64(1, 1))],
        );

        let err = parser(dir.path()).parse(&raw).unwrap_err();
        assert!(matches!(err, Error::Parse(_)));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_parse_invalid_date() {
        let dir = tempfile::tempdir().unwrap();
        let raw = message(Some("yesterday-ish"), &[]);
        assert!(matches!(
            parser(dir.path()).parse(&raw),
            Err(Error::Parse(_))
        ));
    }

    #[test]
    fn test_failed_attachment_removes_earlier_images() {
        let dir = tempfile::tempdir().unwrap();
        let raw = message(
            Some("Thu, 3 Jul 2025 08:15:00 +0200"),
            &[
                image_part("attachment", "image/png", "good.png", &png_base64(1, 1)),
                image_part("attachment", "image/jpeg", "bad.jpg", "bm90IGEganBlZw=="),
            ],
        );

        let err = parser(dir.path()).parse(&raw).unwrap_err();
        match err {
            Error::Attachment { filename, source } => {
                assert_eq!(filename, "bad.jpg");
                assert!(matches!(*source, Error::Image(_)));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_html_only_body_is_converted() {
        let dir = tempfile::tempdir().unwrap();
        let raw = concat!(
            "From: a@example.com\n",
            "Date: Thu, 3 Jul 2025 08:15:00 +0000\n",
            "Content-Type: text/html; charset=utf-8\n",
            "\n",
            "<p>Hello <b>there</b></p>\n",
        );

        let record = parser(dir.path()).parse(raw).unwrap();
        assert!(record.long_text.contains("Hello"));
        assert!(record.long_text.contains("there"));
        assert!(!record.long_text.contains("<p>"));
    }

    #[test]
    fn test_quoted_printable_body_ending_in_soft_break() {
        let dir = tempfile::tempdir().unwrap();
        let single = concat!(
            "From: a@example.com\n",
            "Date: Thu, 3 Jul 2025 08:15:00 +0000\n",
            "Content-Transfer-Encoding: quoted-printable\n",
            "\n",
            "Hello wor=\n",
            "ld=",
        );
        let record = parser(dir.path()).parse(single).unwrap();
        assert_eq!(record.long_text, "Hello world");

        let multipart = concat!(
            "From: a@example.com\n",
            "Date: Thu, 3 Jul 2025 08:15:00 +0000\n",
            "Content-Type: multipart/alternative; boundary=b\n",
            "\n",
            "--b\n",
            "Content-Type: text/plain\n",
            "Content-Transfer-Encoding: quoted-printable\n",
            "\n",
            "Hello=\n",
            "--b--\n",
        );
        let record = parser(dir.path()).parse(multipart).unwrap();
        assert_eq!(record.long_text, "Hello");
    }

    #[test]
    fn test_latin1_8bit_body() {
        let dir = tempfile::tempdir().unwrap();
        let raw: &[u8] = b"From: a@example.com\n\
Date: Thu, 3 Jul 2025 08:15:00 +0000\n\
Content-Type: text/plain; charset=iso-8859-1\n\
Content-Transfer-Encoding: 8bit\n\
\n\
caf\xe9";
        let record = parser(dir.path()).parse(raw).unwrap();
        assert_eq!(record.long_text, "caf\u{e9}");
    }

    #[test]
    fn test_parse_date_variants() {
        let with_comment = parse_date("Fri, 4 Jul 2025 12:00:00 +0000 (UTC)").unwrap();
        assert_eq!(with_comment.to_rfc3339(), "2025-07-04T12:00:00+00:00");

        let without_weekday = parse_date(" 4 Jul 2025 12:00:00 -0700 ").unwrap();
        assert_eq!(without_weekday.offset().local_minus_utc(), -7 * 3600);
    }

    #[test]
    fn test_strip_extension() {
        assert_eq!(strip_extension("photo.jpeg"), "photo");
        assert_eq!(strip_extension("archive.tar.gz"), "archive.tar");
        assert_eq!(strip_extension(".hidden"), ".hidden");
        assert_eq!(strip_extension("noext"), "noext");
    }
}
