//! Header fields of a message or body part.

use std::borrow::Cow;

use encoding_rs::WINDOWS_1252;

use crate::encoding::decode_rfc2047;

/// One `Name: value` field, unfolded.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Field {
    name: String,
    value: String,
}

/// Header fields in the order they appeared.
///
/// Lookups ignore ASCII case. Repeated fields are all kept.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    fields: Vec<Field>,
}

impl Headers {
    /// Parses a header block, stopping at the first empty line.
    ///
    /// Folded lines are joined with a single space. Lines that are neither a
    /// field nor a continuation are dropped.
    #[must_use]
    pub fn parse(text: &str) -> Self {
        let mut headers = Self::default();

        for line in text.lines().take_while(|line| !line.is_empty()) {
            if line.starts_with([' ', '\t']) {
                if let Some(last) = headers.fields.last_mut() {
                    let folded = line.trim();
                    if !folded.is_empty() {
                        if !last.value.is_empty() {
                            last.value.push(' ');
                        }
                        last.value.push_str(folded);
                    }
                }
                continue;
            }

            match line.split_once(':') {
                Some((name, value)) if !name.trim().is_empty() => {
                    headers.push(name.trim(), value.trim());
                }
                _ => {}
            }
        }

        headers
    }

    /// Parses a raw header block.
    ///
    /// Each line is read as UTF-8, or as Windows-1252 when it is not valid
    /// UTF-8, so stray 8-bit header text survives.
    #[must_use]
    pub fn parse_bytes(raw: &[u8]) -> Self {
        let text: String = raw
            .split_inclusive(|&byte| byte == b'\n')
            .map(decode_line)
            .collect();
        Self::parse(&text)
    }

    /// Appends a field.
    pub fn push(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.fields.push(Field {
            name: name.into(),
            value: value.into(),
        });
    }

    /// First value of `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|field| field.name.eq_ignore_ascii_case(name))
            .map(|field| field.value.as_str())
    }

    /// Every value of `name`, in order.
    pub fn get_all<'a>(&'a self, name: &str) -> impl Iterator<Item = &'a str> {
        self.fields
            .iter()
            .filter(move |field| field.name.eq_ignore_ascii_case(name))
            .map(|field| field.value.as_str())
    }

    /// First value of `name` with RFC 2047 encoded words decoded.
    #[must_use]
    pub fn decoded(&self, name: &str) -> Option<String> {
        self.get(name).map(decode_value)
    }

    /// All fields as `(name, value)`, in order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields
            .iter()
            .map(|field| (field.name.as_str(), field.value.as_str()))
    }

    /// Number of fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether there are no fields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

fn decode_line(line: &[u8]) -> Cow<'_, str> {
    match std::str::from_utf8(line) {
        Ok(text) => Cow::Borrowed(text),
        Err(_) => WINDOWS_1252.decode_without_bom_handling(line).0,
    }
}

/// Decodes RFC 2047 encoded words, keeping the raw text if that fails.
#[must_use]
pub fn decode_value(value: &str) -> String {
    decode_rfc2047(value).unwrap_or_else(|_| value.to_string())
}
