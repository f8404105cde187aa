//! Parameters of structured header fields.
//!
//! `Content-Type` and `Content-Disposition` share one syntax: a leading
//! token followed by `; key=value` pairs. Values may be quoted, and RFC 2231
//! extended values (`key*=charset'lang'%XX`) are decoded.

use crate::encoding::decode_charset;

/// Parameters keyed by name, compared without ASCII case.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Parameters {
    entries: Vec<(String, String)>,
}

impl Parameters {
    /// Value of `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(key))
            .map(|(_, value)| value.as_str())
    }

    /// Number of parameters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether there are no parameters.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All parameters as `(lowercase name, value)`.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }

    /// First plain value wins. An extended value replaces a plain one.
    fn insert(&mut self, name: String, value: String, extended: bool) {
        match self.entries.iter_mut().find(|(existing, _)| *existing == name) {
            Some(entry) if extended => entry.1 = value,
            Some(_) => {}
            None => self.entries.push((name, value)),
        }
    }
}

/// One `name*N` or `name*N*` piece of a continued parameter (RFC 2231 §3).
#[derive(Debug)]
struct Section<'a> {
    index: u32,
    extended: bool,
    value: &'a str,
}

/// Splits a structured value into its leading token and its parameters.
///
/// Malformed pairs (no `=`) are skipped. Continued parameters are joined in
/// section order and replace a plain value of the same name.
pub(crate) fn split_structured(value: &str) -> (&str, Parameters) {
    let mut segments = segments(value).into_iter();
    let token = segments.next().unwrap_or_default();

    let mut parameters = Parameters::default();
    let mut continued: Vec<(String, Vec<Section<'_>>)> = Vec::new();

    for segment in segments {
        let Some((name, raw)) = segment.split_once('=') else {
            continue;
        };
        let lowered = name.trim().to_ascii_lowercase();
        let raw = raw.trim().trim_matches('"');
        let (name, extended) = match lowered.strip_suffix('*') {
            Some(plain) => (plain, true),
            None => (lowered.as_str(), false),
        };

        if let Some((base, index)) = name.split_once('*')
            && let Ok(index) = index.parse::<u32>()
        {
            let section = Section {
                index,
                extended,
                value: raw,
            };
            match continued.iter_mut().find(|(existing, _)| existing == base) {
                Some((_, sections)) => sections.push(section),
                None => continued.push((base.to_string(), vec![section])),
            }
            continue;
        }

        let value = if extended {
            decode_extended(raw)
        } else {
            raw.to_string()
        };
        parameters.insert(name.to_string(), value, extended);
    }

    for (name, mut sections) in continued {
        sections.sort_by_key(|section| section.index);
        parameters.insert(name, join_sections(&sections), true);
    }

    (token, parameters)
}

/// Splits on `;` outside quoted strings.
fn segments(value: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut quoted = false;
    let mut start = 0;

    for (i, c) in value.char_indices() {
        match c {
            '"' => quoted = !quoted,
            ';' if !quoted => {
                out.push(value[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    out.push(value[start..].trim());
    out
}

/// Decodes `charset'language'percent-encoded`. Anything else is kept as is.
fn decode_extended(value: &str) -> String {
    match split_charset(value) {
        Some((charset, encoded)) => decode_charset(&percent_decode(encoded), charset),
        None => value.to_string(),
    }
}

/// Joins continuation sections. Only the first one may name a charset.
fn join_sections(sections: &[Section<'_>]) -> String {
    let mut charset = "utf-8";
    let mut bytes = Vec::new();

    for (position, section) in sections.iter().enumerate() {
        if !section.extended {
            bytes.extend_from_slice(section.value.as_bytes());
            continue;
        }
        let mut encoded = section.value;
        if position == 0
            && let Some((label, rest)) = split_charset(encoded)
        {
            charset = label;
            encoded = rest;
        }
        bytes.extend(percent_decode(encoded));
    }

    decode_charset(&bytes, charset)
}

fn split_charset(value: &str) -> Option<(&str, &str)> {
    let mut fields = value.splitn(3, '\'');
    let (Some(charset), Some(_language), Some(encoded)) =
        (fields.next(), fields.next(), fields.next())
    else {
        return None;
    };
    Some((charset, encoded))
}

/// `%XX` escapes to bytes. Broken escapes are kept.
fn percent_decode(encoded: &str) -> Vec<u8> {
    let bytes = encoded.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%'
            && let Some(byte) = bytes
                .get(i + 1..i + 3)
                .and_then(|hex| std::str::from_utf8(hex).ok())
                .and_then(|hex| u8::from_str_radix(hex, 16).ok())
        {
            decoded.push(byte);
            i += 3;
        } else {
            decoded.push(bytes[i]);
            i += 1;
        }
    }
    decoded
}
