//! MIME decoding utilities.
//!
//! Supports Base64, Quoted-Printable, RFC 2047 header words and charset
//! conversion.

use crate::error::{Error, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use encoding_rs::{Encoding, UTF_8};

/// Encodes data as Base64.
#[must_use]
pub fn encode_base64(data: &[u8]) -> String {
    STANDARD.encode(data)
}

/// Decodes Base64 data.
///
/// # Errors
///
/// Returns an error if the input is not valid Base64.
pub fn decode_base64(data: impl AsRef<[u8]>) -> Result<Vec<u8>> {
    STANDARD.decode(data).map_err(Into::into)
}

/// Decodes Quoted-Printable data (RFC 2045) to raw bytes.
///
/// Decoding is lenient, as RFC 2045 §6.7 suggests:
/// - `=` followed by optional blanks and then CRLF, LF or the end of the
///   input is a soft line break
/// - an `=` not followed by two hex digits is kept literally
#[must_use]
pub fn decode_quoted_printable_bytes(data: impl AsRef<[u8]>) -> Vec<u8> {
    let data = data.as_ref();
    let mut result = Vec::with_capacity(data.len());
    let mut i = 0;

    while i < data.len() {
        if data[i] != b'=' {
            result.push(data[i]);
            i += 1;
            continue;
        }

        let rest = &data[i + 1..];
        let blanks = rest.iter().take_while(|b| matches!(b, b' ' | b'\t')).count();
        let soft_break = match &rest[blanks..] {
            [] => Some(0),
            [b'\n', ..] => Some(1),
            [b'\r', b'\n', ..] => Some(2),
            _ => None,
        };
        if let Some(eol) = soft_break {
            i += 1 + blanks + eol;
            continue;
        }

        match rest.get(..2).and_then(hex_byte) {
            Some(byte) => {
                result.push(byte);
                i += 3;
            }
            None => {
                result.push(b'=');
                i += 1;
            }
        }
    }

    result
}

fn hex_byte(pair: &[u8]) -> Option<u8> {
    let high = char::from(pair[0]).to_digit(16)?;
    let low = char::from(pair[1]).to_digit(16)?;
    u8::try_from((high << 4) | low).ok()
}

/// Decodes Quoted-Printable text (RFC 2045) as UTF-8.
///
/// # Errors
///
/// Returns an error if the decoded bytes are not UTF-8.
pub fn decode_quoted_printable(text: &str) -> Result<String> {
    String::from_utf8(decode_quoted_printable_bytes(text)).map_err(Into::into)
}

/// Converts bytes in the named charset to a string.
///
/// Unknown labels fall back to UTF-8; malformed sequences become U+FFFD.
#[must_use]
pub fn decode_charset(bytes: &[u8], charset: &str) -> String {
    let encoding = Encoding::for_label(charset.trim().as_bytes()).unwrap_or(UTF_8);
    let (text, _, _) = encoding.decode(bytes);
    text.into_owned()
}

/// Decodes every RFC 2047 encoded word in a header value.
///
/// Format: `=?charset?encoding?encoded-text?=`. Whitespace separating two
/// adjacent encoded words is dropped, as the RFC requires.
///
/// # Errors
///
/// Returns an error if an encoded word carries invalid Base64 or
/// Quoted-Printable data, or an unknown encoding letter.
pub fn decode_rfc2047(text: &str) -> Result<String> {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    let mut last_was_encoded = false;

    while let Some(start) = rest.find("=?") {
        let (before, candidate) = rest.split_at(start);

        if let Some((decoded, consumed)) = parse_encoded_word(candidate) {
            if !(last_was_encoded && before.trim().is_empty()) {
                out.push_str(before);
            }
            out.push_str(&decoded?);
            rest = &candidate[consumed..];
            last_was_encoded = true;
        } else {
            out.push_str(before);
            out.push_str("=?");
            rest = &candidate[2..];
            last_was_encoded = false;
        }
    }

    out.push_str(rest);
    Ok(out)
}

/// Parses one encoded word at the start of `word`.
///
/// Returns `None` if the text is not shaped like an encoded word, otherwise
/// the decoding result and the number of bytes consumed.
fn parse_encoded_word(word: &str) -> Option<(Result<String>, usize)> {
    let inner = word.strip_prefix("=?")?;
    let (charset, rest) = inner.split_once('?')?;
    let (encoding, rest) = rest.split_once('?')?;
    let end = rest.find("?=")?;
    let encoded_text = &rest[..end];

    if charset.is_empty() || encoding.len() != 1 || encoded_text.contains(char::is_whitespace) {
        return None;
    }

    let consumed = 2 + charset.len() + 1 + encoding.len() + 1 + end + 2;
    // RFC 2231 language suffix: charset*lang
    let charset = charset.split('*').next().unwrap_or(charset);

    let bytes = match encoding {
        "B" | "b" => decode_base64(encoded_text),
        "Q" | "q" => Ok(decode_quoted_printable_bytes(encoded_text.replace('_', " "))),
        other => Err(Error::InvalidEncoding(format!("Unknown encoding: {other}"))),
    };

    Some((bytes.map(|b| decode_charset(&b, charset)), consumed))
}
