//! The Content-Type field (RFC 2045 §5).

use crate::error::{Error, Result};
use crate::params::{Parameters, split_structured};

/// Media type of a body part.
///
/// Type and subtype are stored lowercase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentType {
    main_type: String,
    sub_type: String,
    parameters: Parameters,
}

impl ContentType {
    /// Media type without parameters.
    #[must_use]
    pub fn new(main_type: &str, sub_type: &str) -> Self {
        Self {
            main_type: main_type.to_ascii_lowercase(),
            sub_type: sub_type.to_ascii_lowercase(),
            parameters: Parameters::default(),
        }
    }

    /// `text/plain`, assumed when a part has no usable Content-Type.
    #[must_use]
    pub fn text_plain() -> Self {
        Self::new("text", "plain")
    }

    /// Top-level type, e.g. `image`.
    #[must_use]
    pub fn main_type(&self) -> &str {
        &self.main_type
    }

    /// Subtype, e.g. `jpeg`.
    #[must_use]
    pub fn sub_type(&self) -> &str {
        &self.sub_type
    }

    /// `type/subtype`.
    #[must_use]
    pub fn essence(&self) -> String {
        format!("{}/{}", self.main_type, self.sub_type)
    }

    /// Matches type and subtype, ignoring case.
    #[must_use]
    pub fn is(&self, main_type: &str, sub_type: &str) -> bool {
        self.main_type.eq_ignore_ascii_case(main_type)
            && self.sub_type.eq_ignore_ascii_case(sub_type)
    }

    /// All parameters.
    #[must_use]
    pub const fn parameters(&self) -> &Parameters {
        &self.parameters
    }

    /// `charset` parameter.
    #[must_use]
    pub fn charset(&self) -> Option<&str> {
        self.parameters.get("charset")
    }

    /// `boundary` parameter.
    #[must_use]
    pub fn boundary(&self) -> Option<&str> {
        self.parameters.get("boundary")
    }

    /// Legacy `name` parameter, used by some mailers instead of a
    /// disposition filename.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.parameters.get("name")
    }

    /// Whether this is a `multipart/*` container.
    #[must_use]
    pub fn is_multipart(&self) -> bool {
        self.main_type == "multipart"
    }

    /// Whether this is any `text/*` type.
    #[must_use]
    pub fn is_text(&self) -> bool {
        self.main_type == "text"
    }

    /// Parses a field value such as `text/plain; charset="utf-8"`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidContentType`] if the type or subtype is missing.
    pub fn parse(value: &str) -> Result<Self> {
        let (token, parameters) = split_structured(value);

        let Some((main_type, sub_type)) = token.split_once('/') else {
            return Err(Error::InvalidContentType(format!(
                "expected type/subtype, got {token:?}"
            )));
        };
        let (main_type, sub_type) = (main_type.trim(), sub_type.trim());
        if main_type.is_empty() || sub_type.is_empty() {
            return Err(Error::InvalidContentType(format!(
                "expected type/subtype, got {token:?}"
            )));
        }

        Ok(Self {
            parameters,
            ..Self::new(main_type, sub_type)
        })
    }
}
