//! Collision-free attachment file names.

use std::fs::{File, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::{Error, Result};

/// Extension of normalized image files.
pub const IMAGE_EXTENSION: &str = "rgba";

/// Number of numbered suffixes tried after the plain name is taken.
pub const MAX_SUFFIXES: u32 = 10_000;

/// Base name used when nothing usable is left after cleaning.
const FALLBACK_BASE: &str = "attachment";

/// Reduces an announced attachment name to a safe file stem.
///
/// Keeps the last path component, drops whitespace and control characters,
/// replaces characters that are reserved on common filesystems, and strips
/// leading dots.
#[must_use]
pub fn clean_base(name: &str) -> String {
    let component = name.rsplit(['/', '\\']).next().unwrap_or(name);

    let cleaned: String = component
        .chars()
        .filter(|c| !c.is_whitespace() && !c.is_control())
        .map(|c| match c {
            ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c => c,
        })
        .collect();

    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        FALLBACK_BASE.to_string()
    } else {
        cleaned.to_string()
    }
}

/// Candidate file names for `base`, in probing order.
///
/// `<base>.<ext>` first, then `<base>-0000.<ext>` up to `<base>-9999.<ext>`.
pub fn candidates<'a>(base: &'a str, extension: &'a str) -> impl Iterator<Item = String> + 'a {
    std::iter::once(format!("{base}.{extension}")).chain(
        (0..MAX_SUFFIXES).map(move |n| format!("{base}-{n:04}.{extension}")),
    )
}

/// Creates the first free candidate file in `dir`.
///
/// Existence check and creation are one atomic `create_new` open, so two
/// writers never receive the same name.
///
/// # Errors
///
/// Returns [`Error::NameExhausted`] when every candidate exists, and
/// [`Error::Io`] for any other open failure.
pub fn create_unique(dir: &Path, base: &str, extension: &str) -> Result<(PathBuf, File)> {
    for name in candidates(base, extension) {
        let path = dir.join(name);
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => return Ok((path, file)),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {}
            Err(e) => return Err(Error::io(&path, e)),
        }
    }

    Err(Error::NameExhausted {
        base: dir.join(format!("{base}.{extension}")),
        attempts: MAX_SUFFIXES + 1,
    })
}
