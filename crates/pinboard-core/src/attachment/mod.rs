//! Normalized image attachments on disk.

mod naming;
mod raster;

use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

pub use naming::{IMAGE_EXTENSION, MAX_SUFFIXES, candidates, clean_base, create_unique};
pub use raster::{HEADER_LEN, RawImage, fit_within, normalize};

use crate::config::CrawlerConfig;
use crate::{Error, Result};

/// Default bound on stored image width.
pub const DEFAULT_MAX_WIDTH: u32 = 1920;
/// Default bound on stored image height.
pub const DEFAULT_MAX_HEIGHT: u32 = 1080;

/// Writes normalized images under collision-free names in one directory.
#[derive(Debug, Clone)]
pub struct AttachmentStore {
    dir: PathBuf,
    max_width: u32,
    max_height: u32,
    background: Option<[u8; 3]>,
}

impl AttachmentStore {
    /// Create a store with the default 1920x1080 bound, keeping alpha.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            max_width: DEFAULT_MAX_WIDTH,
            max_height: DEFAULT_MAX_HEIGHT,
            background: None,
        }
    }

    /// Create a store from the attachment settings of a crawler config.
    #[must_use]
    pub fn from_config(config: &CrawlerConfig) -> Self {
        Self::new(&config.attachment_dir)
            .with_bounds(config.max_image_width, config.max_image_height)
            .with_background(config.background)
    }

    /// Sets the largest stored image size.
    #[must_use]
    pub const fn with_bounds(mut self, max_width: u32, max_height: u32) -> Self {
        self.max_width = max_width;
        self.max_height = max_height;
        self
    }

    /// Sets the color transparent images are flattened onto.
    #[must_use]
    pub const fn with_background(mut self, background: Option<[u8; 3]>) -> Self {
        self.background = background;
        self
    }

    /// Directory holding the image files.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Normalizes an encoded image and writes it under a free name derived
    /// from `name`.
    ///
    /// Returns the path written. Nothing is left on disk if this fails.
    ///
    /// # Errors
    ///
    /// - [`Error::Image`] if the payload cannot be decoded
    /// - [`Error::NameExhausted`] if every candidate name is taken
    /// - [`Error::Io`] if the directory or file cannot be written
    pub fn store(&self, bytes: &[u8], name: &str) -> Result<PathBuf> {
        let image = normalize(bytes, self.max_width, self.max_height, self.background)?;
        debug!(
            attachment = name,
            width = image.width,
            height = image.height,
            "Normalized image"
        );

        std::fs::create_dir_all(&self.dir).map_err(|e| Error::io(&self.dir, e))?;
        let base = clean_base(name);
        let (path, file) = create_unique(&self.dir, &base, IMAGE_EXTENSION)?;

        let mut writer = BufWriter::new(file);
        let written = image.write_to(&mut writer).and_then(|()| writer.flush());
        if let Err(e) = written {
            drop(writer);
            remove_quietly(&path);
            return Err(Error::io(&path, e));
        }

        info!(path = %path.display(), "Attachment stored");
        Ok(path)
    }

    /// Deletes files written by earlier [`AttachmentStore::store`] calls.
    ///
    /// Failures are logged and otherwise ignored.
    pub fn discard(&self, paths: &[PathBuf]) {
        for path in paths {
            remove_quietly(path);
        }
    }
}

fn remove_quietly(path: &Path) {
    if let Err(e) = std::fs::remove_file(path) {
        warn!(path = %path.display(), error = %e, "Failed to remove attachment");
    }
}
