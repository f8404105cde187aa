//! Image normalization and the raw RGBA file format.
//!
//! A stored image is a 16 byte header followed by uncompressed pixels:
//!
//! ```text
//! width:  u64 little endian
//! height: u64 little endian
//! pixels: width * height * 4 bytes, RGBA8, straight alpha, bottom row first
//! ```

use std::io::{self, Read, Write};
use std::path::Path;

use image::imageops::FilterType;
use image::{DynamicImage, ImageDecoder, ImageReader, RgbaImage};

use crate::{Error, Result};

/// Size of the dimension header.
pub const HEADER_LEN: usize = 16;

/// Decoded image in the stored layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawImage {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// RGBA8 pixel rows, bottom row first.
    pub pixels: Vec<u8>,
}

impl RawImage {
    /// Writes header and pixels.
    ///
    /// # Errors
    ///
    /// Returns any error of the writer.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_all(&u64::from(self.width).to_le_bytes())?;
        writer.write_all(&u64::from(self.height).to_le_bytes())?;
        writer.write_all(&self.pixels)
    }

    /// Reads an image written by [`RawImage::write_to`].
    ///
    /// # Errors
    ///
    /// Returns [`io::ErrorKind::InvalidData`] if the dimensions are out of
    /// range or the pixel data is not exactly `width * height * 4` bytes.
    pub fn read_from<R: Read>(reader: &mut R) -> io::Result<Self> {
        let mut header = [0u8; HEADER_LEN];
        reader.read_exact(&mut header)?;

        let (w, h) = header.split_at(8);
        let width = dimension(w)?;
        let height = dimension(h)?;

        let expected = u64::from(width) * u64::from(height) * 4;
        let mut pixels = Vec::new();
        reader.take(expected + 1).read_to_end(&mut pixels)?;

        let found = pixels.len() as u64;
        if found != expected {
            let reason = if found < expected {
                format!("truncated pixel data: expected {expected} bytes for {width}x{height}, found {found}")
            } else {
                format!("trailing data after {expected} pixel bytes")
            };
            return Err(io::Error::new(io::ErrorKind::InvalidData, reason));
        }

        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    /// Loads an image file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the file cannot be read and [`Error::Decode`]
    /// if its contents are malformed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut file = std::fs::File::open(path).map_err(|e| Error::io(path, e))?;

        Self::read_from(&mut io::BufReader::new(&mut file)).map_err(|e| match e.kind() {
            io::ErrorKind::InvalidData | io::ErrorKind::UnexpectedEof => Error::Decode {
                path: path.to_path_buf(),
                reason: e.to_string(),
            },
            _ => Error::io(path, e),
        })
    }
}

fn dimension(bytes: &[u8]) -> io::Result<u32> {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(bytes);
    u32::try_from(u64::from_le_bytes(buf))
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "image dimension out of range"))
}

/// Size that fits within `max_width` x `max_height`, keeping the aspect
/// ratio. Images already inside the bounds keep their size.
#[must_use]
pub fn fit_within(width: u32, height: u32, max_width: u32, max_height: u32) -> (u32, u32) {
    if width <= max_width && height <= max_height {
        return (width, height);
    }

    let (w, h) = (u64::from(width), u64::from(height));
    let (max_w, max_h) = (u64::from(max_width), u64::from(max_height));

    if w * max_h >= h * max_w {
        let scaled = u32::try_from(h * max_w / w).unwrap_or(max_height);
        (max_width, scaled.clamp(1, max_height))
    } else {
        let scaled = u32::try_from(w * max_h / h).unwrap_or(max_width);
        (scaled.clamp(1, max_width), max_height)
    }
}

/// Decodes an encoded JPEG or PNG and converts it to the stored layout.
///
/// Steps: EXIF orientation, downscale into the bounds (Catmull-Rom), flip
/// vertically, convert to RGBA8. With a `background`, transparent pixels
/// are composited onto it and become opaque; without one, alpha is kept.
///
/// # Errors
///
/// Returns [`Error::Image`] if the payload cannot be decoded.
pub fn normalize(
    bytes: &[u8],
    max_width: u32,
    max_height: u32,
    background: Option<[u8; 3]>,
) -> Result<RawImage> {
    let mut decoder = ImageReader::new(io::Cursor::new(bytes))
        .with_guessed_format()
        .map_err(image::ImageError::IoError)?
        .into_decoder()?;
    let orientation = decoder.orientation()?;

    let mut img = DynamicImage::from_decoder(decoder)?;
    img.apply_orientation(orientation);

    let (width, height) = fit_within(img.width(), img.height(), max_width, max_height);
    if (width, height) != (img.width(), img.height()) {
        img = img.resize_exact(width, height, FilterType::CatmullRom);
    }

    let has_alpha = img.color().has_alpha();
    let mut rgba = img.flipv().into_rgba8();
    if let Some(background) = background
        && has_alpha
    {
        flatten(&mut rgba, background);
    }

    Ok(RawImage {
        width: rgba.width(),
        height: rgba.height(),
        pixels: rgba.into_raw(),
    })
}

/// Composites every pixel onto an opaque background.
fn flatten(img: &mut RgbaImage, background: [u8; 3]) {
    for pixel in img.pixels_mut() {
        let alpha = u32::from(pixel[3]);
        for (channel, bg) in pixel.0.iter_mut().take(3).zip(background) {
            let blended = (u32::from(*channel) * alpha + u32::from(bg) * (255 - alpha) + 127) / 255;
            *channel = u8::try_from(blended).unwrap_or(u8::MAX);
        }
        pixel[3] = u8::MAX;
    }
}
