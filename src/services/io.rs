//! Image I/O operations service
//!
//! Keeps file system access and decoding out of the processor so the
//! pipeline can be driven from bytes in tests.

use crate::error::{BgRemovalError, Result};
use image::{DynamicImage, ImageDecoder, ImageReader};
use std::io::Cursor;
use std::path::Path;

/// Service for handling image file input/output operations
pub struct ImageIOService;

impl ImageIOService {
    /// Read the whole input file
    ///
    /// # Errors
    /// - File missing or unreadable; the I/O error kind is preserved
    pub fn read_input<P: AsRef<Path>>(path: P) -> Result<Vec<u8>> {
        let path = path.as_ref();
        std::fs::read(path).map_err(|e| BgRemovalError::file_io_error("read input image", path, &e))
    }

    /// Decode image bytes, format guessed from content
    ///
    /// EXIF orientation is applied so the mask lines up with what viewers
    /// display.
    ///
    /// # Errors
    /// - Unrecognized format
    /// - Corrupt or truncated image data
    pub fn decode(bytes: &[u8]) -> Result<DynamicImage> {
        let reader = ImageReader::new(Cursor::new(bytes)).with_guessed_format()?;

        let Some(format) = reader.format() else {
            return Err(BgRemovalError::unsupported_format(format!(
                "unrecognized image data ({} bytes)",
                bytes.len()
            )));
        };
        log::debug!("Decoding {format:?} image ({} bytes)", bytes.len());

        let mut decoder = reader.into_decoder().map_err(|e| {
            BgRemovalError::processing_stage_error(
                "image decoding",
                &e.to_string(),
                Some(&format!("{format:?}")),
            )
        })?;
        let orientation = decoder.orientation()?;
        let mut image = DynamicImage::from_decoder(decoder).map_err(|e| {
            BgRemovalError::processing_stage_error(
                "image decoding",
                &e.to_string(),
                Some(&format!("{format:?}")),
            )
        })?;
        image.apply_orientation(orientation);

        Ok(image)
    }

    /// Write encoded output bytes, replacing any existing file
    ///
    /// Parent directories are not created.
    ///
    /// # Errors
    /// - Output location unwritable; the I/O error kind is preserved
    pub fn write_output<P: AsRef<Path>>(path: P, bytes: &[u8]) -> Result<()> {
        let path = path.as_ref();
        std::fs::write(path, bytes)
            .map_err(|e| BgRemovalError::file_io_error("write output image", path, &e))
    }
}
