//! Output composition and encoding service

use crate::{
    config::RemovalConfig,
    error::{BgRemovalError, Result},
    types::SegmentationMask,
};
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use std::io::Cursor;

/// Service for turning an image and its mask into the final output
pub struct OutputFormatHandler;

impl OutputFormatHandler {
    /// Build the output image for the configured mode
    ///
    /// - mask only: the mask as a grayscale image
    /// - background colour: the cutout composited over a solid canvas
    /// - default: the cutout, alpha = mask scaled by the input alpha
    ///
    /// # Errors
    /// - Mask dimensions differ from the image dimensions
    pub fn compose(
        image: &DynamicImage,
        mask: &SegmentationMask,
        config: &RemovalConfig,
    ) -> Result<DynamicImage> {
        if mask.dimensions != (image.width(), image.height()) {
            return Err(BgRemovalError::processing_stage_error(
                "composition",
                "mask and image dimensions differ",
                Some(&format!(
                    "image {}x{}, mask {}x{}",
                    image.width(),
                    image.height(),
                    mask.dimensions.0,
                    mask.dimensions.1
                )),
            ));
        }

        if config.only_mask {
            return Ok(DynamicImage::ImageLuma8(mask.to_image()?));
        }

        let cutout = Self::cutout(image, mask)?;
        match config.background_color {
            Some(color) => Ok(DynamicImage::ImageRgba8(Self::over_background(&cutout, color))),
            None => Ok(DynamicImage::ImageRgba8(cutout)),
        }
    }

    /// Apply the mask as alpha; fully transparent pixels are cleared to zero
    fn cutout(image: &DynamicImage, mask: &SegmentationMask) -> Result<RgbaImage> {
        let mask_image = mask.to_image()?;
        let mut result = image.to_rgba8();

        for (pixel, mask_pixel) in result.pixels_mut().zip(mask_image.pixels()) {
            let alpha = (u16::from(pixel.0[3]) * u16::from(mask_pixel.0[0]) + 127) / 255;
            *pixel = if alpha == 0 {
                Rgba([0, 0, 0, 0])
            } else {
                Rgba([pixel.0[0], pixel.0[1], pixel.0[2], alpha as u8])
            };
        }

        Ok(result)
    }

    /// Porter-Duff "over" of the cutout onto a solid RGBA colour
    fn over_background(cutout: &RgbaImage, color: [u8; 4]) -> RgbaImage {
        let [bg_r, bg_g, bg_b, bg_a] = color.map(|c| f32::from(c) / 255.0);

        let mut result = cutout.clone();
        for pixel in result.pixels_mut() {
            let [r, g, b, a] = pixel.0.map(|c| f32::from(c) / 255.0);
            let out_a = a + bg_a * (1.0 - a);
            let blend = |src: f32, dst: f32| {
                if out_a <= 0.0 {
                    0.0
                } else {
                    (src * a + dst * bg_a * (1.0 - a)) / out_a
                }
            };
            let to_u8 = |v: f32| (v * 255.0).round().clamp(0.0, 255.0) as u8;

            *pixel = Rgba([
                to_u8(blend(r, bg_r)),
                to_u8(blend(g, bg_g)),
                to_u8(blend(b, bg_b)),
                to_u8(out_a),
            ]);
        }

        result
    }

    /// Encode an image as PNG, keeping its colour type
    ///
    /// # Errors
    /// - PNG encoder failures
    pub fn encode_png(image: &DynamicImage) -> Result<Vec<u8>> {
        let mut buffer = Cursor::new(Vec::new());
        image.write_to(&mut buffer, ImageFormat::Png).map_err(|e| {
            BgRemovalError::processing_stage_error("png encoding", &e.to_string(), None)
        })?;
        Ok(buffer.into_inner())
    }
}
