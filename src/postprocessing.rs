//! Model output to alpha mask conversion

use crate::error::{BgRemovalError, Result};
use crate::types::SegmentationMask;
use image::{GrayImage, Luma};
use imageproc::filter::gaussian_blur_f32;
use imageproc::morphology::{grayscale_open, Mask};
use ndarray::{s, Array4};

/// Sigma of the gaussian blur applied during mask refinement
const REFINE_BLUR_SIGMA: f32 = 2.0;

/// Values at or above this become foreground after refinement
const REFINE_THRESHOLD: u8 = 127;

/// Convert raw model output into a mask at the original image size
///
/// Channel 0 of the first batch entry is min-max normalized to `[0, 1]`,
/// scaled to `u8` and resized with Lanczos3. A constant tensor carries no
/// ranking and yields an all-background mask.
///
/// # Errors
/// - Tensor has an empty batch, channel or spatial dimension
pub fn tensor_to_mask(tensor: &Array4<f32>, original_dimensions: (u32, u32)) -> Result<SegmentationMask> {
    let (batch, channels, height, width) = tensor.dim();
    if batch == 0 || channels == 0 || height == 0 || width == 0 {
        return Err(BgRemovalError::processing_stage_error(
            "postprocessing",
            "invalid output tensor shape",
            Some(&format!("{:?}", tensor.shape())),
        ));
    }

    let prediction = tensor.slice(s![0, 0, .., ..]);
    let (min, max) = prediction
        .iter()
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });
    let range = max - min;

    let to_u8 = |v: f32| -> u8 {
        if range.is_finite() && range > f32::EPSILON {
            (((v - min) / range) * 255.0).clamp(0.0, 255.0) as u8
        } else {
            0
        }
    };

    let model_mask = GrayImage::from_fn(width as u32, height as u32, |x, y| {
        let value = prediction
            .get((y as usize, x as usize))
            .copied()
            .unwrap_or(min);
        Luma([to_u8(value)])
    });

    let (orig_width, orig_height) = original_dimensions;
    SegmentationMask::from_image(&model_mask).resize(orig_width, orig_height)
}

/// Smooth and binarize a mask
///
/// Grayscale opening with a 3x3 cross, gaussian blur, threshold to {0, 255}.
///
/// # Errors
/// - Inconsistent mask data
pub fn refine_mask(mask: &SegmentationMask) -> Result<SegmentationMask> {
    let image = mask.to_image()?;
    let opened = grayscale_open(&image, &Mask::diamond(1));
    let mut refined = gaussian_blur_f32(&opened, REFINE_BLUR_SIGMA);

    for pixel in refined.pixels_mut() {
        pixel.0 = [if pixel.0[0] >= REFINE_THRESHOLD { 255 } else { 0 }];
    }

    Ok(SegmentationMask::from_image(&refined))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square_tensor(size: usize, low: f32, high: f32) -> Array4<f32> {
        Array4::from_shape_fn((1, 1, size, size), |(_, _, y, x)| {
            let inside = (size / 4..size * 3 / 4).contains(&x) && (size / 4..size * 3 / 4).contains(&y);
            if inside {
                high
            } else {
                low
            }
        })
    }

    #[test]
    fn test_min_max_normalization() {
        let mask = tensor_to_mask(&square_tensor(8, -3.0, 5.0), (8, 8)).unwrap();
        assert_eq!(mask.dimensions, (8, 8));
        assert_eq!(mask.data.first(), Some(&0));
        assert_eq!(mask.data.get(4 * 8 + 4), Some(&255));
    }

    #[test]
    fn test_constant_tensor_is_background() {
        let tensor = Array4::from_elem((1, 1, 4, 4), 0.7);
        let mask = tensor_to_mask(&tensor, (4, 4)).unwrap();
        assert!(mask.data.iter().all(|&v| v == 0));
    }

    #[test]
    fn test_mask_resized_to_original() {
        let mask = tensor_to_mask(&square_tensor(32, 0.0, 1.0), (100, 60)).unwrap();
        assert_eq!(mask.dimensions, (100, 60));
        assert_eq!(mask.data.len(), 6000);
        assert_eq!(mask.data.first(), Some(&0));
        assert!(mask.data.get(30 * 100 + 50).copied().unwrap() > 200);
    }

    #[test]
    fn test_only_first_channel_is_used() {
        let tensor = Array4::from_shape_fn((1, 2, 4, 4), |(_, c, _, x)| if c == 0 { x as f32 } else { 100.0 });
        let mask = tensor_to_mask(&tensor, (4, 4)).unwrap();
        assert_eq!(mask.data.first(), Some(&0));
        assert_eq!(mask.data.get(3), Some(&255));
    }

    #[test]
    fn test_rejects_empty_tensor() {
        let tensor = Array4::<f32>::zeros((1, 0, 4, 4));
        assert!(tensor_to_mask(&tensor, (4, 4)).is_err());
    }

    #[test]
    fn test_refine_removes_specks_and_binarizes() {
        let mut image = GrayImage::new(40, 40);
        for y in 10..30 {
            for x in 10..30 {
                image.put_pixel(x, y, Luma([180]));
            }
        }
        // Single isolated pixel does not survive the opening
        image.put_pixel(2, 2, Luma([255]));

        let refined = refine_mask(&SegmentationMask::from_image(&image)).unwrap();
        let at = |x: u32, y: u32| refined.data.get((y * 40 + x) as usize).copied().unwrap();

        assert!(refined.data.iter().all(|&v| v == 0 || v == 255));
        assert_eq!(at(2, 2), 0);
        assert_eq!(at(20, 20), 255);
        assert_eq!(at(0, 39), 0);
    }

    #[test]
    fn test_refine_opening_removes_thin_lines() {
        let mut image = GrayImage::new(30, 30);
        for x in 0..30 {
            image.put_pixel(x, 15, Luma([255]));
        }

        let refined = refine_mask(&SegmentationMask::from_image(&image)).unwrap();
        assert!(refined.data.iter().all(|&v| v == 0));
    }
}
