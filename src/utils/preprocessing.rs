//! Image preprocessing for model inference

use crate::{
    error::{BgRemovalError, Result},
    models::PreprocessingConfig,
};
use image::{imageops::FilterType, DynamicImage, RgbImage};
use ndarray::Array4;

/// Lower bound for the max-pixel divisor, keeps black images finite
const MIN_PIXEL_SCALE: f32 = 1e-6;

/// Image preprocessing utilities
pub struct ImagePreprocessor;

impl ImagePreprocessor {
    /// Turn an image into the normalized NCHW tensor a model expects
    ///
    /// - RGB conversion
    /// - Lanczos3 resize to the model input size (aspect ratio not preserved)
    /// - Division by the largest channel value of the resized image
    /// - Per-channel `(x - mean) / std`
    ///
    /// # Errors
    /// - Empty input image
    /// - Zero target size or non-positive std in the configuration
    pub fn preprocess_for_inference(
        image: &DynamicImage,
        preprocessing_config: &PreprocessingConfig,
    ) -> Result<Array4<f32>> {
        let [target_width, target_height] = preprocessing_config.target_size;

        if image.width() == 0 || image.height() == 0 {
            return Err(BgRemovalError::processing_stage_error(
                "preprocessing",
                "input image is empty",
                Some(&format!("{}x{}", image.width(), image.height())),
            ));
        }
        if target_width == 0 || target_height == 0 {
            return Err(BgRemovalError::invalid_config(
                "Model input size must be non-zero",
            ));
        }
        if preprocessing_config.normalization_std.iter().any(|&s| s <= 0.0) {
            return Err(BgRemovalError::invalid_config(
                "Normalization std must be positive",
            ));
        }

        let resized = image::imageops::resize(
            &image.to_rgb8(),
            target_width,
            target_height,
            FilterType::Lanczos3,
        );

        Ok(Self::image_to_tensor(&resized, preprocessing_config))
    }

    fn image_to_tensor(image: &RgbImage, preprocessing_config: &PreprocessingConfig) -> Array4<f32> {
        let (width, height) = image.dimensions();
        let max_value = image.as_raw().iter().copied().max().unwrap_or(0);
        let scale = f32::from(max_value).max(MIN_PIXEL_SCALE);

        let mean = preprocessing_config.normalization_mean;
        let std = preprocessing_config.normalization_std;

        Array4::from_shape_fn(
            (1, 3, height as usize, width as usize),
            |(_, channel, y, x)| {
                let value = image
                    .get_pixel_checked(x as u32, y as u32)
                    .and_then(|pixel| pixel.0.get(channel).copied())
                    .unwrap_or(0);
                let mean = mean.get(channel).copied().unwrap_or(0.0);
                let std = std.get(channel).copied().unwrap_or(1.0);
                (f32::from(value) / scale - mean) / std
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgb};

    fn solid_image(width: u32, height: u32, color: [u8; 3]) -> DynamicImage {
        DynamicImage::ImageRgb8(ImageBuffer::from_pixel(width, height, Rgb(color)))
    }

    #[test]
    fn test_tensor_shape_follows_target_size() {
        let config = PreprocessingConfig {
            target_size: [64, 32],
            ..PreprocessingConfig::default()
        };
        let tensor =
            ImagePreprocessor::preprocess_for_inference(&solid_image(100, 50, [10, 20, 30]), &config)
                .unwrap();
        assert_eq!(tensor.shape(), &[1, 3, 32, 64]);
    }

    #[test]
    fn test_max_pixel_scaling_and_normalization() {
        let config = PreprocessingConfig {
            target_size: [8, 8],
            normalization_mean: [0.5, 0.5, 0.5],
            normalization_std: [0.5, 0.5, 0.5],
        };
        // Brightest channel is 100, so red maps to 1.0 and blue to 0.5
        let tensor =
            ImagePreprocessor::preprocess_for_inference(&solid_image(8, 8, [100, 0, 50]), &config)
                .unwrap();

        assert!((tensor[[0, 0, 4, 4]] - 1.0).abs() < 1e-4);
        assert!((tensor[[0, 1, 4, 4]] + 1.0).abs() < 1e-4);
        assert!((tensor[[0, 2, 4, 4]] - 0.0).abs() < 1e-4);
    }

    #[test]
    fn test_black_image_stays_finite() {
        let tensor = ImagePreprocessor::preprocess_for_inference(
            &solid_image(16, 16, [0, 0, 0]),
            &PreprocessingConfig::default(),
        )
        .unwrap();
        assert!(tensor.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_rejects_invalid_config() {
        let image = solid_image(4, 4, [1, 2, 3]);
        let zero_size = PreprocessingConfig {
            target_size: [0, 320],
            ..PreprocessingConfig::default()
        };
        assert!(ImagePreprocessor::preprocess_for_inference(&image, &zero_size).is_err());

        let zero_std = PreprocessingConfig {
            normalization_std: [1.0, 0.0, 1.0],
            ..PreprocessingConfig::default()
        };
        assert!(ImagePreprocessor::preprocess_for_inference(&image, &zero_std).is_err());
    }

    #[test]
    fn test_rejects_empty_image() {
        let image = DynamicImage::new_rgb8(0, 0);
        let err = ImagePreprocessor::preprocess_for_inference(&image, &PreprocessingConfig::default())
            .unwrap_err();
        assert!(err.to_string().contains("preprocessing"));
    }
}
