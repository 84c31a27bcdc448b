#![allow(clippy::too_many_lines)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::uninlined_format_args)]

//! # bgremove
//!
//! Background removal for still images with U2-Net family segmentation
//! models. An image is decoded, scaled into the model's input tensor, run
//! through an ONNX model, and the predicted saliency map becomes the alpha
//! channel of a PNG cutout.
//!
//! ## Features
//!
//! - **Model registry**: `u2net`, `u2netp`, `u2net_human_seg`, `silueta`,
//!   `isnet-general-use`, `isnet-anime`, downloaded once into a local cache
//! - **External models**: any compatible `.onnx` file
//! - **Two backends**: Tract (pure Rust, default) and ONNX Runtime (`onnx` feature)
//! - **Output modes**: transparent cutout, mask only, or composite over a colour
//! - **Mask refinement**: optional opening, blur and threshold pass
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use bgremove::{remove_background_from_bytes, RemovalConfig};
//!
//! # fn example() -> anyhow::Result<()> {
//! let input = std::fs::read("photo.jpg")?;
//! let config = RemovalConfig::builder().post_process_mask(true).build()?;
//! let png = remove_background_from_bytes(&input, &config)?;
//! std::fs::write("photo-cutout.png", png)?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Feature Flags
//!
//! - `tract` (default): pure Rust inference backend
//! - `onnx`: ONNX Runtime backend
//! - `cli` (default): the `bgremove` binary and its tracing subscriber
//! - `webp-support` (default): WebP input decoding

pub mod backends;
pub mod cache;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod download;
pub mod error;
pub mod inference;
pub mod models;
pub mod postprocessing;
pub mod processor;
pub mod services;
#[cfg(feature = "cli")]
pub mod tracing_config;
pub mod types;
pub mod utils;

pub use cache::{format_size, CachedModelInfo, ModelCache};
pub use config::{BackendType, RemovalConfig, RemovalConfigBuilder};
pub use download::{validate_model_url, ModelDownloader};
pub use error::{BgRemovalError, Result};
pub use inference::InferenceBackend;
pub use models::{
    find_known_model, KnownModel, ModelInfo, ModelManager, ModelSource, ModelSpec,
    PreprocessingConfig, DEFAULT_MODEL, KNOWN_MODELS,
};
pub use processor::{BackendFactory, BackgroundRemovalProcessor, DefaultBackendFactory};
pub use services::{ImageIOService, OutputFormatHandler};
pub use types::{ProcessingTimings, RemovalResult, SegmentationMask};
pub use utils::ImagePreprocessor;

#[cfg(feature = "cli")]
pub use tracing_config::{init_cli_tracing, TracingConfig, TracingFormat};

use image::DynamicImage;

/// Remove the background from encoded image bytes and return PNG bytes
///
/// The input format is detected from its content.
///
/// # Errors
/// - Invalid configuration
/// - Undecodable or unsupported input
/// - Model resolution, loading or inference failures
pub fn remove_background_from_bytes(image_bytes: &[u8], config: &RemovalConfig) -> Result<Vec<u8>> {
    let mut processor = BackgroundRemovalProcessor::new(config.clone())?;
    processor.process_bytes(image_bytes)?.to_png_bytes()
}

/// Remove the background from an already decoded image
///
/// # Errors
/// - Invalid configuration
/// - Model resolution, loading or inference failures
pub fn remove_background_from_image(
    image: &DynamicImage,
    config: &RemovalConfig,
) -> Result<RemovalResult> {
    let mut processor = BackgroundRemovalProcessor::new(config.clone())?;
    processor.process_image(image)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_corrupt_bytes_fail_before_model_access() {
        let dir = tempfile::tempdir().unwrap();
        let config = RemovalConfig::builder()
            .cache_dir(Some(dir.path().to_path_buf()))
            .build()
            .unwrap();

        let err = remove_background_from_bytes(b"definitely not an image", &config).unwrap_err();
        assert!(matches!(
            err,
            BgRemovalError::UnsupportedFormat(_) | BgRemovalError::Image(_)
        ));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = RemovalConfig {
            only_mask: true,
            background_color: Some([0, 0, 0, 255]),
            ..RemovalConfig::default()
        };
        let image = DynamicImage::new_rgb8(4, 4);
        assert!(matches!(
            remove_background_from_image(&image, &config),
            Err(BgRemovalError::InvalidConfig(_))
        ));
    }
}
