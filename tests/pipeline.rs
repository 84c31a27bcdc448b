//! End-to-end pipeline tests with a deterministic in-process backend
//!
//! The backend scores each pixel by how little green it carries, so a red
//! square on white segments as foreground without any model file.

use bgremove::{
    error::{BgRemovalError, Result},
    BackendFactory, BackendType, BackgroundRemovalProcessor, InferenceBackend, ModelInfo,
    PreprocessingConfig, RemovalConfig,
};
use image::{DynamicImage, GenericImageView, ImageFormat, Rgb, RgbImage};
use instant::Duration;
use ndarray::{s, Array4};
use std::io::Cursor;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

struct GreenlessBackend {
    initialized: bool,
}

impl InferenceBackend for GreenlessBackend {
    fn initialize(&mut self, _config: &RemovalConfig) -> Result<Option<Duration>> {
        if self.initialized {
            return Ok(None);
        }
        self.initialized = true;
        Ok(Some(Duration::from_millis(1)))
    }

    fn infer(&mut self, input: &Array4<f32>) -> Result<Array4<f32>> {
        if !self.initialized {
            return Err(BgRemovalError::inference("backend not initialized"));
        }
        let green = input.slice(s![.., 1..2, .., ..]);
        Ok(green.mapv(|v| -v))
    }

    fn get_preprocessing_config(&self) -> Result<PreprocessingConfig> {
        Ok(PreprocessingConfig {
            target_size: [64, 64],
            normalization_mean: [0.485, 0.456, 0.406],
            normalization_std: [0.229, 0.224, 0.225],
        })
    }

    fn get_model_info(&self) -> Result<ModelInfo> {
        Ok(ModelInfo {
            name: "greenless".to_string(),
            path: PathBuf::from("greenless.onnx"),
            size_bytes: 0,
        })
    }

    fn is_initialized(&self) -> bool {
        self.initialized
    }
}

#[derive(Default, Clone)]
struct GreenlessFactory {
    created: Arc<AtomicUsize>,
}

impl BackendFactory for GreenlessFactory {
    fn create_backend(&self, _config: &RemovalConfig) -> Result<Box<dyn InferenceBackend>> {
        self.created.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(GreenlessBackend { initialized: false }))
    }

    fn available_backends(&self) -> Vec<BackendType> {
        vec![BackendType::Tract]
    }
}

/// Red square covering the middle half of a white canvas
fn red_square(size: u32) -> DynamicImage {
    let (lo, hi) = (size / 4, size * 3 / 4);
    let image = RgbImage::from_fn(size, size, |x, y| {
        if (lo..hi).contains(&x) && (lo..hi).contains(&y) {
            Rgb([220, 20, 20])
        } else {
            Rgb([255, 255, 255])
        }
    });
    DynamicImage::ImageRgb8(image)
}

fn write_input(dir: &TempDir, name: &str, format: ImageFormat) -> PathBuf {
    let mut bytes = Cursor::new(Vec::new());
    red_square(100).write_to(&mut bytes, format).unwrap();
    let path = dir.path().join(name);
    std::fs::write(&path, bytes.into_inner()).unwrap();
    path
}

fn processor(config: RemovalConfig) -> (BackgroundRemovalProcessor, GreenlessFactory) {
    let factory = GreenlessFactory::default();
    let processor =
        BackgroundRemovalProcessor::with_factory(config, Box::new(factory.clone())).unwrap();
    (processor, factory)
}

#[test]
fn test_jpeg_to_transparent_png() -> Result<()> {
    let dir = TempDir::new()?;
    let input = write_input(&dir, "square.jpg", ImageFormat::Jpeg);
    let output = dir.path().join("square.png");

    let (mut processor, _) = processor(RemovalConfig::default());
    processor.process_file_to(&input, &output)?;

    let bytes = std::fs::read(&output)?;
    assert_eq!(image::guess_format(&bytes)?, ImageFormat::Png);

    let decoded = image::load_from_memory(&bytes)?;
    assert_eq!(decoded.dimensions(), (100, 100));
    assert!(decoded.color().has_alpha());

    let background = decoded.get_pixel(2, 2).0;
    assert!(background[3] < 16, "background alpha {}", background[3]);

    // Min-max scaling puts 255 on the resampling overshoot at the square's
    // edge, so the flat interior sits slightly below full opacity.
    let rgba = decoded.to_rgba8();
    let inner_min = (35..65)
        .flat_map(|y| (35..65).map(move |x| (x, y)))
        .map(|(x, y)| rgba.get_pixel(x, y).0[3])
        .min()
        .unwrap_or(0);
    assert!(inner_min >= 224, "subject alpha {inner_min}");

    let subject = rgba.get_pixel(50, 50).0;
    assert!(subject[0] > 180 && subject[1] < 80);
    Ok(())
}

#[test]
fn test_refined_mask_is_binary() -> Result<()> {
    let dir = TempDir::new()?;
    let input = write_input(&dir, "square.png", ImageFormat::Png);
    let output = dir.path().join("mask.png");

    let config = RemovalConfig::builder()
        .post_process_mask(true)
        .only_mask(true)
        .build()?;
    let (mut processor, _) = processor(config);
    processor.process_file_to(&input, &output)?;

    let mask = image::open(&output)?.to_luma8();
    assert_eq!(mask.dimensions(), (100, 100));
    assert!(mask.pixels().all(|p| p.0[0] == 0 || p.0[0] == 255));
    assert_eq!(mask.get_pixel(50, 50).0[0], 255);
    assert_eq!(mask.get_pixel(3, 97).0[0], 0);
    Ok(())
}

#[test]
fn test_background_colour_fills_transparent_area() -> Result<()> {
    let dir = TempDir::new()?;
    let input = write_input(&dir, "square.bmp", ImageFormat::Bmp);
    let output = dir.path().join("composite.png");

    let config = RemovalConfig::builder()
        .background_color(Some([0, 0, 255, 255]))
        .build()?;
    let (mut processor, _) = processor(config);
    processor.process_file_to(&input, &output)?;

    let composite = image::open(&output)?.to_rgba8();
    let corner = composite.get_pixel(1, 1).0;
    assert!(corner[2] > 230 && corner[0] < 25, "corner {corner:?}");
    assert_eq!(corner[3], 255);
    Ok(())
}

#[test]
fn test_backend_created_once_across_images() -> Result<()> {
    let dir = TempDir::new()?;
    let first = write_input(&dir, "a.png", ImageFormat::Png);
    let second = write_input(&dir, "b.tiff", ImageFormat::Tiff);

    let (mut processor, factory) = processor(RemovalConfig::default());
    processor.process_file(&first)?;
    processor.process_file(&second)?;

    assert_eq!(factory.created.load(Ordering::SeqCst), 1);
    Ok(())
}

#[test]
fn test_corrupt_input_never_creates_backend() -> Result<()> {
    let dir = TempDir::new()?;
    let input = dir.path().join("broken.png");
    std::fs::write(&input, [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0])?;
    let output = dir.path().join("out.png");

    let (mut processor, factory) = processor(RemovalConfig::default());
    assert!(processor.process_file_to(&input, &output).is_err());

    assert_eq!(factory.created.load(Ordering::SeqCst), 0);
    assert!(!output.exists());
    Ok(())
}

#[test]
fn test_missing_output_directory_fails() -> Result<()> {
    let dir = TempDir::new()?;
    let input = write_input(&dir, "square.png", ImageFormat::Png);
    let output = dir.path().join("no-such-dir").join("out.png");

    let (mut processor, _) = processor(RemovalConfig::default());
    let err = processor.process_file_to(&input, &output).unwrap_err();

    assert!(matches!(err, BgRemovalError::Io(_)));
    assert!(err.to_string().contains("no-such-dir"));

    #[cfg(feature = "cli")]
    {
        let report = bgremove::cli::report_failure(&anyhow::Error::new(err));
        assert!(report.starts_with("BG_REMOVE_ERROR: "));
        assert!(report.contains("no-such-dir"));
    }
    Ok(())
}
