//! Mock backends for testing the pipeline without model files

use crate::{
    config::{BackendType, RemovalConfig},
    error::{BgRemovalError, Result},
    inference::InferenceBackend,
    models::{ModelInfo, PreprocessingConfig},
    processor::BackendFactory,
};
use instant::Duration;
use ndarray::Array4;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

/// Mock backend whose "model" predicts a centered disk
#[derive(Debug, Clone)]
pub struct MockBackend {
    initialized: bool,
    model_info: ModelInfo,
    preprocessing_config: PreprocessingConfig,
    should_fail_init: bool,
    should_fail_inference: bool,
}

impl MockBackend {
    #[must_use]
    pub fn new() -> Self {
        Self {
            initialized: false,
            model_info: ModelInfo {
                name: "mock-model".to_string(),
                path: PathBuf::from("mock-model.onnx"),
                size_bytes: 1024 * 1024,
            },
            preprocessing_config: PreprocessingConfig::default(),
            should_fail_init: false,
            should_fail_inference: false,
        }
    }

    #[must_use]
    pub fn new_failing_init() -> Self {
        let mut backend = Self::new();
        backend.should_fail_init = true;
        backend
    }

    #[must_use]
    pub fn new_failing_inference() -> Self {
        let mut backend = Self::new();
        backend.should_fail_inference = true;
        backend
    }

    /// Raw logits: positive inside a disk of radius a third of the side
    fn generate_mock_output(input: &Array4<f32>) -> Array4<f32> {
        let (batch, _, height, width) = input.dim();
        let center_x = width as f32 / 2.0;
        let center_y = height as f32 / 2.0;
        let radius = width.min(height) as f32 / 3.0;

        Array4::from_shape_fn((batch, 1, height, width), |(_, _, y, x)| {
            let dx = x as f32 + 0.5 - center_x;
            let dy = y as f32 + 0.5 - center_y;
            if (dx * dx + dy * dy).sqrt() < radius {
                4.0
            } else {
                -4.0
            }
        })
    }
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl InferenceBackend for MockBackend {
    fn initialize(&mut self, _config: &RemovalConfig) -> Result<Option<Duration>> {
        if self.should_fail_init {
            return Err(BgRemovalError::model("Mock backend initialization failed"));
        }
        if self.initialized {
            return Ok(None);
        }

        self.initialized = true;
        Ok(Some(Duration::from_millis(150)))
    }

    fn infer(&mut self, input: &Array4<f32>) -> Result<Array4<f32>> {
        if !self.initialized {
            return Err(BgRemovalError::inference("Mock backend not initialized"));
        }
        if self.should_fail_inference {
            return Err(BgRemovalError::inference("Mock backend inference failed"));
        }

        Ok(Self::generate_mock_output(input))
    }

    fn get_preprocessing_config(&self) -> Result<PreprocessingConfig> {
        Ok(self.preprocessing_config.clone())
    }

    fn get_model_info(&self) -> Result<ModelInfo> {
        Ok(self.model_info.clone())
    }

    fn is_initialized(&self) -> bool {
        self.initialized
    }
}

/// Factory handing out mock backends regardless of the configured model
#[derive(Debug, Default)]
pub struct MockBackendFactory {
    pub create_failing_backends: bool,
    pub fail_backend_creation: bool,
    /// Number of backends created so far
    pub created: Arc<Mutex<usize>>,
}

impl MockBackendFactory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn new_failing() -> Self {
        Self {
            create_failing_backends: true,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn new_creation_failing() -> Self {
        Self {
            fail_backend_creation: true,
            ..Self::default()
        }
    }
}

impl BackendFactory for MockBackendFactory {
    fn create_backend(&self, _config: &RemovalConfig) -> Result<Box<dyn InferenceBackend>> {
        if self.fail_backend_creation {
            return Err(BgRemovalError::model(
                "Mock factory configured to fail backend creation",
            ));
        }

        if let Ok(mut created) = self.created.lock() {
            *created += 1;
        }

        if self.create_failing_backends {
            Ok(Box::new(MockBackend::new_failing_inference()))
        } else {
            Ok(Box::new(MockBackend::new()))
        }
    }

    fn available_backends(&self) -> Vec<BackendType> {
        vec![BackendType::Tract, BackendType::Onnx]
    }
}

/// Helpers for building test inputs
pub mod test_helpers {
    use image::{DynamicImage, ImageBuffer, Rgb};

    /// Red square on a white background, the square covering the middle half
    pub fn create_square_image(width: u32, height: u32) -> DynamicImage {
        let img = ImageBuffer::from_fn(width, height, |x, y| {
            let inside = x >= width / 4 && x < width * 3 / 4 && y >= height / 4 && y < height * 3 / 4;
            if inside {
                Rgb([200, 20, 20])
            } else {
                Rgb([255, 255, 255])
            }
        });
        DynamicImage::ImageRgb8(img)
    }

    /// Encode an image into an in-memory file of the given format
    pub fn encode(image: &DynamicImage, format: image::ImageFormat) -> Vec<u8> {
        let mut bytes = std::io::Cursor::new(Vec::new());
        image.write_to(&mut bytes, format).unwrap();
        bytes.into_inner()
    }
}
