//! Background removal processor
//!
//! `BackgroundRemovalProcessor` drives one image through the pipeline:
//! decode, preprocess, inference, mask generation, composition, encoding.
//! The backend is created and initialized lazily on first use so that
//! failures before inference (unreadable input, corrupt image data) never
//! touch or download a model.

use crate::{
    cache::ModelCache,
    config::{BackendType, RemovalConfig},
    error::{BgRemovalError, Result},
    inference::InferenceBackend,
    models::ModelManager,
    postprocessing::{refine_mask, tensor_to_mask},
    services::{ImageIOService, OutputFormatHandler},
    types::{ProcessingTimings, RemovalResult},
    utils::ImagePreprocessor,
};
use image::DynamicImage;
use instant::Instant;
use std::path::Path;
use tracing::{debug, info, instrument, span, Level};

/// Factory trait for creating inference backends
pub trait BackendFactory: Send + Sync {
    /// Create an uninitialized backend for the configured model
    ///
    /// # Errors
    /// - Backend not compiled into this build
    /// - Model resolution or download failures
    fn create_backend(&self, config: &RemovalConfig) -> Result<Box<dyn InferenceBackend>>;

    /// Backend types this factory can create
    fn available_backends(&self) -> Vec<BackendType>;
}

/// Resolves the model through the cache and builds a compiled-in backend
#[derive(Debug, Default)]
pub struct DefaultBackendFactory;

impl DefaultBackendFactory {
    fn resolve_model(config: &RemovalConfig) -> Result<ModelManager> {
        let cache = match &config.cache_dir {
            Some(dir) => ModelCache::with_custom_cache_dir(dir)?,
            None => ModelCache::new()?,
        };
        debug!(cache_dir = %cache.get_current_cache_dir().display(), "Resolving model");
        ModelManager::from_spec(&config.model_spec, &cache)
    }
}

impl BackendFactory for DefaultBackendFactory {
    fn create_backend(&self, config: &RemovalConfig) -> Result<Box<dyn InferenceBackend>> {
        if !self.available_backends().contains(&config.backend_type) {
            return Err(BgRemovalError::invalid_config(format!(
                "Backend '{}' is not available in this build (enable the '{}' feature)",
                config.backend_type, config.backend_type
            )));
        }

        let model_manager = Self::resolve_model(config)?;

        match config.backend_type {
            #[cfg(feature = "tract")]
            BackendType::Tract => Ok(Box::new(crate::backends::TractBackend::with_model_manager(
                model_manager,
            ))),
            #[cfg(feature = "onnx")]
            BackendType::Onnx => Ok(Box::new(crate::backends::OnnxBackend::with_model_manager(
                model_manager,
            ))),
            #[allow(unreachable_patterns)]
            other => Err(BgRemovalError::internal(format!(
                "No constructor for backend '{other}'"
            ))),
        }
    }

    fn available_backends(&self) -> Vec<BackendType> {
        let mut backends = Vec::new();
        #[cfg(feature = "tract")]
        backends.push(BackendType::Tract);
        #[cfg(feature = "onnx")]
        backends.push(BackendType::Onnx);
        backends
    }
}

/// Background removal processor
pub struct BackgroundRemovalProcessor {
    config: RemovalConfig,
    backend_factory: Box<dyn BackendFactory>,
    backend: Option<Box<dyn InferenceBackend>>,
    /// Model load time not yet reported in a result
    pending_model_load_ms: Option<u64>,
}

impl std::fmt::Debug for BackgroundRemovalProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackgroundRemovalProcessor")
            .field("config", &self.config)
            .field("initialized", &self.is_initialized())
            .finish_non_exhaustive()
    }
}

impl BackgroundRemovalProcessor {
    /// Create a processor with the default backend factory
    ///
    /// # Errors
    /// - Invalid configuration
    pub fn new(config: RemovalConfig) -> Result<Self> {
        Self::with_factory(config, Box::new(DefaultBackendFactory))
    }

    /// Create a processor with a custom backend factory
    ///
    /// # Errors
    /// - Invalid configuration
    pub fn with_factory(config: RemovalConfig, backend_factory: Box<dyn BackendFactory>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            backend_factory,
            backend: None,
            pending_model_load_ms: None,
        })
    }

    /// Create and initialize the backend if that has not happened yet
    ///
    /// # Errors
    /// - Model resolution, download or load failures
    /// - Backend initialization errors
    pub fn initialize(&mut self) -> Result<()> {
        if self.backend.is_some() {
            return Ok(());
        }

        info!(
            backend = %self.config.backend_type,
            model = %self.config.model_spec.source.display_name(),
            "Initializing background removal processor"
        );

        let mut backend = self.backend_factory.create_backend(&self.config)?;
        let model_load_time = backend.initialize(&self.config)?;

        self.pending_model_load_ms = model_load_time.map(|d| d.as_millis() as u64);
        self.backend = Some(backend);

        debug!("Background removal processor initialized");
        Ok(())
    }

    /// Remove the background of a decoded image
    ///
    /// # Errors
    /// - Backend initialization failures
    /// - Preprocessing, inference or postprocessing errors
    #[instrument(
        skip(self, image),
        fields(
            backend = %self.config.backend_type,
            dimensions = %format!("{}x{}", image.width(), image.height())
        )
    )]
    pub fn process_image(&mut self, image: &DynamicImage) -> Result<RemovalResult> {
        self.initialize()?;

        let total_start = Instant::now();
        let mut timings = ProcessingTimings {
            model_load_ms: self.pending_model_load_ms.take().unwrap_or(0),
            ..ProcessingTimings::default()
        };
        let original_dimensions = (image.width(), image.height());

        let backend = self
            .backend
            .as_mut()
            .ok_or_else(|| BgRemovalError::internal("Backend not initialized"))?;

        let input_tensor = {
            let _span = span!(Level::DEBUG, "preprocessing").entered();
            let start = Instant::now();
            let preprocessing_config = backend.get_preprocessing_config()?;
            let tensor = ImagePreprocessor::preprocess_for_inference(image, &preprocessing_config)?;
            timings.preprocessing_ms = start.elapsed().as_millis() as u64;
            tensor
        };

        let output_tensor = {
            let _span = span!(Level::DEBUG, "inference").entered();
            let start = Instant::now();
            let tensor = backend.infer(&input_tensor)?;
            timings.inference_ms = start.elapsed().as_millis() as u64;
            tensor
        };

        let (mask, output) = {
            let _span = span!(Level::DEBUG, "postprocessing").entered();
            let start = Instant::now();
            let mut mask = tensor_to_mask(&output_tensor, original_dimensions)?;
            if self.config.post_process_mask {
                mask = refine_mask(&mask)?;
            }
            let output = OutputFormatHandler::compose(image, &mask, &self.config)?;
            timings.postprocessing_ms = start.elapsed().as_millis() as u64;
            (mask, output)
        };

        timings.total_ms = total_start.elapsed().as_millis() as u64 + timings.model_load_ms;

        let stats = mask.statistics();
        debug!(
            foreground_ratio = %format!("{:.3}", stats.foreground_ratio),
            "Mask generated"
        );

        Ok(RemovalResult::new(output, mask, original_dimensions, timings))
    }

    /// Decode image bytes and remove the background
    ///
    /// # Errors
    /// - Decoding failures (raised before any model is loaded)
    /// - Any [`Self::process_image`] failure
    pub fn process_bytes(&mut self, image_bytes: &[u8]) -> Result<RemovalResult> {
        let decode_start = Instant::now();
        let image = ImageIOService::decode(image_bytes)?;
        let decode_ms = decode_start.elapsed().as_millis() as u64;

        let mut result = self.process_image(&image)?;
        result.timings.image_decode_ms = decode_ms;
        result.timings.total_ms += decode_ms;
        Ok(result)
    }

    /// Read an image file and remove the background
    ///
    /// # Errors
    /// - Input file missing or unreadable
    /// - Any [`Self::process_bytes`] failure
    pub fn process_file<P: AsRef<Path>>(&mut self, input_path: P) -> Result<RemovalResult> {
        let bytes = ImageIOService::read_input(&input_path)?;
        debug!(
            path = %input_path.as_ref().display(),
            bytes = bytes.len(),
            "Read input image"
        );
        self.process_bytes(&bytes)
    }

    /// Read `input_path`, remove the background and write a PNG to `output_path`
    ///
    /// # Errors
    /// - Any [`Self::process_file`] failure
    /// - PNG encoding failures
    /// - Output path unwritable
    pub fn process_file_to<P: AsRef<Path>, Q: AsRef<Path>>(
        &mut self,
        input_path: P,
        output_path: Q,
    ) -> Result<RemovalResult> {
        let mut result = self.process_file(input_path)?;

        let encode_start = Instant::now();
        let png = result.to_png_bytes()?;
        ImageIOService::write_output(&output_path, &png)?;
        let encode_ms = encode_start.elapsed().as_millis() as u64;

        result.timings.image_encode_ms = Some(encode_ms);
        result.timings.total_ms += encode_ms;

        info!(
            output = %output_path.as_ref().display(),
            bytes = png.len(),
            "Wrote output image"
        );
        Ok(result)
    }

    #[must_use]
    pub fn config(&self) -> &RemovalConfig {
        &self.config
    }

    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.backend.as_ref().is_some_and(|b| b.is_initialized())
    }

    #[must_use]
    pub fn available_backends(&self) -> Vec<BackendType> {
        self.backend_factory.available_backends()
    }
}
