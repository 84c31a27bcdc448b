//! Configuration types for background removal operations

use crate::error::{BgRemovalError, Result};
use crate::models::{ModelSource, ModelSpec};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;

/// Inference engine used to run the model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BackendType {
    /// Tract backend (pure Rust, no external dependencies)
    Tract,
    /// ONNX Runtime backend
    Onnx,
}

impl Default for BackendType {
    fn default() -> Self {
        Self::Tract
    }
}

impl std::fmt::Display for BackendType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Tract => write!(f, "tract"),
            Self::Onnx => write!(f, "onnx"),
        }
    }
}

impl FromStr for BackendType {
    type Err = BgRemovalError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "tract" => Ok(Self::Tract),
            "onnx" => Ok(Self::Onnx),
            other => Err(BgRemovalError::invalid_config(format!(
                "Unknown backend '{other}'. Expected 'tract' or 'onnx'"
            ))),
        }
    }
}

/// Configuration for one background removal run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemovalConfig {
    /// Which model to run
    pub model_spec: ModelSpec,
    pub backend_type: BackendType,
    /// Refine the mask with opening, blur and threshold
    pub post_process_mask: bool,
    /// Emit the grayscale mask instead of the cutout
    pub only_mask: bool,
    /// Composite the cutout over this RGBA colour
    pub background_color: Option<[u8; 4]>,
    /// Model cache directory (None = platform default)
    pub cache_dir: Option<PathBuf>,
    /// Inference threads (0 = engine default)
    pub intra_threads: usize,
}

impl Default for RemovalConfig {
    fn default() -> Self {
        Self {
            model_spec: ModelSpec::default(),
            backend_type: BackendType::default(),
            post_process_mask: false,
            only_mask: false,
            background_color: None,
            cache_dir: None,
            intra_threads: 0,
        }
    }
}

impl RemovalConfig {
    #[must_use]
    pub fn builder() -> RemovalConfigBuilder {
        RemovalConfigBuilder::new()
    }

    /// Validate the configuration
    ///
    /// # Errors
    /// - Mask-only output combined with a background colour
    /// - External model path without an `.onnx` extension
    pub fn validate(&self) -> Result<()> {
        if self.only_mask && self.background_color.is_some() {
            return Err(BgRemovalError::invalid_config(
                "only_mask and background_color are mutually exclusive",
            ));
        }

        if let ModelSource::External(path) = &self.model_spec.source {
            let is_onnx = path
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("onnx"));
            if !is_onnx {
                return Err(BgRemovalError::invalid_config(format!(
                    "External model must be an .onnx file: {}",
                    path.display()
                )));
            }
        }

        Ok(())
    }
}

/// Builder for [`RemovalConfig`]
#[derive(Debug, Default)]
pub struct RemovalConfigBuilder {
    config: RemovalConfig,
}

impl RemovalConfigBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn model_spec(mut self, model_spec: ModelSpec) -> Self {
        self.config.model_spec = model_spec;
        self
    }

    #[must_use]
    pub fn backend_type(mut self, backend_type: BackendType) -> Self {
        self.config.backend_type = backend_type;
        self
    }

    #[must_use]
    pub fn post_process_mask(mut self, enabled: bool) -> Self {
        self.config.post_process_mask = enabled;
        self
    }

    #[must_use]
    pub fn only_mask(mut self, enabled: bool) -> Self {
        self.config.only_mask = enabled;
        self
    }

    #[must_use]
    pub fn background_color(mut self, color: Option<[u8; 4]>) -> Self {
        self.config.background_color = color;
        self
    }

    #[must_use]
    pub fn cache_dir(mut self, cache_dir: Option<PathBuf>) -> Self {
        self.config.cache_dir = cache_dir;
        self
    }

    #[must_use]
    pub fn intra_threads(mut self, threads: usize) -> Self {
        self.config.intra_threads = threads;
        self
    }

    /// # Errors
    /// - Any [`RemovalConfig::validate`] failure
    pub fn build(self) -> Result<RemovalConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RemovalConfig::default();
        assert_eq!(config.backend_type, BackendType::Tract);
        assert_eq!(config.model_spec, ModelSpec::default());
        assert!(!config.only_mask);
        assert!(config.background_color.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_chain() {
        let config = RemovalConfig::builder()
            .backend_type(BackendType::Onnx)
            .post_process_mask(true)
            .background_color(Some([255, 255, 255, 255]))
            .intra_threads(2)
            .build()
            .unwrap();

        assert_eq!(config.backend_type, BackendType::Onnx);
        assert!(config.post_process_mask);
        assert_eq!(config.background_color, Some([255, 255, 255, 255]));
        assert_eq!(config.intra_threads, 2);
    }

    #[test]
    fn test_only_mask_conflicts_with_background() {
        let result = RemovalConfig::builder()
            .only_mask(true)
            .background_color(Some([0, 0, 0, 255]))
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_external_model_requires_onnx_extension() {
        let result = RemovalConfig::builder()
            .model_spec(ModelSpec {
                source: ModelSource::External(PathBuf::from("models/u2net.bin")),
            })
            .build();
        assert!(result.unwrap_err().to_string().contains(".onnx"));
    }

    #[test]
    fn test_backend_type_parsing() {
        assert_eq!("tract".parse::<BackendType>().unwrap(), BackendType::Tract);
        assert_eq!("ONNX".parse::<BackendType>().unwrap(), BackendType::Onnx);
        assert!("cuda".parse::<BackendType>().is_err());
        assert_eq!(BackendType::Onnx.to_string(), "onnx");
    }
}
