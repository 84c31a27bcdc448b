//! Model registry, model specifications and model resolution

use crate::cache::ModelCache;
use crate::download::ModelDownloader;
use crate::error::{BgRemovalError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Name of the model used when none is requested
pub const DEFAULT_MODEL: &str = "u2net";

const RELEASE_BASE_URL: &str = "https://github.com/danielgatis/rembg/releases/download/v0.0.0";

const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Input geometry and normalization expected by a model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreprocessingConfig {
    /// Model input size as `[width, height]`
    pub target_size: [u32; 2],
    pub normalization_mean: [f32; 3],
    pub normalization_std: [f32; 3],
}

impl Default for PreprocessingConfig {
    fn default() -> Self {
        Self {
            target_size: [320, 320],
            normalization_mean: IMAGENET_MEAN,
            normalization_std: IMAGENET_STD,
        }
    }
}

/// A model that can be fetched by name
#[derive(Debug, Clone, Copy)]
pub struct KnownModel {
    pub name: &'static str,
    pub description: &'static str,
    pub input_size: u32,
    pub normalization_mean: [f32; 3],
    pub normalization_std: [f32; 3],
}

impl KnownModel {
    #[must_use]
    pub fn file_name(&self) -> String {
        format!("{}.onnx", self.name)
    }

    #[must_use]
    pub fn url(&self) -> String {
        format!("{RELEASE_BASE_URL}/{}", self.file_name())
    }

    #[must_use]
    pub fn preprocessing_config(&self) -> PreprocessingConfig {
        PreprocessingConfig {
            target_size: [self.input_size, self.input_size],
            normalization_mean: self.normalization_mean,
            normalization_std: self.normalization_std,
        }
    }
}

pub const KNOWN_MODELS: &[KnownModel] = &[
    KnownModel {
        name: "u2net",
        description: "General purpose salient object segmentation",
        input_size: 320,
        normalization_mean: IMAGENET_MEAN,
        normalization_std: IMAGENET_STD,
    },
    KnownModel {
        name: "u2netp",
        description: "Lightweight version of u2net",
        input_size: 320,
        normalization_mean: IMAGENET_MEAN,
        normalization_std: IMAGENET_STD,
    },
    KnownModel {
        name: "u2net_human_seg",
        description: "Human segmentation",
        input_size: 320,
        normalization_mean: IMAGENET_MEAN,
        normalization_std: IMAGENET_STD,
    },
    KnownModel {
        name: "silueta",
        description: "Reduced size u2net (43MB)",
        input_size: 320,
        normalization_mean: IMAGENET_MEAN,
        normalization_std: IMAGENET_STD,
    },
    KnownModel {
        name: "isnet-general-use",
        description: "IS-Net general use segmentation",
        input_size: 1024,
        normalization_mean: [0.5, 0.5, 0.5],
        normalization_std: [1.0, 1.0, 1.0],
    },
    KnownModel {
        name: "isnet-anime",
        description: "High-accuracy segmentation for anime characters",
        input_size: 1024,
        normalization_mean: IMAGENET_MEAN,
        normalization_std: [1.0, 1.0, 1.0],
    },
];

/// Look up a registry model by name
#[must_use]
pub fn find_known_model(name: &str) -> Option<&'static KnownModel> {
    KNOWN_MODELS.iter().find(|model| model.name == name)
}

/// Model source specification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ModelSource {
    /// External model from filesystem path
    External(PathBuf),
    /// Registry model fetched into the cache by name
    Downloaded(String),
}

impl ModelSource {
    /// Get a display name for tracing and logging
    #[must_use]
    pub fn display_name(&self) -> String {
        match self {
            ModelSource::External(path) => {
                format!(
                    "external:{}",
                    path.file_name().unwrap_or_default().to_string_lossy()
                )
            },
            ModelSource::Downloaded(name) => format!("cached:{name}"),
        }
    }
}

/// Complete model specification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSpec {
    pub source: ModelSource,
}

impl Default for ModelSpec {
    fn default() -> Self {
        Self {
            source: ModelSource::Downloaded(DEFAULT_MODEL.to_string()),
        }
    }
}

impl ModelSpec {
    /// Parse a model argument: an `.onnx` path or a registry name
    ///
    /// # Errors
    /// - Unknown registry model name
    pub fn parse(value: &str) -> Result<Self> {
        let path = Path::new(value);
        let is_onnx = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("onnx"));
        let has_separator = value.contains('/') || value.contains(std::path::MAIN_SEPARATOR);

        if is_onnx || has_separator {
            return Ok(Self {
                source: ModelSource::External(path.to_path_buf()),
            });
        }

        if find_known_model(value).is_none() {
            let names: Vec<&str> = KNOWN_MODELS.iter().map(|m| m.name).collect();
            return Err(BgRemovalError::invalid_config(format!(
                "Unknown model '{value}'. Known models: {}",
                names.join(", ")
            )));
        }

        Ok(Self {
            source: ModelSource::Downloaded(value.to_string()),
        })
    }
}

/// Model information and metadata
#[derive(Debug, Clone)]
pub struct ModelInfo {
    pub name: String,
    pub path: PathBuf,
    pub size_bytes: u64,
}

/// Resolved model: a file on disk plus its preprocessing configuration
#[derive(Debug, Clone)]
pub struct ModelManager {
    name: String,
    model_path: PathBuf,
    preprocessing: PreprocessingConfig,
}

impl ModelManager {
    /// Resolve a model specification to a file on disk
    ///
    /// Registry models missing from the cache are downloaded first.
    ///
    /// # Errors
    /// - External model file does not exist
    /// - Unknown registry model
    /// - Download failures
    /// - Invalid preprocessing sidecar
    pub fn from_spec(spec: &ModelSpec, cache: &ModelCache) -> Result<Self> {
        match &spec.source {
            ModelSource::External(path) => Self::with_external_model(path),
            ModelSource::Downloaded(name) => {
                let model = find_known_model(name).ok_or_else(|| {
                    BgRemovalError::invalid_config(format!("Unknown model '{name}'"))
                })?;

                let model_path = if cache.is_model_cached(model) {
                    cache.get_model_path(model)
                } else {
                    log::info!("Model '{}' not cached, downloading from {}", model.name, model.url());
                    ModelDownloader::new(cache.clone())?.download_model(model)?
                };

                Ok(Self {
                    name: model.name.to_string(),
                    model_path,
                    preprocessing: model.preprocessing_config(),
                })
            },
        }
    }

    /// Use an ONNX file from the filesystem
    ///
    /// Preprocessing comes from a `<stem>.json` sidecar when present, then from
    /// the registry entry matching the file stem, then from the defaults.
    ///
    /// # Errors
    /// - Model path does not exist or is not a file
    /// - Sidecar present but unreadable or malformed
    pub fn with_external_model<P: AsRef<Path>>(model_path: P) -> Result<Self> {
        let model_path = model_path.as_ref().to_path_buf();

        if !model_path.is_file() {
            return Err(BgRemovalError::model_error_with_context(
                "locate",
                &model_path,
                "file does not exist",
                &["check the --model path", "use a registry model name such as u2net"],
            ));
        }

        let stem = model_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();

        let sidecar = model_path.with_extension("json");
        let preprocessing = if sidecar.is_file() {
            Self::read_sidecar(&sidecar)?
        } else if let Some(model) = find_known_model(&stem) {
            model.preprocessing_config()
        } else {
            log::debug!("No preprocessing sidecar for {}, using defaults", model_path.display());
            PreprocessingConfig::default()
        };

        Ok(Self {
            name: stem,
            model_path,
            preprocessing,
        })
    }

    fn read_sidecar(path: &Path) -> Result<PreprocessingConfig> {
        let content = fs::read_to_string(path)
            .map_err(|e| BgRemovalError::file_io_error("read model sidecar", path, &e))?;
        let config: PreprocessingConfig = serde_json::from_str(&content).map_err(|e| {
            BgRemovalError::invalid_config(format!(
                "Failed to parse model sidecar '{}': {e}",
                path.display()
            ))
        })?;

        if config.target_size.iter().any(|&side| side == 0) {
            return Err(BgRemovalError::invalid_config(format!(
                "Model sidecar '{}' has a zero target size",
                path.display()
            )));
        }
        if config.normalization_std.iter().any(|&std| std <= 0.0) {
            return Err(BgRemovalError::invalid_config(format!(
                "Model sidecar '{}' has a non-positive normalization std",
                path.display()
            )));
        }

        Ok(config)
    }

    /// Load model data as bytes
    ///
    /// # Errors
    /// - File I/O errors when reading model data
    pub fn load_model(&self) -> Result<Vec<u8>> {
        fs::read(&self.model_path)
            .map_err(|e| BgRemovalError::file_io_error("read model", &self.model_path, &e))
    }

    /// # Errors
    /// - Model file metadata unavailable
    pub fn get_info(&self) -> Result<ModelInfo> {
        let metadata = fs::metadata(&self.model_path)
            .map_err(|e| BgRemovalError::file_io_error("inspect model", &self.model_path, &e))?;

        Ok(ModelInfo {
            name: self.name.clone(),
            path: self.model_path.clone(),
            size_bytes: metadata.len(),
        })
    }

    #[must_use]
    pub fn get_preprocessing_config(&self) -> PreprocessingConfig {
        self.preprocessing.clone()
    }

    #[must_use]
    pub fn model_path(&self) -> &Path {
        &self.model_path
    }
}
