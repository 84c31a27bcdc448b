//! Model cache management for downloaded models
//!
//! Registry models are stored as flat `<name>.onnx` files under a per-user
//! cache directory (`~/.cache/bgremove/models/` on Linux,
//! `~/Library/Caches/bgremove/models/` on macOS,
//! `%LOCALAPPDATA%\bgremove\models\` on Windows).

use crate::error::{BgRemovalError, Result};
use crate::models::{KnownModel, KNOWN_MODELS};
use std::fs;
use std::path::{Path, PathBuf};

/// Information about a cached model
#[derive(Debug, Clone)]
pub struct CachedModelInfo {
    pub name: String,
    pub path: PathBuf,
    pub size_bytes: u64,
}

/// Model cache manager
#[derive(Debug, Clone)]
pub struct ModelCache {
    cache_dir: PathBuf,
}

impl ModelCache {
    /// Create a cache rooted at the platform cache directory
    ///
    /// The directory is created on first download, not here.
    ///
    /// # Errors
    /// - Failed to determine the user cache directory
    pub fn new() -> Result<Self> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| {
                BgRemovalError::invalid_config(
                    "Failed to determine cache directory. Use --cache-dir to set one.",
                )
            })?
            .join("bgremove")
            .join("models");

        Ok(Self { cache_dir })
    }

    /// Create a cache rooted at a custom directory
    ///
    /// # Errors
    /// - The path exists but is not a directory
    pub fn with_custom_cache_dir<P: AsRef<Path>>(cache_dir: P) -> Result<Self> {
        let cache_dir = cache_dir.as_ref().to_path_buf();
        if cache_dir.exists() && !cache_dir.is_dir() {
            return Err(BgRemovalError::invalid_config(format!(
                "Cache path exists and is not a directory: {}",
                cache_dir.display()
            )));
        }
        Ok(Self { cache_dir })
    }

    #[must_use]
    pub fn get_current_cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    #[must_use]
    pub fn get_model_path(&self, model: &KnownModel) -> PathBuf {
        self.cache_dir.join(model.file_name())
    }

    /// A zero-length file counts as absent.
    #[must_use]
    pub fn is_model_cached(&self, model: &KnownModel) -> bool {
        fs::metadata(self.get_model_path(model)).is_ok_and(|m| m.is_file() && m.len() > 0)
    }

    /// List registry models present in the cache, sorted by name
    ///
    /// # Errors
    /// - Failed to read the cache directory
    pub fn scan_cached_models(&self) -> Result<Vec<CachedModelInfo>> {
        let mut models = Vec::new();

        if !self.cache_dir.exists() {
            return Ok(models);
        }

        for model in KNOWN_MODELS {
            if !self.is_model_cached(model) {
                continue;
            }
            let path = self.get_model_path(model);
            let size_bytes = fs::metadata(&path)
                .map_err(|e| BgRemovalError::file_io_error("inspect cached model", &path, &e))?
                .len();
            models.push(CachedModelInfo {
                name: model.name.to_string(),
                path,
                size_bytes,
            });
        }

        models.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(models)
    }
}

/// Format a byte count for display
#[must_use]
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    let suffix = UNITS.get(unit).copied().unwrap_or("B");
    if unit == 0 {
        format!("{bytes} {suffix}")
    } else {
        format!("{size:.1} {suffix}")
    }
}
