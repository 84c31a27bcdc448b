//! Model downloading for registry models
//!
//! Downloads are blocking and atomic: the body is streamed into a temporary
//! file inside the cache directory and renamed into place only once complete,
//! so an interrupted download never leaves a truncated model behind.

use crate::cache::ModelCache;
use crate::error::{BgRemovalError, Result};
use crate::models::KnownModel;
use reqwest::blocking::Client;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(300);

/// Model downloader writing into a [`ModelCache`]
#[derive(Debug)]
pub struct ModelDownloader {
    client: Client,
    cache: ModelCache,
}

impl ModelDownloader {
    /// # Errors
    /// - Failed to create HTTP client
    pub fn new(cache: ModelCache) -> Result<Self> {
        let client = Client::builder()
            .timeout(DOWNLOAD_TIMEOUT)
            .user_agent(concat!("bgremove/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| BgRemovalError::download(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self { client, cache })
    }

    /// Download a registry model into the cache and return its path
    ///
    /// # Errors
    /// - Network errors or non-success HTTP status
    /// - File system errors while writing into the cache
    pub fn download_model(&self, model: &KnownModel) -> Result<PathBuf> {
        let url = model.url();
        validate_model_url(&url)?;

        let target = self.cache.get_model_path(model);
        self.download_file(&url, &target)?;
        Ok(target)
    }

    fn download_file(&self, url: &str, target: &Path) -> Result<()> {
        log::debug!("Downloading: {} -> {}", url, target.display());

        let parent = target.parent().ok_or_else(|| {
            BgRemovalError::internal(format!("Model path has no parent: {}", target.display()))
        })?;
        fs::create_dir_all(parent)
            .map_err(|e| BgRemovalError::file_io_error("create cache directory", parent, &e))?;

        let mut response = self
            .client
            .get(url)
            .send()
            .map_err(|e| BgRemovalError::download(format!("Failed to download {url}: {e}")))?;

        if !response.status().is_success() {
            return Err(BgRemovalError::download(format!(
                "HTTP error {} for {url}",
                response.status()
            )));
        }

        // Dropped (and deleted) on any early return below.
        let mut staging = tempfile::Builder::new()
            .prefix(".download-")
            .suffix(".part")
            .tempfile_in(parent)
            .map_err(|e| BgRemovalError::file_io_error("create temporary file in", parent, &e))?;

        let downloaded = response
            .copy_to(staging.as_file_mut())
            .map_err(|e| BgRemovalError::download(format!("Failed to read body of {url}: {e}")))?;

        if downloaded == 0 {
            return Err(BgRemovalError::download(format!("Empty response body for {url}")));
        }

        staging
            .as_file()
            .sync_all()
            .map_err(|e| BgRemovalError::file_io_error("flush", staging.path(), &e))?;
        staging
            .persist(target)
            .map_err(|e| BgRemovalError::file_io_error("move downloaded model to", target, &e.error))?;

        log::debug!("Downloaded {} bytes to {}", downloaded, target.display());
        Ok(())
    }
}

/// Only absolute HTTPS URLs are fetched.
///
/// # Errors
/// - Empty URL or a scheme other than `https`
pub fn validate_model_url(url: &str) -> Result<()> {
    if url.is_empty() {
        return Err(BgRemovalError::invalid_config("Model URL cannot be empty"));
    }

    let Some(rest) = url.strip_prefix("https://") else {
        return Err(BgRemovalError::invalid_config(format!(
            "Unsupported model URL: {url}. Only https:// URLs are downloaded"
        )));
    };

    if rest.split('/').next().map_or(true, str::is_empty) {
        return Err(BgRemovalError::invalid_config(format!(
            "Model URL has no host: {url}"
        )));
    }

    Ok(())
}
