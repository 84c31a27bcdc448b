//! Conversion of parsed CLI arguments into a [`RemovalConfig`]

use crate::cli::main_impl::Cli;
use crate::{config::RemovalConfig, models::ModelSpec};
use anyhow::{Context, Result};

pub(crate) struct CliConfigBuilder;

impl CliConfigBuilder {
    /// Build the removal configuration from CLI arguments
    pub(crate) fn from_cli(cli: &Cli) -> Result<RemovalConfig> {
        let model_spec = ModelSpec::parse(&cli.model)
            .with_context(|| format!("Invalid model '{}'", cli.model))?;

        let background_color = cli
            .bgcolor
            .as_deref()
            .map(Self::parse_color)
            .transpose()?;

        RemovalConfig::builder()
            .model_spec(model_spec)
            .backend_type(cli.backend.into())
            .post_process_mask(cli.post_process_mask)
            .only_mask(cli.only_mask)
            .background_color(background_color)
            .cache_dir(cli.cache_dir.clone())
            .intra_threads(cli.threads)
            .build()
            .context("Configuration validation failed")
    }

    fn parse_color(values: &[u8]) -> Result<[u8; 4]> {
        <[u8; 4]>::try_from(values).map_err(|_| {
            anyhow::anyhow!("--bgcolor takes exactly 4 values (R G B A), got {}", values.len())
        })
    }
}
