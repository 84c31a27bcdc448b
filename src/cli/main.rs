//! Background removal CLI tool
//!
//! `bgremove [OPTIONS] <INPUT> <OUTPUT>` reads one image, removes its
//! background and writes a PNG with an alpha channel.
//!
//! Exit codes: 0 on success, 2 on usage errors (reported by clap before any
//! file is touched, including unknown model names), 1 on runtime failures.
//! Runtime failures print a `BG_REMOVE_ERROR: ` line followed by the error
//! report with its cause chain on stderr. The report includes a backtrace
//! only when `RUST_BACKTRACE` or `RUST_LIB_BACKTRACE` is set.

use super::config::CliConfigBuilder;
use crate::{
    cache::{format_size, ModelCache},
    config::BackendType,
    models::{ModelSpec, DEFAULT_MODEL, KNOWN_MODELS},
    processor::BackgroundRemovalProcessor,
    services::ImageIOService,
    tracing_config::init_cli_tracing,
};
use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{debug, info};

/// Marker prefixed to the error line of every runtime failure
pub const ERROR_MARKER: &str = "BG_REMOVE_ERROR:";

const RUNTIME_FAILURE_EXIT_CODE: u8 = 1;

/// Remove the background of an image
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(name = "bgremove")]
pub struct Cli {
    /// Input image (PNG, JPEG, TIFF, BMP, GIF, WebP)
    #[arg(value_name = "INPUT", required_unless_present = "list_models")]
    pub input: Option<PathBuf>,

    /// Output PNG path (overwritten if it exists)
    #[arg(value_name = "OUTPUT", required_unless_present = "list_models")]
    pub output: Option<PathBuf>,

    /// Registry model name or path to an .onnx file
    #[arg(
        short,
        long,
        value_name = "NAME|PATH",
        default_value = DEFAULT_MODEL,
        value_parser = parse_model_arg
    )]
    pub model: String,

    /// Inference backend
    #[arg(short, long, value_enum, default_value_t = CliBackend::Tract)]
    pub backend: CliBackend,

    /// Smooth the mask (opening, gaussian blur, threshold)
    #[arg(long)]
    pub post_process_mask: bool,

    /// Write the grayscale mask instead of the cutout
    #[arg(long, conflicts_with = "bgcolor")]
    pub only_mask: bool,

    /// Composite the cutout over a solid RGBA colour
    #[arg(long, num_args = 4, value_names = ["R", "G", "B", "A"])]
    pub bgcolor: Option<Vec<u8>>,

    /// Use custom model cache directory
    #[arg(long, value_name = "PATH")]
    pub cache_dir: Option<PathBuf>,

    /// Number of inference threads (0 = engine default)
    #[arg(short, long, default_value_t = 0)]
    pub threads: usize,

    /// Enable verbose logging (-v: WARN, -vv: INFO, -vvv: DEBUG, -vvvv: TRACE)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// List registry models with their cache status and exit
    #[arg(long)]
    pub list_models: bool,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
pub enum CliBackend {
    /// Pure Rust inference
    Tract,
    /// ONNX Runtime (requires the `onnx` feature)
    Onnx,
}

/// Accept registry names and `.onnx` paths, reject unknown names at parse time
fn parse_model_arg(value: &str) -> std::result::Result<String, String> {
    ModelSpec::parse(value)
        .map(|_| value.to_string())
        .map_err(|e| e.to_string())
}

impl From<CliBackend> for BackendType {
    fn from(backend: CliBackend) -> Self {
        match backend {
            CliBackend::Tract => BackendType::Tract,
            CliBackend::Onnx => BackendType::Onnx,
        }
    }
}

/// Process entry point
///
/// Usage errors never return: clap prints the usage and exits with 2.
#[must_use]
pub fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = init_cli_tracing(cli.verbose) {
        eprintln!("warning: failed to initialize logging: {e:#}");
    }

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprint!("{}", report_failure(&err));
            ExitCode::from(RUNTIME_FAILURE_EXIT_CODE)
        },
    }
}

/// Run one invocation
///
/// # Errors
/// - Invalid option combination or model name
/// - Input unreadable or not a decodable image
/// - Model resolution, download, load or inference failures
/// - Output unwritable
pub fn run(cli: &Cli) -> Result<()> {
    if cli.list_models {
        return list_models(cli);
    }

    let (Some(input), Some(output)) = (&cli.input, &cli.output) else {
        anyhow::bail!("Both INPUT and OUTPUT are required");
    };

    let config = CliConfigBuilder::from_cli(cli).context("Invalid configuration")?;
    info!(
        input = %input.display(),
        output = %output.display(),
        model = %config.model_spec.source.display_name(),
        backend = %config.backend_type,
        "Starting background removal"
    );

    let bytes = ImageIOService::read_input(input)
        .with_context(|| format!("Failed to read input image '{}'", input.display()))?;

    let mut processor =
        BackgroundRemovalProcessor::new(config).context("Failed to create processor")?;
    let result = processor
        .process_bytes(&bytes)
        .with_context(|| format!("Failed to remove background from '{}'", input.display()))?;

    let png = result.to_png_bytes().context("Failed to encode PNG output")?;
    ImageIOService::write_output(output, &png)
        .with_context(|| format!("Failed to write output image '{}'", output.display()))?;

    debug!("{}", result.timing_summary());
    info!(output = %output.display(), "Background removed");
    Ok(())
}

/// Render a runtime failure for stderr
///
/// First line: the marker and the error with its causes. Then the full
/// `{:?}` report, with a backtrace only if capture was enabled through the
/// environment.
#[must_use]
pub fn report_failure(err: &anyhow::Error) -> String {
    format!("{ERROR_MARKER} {err:#}\n{err:?}\n")
}

/// Print the model registry with cache status
///
/// # Errors
/// - Cache directory cannot be determined or scanned
pub fn list_models(cli: &Cli) -> Result<()> {
    let cache = match &cli.cache_dir {
        Some(dir) => ModelCache::with_custom_cache_dir(dir)?,
        None => ModelCache::new()?,
    };
    let cached = cache
        .scan_cached_models()
        .context("Failed to scan model cache")?;

    println!("Models (cache: {})", cache.get_current_cache_dir().display());
    for model in KNOWN_MODELS {
        let status = cached
            .iter()
            .find(|entry| entry.name == model.name)
            .map_or_else(
                || "not downloaded".to_string(),
                |entry| format!("cached, {}", format_size(entry.size_bytes)),
            );
        let default_marker = if model.name == DEFAULT_MODEL { " (default)" } else { "" };

        println!(
            "  {:<18} {:>4}px  {:<16} {}{}",
            model.name, model.input_size, status, model.description, default_marker
        );
    }

    Ok(())
}
