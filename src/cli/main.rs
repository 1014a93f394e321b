//! Garment cutout CLI tool
//!
//! Command-line interface for cutting garments out of their background using the unified processor.

use super::config::CliConfigBuilder;
use crate::{
    config::{
        DEFAULT_MAX_DIMENSION, DEFAULT_MAX_INPUT_BYTES, DEFAULT_MIN_FOREGROUND_FRACTION,
        DEFAULT_SMOOTHING_RADIUS, DEFAULT_THRESHOLD,
    },
    inference::LearnedSegmenter,
    processor::BackgroundRemovalProcessor,
    services::{
        ConsoleProgressReporter, ImageIOService, InputLoader, InputSource, OutputFormatHandler,
    },
    tracing_config::spans,
    types::GarmentResponse,
    OutputFormat,
};
use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, error, info, warn, Instrument};

/// Garment background removal CLI tool
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(name = "garment-cutout")]
#[allow(clippy::struct_excessive_bools)]
pub struct Cli {
    /// Input image files or directories (use "-" for stdin)
    #[arg(value_name = "INPUT", required_unless_present_any = &["show_capabilities", "url", "base64"])]
    pub input: Vec<String>,

    /// Fetch the input image from an http(s) URL
    #[arg(long, value_name = "URL", conflicts_with = "base64")]
    pub url: Option<String>,

    /// Read the input image from a base64 string or data URL
    #[arg(long, value_name = "DATA")]
    pub base64: Option<String>,

    /// Output file (single input) or directory (batch processing). Use "-" for stdout.
    #[arg(short, long, value_name = "OUTPUT")]
    pub output: Option<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = CliOutputFormat::Png)]
    pub format: CliOutputFormat,

    /// Colour distance above which a pixel counts as garment (0-441)
    #[arg(long, default_value_t = DEFAULT_THRESHOLD)]
    pub threshold: u32,

    /// Dilate/erode passes used to close holes in the mask
    #[arg(long, default_value_t = DEFAULT_SMOOTHING_RADIUS)]
    pub smoothing_radius: u32,

    /// Minimum share of garment pixels before the threshold is lowered
    #[arg(long, default_value_t = DEFAULT_MIN_FOREGROUND_FRACTION)]
    pub min_foreground_fraction: f64,

    /// Downscale inputs whose larger side exceeds this many pixels
    #[arg(long, default_value_t = DEFAULT_MAX_DIMENSION)]
    pub max_dimension: u32,

    /// Reject inputs larger than this many bytes
    #[arg(long, default_value_t = DEFAULT_MAX_INPUT_BYTES)]
    pub max_input_bytes: usize,

    /// Timeout in seconds for --url fetches
    #[arg(long, value_name = "SECS")]
    pub fetch_timeout: Option<u64>,

    /// Skip the learned segmenter and use the heuristic matte only
    #[arg(long)]
    pub no_learned: bool,

    /// External matting command used as the learned segmenter [default: rembg when installed]
    #[arg(long, value_name = "PROGRAM")]
    pub segmenter_command: Option<String>,

    /// Argument for --segmenter-command; "{input}" and "{output}" are replaced with file paths
    #[arg(long, value_name = "ARG", allow_hyphen_values = true)]
    pub segmenter_arg: Vec<String>,

    /// Only convert to RGBA, keeping the background
    #[arg(long)]
    pub keep_background: bool,

    /// Print a JSON response with the base64 PNG instead of writing image bytes
    #[arg(long)]
    pub json: bool,

    /// Garment type echoed in the JSON response
    #[arg(long, default_value = GarmentResponse::DEFAULT_GARMENT_TYPE)]
    pub garment_type: String,

    /// Gender echoed in the JSON response
    #[arg(long, default_value = GarmentResponse::DEFAULT_GENDER)]
    pub gender: String,

    /// Process directory recursively
    #[arg(short, long)]
    pub recursive: bool,

    /// Pattern for batch processing (e.g., "*.jpg")
    #[arg(long)]
    pub pattern: Option<String>,

    /// Report whether a learned segmenter is installed and exit
    #[arg(long)]
    pub show_capabilities: bool,

    /// Enable verbose logging (-v: DEBUG, -vv: TRACE)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Debug)]
pub enum CliOutputFormat {
    Png,
    Webp,
    Tiff,
    Rgba8,
}

/// Installed capabilities, printed by `--show-capabilities`
#[derive(Debug, Serialize)]
struct Capabilities {
    ok: bool,
    service: &'static str,
    version: &'static str,
    learned_segmenter_installed: bool,
    learned_segmenter: String,
}

pub async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_tracing(cli.verbose).context("Failed to initialize tracing")?;

    run(&cli).await
}

/// Run the CLI for already parsed arguments
async fn run(cli: &Cli) -> Result<()> {
    CliConfigBuilder::validate_cli(cli).context("Invalid CLI arguments")?;

    let config = CliConfigBuilder::from_cli(cli).context("Failed to build configuration")?;
    let segmenter = CliConfigBuilder::segmenter_from_cli(cli);

    if cli.show_capabilities {
        return show_capabilities(segmenter.as_ref());
    }

    let sources = collect_sources(cli)?;
    if sources.is_empty() {
        warn!("No supported image files found in the provided inputs");
        return Ok(());
    }

    info!("Starting garment cutout");
    info!(
        "Segmenter: {} (installed: {}), format: {}",
        segmenter.name(),
        segmenter.is_available(),
        config.output_format
    );

    let loader = InputLoader::new(&config).context("Failed to create input loader")?;
    let processor = BackgroundRemovalProcessor::with_components(
        config,
        segmenter,
        Box::new(ConsoleProgressReporter::new(cli.verbose > 0)),
    )
    .context("Failed to create background removal processor")?;

    let start_time = Instant::now();
    let processed_count = process_inputs(cli, &processor, &loader, &sources).await?;

    info!(
        "Processed {} image(s) in {:.2}s",
        processed_count,
        start_time.elapsed().as_secs_f64()
    );

    Ok(())
}

/// Initialize tracing based on verbosity level
fn init_tracing(verbose_count: u8) -> Result<()> {
    use crate::tracing_config::{TracingConfig, TracingFormat};

    TracingConfig::new()
        .with_verbosity(verbose_count)
        .with_format(TracingFormat::Console)
        .init()
        .context("Failed to initialize tracing subscriber")?;

    debug!(verbosity = verbose_count, "Tracing initialized");
    Ok(())
}

/// Print installed capabilities as JSON
fn show_capabilities(segmenter: &dyn LearnedSegmenter) -> Result<()> {
    let capabilities = Capabilities {
        ok: true,
        service: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
        learned_segmenter_installed: segmenter.is_available(),
        learned_segmenter: segmenter.name().to_string(),
    };

    let json = serde_json::to_string_pretty(&capabilities)
        .context("Failed to serialize capabilities")?;
    write_stdout(format!("{json}\n").as_bytes())
}

/// Turn the CLI inputs into a sorted list of sources
fn collect_sources(cli: &Cli) -> Result<Vec<InputSource>> {
    if let Some(url) = &cli.url {
        return Ok(vec![InputSource::Url(url.clone())]);
    }

    if let Some(payload) = &cli.base64 {
        return Ok(vec![InputSource::Base64(payload.clone())]);
    }

    if cli.input.len() == 1 && cli.input.first().is_some_and(|s| s == "-") {
        return Ok(vec![InputSource::Stdin]);
    }

    let mut all_files = Vec::new();
    for input in &cli.input {
        let path = PathBuf::from(input);

        if path.is_file() {
            if ImageIOService::is_supported_format(&path) {
                all_files.push(path);
            } else {
                warn!("Skipping unsupported file: {}", path.display());
            }
        } else if path.is_dir() {
            let dir_files = find_image_files(&path, cli.recursive, cli.pattern.as_deref())?;
            all_files.extend(dir_files);
        } else {
            anyhow::bail!(
                "Input path does not exist or is not accessible: {}",
                path.display()
            );
        }
    }

    // Sort files alphanumerically for consistent processing order
    all_files.sort();
    all_files.dedup();

    Ok(all_files.into_iter().map(InputSource::File).collect())
}

async fn process_inputs(
    cli: &Cli,
    processor: &BackgroundRemovalProcessor,
    loader: &InputLoader,
    sources: &[InputSource],
) -> Result<usize> {
    if let [source] = sources {
        process_single_source(cli, processor, loader, source, cli.output.as_deref())
            .instrument(spans::input_processing(&source.display_name()))
            .await?;
        return Ok(1);
    }

    let output_dir = prepare_output_dir(cli.output.as_deref())?;
    let format = processor.config().output_format;

    info!("Found {} image file(s) to process", sources.len());

    let progress_bar = ProgressBar::new(sources.len() as u64);
    progress_bar.set_style(
        ProgressStyle::with_template(
            "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}",
        )
        .context("Invalid progress bar template")?
        .progress_chars("#>-"),
    );

    let mut processed_count = 0;
    let mut failed_count = 0;
    let batch_start_time = Instant::now();

    async {
        for source in sources {
            let name = source.display_name();
            progress_bar.set_message(format!("Processing {name}"));

            let output_path = match (source, output_dir.as_deref()) {
                (InputSource::File(path), Some(dir)) => {
                    Some(generate_output_path_with_dir(path, dir, format))
                },
                _ => None,
            };

            match process_single_source(cli, processor, loader, source, output_path.as_deref())
                .instrument(spans::input_processing(&name))
                .await
            {
                Ok(()) => {
                    processed_count += 1;
                    debug!("Processed: {}", name);
                },
                Err(e) => {
                    error!("Failed to process {}: {:#}", name, e);
                    failed_count += 1;
                },
            }

            progress_bar.inc(1);
        }
    }
    .instrument(spans::batch_processing(sources.len()))
    .await;

    progress_bar.finish_with_message(format!(
        "Completed! Processed: {processed_count}, Failed: {failed_count}"
    ));

    let batch_total_time = batch_start_time.elapsed();
    info!("📊 Batch processing summary:");
    info!("  ├─ Files processed: {}", processed_count);
    info!("  ├─ Files failed: {}", failed_count);
    info!("  ├─ Total time: {:.2}s", batch_total_time.as_secs_f64());
    info!(
        "  └─ Average per file: {:.2}s",
        if processed_count > 0 {
            batch_total_time.as_secs_f64() / (processed_count as f64)
        } else {
            0.0
        }
    );

    if processed_count == 0 && failed_count > 0 {
        anyhow::bail!("All {failed_count} input(s) failed to process");
    }
    if failed_count > 0 {
        warn!("Some files failed to process. Processed: {processed_count}, Failed: {failed_count}");
    }

    Ok(processed_count)
}

/// Validate and create the batch output directory
fn prepare_output_dir(output: Option<&str>) -> Result<Option<PathBuf>> {
    let Some(output) = output else {
        return Ok(None);
    };

    if output == "-" {
        anyhow::bail!("Cannot use stdout (-) as output when processing multiple files");
    }

    let output_path = PathBuf::from(output);
    if output_path.is_file() {
        anyhow::bail!(
            "Output path exists and is a file, not a directory: {}",
            output_path.display()
        );
    }
    if !output_path.exists() {
        std::fs::create_dir_all(&output_path).with_context(|| {
            format!(
                "Failed to create output directory: {}",
                output_path.display()
            )
        })?;
    }

    Ok(Some(output_path))
}

/// Load, cut out and write a single input
async fn process_single_source(
    cli: &Cli,
    processor: &BackgroundRemovalProcessor,
    loader: &InputLoader,
    source: &InputSource,
    output: Option<&str>,
) -> Result<()> {
    let bytes = loader
        .load(source)
        .await
        .with_context(|| format!("Failed to read {}", source.display_name()))?;

    if matches!(source, InputSource::Stdin | InputSource::Base64(_)) {
        match detect_image_format(&bytes) {
            Some(ext) => info!("Detected image format: {}", ext.to_uppercase()),
            None => warn!("Could not detect image format from input data, decoding anyway"),
        }
    }

    let result = processor
        .process_bytes(&bytes)
        .context("Failed to remove background")?;

    info!(
        "{}: {} via {} in {}ms",
        source.display_name(),
        format_dimensions(result.dimensions()),
        result.metadata.method,
        result.metadata.timings.total_ms
    );
    if let Some(reason) = &result.metadata.fallback_reason {
        debug!(reason = %reason, "Learned segmenter was bypassed");
    }

    let format = processor.config().output_format;

    if cli.json {
        let response = GarmentResponse::from_result(&result, &cli.garment_type, &cli.gender)
            .context("Failed to build JSON response")?;
        let json = serde_json::to_string(&response).context("Failed to serialize response")?;
        write_stdout(format!("{json}\n").as_bytes())?;

        if let Some(target) = output.filter(|target| *target != "-") {
            result
                .save(target, format)
                .with_context(|| format!("Failed to save result to {target}"))?;
            info!("Image saved to: {}", target);
        }
        return Ok(());
    }

    match resolve_output_path(source, output, format) {
        Some(path) => {
            result
                .save(&path, format)
                .with_context(|| format!("Failed to save result to {}", path.display()))?;
            info!("Image saved to: {}", path.display());
        },
        None => {
            let output_data = result.to_bytes(format)?;
            write_stdout(&output_data)?;
            info!("Image written to stdout");
        },
    }

    Ok(())
}

/// Where a result is written; `None` means stdout
///
/// An explicit target wins. Without one, file inputs get a `_cutout` sibling
/// and stream-like inputs go to stdout.
fn resolve_output_path(
    source: &InputSource,
    output: Option<&str>,
    format: OutputFormat,
) -> Option<PathBuf> {
    match (output, source) {
        (Some("-"), _) => None,
        (Some(target), _) => Some(PathBuf::from(target)),
        (None, InputSource::File(path)) => Some(generate_output_path(path, format)),
        (None, _) => None,
    }
}

fn format_dimensions((width, height): (u32, u32)) -> String {
    format!("{width}x{height}")
}

/// Detect image format from binary data by examining magic bytes
fn detect_image_format(data: &[u8]) -> Option<&'static str> {
    if data.starts_with(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]) {
        return Some("png");
    }

    if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
        return Some("jpg");
    }

    // WebP: RIFF....WEBP
    if data.len() >= 12
        && data.get(0..4).is_some_and(|slice| slice == b"RIFF")
        && data.get(8..12).is_some_and(|slice| slice == b"WEBP")
    {
        return Some("webp");
    }

    if data.starts_with(&[0x49, 0x49, 0x2A, 0x00]) || data.starts_with(&[0x4D, 0x4D, 0x00, 0x2A]) {
        return Some("tiff");
    }

    if data.starts_with(b"GIF8") {
        return Some("gif");
    }

    if data.len() >= 4 && data.starts_with(b"BM") {
        return Some("bmp");
    }

    None
}

/// Write bytes to stdout
fn write_stdout(data: &[u8]) -> Result<()> {
    let mut stdout = io::stdout().lock();
    stdout
        .write_all(data)
        .context("Failed to write output to stdout")?;
    stdout.flush().context("Failed to flush stdout")?;
    Ok(())
}

/// Find image files in a directory
fn find_image_files(dir: &Path, recursive: bool, pattern: Option<&str>) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    if recursive {
        for entry in walkdir::WalkDir::new(dir) {
            let entry = entry?;
            if entry.file_type().is_file() {
                let path = entry.path();
                if ImageIOService::is_supported_format(path) && matches_pattern(path, pattern) {
                    files.push(path.to_path_buf());
                }
            }
        }
    } else {
        for entry in std::fs::read_dir(dir)
            .with_context(|| format!("Failed to read directory: {}", dir.display()))?
        {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                let path = entry.path();
                if ImageIOService::is_supported_format(&path) && matches_pattern(&path, pattern) {
                    files.push(path);
                }
            }
        }
    }

    files.sort();
    Ok(files)
}

/// Check if the file name matches the given glob pattern
fn matches_pattern(path: &Path, pattern: Option<&str>) -> bool {
    match pattern {
        Some(pat) => path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|filename| {
                glob::Pattern::new(pat)
                    .map(|p| p.matches(filename))
                    .unwrap_or(false)
            }),
        None => true,
    }
}

fn output_file_name(input_path: &Path, format: OutputFormat) -> String {
    let stem = input_path.file_stem().unwrap_or_default();
    format!(
        "{}_cutout.{}",
        stem.to_string_lossy(),
        OutputFormatHandler::get_extension(format)
    )
}

/// Generate `<stem>_cutout.<ext>` next to the input
fn generate_output_path(input_path: &Path, format: OutputFormat) -> PathBuf {
    let dir = input_path.parent().unwrap_or(Path::new("."));
    dir.join(output_file_name(input_path, format))
}

/// Generate `<stem>_cutout.<ext>` inside `output_dir`
fn generate_output_path_with_dir(
    input_path: &Path,
    output_dir: &Path,
    format: OutputFormat,
) -> String {
    output_dir
        .join(output_file_name(input_path, format))
        .to_string_lossy()
        .to_string()
}
