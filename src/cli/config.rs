//! Configuration conversion utilities for CLI arguments

use crate::cli::main_impl::{Cli, CliOutputFormat};
use crate::{
    backends::create_segmenter,
    config::{OutputFormat, RemovalConfig},
    inference::{LearnedSegmenter, NoOpSegmenter},
};
use anyhow::{Context, Result};

impl From<CliOutputFormat> for OutputFormat {
    fn from(format: CliOutputFormat) -> Self {
        match format {
            CliOutputFormat::Png => OutputFormat::Png,
            CliOutputFormat::Webp => OutputFormat::WebP,
            CliOutputFormat::Tiff => OutputFormat::Tiff,
            CliOutputFormat::Rgba8 => OutputFormat::Rgba8,
        }
    }
}

/// Convert CLI arguments to a [`RemovalConfig`] and a learned segmenter
pub(crate) struct CliConfigBuilder;

impl CliConfigBuilder {
    /// Build the removal configuration from CLI arguments
    pub(crate) fn from_cli(cli: &Cli) -> Result<RemovalConfig> {
        let mut builder = RemovalConfig::builder()
            .threshold(cli.threshold)
            .smoothing_radius(cli.smoothing_radius)
            .min_foreground_fraction(cli.min_foreground_fraction)
            .max_dimension(cli.max_dimension)
            .max_input_bytes(cli.max_input_bytes)
            .use_learned_segmenter(!cli.no_learned)
            .remove_background(!cli.keep_background)
            .output_format(cli.format.into());

        if let Some(secs) = cli.fetch_timeout {
            builder = builder.fetch_timeout_secs(secs);
        }

        builder.build().context("Invalid configuration")
    }

    /// Resolve the learned segmenter requested on the command line
    ///
    /// `--no-learned` always yields the no-op segmenter; otherwise an explicit
    /// `--segmenter-command` is used, falling back to probing for `rembg`.
    pub(crate) fn segmenter_from_cli(cli: &Cli) -> Box<dyn LearnedSegmenter> {
        if cli.no_learned {
            return Box::new(NoOpSegmenter);
        }

        let command = cli
            .segmenter_command
            .as_ref()
            .map(|program| (program.clone(), cli.segmenter_arg.clone()));
        create_segmenter(command)
    }

    /// Validate CLI arguments for consistency
    pub(crate) fn validate_cli(cli: &Cli) -> Result<()> {
        if !cli.segmenter_arg.is_empty() && cli.segmenter_command.is_none() {
            anyhow::bail!("--segmenter-arg requires --segmenter-command");
        }

        if cli.no_learned && cli.segmenter_command.is_some() {
            anyhow::bail!("--segmenter-command cannot be combined with --no-learned");
        }

        let sources = usize::from(!cli.input.is_empty())
            + usize::from(cli.url.is_some())
            + usize::from(cli.base64.is_some());
        if sources > 1 {
            anyhow::bail!("Provide inputs as paths, --url or --base64, not a combination");
        }

        Self::from_cli(cli).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_MAX_INPUT_BYTES;
    use clap::Parser;

    fn parse(args: &[&str]) -> Cli {
        let mut argv = vec!["garment-cutout"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_cli_config_conversion() {
        let cli = parse(&["shirt.jpg"]);
        let config = CliConfigBuilder::from_cli(&cli).unwrap();

        assert_eq!(config, RemovalConfig::default());
        assert_eq!(config.max_input_bytes, DEFAULT_MAX_INPUT_BYTES);
    }

    #[test]
    fn test_cli_overrides() {
        let cli = parse(&[
            "shirt.jpg",
            "--threshold",
            "60",
            "--smoothing-radius",
            "0",
            "--max-dimension",
            "512",
            "--no-learned",
            "--keep-background",
            "-f",
            "webp",
            "--fetch-timeout",
            "3",
        ]);
        let config = CliConfigBuilder::from_cli(&cli).unwrap();

        assert_eq!(config.segmentation.threshold, 60);
        assert_eq!(config.segmentation.smoothing_radius, 0);
        assert_eq!(config.max_dimension, 512);
        assert!(!config.use_learned_segmenter);
        assert!(!config.remove_background);
        assert_eq!(config.output_format, OutputFormat::WebP);
        assert_eq!(config.fetch_timeout_secs, 3);
    }

    #[test]
    fn test_cli_validation() {
        assert!(CliConfigBuilder::validate_cli(&parse(&["shirt.jpg"])).is_ok());

        let cli = parse(&["shirt.jpg", "--segmenter-arg", "{input}"]);
        assert!(CliConfigBuilder::validate_cli(&cli).is_err());

        let cli = parse(&["shirt.jpg", "--no-learned", "--segmenter-command", "rembg"]);
        assert!(CliConfigBuilder::validate_cli(&cli).is_err());

        let cli = parse(&["shirt.jpg", "--url", "https://example.com/a.png"]);
        assert!(CliConfigBuilder::validate_cli(&cli).is_err());

        let cli = parse(&["shirt.jpg", "--threshold", "500"]);
        assert!(CliConfigBuilder::validate_cli(&cli).is_err());

        let cli = parse(&["shirt.jpg", "--min-foreground-fraction", "1.5"]);
        assert!(CliConfigBuilder::validate_cli(&cli).is_err());
    }

    #[test]
    fn test_no_learned_yields_noop_segmenter() {
        let cli = parse(&["shirt.jpg", "--no-learned"]);
        let segmenter = CliConfigBuilder::segmenter_from_cli(&cli);
        assert!(!segmenter.is_available());
        assert_eq!(segmenter.name(), "none");
    }

    #[test]
    fn test_missing_segmenter_command_degrades_to_noop() {
        let cli = parse(&[
            "shirt.jpg",
            "--segmenter-command",
            "/definitely/not/a/real/matting-tool",
        ]);
        let segmenter = CliConfigBuilder::segmenter_from_cli(&cli);
        assert!(!segmenter.is_available());
    }
}
