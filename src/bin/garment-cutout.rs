//! Garment cutout CLI tool
//!
//! Command-line interface for removing backgrounds from garment photos with the
//! garment-cutout library: an optional learned segmenter with a heuristic fallback.

#[cfg(feature = "cli")]
use garment_cutout::cli;

#[cfg(feature = "cli")]
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    cli::main().await
}

#[cfg(not(feature = "cli"))]
fn main() {
    eprintln!("CLI feature not enabled. Please rebuild with --features cli");
    std::process::exit(1);
}
