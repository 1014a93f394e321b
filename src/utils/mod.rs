//! Utility modules shared by the processor and the CLI

pub mod preprocessing;

pub use preprocessing::{ImageNormalizer, NormalizedImage};
