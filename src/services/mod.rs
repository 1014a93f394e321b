//! Service layer around the segmentation core
//!
//! - [`io`]: payload reading with the upload limit, result saving
//! - [`source`]: file, stdin, URL and base64 input acquisition
//! - [`format`]: output format mapping
//! - [`progress`]: progress and fallback reporting

pub mod format;
pub mod io;
pub mod progress;
pub mod source;

pub use format::OutputFormatHandler;
pub use io::ImageIOService;
pub use progress::{
    ConsoleProgressReporter, NoOpProgressReporter, ProcessingStage, ProgressReporter,
    ProgressTracker, ProgressUpdate, TracingProgressReporter,
};
pub use source::{InputLoader, InputSource};
