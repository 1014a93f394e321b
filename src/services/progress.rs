//! Progress reporting service
//!
//! This module separates progress reporting concerns from the pipeline,
//! allowing different frontends to implement their own progress handling.
//! Learned-segmenter fallbacks are reported here as well so that a caller can
//! count them without parsing log output.

use crate::types::ProcessingTimings;
use instant::Instant;
use tracing::{debug, error, info, warn};

/// Progress stages during a cutout request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessingStage {
    /// Reading the input payload
    ImageLoading,
    /// Decoding and downscaling
    Normalization,
    /// Running the learned segmenter
    LearnedSegmentation,
    /// Sampling the corners for the background colour
    BackgroundEstimation,
    /// Thresholding colour distance into a binary mask
    MaskBuilding,
    /// Morphological closing and edge blur
    MaskRefinement,
    /// Writing the mask into the alpha channel
    Compositing,
    /// Processing completed
    Completed,
}

impl ProcessingStage {
    /// Get a human-readable description of the processing stage
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            ProcessingStage::ImageLoading => "Loading input image",
            ProcessingStage::Normalization => "Decoding and resizing image",
            ProcessingStage::LearnedSegmentation => "Running learned segmenter",
            ProcessingStage::BackgroundEstimation => "Estimating background colour",
            ProcessingStage::MaskBuilding => "Building foreground mask",
            ProcessingStage::MaskRefinement => "Refining mask edges",
            ProcessingStage::Compositing => "Applying alpha mask",
            ProcessingStage::Completed => "Processing completed",
        }
    }

    /// Get the typical progress percentage for this stage
    #[must_use]
    pub fn progress_percentage(&self) -> u8 {
        match self {
            ProcessingStage::ImageLoading => 5,
            ProcessingStage::Normalization => 15,
            ProcessingStage::LearnedSegmentation => 40,
            ProcessingStage::BackgroundEstimation => 50,
            ProcessingStage::MaskBuilding => 65,
            ProcessingStage::MaskRefinement => 80,
            ProcessingStage::Compositing => 95,
            ProcessingStage::Completed => 100,
        }
    }
}

/// Progress update containing stage and timing information
#[derive(Debug, Clone)]
pub struct ProgressUpdate {
    /// Current processing stage
    pub stage: ProcessingStage,
    /// Progress percentage (0-100)
    pub progress: u8,
    /// Human-readable stage description
    pub description: String,
    /// Elapsed time since processing started (milliseconds)
    pub elapsed_ms: u64,
}

impl ProgressUpdate {
    /// Create a new progress update
    #[must_use]
    pub fn new(stage: ProcessingStage, start_time: Instant) -> Self {
        Self::with_description(stage, stage.description().to_string(), start_time)
    }

    /// Create a progress update with custom description
    #[must_use]
    pub fn with_description(
        stage: ProcessingStage,
        description: String,
        start_time: Instant,
    ) -> Self {
        Self {
            progress: stage.progress_percentage(),
            elapsed_ms: start_time.elapsed().as_millis() as u64,
            stage,
            description,
        }
    }
}

/// Trait for reporting progress during cutout operations
pub trait ProgressReporter: Send + Sync {
    /// Report a progress update
    fn report_progress(&self, update: ProgressUpdate);

    /// Report processing completion with final timings
    fn report_completion(&self, timings: ProcessingTimings);

    /// Report an error during processing
    fn report_error(&self, stage: ProcessingStage, error: &str);

    /// Report that the learned segmenter failed and the heuristic matte is used instead
    ///
    /// # Arguments
    /// * `segmenter` - Name of the learned segmenter that failed
    /// * `reason` - Failure description
    fn report_fallback(&self, segmenter: &str, reason: &str) {
        warn!(segmenter, reason, "Learned segmenter failed, using heuristic matte");
    }
}

/// No-op progress reporter that discards all progress updates
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpProgressReporter;

impl ProgressReporter for NoOpProgressReporter {
    fn report_progress(&self, _update: ProgressUpdate) {}

    fn report_completion(&self, _timings: ProcessingTimings) {}

    fn report_error(&self, _stage: ProcessingStage, _error: &str) {}

    fn report_fallback(&self, _segmenter: &str, _reason: &str) {}
}

/// Reporter that emits structured `tracing` events; the library default
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingProgressReporter;

impl ProgressReporter for TracingProgressReporter {
    fn report_progress(&self, update: ProgressUpdate) {
        debug!(
            stage = ?update.stage,
            progress = update.progress,
            elapsed_ms = update.elapsed_ms,
            "{}",
            update.description
        );
    }

    fn report_completion(&self, timings: ProcessingTimings) {
        debug!(
            total_ms = timings.total_ms,
            normalize_ms = timings.normalize_ms,
            learned_ms = timings.learned_ms,
            heuristic_ms = timings.heuristic_ms,
            "Cutout completed"
        );
    }

    fn report_error(&self, stage: ProcessingStage, error: &str) {
        error!(stage = ?stage, error, "Cutout failed");
    }
}

/// Console progress reporter for the command line
#[derive(Debug, Clone, Copy)]
pub struct ConsoleProgressReporter {
    verbose: bool,
}

impl ConsoleProgressReporter {
    /// Create a new console progress reporter
    ///
    /// # Arguments
    /// * `verbose` - Whether to show detailed progress information
    #[must_use]
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }
}

impl ProgressReporter for ConsoleProgressReporter {
    fn report_progress(&self, update: ProgressUpdate) {
        if self.verbose {
            info!(
                "[{}%] {} ({}ms elapsed)",
                update.progress, update.description, update.elapsed_ms
            );
        } else {
            debug!("[{}%] {}", update.progress, update.description);
        }
    }

    fn report_completion(&self, timings: ProcessingTimings) {
        info!("✅ Cutout completed in {}ms", timings.total_ms);

        if self.verbose {
            info!("  📊 Detailed timings:");
            info!("    • Decode and resize: {}ms", timings.normalize_ms);
            info!("    • Learned segmenter: {}ms", timings.learned_ms);
            info!("    • Heuristic matte: {}ms", timings.heuristic_ms);
        }
    }

    fn report_error(&self, stage: ProcessingStage, error: &str) {
        error!("❌ Error during {}: {}", stage.description(), error);
    }

    fn report_fallback(&self, segmenter: &str, reason: &str) {
        warn!("⚠️  {} failed ({}), using heuristic matte", segmenter, reason);
    }
}

/// Per-request progress tracker that manages timing and stage reporting
pub struct ProgressTracker<'a> {
    reporter: &'a dyn ProgressReporter,
    start_time: Instant,
    current_stage: Option<ProcessingStage>,
}

impl<'a> ProgressTracker<'a> {
    /// Create a new progress tracker for the specified reporter
    #[must_use]
    pub fn new(reporter: &'a dyn ProgressReporter) -> Self {
        Self {
            reporter,
            start_time: Instant::now(),
            current_stage: None,
        }
    }

    /// Report progress for a specific stage
    pub fn report_stage(&mut self, stage: ProcessingStage) {
        self.current_stage = Some(stage);
        self.reporter
            .report_progress(ProgressUpdate::new(stage, self.start_time));
    }

    /// Report completion with final timings
    pub fn report_completion(&mut self, timings: ProcessingTimings) {
        self.current_stage = Some(ProcessingStage::Completed);
        self.reporter.report_completion(timings);
    }

    /// Report an error in the current stage
    pub fn report_error(&self, error: &str) {
        let stage = self.current_stage.unwrap_or(ProcessingStage::ImageLoading);
        self.reporter.report_error(stage, error);
    }

    /// Report a learned segmenter fallback
    pub fn report_fallback(&self, segmenter: &str, reason: &str) {
        self.reporter.report_fallback(segmenter, reason);
    }

    /// Get the elapsed time since tracking started
    #[must_use]
    pub fn elapsed_ms(&self) -> u64 {
        self.start_time.elapsed().as_millis() as u64
    }

    /// Get the current processing stage
    #[must_use]
    pub fn current_stage(&self) -> Option<ProcessingStage> {
        self.current_stage
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// Test progress reporter that captures reports for verification
    #[derive(Default, Clone)]
    struct TestProgressReporter {
        progress_updates: Arc<Mutex<Vec<ProgressUpdate>>>,
        completions: Arc<Mutex<Vec<ProcessingTimings>>>,
        errors: Arc<Mutex<Vec<(ProcessingStage, String)>>>,
        fallbacks: Arc<Mutex<Vec<(String, String)>>>,
    }

    impl ProgressReporter for TestProgressReporter {
        fn report_progress(&self, update: ProgressUpdate) {
            self.progress_updates.lock().unwrap().push(update);
        }

        fn report_completion(&self, timings: ProcessingTimings) {
            self.completions.lock().unwrap().push(timings);
        }

        fn report_error(&self, stage: ProcessingStage, error: &str) {
            self.errors.lock().unwrap().push((stage, error.to_string()));
        }

        fn report_fallback(&self, segmenter: &str, reason: &str) {
            self.fallbacks
                .lock()
                .unwrap()
                .push((segmenter.to_string(), reason.to_string()));
        }
    }

    const ALL_STAGES: [ProcessingStage; 8] = [
        ProcessingStage::ImageLoading,
        ProcessingStage::Normalization,
        ProcessingStage::LearnedSegmentation,
        ProcessingStage::BackgroundEstimation,
        ProcessingStage::MaskBuilding,
        ProcessingStage::MaskRefinement,
        ProcessingStage::Compositing,
        ProcessingStage::Completed,
    ];

    #[test]
    fn test_processing_stage_descriptions() {
        for stage in ALL_STAGES {
            assert!(!stage.description().is_empty());
        }
        assert_eq!(
            ProcessingStage::MaskBuilding.description(),
            "Building foreground mask"
        );
    }

    #[test]
    fn test_processing_stage_progress_ordering() {
        for pair in ALL_STAGES.windows(2) {
            assert!(
                pair[0].progress_percentage() < pair[1].progress_percentage(),
                "{:?} should come before {:?}",
                pair[0],
                pair[1]
            );
        }
        assert_eq!(ProcessingStage::Completed.progress_percentage(), 100);
    }

    #[test]
    fn test_progress_update_creation() {
        let update = ProgressUpdate::new(ProcessingStage::MaskRefinement, Instant::now());
        assert_eq!(update.stage, ProcessingStage::MaskRefinement);
        assert_eq!(update.progress, 80);
        assert_eq!(update.description, "Refining mask edges");

        let custom = ProgressUpdate::with_description(
            ProcessingStage::Compositing,
            "Applying learned matte".to_string(),
            Instant::now(),
        );
        assert_eq!(custom.description, "Applying learned matte");
        assert_eq!(custom.progress, 95);
    }

    #[test]
    fn test_progress_tracker_stage_tracking() {
        let reporter = TestProgressReporter::default();
        let mut tracker = ProgressTracker::new(&reporter);
        assert_eq!(tracker.current_stage(), None);

        tracker.report_stage(ProcessingStage::Normalization);
        tracker.report_stage(ProcessingStage::MaskBuilding);
        tracker.report_error("mask exploded");
        tracker.report_fallback("rembg", "exit status 1");
        tracker.report_completion(ProcessingTimings::default());

        assert_eq!(tracker.current_stage(), Some(ProcessingStage::Completed));
        assert_eq!(reporter.progress_updates.lock().unwrap().len(), 2);
        assert_eq!(reporter.completions.lock().unwrap().len(), 1);
        assert_eq!(
            reporter.errors.lock().unwrap().as_slice(),
            &[(ProcessingStage::MaskBuilding, "mask exploded".to_string())]
        );
        assert_eq!(
            reporter.fallbacks.lock().unwrap().as_slice(),
            &[("rembg".to_string(), "exit status 1".to_string())]
        );
    }

    #[test]
    fn test_error_before_any_stage_uses_loading_stage() {
        let reporter = TestProgressReporter::default();
        let tracker = ProgressTracker::new(&reporter);
        tracker.report_error("empty payload");
        assert_eq!(
            reporter.errors.lock().unwrap().first().map(|(s, _)| *s),
            Some(ProcessingStage::ImageLoading)
        );
    }

    #[test]
    fn test_builtin_reporters_accept_all_events() {
        let reporters: Vec<Box<dyn ProgressReporter>> = vec![
            Box::new(NoOpProgressReporter),
            Box::new(TracingProgressReporter),
            Box::new(ConsoleProgressReporter::new(true)),
            Box::new(ConsoleProgressReporter::new(false)),
        ];

        for reporter in &reporters {
            reporter.report_progress(ProgressUpdate::new(
                ProcessingStage::LearnedSegmentation,
                Instant::now(),
            ));
            reporter.report_fallback("rembg", "timed out");
            reporter.report_error(ProcessingStage::Normalization, "bad bytes");
            reporter.report_completion(ProcessingTimings::default());
        }
    }
}
