// src/pipeline/mod.rs
pub mod assess;
pub mod segment;
pub mod stats;
pub mod summarize;
pub mod train;

/// Counts reported at the end of a pipeline run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Items written successfully.
    pub processed: usize,
    /// Items deliberately passed over (empty text, nothing to do).
    pub skipped: usize,
    /// Items that failed and were logged or replaced by a placeholder.
    pub failed: usize,
}

impl RunSummary {
    pub fn log(&self, stage: &str) {
        tracing::info!(
            "{} finished. Processed: {}, Skipped: {}, Failures: {}",
            stage,
            self.processed,
            self.skipped,
            self.failed
        );
    }
}
