//! Human-readable record of what the pipeline actually did.

use std::fmt;

/// Label recorded when no scaling stage ran.
pub const NO_PROCESSING_LABEL: &str = "No processing";

/// Ordered, append-only list of stage labels plus the counters reported with
/// the output.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineTrace {
    labels: Vec<String>,
    used_ai: bool,
    inference_pass_count: u32,
    models: Vec<String>,
}

impl PipelineTrace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a label for a stage that did not run a backend.
    pub fn push(&mut self, label: impl Into<String>) {
        self.labels.push(label.into());
    }

    /// Append a label for a completed neural or hardware pass.
    pub fn record_pass(&mut self, label: impl Into<String>, model: &str) {
        self.labels.push(label.into());
        self.used_ai = true;
        self.inference_pass_count += 1;
        if !self.models.iter().any(|m| m == model) {
            self.models.push(model.to_string());
        }
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Whether any neural or hardware pass completed.
    pub fn used_ai(&self) -> bool {
        self.used_ai
    }

    /// Restoration, upscale and hardware passes that completed.
    pub fn inference_pass_count(&self) -> u32 {
        self.inference_pass_count
    }

    /// Backends that produced committed output, in first-use order, or `None`.
    pub fn model_summary(&self) -> Option<String> {
        if self.models.is_empty() {
            None
        } else {
            Some(self.models.join(" → "))
        }
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.labels.iter().any(|l| l.contains(needle))
    }

    /// Labels joined in execution order.
    pub fn summary(&self) -> String {
        self.labels.join(" → ")
    }
}

impl fmt::Display for PipelineTrace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.summary())
    }
}
