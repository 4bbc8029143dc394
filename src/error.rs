//! # Upscale Error Handling
//!
//! Error types for the multi-backend upscaler, with per-error context and
//! classification traits that drive the pipeline's fallback policy.
//!
//! ## Taxonomy
//!
//! - `BackendUnavailable`: no usable backend for a stage. Never fatal, the
//!   orchestrator moves on to the next stage.
//! - `InferenceFailed`: a backend call errored or returned an unusable image.
//!   Swallowed for the neural stage, stops the hardware stage.
//! - `GeometryInvalid`: non-positive or non-finite scale, or an empty image.
//!   Rejected before any stage runs.
//! - `OutputUnproducible`: a stage could not materialize its output. Fatal once
//!   no further fallback remains.
//!
//! `Config`, `Io` and `External` cover configuration files, file I/O and errors
//! surfaced by the `image`, `serde_json` and resampling crates.
//!
//! ## Usage
//!
//! ```rust
//! use hybrid_upscale::error::{Recoverable, UpscaleError};
//!
//! let error = UpscaleError::inference_failed("realesrgan-x4plus", "session closed")
//!     .with_operation("tile 3/12")
//!     .with_recovery_suggestion("fall back to the hardware scaler or classical resampling");
//!
//! assert_eq!(error.category(), "inference_failed");
//! assert!(error.is_recoverable());
//! ```

use std::{error::Error as StdError, fmt, time::SystemTime};

use sr_scale::cpu::ScaleError;

/// Severity levels for errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    /// Informational; the pipeline degraded as designed
    Info,
    /// Warnings that may indicate potential issues
    Warning,
    /// Errors that affect operation but can be recovered from
    Error,
    /// Fatal errors that end the invocation
    Fatal,
}

/// Core error context containing metadata about when and where an error occurred
#[derive(Debug, Clone)]
pub struct ErrorContext {
    /// When the error occurred
    pub timestamp: SystemTime,
    /// The operation being performed when the error occurred
    pub operation: Option<String>,
    /// Additional context about the error
    pub context: Option<String>,
    /// Suggested recovery action
    pub recovery_suggestion: Option<String>,
    /// Error severity level
    pub severity: ErrorSeverity,
    /// Whether this error is recoverable
    pub recoverable: bool,
    /// Additional metadata as key-value pairs
    pub metadata: std::collections::HashMap<String, String>,
}

impl Default for ErrorContext {
    fn default() -> Self {
        Self {
            timestamp: SystemTime::now(),
            operation: None,
            context: None,
            recovery_suggestion: None,
            severity: ErrorSeverity::Error,
            recoverable: false,
            metadata: std::collections::HashMap::new(),
        }
    }
}

impl ErrorContext {
    /// Create a new error context
    pub fn new() -> Self {
        Self::default()
    }

    fn with_severity(mut self, severity: ErrorSeverity) -> Self {
        self.severity = severity;
        self
    }
}

/// Base error type for the upscaler
#[derive(Debug)]
pub enum UpscaleError {
    /// No usable backend for a stage
    BackendUnavailable {
        stage: String,
        reason: String,
        context: ErrorContext,
    },
    /// A backend call errored or produced an unusable image
    InferenceFailed {
        backend: String,
        reason: String,
        context: ErrorContext,
    },
    /// Non-positive scale or dimensions
    GeometryInvalid {
        field: String,
        constraint: String,
        value: String,
        context: ErrorContext,
    },
    /// A stage could not materialize its output image
    OutputUnproducible {
        stage: String,
        reason: String,
        context: ErrorContext,
    },
    /// Configuration validation errors
    Config {
        field: String,
        value: String,
        reason: String,
        context: ErrorContext,
    },
    /// I/O errors
    Io {
        operation: String,
        path: Option<String>,
        source: std::io::Error,
        context: ErrorContext,
    },
    /// External library errors
    External {
        library: String,
        source: Box<dyn StdError + Send + Sync>,
        context: ErrorContext,
    },
}

impl UpscaleError {
    /// Create a backend-unavailable error
    pub fn backend_unavailable(stage: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::BackendUnavailable {
            stage: stage.into(),
            reason: reason.into(),
            context: ErrorContext::new().with_severity(ErrorSeverity::Info),
        }
    }

    /// Create an inference failure
    pub fn inference_failed(backend: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InferenceFailed {
            backend: backend.into(),
            reason: reason.into(),
            context: ErrorContext::new().with_severity(ErrorSeverity::Warning),
        }
    }

    /// Create a geometry validation error
    pub fn geometry_invalid(
        field: impl Into<String>,
        constraint: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self::GeometryInvalid {
            field: field.into(),
            constraint: constraint.into(),
            value: value.into(),
            context: ErrorContext::new().with_severity(ErrorSeverity::Fatal),
        }
    }

    /// Create an output-unproducible error
    pub fn output_unproducible(stage: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::OutputUnproducible {
            stage: stage.into(),
            reason: reason.into(),
            context: ErrorContext::new(),
        }
    }

    /// Create a configuration error
    pub fn config(
        field: impl Into<String>,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::Config {
            field: field.into(),
            value: value.into(),
            reason: reason.into(),
            context: ErrorContext::new().with_severity(ErrorSeverity::Fatal),
        }
    }

    /// Create an I/O error
    pub fn io(operation: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            operation: operation.into(),
            path: None,
            source,
            context: ErrorContext::new(),
        }
    }

    /// Create an external library error
    pub fn external(
        library: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self::External {
            library: library.into(),
            source: Box::new(source),
            context: ErrorContext::new(),
        }
    }

    /// Attach a path to an I/O error; other variants record it as metadata
    pub fn with_path(mut self, new_path: impl Into<String>) -> Self {
        let new_path = new_path.into();
        if let Self::Io { path, .. } = &mut self {
            *path = Some(new_path);
            return self;
        }
        self.context_mut().metadata.insert("path".into(), new_path);
        self
    }

    /// Add context to the error
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context_mut().context = Some(context.into());
        self
    }

    /// Add operation context
    pub fn with_operation(mut self, operation: impl Into<String>) -> Self {
        self.context_mut().operation = Some(operation.into());
        self
    }

    /// Add recovery suggestion
    pub fn with_recovery_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.context_mut().recovery_suggestion = Some(suggestion.into());
        self
    }

    /// Set severity
    pub fn with_severity(mut self, severity: ErrorSeverity) -> Self {
        self.context_mut().severity = severity;
        self
    }

    /// Mark as recoverable
    pub fn recoverable(mut self) -> Self {
        self.context_mut().recoverable = true;
        self
    }

    /// Add metadata
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context_mut().metadata.insert(key.into(), value.into());
        self
    }

    /// Get the error context
    pub fn context(&self) -> &ErrorContext {
        match self {
            Self::BackendUnavailable { context, .. } => context,
            Self::InferenceFailed { context, .. } => context,
            Self::GeometryInvalid { context, .. } => context,
            Self::OutputUnproducible { context, .. } => context,
            Self::Config { context, .. } => context,
            Self::Io { context, .. } => context,
            Self::External { context, .. } => context,
        }
    }

    fn context_mut(&mut self) -> &mut ErrorContext {
        match self {
            Self::BackendUnavailable { context, .. } => context,
            Self::InferenceFailed { context, .. } => context,
            Self::GeometryInvalid { context, .. } => context,
            Self::OutputUnproducible { context, .. } => context,
            Self::Config { context, .. } => context,
            Self::Io { context, .. } => context,
            Self::External { context, .. } => context,
        }
    }

    /// Get the error category as a string
    pub fn category(&self) -> &'static str {
        match self {
            Self::BackendUnavailable { .. } => "backend_unavailable",
            Self::InferenceFailed { .. } => "inference_failed",
            Self::GeometryInvalid { .. } => "geometry_invalid",
            Self::OutputUnproducible { .. } => "output_unproducible",
            Self::Config { .. } => "config",
            Self::Io { .. } => "io",
            Self::External { .. } => "external",
        }
    }
}

impl fmt::Display for UpscaleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UpscaleError::BackendUnavailable { stage, reason, .. } => {
                write!(f, "No usable backend for {}: {}", stage, reason)
            }
            UpscaleError::InferenceFailed {
                backend, reason, ..
            } => {
                write!(f, "Inference failed on {}: {}", backend, reason)
            }
            UpscaleError::GeometryInvalid {
                field,
                constraint,
                value,
                ..
            } => {
                write!(
                    f,
                    "Invalid geometry for '{}': {} (value: {})",
                    field, constraint, value
                )
            }
            UpscaleError::OutputUnproducible { stage, reason, .. } => {
                write!(f, "Could not produce output during {}: {}", stage, reason)
            }
            UpscaleError::Config {
                field,
                value,
                reason,
                ..
            } => {
                write!(
                    f,
                    "Configuration error in '{}': {} (value: {})",
                    field, reason, value
                )
            }
            UpscaleError::Io {
                operation,
                path,
                source,
                ..
            } => {
                if let Some(path) = path {
                    write!(
                        f,
                        "I/O error during {} on '{}': {}",
                        operation, path, source
                    )
                } else {
                    write!(f, "I/O error during {}: {}", operation, source)
                }
            }
            UpscaleError::External {
                library, source, ..
            } => {
                write!(f, "External library error in {}: {}", library, source)
            }
        }
    }
}

impl StdError for UpscaleError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::External { source, .. } => Some(source.as_ref()),
            _ => None,
        }
    }
}

/// Result type alias using our custom error type
pub type UpscaleResult<T> = Result<T, UpscaleError>;

/// Trait for errors that can be recovered from
pub trait Recoverable {
    /// Check if this error can be recovered from
    fn is_recoverable(&self) -> bool;

    /// Get recovery strategies for this error
    fn recovery_strategies(&self) -> Vec<RecoveryStrategy>;
}

/// Recovery strategies for handling errors
#[derive(Debug, Clone, PartialEq)]
pub enum RecoveryStrategy {
    /// Hand the image to the next stage in the chain
    Fallback { description: String },
    /// Skip the current stage
    Skip { reason: String },
    /// Degrade output quality
    Degrade { description: String },
}

impl Recoverable for UpscaleError {
    fn is_recoverable(&self) -> bool {
        self.context().recoverable
            || matches!(
                self,
                Self::BackendUnavailable { .. } | Self::InferenceFailed { .. }
            )
    }

    fn recovery_strategies(&self) -> Vec<RecoveryStrategy> {
        match self {
            Self::BackendUnavailable { .. } => vec![RecoveryStrategy::Fallback {
                description: "Continue with the next enhancement stage".to_string(),
            }],
            Self::InferenceFailed { .. } => vec![
                RecoveryStrategy::Skip {
                    reason: "Discard the failed pass".to_string(),
                },
                RecoveryStrategy::Fallback {
                    description: "Use classical resampling for the remaining scale".to_string(),
                },
            ],
            Self::OutputUnproducible { .. } if self.context().recoverable => {
                vec![RecoveryStrategy::Degrade {
                    description: "Return the last good image".to_string(),
                }]
            }
            _ => vec![],
        }
    }
}

/// Trait for errors with severity levels
pub trait HasSeverity {
    /// Get the severity level of this error
    fn severity(&self) -> ErrorSeverity;
}

impl HasSeverity for UpscaleError {
    fn severity(&self) -> ErrorSeverity {
        self.context().severity
    }
}

/// Trait for errors that provide recovery suggestions
pub trait HasRecoverySuggestion {
    /// Get recovery suggestion for this error
    fn recovery_suggestion(&self) -> Option<&str>;
}

impl HasRecoverySuggestion for UpscaleError {
    fn recovery_suggestion(&self) -> Option<&str> {
        self.context().recovery_suggestion.as_deref()
    }
}

/// Error classification utilities
pub mod classify {
    use super::*;

    /// Check if an error is fatal for the whole invocation
    pub fn is_fatal(error: &UpscaleError) -> bool {
        matches!(
            error,
            UpscaleError::GeometryInvalid { .. } | UpscaleError::Config { .. }
        ) || error.severity() == ErrorSeverity::Fatal
    }

    /// Check if the orchestrator should degrade to the next stage
    pub fn triggers_fallback(error: &UpscaleError) -> bool {
        !is_fatal(error) && error.is_recoverable()
    }
}

/// Error conversion implementations
impl From<std::io::Error> for UpscaleError {
    fn from(error: std::io::Error) -> Self {
        Self::io("unknown", error)
    }
}

impl From<serde_json::Error> for UpscaleError {
    fn from(error: serde_json::Error) -> Self {
        Self::external("serde_json", error)
    }
}

impl From<image::ImageError> for UpscaleError {
    fn from(error: image::ImageError) -> Self {
        Self::external("image", error)
    }
}

impl From<ScaleError> for UpscaleError {
    fn from(error: ScaleError) -> Self {
        Self::external("sr_scale", error)
    }
}
