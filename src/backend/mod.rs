//! # Backend Module
//!
//! Descriptors of the available enhancement backends, the capability traits the
//! orchestrator drives them through, strategy selection, and built-in collaborators.

pub mod builtin;
pub mod capability;
pub mod descriptor;
pub mod selector;

pub use builtin::{CpuResampler, CpuSharpener, NearestNeighborBackend, StaticRegistry};
pub use capability::{BackendRegistry, HardwareScaler, InferenceBackend, Resampler, Sharpener};
pub use descriptor::{BackendDescriptor, PipelineStrategy};
pub use selector::BackendSelector;
