//! # Configuration Module
//!
//! This module provides the job configuration used by the CLI and the tunable engine
//! constants consumed by the orchestrator.

pub mod config;

pub use config::{EngineConfig, UpscaleConfig, MAX_NEURAL_PASSES};
