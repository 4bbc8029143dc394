//! # Backend Selector
//!
//! Picks the backend chain for one invocation from the descriptors the registry
//! reports. Selection is a pure function of the quality mode, the descriptor list
//! and the configured name preferences.
//!
//! ## Upscaler choice
//!
//! Candidates are descriptors with `nominal_scale > 1.01`. In order:
//! 1. exact, case-insensitive name match against the preference list
//! 2. substring match against the preference list
//! 3. the largest `nominal_scale`, first in list order on ties
//!
//! ## Restoration choice
//!
//! Only in balanced and ultra modes. Candidates are the remaining unit-scale
//! descriptors whose name differs from the chosen upscaler. A substring match
//! against the restoration preferences wins, otherwise the first candidate.

use sr_scale::presets::QualityMode;
use tracing::debug;

use super::descriptor::{BackendDescriptor, PipelineStrategy};
use crate::config::EngineConfig;

#[derive(Debug, Clone)]
pub struct BackendSelector {
    upscale_preferences: Vec<String>,
    restoration_preferences: Vec<String>,
    epsilon: f64,
}

impl Default for BackendSelector {
    fn default() -> Self {
        Self::from_config(&EngineConfig::default())
    }
}

impl BackendSelector {
    pub fn new(upscale_preferences: Vec<String>, restoration_preferences: Vec<String>) -> Self {
        Self {
            upscale_preferences: lowercase(upscale_preferences),
            restoration_preferences: lowercase(restoration_preferences),
            epsilon: EngineConfig::default().progress_epsilon,
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            upscale_preferences: lowercase(config.upscale_preferences.clone()),
            restoration_preferences: lowercase(config.restoration_preferences.clone()),
            epsilon: config.progress_epsilon,
        }
    }

    /// Choose a strategy, or `None` when no descriptor can upscale.
    pub fn select(
        &self,
        mode: QualityMode,
        available: &[BackendDescriptor],
    ) -> Option<PipelineStrategy> {
        let upscalers: Vec<&BackendDescriptor> = available
            .iter()
            .filter(|d| d.is_upscaler(self.epsilon))
            .collect();
        let upscale = self.pick_upscaler(&upscalers)?.clone();

        let restoration = if mode.wants_restoration() {
            let candidates: Vec<&BackendDescriptor> = available
                .iter()
                .filter(|d| !d.is_upscaler(self.epsilon) && d.is_unit_scale())
                .filter(|d| !d.name.eq_ignore_ascii_case(&upscale.name))
                .collect();
            self.pick_restoration(&candidates).cloned()
        } else {
            None
        };

        debug!(
            mode = mode.as_str(),
            upscale = %upscale.name,
            restoration = restoration.as_ref().map(|d| d.name.as_str()).unwrap_or("none"),
            "selected backend strategy"
        );
        PipelineStrategy::new(restoration, upscale).ok()
    }

    fn pick_upscaler<'a>(&self, candidates: &[&'a BackendDescriptor]) -> Option<&'a BackendDescriptor> {
        for pref in &self.upscale_preferences {
            if let Some(d) = candidates.iter().copied().find(|d| d.name.to_lowercase() == *pref) {
                return Some(d);
            }
        }
        for pref in &self.upscale_preferences {
            if let Some(d) = candidates
                .iter()
                .copied()
                .find(|d| d.name.to_lowercase().contains(pref.as_str()))
            {
                return Some(d);
            }
        }
        candidates.iter().copied().fold(None, |best, d| match best {
            Some(b) if b.nominal_scale >= d.nominal_scale => Some(b),
            _ => Some(d),
        })
    }

    fn pick_restoration<'a>(
        &self,
        candidates: &[&'a BackendDescriptor],
    ) -> Option<&'a BackendDescriptor> {
        for pref in &self.restoration_preferences {
            if let Some(d) = candidates
                .iter()
                .copied()
                .find(|d| d.name.to_lowercase().contains(pref.as_str()))
            {
                return Some(d);
            }
        }
        candidates.first().copied()
    }
}

fn lowercase(names: Vec<String>) -> Vec<String> {
    names.into_iter().map(|n| n.to_lowercase()).collect()
}
