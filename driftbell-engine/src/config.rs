//! Composer and scheduler configuration.
//!
//! Every field has a serde default, so a config file only needs the values it
//! changes. The same `ComposerConfig` must be used for a live session and its
//! offline re-render, otherwise the timelines diverge.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::SessionError;

/// Lookahead / tick pair for the live scheduler.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum SchedulerProfile {
    #[default]
    Desktop,
    /// Larger lookahead and coarser tick, for hosts that throttle timers.
    Mobile,
}

impl SchedulerProfile {
    /// Seconds ahead of the audio clock the live scheduler commits events.
    pub fn lookahead_secs(self) -> f64 {
        match self {
            SchedulerProfile::Desktop => 1.0,
            SchedulerProfile::Mobile => 4.0,
        }
    }

    /// Period of the live scheduling tick, in milliseconds.
    pub fn tick_interval_ms(self) -> u64 {
        match self {
            SchedulerProfile::Desktop => 100,
            SchedulerProfile::Mobile => 500,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ComposerConfig {
    #[serde(default = "ComposerConfig::default_intro_secs")]
    pub intro_secs: f64,
    #[serde(default = "ComposerConfig::default_step_base_interval")]
    pub step_base_interval: f64,
    #[serde(default = "ComposerConfig::default_density_smoothing")]
    pub density_smoothing: f64,
    #[serde(default = "ComposerConfig::default_void_rest_secs")]
    pub void_rest_secs: f64,
    #[serde(default = "ComposerConfig::default_swarm_duration_secs")]
    pub swarm_duration_secs: f64,
    #[serde(default = "ComposerConfig::default_swarm_amplitude")]
    pub swarm_amplitude: f64,
    #[serde(default = "ComposerConfig::default_drone_gain")]
    pub drone_gain: f64,
    #[serde(default = "ComposerConfig::default_drone_third")]
    pub drone_third: bool,
    #[serde(default = "ComposerConfig::default_max_render_secs")]
    pub max_render_secs: f64,
    #[serde(default = "ComposerConfig::default_start_lead_secs")]
    pub start_lead_secs: f64,
    #[serde(default)]
    pub profile: SchedulerProfile,
    /// Draw swarm grain variation from an unseeded source. Re-renders of
    /// CHORUS sections will not match the live session when enabled.
    #[serde(default)]
    pub legacy_unseeded_swarm: bool,
}

impl ComposerConfig {
    fn default_intro_secs() -> f64 {
        30.0
    }
    fn default_step_base_interval() -> f64 {
        2.5
    }
    fn default_density_smoothing() -> f64 {
        0.1
    }
    fn default_void_rest_secs() -> f64 {
        2.0
    }
    fn default_swarm_duration_secs() -> f64 {
        3.0
    }
    fn default_swarm_amplitude() -> f64 {
        0.09
    }
    fn default_drone_gain() -> f64 {
        0.6
    }
    fn default_drone_third() -> bool {
        true
    }
    fn default_max_render_secs() -> f64 {
        3600.0
    }
    fn default_start_lead_secs() -> f64 {
        0.1
    }

    pub fn load(path: &Path) -> Result<Self, SessionError> {
        let text = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }
}

impl Default for ComposerConfig {
    fn default() -> Self {
        Self {
            intro_secs: Self::default_intro_secs(),
            step_base_interval: Self::default_step_base_interval(),
            density_smoothing: Self::default_density_smoothing(),
            void_rest_secs: Self::default_void_rest_secs(),
            swarm_duration_secs: Self::default_swarm_duration_secs(),
            swarm_amplitude: Self::default_swarm_amplitude(),
            drone_gain: Self::default_drone_gain(),
            drone_third: Self::default_drone_third(),
            max_render_secs: Self::default_max_render_secs(),
            start_lead_secs: Self::default_start_lead_secs(),
            profile: SchedulerProfile::default(),
            legacy_unseeded_swarm: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_yields_defaults() {
        let cfg: ComposerConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg, ComposerConfig::default());
    }

    #[test]
    fn partial_override_keeps_other_defaults() {
        let cfg: ComposerConfig =
            serde_json::from_str(r#"{"intro_secs": 10.0, "profile": "mobile"}"#).unwrap();
        assert_eq!(cfg.intro_secs, 10.0);
        assert_eq!(cfg.profile, SchedulerProfile::Mobile);
        assert_eq!(cfg.step_base_interval, 2.5);
        assert!(cfg.profile.lookahead_secs() > SchedulerProfile::Desktop.lookahead_secs());
    }
}
