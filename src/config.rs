//! Configuration for the localizer
//!
//! Every section has defaults, can be loaded from YAML, and accepts
//! string-keyed numeric overrides through `configure`.

use crate::common::field::DEFAULT_HALF_WIDTH;
use crate::error::{LocalizationError, Result};
use crate::perception::filters::ParticleFilterConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Noise of the odometry motion model.
///
/// Standard deviation on each axis is `gain * |delta| + floor`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MotionNoiseConfig {
    /// Translational noise per unit travelled
    pub drive_noise: f64,
    /// Angular noise per radian turned
    pub angle_noise: f64,
    /// Added to every axis so standstill still spreads particles
    pub floor: f64,
}

impl Default for MotionNoiseConfig {
    fn default() -> Self {
        MotionNoiseConfig {
            drive_noise: 0.1,
            angle_noise: 0.05,
            floor: 0.001,
        }
    }
}

impl MotionNoiseConfig {
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("drive_noise", self.drive_noise),
            ("angle_noise", self.angle_noise),
        ] {
            if !(value >= 0.0 && value.is_finite()) {
                return Err(LocalizationError::invalid(name, "must be non-negative"));
            }
        }
        if !(self.floor > 0.0 && self.floor.is_finite()) {
            return Err(LocalizationError::invalid("noise_floor", "must be positive"));
        }
        Ok(())
    }
}

/// Full localizer configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalizationConfig {
    pub filter: ParticleFilterConfig,
    pub motion: MotionNoiseConfig,
    /// Per-axis spread used when particles are reseeded on `set_pose`
    pub reset_spread: f64,
    /// Half-width of the square field centered on the origin
    pub field_half_width: f64,
}

impl Default for LocalizationConfig {
    fn default() -> Self {
        LocalizationConfig {
            filter: ParticleFilterConfig::default(),
            motion: MotionNoiseConfig::default(),
            reset_spread: 1.0,
            field_half_width: DEFAULT_HALF_WIDTH,
        }
    }
}

impl LocalizationConfig {
    /// Load configuration from a YAML file
    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Load configuration from a YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: LocalizationConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn validate(&self) -> Result<()> {
        self.filter.validate()?;
        self.motion.validate()?;
        if !(self.reset_spread > 0.0 && self.reset_spread.is_finite()) {
            return Err(LocalizationError::invalid("reset_spread", "must be positive"));
        }
        if !(self.field_half_width > 0.0 && self.field_half_width.is_finite()) {
            return Err(LocalizationError::invalid("field_half_width", "must be positive"));
        }
        Ok(())
    }

    /// Apply string-keyed overrides; filter keys are forwarded to [`ParticleFilterConfig::configure`].
    /// On error `self` is left untouched.
    pub fn configure(&mut self, params: &HashMap<String, f64>) -> Result<()> {
        let mut candidate = self.clone();
        let mut filter_params = HashMap::new();
        for (key, &value) in params {
            match key.as_str() {
                "drive_noise" => candidate.motion.drive_noise = value,
                "angle_noise" => candidate.motion.angle_noise = value,
                "noise_floor" => candidate.motion.floor = value,
                "reset_spread" => candidate.reset_spread = value,
                "field_half_width" => candidate.field_half_width = value,
                _ => {
                    filter_params.insert(key.clone(), value);
                }
            }
        }
        candidate.filter.configure(&filter_params)?;
        candidate.validate()?;
        *self = candidate;
        Ok(())
    }
}
