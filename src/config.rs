//! Solver and thermoregulation configuration
//!
//! All knobs have defaults; configurations can be persisted and restored as
//! JSON alongside simulation snapshots.

use crate::error::ComputeError;
use serde::{Deserialize, Serialize};

/// Default convergence tolerance of the inner iteration (°C)
pub const DEFAULT_TOLERANCE: f64 = 1e-4;

/// Default cap on inner iterations per sub-step
pub const DEFAULT_MAX_ITERATIONS: usize = 50;

/// Default relaxation factor of the inner iteration
pub const DEFAULT_RELAXATION: f64 = 0.5;

/// Default upper bound on a sub-step (s)
pub const DEFAULT_MAX_SUBSTEP_S: f64 = 60.0;

/// Default cap on sub-steps per step; longer steps use longer sub-steps
pub const DEFAULT_MAX_SUBSTEPS: usize = 1440;

/// Default operative temperature of the set-point reference condition (°C)
pub const DEFAULT_REFERENCE_OPERATIVE: f64 = 28.8;

/// Default shivering rate limit (W/s)
pub const DEFAULT_SHIVERING_RATE_LIMIT: f64 = 0.0077;

/// Optional thermoregulatory mechanisms
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThermoregulationOptions {
    /// Enable non-shivering thermogenesis from brown adipose tissue
    pub non_shivering_thermogenesis: bool,
    /// Subject is cold acclimated (raises brown adipose activity)
    pub cold_acclimated: bool,
    /// Subject is known to have active brown adipose tissue
    pub bat_positive: bool,
    /// Suppress shivering while core temperature is above the onset threshold
    pub shivering_threshold: bool,
    /// Maximum change of the shivering signal (W/s)
    pub shivering_rate_limit: Option<f64>,
    /// Close arteriovenous anastomoses during the set-point reset
    pub ava_zero_during_reset: bool,
}

impl Default for ThermoregulationOptions {
    fn default() -> Self {
        Self {
            non_shivering_thermogenesis: true,
            cold_acclimated: false,
            bat_positive: false,
            shivering_threshold: false,
            shivering_rate_limit: None,
            ava_zero_during_reset: false,
        }
    }
}

/// Numerical and regulatory configuration of a simulator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolverConfig {
    /// Inner iteration stops when the largest temperature update is below this (°C)
    pub tolerance: f64,
    /// Inner iteration cap; reaching it yields a degraded step
    pub max_iterations: usize,
    /// Relaxation factor applied to the fixed-point update, in (0, 1]
    pub relaxation: f64,
    /// Longest sub-step used to split a step (s)
    pub max_substep_s: f64,
    /// Most sub-steps per step; beyond it sub-steps grow past `max_substep_s`
    #[serde(default = "default_max_substeps")]
    pub max_substeps: usize,
    /// Operative temperature of the set-point reference condition (°C)
    pub reference_operative_temperature: f64,
    pub options: ThermoregulationOptions,
}

fn default_max_substeps() -> usize {
    DEFAULT_MAX_SUBSTEPS
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            tolerance: DEFAULT_TOLERANCE,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            relaxation: DEFAULT_RELAXATION,
            max_substep_s: DEFAULT_MAX_SUBSTEP_S,
            max_substeps: DEFAULT_MAX_SUBSTEPS,
            reference_operative_temperature: DEFAULT_REFERENCE_OPERATIVE,
            options: ThermoregulationOptions::default(),
        }
    }
}

impl SolverConfig {
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_relaxation(mut self, relaxation: f64) -> Self {
        self.relaxation = relaxation;
        self
    }

    pub fn with_max_substep(mut self, max_substep_s: f64) -> Self {
        self.max_substep_s = max_substep_s;
        self
    }

    pub fn with_max_substeps(mut self, max_substeps: usize) -> Self {
        self.max_substeps = max_substeps;
        self
    }

    pub fn with_reference_operative(mut self, operative: f64) -> Self {
        self.reference_operative_temperature = operative;
        self
    }

    pub fn with_options(mut self, options: ThermoregulationOptions) -> Self {
        self.options = options;
        self
    }

    pub fn validate(&self) -> Result<(), ComputeError> {
        if !(self.tolerance.is_finite() && self.tolerance > 0.0) {
            return Err(ComputeError::InvalidConfig(format!(
                "tolerance must be positive, got {}",
                self.tolerance
            )));
        }
        if self.max_iterations == 0 {
            return Err(ComputeError::InvalidConfig(
                "max_iterations must be at least 1".to_string(),
            ));
        }
        if !(self.relaxation > 0.0 && self.relaxation <= 1.0) {
            return Err(ComputeError::InvalidConfig(format!(
                "relaxation must be within (0, 1], got {}",
                self.relaxation
            )));
        }
        if !(self.max_substep_s.is_finite() && self.max_substep_s > 0.0) {
            return Err(ComputeError::InvalidConfig(format!(
                "max_substep_s must be positive, got {}",
                self.max_substep_s
            )));
        }
        if self.max_substeps == 0 {
            return Err(ComputeError::InvalidConfig(
                "max_substeps must be at least 1".to_string(),
            ));
        }
        if !(10.0..=40.0).contains(&self.reference_operative_temperature) {
            return Err(ComputeError::InvalidConfig(format!(
                "reference operative temperature must be within [10, 40] °C, got {}",
                self.reference_operative_temperature
            )));
        }
        if let Some(limit) = self.options.shivering_rate_limit {
            if !(limit.is_finite() && limit > 0.0) {
                return Err(ComputeError::InvalidConfig(format!(
                    "shivering_rate_limit must be positive, got {}",
                    limit
                )));
            }
        }
        Ok(())
    }

    /// Load configuration from JSON
    pub fn from_json(json: &str) -> Result<Self, ComputeError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Export configuration as JSON
    pub fn to_json(&self) -> Result<String, ComputeError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_is_valid() {
        assert!(SolverConfig::default().validate().is_ok());
    }

    #[test]
    fn test_rejects_bad_values() {
        let bad = SolverConfig::default().with_relaxation(1.5);
        assert!(matches!(bad.validate(), Err(ComputeError::InvalidConfig(_))));

        let bad = SolverConfig::default().with_tolerance(0.0);
        assert!(bad.validate().is_err());

        let bad = SolverConfig::default().with_max_iterations(0);
        assert!(bad.validate().is_err());

        let bad = SolverConfig::default().with_max_substep(-1.0);
        assert!(bad.validate().is_err());

        let bad = SolverConfig::default().with_max_substeps(0);
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_json_roundtrip() {
        let config = SolverConfig::default()
            .with_tolerance(1e-5)
            .with_options(ThermoregulationOptions {
                shivering_rate_limit: Some(DEFAULT_SHIVERING_RATE_LIMIT),
                ..Default::default()
            });
        let json = config.to_json().unwrap();
        let loaded = SolverConfig::from_json(&json).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_missing_substep_cap_defaults() {
        let mut value = serde_json::to_value(SolverConfig::default()).unwrap();
        value.as_object_mut().unwrap().remove("max_substeps");
        let loaded = SolverConfig::from_json(&value.to_string()).unwrap();
        assert_eq!(loaded.max_substeps, DEFAULT_MAX_SUBSTEPS);
    }

    #[test]
    fn test_from_json_validates() {
        let mut config = SolverConfig::default();
        config.relaxation = 0.0;
        let json = serde_json::to_string(&config).unwrap();
        assert!(SolverConfig::from_json(&json).is_err());
    }
}
