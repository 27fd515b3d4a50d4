//! Core types for the thermoregulation simulator
//!
//! This module defines the inputs (anthropometrics, environmental conditions)
//! and the per-step output record of the simulation.

use crate::error::ComputeError;
use crate::segments::{Layer, Segment, SEGMENT_COUNT};
use serde::{Deserialize, Serialize};

/// Biological sex, selects the basal metabolic rate and shivering equations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sex {
    Male,
    Female,
}

/// Body posture, selects the convection and radiation tables
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Posture {
    Standing,
    Sitting,
    Lying,
}

/// Basal metabolic rate equation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BmrEquation {
    /// Revised Harris-Benedict (Roza and Shizgal)
    HarrisBenedict,
    /// Original Harris-Benedict coefficients
    HarrisBenedictOriginal,
    /// Ganpule et al. equation for Japanese subjects
    Japanese,
}

/// Body surface area equation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BsaEquation {
    Dubois,
    Takahira,
    Fujimoto,
    Kurazumi,
}

/// Body description used to build the segment parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Anthropometrics {
    /// Height (m)
    pub height: f64,
    /// Weight (kg)
    pub weight: f64,
    /// Age (years)
    pub age: f64,
    pub sex: Sex,
    /// Body fat fraction (0-1)
    pub body_fat: f64,
    /// Cardiac index (L/min/m2)
    pub cardiac_index: f64,
    /// Basal metabolic rate override (W); computed from `bmr_equation` when absent
    pub bmr_override: Option<f64>,
    pub bmr_equation: BmrEquation,
    pub bsa_equation: BsaEquation,
}

impl Default for Anthropometrics {
    fn default() -> Self {
        Self {
            height: 1.72,
            weight: 74.43,
            age: 20.0,
            sex: Sex::Male,
            body_fat: 0.15,
            cardiac_index: 2.59,
            bmr_override: None,
            bmr_equation: BmrEquation::HarrisBenedict,
            bsa_equation: BsaEquation::Dubois,
        }
    }
}

impl Anthropometrics {
    /// Create a body description with default fat fraction and equations
    pub fn new(height: f64, weight: f64, age: f64, sex: Sex) -> Self {
        Self {
            height,
            weight,
            age,
            sex,
            ..Default::default()
        }
    }

    pub fn with_body_fat(mut self, body_fat: f64) -> Self {
        self.body_fat = body_fat;
        self
    }

    pub fn with_bmr(mut self, bmr_w: f64) -> Self {
        self.bmr_override = Some(bmr_w);
        self
    }

    pub fn validate(&self) -> Result<(), ComputeError> {
        check_range("height", self.height, 0.5, 3.0)
            .and_then(|_| check_range("weight", self.weight, 20.0, 200.0))
            .and_then(|_| check_range("age", self.age, 0.0, 100.0))
            .and_then(|_| check_range("body_fat", self.body_fat, 0.01, 0.90))
            .and_then(|_| check_range("cardiac_index", self.cardiac_index, 0.5, 10.0))
            .map_err(ComputeError::InvalidAnthropometrics)?;

        if let Some(bmr) = self.bmr_override {
            if !bmr.is_finite() || bmr <= 0.0 {
                return Err(ComputeError::InvalidAnthropometrics(format!(
                    "bmr_override must be positive, got {}",
                    bmr
                )));
            }
        }
        Ok(())
    }
}

/// A quantity given either for the whole body or for each segment
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentValue {
    Uniform(f64),
    PerSegment([f64; SEGMENT_COUNT]),
}

impl SegmentValue {
    pub fn at(&self, seg: Segment) -> f64 {
        match self {
            SegmentValue::Uniform(value) => *value,
            SegmentValue::PerSegment(values) => values[seg.index()],
        }
    }

    pub fn values(&self) -> [f64; SEGMENT_COUNT] {
        match self {
            SegmentValue::Uniform(value) => [*value; SEGMENT_COUNT],
            SegmentValue::PerSegment(values) => *values,
        }
    }

    fn check(&self, name: &str, min: f64, max: f64) -> Result<(), String> {
        match self {
            SegmentValue::Uniform(value) => check_range(name, *value, min, max),
            SegmentValue::PerSegment(values) => Segment::ALL.iter().try_for_each(|seg| {
                check_range(
                    &format!("{} ({})", name, seg.as_str()),
                    values[seg.index()],
                    min,
                    max,
                )
            }),
        }
    }
}

impl From<f64> for SegmentValue {
    fn from(value: f64) -> Self {
        SegmentValue::Uniform(value)
    }
}

impl From<[f64; SEGMENT_COUNT]> for SegmentValue {
    fn from(values: [f64; SEGMENT_COUNT]) -> Self {
        SegmentValue::PerSegment(values)
    }
}

/// Clothing insulation (clo)
pub type Clothing = SegmentValue;

/// Extra heat gain per node (W), e.g. from heated garments or absorbed radiation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExternalHeat {
    /// Heat into the central blood pool
    pub blood: f64,
    pub core: [f64; SEGMENT_COUNT],
    /// Head and pelvis only
    pub muscle: [f64; SEGMENT_COUNT],
    /// Head and pelvis only
    pub fat: [f64; SEGMENT_COUNT],
    pub skin: [f64; SEGMENT_COUNT],
}

impl ExternalHeat {
    /// Add `watts` to one tissue node
    pub fn with(mut self, seg: Segment, layer: Layer, watts: f64) -> Self {
        let i = seg.index();
        match layer {
            Layer::Core => self.core[i] += watts,
            Layer::Muscle => self.muscle[i] += watts,
            Layer::Fat => self.fat[i] += watts,
            Layer::Skin => self.skin[i] += watts,
        }
        self
    }

    pub fn with_blood(mut self, watts: f64) -> Self {
        self.blood += watts;
        self
    }

    pub fn at(&self, seg: Segment, layer: Layer) -> f64 {
        let i = seg.index();
        match layer {
            Layer::Core => self.core[i],
            Layer::Muscle => self.muscle[i],
            Layer::Fat => self.fat[i],
            Layer::Skin => self.skin[i],
        }
    }

    /// Total external heat (W)
    pub fn total(&self) -> f64 {
        self.blood
            + self.core.iter().sum::<f64>()
            + self.muscle.iter().sum::<f64>()
            + self.fat.iter().sum::<f64>()
            + self.skin.iter().sum::<f64>()
    }

    fn validate(&self) -> Result<(), String> {
        if !self.blood.is_finite() {
            return Err(format!("external heat to blood must be finite, got {}", self.blood));
        }
        for seg in Segment::ALL {
            for layer in [Layer::Core, Layer::Muscle, Layer::Fat, Layer::Skin] {
                let watts = self.at(seg, layer);
                if !watts.is_finite() {
                    return Err(format!(
                        "external heat for {} {:?} must be finite, got {}",
                        seg.as_str(),
                        layer,
                        watts
                    ));
                }
                let absent = matches!(layer, Layer::Muscle | Layer::Fat) && !seg.has_muscle_and_fat();
                if absent && watts != 0.0 {
                    return Err(format!(
                        "{} has no {:?} layer for external heat",
                        seg.as_str(),
                        layer
                    ));
                }
            }
        }
        Ok(())
    }
}

/// Environment and activity applied to the body for one step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentalCondition {
    /// Air temperature (°C)
    pub air_temperature: SegmentValue,
    /// Mean radiant temperature (°C)
    pub mean_radiant_temperature: SegmentValue,
    /// Relative humidity (%)
    pub relative_humidity: SegmentValue,
    /// Air speed (m/s)
    pub air_speed: SegmentValue,
    /// Physical activity ratio, metabolic rate as a multiple of BMR
    pub activity_ratio: f64,
    pub clothing: Clothing,
    /// Clothing vapour permeation efficiency (0-1]
    pub vapor_permeation: f64,
    pub posture: Posture,
    /// Exposure duration (s)
    pub duration_s: f64,
    /// Convective coefficient replacing the posture tables (W/(m²·K))
    #[serde(default)]
    pub convective_override: Option<SegmentValue>,
    /// Radiative coefficient replacing the posture tables (W/(m²·K))
    #[serde(default)]
    pub radiative_override: Option<SegmentValue>,
    #[serde(default)]
    pub external_heat: ExternalHeat,
}

/// Default clothing vapour permeation efficiency
pub const DEFAULT_VAPOR_PERMEATION: f64 = 0.45;

/// Shortest accepted step duration (s)
pub const MIN_DURATION_S: f64 = 1e-3;

/// Upper bound on user-supplied heat transfer coefficients (W/(m²·K))
const MAX_COEFFICIENT: f64 = 500.0;

impl EnvironmentalCondition {
    pub fn new(
        air_temperature: f64,
        mean_radiant_temperature: f64,
        relative_humidity: f64,
        air_speed: f64,
        activity_ratio: f64,
        clo: f64,
        duration_s: f64,
    ) -> Self {
        Self {
            air_temperature: SegmentValue::Uniform(air_temperature),
            mean_radiant_temperature: SegmentValue::Uniform(mean_radiant_temperature),
            relative_humidity: SegmentValue::Uniform(relative_humidity),
            air_speed: SegmentValue::Uniform(air_speed),
            activity_ratio,
            clothing: Clothing::Uniform(clo),
            vapor_permeation: DEFAULT_VAPOR_PERMEATION,
            posture: Posture::Standing,
            duration_s,
            convective_override: None,
            radiative_override: None,
            external_heat: ExternalHeat::default(),
        }
    }

    /// Condition whose air and mean radiant temperatures both equal `operative`
    pub fn operative(
        operative: f64,
        relative_humidity: f64,
        air_speed: f64,
        activity_ratio: f64,
        clo: f64,
        duration_s: f64,
    ) -> Self {
        Self::new(
            operative,
            operative,
            relative_humidity,
            air_speed,
            activity_ratio,
            clo,
            duration_s,
        )
    }

    pub fn with_posture(mut self, posture: Posture) -> Self {
        self.posture = posture;
        self
    }

    pub fn with_clothing(mut self, clothing: Clothing) -> Self {
        self.clothing = clothing;
        self
    }

    pub fn with_air_temperature(mut self, value: impl Into<SegmentValue>) -> Self {
        self.air_temperature = value.into();
        self
    }

    pub fn with_mean_radiant_temperature(mut self, value: impl Into<SegmentValue>) -> Self {
        self.mean_radiant_temperature = value.into();
        self
    }

    pub fn with_relative_humidity(mut self, value: impl Into<SegmentValue>) -> Self {
        self.relative_humidity = value.into();
        self
    }

    pub fn with_air_speed(mut self, value: impl Into<SegmentValue>) -> Self {
        self.air_speed = value.into();
        self
    }

    /// Use fixed convective coefficients instead of the posture correlations
    pub fn with_convective_coefficient(mut self, hc: impl Into<SegmentValue>) -> Self {
        self.convective_override = Some(hc.into());
        self
    }

    /// Use fixed radiative coefficients instead of the posture tables
    pub fn with_radiative_coefficient(mut self, hr: impl Into<SegmentValue>) -> Self {
        self.radiative_override = Some(hr.into());
        self
    }

    pub fn with_external_heat(mut self, external_heat: ExternalHeat) -> Self {
        self.external_heat = external_heat;
        self
    }

    pub fn with_vapor_permeation(mut self, vapor_permeation: f64) -> Self {
        self.vapor_permeation = vapor_permeation;
        self
    }

    pub fn with_duration(mut self, duration_s: f64) -> Self {
        self.duration_s = duration_s;
        self
    }

    /// Validate the environmental inputs (duration is checked separately)
    pub fn validate(&self) -> Result<(), ComputeError> {
        self.air_temperature
            .check("air_temperature", -60.0, 80.0)
            .and_then(|_| {
                self.mean_radiant_temperature
                    .check("mean_radiant_temperature", -60.0, 80.0)
            })
            .and_then(|_| self.relative_humidity.check("relative_humidity", 0.0, 100.0))
            .and_then(|_| self.air_speed.check("air_speed", 0.0, 50.0))
            .and_then(|_| check_range("activity_ratio", self.activity_ratio, 1.0, 15.0))
            .and_then(|_| check_range("vapor_permeation", self.vapor_permeation, 1e-6, 1.0))
            .and_then(|_| self.clothing.check("clothing", 0.0, 10.0))
            .and_then(|_| match &self.convective_override {
                Some(hc) => hc.check("convective_override", 1e-3, MAX_COEFFICIENT),
                None => Ok(()),
            })
            .and_then(|_| match &self.radiative_override {
                Some(hr) => hr.check("radiative_override", 1e-3, MAX_COEFFICIENT),
                None => Ok(()),
            })
            .and_then(|_| self.external_heat.validate())
            .map_err(ComputeError::InvalidCondition)
    }
}

/// Validate a step duration in seconds
pub fn validate_duration(duration_s: f64) -> Result<(), ComputeError> {
    if !duration_s.is_finite() || duration_s < MIN_DURATION_S {
        return Err(ComputeError::InvalidDuration(format!(
            "duration must be finite and at least {} s, got {}",
            MIN_DURATION_S, duration_s
        )));
    }
    Ok(())
}

fn check_range(name: &str, value: f64, min: f64, max: f64) -> Result<(), String> {
    if !value.is_finite() {
        return Err(format!("{} must be finite, got {}", name, value));
    }
    if value < min || value > max {
        return Err(format!(
            "{} must be within [{}, {}], got {}",
            name, min, max, value
        ));
    }
    Ok(())
}

/// Per-segment temperatures and regulatory state at the end of a step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentOutput {
    pub segment: Segment,
    /// Core temperature (°C)
    pub core: f64,
    /// Muscle temperature (°C), head and pelvis only
    pub muscle: Option<f64>,
    /// Fat temperature (°C), head and pelvis only
    pub fat: Option<f64>,
    /// Skin temperature (°C)
    pub skin: f64,
    /// Skin wettedness (0-1)
    pub wettedness: f64,
    /// Skin blood flow (L/h)
    pub skin_blood_flow: f64,
    /// Vasomotor multiplier applied to basal skin blood flow
    pub vasomotor: f64,
}

/// Energy bookkeeping over one step (J)
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct HeatBalance {
    /// Change of stored heat in all nodes
    pub stored: f64,
    /// Metabolic heat production
    pub production: f64,
    /// Dry heat loss from skin (convection and radiation)
    pub sensible: f64,
    /// Evaporative heat loss from skin
    pub evaporative: f64,
    /// Respiratory heat loss
    pub respiratory: f64,
    /// Heat supplied by external sources
    #[serde(default)]
    pub external: f64,
}

impl HeatBalance {
    /// Stored heat minus net gain, zero when energy is conserved
    pub fn residual(&self) -> f64 {
        self.stored
            - (self.production + self.external
                - self.sensible
                - self.evaporative
                - self.respiratory)
    }

    pub fn accumulate(&mut self, other: &HeatBalance) {
        self.stored += other.stored;
        self.production += other.production;
        self.sensible += other.sensible;
        self.evaporative += other.evaporative;
        self.respiratory += other.respiratory;
        self.external += other.external;
    }
}

/// Outcome of the inner fixed-point iteration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConvergenceStatus {
    Converged,
    /// Iteration cap reached; the last linear solution was committed
    Degraded,
}

/// Convergence report of a step
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Convergence {
    pub status: ConvergenceStatus,
    /// Largest inner iteration count over all sub-steps
    pub iterations: usize,
    /// Largest final residual over all sub-steps (°C)
    pub residual: f64,
    pub substeps: usize,
}

/// Result of advancing the body through one environmental condition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepOutput {
    /// Simulated time since initialization (s)
    pub elapsed_s: f64,
    /// Capacity-weighted mean core temperature (°C)
    pub mean_core_temperature: f64,
    /// Area-weighted mean skin temperature (°C)
    pub mean_skin_temperature: f64,
    /// Central blood pool temperature (°C)
    pub blood_temperature: f64,
    pub segments: Vec<SegmentOutput>,
    /// Area-weighted mean skin wettedness (0-1)
    pub mean_wettedness: f64,
    /// Water loss by regulatory sweating (g/h)
    pub sweat_rate: f64,
    /// Water loss by skin evaporation, insensible diffusion and respiration (g/h)
    pub evaporative_water_loss: f64,
    /// Heat loss by regulatory sweating (W)
    pub sweat_heat_loss: f64,
    /// Total skin evaporative heat loss (W)
    pub evaporative_heat_loss: f64,
    /// Shivering heat production (W)
    pub shivering: f64,
    /// Non-shivering thermogenesis (W)
    pub non_shivering: f64,
    /// Total metabolic heat production (W)
    pub thermogenesis: f64,
    /// Respiratory heat loss (W)
    pub respiratory_heat_loss: f64,
    /// Cardiac output (L/h)
    pub cardiac_output: f64,
    pub heat_balance: HeatBalance,
    pub convergence: Convergence,
}

impl StepOutput {
    pub fn segment(&self, seg: Segment) -> Option<&SegmentOutput> {
        self.segments.iter().find(|s| s.segment == seg)
    }

    pub fn is_converged(&self) -> bool {
        self.convergence.status == ConvergenceStatus::Converged
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_anthropometrics_valid() {
        assert!(Anthropometrics::default().validate().is_ok());
    }

    #[test]
    fn test_anthropometrics_out_of_range() {
        let body = Anthropometrics::new(3.5, 70.0, 30.0, Sex::Male);
        assert!(matches!(
            body.validate(),
            Err(ComputeError::InvalidAnthropometrics(_))
        ));

        let body = Anthropometrics::default().with_body_fat(0.95);
        assert!(body.validate().is_err());

        let body = Anthropometrics::default().with_bmr(-10.0);
        assert!(body.validate().is_err());

        let body = Anthropometrics::new(1.7, f64::NAN, 30.0, Sex::Female);
        assert!(body.validate().is_err());
    }

    #[test]
    fn test_condition_validation() {
        let ok = EnvironmentalCondition::operative(25.0, 50.0, 0.1, 1.2, 0.5, 600.0);
        assert!(ok.validate().is_ok());

        let mut bad = ok.clone();
        bad.relative_humidity = SegmentValue::Uniform(120.0);
        assert!(matches!(
            bad.validate(),
            Err(ComputeError::InvalidCondition(_))
        ));

        let mut bad = ok.clone();
        bad.air_speed = SegmentValue::Uniform(-0.1);
        assert!(bad.validate().is_err());

        let mut bad = ok.clone();
        bad.activity_ratio = 0.8;
        assert!(bad.validate().is_err());

        let mut per_segment = [0.5; SEGMENT_COUNT];
        per_segment[3] = -1.0;
        let bad = ok.clone().with_clothing(Clothing::PerSegment(per_segment));
        assert!(bad.validate().is_err());

        let mut local_air = [25.0; SEGMENT_COUNT];
        local_air[Segment::LeftFoot.index()] = 90.0;
        let bad = ok.clone().with_air_temperature(local_air);
        assert!(bad.validate().is_err());

        let bad = ok.clone().with_convective_coefficient(0.0);
        assert!(bad.validate().is_err());

        let bad = ok.with_radiative_coefficient(f64::NAN);
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_segment_value() {
        let uniform = SegmentValue::from(3.0);
        assert_eq!(uniform.at(Segment::RightLeg), 3.0);
        assert_eq!(uniform.values(), [3.0; SEGMENT_COUNT]);

        let mut values = [1.0; SEGMENT_COUNT];
        values[Segment::Neck.index()] = 2.0;
        let local = SegmentValue::from(values);
        assert_eq!(local.at(Segment::Neck), 2.0);
        assert_eq!(local.at(Segment::Head), 1.0);
    }

    #[test]
    fn test_external_heat() {
        let heat = ExternalHeat::default()
            .with(Segment::Chest, Layer::Skin, 20.0)
            .with(Segment::Head, Layer::Muscle, 5.0)
            .with_blood(1.5);
        assert_eq!(heat.at(Segment::Chest, Layer::Skin), 20.0);
        assert!((heat.total() - 26.5).abs() < 1e-12);

        let cond = EnvironmentalCondition::operative(25.0, 50.0, 0.1, 1.0, 0.5, 60.0);
        assert!(cond.clone().with_external_heat(heat).validate().is_ok());

        // Chest has no muscle node
        let misplaced = ExternalHeat::default().with(Segment::Chest, Layer::Muscle, 5.0);
        assert!(matches!(
            cond.clone().with_external_heat(misplaced).validate(),
            Err(ComputeError::InvalidCondition(_))
        ));

        let non_finite = ExternalHeat::default().with_blood(f64::INFINITY);
        assert!(cond.with_external_heat(non_finite).validate().is_err());
    }

    #[test]
    fn test_duration_validation() {
        assert!(validate_duration(60.0).is_ok());
        assert!(matches!(
            validate_duration(0.0),
            Err(ComputeError::InvalidDuration(_))
        ));
        assert!(validate_duration(f64::INFINITY).is_err());
        assert!(matches!(
            validate_duration(1e-310),
            Err(ComputeError::InvalidDuration(_))
        ));
        assert!(validate_duration(MIN_DURATION_S).is_ok());
    }

    #[test]
    fn test_heat_balance_residual() {
        let balance = HeatBalance {
            stored: 10.0,
            production: 100.0,
            sensible: 60.0,
            evaporative: 20.0,
            respiratory: 10.0,
            external: 0.0,
        };
        assert!(balance.residual().abs() < 1e-12);

        let heated = HeatBalance {
            stored: 15.0,
            external: 5.0,
            ..balance
        };
        assert!(heated.residual().abs() < 1e-12);
    }

    #[test]
    fn test_condition_serialization() {
        let cond = EnvironmentalCondition::operative(30.0, 40.0, 0.2, 1.5, 0.6, 1800.0)
            .with_posture(Posture::Sitting)
            .with_air_speed([0.3; SEGMENT_COUNT])
            .with_convective_coefficient(4.0)
            .with_external_heat(ExternalHeat::default().with(Segment::Back, Layer::Core, 2.0));
        let json = serde_json::to_string(&cond).unwrap();
        let loaded: EnvironmentalCondition = serde_json::from_str(&json).unwrap();
        assert_eq!(loaded, cond);
    }
}
