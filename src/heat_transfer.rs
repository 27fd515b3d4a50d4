//! Skin-to-environment heat and mass transfer coefficients
//!
//! Coefficients are evaluated once per sub-step from the start-of-step skin
//! temperatures and held fixed while the inner iteration converges.

use crate::error::ComputeError;
use crate::geometry::{SegmentParameters, STANDARD_BSA};
use crate::segments::{Segment, SEGMENT_COUNT};
use crate::types::{EnvironmentalCondition, Posture};
use serde::{Deserialize, Serialize};

type PerSegment = [f64; SEGMENT_COUNT];

/// Lewis relation (K/kPa)
pub const LEWIS_RATIO: f64 = 16.5;

/// Thermal resistance of one clo (m²·K/W)
pub const CLO_TO_RESISTANCE: f64 = 0.155;

/// Lower bound on natural convection coefficients (W/(m²·K))
pub const MIN_H: f64 = 0.15;

/// Air speed below which natural convection applies (m/s)
const FORCED_CONVECTION_SPEED: f64 = 0.2;

const NATURAL_STANDING: PerSegment = [
    4.48, 4.48, 2.97, 2.91, 2.85, 3.61, 3.55, 3.67, 3.61, 3.55, 3.67, 2.80, 2.04, 2.04, 2.80, 2.04,
    2.04,
];
const NATURAL_SITTING: PerSegment = [
    4.75, 4.75, 3.12, 2.48, 1.84, 3.76, 3.62, 2.06, 3.76, 3.62, 2.06, 2.98, 2.98, 2.62, 2.98, 2.98,
    2.62,
];
const NATURAL_LYING_A: PerSegment = [
    1.105, 1.105, 1.211, 1.211, 1.211, 0.913, 2.081, 2.178, 0.913, 2.081, 2.178, 0.945, 0.385,
    0.200, 0.945, 0.385, 0.200,
];
const NATURAL_LYING_B: PerSegment = [
    0.345, 0.345, 0.046, 0.046, 0.046, 0.373, 0.850, 0.297, 0.373, 0.850, 0.297, 0.447, 0.580,
    0.966, 0.447, 0.580, 0.966,
];
const FORCED_A: PerSegment = [
    15.0, 15.0, 11.0, 17.0, 13.0, 17.0, 17.0, 20.0, 17.0, 17.0, 20.0, 14.0, 15.8, 15.1, 14.0, 15.8,
    15.1,
];
const FORCED_B: PerSegment = [
    0.62, 0.62, 0.67, 0.49, 0.60, 0.59, 0.61, 0.60, 0.59, 0.61, 0.60, 0.61, 0.74, 0.62, 0.61, 0.74,
    0.62,
];
const RADIATION_STANDING: PerSegment = [
    4.89, 4.89, 4.32, 4.09, 4.32, 4.55, 4.43, 4.21, 4.55, 4.43, 4.21, 4.77, 5.34, 6.14, 4.77, 5.34,
    6.14,
];
const RADIATION_SITTING: PerSegment = [
    4.96, 4.96, 3.99, 4.64, 4.21, 4.96, 4.21, 4.74, 4.96, 4.21, 4.74, 4.10, 4.74, 6.36, 4.10, 4.74,
    6.36,
];
const RADIATION_LYING: PerSegment = [
    5.475, 5.475, 3.463, 3.463, 3.463, 4.249, 4.835, 4.119, 4.249, 4.835, 4.119, 4.440, 5.547,
    6.085, 4.440, 5.547, 6.085,
];

/// Per-segment coefficients for one sub-step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferCoefficients {
    /// Convective coefficient (W/(m²·K))
    pub convective: PerSegment,
    /// Linearised radiative coefficient (W/(m²·K))
    pub radiative: PerSegment,
    /// Operative temperature (°C)
    pub operative: PerSegment,
    /// Total dry resistance skin to environment (m²·K/W)
    pub dry_resistance: PerSegment,
    /// Total evaporative resistance skin to environment (m²·kPa/W)
    pub evaporative_resistance: PerSegment,
    /// Dry conductance skin to environment (W/K)
    pub dry_conductance: PerSegment,
}

impl TransferCoefficients {
    pub fn compute(
        params: &SegmentParameters,
        condition: &EnvironmentalCondition,
        skin: &PerSegment,
    ) -> Result<Self, ComputeError> {
        let convective = match &condition.convective_override {
            Some(hc) => hc.values(),
            None => convection(condition, skin),
        };
        let radiative = match &condition.radiative_override {
            Some(hr) => hr.values(),
            None => radiation(condition.posture),
        };

        let mut coefficients = Self {
            convective,
            radiative,
            operative: [0.0; SEGMENT_COUNT],
            dry_resistance: [0.0; SEGMENT_COUNT],
            evaporative_resistance: [0.0; SEGMENT_COUNT],
            dry_conductance: [0.0; SEGMENT_COUNT],
        };

        for seg in Segment::ALL {
            let i = seg.index();
            let (hc, hr) = (convective[i], radiative[i]);
            if !(hc > 0.0 && hr > 0.0) {
                return Err(ComputeError::NumericalFault(format!(
                    "non-positive transfer coefficient for {}: hc={}, hr={}",
                    seg.as_str(),
                    hc,
                    hr
                )));
            }

            let clo = condition.clothing.at(seg);
            let fcl = clothing_area_factor(clo);
            let r_t = 1.0 / (hc + hr) / fcl + CLO_TO_RESISTANCE * clo;
            let r_et = 1.0 / (LEWIS_RATIO * hc) / fcl
                + CLO_TO_RESISTANCE * clo / (LEWIS_RATIO * condition.vapor_permeation);

            coefficients.operative[i] = (hc * condition.air_temperature.at(seg)
                + hr * condition.mean_radiant_temperature.at(seg))
                / (hc + hr);
            coefficients.dry_resistance[i] = r_t;
            coefficients.evaporative_resistance[i] = r_et;
            coefficients.dry_conductance[i] = params.bsa[i] / r_t;
        }

        Ok(coefficients)
    }
}

/// Clothing area factor
pub fn clothing_area_factor(clo: f64) -> f64 {
    if clo < 0.5 {
        1.0 + 0.2 * clo
    } else {
        1.05 + 0.1 * clo
    }
}

fn convection(condition: &EnvironmentalCondition, skin: &PerSegment) -> PerSegment {
    let v = condition.air_speed.values();
    let air = condition.air_temperature.values();
    let natural = match condition.posture {
        Posture::Standing => NATURAL_STANDING,
        Posture::Sitting => NATURAL_SITTING,
        Posture::Lying => {
            let mut h = [0.0; SEGMENT_COUNT];
            for i in 0..SEGMENT_COUNT {
                let dt = (air[i] - skin[i]).abs();
                h[i] = NATURAL_LYING_A[i] * dt.powf(NATURAL_LYING_B[i]);
            }
            h
        }
    };

    let mut hc = [0.0; SEGMENT_COUNT];
    for i in 0..SEGMENT_COUNT {
        hc[i] = if v[i] < FORCED_CONVECTION_SPEED {
            natural[i].max(MIN_H)
        } else {
            FORCED_A[i] * v[i].powf(FORCED_B[i])
        };
    }

    // Rescale so the whole-body mean matches the two-node correlation
    let mean_hc = area_weighted_mean(&hc);
    let target = (8.600001 * area_weighted_mean(&v).powf(0.53)).max(3.0);
    for h in hc.iter_mut() {
        *h *= target / mean_hc;
    }
    hc
}

fn radiation(posture: Posture) -> PerSegment {
    let hr = match posture {
        Posture::Standing => RADIATION_STANDING,
        Posture::Sitting => RADIATION_SITTING,
        Posture::Lying => RADIATION_LYING,
    };
    let mean_hr = area_weighted_mean(&hr);
    hr.map(|h| h * 4.7 / mean_hr)
}

fn area_weighted_mean(values: &PerSegment) -> f64 {
    let total: f64 = STANDARD_BSA.iter().sum();
    values
        .iter()
        .zip(STANDARD_BSA.iter())
        .map(|(v, a)| v * a)
        .sum::<f64>()
        / total
}
