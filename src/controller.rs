//! Thermoregulatory controller
//!
//! Maps deviations of core and skin temperatures from their set-points to
//! effector signals: skin vasomotion, arteriovenous anastomosis (AVA) flow,
//! sweating, shivering and non-shivering thermogenesis. Evaluation is a pure
//! function of its inputs.

use crate::config::ThermoregulationOptions;
use crate::geometry::{SegmentParameters, STANDARD_BSA};
use crate::heat_transfer::TransferCoefficients;
use crate::psychrometrics::{saturation_vapor_pressure, vapor_pressure};
use crate::segments::{Segment, SEGMENT_COUNT};
use crate::types::{EnvironmentalCondition, Sex};
use serde::{Deserialize, Serialize};

type PerSegment = [f64; SEGMENT_COUNT];

/// Bounds of the vasomotor multiplier on basal skin blood flow
pub const VASOMOTOR_MIN: f64 = 0.05;
pub const VASOMOTOR_MAX: f64 = 20.0;

/// Skin wettedness due to insensible diffusion
pub const BASE_WETTEDNESS: f64 = 0.06;

/// Floor on maximum evaporative capacity (W)
const MIN_EVAPORATION: f64 = 0.001;

/// Whole-body shivering never exceeds this multiple of BMR
const MAX_SHIVERING_BMR_RATIO: f64 = 4.0;

const RECEPTOR_WEIGHTS: PerSegment = [
    0.0549, 0.0146, 0.1492, 0.1321, 0.2122, 0.0227, 0.0117, 0.0923, 0.0227, 0.0117, 0.0923,
    0.0501, 0.0251, 0.0167, 0.0501, 0.0251, 0.0167,
];
const SWEAT_DISTRIBUTION: PerSegment = [
    0.064, 0.017, 0.146, 0.129, 0.206, 0.051, 0.026, 0.0155, 0.051, 0.026, 0.0155, 0.073, 0.036,
    0.0175, 0.073, 0.036, 0.0175,
];
const SWEAT_AGING: PerSegment = [
    0.69, 0.69, 0.59, 0.52, 0.40, 0.75, 0.75, 0.75, 0.75, 0.75, 0.75, 0.40, 0.40, 0.40, 0.40, 0.40,
    0.40,
];
const DILATION_DISTRIBUTION: PerSegment = [
    0.0692, 0.0992, 0.0580, 0.0679, 0.0707, 0.0400, 0.0373, 0.0632, 0.0400, 0.0373, 0.0632,
    0.0736, 0.0411, 0.0623, 0.0736, 0.0411, 0.0623,
];
const CONSTRICTION_DISTRIBUTION: PerSegment = [
    0.0213, 0.0213, 0.0638, 0.0638, 0.0638, 0.0213, 0.0213, 0.1489, 0.0213, 0.0213, 0.1489,
    0.0213, 0.0213, 0.1489, 0.0213, 0.0213, 0.1489,
];
const DILATION_AGING: PerSegment = [
    0.91, 0.91, 0.47, 0.47, 0.31, 0.47, 0.47, 0.47, 0.47, 0.47, 0.47, 0.31, 0.31, 0.31, 0.31, 0.31,
    0.31,
];
const SHIVERING_DISTRIBUTION: PerSegment = [
    0.0339, 0.0436, 0.27394, 0.24102, 0.38754, 0.00243, 0.00137, 0.0002, 0.00243, 0.00137, 0.0002,
    0.0039, 0.00175, 0.00035, 0.0039, 0.00175, 0.00035,
];
const NST_DISTRIBUTION: PerSegment = [
    0.0, 0.190, 0.0, 0.190, 0.190, 0.215, 0.0, 0.0, 0.215, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0,
];

// Trunk core capacities (Wh/K) weighting the AVA core error: chest, back, pelvis
const TRUNK_CORE_WEIGHTS: [f64; 3] = [10.2975, 9.3935, 4.488];

/// Core and skin set-point temperatures (°C)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetPoint {
    pub core: PerSegment,
    pub skin: PerSegment,
}

/// How set-point errors are formed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlMode {
    /// Errors against the body's set-point
    Regulated,
    /// Set-point follows the current temperatures; all effectors sit at basal level
    Passive,
}

/// Inputs to one controller evaluation
#[derive(Debug, Clone, Copy)]
pub struct ControlInput<'a> {
    pub params: &'a SegmentParameters,
    pub coefficients: &'a TransferCoefficients,
    pub condition: &'a EnvironmentalCondition,
    /// Per-segment core temperatures (°C)
    pub core: &'a PerSegment,
    /// Per-segment skin temperatures (°C)
    pub skin: &'a PerSegment,
    pub set_point: &'a SetPoint,
    pub options: &'a ThermoregulationOptions,
    /// Shivering signal of the previous sub-step (W)
    pub previous_shivering: f64,
    /// Sub-step length (s)
    pub dt: f64,
    pub mode: ControlMode,
}

/// Effector outputs of the controller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlSignals {
    /// Integrated warm receptor signal (°C)
    pub warm_signal: f64,
    /// Integrated cold receptor signal (°C)
    pub cold_signal: f64,
    /// Vasomotor multiplier on basal skin blood flow
    pub vasomotor: PerSegment,
    /// Skin blood flow (L/h)
    pub skin_blood_flow: PerSegment,
    /// AVA flow of one hand (L/h)
    pub ava_hand: f64,
    /// AVA flow of one foot (L/h)
    pub ava_foot: f64,
    /// Maximum evaporative heat loss (W)
    pub max_evaporation: PerSegment,
    /// Skin evaporative heat loss, sweat plus diffusion (W)
    pub evaporation: PerSegment,
    /// Evaporative heat loss by regulatory sweating (W)
    pub sweat_evaporation: PerSegment,
    pub wettedness: PerSegment,
    /// Whole-body shivering signal before distribution (W)
    pub shivering_signal: f64,
    /// Shivering thermogenesis (W)
    pub shivering: PerSegment,
    /// Non-shivering thermogenesis (W)
    pub non_shivering: PerSegment,
}

/// Closed-loop thermoregulatory controller
pub struct Controller;

impl Controller {
    pub fn evaluate(input: &ControlInput) -> ControlSignals {
        let (err_core, err_skin) = match input.mode {
            ControlMode::Regulated => (
                difference(input.core, &input.set_point.core),
                difference(input.skin, &input.set_point.skin),
            ),
            ControlMode::Passive => ([0.0; SEGMENT_COUNT], [0.0; SEGMENT_COUNT]),
        };

        let (warm_signal, cold_signal) = receptor_signals(&err_skin);
        let params = input.params;
        let age = params.age();

        let (vasomotor, skin_blood_flow) =
            vasomotion(params, &err_core, &err_skin, warm_signal, cold_signal);

        let (ava_hand, ava_foot) = if input.mode == ControlMode::Passive
            && input.options.ava_zero_during_reset
        {
            (0.0, 0.0)
        } else {
            ava_flow(params, &err_core, &err_skin)
        };

        let sweat = sweating(input, &err_core, &err_skin, warm_signal, cold_signal);

        let mut shivering_signal = (24.36 * cold_signal * -err_core[0]).max(0.0);
        if input.options.shivering_threshold
            && core_above_shivering_threshold(params.sex(), input.core, input.skin)
        {
            shivering_signal = 0.0;
        }
        if input.mode == ControlMode::Regulated {
            if let Some(limit) = input.options.shivering_rate_limit {
                let max_change = limit * input.dt;
                shivering_signal = shivering_signal.clamp(
                    input.previous_shivering - max_change,
                    input.previous_shivering + max_change,
                );
            }
        }

        let shivering_aging = shivering_age_factor(age);
        let mut shivering = [0.0; SEGMENT_COUNT];
        for i in 0..SEGMENT_COUNT {
            shivering[i] =
                SHIVERING_DISTRIBUTION[i] * params.bsa_ratio * shivering_aging * shivering_signal;
        }
        let total: f64 = shivering.iter().sum();
        let cap = MAX_SHIVERING_BMR_RATIO * params.bmr;
        if total > cap {
            let scale = cap / total;
            for q in shivering.iter_mut() {
                *q *= scale;
            }
            shivering_signal *= scale;
        }

        let non_shivering = if input.options.non_shivering_thermogenesis {
            non_shivering(params, input.options, cold_signal)
        } else {
            [0.0; SEGMENT_COUNT]
        };

        ControlSignals {
            warm_signal,
            cold_signal,
            vasomotor,
            skin_blood_flow,
            ava_hand,
            ava_foot,
            max_evaporation: sweat.max_evaporation,
            evaporation: sweat.evaporation,
            sweat_evaporation: sweat.sweat_evaporation,
            wettedness: sweat.wettedness,
            shivering_signal,
            shivering,
            non_shivering,
        }
    }
}

fn difference(values: &PerSegment, reference: &PerSegment) -> PerSegment {
    let mut out = [0.0; SEGMENT_COUNT];
    for i in 0..SEGMENT_COUNT {
        out[i] = values[i] - reference[i];
    }
    out
}

/// Receptor-weighted warm and cold skin signals
pub fn receptor_signals(err_skin: &PerSegment) -> (f64, f64) {
    let mut warm = 0.0;
    let mut cold = 0.0;
    for i in 0..SEGMENT_COUNT {
        warm += err_skin[i].max(0.0) * RECEPTOR_WEIGHTS[i];
        cold += -err_skin[i].min(0.0) * RECEPTOR_WEIGHTS[i];
    }
    (warm, cold)
}

fn vasomotion(
    params: &SegmentParameters,
    err_core: &PerSegment,
    err_skin: &PerSegment,
    warm: f64,
    cold: f64,
) -> (PerSegment, PerSegment) {
    let dilation = (100.5 * err_core[0] + 6.4 * (warm - cold)).max(0.0);
    let constriction = (-10.8 * err_core[0] - 10.8 * (warm - cold)).max(0.0);
    let elderly = params.age() >= 60.0;

    let mut multiplier = [0.0; SEGMENT_COUNT];
    let mut flow = [0.0; SEGMENT_COUNT];
    for i in 0..SEGMENT_COUNT {
        let aging = if elderly { DILATION_AGING[i] } else { 1.0 };
        let m = (1.0 + DILATION_DISTRIBUTION[i] * aging * dilation)
            / (1.0 + CONSTRICTION_DISTRIBUTION[i] * constriction)
            * 2f64.powf(err_skin[i] / 6.0);
        multiplier[i] = m.clamp(VASOMOTOR_MIN, VASOMOTOR_MAX);
        flow[i] = multiplier[i] * params.basal_flow.skin[i];
    }
    (multiplier, flow)
}

fn ava_flow(params: &SegmentParameters, err_core: &PerSegment, err_skin: &PerSegment) -> (f64, f64) {
    let trunk_weight: f64 = TRUNK_CORE_WEIGHTS.iter().sum();
    let err_trunk = (err_core[2] * TRUNK_CORE_WEIGHTS[0]
        + err_core[3] * TRUNK_CORE_WEIGHTS[1]
        + err_core[4] * TRUNK_CORE_WEIGHTS[2])
        / trunk_weight;
    let bsa_total: f64 = STANDARD_BSA.iter().sum();
    let err_mean_skin = err_skin
        .iter()
        .zip(STANDARD_BSA.iter())
        .map(|(e, a)| e * a)
        .sum::<f64>()
        / bsa_total;

    let hand = (0.265 * (err_mean_skin + 0.43) + 0.953 * (err_trunk + 0.1905) + 0.9126)
        .clamp(0.0, 1.0);
    let foot = (0.265 * (err_mean_skin - 0.997) + 0.953 * (err_trunk + 0.0095) + 0.9126)
        .clamp(0.0, 1.0);

    (
        1.71 * params.blood_flow_ratio * hand,
        2.16 * params.blood_flow_ratio * foot,
    )
}

struct Sweat {
    max_evaporation: PerSegment,
    evaporation: PerSegment,
    sweat_evaporation: PerSegment,
    wettedness: PerSegment,
}

fn sweating(
    input: &ControlInput,
    err_core: &PerSegment,
    err_skin: &PerSegment,
    warm: f64,
    cold: f64,
) -> Sweat {
    let params = input.params;
    let signal = (371.2 * err_core[0] + 33.64 * (warm - cold)).max(0.0) * params.bsa_ratio;
    let elderly = params.age() >= 60.0;

    let mut out = Sweat {
        max_evaporation: [0.0; SEGMENT_COUNT],
        evaporation: [0.0; SEGMENT_COUNT],
        sweat_evaporation: [0.0; SEGMENT_COUNT],
        wettedness: [0.0; SEGMENT_COUNT],
    };
    for seg in Segment::ALL {
        let i = seg.index();
        let (p_air, _) = vapor_pressure(
            input.condition.air_temperature.at(seg),
            input.condition.relative_humidity.at(seg),
        );
        let e_max = ((saturation_vapor_pressure(input.skin[i]) - p_air)
            / input.coefficients.evaporative_resistance[i]
            * params.bsa[i])
            .max(MIN_EVAPORATION);
        let aging = if elderly { SWEAT_AGING[i] } else { 1.0 };
        let sweat = SWEAT_DISTRIBUTION[i] * signal * aging * 2f64.powf(err_skin[i] / 10.0);
        let wettedness = (BASE_WETTEDNESS + (1.0 - BASE_WETTEDNESS) * sweat / e_max).clamp(0.0, 1.0);

        out.max_evaporation[i] = e_max;
        out.wettedness[i] = wettedness;
        out.evaporation[i] = wettedness * e_max;
        out.sweat_evaporation[i] =
            ((wettedness - BASE_WETTEDNESS) / (1.0 - BASE_WETTEDNESS) * e_max).max(0.0);
    }
    out
}

/// Core temperature above the onset threshold for shivering (Asaka)
fn core_above_shivering_threshold(sex: Sex, core: &PerSegment, skin: &PerSegment) -> bool {
    let bsa_total: f64 = STANDARD_BSA.iter().sum();
    let mean_skin = skin
        .iter()
        .zip(STANDARD_BSA.iter())
        .map(|(t, a)| t * a)
        .sum::<f64>()
        / bsa_total;
    let threshold = if mean_skin < 31.0 {
        36.6
    } else {
        match sex {
            Sex::Male => -0.2436 * mean_skin + 44.10,
            Sex::Female => -0.2250 * mean_skin + 43.05,
        }
    };
    threshold < core[Segment::Head.index()]
}

fn shivering_age_factor(age: f64) -> f64 {
    if age < 30.0 {
        1.0
    } else if age < 40.0 {
        0.97514
    } else if age < 50.0 {
        0.95028
    } else if age < 60.0 {
        0.92818
    } else if age < 70.0 {
        0.90055
    } else if age < 80.0 {
        0.86188
    } else {
        0.82597
    }
}

fn non_shivering(
    params: &SegmentParameters,
    options: &ThermoregulationOptions,
    cold: f64,
) -> PerSegment {
    let body = &params.anthropometrics;
    let age = body.age;
    let bmi = body.weight / (body.height * body.height);

    // Brown adipose tissue activity (SUV)
    let mut bat = 10f64.powf(-0.10502 * bmi + 2.7708);
    bat *= if age < 30.0 {
        1.61
    } else if age < 40.0 {
        1.0
    } else {
        0.80
    };
    if options.cold_acclimated {
        bat += 3.46;
    }
    if !options.bat_positive {
        // Incidence of active BAT by age
        bat *= if age < 30.0 {
            44.0 / 83.0
        } else if age < 40.0 {
            15.0 / 38.0
        } else if age < 50.0 {
            7.0 / 26.0
        } else if age < 60.0 {
            1.0 / 8.0
        } else {
            0.0
        };
    }

    let limit = 1.80 * bat + 2.43 + 5.62;
    let signal = (2.8 * cold).min(limit);
    NST_DISTRIBUTION.map(|f| params.bsa_ratio * f * signal)
}
