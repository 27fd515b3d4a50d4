//! Metabolic heat production, tissue blood flow and respiratory losses

use crate::controller::ControlSignals;
use crate::geometry::{LayerValues, SegmentParameters};
use crate::psychrometrics::vapor_pressure;
use crate::segments::{Segment, SEGMENT_COUNT};
use crate::types::EnvironmentalCondition;
use serde::{Deserialize, Serialize};

type PerSegment = [f64; SEGMENT_COUNT];

/// Share of external work heat released in each segment
const WORK_DISTRIBUTION: PerSegment = [
    0.0, 0.0, 0.091, 0.08, 0.129, 0.0262, 0.0139, 0.005, 0.0262, 0.0139, 0.005, 0.2010, 0.0990,
    0.005, 0.2010, 0.0990, 0.005,
];

/// Heat production (W) that raises local blood flow by 1 L/h
const HEAT_PER_FLOW: f64 = 1.163;

/// Heat production, blood flow and respiration for one controller evaluation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetabolicState {
    /// Heat production per layer (W)
    pub heat: LayerValues,
    /// Blood flow per layer (L/h); skin includes AVA flow in hands and feet
    pub flow: LayerValues,
    /// Heat from physical activity above basal (W)
    pub work: PerSegment,
    /// Sensible respiratory loss (W)
    pub respiratory_sensible: f64,
    /// Latent respiratory loss (W)
    pub respiratory_latent: f64,
}

impl MetabolicState {
    pub fn total_heat(&self) -> f64 {
        sum_layers(&self.heat)
    }

    pub fn respiratory_loss(&self) -> f64 {
        self.respiratory_sensible + self.respiratory_latent
    }

    /// Cardiac output (L/h)
    pub fn cardiac_output(&self) -> f64 {
        sum_layers(&self.flow)
    }
}

fn sum_layers(values: &LayerValues) -> f64 {
    values.core.iter().sum::<f64>()
        + values.muscle.iter().sum::<f64>()
        + values.fat.iter().sum::<f64>()
        + values.skin.iter().sum::<f64>()
}

/// Combines basal metabolism with controller output
pub struct Metabolism;

impl Metabolism {
    pub fn evaluate(
        params: &SegmentParameters,
        condition: &EnvironmentalCondition,
        signals: &ControlSignals,
    ) -> MetabolicState {
        let work = Self::work(params, condition.activity_ratio);

        let mut heat = params.basal_heat;
        let mut flow = params.basal_flow;
        for seg in Segment::ALL {
            let i = seg.index();
            let active = work[i] + signals.shivering[i];
            if seg.has_muscle_and_fat() {
                heat.muscle[i] += active;
                flow.muscle[i] += active / HEAT_PER_FLOW;
            } else {
                heat.core[i] += active;
                flow.core[i] += active / HEAT_PER_FLOW;
            }
            heat.core[i] += signals.non_shivering[i];

            flow.skin[i] = signals.skin_blood_flow[i];
            if seg.is_hand() {
                flow.skin[i] += signals.ava_hand;
            } else if seg.is_foot() {
                flow.skin[i] += signals.ava_foot;
            }
        }

        let total = sum_layers(&heat);
        let (respiratory_sensible, respiratory_latent) = respiration(condition, total);

        MetabolicState {
            heat,
            flow,
            work,
            respiratory_sensible,
            respiratory_latent,
        }
    }

    /// Heat from activity above basal, `(PAR - 1) * BMR` distributed over segments
    pub fn work(params: &SegmentParameters, activity_ratio: f64) -> PerSegment {
        let total = (activity_ratio - 1.0).max(0.0) * params.bmr;
        WORK_DISTRIBUTION.map(|f| f * total)
    }
}

/// Sensible and latent respiratory heat loss (W) for total heat production `m`.
///
/// Inhaled air is taken at head level.
pub fn respiration(condition: &EnvironmentalCondition, m: f64) -> (f64, f64) {
    let air = condition.air_temperature.at(Segment::Head);
    let (p_air, _) = vapor_pressure(air, condition.relative_humidity.at(Segment::Head));
    let sensible = 0.0014 * m * (34.0 - air);
    let latent = 0.0173 * m * (5.87 - p_air);
    (sensible, latent)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ThermoregulationOptions;
    use crate::controller::{ControlInput, ControlMode, Controller, SetPoint};
    use crate::heat_transfer::TransferCoefficients;
    use crate::types::Anthropometrics;

    fn make_state(par: f64) -> (SegmentParameters, MetabolicState) {
        let params = SegmentParameters::from_anthropometrics(&Anthropometrics::default()).unwrap();
        let condition = EnvironmentalCondition::operative(28.0, 50.0, 0.1, par, 0.5, 60.0);
        let set_point = SetPoint {
            core: [37.0; SEGMENT_COUNT],
            skin: [34.0; SEGMENT_COUNT],
        };
        let coefficients =
            TransferCoefficients::compute(&params, &condition, &set_point.skin).unwrap();
        let options = ThermoregulationOptions::default();
        let signals = Controller::evaluate(&ControlInput {
            params: &params,
            coefficients: &coefficients,
            condition: &condition,
            core: &set_point.core,
            skin: &set_point.skin,
            set_point: &set_point,
            options: &options,
            previous_shivering: 0.0,
            dt: 60.0,
            mode: ControlMode::Regulated,
        });
        let state = Metabolism::evaluate(&params, &condition, &signals);
        (params, state)
    }

    #[test]
    fn test_basal_heat_matches_bmr() {
        let (params, state) = make_state(1.0);
        // Layer shares sum to ~1
        assert!((state.total_heat() - params.bmr).abs() / params.bmr < 0.01);
    }

    #[test]
    fn test_work_adds_heat_and_flow() {
        let (params, rest) = make_state(1.0);
        let (_, active) = make_state(2.0);
        let expected = params.bmr * WORK_DISTRIBUTION.iter().sum::<f64>();
        assert!((active.total_heat() - rest.total_heat() - expected).abs() < 1e-9);
        assert!(active.cardiac_output() > rest.cardiac_output());
        // Pelvis work goes to muscle, thigh work to core
        assert!(active.heat.muscle[4] > rest.heat.muscle[4]);
        assert!(active.heat.core[11] > rest.heat.core[11]);
    }

    #[test]
    fn test_ava_joins_extremity_skin_flow() {
        let (params, state) = make_state(1.0);
        let hand = Segment::LeftHand.index();
        assert!(state.flow.skin[hand] > params.basal_flow.skin[hand]);
    }

    #[test]
    fn test_respiration_signs() {
        let hot = EnvironmentalCondition::operative(40.0, 90.0, 0.1, 1.0, 0.5, 60.0);
        let (sensible, _) = respiration(&hot, 100.0);
        assert!(sensible < 0.0);
        let cold = EnvironmentalCondition::operative(10.0, 30.0, 0.1, 1.0, 0.5, 60.0);
        let (sensible, latent) = respiration(&cold, 100.0);
        assert!(sensible > 0.0 && latent > 0.0);
    }
}
