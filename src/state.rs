//! Mutable simulation state of one body
//!
//! A `BodyState` is owned by exactly one caller and mutated only through the
//! simulator. Segment parameters are shared read-only, so many states built
//! from the same body can be advanced independently.

use crate::controller::SetPoint;
use crate::error::ComputeError;
use crate::geometry::SegmentParameters;
use crate::segments::{Segment, POOL_NODE};
use crate::types::{EnvironmentalCondition, StepOutput};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BodyState {
    /// Identifier of the simulation run this state belongs to
    pub run_id: Uuid,
    /// Wall-clock creation time of the run
    pub created_at: DateTime<Utc>,
    pub(crate) params: Arc<SegmentParameters>,
    pub(crate) temperatures: Vec<f64>,
    pub(crate) set_point: SetPoint,
    pub(crate) elapsed_s: f64,
    pub(crate) previous_shivering: f64,
    pub(crate) last_condition: Option<EnvironmentalCondition>,
    pub(crate) last_output: Option<StepOutput>,
}

impl BodyState {
    pub(crate) fn new(
        params: Arc<SegmentParameters>,
        temperatures: Vec<f64>,
        set_point: SetPoint,
    ) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            created_at: Utc::now(),
            params,
            temperatures,
            set_point,
            elapsed_s: 0.0,
            previous_shivering: 0.0,
            last_condition: None,
            last_output: None,
        }
    }

    pub fn params(&self) -> &SegmentParameters {
        &self.params
    }

    /// Shared handle to the body parameters
    pub fn shared_params(&self) -> Arc<SegmentParameters> {
        Arc::clone(&self.params)
    }

    /// All node temperatures (°C), pool first
    pub fn temperatures(&self) -> &[f64] {
        &self.temperatures
    }

    pub fn set_point(&self) -> &SetPoint {
        &self.set_point
    }

    /// Simulated seconds since initialization
    pub fn elapsed_seconds(&self) -> f64 {
        self.elapsed_s
    }

    pub fn elapsed(&self) -> Duration {
        Duration::milliseconds((self.elapsed_s * 1000.0).round() as i64)
    }

    pub fn last_condition(&self) -> Option<&EnvironmentalCondition> {
        self.last_condition.as_ref()
    }

    pub fn last_output(&self) -> Option<&StepOutput> {
        self.last_output.as_ref()
    }

    pub fn blood_temperature(&self) -> f64 {
        self.temperatures[POOL_NODE]
    }

    pub fn core_temperature(&self, seg: Segment) -> f64 {
        self.temperatures[self.params.nodes.core(seg)]
    }

    pub fn skin_temperature(&self, seg: Segment) -> f64 {
        self.temperatures[self.params.nodes.skin(seg)]
    }

    pub fn muscle_temperature(&self, seg: Segment) -> Option<f64> {
        self.params.nodes.muscle(seg).map(|n| self.temperatures[n])
    }

    pub fn fat_temperature(&self, seg: Segment) -> Option<f64> {
        self.params.nodes.fat(seg).map(|n| self.temperatures[n])
    }

    /// Area-weighted mean skin temperature (°C)
    pub fn mean_skin_temperature(&self) -> f64 {
        mean_skin(&self.params, &self.temperatures)
    }

    /// Capacity-weighted mean core temperature (°C)
    pub fn mean_core_temperature(&self) -> f64 {
        mean_core(&self.params, &self.temperatures)
    }

    /// Load a snapshot from JSON
    pub fn from_json(json: &str) -> Result<Self, ComputeError> {
        let state: Self = serde_json::from_str(json)?;
        state.validate()?;
        Ok(state)
    }

    fn validate(&self) -> Result<(), ComputeError> {
        let nodes = self.params.nodes.len();
        if self.temperatures.len() != nodes || self.params.capacity.len() != nodes {
            return Err(ComputeError::InvalidSnapshot(format!(
                "{} temperatures and {} capacities for {} nodes",
                self.temperatures.len(),
                self.params.capacity.len(),
                nodes
            )));
        }
        if let Some(i) = self.temperatures.iter().position(|t| !t.is_finite()) {
            return Err(ComputeError::InvalidSnapshot(format!(
                "temperature of node {} is not finite",
                i
            )));
        }
        let set_point_finite = self
            .set_point
            .core
            .iter()
            .chain(self.set_point.skin.iter())
            .all(|t| t.is_finite());
        if !set_point_finite {
            return Err(ComputeError::InvalidSnapshot(
                "set-point contains non-finite values".to_string(),
            ));
        }
        if !(self.elapsed_s.is_finite() && self.elapsed_s >= 0.0) {
            return Err(ComputeError::InvalidSnapshot(format!(
                "elapsed time must be finite and non-negative, got {}",
                self.elapsed_s
            )));
        }
        if !(self.previous_shivering.is_finite() && self.previous_shivering >= 0.0) {
            return Err(ComputeError::InvalidSnapshot(format!(
                "previous shivering must be finite and non-negative, got {}",
                self.previous_shivering
            )));
        }
        Ok(())
    }

    /// Export a snapshot as JSON
    pub fn to_json(&self) -> Result<String, ComputeError> {
        Ok(serde_json::to_string(self)?)
    }
}

pub(crate) fn mean_skin(params: &SegmentParameters, temperatures: &[f64]) -> f64 {
    Segment::ALL
        .iter()
        .map(|&seg| params.bsa[seg.index()] * temperatures[params.nodes.skin(seg)])
        .sum::<f64>()
        / params.total_bsa
}

pub(crate) fn mean_core(params: &SegmentParameters, temperatures: &[f64]) -> f64 {
    Segment::ALL
        .iter()
        .map(|&seg| {
            let node = params.nodes.core(seg);
            params.capacity[node] * temperatures[node]
        })
        .sum::<f64>()
        / params.core_capacity()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segments::SEGMENT_COUNT;
    use crate::types::Anthropometrics;
    use pretty_assertions::assert_eq;

    fn make_state() -> BodyState {
        let params =
            Arc::new(SegmentParameters::from_anthropometrics(&Anthropometrics::default()).unwrap());
        let mut temperatures = vec![37.0; params.nodes.len()];
        for seg in Segment::ALL {
            temperatures[params.nodes.skin(seg)] = 34.0;
        }
        let set_point = SetPoint {
            core: [37.0; SEGMENT_COUNT],
            skin: [34.0; SEGMENT_COUNT],
        };
        BodyState::new(params, temperatures, set_point)
    }

    #[test]
    fn test_means() {
        let state = make_state();
        assert!((state.mean_skin_temperature() - 34.0).abs() < 1e-9);
        assert!((state.mean_core_temperature() - 37.0).abs() < 1e-9);
        assert_eq!(state.muscle_temperature(Segment::Head), Some(37.0));
        assert_eq!(state.muscle_temperature(Segment::Chest), None);
    }

    #[test]
    fn test_elapsed_duration() {
        let mut state = make_state();
        state.elapsed_s = 90.5;
        assert_eq!(state.elapsed(), Duration::milliseconds(90_500));
    }

    #[test]
    fn test_snapshot_roundtrip() {
        let state = make_state();
        let json = state.to_json().unwrap();
        let loaded = BodyState::from_json(&json).unwrap();
        assert_eq!(loaded.run_id, state.run_id);
        assert_eq!(loaded.temperatures(), state.temperatures());
        assert_eq!(loaded.set_point(), state.set_point());
    }

    #[test]
    fn test_snapshot_rejects_inconsistent_state() {
        let mut short = make_state();
        short.temperatures.pop();
        assert!(matches!(
            BodyState::from_json(&short.to_json().unwrap()),
            Err(ComputeError::InvalidSnapshot(_))
        ));

        let mut rewound = make_state();
        rewound.elapsed_s = -60.0;
        assert!(matches!(
            BodyState::from_json(&rewound.to_json().unwrap()),
            Err(ComputeError::InvalidSnapshot(_))
        ));

        // Non-finite numbers serialize as null and fail to parse
        let mut broken = make_state();
        broken.set_point.core[0] = f64::NAN;
        assert!(matches!(
            BodyState::from_json(&broken.to_json().unwrap()),
            Err(ComputeError::JsonError(_))
        ));

        assert!(matches!(
            BodyState::from_json("{\"run_id\": 1}"),
            Err(ComputeError::JsonError(_))
        ));
    }
}
