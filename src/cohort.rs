//! Batch stepping of a fixed-size group of bodies
//!
//! A cohort advances N independent body states through the same condition.
//! The condition is validated once for the whole group. With the `parallel`
//! feature the members are stepped on the rayon thread pool.

use crate::error::ComputeError;
use crate::simulator::Simulator;
use crate::state::BodyState;
use crate::types::{validate_duration, Anthropometrics, EnvironmentalCondition, StepOutput};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

#[derive(Debug, Clone)]
pub struct Cohort<const N: usize> {
    simulator: Simulator,
    members: [BodyState; N],
}

impl<const N: usize> Cohort<N> {
    pub fn new(simulator: Simulator, members: [BodyState; N]) -> Self {
        Self { simulator, members }
    }

    /// Initialize one state per body description
    pub fn initialize(
        simulator: Simulator,
        bodies: &[Anthropometrics; N],
    ) -> Result<Self, ComputeError> {
        let states = bodies
            .iter()
            .map(|body| simulator.initialize(body))
            .collect::<Result<Vec<_>, _>>()?;
        let members = to_array(states)?;
        Ok(Self { simulator, members })
    }

    pub fn members(&self) -> &[BodyState; N] {
        &self.members
    }

    pub fn simulator(&self) -> &Simulator {
        &self.simulator
    }

    /// Advance every member; either all members move or none do
    pub fn step_all(
        &mut self,
        condition: &EnvironmentalCondition,
        duration_s: f64,
    ) -> Result<[StepOutput; N], ComputeError> {
        condition.validate()?;
        validate_duration(duration_s)?;

        let mut working = self.members.clone();
        let outputs = self.step_members(&mut working, condition, duration_s)?;
        let outputs = to_array(outputs)?;
        self.members = working;
        Ok(outputs)
    }

    #[cfg(not(feature = "parallel"))]
    fn step_members(
        &self,
        members: &mut [BodyState],
        condition: &EnvironmentalCondition,
        duration_s: f64,
    ) -> Result<Vec<StepOutput>, ComputeError> {
        members
            .iter_mut()
            .map(|state| self.simulator.step_validated(state, condition, duration_s))
            .collect()
    }

    #[cfg(feature = "parallel")]
    fn step_members(
        &self,
        members: &mut [BodyState],
        condition: &EnvironmentalCondition,
        duration_s: f64,
    ) -> Result<Vec<StepOutput>, ComputeError> {
        members
            .par_iter_mut()
            .map(|state| self.simulator.step_validated(state, condition, duration_s))
            .collect()
    }
}

fn to_array<T, const N: usize>(items: Vec<T>) -> Result<[T; N], ComputeError> {
    let len = items.len();
    items.try_into().map_err(|_| {
        ComputeError::InvalidConfig(format!("expected {} cohort members, got {}", N, len))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{SegmentValue, Sex};
    use pretty_assertions::assert_eq;

    fn make_cohort() -> Cohort<2> {
        let bodies = [
            Anthropometrics::new(1.7, 60.0, 30.0, Sex::Male),
            Anthropometrics::new(1.6, 55.0, 65.0, Sex::Female),
        ];
        Cohort::initialize(Simulator::default(), &bodies).unwrap()
    }

    #[test]
    fn test_matches_scalar_path() {
        let mut cohort = make_cohort();
        let mut single = cohort.members()[1].clone();
        let cond = EnvironmentalCondition::operative(15.0, 50.0, 0.2, 1.1, 0.8, 600.0);

        let batch = cohort.step_all(&cond, 600.0).unwrap();
        let scalar = cohort.simulator().clone().step(&mut single, &cond, 600.0).unwrap();

        assert_eq!(batch[1], scalar);
        assert_eq!(cohort.members()[1].temperatures(), single.temperatures());
    }

    #[test]
    fn test_invalid_condition_rejected_once() {
        let mut cohort = make_cohort();
        let mut cond = EnvironmentalCondition::operative(15.0, 50.0, 0.2, 1.1, 0.8, 600.0);
        cond.air_speed = SegmentValue::Uniform(f64::NAN);
        assert!(cohort.step_all(&cond, 600.0).is_err());
        assert!(cohort.members().iter().all(|m| m.elapsed_seconds() == 0.0));
    }
}
