//! Implicit time integration of one sub-step
//!
//! The controller depends on the end-of-step temperatures, so each sub-step
//! runs a relaxed fixed-point iteration: evaluate control at the current
//! guess, assemble and solve the linear backward Euler system, then move the
//! guess toward the solution. The committed temperatures are always the last
//! linear solution, which keeps the energy balance of the step exact even when
//! the iteration cap is reached.

use crate::assembler::Assembler;
use crate::config::SolverConfig;
use crate::controller::{ControlInput, ControlMode, ControlSignals, Controller, SetPoint};
use crate::error::ComputeError;
use crate::geometry::SegmentParameters;
use crate::heat_transfer::TransferCoefficients;
use crate::metabolism::{MetabolicState, Metabolism};
use crate::segments::{Segment, SEGMENT_COUNT};
use crate::solver::solve_dense;
use crate::types::{EnvironmentalCondition, HeatBalance};

/// Temperatures outside this range (°C) end the step with a physiological limit error
pub const PHYSIOLOGICAL_RANGE: (f64, f64) = (0.0, 45.0);

/// Fixed inputs of one sub-step
#[derive(Debug, Clone, Copy)]
pub struct StepContext<'a> {
    pub params: &'a SegmentParameters,
    pub condition: &'a EnvironmentalCondition,
    pub set_point: &'a SetPoint,
    pub config: &'a SolverConfig,
    pub previous_shivering: f64,
    pub dt: f64,
    pub mode: ControlMode,
}

/// State carried between inner iterations
#[derive(Debug, Clone, PartialEq)]
pub struct IterationState {
    pub guess: Vec<f64>,
    pub iteration: usize,
    /// Largest |solution - guess| of the last iteration (°C)
    pub residual: f64,
}

impl IterationState {
    pub fn new(start: &[f64]) -> Self {
        Self {
            guess: start.to_vec(),
            iteration: 0,
            residual: f64::INFINITY,
        }
    }

    /// Relaxed update toward `solution`
    pub fn relax(&self, solution: &[f64], relaxation: f64) -> Self {
        let residual = solution
            .iter()
            .zip(self.guess.iter())
            .map(|(s, g)| (s - g).abs())
            .fold(0.0, f64::max);
        let guess = solution
            .iter()
            .zip(self.guess.iter())
            .map(|(s, g)| g + relaxation * (s - g))
            .collect();
        Self {
            guess,
            iteration: self.iteration + 1,
            residual,
        }
    }
}

/// Result of a completed sub-step
#[derive(Debug, Clone)]
pub struct SubstepResult {
    pub temperatures: Vec<f64>,
    pub signals: ControlSignals,
    pub metabolic: MetabolicState,
    pub balance: HeatBalance,
    pub iterations: usize,
    pub residual: f64,
    pub converged: bool,
}

struct Evaluation {
    solution: Vec<f64>,
    signals: ControlSignals,
    metabolic: MetabolicState,
}

/// Advance `start` by `ctx.dt` seconds
pub fn advance(
    ctx: &StepContext,
    coefficients: &TransferCoefficients,
    start: &[f64],
) -> Result<SubstepResult, ComputeError> {
    let mut state = IterationState::new(start);
    loop {
        let eval = evaluate(ctx, coefficients, start, &state.guess)?;
        state = state.relax(&eval.solution, ctx.config.relaxation);

        let converged = state.residual < ctx.config.tolerance;
        if converged || state.iteration >= ctx.config.max_iterations {
            check_range(&eval.solution)?;
            let respiratory = eval.metabolic.respiratory_loss();
            let balance = Assembler::heat_balance(
                ctx.params,
                coefficients,
                &eval.metabolic,
                &eval.signals,
                respiratory,
                &ctx.condition.external_heat,
                start,
                &eval.solution,
                ctx.dt,
            );
            return Ok(SubstepResult {
                temperatures: eval.solution,
                signals: eval.signals,
                metabolic: eval.metabolic,
                balance,
                iterations: state.iteration,
                residual: state.residual,
                converged,
            });
        }
    }
}

fn evaluate(
    ctx: &StepContext,
    coefficients: &TransferCoefficients,
    start: &[f64],
    guess: &[f64],
) -> Result<Evaluation, ComputeError> {
    let (core, skin) = core_and_skin(ctx.params, guess);
    let signals = Controller::evaluate(&ControlInput {
        params: ctx.params,
        coefficients,
        condition: ctx.condition,
        core: &core,
        skin: &skin,
        set_point: ctx.set_point,
        options: &ctx.config.options,
        previous_shivering: ctx.previous_shivering,
        dt: ctx.dt,
        mode: ctx.mode,
    });
    let metabolic = Metabolism::evaluate(ctx.params, ctx.condition, &signals);
    let system = Assembler::assemble(
        ctx.params,
        coefficients,
        &metabolic,
        &signals,
        metabolic.respiratory_loss(),
        &ctx.condition.external_heat,
        start,
        ctx.dt,
    );
    let solution = solve_dense(system.matrix, system.rhs)?;
    Ok(Evaluation {
        solution,
        signals,
        metabolic,
    })
}

/// Per-segment core and skin temperatures of a node vector
pub fn core_and_skin(
    params: &SegmentParameters,
    temperatures: &[f64],
) -> ([f64; SEGMENT_COUNT], [f64; SEGMENT_COUNT]) {
    let mut core = [0.0; SEGMENT_COUNT];
    let mut skin = [0.0; SEGMENT_COUNT];
    for seg in Segment::ALL {
        core[seg.index()] = temperatures[params.nodes.core(seg)];
        skin[seg.index()] = temperatures[params.nodes.skin(seg)];
    }
    (core, skin)
}

fn check_range(temperatures: &[f64]) -> Result<(), ComputeError> {
    if let Some(i) = temperatures.iter().position(|t| !t.is_finite()) {
        return Err(ComputeError::NumericalFault(format!(
            "non-finite temperature {} at node {}",
            temperatures[i], i
        )));
    }
    let (low, high) = PHYSIOLOGICAL_RANGE;
    match temperatures.iter().position(|t| *t < low || *t > high) {
        Some(i) => Err(ComputeError::PhysiologicalLimit(format!(
            "node {} temperature {:.2} °C outside [{}, {}] °C",
            i, temperatures[i], low, high
        ))),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Anthropometrics;

    fn make_start(params: &SegmentParameters) -> Vec<f64> {
        let mut t = vec![36.9; params.nodes.len()];
        for seg in Segment::ALL {
            t[params.nodes.skin(seg)] = 34.0;
        }
        t
    }

    fn run(air: f64, config: &SolverConfig) -> SubstepResult {
        let params = SegmentParameters::from_anthropometrics(&Anthropometrics::default()).unwrap();
        let start = make_start(&params);
        let (core, skin) = core_and_skin(&params, &start);
        let set_point = SetPoint { core, skin };
        let condition = EnvironmentalCondition::operative(air, 50.0, 0.1, 1.0, 0.3, 60.0);
        let coefficients = TransferCoefficients::compute(&params, &condition, &skin).unwrap();
        let ctx = StepContext {
            params: &params,
            condition: &condition,
            set_point: &set_point,
            config,
            previous_shivering: 0.0,
            dt: 60.0,
            mode: ControlMode::Regulated,
        };
        advance(&ctx, &coefficients, &start).unwrap()
    }

    #[test]
    fn test_relax_update() {
        let state = IterationState::new(&[0.0, 0.0]);
        let next = state.relax(&[1.0, -2.0], 0.5);
        assert_eq!(next.iteration, 1);
        assert!((next.residual - 2.0).abs() < 1e-12);
        assert!((next.guess[0] - 0.5).abs() < 1e-12);
        assert!((next.guess[1] + 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_substep_converges() {
        let result = run(20.0, &SolverConfig::default());
        assert!(result.converged);
        assert!(result.residual < SolverConfig::default().tolerance);
        let scale = result.balance.production.abs();
        assert!(result.balance.residual().abs() / scale < 1e-9);
    }

    #[test]
    fn test_iteration_cap_degrades() {
        let config = SolverConfig::default()
            .with_tolerance(1e-15)
            .with_max_iterations(2);
        let result = run(10.0, &config);
        assert!(!result.converged);
        assert_eq!(result.iterations, 2);
        // Committed solution still conserves energy
        let scale = result.balance.production.abs();
        assert!(result.balance.residual().abs() / scale < 1e-9);
    }

    #[test]
    fn test_range_check() {
        assert!(check_range(&[36.0, 34.0]).is_ok());
        assert!(matches!(
            check_range(&[36.0, f64::NAN]),
            Err(ComputeError::NumericalFault(_))
        ));
        assert!(matches!(
            check_range(&[36.0, f64::INFINITY]),
            Err(ComputeError::NumericalFault(_))
        ));
        assert!(matches!(
            check_range(&[50.0]),
            Err(ComputeError::PhysiologicalLimit(_))
        ));
        assert!(matches!(
            check_range(&[36.0, -1.0]),
            Err(ComputeError::PhysiologicalLimit(_))
        ));
    }
}
