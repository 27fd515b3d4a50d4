//! Simulation driver
//!
//! The [`Simulator`] builds body states, establishes their thermoregulatory
//! set-points and advances them through environmental conditions.
//!
//! ## Set-point
//!
//! Set-points come from a passive reset: the body is exposed to the reference
//! (thermoneutral) condition with every effector held at its basal level, using
//! very long time steps until temperatures stop changing. The resulting
//! steady-state core and skin temperatures become the set-point, so a body kept
//! at the reference condition stays where it is.
//!
//! ## Atomic steps
//!
//! A step runs on a working copy of the temperatures and is committed only when
//! every sub-step succeeded. Invalid input, an exposure that drives a node out
//! of the physiological range, or a numerical fault leaves the state untouched.
//!
//! Steps are split into sub-steps of at most `max_substep_s`, up to
//! `max_substeps` of them. Longer steps stretch the sub-steps instead, which
//! the implicit scheme tolerates, so every step is a bounded computation.

use crate::config::SolverConfig;
use crate::controller::{ControlMode, SetPoint};
use crate::error::ComputeError;
use crate::geometry::SegmentParameters;
use crate::heat_transfer::TransferCoefficients;
use crate::integrator::{advance, core_and_skin, StepContext, SubstepResult};
use crate::segments::{Segment, POOL_NODE};
use crate::state::{mean_core, mean_skin, BodyState};
use crate::types::{
    validate_duration, Anthropometrics, Convergence, ConvergenceStatus, EnvironmentalCondition,
    HeatBalance, SegmentOutput, StepOutput,
};
use std::sync::Arc;

/// Initial temperature of every node before the set-point reset (°C)
pub const INITIAL_TEMPERATURE: f64 = 36.0;

/// Latent heat of evaporation of sweat (J/g)
pub const LATENT_HEAT: f64 = 2418.0;

/// Time step of the passive set-point reset (s)
const RESET_STEP_S: f64 = 60_000.0;

/// Reset stops when no node changes by more than this over one pass (°C)
const RESET_TOLERANCE: f64 = 1e-9;

const MAX_RESET_PASSES: usize = 200;

// Reference condition apart from the operative temperature
const REFERENCE_HUMIDITY: f64 = 50.0;
const REFERENCE_AIR_SPEED: f64 = 0.1;
const REFERENCE_ACTIVITY: f64 = 1.25;
const REFERENCE_CLO: f64 = 0.0;

#[derive(Debug, Clone, Default)]
pub struct Simulator {
    config: SolverConfig,
}

impl Simulator {
    pub fn new(config: SolverConfig) -> Result<Self, ComputeError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    /// The reference condition used to establish set-points
    pub fn thermoneutral_condition(&self, duration_s: f64) -> EnvironmentalCondition {
        EnvironmentalCondition::operative(
            self.config.reference_operative_temperature,
            REFERENCE_HUMIDITY,
            REFERENCE_AIR_SPEED,
            REFERENCE_ACTIVITY,
            REFERENCE_CLO,
            duration_s,
        )
    }

    /// Build a body state at its thermoneutral steady state
    pub fn initialize(&self, body: &Anthropometrics) -> Result<BodyState, ComputeError> {
        let params = Arc::new(SegmentParameters::from_anthropometrics(body)?);
        let temperatures = self.reset_set_point(&params)?;
        let (core, skin) = core_and_skin(&params, &temperatures);
        Ok(BodyState::new(params, temperatures, SetPoint { core, skin }))
    }

    fn reset_set_point(&self, params: &SegmentParameters) -> Result<Vec<f64>, ComputeError> {
        let reference = self.thermoneutral_condition(RESET_STEP_S);
        let reset_config = SolverConfig {
            tolerance: RESET_TOLERANCE * 0.1,
            max_iterations: 200,
            relaxation: 1.0,
            ..self.config.clone()
        };

        let mut temperatures = vec![INITIAL_TEMPERATURE; params.nodes.len()];
        for pass in 1..=MAX_RESET_PASSES {
            let (core, skin) = core_and_skin(params, &temperatures);
            let set_point = SetPoint { core, skin };
            let coefficients = TransferCoefficients::compute(params, &reference, &set_point.skin)?;
            let ctx = StepContext {
                params,
                condition: &reference,
                set_point: &set_point,
                config: &reset_config,
                previous_shivering: 0.0,
                dt: RESET_STEP_S,
                mode: ControlMode::Passive,
            };
            let result = advance(&ctx, &coefficients, &temperatures)?;
            let change = max_change(&temperatures, &result.temperatures);
            temperatures = result.temperatures;

            if change < RESET_TOLERANCE {
                log::info!(
                    "set-point reset converged after {} passes, mean core {:.3} °C, mean skin {:.3} °C",
                    pass,
                    mean_core(params, &temperatures),
                    mean_skin(params, &temperatures)
                );
                return Ok(temperatures);
            }
        }

        log::warn!(
            "set-point reset did not settle within {} passes; using last state",
            MAX_RESET_PASSES
        );
        Ok(temperatures)
    }

    /// Advance `state` through `condition` for `duration_s` seconds
    pub fn step(
        &self,
        state: &mut BodyState,
        condition: &EnvironmentalCondition,
        duration_s: f64,
    ) -> Result<StepOutput, ComputeError> {
        condition.validate()?;
        validate_duration(duration_s)?;
        self.step_validated(state, condition, duration_s)
    }

    /// Step with inputs that were already validated by the caller
    pub(crate) fn step_validated(
        &self,
        state: &mut BodyState,
        condition: &EnvironmentalCondition,
        duration_s: f64,
    ) -> Result<StepOutput, ComputeError> {
        let params = Arc::clone(&state.params);
        let wanted = ((duration_s / self.config.max_substep_s).ceil() as usize).max(1);
        let substeps = wanted.min(self.config.max_substeps);
        let dt = duration_s / substeps as f64;
        if substeps < wanted {
            log::info!(
                "run {}: {} s step capped at {} sub-steps of {:.1} s",
                state.run_id,
                duration_s,
                substeps,
                dt
            );
        }

        let mut temperatures = state.temperatures.clone();
        let mut previous_shivering = state.previous_shivering;
        let mut balance = HeatBalance::default();
        let mut worst_iterations = 0;
        let mut worst_residual: f64 = 0.0;
        let mut degraded = false;
        let mut last: Option<SubstepResult> = None;

        for k in 0..substeps {
            let (_, skin) = core_and_skin(&params, &temperatures);
            let coefficients = TransferCoefficients::compute(&params, condition, &skin)?;
            let ctx = StepContext {
                params: &params,
                condition,
                set_point: &state.set_point,
                config: &self.config,
                previous_shivering,
                dt,
                mode: ControlMode::Regulated,
            };
            let result = advance(&ctx, &coefficients, &temperatures)?;
            log::debug!(
                "sub-step {}/{}: {} iterations, residual {:.2e}",
                k + 1,
                substeps,
                result.iterations,
                result.residual
            );

            balance.accumulate(&result.balance);
            worst_iterations = worst_iterations.max(result.iterations);
            worst_residual = worst_residual.max(result.residual);
            degraded |= !result.converged;
            previous_shivering = result.signals.shivering_signal;
            temperatures = result.temperatures.clone();
            last = Some(result);
        }

        let last = last.ok_or_else(|| {
            ComputeError::InvalidDuration(format!("no sub-steps for duration {}", duration_s))
        })?;

        let status = if degraded {
            log::warn!(
                "run {}: inner iteration hit the cap of {} (residual {:.2e} °C); step flagged degraded",
                state.run_id,
                self.config.max_iterations,
                worst_residual
            );
            ConvergenceStatus::Degraded
        } else {
            ConvergenceStatus::Converged
        };

        let elapsed_s = state.elapsed_s + duration_s;
        let output = build_output(
            &params,
            &temperatures,
            &last,
            balance,
            Convergence {
                status,
                iterations: worst_iterations,
                residual: worst_residual,
                substeps,
            },
            elapsed_s,
        );

        state.temperatures = temperatures;
        state.elapsed_s = elapsed_s;
        state.previous_shivering = previous_shivering;
        state.last_condition = Some(condition.clone());
        state.last_output = Some(output.clone());
        Ok(output)
    }

    /// Step through a sequence of conditions, each for its own duration.
    ///
    /// The whole sequence is validated first and committed only if every step
    /// succeeds.
    pub fn run(
        &self,
        state: &mut BodyState,
        conditions: &[EnvironmentalCondition],
    ) -> Result<Vec<StepOutput>, ComputeError> {
        for condition in conditions {
            condition.validate()?;
            validate_duration(condition.duration_s)?;
        }

        let mut working = state.clone();
        let outputs = conditions
            .iter()
            .map(|condition| self.step_validated(&mut working, condition, condition.duration_s))
            .collect::<Result<Vec<_>, _>>()?;
        *state = working;
        Ok(outputs)
    }
}

fn max_change(before: &[f64], after: &[f64]) -> f64 {
    before
        .iter()
        .zip(after.iter())
        .map(|(a, b)| (a - b).abs())
        .fold(0.0, f64::max)
}

fn build_output(
    params: &SegmentParameters,
    temperatures: &[f64],
    last: &SubstepResult,
    heat_balance: HeatBalance,
    convergence: Convergence,
    elapsed_s: f64,
) -> StepOutput {
    let signals = &last.signals;
    let nodes = &params.nodes;

    let segments = Segment::ALL
        .iter()
        .map(|&seg| {
            let i = seg.index();
            SegmentOutput {
                segment: seg,
                core: temperatures[nodes.core(seg)],
                muscle: nodes.muscle(seg).map(|n| temperatures[n]),
                fat: nodes.fat(seg).map(|n| temperatures[n]),
                skin: temperatures[nodes.skin(seg)],
                wettedness: signals.wettedness[i],
                skin_blood_flow: last.metabolic.flow.skin[i],
                vasomotor: signals.vasomotor[i],
            }
        })
        .collect();

    let mean_wettedness = signals
        .wettedness
        .iter()
        .zip(params.bsa.iter())
        .map(|(w, a)| w * a)
        .sum::<f64>()
        / params.total_bsa;
    let evaporative_heat_loss: f64 = signals.evaporation.iter().sum();
    let sweat_heat_loss: f64 = signals.sweat_evaporation.iter().sum();
    let water_heat_loss = evaporative_heat_loss + last.metabolic.respiratory_latent;

    StepOutput {
        elapsed_s,
        mean_core_temperature: mean_core(params, temperatures),
        mean_skin_temperature: mean_skin(params, temperatures),
        blood_temperature: temperatures[POOL_NODE],
        segments,
        mean_wettedness,
        sweat_rate: sweat_heat_loss / LATENT_HEAT * 3600.0,
        evaporative_water_loss: water_heat_loss / LATENT_HEAT * 3600.0,
        sweat_heat_loss,
        evaporative_heat_loss,
        shivering: signals.shivering.iter().sum(),
        non_shivering: signals.non_shivering.iter().sum(),
        thermogenesis: last.metabolic.total_heat(),
        respiratory_heat_loss: last.metabolic.respiratory_loss(),
        cardiac_output: last.metabolic.cardiac_output(),
        heat_balance,
        convergence,
    }
}
