//! Thermoreg - multi-segment human thermoregulation simulator
//!
//! Thermoreg computes the transient temperature distribution of a human body
//! exposed to a sequence of environmental conditions. The body is split into
//! 17 segments with core, muscle, fat and skin layers around a central blood
//! pool. Each step is integrated with an implicit (backward Euler) scheme while
//! a closed-loop controller drives vasomotion, sweating, shivering and
//! non-shivering thermogenesis.
//!
//! ## Usage
//!
//! ```no_run
//! use thermoreg::{Anthropometrics, EnvironmentalCondition, Sex, Simulator};
//!
//! let sim = Simulator::default();
//! let mut state = sim.initialize(&Anthropometrics::new(1.7, 60.0, 30.0, Sex::Male))?;
//! let hot = EnvironmentalCondition::operative(34.0, 60.0, 0.1, 1.2, 0.5, 1800.0);
//! let out = sim.step(&mut state, &hot, hot.duration_s)?;
//! println!("core {:.2} °C, sweat {:.0} g/h", out.mean_core_temperature, out.sweat_rate);
//! # Ok::<(), thermoreg::ComputeError>(())
//! ```
//!
//! ## Modules
//!
//! - **Body model**: segment layout, geometry and passive properties
//! - **Transfer and control**: environment coefficients, thermoregulatory controller, metabolism
//! - **Integration**: energy-balance assembly, dense solver, implicit sub-step integrator
//! - **Driver**: scalar simulator, body state, batch cohorts

pub mod assembler;
pub mod cohort;
pub mod config;
pub mod controller;
pub mod error;
pub mod geometry;
pub mod heat_transfer;
pub mod integrator;
pub mod metabolism;
pub mod psychrometrics;
pub mod segments;
pub mod simulator;
pub mod solver;
pub mod state;
pub mod types;

pub use cohort::Cohort;
pub use config::{SolverConfig, ThermoregulationOptions};
pub use error::ComputeError;
pub use geometry::SegmentParameters;
pub use segments::{Layer, Segment};
pub use simulator::Simulator;
pub use state::BodyState;
pub use types::{
    Anthropometrics, BmrEquation, BsaEquation, Clothing, ConvergenceStatus,
    EnvironmentalCondition, ExternalHeat, Posture, SegmentValue, Sex, StepOutput,
};

/// Crate version recorded alongside simulation snapshots
pub const THERMOREG_VERSION: &str = env!("CARGO_PKG_VERSION");
