//! Error types for the thermoregulation simulator

use thiserror::Error;

/// Errors that can occur while building or advancing a body model
#[derive(Debug, Error)]
pub enum ComputeError {
    #[error("Invalid anthropometrics: {0}")]
    InvalidAnthropometrics(String),

    #[error("Invalid environmental condition: {0}")]
    InvalidCondition(String),

    #[error("Invalid step duration: {0}")]
    InvalidDuration(String),

    #[error("Invalid solver configuration: {0}")]
    InvalidConfig(String),

    #[error("Singular energy-balance system: {0}")]
    SingularSystem(String),

    /// A node left the physiological temperature range; the body cannot
    /// survive the exposure and the model is no longer meaningful
    #[error("Physiological limit exceeded: {0}")]
    PhysiologicalLimit(String),

    #[error("Numerical fault: {0}")]
    NumericalFault(String),

    #[error("Invalid snapshot: {0}")]
    InvalidSnapshot(String),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),
}
