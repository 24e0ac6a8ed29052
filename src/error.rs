//! Error and diagnostic types.
//!
//! Only [`VmcError`] aborts work; [`NonConvergence`] is attached to results as an
//! annotation and left for the caller to judge.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that stop a calculation before (or instead of) sampling.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum VmcError {
    /// A caller-supplied option is outside its domain.
    #[error("invalid configuration: `{option}` {reason}")]
    InvalidConfiguration {
        /// Name of the offending option.
        option: &'static str,
        /// Why the value was rejected.
        reason: String,
    },

    /// Configuration file could not be read.
    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration file is not valid YAML for [`crate::io::VmcConfig`].
    #[error("failed to parse configuration: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl VmcError {
    pub(crate) fn invalid(option: &'static str, reason: impl Into<String>) -> Self {
        VmcError::InvalidConfiguration {
            option,
            reason: reason.into(),
        }
    }
}

/// Reasons a run finished without fully converging.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Error)]
pub enum NonConvergence {
    /// Burn-in ended with the acceptance rate outside the target band.
    #[error("acceptance rate {rate:.3} outside target band at q = {q:.4}")]
    AcceptanceOutOfBand { q: f64, rate: f64 },

    /// Burn-in hit its step cap before the energy plateau was detected.
    #[error("burn-in did not equilibrate within {steps} steps at q = {q:.4}")]
    BurnInNotEquilibrated { q: f64, steps: usize },

    /// The search used its whole iteration budget without resolving a minimum.
    #[error("search exhausted its budget of {iterations} iterations")]
    IterationBudgetExhausted { iterations: usize },
}

pub type Result<T> = std::result::Result<T, VmcError>;
