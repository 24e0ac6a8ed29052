//! Helium VMC - Variational Monte Carlo for the helium atom in Rust
//!
//! Estimates the ground-state energy of a two-electron atom with a
//! product-of-hydrogenic-orbitals trial wavefunction. A Metropolis walker
//! samples |Ψ|², local energies are folded into blocking-corrected statistics,
//! and the effective nuclear charge `q` is scanned or searched for the minimum.

pub mod error;
pub mod wavefunction;
pub mod systems;
pub mod sampling;
pub mod io;

#[cfg(test)]
mod tests;

// Re-export commonly used types at crate root
pub use error::{NonConvergence, VmcError};
pub use wavefunction::{ElectronPair, PairWfn, SingleWfn, Slater1s, DISTANCE_FLOOR};
pub use systems::{HeliumTrial, LocalEnergy, NUCLEAR_CHARGE};
pub use sampling::{
    acceptance_probability, CandidateResult, ChainDiagnostics, EnergyAccumulator, EnergyCalculator, EnergySample,
    Equilibration, MetropolisSampler, OptimizationResult, OptimizerParams, Proposal, QuadraticFit, RunStatistics,
    Sample, SamplerParams, SamplerPhase, SearchStrategy, StepAdaptation, TerminationReason, VariationalOptimizer,
};
pub use io::{parse_config, read_config, VmcConfig};
