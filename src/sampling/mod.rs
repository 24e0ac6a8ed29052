//! Sampling module - Metropolis sampling, energy statistics and the variational search.

mod accumulator;
mod metropolis;
mod optimize;
mod traits;

pub use accumulator::{
    BlockingAnalysis, BlockingLevel, EnergyAccumulator, EnergySample, RunStatistics, Welford, MIN_BLOCKS,
};
pub use metropolis::{
    acceptance_probability, ChainDiagnostics, Equilibration, MetropolisSampler, Proposal, Sample, SamplerParams,
    SamplerPhase, StepAdaptation, WalkerState,
};
pub use optimize::{
    CandidateResult, OptimizationResult, OptimizerParams, QuadraticFit, SearchStrategy, TerminationReason,
    VariationalOptimizer,
};
pub use traits::EnergyCalculator;
