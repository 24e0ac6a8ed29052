//! Variational search over the effective nuclear charge `q`.
//!
//! Every candidate `q` gets `n_chains` fresh, independently seeded Metropolis
//! chains. Their statistics are merged and the candidate with the lowest mean
//! energy is selected. Chains are independent, so they run in parallel with
//! rayon; results are gathered in submission order, which keeps a seeded search
//! reproducible regardless of thread count.

use nalgebra::{Matrix3, Vector3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{NonConvergence, Result, VmcError};
use crate::systems::HeliumTrial;
use super::accumulator::{EnergyAccumulator, RunStatistics};
use super::metropolis::{ChainDiagnostics, MetropolisSampler, SamplerParams};

/// Which `q` values to evaluate.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SearchStrategy {
    /// Explicit list, evaluated in order.
    List { values: Vec<f64> },
    /// `count` evenly spaced values `start, start + step, ...`.
    Scan { start: f64, step: f64, count: usize },
    /// Golden-section search on `[lower, upper]`.
    GoldenSection { lower: f64, upper: f64, max_iterations: usize },
}

impl Default for SearchStrategy {
    fn default() -> Self {
        SearchStrategy::Scan {
            start: 1.25,
            step: 0.05,
            count: 15,
        }
    }
}

fn check_charge(option: &'static str, q: f64) -> Result<()> {
    if q.is_finite() && q > 0.0 {
        Ok(())
    } else {
        Err(VmcError::invalid(option, format!("effective charge must be positive, got {q}")))
    }
}

impl SearchStrategy {
    pub fn validate(&self) -> Result<()> {
        match self {
            SearchStrategy::List { values } => {
                if values.is_empty() {
                    return Err(VmcError::invalid("strategy.values", "must name at least one q"));
                }
                values.iter().try_for_each(|&q| check_charge("strategy.values", q))
            }
            SearchStrategy::Scan { start, step, count } => {
                if *count == 0 {
                    return Err(VmcError::invalid("strategy.count", "must be at least 1"));
                }
                if !(step.is_finite() && *step > 0.0) {
                    return Err(VmcError::invalid("strategy.step", format!("must be positive, got {step}")));
                }
                check_charge("strategy.start", *start)
            }
            SearchStrategy::GoldenSection { lower, upper, max_iterations } => {
                check_charge("strategy.lower", *lower)?;
                check_charge("strategy.upper", *upper)?;
                if lower >= upper {
                    return Err(VmcError::invalid("strategy.upper", format!("must exceed lower ({lower})")));
                }
                if *max_iterations == 0 {
                    return Err(VmcError::invalid("strategy.max_iterations", "must be at least 1"));
                }
                Ok(())
            }
        }
    }

    /// The fixed candidate set, or `None` for an adaptive search.
    pub fn candidates(&self) -> Option<Vec<f64>> {
        match self {
            SearchStrategy::List { values } => Some(values.clone()),
            SearchStrategy::Scan { start, step, count } => {
                Some((0..*count).map(|i| start + i as f64 * step).collect())
            }
            SearchStrategy::GoldenSection { .. } => None,
        }
    }
}

/// Search-level options.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerParams {
    pub strategy: SearchStrategy,
    /// Independent chains per candidate.
    pub n_chains: usize,
    /// Master seed; fresh entropy when absent.
    pub seed: Option<u64>,
    /// Standard errors by which two energies must differ to count as distinct.
    pub significance: f64,
}

impl Default for OptimizerParams {
    fn default() -> Self {
        Self {
            strategy: SearchStrategy::default(),
            n_chains: 1,
            seed: None,
            significance: 1.0,
        }
    }
}

impl OptimizerParams {
    pub fn validate(&self) -> Result<()> {
        self.strategy.validate()?;
        if self.n_chains == 0 {
            return Err(VmcError::invalid("n_chains", "must be at least 1"));
        }
        if !(self.significance.is_finite() && self.significance > 0.0) {
            return Err(VmcError::invalid(
                "significance",
                format!("must be positive, got {}", self.significance),
            ));
        }
        Ok(())
    }
}

/// Merged statistics for one `q`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CandidateResult {
    pub q: f64,
    pub stats: RunStatistics,
    pub chains: Vec<ChainDiagnostics>,
}

impl CandidateResult {
    pub fn energy(&self) -> f64 {
        self.stats.mean
    }

    pub fn error(&self) -> f64 {
        self.stats.error
    }
}

/// Why the search stopped.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminationReason {
    /// Every candidate of a fixed list or scan was evaluated.
    Exhausted,
    /// The bracketing candidates could no longer be told apart statistically.
    Indistinguishable,
    /// The iteration budget ran out first.
    IterationBudget,
}

/// Weighted least-squares fit E(q) ≈ a q² + b q + c.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QuadraticFit {
    pub a: f64,
    pub b: f64,
    pub c: f64,
}

impl QuadraticFit {
    /// Fit with weights 1/σ². Needs at least three distinct `q`.
    pub fn fit(points: &[CandidateResult]) -> Option<QuadraticFit> {
        let mut distinct: Vec<f64> = points.iter().map(|p| p.q).collect();
        distinct.sort_by(f64::total_cmp);
        distinct.dedup();
        if distinct.len() < 3 {
            return None;
        }

        let mut normal = Matrix3::<f64>::zeros();
        let mut rhs = Vector3::<f64>::zeros();
        for point in points {
            let weight = if point.error() > 0.0 { point.error().powi(-2) } else { 1.0 };
            let x = Vector3::new(point.q * point.q, point.q, 1.0);
            normal += weight * x * x.transpose();
            rhs += weight * point.energy() * x;
        }
        let coeffs = normal.lu().solve(&rhs)?;
        Some(QuadraticFit {
            a: coeffs[0],
            b: coeffs[1],
            c: coeffs[2],
        })
    }

    pub fn evaluate(&self, q: f64) -> f64 {
        (self.a * q + self.b) * q + self.c
    }

    /// Vertex (q, E) when the parabola opens upward.
    pub fn minimum(&self) -> Option<(f64, f64)> {
        if self.a > 0.0 {
            let q = -self.b / (2.0 * self.a);
            Some((q, self.evaluate(q)))
        } else {
            None
        }
    }
}

/// Outcome of one optimisation pass.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OptimizationResult {
    /// Candidates in evaluation order.
    pub candidates: Vec<CandidateResult>,
    /// Index into `candidates` of the lowest mean energy.
    pub best_index: usize,
    pub termination: TerminationReason,
    pub fit: Option<QuadraticFit>,
    pub warnings: Vec<NonConvergence>,
}

impl OptimizationResult {
    pub fn best(&self) -> &CandidateResult {
        &self.candidates[self.best_index]
    }

    pub fn converged(&self) -> bool {
        self.warnings.is_empty()
    }

    /// `(q, energy, error)` sorted by `q`, ready for plotting.
    pub fn curve(&self) -> Vec<(f64, f64, f64)> {
        let mut curve: Vec<_> = self.candidates.iter().map(|c| (c.q, c.energy(), c.error())).collect();
        curve.sort_by(|a, b| a.0.total_cmp(&b.0));
        curve
    }

    /// The selected optimum is neither the smallest nor the largest `q` evaluated.
    pub fn is_interior_minimum(&self) -> bool {
        let q = self.best().q;
        let lower = self.candidates.iter().any(|c| c.q < q);
        let upper = self.candidates.iter().any(|c| c.q > q);
        lower && upper
    }
}

/// Drives independent VMC runs across candidate `q` values.
pub struct VariationalOptimizer {
    sampler: SamplerParams,
    params: OptimizerParams,
}

impl VariationalOptimizer {
    /// Validate everything up front; nothing is sampled until [`Self::optimize`].
    pub fn new(sampler: SamplerParams, params: OptimizerParams) -> Result<Self> {
        sampler.validate()?;
        params.validate()?;
        Ok(Self { sampler, params })
    }

    pub fn sampler(&self) -> &SamplerParams {
        &self.sampler
    }

    pub fn params(&self) -> &OptimizerParams {
        &self.params
    }

    /// Set the master seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.params.seed = Some(seed);
        self
    }

    /// Set the number of chains per candidate.
    pub fn with_chains(mut self, n_chains: usize) -> Result<Self> {
        if n_chains == 0 {
            return Err(VmcError::invalid("n_chains", "must be at least 1"));
        }
        self.params.n_chains = n_chains;
        Ok(self)
    }

    fn master_rng(&self) -> StdRng {
        match self.params.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        }
    }

    fn draw_seeds(&self, master: &mut StdRng) -> Vec<u64> {
        (0..self.params.n_chains).map(|_| master.gen()).collect()
    }

    /// Run one chain at `q` and return its frozen statistics.
    pub fn run_chain(sampler: &SamplerParams, q: f64, seed: u64) -> Result<(RunStatistics, ChainDiagnostics)> {
        check_charge("q", q)?;
        let wavefunction = HeliumTrial::new(q);
        let mut chain = MetropolisSampler::new(wavefunction, *sampler, StdRng::seed_from_u64(seed))?;
        let mut accumulator = EnergyAccumulator::new(wavefunction);
        accumulator.consume(chain.by_ref());
        Ok((accumulator.finish(), chain.diagnostics()))
    }

    /// Evaluate `q` with one chain per seed, chains in parallel.
    pub fn evaluate(&self, q: f64, seeds: &[u64]) -> Result<CandidateResult> {
        check_charge("q", q)?;
        if seeds.is_empty() {
            return Err(VmcError::invalid("n_chains", "at least one chain seed is required"));
        }
        let runs = seeds
            .par_iter()
            .map(|&seed| Self::run_chain(&self.sampler, q, seed))
            .collect::<Result<Vec<_>>>()?;
        Self::merge(q, runs)
    }

    fn merge(q: f64, runs: Vec<(RunStatistics, ChainDiagnostics)>) -> Result<CandidateResult> {
        let (stats, chains): (Vec<_>, Vec<_>) = runs.into_iter().unzip();
        let stats = RunStatistics::combine(&stats)
            .ok_or_else(|| VmcError::invalid("n_chains", format!("no chains ran at q = {q}")))?;
        info!(
            q,
            energy = stats.mean,
            error = stats.error,
            tau = stats.autocorrelation_time,
            "evaluated candidate"
        );
        Ok(CandidateResult { q, stats, chains })
    }

    /// Run the configured search.
    pub fn optimize(&self) -> Result<OptimizationResult> {
        self.sampler.validate()?;
        self.params.validate()?;
        let mut master = self.master_rng();
        let (candidates, termination, mut warnings) = match &self.params.strategy {
            SearchStrategy::GoldenSection { lower, upper, max_iterations } => {
                self.golden_section(*lower, *upper, *max_iterations, &mut master)?
            }
            strategy => {
                let qs = strategy.candidates().unwrap_or_default();
                (self.scan(&qs, &mut master)?, TerminationReason::Exhausted, Vec::new())
            }
        };

        for candidate in &candidates {
            for chain in &candidate.chains {
                if !chain.acceptance_in_band {
                    warnings.push(NonConvergence::AcceptanceOutOfBand {
                        q: candidate.q,
                        rate: chain.burn_in_acceptance_rate.unwrap_or(chain.acceptance_rate),
                    });
                }
                if !chain.equilibrated {
                    warnings.push(NonConvergence::BurnInNotEquilibrated {
                        q: candidate.q,
                        steps: chain.burn_in_steps,
                    });
                }
            }
        }
        warnings.iter().for_each(|w| warn!("{w}"));

        let best_index = candidates
            .iter()
            .enumerate()
            .min_by(|a, b| a.1.energy().total_cmp(&b.1.energy()))
            .map(|(i, _)| i)
            .ok_or_else(|| VmcError::invalid("strategy", "produced no candidates"))?;
        let fit = QuadraticFit::fit(&candidates);

        let result = OptimizationResult {
            candidates,
            best_index,
            termination,
            fit,
            warnings,
        };
        let best = result.best();
        info!(
            q = best.q,
            energy = best.energy(),
            error = best.error(),
            termination = ?result.termination,
            "optimum selected"
        );
        Ok(result)
    }

    fn scan(&self, qs: &[f64], master: &mut StdRng) -> Result<Vec<CandidateResult>> {
        let jobs: Vec<(usize, f64, u64)> = qs
            .iter()
            .enumerate()
            .flat_map(|(i, &q)| self.draw_seeds(master).into_iter().map(move |seed| (i, q, seed)))
            .collect();

        let runs = jobs
            .par_iter()
            .map(|&(_, q, seed)| Self::run_chain(&self.sampler, q, seed))
            .collect::<Result<Vec<_>>>()?;

        let mut grouped: Vec<Vec<(RunStatistics, ChainDiagnostics)>> = vec![Vec::new(); qs.len()];
        for (&(i, _, _), run) in jobs.iter().zip(runs) {
            grouped[i].push(run);
        }
        qs.iter().zip(grouped).map(|(&q, runs)| Self::merge(q, runs)).collect()
    }

    fn golden_section(
        &self,
        lower: f64,
        upper: f64,
        max_iterations: usize,
        master: &mut StdRng,
    ) -> Result<(Vec<CandidateResult>, TerminationReason, Vec<NonConvergence>)> {
        let inv_phi = (5f64.sqrt() - 1.0) / 2.0;
        let significance = self.params.significance;
        let mut evaluated = Vec::new();

        let (mut a, mut b) = (lower, upper);
        let mut c = b - inv_phi * (b - a);
        let mut d = a + inv_phi * (b - a);
        let mut fc = self.evaluate(c, &self.draw_seeds(master))?;
        let mut fd = self.evaluate(d, &self.draw_seeds(master))?;
        evaluated.push(fc.clone());
        evaluated.push(fd.clone());

        let mut iterations = 0;
        let termination = loop {
            if !fc.stats.distinguishable(&fd.stats, significance) {
                break TerminationReason::Indistinguishable;
            }
            if iterations >= max_iterations {
                break TerminationReason::IterationBudget;
            }
            iterations += 1;

            if fc.energy() < fd.energy() {
                b = d;
                d = c;
                fd = fc;
                c = b - inv_phi * (b - a);
                fc = self.evaluate(c, &self.draw_seeds(master))?;
                evaluated.push(fc.clone());
            } else {
                a = c;
                c = d;
                fc = fd;
                d = a + inv_phi * (b - a);
                fd = self.evaluate(d, &self.draw_seeds(master))?;
                evaluated.push(fd.clone());
            }
        };

        let warnings = match termination {
            TerminationReason::IterationBudget => vec![NonConvergence::IterationBudgetExhausted { iterations }],
            _ => Vec::new(),
        };
        Ok((evaluated, termination, warnings))
    }
}
