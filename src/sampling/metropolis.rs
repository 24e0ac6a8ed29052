//! Metropolis-Hastings walker over the six-dimensional two-electron configuration space.
//!
//! A [`MetropolisSampler`] owns one walker and one caller-supplied random number
//! generator. It is driven lazily through [`Iterator`]: the first pull places
//! the walker, runs burn-in (adapting the step size if asked to), and every
//! later pull advances the chain `thinning` steps and yields the configuration.
//! Rejected moves still count as chain steps.

use std::iter::FusedIterator;

use nalgebra::Vector3;
use rand::Rng;
use rand_distr::{Distribution, StandardNormal};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, VmcError};
use crate::wavefunction::{ElectronPair, PairWfn};
use super::traits::EnergyCalculator;

/// Shape of the symmetric single-coordinate displacement.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Proposal {
    /// Uniform on `[-step, step)`.
    Uniform,
    /// Normal with standard deviation `step`.
    Gaussian,
}

/// Burn-in step-size adaptation toward an acceptance band.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StepAdaptation {
    /// Steps per acceptance-rate window.
    pub interval: usize,
    pub target_low: f64,
    pub target_high: f64,
    pub min_step_size: f64,
    pub max_step_size: f64,
}

impl Default for StepAdaptation {
    fn default() -> Self {
        Self {
            interval: 100,
            target_low: 0.4,
            target_high: 0.6,
            min_step_size: 0.01,
            max_step_size: 4.0,
        }
    }
}

impl StepAdaptation {
    fn target(&self) -> f64 {
        0.5 * (self.target_low + self.target_high)
    }

    fn in_band(&self, rate: f64) -> bool {
        (self.target_low..=self.target_high).contains(&rate)
    }
}

/// When burn-in may end.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Equilibration {
    /// After `n_burn_in` steps.
    FixedSteps,
    /// Once the windowed mean local energy stops decreasing.
    EnergyPlateau { window: usize },
}

/// Parameters for one Markov chain.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplerParams {
    /// Minimum number of discarded burn-in steps.
    pub n_burn_in: usize,
    /// Hard cap on burn-in steps.
    pub max_burn_in: usize,
    /// Number of configurations emitted during sampling.
    pub n_samples: usize,
    /// Chain steps per emitted configuration. Every Metropolis step counts,
    /// rejected ones included, so a rejection still advances the thinning clock.
    pub thinning: usize,
    /// Initial displacement scale (bohr).
    pub step_size: f64,
    pub proposal: Proposal,
    pub adaptation: Option<StepAdaptation>,
    pub equilibration: Equilibration,
    /// Radius of the sphere the electrons start in (bohr).
    pub init_radius: f64,
}

impl Default for SamplerParams {
    fn default() -> Self {
        Self {
            n_burn_in: 2_000,
            max_burn_in: 20_000,
            n_samples: 20_000,
            thinning: 1,
            step_size: 0.5,
            proposal: Proposal::Uniform,
            adaptation: Some(StepAdaptation::default()),
            equilibration: Equilibration::FixedSteps,
            init_radius: 4.0,
        }
    }
}

fn positive(option: &'static str, value: f64) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(VmcError::invalid(option, format!("must be finite and positive, got {value}")))
    }
}

impl SamplerParams {
    /// Check every option is in its domain.
    pub fn validate(&self) -> Result<()> {
        if self.n_samples == 0 {
            return Err(VmcError::invalid("n_samples", "must be at least 1"));
        }
        if self.thinning == 0 {
            return Err(VmcError::invalid("thinning", "must be at least 1"));
        }
        if self.max_burn_in < self.n_burn_in {
            return Err(VmcError::invalid(
                "max_burn_in",
                format!("({}) must not be below n_burn_in ({})", self.max_burn_in, self.n_burn_in),
            ));
        }
        positive("step_size", self.step_size)?;
        positive("init_radius", self.init_radius)?;

        if let Some(adapt) = &self.adaptation {
            if adapt.interval == 0 {
                return Err(VmcError::invalid("adaptation.interval", "must be at least 1"));
            }
            if !(0.0 < adapt.target_low && adapt.target_low < adapt.target_high && adapt.target_high < 1.0) {
                return Err(VmcError::invalid(
                    "adaptation.target_low/target_high",
                    format!("need 0 < low < high < 1, got [{}, {}]", adapt.target_low, adapt.target_high),
                ));
            }
            positive("adaptation.min_step_size", adapt.min_step_size)?;
            positive("adaptation.max_step_size", adapt.max_step_size)?;
            if adapt.min_step_size > adapt.max_step_size {
                return Err(VmcError::invalid("adaptation.min_step_size", "exceeds max_step_size"));
            }
        }

        if let Equilibration::EnergyPlateau { window } = self.equilibration {
            if window == 0 {
                return Err(VmcError::invalid("equilibration.window", "must be at least 1"));
            }
        }
        Ok(())
    }
}

/// Lifecycle of a sampler.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SamplerPhase {
    Uninitialized,
    BurningIn,
    Sampling,
    Finished,
}

/// Current walker configuration with its cached ln|Ψ|².
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct WalkerState {
    pub pair: ElectronPair,
    pub log_density: f64,
}

/// A retained configuration and the chain step it was taken at.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Sample {
    pub step: usize,
    pub pair: ElectronPair,
}

/// Summary of how one chain behaved.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ChainDiagnostics {
    pub burn_in_steps: usize,
    pub sampling_steps: usize,
    /// Acceptance rate over the sampling phase.
    pub acceptance_rate: f64,
    /// Acceptance rate of the last burn-in adaptation window, if any was measured.
    pub burn_in_acceptance_rate: Option<f64>,
    pub final_step_size: f64,
    /// Burn-in ended by its equilibration rule rather than by `max_burn_in`.
    pub equilibrated: bool,
    /// Last adaptation window landed inside the target band (always true without adaptation).
    pub acceptance_in_band: bool,
}

/// Metropolis acceptance probability min(1, |Ψ'|²/|Ψ|²) from log densities.
///
/// A candidate at least as probable as the current configuration is always accepted.
pub fn acceptance_probability(log_current: f64, log_candidate: f64) -> f64 {
    let delta = log_candidate - log_current;
    if delta >= 0.0 {
        1.0
    } else if delta.is_nan() {
        0.0
    } else {
        delta.exp()
    }
}

/// Single-walker Metropolis-Hastings sampler of |Ψ|².
pub struct MetropolisSampler<W, R> {
    wavefunction: W,
    params: SamplerParams,
    rng: R,
    step_size: f64,
    phase: SamplerPhase,
    state: Option<WalkerState>,
    step: usize,
    burn_in_steps: usize,
    sampling_steps: usize,
    sampling_accepted: usize,
    emitted: usize,
    window_rate: Option<f64>,
    equilibrated: bool,
    in_band: bool,
}

impl<W: PairWfn + EnergyCalculator, R: Rng> MetropolisSampler<W, R> {
    /// Validate `params` and build an uninitialised sampler. No random numbers are drawn here.
    pub fn new(wavefunction: W, params: SamplerParams, rng: R) -> Result<Self> {
        params.validate()?;
        Ok(Self {
            wavefunction,
            params,
            rng,
            step_size: params.step_size,
            phase: SamplerPhase::Uninitialized,
            state: None,
            step: 0,
            burn_in_steps: 0,
            sampling_steps: 0,
            sampling_accepted: 0,
            emitted: 0,
            window_rate: None,
            equilibrated: false,
            in_band: params.adaptation.is_none(),
        })
    }

    pub fn phase(&self) -> SamplerPhase {
        self.phase
    }

    pub fn step_size(&self) -> f64 {
        self.step_size
    }

    pub fn state(&self) -> Option<&WalkerState> {
        self.state.as_ref()
    }

    pub fn wavefunction(&self) -> &W {
        &self.wavefunction
    }

    pub fn diagnostics(&self) -> ChainDiagnostics {
        let acceptance_rate = if self.sampling_steps > 0 {
            self.sampling_accepted as f64 / self.sampling_steps as f64
        } else {
            0.0
        };
        ChainDiagnostics {
            burn_in_steps: self.burn_in_steps,
            sampling_steps: self.sampling_steps,
            acceptance_rate,
            burn_in_acceptance_rate: self.window_rate,
            final_step_size: self.step_size,
            equilibrated: self.equilibrated,
            acceptance_in_band: self.in_band,
        }
    }

    /// Place both electrons uniformly inside the initial sphere.
    pub fn initialize(&mut self) {
        if self.phase != SamplerPhase::Uninitialized {
            return;
        }
        let r1 = self.random_in_sphere();
        let r2 = self.random_in_sphere();
        let pair = ElectronPair::new(r1, r2);
        let log_density = self.wavefunction.log_density(&pair);
        self.state = Some(WalkerState { pair, log_density });
        self.phase = SamplerPhase::BurningIn;
    }

    /// Run initialisation and burn-in, leaving the sampler ready to emit samples.
    pub fn equilibrate(&mut self) {
        self.initialize();
        if self.phase != SamplerPhase::BurningIn {
            return;
        }
        let Some(mut state) = self.state else {
            return;
        };

        let mut window_steps = 0usize;
        let mut window_accepted = 0usize;
        let mut plateau = matches!(self.params.equilibration, Equilibration::FixedSteps);
        let mut energy_sum = 0.0;
        let mut energy_count = 0usize;
        let mut best_window_energy = f64::INFINITY;

        while self.burn_in_steps < self.params.max_burn_in
            && !(self.burn_in_steps >= self.params.n_burn_in && plateau && self.in_band)
        {
            let accepted = self.metropolis_step(&mut state);
            self.burn_in_steps += 1;

            if let Some(adapt) = self.params.adaptation {
                window_steps += 1;
                window_accepted += usize::from(accepted);
                if window_steps == adapt.interval {
                    self.adapt_step_size(&adapt, window_accepted as f64 / window_steps as f64);
                    window_steps = 0;
                    window_accepted = 0;
                }
            }

            if let Equilibration::EnergyPlateau { window } = self.params.equilibration {
                if !plateau {
                    energy_sum += self.wavefunction.local_energy(&state.pair);
                    energy_count += 1;
                    if energy_count == window {
                        let mean = energy_sum / window as f64;
                        if mean < best_window_energy {
                            best_window_energy = mean;
                        } else {
                            plateau = true;
                        }
                        energy_sum = 0.0;
                        energy_count = 0;
                    }
                }
            }
        }

        self.equilibrated = plateau;
        self.state = Some(state);
        self.phase = SamplerPhase::Sampling;
        debug!(
            steps = self.burn_in_steps,
            step_size = self.step_size,
            equilibrated = self.equilibrated,
            in_band = self.in_band,
            "burn-in finished"
        );
    }

    /// Advance the chain by one proposal; returns whether it was accepted.
    fn metropolis_step(&mut self, state: &mut WalkerState) -> bool {
        let candidate = self.propose(&state.pair);
        let log_candidate = self.wavefunction.log_density(&candidate);
        let probability = acceptance_probability(state.log_density, log_candidate);
        self.step += 1;

        if probability >= 1.0 || self.rng.gen::<f64>() < probability {
            *state = WalkerState {
                pair: candidate,
                log_density: log_candidate,
            };
            true
        } else {
            false
        }
    }

    fn propose(&mut self, pair: &ElectronPair) -> ElectronPair {
        let d1 = self.displacement();
        let d2 = self.displacement();
        pair.displaced(&d1, &d2)
    }

    fn displacement(&mut self) -> Vector3<f64> {
        let step = self.step_size;
        let proposal = self.params.proposal;
        match proposal {
            Proposal::Uniform => Vector3::from_fn(|_, _| self.rng.gen_range(-1.0..1.0) * step),
            Proposal::Gaussian => Vector3::from_fn(|_, _| {
                let z: f64 = StandardNormal.sample(&mut self.rng);
                z * step
            }),
        }
    }

    fn random_in_sphere(&mut self) -> Vector3<f64> {
        let radius = self.params.init_radius;
        loop {
            let r = Vector3::from_fn(|_, _| self.rng.gen_range(-radius..=radius));
            if r.norm() <= radius {
                return r;
            }
        }
    }

    /// Rescale the step by sqrt(rate / target) when the window rate leaves the band.
    fn adapt_step_size(&mut self, adapt: &StepAdaptation, rate: f64) {
        self.window_rate = Some(rate);
        self.in_band = adapt.in_band(rate);
        if !self.in_band {
            let adjustment = (rate / adapt.target()).sqrt();
            let previous = self.step_size;
            self.step_size = (self.step_size * adjustment).clamp(adapt.min_step_size, adapt.max_step_size);
            debug!(rate, previous, step_size = self.step_size, "adapted step size");
        }
    }
}

impl<W: PairWfn + EnergyCalculator, R: Rng> Iterator for MetropolisSampler<W, R> {
    type Item = Sample;

    fn next(&mut self) -> Option<Sample> {
        match self.phase {
            SamplerPhase::Finished => return None,
            SamplerPhase::Uninitialized | SamplerPhase::BurningIn => self.equilibrate(),
            SamplerPhase::Sampling => {}
        }

        let mut state = self.state?;
        for _ in 0..self.params.thinning {
            if self.metropolis_step(&mut state) {
                self.sampling_accepted += 1;
            }
            self.sampling_steps += 1;
        }
        self.state = Some(state);
        self.emitted += 1;
        if self.emitted >= self.params.n_samples {
            self.phase = SamplerPhase::Finished;
        }

        Some(Sample {
            step: self.step,
            pair: state.pair,
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = match self.phase {
            SamplerPhase::Finished => 0,
            _ => self.params.n_samples - self.emitted,
        };
        (remaining, Some(remaining))
    }
}

impl<W: PairWfn + EnergyCalculator, R: Rng> FusedIterator for MetropolisSampler<W, R> {}

impl<W: PairWfn + EnergyCalculator, R: Rng> ExactSizeIterator for MetropolisSampler<W, R> {}
