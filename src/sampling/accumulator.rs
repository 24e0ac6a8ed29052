//! Streaming energy statistics with an autocorrelation-corrected error bar.
//!
//! Local energies are folded into a Welford accumulator at every blocking level
//! (Flyvbjerg-Petersen): level `k` sees means of consecutive blocks of `2^k`
//! samples. Memory stays O(log N) however long the chain runs.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::wavefunction::ElectronPair;
use super::metropolis::Sample;
use super::traits::EnergyCalculator;

/// Levels with fewer blocks than this are too noisy to read an error from.
pub const MIN_BLOCKS: usize = 32;

/// A local energy tagged with the chain step it was measured at.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EnergySample {
    pub step: usize,
    pub value: f64,
}

/// Welford running mean and variance.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct Welford {
    count: usize,
    mean: f64,
    m2: f64,
}

impl Welford {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, x: f64) {
        self.count += 1;
        let delta = x - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (x - self.mean);
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn mean(&self) -> f64 {
        self.mean
    }

    /// Unbiased sample variance; zero with fewer than two values.
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    /// Rebuild an accumulator from a frozen count, mean and unbiased variance.
    pub fn from_moments(count: usize, mean: f64, variance: f64) -> Self {
        Welford {
            count,
            mean: if count == 0 { 0.0 } else { mean },
            m2: variance * count.saturating_sub(1) as f64,
        }
    }

    /// Combine two disjoint accumulations (Chan et al.).
    pub fn merge(&self, other: &Welford) -> Welford {
        if self.count == 0 {
            return *other;
        }
        if other.count == 0 {
            return *self;
        }
        let count = self.count + other.count;
        let delta = other.mean - self.mean;
        let mean = self.mean + delta * other.count as f64 / count as f64;
        let m2 = self.m2 + other.m2 + delta * delta * (self.count as f64 * other.count as f64) / count as f64;
        Welford { count, mean, m2 }
    }
}

#[derive(Clone, Debug, Default)]
struct Level {
    stats: Welford,
    pending: Option<f64>,
}

/// Standard error read off one blocking level.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BlockingLevel {
    pub level: usize,
    pub block_size: usize,
    pub n_blocks: usize,
    pub error: f64,
    /// Statistical uncertainty of `error` itself.
    pub error_uncertainty: f64,
}

/// Frozen statistics of one run (or several merged runs).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RunStatistics {
    pub count: usize,
    pub mean: f64,
    pub variance: f64,
    /// sqrt(variance / count), valid only for uncorrelated samples.
    pub naive_error: f64,
    /// Blocking-corrected standard error of the mean.
    pub error: f64,
    pub effective_samples: f64,
    /// Integrated autocorrelation time in samples, count / effective_samples.
    pub autocorrelation_time: f64,
    /// Blocking level the error was read from (block size 2^level).
    pub blocking_level: usize,
    /// A plateau in the blocking curve was confirmed by at least one higher level.
    pub plateau_reached: bool,
    /// Samples whose local energy needed a clamped distance.
    pub clamped_samples: usize,
}

impl RunStatistics {
    /// Whether the two means differ by more than `sigmas` combined standard errors.
    pub fn distinguishable(&self, other: &RunStatistics, sigmas: f64) -> bool {
        let combined = self.error.hypot(other.error);
        (self.mean - other.mean).abs() > sigmas * combined
    }

    /// Merge statistics of independent chains sampling the same distribution.
    pub fn combine(runs: &[RunStatistics]) -> Option<RunStatistics> {
        match runs {
            [] => None,
            [single] => Some(single.clone()),
            _ => {
                let pooled = runs
                    .iter()
                    .map(|r| Welford::from_moments(r.count, r.mean, r.variance))
                    .fold(Welford::new(), |acc, w| acc.merge(&w));
                let count = pooled.count();
                let n = count as f64;
                let mean = pooled.mean();
                let variance = pooled.variance();
                // Independent chains: Var(Σ wᵢ mᵢ) = Σ wᵢ² σᵢ².
                let error = runs
                    .iter()
                    .map(|r| (r.count as f64 / n * r.error).powi(2))
                    .sum::<f64>()
                    .sqrt();
                let effective_samples: f64 = runs.iter().map(|r| r.effective_samples).sum();

                Some(RunStatistics {
                    count,
                    mean,
                    variance,
                    naive_error: (variance / n).sqrt(),
                    error,
                    effective_samples,
                    autocorrelation_time: if effective_samples > 0.0 { n / effective_samples } else { 1.0 },
                    blocking_level: runs.iter().map(|r| r.blocking_level).max().unwrap_or(0),
                    plateau_reached: runs.iter().all(|r| r.plateau_reached),
                    clamped_samples: runs.iter().map(|r| r.clamped_samples).sum(),
                })
            }
        }
    }
}

/// Hierarchical blocking analysis of a correlated time series.
#[derive(Clone, Debug, Default)]
pub struct BlockingAnalysis {
    levels: Vec<Level>,
}

impl BlockingAnalysis {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, x: f64) {
        let mut value = x;
        let mut depth = 0;
        loop {
            if depth == self.levels.len() {
                self.levels.push(Level::default());
            }
            let level = &mut self.levels[depth];
            level.stats.push(value);
            match level.pending.take() {
                None => {
                    level.pending = Some(value);
                    break;
                }
                Some(previous) => {
                    value = 0.5 * (previous + value);
                    depth += 1;
                }
            }
        }
    }

    /// Raw sample statistics (level 0).
    pub fn samples(&self) -> Welford {
        self.levels.first().map(|l| l.stats).unwrap_or_default()
    }

    /// Error estimate at every level with at least [`MIN_BLOCKS`] blocks.
    pub fn curve(&self) -> Vec<BlockingLevel> {
        self.levels
            .iter()
            .enumerate()
            .filter(|(_, l)| l.stats.count() >= MIN_BLOCKS)
            .map(|(level, l)| {
                let n_blocks = l.stats.count();
                let error = (l.stats.variance() / n_blocks as f64).sqrt();
                BlockingLevel {
                    level,
                    block_size: 1 << level,
                    n_blocks,
                    error,
                    error_uncertainty: error / (2.0 * (n_blocks - 1) as f64).sqrt(),
                }
            })
            .collect()
    }

    /// Pick the plateau of the blocking curve.
    ///
    /// The plateau is the lowest level that no higher level exceeds by more than
    /// two combined error bars. Returns `(level, error, confirmed)`; when only the
    /// top level qualifies the plateau is unconfirmed and the largest error is used.
    pub fn plateau(&self) -> Option<(usize, f64, bool)> {
        let curve = self.curve();
        let last = curve.len().checked_sub(1)?;
        for (i, point) in curve.iter().enumerate() {
            let flat = curve[i + 1..]
                .iter()
                .all(|higher| {
                    higher.error - point.error <= 2.0 * point.error_uncertainty.hypot(higher.error_uncertainty)
                });
            if flat && i < last {
                return Some((point.level, point.error, true));
            }
        }
        curve
            .iter()
            .max_by(|a, b| a.error.total_cmp(&b.error))
            .map(|p| (p.level, p.error, false))
    }

    /// Freeze into [`RunStatistics`].
    pub fn statistics(&self, clamped_samples: usize) -> RunStatistics {
        let raw = self.samples();
        let count = raw.count();
        let variance = raw.variance();
        let naive_error = if count > 0 { (variance / count as f64).sqrt() } else { 0.0 };
        let (blocking_level, error, plateau_reached) = self.plateau().unwrap_or((0, naive_error, false));

        let effective_samples = if error > 0.0 {
            (variance / (error * error)).min(count as f64)
        } else {
            count as f64
        };
        let autocorrelation_time = if effective_samples > 0.0 {
            count as f64 / effective_samples
        } else {
            1.0
        };

        RunStatistics {
            count,
            mean: raw.mean(),
            variance,
            naive_error,
            error,
            effective_samples,
            autocorrelation_time,
            blocking_level,
            plateau_reached,
            clamped_samples,
        }
    }
}

/// Folds a sampler's configuration stream into energy statistics.
pub struct EnergyAccumulator<W> {
    wavefunction: W,
    blocking: BlockingAnalysis,
    clamped: usize,
    trace: Option<Vec<EnergySample>>,
}

impl<W: EnergyCalculator> EnergyAccumulator<W> {
    pub fn new(wavefunction: W) -> Self {
        Self {
            wavefunction,
            blocking: BlockingAnalysis::new(),
            clamped: 0,
            trace: None,
        }
    }

    /// Also keep every [`EnergySample`] in memory.
    pub fn with_trace(mut self) -> Self {
        self.trace = Some(Vec::new());
        self
    }

    /// Evaluate the local energy at `pair` and fold it in.
    pub fn push(&mut self, step: usize, pair: &ElectronPair) -> f64 {
        let (value, clamped) = self.wavefunction.local_energy_checked(pair);
        if clamped {
            self.clamped += 1;
            warn!(step, value, "local energy evaluated with a clamped distance");
        }
        self.blocking.push(value);
        if let Some(trace) = self.trace.as_mut() {
            trace.push(EnergySample { step, value });
        }
        value
    }

    pub fn push_sample(&mut self, sample: &Sample) -> f64 {
        self.push(sample.step, &sample.pair)
    }

    /// Drain a sample stream in order.
    pub fn consume<I: IntoIterator<Item = Sample>>(&mut self, samples: I) {
        for sample in samples {
            self.push_sample(&sample);
        }
    }

    pub fn count(&self) -> usize {
        self.blocking.samples().count()
    }

    pub fn mean(&self) -> f64 {
        self.blocking.samples().mean()
    }

    pub fn blocking(&self) -> &BlockingAnalysis {
        &self.blocking
    }

    pub fn trace(&self) -> Option<&[EnergySample]> {
        self.trace.as_deref()
    }

    pub fn finish(self) -> RunStatistics {
        self.blocking.statistics(self.clamped)
    }

    pub fn finish_with_trace(self) -> (RunStatistics, Vec<EnergySample>) {
        let stats = self.blocking.statistics(self.clamped);
        (stats, self.trace.unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::Vector3;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use rand_distr::{Distribution, Normal};
    use crate::systems::HeliumTrial;

    fn ar1(phi: f64, n: usize, seed: u64) -> Vec<f64> {
        let mut rng = StdRng::seed_from_u64(seed);
        let noise = Normal::new(0.0, 1.0).unwrap();
        let mut x = 0.0;
        (0..n)
            .map(|_| {
                x = phi * x + noise.sample(&mut rng);
                x
            })
            .collect()
    }

    fn analyse(values: &[f64]) -> RunStatistics {
        let mut blocking = BlockingAnalysis::new();
        values.iter().for_each(|&v| blocking.push(v));
        blocking.statistics(0)
    }

    #[test]
    fn test_welford_is_stable_with_large_offset() {
        let mut w = Welford::new();
        for x in [4.0, 7.0, 13.0, 16.0] {
            w.push(1e9 + x);
        }
        assert_eq!(w.count(), 4);
        assert_relative_eq!(w.mean(), 1e9 + 10.0, epsilon = 1e-6);
        assert_relative_eq!(w.variance(), 30.0, epsilon = 1e-6);
    }

    #[test]
    fn test_welford_merge_matches_single_pass() {
        let values = ar1(0.3, 1000, 2);
        let mut all = Welford::new();
        let mut left = Welford::new();
        let mut right = Welford::new();
        for (i, &v) in values.iter().enumerate() {
            all.push(v);
            if i < 400 { left.push(v) } else { right.push(v) }
        }
        let merged = left.merge(&right);
        assert_eq!(merged.count(), all.count());
        assert_relative_eq!(merged.mean(), all.mean(), epsilon = 1e-12);
        assert_relative_eq!(merged.variance(), all.variance(), epsilon = 1e-10);
    }

    #[test]
    fn test_blocking_levels_halve() {
        let mut blocking = BlockingAnalysis::new();
        (0..1024).for_each(|i| blocking.push(i as f64));
        let curve = blocking.curve();
        assert_eq!(curve[0].n_blocks, 1024);
        assert_eq!(curve[1].n_blocks, 512);
        assert_eq!(curve.last().map(|l| l.n_blocks), Some(32));
        assert_relative_eq!(blocking.samples().mean(), 511.5, epsilon = 1e-9);
    }

    #[test]
    fn test_uncorrelated_error_matches_naive() {
        let stats = analyse(&ar1(0.0, 100_000, 3));
        assert!(stats.plateau_reached);
        assert_relative_eq!(stats.error, stats.naive_error, max_relative = 0.35);
        assert!(stats.autocorrelation_time < 2.0);
    }

    #[test]
    fn test_correlated_error_exceeds_naive() {
        // AR(1) with φ = 0.9 has integrated autocorrelation time (1+φ)/(1-φ) = 19.
        let stats = analyse(&ar1(0.9, 100_000, 4));
        assert!(stats.error > 3.0 * stats.naive_error, "{} vs {}", stats.error, stats.naive_error);
        assert!(stats.effective_samples < stats.count as f64);
        assert!(stats.autocorrelation_time > 10.0 && stats.autocorrelation_time < 35.0);
    }

    #[test]
    fn test_error_shrinks_as_inverse_sqrt_n() {
        let small = analyse(&ar1(0.0, 1_000, 5));
        let large = analyse(&ar1(0.0, 100_000, 6));
        let ratio = small.error / large.error;
        assert!(ratio > 5.0 && ratio < 20.0, "ratio {ratio}");
    }

    #[test]
    fn test_short_series_falls_back_to_naive() {
        let stats = analyse(&[1.0, 2.0, 3.0]);
        assert_eq!(stats.count, 3);
        assert!(!stats.plateau_reached);
        assert_relative_eq!(stats.error, stats.naive_error, epsilon = 1e-15);
    }

    #[test]
    fn test_combine_independent_runs() {
        let a = analyse(&ar1(0.0, 10_000, 7));
        let b = analyse(&ar1(0.0, 10_000, 8));
        let both = RunStatistics::combine(&[a.clone(), b.clone()]).unwrap();
        assert_eq!(both.count, 20_000);
        assert_relative_eq!(both.mean, 0.5 * (a.mean + b.mean), epsilon = 1e-12);
        assert_relative_eq!(both.error, 0.5 * a.error.hypot(b.error), epsilon = 1e-12);
        assert!(both.error < a.error);
        assert!(RunStatistics::combine(&[]).is_none());

        let mut pooled = Welford::new();
        ar1(0.0, 10_000, 7).into_iter().chain(ar1(0.0, 10_000, 8)).for_each(|x| pooled.push(x));
        assert_relative_eq!(both.mean, pooled.mean(), epsilon = 1e-12);
        assert_relative_eq!(both.variance, pooled.variance(), max_relative = 1e-10);
    }

    #[test]
    fn test_distinguishable() {
        let mut a = analyse(&ar1(0.0, 1_000, 9));
        let mut b = a.clone();
        a.mean = 0.0;
        a.error = 0.01;
        b.mean = 0.1;
        b.error = 0.01;
        assert!(a.distinguishable(&b, 2.0));
        b.mean = 0.01;
        assert!(!a.distinguishable(&b, 2.0));
    }

    #[test]
    fn test_accumulator_records_trace_and_clamps() {
        let wfn = HeliumTrial::new(2.0);
        let mut acc = EnergyAccumulator::new(wfn).with_trace();
        let good = ElectronPair::new(Vector3::new(1.0, 0.0, 0.0), Vector3::new(-1.0, 0.0, 0.0));
        let singular = ElectronPair::new(Vector3::zeros(), Vector3::new(0.0, 1.0, 0.0));
        assert_relative_eq!(acc.push(1, &good), -3.5, epsilon = 1e-12);
        acc.push(2, &singular);
        assert_eq!(acc.count(), 2);

        let (stats, trace) = acc.finish_with_trace();
        assert_eq!(stats.clamped_samples, 1);
        assert!(stats.mean.is_finite());
        assert_eq!(trace.iter().map(|s| s.step).collect::<Vec<_>>(), vec![1, 2]);
    }
}
