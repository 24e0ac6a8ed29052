//! Traits for Monte Carlo sampling.

use crate::wavefunction::ElectronPair;

/// Trait for computing local energy from electron positions.
pub trait EnergyCalculator {
    fn local_energy(&self, pair: &ElectronPair) -> f64;

    /// Local energy plus a flag set when a singular distance had to be clamped.
    fn local_energy_checked(&self, pair: &ElectronPair) -> (f64, bool) {
        (self.local_energy(pair), false)
    }
}
