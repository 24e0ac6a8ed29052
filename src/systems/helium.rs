//! Helium-like atom: two electrons bound to a fixed nucleus of charge Z = 2.
//!
//! The trial wavefunction is a product of two hydrogenic 1s orbitals whose
//! exponent `q` is the effective nuclear charge each electron sees:
//!
//!   Ψ(r₁, r₂) = exp(-q|r₁|) · exp(-q|r₂|)
//!
//! Applying H = -½∇₁² - ½∇₂² - Z/r₁ - Z/r₂ + 1/r₁₂ and dividing by Ψ gives
//!
//!   E_L = -q² + (q - Z)/r₁ + (q - Z)/r₂ + 1/r₁₂

use serde::{Deserialize, Serialize};
use crate::sampling::EnergyCalculator;
use crate::wavefunction::{floored, ElectronPair, PairWfn, SingleWfn, Slater1s};

/// Nuclear charge of helium.
pub const NUCLEAR_CHARGE: f64 = 2.0;

/// Product-of-hydrogenic-orbitals trial wavefunction for helium.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct HeliumTrial {
    /// Shared 1s orbital; its exponent is the variational parameter `q`.
    pub orbital: Slater1s,
}

/// Local energy split into its kinetic and potential parts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocalEnergy {
    pub kinetic: f64,
    pub potential: f64,
    /// At least one distance was raised to [`crate::wavefunction::DISTANCE_FLOOR`].
    pub clamped: bool,
}

impl LocalEnergy {
    pub fn total(&self) -> f64 {
        self.kinetic + self.potential
    }
}

impl HeliumTrial {
    pub fn new(q: f64) -> Self {
        Self { orbital: Slater1s::new(q) }
    }

    /// Effective nuclear charge `q`.
    pub fn charge(&self) -> f64 {
        self.orbital.alpha
    }

    /// Exact expectation value ⟨E_L⟩ = q² - 2Zq + 5q/8 for this wavefunction family.
    ///
    /// Minimised at q = Z - 5/16 with E = -(Z - 5/16)².
    pub fn analytic_energy(&self) -> f64 {
        let q = self.charge();
        q * q - 2.0 * NUCLEAR_CHARGE * q + 5.0 * q / 8.0
    }

    pub fn local_energy_terms(&self, pair: &ElectronPair) -> LocalEnergy {
        let (r1, c1) = floored(pair.r1_norm());
        let (r2, c2) = floored(pair.r2_norm());
        let (r12, c12) = floored(pair.separation());

        // -½ Σᵢ ∇ᵢ²Ψ/Ψ; each factor only depends on its own electron.
        let kinetic = -0.5 * (self.orbital.laplacian_ratio(&pair.r1) + self.orbital.laplacian_ratio(&pair.r2));
        let potential = -NUCLEAR_CHARGE / r1 - NUCLEAR_CHARGE / r2 + 1.0 / r12;

        LocalEnergy {
            kinetic,
            potential,
            clamped: c1 || c2 || c12,
        }
    }
}

impl PairWfn for HeliumTrial {
    fn log_psi(&self, pair: &ElectronPair) -> f64 {
        self.orbital.log_evaluate(&pair.r1) + self.orbital.log_evaluate(&pair.r2)
    }

    fn laplacian(&self, pair: &ElectronPair) -> [f64; 2] {
        let psi = self.evaluate(pair);
        [
            self.orbital.laplacian_ratio(&pair.r1) * psi,
            self.orbital.laplacian_ratio(&pair.r2) * psi,
        ]
    }
}

impl EnergyCalculator for HeliumTrial {
    fn local_energy(&self, pair: &ElectronPair) -> f64 {
        self.local_energy_terms(pair).total()
    }

    fn local_energy_checked(&self, pair: &ElectronPair) -> (f64, bool) {
        let terms = self.local_energy_terms(pair);
        (terms.total(), terms.clamped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::Vector3;
    use crate::wavefunction::DISTANCE_FLOOR;

    fn sample_pair() -> ElectronPair {
        ElectronPair::new(Vector3::new(0.3, -0.4, 0.5), Vector3::new(-0.8, 0.1, 0.2))
    }

    #[test]
    fn test_local_energy_closed_form() {
        let pair = sample_pair();
        for &q in &[1.25, 1.6875, 2.0, 2.5] {
            let wfn = HeliumTrial::new(q);
            let (r1, r2, r12) = (pair.r1_norm(), pair.r2_norm(), pair.separation());
            let expected = -q * q + (q - 2.0) / r1 + (q - 2.0) / r2 + 1.0 / r12;
            assert_relative_eq!(wfn.local_energy(&pair), expected, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_kinetic_matches_numerical_laplacian() {
        let wfn = HeliumTrial::new(1.7);
        let pair = sample_pair();
        let psi = wfn.evaluate(&pair);

        let analytic = wfn.laplacian(&pair);
        let numerical = wfn.numerical_laplacian(&pair, 1e-4);
        for i in 0..2 {
            assert_relative_eq!(analytic[i], numerical[i], epsilon = 1e-4);
        }

        let kinetic = -0.5 * (numerical[0] + numerical[1]) / psi;
        assert_relative_eq!(wfn.local_energy_terms(&pair).kinetic, kinetic, epsilon = 1e-4);
    }

    #[test]
    fn test_at_full_charge_only_repulsion_survives() {
        let wfn = HeliumTrial::new(NUCLEAR_CHARGE);
        let pair = sample_pair();
        assert_relative_eq!(wfn.local_energy(&pair), -4.0 + 1.0 / pair.separation(), epsilon = 1e-12);
    }

    #[test]
    fn test_symmetric_under_exchange() {
        let wfn = HeliumTrial::new(1.5);
        let pair = sample_pair();
        assert_relative_eq!(wfn.log_psi(&pair), wfn.log_psi(&pair.swapped()), epsilon = 1e-12);
        assert_relative_eq!(wfn.local_energy(&pair), wfn.local_energy(&pair.swapped()), epsilon = 1e-12);
    }

    #[test]
    fn test_density_ratio_matches_exponent_difference() {
        let wfn = HeliumTrial::new(1.8);
        let a = sample_pair();
        let b = a.displaced(&Vector3::new(0.1, 0.0, 0.0), &Vector3::new(0.0, -0.2, 0.0));
        let expected = (2.0 * 1.8 * (a.r1_norm() + a.r2_norm() - b.r1_norm() - b.r2_norm())).exp();
        assert_relative_eq!(wfn.density(&b) / wfn.density(&a), expected, epsilon = 1e-10);
    }

    #[test]
    fn test_nucleus_coincidence_is_clamped() {
        let wfn = HeliumTrial::new(1.6875);
        let pair = ElectronPair::new(Vector3::zeros(), Vector3::new(1.0, 0.0, 0.0));
        let terms = wfn.local_energy_terms(&pair);
        assert!(terms.clamped);
        assert!(terms.total().is_finite());
        assert!(terms.potential >= -NUCLEAR_CHARGE / DISTANCE_FLOOR - 2.0 * NUCLEAR_CHARGE);
    }

    #[test]
    fn test_electron_coincidence_is_clamped() {
        let wfn = HeliumTrial::new(1.6875);
        let r = Vector3::new(0.5, 0.5, 0.5);
        let pair = ElectronPair::new(r, r);
        let (energy, clamped) = wfn.local_energy_checked(&pair);
        assert!(clamped);
        assert!(energy.is_finite());
        assert!(!wfn.local_energy_checked(&sample_pair()).1);
    }

    #[test]
    fn test_analytic_energy_reference_values() {
        assert_relative_eq!(HeliumTrial::new(2.0).analytic_energy(), -2.75, epsilon = 1e-12);
        let q_opt = NUCLEAR_CHARGE - 5.0 / 16.0;
        assert_relative_eq!(HeliumTrial::new(q_opt).analytic_energy(), -q_opt * q_opt, epsilon = 1e-12);
    }
}
