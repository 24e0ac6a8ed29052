//! Wave function traits for two-electron atoms.
//!
//! Provides `SingleWfn` for one-electron orbitals centred on the nucleus and
//! `PairWfn` for trial wavefunctions evaluated on an [`ElectronPair`].

use nalgebra::Vector3;
use super::pair::ElectronPair;

/// One-electron orbital trait.
pub trait SingleWfn {
    /// Evaluate the orbital at position `r`.
    fn evaluate(&self, r: &Vector3<f64>) -> f64;

    /// Compute the gradient at position `r`.
    fn derivative(&self, r: &Vector3<f64>) -> Vector3<f64>;

    /// Compute the Laplacian at position `r`.
    fn laplacian(&self, r: &Vector3<f64>) -> f64;

    /// ∇²φ/φ at `r`. Orbitals with a closed form should override this so the
    /// ratio stays finite where φ underflows.
    fn laplacian_ratio(&self, r: &Vector3<f64>) -> f64 {
        self.laplacian(r) / self.evaluate(r)
    }

    /// Numerical gradient using central difference.
    fn numerical_derivative(&self, r: &Vector3<f64>, h: f64) -> Vector3<f64> {
        let mut grad = Vector3::zeros();
        for axis in 0..3 {
            let mut r_fwd = *r;
            let mut r_bwd = *r;
            r_fwd[axis] += h;
            r_bwd[axis] -= h;
            grad[axis] = (self.evaluate(&r_fwd) - self.evaluate(&r_bwd)) / (2.0 * h);
        }
        grad
    }

    /// Numerical Laplacian using central difference.
    fn numerical_laplacian(&self, r: &Vector3<f64>, h: f64) -> f64 {
        let psi = self.evaluate(r);
        let mut laplacian = 0.0;
        for axis in 0..3 {
            let mut r_fwd = *r;
            let mut r_bwd = *r;
            r_fwd[axis] += h;
            r_bwd[axis] -= h;
            laplacian += (self.evaluate(&r_fwd) - 2.0 * psi + self.evaluate(&r_bwd)) / (h * h);
        }
        laplacian
    }
}

/// Two-electron trial wavefunction.
///
/// Sampling only ever needs ratios of |Ψ|², so implementors work in log space and
/// may drop normalisation constants.
pub trait PairWfn {
    /// ln Ψ at `pair`.
    fn log_psi(&self, pair: &ElectronPair) -> f64;

    /// Per-electron Laplacians ∇ᵢ²Ψ.
    fn laplacian(&self, pair: &ElectronPair) -> [f64; 2];

    /// Ψ at `pair`.
    fn evaluate(&self, pair: &ElectronPair) -> f64 {
        self.log_psi(pair).exp()
    }

    /// ln |Ψ|².
    fn log_density(&self, pair: &ElectronPair) -> f64 {
        2.0 * self.log_psi(pair)
    }

    /// |Ψ|², unnormalised.
    fn density(&self, pair: &ElectronPair) -> f64 {
        self.log_density(pair).exp()
    }

    /// Numerical per-electron Laplacians using central difference.
    fn numerical_laplacian(&self, pair: &ElectronPair, h: f64) -> [f64; 2] {
        let psi = self.evaluate(pair);
        let mut laplacian = [0.0; 2];
        for (i, lap) in laplacian.iter_mut().enumerate() {
            for axis in 0..3 {
                let mut fwd = *pair;
                let mut bwd = *pair;
                fwd.electron_mut(i)[axis] += h;
                bwd.electron_mut(i)[axis] -= h;
                *lap += (self.evaluate(&fwd) - 2.0 * psi + self.evaluate(&bwd)) / (h * h);
            }
        }
        laplacian
    }
}
