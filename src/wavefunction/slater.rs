//! Hydrogenic 1s orbital.

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use super::floored;
use super::traits::SingleWfn;

/// Slater 1s orbital φ(r) = exp(-α|r|) centred on the nucleus.
///
/// For a hydrogenic ground state the exponent is the (effective) nuclear charge.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct Slater1s {
    /// Orbital exponent
    pub alpha: f64,
}

impl Slater1s {
    pub fn new(alpha: f64) -> Self {
        Self { alpha }
    }

    /// ln φ(r) = -α|r|.
    pub fn log_evaluate(&self, r: &Vector3<f64>) -> f64 {
        -self.alpha * r.norm()
    }
}

impl SingleWfn for Slater1s {
    fn evaluate(&self, r: &Vector3<f64>) -> f64 {
        self.log_evaluate(r).exp()
    }

    fn derivative(&self, r: &Vector3<f64>) -> Vector3<f64> {
        let r_norm = r.norm();
        if r_norm == 0.0 {
            return Vector3::zeros();
        }
        let scalar = -self.alpha / r_norm * (-self.alpha * r_norm).exp();
        r * scalar
    }

    fn laplacian(&self, r: &Vector3<f64>) -> f64 {
        self.laplacian_ratio(r) * self.evaluate(r)
    }

    /// ∇²φ/φ = α² - 2α/|r|.
    fn laplacian_ratio(&self, r: &Vector3<f64>) -> f64 {
        let (r_norm, _) = floored(r.norm());
        self.alpha.powi(2) - 2.0 * self.alpha / r_norm
    }
}
