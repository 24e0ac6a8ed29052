//! Wavefunction module - orbitals, trial-function traits and the electron-pair configuration.

mod pair;
mod slater;
mod traits;

pub use pair::ElectronPair;
pub use slater::Slater1s;
pub use traits::{PairWfn, SingleWfn};

/// Smallest distance (bohr) used in any `1/r` term.
///
/// Nucleus and electron-electron coincidences saturate at `1 / DISTANCE_FLOOR`
/// instead of producing infinities.
pub const DISTANCE_FLOOR: f64 = 1e-6;

/// Apply [`DISTANCE_FLOOR`] to `d`, reporting whether the floor was hit.
#[inline]
pub fn floored(d: f64) -> (f64, bool) {
    if d < DISTANCE_FLOOR || d.is_nan() {
        (DISTANCE_FLOOR, true)
    } else {
        (d, false)
    }
}
