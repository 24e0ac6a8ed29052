//! Two-electron configuration: the point in 6-D space the walker moves through.

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

/// Positions of both electrons relative to the nucleus at the origin.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ElectronPair {
    pub r1: Vector3<f64>,
    pub r2: Vector3<f64>,
}

impl ElectronPair {
    pub fn new(r1: Vector3<f64>, r2: Vector3<f64>) -> Self {
        Self { r1, r2 }
    }

    /// Distance of electron 1 from the nucleus.
    pub fn r1_norm(&self) -> f64 {
        self.r1.norm()
    }

    /// Distance of electron 2 from the nucleus.
    pub fn r2_norm(&self) -> f64 {
        self.r2.norm()
    }

    /// Electron-electron separation |r1 - r2|.
    pub fn separation(&self) -> f64 {
        (self.r1 - self.r2).norm()
    }

    /// New configuration with each electron moved by its own displacement.
    pub fn displaced(&self, d1: &Vector3<f64>, d2: &Vector3<f64>) -> Self {
        Self {
            r1: self.r1 + d1,
            r2: self.r2 + d2,
        }
    }

    /// Position of electron `i` (0 or 1).
    pub fn electron(&self, i: usize) -> &Vector3<f64> {
        match i {
            0 => &self.r1,
            _ => &self.r2,
        }
    }

    pub fn electron_mut(&mut self, i: usize) -> &mut Vector3<f64> {
        match i {
            0 => &mut self.r1,
            _ => &mut self.r2,
        }
    }

    /// The same configuration with electron labels swapped.
    pub fn swapped(&self) -> Self {
        Self {
            r1: self.r2,
            r2: self.r1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_distances() {
        let pair = ElectronPair::new(Vector3::new(3.0, 0.0, 4.0), Vector3::new(0.0, 1.0, 0.0));
        assert_relative_eq!(pair.r1_norm(), 5.0, epsilon = 1e-12);
        assert_relative_eq!(pair.r2_norm(), 1.0, epsilon = 1e-12);
        assert_relative_eq!(pair.separation(), (9.0f64 + 1.0 + 16.0).sqrt(), epsilon = 1e-12);
        assert_relative_eq!(pair.swapped().separation(), pair.separation(), epsilon = 1e-12);
    }

    #[test]
    fn test_displaced_moves_each_electron_independently() {
        let pair = ElectronPair::new(Vector3::zeros(), Vector3::new(1.0, 1.0, 1.0));
        let moved = pair.displaced(&Vector3::new(0.5, 0.0, 0.0), &Vector3::new(0.0, 0.0, -1.0));
        assert_eq!(moved.r1, Vector3::new(0.5, 0.0, 0.0));
        assert_eq!(moved.r2, Vector3::new(1.0, 1.0, 0.0));
        assert_eq!(*moved.electron(1), moved.r2);
    }
}
