//! Systems module - physical systems for QMC calculations.

mod helium;

pub use helium::{HeliumTrial, LocalEnergy, NUCLEAR_CHARGE};
