//! YAML configuration for a VMC run.
//!
//! Every field is optional; missing ones take their defaults.
//!
//! ```yaml
//! sampler:
//!   n_burn_in: 2000
//!   n_samples: 20000
//!   thinning: 1
//!   step_size: 0.5
//!   proposal: uniform
//!   init_radius: 4.0
//!   adaptation:
//!     interval: 100
//!     target_low: 0.4
//!     target_high: 0.6
//!   equilibration:
//!     kind: energy_plateau
//!     window: 25
//! optimizer:
//!   seed: 42
//!   n_chains: 4
//!   strategy:
//!     kind: scan
//!     start: 1.25
//!     step: 0.05
//!     count: 15
//! ```

use serde::{Deserialize, Serialize};
use crate::error::Result;
use crate::sampling::{OptimizerParams, SamplerParams, VariationalOptimizer};

/// Complete run configuration.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VmcConfig {
    pub sampler: SamplerParams,
    pub optimizer: OptimizerParams,
}

impl VmcConfig {
    pub fn validate(&self) -> Result<()> {
        self.sampler.validate()?;
        self.optimizer.validate()
    }

    /// Build the optimizer this configuration describes.
    pub fn optimizer(&self) -> Result<VariationalOptimizer> {
        VariationalOptimizer::new(self.sampler, self.optimizer.clone())
    }
}

/// Read a [`VmcConfig`] from a YAML file.
pub fn read_config(filename: &str) -> Result<VmcConfig> {
    let file = std::fs::File::open(filename)?;
    let reader = std::io::BufReader::new(file);
    let config: VmcConfig = serde_yaml::from_reader(reader)?;
    Ok(config)
}

/// Parse a [`VmcConfig`] from YAML text.
pub fn parse_config(text: &str) -> Result<VmcConfig> {
    Ok(serde_yaml::from_str(text)?)
}
