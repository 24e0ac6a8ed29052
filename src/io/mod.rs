//! IO module - configuration file handling.

mod config;

pub use config::{parse_config, read_config, VmcConfig};
