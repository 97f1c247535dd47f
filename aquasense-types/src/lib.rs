//! Aquasense-specific vocabulary and configuration primitives shared by every crate.
#![warn(missing_docs)]

mod config;
mod error;
mod parameter;

pub use config::{BrokerConfig, ParameterDefaults, PhysicalRange, ReconcileConfig};
pub use error::AquaError;
pub use parameter::Parameter;
