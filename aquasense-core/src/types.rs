//! Re-export of foundational types from `aquasense-types`.
// Consolidated re-exports so downstream crates can depend on `aquasense-core` only

pub use aquasense_types::{
    AquaError, BrokerConfig, Parameter, ParameterDefaults, PhysicalRange, ReconcileConfig,
};
