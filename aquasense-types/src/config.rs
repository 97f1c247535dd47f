//! Configuration types shared by the reconciler and the broker.

use std::collections::BTreeMap;

use crate::{AquaError, Parameter};
use serde::{Deserialize, Serialize};

/// Fixed per-parameter fallback values used when a reading carries no usable value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParameterDefaults {
    /// pH fallback.
    pub ph: f64,
    /// Total dissolved solids fallback (ppm).
    pub tds: f64,
    /// Temperature fallback (°C).
    pub temperature: f64,
    /// Conductivity fallback (µS/cm).
    pub conductivity: f64,
    /// Turbidity fallback (NTU).
    pub turbidity: f64,
}

impl Default for ParameterDefaults {
    fn default() -> Self {
        Self {
            ph: 7.0,
            tds: 250.0,
            temperature: 25.0,
            conductivity: 500.0,
            turbidity: 5.0,
        }
    }
}

impl ParameterDefaults {
    /// Fallback value for `param`.
    #[must_use]
    pub const fn get(&self, param: Parameter) -> f64 {
        match param {
            Parameter::Ph => self.ph,
            Parameter::Tds => self.tds,
            Parameter::Temperature => self.temperature,
            Parameter::Conductivity => self.conductivity,
            Parameter::Turbidity => self.turbidity,
        }
    }

    /// Override the fallback value for `param`.
    pub const fn set(&mut self, param: Parameter, value: f64) {
        match param {
            Parameter::Ph => self.ph = value,
            Parameter::Tds => self.tds = value,
            Parameter::Temperature => self.temperature = value,
            Parameter::Conductivity => self.conductivity = value,
            Parameter::Turbidity => self.turbidity = value,
        }
    }
}

/// Inclusive range of physically plausible values for a parameter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PhysicalRange {
    /// Lowest accepted value.
    pub min: f64,
    /// Highest accepted value.
    pub max: f64,
}

impl PhysicalRange {
    /// Construct a new inclusive range.
    #[must_use]
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// Returns true when `value` lies inside the range.
    #[must_use]
    pub fn contains(&self, value: f64) -> bool {
        (self.min..=self.max).contains(&value)
    }

    /// Ranges the probe firmware clamps or can physically report.
    ///
    /// pH is clamped to 0–14 and turbidity to 0–150 NTU on the device;
    /// dissolved solids and conductivity cannot be negative; the DS18B20
    /// probe is rated for -10–60 °C in water.
    #[must_use]
    pub fn probe_limits() -> BTreeMap<Parameter, Self> {
        BTreeMap::from([
            (Parameter::Ph, Self::new(0.0, 14.0)),
            (Parameter::Tds, Self::new(0.0, f64::MAX)),
            (Parameter::Temperature, Self::new(-10.0, 60.0)),
            (Parameter::Conductivity, Self::new(0.0, f64::MAX)),
            (Parameter::Turbidity, Self::new(0.0, 150.0)),
        ])
    }
}

/// Knobs for the normalizer and window reconciler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ReconcileConfig {
    /// Per-parameter fallback values.
    pub defaults: ParameterDefaults,
    /// Treat firmware fault sentinels (`-1.0`, `-127.0`, `85.0`) as invalid readings.
    pub reject_sensor_faults: bool,
    /// Values outside these ranges are treated as invalid. Parameters without
    /// an entry are accepted as long as they are finite.
    pub physical_ranges: BTreeMap<Parameter, PhysicalRange>,
}

impl ReconcileConfig {
    /// Validate defaults and ranges.
    ///
    /// # Errors
    /// Returns `AquaError::InvalidArg` if a default is not finite or a range is
    /// inverted or not comparable.
    pub fn validate(&self) -> Result<(), AquaError> {
        for param in Parameter::ALL {
            let value = self.defaults.get(param);
            if !value.is_finite() {
                return Err(AquaError::invalid_arg(format!(
                    "default for {param} must be finite, got {value}"
                )));
            }
        }
        for (param, range) in &self.physical_ranges {
            if range.min.is_nan() || range.max.is_nan() || range.min > range.max {
                return Err(AquaError::invalid_arg(format!(
                    "physical range for {param} is invalid: [{}, {}]",
                    range.min, range.max
                )));
            }
        }
        Ok(())
    }
}

/// Global configuration for the subscription broker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerConfig {
    /// How many of the most recent raw records make up one snapshot.
    pub window_size: usize,
    /// Deliver the last reconciled window to consumers as soon as they join.
    ///
    /// When false, late joiners wait for the next snapshot. Individual
    /// consumers may override this.
    pub replay_on_join: bool,
    /// Normalization and reconciliation settings.
    pub reconcile: ReconcileConfig,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            window_size: 50,
            replay_on_join: false,
            reconcile: ReconcileConfig::default(),
        }
    }
}

impl BrokerConfig {
    /// Validate the whole configuration.
    ///
    /// # Errors
    /// Returns `AquaError::InvalidArg` if the window is empty or the
    /// reconcile settings are invalid.
    pub fn validate(&self) -> Result<(), AquaError> {
        if self.window_size == 0 {
            return Err(AquaError::invalid_arg("window_size must be at least 1"));
        }
        self.reconcile.validate()
    }
}
