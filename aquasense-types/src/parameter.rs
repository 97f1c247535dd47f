//! The five monitored water-quality parameters and their field-naming history.

use core::fmt;

use serde::{Deserialize, Serialize};

/// A monitored water-quality parameter.
///
/// The declaration order is the canonical order used everywhere a
/// per-parameter table is iterated (`Parameter::ALL`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Parameter {
    /// Acidity / alkalinity (dimensionless, 0–14).
    Ph,
    /// Total dissolved solids in ppm.
    Tds,
    /// Water temperature in degrees Celsius.
    Temperature,
    /// Electrical conductivity in µS/cm.
    Conductivity,
    /// Turbidity in NTU.
    Turbidity,
}

impl Parameter {
    /// All parameters in canonical order.
    pub const ALL: [Self; 5] = [
        Self::Ph,
        Self::Tds,
        Self::Temperature,
        Self::Conductivity,
        Self::Turbidity,
    ];

    /// Field names this parameter may appear under, in resolution order.
    ///
    /// The first entry is the semantic name; the trailing single-letter keys
    /// are the compact names written by the probe firmware.
    #[must_use]
    pub const fn keys(self) -> &'static [&'static str] {
        match self {
            Self::Ph => &["ph", "pH", "p"],
            Self::Tds => &["tds", "d"],
            Self::Temperature => &["temperature", "temp", "t"],
            Self::Conductivity => &["conductivity", "ec"],
            Self::Turbidity => &["turbidity", "n"],
        }
    }

    /// The semantic (natural) field name.
    #[must_use]
    pub const fn natural_key(self) -> &'static str {
        self.keys()[0]
    }

    /// Display unit for the parameter; empty for pH.
    #[must_use]
    pub const fn unit(self) -> &'static str {
        match self {
            Self::Ph => "",
            Self::Tds => "ppm",
            Self::Temperature => "°C",
            Self::Conductivity => "µS/cm",
            Self::Turbidity => "NTU",
        }
    }

    /// Values the probes emit to signal a hardware read failure rather than a measurement.
    ///
    /// Every analog channel reports `-1.0` on a railed ADC read; the DS18B20
    /// temperature probe additionally reports `-127.0` (disconnected) and
    /// `85.0` (power-on reset value).
    #[must_use]
    pub const fn fault_sentinels(self) -> &'static [f64] {
        match self {
            Self::Temperature => &[-1.0, -127.0, 85.0],
            _ => &[-1.0],
        }
    }

    /// Index of this parameter inside `Parameter::ALL`.
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.natural_key())
    }
}
