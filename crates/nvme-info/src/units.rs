// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Closed unit vocabulary and the conversion table that drives coercion.
//!
//! Every [`Unit`] belongs to exactly one [`Dimension`]. Conversions exist only
//! between units of the same dimension; anything else is rejected rather than
//! guessed. Temperature conversions are affine (`factor` and `offset`), every
//! other conversion is a pure scale.

use serde::{Deserialize, Serialize};

/// SMART data units are reported in thousands of 512-byte sectors.
pub const DATA_UNIT_BYTES: u128 = 512_000;

/// Kelvin-to-Celsius offset used throughout the decoder.
pub const KELVIN_OFFSET: f64 = 273.0;

/// Mean hours per year (365.25 days).
pub const HOURS_PER_YEAR: f64 = 8766.0;

/// Unit symbol attached to every field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Unit {
    /// Dimensionless, no unit shown.
    #[serde(rename = "none")]
    Unitless,
    /// Event or item count.
    #[serde(rename = "count")]
    Count,
    /// Bytes.
    #[serde(rename = "B")]
    Bytes,
    /// 2^10 bytes.
    #[serde(rename = "KiB")]
    KiB,
    /// 2^20 bytes.
    #[serde(rename = "MiB")]
    MiB,
    /// 2^30 bytes.
    #[serde(rename = "GiB")]
    GiB,
    /// 2^40 bytes.
    #[serde(rename = "TiB")]
    TiB,
    /// 10^3 bytes.
    #[serde(rename = "KB")]
    Kb,
    /// 10^6 bytes.
    #[serde(rename = "MB")]
    Mb,
    /// 10^9 bytes.
    #[serde(rename = "GB")]
    Gb,
    /// 10^12 bytes.
    #[serde(rename = "TB")]
    Tb,
    /// SMART data unit (512 000 bytes).
    #[serde(rename = "du")]
    DataUnits,
    /// Logical blocks of the namespace's current format.
    #[serde(rename = "lba")]
    Blocks,
    /// Kelvin.
    #[serde(rename = "K")]
    Kelvin,
    /// Degrees Celsius.
    #[serde(rename = "°C")]
    Celsius,
    /// Microseconds.
    #[serde(rename = "us")]
    Micros,
    /// Milliseconds.
    #[serde(rename = "ms")]
    Millis,
    /// Seconds.
    #[serde(rename = "s")]
    Seconds,
    /// Minutes.
    #[serde(rename = "min")]
    Minutes,
    /// Hours.
    #[serde(rename = "h")]
    Hours,
    /// Days.
    #[serde(rename = "d")]
    Days,
    /// Years of 365.25 days.
    #[serde(rename = "y")]
    Years,
    /// Percent (0..=100 nominal).
    #[serde(rename = "%")]
    Percent,
    /// Plain fraction (0..=1 nominal).
    #[serde(rename = "ratio")]
    Ratio,
    /// Percent of endurance per day.
    #[serde(rename = "%/d")]
    PercentPerDay,
    /// GiB written per day.
    #[serde(rename = "GiB/d")]
    GibPerDay,
    /// Watts.
    #[serde(rename = "W")]
    Watts,
}

/// Physical dimension a unit measures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dimension {
    /// No dimension; converts only to itself.
    Scalar,
    /// Event counts.
    Count,
    /// Storage size.
    Size,
    /// Logical blocks (format dependent, never converted).
    Blocks,
    /// Temperature.
    Temperature,
    /// Elapsed time.
    Time,
    /// Fractions and percentages.
    Fraction,
    /// Wear rate.
    WearRate,
    /// Write volume per day.
    DataRate,
    /// Electrical power.
    Power,
}

/// An affine conversion `to = from * factor + offset`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Conversion {
    /// Multiplicative factor.
    pub factor: f64,
    /// Additive offset applied after scaling.
    pub offset: f64,
}

impl Conversion {
    /// The identity conversion.
    pub const IDENTITY: Self = Self {
        factor: 1.0,
        offset: 0.0,
    };

    /// Apply the conversion to a real value.
    pub fn apply(&self, value: f64) -> f64 {
        value * self.factor + self.offset
    }

    /// Whether this conversion leaves values unchanged.
    pub fn is_identity(&self) -> bool {
        (self.factor - 1.0).abs() < f64::EPSILON && self.offset == 0.0
    }
}

/// All units, in vocabulary order.
pub const ALL_UNITS: [Unit; 27] = [
    Unit::Unitless,
    Unit::Count,
    Unit::Bytes,
    Unit::KiB,
    Unit::MiB,
    Unit::GiB,
    Unit::TiB,
    Unit::Kb,
    Unit::Mb,
    Unit::Gb,
    Unit::Tb,
    Unit::DataUnits,
    Unit::Blocks,
    Unit::Kelvin,
    Unit::Celsius,
    Unit::Micros,
    Unit::Millis,
    Unit::Seconds,
    Unit::Minutes,
    Unit::Hours,
    Unit::Days,
    Unit::Years,
    Unit::Percent,
    Unit::Ratio,
    Unit::PercentPerDay,
    Unit::GibPerDay,
    Unit::Watts,
];

impl Unit {
    /// Canonical symbol as written in rule files and output.
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Unitless => "none",
            Self::Count => "count",
            Self::Bytes => "B",
            Self::KiB => "KiB",
            Self::MiB => "MiB",
            Self::GiB => "GiB",
            Self::TiB => "TiB",
            Self::Kb => "KB",
            Self::Mb => "MB",
            Self::Gb => "GB",
            Self::Tb => "TB",
            Self::DataUnits => "du",
            Self::Blocks => "lba",
            Self::Kelvin => "K",
            Self::Celsius => "°C",
            Self::Micros => "us",
            Self::Millis => "ms",
            Self::Seconds => "s",
            Self::Minutes => "min",
            Self::Hours => "h",
            Self::Days => "d",
            Self::Years => "y",
            Self::Percent => "%",
            Self::Ratio => "ratio",
            Self::PercentPerDay => "%/d",
            Self::GibPerDay => "GiB/d",
            Self::Watts => "W",
        }
    }

    /// Parse a unit symbol. `degC` and `C` are accepted as ASCII spellings of `°C`.
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        match symbol {
            "degC" | "C" => return Some(Self::Celsius),
            "" => return None,
            _ => {}
        }
        ALL_UNITS.iter().copied().find(|u| u.symbol() == symbol)
    }

    /// Dimension this unit measures.
    pub fn dimension(self) -> Dimension {
        match self {
            Self::Unitless => Dimension::Scalar,
            Self::Count => Dimension::Count,
            Self::Bytes
            | Self::KiB
            | Self::MiB
            | Self::GiB
            | Self::TiB
            | Self::Kb
            | Self::Mb
            | Self::Gb
            | Self::Tb
            | Self::DataUnits => Dimension::Size,
            Self::Blocks => Dimension::Blocks,
            Self::Kelvin | Self::Celsius => Dimension::Temperature,
            Self::Micros
            | Self::Millis
            | Self::Seconds
            | Self::Minutes
            | Self::Hours
            | Self::Days
            | Self::Years => Dimension::Time,
            Self::Percent | Self::Ratio => Dimension::Fraction,
            Self::PercentPerDay => Dimension::WearRate,
            Self::GibPerDay => Dimension::DataRate,
            Self::Watts => Dimension::Power,
        }
    }

    /// Whether the unit symbol is worth printing next to a value.
    pub fn is_displayed(self) -> bool {
        !matches!(self, Self::Unitless | Self::Count)
    }

    // Base units: bytes, kelvin, seconds, ratio.
    fn to_base(self) -> Conversion {
        let factor = match self {
            Self::KiB => 1024.0,
            Self::MiB => 1024.0 * 1024.0,
            Self::GiB => 1024.0 * 1024.0 * 1024.0,
            Self::TiB => 1024.0 * 1024.0 * 1024.0 * 1024.0,
            Self::Kb => 1e3,
            Self::Mb => 1e6,
            Self::Gb => 1e9,
            Self::Tb => 1e12,
            Self::DataUnits => DATA_UNIT_BYTES as f64,
            Self::Celsius => {
                return Conversion {
                    factor: 1.0,
                    offset: KELVIN_OFFSET,
                }
            }
            Self::Micros => 1e-6,
            Self::Millis => 1e-3,
            Self::Minutes => 60.0,
            Self::Hours => 3600.0,
            Self::Days => 86_400.0,
            Self::Years => HOURS_PER_YEAR * 3600.0,
            Self::Percent => 0.01,
            _ => 1.0,
        };
        Conversion {
            factor,
            offset: 0.0,
        }
    }

    /// Look up the conversion from `self` to `to`.
    ///
    /// Returns `None` when the two units measure different dimensions.
    pub fn conversion_to(self, to: Self) -> Option<Conversion> {
        if self == to {
            return Some(Conversion::IDENTITY);
        }
        if self.dimension() != to.dimension() {
            return None;
        }
        match self.dimension() {
            Dimension::Scalar
            | Dimension::Count
            | Dimension::Blocks
            | Dimension::WearRate
            | Dimension::DataRate
            | Dimension::Power => None,
            _ => {
                let a = self.to_base();
                let b = to.to_base();
                // x_base = x*a.f + a.o ; y = (x_base - b.o) / b.f
                Some(Conversion {
                    factor: a.factor / b.factor,
                    offset: (a.offset - b.offset) / b.factor,
                })
            }
        }
    }
}

impl std::fmt::Display for Unit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.symbol())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9 * b.abs().max(1.0)
    }

    #[test]
    fn symbols_round_trip_through_parser() {
        for unit in ALL_UNITS {
            assert_eq!(Unit::from_symbol(unit.symbol()), Some(unit));
        }
        assert_eq!(Unit::from_symbol("degC"), Some(Unit::Celsius));
        assert_eq!(Unit::from_symbol("furlong"), None);
    }

    #[test]
    fn kelvin_celsius_is_affine() {
        let k_to_c = Unit::Kelvin.conversion_to(Unit::Celsius).unwrap();
        assert!(close(k_to_c.apply(310.0), 37.0));
        let c_to_k = Unit::Celsius.conversion_to(Unit::Kelvin).unwrap();
        assert!(close(c_to_k.apply(37.0), 310.0));
    }

    #[test]
    fn data_units_scale_to_bytes_and_gib() {
        let to_bytes = Unit::DataUnits.conversion_to(Unit::Bytes).unwrap();
        assert!(close(to_bytes.apply(2.0), 1_024_000.0));
        let to_gib = Unit::DataUnits.conversion_to(Unit::GiB).unwrap();
        assert!(close(to_gib.apply(1.0), 512_000.0 / 1_073_741_824.0));
    }

    #[test]
    fn time_and_fraction_conversions() {
        let m = Unit::Minutes.conversion_to(Unit::Seconds).unwrap();
        assert!(close(m.apply(3.0), 180.0));
        let h = Unit::Hours.conversion_to(Unit::Days).unwrap();
        assert!(close(h.apply(48.0), 2.0));
        let p = Unit::Percent.conversion_to(Unit::Ratio).unwrap();
        assert!(close(p.apply(25.0), 0.25));
    }

    #[test]
    fn cross_dimension_conversions_are_rejected() {
        assert!(Unit::Bytes.conversion_to(Unit::Seconds).is_none());
        assert!(Unit::Count.conversion_to(Unit::Unitless).is_none());
        assert!(Unit::Blocks.conversion_to(Unit::Bytes).is_none());
        assert!(Unit::Count.conversion_to(Unit::Count).unwrap().is_identity());
        assert!(Unit::GibPerDay.conversion_to(Unit::GiB).is_none());
        assert!(Unit::GibPerDay.conversion_to(Unit::GibPerDay).unwrap().is_identity());
    }
}
