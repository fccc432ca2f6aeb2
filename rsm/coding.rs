//! # Variable Coding
//!
//! The experiment was laid out as a central composite design, and the published
//! reduced cubic model is expressed in coded units: each raw factor is centered
//! on the design center and divided by its half range. This module owns that
//! affine transform and its inverse.
//!
//! The same `CodingScheme` value must be used to build the training design matrix
//! and every prediction grid. `FittedModel` stores the scheme it was fitted with,
//! and the surface generator only ever codes through the model, so the two cannot
//! drift apart.
//!
//! No bounds checking is performed. Raw values outside the experimental region
//! code to values outside `[-1, 1]` (or the axial distance) and the polynomial is
//! extrapolated silently; the surface layer reports that condition separately.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Divisor used to code temperature. Fitting and prediction both read it from here.
pub const TEMPERATURE_DIVISOR: f64 = 20.0;

/// Published design center and half range for extraction time (minutes).
pub const TIME_CENTER: f64 = 110.0;
pub const TIME_HALF_RANGE: f64 = 60.0;
/// Published design center for temperature (°C).
pub const TEMPERATURE_CENTER: f64 = 60.0;
/// Published design center and half range for solvent concentration (%).
pub const SOLVENT_CENTER: f64 = 50.0;
pub const SOLVENT_HALF_RANGE: f64 = 30.0;

/// A raw experimental factor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Factor {
    Time,
    Temperature,
    Solvent,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CodingError {
    #[error("Coding for '{factor}' needs a finite, non-zero half range (got {half_range}).")]
    InvalidHalfRange { factor: Factor, half_range: f64 },
    #[error("Coding for '{factor}' needs a finite center (got {center}).")]
    InvalidCenter { factor: Factor, center: f64 },
    #[error("Unknown factor '{0}'. Expected one of: time, temp, solvent.")]
    UnknownFactor(String),
}

impl Factor {
    pub const ALL: [Factor; 3] = [Factor::Time, Factor::Temperature, Factor::Solvent];

    /// Name of the raw column in the experiment table.
    pub fn column(self) -> &'static str {
        match self {
            Factor::Time => "time",
            Factor::Temperature => "temp",
            Factor::Solvent => "solvent",
        }
    }

    /// Name of the coded regressor in formula notation.
    pub fn coded_name(self) -> &'static str {
        match self {
            Factor::Time => "t_cod",
            Factor::Temperature => "T_cod",
            Factor::Solvent => "S_cod",
        }
    }

    pub fn axis_label(self) -> &'static str {
        match self {
            Factor::Time => "Time (min)",
            Factor::Temperature => "Temperature (°C)",
            Factor::Solvent => "Solvent (%)",
        }
    }

    /// Label of the factor as a standalone linear term.
    pub fn term_label(self) -> &'static str {
        match self {
            Factor::Time => "Time",
            Factor::Temperature => "Temperature",
            Factor::Solvent => "Solvent %",
        }
    }

    /// Abbreviation used inside compound term labels and panel titles.
    pub fn short_label(self) -> &'static str {
        match self {
            Factor::Time => "Time",
            Factor::Temperature => "Temp",
            Factor::Solvent => "Solvent",
        }
    }
}

impl fmt::Display for Factor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}

impl FromStr for Factor {
    type Err = CodingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "time" | "t" => Ok(Factor::Time),
            "temp" | "temperature" => Ok(Factor::Temperature),
            "solvent" | "solv" => Ok(Factor::Solvent),
            _ => Err(CodingError::UnknownFactor(s.to_string())),
        }
    }
}

/// One raw experimental condition.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RawFactors {
    pub time: f64,
    pub temperature: f64,
    pub solvent: f64,
}

impl RawFactors {
    pub fn new(time: f64, temperature: f64, solvent: f64) -> Self {
        Self {
            time,
            temperature,
            solvent,
        }
    }

    pub fn get(&self, factor: Factor) -> f64 {
        match factor {
            Factor::Time => self.time,
            Factor::Temperature => self.temperature,
            Factor::Solvent => self.solvent,
        }
    }

    pub fn set(&mut self, factor: Factor, value: f64) {
        match factor {
            Factor::Time => self.time = value,
            Factor::Temperature => self.temperature = value,
            Factor::Solvent => self.solvent = value,
        }
    }
}

/// One condition in coded units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CodedFactors {
    pub t: f64,
    pub T: f64,
    pub S: f64,
}

impl CodedFactors {
    pub fn get(&self, factor: Factor) -> f64 {
        match factor {
            Factor::Time => self.t,
            Factor::Temperature => self.T,
            Factor::Solvent => self.S,
        }
    }
}

/// Centering and scaling of a single factor: `coded = (raw - center) / half_range`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AxisCoding {
    pub center: f64,
    pub half_range: f64,
}

impl AxisCoding {
    pub fn code(&self, raw: f64) -> f64 {
        (raw - self.center) / self.half_range
    }

    pub fn decode(&self, coded: f64) -> f64 {
        coded * self.half_range + self.center
    }
}

/// The full coding of the three design factors.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CodingScheme {
    pub time: AxisCoding,
    pub temperature: AxisCoding,
    pub solvent: AxisCoding,
}

impl Default for CodingScheme {
    /// The coding of the published central composite design.
    fn default() -> Self {
        Self {
            time: AxisCoding {
                center: TIME_CENTER,
                half_range: TIME_HALF_RANGE,
            },
            temperature: AxisCoding {
                center: TEMPERATURE_CENTER,
                half_range: TEMPERATURE_DIVISOR,
            },
            solvent: AxisCoding {
                center: SOLVENT_CENTER,
                half_range: SOLVENT_HALF_RANGE,
            },
        }
    }
}

impl CodingScheme {
    /// Builds a custom scheme, rejecting codings that would divide by zero or
    /// poison every regressor with NaN.
    pub fn new(
        time: AxisCoding,
        temperature: AxisCoding,
        solvent: AxisCoding,
    ) -> Result<Self, CodingError> {
        let scheme = Self {
            time,
            temperature,
            solvent,
        };
        for factor in Factor::ALL {
            let axis = scheme.axis(factor);
            if !axis.center.is_finite() {
                return Err(CodingError::InvalidCenter {
                    factor,
                    center: axis.center,
                });
            }
            if !axis.half_range.is_finite() || axis.half_range == 0.0 {
                return Err(CodingError::InvalidHalfRange {
                    factor,
                    half_range: axis.half_range,
                });
            }
        }
        Ok(scheme)
    }

    pub fn axis(&self, factor: Factor) -> &AxisCoding {
        match factor {
            Factor::Time => &self.time,
            Factor::Temperature => &self.temperature,
            Factor::Solvent => &self.solvent,
        }
    }

    /// Raw value at the design center for `factor`.
    pub fn center(&self, factor: Factor) -> f64 {
        self.axis(factor).center
    }

    pub fn code(&self, raw: &RawFactors) -> CodedFactors {
        CodedFactors {
            t: self.time.code(raw.time),
            T: self.temperature.code(raw.temperature),
            S: self.solvent.code(raw.solvent),
        }
    }

    pub fn decode(&self, coded: &CodedFactors) -> RawFactors {
        RawFactors {
            time: self.time.decode(coded.t),
            temperature: self.temperature.decode(coded.T),
            solvent: self.solvent.decode(coded.S),
        }
    }
}

/// Codes one raw condition with the published design constants.
pub fn code(raw_time: f64, raw_temp: f64, raw_solvent: f64) -> (f64, f64, f64) {
    let coded = CodingScheme::default().code(&RawFactors::new(raw_time, raw_temp, raw_solvent));
    (coded.t, coded.T, coded.S)
}

/// Inverse of [`code`].
pub fn decode(t_cod: f64, T_cod: f64, S_cod: f64) -> (f64, f64, f64) {
    let raw = CodingScheme::default().decode(&CodedFactors {
        t: t_cod,
        T: T_cod,
        S: S_cod,
    });
    (raw.time, raw.temperature, raw.solvent)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    #[test]
    fn design_center_codes_to_origin() {
        let (t, T, S) = code(110.0, 60.0, 50.0);
        assert_eq!((t, T, S), (0.0, 0.0, 0.0));
    }

    #[test]
    fn factorial_corners_code_to_unit_levels() {
        let (t, T, S) = code(170.0, 80.0, 80.0);
        assert_abs_diff_eq!(t, 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(T, 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(S, 1.0, epsilon = 1e-12);

        let (t, T, S) = code(50.0, 40.0, 20.0);
        assert_abs_diff_eq!(t, -1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(T, -1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(S, -1.0, epsilon = 1e-12);
    }

    #[test]
    fn temperature_uses_the_shared_divisor() {
        let scheme = CodingScheme::default();
        assert_eq!(scheme.temperature.half_range, TEMPERATURE_DIVISOR);
        let (_, T, _) = code(60.0 + TEMPERATURE_DIVISOR, 60.0 + TEMPERATURE_DIVISOR, 50.0);
        assert_abs_diff_eq!(T, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn round_trip_reproduces_raw_values() {
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..1_000 {
            let time = rng.gen_range(-500.0..500.0);
            let temp = rng.gen_range(-100.0..200.0);
            let solvent = rng.gen_range(-50.0..150.0);
            let (t, T, S) = code(time, temp, solvent);
            let (time_back, temp_back, solvent_back) = decode(t, T, S);
            assert_abs_diff_eq!(time_back, time, epsilon = 1e-9);
            assert_abs_diff_eq!(temp_back, temp, epsilon = 1e-9);
            assert_abs_diff_eq!(solvent_back, solvent, epsilon = 1e-9);
        }
    }

    #[test]
    fn coding_is_deterministic() {
        let raw = RawFactors::new(123.4, 71.9, 33.3);
        let scheme = CodingScheme::default();
        let first = scheme.code(&raw);
        let second = scheme.code(&raw);
        assert_eq!(first.t.to_bits(), second.t.to_bits());
        assert_eq!(first.T.to_bits(), second.T.to_bits());
        assert_eq!(first.S.to_bits(), second.S.to_bits());
    }

    #[test]
    fn out_of_range_values_are_extrapolated_not_rejected() {
        let (t, T, S) = code(400.0, 150.0, 120.0);
        assert!(t > 1.0 && T > 1.0 && S > 1.0);
    }

    #[test]
    fn custom_scheme_rejects_zero_half_range() {
        let defaults = CodingScheme::default();
        let err = CodingScheme::new(
            defaults.time,
            AxisCoding {
                center: 60.0,
                half_range: 0.0,
            },
            defaults.solvent,
        )
        .unwrap_err();
        assert_eq!(
            err,
            CodingError::InvalidHalfRange {
                factor: Factor::Temperature,
                half_range: 0.0
            }
        );
    }

    #[test]
    fn factor_parsing_accepts_column_names() {
        assert_eq!("temp".parse::<Factor>().unwrap(), Factor::Temperature);
        assert_eq!("Temperature".parse::<Factor>().unwrap(), Factor::Temperature);
        assert_eq!("solvent".parse::<Factor>().unwrap(), Factor::Solvent);
        assert!("pressure".parse::<Factor>().is_err());
    }
}
