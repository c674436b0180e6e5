//! Resource quantities
//!
//! A minimal Kubernetes-compatible `Quantity`: it is carried around in its
//! original string form, parsed on demand, and new quantities can be rendered
//! in the same style (binary or decimal suffixes) as the value they were
//! derived from.

use schemars::{JsonSchema, Schema, SchemaGenerator, json_schema};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::borrow::Cow;
use std::fmt;
use thiserror::Error;

/// Errors raised while interpreting a quantity string.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum QuantityError {
    /// The string is not a valid quantity
    #[error("invalid quantity: {0:?}")]
    Invalid(String),

    /// The quantity does not fit into a signed 64-bit integer
    #[error("quantity out of range: {0:?}")]
    OutOfRange(String),
}

/// Suffix family a quantity was written with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QuantityFormat {
    /// Powers of 1024 (`Ki`, `Mi`, `Gi`, ...)
    BinarySI,
    /// Powers of 1000 (`k`, `M`, `G`, ...), milli and plain integers
    #[default]
    DecimalSI,
}

const BINARY_SUFFIXES: &[(&str, u32)] = &[("Ki", 1), ("Mi", 2), ("Gi", 3), ("Ti", 4), ("Pi", 5), ("Ei", 6)];
const DECIMAL_SUFFIXES: &[(&str, u32)] = &[("k", 1), ("M", 2), ("G", 3), ("T", 4), ("P", 5), ("E", 6)];

/// A Kubernetes resource quantity such as `2Gi`, `512M` or `1500`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Quantity(pub String);

impl Quantity {
    /// Wraps a quantity string without validating it.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns the quantity as written.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the suffix family of this quantity.
    ///
    /// Unparseable quantities report `DecimalSI`.
    #[must_use]
    pub fn format(&self) -> QuantityFormat {
        let trimmed = self.0.trim();
        if BINARY_SUFFIXES.iter().any(|(suffix, _)| trimmed.ends_with(suffix)) {
            QuantityFormat::BinarySI
        } else {
            QuantityFormat::DecimalSI
        }
    }

    /// Returns the integer value of the quantity, rounded up away from zero.
    pub fn value(&self) -> Result<i64, QuantityError> {
        let raw = self.0.trim();
        let invalid = || QuantityError::Invalid(self.0.clone());
        let out_of_range = || QuantityError::OutOfRange(self.0.clone());

        let (negative, unsigned) = match raw.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, raw.strip_prefix('+').unwrap_or(raw)),
        };

        let number_end = unsigned
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(unsigned.len());
        let (number, suffix) = unsigned.split_at(number_end);
        if number.is_empty() || number == "." || number.matches('.').count() > 1 {
            return Err(invalid());
        }

        let (whole, fraction) = number.split_once('.').unwrap_or((number, ""));
        let digits = format!("{whole}{fraction}");
        let mantissa: i128 = digits.parse().map_err(|_| out_of_range())?;
        let mut numerator = mantissa;
        let mut denominator: i128 = 10_i128
            .checked_pow(u32::try_from(fraction.len()).map_err(|_| invalid())?)
            .ok_or_else(out_of_range)?;

        let (base, exponent): (i128, i32) = match suffix {
            "" => (10, 0),
            "m" => (10, -3),
            _ => {
                if let Some((_, power)) = BINARY_SUFFIXES.iter().find(|(s, _)| *s == suffix) {
                    (1024, i32::try_from(*power).map_err(|_| invalid())?)
                } else if let Some((_, power)) = DECIMAL_SUFFIXES.iter().find(|(s, _)| *s == suffix) {
                    (1000, i32::try_from(*power).map_err(|_| invalid())?)
                } else if let Some(exp) = suffix.strip_prefix(['e', 'E']) {
                    (10, exp.parse::<i32>().map_err(|_| invalid())?)
                } else {
                    return Err(invalid());
                }
            }
        };

        let scale = base
            .checked_pow(exponent.unsigned_abs())
            .ok_or_else(out_of_range)?;
        if exponent >= 0 {
            numerator = numerator.checked_mul(scale).ok_or_else(out_of_range)?;
        } else {
            denominator = denominator.checked_mul(scale).ok_or_else(out_of_range)?;
        }

        let mut value = numerator / denominator;
        if numerator % denominator != 0 {
            value += 1;
        }
        if negative {
            value = -value;
        }
        i64::try_from(value).map_err(|_| out_of_range())
    }

    /// Renders an integer value in canonical form for the given format.
    ///
    /// Binary values that are not an exact multiple of a binary suffix fall
    /// back to decimal rendering, so `1932735283` stays a plain integer.
    #[must_use]
    pub fn from_value(value: i64, format: QuantityFormat) -> Self {
        if value == 0 {
            return Self("0".to_string());
        }

        if format == QuantityFormat::BinarySI && value.unsigned_abs() >= 1024 {
            if let Some(rendered) = render_with(value, 1024, BINARY_SUFFIXES) {
                return Self(rendered);
            }
        }

        Self(render_with(value, 1000, DECIMAL_SUFFIXES).unwrap_or_else(|| value.to_string()))
    }
}

/// Picks the largest suffix that divides `value` exactly.
fn render_with(value: i64, base: i64, suffixes: &[(&str, u32)]) -> Option<String> {
    suffixes.iter().rev().find_map(|(suffix, power)| {
        let scale = base.checked_pow(*power)?;
        (value % scale == 0).then(|| format!("{}{}", value / scale, suffix))
    })
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Quantity {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl Serialize for Quantity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Quantity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Signed(i64),
            Float(f64),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Text(text) => Self(text),
            Raw::Signed(number) => Self(number.to_string()),
            Raw::Float(number) => Self(number.to_string()),
        })
    }
}

impl JsonSchema for Quantity {
    fn schema_name() -> Cow<'static, str> {
        "Quantity".into()
    }

    fn json_schema(_generator: &mut SchemaGenerator) -> Schema {
        json_schema!({
            "anyOf": [{ "type": "integer" }, { "type": "string" }],
            "x-kubernetes-int-or-string": true
        })
    }
}
