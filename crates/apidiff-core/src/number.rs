use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Number as JsonNumber;

use crate::CanonicalizeError;

const TWO_POW_63: f64 = 9_223_372_036_854_775_808.0;
const TWO_POW_64: f64 = 18_446_744_073_709_551_616.0;

/// Numeric scalar.
///
/// Integers keep their exact value; identifiers above 2^53 that differ in
/// the last digit compare unequal. A float equals an integer only when it
/// holds exactly that integral value, so `5` and `5.0` compare equal.
#[derive(Clone, Copy, Debug)]
pub struct Number(Repr);

#[derive(Clone, Copy, Debug)]
enum Repr {
    Int(i64),
    // Only values above `i64::MAX`.
    UInt(u64),
    Float(f64),
}

impl Number {
    /// Zero, the default value for numeric fields.
    pub const ZERO: Self = Self(Repr::Int(0));

    /// Creates a new [`Number`] after validating finiteness.
    ///
    /// ```
    /// # use apidiff_core::Number;
    /// let num = Number::new(42.0)?;
    /// assert_eq!(num.get(), 42.0);
    /// assert!(Number::new(f64::NAN).is_err());
    /// # Ok::<(), apidiff_core::CanonicalizeError>(())
    /// ```
    pub fn new(value: f64) -> Result<Self, CanonicalizeError> {
        Self::finite(value).ok_or(CanonicalizeError::NotFinite { value })
    }

    /// Builds a number from a float, mapping non-finite values to `None`.
    #[must_use]
    pub(crate) fn finite(value: f64) -> Option<Self> {
        value.is_finite().then_some(Self(Repr::Float(value)))
    }

    /// Converts a JSON or YAML number, preferring the exact integer forms.
    pub(crate) fn from_parts(
        as_i64: Option<i64>,
        as_u64: Option<u64>,
        as_f64: Option<f64>,
    ) -> Option<Self> {
        as_i64
            .map(Self::from)
            .or_else(|| as_u64.map(Self::from))
            .or_else(|| as_f64.and_then(Self::finite))
    }

    /// Returns the value as a float. Integers beyond 2^53 lose precision.
    #[must_use]
    pub fn get(self) -> f64 {
        match self.0 {
            Repr::Int(v) => v as f64,
            Repr::UInt(v) => v as f64,
            Repr::Float(v) => v,
        }
    }

    /// Returns the exact integer value, if the number holds one that fits `i64`.
    ///
    /// ```
    /// # use apidiff_core::Number;
    /// assert_eq!(Number::from(9_007_199_254_740_993_i64).as_i64(), Some(9_007_199_254_740_993));
    /// assert_eq!(Number::new(1.5)?.as_i64(), None);
    /// # Ok::<(), apidiff_core::CanonicalizeError>(())
    /// ```
    #[must_use]
    pub fn as_i64(self) -> Option<i64> {
        match self.0 {
            Repr::Int(v) => Some(v),
            Repr::UInt(_) => None,
            Repr::Float(f) => float_as_i64(f),
        }
    }

    /// Indicates whether the value is zero (of either sign).
    #[must_use]
    pub fn is_zero(self) -> bool {
        match self.0 {
            Repr::Int(v) => v == 0,
            Repr::UInt(_) => false,
            Repr::Float(v) => v == 0.0,
        }
    }

    /// Converts the number into a `serde_json::Number`, using an integer
    /// representation when possible.
    #[must_use]
    pub fn to_json_number(self) -> JsonNumber {
        match self.0 {
            Repr::Int(v) => JsonNumber::from(v),
            Repr::UInt(v) => JsonNumber::from(v),
            Repr::Float(f) if f == 0.0 && f.is_sign_negative() => {
                JsonNumber::from_f64(f).unwrap_or_else(|| JsonNumber::from(0))
            }
            Repr::Float(f) => match (float_as_i64(f), float_as_u64(f)) {
                (Some(v), _) => JsonNumber::from(v),
                (None, Some(v)) => JsonNumber::from(v),
                (None, None) => JsonNumber::from_f64(f).unwrap_or_else(|| JsonNumber::from(0)),
            },
        }
    }
}

fn float_as_i64(f: f64) -> Option<i64> {
    (f.fract() == 0.0 && (-TWO_POW_63..TWO_POW_63).contains(&f)).then(|| f as i64)
}

fn float_as_u64(f: f64) -> Option<u64> {
    (f.fract() == 0.0 && (0.0..TWO_POW_64).contains(&f)).then(|| f as u64)
}

impl From<i64> for Number {
    fn from(value: i64) -> Self {
        Self(Repr::Int(value))
    }
}

impl From<u64> for Number {
    fn from(value: u64) -> Self {
        match i64::try_from(value) {
            Ok(v) => Self(Repr::Int(v)),
            Err(_) => Self(Repr::UInt(value)),
        }
    }
}

impl PartialEq for Number {
    fn eq(&self, other: &Self) -> bool {
        match (self.0, other.0) {
            (Repr::Int(a), Repr::Int(b)) => a == b,
            (Repr::UInt(a), Repr::UInt(b)) => a == b,
            (Repr::Float(a), Repr::Float(b)) => a == b,
            (Repr::Int(i), Repr::Float(f)) | (Repr::Float(f), Repr::Int(i)) => {
                float_as_i64(f) == Some(i)
            }
            (Repr::UInt(u), Repr::Float(f)) | (Repr::Float(f), Repr::UInt(u)) => {
                float_as_u64(f) == Some(u)
            }
            (Repr::Int(_), Repr::UInt(_)) | (Repr::UInt(_), Repr::Int(_)) => false,
        }
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_json_number())
    }
}

impl Serialize for Number {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json_number().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Number {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let number = JsonNumber::deserialize(deserializer)?;
        Self::from_parts(number.as_i64(), number.as_u64(), number.as_f64())
            .ok_or_else(|| serde::de::Error::custom(format!("number {number} is out of range")))
    }
}
