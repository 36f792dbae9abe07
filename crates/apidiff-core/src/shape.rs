//! Capability trait through which the diff engine walks domain models.
//!
//! Anything that can describe itself as a scalar, a record of named fields,
//! or an ordered collection can be compared. [`Node`](crate::Node) implements
//! the trait for dynamically parsed payloads; typed domain models implement it
//! by listing their fields.
//!
//! ```
//! use apidiff_core::{Comparable, Field, Shape};
//!
//! struct Order {
//!     status: String,
//!     total: i64,
//! }
//!
//! impl Comparable for Order {
//!     fn shape(&self) -> Shape<'_> {
//!         Shape::Record(vec![
//!             Field::new("Status", &self.status),
//!             Field::new("Total", &self.total),
//!         ])
//!     }
//! }
//!
//! let order = Order { status: "Open".into(), total: 3 };
//! assert_eq!(order.type_name(), "Order");
//! assert!(matches!(order.shape(), Shape::Record(fields) if fields.len() == 2));
//! ```

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::Number;

/// A value the diff engine can traverse.
pub trait Comparable {
    /// Short declared type name, used by type-based smart rules and grouping.
    ///
    /// The default derives it from the Rust type name with module path and
    /// generic arguments stripped.
    fn type_name(&self) -> &'static str {
        short_type_name(std::any::type_name::<Self>())
    }

    /// Describes the value to the engine.
    fn shape(&self) -> Shape<'_>;
}

/// How a value presents itself to the diff engine.
pub enum Shape<'a> {
    /// Null, `None`, or a field missing from the payload.
    Absent,
    /// A leaf value.
    Scalar(Scalar<'a>),
    /// Named fields in declared order.
    Record(Vec<Field<'a>>),
    /// Ordered elements.
    Collection(Vec<&'a dyn Comparable>),
}

/// A named field of a record.
pub struct Field<'a> {
    /// Field name as it appears in paths.
    pub name: &'a str,
    /// Field value.
    pub value: &'a dyn Comparable,
}

impl<'a> Field<'a> {
    /// Pairs a field name with its value.
    #[must_use]
    pub fn new(name: &'a str, value: &'a dyn Comparable) -> Self {
        Self { name, value }
    }
}

/// Leaf values understood by the engine.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Scalar<'a> {
    /// Boolean flag.
    Bool(bool),
    /// Integer or decimal.
    Number(Number),
    /// Free text.
    Text(&'a str),
    /// Point in time.
    Timestamp(DateTime<Utc>),
    /// Opaque identifier such as a UUID or surrogate key.
    Identifier(&'a str),
}

impl Scalar<'_> {
    /// Indicates whether the scalar holds the default value for its kind.
    ///
    /// ```
    /// # use apidiff_core::{Number, Scalar};
    /// assert!(Scalar::Text("").is_default());
    /// assert!(Scalar::Number(Number::ZERO).is_default());
    /// assert!(!Scalar::Bool(true).is_default());
    /// ```
    #[must_use]
    pub fn is_default(&self) -> bool {
        match self {
            Self::Bool(value) => !value,
            Self::Number(value) => value.is_zero(),
            Self::Text(value) => value.is_empty(),
            Self::Timestamp(value) => is_zero_timestamp(value),
            Self::Identifier(value) => is_nil_identifier(value),
        }
    }

    /// Returns the kind of this scalar.
    #[must_use]
    pub fn kind(&self) -> ValueKind {
        match self {
            Self::Bool(_) => ValueKind::Bool,
            Self::Number(_) => ValueKind::Number,
            Self::Text(_) => ValueKind::Text,
            Self::Timestamp(_) => ValueKind::Timestamp,
            Self::Identifier(_) => ValueKind::Identifier,
        }
    }
}

/// Runtime kind of a value snapshot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum ValueKind {
    /// Explicit null.
    Null,
    /// Boolean.
    Bool,
    /// Number.
    Number,
    /// Text.
    Text,
    /// Timestamp.
    Timestamp,
    /// Identifier.
    Identifier,
    /// Ordered collection.
    List,
    /// Record of named fields.
    Record,
}

impl ValueKind {
    /// Names under which type-based rules may refer to this kind.
    ///
    /// ```
    /// # use apidiff_core::ValueKind;
    /// assert!(ValueKind::Timestamp.aliases().contains(&"DateTime"));
    /// ```
    #[must_use]
    pub fn aliases(self) -> &'static [&'static str] {
        match self {
            Self::Null => &["Null"],
            Self::Bool => &["Bool", "Boolean"],
            Self::Number => &["Number", "Integer", "Decimal", "Double"],
            Self::Text => &["String", "Text"],
            Self::Timestamp => &["Timestamp", "DateTime", "DateTimeOffset"],
            Self::Identifier => &["Identifier", "Guid", "Uuid"],
            Self::List => &["List", "Collection", "Array"],
            Self::Record => &["Record", "Object"],
        }
    }

    /// Case-insensitive check against [`ValueKind::aliases`].
    #[must_use]
    pub fn answers_to(self, name: &str) -> bool {
        self.aliases().iter().any(|alias| alias.eq_ignore_ascii_case(name))
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.aliases()[0])
    }
}

/// Marker for a record field present on only one side.
pub(crate) struct Missing;

impl Comparable for Missing {
    fn type_name(&self) -> &'static str {
        ""
    }

    fn shape(&self) -> Shape<'_> {
        Shape::Absent
    }
}

pub(crate) static MISSING: Missing = Missing;

/// Identity of a traversed value, used by the cycle guard.
pub(crate) fn address(value: &dyn Comparable) -> usize {
    std::ptr::from_ref(value).cast::<()>() as usize
}

pub(crate) fn is_zero_timestamp(value: &DateTime<Utc>) -> bool {
    value.timestamp() == 0 || *value == DateTime::<Utc>::MIN_UTC || is_year_one(value)
}

fn is_year_one(value: &DateTime<Utc>) -> bool {
    use chrono::{Datelike, Timelike};
    value.year() == 1
        && value.ordinal() == 1
        && value.num_seconds_from_midnight() == 0
        && value.nanosecond() == 0
}

pub(crate) fn is_nil_identifier(value: &str) -> bool {
    value.is_empty() || value.chars().all(|ch| ch == '0' || ch == '-')
}

fn short_type_name(full: &'static str) -> &'static str {
    let base = full.split('<').next().unwrap_or(full);
    let base = base.rsplit("::").next().unwrap_or(base);
    base.trim_start_matches('&')
}

impl Comparable for bool {
    fn shape(&self) -> Shape<'_> {
        Shape::Scalar(Scalar::Bool(*self))
    }
}

macro_rules! integer_comparable {
    ($($ty:ty),*) => {
        $(
            impl Comparable for $ty {
                fn shape(&self) -> Shape<'_> {
                    Shape::Scalar(Scalar::Number(Number::from(i64::from(*self))))
                }
            }
        )*
    };
}

integer_comparable!(i8, i16, i32, i64, u8, u16, u32);

impl Comparable for u64 {
    fn shape(&self) -> Shape<'_> {
        Shape::Scalar(Scalar::Number(Number::from(*self)))
    }
}

impl Comparable for usize {
    fn shape(&self) -> Shape<'_> {
        Shape::Scalar(Scalar::Number(Number::from(*self as u64)))
    }
}

impl Comparable for f32 {
    fn shape(&self) -> Shape<'_> {
        float_shape(f64::from(*self))
    }
}

impl Comparable for f64 {
    fn shape(&self) -> Shape<'_> {
        float_shape(*self)
    }
}

fn float_shape(value: f64) -> Shape<'static> {
    match Number::finite(value) {
        Some(number) => Shape::Scalar(Scalar::Number(number)),
        None if value.is_nan() => Shape::Scalar(Scalar::Text("NaN")),
        None if value > 0.0 => Shape::Scalar(Scalar::Text("inf")),
        None => Shape::Scalar(Scalar::Text("-inf")),
    }
}

impl Comparable for str {
    fn shape(&self) -> Shape<'_> {
        Shape::Scalar(Scalar::Text(self))
    }
}

impl Comparable for String {
    fn shape(&self) -> Shape<'_> {
        Shape::Scalar(Scalar::Text(self))
    }
}

impl Comparable for DateTime<Utc> {
    fn shape(&self) -> Shape<'_> {
        Shape::Scalar(Scalar::Timestamp(*self))
    }
}

impl<T: Comparable> Comparable for Option<T> {
    fn type_name(&self) -> &'static str {
        match self {
            Some(value) => value.type_name(),
            None => short_type_name(std::any::type_name::<T>()),
        }
    }

    fn shape(&self) -> Shape<'_> {
        match self {
            Some(value) => value.shape(),
            None => Shape::Absent,
        }
    }
}

impl<T: Comparable> Comparable for Vec<T> {
    fn shape(&self) -> Shape<'_> {
        self.as_slice().shape()
    }
}

impl<T: Comparable> Comparable for [T] {
    fn type_name(&self) -> &'static str {
        "List"
    }

    fn shape(&self) -> Shape<'_> {
        Shape::Collection(self.iter().map(|item| item as &dyn Comparable).collect())
    }
}

impl<T: Comparable> Comparable for BTreeMap<String, T> {
    fn shape(&self) -> Shape<'_> {
        Shape::Record(
            self.iter().map(|(name, value)| Field::new(name, value as &dyn Comparable)).collect(),
        )
    }
}

impl<T: Comparable + ?Sized> Comparable for Box<T> {
    fn type_name(&self) -> &'static str {
        (**self).type_name()
    }

    fn shape(&self) -> Shape<'_> {
        (**self).shape()
    }
}

impl<T: Comparable + ?Sized> Comparable for &T {
    fn type_name(&self) -> &'static str {
        (**self).type_name()
    }

    fn shape(&self) -> Shape<'_> {
        (**self).shape()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn default_type_names_are_short() {
        assert_eq!(Comparable::type_name(&String::new()), "String");
        assert_eq!(Comparable::type_name(&7_i64), "i64");
        assert_eq!(Comparable::type_name(&Utc::now()), "DateTime");
        assert_eq!(Comparable::type_name(&Vec::<i32>::new()), "Vec");
    }

    #[test]
    fn none_reports_inner_declared_type() {
        let missing: Option<DateTime<Utc>> = None;
        assert_eq!(missing.type_name(), "DateTime");
        assert!(matches!(missing.shape(), Shape::Absent));
    }

    #[test]
    fn zero_dates_are_defaults() {
        let epoch = Utc.timestamp_opt(0, 0).unwrap();
        let year_one = Utc.with_ymd_and_hms(1, 1, 1, 0, 0, 0).unwrap();
        let real = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        assert!(Scalar::Timestamp(epoch).is_default());
        assert!(Scalar::Timestamp(year_one).is_default());
        assert!(!Scalar::Timestamp(real).is_default());
    }

    #[test]
    fn nil_uuid_is_default_identifier() {
        assert!(Scalar::Identifier("00000000-0000-0000-0000-000000000000").is_default());
        assert!(!Scalar::Identifier("7f1c").is_default());
    }

    #[test]
    fn non_finite_floats_become_text() {
        assert!(matches!(f64::NAN.shape(), Shape::Scalar(Scalar::Text("NaN"))));
        assert!(matches!(1.5_f64.shape(), Shape::Scalar(Scalar::Number(_))));
    }
}
