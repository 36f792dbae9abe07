use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Serialize, Serializer};
use serde_json::Value as JsonValue;
use serde_yaml::Value as YamlValue;

use crate::shape::{address, is_nil_identifier, is_zero_timestamp};
use crate::{CanonicalizeError, Comparable, Field, Number, Scalar, Shape, ValueKind};

/// Dynamic object graph for payloads without a typed domain model.
///
/// `Node` is also the owned snapshot type stored in
/// [`Difference`](crate::Difference) records.
#[derive(Clone, Debug, PartialEq)]
pub enum Node {
    /// Sentinel representing the absence of a value.
    Void,
    /// Explicit null.
    Null,
    /// Boolean.
    Bool(bool),
    /// Number; integers keep their exact value.
    Number(Number),
    /// String.
    String(String),
    /// Timestamp, recognised from RFC 3339 strings when parsing.
    Timestamp(DateTime<Utc>),
    /// Opaque identifier.
    Identifier(String),
    /// Ordered collection.
    List(Vec<Node>),
    /// Record with deterministic field ordering.
    Record(BTreeMap<String, Node>),
}

impl Node {
    /// Parses a JSON string into a node graph.
    ///
    /// Strings holding RFC 3339 timestamps become [`Node::Timestamp`].
    ///
    /// ```
    /// # use apidiff_core::Node;
    /// let node = Node::from_json_str("{\"createdAt\":\"2024-05-01T10:00:00Z\"}")?;
    /// let Node::Record(fields) = node else { panic!("expected record") };
    /// assert!(matches!(fields["createdAt"], Node::Timestamp(_)));
    /// # Ok::<(), apidiff_core::CanonicalizeError>(())
    /// ```
    pub fn from_json_str(input: &str) -> Result<Self, CanonicalizeError> {
        if input.trim().is_empty() {
            return Ok(Self::Void);
        }
        let value: JsonValue = serde_json::from_str(input)?;
        Self::from_json_value(value)
    }

    /// Parses a YAML string into a node graph.
    ///
    /// ```
    /// # use apidiff_core::Node;
    /// let node = Node::from_yaml_str("---\nanswer: 42\n")?;
    /// assert!(matches!(node, Node::Record(_)));
    /// # Ok::<(), apidiff_core::CanonicalizeError>(())
    /// ```
    pub fn from_yaml_str(input: &str) -> Result<Self, CanonicalizeError> {
        if input.trim().is_empty() {
            return Ok(Self::Void);
        }
        let value: YamlValue = serde_yaml::from_str(input)?;
        Self::from_yaml_value(value)
    }

    /// Converts a serde JSON value into a [`Node`].
    pub fn from_json_value(value: JsonValue) -> Result<Self, CanonicalizeError> {
        match value {
            JsonValue::Null => Ok(Self::Null),
            JsonValue::Bool(v) => Ok(Self::Bool(v)),
            JsonValue::Number(num) => {
                Number::from_parts(num.as_i64(), num.as_u64(), num.as_f64())
                    .map(Self::Number)
                    .ok_or_else(|| CanonicalizeError::NumberOutOfRange {
                        value: num.to_string(),
                    })
            }
            JsonValue::String(s) => Ok(Self::from_text(s)),
            JsonValue::Array(values) => {
                let mut items = Vec::with_capacity(values.len());
                for value in values {
                    items.push(Self::from_json_value(value)?);
                }
                Ok(Self::List(items))
            }
            JsonValue::Object(map) => {
                let mut record = BTreeMap::new();
                for (key, value) in map {
                    record.insert(key, Self::from_json_value(value)?);
                }
                Ok(Self::Record(record))
            }
        }
    }

    fn from_yaml_value(value: YamlValue) -> Result<Self, CanonicalizeError> {
        match value {
            YamlValue::Null => Ok(Self::Null),
            YamlValue::Bool(v) => Ok(Self::Bool(v)),
            YamlValue::Number(num) => {
                if let Some(number) = Number::from_parts(num.as_i64(), num.as_u64(), None) {
                    return Ok(Self::Number(number));
                }
                let value = num.as_f64().unwrap_or(f64::NAN);
                Ok(Self::Number(Number::new(value)?))
            }
            YamlValue::String(s) => Ok(Self::from_text(s)),
            YamlValue::Sequence(seq) => {
                let mut items = Vec::with_capacity(seq.len());
                for value in seq {
                    items.push(Self::from_yaml_value(value)?);
                }
                Ok(Self::List(items))
            }
            YamlValue::Mapping(map) => {
                let mut record = BTreeMap::new();
                for (key, value) in map {
                    let key = match key {
                        YamlValue::String(s) => s,
                        other => {
                            return Err(CanonicalizeError::NonStringYamlKey {
                                found: format!("{other:?}"),
                            });
                        }
                    };
                    record.insert(key, Self::from_yaml_value(value)?);
                }
                Ok(Self::Record(record))
            }
            YamlValue::Tagged(tagged) => {
                Err(CanonicalizeError::UnsupportedYamlTag { tag: tagged.tag.to_string() })
            }
        }
    }

    fn from_text(text: String) -> Self {
        match DateTime::parse_from_rfc3339(&text) {
            Ok(timestamp) => Self::Timestamp(timestamp.with_timezone(&Utc)),
            Err(_) => Self::String(text),
        }
    }

    /// Takes an owned snapshot of any comparable value.
    ///
    /// Back-references in cyclic graphs are cut and recorded as `Null`.
    ///
    /// ```
    /// # use apidiff_core::Node;
    /// let snapshot = Node::snapshot(&vec![1_i32, 2]);
    /// assert_eq!(snapshot, Node::from_json_str("[1,2]")?);
    /// # Ok::<(), apidiff_core::CanonicalizeError>(())
    /// ```
    #[must_use]
    pub fn snapshot(value: &dyn Comparable) -> Self {
        snapshot_guarded(value, &mut HashSet::new())
    }

    /// Returns the runtime kind, or `None` for [`Node::Void`].
    #[must_use]
    pub fn kind(&self) -> Option<ValueKind> {
        match self {
            Self::Void => None,
            Self::Null => Some(ValueKind::Null),
            Self::Bool(_) => Some(ValueKind::Bool),
            Self::Number(_) => Some(ValueKind::Number),
            Self::String(_) => Some(ValueKind::Text),
            Self::Timestamp(_) => Some(ValueKind::Timestamp),
            Self::Identifier(_) => Some(ValueKind::Identifier),
            Self::List(_) => Some(ValueKind::List),
            Self::Record(_) => Some(ValueKind::Record),
        }
    }

    /// Indicates whether the node is absent or null.
    #[must_use]
    pub fn is_absent(&self) -> bool {
        matches!(self, Self::Void | Self::Null)
    }

    /// Indicates whether the node holds the zero/default value for its kind.
    ///
    /// ```
    /// # use apidiff_core::Node;
    /// assert!(Node::from_json_str("0")?.is_default());
    /// assert!(Node::from_json_str("\"\"")?.is_default());
    /// assert!(Node::from_json_str("[]")?.is_default());
    /// assert!(!Node::from_json_str("5")?.is_default());
    /// assert!(!Node::Null.is_default());
    /// # Ok::<(), apidiff_core::CanonicalizeError>(())
    /// ```
    #[must_use]
    pub fn is_default(&self) -> bool {
        match self {
            Self::Void | Self::Null => false,
            Self::Bool(value) => !value,
            Self::Number(value) => value.is_zero(),
            Self::String(value) => value.is_empty(),
            Self::Timestamp(value) => is_zero_timestamp(value),
            Self::Identifier(value) => is_nil_identifier(value),
            Self::List(items) => items.is_empty(),
            Self::Record(fields) => fields.is_empty(),
        }
    }

    /// Converts the node into a serde JSON value; `Void` becomes `null`.
    #[must_use]
    pub fn to_json_value(&self) -> JsonValue {
        match self {
            Self::Void | Self::Null => JsonValue::Null,
            Self::Bool(v) => JsonValue::Bool(*v),
            Self::Number(n) => JsonValue::Number(n.to_json_number()),
            Self::String(s) | Self::Identifier(s) => JsonValue::String(s.clone()),
            Self::Timestamp(t) => JsonValue::String(t.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
            Self::List(values) => {
                JsonValue::Array(values.iter().map(Self::to_json_value).collect())
            }
            Self::Record(map) => {
                let mut object = serde_json::Map::new();
                for (key, value) in map {
                    object.insert(key.clone(), value.to_json_value());
                }
                JsonValue::Object(object)
            }
        }
    }
}

impl Serialize for Node {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.to_json_value().serialize(serializer)
    }
}

impl TryFrom<JsonValue> for Node {
    type Error = CanonicalizeError;

    fn try_from(value: JsonValue) -> Result<Self, Self::Error> {
        Self::from_json_value(value)
    }
}

impl Comparable for Node {
    fn type_name(&self) -> &'static str {
        match self.kind() {
            Some(kind) => kind.aliases()[0],
            None => "",
        }
    }

    fn shape(&self) -> Shape<'_> {
        match self {
            Self::Void | Self::Null => Shape::Absent,
            Self::Bool(v) => Shape::Scalar(Scalar::Bool(*v)),
            Self::Number(n) => Shape::Scalar(Scalar::Number(*n)),
            Self::String(s) => Shape::Scalar(Scalar::Text(s)),
            Self::Timestamp(t) => Shape::Scalar(Scalar::Timestamp(*t)),
            Self::Identifier(id) => Shape::Scalar(Scalar::Identifier(id)),
            Self::List(items) => {
                Shape::Collection(items.iter().map(|item| item as &dyn Comparable).collect())
            }
            Self::Record(fields) => Shape::Record(
                fields
                    .iter()
                    .map(|(name, value)| Field::new(name, value as &dyn Comparable))
                    .collect(),
            ),
        }
    }
}

fn snapshot_guarded(value: &dyn Comparable, visiting: &mut HashSet<(usize, &'static str)>) -> Node {
    match value.shape() {
        Shape::Absent if value.type_name().is_empty() => Node::Void,
        Shape::Absent => Node::Null,
        Shape::Scalar(scalar) => match scalar {
            Scalar::Bool(v) => Node::Bool(v),
            Scalar::Number(n) => Node::Number(n),
            Scalar::Text(s) => Node::String(s.to_owned()),
            Scalar::Timestamp(t) => Node::Timestamp(t),
            Scalar::Identifier(id) => Node::Identifier(id.to_owned()),
        },
        Shape::Record(fields) => {
            let key = (address(value), value.type_name());
            if !visiting.insert(key) {
                return Node::Null;
            }
            let record = fields
                .into_iter()
                .map(|field| (field.name.to_owned(), snapshot_guarded(field.value, visiting)))
                .collect();
            visiting.remove(&key);
            Node::Record(record)
        }
        Shape::Collection(items) => {
            let key = (address(value), value.type_name());
            if !visiting.insert(key) {
                return Node::Null;
            }
            let list = items.into_iter().map(|item| snapshot_guarded(item, visiting)).collect();
            visiting.remove(&key);
            Node::List(list)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::{
        collection::{btree_map, vec},
        prelude::*,
        string::string_regex,
    };

    fn arb_json_value() -> impl Strategy<Value = JsonValue> {
        let leaf = prop_oneof![
            Just(JsonValue::Null),
            any::<bool>().prop_map(JsonValue::Bool),
            proptest::num::f64::ANY.prop_filter_map("finite", |f| {
                if f.is_finite() {
                    serde_json::Number::from_f64(f).map(JsonValue::Number)
                } else {
                    None
                }
            }),
            string_regex("[a-zA-Z0-9]{0,8}").unwrap().prop_map(JsonValue::String),
        ];
        leaf.prop_recursive(4, 8, 4, move |inner| {
            prop_oneof![
                vec(inner.clone(), 0..4).prop_map(JsonValue::Array),
                btree_map(string_regex("[a-zA-Z0-9]{1,8}").unwrap(), inner, 0..4).prop_map(|map| {
                    let mut object = serde_json::Map::new();
                    for (k, v) in map {
                        object.insert(k, v);
                    }
                    JsonValue::Object(object)
                }),
            ]
        })
    }

    #[test]
    fn json_whitespace_is_void() {
        let node = Node::from_json_str("   \n\t").expect("whitespace should canonicalize to void");
        assert!(matches!(node, Node::Void));
    }

    #[test]
    fn rfc3339_strings_become_timestamps() {
        let node = Node::from_json_str("\"2024-01-02T03:04:05+02:00\"").unwrap();
        let Node::Timestamp(ts) = node else { panic!("expected timestamp") };
        assert_eq!(ts.to_rfc3339_opts(SecondsFormat::Secs, true), "2024-01-02T01:04:05Z");
        let plain = Node::from_json_str("\"2024-01-02\"").unwrap();
        assert!(matches!(plain, Node::String(_)));
    }

    #[test]
    fn json_number_out_of_range_yields_error() {
        let err = Node::from_json_str("1e400").unwrap_err();
        match err {
            CanonicalizeError::NumberOutOfRange { .. } | CanonicalizeError::Json(_) => {}
            other => panic!("unexpected error variant: {other:?}"),
        }
    }

    #[test]
    fn yaml_non_string_key_errors() {
        let err = Node::from_yaml_str("? [1, 2]: 3").unwrap_err();
        let CanonicalizeError::NonStringYamlKey { .. } = err else {
            panic!("expected NonStringYamlKey error");
        };
    }

    #[test]
    fn node_type_names_follow_kind() {
        assert_eq!(Node::from_json_str("\"x\"").unwrap().type_name(), "String");
        assert_eq!(Node::Null.type_name(), "Null");
        assert_eq!(Node::Void.type_name(), "");
    }

    #[test]
    fn snapshot_of_none_keeps_null() {
        let missing: Option<i32> = None;
        assert_eq!(Node::snapshot(&missing), Node::Null);
    }

    proptest! {
        #[test]
        fn snapshot_of_node_is_identity(value in arb_json_value()) {
            let node = Node::from_json_value(value).unwrap();
            prop_assert_eq!(Node::snapshot(&node), node);
        }
    }
}
