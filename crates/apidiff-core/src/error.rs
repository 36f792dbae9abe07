use thiserror::Error;

/// Errors that can occur while canonicalizing external data into [`Node`](crate::Node).
#[derive(Debug, Error)]
pub enum CanonicalizeError {
    /// The provided JSON input was invalid.
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    /// The provided YAML input was invalid.
    #[error("invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    /// Encountered a number that cannot be represented as an IEEE-754 f64.
    #[error("number {value} cannot be represented as f64")]
    NumberOutOfRange {
        /// The textual representation of the offending number.
        value: String,
    },
    /// YAML maps may only contain string keys.
    #[error("unsupported YAML key type: {found}")]
    NonStringYamlKey {
        /// A description of the key that triggered the error.
        found: String,
    },
    /// YAML tags have no counterpart in the object graph.
    #[error("unsupported YAML tag: {tag}")]
    UnsupportedYamlTag {
        /// The tag identifier encountered in the document.
        tag: String,
    },
    /// Attempted to construct a [`Number`](crate::Number) that is not finite.
    #[error("non-finite number encountered: {value}")]
    NotFinite {
        /// The offending numeric value.
        value: f64,
    },
}

/// Errors emitted when constructing [`CompareOptions`](crate::CompareOptions).
#[derive(Debug, Error, PartialEq, Eq)]
pub enum OptionsError {
    /// A difference budget of zero would stop before the first difference.
    #[error("max differences must be greater than zero")]
    ZeroMaxDifferences,
    /// Candidate paths must be allowed at least one byte.
    #[error("max path length must be greater than zero")]
    ZeroMaxPathLen,
}

/// Errors raised while building or loading a rule set.
///
/// These surface before any comparison runs; a comparison never fails
/// because of its rules.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The rules document could not be parsed as JSON.
    #[error("invalid rules document: {0}")]
    Json(#[from] serde_json::Error),
    /// The rules document could not be parsed as YAML.
    #[error("invalid rules document: {0}")]
    Yaml(#[from] serde_yaml::Error),
    /// Path patterns must contain at least one non-whitespace character.
    #[error("path pattern must not be empty")]
    EmptyPattern,
    /// A path pattern has a `[` without a matching `]` or vice versa.
    #[error("unbalanced brackets in path pattern '{pattern}'")]
    UnbalancedBrackets {
        /// The offending pattern.
        pattern: String,
    },
    /// An index selector holds something other than digits or `*`.
    #[error("invalid index selector '[{selector}]' in path pattern '{pattern}'")]
    InvalidIndex {
        /// The offending pattern.
        pattern: String,
        /// The text between the brackets.
        selector: String,
    },
    /// Smart rules other than the global order toggle need a value.
    #[error("smart rule {kind} requires a non-empty value")]
    EmptySmartRuleValue {
        /// The smart rule kind.
        kind: String,
    },
    /// A name pattern could not be compiled.
    #[error("invalid name pattern '{pattern}': {reason}")]
    InvalidNamePattern {
        /// The offending pattern.
        pattern: String,
        /// Why compilation failed.
        reason: String,
    },
    /// The requested preset does not exist.
    #[error("unknown preset '{name}'")]
    UnknownPreset {
        /// The name that was requested.
        name: String,
    },
}
