//! Structural diff engine for API responses.
//!
//! `apidiff-core` walks two object graphs side by side, reports every
//! divergence as a [`Difference`] addressed by a dotted path, and then lets
//! path-pattern ignore rules and smart rules drop the noise: volatile
//! identifiers, timestamps, collection reordering and fields one side simply
//! does not know about. Surviving differences can be bucketed into
//! human-oriented [`SemanticGroup`]s.
//!
//! ```
//! use apidiff_core::{Comparer, IgnoreRule, Node, Preset, RuleSet};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut rules = RuleSet::new();
//!     rules.add_ignore_rule(IgnoreRule::completely("Meta"))?;
//!     rules.apply_preset(Preset::Identifiers)?;
//!     let comparer = Comparer::new(rules, Default::default());
//!
//!     let left = Node::from_json_str(r#"{"Id":"a1","Meta":{"Host":"x"},"Total":3}"#)?;
//!     let right = Node::from_json_str(r#"{"Id":"b2","Meta":{"Host":"y"},"Total":4}"#)?;
//!     let result = comparer.compare(&left, &right);
//!
//!     assert_eq!(result.raw_difference_count(), 3);
//!     assert_eq!(result.differences().len(), 1);
//!     assert_eq!(result.differences()[0].path(), "Total");
//!     Ok(())
//! }
//! ```
#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod comparer;
pub mod diff;
mod error;
pub mod filter;
pub mod group;
mod hash;
mod node;
mod number;
mod options;
pub mod rules;
mod shape;
mod stats;

pub use comparer::{Comparer, ComparerBuilder, ComparisonResult, FingerprintListener};
pub use diff::{Difference, DifferenceKind};
pub use error::{CanonicalizeError, ConfigError, OptionsError};
pub use group::SemanticGroup;
pub use hash::{combine, hash_bytes, Fingerprint, HashCode};
pub use node::Node;
pub use number::Number;
pub use options::{CaseSensitivity, CompareOptions};
pub use rules::{
    CompiledPattern, CompiledRuleSet, CompiledSmartRule, CompilerLimits, IgnoreRule, MatchMode,
    MatcherLimits, PatternMatcher, PatternSet, Preset, RuleCompiler, RuleSet, SmartRule,
    SmartRuleKind,
};
pub use shape::{Comparable, Field, Scalar, Shape, ValueKind};
pub use stats::{Counter, DiffStats, StatsSnapshot};

/// Returns the semantic version of the `apidiff-core` crate.
///
/// ```
/// assert!(!apidiff_core::version().is_empty());
/// ```
#[must_use]
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
