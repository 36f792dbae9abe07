//! Structural diff engine.
//!
//! The engine walks two [`Comparable`] graphs side by side and records every
//! point where they diverge as a [`Difference`]. Records are compared field by
//! field, collections positionally or by minimum-cost pairing depending on the
//! compiled rules, and scalars by kind.
//!
//! ```
//! use apidiff_core::diff::{compare, DifferenceKind};
//! use apidiff_core::{CompareOptions, Node, RuleCompiler, RuleSet};
//!
//! let left = Node::from_json_str(r#"{"Status":"Open","Total":3}"#)?;
//! let right = Node::from_json_str(r#"{"Status":"Closed","Total":3}"#)?;
//! let rules = RuleCompiler::default().compile(&RuleSet::new());
//! let differences = compare(&left, &right, &rules, &CompareOptions::default());
//! assert_eq!(differences.len(), 1);
//! assert_eq!(differences[0].path(), "Status");
//! assert_eq!(differences[0].kind(), DifferenceKind::ValueChanged);
//! # Ok::<(), apidiff_core::CanonicalizeError>(())
//! ```

mod collection;
mod path;
mod record;
mod scalar;

pub use path::{leaf_name, normalize, Path, PathSegment, INDEX_WILDCARD};
pub(crate) use path::{split_name, split_segments};

use std::collections::HashSet;
use std::fmt;

use serde::Serialize;

use crate::rules::CompiledRuleSet;
use crate::shape::{address, MISSING};
use crate::stats::{Counter, DiffStats};
use crate::{Comparable, CompareOptions, Node, Shape};

/// Classification of a single divergence.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum DifferenceKind {
    /// Both sides hold a value and the values differ.
    ValueChanged,
    /// A collection element exists only on the right.
    ItemAdded,
    /// A collection element exists only on the left.
    ItemRemoved,
    /// One side is absent or null, the other holds its type's default.
    NullVsDefault,
    /// An unordered collection holds the same elements in another order.
    OrderChanged,
}

impl fmt::Display for DifferenceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::ValueChanged => "ValueChanged",
            Self::ItemAdded => "ItemAdded",
            Self::ItemRemoved => "ItemRemoved",
            Self::NullVsDefault => "NullVsDefault",
            Self::OrderChanged => "OrderChanged",
        };
        f.write_str(label)
    }
}

/// A single divergence between two graphs.
///
/// Differences are immutable once produced; downstream stages only drop or
/// regroup them.
///
/// ```
/// # use apidiff_core::diff::{Difference, DifferenceKind};
/// # use apidiff_core::Node;
/// let difference = Difference::new(
///     DifferenceKind::ValueChanged,
///     "Items[3].ns:Name",
///     Node::String("a".into()),
///     Node::String("b".into()),
/// );
/// assert_eq!(difference.canonical_path(), "Items[*].Name");
/// assert_eq!(difference.leaf_name(), "Name");
/// ```
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Difference {
    path: String,
    canonical_path: String,
    kind: DifferenceKind,
    left: Node,
    right: Node,
    #[serde(skip_serializing_if = "Option::is_none")]
    left_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    right_type: Option<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    reordered: bool,
}

impl Difference {
    /// Creates a difference at a concrete path; the canonical path is derived.
    #[must_use]
    pub fn new<P>(kind: DifferenceKind, path: P, left: Node, right: Node) -> Self
    where
        P: Into<String>,
    {
        let path = path.into();
        let canonical_path = normalize(&path);
        Self {
            path,
            canonical_path,
            kind,
            left,
            right,
            left_type: None,
            right_type: None,
            reordered: false,
        }
    }

    /// Attaches the declared type names reported by the domain model.
    #[must_use]
    pub fn with_types(mut self, left: Option<String>, right: Option<String>) -> Self {
        self.left_type = left;
        self.right_type = right;
        self
    }

    /// Marks the difference as produced by pairing out-of-position elements.
    #[must_use]
    pub fn with_reordered(mut self, reordered: bool) -> Self {
        self.reordered = reordered;
        self
    }

    /// Concrete traversal path, such as `Items[2].Name`.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Normalized path, such as `Items[*].Name`.
    #[must_use]
    pub fn canonical_path(&self) -> &str {
        &self.canonical_path
    }

    /// Classification of the difference.
    #[must_use]
    pub fn kind(&self) -> DifferenceKind {
        self.kind
    }

    /// Snapshot of the left value; [`Node::Void`] when absent.
    #[must_use]
    pub fn left(&self) -> &Node {
        &self.left
    }

    /// Snapshot of the right value; [`Node::Void`] when absent.
    #[must_use]
    pub fn right(&self) -> &Node {
        &self.right
    }

    /// Declared type name of the left value.
    #[must_use]
    pub fn left_type(&self) -> Option<&str> {
        self.left_type.as_deref()
    }

    /// Declared type name of the right value.
    #[must_use]
    pub fn right_type(&self) -> Option<&str> {
        self.right_type.as_deref()
    }

    /// Indicates whether unordered pairing moved the element this difference belongs to.
    #[must_use]
    pub fn is_reordered(&self) -> bool {
        self.reordered
    }

    /// Last field name of the path.
    #[must_use]
    pub fn leaf_name(&self) -> &str {
        leaf_name(&self.path)
    }

    /// Case-insensitive check of either side's declared type or value kind.
    ///
    /// ```
    /// # use apidiff_core::diff::{Difference, DifferenceKind};
    /// # use apidiff_core::Node;
    /// let left = Node::from_json_str("\"2024-01-01T00:00:00Z\"")?;
    /// let right = Node::from_json_str("\"2024-01-02T00:00:00Z\"")?;
    /// let difference = Difference::new(DifferenceKind::ValueChanged, "At", left, right);
    /// assert!(difference.mentions_type("datetime"));
    /// assert!(!difference.mentions_type("Guid"));
    /// # Ok::<(), apidiff_core::CanonicalizeError>(())
    /// ```
    #[must_use]
    pub fn mentions_type(&self, name: &str) -> bool {
        let declared = [self.left_type(), self.right_type()]
            .into_iter()
            .flatten()
            .any(|declared| declared.eq_ignore_ascii_case(name));
        declared
            || [&self.left, &self.right]
                .into_iter()
                .filter_map(Node::kind)
                .any(|kind| kind.answers_to(name))
    }
}

impl fmt::Display for Difference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}: {} -> {}",
            self.kind,
            self.path,
            self.left.to_json_value(),
            self.right.to_json_value()
        )
    }
}

/// Compares two graphs and returns every raw difference in traversal order.
#[must_use]
pub fn compare(
    left: &dyn Comparable,
    right: &dyn Comparable,
    rules: &CompiledRuleSet,
    options: &CompareOptions,
) -> Vec<Difference> {
    compare_tracked(left, right, rules, options, None).0
}

/// Like [`compare`], also reporting whether the difference budget cut the walk short.
pub(crate) fn compare_tracked(
    left: &dyn Comparable,
    right: &dyn Comparable,
    rules: &CompiledRuleSet,
    options: &CompareOptions,
    stats: Option<&DiffStats>,
) -> (Vec<Difference>, bool) {
    let mut walker = Walker::new(rules, options, stats);
    walker.walk(left, right);
    let truncated = walker.truncated;
    let differences = match walker.sink {
        Sink::Collect(differences) => differences,
        Sink::Count(_) => Vec::new(),
    };
    if let Some(stats) = stats {
        stats.incr(Counter::Comparisons);
        stats.add(Counter::RawDifferences, differences.len());
    }
    (differences, truncated)
}

enum Sink {
    Collect(Vec<Difference>),
    Count(usize),
}

impl Sink {
    fn len(&self) -> usize {
        match self {
            Self::Collect(differences) => differences.len(),
            Self::Count(count) => *count,
        }
    }
}

type AncestorKey = (usize, usize, &'static str);

pub(crate) struct Walker<'r> {
    rules: &'r CompiledRuleSet,
    options: &'r CompareOptions,
    stats: Option<&'r DiffStats>,
    path: Path,
    ancestors: HashSet<AncestorKey>,
    sink: Sink,
    limit: Option<usize>,
    reordered: bool,
    truncated: bool,
}

impl<'r> Walker<'r> {
    fn new(
        rules: &'r CompiledRuleSet,
        options: &'r CompareOptions,
        stats: Option<&'r DiffStats>,
    ) -> Self {
        Self {
            rules,
            options,
            stats,
            path: Path::new(),
            ancestors: HashSet::new(),
            sink: Sink::Collect(Vec::new()),
            limit: options.max_differences(),
            reordered: false,
            truncated: false,
        }
    }

    /// Counting walker rooted at the current position; stops once `budget` is reached.
    fn probe(&self, budget: Option<usize>) -> Self {
        Self {
            rules: self.rules,
            options: self.options,
            stats: None,
            path: self.path.clone(),
            ancestors: self.ancestors.clone(),
            sink: Sink::Count(0),
            limit: budget,
            reordered: false,
            truncated: false,
        }
    }

    fn is_probe(&self) -> bool {
        matches!(self.sink, Sink::Count(_))
    }

    fn is_full(&self) -> bool {
        self.limit.is_some_and(|limit| self.sink.len() >= limit)
    }

    fn count(&self) -> usize {
        self.sink.len()
    }

    fn walk(&mut self, left: &dyn Comparable, right: &dyn Comparable) {
        if self.is_full() {
            self.truncated = true;
            return;
        }
        match (left.shape(), right.shape()) {
            (Shape::Absent, Shape::Absent) => {}
            (Shape::Absent, populated) | (populated, Shape::Absent) => {
                let kind = if shape_is_default(&populated) {
                    DifferenceKind::NullVsDefault
                } else {
                    DifferenceKind::ValueChanged
                };
                self.emit(kind, left, right);
            }
            (Shape::Scalar(a), Shape::Scalar(b)) => {
                if !scalar::equal(a, b, self.options.case_sensitivity()) {
                    self.emit(DifferenceKind::ValueChanged, left, right);
                }
            }
            (Shape::Record(a), Shape::Record(b)) => {
                self.guarded(left, right, |walker| record::compare(walker, &a, &b));
            }
            (Shape::Collection(a), Shape::Collection(b)) => {
                self.guarded(left, right, |walker| {
                    collection::compare(walker, left, right, &a, &b);
                });
            }
            _ => self.emit(DifferenceKind::ValueChanged, left, right),
        }
    }

    fn guarded<F>(&mut self, left: &dyn Comparable, right: &dyn Comparable, descend: F)
    where
        F: FnOnce(&mut Self),
    {
        let key = (address(left), address(right), left.type_name());
        if !self.ancestors.insert(key) {
            if let Some(stats) = self.stats {
                stats.incr(Counter::CycleGuards);
            }
            return;
        }
        descend(self);
        self.ancestors.remove(&key);
    }

    fn descend<F>(&mut self, segment: PathSegment, visit: F)
    where
        F: FnOnce(&mut Self),
    {
        self.path.push(segment);
        visit(self);
        self.path.pop();
    }

    fn emit(&mut self, kind: DifferenceKind, left: &dyn Comparable, right: &dyn Comparable) {
        if self.is_full() {
            self.truncated = true;
            return;
        }
        let concrete = self.path.to_string();
        match &mut self.sink {
            Sink::Count(count) => {
                let canonical = normalize(&concrete);
                if !self.rules.is_ignored(&concrete, &canonical) {
                    *count += 1;
                }
            }
            Sink::Collect(differences) => {
                let (before, after) = (Node::snapshot(left), Node::snapshot(right));
                let difference = Difference::new(kind, concrete, before, after)
                    .with_types(declared_type(left), declared_type(right))
                    .with_reordered(self.reordered);
                differences.push(difference);
            }
        }
    }
}

fn declared_type(value: &dyn Comparable) -> Option<String> {
    let name = value.type_name();
    (!name.is_empty()).then(|| name.to_owned())
}

fn shape_is_default(shape: &Shape<'_>) -> bool {
    match shape {
        Shape::Absent => false,
        Shape::Scalar(scalar) => scalar.is_default(),
        Shape::Record(fields) => fields.is_empty(),
        Shape::Collection(items) => items.is_empty(),
    }
}

/// Placeholder for the side on which a value is missing.
fn missing() -> &'static dyn Comparable {
    &MISSING
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Field, RuleCompiler, RuleSet};
    use proptest::{collection::vec, prelude::*};
    use std::sync::OnceLock;

    fn json(input: &str) -> Node {
        Node::from_json_str(input).expect("valid json")
    }

    fn diff(left: &str, right: &str) -> Vec<Difference> {
        let rules = RuleCompiler::default().compile(&RuleSet::new());
        compare(&json(left), &json(right), &rules, &CompareOptions::default())
    }

    #[test]
    fn equal_graphs_have_no_differences() {
        assert!(diff(r#"{"a":[1,{"b":null}]}"#, r#"{"a":[1,{"b":null}]}"#).is_empty());
    }

    #[test]
    fn absent_versus_default_is_null_vs_default() {
        let differences = diff(r#"{"a":1}"#, r#"{"a":1,"b":0}"#);
        assert_eq!(differences.len(), 1);
        assert_eq!(differences[0].kind(), DifferenceKind::NullVsDefault);
        assert_eq!(differences[0].left(), &Node::Void);
    }

    #[test]
    fn null_versus_populated_is_value_changed() {
        let differences = diff(r#"{"a":null}"#, r#"{"a":"x"}"#);
        assert_eq!(differences[0].kind(), DifferenceKind::ValueChanged);
        assert_eq!(differences[0].left(), &Node::Null);
    }

    #[test]
    fn shape_mismatch_is_value_changed() {
        let differences = diff(r#"{"a":{"b":1}}"#, r#"{"a":[1]}"#);
        assert_eq!(differences.len(), 1);
        assert_eq!(differences[0].path(), "a");
    }

    #[test]
    fn ordered_collections_report_trailing_items() {
        let differences = diff("[1,2]", "[1,2,3]");
        assert_eq!(differences.len(), 1);
        assert_eq!(differences[0].kind(), DifferenceKind::ItemAdded);
        assert_eq!(differences[0].path(), "[2]");
    }

    #[test]
    fn budget_truncates_walk() {
        let rules = RuleCompiler::default().compile(&RuleSet::new());
        let options = CompareOptions::default().with_max_differences(Some(2)).unwrap();
        let (differences, truncated) =
            compare_tracked(&json("[1,2,3,4]"), &json("[5,6,7,8]"), &rules, &options, None);
        assert_eq!(differences.len(), 2);
        assert!(truncated);
    }

    struct Link {
        name: &'static str,
        next: OnceLock<&'static Link>,
    }

    impl Comparable for Link {
        fn shape(&self) -> Shape<'_> {
            let mut fields = vec![Field::new("Name", &self.name)];
            if let Some(next) = self.next.get() {
                fields.push(Field::new("Next", *next));
            }
            Shape::Record(fields)
        }
    }

    fn ring(first: &'static str, second: &'static str) -> &'static Link {
        let head: &'static Link = Box::leak(Box::new(Link { name: first, next: OnceLock::new() }));
        let tail: &'static Link = Box::leak(Box::new(Link { name: second, next: OnceLock::new() }));
        assert!(head.next.set(tail).is_ok());
        assert!(tail.next.set(head).is_ok());
        head
    }

    #[test]
    fn cyclic_graphs_terminate() {
        let rules = RuleCompiler::default().compile(&RuleSet::new());
        let stats = DiffStats::default();
        let (differences, truncated) = compare_tracked(
            ring("A", "B"),
            ring("A", "C"),
            &rules,
            &CompareOptions::default(),
            Some(&stats),
        );
        let paths: Vec<_> = differences.iter().map(Difference::path).collect();
        assert_eq!(paths, ["Next.Name"]);
        assert!(!truncated);
        assert!(stats.snapshot().cycle_guards > 0);
    }

    proptest! {
        #[test]
        fn comparison_is_deterministic(left in vec(0_i64..4, 0..6), right in vec(0_i64..4, 0..6)) {
            let rules = RuleCompiler::default()
                .compile(&RuleSet::new().with_global_ignore_collection_order(true));
            let options = CompareOptions::default();
            let first = compare(&left, &right, &rules, &options);
            let second = compare(&left, &right, &rules, &options);
            prop_assert_eq!(first, second);
        }
    }
}
