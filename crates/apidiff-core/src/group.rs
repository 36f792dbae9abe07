//! Semantic grouping of surviving differences.

use std::collections::BTreeSet;

use serde::Serialize;

use crate::diff::{Difference, DifferenceKind};
use crate::ValueKind;

/// Most differences returned by [`SemanticGroup::examples`].
pub const MAX_EXAMPLES: usize = 5;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
enum Category {
    Ordering,
    Status,
    Identifier,
    Timestamp,
    Collection,
    Value,
    Ungrouped,
}

impl Category {
    const ALL: [Self; 7] = [
        Self::Ordering,
        Self::Status,
        Self::Identifier,
        Self::Timestamp,
        Self::Collection,
        Self::Value,
        Self::Ungrouped,
    ];

    fn name(self) -> &'static str {
        match self {
            Self::Ordering => "Ordering Changes",
            Self::Status => "Status Changes",
            Self::Identifier => "Identifier Changes",
            Self::Timestamp => "Timestamp Changes",
            Self::Collection => "Collection Changes",
            Self::Value => "Value Changes",
            Self::Ungrouped => "Ungrouped",
        }
    }

    fn description(self) -> &'static str {
        match self {
            Self::Ordering => "Elements matched after reordering an unordered collection",
            Self::Status => "Status or state fields changed",
            Self::Identifier => "Identifiers or keys changed",
            Self::Timestamp => "Dates and times changed",
            Self::Collection => "Elements were added to or removed from a collection",
            Self::Value => "Other field values changed",
            Self::Ungrouped => "Differences that matched no heuristic",
        }
    }
}

/// A named bucket of related differences.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SemanticGroup {
    name: String,
    description: String,
    confidence: f64,
    differences: Vec<Difference>,
    related_paths: BTreeSet<String>,
}

impl SemanticGroup {
    /// Display name, such as `Status Changes`.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// One-line explanation of the bucket.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Mean confidence of the heuristics that placed members here, in `[0, 1]`.
    #[must_use]
    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    /// Every member difference.
    #[must_use]
    pub fn differences(&self) -> &[Difference] {
        &self.differences
    }

    /// Distinct canonical paths of the members.
    #[must_use]
    pub fn related_paths(&self) -> &BTreeSet<String> {
        &self.related_paths
    }

    /// The first few members, for report rendering.
    #[must_use]
    pub fn examples(&self) -> &[Difference] {
        &self.differences[..self.differences.len().min(MAX_EXAMPLES)]
    }
}

/// Buckets differences by heuristic. Every input lands in exactly one group.
///
/// ```
/// # use apidiff_core::diff::{Difference, DifferenceKind};
/// # use apidiff_core::group::group;
/// # use apidiff_core::Node;
/// let status = Difference::new(
///     DifferenceKind::ValueChanged,
///     "Order.Status",
///     Node::String("Open".into()),
///     Node::String("Closed".into()),
/// );
/// let groups = group(&[status]);
/// assert_eq!(groups.len(), 1);
/// assert_eq!(groups[0].name(), "Status Changes");
/// assert!((groups[0].confidence() - 0.9).abs() < 1e-9);
/// ```
#[must_use]
pub fn group(differences: &[Difference]) -> Vec<SemanticGroup> {
    let mut buckets: Vec<(Vec<Difference>, f64)> = vec![(Vec::new(), 0.0); Category::ALL.len()];
    for difference in differences {
        let (category, confidence) = classify(difference);
        let bucket = &mut buckets[category as usize];
        bucket.0.push(difference.clone());
        bucket.1 += confidence;
    }

    Category::ALL
        .into_iter()
        .zip(buckets)
        .filter(|(_, (members, _))| !members.is_empty())
        .map(|(category, (members, total))| {
            let related_paths = members.iter().map(|d| d.canonical_path().to_owned()).collect();
            SemanticGroup {
                name: category.name().to_owned(),
                description: category.description().to_owned(),
                confidence: total / members.len() as f64,
                differences: members,
                related_paths,
            }
        })
        .collect()
}

fn classify(difference: &Difference) -> (Category, f64) {
    let leaf = difference.leaf_name();
    let lower = leaf.to_lowercase();

    if difference.kind() == DifferenceKind::OrderChanged || difference.is_reordered() {
        return (Category::Ordering, 0.8);
    }
    if lower == "status" {
        return (Category::Status, 0.9);
    }
    if lower.contains("status") || lower.contains("state") {
        return (Category::Status, 0.7);
    }
    if lower == "id" || has_kind(difference, ValueKind::Identifier) {
        return (Category::Identifier, 0.9);
    }
    if ["Id", "ID", "Key"].iter().any(|suffix| leaf.ends_with(suffix)) {
        return (Category::Identifier, 0.7);
    }
    if has_kind(difference, ValueKind::Timestamp) {
        return (Category::Timestamp, 0.95);
    }
    if ["Date", "Time", "At", "Timestamp"].iter().any(|suffix| leaf.ends_with(suffix)) {
        return (Category::Timestamp, 0.6);
    }
    match difference.kind() {
        DifferenceKind::ItemAdded | DifferenceKind::ItemRemoved => (Category::Collection, 0.7),
        DifferenceKind::ValueChanged => (Category::Value, 0.3),
        _ => (Category::Ungrouped, 0.0),
    }
}

fn has_kind(difference: &Difference, kind: ValueKind) -> bool {
    kind.aliases().iter().any(|alias| difference.mentions_type(alias))
}
