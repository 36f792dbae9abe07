//! Synthetic workloads for benchmarking `apidiff-core`.
//!
//! Each [`Corpus`] generates a pair of order-list payloads that differ in the
//! ways real API snapshots do: regenerated identifiers and timestamps,
//! reordered line items, and a handful of genuine status and quantity changes.
//!
//! # Examples
//!
//! ```
//! use apidiff_benches::{available_corpora, default_rules};
//! use apidiff_core::Comparer;
//!
//! let corpus = &available_corpora()[0];
//! let dataset = corpus.generate()?;
//! let comparer = Comparer::new(default_rules()?, Default::default());
//! let result = dataset.compare(&comparer);
//! assert!(result.raw_difference_count() > result.differences().len());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
#![forbid(unsafe_code)]
#![warn(missing_docs)]

use apidiff_core::{
    CanonicalizeError, Comparer, ComparisonResult, ConfigError, IgnoreRule, Node, Preset, RuleSet,
};
use serde_json::{json, Value};

/// Shape parameters of a generated payload pair.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Corpus {
    name: &'static str,
    orders: usize,
    lines_per_order: usize,
}

const CORPORA: [Corpus; 3] = [
    Corpus { name: "small", orders: 8, lines_per_order: 4 },
    Corpus { name: "medium", orders: 64, lines_per_order: 8 },
    Corpus { name: "wide-lines", orders: 16, lines_per_order: 48 },
];

/// Every registered corpus, smallest first.
#[must_use]
pub fn available_corpora() -> &'static [Corpus] {
    &CORPORA
}

impl Corpus {
    /// Identifier used as the benchmark parameter.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Number of line items across all orders.
    #[must_use]
    pub fn line_count(&self) -> usize {
        self.orders * self.lines_per_order
    }

    /// Builds the left and right payloads.
    pub fn generate(&self) -> Result<Dataset, CanonicalizeError> {
        let left = Node::from_json_value(self.payload(false))?;
        let right = Node::from_json_value(self.payload(true))?;
        Ok(Dataset { left, right })
    }

    fn payload(&self, drifted: bool) -> Value {
        let orders: Vec<Value> = (0..self.orders)
            .map(|order| {
                let mut lines: Vec<Value> = (0..self.lines_per_order)
                    .map(|line| {
                        let qty = if drifted && line % 7 == 3 { line + 1 } else { line };
                        json!({
                            "Sku": format!("SKU-{order}-{line}"),
                            "Qty": qty,
                            "Price": line * 3,
                        })
                    })
                    .collect();
                if drifted {
                    lines.reverse();
                }
                let generation = usize::from(drifted);
                json!({
                    "OrderId": format!("ord-{order}-{generation}"),
                    "Status": if drifted && order % 3 == 0 { "Shipped" } else { "Open" },
                    "CreatedAt": format!("2024-01-{:02}T10:00:{:02}Z", order % 28 + 1, generation),
                    "Lines": lines,
                    "Audit": { "Host": format!("api-{generation}") },
                })
            })
            .collect();
        let cursor = format!("c{}", usize::from(drifted));
        json!({ "Orders": orders, "Page": { "Size": self.orders, "Cursor": cursor } })
    }
}

/// Rules a snapshot test would typically use against the generated payloads.
pub fn default_rules() -> Result<RuleSet, ConfigError> {
    let mut rules = RuleSet::new();
    rules.add_ignore_rule(IgnoreRule::completely("Orders[*].Audit"))?;
    rules.add_ignore_rule(IgnoreRule::completely("Page.Cursor"))?;
    rules.add_ignore_rule(IgnoreRule::collection_order("Orders[*].Lines"))?;
    rules.apply_preset(Preset::IdentifiersAndTimestamps)?;
    Ok(rules)
}

/// A generated payload pair.
#[derive(Clone, Debug, PartialEq)]
pub struct Dataset {
    left: Node,
    right: Node,
}

impl Dataset {
    /// Baseline payload.
    #[must_use]
    pub fn left(&self) -> &Node {
        &self.left
    }

    /// Drifted payload.
    #[must_use]
    pub fn right(&self) -> &Node {
        &self.right
    }

    /// Runs a full compare with `comparer`.
    #[must_use]
    pub fn compare(&self, comparer: &Comparer) -> ComparisonResult {
        comparer.compare(&self.left, &self.right)
    }
}
