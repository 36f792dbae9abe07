//! Post-filter applied to raw differences.
//!
//! Three checks run in order: ignore-completely rules, the unknown-element
//! heuristic, then enabled smart rules. Survivors keep their order.

use std::fmt;

use crate::diff::{Difference, DifferenceKind};
use crate::rules::CompiledRuleSet;
use crate::stats::{Counter, DiffStats};

/// Why a difference was dropped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DropReason {
    /// The path falls under an ignore-completely rule.
    IgnoreRule,
    /// One side is absent or null and the other holds its type's default.
    UnknownElement,
    /// An enabled smart rule matched.
    SmartRule,
}

impl DropReason {
    fn counter(self) -> Counter {
        match self {
            Self::IgnoreRule => Counter::IgnoredByRule,
            Self::UnknownElement => Counter::IgnoredUnknownElement,
            Self::SmartRule => Counter::IgnoredBySmartRule,
        }
    }
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::IgnoreRule => "ignore rule",
            Self::UnknownElement => "unknown element",
            Self::SmartRule => "smart rule",
        })
    }
}

/// Returns the first check that drops `difference`, if any.
///
/// ```
/// # use apidiff_core::diff::{Difference, DifferenceKind};
/// # use apidiff_core::filter::{drop_reason, DropReason};
/// # use apidiff_core::{Node, RuleCompiler, RuleSet};
/// let rules = RuleCompiler::default().compile(&RuleSet::new());
/// let zero = Node::from_json_str("0")?;
/// let missing_zero = Difference::new(DifferenceKind::NullVsDefault, "Qty", Node::Void, zero);
/// assert_eq!(drop_reason(&missing_zero, &rules), Some(DropReason::UnknownElement));
/// # Ok::<(), apidiff_core::CanonicalizeError>(())
/// ```
#[must_use]
pub fn drop_reason(difference: &Difference, rules: &CompiledRuleSet) -> Option<DropReason> {
    if rules.is_ignored(difference.path(), difference.canonical_path()) {
        return Some(DropReason::IgnoreRule);
    }
    if is_unknown_element(difference) {
        return Some(DropReason::UnknownElement);
    }
    if rules.smart_rules().iter().any(|rule| rule.matches(difference)) {
        return Some(DropReason::SmartRule);
    }
    None
}

/// Filters `raw`, keeping the survivors in their original order.
pub fn apply(
    raw: Vec<Difference>,
    rules: &CompiledRuleSet,
    stats: Option<&DiffStats>,
) -> Vec<Difference> {
    let mut kept = Vec::with_capacity(raw.len());
    for difference in raw {
        match drop_reason(&difference, rules) {
            Some(reason) => {
                tracing::trace!(
                    path = difference.path(),
                    kind = %difference.kind(),
                    %reason,
                    "difference dropped"
                );
                if let Some(stats) = stats {
                    stats.incr(reason.counter());
                }
            }
            None => kept.push(difference),
        }
    }
    kept
}

fn is_unknown_element(difference: &Difference) -> bool {
    match difference.kind() {
        DifferenceKind::NullVsDefault => true,
        DifferenceKind::ValueChanged => {
            let (left, right) = (difference.left(), difference.right());
            (left.is_absent() && right.is_default()) || (right.is_absent() && left.is_default())
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{IgnoreRule, Node, RuleCompiler, RuleSet, SmartRule};

    fn changed(path: &str, left: &str, right: &str) -> Difference {
        let parse = |input: &str| {
            if input.is_empty() {
                Node::Void
            } else {
                Node::from_json_str(input).unwrap()
            }
        };
        Difference::new(DifferenceKind::ValueChanged, path, parse(left), parse(right))
    }

    #[test]
    fn survivors_keep_order() {
        let mut rule_set = RuleSet::new();
        rule_set.add_ignore_rule(IgnoreRule::completely("Meta")).unwrap();
        let rules = RuleCompiler::default().compile(&rule_set);
        let raw = vec![
            changed("B", "1", "2"),
            changed("Meta.Version", "1", "2"),
            changed("A", "1", "2"),
        ];
        let kept: Vec<_> = apply(raw, &rules, None)
            .into_iter()
            .map(|d| d.path().to_owned())
            .collect();
        assert_eq!(kept, ["B", "A"]);
    }

    #[test]
    fn unknown_element_covers_every_default() {
        let defaults = [
            "0",
            "\"\"",
            "false",
            "[]",
            "{}",
            "\"0001-01-01T00:00:00Z\"",
            "\"1970-01-01T00:00:00Z\"",
        ];
        for default in defaults {
            assert!(is_unknown_element(&changed("X", "null", default)), "{default}");
            assert!(is_unknown_element(&changed("X", default, "")), "{default}");
        }
        assert!(!is_unknown_element(&changed("X", "null", "7")));
        assert!(!is_unknown_element(&changed("X", "0", "1")));
    }

    #[test]
    fn declared_type_rule_matches_either_side() {
        let mut rule_set = RuleSet::new();
        rule_set.add_smart_rule(SmartRule::by_declared_type("DateTime")).unwrap();
        let rules = RuleCompiler::default().compile(&rule_set);
        let difference = changed("Seen", "null", "\"2024-03-01T00:00:00Z\"");
        assert_eq!(drop_reason(&difference, &rules), Some(DropReason::SmartRule));
    }

    #[test]
    fn disabled_smart_rules_do_nothing() {
        let mut rule_set = RuleSet::new();
        rule_set.add_smart_rule(SmartRule::by_exact_name("Total").with_enabled(false)).unwrap();
        let rules = RuleCompiler::default().compile(&rule_set);
        assert_eq!(drop_reason(&changed("Total", "1", "2"), &rules), None);
    }

    #[test]
    fn drops_are_counted_by_reason() {
        let mut rule_set = RuleSet::new();
        rule_set.add_ignore_rule(IgnoreRule::completely("A")).unwrap();
        rule_set.add_smart_rule(SmartRule::by_exact_name("C")).unwrap();
        let rules = RuleCompiler::default().compile(&rule_set);
        let stats = DiffStats::default();
        let raw = vec![
            changed("A", "1", "2"),
            changed("B", "", "0"),
            changed("C", "1", "2"),
            changed("D", "1", "2"),
        ];
        assert_eq!(apply(raw, &rules, Some(&stats)).len(), 1);
        let snapshot = stats.snapshot();
        assert_eq!(snapshot.ignored_by_rule, 1);
        assert_eq!(snapshot.ignored_unknown_element, 1);
        assert_eq!(snapshot.ignored_by_smart_rule, 1);
    }
}
