use super::{missing, normalize, scalar, DifferenceKind, PathSegment, Walker};
use crate::{Comparable, Shape};

pub(super) fn compare(
    walker: &mut Walker<'_>,
    left_collection: &dyn Comparable,
    right_collection: &dyn Comparable,
    left: &[&dyn Comparable],
    right: &[&dyn Comparable],
) {
    let concrete = walker.path.to_string();
    let canonical = normalize(&concrete);
    if walker.rules.is_unordered(&concrete, &canonical) {
        unordered(walker, left_collection, right_collection, left, right);
    } else {
        ordered(walker, left, right);
    }
}

fn ordered(walker: &mut Walker<'_>, left: &[&dyn Comparable], right: &[&dyn Comparable]) {
    for index in 0..left.len().max(right.len()) {
        if walker.is_full() {
            return;
        }
        let pair = (left.get(index), right.get(index));
        walker.descend(PathSegment::index(index), |walker| match pair {
            (Some(l), Some(r)) => element(walker, *l, *r),
            (Some(l), None) => walker.emit(DifferenceKind::ItemRemoved, *l, missing()),
            (None, Some(r)) => walker.emit(DifferenceKind::ItemAdded, missing(), *r),
            (None, None) => {}
        });
    }
}

/// Exact matches are paired first, then each remaining left element takes the
/// cheapest unmatched right element. Ties go to the lowest right index.
fn unordered(
    walker: &mut Walker<'_>,
    left_collection: &dyn Comparable,
    right_collection: &dyn Comparable,
    left: &[&dyn Comparable],
    right: &[&dyn Comparable],
) {
    let mut taken = vec![false; right.len()];
    let mut pairing: Vec<Option<(usize, usize)>> = vec![None; left.len()];

    for (i, l) in left.iter().enumerate() {
        let exact = (0..right.len())
            .find(|&j| !taken[j] && probe_cost(walker, i, *l, right[j], Some(1)) == 0);
        if let Some(j) = exact {
            taken[j] = true;
            pairing[i] = Some((j, 0));
        }
    }

    for (i, l) in left.iter().enumerate() {
        if pairing[i].is_some() {
            continue;
        }
        let mut best: Option<(usize, usize)> = None;
        for (j, r) in right.iter().enumerate() {
            if taken[j] {
                continue;
            }
            let cost = probe_cost(walker, i, *l, *r, best.map(|(_, cost)| cost));
            if best.is_none_or(|(_, best_cost)| cost < best_cost) {
                best = Some((j, cost));
            }
        }
        if let Some((j, _)) = best {
            taken[j] = true;
            pairing[i] = best;
        }
    }

    let all_perfect = pairing.iter().flatten().all(|&(_, cost)| cost == 0);
    let pairs: Vec<(usize, usize)> =
        pairing.iter().enumerate().filter_map(|(i, pair)| pair.map(|(j, _)| (i, j))).collect();
    let removed: Vec<usize> =
        pairing.iter().enumerate().filter(|(_, pair)| pair.is_none()).map(|(i, _)| i).collect();
    let added: Vec<usize> = (0..right.len()).filter(|&j| !taken[j]).collect();

    let moved = pairs.iter().any(|(i, j)| i != j);
    if walker.options.report_order_changes()
        && moved
        && all_perfect
        && removed.is_empty()
        && added.is_empty()
    {
        walker.emit(DifferenceKind::OrderChanged, left_collection, right_collection);
        return;
    }

    for (i, j) in pairs {
        if walker.is_full() {
            return;
        }
        let previous = walker.reordered;
        walker.reordered = previous || i != j;
        walker.descend(PathSegment::index(i), |walker| element(walker, left[i], right[j]));
        walker.reordered = previous;
    }
    for i in removed {
        walker.descend(PathSegment::index(i), |walker| {
            walker.emit(DifferenceKind::ItemRemoved, left[i], missing());
        });
    }
    for j in added {
        walker.descend(PathSegment::index(j), |walker| {
            walker.emit(DifferenceKind::ItemAdded, missing(), right[j]);
        });
    }
}

/// Counts the differences pairing `left` with `right` would produce, up to `budget`.
fn probe_cost(
    walker: &Walker<'_>,
    index: usize,
    left: &dyn Comparable,
    right: &dyn Comparable,
    budget: Option<usize>,
) -> usize {
    let mut probe = walker.probe(budget);
    probe.descend(PathSegment::index(index), |probe| element(probe, left, right));
    probe.count()
}

/// A differing pair of scalar elements is a replacement, not an edit.
fn element(walker: &mut Walker<'_>, left: &dyn Comparable, right: &dyn Comparable) {
    if let (Shape::Scalar(a), Shape::Scalar(b)) = (left.shape(), right.shape()) {
        if !scalar::equal(a, b, walker.options.case_sensitivity()) {
            walker.emit(DifferenceKind::ItemRemoved, left, missing());
            walker.emit(DifferenceKind::ItemAdded, missing(), right);
        }
        return;
    }
    walker.walk(left, right);
}

#[cfg(test)]
mod tests {
    use crate::diff::{compare, Difference, DifferenceKind};
    use crate::{CompareOptions, IgnoreRule, Node, RuleCompiler, RuleSet};

    fn json(input: &str) -> Node {
        Node::from_json_str(input).expect("valid json")
    }

    fn unordered_diff(left: &str, right: &str, options: &CompareOptions) -> Vec<Difference> {
        let rules = RuleCompiler::default()
            .compile(&RuleSet::new().with_global_ignore_collection_order(true));
        compare(&json(left), &json(right), &rules, options)
    }

    #[test]
    fn reordered_records_pair_cleanly() {
        let differences = unordered_diff(
            r#"[{"id":1,"v":"a"},{"id":2,"v":"b"}]"#,
            r#"[{"id":2,"v":"b"},{"id":1,"v":"a"}]"#,
            &CompareOptions::default(),
        );
        assert!(differences.is_empty());
    }

    #[test]
    fn pair_differences_keep_left_index() {
        let differences = unordered_diff(
            r#"[{"id":1,"v":"a"},{"id":2,"v":"b"}]"#,
            r#"[{"id":2,"v":"c"},{"id":1,"v":"a"}]"#,
            &CompareOptions::default(),
        );
        assert_eq!(differences.len(), 1);
        assert_eq!(differences[0].path(), "[1].v");
        assert!(differences[0].is_reordered());
    }

    #[test]
    fn leftovers_become_added_and_removed() {
        let differences = unordered_diff("[1,2]", "[2,3,4]", &CompareOptions::default());
        let summary: Vec<_> = differences.iter().map(|d| (d.kind(), d.path())).collect();
        assert_eq!(
            summary,
            [
                (DifferenceKind::ItemRemoved, "[0]"),
                (DifferenceKind::ItemAdded, "[0]"),
                (DifferenceKind::ItemAdded, "[2]"),
            ]
        );
    }

    #[test]
    fn order_changes_are_opt_in() {
        let options = CompareOptions::default().with_report_order_changes(true).unwrap();
        let differences = unordered_diff("[1,2,3]", "[3,1,2]", &options);
        assert_eq!(differences.len(), 1);
        assert_eq!(differences[0].kind(), DifferenceKind::OrderChanged);
        assert_eq!(differences[0].path(), "");
    }

    #[test]
    fn ordered_scalar_reorder_is_replacement() {
        let rules = RuleCompiler::default().compile(&RuleSet::new());
        let options = CompareOptions::default();
        let differences = compare(&json("[1,2]"), &json("[2,1]"), &rules, &options);
        let kinds: Vec<_> = differences.iter().map(Difference::kind).collect();
        assert_eq!(
            kinds,
            [
                DifferenceKind::ItemRemoved,
                DifferenceKind::ItemAdded,
                DifferenceKind::ItemRemoved,
                DifferenceKind::ItemAdded
            ]
        );
    }

    #[test]
    fn path_override_beats_global_flag() {
        let mut rule_set = RuleSet::new();
        rule_set.add_ignore_rule(IgnoreRule::collection_order("Tags")).unwrap();
        let rules = RuleCompiler::default().compile(&rule_set);
        let left = json(r#"{"Tags":["a","b"],"Other":["x","y"]}"#);
        let right = json(r#"{"Tags":["b","a"],"Other":["y","x"]}"#);
        let differences = compare(&left, &right, &rules, &CompareOptions::default());
        assert!(differences.iter().all(|d| d.path().starts_with("Other")));
        assert_eq!(differences.len(), 4);
    }
}
