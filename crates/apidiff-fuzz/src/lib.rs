//! Fuzzing harnesses for the apidiff structural diff engine.
//!
//! Each public function accepts raw bytes and drives one stage of the
//! pipeline: the document adapters, the path normalizer, the pattern matcher,
//! and the full compare/filter/group flow. Recoverable errors are swallowed;
//! broken invariants panic so the fuzzer reports them.
//!
//! ```
//! apidiff_fuzz::fuzz_canonicalization(b"{\"a\":1}");
//! apidiff_fuzz::fuzz_normalize(b"Items[3].ns:Name");
//! apidiff_fuzz::fuzz_pattern_match(b"Items[*].*Id\0Items[2].CustomerId");
//! apidiff_fuzz::fuzz_compare(&[1, 2, 3, 4]);
//! ```
#![forbid(unsafe_code)]
#![warn(missing_docs)]

use apidiff_core::diff::{leaf_name, normalize};
use apidiff_core::{
    CompareOptions, Comparer, IgnoreRule, MatchMode, MatcherLimits, Node, PatternMatcher, RuleSet,
    SmartRule,
};
use arbitrary::Unstructured;
use serde_json::{Map as JsonMap, Number as JsonNumber, Value as JsonValue};

const MAX_DEPTH: usize = 4;
const MAX_ARRAY_LEN: u8 = 6;
const MAX_OBJECT_LEN: u8 = 6;
const MAX_STRING_LEN: u8 = 12;
const FIELD_NAMES: [&str; 8] = [
    "Id",
    "Status",
    "Items",
    "CreatedAt",
    "Name",
    "CustomerId",
    "Tags",
    "Total",
];
const RULE_PATHS: [&str; 6] = ["Items", "Items[*].Id", "Tags", "Status", "*Id", "Items[*]"];

/// Feeds arbitrary bytes through the JSON and YAML adapters.
///
/// ```
/// apidiff_fuzz::fuzz_canonicalization(b"{\"key\":\"value\"}");
/// ```
pub fn fuzz_canonicalization(data: &[u8]) {
    if let Ok(text) = std::str::from_utf8(data) {
        let _ = Node::from_json_str(text);
        let _ = Node::from_yaml_str(text);
    }
}

/// Checks that normalization is idempotent and leaf extraction never panics.
///
/// ```
/// apidiff_fuzz::fuzz_normalize(b"a.b[0].ns:c");
/// ```
pub fn fuzz_normalize(data: &[u8]) {
    let raw = String::from_utf8_lossy(data);
    let once = normalize(&raw);
    assert_eq!(normalize(&once), once, "normalize is not idempotent for {raw:?}");
    let _ = leaf_name(&raw);
    let _ = leaf_name(&once);
}

/// Splits the input at the first NUL into a pattern and a candidate path and
/// matches them in both modes.
///
/// An exact match implies a subtree match.
///
/// ```
/// apidiff_fuzz::fuzz_pattern_match(b"Order.*\0Order.Total");
/// ```
pub fn fuzz_pattern_match(data: &[u8]) {
    let text = String::from_utf8_lossy(data);
    let (pattern, candidate) = text.split_once('\0').unwrap_or((text.as_ref(), ""));
    let limits = MatcherLimits::default().with_regex_size_limit(1 << 16);
    let matcher = PatternMatcher::new(limits);
    let set = matcher.pattern_set([pattern]);
    let exact = matcher.matches_any(candidate, &set, MatchMode::Exact);
    let subtree = matcher.matches_any(candidate, &set, MatchMode::Subtree);
    assert!(!exact || subtree, "exact match without subtree match: {pattern:?} vs {candidate:?}");

    let mut rules = RuleSet::new();
    if rules.add_ignore_rule(IgnoreRule::completely(pattern)).is_ok() {
        let compiled = apidiff_core::RuleCompiler::default().compile(&rules);
        let _ = compiled.is_ignored(candidate, &normalize(candidate));
    }
}

/// Compares two generated documents under generated rules.
///
/// Checks that comparison is deterministic, that filtering only removes
/// differences, and that grouping keeps every survivor.
///
/// ```
/// apidiff_fuzz::fuzz_compare(b"compare seed");
/// ```
pub fn fuzz_compare(data: &[u8]) {
    let mut unstructured = Unstructured::new(data);
    let Some(rules) = random_rules(&mut unstructured) else {
        return;
    };
    let Some(left) = random_node(&mut unstructured) else {
        return;
    };
    let Some(right) = random_node(&mut unstructured) else {
        return;
    };
    let report_order_changes = unstructured.arbitrary().unwrap_or(false);
    let options = CompareOptions::default().with_report_order_changes(report_order_changes);
    let Ok(options) = options else {
        return;
    };

    let comparer = Comparer::new(rules, options);
    let raw = comparer.raw_differences(&left, &right);
    assert_eq!(raw, comparer.raw_differences(&left, &right), "comparison is not deterministic");

    let result = comparer.compare(&left, &right);
    assert_eq!(result.raw_difference_count(), raw.len());
    assert!(result.differences().len() <= raw.len());
    let grouped: usize = comparer
        .group(result.differences())
        .iter()
        .map(|g| g.differences().len())
        .sum();
    assert_eq!(grouped, result.differences().len(), "grouping dropped differences");

    if raw.is_empty() {
        assert!(result.are_equal());
    }
}

fn random_rules(unstructured: &mut Unstructured<'_>) -> Option<RuleSet> {
    let mut rules = RuleSet::new();
    let count = unstructured.int_in_range::<u8>(0..=4).ok()?;
    for _ in 0..count {
        let path = *unstructured.choose(&RULE_PATHS).ok()?;
        let added = match unstructured.int_in_range::<u8>(0..=4).ok()? {
            0 => rules.add_ignore_rule(IgnoreRule::completely(path)),
            1 => rules.add_ignore_rule(IgnoreRule::collection_order(path)),
            2 => rules.add_smart_rule(SmartRule::by_name_pattern(path)),
            3 => rules.add_smart_rule(SmartRule::by_exact_name(leaf_name(path))),
            _ => rules.add_smart_rule(SmartRule::by_declared_type("Timestamp")),
        };
        added.ok()?;
    }
    rules.set_global_ignore_collection_order(unstructured.arbitrary().ok()?);
    Some(rules)
}

fn random_node(unstructured: &mut Unstructured<'_>) -> Option<Node> {
    let value = json_value_from_unstructured(unstructured, 0).ok()?;
    Node::from_json_value(value).ok()
}

fn json_value_from_unstructured(
    unstructured: &mut Unstructured<'_>,
    depth: usize,
) -> Result<JsonValue, arbitrary::Error> {
    if depth >= MAX_DEPTH {
        return json_leaf(unstructured);
    }

    let choice = unstructured.int_in_range::<u8>(0..=5)?;
    match choice {
        0 => Ok(JsonValue::Null),
        1 => Ok(JsonValue::Bool(unstructured.arbitrary()?)),
        2 => Ok(JsonValue::Number(random_number(unstructured)?)),
        3 => Ok(JsonValue::String(random_string(unstructured)?)),
        4 => {
            let len = usize::from(unstructured.int_in_range::<u8>(0..=MAX_ARRAY_LEN)?);
            let mut items = Vec::with_capacity(len);
            for _ in 0..len {
                items.push(json_value_from_unstructured(unstructured, depth + 1)?);
            }
            Ok(JsonValue::Array(items))
        }
        _ => {
            let len = usize::from(unstructured.int_in_range::<u8>(0..=MAX_OBJECT_LEN)?);
            let mut map = JsonMap::new();
            for _ in 0..len {
                let key = if unstructured.arbitrary()? {
                    (*unstructured.choose(&FIELD_NAMES)?).to_owned()
                } else {
                    random_string(unstructured)?
                };
                let value = json_value_from_unstructured(unstructured, depth + 1)?;
                map.insert(key, value);
            }
            Ok(JsonValue::Object(map))
        }
    }
}

fn json_leaf(unstructured: &mut Unstructured<'_>) -> Result<JsonValue, arbitrary::Error> {
    let choice = unstructured.int_in_range::<u8>(0..=3)?;
    match choice {
        0 => Ok(JsonValue::Null),
        1 => Ok(JsonValue::Bool(unstructured.arbitrary()?)),
        2 => Ok(JsonValue::Number(random_number(unstructured)?)),
        _ => Ok(JsonValue::String(random_string(unstructured)?)),
    }
}

fn random_number(unstructured: &mut Unstructured<'_>) -> Result<JsonNumber, arbitrary::Error> {
    if unstructured.arbitrary()? {
        let int = unstructured.arbitrary::<i64>()?;
        Ok(JsonNumber::from(int))
    } else {
        let numerator = unstructured.arbitrary::<i32>()? as f64;
        let denominator = f64::from(unstructured.int_in_range::<u16>(1..=1024)?);
        let value = numerator / denominator;
        JsonNumber::from_f64(value).ok_or(arbitrary::Error::IncorrectFormat)
    }
}

fn random_string(unstructured: &mut Unstructured<'_>) -> Result<String, arbitrary::Error> {
    let len = usize::from(unstructured.int_in_range::<u8>(0..=MAX_STRING_LEN)?);
    let mut string = String::with_capacity(len);
    for _ in 0..len {
        let byte = unstructured.int_in_range::<u8>(0x20..=0x7e)?;
        string.push(char::from(byte));
    }
    Ok(string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonicalization_handles_utf8() {
        fuzz_canonicalization(br"{}");
    }

    #[test]
    fn normalize_harness_runs() {
        fuzz_normalize(b"Items[12].x:Name[3]");
        fuzz_normalize(&[0xff, b'[', b'9']);
    }

    #[test]
    fn pattern_harness_runs() {
        fuzz_pattern_match(b"Items[*].Id\0Items[4].Id");
        fuzz_pattern_match(b"[[[");
    }

    #[test]
    fn compare_harness_runs() {
        fuzz_compare(b"compare");
        fuzz_compare(&[7; 64]);
    }
}
