use std::fs;
use std::path::{Path, PathBuf};

use apidiff_core::{Comparer, ConfigError, Node, Preset, RuleSet, SmartRuleKind};

fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures").join(name)
}

fn read(name: &str) -> String {
    fs::read_to_string(fixture(name)).expect("fixture should be readable")
}

fn load_orders() -> (Node, Node) {
    let left = Node::from_json_str(&read("order_left.json")).expect("left parses");
    let right = Node::from_json_str(&read("order_right.json")).expect("right parses");
    (left, right)
}

#[test]
fn json_and_yaml_documents_agree() {
    let from_json = RuleSet::from_json_str(&read("rules.json")).expect("json rules load");
    let from_yaml = RuleSet::from_yaml_str(&read("rules.yaml")).expect("yaml rules load");
    assert_eq!(from_json, from_yaml);
    assert_eq!(from_json.fingerprint(), from_yaml.fingerprint());
    assert_eq!(from_json.ignore_rules().len(), 3);
    assert_eq!(from_json.smart_rules().len(), 3);
    assert!(!from_json.smart_rules()[2].is_enabled());
    assert_eq!(from_json.smart_rules()[0].kind(), SmartRuleKind::ByNamePattern);
}

#[test]
fn fixture_orders_filter_down_to_real_changes() {
    let rules = RuleSet::from_json_str(&read("rules.json")).expect("rules load");
    let comparer = Comparer::new(rules, Default::default());
    let (left, right) = load_orders();

    let result = comparer.compare(&left, &right);
    let surviving: Vec<_> = result.differences().iter().map(|d| d.path()).collect();
    assert_eq!(surviving, ["Order.ETag", "Order.Lines[1].Qty", "Order.Status"]);
    assert_eq!(result.raw_difference_count(), 10);

    let groups = comparer.group(result.differences());
    let names: Vec<_> = groups.iter().map(|g| g.name()).collect();
    assert_eq!(names, ["Status Changes", "Value Changes"]);

    let stats = comparer.stats().snapshot();
    assert_eq!(stats.ignored_by_rule, 4);
    assert_eq!(stats.ignored_unknown_element, 1);
    assert_eq!(stats.ignored_by_smart_rule, 2);
}

#[test]
fn presets_extend_a_loaded_document() {
    let (left, right) = load_orders();
    let comparer = Comparer::default();
    comparer.apply_preset(Preset::IdentifiersAndTimestamps).expect("preset applies");
    let result = comparer.compare(&left, &right);
    let surviving: Vec<_> = result.differences().iter().map(|d| d.path()).collect();
    assert!(!surviving.contains(&"Order.OrderId"));
    assert!(!surviving.contains(&"Order.CreatedAt"));
    assert!(!surviving.contains(&"Order.Audit.TraceId"));
    assert!(surviving.contains(&"Order.Audit.Host"));
    assert!(surviving.contains(&"Order.Status"));
}

#[test]
fn invalid_documents_are_rejected_before_comparison() {
    let cases = [
        (r#"{"ignoreRules":[{"pathPattern":"  "}]}"#, "empty"),
        (r#"{"ignoreRules":[{"pathPattern":"Items[0"}]}"#, "brackets"),
        (r#"{"ignoreRules":[{"pathPattern":"Items[one]"}]}"#, "index"),
        (r#"{"smartIgnoreRules":[{"kind":"byExactName","value":""}]}"#, "smart value"),
        (r#"{"smartIgnoreRules":[{"kind":"byColour","value":"x"}]}"#, "json"),
        ("{", "json"),
    ];
    for (document, label) in cases {
        let error = RuleSet::from_json_str(document).expect_err(label);
        let expected = match label {
            "empty" => matches!(error, ConfigError::EmptyPattern),
            "brackets" => matches!(error, ConfigError::UnbalancedBrackets { .. }),
            "index" => matches!(error, ConfigError::InvalidIndex { .. }),
            "smart value" => matches!(error, ConfigError::EmptySmartRuleValue { .. }),
            _ => matches!(error, ConfigError::Json(_)),
        };
        assert!(expected, "{label}: {error}");
    }
}
