use std::collections::HashMap;

use super::{missing, PathSegment, Walker};
use crate::{Comparable, Field};

/// Visits left fields in declared order, then fields only the right side has.
pub(super) fn compare(walker: &mut Walker<'_>, left: &[Field<'_>], right: &[Field<'_>]) {
    let right_by_name: HashMap<&str, &dyn Comparable> =
        right.iter().map(|field| (field.name, field.value)).collect();

    for field in left {
        if walker.is_full() {
            return;
        }
        let other = match right_by_name.get(field.name) {
            Some(value) => *value,
            None => missing(),
        };
        walker.descend(PathSegment::key(field.name), |walker| walker.walk(field.value, other));
    }

    let left_names: Vec<&str> = left.iter().map(|field| field.name).collect();
    for field in right {
        if walker.is_full() {
            return;
        }
        if left_names.contains(&field.name) {
            continue;
        }
        walker.descend(PathSegment::key(field.name), |walker| walker.walk(missing(), field.value));
    }
}

#[cfg(test)]
mod tests {
    use crate::diff::{compare, DifferenceKind};
    use crate::{Comparable, CompareOptions, Field, RuleCompiler, RuleSet, Shape};

    struct Customer {
        name: String,
        email: Option<String>,
    }

    impl Comparable for Customer {
        fn shape(&self) -> Shape<'_> {
            Shape::Record(vec![Field::new("Name", &self.name), Field::new("Email", &self.email)])
        }
    }

    #[test]
    fn typed_records_follow_declared_order() {
        let left = Customer { name: "Ada".into(), email: Some("a@x.io".into()) };
        let right = Customer { name: "Bob".into(), email: None };
        let rules = RuleCompiler::default().compile(&RuleSet::new());
        let differences = compare(&left, &right, &rules, &CompareOptions::default());
        let paths: Vec<_> = differences.iter().map(|d| d.path()).collect();
        assert_eq!(paths, ["Name", "Email"]);
        assert_eq!(differences[1].kind(), DifferenceKind::ValueChanged);
        assert_eq!(differences[1].right_type(), Some("String"));
    }

    #[test]
    fn right_only_fields_come_last() {
        let left = crate::Node::from_json_str(r#"{"b":1}"#).unwrap();
        let right = crate::Node::from_json_str(r#"{"a":"x","b":2}"#).unwrap();
        let rules = RuleCompiler::default().compile(&RuleSet::new());
        let differences = compare(&left, &right, &rules, &CompareOptions::default());
        let paths: Vec<_> = differences.iter().map(|d| d.path()).collect();
        assert_eq!(paths, ["b", "a"]);
    }
}
