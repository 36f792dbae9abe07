use crate::{CaseSensitivity, Scalar};

/// Scalars of different kinds never compare equal.
pub(super) fn equal(left: Scalar<'_>, right: Scalar<'_>, case: CaseSensitivity) -> bool {
    match (left, right) {
        (Scalar::Bool(a), Scalar::Bool(b)) => a == b,
        (Scalar::Number(a), Scalar::Number(b)) => a == b,
        (Scalar::Timestamp(a), Scalar::Timestamp(b)) => a == b,
        (Scalar::Identifier(a), Scalar::Identifier(b)) => a == b,
        (Scalar::Text(a), Scalar::Text(b)) => match case {
            CaseSensitivity::Sensitive => a == b,
            CaseSensitivity::Insensitive => {
                a.chars().flat_map(char::to_lowercase).eq(b.chars().flat_map(char::to_lowercase))
            }
        },
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Number;

    #[test]
    fn text_respects_case_mode() {
        assert!(!equal(Scalar::Text("Open"), Scalar::Text("OPEN"), CaseSensitivity::Sensitive));
        let insensitive = CaseSensitivity::Insensitive;
        assert!(equal(Scalar::Text("Straße"), Scalar::Text("STRAßE"), insensitive));
    }

    #[test]
    fn identifiers_ignore_case_mode() {
        let insensitive = CaseSensitivity::Insensitive;
        assert!(!equal(Scalar::Identifier("AB"), Scalar::Identifier("ab"), insensitive));
    }

    #[test]
    fn kinds_never_cross() {
        let one = Scalar::Number(Number::from(1_i64));
        assert!(!equal(Scalar::Text("1"), one, CaseSensitivity::Insensitive));
        assert!(equal(
            Scalar::Number(Number::from(5_i64)),
            Scalar::Number(Number::new(5.0).unwrap()),
            CaseSensitivity::Sensitive
        ));
    }

    #[test]
    fn integers_beyond_double_precision_stay_distinct() {
        let left = Scalar::Number(Number::from(9_007_199_254_740_993_i64));
        let right = Scalar::Number(Number::from(9_007_199_254_740_992_i64));
        assert!(!equal(left, right, CaseSensitivity::Sensitive));
    }
}
