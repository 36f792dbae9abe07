use apidiff_benches::{available_corpora, default_rules};
use apidiff_core::{Comparer, DifferenceKind};

#[test]
fn default_rules_leave_only_real_changes() -> Result<(), Box<dyn std::error::Error>> {
    let comparer = Comparer::new(default_rules()?, Default::default());
    for corpus in available_corpora() {
        let dataset = corpus.generate()?;
        let result = dataset.compare(&comparer);
        assert!(!result.are_equal(), "{}", corpus.name());
        for difference in result.differences() {
            assert_eq!(difference.kind(), DifferenceKind::ValueChanged, "{difference}");
            let leaf = difference.leaf_name();
            assert!(leaf == "Status" || leaf == "Qty", "{difference}");
        }
    }
    Ok(())
}

#[test]
fn generation_is_deterministic() -> Result<(), Box<dyn std::error::Error>> {
    let corpus = available_corpora()
        .iter()
        .find(|c| c.name() == "small")
        .expect("registered corpus");
    assert_eq!(corpus.generate()?, corpus.generate()?);
    Ok(())
}
