//! The comparison façade: rules, engine, filter and grouper behind one handle.

use std::convert::Infallible;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use serde::Serialize;

use crate::diff::{compare_tracked, Difference};
use crate::group::{self, SemanticGroup};
use crate::rules::{
    CompiledRuleSet, CompilerLimits, IgnoreRule, MatcherLimits, Preset, RuleCompiler, RuleSet,
    SmartRule,
};
use crate::{filter, Comparable, CompareOptions, ConfigError, DiffStats, Fingerprint};

/// Receives rule-set fingerprint changes, for example to invalidate an external result cache.
pub trait FingerprintListener: Send + Sync {
    /// Called after a mutation swapped in a rule set with a different fingerprint.
    ///
    /// Runs after the mutation lock is released, so a listener may edit rules
    /// or subscribe. Notifications from concurrent mutations may interleave.
    fn fingerprint_changed(&self, old: Option<Fingerprint>, new: Option<Fingerprint>);
}

impl<F> FingerprintListener for F
where
    F: Fn(Option<Fingerprint>, Option<Fingerprint>) + Send + Sync,
{
    fn fingerprint_changed(&self, old: Option<Fingerprint>, new: Option<Fingerprint>) {
        self(old, new);
    }
}

/// Outcome of [`Comparer::compare`].
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ComparisonResult {
    differences: Vec<Difference>,
    raw_difference_count: usize,
    are_equal: bool,
    truncated: bool,
    fingerprint: Option<Fingerprint>,
}

impl ComparisonResult {
    /// Differences that survived the post-filter, in traversal order.
    #[must_use]
    pub fn differences(&self) -> &[Difference] {
        &self.differences
    }

    /// Consumes the result, returning the filtered differences.
    #[must_use]
    pub fn into_differences(self) -> Vec<Difference> {
        self.differences
    }

    /// Differences produced by the engine before filtering.
    #[must_use]
    pub fn raw_difference_count(&self) -> usize {
        self.raw_difference_count
    }

    /// True when no difference survived filtering.
    #[must_use]
    pub fn are_equal(&self) -> bool {
        self.are_equal
    }

    /// True when the difference budget stopped the walk early.
    #[must_use]
    pub fn is_truncated(&self) -> bool {
        self.truncated
    }

    /// Fingerprint of the rule set the comparison ran against.
    #[must_use]
    pub fn fingerprint(&self) -> Option<Fingerprint> {
        self.fingerprint
    }
}

#[derive(Debug)]
struct RuleSnapshot {
    rules: RuleSet,
    compiled: Arc<CompiledRuleSet>,
}

/// Configures a [`Comparer`].
#[derive(Debug, Default)]
pub struct ComparerBuilder {
    options: CompareOptions,
    rules: RuleSet,
    stats: Option<Arc<DiffStats>>,
    compiler_limits: CompilerLimits,
    matcher_limits: MatcherLimits,
}

impl ComparerBuilder {
    /// Sets the engine options.
    #[must_use]
    pub fn options(mut self, options: CompareOptions) -> Self {
        self.options = options;
        self
    }

    /// Sets the initial rule set.
    #[must_use]
    pub fn rules(mut self, rules: RuleSet) -> Self {
        self.rules = rules;
        self
    }

    /// Shares counters with the caller.
    #[must_use]
    pub fn stats(mut self, stats: Arc<DiffStats>) -> Self {
        self.stats = Some(stats);
        self
    }

    /// Sets the rule compiler bounds.
    #[must_use]
    pub fn compiler_limits(mut self, limits: CompilerLimits) -> Self {
        self.compiler_limits = limits;
        self
    }

    /// Sets the pattern matcher bounds.
    #[must_use]
    pub fn matcher_limits(mut self, limits: MatcherLimits) -> Self {
        self.matcher_limits = limits;
        self
    }

    /// Builds the comparer, compiling the initial rule set.
    #[must_use]
    pub fn build(self) -> Comparer {
        let stats = self.stats.unwrap_or_default();
        let compiler = RuleCompiler::new(self.compiler_limits, self.matcher_limits)
            .with_stats(Arc::clone(&stats));
        let compiled = compiler.compile(&self.rules);
        Comparer {
            options: self.options,
            compiler,
            snapshot: RwLock::new(Arc::new(RuleSnapshot { rules: self.rules, compiled })),
            listeners: RwLock::default(),
            mutation: Mutex::new(()),
            stats,
        }
    }
}

/// Compares object graphs under a mutable, copy-on-write rule set.
///
/// A comparison reads the current rule snapshot once and runs against it
/// without holding any lock, so mutations never disturb comparisons in flight.
///
/// ```
/// use apidiff_core::{Comparer, IgnoreRule, Node, SmartRule};
///
/// let comparer = Comparer::default();
/// comparer.add_ignore_rule(IgnoreRule::collection_order("Items"))?;
/// comparer.add_smart_rule(SmartRule::by_declared_type("Timestamp"))?;
///
/// let left = Node::from_json_str(
///     r#"{"Status":"Open","CreatedAt":"2024-01-01T00:00:00Z","Items":["A","B"]}"#,
/// )?;
/// let right = Node::from_json_str(
///     r#"{"Status":"Closed","CreatedAt":"2024-02-01T00:00:00Z","Items":["B","A"]}"#,
/// )?;
/// let result = comparer.compare(&left, &right);
/// assert!(!result.are_equal());
/// assert_eq!(result.differences().len(), 1);
/// assert_eq!(comparer.group(result.differences())[0].name(), "Status Changes");
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct Comparer {
    options: CompareOptions,
    compiler: RuleCompiler,
    snapshot: RwLock<Arc<RuleSnapshot>>,
    listeners: RwLock<Vec<Arc<dyn FingerprintListener>>>,
    mutation: Mutex<()>,
    stats: Arc<DiffStats>,
}

impl Default for Comparer {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl std::fmt::Debug for Comparer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Comparer")
            .field("options", &self.options)
            .field("fingerprint", &self.fingerprint())
            .finish_non_exhaustive()
    }
}

impl Comparer {
    /// Starts configuring a comparer.
    #[must_use]
    pub fn builder() -> ComparerBuilder {
        ComparerBuilder::default()
    }

    /// Creates a comparer with default limits.
    #[must_use]
    pub fn new(rules: RuleSet, options: CompareOptions) -> Self {
        Self::builder().rules(rules).options(options).build()
    }

    fn current(&self) -> Arc<RuleSnapshot> {
        Arc::clone(&self.snapshot.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Diffs, filters and reports whether anything survived.
    pub fn compare(&self, left: &dyn Comparable, right: &dyn Comparable) -> ComparisonResult {
        let snapshot = self.current();
        let (raw, truncated) = compare_tracked(
            left,
            right,
            &snapshot.compiled,
            &self.options,
            Some(&self.stats),
        );
        let raw_difference_count = raw.len();
        let differences = filter::apply(raw, &snapshot.compiled, Some(&self.stats));
        tracing::debug!(
            raw = raw_difference_count,
            kept = differences.len(),
            truncated,
            "comparison finished"
        );
        ComparisonResult {
            are_equal: differences.is_empty(),
            differences,
            raw_difference_count,
            truncated,
            fingerprint: snapshot.compiled.fingerprint(),
        }
    }

    /// Unfiltered engine output.
    pub fn raw_differences(
        &self,
        left: &dyn Comparable,
        right: &dyn Comparable,
    ) -> Vec<Difference> {
        let snapshot = self.current();
        let stats = Some(self.stats.as_ref());
        compare_tracked(left, right, &snapshot.compiled, &self.options, stats).0
    }

    /// Applies the post-filter of the current rule set.
    pub fn filter(&self, raw: Vec<Difference>) -> Vec<Difference> {
        filter::apply(raw, &self.current().compiled, Some(&self.stats))
    }

    /// Buckets differences into semantic groups.
    #[must_use]
    pub fn group(&self, differences: &[Difference]) -> Vec<SemanticGroup> {
        group::group(differences)
    }

    /// Copy of the current rule set.
    #[must_use]
    pub fn rules(&self) -> RuleSet {
        self.current().rules.clone()
    }

    /// Compiled form of the current rule set.
    #[must_use]
    pub fn compiled(&self) -> Arc<CompiledRuleSet> {
        Arc::clone(&self.current().compiled)
    }

    /// Fingerprint of the current rule set.
    #[must_use]
    pub fn fingerprint(&self) -> Option<Fingerprint> {
        self.current().compiled.fingerprint()
    }

    /// Engine options.
    #[must_use]
    pub fn options(&self) -> &CompareOptions {
        &self.options
    }

    /// Counters this comparer reports into.
    #[must_use]
    pub fn stats(&self) -> &Arc<DiffStats> {
        &self.stats
    }

    /// Registers a listener for fingerprint changes.
    pub fn subscribe(&self, listener: Box<dyn FingerprintListener>) {
        self.listeners.write().unwrap_or_else(PoisonError::into_inner).push(Arc::from(listener));
    }

    /// Adds a path rule. Returns `false` when an equal rule already exists.
    pub fn add_ignore_rule(&self, rule: IgnoreRule) -> Result<bool, ConfigError> {
        self.mutate(|rules| rules.add_ignore_rule(rule))
    }

    /// Removes every path rule with the given pattern.
    pub fn remove_ignore_rule(&self, path_pattern: &str) -> bool {
        self.mutate_with(|rules| rules.remove_ignore_rule(path_pattern))
    }

    /// Adds a smart rule. Returns `false` when an equal rule already exists.
    pub fn add_smart_rule(&self, rule: SmartRule) -> Result<bool, ConfigError> {
        self.mutate(|rules| rules.add_smart_rule(rule))
    }

    /// Removes a smart rule.
    pub fn remove_smart_rule(&self, rule: &SmartRule) -> bool {
        self.mutate_with(|rules| rules.remove_smart_rule(rule))
    }

    /// Removes every smart rule.
    pub fn clear_smart_rules(&self) {
        self.mutate_with(RuleSet::clear_smart_rules);
    }

    /// Adds the smart rules bundled in `preset`.
    pub fn apply_preset(&self, preset: Preset) -> Result<(), ConfigError> {
        self.mutate(|rules| rules.apply_preset(preset))
    }

    /// Sets the global order flag.
    pub fn set_global_ignore_collection_order(&self, enabled: bool) {
        self.mutate_with(|rules| rules.set_global_ignore_collection_order(enabled));
    }

    /// Replaces the whole rule set.
    pub fn replace_rules(&self, replacement: RuleSet) {
        self.mutate_with(|rules| *rules = replacement);
    }

    fn mutate_with<T, F>(&self, edit: F) -> T
    where
        F: FnOnce(&mut RuleSet) -> T,
    {
        match self.mutate(|rules| Ok::<_, Infallible>(edit(rules))) {
            Ok(outcome) => outcome,
            Err(never) => match never {},
        }
    }

    /// Clone, edit, recompile, swap. Failed edits leave the current snapshot untouched.
    fn mutate<T, E, F>(&self, edit: F) -> Result<T, E>
    where
        F: FnOnce(&mut RuleSet) -> Result<T, E>,
    {
        let (outcome, old, new) = {
            let _serial = self.mutation.lock().unwrap_or_else(PoisonError::into_inner);
            let current = self.current();
            let mut rules = current.rules.clone();
            let outcome = edit(&mut rules)?;
            if rules == current.rules {
                return Ok(outcome);
            }

            let compiled = self.compiler.compile(&rules);
            let old = current.compiled.fingerprint();
            let new = compiled.fingerprint();
            *self.snapshot.write().unwrap_or_else(PoisonError::into_inner) =
                Arc::new(RuleSnapshot { rules, compiled });
            (outcome, old, new)
        };

        if old != new || new.is_none() {
            tracing::debug!(
                old = ?old.map(|fp| fp.to_string()),
                new = ?new.map(|fp| fp.to_string()),
                "rule set fingerprint changed"
            );
            let listeners: Vec<_> = self
                .listeners
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .iter()
                .cloned()
                .collect();
            for listener in listeners {
                listener.fingerprint_changed(old, new);
            }
        }
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Node;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn comparer_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Comparer>();
    }

    #[test]
    fn listeners_fire_only_on_change() {
        let comparer = Comparer::default();
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        comparer.subscribe(Box::new(move |old: Option<Fingerprint>, new: Option<Fingerprint>| {
            assert_ne!(old, new);
            seen.fetch_add(1, Ordering::SeqCst);
        }));
        comparer.add_ignore_rule(IgnoreRule::completely("A")).unwrap();
        comparer.add_ignore_rule(IgnoreRule::completely("A")).unwrap();
        assert!(comparer.remove_ignore_rule("A"));
        assert!(!comparer.remove_ignore_rule("A"));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn listeners_may_edit_rules() {
        let comparer = Arc::new(Comparer::default());
        let calls = Arc::new(AtomicUsize::new(0));
        let (inner, seen) = (Arc::downgrade(&comparer), Arc::clone(&calls));
        comparer.subscribe(Box::new(move |_: Option<Fingerprint>, _: Option<Fingerprint>| {
            seen.fetch_add(1, Ordering::SeqCst);
            if let Some(comparer) = inner.upgrade() {
                comparer.set_global_ignore_collection_order(true);
                comparer.subscribe(Box::new(|_: Option<Fingerprint>, _: Option<Fingerprint>| {}));
            }
        }));
        comparer.add_ignore_rule(IgnoreRule::completely("A")).unwrap();
        assert!(comparer.rules().global_ignore_collection_order());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn failed_mutation_keeps_snapshot() {
        let comparer = Comparer::default();
        let before = comparer.fingerprint();
        assert!(comparer.add_ignore_rule(IgnoreRule::completely("Items[")).is_err());
        assert_eq!(comparer.fingerprint(), before);
    }

    #[test]
    fn in_flight_snapshot_is_stable() {
        let comparer = Comparer::default();
        let held = comparer.compiled();
        comparer.add_ignore_rule(IgnoreRule::completely("A")).unwrap();
        assert!(!held.is_ignored("A", "A"));
        assert!(comparer.compiled().is_ignored("A", "A"));
    }

    #[test]
    fn result_reports_raw_and_filtered_counts() {
        let comparer = Comparer::default();
        comparer.add_ignore_rule(IgnoreRule::completely("B")).unwrap();
        let left = Node::from_json_str(r#"{"A":1,"B":1}"#).unwrap();
        let right = Node::from_json_str(r#"{"A":1,"B":2}"#).unwrap();
        let result = comparer.compare(&left, &right);
        assert_eq!(result.raw_difference_count(), 1);
        assert!(result.are_equal());
        assert_eq!(result.fingerprint(), comparer.fingerprint());
        assert_eq!(comparer.stats().snapshot().ignored_by_rule, 1);
    }
}
