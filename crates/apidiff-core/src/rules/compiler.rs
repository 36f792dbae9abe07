use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, PoisonError, RwLock};

use super::matcher::{CompiledPattern, MatchMode, MatcherLimits, PatternMatcher, PatternSet};
use super::{RuleSet, SmartRuleKind};
use crate::diff::{normalize, split_name, split_segments, Difference, INDEX_WILDCARD};
use crate::stats::{Counter, DiffStats};
use crate::Fingerprint;

/// Bounds applied while compiling rule sets.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompilerLimits {
    max_variants_per_rule: usize,
    cache_capacity: usize,
}

impl Default for CompilerLimits {
    fn default() -> Self {
        Self { max_variants_per_rule: 64, cache_capacity: 32 }
    }
}

impl CompilerLimits {
    /// Most path variants generated for a single rule.
    #[must_use]
    pub fn max_variants_per_rule(&self) -> usize {
        self.max_variants_per_rule
    }

    /// Most compiled rule sets kept before the cache is cleared.
    #[must_use]
    pub fn cache_capacity(&self) -> usize {
        self.cache_capacity
    }

    /// Sets the per-rule variant cap.
    #[must_use]
    pub fn with_max_variants_per_rule(mut self, cap: usize) -> Self {
        self.max_variants_per_rule = cap;
        self
    }

    /// Sets the compile cache capacity; zero disables caching.
    #[must_use]
    pub fn with_cache_capacity(mut self, capacity: usize) -> Self {
        self.cache_capacity = capacity;
        self
    }
}

/// An enabled smart rule prepared for filtering.
#[derive(Debug)]
pub enum CompiledSmartRule {
    /// Lowercased leaf name to compare against.
    ExactName(String),
    /// Glob over leaf names.
    NamePattern(Arc<CompiledPattern>),
    /// Declared type or value kind name.
    DeclaredType(String),
}

impl CompiledSmartRule {
    /// Tests a difference against the rule.
    #[must_use]
    pub fn matches(&self, difference: &Difference) -> bool {
        match self {
            Self::ExactName(name) => difference.leaf_name().to_lowercase() == *name,
            Self::NamePattern(pattern) if pattern.is_wildcard() => {
                pattern.matches(difference.leaf_name(), MatchMode::Exact)
            }
            Self::NamePattern(pattern) => {
                difference.leaf_name().to_lowercase() == pattern.raw().to_lowercase()
            }
            Self::DeclaredType(name) => difference.mentions_type(name),
        }
    }
}

/// Immutable, matcher-ready form of a [`RuleSet`].
#[derive(Debug)]
pub struct CompiledRuleSet {
    fingerprint: Option<Fingerprint>,
    exact_ignore_paths: BTreeSet<String>,
    ignore_patterns: PatternSet,
    order_override_paths: BTreeSet<String>,
    order_override_patterns: PatternSet,
    smart_rules: Vec<CompiledSmartRule>,
    global_ignore_collection_order: bool,
    truncated_rules: Vec<String>,
    matcher: Arc<PatternMatcher>,
}

impl CompiledRuleSet {
    /// Fingerprint of the source rule set.
    #[must_use]
    pub fn fingerprint(&self) -> Option<Fingerprint> {
        self.fingerprint
    }

    /// Wildcard-free ignore paths, including generated variants.
    pub fn exact_ignore_paths(&self) -> impl Iterator<Item = &str> {
        self.exact_ignore_paths.iter().map(String::as_str)
    }

    /// Ignore variants that carry wildcards.
    #[must_use]
    pub fn ignore_patterns(&self) -> &PatternSet {
        &self.ignore_patterns
    }

    /// Wildcard-free collection-order override paths.
    pub fn order_override_paths(&self) -> impl Iterator<Item = &str> {
        self.order_override_paths.iter().map(String::as_str)
    }

    /// Enabled smart rules, in rule-set order.
    #[must_use]
    pub fn smart_rules(&self) -> &[CompiledSmartRule] {
        &self.smart_rules
    }

    /// Effective global order flag.
    #[must_use]
    pub fn global_ignore_collection_order(&self) -> bool {
        self.global_ignore_collection_order
    }

    /// Patterns whose variant expansion hit the cap.
    #[must_use]
    pub fn truncated_rules(&self) -> &[String] {
        &self.truncated_rules
    }

    /// Indicates whether any path-specific order override exists.
    #[must_use]
    pub fn has_order_overrides(&self) -> bool {
        !self.order_override_paths.is_empty() || !self.order_override_patterns.is_empty()
    }

    /// Whether a difference at this path falls under an ignore-completely rule.
    #[must_use]
    pub fn is_ignored(&self, concrete: &str, canonical: &str) -> bool {
        [concrete, canonical].into_iter().any(|candidate| {
            has_ignored_prefix(&self.exact_ignore_paths, candidate)
                || self.matcher.matches_any(candidate, &self.ignore_patterns, MatchMode::Subtree)
        })
    }

    /// Whether the collection at this path is compared as a multiset.
    ///
    /// A path override always wins; the global flag only applies when no
    /// overrides are configured at all.
    #[must_use]
    pub fn is_unordered(&self, concrete: &str, canonical: &str) -> bool {
        if !self.has_order_overrides() {
            return self.global_ignore_collection_order;
        }
        [concrete, canonical].into_iter().any(|candidate| {
            self.order_override_paths.contains(candidate)
                || self.matcher.matches_any(
                    candidate,
                    &self.order_override_patterns,
                    MatchMode::Exact,
                )
        })
    }
}

fn has_ignored_prefix(paths: &BTreeSet<String>, candidate: &str) -> bool {
    if paths.is_empty() {
        return false;
    }
    candidate
        .char_indices()
        .filter(|&(_, ch)| ch == '.' || ch == '[')
        .map(|(offset, _)| &candidate[..offset])
        .chain(std::iter::once(candidate))
        .any(|prefix| paths.contains(prefix))
}

/// Compiles rule sets and caches the results by fingerprint.
///
/// ```
/// # use std::sync::Arc;
/// # use apidiff_core::{IgnoreRule, RuleCompiler, RuleSet};
/// let compiler = RuleCompiler::default();
/// let mut rules = RuleSet::new();
/// rules.add_ignore_rule(IgnoreRule::completely("Lines.Sku"))?;
/// let first = compiler.compile(&rules);
/// let second = compiler.compile(&rules.clone());
/// assert!(Arc::ptr_eq(&first, &second));
/// assert!(first.is_ignored("Lines[4].Sku", "Lines[*].Sku"));
/// # Ok::<(), apidiff_core::ConfigError>(())
/// ```
#[derive(Debug)]
pub struct RuleCompiler {
    limits: CompilerLimits,
    matcher: Arc<PatternMatcher>,
    stats: Arc<DiffStats>,
    cache: RwLock<HashMap<Fingerprint, Arc<CompiledRuleSet>>>,
}

impl Default for RuleCompiler {
    fn default() -> Self {
        Self::new(CompilerLimits::default(), MatcherLimits::default())
    }
}

impl RuleCompiler {
    /// Creates a compiler with its own pattern matcher.
    #[must_use]
    pub fn new(limits: CompilerLimits, matcher_limits: MatcherLimits) -> Self {
        Self {
            limits,
            matcher: Arc::new(PatternMatcher::new(matcher_limits)),
            stats: Arc::default(),
            cache: RwLock::default(),
        }
    }

    /// Reports compiler and matcher events to `stats`.
    #[must_use]
    pub fn with_stats(mut self, stats: Arc<DiffStats>) -> Self {
        let matcher_limits = self.matcher.limits().clone();
        self.matcher = Arc::new(PatternMatcher::new(matcher_limits).with_stats(Arc::clone(&stats)));
        self.stats = stats;
        self
    }

    /// Active limits.
    #[must_use]
    pub fn limits(&self) -> &CompilerLimits {
        &self.limits
    }

    /// Number of compiled rule sets currently cached.
    #[must_use]
    pub fn cached_len(&self) -> usize {
        self.cache.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Returns the compiled form of `rules`, reusing a cached one when the fingerprint matches.
    pub fn compile(&self, rules: &RuleSet) -> Arc<CompiledRuleSet> {
        let fingerprint = rules.fingerprint();
        if let Some(fingerprint) = fingerprint {
            let cache = self.cache.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(hit) = cache.get(&fingerprint) {
                self.stats.incr(Counter::CompileCacheHits);
                tracing::debug!(%fingerprint, "rule set served from compile cache");
                return Arc::clone(hit);
            }
        }
        self.stats.incr(Counter::CompileCacheMisses);
        let compiled = Arc::new(self.build(rules, fingerprint));
        tracing::debug!(
            fingerprint = ?fingerprint.map(|fp| fp.to_string()),
            exact_ignore_paths = compiled.exact_ignore_paths.len(),
            ignore_patterns = compiled.ignore_patterns.len(),
            "compiled rule set"
        );

        if let Some(fingerprint) = fingerprint {
            if self.limits.cache_capacity > 0 {
                let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);
                if cache.len() >= self.limits.cache_capacity {
                    cache.clear();
                }
                cache.insert(fingerprint, Arc::clone(&compiled));
            }
        }
        compiled
    }

    fn build(&self, rules: &RuleSet, fingerprint: Option<Fingerprint>) -> CompiledRuleSet {
        let mut exact_ignore_paths = BTreeSet::new();
        let mut ignore_wildcards = BTreeSet::new();
        let mut order_override_paths = BTreeSet::new();
        let mut order_wildcards = BTreeSet::new();
        let mut truncated_rules = Vec::new();

        for rule in rules.ignore_rules() {
            let (exact, wildcards) = if rule.ignore_completely() {
                (&mut exact_ignore_paths, &mut ignore_wildcards)
            } else if rule.ignore_collection_order() {
                (&mut order_override_paths, &mut order_wildcards)
            } else {
                continue;
            };
            let (variants, truncated) =
                expand_variants(rule.path_pattern(), self.limits.max_variants_per_rule);
            if truncated {
                tracing::warn!(
                    pattern = rule.path_pattern(),
                    cap = self.limits.max_variants_per_rule,
                    "variant expansion capped; deeper collection levels may not match"
                );
                self.stats.incr(Counter::VariantCaps);
                truncated_rules.push(rule.path_pattern().to_owned());
            }
            for variant in variants {
                if variant.contains('*') {
                    wildcards.insert(variant);
                } else {
                    exact.insert(variant);
                }
            }
        }

        let mut global_ignore_collection_order = rules.global_ignore_collection_order();
        let mut smart_rules = Vec::new();
        for rule in rules.smart_rules().iter().filter(|rule| rule.is_enabled()) {
            match rule.kind() {
                SmartRuleKind::ByExactName => {
                    smart_rules.push(CompiledSmartRule::ExactName(rule.value().to_lowercase()));
                }
                SmartRuleKind::ByNamePattern => {
                    let pattern = self.matcher.compile(rule.value());
                    smart_rules.push(CompiledSmartRule::NamePattern(pattern));
                }
                SmartRuleKind::ByDeclaredType => {
                    smart_rules.push(CompiledSmartRule::DeclaredType(rule.value().to_owned()));
                }
                SmartRuleKind::ByGlobalCollectionOrder => global_ignore_collection_order = true,
            }
        }

        CompiledRuleSet {
            fingerprint,
            exact_ignore_paths,
            ignore_patterns: self.matcher.pattern_set(&ignore_wildcards),
            order_override_paths,
            order_override_patterns: self.matcher.pattern_set(&order_wildcards),
            smart_rules,
            global_ignore_collection_order,
            truncated_rules,
            matcher: Arc::clone(&self.matcher),
        }
    }
}

/// Literal, normalized and collection-level forms of a rule pattern.
///
/// Collection-level forms insert `[*]` after every combination of non-leaf
/// segments that carry no selector, so `Order.Lines.Sku` also covers
/// `Order.Lines[*].Sku` and `Order[*].Lines[*].Sku`. The literal and
/// normalized forms are kept whatever the cap.
fn expand_variants(pattern: &str, cap: usize) -> (BTreeSet<String>, bool) {
    let mut variants = BTreeSet::new();
    variants.insert(pattern.to_owned());
    let normalized = normalize(pattern);
    variants.insert(normalized.clone());
    let segments = split_segments(&normalized);
    let slots: Vec<usize> = (0..segments.len().saturating_sub(1))
        .filter(|&position| split_name(segments[position]).1.is_empty())
        .collect();

    let combinations = 1_u128
        .checked_shl(u32::try_from(slots.len()).unwrap_or(u32::MAX))
        .unwrap_or(u128::MAX);
    let mut mask = 0_u128;
    while mask < combinations {
        let mut variant =
            String::with_capacity(normalized.len() + slots.len() * INDEX_WILDCARD.len());
        for (position, segment) in segments.iter().enumerate() {
            if position > 0 {
                variant.push('.');
            }
            variant.push_str(segment);
            let selected = slots
                .iter()
                .position(|&slot| slot == position)
                .and_then(|bit| u32::try_from(bit).ok())
                .and_then(|bit| mask.checked_shr(bit))
                .is_some_and(|shifted| shifted & 1 == 1);
            if selected {
                variant.push_str(INDEX_WILDCARD);
            }
        }
        if !variants.contains(&variant) {
            if variants.len() >= cap {
                return (variants, true);
            }
            variants.insert(variant);
        }
        mask += 1;
    }
    (variants, false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::DifferenceKind;
    use crate::{IgnoreRule, Node, SmartRule};

    fn difference(path: &str) -> Difference {
        let one = Node::from_json_str("1").unwrap();
        Difference::new(DifferenceKind::ValueChanged, path, one, Node::Void)
    }

    #[test]
    fn variants_cover_collection_levels() {
        let (variants, truncated) = expand_variants("Order.Lines.Sku", 64);
        assert!(!truncated);
        let expected: BTreeSet<String> =
            ["Order.Lines.Sku", "Order[*].Lines.Sku", "Order.Lines[*].Sku", "Order[*].Lines[*].Sku"]
                .into_iter()
                .map(String::from)
                .collect();
        assert_eq!(variants, expected);
    }

    #[test]
    fn variants_include_normalized_form() {
        let (variants, _) = expand_variants("Lines[3].ns:Sku", 64);
        assert!(variants.contains("Lines[3].ns:Sku"));
        assert!(variants.contains("Lines[*].Sku"));
    }

    #[test]
    fn normalized_form_survives_a_tight_cap() {
        let (variants, truncated) = expand_variants("Lines[3].ns:Sku", 1);
        assert!(variants.contains("Lines[3].ns:Sku"));
        assert!(variants.contains("Lines[*].Sku"));
        assert!(!truncated);

        let mut rules = RuleSet::new();
        rules.add_ignore_rule(IgnoreRule::completely("Lines[3].ns:Sku")).unwrap();
        let compiled = RuleCompiler::new(
            CompilerLimits::default().with_max_variants_per_rule(1),
            MatcherLimits::default(),
        )
        .compile(&rules);
        assert!(compiled.is_ignored("Lines[7].Sku", "Lines[*].Sku"));
    }

    #[test]
    fn variant_cap_is_reported() {
        let stats = Arc::new(DiffStats::default());
        let limits = CompilerLimits::default().with_max_variants_per_rule(4);
        let compiler =
            RuleCompiler::new(limits, MatcherLimits::default()).with_stats(Arc::clone(&stats));
        let mut rules = RuleSet::new();
        rules.add_ignore_rule(IgnoreRule::completely("A.B.C.D.E")).unwrap();
        let compiled = compiler.compile(&rules);
        assert_eq!(compiled.truncated_rules(), ["A.B.C.D.E"]);
        assert_eq!(stats.snapshot().variant_caps, 1);
        assert!(compiled.is_ignored("A.B.C.D.E", "A.B.C.D.E"));
    }

    #[test]
    fn exact_prefixes_stop_at_segment_boundaries() {
        let mut rules = RuleSet::new();
        rules.add_ignore_rule(IgnoreRule::completely("Audit")).unwrap();
        let compiled = RuleCompiler::default().compile(&rules);
        assert!(compiled.is_ignored("Audit", "Audit"));
        assert!(compiled.is_ignored("Audit[2].By", "Audit[*].By"));
        assert!(!compiled.is_ignored("AuditTrail", "AuditTrail"));
    }

    #[test]
    fn global_flag_yields_to_overrides() {
        let mut rules = RuleSet::new().with_global_ignore_collection_order(true);
        let compiled = RuleCompiler::default().compile(&rules);
        assert!(compiled.is_unordered("Tags", "Tags"));
        rules.add_ignore_rule(IgnoreRule::collection_order("Items")).unwrap();
        let compiled = RuleCompiler::default().compile(&rules);
        assert!(compiled.is_unordered("Items", "Items"));
        assert!(!compiled.is_unordered("Tags", "Tags"));
    }

    #[test]
    fn nested_overrides_match_every_parent_index() {
        let mut rules = RuleSet::new();
        rules.add_ignore_rule(IgnoreRule::collection_order("Orders.Lines")).unwrap();
        let compiled = RuleCompiler::default().compile(&rules);
        assert!(compiled.is_unordered("Orders[3].Lines", "Orders[*].Lines"));
        assert!(!compiled.is_unordered("Orders[3].Lines[0].Tags", "Orders[*].Lines[*].Tags"));
    }

    #[test]
    fn global_order_smart_rule_sets_flag() {
        let mut rules = RuleSet::new();
        rules.add_smart_rule(SmartRule::global_collection_order()).unwrap();
        assert!(RuleCompiler::default().compile(&rules).global_ignore_collection_order());
        let mut disabled = RuleSet::new();
        disabled.add_smart_rule(SmartRule::global_collection_order().with_enabled(false)).unwrap();
        assert!(!RuleCompiler::default().compile(&disabled).global_ignore_collection_order());
    }

    #[test]
    fn smart_rules_match_leaf_names() {
        let exact = CompiledSmartRule::ExactName("etag".into());
        assert!(exact.matches(&difference("Headers.ETag")));
        let matcher = PatternMatcher::default();
        let pattern = CompiledSmartRule::NamePattern(matcher.compile("*Id"));
        assert!(pattern.matches(&difference("Order.CustomerId")));
        assert!(!pattern.matches(&difference("Order.CustomerName")));
        let literal = CompiledSmartRule::NamePattern(matcher.compile("Version"));
        assert!(literal.matches(&difference("Meta.version")));
    }

    #[test]
    fn equal_rule_sets_share_compiled_form() {
        let compiler = RuleCompiler::default();
        let mut a = RuleSet::new();
        a.add_ignore_rule(IgnoreRule::completely("X")).unwrap();
        a.add_smart_rule(SmartRule::by_exact_name("Y")).unwrap();
        let mut b = RuleSet::new();
        b.add_smart_rule(SmartRule::by_exact_name("Y")).unwrap();
        b.add_ignore_rule(IgnoreRule::completely("X")).unwrap();
        assert!(Arc::ptr_eq(&compiler.compile(&a), &compiler.compile(&b)));
        assert_eq!(compiler.cached_len(), 1);
    }
}
