//! Path pattern matching with compiled-expression and outcome caches.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use regex::{Regex, RegexBuilder};

use crate::diff::INDEX_WILDCARD;
use crate::hash::{combine, hash_bytes, HashCode};
use crate::stats::{Counter, DiffStats};
use crate::OptionsError;

/// How much of a candidate path a pattern has to cover.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MatchMode {
    /// The pattern must cover the whole candidate.
    Exact,
    /// The pattern may cover the candidate or any of its ancestors.
    Subtree,
}

/// Resource bounds for [`PatternMatcher`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MatcherLimits {
    regex_size_limit: usize,
    max_candidate_len: usize,
    outcome_cache_capacity: usize,
}

impl Default for MatcherLimits {
    fn default() -> Self {
        Self { regex_size_limit: 1 << 20, max_candidate_len: 4096, outcome_cache_capacity: 16_384 }
    }
}

impl MatcherLimits {
    /// Compiled program size limit handed to the regex engine.
    #[must_use]
    pub fn regex_size_limit(&self) -> usize {
        self.regex_size_limit
    }

    /// Longest candidate path that is matched at all.
    #[must_use]
    pub fn max_candidate_len(&self) -> usize {
        self.max_candidate_len
    }

    /// Number of cached outcomes kept before the cache is cleared.
    #[must_use]
    pub fn outcome_cache_capacity(&self) -> usize {
        self.outcome_cache_capacity
    }

    /// Sets the compiled program size limit.
    #[must_use]
    pub fn with_regex_size_limit(mut self, bytes: usize) -> Self {
        self.regex_size_limit = bytes;
        self
    }

    /// Sets the outcome cache capacity; zero disables the cache.
    #[must_use]
    pub fn with_outcome_cache_capacity(mut self, entries: usize) -> Self {
        self.outcome_cache_capacity = entries;
        self
    }

    /// Sets the longest candidate path that is matched; longer candidates never match.
    ///
    /// ```
    /// # use apidiff_core::{MatcherLimits, OptionsError};
    /// let limits = MatcherLimits::default().with_max_candidate_len(0);
    /// assert_eq!(limits, Err(OptionsError::ZeroMaxPathLen));
    /// ```
    pub fn with_max_candidate_len(mut self, bytes: usize) -> Result<Self, OptionsError> {
        if bytes == 0 {
            return Err(OptionsError::ZeroMaxPathLen);
        }
        self.max_candidate_len = bytes;
        Ok(self)
    }
}

/// A path pattern prepared for matching.
#[derive(Debug)]
pub struct CompiledPattern {
    raw: String,
    kind: PatternKind,
}

#[derive(Debug)]
enum PatternKind {
    Literal,
    Wildcard { exact: Regex, subtree: Regex },
    Invalid { reason: String },
}

impl CompiledPattern {
    /// Compiles a pattern; failures produce a pattern that never matches.
    ///
    /// ```
    /// # use apidiff_core::{CompiledPattern, MatchMode, MatcherLimits};
    /// let pattern = CompiledPattern::compile("Items[*].Name", &MatcherLimits::default());
    /// assert!(pattern.matches("Items[7].Name", MatchMode::Exact));
    /// assert!(pattern.matches("Items[*].Name", MatchMode::Exact));
    /// assert!(!pattern.matches("Items.Name", MatchMode::Exact));
    /// ```
    #[must_use]
    pub fn compile(raw: &str, limits: &MatcherLimits) -> Self {
        if !raw.contains('*') {
            return Self { raw: raw.to_owned(), kind: PatternKind::Literal };
        }
        let body = translate(raw);
        let name_wildcard = has_name_wildcard(raw);
        let build = |anchored: String| {
            RegexBuilder::new(&anchored)
                .case_insensitive(name_wildcard)
                .size_limit(limits.regex_size_limit)
                .dfa_size_limit(limits.regex_size_limit)
                .build()
        };
        let compiled = build(format!("^(?:{body})$"))
            .and_then(|exact| Ok((exact, build(format!(r"^(?:{body})(?:$|[.\[])"))?)));
        let kind = match compiled {
            Ok((exact, subtree)) => PatternKind::Wildcard { exact, subtree },
            Err(err) => PatternKind::Invalid { reason: err.to_string() },
        };
        Self { raw: raw.to_owned(), kind }
    }

    /// The pattern as written.
    #[must_use]
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Why the pattern failed to compile, if it did.
    #[must_use]
    pub fn invalid_reason(&self) -> Option<&str> {
        match &self.kind {
            PatternKind::Invalid { reason } => Some(reason),
            _ => None,
        }
    }

    /// Indicates whether the pattern holds a `*` of either flavour.
    #[must_use]
    pub fn is_wildcard(&self) -> bool {
        !matches!(self.kind, PatternKind::Literal)
    }

    /// Tests a candidate path against the pattern.
    ///
    /// ```
    /// # use apidiff_core::{CompiledPattern, MatchMode, MatcherLimits};
    /// let pattern = CompiledPattern::compile("Order.Items", &MatcherLimits::default());
    /// assert!(pattern.matches("Order.Items[3].Sku", MatchMode::Subtree));
    /// assert!(!pattern.matches("Order.ItemsCount", MatchMode::Subtree));
    /// ```
    #[must_use]
    pub fn matches(&self, candidate: &str, mode: MatchMode) -> bool {
        match (&self.kind, mode) {
            (PatternKind::Literal, MatchMode::Exact) => candidate == self.raw,
            (PatternKind::Literal, MatchMode::Subtree) => is_subtree_of(candidate, &self.raw),
            (PatternKind::Wildcard { exact, .. }, MatchMode::Exact) => exact.is_match(candidate),
            (PatternKind::Wildcard { subtree, .. }, MatchMode::Subtree) => {
                subtree.is_match(candidate)
            }
            (PatternKind::Invalid { .. }, _) => false,
        }
    }
}

/// `candidate` equals `prefix` or continues it with `.` or `[`.
fn is_subtree_of(candidate: &str, prefix: &str) -> bool {
    match candidate.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('.') || rest.starts_with('['),
        None => false,
    }
}

fn has_name_wildcard(raw: &str) -> bool {
    raw.replace(INDEX_WILDCARD, "").contains('*')
}

fn translate(raw: &str) -> String {
    let mut body = String::with_capacity(raw.len() * 2);
    let mut rest = raw;
    while let Some(ch) = rest.chars().next() {
        if let Some(after) = rest.strip_prefix(INDEX_WILDCARD) {
            body.push_str(r"\[(?:\d+|\*)\]");
            rest = after;
        } else if ch == '*' {
            body.push_str(r"[^.\[\]]*");
            rest = &rest[1..];
        } else {
            body.push_str(&regex::escape(ch.encode_utf8(&mut [0; 4])));
            rest = &rest[ch.len_utf8()..];
        }
    }
    body
}

/// A sorted, deduplicated group of compiled patterns with a stable key.
#[derive(Clone, Debug, Default)]
pub struct PatternSet {
    key: HashCode,
    patterns: Vec<Arc<CompiledPattern>>,
}

impl PatternSet {
    /// Number of patterns in the set.
    #[must_use]
    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    /// Indicates whether the set holds no patterns.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Raw patterns in sorted order.
    pub fn raw_patterns(&self) -> impl Iterator<Item = &str> {
        self.patterns.iter().map(|pattern| pattern.raw())
    }
}

type OutcomeKey = (String, HashCode, MatchMode);

/// Matches candidate paths against patterns.
///
/// Compiled expressions are cached by raw pattern and outcomes by
/// `(candidate, pattern set, mode)`. Both caches tolerate racing inserts.
///
/// ```
/// # use apidiff_core::{MatchMode, PatternMatcher};
/// let matcher = PatternMatcher::default();
/// let set = matcher.pattern_set(["*Id", "Items[*].Price"]);
/// assert!(!matcher.matches_any("Customer.customerid", &set, MatchMode::Exact));
/// assert!(matcher.matches_any("customerid", &set, MatchMode::Exact));
/// assert!(matcher.matches_any("Items[0].Price.Amount", &set, MatchMode::Subtree));
/// ```
#[derive(Debug, Default)]
pub struct PatternMatcher {
    limits: MatcherLimits,
    stats: Arc<DiffStats>,
    compiled: RwLock<HashMap<String, Arc<CompiledPattern>>>,
    outcomes: RwLock<HashMap<OutcomeKey, bool>>,
}

impl PatternMatcher {
    /// Creates a matcher with the given limits.
    #[must_use]
    pub fn new(limits: MatcherLimits) -> Self {
        Self { limits, ..Self::default() }
    }

    /// Reports cache events to `stats`.
    #[must_use]
    pub fn with_stats(mut self, stats: Arc<DiffStats>) -> Self {
        self.stats = stats;
        self
    }

    /// Active limits.
    #[must_use]
    pub fn limits(&self) -> &MatcherLimits {
        &self.limits
    }

    /// Returns the compiled form of `raw`, compiling and caching it on first use.
    pub fn compile(&self, raw: &str) -> Arc<CompiledPattern> {
        if let Some(hit) = self.compiled.read().unwrap_or_else(PoisonError::into_inner).get(raw) {
            return Arc::clone(hit);
        }
        let pattern = Arc::new(CompiledPattern::compile(raw, &self.limits));
        if let Some(reason) = pattern.invalid_reason() {
            tracing::warn!(
                pattern = raw,
                %reason,
                "path pattern failed to compile and will never match"
            );
            self.stats.incr(Counter::InvalidPatterns);
        }
        let mut cache = self.compiled.write().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(cache.entry(raw.to_owned()).or_insert(pattern))
    }

    /// Compiles patterns into a [`PatternSet`] whose key ignores input order.
    pub fn pattern_set<I, S>(&self, raws: I) -> PatternSet
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut sorted: Vec<String> = raws.into_iter().map(|raw| raw.as_ref().to_owned()).collect();
        sorted.sort();
        sorted.dedup();
        let key = combine(sorted.iter().map(|raw| hash_bytes(raw.as_bytes())).collect());
        let patterns = sorted.iter().map(|raw| self.compile(raw)).collect();
        PatternSet { key, patterns }
    }

    /// Tests `candidate` against every pattern in `set`.
    pub fn matches_any(&self, candidate: &str, set: &PatternSet, mode: MatchMode) -> bool {
        if set.is_empty() {
            return false;
        }
        if candidate.len() > self.limits.max_candidate_len {
            tracing::warn!(
                length = candidate.len(),
                limit = self.limits.max_candidate_len,
                "candidate path exceeds matcher limit and is treated as unmatched"
            );
            return false;
        }
        let key = (candidate.to_owned(), set.key, mode);
        if let Some(hit) = self.outcomes.read().unwrap_or_else(PoisonError::into_inner).get(&key) {
            self.stats.incr(Counter::OutcomeCacheHits);
            return *hit;
        }
        let outcome = set.patterns.iter().any(|pattern| pattern.matches(candidate, mode));
        if self.limits.outcome_cache_capacity > 0 {
            let mut outcomes = self.outcomes.write().unwrap_or_else(PoisonError::into_inner);
            if outcomes.len() >= self.limits.outcome_cache_capacity {
                outcomes.clear();
            }
            outcomes.insert(key, outcome);
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compile(raw: &str) -> CompiledPattern {
        CompiledPattern::compile(raw, &MatcherLimits::default())
    }

    #[test]
    fn literal_prefix_rule_respects_boundaries() {
        let pattern = compile("Items");
        assert!(pattern.matches("Items", MatchMode::Subtree));
        assert!(pattern.matches("Items[0]", MatchMode::Subtree));
        assert!(pattern.matches("Items.Count", MatchMode::Subtree));
        assert!(!pattern.matches("ItemsTotal", MatchMode::Subtree));
        assert!(!pattern.matches("Items[0]", MatchMode::Exact));
    }

    #[test]
    fn name_wildcard_never_crosses_segments() {
        let pattern = compile("*Id");
        assert!(pattern.matches("CustomerId", MatchMode::Exact));
        assert!(pattern.matches("customerID", MatchMode::Exact));
        assert!(!pattern.matches("Customer.Id.Value", MatchMode::Exact));
        assert!(!pattern.matches("CustomerName", MatchMode::Exact));
    }

    #[test]
    fn index_wildcard_is_case_sensitive_elsewhere() {
        let pattern = compile("Items[*].Sku");
        assert!(pattern.matches("Items[12].Sku", MatchMode::Exact));
        assert!(!pattern.matches("items[12].sku", MatchMode::Exact));
        assert!(pattern.matches("Items[12].Sku.Code", MatchMode::Subtree));
        assert!(!pattern.matches("Items[12].SkuCode", MatchMode::Subtree));
    }

    #[test]
    fn regex_metacharacters_are_literal() {
        let pattern = compile("a+b.*");
        assert!(pattern.matches("a+b.c", MatchMode::Exact));
        assert!(!pattern.matches("aab.c", MatchMode::Exact));
    }

    #[test]
    fn oversized_patterns_fail_closed() {
        let limits = MatcherLimits::default().with_regex_size_limit(16);
        let pattern = CompiledPattern::compile("Items[*].*.*.*.Name", &limits);
        assert!(pattern.invalid_reason().is_some());
        assert!(!pattern.matches("Items[0].a.b.c.Name", MatchMode::Exact));
    }

    #[test]
    fn long_candidates_fail_closed() {
        let limits = MatcherLimits::default().with_max_candidate_len(8).unwrap();
        let matcher = PatternMatcher::new(limits);
        let set = matcher.pattern_set(["*"]);
        assert!(matcher.matches_any("short", &set, MatchMode::Exact));
        assert!(!matcher.matches_any("much_longer_than_eight", &set, MatchMode::Exact));
    }

    #[test]
    fn pattern_set_key_ignores_order() {
        let matcher = PatternMatcher::default();
        let a = matcher.pattern_set(["b*", "a*", "a*"]);
        let b = matcher.pattern_set(["a*", "b*"]);
        assert_eq!(a.key, b.key);
        assert_eq!(a.len(), 2);
    }

    #[test]
    fn outcome_cache_records_hits() {
        let stats = Arc::new(DiffStats::default());
        let matcher = PatternMatcher::default().with_stats(Arc::clone(&stats));
        let set = matcher.pattern_set(["A[*]"]);
        assert!(matcher.matches_any("A[1].B", &set, MatchMode::Subtree));
        assert!(matcher.matches_any("A[1].B", &set, MatchMode::Subtree));
        assert_eq!(stats.snapshot().outcome_cache_hits, 1);
    }

    #[test]
    fn compile_cache_shares_instances() {
        let matcher = PatternMatcher::default();
        assert!(Arc::ptr_eq(&matcher.compile("X[*]"), &matcher.compile("X[*]")));
    }
}
