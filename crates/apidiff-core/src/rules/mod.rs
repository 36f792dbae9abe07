//! Ignore rules, smart rules and their compiled form.
//!
//! A [`RuleSet`] is what users edit. [`RuleCompiler`] turns it into an
//! immutable [`CompiledRuleSet`] that the diff engine and post-filter read.
//!
//! ```
//! use apidiff_core::{IgnoreRule, RuleCompiler, RuleSet, SmartRule};
//!
//! let mut rules = RuleSet::new();
//! rules.add_ignore_rule(IgnoreRule::completely("Order.Audit"))?;
//! rules.add_ignore_rule(IgnoreRule::collection_order("Order.Items"))?;
//! rules.add_smart_rule(SmartRule::by_name_pattern("*Id"))?;
//!
//! let compiled = RuleCompiler::default().compile(&rules);
//! assert!(compiled.is_ignored("Order.Audit.Editor", "Order.Audit.Editor"));
//! assert!(compiled.is_unordered("Order.Items", "Order.Items"));
//! # Ok::<(), apidiff_core::ConfigError>(())
//! ```

mod compiler;
mod matcher;

pub use compiler::{CompiledRuleSet, CompiledSmartRule, CompilerLimits, RuleCompiler};
pub use matcher::{CompiledPattern, MatchMode, MatcherLimits, PatternMatcher, PatternSet};

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{ConfigError, Fingerprint};

/// Path-scoped rule: ignore a subtree, or compare a collection without regard to order.
///
/// When both flags are set, `ignore_completely` wins.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IgnoreRule {
    #[serde(alias = "PathPattern")]
    path_pattern: String,
    #[serde(default, alias = "IgnoreCompletely")]
    ignore_completely: bool,
    #[serde(default, alias = "IgnoreCollectionOrder")]
    ignore_collection_order: bool,
}

impl IgnoreRule {
    /// Creates a rule with explicit flags.
    #[must_use]
    pub fn new<S>(path_pattern: S, ignore_completely: bool, ignore_collection_order: bool) -> Self
    where
        S: Into<String>,
    {
        Self { path_pattern: path_pattern.into(), ignore_completely, ignore_collection_order }
    }

    /// Ignores every difference at or below `path_pattern`.
    #[must_use]
    pub fn completely<S: Into<String>>(path_pattern: S) -> Self {
        Self::new(path_pattern, true, false)
    }

    /// Compares the collection at `path_pattern` as a multiset.
    #[must_use]
    pub fn collection_order<S: Into<String>>(path_pattern: S) -> Self {
        Self::new(path_pattern, false, true)
    }

    /// The pattern as configured.
    #[must_use]
    pub fn path_pattern(&self) -> &str {
        &self.path_pattern
    }

    /// Whether matching differences are dropped.
    #[must_use]
    pub fn ignore_completely(&self) -> bool {
        self.ignore_completely
    }

    /// Whether the collection order is disregarded. Only effective when
    /// [`IgnoreRule::ignore_completely`] is false.
    #[must_use]
    pub fn ignore_collection_order(&self) -> bool {
        self.ignore_collection_order && !self.ignore_completely
    }
}

/// Heuristic targeted by a [`SmartRule`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SmartRuleKind {
    /// Leaf field name equals the value, ignoring case.
    #[serde(alias = "byExactName")]
    ByExactName,
    /// Leaf field name matches the glob in the value.
    #[serde(alias = "byNamePattern")]
    ByNamePattern,
    /// Declared type or value kind of either side equals the value, ignoring case.
    #[serde(alias = "byDeclaredType")]
    ByDeclaredType,
    /// Compare every collection without regard to order.
    #[serde(alias = "byGlobalCollectionOrder")]
    ByGlobalCollectionOrder,
}

impl fmt::Display for SmartRuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::ByExactName => "ByExactName",
            Self::ByNamePattern => "ByNamePattern",
            Self::ByDeclaredType => "ByDeclaredType",
            Self::ByGlobalCollectionOrder => "ByGlobalCollectionOrder",
        };
        f.write_str(label)
    }
}

/// Post-hoc filter keyed on field names or value types rather than paths.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SmartRule {
    #[serde(alias = "Kind", alias = "type", alias = "Type")]
    kind: SmartRuleKind,
    #[serde(default, alias = "Value")]
    value: String,
    #[serde(default = "enabled_by_default", alias = "Enabled")]
    enabled: bool,
}

fn enabled_by_default() -> bool {
    true
}

impl SmartRule {
    /// Creates an enabled rule.
    #[must_use]
    pub fn new<S: Into<String>>(kind: SmartRuleKind, value: S) -> Self {
        Self { kind, value: value.into(), enabled: true }
    }

    /// Drops differences whose leaf field is named `name`.
    #[must_use]
    pub fn by_exact_name<S: Into<String>>(name: S) -> Self {
        Self::new(SmartRuleKind::ByExactName, name)
    }

    /// Drops differences whose leaf field name matches `pattern`.
    #[must_use]
    pub fn by_name_pattern<S: Into<String>>(pattern: S) -> Self {
        Self::new(SmartRuleKind::ByNamePattern, pattern)
    }

    /// Drops differences where either side is of type `type_name`.
    #[must_use]
    pub fn by_declared_type<S: Into<String>>(type_name: S) -> Self {
        Self::new(SmartRuleKind::ByDeclaredType, type_name)
    }

    /// Compares every collection without regard to order.
    #[must_use]
    pub fn global_collection_order() -> Self {
        Self::new(SmartRuleKind::ByGlobalCollectionOrder, "")
    }

    /// Enables or disables the rule.
    #[must_use]
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// The heuristic this rule applies.
    #[must_use]
    pub fn kind(&self) -> SmartRuleKind {
        self.kind
    }

    /// The name, pattern or type name the rule targets.
    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Whether the rule participates in filtering.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }
}

/// Named bundles of smart rules.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Preset {
    /// Both [`Preset::Identifiers`] and [`Preset::Timestamps`].
    IdentifiersAndTimestamps,
    /// Timestamp-typed values and fields named `*Timestamp`.
    Timestamps,
    /// Identifier-typed values, fields named `Id` and fields named `*Id`.
    Identifiers,
    /// Every collection compared without regard to order.
    CollectionOrder,
}

impl Preset {
    /// Every preset, in declaration order.
    pub const ALL: [Self; 4] = [
        Self::IdentifiersAndTimestamps,
        Self::Timestamps,
        Self::Identifiers,
        Self::CollectionOrder,
    ];

    /// The smart rules this preset adds.
    #[must_use]
    pub fn rules(self) -> Vec<SmartRule> {
        match self {
            Self::IdentifiersAndTimestamps => {
                let mut rules = Self::Identifiers.rules();
                rules.extend(Self::Timestamps.rules());
                rules
            }
            Self::Timestamps => vec![
                SmartRule::by_declared_type("Timestamp"),
                SmartRule::by_name_pattern("*Timestamp"),
            ],
            Self::Identifiers => vec![
                SmartRule::by_declared_type("Identifier"),
                SmartRule::by_exact_name("Id"),
                SmartRule::by_name_pattern("*Id"),
            ],
            Self::CollectionOrder => vec![SmartRule::global_collection_order()],
        }
    }

    /// Kebab-case name accepted by [`Preset::from_str`].
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::IdentifiersAndTimestamps => "identifiers-and-timestamps",
            Self::Timestamps => "timestamps",
            Self::Identifiers => "identifiers",
            Self::CollectionOrder => "collection-order",
        }
    }
}

impl fmt::Display for Preset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Preset {
    type Err = ConfigError;

    /// ```
    /// # use apidiff_core::Preset;
    /// assert_eq!("timestamps".parse::<Preset>().unwrap(), Preset::Timestamps);
    /// assert!("everything".parse::<Preset>().is_err());
    /// ```
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|preset| preset.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ConfigError::UnknownPreset { name: s.to_owned() })
    }
}

/// Ordered, duplicate-free collection of rules plus the global order flag.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RuleSet {
    ignore_rules: Vec<IgnoreRule>,
    smart_rules: Vec<SmartRule>,
    global_ignore_collection_order: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RulesDocument {
    #[serde(default, alias = "IgnoreRules")]
    ignore_rules: Vec<IgnoreRule>,
    #[serde(default, alias = "SmartIgnoreRules")]
    smart_ignore_rules: Vec<SmartRule>,
    #[serde(default, alias = "GlobalIgnoreCollectionOrder")]
    global_ignore_collection_order: bool,
}

#[derive(Serialize)]
struct CanonicalRules<'a> {
    ignore_rules: Vec<&'a IgnoreRule>,
    smart_rules: Vec<&'a SmartRule>,
    global_ignore_collection_order: bool,
}

impl RuleSet {
    /// Creates an empty rule set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a rules document in JSON form.
    ///
    /// ```
    /// # use apidiff_core::RuleSet;
    /// let rules = RuleSet::from_json_str(r#"{
    ///     "ignoreRules": [{"pathPattern": "Items", "ignoreCollectionOrder": true}],
    ///     "smartIgnoreRules": [{"kind": "ByNamePattern", "value": "*Id"}],
    ///     "globalIgnoreCollectionOrder": false
    /// }"#)?;
    /// assert_eq!(rules.ignore_rules().len(), 1);
    /// assert!(rules.smart_rules()[0].is_enabled());
    /// # Ok::<(), apidiff_core::ConfigError>(())
    /// ```
    pub fn from_json_str(input: &str) -> Result<Self, ConfigError> {
        let document: RulesDocument = serde_json::from_str(input)?;
        Self::from_document(document)
    }

    /// Loads a rules document in YAML form.
    pub fn from_yaml_str(input: &str) -> Result<Self, ConfigError> {
        let document: RulesDocument = serde_yaml::from_str(input)?;
        Self::from_document(document)
    }

    fn from_document(document: RulesDocument) -> Result<Self, ConfigError> {
        let mut rules = Self::new();
        for rule in document.ignore_rules {
            rules.add_ignore_rule(rule)?;
        }
        for rule in document.smart_ignore_rules {
            rules.add_smart_rule(rule)?;
        }
        rules.global_ignore_collection_order = document.global_ignore_collection_order;
        Ok(rules)
    }

    /// Sets the global order flag, returning the updated set.
    #[must_use]
    pub fn with_global_ignore_collection_order(mut self, enabled: bool) -> Self {
        self.global_ignore_collection_order = enabled;
        self
    }

    /// Path rules in insertion order.
    #[must_use]
    pub fn ignore_rules(&self) -> &[IgnoreRule] {
        &self.ignore_rules
    }

    /// Smart rules in insertion order.
    #[must_use]
    pub fn smart_rules(&self) -> &[SmartRule] {
        &self.smart_rules
    }

    /// Whether collections without a path override are compared as multisets.
    #[must_use]
    pub fn global_ignore_collection_order(&self) -> bool {
        self.global_ignore_collection_order
    }

    /// Indicates whether the set holds no rules and the global flag is off.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ignore_rules.is_empty()
            && self.smart_rules.is_empty()
            && !self.global_ignore_collection_order
    }

    /// Validates and adds a path rule. Returns `false` when an equal rule already exists.
    ///
    /// ```
    /// # use apidiff_core::{ConfigError, IgnoreRule, RuleSet};
    /// let mut rules = RuleSet::new();
    /// assert!(rules.add_ignore_rule(IgnoreRule::completely(" Items[*].Sku "))?);
    /// assert!(!rules.add_ignore_rule(IgnoreRule::completely("Items[*].Sku"))?);
    /// assert!(matches!(
    ///     rules.add_ignore_rule(IgnoreRule::completely("Items[x]")),
    ///     Err(ConfigError::InvalidIndex { .. })
    /// ));
    /// # Ok::<(), ConfigError>(())
    /// ```
    pub fn add_ignore_rule(&mut self, rule: IgnoreRule) -> Result<bool, ConfigError> {
        let pattern = rule.path_pattern.trim();
        validate_path_pattern(pattern)?;
        let rule = IgnoreRule { path_pattern: pattern.to_owned(), ..rule };
        if self.ignore_rules.contains(&rule) {
            return Ok(false);
        }
        self.ignore_rules.push(rule);
        Ok(true)
    }

    /// Removes every path rule with the given pattern. Returns `true` if any was removed.
    pub fn remove_ignore_rule(&mut self, path_pattern: &str) -> bool {
        let pattern = path_pattern.trim();
        let before = self.ignore_rules.len();
        self.ignore_rules.retain(|rule| rule.path_pattern != pattern);
        self.ignore_rules.len() != before
    }

    /// Validates and adds a smart rule. Returns `false` when an equal rule already exists.
    pub fn add_smart_rule(&mut self, rule: SmartRule) -> Result<bool, ConfigError> {
        let value = rule.value.trim();
        match rule.kind {
            SmartRuleKind::ByGlobalCollectionOrder => {}
            kind if value.is_empty() => {
                return Err(ConfigError::EmptySmartRuleValue { kind: kind.to_string() });
            }
            SmartRuleKind::ByNamePattern => {
                let compiled = CompiledPattern::compile(value, &MatcherLimits::default());
                if let Some(reason) = compiled.invalid_reason() {
                    return Err(ConfigError::InvalidNamePattern {
                        pattern: value.to_owned(),
                        reason: reason.to_owned(),
                    });
                }
            }
            SmartRuleKind::ByExactName | SmartRuleKind::ByDeclaredType => {}
        }
        let rule = SmartRule { value: value.to_owned(), ..rule };
        if self.smart_rules.contains(&rule) {
            return Ok(false);
        }
        self.smart_rules.push(rule);
        Ok(true)
    }

    /// Removes a smart rule equal to `rule`. Returns `true` if it was present.
    pub fn remove_smart_rule(&mut self, rule: &SmartRule) -> bool {
        let before = self.smart_rules.len();
        let value = rule.value.trim();
        self.smart_rules.retain(|existing| {
            !(existing.kind == rule.kind
                && existing.value == value
                && existing.enabled == rule.enabled)
        });
        self.smart_rules.len() != before
    }

    /// Removes every smart rule.
    pub fn clear_smart_rules(&mut self) {
        self.smart_rules.clear();
    }

    /// Adds the smart rules bundled in `preset`.
    pub fn apply_preset(&mut self, preset: Preset) -> Result<(), ConfigError> {
        for rule in preset.rules() {
            self.add_smart_rule(rule)?;
        }
        Ok(())
    }

    /// Sets the global order flag.
    pub fn set_global_ignore_collection_order(&mut self, enabled: bool) {
        self.global_ignore_collection_order = enabled;
    }

    /// Stable hash of the rule content, independent of insertion order.
    ///
    /// `None` means the content could not be serialized; callers must then
    /// treat every compilation as fresh.
    ///
    /// ```
    /// # use apidiff_core::{IgnoreRule, RuleSet};
    /// let mut a = RuleSet::new();
    /// a.add_ignore_rule(IgnoreRule::completely("A"))?;
    /// a.add_ignore_rule(IgnoreRule::completely("B"))?;
    /// let mut b = RuleSet::new();
    /// b.add_ignore_rule(IgnoreRule::completely("B"))?;
    /// b.add_ignore_rule(IgnoreRule::completely("A"))?;
    /// assert_eq!(a.fingerprint(), b.fingerprint());
    /// # Ok::<(), apidiff_core::ConfigError>(())
    /// ```
    #[must_use]
    pub fn fingerprint(&self) -> Option<Fingerprint> {
        let mut ignore_rules: Vec<&IgnoreRule> = self.ignore_rules.iter().collect();
        ignore_rules.sort();
        ignore_rules.dedup();
        let mut smart_rules: Vec<&SmartRule> = self.smart_rules.iter().collect();
        smart_rules.sort();
        smart_rules.dedup();
        let canonical = CanonicalRules {
            ignore_rules,
            smart_rules,
            global_ignore_collection_order: self.global_ignore_collection_order,
        };
        match serde_json::to_vec(&canonical) {
            Ok(bytes) => Some(Fingerprint::of_bytes(&bytes)),
            Err(err) => {
                tracing::warn!(error = %err, "rule set could not be fingerprinted");
                None
            }
        }
    }
}

fn validate_path_pattern(pattern: &str) -> Result<(), ConfigError> {
    if pattern.is_empty() {
        return Err(ConfigError::EmptyPattern);
    }
    let unbalanced = || ConfigError::UnbalancedBrackets { pattern: pattern.to_owned() };
    let mut open: Option<usize> = None;
    for (offset, ch) in pattern.char_indices() {
        match (ch, open) {
            ('[', None) => open = Some(offset + 1),
            ('[', Some(_)) | (']', None) => return Err(unbalanced()),
            (']', Some(start)) => {
                let selector = &pattern[start..offset];
                let numeric = !selector.is_empty() && selector.bytes().all(|b| b.is_ascii_digit());
                if selector != "*" && !numeric {
                    return Err(ConfigError::InvalidIndex {
                        pattern: pattern.to_owned(),
                        selector: selector.to_owned(),
                    });
                }
                open = None;
            }
            _ => {}
        }
    }
    if open.is_some() {
        return Err(unbalanced());
    }
    Ok(())
}
