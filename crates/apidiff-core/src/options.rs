use serde::{Deserialize, Serialize};

use crate::OptionsError;

/// Controls how text scalars are compared.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CaseSensitivity {
    /// Text must match byte for byte (default).
    #[default]
    Sensitive,
    /// Text is compared after lowercasing both sides.
    Insensitive,
}

/// Configuration knobs passed to the structural diff engine.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompareOptions {
    case_sensitivity: CaseSensitivity,
    report_order_changes: bool,
    max_differences: Option<usize>,
}

impl CompareOptions {
    /// Returns the text comparison mode.
    ///
    /// ```
    /// # use apidiff_core::{CaseSensitivity, CompareOptions};
    /// let opts = CompareOptions::default()
    ///     .with_case_sensitivity(CaseSensitivity::Insensitive)
    ///     .expect("set case sensitivity");
    /// assert_eq!(opts.case_sensitivity(), CaseSensitivity::Insensitive);
    /// ```
    #[must_use]
    pub fn case_sensitivity(&self) -> CaseSensitivity {
        self.case_sensitivity
    }

    /// Indicates whether perfectly paired but reordered collections are reported.
    #[must_use]
    pub fn report_order_changes(&self) -> bool {
        self.report_order_changes
    }

    /// Returns the raw difference budget, if any.
    ///
    /// ```
    /// # use apidiff_core::CompareOptions;
    /// let opts = CompareOptions::default().with_max_differences(Some(10)).expect("set budget");
    /// assert_eq!(opts.max_differences(), Some(10));
    /// ```
    #[must_use]
    pub fn max_differences(&self) -> Option<usize> {
        self.max_differences
    }

    /// Sets the text comparison mode.
    pub fn with_case_sensitivity(mut self, mode: CaseSensitivity) -> Result<Self, OptionsError> {
        self.case_sensitivity = mode;
        self.validate()?;
        Ok(self)
    }

    /// Enables or disables `OrderChanged` reporting for unordered collections.
    ///
    /// ```
    /// # use apidiff_core::CompareOptions;
    /// let opts = CompareOptions::default().with_report_order_changes(true).unwrap();
    /// assert!(opts.report_order_changes());
    /// ```
    pub fn with_report_order_changes(mut self, enabled: bool) -> Result<Self, OptionsError> {
        self.report_order_changes = enabled;
        self.validate()?;
        Ok(self)
    }

    /// Stops collecting after `limit` raw differences; `None` removes the budget.
    ///
    /// ```
    /// # use apidiff_core::{CompareOptions, OptionsError};
    /// let err = CompareOptions::default().with_max_differences(Some(0)).unwrap_err();
    /// assert_eq!(err, OptionsError::ZeroMaxDifferences);
    /// ```
    pub fn with_max_differences(mut self, limit: Option<usize>) -> Result<Self, OptionsError> {
        self.max_differences = limit;
        self.validate()?;
        Ok(self)
    }

    fn validate(&self) -> Result<(), OptionsError> {
        if self.max_differences == Some(0) {
            return Err(OptionsError::ZeroMaxDifferences);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_strict_and_unbounded() {
        let opts = CompareOptions::default();
        assert_eq!(opts.case_sensitivity(), CaseSensitivity::Sensitive);
        assert!(!opts.report_order_changes());
        assert_eq!(opts.max_differences(), None);
    }

    #[test]
    fn clearing_budget_is_allowed() {
        let opts = CompareOptions::default()
            .with_max_differences(Some(3))
            .and_then(|opts| opts.with_max_differences(None))
            .expect("clear budget");
        assert_eq!(opts.max_differences(), None);
    }
}
