//! Resource profiles: named, non-negative quantities such as `cpu` or `mem_gb`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Resource kind for CPU cores.
pub const CPU: &str = "cpu";
/// Resource kind for memory in gigabytes.
pub const MEM_GB: &str = "mem_gb";

/// Smallest quantity the resource ledger resolves. Limits must be at least
/// this large.
pub const MIN_QUANTITY: f64 = 1e-6;

/// Mapping from resource kind to quantity.
///
/// Used both for limits (all values > 0) and for loads and requirements
/// (all values >= 0). Serialized as a plain JSON object.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceProfile(BTreeMap<String, f64>);

impl ResourceProfile {
    /// Create an empty profile.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    #[must_use]
    pub fn with(mut self, kind: impl Into<String>, amount: f64) -> Self {
        self.0.insert(kind.into(), amount);
        self
    }

    /// Set the quantity for a kind.
    pub fn set(&mut self, kind: impl Into<String>, amount: f64) {
        self.0.insert(kind.into(), amount);
    }

    /// Quantity for a kind, if present.
    #[must_use]
    pub fn get(&self, kind: &str) -> Option<f64> {
        self.0.get(kind).copied()
    }

    /// Quantity for a kind, or zero when absent.
    #[must_use]
    pub fn amount(&self, kind: &str) -> f64 {
        self.get(kind).unwrap_or(0.0)
    }

    /// Iterate over `(kind, amount)` pairs in kind order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Number of kinds in the profile.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True when no kinds are present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Check the profile as a limit set: non-empty, every value finite and at
    /// least [`MIN_QUANTITY`].
    ///
    /// # Errors
    ///
    /// Returns a description of the first offending entry.
    pub fn validate_limits(&self) -> Result<(), String> {
        if self.is_empty() {
            return Err("resource_limits must define at least one resource kind".into());
        }
        for (kind, amount) in self.iter() {
            if !amount.is_finite() || amount <= 0.0 {
                return Err(format!("resource limit `{kind}` must be positive, got {amount}"));
            }
            if amount < MIN_QUANTITY {
                return Err(format!(
                    "resource limit `{kind}` must be at least {MIN_QUANTITY}, got {amount}"
                ));
            }
        }
        Ok(())
    }

    /// Check the profile as a requirement: every value finite and >= 0.
    ///
    /// # Errors
    ///
    /// Returns a description of the first offending entry.
    pub fn validate_requirement(&self) -> Result<(), String> {
        for (kind, amount) in self.iter() {
            if !amount.is_finite() || amount < 0.0 {
                return Err(format!(
                    "required resource `{kind}` must be a non-negative number, got {amount}"
                ));
            }
        }
        Ok(())
    }
}

impl<K: Into<String>> FromIterator<(K, f64)> for ResourceProfile {
    fn from_iter<I: IntoIterator<Item = (K, f64)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

impl<K: Into<String>, const N: usize> From<[(K, f64); N]> for ResourceProfile {
    fn from(entries: [(K, f64); N]) -> Self {
        entries.into_iter().collect()
    }
}
