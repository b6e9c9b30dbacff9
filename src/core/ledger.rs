//! Resource ledger: committed load against configured limits.
//!
//! Quantities are kept in fixed-point micro-units so that any sequence of
//! matching commit/release pairs returns the load to exactly its previous
//! value. The ledger itself is not synchronized; the worker keeps it behind
//! the same mutex as the task registry so a check and its commit form one
//! step.

use std::collections::BTreeMap;

use super::ResourceProfile;

/// Fixed-point scale: one ledger unit is [`MIN_QUANTITY`](super::MIN_QUANTITY).
const SCALE: f64 = 1_000_000.0;

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn to_units(amount: f64) -> u64 {
    (amount.max(0.0) * SCALE).round() as u64
}

#[allow(clippy::cast_precision_loss)]
fn from_units(units: u64) -> f64 {
    units as f64 / SCALE
}

/// Resource kind that could not fit, returned by [`ResourceLedger::try_commit`].
#[derive(Debug, Clone, PartialEq)]
pub struct Shortfall {
    /// Resource kind over its limit.
    pub kind: String,
    /// Amount requested.
    pub requested: f64,
    /// Amount still available under the limit.
    pub available: f64,
}

/// Live tally of committed resources.
#[derive(Debug, Clone)]
pub struct ResourceLedger {
    limits: BTreeMap<String, u64>,
    load: BTreeMap<String, u64>,
}

impl ResourceLedger {
    /// Create a ledger with the given limits and zero load.
    #[must_use]
    pub fn new(limits: &ResourceProfile) -> Self {
        Self {
            limits: limits
                .iter()
                .map(|(kind, amount)| (kind.to_string(), to_units(amount)))
                .collect(),
            load: BTreeMap::new(),
        }
    }

    /// Check whether `required` fits on top of the current load.
    ///
    /// Kinds without a configured limit are unconstrained, up to what the
    /// ledger can count.
    ///
    /// # Errors
    ///
    /// Returns the first kind (in kind order) that would exceed its limit or
    /// overflow the tally.
    pub fn check(&self, required: &ResourceProfile) -> Result<(), Shortfall> {
        for (kind, amount) in required.iter() {
            let current = self.load.get(kind).copied().unwrap_or(0);
            let ceiling = self.limits.get(kind).copied().unwrap_or(u64::MAX);
            let fits = current
                .checked_add(to_units(amount))
                .is_some_and(|total| total <= ceiling);
            if !fits {
                return Err(Shortfall {
                    kind: kind.to_string(),
                    requested: amount,
                    available: from_units(ceiling.saturating_sub(current)),
                });
            }
        }
        Ok(())
    }

    /// Check and, if everything fits, add `required` to the load.
    /// On rejection the load is left untouched.
    ///
    /// # Errors
    ///
    /// Returns the [`Shortfall`] that prevented the commit.
    pub fn try_commit(&mut self, required: &ResourceProfile) -> Result<(), Shortfall> {
        self.check(required)?;
        for (kind, amount) in required.iter() {
            let entry = self.load.entry(kind.to_string()).or_insert(0);
            *entry = entry.saturating_add(to_units(amount));
        }
        Ok(())
    }

    /// Convenience boolean form of [`Self::try_commit`].
    pub fn check_and_admit(&mut self, required: &ResourceProfile) -> bool {
        self.try_commit(required).is_ok()
    }

    /// Subtract a previously committed requirement from the load.
    pub fn release(&mut self, required: &ResourceProfile) {
        for (kind, amount) in required.iter() {
            let units = to_units(amount);
            if let Some(current) = self.load.get_mut(kind) {
                if *current < units {
                    tracing::error!(
                        kind,
                        current = from_units(*current),
                        released = amount,
                        "ledger release exceeds committed load"
                    );
                }
                *current = current.saturating_sub(units);
                if *current == 0 {
                    self.load.remove(kind);
                }
            } else if units > 0 {
                tracing::error!(kind, released = amount, "ledger release for uncommitted kind");
            }
        }
    }

    /// Current load, including every configured kind (zero when idle).
    #[must_use]
    pub fn load(&self) -> ResourceProfile {
        let mut profile: ResourceProfile =
            self.limits.keys().map(|kind| (kind.as_str(), 0.0)).collect();
        for (kind, units) in &self.load {
            profile.set(kind.as_str(), from_units(*units));
        }
        profile
    }

    /// Configured limits.
    #[must_use]
    pub fn limits(&self) -> ResourceProfile {
        self.limits
            .iter()
            .map(|(kind, units)| (kind.as_str(), from_units(*units)))
            .collect()
    }

    /// True when nothing is committed.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.load.is_empty()
    }
}
