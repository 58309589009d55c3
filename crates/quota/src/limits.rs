use std::collections::HashMap;

use serde::Deserialize;

use crate::error::QuotaError;

/// Daily ceilings per feature, fixed at construction.
///
/// Features missing from the table are unregistered: the engine lets them
/// through without counting.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(try_from = "HashMap<String, i64>")]
pub struct FeatureLimits {
    limits: HashMap<String, i64>,
}

impl FeatureLimits {
    /// Build a limit table, rejecting negative ceilings.
    ///
    /// # Errors
    ///
    /// Returns [`QuotaError::Configuration`] if any limit is below zero.
    pub fn new<I, K>(entries: I) -> Result<Self, QuotaError>
    where
        I: IntoIterator<Item = (K, i64)>,
        K: Into<String>,
    {
        let limits: HashMap<String, i64> = entries
            .into_iter()
            .map(|(name, limit)| (name.into(), limit))
            .collect();
        Self::try_from(limits)
    }

    /// The configured ceiling for `feature`, if it is registered.
    #[must_use]
    pub fn get(&self, feature: &str) -> Option<i64> {
        self.limits.get(feature).copied()
    }

    #[must_use]
    pub fn contains(&self, feature: &str) -> bool {
        self.limits.contains_key(feature)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, i64)> {
        self.limits.iter().map(|(name, limit)| (name.as_str(), *limit))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.limits.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.limits.is_empty()
    }
}

impl TryFrom<HashMap<String, i64>> for FeatureLimits {
    type Error = QuotaError;

    fn try_from(limits: HashMap<String, i64>) -> Result<Self, Self::Error> {
        if let Some((name, limit)) = limits.iter().find(|(_, limit)| **limit < 0) {
            return Err(QuotaError::Configuration(format!(
                "limit for feature '{name}' must not be negative (got {limit})"
            )));
        }
        Ok(Self { limits })
    }
}
