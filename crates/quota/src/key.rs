use std::borrow::Cow;

use chrono::NaiveDate;

use crate::clock::Clock;

/// Identity of one user's counter for one feature on one UTC day.
///
/// Renders as `feature:user:YYYY-MM-DD`. Any `%` or `:` inside the feature or
/// user component is percent-encoded first so distinct triples can never
/// render to the same string.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CounterKey {
    pub feature: String,
    pub user: String,
    pub date: NaiveDate,
}

impl CounterKey {
    /// Build a key for an explicit calendar date.
    #[must_use]
    pub fn derive(feature: impl Into<String>, user: impl Into<String>, date: NaiveDate) -> Self {
        Self {
            feature: feature.into(),
            user: user.into(),
            date,
        }
    }

    /// Build a key for the current UTC date of `clock`.
    #[must_use]
    pub fn for_now(feature: &str, user: &str, clock: &dyn Clock) -> Self {
        Self::derive(feature, user, clock.now().date_naive())
    }

    /// Return the canonical string form: `feature:user:YYYY-MM-DD`.
    #[must_use]
    pub fn canonical(&self) -> String {
        format!(
            "{}:{}:{}",
            escape_component(&self.feature),
            escape_component(&self.user),
            self.date.format("%Y-%m-%d")
        )
    }
}

impl std::fmt::Display for CounterKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.canonical())
    }
}

fn escape_component(raw: &str) -> Cow<'_, str> {
    if raw.contains(['%', ':']) {
        Cow::Owned(raw.replace('%', "%25").replace(':', "%3A"))
    } else {
        Cow::Borrowed(raw)
    }
}
