//! Retention durations.

use chrono::{DateTime, Days, Months, Utc};
use serde::{Deserialize, Serialize};

/// A calendar retention duration. Years and months are calendar-aware, so a
/// seven-year period starting 29 February ends on 28 February.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RetentionPeriod {
    #[serde(default)]
    pub years: u32,
    #[serde(default)]
    pub months: u32,
    #[serde(default)]
    pub days: u32,
}

impl RetentionPeriod {
    pub const fn years(years: u32) -> Self {
        Self {
            years,
            months: 0,
            days: 0,
        }
    }

    pub const fn days(days: u32) -> Self {
        Self {
            years: 0,
            months: 0,
            days,
        }
    }

    pub fn is_zero(&self) -> bool {
        self.years == 0 && self.months == 0 && self.days == 0
    }

    /// `from` plus this period, saturating at the latest representable instant.
    pub fn expiry_from(&self, from: DateTime<Utc>) -> DateTime<Utc> {
        let total_months = self.years.saturating_mul(12).saturating_add(self.months);
        from.checked_add_months(Months::new(total_months))
            .and_then(|t| t.checked_add_days(Days::new(u64::from(self.days))))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
}
