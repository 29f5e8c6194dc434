use chrono::NaiveDate;
use serde::Deserialize;

use crate::error::{EngineError, EngineResult, FieldError};

/// Longest series a caller may request; ten years of weekly buckets.
pub const MAX_SERIES_PERIODS: usize = 520;
/// Furthest back a trend comparison may reach.
pub const MAX_LOOKBACK_PERIODS: u32 = 520;

/// Knobs for period bucketing and trend comparison.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineConfig {
    /// Origin of bucket index 0.
    pub epoch: NaiveDate,
    /// How many buckets back the comparison period sits.
    pub lookback_periods: u32,
    pub series_periods: usize,
    /// Pins the current period. Defaults to the latest period with data.
    pub as_of: Option<NaiveDate>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            epoch: default_epoch(),
            lookback_periods: 1,
            series_periods: 12,
            as_of: None,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> EngineResult<()> {
        let mut errors = Vec::new();
        if !(1..=MAX_LOOKBACK_PERIODS).contains(&self.lookback_periods) {
            errors.push(FieldError::new(
                "lookbackPeriods",
                format!("must be between 1 and {MAX_LOOKBACK_PERIODS}"),
            ));
        }
        if !(1..=MAX_SERIES_PERIODS).contains(&self.series_periods) {
            errors.push(FieldError::new(
                "seriesPeriods",
                format!("must be between 1 and {MAX_SERIES_PERIODS}"),
            ));
        }
        EngineError::check(errors)
    }
}

fn default_epoch() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 1).unwrap_or(NaiveDate::MIN)
}
