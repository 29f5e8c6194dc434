//! Per-destination statistics and period-over-period trends.
//!
//! Periods are fixed-length buckets counted from `EngineConfig::epoch`:
//! 7 days for a week, 30 for a month, 90 for a quarter. Months and quarters
//! therefore drift away from the calendar; that is accepted here because
//! every consumer only compares buckets with each other. A response lands in
//! the bucket of its tour's start date.

use std::collections::HashMap;

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::issues::{aggregate_issues, IssueScope, ScopeKey};
use crate::models::{CategoryAverages, DestinationSummary, PeriodPoint, SurveyResponse};
use crate::store::EntityStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Period {
    Week,
    Month,
    Quarter,
}

impl Period {
    pub fn length_days(self) -> i64 {
        match self {
            Self::Week => 7,
            Self::Month => 30,
            Self::Quarter => 90,
        }
    }

    fn prefix(self) -> &'static str {
        match self {
            Self::Week => "W",
            Self::Month => "M",
            Self::Quarter => "Q",
        }
    }
}

/// Bucket holding `date`; dates before the epoch get negative indices.
pub fn bucket_index(epoch: NaiveDate, date: NaiveDate, period: Period) -> i64 {
    (date - epoch).num_days().div_euclid(period.length_days())
}

/// First day of `bucket`, or `None` when it falls outside the calendar.
pub fn bucket_start(epoch: NaiveDate, bucket: i64, period: Period) -> Option<NaiveDate> {
    let offset = bucket.checked_mul(period.length_days())?;
    let days = Days::new(offset.unsigned_abs());
    if offset >= 0 {
        epoch.checked_add_days(days)
    } else {
        epoch.checked_sub_days(days)
    }
}

pub fn period_label(period: Period, start: NaiveDate) -> String {
    format!("{} {}", period.prefix(), start.format("%Y-%m-%d"))
}

#[derive(Debug, Clone, Copy, Default)]
struct ScoreStats {
    count: usize,
    total: f64,
    below: usize,
}

impl ScoreStats {
    fn from_responses<'a, I>(responses: I) -> Self
    where
        I: IntoIterator<Item = &'a SurveyResponse>,
    {
        responses
            .into_iter()
            .fold(Self::default(), |mut stats, response| {
                stats.count += 1;
                stats.total += response.scores.overall;
                if response.is_below_threshold() {
                    stats.below += 1;
                }
                stats
            })
    }

    fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.total / self.count as f64
        }
    }

    fn pct_below(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.below as f64 / self.count as f64 * 100.0
        }
    }
}

/// Mean overall score, 0 for an empty slice.
pub fn average_overall(responses: &[&SurveyResponse]) -> f64 {
    ScoreStats::from_responses(responses.iter().copied()).mean()
}

/// Share of responses below the satisfaction threshold, as a percentage.
pub fn pct_below_threshold(responses: &[&SurveyResponse]) -> f64 {
    ScoreStats::from_responses(responses.iter().copied()).pct_below()
}

pub fn category_averages(responses: &[&SurveyResponse]) -> CategoryAverages {
    if responses.is_empty() {
        return CategoryAverages::default();
    }
    let n = responses.len() as f64;
    let mean = |pick: fn(&SurveyResponse) -> f64| {
        responses.iter().map(|&response| pick(response)).sum::<f64>() / n
    };
    CategoryAverages {
        coordinator: mean(|r| r.scores.coordinator),
        accommodation: mean(|r| r.scores.accommodation),
        transportation: mean(|r| r.scores.transportation),
        activities: mean(|r| r.scores.activities),
        meals: mean(|r| r.scores.meals),
        pacing: mean(|r| r.scores.pacing),
        value: mean(|r| r.scores.value),
    }
}

fn response_bucket(
    store: &EntityStore,
    config: &EngineConfig,
    response: &SurveyResponse,
    period: Period,
) -> Option<i64> {
    store
        .tour_of(response)
        .map(|tour| bucket_index(config.epoch, tour.start_date, period))
}

/// The period trends are measured in: the one containing `as_of` when it is
/// configured, otherwise the latest period any response falls in.
pub fn current_bucket(
    store: &EntityStore,
    config: &EngineConfig,
    responses: &[&SurveyResponse],
    period: Period,
) -> Option<i64> {
    match config.as_of {
        Some(as_of) => Some(bucket_index(config.epoch, as_of, period)),
        None => responses
            .iter()
            .filter_map(|response| response_bucket(store, config, response, period))
            .max(),
    }
}

/// Summaries for every destination with at least one response in `responses`.
///
/// Destinations come back in store order. `delta` compares the current
/// period against the one `lookback_periods` earlier and is `None` when
/// either side has no responses.
pub fn destination_summaries(
    store: &EntityStore,
    config: &EngineConfig,
    responses: &[&SurveyResponse],
    period: Period,
) -> Vec<DestinationSummary> {
    let mut grouped: HashMap<&str, Vec<&SurveyResponse>> = HashMap::new();
    for &response in responses {
        match store.destination_of(response) {
            Some(destination) => grouped
                .entry(destination.id.as_str())
                .or_default()
                .push(response),
            None => {
                tracing::debug!(response_id = %response.id, "response has no destination, skipped");
            }
        }
    }

    let current = current_bucket(store, config, responses, period);
    let previous = current.map(|bucket| bucket - i64::from(config.lookback_periods));
    let issues = aggregate_issues(store, responses, IssueScope::Destination);

    let summaries: Vec<DestinationSummary> = store
        .destinations()
        .iter()
        .filter_map(|destination| {
            let group = grouped.get(destination.id.as_str())?;
            let stats = ScoreStats::from_responses(group.iter().copied());
            let in_bucket = |bucket: i64| {
                ScoreStats::from_responses(group.iter().copied().filter(|response| {
                    response_bucket(store, config, response, period) == Some(bucket)
                }))
            };
            let delta = match (current, previous) {
                (Some(current), Some(previous)) => {
                    let now = in_bucket(current);
                    let before = in_bucket(previous);
                    (now.count > 0 && before.count > 0).then(|| now.mean() - before.mean())
                }
                _ => None,
            };
            Some(DestinationSummary {
                destination_id: destination.id.clone(),
                destination_name: destination.name.clone(),
                response_count: stats.count,
                avg_overall: stats.mean(),
                pct_below_threshold: stats.pct_below(),
                delta,
                top_issue: issues
                    .top_issue(&ScopeKey::Destination(destination.id.clone()))
                    .map(str::to_string),
                categories: category_averages(group),
            })
        })
        .collect();

    tracing::debug!(
        destinations = summaries.len(),
        ?period,
        current_bucket = ?current,
        "destination summaries computed"
    );
    summaries
}

/// Destinations with a defined delta, most-worsening first.
pub fn rank_by_delta(summaries: Vec<DestinationSummary>) -> Vec<DestinationSummary> {
    let mut ranked: Vec<DestinationSummary> = summaries
        .into_iter()
        .filter(|summary| summary.delta.is_some())
        .collect();
    ranked.sort_by(|a, b| {
        let (da, db) = (a.delta.unwrap_or(0.0), b.delta.unwrap_or(0.0));
        da.total_cmp(&db)
            .then_with(|| a.destination_name.cmp(&b.destination_name))
            .then_with(|| a.destination_id.cmp(&b.destination_id))
    });
    ranked
}

/// Destinations whose average dropped against the comparison period.
pub fn worsening_destinations(
    store: &EntityStore,
    config: &EngineConfig,
    responses: &[&SurveyResponse],
    period: Period,
) -> Vec<DestinationSummary> {
    rank_by_delta(destination_summaries(store, config, responses, period))
        .into_iter()
        .filter(|summary| summary.delta.is_some_and(|delta| delta < 0.0))
        .collect()
}

/// `periods` consecutive buckets ending at the current one, oldest first.
///
/// Buckets without responses are kept with zero counts so charts line up;
/// buckets whose start lies outside the calendar are dropped. Returns
/// nothing when no current period can be established.
pub fn series(
    store: &EntityStore,
    config: &EngineConfig,
    destination_id: &str,
    responses: &[&SurveyResponse],
    period: Period,
    periods: usize,
) -> Vec<PeriodPoint> {
    let Some(end) = current_bucket(store, config, responses, period) else {
        return Vec::new();
    };

    let mut by_bucket: HashMap<i64, Vec<&SurveyResponse>> = HashMap::new();
    for &response in responses {
        if store.destination_of(response).map(|d| d.id.as_str()) != Some(destination_id) {
            continue;
        }
        if let Some(bucket) = response_bucket(store, config, response, period) {
            by_bucket.entry(bucket).or_default().push(response);
        }
    }

    let span = i64::try_from(periods).unwrap_or(i64::MAX);
    let earliest = bucket_index(config.epoch, NaiveDate::MIN, period);
    let first = end.saturating_sub(span.saturating_sub(1)).max(earliest);
    (first..=end)
        .filter_map(|bucket| {
            let start = bucket_start(config.epoch, bucket, period)?;
            let stats = by_bucket
                .get(&bucket)
                .map(|group| ScoreStats::from_responses(group.iter().copied()))
                .unwrap_or_default();
            Some(PeriodPoint {
                bucket,
                period_start: start,
                period_label: period_label(period, start),
                response_count: stats.count,
                avg_overall: stats.mean(),
                pct_below_threshold: stats.pct_below(),
            })
        })
        .collect()
}

pub fn weekly_series(
    store: &EntityStore,
    config: &EngineConfig,
    destination_id: &str,
    responses: &[&SurveyResponse],
) -> Vec<PeriodPoint> {
    series(
        store,
        config,
        destination_id,
        responses,
        Period::Week,
        config.series_periods,
    )
}
