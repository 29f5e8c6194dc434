use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Overall scores strictly below this value count as dissatisfied.
pub const SATISFACTION_THRESHOLD: f64 = 8.0;

/// Tags the product team annotates with.
pub const PRODUCT_TAGS: &[&str] = &[
    "poor_accommodation_quality",
    "transport_issues",
    "itinerary_too_rushed",
    "activity_cancelled",
    "meal_quality",
    "value_for_money",
    "group_size_issues",
];

/// Tags describing coordinator behaviour.
pub const COORDINATOR_TAGS: &[&str] = &[
    "coordinator_unresponsive",
    "coordinator_lacked_knowledge",
    "coordinator_disorganized",
    "coordinator_attitude",
];

pub fn is_known_tag(tag: &str) -> bool {
    PRODUCT_TAGS.contains(&tag) || COORDINATOR_TAGS.contains(&tag)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Destination {
    pub id: String,
    pub name: String,
    pub country: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Itinerary {
    pub id: String,
    pub name: String,
    pub destination_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ProductLine {
    #[serde(rename = "WR")]
    Wr,
    #[serde(rename = "WRX")]
    Wrx,
}

impl fmt::Display for ProductLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Wr => f.write_str("WR"),
            Self::Wrx => f.write_str("WRX"),
        }
    }
}

impl std::str::FromStr for ProductLine {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_uppercase().as_str() {
            "WR" => Ok(Self::Wr),
            "WRX" => Ok(Self::Wrx),
            other => Err(format!("unknown product line `{other}`")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tour {
    pub id: String,
    pub itinerary_id: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub product_line: ProductLine,
    pub dmc_name: String,
    pub coordinator_name: String,
}

/// Sub-scores collected by the post-tour survey, each nominally 0-10.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scores {
    pub overall: f64,
    pub coordinator: f64,
    pub accommodation: f64,
    pub transportation: f64,
    pub activities: f64,
    pub meals: f64,
    pub pacing: f64,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comments {
    #[serde(default)]
    pub highlights: String,
    #[serde(default)]
    pub improvements: String,
    #[serde(default)]
    pub coordinator_feedback: String,
}

impl Comments {
    /// First non-empty comment, preferring what the traveller wanted improved.
    pub fn headline(&self) -> Option<&str> {
        [&self.improvements, &self.coordinator_feedback, &self.highlights]
            .into_iter()
            .map(|text| text.trim())
            .find(|text| !text.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SurveyResponse {
    pub id: String,
    pub tour_id: String,
    pub created_at: DateTime<Utc>,
    pub scores: Scores,
    #[serde(default)]
    pub comments: Comments,
}

impl SurveyResponse {
    pub fn is_below_threshold(&self) -> bool {
        self.scores.overall < SATISFACTION_THRESHOLD
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Annotation {
    pub response_id: String,
    #[serde(default)]
    pub product_tags: Vec<String>,
    #[serde(default)]
    pub coordinator_tags: Vec<String>,
    pub severity: Severity,
    pub confidence: f64,
    #[serde(default)]
    pub evidence: Vec<String>,
}

impl Annotation {
    /// Union of product and coordinator tags, each tag once.
    pub fn issue_tags(&self) -> BTreeSet<&str> {
        self.product_tags
            .iter()
            .chain(self.coordinator_tags.iter())
            .map(String::as_str)
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionType {
    SupplierChange,
    CoordinatorTraining,
    ItineraryAdjustment,
    AccommodationUpgrade,
    CommunicationUpdate,
    ProcessChange,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Priority {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionStatus {
    Suggested,
    Planned,
    InProgress,
    Completed,
    Cancelled,
}

impl ActionStatus {
    pub fn is_open(self) -> bool {
        matches!(self, Self::Suggested | Self::Planned | Self::InProgress)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuggestedAction {
    pub id: String,
    pub destination_id: String,
    #[serde(default)]
    pub itinerary_id: Option<String>,
    pub issue_tag: String,
    pub action_type: ActionType,
    pub priority: Priority,
    pub status: ActionStatus,
    pub created_at: NaiveDate,
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default)]
    pub affected_tours: u32,
}

/// Before/after measurements entered by the operator, taken as given.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImpactMetrics {
    pub avg_score_before: f64,
    pub avg_score_after: f64,
    #[serde(rename = "pctBelow8Before")]
    pub pct_below_before: f64,
    #[serde(rename = "pctBelow8After")]
    pub pct_below_after: f64,
    pub tours_before_action: u32,
    pub tours_after_action: u32,
}

impl ImpactMetrics {
    pub fn score_delta(&self) -> f64 {
        self.avg_score_after - self.avg_score_before
    }

    /// Positive when fewer responses fell below threshold after the action.
    pub fn pct_delta(&self) -> f64 {
        self.pct_below_before - self.pct_below_after
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CorrectiveAction {
    pub id: String,
    #[serde(default)]
    pub suggested_action_id: Option<String>,
    pub destination_id: String,
    #[serde(default)]
    pub itinerary_id: Option<String>,
    pub issue_tag: String,
    pub action_taken: String,
    pub implemented_at: NaiveDate,
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default)]
    pub notes: String,
    pub impact: ImpactMetrics,
}

/// Mean of each category sub-score over a set of responses.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryAverages {
    pub coordinator: f64,
    pub accommodation: f64,
    pub transportation: f64,
    pub activities: f64,
    pub meals: f64,
    pub pacing: f64,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DestinationSummary {
    pub destination_id: String,
    pub destination_name: String,
    pub response_count: usize,
    pub avg_overall: f64,
    pub pct_below_threshold: f64,
    /// `None` when either the current or the comparison period has no data.
    pub delta: Option<f64>,
    pub top_issue: Option<String>,
    pub categories: CategoryAverages,
}

impl DestinationSummary {
    pub fn pct_below_display(&self) -> i64 {
        self.pct_below_threshold.round() as i64
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodPoint {
    pub bucket: i64,
    pub period_start: NaiveDate,
    pub period_label: String,
    pub response_count: usize,
    pub avg_overall: f64,
    pub pct_below_threshold: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImpactSummary {
    pub count: usize,
    pub avg_score_improvement: f64,
    pub avg_pct_improvement: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionImpact {
    pub action_id: String,
    pub destination_id: String,
    pub issue_tag: String,
    pub score_delta: f64,
    pub pct_delta: f64,
}
