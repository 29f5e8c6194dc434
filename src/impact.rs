//! Before/after impact of corrective actions, and their intake.
//!
//! Impact figures are entered by operators from field measurements. They are
//! range-checked on the way in but never recomputed from survey responses.

use chrono::NaiveDate;
use serde::Deserialize;

use crate::error::{EngineError, EngineResult, FieldError};
use crate::models::{ActionImpact, CorrectiveAction, ImpactMetrics, ImpactSummary};
use crate::store::EntityStore;

/// Narrows corrective actions before summarising them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ActionFilter {
    pub destination_id: Option<String>,
    pub issue_tag: Option<String>,
}

impl ActionFilter {
    pub fn destination(mut self, id: impl Into<String>) -> Self {
        self.destination_id = Some(id.into());
        self
    }

    pub fn issue_tag(mut self, tag: impl Into<String>) -> Self {
        self.issue_tag = Some(tag.into());
        self
    }

    pub fn matches(&self, action: &CorrectiveAction) -> bool {
        self.destination_id
            .as_ref()
            .map_or(true, |id| &action.destination_id == id)
            && self
                .issue_tag
                .as_ref()
                .map_or(true, |tag| &action.issue_tag == tag)
    }

    pub fn select<'a>(&self, actions: &'a [CorrectiveAction]) -> Vec<&'a CorrectiveAction> {
        actions.iter().filter(|action| self.matches(action)).collect()
    }
}

pub fn action_impact(action: &CorrectiveAction) -> ActionImpact {
    ActionImpact {
        action_id: action.id.clone(),
        destination_id: action.destination_id.clone(),
        issue_tag: action.issue_tag.clone(),
        score_delta: action.impact.score_delta(),
        pct_delta: action.impact.pct_delta(),
    }
}

/// Mean score and below-threshold improvements; all zero for no actions.
pub fn impact_summary<'a, I>(actions: I) -> ImpactSummary
where
    I: IntoIterator<Item = &'a CorrectiveAction>,
{
    let (count, score_total, pct_total) =
        actions
            .into_iter()
            .fold((0usize, 0.0f64, 0.0f64), |(count, score, pct), action| {
                (
                    count + 1,
                    score + action.impact.score_delta(),
                    pct + action.impact.pct_delta(),
                )
            });

    if count == 0 {
        return ImpactSummary {
            count: 0,
            avg_score_improvement: 0.0,
            avg_pct_improvement: 0.0,
        };
    }

    ImpactSummary {
        count,
        avg_score_improvement: score_total / count as f64,
        avg_pct_improvement: pct_total / count as f64,
    }
}

/// Operator-supplied fields for a new corrective action.
///
/// Everything is optional at the type level so that missing fields are
/// reported together instead of failing deserialization on the first one.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CorrectiveActionInput {
    pub suggested_action_id: Option<String>,
    pub destination_id: Option<String>,
    pub itinerary_id: Option<String>,
    pub issue_tag: Option<String>,
    pub action_taken: Option<String>,
    pub implemented_at: Option<NaiveDate>,
    pub owner: Option<String>,
    pub notes: Option<String>,
    pub avg_score_before: Option<f64>,
    pub avg_score_after: Option<f64>,
    #[serde(rename = "pctBelow8Before")]
    pub pct_below_before: Option<f64>,
    #[serde(rename = "pctBelow8After")]
    pub pct_below_after: Option<f64>,
    pub tours_before_action: Option<i64>,
    pub tours_after_action: Option<i64>,
}

fn required_text(
    errors: &mut Vec<FieldError>,
    field: &'static str,
    value: Option<&String>,
) -> String {
    match value.map(|text| text.trim()) {
        Some(text) if !text.is_empty() => text.to_string(),
        _ => {
            errors.push(FieldError::new(field, "is required"));
            String::new()
        }
    }
}

fn ranged(
    errors: &mut Vec<FieldError>,
    field: &'static str,
    value: Option<f64>,
    max: f64,
) -> f64 {
    match value {
        None => {
            errors.push(FieldError::new(field, "is required"));
            0.0
        }
        Some(v) if !v.is_finite() || !(0.0..=max).contains(&v) => {
            errors.push(FieldError::new(field, format!("must be within 0-{max}, got {v}")));
            0.0
        }
        Some(v) => v,
    }
}

fn tour_count(errors: &mut Vec<FieldError>, field: &'static str, value: Option<i64>) -> u32 {
    match value {
        None => {
            errors.push(FieldError::new(field, "is required"));
            0
        }
        Some(v) => u32::try_from(v).unwrap_or_else(|_| {
            errors.push(FieldError::new(field, format!("must be a count >= 0, got {v}")));
            0
        }),
    }
}

impl CorrectiveActionInput {
    /// Checks completeness, ranges and references; the returned record has
    /// an empty id until the store assigns one.
    pub fn validate(&self, store: &EntityStore) -> EngineResult<CorrectiveAction> {
        let mut errors = Vec::new();

        let destination_id =
            required_text(&mut errors, "destinationId", self.destination_id.as_ref());
        if !destination_id.is_empty() && store.destination(&destination_id).is_none() {
            errors.push(FieldError::new(
                "destinationId",
                format!("unknown destination `{destination_id}`"),
            ));
        }
        if let Some(itinerary_id) = &self.itinerary_id {
            match store.itinerary(itinerary_id) {
                None => errors.push(FieldError::new(
                    "itineraryId",
                    format!("unknown itinerary `{itinerary_id}`"),
                )),
                Some(itinerary) if itinerary.destination_id != destination_id => {
                    errors.push(FieldError::new(
                        "itineraryId",
                        format!("`{itinerary_id}` does not belong to `{destination_id}`"),
                    ));
                }
                Some(_) => {}
            }
        }
        if let Some(suggestion_id) = &self.suggested_action_id {
            if store.suggested_action(suggestion_id).is_none() {
                errors.push(FieldError::new(
                    "suggestedActionId",
                    format!("unknown suggested action `{suggestion_id}`"),
                ));
            }
        }

        let issue_tag = required_text(&mut errors, "issueTag", self.issue_tag.as_ref());
        let action_taken = required_text(&mut errors, "actionTaken", self.action_taken.as_ref());
        let implemented_at = self.implemented_at.unwrap_or_else(|| {
            errors.push(FieldError::new("implementedAt", "is required"));
            NaiveDate::MIN
        });

        let impact = ImpactMetrics {
            avg_score_before: ranged(&mut errors, "avgScoreBefore", self.avg_score_before, 10.0),
            avg_score_after: ranged(&mut errors, "avgScoreAfter", self.avg_score_after, 10.0),
            pct_below_before: ranged(&mut errors, "pctBelow8Before", self.pct_below_before, 100.0),
            pct_below_after: ranged(&mut errors, "pctBelow8After", self.pct_below_after, 100.0),
            tours_before_action: tour_count(
                &mut errors,
                "toursBeforeAction",
                self.tours_before_action,
            ),
            tours_after_action: tour_count(
                &mut errors,
                "toursAfterAction",
                self.tours_after_action,
            ),
        };

        EngineError::check(errors)?;

        Ok(CorrectiveAction {
            id: String::new(),
            suggested_action_id: self.suggested_action_id.clone(),
            destination_id,
            itinerary_id: self.itinerary_id.clone(),
            issue_tag,
            action_taken,
            implemented_at,
            owner: self.owner.clone(),
            notes: self.notes.clone().unwrap_or_default(),
            impact,
        })
    }
}

/// Validates `input` and appends it, returning the new action's id.
pub fn record_corrective_action(
    store: &EntityStore,
    input: &CorrectiveActionInput,
) -> EngineResult<String> {
    let draft = input.validate(store)?;
    let id = store.append_corrective_action(|id| CorrectiveAction { id, ..draft });
    tracing::info!(
        action_id = %id,
        destination_id = %input.destination_id.as_deref().unwrap_or_default(),
        "corrective action recorded"
    );
    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ActionStatus, Priority};
    use crate::testing::{date, metrics, DatasetBuilder};

    const EPSILON: f64 = 1e-9;

    fn store() -> EntityStore {
        DatasetBuilder::new()
            .destination("d-peru", "Peru")
            .destination("d-chile", "Chile")
            .itinerary("i-inca", "d-peru")
            .itinerary("i-atacama", "d-chile")
            .suggested("s-1", "d-peru", Priority::High, ActionStatus::InProgress, 5)
            .corrective("ca-1", "d-peru", "transport_issues", metrics(6.0, 7.0, 40.0, 20.0))
            .corrective("ca-2", "d-peru", "meal_quality", metrics(7.0, 7.5, 30.0, 25.0))
            .corrective("ca-3", "d-chile", "transport_issues", metrics(8.0, 7.0, 10.0, 20.0))
            .build_store()
    }

    fn complete_input() -> CorrectiveActionInput {
        CorrectiveActionInput {
            suggested_action_id: Some("s-1".into()),
            destination_id: Some("d-peru".into()),
            itinerary_id: Some("i-inca".into()),
            issue_tag: Some("transport_issues".into()),
            action_taken: Some("Switched coach operator".into()),
            implemented_at: Some(date("2024-06-01")),
            owner: Some("ops".into()),
            notes: None,
            avg_score_before: Some(6.5),
            avg_score_after: Some(8.0),
            pct_below_before: Some(60.0),
            pct_below_after: Some(20.0),
            tours_before_action: Some(6),
            tours_after_action: Some(4),
        }
    }

    #[test]
    fn summary_averages_deltas() {
        let store = store();
        let actions = store.corrective_actions();
        let summary = impact_summary(&actions);
        assert_eq!(summary.count, 3);
        assert!((summary.avg_score_improvement - (1.0 + 0.5 - 1.0) / 3.0).abs() < EPSILON);
        assert!((summary.avg_pct_improvement - (20.0 + 5.0 - 10.0) / 3.0).abs() < EPSILON);
    }

    #[test]
    fn empty_set_summarises_to_zero() {
        let summary = impact_summary(std::iter::empty::<&CorrectiveAction>());
        assert_eq!(summary.count, 0);
        assert_eq!(summary.avg_score_improvement, 0.0);
        assert_eq!(summary.avg_pct_improvement, 0.0);
        assert!(!summary.avg_score_improvement.is_nan());
    }

    #[test]
    fn filter_by_destination_and_tag() {
        let store = store();
        let actions = store.corrective_actions();
        let peru = ActionFilter::default().destination("d-peru");
        assert_eq!(peru.select(&actions).len(), 2);
        let transport = ActionFilter::default().issue_tag("transport_issues");
        let summary = impact_summary(transport.select(&actions));
        assert_eq!(summary.count, 2);
        assert!(summary.avg_score_improvement.abs() < EPSILON);
        let none = ActionFilter::default().destination("d-bolivia");
        assert_eq!(impact_summary(none.select(&actions)).count, 0);
    }

    #[test]
    fn recorded_action_has_exact_score_delta() {
        let store = store();
        let id = record_corrective_action(&store, &complete_input()).unwrap();
        assert!(id.starts_with("ca-"));
        let action = store.corrective_action(&id).unwrap();
        assert!((action.impact.score_delta() - 1.5).abs() < EPSILON);
        assert!((action_impact(&action).pct_delta - 40.0).abs() < EPSILON);
        assert_eq!(action.notes, "");
        assert_eq!(store.corrective_actions().len(), 4);
        assert!(store.resolved_suggestions().contains("s-1"));
    }

    #[test]
    fn every_missing_field_is_reported() {
        let store = store();
        let err = record_corrective_action(&store, &CorrectiveActionInput::default()).unwrap_err();
        let fields: Vec<&str> = err.field_errors().iter().map(|e| e.field).collect();
        assert_eq!(
            fields,
            vec![
                "destinationId",
                "issueTag",
                "actionTaken",
                "implementedAt",
                "avgScoreBefore",
                "avgScoreAfter",
                "pctBelow8Before",
                "pctBelow8After",
                "toursBeforeAction",
                "toursAfterAction",
            ]
        );
        assert_eq!(store.corrective_actions().len(), 3);
    }

    #[test]
    fn out_of_range_numbers_are_rejected() {
        let store = store();
        let input = CorrectiveActionInput {
            avg_score_after: Some(10.5),
            pct_below_before: Some(f64::NAN),
            tours_after_action: Some(-1),
            ..complete_input()
        };
        let err = record_corrective_action(&store, &input).unwrap_err();
        let fields: Vec<&str> = err.field_errors().iter().map(|e| e.field).collect();
        assert_eq!(fields, vec!["avgScoreAfter", "pctBelow8Before", "toursAfterAction"]);
    }

    #[test]
    fn boundaries_are_accepted() {
        let store = store();
        let input = CorrectiveActionInput {
            avg_score_before: Some(0.0),
            avg_score_after: Some(10.0),
            pct_below_before: Some(100.0),
            pct_below_after: Some(0.0),
            tours_before_action: Some(0),
            ..complete_input()
        };
        assert!(record_corrective_action(&store, &input).is_ok());
    }

    #[test]
    fn references_must_resolve() {
        let store = store();
        let input = CorrectiveActionInput {
            suggested_action_id: Some("s-404".into()),
            itinerary_id: Some("i-atacama".into()),
            ..complete_input()
        };
        let err = record_corrective_action(&store, &input).unwrap_err();
        let fields: Vec<&str> = err.field_errors().iter().map(|e| e.field).collect();
        assert_eq!(fields, vec!["itineraryId", "suggestedActionId"]);

        let input = CorrectiveActionInput {
            destination_id: Some("d-atlantis".into()),
            itinerary_id: None,
            ..complete_input()
        };
        assert!(record_corrective_action(&store, &input).is_err());
    }

    #[test]
    fn inconsistent_figures_are_trusted() {
        let store = store();
        let input = CorrectiveActionInput {
            avg_score_before: Some(9.0),
            avg_score_after: Some(2.0),
            pct_below_before: Some(0.0),
            pct_below_after: Some(0.0),
            ..complete_input()
        };
        let id = record_corrective_action(&store, &input).unwrap();
        let action = store.corrective_action(&id).unwrap();
        assert!((action.impact.score_delta() + 7.0).abs() < EPSILON);
    }

    #[test]
    fn input_deserializes_from_camel_case() {
        let input: CorrectiveActionInput = serde_json::from_str(
            r#"{"destinationId": "d-peru", "pctBelow8Before": 40, "toursAfterAction": 2}"#,
        )
        .unwrap();
        assert_eq!(input.destination_id.as_deref(), Some("d-peru"));
        assert_eq!(input.pct_below_before, Some(40.0));
        assert_eq!(input.tours_after_action, Some(2));
    }
}
