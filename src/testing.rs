//! Fixture builder shared by the unit tests.

use chrono::{Duration, NaiveDate, TimeZone, Utc};

use crate::models::{
    ActionStatus, ActionType, Annotation, Comments, CorrectiveAction, Destination, ImpactMetrics,
    Itinerary, Priority, ProductLine, Scores, Severity, SuggestedAction, SurveyResponse, Tour,
};
use crate::store::{Dataset, EntityStore};

pub fn date(value: &str) -> NaiveDate {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").unwrap()
}

pub fn scores(overall: f64) -> Scores {
    Scores {
        overall,
        coordinator: overall,
        accommodation: overall,
        transportation: overall,
        activities: overall,
        meals: overall,
        pacing: overall,
        value: overall,
    }
}

pub fn metrics(before: f64, after: f64, pct_before: f64, pct_after: f64) -> ImpactMetrics {
    ImpactMetrics {
        avg_score_before: before,
        avg_score_after: after,
        pct_below_before: pct_before,
        pct_below_after: pct_after,
        tours_before_action: 4,
        tours_after_action: 3,
    }
}

#[derive(Default)]
pub struct DatasetBuilder {
    dataset: Dataset,
}

impl DatasetBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn destination(mut self, id: &str, name: &str) -> Self {
        self.dataset.destinations.push(Destination {
            id: id.into(),
            name: name.into(),
            country: name.into(),
        });
        self
    }

    pub fn itinerary(mut self, id: &str, destination_id: &str) -> Self {
        self.dataset.itineraries.push(Itinerary {
            id: id.into(),
            name: format!("{id} route"),
            destination_id: destination_id.into(),
        });
        self
    }

    pub fn tour(self, id: &str, itinerary_id: &str, start: &str) -> Self {
        self.tour_with(id, itinerary_id, start, ProductLine::Wr, "Andes DMC", "Lucia")
    }

    pub fn tour_with(
        mut self,
        id: &str,
        itinerary_id: &str,
        start: &str,
        product_line: ProductLine,
        dmc: &str,
        coordinator: &str,
    ) -> Self {
        let start_date = date(start);
        self.dataset.tours.push(Tour {
            id: id.into(),
            itinerary_id: itinerary_id.into(),
            start_date,
            end_date: start_date + Duration::days(9),
            product_line,
            dmc_name: dmc.into(),
            coordinator_name: coordinator.into(),
        });
        self
    }

    pub fn response(self, id: &str, tour_id: &str, overall: f64) -> Self {
        self.response_with(id, tour_id, scores(overall), "")
    }

    pub fn response_with(mut self, id: &str, tour_id: &str, scores: Scores, comment: &str) -> Self {
        let offset = self.dataset.responses.len() as i64;
        let created_at =
            Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap() + Duration::hours(offset);
        self.dataset.responses.push(SurveyResponse {
            id: id.into(),
            tour_id: tour_id.into(),
            created_at,
            scores,
            comments: Comments {
                improvements: comment.into(),
                ..Comments::default()
            },
        });
        self
    }

    pub fn annotate(
        mut self,
        response_id: &str,
        product_tags: &[&str],
        coordinator_tags: &[&str],
        severity: Severity,
    ) -> Self {
        self.dataset.annotations.push(Annotation {
            response_id: response_id.into(),
            product_tags: product_tags.iter().map(|t| t.to_string()).collect(),
            coordinator_tags: coordinator_tags.iter().map(|t| t.to_string()).collect(),
            severity,
            confidence: 0.8,
            evidence: vec!["quoted from survey".into()],
        });
        self
    }

    pub fn suggested(
        mut self,
        id: &str,
        destination_id: &str,
        priority: Priority,
        status: ActionStatus,
        affected_tours: u32,
    ) -> Self {
        self.dataset.suggested_actions.push(SuggestedAction {
            id: id.into(),
            destination_id: destination_id.into(),
            itinerary_id: None,
            issue_tag: "transport_issues".into(),
            action_type: ActionType::SupplierChange,
            priority,
            status,
            created_at: date("2024-04-01"),
            due_date: None,
            owner: Some("ops".into()),
            affected_tours,
        });
        self
    }

    pub fn corrective(
        mut self,
        id: &str,
        destination_id: &str,
        issue_tag: &str,
        impact: ImpactMetrics,
    ) -> Self {
        self.dataset.corrective_actions.push(CorrectiveAction {
            id: id.into(),
            suggested_action_id: None,
            destination_id: destination_id.into(),
            itinerary_id: None,
            issue_tag: issue_tag.into(),
            action_taken: "Replaced coach supplier".into(),
            implemented_at: date("2024-05-01"),
            owner: None,
            notes: String::new(),
            impact,
        });
        self
    }

    pub fn build(self) -> Dataset {
        self.dataset
    }

    pub fn build_store(self) -> EntityStore {
        EntityStore::new(self.dataset)
    }
}
