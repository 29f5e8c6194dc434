//! Narrowing the response population before any aggregation runs.
//!
//! All aggregators take the output of [`filter_responses`]; none of them
//! filter on their own.

use std::collections::HashSet;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult, FieldError};
use crate::models::{ProductLine, SurveyResponse, Tour};
use crate::store::EntityStore;

/// Inclusive window applied to a tour's start date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FilterSpec {
    pub score_below_threshold: bool,
    pub destination_id: Option<String>,
    pub product_line: Option<ProductLine>,
    pub dmc_name: Option<String>,
    pub coordinator_name: Option<String>,
    pub date_range: Option<DateRange>,
}

impl Default for FilterSpec {
    fn default() -> Self {
        Self {
            score_below_threshold: true,
            destination_id: None,
            product_line: None,
            dmc_name: None,
            coordinator_name: None,
            date_range: None,
        }
    }
}

impl FilterSpec {
    /// A spec that lets every response through.
    pub fn all() -> Self {
        Self {
            score_below_threshold: false,
            ..Self::default()
        }
    }

    pub fn below_threshold(mut self, enabled: bool) -> Self {
        self.score_below_threshold = enabled;
        self
    }

    pub fn destination(mut self, id: impl Into<String>) -> Self {
        self.destination_id = Some(id.into());
        self
    }

    pub fn product_line(mut self, line: ProductLine) -> Self {
        self.product_line = Some(line);
        self
    }

    pub fn dmc(mut self, name: impl Into<String>) -> Self {
        self.dmc_name = Some(name.into());
        self
    }

    pub fn coordinator(mut self, name: impl Into<String>) -> Self {
        self.coordinator_name = Some(name.into());
        self
    }

    pub fn between(mut self, start: NaiveDate, end: NaiveDate) -> Self {
        self.date_range = Some(DateRange::new(start, end));
        self
    }

    pub fn is_unrestricted(&self) -> bool {
        *self == Self::all()
    }

    fn needs_tour(&self) -> bool {
        self.destination_id.is_some()
            || self.product_line.is_some()
            || self.dmc_name.is_some()
            || self.coordinator_name.is_some()
            || self.date_range.is_some()
    }

    pub fn validate(&self) -> EngineResult<()> {
        let mut errors = Vec::new();
        if let Some(id) = &self.destination_id {
            if id.trim().is_empty() || id.chars().any(char::is_whitespace) {
                errors.push(FieldError::new(
                    "destinationId",
                    format!("`{id}` is not a valid destination id"),
                ));
            }
        }
        if matches!(&self.dmc_name, Some(name) if name.trim().is_empty()) {
            errors.push(FieldError::new("dmcName", "must not be blank"));
        }
        if matches!(&self.coordinator_name, Some(name) if name.trim().is_empty()) {
            errors.push(FieldError::new("coordinatorName", "must not be blank"));
        }
        if let Some(range) = &self.date_range {
            if range.start > range.end {
                errors.push(FieldError::new(
                    "dateRange",
                    format!("start {} is after end {}", range.start, range.end),
                ));
            }
        }
        EngineError::check(errors)
    }

    fn tour_matches(&self, tour: &Tour, destination_tours: Option<&HashSet<&str>>) -> bool {
        if let Some(tours) = destination_tours {
            if !tours.contains(tour.id.as_str()) {
                return false;
            }
        }
        if let Some(line) = self.product_line {
            if tour.product_line != line {
                return false;
            }
        }
        if let Some(dmc) = &self.dmc_name {
            if &tour.dmc_name != dmc {
                return false;
            }
        }
        if let Some(coordinator) = &self.coordinator_name {
            if &tour.coordinator_name != coordinator {
                return false;
            }
        }
        if let Some(range) = &self.date_range {
            if !range.contains(tour.start_date) {
                return false;
            }
        }
        true
    }
}

/// Returns the responses matching every clause of `spec`, in load order.
///
/// Clauses run as a logical AND: score threshold first, then the tour-based
/// checks (destination, product line, DMC, coordinator, start date). A
/// response whose tour is missing cannot satisfy any tour-based clause.
pub fn filter_responses<'a>(
    store: &'a EntityStore,
    spec: &FilterSpec,
) -> EngineResult<Vec<&'a SurveyResponse>> {
    spec.validate()?;

    let destination_tours = spec.destination_id.as_deref().map(|id| {
        if store.destination(id).is_none() {
            tracing::debug!(destination_id = id, "filter names unknown destination");
            HashSet::new()
        } else {
            store.tour_ids_for_destination(id)
        }
    });
    let needs_tour = spec.needs_tour();

    let selected: Vec<&SurveyResponse> = store
        .responses()
        .iter()
        .filter(|response| !spec.score_below_threshold || response.is_below_threshold())
        .filter(|response| {
            if !needs_tour {
                return true;
            }
            store
                .tour_of(response)
                .is_some_and(|tour| spec.tour_matches(tour, destination_tours.as_ref()))
        })
        .collect();

    tracing::debug!(
        total = store.responses().len(),
        selected = selected.len(),
        "responses filtered"
    );
    Ok(selected)
}
