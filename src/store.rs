//! Indexed, read-only views over the loaded entity collections.
//!
//! Every lookup returns `Option`: upstream data may point at entities that
//! were never seeded, and callers drop such records from the grouping they
//! are building instead of failing. Parent/child indices are built once here
//! so the aggregators never rebuild them.
//!
//! Corrective actions are the one collection that grows after load. Appends
//! go through a single write lock and are pushed fully built, so a reader
//! taking a snapshot sees either the whole record or nothing.

use std::collections::{HashMap, HashSet};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{EngineError, EngineResult, EntityKind};
use crate::models::{
    is_known_tag, Annotation, CorrectiveAction, Destination, Itinerary, SuggestedAction,
    SurveyResponse, Tour,
};

/// Raw collections as handed over by the loading layer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Dataset {
    pub destinations: Vec<Destination>,
    pub itineraries: Vec<Itinerary>,
    pub tours: Vec<Tour>,
    pub responses: Vec<SurveyResponse>,
    pub annotations: Vec<Annotation>,
    pub suggested_actions: Vec<SuggestedAction>,
    pub corrective_actions: Vec<CorrectiveAction>,
}

pub trait Keyed {
    fn key(&self) -> &str;
}

macro_rules! keyed_by_id {
    ($($ty:ty),+ $(,)?) => {
        $(impl Keyed for $ty {
            fn key(&self) -> &str {
                &self.id
            }
        })+
    };
}

keyed_by_id!(
    Destination,
    Itinerary,
    Tour,
    SurveyResponse,
    SuggestedAction,
    CorrectiveAction
);

/// Entities in load order plus an id index.
#[derive(Debug, Clone)]
pub struct Collection<T> {
    items: Vec<T>,
    by_id: HashMap<String, usize>,
}

impl<T: Keyed> Collection<T> {
    /// Builds the collection, keeping the first record for any repeated id.
    fn build(kind: EntityKind, records: Vec<T>, duplicates: &mut usize) -> Self {
        let mut items = Vec::with_capacity(records.len());
        let mut by_id = HashMap::with_capacity(records.len());
        for record in records {
            if by_id.contains_key(record.key()) {
                tracing::warn!(%kind, id = record.key(), "duplicate id ignored");
                *duplicates += 1;
                continue;
            }
            by_id.insert(record.key().to_string(), items.len());
            items.push(record);
        }
        Self { items, by_id }
    }

    pub fn get(&self, id: &str) -> Option<&T> {
        self.by_id.get(id).map(|&idx| &self.items[idx])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.by_id.contains_key(id)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    pub fn as_slice(&self) -> &[T] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Maps each parent id to its children's ids, in child load order.
pub fn index_children<C, F>(children: &[C], parent_of: F) -> HashMap<String, Vec<String>>
where
    C: Keyed,
    F: Fn(&C) -> &str,
{
    let mut index: HashMap<String, Vec<String>> = HashMap::new();
    for child in children {
        index
            .entry(parent_of(child).to_string())
            .or_default()
            .push(child.key().to_string());
    }
    index
}

/// Dangling references and duplicates found while building the store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IntegrityReport {
    pub orphan_itineraries: usize,
    pub orphan_tours: usize,
    pub orphan_responses: usize,
    pub orphan_annotations: usize,
    pub duplicate_ids: usize,
    pub duplicate_annotations: usize,
    pub untagged_annotations: usize,
    pub unknown_tags: usize,
}

impl IntegrityReport {
    pub fn is_clean(&self) -> bool {
        *self == Self::default()
    }
}

#[derive(Debug)]
pub struct EntityStore {
    destinations: Collection<Destination>,
    itineraries: Collection<Itinerary>,
    tours: Collection<Tour>,
    responses: Collection<SurveyResponse>,
    suggested_actions: Collection<SuggestedAction>,
    annotations: HashMap<String, Annotation>,
    itineraries_by_destination: HashMap<String, Vec<String>>,
    tours_by_itinerary: HashMap<String, Vec<String>>,
    responses_by_tour: HashMap<String, Vec<String>>,
    corrective_actions: RwLock<Vec<CorrectiveAction>>,
    integrity: IntegrityReport,
}

impl EntityStore {
    pub fn new(dataset: Dataset) -> Self {
        let mut integrity = IntegrityReport::default();
        let dup = &mut integrity.duplicate_ids;

        let destinations = Collection::build(EntityKind::Destination, dataset.destinations, dup);
        let itineraries = Collection::build(EntityKind::Itinerary, dataset.itineraries, dup);
        let tours = Collection::build(EntityKind::Tour, dataset.tours, dup);
        let responses = Collection::build(EntityKind::SurveyResponse, dataset.responses, dup);
        let suggested_actions =
            Collection::build(EntityKind::SuggestedAction, dataset.suggested_actions, dup);
        let corrective_actions =
            Collection::build(EntityKind::CorrectiveAction, dataset.corrective_actions, dup).items;

        integrity.orphan_itineraries = itineraries
            .iter()
            .filter(|itinerary| !destinations.contains(&itinerary.destination_id))
            .count();
        integrity.orphan_tours = tours
            .iter()
            .filter(|tour| !itineraries.contains(&tour.itinerary_id))
            .count();
        integrity.orphan_responses = responses
            .iter()
            .filter(|response| !tours.contains(&response.tour_id))
            .count();

        let mut annotations = HashMap::with_capacity(dataset.annotations.len());
        for annotation in dataset.annotations {
            if !responses.contains(&annotation.response_id) {
                integrity.orphan_annotations += 1;
                continue;
            }
            if annotations.contains_key(&annotation.response_id) {
                tracing::warn!(
                    response_id = %annotation.response_id,
                    "second annotation for response ignored"
                );
                integrity.duplicate_annotations += 1;
                continue;
            }
            let tags = annotation.issue_tags();
            if tags.is_empty() {
                integrity.untagged_annotations += 1;
            }
            integrity.unknown_tags += tags.into_iter().filter(|tag| !is_known_tag(tag)).count();
            annotations.insert(annotation.response_id.clone(), annotation);
        }

        if !integrity.is_clean() {
            tracing::warn!(?integrity, "dataset contains inconsistent references");
        }

        let itineraries_by_destination =
            index_children(itineraries.as_slice(), |i| i.destination_id.as_str());
        let tours_by_itinerary = index_children(tours.as_slice(), |t| t.itinerary_id.as_str());
        let responses_by_tour = index_children(responses.as_slice(), |r| r.tour_id.as_str());

        tracing::debug!(
            destinations = destinations.len(),
            tours = tours.len(),
            responses = responses.len(),
            annotations = annotations.len(),
            "entity store built"
        );

        Self {
            destinations,
            itineraries,
            tours,
            responses,
            suggested_actions,
            annotations,
            itineraries_by_destination,
            tours_by_itinerary,
            responses_by_tour,
            corrective_actions: RwLock::new(corrective_actions),
            integrity,
        }
    }

    pub fn integrity(&self) -> IntegrityReport {
        self.integrity
    }

    pub fn destinations(&self) -> &Collection<Destination> {
        &self.destinations
    }

    pub fn itineraries(&self) -> &Collection<Itinerary> {
        &self.itineraries
    }

    pub fn tours(&self) -> &Collection<Tour> {
        &self.tours
    }

    pub fn responses(&self) -> &Collection<SurveyResponse> {
        &self.responses
    }

    pub fn suggested_actions(&self) -> &Collection<SuggestedAction> {
        &self.suggested_actions
    }

    pub fn destination(&self, id: &str) -> Option<&Destination> {
        self.destinations.get(id)
    }

    pub fn itinerary(&self, id: &str) -> Option<&Itinerary> {
        self.itineraries.get(id)
    }

    pub fn tour(&self, id: &str) -> Option<&Tour> {
        self.tours.get(id)
    }

    pub fn response(&self, id: &str) -> Option<&SurveyResponse> {
        self.responses.get(id)
    }

    pub fn suggested_action(&self, id: &str) -> Option<&SuggestedAction> {
        self.suggested_actions.get(id)
    }

    /// The response's annotation, if it was judged to carry an issue.
    pub fn annotation_for(&self, response_id: &str) -> Option<&Annotation> {
        self.annotations.get(response_id)
    }

    pub fn require_destination(&self, id: &str) -> EngineResult<&Destination> {
        self.destination(id)
            .ok_or_else(|| EngineError::not_found(EntityKind::Destination, id))
    }

    pub fn itineraries_of(&self, destination_id: &str) -> &[String] {
        self.itineraries_by_destination
            .get(destination_id)
            .map_or(&[], Vec::as_slice)
    }

    pub fn tours_of(&self, itinerary_id: &str) -> &[String] {
        self.tours_by_itinerary
            .get(itinerary_id)
            .map_or(&[], Vec::as_slice)
    }

    pub fn responses_of(&self, tour_id: &str) -> &[String] {
        self.responses_by_tour
            .get(tour_id)
            .map_or(&[], Vec::as_slice)
    }

    /// Every tour reachable from a destination through its itineraries.
    pub fn tour_ids_for_destination(&self, destination_id: &str) -> HashSet<&str> {
        self.itineraries_of(destination_id)
            .iter()
            .flat_map(|itinerary_id| self.tours_of(itinerary_id))
            .map(String::as_str)
            .collect()
    }

    pub fn tour_of(&self, response: &SurveyResponse) -> Option<&Tour> {
        self.tour(&response.tour_id)
    }

    pub fn destination_of_tour(&self, tour: &Tour) -> Option<&Destination> {
        let itinerary = self.itinerary(&tour.itinerary_id)?;
        self.destination(&itinerary.destination_id)
    }

    /// Walks response -> tour -> itinerary -> destination.
    pub fn destination_of(&self, response: &SurveyResponse) -> Option<&Destination> {
        self.destination_of_tour(self.tour_of(response)?)
    }

    /// Snapshot of the corrective actions recorded so far.
    pub fn corrective_actions(&self) -> Vec<CorrectiveAction> {
        self.corrective_actions.read().clone()
    }

    pub fn corrective_action(&self, id: &str) -> Option<CorrectiveAction> {
        self.corrective_actions
            .read()
            .iter()
            .find(|action| action.id == id)
            .cloned()
    }

    /// Suggested action ids that a corrective action already answers.
    pub fn resolved_suggestions(&self) -> HashSet<String> {
        self.corrective_actions
            .read()
            .iter()
            .filter_map(|action| action.suggested_action_id.clone())
            .collect()
    }

    /// Assigns a fresh id and appends the record built from it.
    pub(crate) fn append_corrective_action<F>(&self, build: F) -> String
    where
        F: FnOnce(String) -> CorrectiveAction,
    {
        let mut actions = self.corrective_actions.write();
        let id = loop {
            let candidate = format!("ca-{}", Uuid::new_v4());
            if !actions.iter().any(|action| action.id == candidate) {
                break candidate;
            }
        };
        actions.push(build(id.clone()));
        id
    }
}

impl From<Dataset> for EntityStore {
    fn from(dataset: Dataset) -> Self {
        Self::new(dataset)
    }
}
