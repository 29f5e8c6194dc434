//! Open suggested actions and how far along the backlog is.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::models::{ActionStatus, Priority, SuggestedAction};
use crate::store::EntityStore;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SuggestionFilter {
    pub destination_id: Option<String>,
    pub status: Option<ActionStatus>,
    pub priority: Option<Priority>,
}

impl SuggestionFilter {
    pub fn matches(&self, action: &SuggestedAction) -> bool {
        self.destination_id
            .as_ref()
            .map_or(true, |id| &action.destination_id == id)
            && self.status.map_or(true, |status| action.status == status)
            && self.priority.map_or(true, |priority| action.priority == priority)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Backlog {
    pub by_status: BTreeMap<ActionStatus, usize>,
    pub by_priority: BTreeMap<Priority, usize>,
    /// Suggestions a corrective action already answers.
    pub resolved: usize,
    /// Still-open suggestions with no corrective action, most urgent first.
    pub open: Vec<SuggestedAction>,
}

/// Suggested actions matching `filter`, in load order.
pub fn select_suggestions<'a>(
    store: &'a EntityStore,
    filter: &SuggestionFilter,
) -> Vec<&'a SuggestedAction> {
    store
        .suggested_actions()
        .iter()
        .filter(|action| filter.matches(action))
        .collect()
}

pub fn suggestion_backlog(store: &EntityStore, filter: &SuggestionFilter) -> Backlog {
    let resolved_ids = store.resolved_suggestions();
    let mut backlog = Backlog::default();

    for action in select_suggestions(store, filter) {
        *backlog.by_status.entry(action.status).or_insert(0) += 1;
        *backlog.by_priority.entry(action.priority).or_insert(0) += 1;
        if resolved_ids.contains(&action.id) {
            backlog.resolved += 1;
        } else if action.status.is_open() {
            backlog.open.push(action.clone());
        }
    }

    backlog.open.sort_by(|a, b| {
        b.priority
            .cmp(&a.priority)
            .then_with(|| b.affected_tours.cmp(&a.affected_tours))
            .then_with(|| a.id.cmp(&b.id))
    });
    backlog
}
