//! Clustering annotated responses by issue tag.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::models::{Severity, SurveyResponse};
use crate::store::EntityStore;

/// How responses are grouped before counting tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IssueScope {
    All,
    Destination,
    Tour,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ScopeKey {
    All,
    Destination(String),
    Tour(String),
}

impl fmt::Display for ScopeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => f.write_str("all"),
            Self::Destination(id) => write!(f, "destination:{id}"),
            Self::Tour(id) => write!(f, "tour:{id}"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SeverityCounts {
    #[serde(rename = "LOW")]
    pub low: usize,
    #[serde(rename = "MEDIUM")]
    pub medium: usize,
    #[serde(rename = "HIGH")]
    pub high: usize,
}

impl SeverityCounts {
    pub fn record(&mut self, severity: Severity) {
        match severity {
            Severity::Low => self.low += 1,
            Severity::Medium => self.medium += 1,
            Severity::High => self.high += 1,
        }
    }

    pub fn get(&self, severity: Severity) -> usize {
        match severity {
            Severity::Low => self.low,
            Severity::Medium => self.medium,
            Severity::High => self.high,
        }
    }

    pub fn total(&self) -> usize {
        self.low + self.medium + self.high
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueCount {
    pub count: usize,
    pub severity_counts: SeverityCounts,
}

/// Flattened view of one tag within one scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueRow {
    pub scope: String,
    pub issue_tag: String,
    pub count: usize,
    pub severity_counts: SeverityCounts,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct IssueClusters {
    scopes: BTreeMap<ScopeKey, BTreeMap<String, IssueCount>>,
    annotated: BTreeMap<ScopeKey, usize>,
}

impl IssueClusters {
    pub fn is_empty(&self) -> bool {
        self.annotated.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &ScopeKey> {
        self.annotated.keys()
    }

    pub fn scope(&self, key: &ScopeKey) -> Option<&BTreeMap<String, IssueCount>> {
        self.scopes.get(key)
    }

    pub fn get(&self, key: &ScopeKey, tag: &str) -> Option<&IssueCount> {
        self.scopes.get(key)?.get(tag)
    }

    /// Annotated responses that landed in `key`.
    pub fn annotated_responses(&self, key: &ScopeKey) -> usize {
        self.annotated.get(key).copied().unwrap_or(0)
    }

    /// Tags in `key`, most frequent first; equal counts order by tag name.
    pub fn ranked(&self, key: &ScopeKey) -> Vec<(&str, &IssueCount)> {
        let mut ranked: Vec<(&str, &IssueCount)> = self
            .scopes
            .get(key)
            .map(|tags| tags.iter().map(|(tag, count)| (tag.as_str(), count)).collect())
            .unwrap_or_default();
        ranked.sort_by(|a, b| rank_order((a.0, a.1.count), (b.0, b.1.count)));
        ranked
    }

    pub fn top_issue(&self, key: &ScopeKey) -> Option<&str> {
        self.ranked(key).first().map(|(tag, _)| *tag)
    }

    /// Every scope's ranked tags as flat rows, scopes in key order.
    pub fn rows(&self) -> Vec<IssueRow> {
        self.scopes
            .keys()
            .flat_map(|key| {
                self.ranked(key).into_iter().map(move |(tag, issue)| IssueRow {
                    scope: key.to_string(),
                    issue_tag: tag.to_string(),
                    count: issue.count,
                    severity_counts: issue.severity_counts,
                })
            })
            .collect()
    }
}

fn rank_order(a: (&str, usize), b: (&str, usize)) -> Ordering {
    b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0))
}

fn scope_key(
    store: &EntityStore,
    response: &SurveyResponse,
    scope: IssueScope,
) -> Option<ScopeKey> {
    match scope {
        IssueScope::All => Some(ScopeKey::All),
        IssueScope::Destination => store
            .destination_of(response)
            .map(|destination| ScopeKey::Destination(destination.id.clone())),
        IssueScope::Tour => store
            .tour_of(response)
            .map(|tour| ScopeKey::Tour(tour.id.clone())),
    }
}

/// Counts each annotated response once per distinct tag, bucketed by scope.
///
/// Responses without an annotation, or whose annotation has no tags, carry
/// no issue and are skipped, as are responses whose scope cannot be
/// resolved (missing tour or destination).
pub fn aggregate_issues(
    store: &EntityStore,
    responses: &[&SurveyResponse],
    scope: IssueScope,
) -> IssueClusters {
    let mut clusters = IssueClusters::default();

    for response in responses {
        let Some(annotation) = store.annotation_for(&response.id) else {
            continue;
        };
        let tags = annotation.issue_tags();
        if tags.is_empty() {
            continue;
        }
        let Some(key) = scope_key(store, response, scope) else {
            tracing::debug!(response_id = %response.id, ?scope, "response has no scope, skipped");
            continue;
        };

        *clusters.annotated.entry(key.clone()).or_insert(0) += 1;
        let counts = clusters.scopes.entry(key).or_default();
        for tag in tags {
            let entry = counts.entry(tag.to_string()).or_default();
            entry.count += 1;
            entry.severity_counts.record(annotation.severity);
        }
    }

    tracing::debug!(
        responses = responses.len(),
        scopes = clusters.annotated.len(),
        "issues aggregated"
    );
    clusters
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::{filter_responses, FilterSpec};
    use crate::testing::DatasetBuilder;
    use pretty_assertions::assert_eq;

    fn clustered_store() -> EntityStore {
        DatasetBuilder::new()
            .destination("d-peru", "Peru")
            .destination("d-chile", "Chile")
            .itinerary("i-inca", "d-peru")
            .itinerary("i-atacama", "d-chile")
            .tour("t-1", "i-inca", "2024-03-04")
            .tour("t-2", "i-atacama", "2024-03-04")
            .response("r-1", "t-1", 6.0)
            .response("r-2", "t-1", 5.0)
            .response("r-3", "t-2", 7.0)
            .response("r-4", "t-2", 6.5)
            .annotate("r-1", &["A"], &[], Severity::Low)
            .annotate("r-2", &["A"], &["B"], Severity::High)
            .annotate("r-3", &[], &["B"], Severity::Medium)
            .build_store()
    }

    fn aggregate(store: &EntityStore, scope: IssueScope) -> IssueClusters {
        let responses = filter_responses(store, &FilterSpec::all()).unwrap();
        aggregate_issues(store, &responses, scope)
    }

    #[test]
    fn counts_tags_with_severity_breakdown() {
        let store = clustered_store();
        let clusters = aggregate(&store, IssueScope::All);

        let a = clusters.get(&ScopeKey::All, "A").unwrap();
        assert_eq!(a.count, 2);
        assert_eq!(
            a.severity_counts,
            SeverityCounts {
                low: 1,
                medium: 0,
                high: 1
            }
        );

        let b = clusters.get(&ScopeKey::All, "B").unwrap();
        assert_eq!(b.count, 2);
        assert_eq!(
            b.severity_counts,
            SeverityCounts {
                low: 0,
                medium: 1,
                high: 1
            }
        );
        assert_eq!(clusters.annotated_responses(&ScopeKey::All), 3);
    }

    #[test]
    fn ties_break_by_tag_name() {
        let store = clustered_store();
        let clusters = aggregate(&store, IssueScope::All);
        let ranked: Vec<&str> = clusters
            .ranked(&ScopeKey::All)
            .into_iter()
            .map(|(tag, _)| tag)
            .collect();
        assert_eq!(ranked, vec!["A", "B"]);
        for _ in 0..5 {
            assert_eq!(clusters.top_issue(&ScopeKey::All), Some("A"));
        }
    }

    #[test]
    fn scopes_by_destination_and_tour() {
        let store = clustered_store();
        let by_destination = aggregate(&store, IssueScope::Destination);
        let peru = ScopeKey::Destination("d-peru".into());
        let chile = ScopeKey::Destination("d-chile".into());
        assert_eq!(by_destination.top_issue(&peru), Some("A"));
        assert_eq!(by_destination.get(&peru, "B").unwrap().count, 1);
        assert_eq!(by_destination.top_issue(&chile), Some("B"));

        let by_tour = aggregate(&store, IssueScope::Tour);
        assert_eq!(by_tour.annotated_responses(&ScopeKey::Tour("t-1".into())), 2);
        assert_eq!(by_tour.annotated_responses(&ScopeKey::Tour("t-2".into())), 1);
    }

    #[test]
    fn repeated_tag_counts_once_per_response() {
        let store = DatasetBuilder::new()
            .destination("d-1", "Peru")
            .itinerary("i-1", "d-1")
            .tour("t-1", "i-1", "2024-03-04")
            .response("r-1", "t-1", 5.0)
            .annotate("r-1", &["X", "X"], &["X"], Severity::Medium)
            .build_store();
        let clusters = aggregate(&store, IssueScope::All);
        let x = clusters.get(&ScopeKey::All, "X").unwrap();
        assert_eq!(x.count, 1);
        assert_eq!(x.severity_counts.get(Severity::Medium), 1);
        assert_eq!(x.severity_counts.get(Severity::High), 0);
    }

    #[test]
    fn annotation_without_tags_carries_no_issue() {
        let store = DatasetBuilder::new()
            .destination("d-1", "Peru")
            .itinerary("i-1", "d-1")
            .tour("t-1", "i-1", "2024-03-04")
            .response("r-1", "t-1", 5.0)
            .response("r-2", "t-1", 6.0)
            .annotate("r-1", &[], &[], Severity::High)
            .annotate("r-2", &["A"], &[], Severity::Low)
            .build_store();
        let clusters = aggregate(&store, IssueScope::All);
        assert_eq!(clusters.annotated_responses(&ScopeKey::All), 1);
        assert_eq!(clusters.top_issue(&ScopeKey::All), Some("A"));

        let untagged_only = filter_responses(&store, &FilterSpec::all())
            .unwrap()
            .into_iter()
            .filter(|response| response.id == "r-1")
            .collect::<Vec<_>>();
        let clusters = aggregate_issues(&store, &untagged_only, IssueScope::All);
        assert!(clusters.is_empty());
        assert_eq!(clusters.annotated_responses(&ScopeKey::All), 0);
    }

    #[test]
    fn scope_without_annotations_has_no_top_issue() {
        let store = clustered_store();
        let clusters = aggregate(&store, IssueScope::Tour);
        assert_eq!(clusters.top_issue(&ScopeKey::Tour("t-9".into())), None);

        let empty = aggregate_issues(&store, &[], IssueScope::All);
        assert!(empty.is_empty());
        assert_eq!(empty.top_issue(&ScopeKey::All), None);
    }

    #[test]
    fn unresolvable_destination_is_left_out() {
        let store = DatasetBuilder::new()
            .destination("d-1", "Peru")
            .itinerary("i-1", "d-1")
            .itinerary("i-ghost", "d-gone")
            .tour("t-1", "i-1", "2024-03-04")
            .tour("t-2", "i-ghost", "2024-03-04")
            .response("r-1", "t-1", 5.0)
            .response("r-2", "t-2", 5.0)
            .annotate("r-1", &["A"], &[], Severity::Low)
            .annotate("r-2", &["A"], &[], Severity::Low)
            .build_store();
        let clusters = aggregate(&store, IssueScope::Destination);
        assert_eq!(clusters.keys().count(), 1);
        let all = aggregate(&store, IssueScope::All);
        assert_eq!(all.get(&ScopeKey::All, "A").unwrap().count, 2);
    }

    #[test]
    fn rows_flatten_scopes_in_rank_order() {
        let store = clustered_store();
        let rows = aggregate(&store, IssueScope::Destination).rows();
        let flat: Vec<(String, String, usize)> = rows
            .into_iter()
            .map(|row| (row.scope, row.issue_tag, row.count))
            .collect();
        assert_eq!(
            flat,
            vec![
                ("destination:d-chile".to_string(), "B".to_string(), 1),
                ("destination:d-peru".to_string(), "A".to_string(), 2),
                ("destination:d-peru".to_string(), "B".to_string(), 1),
            ]
        );
    }

    #[test]
    fn tag_total_covers_annotated_responses() {
        let store = clustered_store();
        let clusters = aggregate(&store, IssueScope::All);
        let total: usize = clusters
            .scope(&ScopeKey::All)
            .unwrap()
            .values()
            .map(|issue| issue.count)
            .sum();
        assert!(total >= clusters.annotated_responses(&ScopeKey::All));
        let severity_total: usize = clusters
            .scope(&ScopeKey::All)
            .unwrap()
            .values()
            .map(|issue| issue.severity_counts.total())
            .sum();
        assert_eq!(severity_total, total);
    }
}
