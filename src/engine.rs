use crate::backlog::{suggestion_backlog, Backlog, SuggestionFilter};
use crate::config::EngineConfig;
use crate::error::EngineResult;
use crate::filter::{filter_responses, FilterSpec};
use crate::impact::{
    action_impact, impact_summary, record_corrective_action, ActionFilter, CorrectiveActionInput,
};
use crate::issues::{aggregate_issues, IssueClusters, IssueScope};
use crate::models::{ActionImpact, DestinationSummary, ImpactSummary, PeriodPoint, SurveyResponse};
use crate::store::{Dataset, EntityStore};
use crate::trend::{self, Period};

/// Entry point for front ends: an entity snapshot plus bucketing settings.
///
/// Every read is a pure function of the snapshot and its arguments, so one
/// engine can be shared across threads behind an `Arc`. Caching results per
/// filter is left to the caller.
#[derive(Debug)]
pub struct QualityEngine {
    store: EntityStore,
    config: EngineConfig,
}

impl QualityEngine {
    pub fn new(dataset: Dataset, config: EngineConfig) -> EngineResult<Self> {
        config.validate()?;
        Ok(Self {
            store: EntityStore::new(dataset),
            config,
        })
    }

    pub fn store(&self) -> &EntityStore {
        &self.store
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn filter_responses(&self, spec: &FilterSpec) -> EngineResult<Vec<&SurveyResponse>> {
        filter_responses(&self.store, spec)
    }

    pub fn aggregate_issues(
        &self,
        responses: &[&SurveyResponse],
        scope: IssueScope,
    ) -> IssueClusters {
        aggregate_issues(&self.store, responses, scope)
    }

    pub fn destination_summaries(
        &self,
        responses: &[&SurveyResponse],
        period: Period,
    ) -> Vec<DestinationSummary> {
        trend::destination_summaries(&self.store, &self.config, responses, period)
    }

    pub fn worsening_destinations(
        &self,
        responses: &[&SurveyResponse],
        period: Period,
    ) -> Vec<DestinationSummary> {
        trend::worsening_destinations(&self.store, &self.config, responses, period)
    }

    pub fn weekly_series(
        &self,
        destination_id: &str,
        responses: &[&SurveyResponse],
    ) -> Vec<PeriodPoint> {
        trend::weekly_series(&self.store, &self.config, destination_id, responses)
    }

    pub fn series(
        &self,
        destination_id: &str,
        responses: &[&SurveyResponse],
        period: Period,
    ) -> Vec<PeriodPoint> {
        trend::series(
            &self.store,
            &self.config,
            destination_id,
            responses,
            period,
            self.config.series_periods,
        )
    }

    pub fn impact_summary(&self, filter: &ActionFilter) -> ImpactSummary {
        let actions = self.store.corrective_actions();
        impact_summary(filter.select(&actions))
    }

    pub fn action_impacts(&self, filter: &ActionFilter) -> Vec<ActionImpact> {
        let actions = self.store.corrective_actions();
        filter.select(&actions).into_iter().map(action_impact).collect()
    }

    pub fn record_corrective_action(&self, input: &CorrectiveActionInput) -> EngineResult<String> {
        record_corrective_action(&self.store, input)
    }

    pub fn suggestion_backlog(&self, filter: &SuggestionFilter) -> Backlog {
        suggestion_backlog(&self.store, filter)
    }
}
