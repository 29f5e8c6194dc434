use std::fmt::Write;

use crate::engine::QualityEngine;
use crate::error::EngineResult;
use crate::filter::FilterSpec;
use crate::impact::ActionFilter;
use crate::issues::{IssueScope, ScopeKey};
use crate::models::{DestinationSummary, SurveyResponse, SATISFACTION_THRESHOLD};
use crate::trend::Period;

fn format_delta(delta: Option<f64>) -> String {
    match delta {
        Some(value) => format!("{value:+.2}"),
        None => "n/a".to_string(),
    }
}

fn scope_label(engine: &QualityEngine, spec: &FilterSpec) -> String {
    let mut parts = Vec::new();
    match spec.destination_id.as_deref() {
        Some(id) => parts.push(
            engine
                .store()
                .destination(id)
                .map_or_else(|| id.to_string(), |d| d.name.clone()),
        ),
        None => parts.push("all destinations".to_string()),
    }
    if let Some(line) = spec.product_line {
        parts.push(format!("product line {line}"));
    }
    if let Some(dmc) = &spec.dmc_name {
        parts.push(format!("DMC {dmc}"));
    }
    if let Some(coordinator) = &spec.coordinator_name {
        parts.push(format!("coordinator {coordinator}"));
    }
    if let Some(range) = &spec.date_range {
        parts.push(format!("tours starting {} to {}", range.start, range.end));
    }
    if spec.score_below_threshold {
        parts.push(format!("responses below {SATISFACTION_THRESHOLD}"));
    }
    parts.join(", ")
}

fn summary_line(summary: &DestinationSummary) -> String {
    format!(
        "{}: avg {:.2} (delta {}), {}% below {}, top issue {}",
        summary.destination_name,
        summary.avg_overall,
        format_delta(summary.delta),
        summary.pct_below_display(),
        SATISFACTION_THRESHOLD,
        summary.top_issue.as_deref().unwrap_or("none")
    )
}

/// Renders the filtered views as a markdown document.
pub fn build_report(
    engine: &QualityEngine,
    spec: &FilterSpec,
    period: Period,
) -> EngineResult<String> {
    let responses = engine.filter_responses(spec)?;
    let issues = engine.aggregate_issues(&responses, IssueScope::All);
    let summaries = engine.destination_summaries(&responses, period);
    let worsening = engine.worsening_destinations(&responses, period);

    let action_filter = ActionFilter {
        destination_id: spec.destination_id.clone(),
        ..ActionFilter::default()
    };
    let impact = engine.impact_summary(&action_filter);
    let impacts = engine.action_impacts(&action_filter);

    let mut output = String::new();

    let _ = writeln!(output, "# Tour Quality Report");
    let _ = writeln!(
        output,
        "Generated for {} ({} responses, {:?} periods)",
        scope_label(engine, spec),
        responses.len(),
        period
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Issue Mix");

    let ranked = issues.ranked(&ScopeKey::All);
    if ranked.is_empty() {
        let _ = writeln!(output, "No annotated issues for this filter.");
    } else {
        for (tag, issue) in ranked.iter().take(10) {
            let _ = writeln!(
                output,
                "- {}: {} responses ({} high / {} medium / {} low)",
                tag,
                issue.count,
                issue.severity_counts.high,
                issue.severity_counts.medium,
                issue.severity_counts.low
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Worsening Destinations");

    if worsening.is_empty() {
        let _ = writeln!(output, "No destination declined against its previous period.");
    } else {
        for summary in worsening.iter().take(10) {
            let _ = writeln!(output, "- {}", summary_line(summary));
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Destination Overview");

    if summaries.is_empty() {
        let _ = writeln!(output, "No responses matched this filter.");
    } else {
        let _ = writeln!(output, "| Destination | Responses | Avg | % below | Delta | Top issue |");
        let _ = writeln!(output, "|---|---|---|---|---|---|");
        for summary in &summaries {
            let _ = writeln!(
                output,
                "| {} | {} | {:.2} | {}% | {} | {} |",
                summary.destination_name,
                summary.response_count,
                summary.avg_overall,
                summary.pct_below_display(),
                format_delta(summary.delta),
                summary.top_issue.as_deref().unwrap_or("none")
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Corrective Action Impact");

    if impact.count == 0 {
        let _ = writeln!(output, "No corrective actions recorded.");
    } else {
        let _ = writeln!(
            output,
            "{} actions: avg score {:+.2}, share below {} down {:.1} pts",
            impact.count,
            impact.avg_score_improvement,
            SATISFACTION_THRESHOLD,
            impact.avg_pct_improvement
        );
        for row in impacts.iter().take(10) {
            let _ = writeln!(
                output,
                "- {} ({}): score {:+.2}, below-threshold {:+.1} pts",
                row.action_id, row.issue_tag, row.score_delta, row.pct_delta
            );
        }
    }

    let mut recent: Vec<&SurveyResponse> = responses
        .iter()
        .copied()
        .filter(|response| response.is_below_threshold())
        .collect();
    recent.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    let _ = writeln!(output);
    let _ = writeln!(output, "## Recent Low-Score Comments");

    let commented: Vec<(&SurveyResponse, &str)> = recent
        .into_iter()
        .filter_map(|response| response.comments.headline().map(|text| (response, text)))
        .take(5)
        .collect();
    if commented.is_empty() {
        let _ = writeln!(output, "No comments recorded for this filter.");
    } else {
        for (response, text) in commented {
            let _ = writeln!(
                output,
                "- {} (score {}) on {}: {}",
                response.tour_id,
                response.scores.overall,
                response.created_at.date_naive(),
                text
            );
        }
    }

    Ok(output)
}
