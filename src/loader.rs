use std::collections::HashSet;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read};
use std::path::Path;

use anyhow::Context;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::{Comments, Scores, SurveyResponse};
use crate::store::Dataset;

pub fn read_dataset<R: Read>(reader: R) -> anyhow::Result<Dataset> {
    let dataset = serde_json::from_reader(reader).context("dataset is not valid JSON")?;
    Ok(dataset)
}

pub fn load_dataset(path: &Path) -> anyhow::Result<Dataset> {
    let file = File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    let dataset = read_dataset(BufReader::new(file))
        .with_context(|| format!("failed to load dataset from {}", path.display()))?;
    tracing::info!(path = %path.display(), responses = dataset.responses.len(), "dataset loaded");
    Ok(dataset)
}

pub fn save_dataset(path: &Path, dataset: &Dataset) -> anyhow::Result<()> {
    let file = File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
    serde_json::to_writer_pretty(BufWriter::new(file), dataset)
        .with_context(|| format!("failed to write dataset to {}", path.display()))?;
    Ok(())
}

#[derive(serde::Deserialize)]
struct CsvRow {
    id: Option<String>,
    tour_id: String,
    created_at: DateTime<Utc>,
    overall: f64,
    coordinator: f64,
    accommodation: f64,
    transportation: f64,
    activities: f64,
    meals: f64,
    pacing: f64,
    value: f64,
    #[serde(default)]
    highlights: Option<String>,
    #[serde(default)]
    improvements: Option<String>,
    #[serde(default)]
    coordinator_feedback: Option<String>,
}

impl From<CsvRow> for SurveyResponse {
    fn from(row: CsvRow) -> Self {
        Self {
            id: row
                .id
                .filter(|id| !id.trim().is_empty())
                .unwrap_or_else(|| format!("import-{}", Uuid::new_v4())),
            tour_id: row.tour_id,
            created_at: row.created_at,
            scores: Scores {
                overall: row.overall,
                coordinator: row.coordinator,
                accommodation: row.accommodation,
                transportation: row.transportation,
                activities: row.activities,
                meals: row.meals,
                pacing: row.pacing,
                value: row.value,
            },
            comments: Comments {
                highlights: row.highlights.unwrap_or_default(),
                improvements: row.improvements.unwrap_or_default(),
                coordinator_feedback: row.coordinator_feedback.unwrap_or_default(),
            },
        }
    }
}

/// Parses flat survey rows; rows without an id get a generated one.
pub fn read_responses_csv<R: Read>(reader: R) -> anyhow::Result<Vec<SurveyResponse>> {
    let mut reader = csv::Reader::from_reader(reader);
    let mut responses = Vec::new();
    for (line, result) in reader.deserialize::<CsvRow>().enumerate() {
        let row = result.with_context(|| format!("invalid survey row {}", line + 1))?;
        responses.push(row.into());
    }
    Ok(responses)
}

pub fn import_responses_csv(path: &Path) -> anyhow::Result<Vec<SurveyResponse>> {
    let file = File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    read_responses_csv(file).with_context(|| format!("failed to import {}", path.display()))
}

/// Appends responses whose id is not already present; returns how many landed.
pub fn merge_responses(dataset: &mut Dataset, incoming: Vec<SurveyResponse>) -> usize {
    let mut known: HashSet<String> = dataset.responses.iter().map(|r| r.id.clone()).collect();
    let mut inserted = 0usize;
    for response in incoming {
        if known.insert(response.id.clone()) {
            dataset.responses.push(response);
            inserted += 1;
        }
    }
    inserted
}
