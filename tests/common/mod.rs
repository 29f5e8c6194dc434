#![allow(dead_code)]

use chrono::{Duration, NaiveDate, TimeZone, Utc};

use tour_quality_insights::models::{
    Annotation, Comments, Destination, Itinerary, ProductLine, Scores, Severity, SurveyResponse,
    Tour,
};
use tour_quality_insights::Dataset;

pub fn date(value: &str) -> NaiveDate {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").unwrap()
}

pub fn destination(dataset: &mut Dataset, id: &str) {
    dataset.destinations.push(Destination {
        id: id.into(),
        name: id.to_uppercase(),
        country: "Peru".into(),
    });
    dataset.itineraries.push(Itinerary {
        id: format!("{id}-route"),
        name: format!("{id} classic"),
        destination_id: id.into(),
    });
}

pub fn tour(dataset: &mut Dataset, id: &str, destination_id: &str, start: &str, line: ProductLine) {
    let start_date = date(start);
    dataset.tours.push(Tour {
        id: id.into(),
        itinerary_id: format!("{destination_id}-route"),
        start_date,
        end_date: start_date + Duration::days(8),
        product_line: line,
        dmc_name: "Andes DMC".into(),
        coordinator_name: "Lucia".into(),
    });
}

pub fn response(dataset: &mut Dataset, id: &str, tour_id: &str, overall: f64) {
    let offset = dataset.responses.len() as i64;
    dataset.responses.push(SurveyResponse {
        id: id.into(),
        tour_id: tour_id.into(),
        created_at: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap() + Duration::minutes(offset),
        scores: Scores {
            overall,
            ..Scores::default()
        },
        comments: Comments::default(),
    });
}

pub fn annotate(dataset: &mut Dataset, response_id: &str, tags: &[&str], severity: Severity) {
    dataset.annotations.push(Annotation {
        response_id: response_id.into(),
        product_tags: tags.iter().map(|t| t.to_string()).collect(),
        coordinator_tags: Vec::new(),
        severity,
        confidence: 0.9,
        evidence: vec!["survey comment".into()],
    });
}

/// One destination, one tour, responses scored as given.
pub fn single_tour(scores: &[f64]) -> Dataset {
    let mut dataset = Dataset::default();
    destination(&mut dataset, "d-peru");
    tour(&mut dataset, "t-1", "d-peru", "2024-03-04", ProductLine::Wr);
    for (idx, score) in scores.iter().enumerate() {
        response(&mut dataset, &format!("r-{}", idx + 1), "t-1", *score);
    }
    dataset
}
