//! Series extraction
//!
//! Helpers that turn the raw reading and assessment lists into the numeric
//! series the detectors and the correlation engine work on. Non-finite values
//! are dropped here so nothing downstream has to guard against NaN.

use crate::catalog::BiomarkerCatalog;
use crate::types::{BiomarkerKind, BiomarkerReading, MoodAssessment, MoodMetric, SeriesKey};
use chrono::NaiveDate;
use std::collections::BTreeMap;

/// Values for one calendar day per series (UTC)
pub type DailySeries = BTreeMap<NaiveDate, f64>;

/// The `limit` most recent values of `kind`, newest first.
///
/// Readings sharing a timestamp keep their input order reversed, so the one
/// supplied last counts as the newest.
pub fn recent_biomarker_values(
    readings: &[BiomarkerReading],
    kind: &BiomarkerKind,
    limit: usize,
) -> Vec<f64> {
    let points = readings
        .iter()
        .filter(|r| &r.biomarker_type == kind)
        .map(|r| (r.timestamp, r.value));
    newest_first(points, limit)
}

/// The `limit` most recent values of `metric`, newest first.
///
/// Assessments without a value for `metric` are skipped.
pub fn recent_mood_values(moods: &[MoodAssessment], metric: MoodMetric, limit: usize) -> Vec<f64> {
    let points = moods
        .iter()
        .filter_map(|m| m.value(metric).map(|v| (m.timestamp, v)));
    newest_first(points, limit)
}

fn newest_first<T>(points: impl Iterator<Item = (T, f64)>, limit: usize) -> Vec<f64>
where
    T: Ord,
{
    let mut indexed: Vec<(T, usize, f64)> = points
        .filter(|(_, v)| v.is_finite())
        .enumerate()
        .map(|(i, (ts, v))| (ts, i, v))
        .collect();

    indexed.sort_by(|a, b| b.0.cmp(&a.0).then(b.1.cmp(&a.1)));
    indexed.into_iter().take(limit).map(|(_, _, v)| v).collect()
}

/// Biomarker kinds present in `readings`: catalog order first, then unknown
/// kinds in first-seen order
pub fn kinds_present(readings: &[BiomarkerReading], catalog: &BiomarkerCatalog) -> Vec<BiomarkerKind> {
    let mut kinds: Vec<BiomarkerKind> = catalog
        .kinds()
        .filter(|k| readings.iter().any(|r| &r.biomarker_type == *k))
        .cloned()
        .collect();

    for reading in readings {
        if !kinds.contains(&reading.biomarker_type) {
            kinds.push(reading.biomarker_type.clone());
        }
    }

    kinds
}

/// Collapse a series to one value per calendar day; the latest timestamp on a
/// day wins, ties resolved by input order
pub fn daily_series(
    key: &SeriesKey,
    readings: &[BiomarkerReading],
    moods: &[MoodAssessment],
) -> DailySeries {
    let mut points: Vec<(chrono::DateTime<chrono::Utc>, f64)> = match key {
        SeriesKey::Biomarker(kind) => readings
            .iter()
            .filter(|r| &r.biomarker_type == kind)
            .map(|r| (r.timestamp, r.value))
            .collect(),
        SeriesKey::Mood(metric) => moods
            .iter()
            .filter_map(|m| m.value(*metric).map(|v| (m.timestamp, v)))
            .collect(),
    };

    // Stable sort keeps input order among equal timestamps
    points.sort_by_key(|(ts, _)| *ts);

    let mut series = DailySeries::new();
    for (ts, value) in points {
        if value.is_finite() {
            series.insert(ts.date_naive(), value);
        }
    }
    series
}

/// Paired values for the days present in both series, in date order
pub fn align_daily(a: &DailySeries, b: &DailySeries) -> (Vec<f64>, Vec<f64>) {
    a.iter()
        .filter_map(|(day, &x)| b.get(day).map(|&y| (x, y)))
        .unzip()
}

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Number of non-finite values across every series in the inputs
pub fn count_non_finite(readings: &[BiomarkerReading], moods: &[MoodAssessment]) -> usize {
    let biomarker = readings.iter().filter(|r| !r.value.is_finite()).count();
    let mood = moods
        .iter()
        .flat_map(|m| MoodMetric::ALL.into_iter().filter_map(move |metric| m.value(metric)))
        .filter(|v| !v.is_finite())
        .count();
    biomarker + mood
}
