//! Correlation engine
//!
//! Pearson correlation between numeric series, an approximate p-value, and the
//! biomarker × mood correlation matrix the dashboards render.
//!
//! Every function here is total: empty inputs, zero variance and short series
//! resolve to a coefficient of 0 and a p-value of 1 rather than an error.

use crate::catalog::BiomarkerCatalog;
use crate::series::{align_daily, daily_series, kinds_present, DailySeries};
use crate::types::{
    BiomarkerReading, CorrelationDirection, CorrelationMatrix, CorrelationResult,
    CorrelationStrength, DateRange, MatrixMetadata, MoodAssessment, MoodMetric, SeriesKey,
};

/// |r| at or above this is a strong correlation
pub const STRONG_THRESHOLD: f64 = 0.7;
/// |r| at or above this is a moderate correlation
pub const MODERATE_THRESHOLD: f64 = 0.4;
/// |r| at or above this is a weak correlation
pub const WEAK_THRESHOLD: f64 = 0.2;
/// r beyond ±this has a direction
pub const DIRECTION_THRESHOLD: f64 = 0.1;

/// Default significance level for [`find_significant_correlations`]
pub const DEFAULT_SIGNIFICANCE_LEVEL: f64 = 0.05;
/// Significant correlations must also exceed this |r|
pub const MIN_SIGNIFICANT_COEFFICIENT: f64 = 0.2;
/// Paired days required before a matrix entry is computed
pub const MIN_PAIRED_SAMPLES: usize = 3;

/// Relative tolerance for treating a series as having no variance
const VARIANCE_EPSILON: f64 = 1e-20;

/// Calculate the Pearson correlation coefficient.
///
/// Inputs of different length are truncated positionally to the shorter one.
/// Returns 0 for empty input or when either series has no variance.
pub fn pearson(x: &[f64], y: &[f64]) -> f64 {
    let n = x.len().min(y.len());
    if n == 0 {
        return 0.0;
    }
    let (x, y) = (&x[..n], &y[..n]);
    let nf = n as f64;

    let mean_x = x.iter().sum::<f64>() / nf;
    let mean_y = y.iter().sum::<f64>() / nf;

    // Centred sums; the raw-sum form leaves rounding residue on flat series
    let sxy: f64 = x.iter().zip(y).map(|(a, b)| (a - mean_x) * (b - mean_y)).sum();
    let sxx: f64 = x.iter().map(|a| (a - mean_x).powi(2)).sum();
    let syy: f64 = y.iter().map(|b| (b - mean_y).powi(2)).sum();

    if !(sxx > variance_floor(n, mean_x)) || !(syy > variance_floor(n, mean_y)) {
        return 0.0;
    }

    let r = sxy / (sxx * syy).sqrt();
    if r.is_finite() {
        r.clamp(-1.0, 1.0)
    } else {
        0.0
    }
}

/// Sum of squared deviations at or below which a series counts as flat
fn variance_floor(n: usize, mean: f64) -> f64 {
    VARIANCE_EPSILON * n as f64 * mean.powi(2).max(1.0)
}

/// Approximate two-tailed p-value for a coefficient `r` over `n` samples.
///
/// Uses `t = r·sqrt((n-2)/(1-r²))` against a normal approximation of the
/// t-distribution. Returns 1 when `n < 3`.
pub fn p_value(r: f64, n: usize) -> f64 {
    if n < 3 || !r.is_finite() {
        return 1.0;
    }

    let r2 = r * r;
    if r2 >= 1.0 {
        return 0.0;
    }

    let t = r * ((n as f64 - 2.0) / (1.0 - r2)).sqrt();
    let p = 2.0 * (1.0 - normal_cdf(t.abs()));
    p.clamp(0.0, 1.0)
}

/// Standard normal CDF
fn normal_cdf(z: f64) -> f64 {
    0.5 * (1.0 + erf(z / std::f64::consts::SQRT_2))
}

/// Error function, Abramowitz & Stegun 7.1.26 (|error| < 1.5e-7)
fn erf(x: f64) -> f64 {
    const A1: f64 = 0.254_829_592;
    const A2: f64 = -0.284_496_736;
    const A3: f64 = 1.421_413_741;
    const A4: f64 = -1.453_152_027;
    const A5: f64 = 1.061_405_429;
    const P: f64 = 0.327_591_1;

    let sign = if x < 0.0 { -1.0 } else { 1.0 };
    let x = x.abs();
    let t = 1.0 / (1.0 + P * x);
    let poly = ((((A5 * t + A4) * t + A3) * t + A2) * t + A1) * t;
    sign * (1.0 - poly * (-x * x).exp())
}

/// Strength bucket for a coefficient
pub fn classify_strength(r: f64) -> CorrelationStrength {
    let abs_r = r.abs();
    if abs_r >= STRONG_THRESHOLD {
        CorrelationStrength::Strong
    } else if abs_r >= MODERATE_THRESHOLD {
        CorrelationStrength::Moderate
    } else if abs_r >= WEAK_THRESHOLD {
        CorrelationStrength::Weak
    } else {
        CorrelationStrength::None
    }
}

/// Direction of a coefficient
pub fn classify_direction(r: f64) -> CorrelationDirection {
    if r > DIRECTION_THRESHOLD {
        CorrelationDirection::Positive
    } else if r < -DIRECTION_THRESHOLD {
        CorrelationDirection::Negative
    } else {
        CorrelationDirection::None
    }
}

/// Correlate two series and classify the result.
///
/// The series are truncated positionally to their common length; `sample_size`
/// reports that length.
pub fn calculate_biomarker_mood_correlation(
    series_a: &[f64],
    series_b: &[f64],
    label_a: &str,
    label_b: &str,
) -> CorrelationResult {
    let sample_size = series_a.len().min(series_b.len());
    let coefficient = pearson(series_a, series_b);

    CorrelationResult {
        series_a: label_a.to_string(),
        series_b: label_b.to_string(),
        coefficient,
        p_value: p_value(coefficient, sample_size),
        sample_size,
        strength: classify_strength(coefficient),
        direction: classify_direction(coefficient),
    }
}

fn series_keys(readings: &[BiomarkerReading], catalog: &BiomarkerCatalog) -> Vec<SeriesKey> {
    kinds_present(readings, catalog)
        .into_iter()
        .map(SeriesKey::Biomarker)
        .chain(MoodMetric::ALL.into_iter().map(SeriesKey::Mood))
        .collect()
}

/// Build the correlation matrix over every biomarker kind present and the three
/// mood metrics.
///
/// Series are aligned by calendar day. Each unordered pair is computed once and
/// mirrored, so the matrix is symmetric with a diagonal of 1. Pairs with fewer
/// than three shared days stay at 0.
pub fn generate_correlation_matrix(
    readings: &[BiomarkerReading],
    moods: &[MoodAssessment],
    date_range: Option<DateRange>,
    catalog: &BiomarkerCatalog,
) -> CorrelationMatrix {
    let keys = series_keys(readings, catalog);
    let daily: Vec<DailySeries> = keys
        .iter()
        .map(|key| daily_series(key, readings, moods))
        .collect();

    let size = keys.len();
    let mut data = vec![vec![0.0; size]; size];

    for i in 0..size {
        data[i][i] = 1.0;
        for j in (i + 1)..size {
            let (x, y) = align_daily(&daily[i], &daily[j]);
            if x.len() >= MIN_PAIRED_SAMPLES {
                let r = pearson(&x, &y);
                data[i][j] = r;
                data[j][i] = r;
            }
        }
    }

    let labels: Vec<String> = keys.iter().map(|k| k.label().to_string()).collect();
    let biomarkers = keys
        .iter()
        .filter_map(|k| match k {
            SeriesKey::Biomarker(kind) => Some(kind.as_str().to_string()),
            SeriesKey::Mood(_) => None,
        })
        .collect();

    tracing::debug!(
        series = size,
        readings = readings.len(),
        assessments = moods.len(),
        "Built correlation matrix"
    );

    CorrelationMatrix {
        labels,
        data,
        metadata: MatrixMetadata {
            biomarkers,
            mood_metrics: MoodMetric::ALL.iter().map(|m| m.as_str().to_string()).collect(),
            sample_size: readings.len().min(moods.len()),
            date_range,
        },
    }
}

/// Correlation results for every biomarker × mood metric pair with at least
/// three shared days
pub fn correlation_results(
    readings: &[BiomarkerReading],
    moods: &[MoodAssessment],
    catalog: &BiomarkerCatalog,
) -> Vec<CorrelationResult> {
    let mood_series: Vec<(MoodMetric, DailySeries)> = MoodMetric::ALL
        .into_iter()
        .map(|metric| (metric, daily_series(&SeriesKey::Mood(metric), readings, moods)))
        .collect();

    let mut results = Vec::new();
    for kind in kinds_present(readings, catalog) {
        let biomarker_series = daily_series(&SeriesKey::Biomarker(kind.clone()), readings, moods);

        for (metric, series) in &mood_series {
            let (x, y) = align_daily(&biomarker_series, series);
            if x.len() < MIN_PAIRED_SAMPLES {
                continue;
            }
            results.push(calculate_biomarker_mood_correlation(
                &x,
                &y,
                kind.as_str(),
                metric.as_str(),
            ));
        }
    }

    results
}

/// Keep results with `p_value < significance_level` and `|r| > 0.2`, strongest
/// first
pub fn find_significant_correlations(
    results: &[CorrelationResult],
    significance_level: f64,
) -> Vec<CorrelationResult> {
    let mut significant: Vec<CorrelationResult> = results
        .iter()
        .filter(|r| {
            r.p_value < significance_level && r.coefficient.abs() > MIN_SIGNIFICANT_COEFFICIENT
        })
        .cloned()
        .collect();

    significant.sort_by(|a, b| b.coefficient.abs().total_cmp(&a.coefficient.abs()));
    significant
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BiomarkerKind, MoodAssessment};
    use chrono::{Duration, TimeZone, Utc};
    use pretty_assertions::assert_eq;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_pearson_identical_series() {
        let x = vec![2.5, 3.1, 7.8, 1.2, 9.4, 4.4];
        assert!(approx(pearson(&x, &x), 1.0));
    }

    #[test]
    fn test_pearson_negated_series() {
        let x = vec![2.5, 3.1, 7.8, 1.2, 9.4, 4.4];
        let neg: Vec<f64> = x.iter().map(|v| -v).collect();
        let result = calculate_biomarker_mood_correlation(&x, &neg, "a", "b");

        assert!(approx(result.coefficient, -1.0));
        assert_eq!(result.direction, CorrelationDirection::Negative);
    }

    #[test]
    fn test_pearson_empty() {
        let result = calculate_biomarker_mood_correlation(&[], &[], "a", "b");
        assert_eq!(result.coefficient, 0.0);
        assert_eq!(result.sample_size, 0);
        assert_eq!(result.p_value, 1.0);
    }

    #[test]
    fn test_pearson_zero_variance() {
        let x = vec![4.0, 4.0, 4.0, 4.0];
        let y = vec![1.0, 2.0, 3.0, 4.0];
        assert_eq!(pearson(&x, &y), 0.0);
    }

    #[test]
    fn test_pearson_flat_fractional_series() {
        for value in [0.1, 0.3, 0.7, 1.1, 7.3, 98.6] {
            for n in 3..15 {
                let flat = vec![value; n];
                let other = vec![0.1 + value; n];
                let result = calculate_biomarker_mood_correlation(&flat, &other, "a", "b");

                assert_eq!(result.coefficient, 0.0, "value {} n {}", value, n);
                assert_eq!(result.strength, CorrelationStrength::None);
                assert!((result.p_value - 1.0).abs() < 1e-6);
            }
        }

        let flat = vec![1.1; 6];
        let varying = vec![1.0, 4.0, 2.0, 8.0, 5.0, 7.0];
        assert_eq!(pearson(&flat, &varying), 0.0);
        assert_eq!(pearson(&varying, &flat), 0.0);
    }

    #[test]
    fn test_flat_series_not_significant_in_matrix() {
        let readings: Vec<BiomarkerReading> = (0..7)
            .map(|n| BiomarkerReading::new(BiomarkerKind::Crp, 1.1, day(n)))
            .collect();
        let moods: Vec<MoodAssessment> = (0..7)
            .map(|n| MoodAssessment {
                mood_score: Some(7.3),
                timestamp: day(n) + Duration::hours(12),
                ..Default::default()
            })
            .collect();
        let catalog = BiomarkerCatalog::default();

        let matrix = generate_correlation_matrix(&readings, &moods, None, &catalog);
        assert_eq!(matrix.get("crp", "moodScore"), Some(0.0));

        let results = correlation_results(&readings, &moods, &catalog);
        assert!(find_significant_correlations(&results, DEFAULT_SIGNIFICANCE_LEVEL).is_empty());
    }

    #[test]
    fn test_pearson_non_finite_input() {
        let x = vec![1.0, f64::NAN, 3.0];
        let y = vec![1.0, 2.0, 3.0];
        assert_eq!(pearson(&x, &y), 0.0);
    }

    #[test]
    fn test_mismatched_lengths_truncate() {
        let x = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0];
        let y = vec![2.0, 4.0, 6.0, 8.0];
        let result = calculate_biomarker_mood_correlation(&x, &y, "a", "b");

        assert_eq!(result.sample_size, 4);
        assert!(approx(result.coefficient, 1.0));
    }

    #[test]
    fn test_perfect_positive_scenario() {
        let x = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        let y = vec![10.0, 20.0, 30.0, 40.0, 50.0];
        let result = calculate_biomarker_mood_correlation(&x, &y, "crp", "moodScore");

        assert!(approx(result.coefficient, 1.0));
        assert_eq!(result.strength, CorrelationStrength::Strong);
        assert_eq!(result.direction, CorrelationDirection::Positive);
        assert!(result.p_value < 0.05);
    }

    #[test]
    fn test_perfect_negative_scenario() {
        let x = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        let y = vec![50.0, 40.0, 30.0, 20.0, 10.0];
        let result = calculate_biomarker_mood_correlation(&x, &y, "crp", "moodScore");

        assert!(approx(result.coefficient, -1.0));
        assert_eq!(result.direction, CorrelationDirection::Negative);
    }

    #[test]
    fn test_coefficient_and_p_value_bounds() {
        let series = [
            (vec![1.0, 5.0, 2.0, 8.0, 3.0], vec![9.0, 1.0, 4.0, 2.0, 7.0]),
            (vec![1e12, 1e12 + 1.0, 1e12 + 2.0], vec![3.0, 2.0, 1.0]),
            (vec![0.1, 0.2], vec![0.3, 0.1]),
            (vec![1.0, 2.0, 3.0, 4.0], vec![1.0, 1.0, 2.0, 2.0]),
        ];

        for (x, y) in &series {
            let result = calculate_biomarker_mood_correlation(x, y, "a", "b");
            assert!((-1.0..=1.0).contains(&result.coefficient));
            assert!((0.0..=1.0).contains(&result.p_value));
        }
    }

    #[test]
    fn test_p_value_small_samples() {
        assert_eq!(p_value(0.99, 0), 1.0);
        assert_eq!(p_value(0.99, 2), 1.0);
        assert!(p_value(0.99, 3) < 1.0);
    }

    #[test]
    fn test_p_value_decreases_with_sample_size() {
        let small = p_value(0.5, 10);
        let large = p_value(0.5, 100);
        assert!(large < small);
        // r = 0 is never significant
        assert!((p_value(0.0, 50) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_classification_thresholds() {
        assert_eq!(classify_strength(0.7), CorrelationStrength::Strong);
        assert_eq!(classify_strength(-0.69), CorrelationStrength::Moderate);
        assert_eq!(classify_strength(0.4), CorrelationStrength::Moderate);
        assert_eq!(classify_strength(0.2), CorrelationStrength::Weak);
        assert_eq!(classify_strength(0.19), CorrelationStrength::None);

        assert_eq!(classify_direction(0.11), CorrelationDirection::Positive);
        assert_eq!(classify_direction(0.1), CorrelationDirection::None);
        assert_eq!(classify_direction(-0.1), CorrelationDirection::None);
        assert_eq!(classify_direction(-0.11), CorrelationDirection::Negative);
    }

    fn result(label: &str, coefficient: f64, p_value: f64) -> CorrelationResult {
        CorrelationResult {
            series_a: label.to_string(),
            series_b: "moodScore".to_string(),
            coefficient,
            p_value,
            sample_size: 10,
            strength: classify_strength(coefficient),
            direction: classify_direction(coefficient),
        }
    }

    #[test]
    fn test_find_significant_correlations() {
        let results = vec![
            result("weak_but_significant", 0.15, 0.001),
            result("moderate", 0.5, 0.01),
            result("not_significant", 0.9, 0.2),
            result("strong_negative", -0.8, 0.001),
            result("boundary_p", 0.6, 0.05),
            result("boundary_r", 0.2, 0.001),
        ];

        let significant = find_significant_correlations(&results, DEFAULT_SIGNIFICANCE_LEVEL);
        let labels: Vec<&str> = significant.iter().map(|r| r.series_a.as_str()).collect();
        assert_eq!(labels, vec!["strong_negative", "moderate"]);

        for r in &significant {
            assert!(r.coefficient.abs() > 0.2);
            assert!(r.p_value < DEFAULT_SIGNIFICANCE_LEVEL);
        }
    }

    fn day(n: i64) -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 8, 0, 0).unwrap() + Duration::days(n)
    }

    fn correlated_inputs() -> (Vec<BiomarkerReading>, Vec<MoodAssessment>) {
        let mut readings = Vec::new();
        let mut moods = Vec::new();

        for n in 0..10 {
            let crp = 1.0 + n as f64 * 0.3;
            readings.push(BiomarkerReading::new(BiomarkerKind::Crp, crp, day(n)));
            // Glucose only every other day
            if n % 2 == 0 {
                readings.push(BiomarkerReading::new(
                    BiomarkerKind::Glucose,
                    85.0 + (n % 3) as f64,
                    day(n),
                ));
            }
            // Assessment later in the same calendar day
            moods.push(MoodAssessment {
                mood_score: Some(8.0 - n as f64 * 0.5),
                anxiety_score: Some(2.0 + n as f64 * 0.4),
                stress_score: if n < 2 { Some(5.0) } else { None },
                timestamp: day(n) + Duration::hours(10),
            });
        }

        (readings, moods)
    }

    #[test]
    fn test_matrix_diagonal_and_symmetry() {
        let (readings, moods) = correlated_inputs();
        let catalog = BiomarkerCatalog::default();
        let matrix = generate_correlation_matrix(&readings, &moods, None, &catalog);

        assert_eq!(
            matrix.labels,
            vec!["crp", "glucose", "moodScore", "anxietyScore", "stressScore"]
        );
        for i in 0..matrix.labels.len() {
            assert_eq!(matrix.data[i][i], 1.0);
            for j in 0..matrix.labels.len() {
                assert_eq!(matrix.data[i][j], matrix.data[j][i]);
            }
        }
    }

    #[test]
    fn test_matrix_day_alignment() {
        let (readings, moods) = correlated_inputs();
        let catalog = BiomarkerCatalog::default();
        let matrix = generate_correlation_matrix(&readings, &moods, None, &catalog);

        // CRP rises while mood falls on the same calendar days
        let crp_mood = matrix.get("crp", "moodScore").unwrap();
        assert!(approx(crp_mood, -1.0));

        let crp_anxiety = matrix.get("crp", "anxietyScore").unwrap();
        assert!(approx(crp_anxiety, 1.0));

        // Only two stress scores: not enough paired days
        assert_eq!(matrix.get("crp", "stressScore"), Some(0.0));
    }

    #[test]
    fn test_matrix_metadata() {
        let (readings, moods) = correlated_inputs();
        let catalog = BiomarkerCatalog::default();
        let range = DateRange::covering(&readings, &moods);
        let matrix = generate_correlation_matrix(&readings, &moods, range, &catalog);

        assert_eq!(matrix.metadata.biomarkers, vec!["crp", "glucose"]);
        assert_eq!(
            matrix.metadata.mood_metrics,
            vec!["moodScore", "anxietyScore", "stressScore"]
        );
        assert_eq!(matrix.metadata.sample_size, 10);
        assert_eq!(matrix.metadata.date_range, range);

        let json = serde_json::to_value(&matrix).unwrap();
        assert!(json["metadata"]["moodMetrics"].is_array());
        assert!(json["metadata"]["sampleSize"].is_number());
    }

    #[test]
    fn test_matrix_empty_inputs() {
        let catalog = BiomarkerCatalog::default();
        let matrix = generate_correlation_matrix(&[], &[], None, &catalog);

        assert_eq!(matrix.labels.len(), 3);
        for i in 0..3 {
            for j in 0..3 {
                let expected = if i == j { 1.0 } else { 0.0 };
                assert_eq!(matrix.data[i][j], expected);
            }
        }
    }

    #[test]
    fn test_correlation_results_pairs() {
        let (readings, moods) = correlated_inputs();
        let catalog = BiomarkerCatalog::default();
        let results = correlation_results(&readings, &moods, &catalog);

        // crp × (mood, anxiety) and glucose × (mood, anxiety); stress lacks samples
        assert_eq!(results.len(), 4);
        assert!(results.iter().all(|r| r.series_b != "stressScore"));

        let significant = find_significant_correlations(&results, DEFAULT_SIGNIFICANCE_LEVEL);
        assert!(significant
            .iter()
            .any(|r| r.series_a == "crp" && r.series_b == "moodScore"));
    }
}
