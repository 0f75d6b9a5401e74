//! Relapse risk aggregation
//!
//! Folds biomarker deviations and mood trends into one bounded 0-100 score,
//! and synthesizes the overview insight that heads the insight list.

use crate::catalog::{BiomarkerCatalog, NormalRange};
use crate::series::{kinds_present, mean, recent_biomarker_values, recent_mood_values};
use crate::types::{
    BiomarkerKind, BiomarkerReading, Insight, InsightType, MoodAssessment, MoodMetric, RiskLevel,
};
use serde::{Deserialize, Serialize};

/// Readings per biomarker considered
pub const RISK_BIOMARKER_WINDOW: usize = 7;
/// Mood points considered
pub const RISK_MOOD_WINDOW: usize = 7;
/// Minimum points per series before it contributes
pub const MIN_RISK_POINTS: usize = 3;

const MAX_DEVIATION_CONTRIBUTION: f64 = 30.0;
const RISING_TREND_THRESHOLD: f64 = 0.15;
const TREND_CONTRIBUTION: f64 = 15.0;
/// Average mood (1-10 scale) below which low mood adds risk
const LOW_MOOD_CEILING: f64 = 4.0;
const LOW_MOOD_WEIGHT: f64 = 10.0;
const MOOD_DROP_THRESHOLD: f64 = 1.0;

/// What produced a risk contribution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskFactorKind {
    OutOfRange,
    RisingTrend,
    LowMood,
    DecliningMood,
}

/// A single contribution to the relapse risk score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskFactor {
    /// Biomarker id or mood metric label
    pub source: String,
    pub kind: RiskFactorKind,
    pub contribution: f64,
}

/// Relapse risk score with its breakdown
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskAssessment {
    /// Score (0-100)
    pub score: u8,
    pub level: RiskLevel,
    pub factors: Vec<RiskFactor>,
}

impl RiskAssessment {
    fn from_factors(factors: Vec<RiskFactor>) -> Self {
        let score = if factors.is_empty() {
            0
        } else {
            let total: f64 = factors.iter().map(|f| f.contribution).sum();
            total.clamp(0.0, 100.0).round() as u8
        };

        Self {
            score,
            level: RiskLevel::from_score(score),
            factors,
        }
    }
}

/// Score relapse risk and keep the contributing factors
pub fn assess_relapse_risk(
    readings: &[BiomarkerReading],
    moods: &[MoodAssessment],
    catalog: &BiomarkerCatalog,
) -> RiskAssessment {
    let mut factors = Vec::new();

    for kind in kinds_present(readings, catalog) {
        let Some(definition) = catalog.get(&kind) else {
            continue;
        };
        let recent = recent_biomarker_values(readings, &kind, RISK_BIOMARKER_WINDOW);
        if recent.len() < MIN_RISK_POINTS {
            continue;
        }
        factors.extend(biomarker_factors(&kind, &recent, definition.normal_range));
    }

    let mood = recent_mood_values(moods, MoodMetric::MoodScore, RISK_MOOD_WINDOW);
    factors.extend(mood_factors(&mood));

    let assessment = RiskAssessment::from_factors(factors);
    tracing::debug!(
        score = assessment.score,
        factors = assessment.factors.len(),
        "Assessed relapse risk"
    );
    assessment
}

/// Relapse risk score (0-100); 0 when no risk factor applies
pub fn calculate_relapse_risk(
    readings: &[BiomarkerReading],
    moods: &[MoodAssessment],
    catalog: &BiomarkerCatalog,
) -> u8 {
    assess_relapse_risk(readings, moods, catalog).score
}

fn biomarker_factors(
    kind: &BiomarkerKind,
    recent: &[f64],
    range: NormalRange,
) -> Vec<RiskFactor> {
    let mut factors = Vec::new();
    let newest = recent[0];

    if !range.contains(newest) {
        let contribution =
            (range.deviation_fraction(newest) * MAX_DEVIATION_CONTRIBUTION).min(MAX_DEVIATION_CONTRIBUTION);
        factors.push(RiskFactor {
            source: kind.as_str().to_string(),
            kind: RiskFactorKind::OutOfRange,
            contribution,
        });
    }

    let third = recent[2];
    if third > 0.0 && (newest - third) / third > RISING_TREND_THRESHOLD {
        factors.push(RiskFactor {
            source: kind.as_str().to_string(),
            kind: RiskFactorKind::RisingTrend,
            contribution: TREND_CONTRIBUTION,
        });
    }

    factors
}

/// `recent` holds mood scores newest first
fn mood_factors(recent: &[f64]) -> Vec<RiskFactor> {
    let mut factors = Vec::new();
    if recent.len() < MIN_RISK_POINTS {
        return factors;
    }
    let source = MoodMetric::MoodScore.as_str().to_string();

    let average = mean(recent).unwrap_or(0.0);
    if average < LOW_MOOD_CEILING {
        factors.push(RiskFactor {
            source: source.clone(),
            kind: RiskFactorKind::LowMood,
            contribution: (LOW_MOOD_CEILING - average) * LOW_MOOD_WEIGHT,
        });
    }

    let newest = mean(&recent[..2]).unwrap_or(0.0);
    let oldest = mean(&recent[recent.len() - 2..]).unwrap_or(0.0);
    if oldest - newest > MOOD_DROP_THRESHOLD {
        factors.push(RiskFactor {
            source,
            kind: RiskFactorKind::DecliningMood,
            contribution: TREND_CONTRIBUTION,
        });
    }

    factors
}

/// Overview insight for a risk score, if the score warrants one.
///
/// `insights` are the pattern insights already detected; a low score is only
/// reported as stable when at least two of them are positive.
pub fn overview_insight(
    risk: u8,
    insights: &[Insight],
    catalog: &BiomarkerCatalog,
) -> Option<Insight> {
    if risk > 70 {
        return Some(
            Insight::new(
                InsightType::Critical,
                "High Relapse Risk Detected",
                format!(
                    "Your combined biomarker and mood data indicate a high relapse risk score of {}/100.",
                    risk
                ),
                88,
            )
            .involving(catalog.kinds().cloned())
            .recommending([
                "Contact your healthcare provider as soon as possible",
                "Review your relapse prevention plan",
                "Reach out to your support network",
                "Avoid known triggers and high-stress situations",
                "Increase the frequency of mood check-ins",
            ])
            .with_relapse_risk(risk),
        );
    }

    if risk > 40 {
        return Some(
            Insight::new(
                InsightType::Warning,
                "Moderate Relapse Risk",
                format!(
                    "Some of your recent data point to a moderate relapse risk score of {}/100.",
                    risk
                ),
                75,
            )
            .recommending([
                "Schedule a check-in with your care team",
                "Maintain regular sleep and meal times",
                "Practice stress-reduction techniques daily",
                "Keep tracking your mood and biomarkers",
            ])
            .with_relapse_risk(risk),
        );
    }

    let positives = insights
        .iter()
        .filter(|i| i.insight_type == InsightType::Positive)
        .count();
    if risk < 20 && positives >= 2 {
        return Some(
            Insight::new(
                InsightType::Positive,
                "Low Relapse Risk - Stable",
                format!(
                    "Your biomarkers and mood look stable, with a low relapse risk score of {}/100.",
                    risk
                ),
                82,
            )
            .recommending([
                "Continue your current treatment and routines",
                "Keep up regular monitoring",
                "Celebrate the progress you have made",
            ])
            .with_relapse_risk(risk),
        );
    }

    None
}
