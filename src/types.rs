//! Core types for the Synheart Insight engine
//!
//! This module defines the records that flow into the engine (biomarker readings
//! and mood assessments) and the derived values that flow out of it (correlation
//! results, the correlation matrix, insights and the relapse risk report).
//!
//! Every output type serializes to the camelCase shape the dashboards consume.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Biomarker kind identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BiomarkerKind {
    /// C-reactive protein
    Crp,
    /// Interleukin-6
    Il6,
    /// Tumor necrosis factor alpha
    TnfAlpha,
    Cortisol,
    Glucose,
    /// Kinds defined by a custom catalog
    #[serde(untagged)]
    Other(String),
}

impl BiomarkerKind {
    /// The five built-in kinds, in catalog order
    pub fn known() -> [BiomarkerKind; 5] {
        [
            BiomarkerKind::Crp,
            BiomarkerKind::Il6,
            BiomarkerKind::TnfAlpha,
            BiomarkerKind::Cortisol,
            BiomarkerKind::Glucose,
        ]
    }

    pub fn as_str(&self) -> &str {
        match self {
            BiomarkerKind::Crp => "crp",
            BiomarkerKind::Il6 => "il6",
            BiomarkerKind::TnfAlpha => "tnf_alpha",
            BiomarkerKind::Cortisol => "cortisol",
            BiomarkerKind::Glucose => "glucose",
            BiomarkerKind::Other(name) => name.as_str(),
        }
    }
}

impl std::fmt::Display for BiomarkerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Mood assessment metric
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MoodMetric {
    MoodScore,
    AnxietyScore,
    StressScore,
}

impl MoodMetric {
    /// All mood metrics, in matrix label order
    pub const ALL: [MoodMetric; 3] = [
        MoodMetric::MoodScore,
        MoodMetric::AnxietyScore,
        MoodMetric::StressScore,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MoodMetric::MoodScore => "moodScore",
            MoodMetric::AnxietyScore => "anxietyScore",
            MoodMetric::StressScore => "stressScore",
        }
    }
}

/// A single series the correlation engine can extract from the inputs
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SeriesKey {
    Biomarker(BiomarkerKind),
    Mood(MoodMetric),
}

impl SeriesKey {
    /// Label used in the correlation matrix and correlation results
    pub fn label(&self) -> &str {
        match self {
            SeriesKey::Biomarker(kind) => kind.as_str(),
            SeriesKey::Mood(metric) => metric.as_str(),
        }
    }
}

/// A single biomarker measurement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BiomarkerReading {
    pub biomarker_type: BiomarkerKind,
    pub value: f64,
    pub timestamp: DateTime<Utc>,
}

impl BiomarkerReading {
    pub fn new(biomarker_type: BiomarkerKind, value: f64, timestamp: DateTime<Utc>) -> Self {
        Self {
            biomarker_type,
            value,
            timestamp,
        }
    }
}

/// A mood/assessment record. Each score is independently optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoodAssessment {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mood_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anxiety_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stress_score: Option<f64>,
    pub timestamp: DateTime<Utc>,
}

impl MoodAssessment {
    /// Value recorded for `metric`, if any
    pub fn value(&self, metric: MoodMetric) -> Option<f64> {
        match metric {
            MoodMetric::MoodScore => self.mood_score,
            MoodMetric::AnxietyScore => self.anxiety_score,
            MoodMetric::StressScore => self.stress_score,
        }
    }
}

/// Inclusive date window the inputs were fetched for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DateRange {
    /// Smallest range covering every timestamp in the inputs
    pub fn covering(readings: &[BiomarkerReading], moods: &[MoodAssessment]) -> Option<Self> {
        let timestamps = readings
            .iter()
            .map(|r| r.timestamp)
            .chain(moods.iter().map(|m| m.timestamp));

        timestamps.fold(None, |range: Option<DateRange>, ts| match range {
            None => Some(DateRange { start: ts, end: ts }),
            Some(r) => Some(DateRange {
                start: r.start.min(ts),
                end: r.end.max(ts),
            }),
        })
    }
}

/// Analysis request: the series for one subject and date window
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisInput {
    #[serde(default)]
    pub biomarkers: Vec<BiomarkerReading>,
    #[serde(default)]
    pub moods: Vec<MoodAssessment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_range: Option<DateRange>,
}

/// Correlation strength bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CorrelationStrength {
    Strong,
    Moderate,
    Weak,
    None,
}

/// Correlation direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CorrelationDirection {
    Positive,
    Negative,
    None,
}

/// Pearson correlation between two labelled series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CorrelationResult {
    pub series_a: String,
    pub series_b: String,
    /// Pearson coefficient (-1 to 1)
    pub coefficient: f64,
    /// Approximate two-tailed p-value (0 to 1)
    pub p_value: f64,
    /// Number of paired samples used
    pub sample_size: usize,
    pub strength: CorrelationStrength,
    pub direction: CorrelationDirection,
}

/// Metadata attached to a correlation matrix
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatrixMetadata {
    pub biomarkers: Vec<String>,
    pub mood_metrics: Vec<String>,
    pub sample_size: usize,
    pub date_range: Option<DateRange>,
}

/// Square matrix of Pearson coefficients over biomarker and mood series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationMatrix {
    /// Biomarker labels first, then mood metric labels
    pub labels: Vec<String>,
    pub data: Vec<Vec<f64>>,
    pub metadata: MatrixMetadata,
}

impl CorrelationMatrix {
    /// Coefficient between two labels, if both are present
    pub fn get(&self, a: &str, b: &str) -> Option<f64> {
        let i = self.labels.iter().position(|l| l == a)?;
        let j = self.labels.iter().position(|l| l == b)?;
        self.data.get(i)?.get(j).copied()
    }
}

/// Severity of an insight
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InsightType {
    Critical,
    Warning,
    Neutral,
    Positive,
}

impl InsightType {
    /// Sort priority (lower sorts first)
    pub fn priority(&self) -> u8 {
        match self {
            InsightType::Critical => 0,
            InsightType::Warning => 1,
            InsightType::Neutral => 2,
            InsightType::Positive => 3,
        }
    }
}

/// A human-readable finding with recommended actions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Insight {
    #[serde(rename = "type")]
    pub insight_type: InsightType,
    pub title: String,
    pub description: String,
    /// Confidence (0-100)
    pub confidence: u8,
    pub biomarkers_involved: Vec<BiomarkerKind>,
    pub recommendations: Vec<String>,
    /// Set only on the synthesized relapse-risk overview
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relapse_risk: Option<u8>,
}

impl Insight {
    pub fn new(
        insight_type: InsightType,
        title: impl Into<String>,
        description: impl Into<String>,
        confidence: u8,
    ) -> Self {
        Self {
            insight_type,
            title: title.into(),
            description: description.into(),
            confidence: confidence.min(100),
            biomarkers_involved: Vec::new(),
            recommendations: Vec::new(),
            relapse_risk: None,
        }
    }

    pub fn involving(mut self, kinds: impl IntoIterator<Item = BiomarkerKind>) -> Self {
        self.biomarkers_involved.extend(kinds);
        self
    }

    pub fn recommending<I, S>(mut self, recommendations: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.recommendations
            .extend(recommendations.into_iter().map(Into::into));
        self
    }

    pub fn with_relapse_risk(mut self, risk: u8) -> Self {
        self.relapse_risk = Some(risk);
        self
    }
}

/// Insight list plus the aggregate relapse risk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsightReport {
    pub insights: Vec<Insight>,
    pub relapse_risk: u8,
}

/// Relapse risk bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    /// Bucket a 0-100 score: low < 40, medium 40-69, high >= 70
    pub fn from_score(score: u8) -> Self {
        match score {
            0..=39 => RiskLevel::Low,
            40..=69 => RiskLevel::Medium,
            _ => RiskLevel::High,
        }
    }
}

/// Producer metadata for enveloped output
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Producer {
    pub name: String,
    pub version: String,
    pub instance_id: String,
}

/// Engine output wrapped with provenance
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisEnvelope<T> {
    pub producer: Producer,
    pub computed_at_utc: DateTime<Utc>,
    pub result: T,
}
