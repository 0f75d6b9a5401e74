//! Pipeline orchestration
//!
//! This module provides the public API for Synheart Insight. It runs the
//! correlation engine, pattern detector and risk aggregator over the same
//! inputs and assembles their outputs into the shapes dashboards consume.

use crate::catalog::BiomarkerCatalog;
use crate::correlation::{
    correlation_results, find_significant_correlations, generate_correlation_matrix,
};
use crate::error::ComputeError;
use crate::patterns::PatternDetector;
use crate::risk::{assess_relapse_risk, overview_insight, RiskAssessment};
use crate::series::count_non_finite;
use crate::types::{
    AnalysisEnvelope, AnalysisInput, BiomarkerReading, CorrelationMatrix, CorrelationResult,
    DateRange, Insight, InsightReport, MoodAssessment, Producer,
};
use crate::{INSIGHT_VERSION, PRODUCER_NAME};
use chrono::Utc;

/// Generate the insight report for one subject using the given catalog.
///
/// Pipeline stages:
/// 1. Risk aggregation over biomarkers and mood
/// 2. Single-biomarker, cross-biomarker and mood-trend rules
/// 3. Overview insight derived from the risk score
/// 4. Severity sort (critical, warning, neutral, positive)
pub fn generate_insights(
    readings: &[BiomarkerReading],
    moods: &[MoodAssessment],
    catalog: &BiomarkerCatalog,
) -> InsightReport {
    build_report(readings, moods, catalog, &PatternDetector::new())
}

fn build_report(
    readings: &[BiomarkerReading],
    moods: &[MoodAssessment],
    catalog: &BiomarkerCatalog,
    detector: &PatternDetector,
) -> InsightReport {
    // Stage 1: Risk aggregation
    let risk = assess_relapse_risk(readings, moods, catalog);

    // Stage 2: Pattern rules
    let mut insights = detector.detect(readings, moods, catalog);

    // Stage 3: Overview insight
    if let Some(overview) = overview_insight(risk.score, &insights, catalog) {
        insights.push(overview);
    }

    // Stage 4: Severity sort
    sort_insights(&mut insights);

    tracing::debug!(
        insights = insights.len(),
        relapse_risk = risk.score,
        "Generated insight report"
    );

    InsightReport {
        insights,
        relapse_risk: risk.score,
    }
}

/// Sort insights by severity. The risk overview leads its severity group.
pub fn sort_insights(insights: &mut [Insight]) {
    insights.sort_by_key(|i| (i.insight_type.priority(), i.relapse_risk.is_none()));
}

/// Run the full analysis on a JSON [`AnalysisInput`] with the default catalog
/// and return the JSON insight report.
///
/// # Example
/// ```ignore
/// let report_json = analyze_json(input_json)?;
/// ```
pub fn analyze_json(input_json: String) -> Result<String, ComputeError> {
    InsightEngine::new().analyze_json(&input_json)
}

/// Build the correlation matrix for a JSON [`AnalysisInput`] with the default
/// catalog and return it as JSON.
pub fn correlate_json(input_json: String) -> Result<String, ComputeError> {
    InsightEngine::new().correlate_json(&input_json)
}

/// Score relapse risk for a JSON [`AnalysisInput`] with the default catalog
/// and return the JSON risk assessment.
pub fn relapse_risk_json(input_json: String) -> Result<String, ComputeError> {
    InsightEngine::new().relapse_risk_json(&input_json)
}

/// Parse an analysis request
pub fn parse_input(input_json: &str) -> Result<AnalysisInput, ComputeError> {
    let input: AnalysisInput = serde_json::from_str(input_json)
        .map_err(|e| ComputeError::ParseError(e.to_string()))?;

    let dropped = count_non_finite(&input.biomarkers, &input.moods);
    if dropped > 0 {
        tracing::warn!(dropped, "Ignoring non-finite values in analysis input");
    }
    Ok(input)
}

/// Wrap a result with producer metadata and computation time
pub fn envelope<T>(result: T) -> AnalysisEnvelope<T> {
    AnalysisEnvelope {
        producer: Producer {
            name: PRODUCER_NAME.to_string(),
            version: INSIGHT_VERSION.to_string(),
            instance_id: uuid::Uuid::new_v4().to_string(),
        },
        computed_at_utc: Utc::now(),
        result,
    }
}

/// Analytics engine bound to a biomarker catalog.
///
/// Holds configuration only; every call is a pure function of its arguments
/// and the catalog, so one engine can serve any number of subjects.
pub struct InsightEngine {
    catalog: BiomarkerCatalog,
    detector: PatternDetector,
}

impl Default for InsightEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl InsightEngine {
    /// Create an engine with the built-in biomarker catalog
    pub fn new() -> Self {
        Self::with_catalog(BiomarkerCatalog::default())
    }

    /// Create an engine with a specific catalog
    pub fn with_catalog(catalog: BiomarkerCatalog) -> Self {
        Self::with_detector(catalog, PatternDetector::new())
    }

    /// Create an engine with a specific catalog and rule set
    pub fn with_detector(catalog: BiomarkerCatalog, detector: PatternDetector) -> Self {
        Self { catalog, detector }
    }

    pub fn catalog(&self) -> &BiomarkerCatalog {
        &self.catalog
    }

    /// Replace the catalog from JSON
    pub fn load_catalog(&mut self, json: &str) -> Result<(), ComputeError> {
        self.catalog = BiomarkerCatalog::from_json(json)?;
        Ok(())
    }

    /// Save the catalog to JSON
    pub fn save_catalog(&self) -> Result<String, ComputeError> {
        self.catalog
            .to_json()
            .map_err(|e| ComputeError::EncodingError(e.to_string()))
    }

    /// Insights plus relapse risk, sorted by severity
    pub fn generate_insights(
        &self,
        readings: &[BiomarkerReading],
        moods: &[MoodAssessment],
    ) -> InsightReport {
        build_report(readings, moods, &self.catalog, &self.detector)
    }

    /// Relapse risk score (0-100)
    pub fn calculate_relapse_risk(
        &self,
        readings: &[BiomarkerReading],
        moods: &[MoodAssessment],
    ) -> u8 {
        self.assess_relapse_risk(readings, moods).score
    }

    /// Relapse risk with contributing factors
    pub fn assess_relapse_risk(
        &self,
        readings: &[BiomarkerReading],
        moods: &[MoodAssessment],
    ) -> RiskAssessment {
        assess_relapse_risk(readings, moods, &self.catalog)
    }

    /// Correlation matrix over all biomarker and mood series.
    ///
    /// When `date_range` is `None` the range covering the inputs is reported.
    pub fn correlation_matrix(
        &self,
        readings: &[BiomarkerReading],
        moods: &[MoodAssessment],
        date_range: Option<DateRange>,
    ) -> CorrelationMatrix {
        let date_range = date_range.or_else(|| DateRange::covering(readings, moods));
        generate_correlation_matrix(readings, moods, date_range, &self.catalog)
    }

    /// Biomarker × mood correlation results
    pub fn correlations(
        &self,
        readings: &[BiomarkerReading],
        moods: &[MoodAssessment],
    ) -> Vec<CorrelationResult> {
        correlation_results(readings, moods, &self.catalog)
    }

    /// Significant biomarker × mood correlations, strongest first
    pub fn significant_correlations(
        &self,
        readings: &[BiomarkerReading],
        moods: &[MoodAssessment],
        significance_level: f64,
    ) -> Vec<CorrelationResult> {
        let results = self.correlations(readings, moods);
        find_significant_correlations(&results, significance_level)
    }

    /// JSON in, JSON insight report out
    pub fn analyze_json(&self, input_json: &str) -> Result<String, ComputeError> {
        let input = parse_input(input_json)?;
        let report = self.generate_insights(&input.biomarkers, &input.moods);
        Ok(serde_json::to_string(&report)?)
    }

    /// JSON in, JSON correlation matrix out
    pub fn correlate_json(&self, input_json: &str) -> Result<String, ComputeError> {
        let input = parse_input(input_json)?;
        let matrix = self.correlation_matrix(&input.biomarkers, &input.moods, input.date_range);
        Ok(serde_json::to_string(&matrix)?)
    }

    /// JSON in, JSON risk assessment out
    pub fn relapse_risk_json(&self, input_json: &str) -> Result<String, ComputeError> {
        let input = parse_input(input_json)?;
        let assessment = self.assess_relapse_risk(&input.biomarkers, &input.moods);
        Ok(serde_json::to_string(&assessment)?)
    }
}
