//! Synheart Insight - On-device analytics engine for biomarker and mood histories
//!
//! Insight turns lab biomarker readings and self-reported mood check-ins into
//! ranked, human-readable findings through a deterministic pipeline:
//! per-biomarker patterns → cross-biomarker rules → mood trends → relapse risk
//! → prioritized report.
//!
//! ## Modules
//!
//! - **Correlation Engine**: Pearson correlation between biomarker and mood series,
//!   aligned by calendar day, with significance testing and a labelled matrix
//! - **Pattern Detector**: Rule objects over the biomarker catalog and mood windows
//! - **Risk Aggregator**: Bounded 0-100 relapse risk score and overview insight

pub mod catalog;
pub mod correlation;
pub mod error;
pub mod patterns;
pub mod pipeline;
pub mod risk;
pub mod series;
pub mod types;

#[cfg(feature = "sample")]
pub mod sample;

// FFI bindings for C interop (always available for cdylib/staticlib builds)
pub mod ffi;

pub use catalog::{BiomarkerCatalog, BiomarkerDefinition, CrossBiomarkerRule, NormalRange};
pub use correlation::{
    calculate_biomarker_mood_correlation, find_significant_correlations,
    generate_correlation_matrix,
};
pub use error::ComputeError;
pub use patterns::PatternDetector;
pub use pipeline::{analyze_json, correlate_json, generate_insights, relapse_risk_json, InsightEngine};
pub use risk::{calculate_relapse_risk, RiskAssessment};

pub use types::{
    AnalysisInput, BiomarkerKind, BiomarkerReading, CorrelationMatrix, CorrelationResult,
    Insight, InsightReport, InsightType, MoodAssessment, MoodMetric, RiskLevel,
};

/// Insight version embedded in every result envelope
pub const INSIGHT_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name for result envelopes
pub const PRODUCER_NAME: &str = "synheart-insight";
