//! Sample data generation
//!
//! Seeded generator for synthetic biomarker and mood histories. Used by the CLI
//! `sample` command and for exercising the engine end to end; it is not part of
//! the analytics themselves.

use crate::catalog::BiomarkerCatalog;
use crate::types::{AnalysisInput, BiomarkerKind, BiomarkerReading, DateRange, MoodAssessment};
use chrono::{DateTime, Duration, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Noise amplitude as a fraction of each biomarker's range width
const BIOMARKER_NOISE: f64 = 0.02;
/// Peak inflammatory value as a multiple of the range maximum
const INFLAMED_PEAK: f64 = 1.6;
const MOOD_NOISE: f64 = 0.5;
/// Probability that an optional mood metric is recorded
const OPTIONAL_METRIC_RATE: f64 = 0.85;

/// Shape of the generated history
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scenario {
    /// Biomarkers mid-range, mood steady around 7
    Stable,
    /// Inflammatory markers climbing past their range
    Inflamed,
    /// Mood sliding from 7.5 to 2
    DecliningMood,
}

impl Scenario {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scenario::Stable => "stable",
            Scenario::Inflamed => "inflamed",
            Scenario::DecliningMood => "declining_mood",
        }
    }
}

/// Seeded generator; the same seed always produces the same history
pub struct SampleGenerator {
    rng: StdRng,
    catalog: BiomarkerCatalog,
}

impl SampleGenerator {
    pub fn new(seed: u64) -> Self {
        Self::with_catalog(seed, BiomarkerCatalog::default())
    }

    pub fn with_catalog(seed: u64, catalog: BiomarkerCatalog) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            catalog,
        }
    }

    /// One biomarker panel (08:00) and one mood check-in (20:00) per day
    pub fn generate(&mut self, start: DateTime<Utc>, days: u32, scenario: Scenario) -> AnalysisInput {
        let mut biomarkers = Vec::new();
        let mut moods = Vec::new();

        for day in 0..days {
            let progress = if days > 1 {
                day as f64 / (days - 1) as f64
            } else {
                1.0
            };
            let date = start + Duration::days(day as i64);

            for def in self.catalog.definitions() {
                let range = def.normal_range;
                let mid = range.min + range.width() / 2.0;
                let base = if scenario == Scenario::Inflamed && is_inflammatory(&def.id) {
                    mid + progress * (range.max * INFLAMED_PEAK - mid)
                } else {
                    mid
                };
                let noise = self.rng.gen_range(-1.0..=1.0) * range.width() * BIOMARKER_NOISE;

                biomarkers.push(BiomarkerReading::new(
                    def.id.clone(),
                    (base + noise).max(0.0),
                    date + Duration::hours(8),
                ));
            }

            let mood_base = match scenario {
                Scenario::DecliningMood => 7.5 - progress * 5.5,
                Scenario::Stable | Scenario::Inflamed => 7.0,
            };
            let mood = (mood_base + self.rng.gen_range(-MOOD_NOISE..=MOOD_NOISE)).clamp(1.0, 10.0);
            moods.push(MoodAssessment {
                mood_score: Some(mood),
                anxiety_score: self.optional_inverse(mood),
                stress_score: self.optional_inverse(mood),
                timestamp: date + Duration::hours(20),
            });
        }

        tracing::debug!(
            days,
            scenario = scenario.as_str(),
            readings = biomarkers.len(),
            "Generated sample data"
        );

        let date_range = DateRange::covering(&biomarkers, &moods);
        AnalysisInput {
            biomarkers,
            moods,
            date_range,
        }
    }

    /// Score that moves against mood, recorded most of the time
    fn optional_inverse(&mut self, mood: f64) -> Option<f64> {
        if !self.rng.gen_bool(OPTIONAL_METRIC_RATE) {
            return None;
        }
        let value = 11.0 - mood + self.rng.gen_range(-1.0..=1.0);
        Some(value.clamp(1.0, 10.0))
    }
}

fn is_inflammatory(kind: &BiomarkerKind) -> bool {
    matches!(
        kind,
        BiomarkerKind::Crp | BiomarkerKind::Il6 | BiomarkerKind::TnfAlpha
    )
}
