//! Pattern detection
//!
//! A fixed catalog of heuristic rules over recent biomarker and mood series.
//! Each rule is an independent object that either produces an insight or
//! stays silent; several rules may fire for the same series.
//!
//! Rule order only affects the order insights are collected in. The final
//! ordering is decided by the severity sort in the pipeline.

use crate::catalog::{BiomarkerCatalog, BiomarkerDefinition, CrossBiomarkerRule};
use crate::series::{kinds_present, mean, recent_biomarker_values, recent_mood_values};
use crate::types::{BiomarkerReading, Insight, InsightType, MoodAssessment, MoodMetric};

/// Readings per biomarker considered by the single-biomarker rules
pub const BIOMARKER_WINDOW: usize = 10;
/// Readings required before the single-biomarker rules are evaluated
pub const MIN_BIOMARKER_READINGS: usize = 3;
/// Readings per biomarker searched by the cross-biomarker rules
pub const CROSS_RULE_WINDOW: usize = 7;
/// Mood points considered by the mood-trend rules
pub const MOOD_WINDOW: usize = 14;
/// Mood points required before any mood rule is evaluated
pub const MIN_MOOD_POINTS: usize = 5;

/// Excess over the range maximum (%) that escalates to critical
const CRITICAL_EXCESS_PCT: f64 = 50.0;
const ELEVATED_BASE_CONFIDENCE: f64 = 70.0;
const ELEVATED_MAX_CONFIDENCE: f64 = 95.0;

const RAPID_CHANGE_THRESHOLD: f64 = 0.20;
const RAPID_CHANGE_CONFIDENCE: u8 = 75;

const STABILITY_READINGS: usize = 5;
/// Spread allowed for a stable series, as a fraction of range width
const STABILITY_SPREAD_FRACTION: f64 = 0.30;
const STABILITY_CONFIDENCE: u8 = 85;

/// Points averaged at each end of the mood window
const MOOD_TREND_POINTS: usize = 3;
/// Change in average mood (points on a 1-10 scale) that counts as a trend
const MOOD_TREND_DELTA: f64 = 1.0;
const LOW_MOOD_THRESHOLD: f64 = 3.0;
const LOW_MOOD_MIN_POINTS: usize = 7;
const LOW_MOOD_MIN_LOW_COUNT: usize = 5;
const IMPROVING_MIN_AVERAGE: f64 = 6.0;

/// The recent history of one biomarker kind
#[derive(Debug, Clone, Copy)]
pub struct BiomarkerContext<'a> {
    pub definition: &'a BiomarkerDefinition,
    /// Most recent values, newest first
    pub recent: &'a [f64],
}

impl BiomarkerContext<'_> {
    fn newest(&self) -> Option<f64> {
        self.recent.first().copied()
    }
}

/// A rule over a single biomarker's recent readings
pub trait BiomarkerRule: Send + Sync {
    fn name(&self) -> &'static str;
    fn evaluate(&self, ctx: &BiomarkerContext<'_>) -> Option<Insight>;
}

/// Latest reading above the range maximum
pub struct ElevatedLevelRule;

impl BiomarkerRule for ElevatedLevelRule {
    fn name(&self) -> &'static str {
        "elevated_level"
    }

    fn evaluate(&self, ctx: &BiomarkerContext<'_>) -> Option<Insight> {
        let def = ctx.definition;
        let range = def.normal_range;
        let latest = ctx.newest()?;
        if latest <= range.max {
            return None;
        }

        let reference = if range.max.abs() > f64::EPSILON {
            range.max.abs()
        } else if range.width() > f64::EPSILON {
            range.width()
        } else {
            return None;
        };
        let excess_pct = (latest - range.max) / reference * 100.0;
        let confidence = (ELEVATED_BASE_CONFIDENCE + excess_pct / 2.0)
            .min(ELEVATED_MAX_CONFIDENCE)
            .round() as u8;

        let (insight_type, title) = if excess_pct > CRITICAL_EXCESS_PCT {
            (InsightType::Critical, format!("Critically Elevated {}", def.name))
        } else {
            (InsightType::Warning, format!("Elevated {}", def.name))
        };

        let mut recommendations = vec![
            format!("Discuss your {} results with your healthcare provider", def.name),
            "Schedule a follow-up test to confirm the reading".to_string(),
        ];
        if insight_type == InsightType::Critical {
            recommendations.insert(0, "Seek medical advice promptly".to_string());
        } else {
            recommendations.push("Review recent changes in sleep, diet and stress".to_string());
        }

        Some(
            Insight::new(
                insight_type,
                title,
                format!(
                    "Your latest {} reading of {:.1} {} is {:.0}% above the normal maximum of {} {}.",
                    def.name, latest, def.unit, excess_pct, range.max, def.unit
                ),
                confidence,
            )
            .involving([def.id.clone()])
            .recommending(recommendations),
        )
    }
}

/// Newest reading more than 20% above the third-newest
pub struct RapidChangeRule;

impl BiomarkerRule for RapidChangeRule {
    fn name(&self) -> &'static str {
        "rapid_change"
    }

    fn evaluate(&self, ctx: &BiomarkerContext<'_>) -> Option<Insight> {
        if ctx.recent.len() < 3 {
            return None;
        }
        let (newest, third) = (ctx.recent[0], ctx.recent[2]);
        if third <= 0.0 {
            return None;
        }

        let change = (newest - third) / third;
        if change <= RAPID_CHANGE_THRESHOLD {
            return None;
        }

        let def = ctx.definition;
        Some(
            Insight::new(
                InsightType::Warning,
                format!("Rapid {} Increase", def.name),
                format!(
                    "{} rose {:.0}% across your last three readings, from {:.1} to {:.1} {}.",
                    def.name,
                    change * 100.0,
                    third,
                    newest,
                    def.unit
                ),
                RAPID_CHANGE_CONFIDENCE,
            )
            .involving([def.id.clone()])
            .recommending([
                "Monitor this biomarker more frequently over the next weeks",
                "Note any new symptoms, medications or life events",
            ]),
        )
    }
}

/// Five most recent readings in range with a narrow spread
pub struct StabilityRule;

impl BiomarkerRule for StabilityRule {
    fn name(&self) -> &'static str {
        "stability"
    }

    fn evaluate(&self, ctx: &BiomarkerContext<'_>) -> Option<Insight> {
        if ctx.recent.len() < STABILITY_READINGS {
            return None;
        }
        let def = ctx.definition;
        let range = def.normal_range;
        let window = &ctx.recent[..STABILITY_READINGS];

        if !window.iter().all(|&v| range.contains(v)) {
            return None;
        }

        let max = window.iter().copied().fold(f64::MIN, f64::max);
        let min = window.iter().copied().fold(f64::MAX, f64::min);
        if max - min >= range.width() * STABILITY_SPREAD_FRACTION {
            return None;
        }

        Some(
            Insight::new(
                InsightType::Positive,
                format!("Stable {} Levels", def.name),
                format!(
                    "Your last {} {} readings stayed within the normal range of {}-{} {}.",
                    STABILITY_READINGS, def.name, range.min, range.max, def.unit
                ),
                STABILITY_CONFIDENCE,
            )
            .involving([def.id.clone()])
            .recommending(["Keep up your current routine", "Continue regular monitoring"]),
        )
    }
}

/// Recent mood scores for the trend rules
#[derive(Debug, Clone)]
pub struct MoodWindow {
    /// Mood scores, newest first
    values: Vec<f64>,
}

impl MoodWindow {
    pub fn from_assessments(moods: &[MoodAssessment]) -> Self {
        Self {
            values: recent_mood_values(moods, MoodMetric::MoodScore, MOOD_WINDOW),
        }
    }

    pub fn from_values(values: Vec<f64>) -> Self {
        Self { values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Average of the newest points
    fn recent_average(&self) -> f64 {
        let n = MOOD_TREND_POINTS.min(self.values.len());
        mean(&self.values[..n]).unwrap_or(0.0)
    }

    /// Average of the oldest points in the window
    fn older_average(&self) -> f64 {
        let n = MOOD_TREND_POINTS.min(self.values.len());
        mean(&self.values[self.values.len() - n..]).unwrap_or(0.0)
    }

    fn overall_average(&self) -> f64 {
        mean(&self.values).unwrap_or(0.0)
    }

    fn count_below(&self, threshold: f64) -> usize {
        self.values.iter().filter(|&&v| v < threshold).count()
    }
}

/// A rule over the recent mood window
pub trait MoodRule: Send + Sync {
    fn name(&self) -> &'static str;
    fn evaluate(&self, window: &MoodWindow) -> Option<Insight>;
}

/// Recent mood more than a point below the start of the window
pub struct DecliningMoodRule;

impl MoodRule for DecliningMoodRule {
    fn name(&self) -> &'static str {
        "declining_mood"
    }

    fn evaluate(&self, window: &MoodWindow) -> Option<Insight> {
        let (recent, older) = (window.recent_average(), window.older_average());
        if older - recent <= MOOD_TREND_DELTA {
            return None;
        }

        Some(
            Insight::new(
                InsightType::Warning,
                "Declining Mood Trend",
                format!(
                    "Your average mood dropped from {:.1} to {:.1} over your last {} check-ins.",
                    older,
                    recent,
                    window.len()
                ),
                80,
            )
            .recommending([
                "Reach out to your care team or a trusted person",
                "Keep a regular sleep and activity schedule",
                "Track possible triggers in your daily notes",
            ]),
        )
    }
}

/// Sustained mood scores below 3
pub struct PersistentLowMoodRule;

impl MoodRule for PersistentLowMoodRule {
    fn name(&self) -> &'static str {
        "persistent_low_mood"
    }

    fn evaluate(&self, window: &MoodWindow) -> Option<Insight> {
        if window.len() < LOW_MOOD_MIN_POINTS {
            return None;
        }
        let average = window.overall_average();
        let low_count = window.count_below(LOW_MOOD_THRESHOLD);
        if average >= LOW_MOOD_THRESHOLD || low_count < LOW_MOOD_MIN_LOW_COUNT {
            return None;
        }

        Some(
            Insight::new(
                InsightType::Critical,
                "Persistent Low Mood",
                format!(
                    "{} of your last {} mood scores were below {}, with an average of {:.1}.",
                    low_count,
                    window.len(),
                    LOW_MOOD_THRESHOLD,
                    average
                ),
                90,
            )
            .recommending([
                "Contact your healthcare provider or therapist soon",
                "If you are in crisis, contact emergency services or a crisis line",
                "Let someone you trust know how you are feeling",
            ]),
        )
    }
}

/// Recent mood more than a point above the start of the window, averaging above 6
pub struct ImprovingMoodRule;

impl MoodRule for ImprovingMoodRule {
    fn name(&self) -> &'static str {
        "improving_mood"
    }

    fn evaluate(&self, window: &MoodWindow) -> Option<Insight> {
        let (recent, older) = (window.recent_average(), window.older_average());
        if recent - older <= MOOD_TREND_DELTA || window.overall_average() <= IMPROVING_MIN_AVERAGE {
            return None;
        }

        Some(
            Insight::new(
                InsightType::Positive,
                "Improving Mood Trend",
                format!(
                    "Your average mood rose from {:.1} to {:.1} over your last {} check-ins.",
                    older,
                    recent,
                    window.len()
                ),
                80,
            )
            .recommending([
                "Note what has been helping and keep it up",
                "Continue your current self-care routine",
            ]),
        )
    }
}

/// Evaluate one cross-biomarker rule against the recent readings
pub fn evaluate_cross_rule(
    rule: &CrossBiomarkerRule,
    readings: &[BiomarkerReading],
) -> Option<Insight> {
    let triggered = |kind, threshold: f64| {
        recent_biomarker_values(readings, kind, CROSS_RULE_WINDOW)
            .iter()
            .any(|&v| v > threshold)
    };

    if !triggered(&rule.first.kind, rule.first.threshold)
        || !triggered(&rule.second.kind, rule.second.threshold)
    {
        return None;
    }

    Some(
        Insight::new(
            InsightType::Warning,
            rule.title.clone(),
            rule.description.clone(),
            rule.confidence,
        )
        .involving([rule.first.kind.clone(), rule.second.kind.clone()])
        .recommending(rule.recommendations.iter().cloned()),
    )
}

/// Runs the rule catalog over a subject's series
pub struct PatternDetector {
    biomarker_rules: Vec<Box<dyn BiomarkerRule>>,
    mood_rules: Vec<Box<dyn MoodRule>>,
}

impl Default for PatternDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl PatternDetector {
    /// Detector with the standard rule set
    pub fn new() -> Self {
        Self {
            biomarker_rules: vec![
                Box::new(ElevatedLevelRule),
                Box::new(RapidChangeRule),
                Box::new(StabilityRule),
            ],
            mood_rules: vec![
                Box::new(DecliningMoodRule),
                Box::new(PersistentLowMoodRule),
                Box::new(ImprovingMoodRule),
            ],
        }
    }

    /// Detector with a caller-supplied rule set
    pub fn with_rules(
        biomarker_rules: Vec<Box<dyn BiomarkerRule>>,
        mood_rules: Vec<Box<dyn MoodRule>>,
    ) -> Self {
        Self {
            biomarker_rules,
            mood_rules,
        }
    }

    /// Single-biomarker insights for every catalogued kind with at least three
    /// readings.
    ///
    /// Kinds missing from the catalog have no normal range and are skipped.
    pub fn detect_biomarker_patterns(
        &self,
        readings: &[BiomarkerReading],
        catalog: &BiomarkerCatalog,
    ) -> Vec<Insight> {
        let mut insights = Vec::new();

        for kind in kinds_present(readings, catalog) {
            let Some(definition) = catalog.get(&kind) else {
                tracing::trace!(kind = %kind, "No catalog entry, skipping biomarker rules");
                continue;
            };
            let recent = recent_biomarker_values(readings, &kind, BIOMARKER_WINDOW);
            if recent.len() < MIN_BIOMARKER_READINGS {
                tracing::trace!(kind = %kind, readings = recent.len(), "Too few readings");
                continue;
            }

            let ctx = BiomarkerContext {
                definition,
                recent: &recent,
            };
            for rule in &self.biomarker_rules {
                if let Some(insight) = rule.evaluate(&ctx) {
                    tracing::debug!(rule = rule.name(), kind = %kind, "Biomarker rule fired");
                    insights.push(insight);
                }
            }
        }

        insights
    }

    /// Combined insights for the catalog's cross-biomarker pairs
    pub fn detect_cross_biomarker_patterns(
        &self,
        readings: &[BiomarkerReading],
        catalog: &BiomarkerCatalog,
    ) -> Vec<Insight> {
        catalog
            .cross_rules()
            .iter()
            .filter_map(|rule| {
                let insight = evaluate_cross_rule(rule, readings);
                if insight.is_some() {
                    tracing::debug!(rule = %rule.id, "Cross-biomarker rule fired");
                }
                insight
            })
            .collect()
    }

    /// Mood-trend insights; requires at least five mood scores
    pub fn detect_mood_patterns(&self, moods: &[MoodAssessment]) -> Vec<Insight> {
        let window = MoodWindow::from_assessments(moods);
        if window.len() < MIN_MOOD_POINTS {
            return Vec::new();
        }

        self.mood_rules
            .iter()
            .filter_map(|rule| {
                let insight = rule.evaluate(&window);
                if insight.is_some() {
                    tracing::debug!(rule = rule.name(), points = window.len(), "Mood rule fired");
                }
                insight
            })
            .collect()
    }

    /// All pattern insights, unsorted
    pub fn detect(
        &self,
        readings: &[BiomarkerReading],
        moods: &[MoodAssessment],
        catalog: &BiomarkerCatalog,
    ) -> Vec<Insight> {
        let mut insights = self.detect_biomarker_patterns(readings, catalog);
        insights.extend(self.detect_cross_biomarker_patterns(readings, catalog));
        insights.extend(self.detect_mood_patterns(moods));
        insights
    }
}
