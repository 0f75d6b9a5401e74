//! Biomarker reference catalog
//!
//! The catalog is the engine's static configuration: one definition per biomarker
//! kind (normal range, unit, descriptive text, display color) plus the
//! cross-biomarker pair rules. It is built once and passed to the engine by
//! reference; nothing in the engine mutates it.

use crate::error::ComputeError;
use crate::types::BiomarkerKind;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Normal reference range for a biomarker
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormalRange {
    pub min: f64,
    pub max: f64,
}

impl NormalRange {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn width(&self) -> f64 {
        self.max - self.min
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }

    /// Relative distance outside the nearer bound, 0 when in range.
    ///
    /// The distance is expressed as a fraction of the bound it crossed. A bound of
    /// zero falls back to the range width, and a zero-width range counts as a full
    /// deviation.
    pub fn deviation_fraction(&self, value: f64) -> f64 {
        let (distance, bound) = if value > self.max {
            (value - self.max, self.max)
        } else if value < self.min {
            (self.min - value, self.min)
        } else {
            return 0.0;
        };

        if bound.abs() > f64::EPSILON {
            distance / bound.abs()
        } else if self.width() > f64::EPSILON {
            distance / self.width()
        } else {
            1.0
        }
    }
}

/// Static reference data for one biomarker kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BiomarkerDefinition {
    pub id: BiomarkerKind,
    /// Short display name used in insight titles
    pub name: String,
    pub normal_range: NormalRange,
    pub unit: String,
    pub description: String,
    /// Chart color (hex)
    pub color: String,
}

/// One side of a cross-biomarker rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BiomarkerTrigger {
    pub kind: BiomarkerKind,
    /// Fires when a recent reading exceeds this value
    pub threshold: f64,
}

/// A pair of biomarkers that are flagged together when both run high
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrossBiomarkerRule {
    pub id: String,
    pub title: String,
    pub description: String,
    pub first: BiomarkerTrigger,
    pub second: BiomarkerTrigger,
    pub confidence: u8,
    pub recommendations: Vec<String>,
}

/// Biomarker definitions and cross-biomarker rules
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BiomarkerCatalog {
    definitions: Vec<BiomarkerDefinition>,
    #[serde(default)]
    cross_rules: Vec<CrossBiomarkerRule>,
}

impl Default for BiomarkerCatalog {
    fn default() -> Self {
        Self {
            definitions: default_definitions(),
            cross_rules: default_cross_rules(),
        }
    }
}

impl BiomarkerCatalog {
    /// Build a catalog from explicit definitions and rules, validating both
    pub fn new(
        definitions: Vec<BiomarkerDefinition>,
        cross_rules: Vec<CrossBiomarkerRule>,
    ) -> Result<Self, ComputeError> {
        let catalog = Self {
            definitions,
            cross_rules,
        };
        catalog.validate()?;
        Ok(catalog)
    }

    pub fn definitions(&self) -> &[BiomarkerDefinition] {
        &self.definitions
    }

    pub fn cross_rules(&self) -> &[CrossBiomarkerRule] {
        &self.cross_rules
    }

    pub fn get(&self, kind: &BiomarkerKind) -> Option<&BiomarkerDefinition> {
        self.definitions.iter().find(|d| &d.id == kind)
    }

    /// Kinds in catalog order
    pub fn kinds(&self) -> impl Iterator<Item = &BiomarkerKind> {
        self.definitions.iter().map(|d| &d.id)
    }

    fn validate(&self) -> Result<(), ComputeError> {
        let mut seen = HashSet::new();

        for def in &self.definitions {
            if !seen.insert(&def.id) {
                return Err(ComputeError::InvalidCatalog(format!(
                    "duplicate biomarker id '{}'",
                    def.id
                )));
            }
            let range = def.normal_range;
            if !range.min.is_finite() || !range.max.is_finite() {
                return Err(ComputeError::InvalidCatalog(format!(
                    "non-finite normal range for '{}'",
                    def.id
                )));
            }
            if range.min > range.max {
                return Err(ComputeError::InvalidCatalog(format!(
                    "normal range min {} exceeds max {} for '{}'",
                    range.min, range.max, def.id
                )));
            }
        }

        for rule in &self.cross_rules {
            for trigger in [&rule.first, &rule.second] {
                if !seen.contains(&trigger.kind) {
                    return Err(ComputeError::InvalidCatalog(format!(
                        "rule '{}' references unknown biomarker '{}'",
                        rule.id, trigger.kind
                    )));
                }
            }
        }

        Ok(())
    }

    /// Load a catalog from JSON
    pub fn from_json(json: &str) -> Result<Self, ComputeError> {
        let catalog: Self = serde_json::from_str(json)
            .map_err(|e| ComputeError::InvalidCatalog(e.to_string()))?;
        catalog.validate()?;
        Ok(catalog)
    }

    /// Serialize the catalog to JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

fn definition(
    id: BiomarkerKind,
    name: &str,
    min: f64,
    max: f64,
    unit: &str,
    description: &str,
    color: &str,
) -> BiomarkerDefinition {
    BiomarkerDefinition {
        id,
        name: name.to_string(),
        normal_range: NormalRange::new(min, max),
        unit: unit.to_string(),
        description: description.to_string(),
        color: color.to_string(),
    }
}

fn default_definitions() -> Vec<BiomarkerDefinition> {
    vec![
        definition(
            BiomarkerKind::Crp,
            "CRP",
            0.0,
            3.0,
            "mg/L",
            "C-reactive protein, a general marker of systemic inflammation",
            "#ef4444",
        ),
        definition(
            BiomarkerKind::Il6,
            "IL-6",
            0.0,
            7.0,
            "pg/mL",
            "Interleukin-6, a pro-inflammatory cytokine linked to mood disorders",
            "#f97316",
        ),
        definition(
            BiomarkerKind::TnfAlpha,
            "TNF-α",
            0.0,
            8.1,
            "pg/mL",
            "Tumor necrosis factor alpha, a cytokine involved in acute inflammation",
            "#eab308",
        ),
        definition(
            BiomarkerKind::Cortisol,
            "Cortisol",
            6.0,
            23.0,
            "µg/dL",
            "Morning cortisol, the primary stress hormone",
            "#8b5cf6",
        ),
        definition(
            BiomarkerKind::Glucose,
            "Glucose",
            70.0,
            100.0,
            "mg/dL",
            "Fasting blood glucose, a marker of metabolic health",
            "#3b82f6",
        ),
    ]
}

fn default_cross_rules() -> Vec<CrossBiomarkerRule> {
    vec![
        CrossBiomarkerRule {
            id: "inflammation".to_string(),
            title: "Inflammatory Pattern Detected".to_string(),
            description: "CRP and IL-6 are both elevated in recent readings, which suggests \
                          an active inflammatory response"
                .to_string(),
            first: BiomarkerTrigger {
                kind: BiomarkerKind::Crp,
                threshold: 3.0,
            },
            second: BiomarkerTrigger {
                kind: BiomarkerKind::Il6,
                threshold: 7.0,
            },
            confidence: 80,
            recommendations: vec![
                "Review recent infections, injuries or vaccinations with your provider".to_string(),
                "Consider an anti-inflammatory diet rich in omega-3 fatty acids".to_string(),
                "Prioritize sleep and stress reduction".to_string(),
            ],
        },
        CrossBiomarkerRule {
            id: "metabolic_stress".to_string(),
            title: "Metabolic Stress Pattern".to_string(),
            description: "Cortisol and glucose are both elevated in recent readings, which \
                          can indicate chronic stress affecting metabolism"
                .to_string(),
            first: BiomarkerTrigger {
                kind: BiomarkerKind::Cortisol,
                threshold: 23.0,
            },
            second: BiomarkerTrigger {
                kind: BiomarkerKind::Glucose,
                threshold: 100.0,
            },
            confidence: 78,
            recommendations: vec![
                "Discuss a metabolic panel with your healthcare provider".to_string(),
                "Keep meal timing regular and limit refined sugars".to_string(),
                "Add daily relaxation practice such as breathing exercises".to_string(),
            ],
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_catalog() {
        let catalog = BiomarkerCatalog::default();
        let kinds: Vec<_> = catalog.kinds().cloned().collect();

        assert_eq!(kinds, BiomarkerKind::known().to_vec());
        assert_eq!(catalog.cross_rules().len(), 2);
        assert!(catalog.validate().is_ok());
    }

    #[test]
    fn test_deviation_fraction() {
        let range = NormalRange::new(6.0, 23.0);
        assert_eq!(range.deviation_fraction(10.0), 0.0);
        assert!((range.deviation_fraction(34.5) - 0.5).abs() < 1e-9);
        assert!((range.deviation_fraction(3.0) - 0.5).abs() < 1e-9);

        // Zero lower bound falls back to range width
        let range = NormalRange::new(0.0, 3.0);
        assert!((range.deviation_fraction(-1.5) - 0.5).abs() < 1e-9);

        // Zero-width range at zero
        let range = NormalRange::new(0.0, 0.0);
        assert_eq!(range.deviation_fraction(2.0), 1.0);
    }

    #[test]
    fn test_json_roundtrip_preserves_catalog() {
        let catalog = BiomarkerCatalog::default();
        let json = catalog.to_json().unwrap();
        let loaded = BiomarkerCatalog::from_json(&json).unwrap();
        assert_eq!(catalog, loaded);
    }

    #[test]
    fn test_rejects_inverted_range() {
        let defs = vec![definition(
            BiomarkerKind::Crp,
            "CRP",
            5.0,
            1.0,
            "mg/L",
            "",
            "#000000",
        )];
        let result = BiomarkerCatalog::new(defs, vec![]);
        assert!(matches!(result, Err(ComputeError::InvalidCatalog(_))));
    }

    #[test]
    fn test_rejects_rule_with_unknown_kind() {
        let defs = vec![definition(
            BiomarkerKind::Crp,
            "CRP",
            0.0,
            3.0,
            "mg/L",
            "",
            "#000000",
        )];
        let rules = default_cross_rules();
        let result = BiomarkerCatalog::new(defs, rules);
        assert!(matches!(result, Err(ComputeError::InvalidCatalog(_))));
    }

    #[test]
    fn test_malformed_json_is_catalog_error() {
        let result = BiomarkerCatalog::from_json("{\"definitions\": 3}");
        assert!(matches!(result, Err(ComputeError::InvalidCatalog(_))));

        let result = BiomarkerCatalog::from_json("not json");
        assert!(matches!(result, Err(ComputeError::InvalidCatalog(_))));
    }

    #[test]
    fn test_custom_kind_from_json() {
        let json = r##"{
            "definitions": [{
                "id": "ferritin",
                "name": "Ferritin",
                "normalRange": {"min": 20.0, "max": 250.0},
                "unit": "ng/mL",
                "description": "Iron storage protein",
                "color": "#10b981"
            }]
        }"##;

        let catalog = BiomarkerCatalog::from_json(json).unwrap();
        let kind = BiomarkerKind::Other("ferritin".to_string());
        assert_eq!(catalog.get(&kind).unwrap().unit, "ng/mL");
        assert!(catalog.cross_rules().is_empty());
    }
}
