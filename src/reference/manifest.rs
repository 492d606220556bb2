use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::MixgradeError;

pub const SUPPORTED_SCHEMA_VERSION: u32 = 1;

/// Genre reference document: metric targets, spectral band targets and the
/// policies used to grade deviations from them.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenreReference {
    pub schema_version: u32,
    pub genre: String,
    #[serde(default)]
    pub display_name: String,
    pub metrics: MetricTargets,
    pub bands: Vec<BandReference>,
    pub grouping: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub severity: SeverityConfig,
    #[serde(default)]
    pub suggestions: SuggestionConfig,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricTargets {
    pub lufs: MetricTarget,
    pub true_peak: MetricTarget,
    pub dynamic_range: MetricTarget,
    pub lra: MetricTarget,
    pub stereo_correlation: MetricTarget,
}

/// Either `target` + `tolerance`, or a `min`/`max` range.
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize)]
pub struct MetricTarget {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tolerance: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ResolvedTarget {
    pub target: f64,
    pub tolerance: f64,
}

impl MetricTarget {
    pub fn new(target: f64, tolerance: f64) -> Self {
        Self {
            target: Some(target),
            tolerance: Some(tolerance),
            ..Self::default()
        }
    }

    pub fn range(min: f64, max: f64) -> Self {
        Self {
            min: Some(min),
            max: Some(max),
            ..Self::default()
        }
    }

    /// A range resolves to its midpoint with half its width as tolerance.
    pub fn resolve(&self, key: &str) -> crate::Result<ResolvedTarget> {
        match (self.target, self.tolerance, self.min, self.max) {
            (Some(target), Some(tolerance), _, _) => {
                if !target.is_finite() || !(tolerance.is_finite() && tolerance > 0.0) {
                    return Err(MixgradeError::config(format!(
                        "metric '{key}' needs a finite target and a tolerance > 0"
                    )));
                }
                Ok(ResolvedTarget { target, tolerance })
            }
            (_, _, Some(min), Some(max)) => {
                if !(min.is_finite() && max.is_finite() && min < max) {
                    return Err(MixgradeError::config(format!(
                        "metric '{key}' range needs min < max"
                    )));
                }
                Ok(ResolvedTarget {
                    target: (min + max) * 0.5,
                    tolerance: (max - min) * 0.5,
                })
            }
            _ => Err(MixgradeError::config(format!(
                "metric '{key}' needs target+tolerance or min+max"
            ))),
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BandReference {
    pub id: String,
    pub range_hz: [f64; 2],
    pub target_db: f64,
    pub tolerance_sigma: f64,
}

#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize)]
pub struct SeverityConfig {
    #[serde(default)]
    pub weights: SeverityWeights,
    #[serde(default)]
    pub thresholds: SeverityThresholds,
}

/// Points each sub-band status contributes to its group.
#[derive(Clone, Copy, Debug, Deserialize, Serialize)]
pub struct SeverityWeights {
    pub ideal: f64,
    pub adjust: f64,
    pub fix: f64,
}

impl Default for SeverityWeights {
    fn default() -> Self {
        Self {
            ideal: 0.0,
            adjust: 1.0,
            fix: 3.0,
        }
    }
}

/// Group point totals at which the colour turns yellow / red.
#[derive(Clone, Copy, Debug, Deserialize, Serialize)]
pub struct SeverityThresholds {
    pub yellow: f64,
    pub red: f64,
}

impl Default for SeverityThresholds {
    fn default() -> Self {
        Self {
            yellow: 1.0,
            red: 3.0,
        }
    }
}

#[derive(Clone, Copy, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SuggestionConfig {
    #[serde(default = "default_max_per_group")]
    pub max_per_group: usize,
    #[serde(default = "default_min_relevance_db")]
    pub min_relevance_db: f64,
    #[serde(default = "default_max_total")]
    pub max_total: usize,
}

impl Default for SuggestionConfig {
    fn default() -> Self {
        Self {
            max_per_group: default_max_per_group(),
            min_relevance_db: default_min_relevance_db(),
            max_total: default_max_total(),
        }
    }
}

fn default_max_per_group() -> usize { 2 }
fn default_min_relevance_db() -> f64 { 1.0 }
fn default_max_total() -> usize { 6 }

impl GenreReference {
    /// Parse and validate a JSON reference document.
    pub fn from_json(json: &str) -> crate::Result<Self> {
        let reference: Self = serde_json::from_str(json)
            .map_err(|e| MixgradeError::config(format!("unreadable genre reference: {e}")))?;
        reference.validate()?;
        Ok(reference)
    }

    pub fn validate(&self) -> crate::Result<()> {
        if self.schema_version != SUPPORTED_SCHEMA_VERSION {
            return Err(MixgradeError::config(format!(
                "unsupported schemaVersion {} (expected {})",
                self.schema_version, SUPPORTED_SCHEMA_VERSION
            )));
        }

        self.metrics.lufs.resolve("lufs")?;
        self.metrics.true_peak.resolve("truePeak")?;
        self.metrics.dynamic_range.resolve("dynamicRange")?;
        self.metrics.lra.resolve("lra")?;
        self.metrics.stereo_correlation.resolve("stereoCorrelation")?;

        if self.bands.is_empty() {
            return Err(MixgradeError::config("reference defines no bands"));
        }
        let mut ids = BTreeSet::new();
        for band in &self.bands {
            if !ids.insert(band.id.as_str()) {
                return Err(MixgradeError::config(format!("duplicate band id '{}'", band.id)));
            }
            let [low, high] = band.range_hz;
            if !(low.is_finite() && high.is_finite() && low >= 0.0 && low < high) {
                return Err(MixgradeError::config(format!(
                    "band '{}' has an invalid frequency range",
                    band.id
                )));
            }
            if !band.target_db.is_finite() {
                return Err(MixgradeError::config(format!("band '{}' target is not finite", band.id)));
            }
            if !(band.tolerance_sigma.is_finite() && band.tolerance_sigma > 0.0) {
                return Err(MixgradeError::config(format!(
                    "band '{}' needs toleranceSigma > 0",
                    band.id
                )));
            }
        }

        for (group, members) in &self.grouping {
            if let Some(unknown) = members.iter().find(|m| !ids.contains(m.as_str())) {
                return Err(MixgradeError::config(format!(
                    "group '{group}' references unknown band '{unknown}'"
                )));
            }
        }

        let t = self.severity.thresholds;
        if !(t.yellow.is_finite() && t.red.is_finite() && t.yellow <= t.red) {
            return Err(MixgradeError::config("severity thresholds need yellow <= red"));
        }

        Ok(())
    }

    /// Macro group containing `band_id`, if any.
    pub fn group_of(&self, band_id: &str) -> Option<&str> {
        self.grouping
            .iter()
            .find(|(_, members)| members.iter().any(|m| m == band_id))
            .map(|(group, _)| group.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"{
        "schemaVersion": 1,
        "genre": "test",
        "metrics": {
            "lufs": { "target": -10.0, "tolerance": 1.0 },
            "truePeak": { "min": -2.0, "max": -1.0 },
            "dynamicRange": { "target": 8.0, "tolerance": 2.0 },
            "lra": { "target": 6.0, "tolerance": 2.0 },
            "stereoCorrelation": { "min": 0.0, "max": 1.0 }
        },
        "bands": [
            { "id": "low", "rangeHz": [20, 250], "targetDb": -30.0, "toleranceSigma": 3.0 }
        ],
        "grouping": { "all": ["low"] }
    }"#;

    #[test]
    fn parses_with_defaults() {
        let r = GenreReference::from_json(MINIMAL).unwrap();
        assert_eq!(r.suggestions.max_per_group, 2);
        assert_eq!(r.suggestions.min_relevance_db, 1.0);
        assert_eq!(r.severity.weights.fix, 3.0);
        assert_eq!(r.group_of("low"), Some("all"));
    }

    #[test]
    fn range_resolves_to_midpoint() {
        let r = GenreReference::from_json(MINIMAL).unwrap();
        let tp = r.metrics.true_peak.resolve("truePeak").unwrap();
        assert_eq!(tp, ResolvedTarget { target: -1.5, tolerance: 0.5 });
    }

    #[test]
    fn missing_bands_field_is_configuration_error() {
        let broken = MINIMAL.replace("\"bands\"", "\"bandz\"");
        let err = GenreReference::from_json(&broken).unwrap_err();
        assert!(matches!(err, MixgradeError::Configuration(_)));
    }

    #[test]
    fn zero_tolerance_is_rejected() {
        let broken = MINIMAL.replace("\"toleranceSigma\": 3.0", "\"toleranceSigma\": 0.0");
        assert!(GenreReference::from_json(&broken).is_err());

        let broken = MINIMAL.replace("\"min\": -2.0, \"max\": -1.0", "\"min\": -1.0, \"max\": -1.0");
        assert!(GenreReference::from_json(&broken).is_err());
    }

    #[test]
    fn grouping_must_reference_known_bands() {
        let broken = MINIMAL.replace("\"all\": [\"low\"]", "\"all\": [\"low\", \"air\"]");
        let err = GenreReference::from_json(&broken).unwrap_err();
        assert!(err.to_string().contains("air"));
    }

    #[test]
    fn unknown_schema_version_is_rejected() {
        let broken = MINIMAL.replace("\"schemaVersion\": 1", "\"schemaVersion\": 7");
        assert!(GenreReference::from_json(&broken).is_err());
    }
}
