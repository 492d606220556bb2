use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::Unavailable;

/// Slack for boundary comparisons, absorbs f32 magnitude rounding.
const SIGMA_EPSILON: f64 = 1e-6;

/// Severity of a deviation measured in tolerance units.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Ideal,
    Adjust,
    Fix,
    NoData,
}

impl Status {
    /// Boundaries fall into the lower-severity bucket: exactly 1σ is ideal,
    /// exactly 2σ is adjust.
    pub fn from_sigmas(sigmas: f64) -> Self {
        if !sigmas.is_finite() {
            return Self::NoData;
        }
        match sigmas.abs() {
            s if s <= 1.0 + SIGMA_EPSILON => Self::Ideal,
            s if s <= 2.0 + SIGMA_EPSILON => Self::Adjust,
            _ => Self::Fix,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Ideal => "ideal",
            Self::Adjust => "adjust",
            Self::Fix => "fix",
            Self::NoData => "no_data",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "id")]
pub enum MetricKey {
    Lufs,
    TruePeak,
    DynamicRange,
    Lra,
    StereoCorrelation,
    Band(String),
}

impl fmt::Display for MetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Lufs => write!(f, "lufs"),
            Self::TruePeak => write!(f, "true_peak"),
            Self::DynamicRange => write!(f, "dynamic_range"),
            Self::Lra => write!(f, "lra"),
            Self::StereoCorrelation => write!(f, "stereo_correlation"),
            Self::Band(id) => write!(f, "band:{id}"),
        }
    }
}

/// One scored metric. `score` is `None` for metrics that could not be
/// measured, which is distinct from a measured metric scoring zero.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MetricResult {
    pub key: MetricKey,
    pub value: Option<f64>,
    pub target: f64,
    pub tolerance: f64,
    pub deviation: Option<f64>,
    pub status: Status,
    pub score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unavailable: Option<Unavailable>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    Excellent,
    Good,
    Fair,
    NeedsWork,
    Poor,
}

impl Classification {
    pub fn label(self) -> &'static str {
        match self {
            Self::Excellent => "excellent",
            Self::Good => "good",
            Self::Fair => "fair",
            Self::NeedsWork => "needs work",
            Self::Poor => "poor",
        }
    }
}

/// Lower bounds (percent, inclusive) of each classification tier.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize, Serialize)]
pub struct ClassificationThresholds {
    #[serde(default = "default_excellent")]
    pub excellent: f64,
    #[serde(default = "default_good")]
    pub good: f64,
    #[serde(default = "default_fair")]
    pub fair: f64,
    #[serde(default = "default_needs_work")]
    pub needs_work: f64,
}

impl Default for ClassificationThresholds {
    fn default() -> Self {
        Self {
            excellent: default_excellent(),
            good: default_good(),
            fair: default_fair(),
            needs_work: default_needs_work(),
        }
    }
}

fn default_excellent() -> f64 { 85.0 }
fn default_good() -> f64 { 70.0 }
fn default_fair() -> f64 { 55.0 }
fn default_needs_work() -> f64 { 40.0 }

impl ClassificationThresholds {
    pub fn classify(&self, total_pct: f64) -> Classification {
        match total_pct {
            t if t >= self.excellent => Classification::Excellent,
            t if t >= self.good => Classification::Good,
            t if t >= self.fair => Classification::Fair,
            t if t >= self.needs_work => Classification::NeedsWork,
            _ => Classification::Poor,
        }
    }
}
