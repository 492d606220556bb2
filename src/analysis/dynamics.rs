use serde::Serialize;

use crate::audio::loudness::percentile;
use crate::MixgradeError;

const DR_WINDOW_S: f64 = 0.300;
const CF_WINDOW_S: f64 = 0.400;
const HOP_S: f64 = 0.100;
const MIN_DR_WINDOWS: usize = 10;
const MIN_CF_WINDOWS: usize = 3;
const LEVEL_FLOOR: f64 = 1e-10;
const SILENT_LRA_LU: f64 = 0.5;

/// Genre-typical dynamic range bands, `(style, low dB, high dB)`.
const DR_STYLES: [(DynamicStyle, f64, f64); 5] = [
    (DynamicStyle::Brickwalled, 2.0, 6.0),
    (DynamicStyle::Loud, 4.0, 9.0),
    (DynamicStyle::Balanced, 7.0, 12.0),
    (DynamicStyle::Open, 10.0, 16.0),
    (DynamicStyle::Orchestral, 14.0, 24.0),
];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DynamicStyle {
    Brickwalled,
    Loud,
    Balanced,
    Open,
    Orchestral,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct DynamicRange {
    pub dr_db: f64,
    pub windows: usize,
    pub style: DynamicStyle,
    /// Triangular proximity to the centre of the matched style, in [0, 1]
    pub confidence: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CrestInterpretation {
    HeavilyCompressed,
    Compressed,
    Moderate,
    Dynamic,
    NaturalDynamics,
}

impl CrestInterpretation {
    pub fn from_db(crest_db: f64) -> Self {
        match crest_db {
            c if c < 6.0 => Self::HeavilyCompressed,
            c if c < 10.0 => Self::Compressed,
            c if c < 14.0 => Self::Moderate,
            c if c < 18.0 => Self::Dynamic,
            _ => Self::NaturalDynamics,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::HeavilyCompressed => "heavily compressed",
            Self::Compressed => "compressed",
            Self::Moderate => "moderate dynamics",
            Self::Dynamic => "dynamic",
            Self::NaturalDynamics => "natural dynamics",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct CrestFactor {
    /// Primary reported value
    pub mean_db: f64,
    pub p95_db: f64,
    pub min_db: f64,
    pub max_db: f64,
    pub windows: usize,
    pub interpretation: CrestInterpretation,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LraInterpretation {
    SilenceDetected,
    VeryNarrow,
    Narrow,
    Moderate,
    Wide,
    VeryWide,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct LoudnessRange {
    pub lra_lu: f64,
    pub silence_detected: bool,
    pub interpretation: LraInterpretation,
}

/// Windowed RMS spread: max minus mean of per-window RMS in dB.
///
/// `None` when fewer than ten non-silent windows fit in the signal.
pub fn dynamic_range(samples: &[f32], sample_rate: u32) -> Option<DynamicRange> {
    let levels: Vec<f64> = windows(samples, sample_rate, DR_WINDOW_S)
        .filter_map(|w| {
            let rms = rms(w);
            (rms >= LEVEL_FLOOR).then(|| 20.0 * rms.log10())
        })
        .collect();

    if levels.len() < MIN_DR_WINDOWS {
        log::debug!("Dynamic range: only {} valid windows", levels.len());
        return None;
    }

    let max = levels.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let mean = levels.iter().sum::<f64>() / levels.len() as f64;
    let dr_db = (max - mean).max(0.0);
    let (style, confidence) = classify_dr(dr_db);

    Some(DynamicRange {
        dr_db,
        windows: levels.len(),
        style,
        confidence,
    })
}

/// Best matching style by triangular proximity to each band's centre.
/// Outside every band the nearest centre wins with zero confidence.
pub fn classify_dr(dr_db: f64) -> (DynamicStyle, f64) {
    let best = DR_STYLES
        .iter()
        .map(|&(style, low, high)| {
            let centre = (low + high) * 0.5;
            let half_width = (high - low) * 0.5;
            let confidence = (1.0 - (dr_db - centre).abs() / half_width).max(0.0);
            (style, confidence)
        })
        .fold((DR_STYLES[0].0, 0.0), |best, candidate| {
            if candidate.1 > best.1 {
                candidate
            } else {
                best
            }
        });
    if best.1 > 0.0 {
        return best;
    }

    let nearest = DR_STYLES
        .iter()
        .min_by(|a, b| {
            let da = (dr_db - (a.1 + a.2) * 0.5).abs();
            let db = (dr_db - (b.1 + b.2) * 0.5).abs();
            da.total_cmp(&db)
        })
        .map_or(DR_STYLES[0].0, |&(style, _, _)| style);
    (nearest, 0.0)
}

/// Per-window peak-to-RMS ratio over 400 ms windows with 75% overlap.
///
/// `None` when fewer than three windows clear the numerical floor.
pub fn crest_factor(samples: &[f32], sample_rate: u32) -> Option<CrestFactor> {
    let mut values: Vec<f64> = windows(samples, sample_rate, CF_WINDOW_S)
        .filter_map(|w| {
            let peak = w.iter().fold(0.0f64, |m, &s| m.max((s as f64).abs()));
            let rms = rms(w);
            (peak >= LEVEL_FLOOR && rms >= LEVEL_FLOOR)
                .then(|| 20.0 * peak.log10() - 20.0 * rms.log10())
        })
        .collect();

    if values.len() < MIN_CF_WINDOWS {
        log::debug!("Crest factor: only {} valid windows", values.len());
        return None;
    }

    let mean_db = values.iter().sum::<f64>() / values.len() as f64;
    values.sort_by(f64::total_cmp);

    Some(CrestFactor {
        mean_db,
        p95_db: percentile(&values, 0.95),
        min_db: values[0],
        max_db: values[values.len() - 1],
        windows: values.len(),
        interpretation: CrestInterpretation::from_db(mean_db),
    })
}

/// Validate and interpret a loudness range value.
pub fn interpret_lra(lra_lu: f64) -> crate::Result<LoudnessRange> {
    if !lra_lu.is_finite() || lra_lu < 0.0 {
        return Err(MixgradeError::input(format!("invalid loudness range {lra_lu}")));
    }
    let interpretation = match lra_lu {
        l if l < SILENT_LRA_LU => LraInterpretation::SilenceDetected,
        l if l < 3.0 => LraInterpretation::VeryNarrow,
        l if l < 6.0 => LraInterpretation::Narrow,
        l if l < 10.0 => LraInterpretation::Moderate,
        l if l < 15.0 => LraInterpretation::Wide,
        _ => LraInterpretation::VeryWide,
    };
    Ok(LoudnessRange {
        lra_lu,
        silence_detected: interpretation == LraInterpretation::SilenceDetected,
        interpretation,
    })
}

fn windows(samples: &[f32], sample_rate: u32, window_s: f64) -> impl Iterator<Item = &[f32]> {
    let window = (window_s * sample_rate as f64).round() as usize;
    let hop = ((HOP_S * sample_rate as f64).round() as usize).max(1);
    let count = if window == 0 || samples.len() < window {
        0
    } else {
        (samples.len() - window) / hop + 1
    };
    (0..count).map(move |i| &samples[i * hop..i * hop + window])
}

fn rms(window: &[f32]) -> f64 {
    let sum: f64 = window.iter().map(|&s| (s as f64) * (s as f64)).sum();
    (sum / window.len() as f64).sqrt()
}
