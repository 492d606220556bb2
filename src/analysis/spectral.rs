use serde::Serialize;
use std::cmp::Ordering;

use crate::audio::spectrum::{FrameFft, SpectrumFrames};
use crate::reference::{BandReference, GenreReference};
use crate::scoring::delta::normalize_delta;
use crate::scoring::metric::Status;
use crate::MixgradeError;

const ENERGY_FLOOR: f64 = 1e-12;
const FLOOR_DB: f64 = -120.0;
/// Largest move a single suggestion proposes.
pub const MAX_SUGGESTION_DB: f64 = 4.0;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SubBandResult {
    pub id: String,
    pub range_hz: [f64; 2],
    pub energy_db: Option<f64>,
    pub target_db: f64,
    pub tolerance_sigma: f64,
    pub deviation_db: Option<f64>,
    pub deviation_sigmas: Option<f64>,
    pub status: Status,
    pub frames_used: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SeverityColor {
    Green,
    Yellow,
    Red,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct GroupSeverity {
    pub group: String,
    pub points: f64,
    pub color: SeverityColor,
    pub bands: Vec<String>,
    /// Members that had data
    pub measured: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Boost,
    Cut,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Suggestion {
    pub band: String,
    pub group: Option<String>,
    pub status: Status,
    pub direction: Direction,
    pub deviation_db: f64,
    /// `|deviation|`, capped at [`MAX_SUGGESTION_DB`]
    pub amount_db: f64,
    /// Safety-normalised signed EQ move
    pub correction_db: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SpectralAnalysis {
    pub valid: bool,
    pub frames_total: usize,
    pub frames_valid: usize,
    pub bands: Vec<SubBandResult>,
    pub groups: Vec<GroupSeverity>,
    pub suggestions: Vec<Suggestion>,
}

/// Per-band energy, σ classification, grouping and ranked suggestions.
///
/// A frame only counts when both channels carry usable magnitudes; missing
/// frames are skipped, never read as silence. No usable frame at all gives
/// `valid: false` with every band `no_data`.
pub fn analyze_bands(
    spectrum: &SpectrumFrames,
    reference: &GenreReference,
) -> crate::Result<SpectralAnalysis> {
    reference.validate()?;
    if spectrum.fft_size < 2 || spectrum.sample_rate == 0 {
        return Err(MixgradeError::input(format!(
            "cannot map bins with fft_size={} sample_rate={}",
            spectrum.fft_size, spectrum.sample_rate
        )));
    }

    let usable: Vec<(&[f32], &[f32])> = spectrum.frames.iter().filter_map(usable_frame).collect();
    let skipped = spectrum.frames.len() - usable.len();
    if skipped > 0 {
        log::debug!("Skipped {} of {} spectrum frames", skipped, spectrum.frames.len());
    }

    let bands: Vec<SubBandResult> = reference
        .bands
        .iter()
        .map(|band| measure_band(band, spectrum, &usable))
        .collect();

    let groups = group_severities(&bands, reference);
    let suggestions = rank_suggestions(&bands, reference);

    Ok(SpectralAnalysis {
        valid: !usable.is_empty(),
        frames_total: spectrum.frames.len(),
        frames_valid: usable.len(),
        bands,
        groups,
        suggestions,
    })
}

fn usable_frame(frame: &FrameFft) -> Option<(&[f32], &[f32])> {
    let left = frame.left.as_deref()?;
    let right = frame.right.as_deref()?;
    let ok = !left.is_empty()
        && left.len() == right.len()
        && left.iter().chain(right).all(|m| m.is_finite());
    ok.then_some((left, right))
}

fn measure_band(
    band: &BandReference,
    spectrum: &SpectrumFrames,
    frames: &[(&[f32], &[f32])],
) -> SubBandResult {
    let [low_hz, high_hz] = band.range_hz;

    let mut energies: Vec<f64> = match spectrum.bin_range(low_hz, high_hz) {
        Some((lo, hi)) => frames
            .iter()
            .filter(|(left, _)| left.len() >= hi)
            .map(|(left, right)| stereo_rms(&left[lo..hi], &right[lo..hi]))
            .collect(),
        None => Vec::new(),
    };

    let energy_db = median(&mut energies).map(to_db);
    let deviation_db = energy_db.map(|e| e - band.target_db);
    let deviation_sigmas = deviation_db.map(|d| d / band.tolerance_sigma);

    SubBandResult {
        id: band.id.clone(),
        range_hz: band.range_hz,
        energy_db,
        target_db: band.target_db,
        tolerance_sigma: band.tolerance_sigma,
        deviation_db,
        deviation_sigmas,
        status: deviation_sigmas.map_or(Status::NoData, Status::from_sigmas),
        frames_used: energies.len(),
    }
}

/// `sqrt((L² + R²) / 2)` per bin, then RMS across bins.
fn stereo_rms(left: &[f32], right: &[f32]) -> f64 {
    let sum: f64 = left
        .iter()
        .zip(right)
        .map(|(&l, &r)| ((l as f64).powi(2) + (r as f64).powi(2)) * 0.5)
        .sum();
    (sum / left.len() as f64).sqrt()
}

fn median(values: &mut [f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(f64::total_cmp);
    let mid = values.len() / 2;
    Some(if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) * 0.5
    } else {
        values[mid]
    })
}

fn to_db(energy: f64) -> f64 {
    if energy < ENERGY_FLOOR {
        FLOOR_DB
    } else {
        (20.0 * energy.log10()).max(FLOOR_DB)
    }
}

fn group_severities(bands: &[SubBandResult], reference: &GenreReference) -> Vec<GroupSeverity> {
    let weights = reference.severity.weights;
    let thresholds = reference.severity.thresholds;

    reference
        .grouping
        .iter()
        .map(|(group, members)| {
            let statuses: Vec<Status> = members
                .iter()
                .filter_map(|id| bands.iter().find(|b| &b.id == id))
                .map(|b| b.status)
                .filter(|s| *s != Status::NoData)
                .collect();

            let points: f64 = statuses
                .iter()
                .map(|s| match s {
                    Status::Ideal => weights.ideal,
                    Status::Adjust => weights.adjust,
                    Status::Fix => weights.fix,
                    Status::NoData => 0.0,
                })
                .sum();

            let color = if points >= thresholds.red {
                SeverityColor::Red
            } else if points >= thresholds.yellow {
                SeverityColor::Yellow
            } else {
                SeverityColor::Green
            };

            GroupSeverity {
                group: group.clone(),
                points,
                color,
                bands: members.clone(),
                measured: statuses.len(),
            }
        })
        .collect()
}

fn rank_suggestions(bands: &[SubBandResult], reference: &GenreReference) -> Vec<Suggestion> {
    let config = reference.suggestions;

    let mut candidates: Vec<(&SubBandResult, f64)> = bands
        .iter()
        .filter(|b| matches!(b.status, Status::Adjust | Status::Fix))
        .filter_map(|b| b.deviation_db.map(|d| (b, d)))
        .filter(|(_, d)| d.abs() >= config.min_relevance_db)
        .collect();

    candidates.sort_by(|(a, da), (b, db)| {
        db.abs()
            .partial_cmp(&da.abs())
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.id.cmp(&b.id))
    });

    let mut per_group: std::collections::BTreeMap<Option<&str>, usize> = Default::default();
    let mut suggestions = Vec::new();

    for (band, deviation) in candidates {
        if suggestions.len() >= config.max_total {
            break;
        }
        let group = reference.group_of(&band.id);
        let taken = per_group.entry(group).or_default();
        if *taken >= config.max_per_group {
            continue;
        }
        *taken += 1;

        suggestions.push(Suggestion {
            band: band.id.clone(),
            group: group.map(str::to_string),
            status: band.status,
            direction: if deviation > 0.0 { Direction::Cut } else { Direction::Boost },
            deviation_db: deviation,
            amount_db: deviation.abs().min(MAX_SUGGESTION_DB),
            correction_db: -normalize_delta(deviation),
        });
    }

    suggestions
}
