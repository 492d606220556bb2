//! Dual-track scoring: absolute distance to the genre target, and for
//! spectral bands also the improvement since the previous iteration.

use serde::Serialize;

use super::baseline::{BaselineStore, SessionKey};
use super::metric::{
    Classification, ClassificationThresholds, MetricKey, MetricResult, Status,
};
use crate::analysis::spectral::SubBandResult;
use crate::error::Unavailable;
use crate::reference::{GenreReference, ResolvedTarget};

/// Improvement (dB) that earns full confidence on the improvement track.
pub const STEP_MAX_DB: f64 = 4.0;
pub const IMPROVEMENT_BONUS: f64 = 1.2;
/// Bands score 1.0 anywhere within this distance of the level-matched target.
pub const BAND_SWEET_SPOT_DB: f64 = 4.0;
/// Non-band sweet spot, as a fraction of the tolerance.
pub const SWEET_SPOT_FRACTION: f64 = 0.5;

/// A measured value, or why there is none.
pub type Measured = Result<f64, Unavailable>;

/// Everything the engine scores.
#[derive(Clone, Debug)]
pub struct MetricInputs<'a> {
    pub lufs: Measured,
    pub true_peak_dbtp: Measured,
    pub dynamic_range_db: Measured,
    pub lra_lu: Measured,
    pub stereo_correlation: Measured,
    pub bands: &'a [SubBandResult],
}

/// Baseline handle for the improvement track.
#[derive(Clone, Copy)]
pub struct BaselineView<'a> {
    pub store: &'a dyn BaselineStore,
    pub session: &'a SessionKey,
}

/// How a band score was reached.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct BandTrack {
    pub band: String,
    pub level_shift_db: f64,
    pub track_a: f64,
    pub track_b: f64,
    pub baseline_db: Option<f64>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ScoreBreakdown {
    pub per_metric: Vec<MetricResult>,
    pub band_tracks: Vec<BandTrack>,
    pub total_score_pct: f64,
    pub scored_metrics: usize,
    pub classification: Classification,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct ScoringEngine {
    thresholds: ClassificationThresholds,
}

/// 1.0 within `sweet`, linear down to 0.0 at `zero_at`, 0.0 beyond.
pub fn tolerance_score(deviation: f64, sweet: f64, zero_at: f64) -> f64 {
    let d = deviation.abs();
    if !d.is_finite() {
        return 0.0;
    }
    if d <= sweet {
        1.0
    } else if d >= zero_at {
        0.0
    } else {
        (zero_at - d) / (zero_at - sweet)
    }
}

/// Single-track score of a non-band metric, value used as measured.
pub fn absolute_score(deviation: f64, tolerance: f64) -> f64 {
    tolerance_score(deviation, SWEET_SPOT_FRACTION * tolerance, 2.0 * tolerance)
}

/// Track A: absolute band score of a level-matched deviation.
pub fn band_absolute_score(level_matched_deviation: f64, tolerance: f64) -> f64 {
    let zero_at = (2.0 * tolerance).max(BAND_SWEET_SPOT_DB + tolerance);
    tolerance_score(level_matched_deviation, BAND_SWEET_SPOT_DB, zero_at)
}

/// Track B: how much closer to target than the baseline, scaled so that
/// `STEP_MAX_DB` of improvement scores 1.0.
///
/// Compares raw energies: the baseline is stored without the loudness it was
/// measured at, so it cannot be level-matched. A pure gain move toward the
/// target loudness is therefore credited as improvement on every band, while
/// track A judges the balance itself.
pub fn improvement_score(current: f64, baseline: f64, target: f64) -> f64 {
    let improvement = (baseline - target).abs() - (current - target).abs();
    if !(improvement.is_finite() && improvement > 0.0) {
        return 0.0;
    }
    let ratio = (improvement / STEP_MAX_DB).min(1.0);
    (ratio * IMPROVEMENT_BONUS).min(1.0)
}

impl ScoringEngine {
    pub fn new(thresholds: ClassificationThresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> ClassificationThresholds {
        self.thresholds
    }

    /// Score every metric and aggregate ("Equal Weight V3").
    ///
    /// Reads the baseline store once per band and never writes to it.
    pub fn score(
        &self,
        inputs: &MetricInputs<'_>,
        reference: &GenreReference,
        baseline: Option<BaselineView<'_>>,
    ) -> crate::Result<ScoreBreakdown> {
        let m = &reference.metrics;
        let lufs_target = m.lufs.resolve("lufs")?;

        let mut per_metric = vec![
            score_metric(MetricKey::Lufs, inputs.lufs, lufs_target),
            score_metric(
                MetricKey::TruePeak,
                inputs.true_peak_dbtp,
                m.true_peak.resolve("truePeak")?,
            ),
            score_metric(
                MetricKey::DynamicRange,
                inputs.dynamic_range_db,
                m.dynamic_range.resolve("dynamicRange")?,
            ),
            score_metric(MetricKey::Lra, inputs.lra_lu, m.lra.resolve("lra")?),
            score_metric(
                MetricKey::StereoCorrelation,
                inputs.stereo_correlation,
                m.stereo_correlation.resolve("stereoCorrelation")?,
            ),
        ];

        // Absolute band energy follows overall loudness, so compensate for it
        let level_shift_db = inputs
            .lufs
            .ok()
            .filter(|lufs| lufs.is_finite())
            .map_or(0.0, |lufs| lufs - lufs_target.target);

        let mut band_tracks = Vec::with_capacity(inputs.bands.len());
        for band in inputs.bands {
            let (result, track) = score_band(band, level_shift_db, baseline);
            per_metric.push(result);
            if let Some(track) = track {
                band_tracks.push(track);
            }
        }

        let scores: Vec<f64> = per_metric.iter().filter_map(|r| r.score).collect();
        let total_score_pct = if scores.is_empty() {
            0.0
        } else {
            scores.iter().sum::<f64>() / scores.len() as f64 * 100.0
        };
        let classification = self.thresholds.classify(total_score_pct);

        log::info!(
            "Score {:.1}% ({}) over {} of {} metrics",
            total_score_pct,
            classification.label(),
            scores.len(),
            per_metric.len()
        );

        Ok(ScoreBreakdown {
            scored_metrics: scores.len(),
            per_metric,
            band_tracks,
            total_score_pct,
            classification,
        })
    }
}

fn score_metric(key: MetricKey, measured: Measured, target: ResolvedTarget) -> MetricResult {
    match measured {
        Ok(value) if value.is_finite() => {
            let deviation = value - target.target;
            MetricResult {
                key,
                value: Some(value),
                target: target.target,
                tolerance: target.tolerance,
                deviation: Some(deviation),
                status: Status::from_sigmas(deviation / target.tolerance),
                score: Some(absolute_score(deviation, target.tolerance)),
                unavailable: None,
            }
        }
        Ok(value) => {
            // -inf true peak of digital silence is measured, but not scorable
            log::debug!("{} measured {} and is left unscored", key, value);
            unavailable(key, target, Unavailable::InsufficientData)
        }
        Err(reason) => unavailable(key, target, reason),
    }
}

fn unavailable(key: MetricKey, target: ResolvedTarget, reason: Unavailable) -> MetricResult {
    MetricResult {
        key,
        value: None,
        target: target.target,
        tolerance: target.tolerance,
        deviation: None,
        status: Status::NoData,
        score: None,
        unavailable: Some(reason),
    }
}

fn score_band(
    band: &SubBandResult,
    level_shift_db: f64,
    baseline: Option<BaselineView<'_>>,
) -> (MetricResult, Option<BandTrack>) {
    let key = MetricKey::Band(band.id.clone());
    let target = ResolvedTarget {
        target: band.target_db,
        tolerance: band.tolerance_sigma,
    };

    let Some(energy) = band.energy_db else {
        return (unavailable(key, target, Unavailable::InsufficientData), None);
    };

    let matched = energy - level_shift_db;
    let track_a = band_absolute_score(matched - band.target_db, band.tolerance_sigma);

    let baseline_db = baseline.and_then(|view| view.store.get(view.session, &band.id));
    let track_b = baseline_db
        .map(|prev| improvement_score(energy, prev, band.target_db))
        .unwrap_or(0.0);

    let result = MetricResult {
        key,
        value: Some(energy),
        target: band.target_db,
        tolerance: band.tolerance_sigma,
        deviation: band.deviation_db,
        status: band.status,
        score: Some(track_a.max(track_b)),
        unavailable: None,
    };
    let track = BandTrack {
        band: band.id.clone(),
        level_shift_db,
        track_a,
        track_b,
        baseline_db,
    };
    (result, Some(track))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reference::load_reference;
    use crate::scoring::baseline::MemoryBaselineStore;

    fn band(id: &str, energy: f64, target: f64, sigma: f64) -> SubBandResult {
        let deviation = energy - target;
        SubBandResult {
            id: id.into(),
            range_hz: [60.0, 250.0],
            energy_db: Some(energy),
            target_db: target,
            tolerance_sigma: sigma,
            deviation_db: Some(deviation),
            deviation_sigmas: Some(deviation / sigma),
            status: Status::from_sigmas(deviation / sigma),
            frames_used: 10,
        }
    }

    fn on_target<'a>(reference: &GenreReference, bands: &'a [SubBandResult]) -> MetricInputs<'a> {
        let m = &reference.metrics;
        MetricInputs {
            lufs: Ok(m.lufs.resolve("lufs").unwrap().target),
            true_peak_dbtp: Ok(m.true_peak.resolve("tp").unwrap().target),
            dynamic_range_db: Ok(m.dynamic_range.resolve("dr").unwrap().target),
            lra_lu: Ok(m.lra.resolve("lra").unwrap().target),
            stereo_correlation: Ok(m.stereo_correlation.resolve("corr").unwrap().target),
            bands,
        }
    }

    #[test]
    fn decay_shape() {
        assert_eq!(tolerance_score(0.0, 1.0, 4.0), 1.0);
        assert_eq!(tolerance_score(-1.0, 1.0, 4.0), 1.0);
        assert!((tolerance_score(2.5, 1.0, 4.0) - 0.5).abs() < 1e-12);
        assert_eq!(tolerance_score(4.0, 1.0, 4.0), 0.0);
        assert_eq!(tolerance_score(9.0, 1.0, 4.0), 0.0);
        assert_eq!(tolerance_score(f64::NAN, 1.0, 4.0), 0.0);
    }

    #[test]
    fn scores_are_monotonic_in_distance() {
        let mut last = 1.0;
        let mut d = 0.0;
        while d < 10.0 {
            let s = absolute_score(d, 2.0);
            assert!(s <= last && (0.0..=1.0).contains(&s));
            last = s;
            d += 0.1;
        }
    }

    #[test]
    fn exactly_on_target_scores_full() {
        let reference = load_reference("pop").unwrap();
        let bands: Vec<SubBandResult> = reference
            .bands
            .iter()
            .map(|b| band(&b.id, b.target_db, b.target_db, b.tolerance_sigma))
            .collect();
        let breakdown = ScoringEngine::default()
            .score(&on_target(&reference, &bands), &reference, None)
            .unwrap();

        assert_eq!(breakdown.scored_metrics, 12);
        assert!(breakdown.per_metric.iter().all(|r| r.score == Some(1.0)));
        assert_eq!(breakdown.total_score_pct, 100.0);
        assert_eq!(breakdown.classification, Classification::Excellent);
    }

    #[test]
    fn level_matching_forgives_overall_loudness() {
        let reference = load_reference("pop").unwrap();
        // Mix is 6 LU hot and every band is 6 dB hot: balance is right
        let bands = vec![band("bass", -22.0, -28.0, 2.5)];
        let mut inputs = on_target(&reference, &bands);
        inputs.lufs = Ok(-3.0);

        let breakdown = ScoringEngine::default().score(&inputs, &reference, None).unwrap();
        let track = &breakdown.band_tracks[0];
        assert_eq!(track.level_shift_db, 6.0);
        assert_eq!(track.track_a, 1.0);

        // LUFS itself is far off and scores zero, the band does not
        let lufs = breakdown.per_metric.iter().find(|r| r.key == MetricKey::Lufs).unwrap();
        assert_eq!(lufs.score, Some(0.0));
        assert_eq!(lufs.status, Status::Fix);
    }

    #[test]
    fn improvement_track_wins_when_higher() {
        let reference = load_reference("pop").unwrap();
        let store = MemoryBaselineStore::new();
        let session = SessionKey::new("user", "session");
        // Previous iteration sat 14 dB under target, this one 10 dB under
        store.set(&session, "bass", -42.0);

        let bands = vec![band("bass", -38.0, -28.0, 2.5)];
        let inputs = on_target(&reference, &bands);
        let view = BaselineView {
            store: &store,
            session: &session,
        };
        let breakdown = ScoringEngine::default()
            .score(&inputs, &reference, Some(view))
            .unwrap();

        let track = &breakdown.band_tracks[0];
        assert_eq!(track.track_a, 0.0);
        assert!(track.track_b >= 0.75);
        assert!(track.track_b > track.track_a);

        let bass = breakdown
            .per_metric
            .iter()
            .find(|r| r.key == MetricKey::Band("bass".into()))
            .unwrap();
        assert_eq!(bass.score, Some(track.track_b));
    }

    #[test]
    fn improvement_scales_and_caps() {
        assert_eq!(improvement_score(-30.0, -34.0, -20.0), 1.0);
        assert!((improvement_score(-32.0, -34.0, -20.0) - 0.6).abs() < 1e-12);
        assert_eq!(improvement_score(-36.0, -34.0, -20.0), 0.0);
        // overshooting past the target counts distance, not direction
        assert_eq!(improvement_score(-18.0, -30.0, -20.0), 1.0);
    }

    #[test]
    fn no_baseline_falls_back_to_absolute() {
        let reference = load_reference("pop").unwrap();
        let store = MemoryBaselineStore::new();
        let session = SessionKey::new("user", "fresh");
        let bands = vec![band("bass", -38.0, -28.0, 2.5)];
        let view = BaselineView {
            store: &store,
            session: &session,
        };
        let breakdown = ScoringEngine::default()
            .score(&on_target(&reference, &bands), &reference, Some(view))
            .unwrap();
        assert_eq!(breakdown.band_tracks[0].track_b, 0.0);
        assert_eq!(breakdown.band_tracks[0].baseline_db, None);
    }

    #[test]
    fn non_finite_loudness_does_not_shift_bands() {
        let reference = load_reference("pop").unwrap();
        let bands = vec![band("bass", -28.0, -28.0, 2.5)];
        let mut inputs = on_target(&reference, &bands);
        inputs.lufs = Ok(f64::NAN);

        let breakdown = ScoringEngine::default().score(&inputs, &reference, None).unwrap();
        let track = &breakdown.band_tracks[0];
        assert_eq!(track.level_shift_db, 0.0);
        assert_eq!(track.track_a, 1.0);

        inputs.lufs = Err(Unavailable::InvalidInput);
        let breakdown = ScoringEngine::default().score(&inputs, &reference, None).unwrap();
        assert_eq!(breakdown.band_tracks[0].track_a, 1.0);
    }

    #[test]
    fn pure_gain_change_counts_as_improvement() {
        let reference = load_reference("pop").unwrap();
        let store = MemoryBaselineStore::new();
        let session = SessionKey::new("user", "gain");
        store.set(&session, "bass", -40.0);

        // Every band 4 dB louder and LUFS 4 LU closer: raw energies moved toward target
        let bands = vec![band("bass", -36.0, -28.0, 2.5)];
        let mut inputs = on_target(&reference, &bands);
        inputs.lufs = Ok(-13.0);
        let view = BaselineView {
            store: &store,
            session: &session,
        };
        let breakdown = ScoringEngine::default()
            .score(&inputs, &reference, Some(view))
            .unwrap();
        let track = &breakdown.band_tracks[0];
        assert_eq!(track.track_b, 1.0);
        // level-matched, the balance is 4 dB under target: inside the sweet spot
        assert_eq!(track.track_a, 1.0);
    }

    #[test]
    fn unavailable_metrics_are_excluded_not_zeroed() {
        let reference = load_reference("pop").unwrap();
        let mut nodata = band("sub", -31.0, -31.0, 3.0);
        nodata.energy_db = None;
        nodata.status = Status::NoData;
        let bands = vec![nodata];

        let mut inputs = on_target(&reference, &bands);
        inputs.dynamic_range_db = Err(Unavailable::InsufficientData);
        inputs.true_peak_dbtp = Ok(f64::NEG_INFINITY);

        let breakdown = ScoringEngine::default().score(&inputs, &reference, None).unwrap();
        assert_eq!(breakdown.scored_metrics, 3);
        assert_eq!(breakdown.total_score_pct, 100.0);

        let dr = breakdown
            .per_metric
            .iter()
            .find(|r| r.key == MetricKey::DynamicRange)
            .unwrap();
        assert_eq!(dr.status, Status::NoData);
        assert_eq!(dr.score, None);
        assert_eq!(dr.unavailable, Some(Unavailable::InsufficientData));
    }

    #[test]
    fn nothing_scorable_yields_zero_not_error() {
        let reference = load_reference("pop").unwrap();
        let inputs = MetricInputs {
            lufs: Err(Unavailable::NotMeasured),
            true_peak_dbtp: Err(Unavailable::InvalidInput),
            dynamic_range_db: Err(Unavailable::InsufficientData),
            lra_lu: Err(Unavailable::NotMeasured),
            stereo_correlation: Err(Unavailable::NotMeasured),
            bands: &[],
        };
        let breakdown = ScoringEngine::default().score(&inputs, &reference, None).unwrap();
        assert_eq!(breakdown.scored_metrics, 0);
        assert_eq!(breakdown.total_score_pct, 0.0);
        assert_eq!(breakdown.classification, Classification::Poor);
    }

    #[test]
    fn repeated_runs_are_identical() {
        let reference = load_reference("rock").unwrap();
        let store = MemoryBaselineStore::new();
        let session = SessionKey::new("u", "s");
        store.set(&session, "mid", -45.0);
        let bands = vec![band("mid", -43.0, -38.5, 2.5), band("sub", -30.0, -34.0, 3.0)];
        let mut inputs = on_target(&reference, &bands);
        inputs.lufs = Ok(-11.2);
        inputs.stereo_correlation = Ok(0.93);

        let engine = ScoringEngine::default();
        let view = BaselineView {
            store: &store,
            session: &session,
        };
        let first = engine.score(&inputs, &reference, Some(view)).unwrap();
        let second = engine.score(&inputs, &reference, Some(view)).unwrap();
        assert_eq!(first, second);
        assert_eq!(
            first.total_score_pct.to_bits(),
            second.total_score_pct.to_bits()
        );
    }
}
