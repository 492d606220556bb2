//! Fan-out of the independent analyzers over one buffer, then scoring.

use serde::{Serialize, Serializer};

use crate::analysis::dynamics::{self, CrestFactor, DynamicRange, LoudnessRange};
use crate::analysis::spectral::{self, SpectralAnalysis};
use crate::analysis::true_peak::{TruePeakEstimator, TruePeakResult};
use crate::audio::loudness::{self, LoudnessMeasurement};
use crate::audio::spectrum::{self, DEFAULT_FFT_SIZE};
use crate::audio::ChannelBuffer;
use crate::error::Unavailable;
use crate::reference::GenreReference;
use crate::scoring::{record_baseline, BaselineView, MetricInputs, ScoreBreakdown, ScoringEngine};
use crate::MixgradeError;

/// A metric that was measured, or the reason it was not.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Measurement<T> {
    Measured(T),
    Unavailable(Unavailable),
}

impl<T> Measurement<T> {
    pub fn value(&self) -> Result<&T, Unavailable> {
        match self {
            Self::Measured(v) => Ok(v),
            Self::Unavailable(reason) => Err(*reason),
        }
    }

    pub fn as_option(&self) -> Option<&T> {
        self.value().ok()
    }

    fn from_option(value: Option<T>, reason: Unavailable) -> Self {
        value.map_or(Self::Unavailable(reason), Self::Measured)
    }

    fn from_result(value: crate::Result<T>) -> Self {
        match value {
            Ok(v) => Self::Measured(v),
            Err(err) => {
                log::warn!("Metric unavailable: {}", err);
                Self::Unavailable(err.unavailable())
            }
        }
    }
}

impl<T: Serialize> Serialize for Measurement<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        struct Missing {
            unavailable: Unavailable,
        }

        match self {
            Self::Measured(v) => v.serialize(serializer),
            Self::Unavailable(reason) => Missing {
                unavailable: *reason,
            }
            .serialize(serializer),
        }
    }
}

/// Values supplied from outside that replace the measured ones.
#[derive(Clone, Copy, Debug, Default)]
pub struct Overrides {
    pub lufs: Option<f64>,
    pub lra_lu: Option<f64>,
}

fn checked_override(name: &str, value: f64) -> crate::Result<f64> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(MixgradeError::input(format!("{name} override must be finite, got {value}")))
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct AnalysisReport {
    pub duration_s: f64,
    pub sample_rate: u32,
    pub true_peak: Measurement<TruePeakResult>,
    pub dynamic_range: Measurement<DynamicRange>,
    pub crest_factor: Measurement<CrestFactor>,
    pub loudness: LoudnessMeasurement,
    /// Loudness scored: the override when given, otherwise measured
    pub lufs: Measurement<f64>,
    pub loudness_range: Measurement<LoudnessRange>,
    pub spectral: SpectralAnalysis,
}

impl AnalysisReport {
    pub fn metric_inputs(&self) -> MetricInputs<'_> {
        MetricInputs {
            lufs: self.lufs.value().copied(),
            true_peak_dbtp: self.true_peak.value().map(|tp| tp.true_peak_dbtp),
            dynamic_range_db: self.dynamic_range.value().map(|dr| dr.dr_db),
            lra_lu: self.loudness_range.value().map(|lra| lra.lra_lu),
            stereo_correlation: self
                .loudness
                .stereo_correlation
                .ok_or(Unavailable::InsufficientData),
            bands: &self.spectral.bands,
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct Evaluation {
    pub analysis: AnalysisReport,
    pub score: ScoreBreakdown,
}

pub struct Pipeline {
    estimator: TruePeakEstimator,
    engine: ScoringEngine,
    fft_size: usize,
    hop: usize,
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new(TruePeakEstimator::default(), ScoringEngine::default())
    }
}

impl Pipeline {
    pub fn new(estimator: TruePeakEstimator, engine: ScoringEngine) -> Self {
        Self {
            estimator,
            engine,
            fft_size: DEFAULT_FFT_SIZE,
            hop: DEFAULT_FFT_SIZE / 2,
        }
    }

    pub fn with_fft(mut self, fft_size: usize, hop: usize) -> Self {
        self.fft_size = fft_size;
        self.hop = hop;
        self
    }

    /// Run every analyzer. Only a bad reference or FFT setup fails the run;
    /// anything else turns into an unavailable metric.
    pub fn analyze(
        &self,
        buffer: &ChannelBuffer,
        reference: &GenreReference,
        overrides: Overrides,
    ) -> crate::Result<AnalysisReport> {
        reference.validate()?;
        if self.fft_size < 2 || !self.fft_size.is_power_of_two() {
            return Err(MixgradeError::config(format!(
                "fft size must be a power of two, got {}",
                self.fft_size
            )));
        }

        let ((true_peak, (dynamic_range, crest_factor)), (loudness, spectral)) = rayon::join(
            || {
                rayon::join(
                    || {
                        self.estimator
                            .estimate(buffer.left(), buffer.right(), buffer.sample_rate())
                    },
                    || {
                        let mid = buffer.mid();
                        (
                            dynamics::dynamic_range(&mid, buffer.sample_rate()),
                            dynamics::crest_factor(&mid, buffer.sample_rate()),
                        )
                    },
                )
            },
            || {
                rayon::join(
                    || loudness::measure(buffer),
                    || {
                        let frames = spectrum::compute_frames(buffer, self.fft_size, self.hop);
                        spectral::analyze_bands(&frames, reference)
                    },
                )
            },
        );
        let spectral = spectral?;

        let lufs = match overrides.lufs {
            Some(v) => Measurement::from_result(checked_override("LUFS", v)),
            None => Measurement::from_option(loudness.integrated_lufs, Unavailable::InsufficientData),
        };
        let loudness_range = match overrides.lra_lu.or(loudness.loudness_range_lu) {
            Some(v) => Measurement::from_result(dynamics::interpret_lra(v)),
            None => Measurement::Unavailable(Unavailable::InsufficientData),
        };

        let report = AnalysisReport {
            duration_s: buffer.duration(),
            sample_rate: buffer.sample_rate(),
            true_peak: Measurement::from_result(true_peak),
            dynamic_range: Measurement::from_option(dynamic_range, Unavailable::InsufficientData),
            crest_factor: Measurement::from_option(crest_factor, Unavailable::InsufficientData),
            loudness,
            lufs,
            loudness_range,
            spectral,
        };
        log::debug!(
            "Analysis done: {:.1}s, {} of {} spectrum frames usable",
            report.duration_s,
            report.spectral.frames_valid,
            report.spectral.frames_total
        );
        Ok(report)
    }

    /// Analyze and score one iteration. With a baseline the improvement
    /// track is read first, then this iteration's band energies are written
    /// back for the next one.
    pub fn evaluate(
        &self,
        buffer: &ChannelBuffer,
        reference: &GenreReference,
        overrides: Overrides,
        baseline: Option<BaselineView<'_>>,
    ) -> crate::Result<Evaluation> {
        let analysis = self.analyze(buffer, reference, overrides)?;
        let score = self
            .engine
            .score(&analysis.metric_inputs(), reference, baseline)?;
        if let Some(view) = baseline {
            record_baseline(view.store, view.session, &analysis.spectral.bands);
        }
        Ok(Evaluation { analysis, score })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reference::load_reference;
    use std::f32::consts::PI;

    fn tone(freq: f32, amp: f32, seconds: f32, sr: u32) -> ChannelBuffer {
        let n = (seconds * sr as f32) as usize;
        let samples: Vec<f32> = (0..n)
            .map(|i| amp * (2.0 * PI * freq * i as f32 / sr as f32).sin())
            .collect();
        ChannelBuffer::from_mono(samples, sr).unwrap()
    }

    #[test]
    fn tone_is_fully_measured() {
        let reference = load_reference("pop").unwrap();
        let buffer = tone(1000.0, 0.5, 5.0, 44100);
        let report = Pipeline::default()
            .analyze(&buffer, &reference, Overrides::default())
            .unwrap();

        let tp = report.true_peak.as_option().unwrap();
        assert!((tp.sample_peak_dbfs - (-6.02)).abs() < 0.05);
        assert!(tp.true_peak_dbtp >= tp.sample_peak_dbfs);
        assert!(report.lufs.as_option().is_some());
        assert!(report.loudness.stereo_correlation.unwrap() > 0.999);
        assert!(report.spectral.valid);
    }

    #[test]
    fn overrides_replace_measured_loudness() {
        let reference = load_reference("pop").unwrap();
        let buffer = tone(440.0, 0.3, 2.0, 44100);
        let report = Pipeline::default()
            .analyze(
                &buffer,
                &reference,
                Overrides {
                    lufs: Some(-9.0),
                    lra_lu: Some(6.0),
                },
            )
            .unwrap();
        assert_eq!(report.lufs, Measurement::Measured(-9.0));
        assert_eq!(report.loudness_range.as_option().unwrap().lra_lu, 6.0);
    }

    #[test]
    fn short_input_degrades_instead_of_failing() {
        let reference = load_reference("pop").unwrap();
        let buffer = tone(440.0, 0.3, 0.2, 44100);
        let evaluation = Pipeline::default()
            .evaluate(&buffer, &reference, Overrides::default(), None)
            .unwrap();

        let report = &evaluation.analysis;
        assert_eq!(
            report.dynamic_range,
            Measurement::Unavailable(Unavailable::InsufficientData)
        );
        assert_eq!(report.lufs.value(), Err(Unavailable::InsufficientData));
        assert!(report.true_peak.as_option().is_some());
        assert!(evaluation.score.scored_metrics < evaluation.score.per_metric.len());
    }

    #[test]
    fn invalid_lra_override_is_unavailable() {
        let reference = load_reference("pop").unwrap();
        let buffer = tone(440.0, 0.3, 1.0, 44100);
        let report = Pipeline::default()
            .analyze(
                &buffer,
                &reference,
                Overrides {
                    lufs: None,
                    lra_lu: Some(-2.0),
                },
            )
            .unwrap();
        assert_eq!(
            report.loudness_range.value().err(),
            Some(Unavailable::InvalidInput)
        );
    }

    #[test]
    fn non_finite_lufs_override_is_invalid_input() {
        let reference = load_reference("pop").unwrap();
        let buffer = tone(440.0, 0.3, 3.0, 44100);
        let evaluation = Pipeline::default()
            .evaluate(
                &buffer,
                &reference,
                Overrides {
                    lufs: Some(f64::NAN),
                    lra_lu: None,
                },
                None,
            )
            .unwrap();

        assert_eq!(
            evaluation.analysis.lufs.value().err(),
            Some(Unavailable::InvalidInput)
        );
        let lufs = evaluation
            .score
            .per_metric
            .iter()
            .find(|m| m.key == crate::scoring::MetricKey::Lufs)
            .unwrap();
        assert_eq!(lufs.unavailable, Some(Unavailable::InvalidInput));
        // the bands are still level-matched against something finite
        assert!(evaluation
            .score
            .band_tracks
            .iter()
            .all(|t| t.level_shift_db == 0.0 && t.track_a.is_finite()));
    }

    #[test]
    fn bad_fft_size_is_a_configuration_error() {
        let reference = load_reference("pop").unwrap();
        let buffer = tone(440.0, 0.3, 1.0, 44100);
        let err = Pipeline::default()
            .with_fft(1000, 500)
            .analyze(&buffer, &reference, Overrides::default())
            .unwrap_err();
        assert!(matches!(err, MixgradeError::Configuration(_)));
    }

    #[test]
    fn unavailable_serializes_with_reason() {
        let m: Measurement<f64> = Measurement::Unavailable(Unavailable::NotMeasured);
        assert_eq!(
            serde_json::to_string(&m).unwrap(),
            r#"{"unavailable":"not_measured"}"#
        );
        assert_eq!(serde_json::to_string(&Measurement::Measured(1.5)).unwrap(), "1.5");
    }
}
