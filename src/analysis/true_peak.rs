use serde::Serialize;

use super::oversample::{InterpolatingOversampler, Oversampler};
use crate::audio::decode::validate_channels;

/// Above this the mix is not broadcast compliant.
pub const WARN_DBTP: f64 = -1.0;
/// At or above this the mix clips a reconstruction filter.
pub const HARD_DBTP: f64 = 0.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PeakMethod {
    Native,
    Interpolated,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct ChannelPeak {
    pub sample_peak_dbfs: f64,
    pub true_peak_dbtp: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct TruePeakResult {
    pub true_peak_dbtp: f64,
    pub sample_peak_dbfs: f64,
    pub left: ChannelPeak,
    pub right: ChannelPeak,
    pub warn: bool,
    pub hard: bool,
    pub broadcast_compliant: bool,
    pub method: PeakMethod,
}

/// 4x-oversampled true-peak estimation.
///
/// An optional native engine is tried first; any failure falls back to the
/// in-process interpolator, so estimation only fails on bad input.
pub struct TruePeakEstimator {
    native: Option<Box<dyn Oversampler>>,
    fallback: InterpolatingOversampler,
}

impl Default for TruePeakEstimator {
    fn default() -> Self {
        Self::interpolating()
    }
}

impl TruePeakEstimator {
    /// Estimator without a native engine.
    pub fn interpolating() -> Self {
        Self {
            native: None,
            fallback: InterpolatingOversampler,
        }
    }

    pub fn with_native(native: Box<dyn Oversampler>) -> Self {
        Self {
            native: Some(native),
            fallback: InterpolatingOversampler,
        }
    }

    pub fn estimate(
        &self,
        left: &[f32],
        right: &[f32],
        sample_rate: u32,
    ) -> crate::Result<TruePeakResult> {
        validate_channels(left, right, sample_rate)?;

        let (left_tp, right_tp, method) = match self.native_peaks(left, right, sample_rate) {
            Some((l, r)) => (l, r, PeakMethod::Native),
            None => (
                self.fallback.peak(left, sample_rate).unwrap_or_default(),
                self.fallback.peak(right, sample_rate).unwrap_or_default(),
                PeakMethod::Interpolated,
            ),
        };

        let left = channel_peak(left, left_tp);
        let right = channel_peak(right, right_tp);
        let true_peak_dbtp = left.true_peak_dbtp.max(right.true_peak_dbtp);
        let sample_peak_dbfs = left.sample_peak_dbfs.max(right.sample_peak_dbfs);

        log::debug!(
            "True peak {:.2} dBTP, sample peak {:.2} dBFS ({:?})",
            true_peak_dbtp,
            sample_peak_dbfs,
            method
        );

        Ok(TruePeakResult {
            true_peak_dbtp,
            sample_peak_dbfs,
            left,
            right,
            warn: true_peak_dbtp > WARN_DBTP,
            hard: true_peak_dbtp >= HARD_DBTP,
            broadcast_compliant: true_peak_dbtp <= WARN_DBTP,
            method,
        })
    }

    fn native_peaks(&self, left: &[f32], right: &[f32], sample_rate: u32) -> Option<(f64, f64)> {
        let native = self.native.as_ref()?;
        let measured = native
            .peak(left, sample_rate)
            .and_then(|l| native.peak(right, sample_rate).map(|r| (l, r)));
        match measured {
            Ok(peaks) => Some(peaks),
            Err(err) => {
                log::warn!(
                    "{} true-peak engine failed, using interpolation: {}",
                    native.name(),
                    err
                );
                None
            }
        }
    }
}

fn to_db(linear: f64) -> f64 {
    if linear > 0.0 {
        20.0 * linear.log10()
    } else {
        f64::NEG_INFINITY
    }
}

/// Oversampled estimates never report below the raw sample peak.
fn channel_peak(samples: &[f32], oversampled: f64) -> ChannelPeak {
    let sample_peak = samples.iter().fold(0.0f64, |m, &s| m.max((s as f64).abs()));
    let true_peak = if oversampled.is_finite() {
        oversampled.max(sample_peak)
    } else {
        sample_peak
    };
    ChannelPeak {
        sample_peak_dbfs: to_db(sample_peak),
        true_peak_dbtp: to_db(true_peak),
    }
}
