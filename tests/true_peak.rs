use mixgrade::analysis::{OversampleError, Oversampler, PeakMethod, TruePeakEstimator};
use std::f64::consts::PI;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// 997 Hz sampled at exactly four samples per cycle with a 45° offset: every
/// sample lands 3 dB under the crest, so the samples read -0.3 dBFS while the
/// waveform peaks near +2.7 dBTP.
fn quarter_rate_tone() -> (Vec<f32>, u32) {
    let sr = 4 * 997;
    let amp = 10f64.powf(-0.3 / 20.0) * std::f64::consts::SQRT_2;
    let samples = (0..sr as usize)
        .map(|i| (amp * (2.0 * PI * 997.0 * i as f64 / sr as f64 + PI / 4.0).sin()) as f32)
        .collect();
    (samples, sr)
}

struct Failing {
    calls: Arc<AtomicUsize>,
}

impl Oversampler for Failing {
    fn name(&self) -> &'static str {
        "failing"
    }

    fn peak(&self, _samples: &[f32], _sample_rate: u32) -> Result<f64, OversampleError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(OversampleError::Parse("no summary".into()))
    }
}

#[test]
fn inter_sample_peak_exceeds_full_scale() {
    let (samples, sr) = quarter_rate_tone();
    let result = TruePeakEstimator::interpolating()
        .estimate(&samples, &samples, sr)
        .unwrap();

    assert!((result.sample_peak_dbfs - (-0.3)).abs() < 0.01);
    assert!(result.true_peak_dbtp > result.sample_peak_dbfs);
    assert!(result.true_peak_dbtp > 0.0);
    assert!(result.hard && result.warn);
    assert!(!result.broadcast_compliant);
}

#[test]
fn failing_engine_falls_back_to_interpolation() {
    let (samples, sr) = quarter_rate_tone();
    let calls = Arc::new(AtomicUsize::new(0));
    let estimator = TruePeakEstimator::with_native(Box::new(Failing {
        calls: calls.clone(),
    }));

    let result = estimator.estimate(&samples, &samples, sr).unwrap();
    assert_eq!(result.method, PeakMethod::Interpolated);
    assert!(calls.load(Ordering::SeqCst) >= 1);

    let direct = TruePeakEstimator::interpolating()
        .estimate(&samples, &samples, sr)
        .unwrap();
    assert_eq!(result.true_peak_dbtp, direct.true_peak_dbtp);
}

#[test]
fn quiet_tone_is_broadcast_compliant() {
    let sr = 48000;
    let samples: Vec<f32> = (0..sr)
        .map(|i| 0.25 * (2.0 * std::f32::consts::PI * 1000.0 * i as f32 / sr as f32).sin())
        .collect();
    let result = TruePeakEstimator::interpolating()
        .estimate(&samples, &samples, sr as u32)
        .unwrap();
    assert!(result.true_peak_dbtp >= result.sample_peak_dbfs);
    assert!(result.true_peak_dbtp < -11.0);
    assert!(result.broadcast_compliant && !result.warn && !result.hard);
}
