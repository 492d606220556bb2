use std::time::Duration;
use thiserror::Error;

/// Oversampling factor used by every implementation.
pub const OVERSAMPLE_FACTOR: usize = 4;

const TAPS_PER_PHASE: usize = 12;

/// Linear-phase 48-tap interpolation filter from ITU-R BS.1770-4 Annex 2,
/// split into its four polyphase branches.
const PHASES: [[f64; TAPS_PER_PHASE]; OVERSAMPLE_FACTOR] = [
    [
        0.001_708_984_375_0,
        0.010_986_328_125_0,
        -0.019_653_320_312_5,
        0.033_203_125_000_0,
        -0.059_448_242_187_5,
        0.137_329_101_562_5,
        0.972_167_968_750_0,
        -0.102_294_921_875_0,
        0.047_607_421_875_0,
        -0.026_611_328_125_0,
        0.014_892_578_125_0,
        -0.008_300_781_250_0,
    ],
    [
        -0.029_174_804_687_5,
        0.029_296_875_000_0,
        -0.051_757_812_500_0,
        0.089_111_328_125_0,
        -0.166_503_906_250_0,
        0.465_087_890_625_0,
        0.779_785_156_250_0,
        -0.200_317_382_812_5,
        0.101_562_500_000_0,
        -0.058_227_539_062_5,
        0.033_081_054_687_5,
        -0.018_920_898_437_5,
    ],
    [
        -0.018_920_898_437_5,
        0.033_081_054_687_5,
        -0.058_227_539_062_5,
        0.101_562_500_000_0,
        -0.200_317_382_812_5,
        0.779_785_156_250_0,
        0.465_087_890_625_0,
        -0.166_503_906_250_0,
        0.089_111_328_125_0,
        -0.051_757_812_500_0,
        0.029_296_875_000_0,
        -0.029_174_804_687_5,
    ],
    [
        -0.008_300_781_250_0,
        0.014_892_578_125_0,
        -0.026_611_328_125_0,
        0.047_607_421_875_0,
        -0.102_294_921_875_0,
        0.972_167_968_750_0,
        0.137_329_101_562_5,
        -0.059_448_242_187_5,
        0.033_203_125_000_0,
        -0.019_653_320_312_5,
        0.010_986_328_125_0,
        0.001_708_984_375_0,
    ],
];

#[derive(Debug, Error)]
pub enum OversampleError {
    #[error("oversampling engine unavailable: {0}")]
    Unavailable(std::io::Error),

    #[error("oversampling engine timed out after {0:?}")]
    Timeout(Duration),

    #[error("oversampling engine was cancelled")]
    Cancelled,

    #[error("oversampling engine exited with {status}: {stderr}")]
    Exit { status: String, stderr: String },

    #[error("could not read oversampling engine output: {0}")]
    Parse(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// A way of estimating the 4x-oversampled peak of one channel.
pub trait Oversampler: Send + Sync {
    fn name(&self) -> &'static str;

    /// Linear peak magnitude of the oversampled channel.
    fn peak(&self, samples: &[f32], sample_rate: u32) -> Result<f64, OversampleError>;
}

/// In-process polyphase FIR interpolation. Never fails.
#[derive(Clone, Copy, Debug, Default)]
pub struct InterpolatingOversampler;

impl InterpolatingOversampler {
    pub fn peak_of(samples: &[f32]) -> f64 {
        let mut history = [0.0f64; TAPS_PER_PHASE];
        let mut write_pos = 0;
        let mut peak = 0.0f64;

        // Trailing zeros flush the filter so the last samples are interpolated too
        let padded = samples
            .iter()
            .map(|&s| s as f64)
            .chain(std::iter::repeat(0.0).take(TAPS_PER_PHASE));

        for sample in padded {
            history[write_pos] = sample;
            write_pos = (write_pos + 1) % TAPS_PER_PHASE;

            for phase in &PHASES {
                let mut sum = 0.0;
                for (tap, coeff) in phase.iter().enumerate() {
                    let idx = (write_pos + TAPS_PER_PHASE - 1 - tap) % TAPS_PER_PHASE;
                    sum += coeff * history[idx];
                }
                peak = peak.max(sum.abs());
            }
        }

        peak
    }
}

impl Oversampler for InterpolatingOversampler {
    fn name(&self) -> &'static str {
        "interpolated"
    }

    fn peak(&self, samples: &[f32], _sample_rate: u32) -> Result<f64, OversampleError> {
        Ok(Self::peak_of(samples))
    }
}
