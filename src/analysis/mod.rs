pub mod dynamics;
pub mod ffmpeg;
pub mod oversample;
pub mod spectral;
pub mod true_peak;

pub use dynamics::{
    crest_factor, dynamic_range, interpret_lra, CrestFactor, DynamicRange, LoudnessRange,
};
pub use ffmpeg::FfmpegOversampler;
pub use oversample::{InterpolatingOversampler, OversampleError, Oversampler};
pub use spectral::{analyze_bands, SpectralAnalysis, SubBandResult, Suggestion};
pub use true_peak::{PeakMethod, TruePeakEstimator, TruePeakResult};
