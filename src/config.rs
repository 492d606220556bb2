use serde::Deserialize;
use std::path::{Path, PathBuf};

use mixgrade::scoring::ClassificationThresholds;

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub true_peak: TruePeakConfig,
    #[serde(default)]
    pub scoring: ScoringConfig,
}

#[derive(Debug, Deserialize)]
pub struct AnalysisConfig {
    #[serde(default = "default_genre")]
    pub genre: String,
    #[serde(default = "default_fft_size")]
    pub fft_size: usize,
    /// Hop between spectrum frames; half the FFT size when unset
    #[serde(default)]
    pub hop: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct TruePeakConfig {
    #[serde(default = "default_native")]
    pub native: bool,
    #[serde(default = "default_ffmpeg")]
    pub ffmpeg_path: PathBuf,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

#[derive(Debug, Default, Deserialize)]
pub struct ScoringConfig {
    #[serde(default)]
    pub thresholds: ClassificationThresholds,
    #[serde(default)]
    pub baseline: Option<PathBuf>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            genre: default_genre(),
            fft_size: default_fft_size(),
            hop: None,
        }
    }
}

impl Default for TruePeakConfig {
    fn default() -> Self {
        Self {
            native: default_native(),
            ffmpeg_path: default_ffmpeg(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

fn default_genre() -> String { "pop".into() }
fn default_fft_size() -> usize { mixgrade::audio::spectrum::DEFAULT_FFT_SIZE }
fn default_native() -> bool { true }
fn default_ffmpeg() -> PathBuf { "ffmpeg".into() }
fn default_timeout_ms() -> u64 { 30_000 }

pub fn load_config(path: &Path) -> Option<Config> {
    let content = std::fs::read_to_string(path).ok()?;
    match toml::from_str(&content) {
        Ok(config) => Some(config),
        Err(err) => {
            log::debug!("Invalid config {}: {}", path.display(), err);
            None
        }
    }
}
