use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "mixgrade", about = "Mastering quality analysis against genre references")]
pub struct Cli {
    /// Audio files (WAV, MP3, FLAC, OGG), scored in order as iterations of one session
    pub inputs: Vec<PathBuf>,

    /// Genre reference: embedded name or path to a JSON reference
    #[arg(short, long, default_value = "pop")]
    pub genre: String,

    /// User owning the session baseline
    #[arg(long, default_value = "local")]
    pub user: String,

    /// Session the iterations belong to
    #[arg(long, default_value = "default")]
    pub session: String,

    /// JSON baseline store, loaded before and saved after the run
    #[arg(long)]
    pub baseline: Option<PathBuf>,

    /// Forget this session's baseline before scoring
    #[arg(long)]
    pub reset_baseline: bool,

    /// Print JSON instead of text
    #[arg(long)]
    pub json: bool,

    /// Skip ffmpeg and use the built-in true-peak interpolator
    #[arg(long)]
    pub no_native_peak: bool,

    /// FFmpeg binary used for native true-peak measurement
    #[arg(long, default_value = "ffmpeg")]
    pub ffmpeg: PathBuf,

    /// Timeout for one native true-peak measurement
    #[arg(long, default_value_t = 30_000)]
    pub peak_timeout_ms: u64,

    /// Spectrum FFT size (power of two)
    #[arg(long, default_value_t = 4096)]
    pub fft_size: usize,

    /// Use this integrated loudness (LUFS) instead of measuring it
    #[arg(long, allow_hyphen_values = true)]
    pub lufs: Option<f64>,

    /// Use this loudness range (LU) instead of measuring it
    #[arg(long)]
    pub lra: Option<f64>,

    /// Config file (default: mixgrade.toml, then the user config directory)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// List embedded genre references and exit
    #[arg(long)]
    pub list_genres: bool,
}
