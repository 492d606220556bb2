mod cli;
mod config;

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::time::Duration;

use cli::Cli;
use mixgrade::analysis::{FfmpegOversampler, TruePeakEstimator};
use mixgrade::pipeline::{Overrides, Pipeline};
use mixgrade::reference;
use mixgrade::report::Report;
use mixgrade::scoring::{BaselineStore, BaselineView, MemoryBaselineStore, ScoringEngine, SessionKey};

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let mut cli = Cli::parse();
    let mut thresholds = Default::default();
    let mut hop = None;

    // Load config: explicit --config path, or auto-detect mixgrade.toml / global config
    let config_path = cli.config.clone().or_else(|| {
        let local = PathBuf::from("mixgrade.toml");
        if local.exists() {
            return Some(local);
        }
        if let Some(home) = dirs::home_dir() {
            let xdg = home.join(".config").join("mixgrade").join("config.toml");
            if xdg.exists() {
                return Some(xdg);
            }
        }
        if let Some(config_dir) = dirs::config_dir() {
            let platform = config_dir.join("mixgrade").join("config.toml");
            if platform.exists() {
                return Some(platform);
            }
        }
        None
    });
    if let Some(ref path) = config_path {
        if let Some(cfg) = config::load_config(path) {
            log::info!("Loaded config from {}", path.display());
            // Merge: config values apply only when CLI is at its default
            if cli.genre == "pop" { cli.genre = cfg.analysis.genre; }
            if cli.fft_size == 4096 { cli.fft_size = cfg.analysis.fft_size; }
            if cli.ffmpeg.as_os_str() == "ffmpeg" { cli.ffmpeg = cfg.true_peak.ffmpeg_path; }
            if cli.peak_timeout_ms == 30_000 { cli.peak_timeout_ms = cfg.true_peak.timeout_ms; }
            if !cfg.true_peak.native { cli.no_native_peak = true; }
            if cli.baseline.is_none() {
                cli.baseline = cfg.scoring.baseline;
            }
            thresholds = cfg.scoring.thresholds;
            hop = cfg.analysis.hop;
        } else {
            log::warn!("Failed to load config from {}", path.display());
        }
    }

    // List genres mode
    if cli.list_genres {
        println!("Available genres:");
        for name in reference::list_genres() {
            match reference::load_reference(&name) {
                Ok(r) => println!("  {:<12} {}", name, r.display_name),
                Err(_) => println!("  {}", name),
            }
        }
        return Ok(());
    }

    if cli.inputs.is_empty() {
        anyhow::bail!("At least one input audio file is required");
    }
    for input in &cli.inputs {
        if !input.exists() {
            anyhow::bail!("Input file not found: {}", input.display());
        }
    }

    let reference = reference::load_reference(&cli.genre)
        .with_context(|| format!("Failed to load genre reference '{}'", cli.genre))?;

    log::info!("mixgrade - mastering quality analysis");
    log::info!("Genre: {} ({})", reference.display_name, reference.genre);
    log::info!("Session: {}/{}", cli.user, cli.session);

    let estimator = if cli.no_native_peak {
        TruePeakEstimator::interpolating()
    } else {
        log::info!("Native true peak via {}", cli.ffmpeg.display());
        TruePeakEstimator::with_native(Box::new(FfmpegOversampler::new(
            cli.ffmpeg.clone(),
            Duration::from_millis(cli.peak_timeout_ms),
        )))
    };
    let pipeline = Pipeline::new(estimator, ScoringEngine::new(thresholds))
        .with_fft(cli.fft_size, hop.unwrap_or(cli.fft_size / 2));

    let store = match cli.baseline {
        Some(ref path) if path.exists() => MemoryBaselineStore::load(path)?,
        _ => MemoryBaselineStore::new(),
    };
    let session = SessionKey::new(cli.user.clone(), cli.session.clone());
    if cli.reset_baseline {
        log::info!("Clearing baseline for {}/{}", cli.user, cli.session);
        store.clear(&session);
    }
    let overrides = Overrides {
        lufs: cli.lufs,
        lra_lu: cli.lra,
    };

    let pb = ProgressBar::new(cli.inputs.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} files {msg}")
            .context("Invalid progress bar template")?
            .progress_chars("=>-"),
    );

    for (i, input) in cli.inputs.iter().enumerate() {
        pb.set_message(input.display().to_string());
        let buffer = mixgrade::audio::decode_audio(input)?;
        let view = BaselineView {
            store: &store,
            session: &session,
        };
        let evaluation = pipeline
            .evaluate(&buffer, &reference, overrides, Some(view))
            .with_context(|| format!("Failed to analyze {}", input.display()))?;

        let report = Report {
            input: input.display().to_string(),
            genre: &reference.genre,
            iteration: i + 1,
            evaluation: &evaluation,
        };
        let output = if cli.json {
            report.to_json()?
        } else {
            report.to_text()
        };
        pb.suspend(|| println!("{}", output));
        pb.inc(1);
    }

    pb.finish_with_message("done");

    if let Some(ref path) = cli.baseline {
        store.save(path)?;
        log::info!("Saved baseline to {}", path.display());
    }
    Ok(())
}
