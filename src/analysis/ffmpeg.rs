use std::io::{Read, Write};
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use super::oversample::{OversampleError, Oversampler};

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Native true-peak measurement through ffmpeg's `ebur128` filter.
///
/// Samples are streamed as raw `f32le` over stdin, one channel per
/// invocation, and the summary block on stderr is parsed for the peak.
pub struct FfmpegOversampler {
    program: PathBuf,
    timeout: Duration,
    cancel: Arc<AtomicBool>,
}

impl FfmpegOversampler {
    pub fn new(program: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Share a cancel flag; setting it kills any running invocation.
    pub fn with_cancel(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = cancel;
        self
    }

    fn args(sample_rate: u32) -> Vec<String> {
        vec![
            "-hide_banner".into(),
            "-nostats".into(),
            "-f".into(), "f32le".into(),
            "-ar".into(), sample_rate.to_string(),
            "-ac".into(), "1".into(),
            "-i".into(), "pipe:0".into(),
            "-af".into(), "ebur128=peak=true".into(),
            "-f".into(), "null".into(),
            "-".into(),
        ]
    }
}

impl Oversampler for FfmpegOversampler {
    fn name(&self) -> &'static str {
        "ffmpeg"
    }

    fn peak(&self, samples: &[f32], sample_rate: u32) -> Result<f64, OversampleError> {
        let mut child = Command::new(&self.program)
            .args(Self::args(sample_rate))
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(OversampleError::Unavailable)?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| OversampleError::Parse("ffmpeg stdin not available".into()))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| OversampleError::Parse("ffmpeg stderr not available".into()))?;

        let bytes: Vec<u8> = samples.iter().flat_map(|s| s.to_le_bytes()).collect();
        // A killed child closes the pipe; the write error is expected then
        let writer = thread::spawn(move || {
            let _ = stdin.write_all(&bytes);
        });
        let reader = thread::spawn(move || {
            let mut text = String::new();
            let _ = stderr.read_to_string(&mut text);
            text
        });

        let started = Instant::now();
        let status = loop {
            if let Some(status) = child.try_wait()? {
                break status;
            }
            if self.cancel.load(Ordering::Relaxed) {
                let _ = child.kill();
                let _ = child.wait();
                return Err(OversampleError::Cancelled);
            }
            if started.elapsed() >= self.timeout {
                let _ = child.kill();
                let _ = child.wait();
                return Err(OversampleError::Timeout(self.timeout));
            }
            thread::sleep(POLL_INTERVAL);
        };

        let _ = writer.join();
        let output = reader.join().unwrap_or_default();

        if !status.success() {
            let tail: String = output.lines().rev().take(5).collect::<Vec<_>>().join(" | ");
            return Err(OversampleError::Exit {
                status: status.to_string(),
                stderr: tail,
            });
        }

        let peak_db = parse_true_peak(&output)
            .ok_or_else(|| OversampleError::Parse("no true peak in ebur128 summary".into()))?;
        Ok(10.0_f64.powf(peak_db / 20.0))
    }
}

/// Pull the `Peak:` value (dBFS) out of the `True peak:` summary section.
pub fn parse_true_peak(stderr: &str) -> Option<f64> {
    let section = stderr.rsplit_once("True peak:")?.1;
    section
        .lines()
        .find_map(|line| line.trim().strip_prefix("Peak:"))
        .and_then(|rest| rest.split_whitespace().next())
        .and_then(|value| value.parse::<f64>().ok())
}
