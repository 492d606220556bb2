use rayon::prelude::*;
use rustfft::{num_complex::Complex, FftPlanner};

use super::decode::ChannelBuffer;

pub const DEFAULT_FFT_SIZE: usize = 4096;

/// Magnitude spectrum of one analysis frame. Either channel may be missing,
/// in which case the frame is skipped by the band analyzer.
#[derive(Clone, Debug, Default)]
pub struct FrameFft {
    pub left: Option<Vec<f32>>,
    pub right: Option<Vec<f32>>,
}

/// Frame spectra plus what is needed to map frequencies onto bins.
#[derive(Clone, Debug)]
pub struct SpectrumFrames {
    pub fft_size: usize,
    pub sample_rate: u32,
    pub frames: Vec<FrameFft>,
}

impl SpectrumFrames {
    pub fn bin_width(&self) -> f64 {
        self.sample_rate as f64 / self.fft_size as f64
    }

    /// Half-open bin range covering `[low_hz, high_hz)`. A band narrower
    /// than one bin collapses to the bin nearest its centre.
    pub fn bin_range(&self, low_hz: f64, high_hz: f64) -> Option<(usize, usize)> {
        let half = self.fft_size / 2;
        let res = self.bin_width();
        let low_bin = (low_hz / res).ceil().max(0.0) as usize;
        let high_bin = ((high_hz / res).ceil() as usize).min(half);
        if low_bin < high_bin {
            return Some((low_bin, high_bin));
        }
        let centre = (((low_hz + high_hz) * 0.5) / res).round() as usize;
        (centre < half).then_some((centre, centre + 1))
    }
}

/// Hann-windowed magnitude spectra of both channels, `hop` samples apart.
/// Magnitudes are scaled so a full-scale sine reads close to 1.0.
pub fn compute_frames(buffer: &ChannelBuffer, fft_size: usize, hop: usize) -> SpectrumFrames {
    let hann = hann_window(fft_size);
    let window_gain: f32 = hann.iter().sum::<f32>() * 0.5;
    let len = buffer.len();
    let hop = hop.max(1);

    let starts: Vec<usize> = if len < fft_size {
        Vec::new()
    } else {
        (0..=(len - fft_size) / hop).map(|i| i * hop).collect()
    };

    let frames = starts
        .into_par_iter()
        .map(|start| {
            // Per-thread FFT planner (rayon-safe)
            let mut planner = FftPlanner::<f32>::new();
            let fft = planner.plan_fft_forward(fft_size);

            let spectrum = |samples: &[f32]| -> Vec<f32> {
                let mut input: Vec<Complex<f32>> = samples[start..start + fft_size]
                    .iter()
                    .zip(&hann)
                    .map(|(&s, &w)| Complex::new(s * w, 0.0))
                    .collect();
                fft.process(&mut input);
                input[..fft_size / 2]
                    .iter()
                    .map(|c| c.norm() / window_gain)
                    .collect()
            };

            FrameFft {
                left: Some(spectrum(buffer.left())),
                right: Some(spectrum(buffer.right())),
            }
        })
        .collect::<Vec<_>>();

    log::debug!("Computed {} spectrum frames (fft_size={})", frames.len(), fft_size);

    SpectrumFrames {
        fft_size,
        sample_rate: buffer.sample_rate(),
        frames,
    }
}

fn hann_window(size: usize) -> Vec<f32> {
    (0..size)
        .map(|i| {
            0.5 * (1.0 - (2.0 * std::f32::consts::PI * i as f32 / (size - 1) as f32).cos())
        })
        .collect()
}
