//! ITU-R BS.1770-4 loudness (gated integrated), EBU Tech 3342 loudness range
//! and stereo phase correlation.

use std::f64::consts::PI;

use super::decode::ChannelBuffer;

const BLOCK_S: f64 = 0.400;
const SHORT_TERM_S: f64 = 3.0;
const STEP_S: f64 = 0.100;
const ABSOLUTE_GATE_LUFS: f64 = -70.0;
const RELATIVE_GATE_LU: f64 = -10.0;
const LRA_RELATIVE_GATE_LU: f64 = -20.0;

#[derive(Clone, Copy, Debug, Default, PartialEq, serde::Serialize)]
pub struct LoudnessMeasurement {
    /// `None` for silence or material shorter than one 400 ms block
    pub integrated_lufs: Option<f64>,
    /// `None` when fewer than two gated short-term windows exist
    pub loudness_range_lu: Option<f64>,
    /// `None` when either channel is silent
    pub stereo_correlation: Option<f64>,
}

/// Direct-form I biquad, `a0` normalised to 1.
#[derive(Clone, Copy, Debug)]
struct Biquad {
    b0: f64,
    b1: f64,
    b2: f64,
    a1: f64,
    a2: f64,
}

impl Biquad {
    /// Stage 1 (high shelf) and stage 2 (high pass) of the K-weighting
    /// pre-filter, re-derived for any sample rate.
    fn k_weighting(fs: u32) -> (Self, Self) {
        let fs = fs as f64;

        let f0 = 1_681.974_450_955_533;
        let gain_db = 3.999_843_853_973_347;
        let q = 0.707_175_236_955_419_6;
        let k = (PI * f0 / fs).tan();
        let vh = 10.0_f64.powf(gain_db / 20.0);
        let vb = vh.powf(0.499_666_774_154_541_6);
        let a0 = 1.0 + k / q + k * k;
        let shelf = Self {
            b0: (vh + vb * k / q + k * k) / a0,
            b1: 2.0 * (k * k - vh) / a0,
            b2: (vh - vb * k / q + k * k) / a0,
            a1: 2.0 * (k * k - 1.0) / a0,
            a2: (1.0 - k / q + k * k) / a0,
        };

        let f0 = 38.135_470_876_024_44;
        let q = 0.500_327_037_323_877_3;
        let k = (PI * f0 / fs).tan();
        let a0 = 1.0 + k / q + k * k;
        let high_pass = Self {
            b0: 1.0,
            b1: -2.0,
            b2: 1.0,
            a1: 2.0 * (k * k - 1.0) / a0,
            a2: (1.0 - k / q + k * k) / a0,
        };

        (shelf, high_pass)
    }

    fn filter(&self, input: &[f64]) -> Vec<f64> {
        let (mut x1, mut x2, mut y1, mut y2) = (0.0, 0.0, 0.0, 0.0);
        input
            .iter()
            .map(|&x| {
                let y = self.b0 * x + self.b1 * x1 + self.b2 * x2 - self.a1 * y1 - self.a2 * y2;
                x2 = x1;
                x1 = x;
                y2 = y1;
                y1 = y;
                y
            })
            .collect()
    }
}

/// Prefix sums of the K-weighted squared signal, summed over channels.
struct WeightedPower {
    prefix: Vec<f64>,
}

impl WeightedPower {
    fn new(buffer: &ChannelBuffer) -> Self {
        let (shelf, high_pass) = Biquad::k_weighting(buffer.sample_rate());
        let weigh = |samples: &[f32]| {
            let raw: Vec<f64> = samples.iter().map(|&s| s as f64).collect();
            high_pass.filter(&shelf.filter(&raw))
        };
        let left = weigh(buffer.left());
        let right = weigh(buffer.right());

        let mut prefix = Vec::with_capacity(left.len() + 1);
        prefix.push(0.0);
        let mut acc = 0.0;
        for (l, r) in left.iter().zip(&right) {
            acc += l * l + r * r;
            prefix.push(acc);
        }
        Self { prefix }
    }

    fn len(&self) -> usize {
        self.prefix.len() - 1
    }

    /// Channel-summed mean square of the window starting at `start`.
    fn mean_square(&self, start: usize, len: usize) -> f64 {
        (self.prefix[start + len] - self.prefix[start]) / len as f64
    }

    /// Mean squares of every `window`-sample block, `step` samples apart.
    fn blocks(&self, window: usize, step: usize) -> Vec<f64> {
        if window == 0 || self.len() < window {
            return Vec::new();
        }
        (0..=(self.len() - window) / step)
            .map(|i| self.mean_square(i * step, window))
            .collect()
    }
}

fn power_to_lufs(power: f64) -> f64 {
    -0.691 + 10.0 * power.log10()
}

fn lufs_to_power(lufs: f64) -> f64 {
    10.0_f64.powf((lufs + 0.691) / 10.0)
}

/// Gated integrated loudness over 400 ms blocks with 75% overlap.
pub fn integrated_loudness(buffer: &ChannelBuffer) -> Option<f64> {
    let power = WeightedPower::new(buffer);
    gated_integrated(&power, buffer.sample_rate())
}

fn gated_integrated(power: &WeightedPower, sample_rate: u32) -> Option<f64> {
    let window = (BLOCK_S * sample_rate as f64).round() as usize;
    let step = ((STEP_S * sample_rate as f64).round() as usize).max(1);
    let abs_power = lufs_to_power(ABSOLUTE_GATE_LUFS);

    let gated: Vec<f64> = power
        .blocks(window, step)
        .into_iter()
        .filter(|&p| p > abs_power)
        .collect();
    if gated.is_empty() {
        return None;
    }

    let relative_gate = power_to_lufs(mean(&gated)) + RELATIVE_GATE_LU;
    let rel_power = lufs_to_power(relative_gate);
    let kept: Vec<f64> = gated.into_iter().filter(|&p| p > rel_power).collect();
    if kept.is_empty() {
        return None;
    }
    Some(power_to_lufs(mean(&kept)))
}

/// Loudness range: P95 − P10 of gated 3 s short-term loudness values.
pub fn loudness_range(buffer: &ChannelBuffer) -> Option<f64> {
    let power = WeightedPower::new(buffer);
    gated_range(&power, buffer.sample_rate())
}

fn gated_range(power: &WeightedPower, sample_rate: u32) -> Option<f64> {
    let window = (SHORT_TERM_S * sample_rate as f64).round() as usize;
    let step = ((STEP_S * sample_rate as f64).round() as usize).max(1);
    let abs_power = lufs_to_power(ABSOLUTE_GATE_LUFS);

    let gated: Vec<f64> = power
        .blocks(window, step)
        .into_iter()
        .filter(|&p| p > abs_power)
        .collect();
    if gated.len() < 2 {
        return None;
    }

    let rel_power = lufs_to_power(power_to_lufs(mean(&gated)) + LRA_RELATIVE_GATE_LU);
    let mut levels: Vec<f64> = gated
        .into_iter()
        .filter(|&p| p > rel_power)
        .map(power_to_lufs)
        .collect();
    if levels.len() < 2 {
        return None;
    }
    levels.sort_by(f64::total_cmp);

    let low = percentile(&levels, 0.10);
    let high = percentile(&levels, 0.95);
    Some((high - low).max(0.0))
}

/// Normalised cross-correlation of the two channels, in [-1, 1].
pub fn stereo_correlation(buffer: &ChannelBuffer) -> Option<f64> {
    let (mut lr, mut ll, mut rr) = (0.0f64, 0.0f64, 0.0f64);
    for (&l, &r) in buffer.left().iter().zip(buffer.right()) {
        let (l, r) = (l as f64, r as f64);
        lr += l * r;
        ll += l * l;
        rr += r * r;
    }
    let denom = (ll * rr).sqrt();
    if denom < 1e-20 {
        return None;
    }
    Some((lr / denom).clamp(-1.0, 1.0))
}

/// All three loudness-domain measurements from a single K-weighting pass.
pub fn measure(buffer: &ChannelBuffer) -> LoudnessMeasurement {
    let power = WeightedPower::new(buffer);
    let measurement = LoudnessMeasurement {
        integrated_lufs: gated_integrated(&power, buffer.sample_rate()),
        loudness_range_lu: gated_range(&power, buffer.sample_rate()),
        stereo_correlation: stereo_correlation(buffer),
    };
    log::debug!("Loudness: {:?}", measurement);
    measurement
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Nearest-rank percentile of an ascending slice.
pub(crate) fn percentile(sorted: &[f64], q: f64) -> f64 {
    let rank = (q * (sorted.len() - 1) as f64).round() as usize;
    sorted[rank.min(sorted.len() - 1)]
}
