use anyhow::{Context, Result};
use std::path::Path;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::error::MixgradeError;

/// Immutable stereo sample buffer. Analyzers only ever borrow it.
#[derive(Clone, Debug)]
pub struct ChannelBuffer {
    left: Vec<f32>,
    right: Vec<f32>,
    sample_rate: u32,
}

impl ChannelBuffer {
    pub fn new(left: Vec<f32>, right: Vec<f32>, sample_rate: u32) -> crate::Result<Self> {
        validate_channels(&left, &right, sample_rate)?;
        Ok(Self {
            left,
            right,
            sample_rate,
        })
    }

    /// Mono source, duplicated into both channels.
    pub fn from_mono(samples: Vec<f32>, sample_rate: u32) -> crate::Result<Self> {
        Self::new(samples.clone(), samples, sample_rate)
    }

    pub fn left(&self) -> &[f32] {
        &self.left
    }

    pub fn right(&self) -> &[f32] {
        &self.right
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn len(&self) -> usize {
        self.left.len()
    }

    pub fn is_empty(&self) -> bool {
        self.left.is_empty()
    }

    pub fn duration(&self) -> f64 {
        self.left.len() as f64 / self.sample_rate as f64
    }

    /// Mid signal `(L + R) / 2`.
    pub fn mid(&self) -> Vec<f32> {
        self.left
            .iter()
            .zip(&self.right)
            .map(|(l, r)| (l + r) * 0.5)
            .collect()
    }
}

/// Structural checks shared by every analyzer that takes raw slices.
pub fn validate_channels(left: &[f32], right: &[f32], sample_rate: u32) -> crate::Result<()> {
    if left.len() != right.len() {
        return Err(MixgradeError::input(format!(
            "channel length mismatch: left={} right={}",
            left.len(),
            right.len()
        )));
    }
    if left.is_empty() {
        return Err(MixgradeError::input("empty channel buffers"));
    }
    if sample_rate == 0 {
        return Err(MixgradeError::input("sample rate must be positive"));
    }
    if let Some(pos) = left
        .iter()
        .chain(right.iter())
        .position(|s| !s.is_finite())
    {
        return Err(MixgradeError::input(format!(
            "non-finite sample at index {}",
            pos % left.len()
        )));
    }
    Ok(())
}

pub fn decode_audio(path: &Path) -> Result<ChannelBuffer> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open audio file: {}", path.display()))?;

    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .context("Failed to probe audio format")?;

    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != symphonia::core::codecs::CODEC_TYPE_NULL)
        .context("No audio tracks found")?;

    let track_id = track.id;
    let channels = track.codec_params.channels.map_or(1, |c| c.count());
    let sample_rate = track.codec_params.sample_rate.context("Unknown sample rate")?;

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .context("Failed to create audio decoder")?;

    let mut left: Vec<f32> = Vec::new();
    let mut right: Vec<f32> = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(symphonia::core::errors::Error::IoError(ref e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(e) => return Err(e.into()),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(d) => d,
            Err(symphonia::core::errors::Error::DecodeError(_)) => continue,
            Err(e) => return Err(e.into()),
        };

        let spec = *decoded.spec();
        let num_frames = decoded.frames();

        let mut sample_buf = SampleBuffer::<f32>::new(num_frames as u64, spec);
        sample_buf.copy_interleaved_ref(decoded);

        let samples = sample_buf.samples();

        // Mono duplicates; anything wider keeps the front pair
        if channels == 1 {
            left.extend_from_slice(samples);
            right.extend_from_slice(samples);
        } else {
            for frame_samples in samples.chunks(channels) {
                left.push(frame_samples[0]);
                right.push(frame_samples[1]);
            }
        }
    }

    log::info!(
        "Decoded audio: {} frames x {}ch, {}Hz, {:.1}s",
        left.len(),
        channels,
        sample_rate,
        left.len() as f32 / sample_rate as f32
    );

    ChannelBuffer::new(left, right, sample_rate)
        .with_context(|| format!("Decoded audio is not analysable: {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_mismatched_lengths() {
        let err = ChannelBuffer::new(vec![0.0; 4], vec![0.0; 3], 48_000).unwrap_err();
        assert!(matches!(err, MixgradeError::Input(_)));
    }

    #[test]
    fn rejects_non_finite_samples() {
        let err = ChannelBuffer::new(vec![0.0, f32::NAN], vec![0.0, 0.0], 48_000).unwrap_err();
        assert!(err.to_string().contains("non-finite"));
    }

    #[test]
    fn rejects_empty() {
        assert!(ChannelBuffer::new(vec![], vec![], 48_000).is_err());
    }

    #[test]
    fn duration_and_mid() {
        let buf = ChannelBuffer::new(vec![1.0, 0.0], vec![0.0, 1.0], 2).unwrap();
        assert_eq!(buf.duration(), 1.0);
        assert_eq!(buf.mid(), vec![0.5, 0.5]);
    }
}
