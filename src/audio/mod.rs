pub mod decode;
pub mod loudness;
pub mod spectrum;

pub use decode::{decode_audio, ChannelBuffer};
pub use loudness::LoudnessMeasurement;
pub use spectrum::{FrameFft, SpectrumFrames};
