//! Mastering-quality analysis of stereo audio against genre references.
//!
//! Analyzers borrow a decoded [`audio::ChannelBuffer`] read-only and run
//! independently; [`pipeline::Pipeline`] fans them out and hands the result to
//! the [`scoring::ScoringEngine`].

pub mod analysis;
pub mod audio;
pub mod error;
pub mod pipeline;
pub mod reference;
pub mod report;
pub mod scoring;

pub use error::{MixgradeError, Result, Unavailable};
