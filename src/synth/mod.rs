//! Sound synthesis.
//!
//! This module holds the single-voice generator behind every cached sound:
//! - [`SynthState`]: the resumable DSP state and its reset logic
//! - `SynthState::synth_wave`: the oscillator, envelope, filter and phaser
//!   pipeline, advanced one bounded chunk at a time
//! - [`SampleSink`]: where finished samples go ([`PcmSink`] for files,
//!   [`CacheEntry`](crate::CacheEntry) for cached stereo waveforms)

mod engine;
mod sink;
mod state;

pub use sink::{PcmSink, SampleSink};
pub use state::{EnvelopeStage, NOISE_BUFFER_LEN, PHASER_BUFFER_LEN, SynthState};
