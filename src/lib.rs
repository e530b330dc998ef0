//! sfxr - Procedural sound effect synthesis for Rust
//!
//! A compact numeric recipe ([`SfxParams`]) drives a single-voice generator
//! with an oscillator, a three-stage envelope, low/high-pass filters and a
//! phaser. [`Sfxr`] caches the rendered waveform, optionally in time-boxed
//! slices, builds randomly mutated variants of it, and plays them through a
//! pull interface. With the `wav` feature a recipe can be exported as a WAV
//! file.

pub mod cache;
pub mod config;
pub mod error;
pub mod params;
pub mod player;
pub mod synth;
#[cfg(feature = "wav")]
pub mod wav;

// Re-export commonly used types at the crate root
pub use cache::CacheEntry;
pub use config::{
    CacheConfig, HALF_SAMPLE_RATE, LIVE_CHUNK_FRAMES, MAX_SOUND_FRAMES, SAMPLE_RATE, SliceBudget,
};
pub use error::{Error, Result};
pub use params::{SfxParams, WaveShape};
pub use player::{
    CacheProgress, CacheState, DEFAULT_MUTATION_AMOUNT, DEFAULT_MUTATION_COUNT, Sfxr,
};
pub use synth::{EnvelopeStage, PcmSink, SampleSink, SynthState};
#[cfg(feature = "wav")]
pub use wav::encode_wav;
