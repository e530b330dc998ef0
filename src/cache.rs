//! Fixed-capacity waveform buffers.

use crate::synth::SampleSink;

/// A cached waveform: interleaved stereo `f32` frames in a buffer that never
/// grows past its capacity.
///
/// The engine writes into an entry through [`SampleSink`], duplicating every
/// sample into both channels. Once the pass ends, [`CacheEntry::finish`]
/// pads the rest of the buffer with silence so every completed entry has the
/// same length.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    samples: Vec<f32>,
    frames: usize,
    capacity: usize,
    complete: bool,
}

impl CacheEntry {
    /// Allocates an entry holding up to `capacity` stereo frames.
    pub fn new(capacity: usize) -> Self {
        Self {
            samples: vec![0.0; capacity * 2],
            frames: 0,
            capacity,
            complete: false,
        }
    }

    /// Frames written by the engine so far.
    pub fn frames_written(&self) -> usize {
        self.frames
    }

    pub fn capacity_frames(&self) -> usize {
        self.capacity
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// The synthesized part of the waveform, without padding.
    pub fn written(&self) -> &[f32] {
        &self.samples[..self.frames * 2]
    }

    /// The whole buffer, `capacity * 2` interleaved values.
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    /// Pads everything after the write cursor with zeros and marks the entry
    /// complete.
    pub fn finish(&mut self) {
        self.samples[self.frames * 2..].fill(0.0);
        self.complete = true;
    }
}

impl SampleSink for CacheEntry {
    fn write(&mut self, sample: f32) {
        if self.is_full() {
            return;
        }
        let index = self.frames * 2;
        self.samples[index] = sample;
        self.samples[index + 1] = sample;
        self.frames += 1;
    }

    fn is_full(&self) -> bool {
        self.frames >= self.capacity
    }
}
