//! Output sinks for the synthesis engine.

use crate::config::SAMPLE_RATE;

/// Destination for finished output samples.
///
/// The engine produces one clipped sample in `[-1.0, 1.0]` per step and
/// hands it to a sink, which decides how to store it.
pub trait SampleSink {
    /// Accepts one output sample.
    fn write(&mut self, sample: f32);

    /// True once the sink cannot take another sample. The engine treats a
    /// full sink as the end of the sound.
    fn is_full(&self) -> bool {
        false
    }
}

/// Mono output, one value per sample. Unbounded.
impl SampleSink for Vec<f32> {
    fn write(&mut self, sample: f32) {
        self.push(sample);
    }
}

/// Quantized mono PCM for file export.
///
/// At the reference rate every sample is kept; at any other rate consecutive
/// pairs are averaged. Values are stored signed, the way `hound` expects
/// them: 16-bit as `trunc(32000 * x)`, 8-bit as `trunc(127 * x + 128) - 128`.
#[derive(Debug, Clone)]
pub struct PcmSink {
    sample_rate: u32,
    bit_depth: u16,
    accumulated: f32,
    count: u32,
    samples: Vec<i16>,
}

impl PcmSink {
    /// Creates a sink. Rates other than 44100 decimate by two; depths other
    /// than 16 produce 8-bit samples.
    pub fn new(sample_rate: u32, bit_depth: u16) -> Self {
        Self {
            sample_rate,
            bit_depth,
            accumulated: 0.0,
            count: 0,
            samples: Vec::new(),
        }
    }

    pub fn with_capacity(sample_rate: u32, bit_depth: u16, capacity: usize) -> Self {
        let mut sink = Self::new(sample_rate, bit_depth);
        sink.samples.reserve(capacity);
        sink
    }

    pub fn samples(&self) -> &[i16] {
        &self.samples
    }

    pub fn into_samples(self) -> Vec<i16> {
        self.samples
    }

    fn quantize(&self, value: f32) -> i16 {
        if self.bit_depth == 16 {
            (32000.0 * value as f64) as i16
        } else {
            (value * 127.0 + 128.0) as u8 as i16 - 128
        }
    }
}

impl SampleSink for PcmSink {
    fn write(&mut self, sample: f32) {
        self.accumulated += sample;
        self.count += 1;

        if self.sample_rate == SAMPLE_RATE || self.count == 2 {
            let value = self.accumulated / self.count as f32;
            self.count = 0;
            self.accumulated = 0.0;
            let quantized = self.quantize(value);
            self.samples.push(quantized);
        }
    }
}
