//! Waveform file export.

use std::io::Cursor;
use std::path::Path;

use hound::{SampleFormat, WavSpec, WavWriter};
use rand::Rng;
use tracing::debug;

use crate::config::{HALF_SAMPLE_RATE, SAMPLE_RATE};
use crate::error::Result;
use crate::params::SfxParams;
use crate::player::Sfxr;
use crate::synth::{PcmSink, SynthState};

/// Renders `params` into a complete mono PCM WAV file.
///
/// # Arguments
///
/// * `params` - Recipe to render; it is copied, never modified
/// * `sample_rate` - 44100, or anything else for 22050
/// * `bit_depth` - 16, or anything else for 8
/// * `rng` - Source of the noise buffer contents
///
/// Synthesis runs in one synchronous pass on a private
/// [`SynthState`], and a sound that ends early is padded with silence so the
/// payload always covers the whole envelope.
///
/// # Examples
///
/// ```
/// use rand::SeedableRng;
/// use sfxr::{SfxParams, wav};
///
/// let mut rng = rand::rngs::StdRng::seed_from_u64(7);
/// let bytes = wav::encode_wav(&SfxParams::default(), 44_100, 16, &mut rng).unwrap();
/// assert_eq!(&bytes[..4], b"RIFF");
/// ```
pub fn encode_wav<R: Rng + ?Sized>(
    params: &SfxParams,
    sample_rate: u32,
    bit_depth: u16,
    rng: &mut R,
) -> Result<Vec<u8>> {
    let sample_rate = if sample_rate == SAMPLE_RATE {
        SAMPLE_RATE
    } else {
        HALF_SAMPLE_RATE
    };
    let bit_depth = if bit_depth == 16 { 16 } else { 8 };

    let mut params = params.clone();
    let mut synth = SynthState::new();
    synth.reset(&mut params, rng);

    let length = synth.total_samples();
    let expected = if sample_rate == SAMPLE_RATE {
        length
    } else {
        length / 2
    };

    let mut sink = PcmSink::with_capacity(sample_rate, bit_depth, expected);
    synth.synth_wave(&mut sink, length, rng);
    let mut samples = sink.into_samples();
    samples.resize(expected, 0);

    let spec = WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: bit_depth,
        sample_format: SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::new());
    let mut writer = WavWriter::new(&mut cursor, spec)?;
    if bit_depth == 16 {
        for sample in samples {
            writer.write_sample(sample)?;
        }
    } else {
        for sample in samples {
            writer.write_sample(sample as i8)?;
        }
    }
    writer.finalize()?;

    debug!(sample_rate, bit_depth, samples = expected, "wav encoded");
    Ok(cursor.into_inner())
}

impl<R: Rng> Sfxr<R> {
    /// Encodes the recipe as a WAV file. Mutations never apply to exports.
    ///
    /// Export uses its own synthesis state, so it can run while a sound is
    /// playing or being cached.
    pub fn wav_file(&mut self, sample_rate: u32, bit_depth: u16) -> Result<Vec<u8>> {
        let params = self.params().clone();
        encode_wav(&params, sample_rate, bit_depth, self.rng_mut())
    }

    /// Encodes the recipe and writes it to `path`.
    pub fn write_wav(
        &mut self,
        path: impl AsRef<Path>,
        sample_rate: u32,
        bit_depth: u16,
    ) -> Result<()> {
        let bytes = self.wav_file(sample_rate, bit_depth)?;
        std::fs::write(path, bytes)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::WaveShape;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn le_u32(bytes: &[u8], at: usize) -> u32 {
        u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
    }

    fn le_u16(bytes: &[u8], at: usize) -> u16 {
        u16::from_le_bytes([bytes[at], bytes[at + 1]])
    }

    fn short_params() -> SfxParams {
        let mut params = SfxParams::default();
        params.set_sustain_time(0.1);
        params.set_decay_time(0.2);
        params
    }

    fn envelope_samples(params: &SfxParams) -> usize {
        let mut params = params.clone();
        let mut synth = SynthState::new();
        synth.reset(&mut params, &mut StdRng::seed_from_u64(0));
        synth.total_samples()
    }

    #[test]
    fn test_header_layout() {
        let params = short_params();
        let bytes = encode_wav(&params, 44_100, 16, &mut StdRng::seed_from_u64(1)).unwrap();

        assert_eq!(&bytes[0..4], b"RIFF");
        assert_eq!(&bytes[8..12], b"WAVE");
        assert_eq!(&bytes[12..16], b"fmt ");
        assert_eq!(le_u32(&bytes, 16), 16);
        assert_eq!(le_u16(&bytes, 20), 1);
        assert_eq!(le_u16(&bytes, 22), 1);
        assert_eq!(le_u32(&bytes, 24), 44_100);
        assert_eq!(le_u32(&bytes, 28), 88_200);
        assert_eq!(le_u16(&bytes, 32), 2);
        assert_eq!(le_u16(&bytes, 34), 16);
        assert_eq!(&bytes[36..40], b"data");

        let payload = le_u32(&bytes, 40) as usize;
        assert_eq!(payload, envelope_samples(&params) * 2);
        assert_eq!(bytes.len(), 44 + payload);
        assert_eq!(le_u32(&bytes, 4) as usize, bytes.len() - 8);
    }

    #[test]
    fn test_unsupported_formats_snap() {
        let params = short_params();
        let bytes = encode_wav(&params, 8_000, 12, &mut StdRng::seed_from_u64(1)).unwrap();
        assert_eq!(le_u32(&bytes, 24), 22_050);
        assert_eq!(le_u16(&bytes, 34), 8);
        assert_eq!(le_u32(&bytes, 40) as usize, envelope_samples(&params) / 2);
    }

    #[test]
    fn test_read_back() {
        let mut params = short_params();
        params.set_wave_shape(WaveShape::Sine);
        let bytes = encode_wav(&params, 44_100, 16, &mut StdRng::seed_from_u64(2)).unwrap();

        let mut reader = hound::WavReader::new(Cursor::new(bytes)).unwrap();
        assert_eq!(reader.spec().channels, 1);
        let samples: Vec<i16> = reader.samples::<i16>().map(|s| s.unwrap()).collect();
        assert_eq!(samples.len(), envelope_samples(&params));
        assert!(samples.iter().any(|&s| s != 0));
        assert!(samples.iter().all(|&s| (-32000..=32000).contains(&s)));
    }

    #[test]
    fn test_early_finish_is_padded() {
        let mut params = short_params();
        params.set_start_frequency(0.4);
        params.set_min_frequency(0.35);
        params.set_slide(-0.9);
        let expected = envelope_samples(&params);

        let bytes = encode_wav(&params, 44_100, 16, &mut StdRng::seed_from_u64(3)).unwrap();
        let mut reader = hound::WavReader::new(Cursor::new(bytes)).unwrap();
        let samples: Vec<i16> = reader.samples::<i16>().map(|s| s.unwrap()).collect();
        assert_eq!(samples.len(), expected);
        assert_eq!(samples.last(), Some(&0));
    }

    #[test]
    fn test_export_during_mutation_cache() {
        let mut sfx = Sfxr::with_rng(StdRng::seed_from_u64(9)).with_params(short_params());
        sfx.cache_sound();
        let clean = sfx.params().clone();

        sfx.cache_mutations_async(1, 0.5, || {});
        assert_eq!(sfx.params(), &clean);
        let bytes = sfx.wav_file(44_100, 16).unwrap();
        assert_eq!(le_u32(&bytes, 40) as usize, envelope_samples(&clean) * 2);
        assert!(sfx.is_caching_async());
    }

    #[test]
    fn test_write_wav_to_disk() {
        let path = std::env::temp_dir().join(format!("sfxr-test-{}.wav", std::process::id()));
        let mut sfx = Sfxr::with_rng(StdRng::seed_from_u64(4)).with_params(short_params());
        sfx.write_wav(&path, 22_050, 8).unwrap();

        let reader = hound::WavReader::open(&path).unwrap();
        assert_eq!(reader.spec().sample_rate, 22_050);
        assert_eq!(reader.spec().bits_per_sample, 8);
        std::fs::remove_file(&path).unwrap();
    }
}
