//! The sample generator: oscillator, envelope, filters and phaser.

use std::f32::consts::TAU;

use rand::Rng;

use super::sink::SampleSink;
use super::state::{EnvelopeStage, NOISE_BUFFER_LEN, PHASER_BUFFER_LEN, SynthState};
use crate::params::WaveShape;

/// Sub-samples averaged into every output sample.
const OVERSAMPLING: usize = 8;

/// Shortest period, in sub-samples, the oscillator will run at.
const MIN_PERIOD: i32 = 8;

impl SynthState {
    /// Advances the sound by up to `length` output samples, writing each one
    /// to `sink`.
    ///
    /// Returns `true` once the sound has finished, either because the
    /// envelope ended, the pitch slid below the minimum frequency, or the
    /// sink filled up. The call can return before `length` samples have been
    /// written; a call on an already finished state writes nothing.
    ///
    /// `rng` is only used to regenerate the noise buffer.
    pub fn synth_wave<S, R>(&mut self, sink: &mut S, length: usize, rng: &mut R) -> bool
    where
        S: SampleSink + ?Sized,
        R: Rng + ?Sized,
    {
        for _ in 0..length {
            if self.finished {
                return true;
            }
            if sink.is_full() {
                self.finished = true;
                return true;
            }

            let sample = self.next_sample(rng);
            sink.write(sample);
        }

        self.finished
    }

    fn next_sample<R: Rng + ?Sized>(&mut self, rng: &mut R) -> f32 {
        if self.repeat_limit != 0 {
            self.repeat_time += 1;
            if self.repeat_time >= self.repeat_limit {
                self.repeat_time = 0;
                self.restart_pitch();
            }
        }

        if self.change_limit != 0 {
            self.change_time += 1;
            if self.change_time >= self.change_limit {
                self.change_limit = 0;
                self.period *= self.change_amount;
            }
        }

        self.slide += self.delta_slide;
        self.period *= self.slide;

        if self.period > self.max_period {
            self.period = self.max_period;
            if self.min_frequency > 0.0 {
                self.finished = true;
            }
        }

        let mut period = self.period;
        if self.vibrato_amplitude > 0.0 {
            self.vibrato_phase += self.vibrato_speed;
            period = self.period * (1.0 + self.vibrato_phase.sin() * self.vibrato_amplitude);
        }
        let period = (period as i32).max(MIN_PERIOD);

        if self.wave_shape == WaveShape::Square {
            self.square_duty = (self.square_duty + self.duty_sweep).clamp(0.0, 0.5);
        }

        self.advance_envelope();

        if self.phaser {
            self.phaser_offset += self.phaser_delta_offset;
            let tap = (self.phaser_offset as i32).unsigned_abs() as usize;
            self.phaser_int = tap.min(PHASER_BUFFER_LEN - 1);
        }

        if self.filters && self.hp_filter_delta_cutoff != 0.0 {
            self.hp_filter_cutoff =
                (self.hp_filter_cutoff * self.hp_filter_delta_cutoff).clamp(0.000_01, 0.1);
        }

        let mut super_sample = 0.0;
        for _ in 0..OVERSAMPLING {
            super_sample += self.next_sub_sample(period, rng);
        }

        let output =
            self.master_volume * self.envelope_volume * super_sample * (1.0 / OVERSAMPLING as f32);
        output.clamp(-1.0, 1.0)
    }

    fn advance_envelope(&mut self) {
        self.envelope_time += 1.0;
        if self.envelope_time > self.envelope_length {
            self.envelope_time = 0.0;
            self.envelope_stage = self.envelope_stage.next();
            match self.envelope_stage {
                EnvelopeStage::Sustain => self.envelope_length = self.envelope_lengths[1],
                EnvelopeStage::Decay => self.envelope_length = self.envelope_lengths[2],
                _ => {}
            }
        }

        let [over_attack, over_sustain, over_decay] = self.envelope_over_lengths;
        self.envelope_volume = match self.envelope_stage {
            EnvelopeStage::Attack => self.envelope_time * over_attack,
            EnvelopeStage::Sustain => {
                1.0 + (1.0 - self.envelope_time * over_sustain) * 2.0 * self.sustain_punch
            }
            EnvelopeStage::Decay => 1.0 - self.envelope_time * over_decay,
            EnvelopeStage::Ended => {
                self.finished = true;
                0.0
            }
        };
    }

    fn next_sub_sample<R: Rng + ?Sized>(&mut self, period: i32, rng: &mut R) -> f32 {
        self.phase += 1;
        if self.phase >= period {
            self.phase -= period;
            if self.wave_shape == WaveShape::Noise {
                self.refill_noise(rng);
            }
        }

        let mut sample = oscillate(
            self.wave_shape,
            self.phase,
            period,
            self.square_duty,
            &self.noise_buffer,
        );

        if self.filters {
            self.lp_filter_old_pos = self.lp_filter_pos;
            self.lp_filter_cutoff =
                (self.lp_filter_cutoff * self.lp_filter_delta_cutoff).clamp(0.0, 0.1);

            if self.lp_filter_on {
                self.lp_filter_delta_pos += (sample - self.lp_filter_pos) * self.lp_filter_cutoff;
                self.lp_filter_delta_pos *= self.lp_filter_damping;
            } else {
                self.lp_filter_pos = sample;
                self.lp_filter_delta_pos = 0.0;
            }
            self.lp_filter_pos += self.lp_filter_delta_pos;

            self.hp_filter_pos += self.lp_filter_pos - self.lp_filter_old_pos;
            self.hp_filter_pos *= 1.0 - self.hp_filter_cutoff;
            sample = self.hp_filter_pos;
        }

        if self.phaser {
            let mask = PHASER_BUFFER_LEN - 1;
            self.phaser_buffer[self.phaser_pos & mask] = sample;
            let tap = (self.phaser_pos + PHASER_BUFFER_LEN - self.phaser_int) & mask;
            sample += self.phaser_buffer[tap];
            self.phaser_pos = (self.phaser_pos + 1) & mask;
        }

        sample
    }
}

/// Raw oscillator value at `phase` sub-samples into a cycle of `period`.
fn oscillate(
    shape: WaveShape,
    phase: i32,
    period: i32,
    duty: f32,
    noise: &[f32; NOISE_BUFFER_LEN],
) -> f32 {
    let pos = phase as f32 / period as f32;
    match shape {
        WaveShape::Square => {
            if pos < duty {
                0.5
            } else {
                -0.5
            }
        }
        WaveShape::Sawtooth => 1.0 - pos * 2.0,
        WaveShape::Sine => fast_sine(if pos > 0.5 { (pos - 1.0) * TAU } else { pos * TAU }),
        WaveShape::Noise => {
            // phase can trail a shrinking period by more than one cycle
            let index = (phase * NOISE_BUFFER_LEN as i32 / period) as usize;
            noise[index.min(NOISE_BUFFER_LEN - 1)]
        }
    }
}

/// Parabolic sine approximation over `[-pi, pi]` with one refinement step.
fn fast_sine(x: f32) -> f32 {
    let y = if x < 0.0 {
        1.273_239_5 * x + 0.405_284_73 * x * x
    } else {
        1.273_239_5 * x - 0.405_284_73 * x * x
    };
    if y < 0.0 {
        0.225 * (y * -y - y) + y
    } else {
        0.225 * (y * y - y) + y
    }
}
