//! Synthesis state and the reset logic that derives it from a recipe.

use rand::Rng;

use crate::params::{SfxParams, WaveShape};

/// Size of the phaser ring buffer. Must be a power of two.
pub const PHASER_BUFFER_LEN: usize = 1024;

/// Number of random steps in one noise period.
pub const NOISE_BUFFER_LEN: usize = 32;

/// Stage of the volume envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvelopeStage {
    Attack,
    Sustain,
    Decay,
    /// Volume is zero and the sound is finished
    Ended,
}

impl EnvelopeStage {
    pub(super) fn next(self) -> Self {
        match self {
            EnvelopeStage::Attack => EnvelopeStage::Sustain,
            EnvelopeStage::Sustain => EnvelopeStage::Decay,
            EnvelopeStage::Decay | EnvelopeStage::Ended => EnvelopeStage::Ended,
        }
    }
}

/// Complete mutable DSP state for one sound.
///
/// Everything here is derived from a recipe by [`SynthState::reset`] and then
/// advanced by [`SynthState::synth_wave`]. The state is self-contained, so a
/// pass can be paused after any call and resumed later with identical output.
///
/// The recipe given to the last total reset is kept as a frozen snapshot;
/// the note repeat effect re-reads that snapshot rather than the caller's
/// recipe, which may have been edited in the meantime.
#[derive(Debug, Clone)]
pub struct SynthState {
    pub(super) recipe: SfxParams,
    pub(super) finished: bool,

    pub(super) master_volume: f32,
    pub(super) wave_shape: WaveShape,

    pub(super) envelope_volume: f32,
    pub(super) envelope_stage: EnvelopeStage,
    pub(super) envelope_time: f32,
    pub(super) envelope_length: f32,
    pub(super) envelope_lengths: [f32; 3],
    pub(super) envelope_over_lengths: [f32; 3],
    pub(super) envelope_full_length: f32,
    pub(super) sustain_punch: f32,

    pub(super) phase: i32,
    pub(super) period: f32,
    pub(super) max_period: f32,

    pub(super) slide: f32,
    pub(super) delta_slide: f32,
    pub(super) min_frequency: f32,

    pub(super) vibrato_phase: f32,
    pub(super) vibrato_speed: f32,
    pub(super) vibrato_amplitude: f32,

    pub(super) change_amount: f32,
    pub(super) change_time: i32,
    pub(super) change_limit: i32,

    pub(super) square_duty: f32,
    pub(super) duty_sweep: f32,

    pub(super) repeat_time: i32,
    pub(super) repeat_limit: i32,

    pub(super) phaser: bool,
    pub(super) phaser_offset: f32,
    pub(super) phaser_delta_offset: f32,
    pub(super) phaser_int: usize,
    pub(super) phaser_pos: usize,
    pub(super) phaser_buffer: [f32; PHASER_BUFFER_LEN],

    pub(super) filters: bool,
    pub(super) lp_filter_pos: f32,
    pub(super) lp_filter_old_pos: f32,
    pub(super) lp_filter_delta_pos: f32,
    pub(super) lp_filter_cutoff: f32,
    pub(super) lp_filter_delta_cutoff: f32,
    pub(super) lp_filter_damping: f32,
    pub(super) lp_filter_on: bool,

    pub(super) hp_filter_pos: f32,
    pub(super) hp_filter_cutoff: f32,
    pub(super) hp_filter_delta_cutoff: f32,

    pub(super) noise_buffer: [f32; NOISE_BUFFER_LEN],
}

impl Default for SynthState {
    fn default() -> Self {
        Self::new()
    }
}

impl SynthState {
    /// Creates an idle state. It reports itself finished until the first
    /// total reset.
    pub fn new() -> Self {
        Self {
            recipe: SfxParams::default(),
            finished: true,
            master_volume: 0.0,
            wave_shape: WaveShape::Square,
            envelope_volume: 0.0,
            envelope_stage: EnvelopeStage::Ended,
            envelope_time: 0.0,
            envelope_length: 0.0,
            envelope_lengths: [0.0; 3],
            envelope_over_lengths: [0.0; 3],
            envelope_full_length: 0.0,
            sustain_punch: 0.0,
            phase: 0,
            period: 0.0,
            max_period: 0.0,
            slide: 0.0,
            delta_slide: 0.0,
            min_frequency: 0.0,
            vibrato_phase: 0.0,
            vibrato_speed: 0.0,
            vibrato_amplitude: 0.0,
            change_amount: 0.0,
            change_time: 0,
            change_limit: 0,
            square_duty: 0.0,
            duty_sweep: 0.0,
            repeat_time: 0,
            repeat_limit: 0,
            phaser: false,
            phaser_offset: 0.0,
            phaser_delta_offset: 0.0,
            phaser_int: 0,
            phaser_pos: 0,
            phaser_buffer: [0.0; PHASER_BUFFER_LEN],
            filters: false,
            lp_filter_pos: 0.0,
            lp_filter_old_pos: 0.0,
            lp_filter_delta_pos: 0.0,
            lp_filter_cutoff: 0.0,
            lp_filter_delta_cutoff: 0.0,
            lp_filter_damping: 0.0,
            lp_filter_on: false,
            hp_filter_pos: 0.0,
            hp_filter_cutoff: 0.0,
            hp_filter_delta_cutoff: 0.0,
            noise_buffer: [0.0; NOISE_BUFFER_LEN],
        }
    }

    /// Starts a new sound from `params`.
    ///
    /// This is the total reset: it clears the recipe's dirty flag, applies
    /// the envelope floors to it in place, snapshots it, and rebuilds every
    /// derived quantity. The phaser buffer is zeroed and the noise buffer is
    /// refilled from `rng`.
    pub fn reset<R: Rng + ?Sized>(&mut self, params: &mut SfxParams, rng: &mut R) {
        params.mark_clean();
        params.normalize_envelope();
        self.recipe.clone_from(params);

        self.restart_pitch();

        let p = &self.recipe;

        self.finished = false;
        self.master_volume = p.master_volume() * p.master_volume();
        self.wave_shape = p.wave_shape();
        self.sustain_punch = p.sustain_punch();
        self.phase = 0;
        self.min_frequency = p.min_frequency();

        self.filters = p.lp_filter_cutoff() != 1.0 || p.hp_filter_cutoff() != 0.0;

        self.lp_filter_pos = 0.0;
        self.lp_filter_old_pos = 0.0;
        self.lp_filter_delta_pos = 0.0;
        self.lp_filter_cutoff =
            p.lp_filter_cutoff() * p.lp_filter_cutoff() * p.lp_filter_cutoff() * 0.1;
        self.lp_filter_delta_cutoff = 1.0 + p.lp_filter_cutoff_sweep() * 0.0001;
        let damping = 5.0 / (1.0 + p.lp_filter_resonance() * p.lp_filter_resonance() * 20.0)
            * (0.01 + self.lp_filter_cutoff);
        self.lp_filter_damping = 1.0 - damping.min(0.8);
        self.lp_filter_on = p.lp_filter_cutoff() != 1.0;

        self.hp_filter_pos = 0.0;
        self.hp_filter_cutoff = p.hp_filter_cutoff() * p.hp_filter_cutoff() * 0.1;
        self.hp_filter_delta_cutoff = 1.0 + p.hp_filter_cutoff_sweep() * 0.0003;

        self.vibrato_phase = 0.0;
        self.vibrato_speed = p.vibrato_speed() * p.vibrato_speed() * 0.01;
        self.vibrato_amplitude = p.vibrato_depth() * 0.5;

        let lengths = [
            p.attack_time() * p.attack_time() * 100_000.0,
            p.sustain_time() * p.sustain_time() * 100_000.0,
            p.decay_time() * p.decay_time() * 100_000.0 + 10.0,
        ];
        self.envelope_volume = 0.0;
        self.envelope_stage = EnvelopeStage::Attack;
        self.envelope_time = 0.0;
        self.envelope_lengths = lengths;
        self.envelope_over_lengths = lengths.map(|length| 1.0 / length);
        self.envelope_length = lengths[0];
        self.envelope_full_length = lengths[0] + lengths[1] + lengths[2];

        self.phaser = p.phaser_offset() != 0.0 || p.phaser_sweep() != 0.0;
        self.phaser_offset = p.phaser_offset() * p.phaser_offset() * 1020.0;
        if p.phaser_offset() < 0.0 {
            self.phaser_offset = -self.phaser_offset;
        }
        self.phaser_delta_offset = p.phaser_sweep() * p.phaser_sweep() * p.phaser_sweep() * 0.2;
        self.phaser_int = 0;
        self.phaser_pos = 0;
        self.phaser_buffer.fill(0.0);

        self.repeat_time = 0;
        self.repeat_limit = quantized_countdown(p.repeat_speed(), 0.0);

        self.refill_noise(rng);
    }

    /// Restarts the oscillator trajectory for the note repeat effect.
    ///
    /// Period, slide, duty and the pitch jump go back to their starting
    /// values. The envelope, filters, phaser and noise carry on untouched.
    pub(super) fn restart_pitch(&mut self) {
        let p = &self.recipe;

        self.period = 100.0 / (p.start_frequency() * p.start_frequency() + 0.001);
        self.max_period = 100.0 / (p.min_frequency() * p.min_frequency() + 0.001);

        self.slide = 1.0 - p.slide() * p.slide() * p.slide() * 0.01;
        self.delta_slide = -p.delta_slide() * p.delta_slide() * p.delta_slide() * 0.000_001;

        if p.wave_shape() == WaveShape::Square {
            self.square_duty = 0.5 - p.square_duty() * 0.5;
            self.duty_sweep = -p.duty_sweep() * 0.000_05;
        }

        self.change_amount = if p.change_amount() > 0.0 {
            1.0 - p.change_amount() * p.change_amount() * 0.9
        } else {
            1.0 + p.change_amount() * p.change_amount() * 10.0
        };
        self.change_time = 0;
        self.change_limit = quantized_countdown(p.change_speed(), 1.0);
    }

    pub(super) fn refill_noise<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        for slot in self.noise_buffer.iter_mut() {
            *slot = rng.gen_range(-1.0..=1.0);
        }
    }

    /// Total length of the envelope in output samples.
    pub fn envelope_full_length(&self) -> f32 {
        self.envelope_full_length
    }

    /// Whole number of samples a full pass asks the engine for.
    pub fn total_samples(&self) -> usize {
        self.envelope_full_length as usize
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn envelope_stage(&self) -> EnvelopeStage {
        self.envelope_stage
    }

    /// Recipe snapshot taken by the last total reset.
    pub fn recipe(&self) -> &SfxParams {
        &self.recipe
    }
}

/// Maps a 0..1 speed to a countdown in output samples,
/// `(1 - speed)^2 * 20000 + 32`. A speed equal to `disabled` yields 0,
/// meaning the countdown never fires.
fn quantized_countdown(speed: f32, disabled: f32) -> i32 {
    if speed == disabled {
        0
    } else {
        ((1.0 - speed) * (1.0 - speed) * 20_000.0) as i32 + 32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn reset_with(params: &mut SfxParams) -> SynthState {
        let mut rng = StdRng::seed_from_u64(0);
        let mut state = SynthState::new();
        state.reset(params, &mut rng);
        state
    }

    #[test]
    fn test_new_state_is_finished() {
        let state = SynthState::new();
        assert!(state.is_finished());
        assert_eq!(state.total_samples(), 0);
    }

    #[test]
    fn test_total_reset_clears_dirty() {
        let mut params = SfxParams::new();
        assert!(params.is_dirty());
        let state = reset_with(&mut params);
        assert!(!params.is_dirty());
        assert!(!state.is_finished());
        assert_eq!(state.envelope_stage(), EnvelopeStage::Attack);
    }

    #[test]
    fn test_period_mapping() {
        let mut params = SfxParams::new();
        params.set_start_frequency(0.5);
        let state = reset_with(&mut params);
        assert!((state.period - 100.0 / 0.251).abs() < 1e-3);
        assert!((state.max_period - 100_000.0).abs() < 1.0);
    }

    #[test]
    fn test_envelope_lengths() {
        let mut params = SfxParams::new();
        params.set_attack_time(0.1);
        params.set_sustain_time(0.2);
        params.set_decay_time(0.3);
        let state = reset_with(&mut params);
        assert!((state.envelope_lengths[0] - 1000.0).abs() < 0.01);
        assert!((state.envelope_lengths[1] - 4000.0).abs() < 0.01);
        assert!((state.envelope_lengths[2] - 9010.0).abs() < 0.01);
        assert!((state.envelope_full_length() - 14010.0).abs() < 0.01);
    }

    #[test]
    fn test_sustain_floor_applied_to_recipe() {
        let mut params = SfxParams::new();
        params.set_sustain_time(0.0);
        let state = reset_with(&mut params);
        assert!(params.sustain_time() >= 0.01);
        assert_eq!(state.recipe(), &params);
    }

    #[test]
    fn test_lp_damping() {
        let mut params = SfxParams::new();
        params.set_lp_filter_cutoff(0.9);
        params.set_lp_filter_resonance(0.0);
        let state = reset_with(&mut params);
        // 1 - 5 * (0.01 + 0.0729)
        assert!((state.lp_filter_damping - 0.5855).abs() < 1e-4);
        assert!(state.lp_filter_on);
        assert!(state.filters);
    }

    #[test]
    fn test_filters_off_by_default() {
        let mut params = SfxParams::new();
        let state = reset_with(&mut params);
        assert!(!state.filters);
        assert!(!state.lp_filter_on);
        assert!(!state.phaser);
    }

    #[test]
    fn test_phaser_offset_keeps_sign() {
        let mut params = SfxParams::new();
        params.set_phaser_offset(-0.5);
        let state = reset_with(&mut params);
        assert!(state.phaser);
        assert!((state.phaser_offset + 255.0).abs() < 1e-3);
    }

    #[test]
    fn test_change_speed_one_disables_jump() {
        let mut params = SfxParams::new();
        params.set_change_speed(1.0);
        params.set_change_amount(0.5);
        let state = reset_with(&mut params);
        assert_eq!(state.change_limit, 0);

        params.set_change_speed(0.0);
        let state = reset_with(&mut params);
        assert_eq!(state.change_limit, 20_032);
    }

    #[test]
    fn test_repeat_countdown() {
        let mut params = SfxParams::new();
        let state = reset_with(&mut params);
        assert_eq!(state.repeat_limit, 0);

        params.set_repeat_speed(0.5);
        let state = reset_with(&mut params);
        assert_eq!(state.repeat_limit, 5032);
    }

    #[test]
    fn test_noise_buffer_seeded() {
        let mut params = SfxParams::new();
        params.set_wave_shape(WaveShape::Noise);
        let a = reset_with(&mut params);
        let b = reset_with(&mut params);
        assert_eq!(a.noise_buffer, b.noise_buffer);
        assert!(a.noise_buffer.iter().all(|v| (-1.0..=1.0).contains(v)));
    }

    #[test]
    fn test_restart_pitch_leaves_envelope() {
        let mut params = SfxParams::new();
        params.set_slide(0.5);
        let mut state = reset_with(&mut params);
        let start_period = state.period;

        state.period *= 3.0;
        state.envelope_time = 42.0;
        state.restart_pitch();

        assert_eq!(state.period, start_period);
        assert_eq!(state.envelope_time, 42.0);
    }

    #[test]
    fn test_restart_pitch_reads_snapshot() {
        let mut params = SfxParams::new();
        params.set_start_frequency(0.2);
        let mut state = reset_with(&mut params);
        let start_period = state.period;

        params.set_start_frequency(0.9);
        state.restart_pitch();
        assert_eq!(state.period, start_period);
    }

    #[test]
    fn test_repeat_keeps_noise_phaser_and_filters() {
        let mut params = SfxParams::new();
        params.set_wave_shape(WaveShape::Noise);
        params.set_start_frequency(0.01);
        params.set_phaser_offset(0.2);
        params.set_phaser_sweep(0.1);
        params.set_lp_filter_cutoff(0.5);
        params.set_lp_filter_cutoff_sweep(0.3);
        params.set_lp_filter_resonance(0.2);
        params.set_hp_filter_cutoff(0.1);
        params.set_repeat_speed(0.9);
        let mut repeating = reset_with(&mut params);
        assert_eq!(repeating.repeat_limit, 232);

        params.set_repeat_speed(0.0);
        let mut plain = reset_with(&mut params);
        let noise = repeating.noise_buffer;

        let mut repeated_out = Vec::new();
        let mut plain_out = Vec::new();
        repeating.synth_wave(&mut repeated_out, 300, &mut StdRng::seed_from_u64(5));
        plain.synth_wave(&mut plain_out, 300, &mut StdRng::seed_from_u64(5));

        assert_eq!(repeating.repeat_time, 300 - 232);
        assert_eq!(repeating.noise_buffer, noise);
        assert_eq!(repeating.phaser_buffer, plain.phaser_buffer);
        assert_eq!(repeating.phaser_pos, plain.phaser_pos);
        assert_eq!(repeating.phaser_offset, plain.phaser_offset);
        assert_eq!(repeating.lp_filter_pos, plain.lp_filter_pos);
        assert_eq!(repeating.lp_filter_old_pos, plain.lp_filter_old_pos);
        assert_eq!(repeating.lp_filter_delta_pos, plain.lp_filter_delta_pos);
        assert_eq!(repeating.lp_filter_cutoff, plain.lp_filter_cutoff);
        assert_eq!(repeating.hp_filter_pos, plain.hp_filter_pos);
        assert_eq!(repeating.hp_filter_cutoff, plain.hp_filter_cutoff);
        assert_eq!(repeating.envelope_stage, EnvelopeStage::Sustain);
        assert_eq!(repeating.envelope_time, plain.envelope_time);
        assert_eq!(repeated_out, plain_out);
    }
}
