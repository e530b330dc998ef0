//! Sound recipe parameters.
//!
//! [`SfxParams`] is the compact numeric description of a sound effect. Every
//! setter clamps its value into the field's range and marks the recipe dirty,
//! which tells the [`Sfxr`](crate::Sfxr) cache that its waveforms are stale.

use std::fmt;
use std::str::FromStr;

use rand::Rng;

use crate::error::Error;

/// Oscillator wave shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WaveShape {
    /// Pulse wave with a sweepable duty cycle
    #[default]
    Square,
    /// Ramp from 1 down to -1 across each period
    Sawtooth,
    /// Polynomial sine approximation
    Sine,
    /// 32-step random buffer, regenerated every period
    Noise,
}

impl WaveShape {
    /// Index used by recipe strings.
    pub fn index(self) -> u8 {
        match self {
            WaveShape::Square => 0,
            WaveShape::Sawtooth => 1,
            WaveShape::Sine => 2,
            WaveShape::Noise => 3,
        }
    }

    /// Inverse of [`WaveShape::index`].
    pub fn from_index(index: u8) -> Option<Self> {
        match index {
            0 => Some(WaveShape::Square),
            1 => Some(WaveShape::Sawtooth),
            2 => Some(WaveShape::Sine),
            3 => Some(WaveShape::Noise),
            _ => None,
        }
    }
}

macro_rules! recipe_fields {
    ($(
        $(#[$doc:meta])*
        $field:ident / $setter:ident : $min:literal ..= $max:literal = $default:literal,
            mutable: $mutable:literal;
    )*) => {
        /// A sound recipe.
        ///
        /// Fields are kept private so every write goes through a clamping
        /// setter that also raises the dirty flag.
        ///
        /// # Examples
        ///
        /// ```
        /// use sfxr::{SfxParams, WaveShape};
        ///
        /// let mut params = SfxParams::default();
        /// params.set_wave_shape(WaveShape::Sawtooth);
        /// params.set_slide(-4.0);
        /// assert_eq!(params.slide(), -1.0);
        /// assert!(params.is_dirty());
        /// ```
        #[derive(Debug, Clone, PartialEq)]
        pub struct SfxParams {
            wave_shape: WaveShape,
            $( $field: f32, )*
            dirty: bool,
        }

        impl Default for SfxParams {
            fn default() -> Self {
                Self {
                    wave_shape: WaveShape::Square,
                    $( $field: $default, )*
                    dirty: true,
                }
            }
        }

        impl SfxParams {
            /// Number of numeric fields (everything except the wave shape).
            pub const VALUE_COUNT: usize = [$(stringify!($field)),*].len();

            $(
                $(#[$doc])*
                pub fn $field(&self) -> f32 {
                    self.$field
                }

                #[doc = concat!(
                    "Sets `", stringify!($field), "`, clamped to `",
                    stringify!($min), "..=", stringify!($max), "`."
                )]
                pub fn $setter(&mut self, value: f32) {
                    self.$field = value.clamp($min, $max);
                    self.dirty = true;
                }
            )*

            /// Applies a random perturbation of at most `amount` to roughly half
            /// of the fields. Wave shape and master volume are left alone.
            pub fn mutate<R: Rng + ?Sized>(&mut self, amount: f32, rng: &mut R) {
                if amount == 0.0 || !amount.is_finite() {
                    return;
                }
                // No field spans more than 2.0; larger deltas only saturate.
                let amount = amount.abs().min(2.0);
                $(
                    if $mutable && rng.gen_bool(0.5) {
                        let delta: f32 = rng.gen_range(-amount..=amount);
                        self.$setter(self.$field + delta);
                    }
                )*
            }

            fn values(&self) -> [f32; Self::VALUE_COUNT] {
                [$( self.$field ),*]
            }

            fn set_values(&mut self, values: [f32; Self::VALUE_COUNT]) {
                let [$( $field ),*] = values;
                $( self.$setter($field); )*
            }
        }
    };
}

recipe_fields! {
    /// Length of the attack stage.
    attack_time / set_attack_time: 0.0 ..= 1.0 = 0.0, mutable: true;
    /// Length of the sustain stage.
    sustain_time / set_sustain_time: 0.0 ..= 1.0 = 0.3, mutable: true;
    /// Volume boost at the start of the sustain stage.
    sustain_punch / set_sustain_punch: 0.0 ..= 1.0 = 0.0, mutable: true;
    /// Length of the decay stage.
    decay_time / set_decay_time: 0.0 ..= 1.0 = 0.4, mutable: true;
    /// Base frequency.
    start_frequency / set_start_frequency: 0.0 ..= 1.0 = 0.3, mutable: true;
    /// Frequency floor; a slide below it ends the sound.
    min_frequency / set_min_frequency: 0.0 ..= 1.0 = 0.0, mutable: true;
    /// Pitch slide; positive values slide the pitch up.
    slide / set_slide: -1.0 ..= 1.0 = 0.0, mutable: true;
    /// Acceleration of the slide.
    delta_slide / set_delta_slide: -1.0 ..= 1.0 = 0.0, mutable: true;
    /// Vibrato strength.
    vibrato_depth / set_vibrato_depth: 0.0 ..= 1.0 = 0.0, mutable: true;
    /// Vibrato rate.
    vibrato_speed / set_vibrato_speed: 0.0 ..= 1.0 = 0.0, mutable: true;
    /// Size of the one-shot pitch jump.
    change_amount / set_change_amount: -1.0 ..= 1.0 = 0.0, mutable: true;
    /// How soon the pitch jump happens; 1 disables it.
    change_speed / set_change_speed: 0.0 ..= 1.0 = 0.0, mutable: true;
    /// Square wave duty cycle.
    square_duty / set_square_duty: 0.0 ..= 1.0 = 0.0, mutable: true;
    /// Duty cycle sweep.
    duty_sweep / set_duty_sweep: -1.0 ..= 1.0 = 0.0, mutable: true;
    /// Rate of the note repeat; 0 disables it.
    repeat_speed / set_repeat_speed: 0.0 ..= 1.0 = 0.0, mutable: true;
    /// Phaser delay offset.
    phaser_offset / set_phaser_offset: -1.0 ..= 1.0 = 0.0, mutable: true;
    /// Phaser offset sweep.
    phaser_sweep / set_phaser_sweep: -1.0 ..= 1.0 = 0.0, mutable: true;
    /// Low-pass cutoff; 1 turns the low-pass off.
    lp_filter_cutoff / set_lp_filter_cutoff: 0.0 ..= 1.0 = 1.0, mutable: true;
    /// Low-pass cutoff sweep.
    lp_filter_cutoff_sweep / set_lp_filter_cutoff_sweep: -1.0 ..= 1.0 = 0.0, mutable: true;
    /// Low-pass resonance.
    lp_filter_resonance / set_lp_filter_resonance: 0.0 ..= 1.0 = 0.0, mutable: true;
    /// High-pass cutoff; 0 turns the high-pass off.
    hp_filter_cutoff / set_hp_filter_cutoff: 0.0 ..= 1.0 = 0.0, mutable: true;
    /// High-pass cutoff sweep.
    hp_filter_cutoff_sweep / set_hp_filter_cutoff_sweep: -1.0 ..= 1.0 = 0.0, mutable: true;
    /// Overall volume.
    master_volume / set_master_volume: 0.0 ..= 1.0 = 0.5, mutable: false;
}

impl SfxParams {
    /// Creates a recipe with default values. New recipes start dirty.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn wave_shape(&self) -> WaveShape {
        self.wave_shape
    }

    pub fn set_wave_shape(&mut self, shape: WaveShape) {
        self.wave_shape = shape;
        self.dirty = true;
    }

    /// True when any field changed since the last completed cache pass.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Forces the dirty flag, e.g. to invalidate cached waveforms.
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub(crate) fn mark_clean(&mut self) {
        self.dirty = false;
    }

    /// Copies every field, including the dirty flag, from `other`.
    pub fn copy_from(&mut self, other: &SfxParams) {
        self.clone_from(other);
    }

    /// Applies the envelope floors used by a total reset: sustain is raised
    /// to at least 0.01, and when attack + sustain + decay is below 0.18 all
    /// three are scaled up proportionally to sum to 0.18.
    ///
    /// Writes bypass the setters so the dirty flag is untouched.
    pub(crate) fn normalize_envelope(&mut self) {
        if self.sustain_time < MIN_SUSTAIN_TIME {
            self.sustain_time = MIN_SUSTAIN_TIME;
        }

        let total = self.attack_time + self.sustain_time + self.decay_time;
        if total < MIN_ENVELOPE_TIME {
            let multiplier = MIN_ENVELOPE_TIME / total;
            self.attack_time *= multiplier;
            self.sustain_time *= multiplier;
            self.decay_time *= multiplier;
        }
    }
}

/// Shortest sustain a total reset allows.
pub const MIN_SUSTAIN_TIME: f32 = 0.01;

/// Shortest attack + sustain + decay a total reset allows.
pub const MIN_ENVELOPE_TIME: f32 = 0.18;

/// Renders the recipe as 24 comma separated values, wave shape first.
impl fmt::Display for SfxParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.wave_shape.index())?;
        for value in self.values() {
            write!(f, ",{}", value)?;
        }
        Ok(())
    }
}

impl FromStr for SfxParams {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let fields: Vec<&str> = s.trim().split(',').map(str::trim).collect();
        if fields.len() != SfxParams::VALUE_COUNT + 1 {
            return Err(Error::recipe(format!(
                "expected {} fields, found {}",
                SfxParams::VALUE_COUNT + 1,
                fields.len()
            )));
        }

        let shape_index: u8 = fields[0]
            .parse()
            .map_err(|_| Error::recipe(format!("bad wave shape '{}'", fields[0])))?;
        let wave_shape = WaveShape::from_index(shape_index)
            .ok_or_else(|| Error::recipe(format!("unknown wave shape {}", shape_index)))?;

        let mut values = [0.0; SfxParams::VALUE_COUNT];
        for (slot, field) in values.iter_mut().zip(&fields[1..]) {
            if field.is_empty() {
                continue;
            }
            *slot = field
                .parse()
                .map_err(|_| Error::recipe(format!("bad number '{}'", field)))?;
        }

        let mut params = SfxParams::default();
        params.set_wave_shape(wave_shape);
        params.set_values(values);
        Ok(params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_defaults() {
        let params = SfxParams::new();
        assert_eq!(params.wave_shape(), WaveShape::Square);
        assert_eq!(params.sustain_time(), 0.3);
        assert_eq!(params.decay_time(), 0.4);
        assert_eq!(params.lp_filter_cutoff(), 1.0);
        assert_eq!(params.master_volume(), 0.5);
        assert!(params.is_dirty());
    }

    #[test]
    fn test_setters_clamp_and_dirty() {
        let mut params = SfxParams::new();
        params.mark_clean();

        params.set_start_frequency(2.0);
        assert_eq!(params.start_frequency(), 1.0);
        assert!(params.is_dirty());

        params.set_phaser_offset(-3.0);
        assert_eq!(params.phaser_offset(), -1.0);

        params.set_attack_time(-0.5);
        assert_eq!(params.attack_time(), 0.0);
    }

    #[test]
    fn test_copy_from() {
        let mut a = SfxParams::new();
        a.set_wave_shape(WaveShape::Noise);
        a.set_vibrato_depth(0.7);
        a.mark_clean();

        let mut b = SfxParams::new();
        b.copy_from(&a);
        assert_eq!(a, b);
        assert!(!b.is_dirty());
    }

    #[test]
    fn test_mutate_stays_in_range() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut params = SfxParams::new();
        for _ in 0..200 {
            params.mutate(0.5, &mut rng);
        }
        for value in params.values() {
            assert!((-1.0..=1.0).contains(&value));
        }
        assert!((0.0..=1.0).contains(&params.start_frequency()));
        assert_eq!(params.master_volume(), 0.5);
    }

    #[test]
    fn test_mutate_huge_amount_is_clamped() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut params = SfxParams::new();
        for amount in [f32::MAX, -f32::MAX, 1.0e30] {
            params.mutate(amount, &mut rng);
            for value in params.values() {
                assert!((-1.0..=1.0).contains(&value));
            }
        }
        assert_eq!(params.master_volume(), 0.5);
    }

    #[test]
    fn test_mutate_changes_something() {
        let mut rng = StdRng::seed_from_u64(42);
        let original = SfxParams::new();
        let mut params = original.clone();
        params.mutate(0.05, &mut rng);
        assert_ne!(params.values(), original.values());
        assert_eq!(params.wave_shape(), original.wave_shape());
    }

    #[test]
    fn test_mutate_zero_amount_is_noop() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut params = SfxParams::new();
        params.mark_clean();
        params.mutate(0.0, &mut rng);
        assert_eq!(params, {
            let mut p = SfxParams::new();
            p.mark_clean();
            p
        });
    }

    #[test]
    fn test_normalize_envelope_floor() {
        let mut params = SfxParams::new();
        params.set_attack_time(0.02);
        params.set_sustain_time(0.0);
        params.set_decay_time(0.04);
        params.normalize_envelope();

        let total = params.attack_time() + params.sustain_time() + params.decay_time();
        assert!(total >= MIN_ENVELOPE_TIME - 1e-6);
        // 0.02 : 0.01 : 0.04 ratios survive the rescale
        assert!((params.attack_time() / params.sustain_time() - 2.0).abs() < 1e-4);
        assert!((params.decay_time() / params.sustain_time() - 4.0).abs() < 1e-4);
    }

    #[test]
    fn test_normalize_envelope_leaves_long_sounds() {
        let mut params = SfxParams::new();
        params.set_attack_time(0.1);
        params.set_sustain_time(0.2);
        params.set_decay_time(0.3);
        let before = params.clone();
        params.normalize_envelope();
        assert_eq!(params, before);
    }

    #[test]
    fn test_recipe_string_round_trip() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut params = SfxParams::new();
        params.set_wave_shape(WaveShape::Sine);
        params.mutate(0.3, &mut rng);

        let text = params.to_string();
        assert_eq!(text.split(',').count(), 24);

        let parsed: SfxParams = text.parse().unwrap();
        assert_eq!(parsed.wave_shape(), WaveShape::Sine);
        assert_eq!(parsed.values(), params.values());
    }

    #[test]
    fn test_recipe_string_empty_fields_are_zero() {
        let text = "3,,0.25,,0.5,0.4,,0.2,,,,,,,,,,,1,,,,,0.6";
        let parsed: SfxParams = text.parse().unwrap();
        assert_eq!(parsed.wave_shape(), WaveShape::Noise);
        assert_eq!(parsed.attack_time(), 0.0);
        assert_eq!(parsed.sustain_time(), 0.25);
        assert_eq!(parsed.slide(), 0.2);
        assert_eq!(parsed.master_volume(), 0.6);
    }

    #[test]
    fn test_recipe_string_errors() {
        assert!("0,1,2".parse::<SfxParams>().is_err());
        let bad_shape = format!("9{}", ",0".repeat(SfxParams::VALUE_COUNT));
        assert!(bad_shape.parse::<SfxParams>().is_err());
        let bad_number = format!("0,abc{}", ",0".repeat(SfxParams::VALUE_COUNT - 1));
        assert!(bad_number.parse::<SfxParams>().is_err());
    }
}
