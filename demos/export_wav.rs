//! Renders a recipe string to a WAV file.
//!
//! Usage: export_wav <output.wav> [recipe] [sample_rate] [bit_depth]
//!
//! Without a recipe a default jump sound is written. The sample rate is
//! 44100 or 22050, the bit depth 16 or 8.

use anyhow::{Context, Result};
use rand::SeedableRng;
use rand::rngs::StdRng;
use sfxr::{SfxParams, Sfxr, WaveShape};

fn jump() -> SfxParams {
    let mut params = SfxParams::new();
    params.set_wave_shape(WaveShape::Square);
    params.set_square_duty(0.3);
    params.set_start_frequency(0.35);
    params.set_slide(0.25);
    params.set_sustain_time(0.3);
    params.set_decay_time(0.2);
    params.set_lp_filter_cutoff(0.9);
    params.set_hp_filter_cutoff(0.05);
    params
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let path = args
        .next()
        .context("usage: export_wav <output.wav> [recipe] [sample_rate] [bit_depth]")?;

    let params = match args.next() {
        Some(recipe) => recipe.parse::<SfxParams>()?,
        None => jump(),
    };
    let sample_rate = match args.next() {
        Some(rate) => rate.parse().context("sample rate must be a number")?,
        None => sfxr::SAMPLE_RATE,
    };
    let bit_depth = match args.next() {
        Some(depth) => depth.parse().context("bit depth must be a number")?,
        None => 16,
    };

    let mut sfx = Sfxr::with_rng(StdRng::from_entropy()).with_params(params);
    sfx.write_wav(&path, sample_rate, bit_depth)
        .with_context(|| format!("failed to write {}", path))?;

    tracing::info!("Wrote {} ({})", path, sfx.params());
    Ok(())
}
