//! Interactive sound effect player.
//!
//! SPACE plays the sound, M plays a mutation, C caches the sound in
//! the background, V caches a mutation set in the background, R rolls
//! a new random recipe, S prints the recipe string.
//! Press Q or ESC to quit.

use anyhow::Result;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, Sample, SampleFormat, StreamConfig};
use crossterm::{
    ExecutableCommand,
    event::{self, Event, KeyCode, KeyEvent},
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use sfxr::{
    CacheConfig, CacheProgress, DEFAULT_MUTATION_AMOUNT, DEFAULT_MUTATION_COUNT, SfxParams, Sfxr,
    SliceBudget, WaveShape,
};
use std::io::{Write, stdout};
use std::sync::{Arc, Mutex};
use std::time::Duration;

type SharedSfx = Arc<Mutex<Sfxr<StdRng>>>;

/// Rolls a short pickup-style recipe.
fn random_recipe(rng: &mut impl Rng) -> SfxParams {
    let mut params = SfxParams::new();
    let shape = match rng.gen_range(0..4) {
        0 => WaveShape::Square,
        1 => WaveShape::Sawtooth,
        2 => WaveShape::Sine,
        _ => WaveShape::Noise,
    };
    params.set_wave_shape(shape);
    params.set_start_frequency(rng.gen_range(0.2..0.8));
    params.set_slide(rng.gen_range(-0.4..0.4));
    params.set_square_duty(rng.gen_range(0.0..0.6));
    params.set_sustain_time(rng.gen_range(0.05..0.3));
    params.set_sustain_punch(rng.gen_range(0.0..0.6));
    params.set_decay_time(rng.gen_range(0.1..0.5));
    if rng.gen_bool(0.5) {
        params.set_change_amount(rng.gen_range(0.2..0.6));
        params.set_change_speed(rng.gen_range(0.4..0.7));
    }
    params
}

fn run_audio_stream<T>(
    device: &cpal::Device,
    config: &StreamConfig,
    sfx: SharedSfx,
) -> Result<cpal::Stream>
where
    T: Sample + FromSample<f32> + cpal::SizedSample,
{
    let channels = config.channels as usize;
    let mut scratch = Vec::new();

    let stream = device.build_output_stream(
        config,
        move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
            let frames = data.len() / channels;
            scratch.resize(frames * 2, 0.0);

            let written = sfx.lock().unwrap().fill(&mut scratch);
            scratch[written..].fill(0.0);

            for (frame, stereo) in data.chunks_mut(channels).zip(scratch.chunks(2)) {
                for (index, s) in frame.iter_mut().enumerate() {
                    *s = T::from_sample(stereo[index % 2]);
                }
            }
        },
        |err| eprintln!("Audio stream error: {}", err),
        None,
    )?;

    stream.play()?;
    Ok(stream)
}

fn draw_ui(status: &str, recipe: &str) -> Result<()> {
    let mut stdout = stdout();

    stdout.execute(crossterm::terminal::Clear(
        crossterm::terminal::ClearType::All,
    ))?;
    stdout.execute(crossterm::cursor::MoveTo(0, 0))?;
    write!(
        stdout,
        "SPACE=play M=mutate C=cache V=cache mutations R=random S=show Q=quit"
    )?;
    stdout.execute(crossterm::cursor::MoveTo(0, 2))?;
    write!(stdout, "{}", status)?;
    stdout.execute(crossterm::cursor::MoveTo(0, 4))?;
    write!(stdout, "{}", recipe)?;

    stdout.flush()?;
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    // Setup audio
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| anyhow::anyhow!("No output device available"))?;

    let config = device.default_output_config()?;
    if config.sample_rate().0 != sfxr::SAMPLE_RATE {
        tracing::warn!(
            "Output runs at {} Hz, sounds will play off pitch",
            config.sample_rate().0
        );
    }

    let mut rng = StdRng::from_entropy();
    let sfx = Sfxr::with_rng(StdRng::from_rng(&mut rng)?)
        .with_config(
            CacheConfig::default().with_slice_budget(SliceBudget::Time(Duration::from_millis(5))),
        )
        .with_params(random_recipe(&mut rng));
    let sfx: SharedSfx = Arc::new(Mutex::new(sfx));

    // Start audio stream
    let _stream = match config.sample_format() {
        SampleFormat::F32 => run_audio_stream::<f32>(&device, &config.into(), sfx.clone())?,
        SampleFormat::I16 => run_audio_stream::<i16>(&device, &config.into(), sfx.clone())?,
        SampleFormat::U16 => run_audio_stream::<u16>(&device, &config.into(), sfx.clone())?,
        sample_format => {
            return Err(anyhow::anyhow!(
                "Unsupported sample format: {}",
                sample_format
            ));
        }
    };

    // Setup terminal
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    stdout().execute(crossterm::cursor::Hide)?;

    let mut status = String::from("Ready");
    draw_ui(&status, "")?;

    // Event loop; every pass also serves as the cache tick
    loop {
        let progress = sfx.lock().unwrap().tick();
        if progress == CacheProgress::Finished {
            draw_ui(&status, "")?;
        }

        if !event::poll(Duration::from_millis(15))? {
            continue;
        }
        let Event::Key(KeyEvent { code, .. }) = event::read()? else {
            continue;
        };

        let mut sfx = sfx.lock().unwrap();
        let mut recipe = String::new();
        match code {
            KeyCode::Char('q') | KeyCode::Char('Q') | KeyCode::Esc => break,
            KeyCode::Char(' ') => {
                sfx.play();
                status = String::from("Playing");
            }
            KeyCode::Char('m') | KeyCode::Char('M') => {
                sfx.play_mutated(DEFAULT_MUTATION_AMOUNT, DEFAULT_MUTATION_COUNT);
                status = format!(
                    "Playing mutation ({} of {} cached)",
                    sfx.cached_mutations().len(),
                    DEFAULT_MUTATION_COUNT
                );
            }
            KeyCode::Char('c') | KeyCode::Char('C') => {
                sfx.cache_sound_async(|| tracing::info!("Sound cached"));
                status = String::from("Caching sound");
            }
            KeyCode::Char('v') | KeyCode::Char('V') => {
                sfx.cache_mutations_async(DEFAULT_MUTATION_COUNT, DEFAULT_MUTATION_AMOUNT, || {
                    tracing::info!("Mutations cached")
                });
                status = String::from("Caching mutations");
            }
            KeyCode::Char('r') | KeyCode::Char('R') => {
                sfx.set_params(random_recipe(&mut rng));
                sfx.play();
                status = String::from("New recipe");
            }
            KeyCode::Char('s') | KeyCode::Char('S') => {
                recipe = sfx.params().to_string();
            }
            _ => {}
        }
        let state = sfx.state();
        drop(sfx);
        draw_ui(&format!("{} [{:?}]", status, state), &recipe)?;
    }

    // Cleanup terminal
    stdout().execute(crossterm::cursor::Show)?;
    stdout().execute(LeaveAlternateScreen)?;
    disable_raw_mode()?;

    Ok(())
}
