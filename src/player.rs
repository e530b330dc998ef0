//! Cache orchestration and playback.
//!
//! [`Sfxr`] owns a recipe, the synthesis state, and the cached waveforms
//! built from them. It caches either in one blocking call or incrementally,
//! one bounded slice per [`Sfxr::tick`], and can build a set of randomly
//! mutated variants of the recipe. Playback is pull based: the host audio
//! callback asks [`Sfxr::fill`] for the next interleaved stereo samples.
//!
//! Only one synthesis pass is ever in flight. Requests that would disturb an
//! asynchronous cache in progress are ignored.

use std::fmt;
use std::time::Instant;

use rand::Rng;
use rand::rngs::ThreadRng;
use tracing::{debug, trace};

use crate::cache::CacheEntry;
use crate::config::{ASYNC_CHUNK_SAMPLES, CacheConfig, SliceBudget};
use crate::params::SfxParams;
use crate::synth::SynthState;

/// Default mutation strength for [`Sfxr::play_mutated`].
pub const DEFAULT_MUTATION_AMOUNT: f32 = 0.05;

/// Default size of a mutation set for [`Sfxr::play_mutated`].
pub const DEFAULT_MUTATION_COUNT: usize = 15;

/// What the cache is doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheState {
    /// Nothing has been cached yet
    Idle,
    CachingBaseSync,
    CachingBaseAsync,
    CachingMutationsSync,
    CachingMutationsAsync,
    /// The last cache request finished
    Complete,
}

/// Result of one [`Sfxr::tick`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheProgress {
    /// No asynchronous cache is running; the tick did nothing
    Idle,
    /// Work remains; keep ticking
    Pending,
    /// The cache completed during this tick and its callback has run
    Finished,
}

type Callback = Box<dyn FnOnce() + Send>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Target {
    Base,
    Mutation(usize),
}

/// One synthesis pass writing into a fresh buffer.
struct Pass {
    target: Target,
    entry: CacheEntry,
    /// Samples left before the envelope's full length is reached
    remaining: usize,
}

enum AsyncKind {
    Base,
    Mutations { count: usize, amount: f32 },
}

struct AsyncCache {
    kind: AsyncKind,
    on_complete: Option<Callback>,
}

struct Playback {
    target: Target,
    /// Read position in interleaved samples
    cursor: usize,
}

/// A single-voice sound effect synthesizer with waveform caching.
///
/// # Examples
///
/// ```
/// use rand::SeedableRng;
/// use sfxr::{Sfxr, WaveShape};
///
/// let mut sfx = Sfxr::with_rng(rand::rngs::StdRng::seed_from_u64(1));
/// sfx.params_mut().set_wave_shape(WaveShape::Sine);
/// sfx.cache_sound();
///
/// sfx.play();
/// let mut frames = [0.0f32; 512];
/// let written = sfx.fill(&mut frames);
/// assert_eq!(written, 512);
/// ```
pub struct Sfxr<R: Rng = ThreadRng> {
    params: SfxParams,
    synth: SynthState,
    config: CacheConfig,
    rng: R,
    state: CacheState,
    base: Option<CacheEntry>,
    mutations: Vec<CacheEntry>,
    mutations_wanted: usize,
    pass: Option<Pass>,
    async_cache: Option<AsyncCache>,
    playback: Option<Playback>,
}

impl Sfxr<ThreadRng> {
    /// Creates a synthesizer with default parameters and the thread-local RNG.
    pub fn new() -> Self {
        Self::with_rng(rand::thread_rng())
    }
}

impl Default for Sfxr<ThreadRng> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Rng> Sfxr<R> {
    /// Creates a synthesizer with default parameters and a caller-supplied RNG.
    ///
    /// # Arguments
    ///
    /// * `rng` - Source of every random draw, including which cached mutation
    ///   gets replayed. Seed it for reproducible output.
    pub fn with_rng(rng: R) -> Self {
        Self {
            params: SfxParams::default(),
            synth: SynthState::new(),
            config: CacheConfig::default(),
            rng,
            state: CacheState::Idle,
            base: None,
            mutations: Vec::new(),
            mutations_wanted: 0,
            pass: None,
            async_cache: None,
            playback: None,
        }
    }

    pub fn with_config(mut self, config: CacheConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_params(mut self, params: SfxParams) -> Self {
        self.set_params(params);
        self
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn params(&self) -> &SfxParams {
        &self.params
    }

    /// Mutable access to the recipe. Setters mark it dirty, so the next
    /// play or cache request synthesizes again.
    pub fn params_mut(&mut self) -> &mut SfxParams {
        &mut self.params
    }

    /// Replaces the recipe and marks it dirty.
    pub fn set_params(&mut self, params: SfxParams) {
        self.params = params;
        self.params.mark_dirty();
    }

    pub fn state(&self) -> CacheState {
        self.state
    }

    pub fn is_caching_async(&self) -> bool {
        self.async_cache.is_some()
    }

    pub fn is_playing(&self) -> bool {
        self.playback.is_some()
    }

    /// The cached base waveform, once a base pass has completed.
    pub fn cached_wave(&self) -> Option<&CacheEntry> {
        self.base.as_ref()
    }

    /// Completed mutation waveforms, in the order they were cached.
    pub fn cached_mutations(&self) -> &[CacheEntry] {
        &self.mutations
    }

    /// Synthesizes the whole sound now and caches it.
    ///
    /// Ignored while an asynchronous cache is running.
    pub fn cache_sound(&mut self) {
        self.cancel_playback();
        if self.reject_if_caching_async("cache_sound") {
            return;
        }
        self.stop();
        self.discard_stale_caches();

        self.state = CacheState::CachingBaseSync;
        let pass = self.begin_pass(Target::Base, None);
        self.run_pass(pass);
        self.state = CacheState::Complete;
    }

    /// Starts caching the sound across calls to [`Sfxr::tick`]. `on_complete`
    /// runs exactly once, from the tick that finishes the sound.
    ///
    /// Ignored while another asynchronous cache is running.
    pub fn cache_sound_async(&mut self, on_complete: impl FnOnce() + Send + 'static) {
        self.cancel_playback();
        if self.reject_if_caching_async("cache_sound_async") {
            return;
        }
        self.stop();
        self.discard_stale_caches();

        self.base = None;
        self.pass = Some(self.begin_pass(Target::Base, None));
        self.async_cache = Some(AsyncCache {
            kind: AsyncKind::Base,
            on_complete: Some(Box::new(on_complete)),
        });
        self.state = CacheState::CachingBaseAsync;
    }

    /// Synthesizes a set of mutations of the recipe now.
    ///
    /// Each mutation is rendered from a perturbed copy; the recipe itself is
    /// never changed.
    ///
    /// # Arguments
    ///
    /// * `count` - Number of mutations in the set; replaces any previous set
    /// * `amount` - Largest change applied to each perturbed field
    ///
    /// Ignored while an asynchronous cache is running.
    pub fn cache_mutations(&mut self, count: usize, amount: f32) {
        self.cancel_playback();
        if self.reject_if_caching_async("cache_mutations") {
            return;
        }
        self.stop();
        self.discard_stale_caches();

        self.state = CacheState::CachingMutationsSync;
        self.mutations.clear();
        self.mutations_wanted = count;
        for index in 0..count {
            let pass = self.begin_pass(Target::Mutation(index), Some(amount));
            self.run_pass(pass);
        }
        self.state = CacheState::Complete;
    }

    /// Starts caching `count` mutations across calls to [`Sfxr::tick`].
    /// `on_complete` runs exactly once, after the last mutation.
    ///
    /// Ignored while another asynchronous cache is running.
    pub fn cache_mutations_async(
        &mut self,
        count: usize,
        amount: f32,
        on_complete: impl FnOnce() + Send + 'static,
    ) {
        self.cancel_playback();
        if self.reject_if_caching_async("cache_mutations_async") {
            return;
        }
        self.stop();
        self.discard_stale_caches();

        self.mutations.clear();
        self.mutations_wanted = count;
        if count == 0 {
            self.state = CacheState::Complete;
            on_complete();
            return;
        }

        self.pass = Some(self.begin_pass(Target::Mutation(0), Some(amount)));
        self.async_cache = Some(AsyncCache {
            kind: AsyncKind::Mutations { count, amount },
            on_complete: Some(Box::new(on_complete)),
        });
        self.state = CacheState::CachingMutationsAsync;
    }

    /// Runs one slice of the asynchronous cache, sized by the configured
    /// [`SliceBudget`]. Hosts call this from a periodic timer until it
    /// stops returning [`CacheProgress::Pending`].
    pub fn tick(&mut self) -> CacheProgress {
        if self.async_cache.is_none() {
            return CacheProgress::Idle;
        }

        let started = Instant::now();
        let chunk = match self.config.slice_budget {
            SliceBudget::Time(_) => ASYNC_CHUNK_SAMPLES,
            SliceBudget::Samples(samples) => samples.max(1),
        };

        loop {
            if self.advance_pass(chunk) {
                if let Some(pass) = self.pass.take() {
                    self.complete_pass(pass);
                }
                if !self.start_next_async_pass() {
                    return self.finish_async();
                }
            }

            match self.config.slice_budget {
                SliceBudget::Samples(_) => break,
                SliceBudget::Time(limit) => {
                    if started.elapsed() >= limit {
                        break;
                    }
                }
            }
        }

        trace!(
            frames = self.pass.as_ref().map_or(0, |pass| pass.entry.frames_written()),
            "cache slice done"
        );
        CacheProgress::Pending
    }

    /// Plays the sound. With a clean recipe and a cached waveform the cache
    /// is replayed; otherwise the sound is synthesized while it plays and
    /// cached on the way.
    ///
    /// Ignored while the base sound is being cached asynchronously, or while
    /// any asynchronous cache runs and the sound would need synthesizing.
    pub fn play(&mut self) {
        let needs_synthesis = self.params.is_dirty() || self.base.is_none();
        if let Some(job) = &self.async_cache {
            if matches!(job.kind, AsyncKind::Base) || needs_synthesis {
                debug!("play ignored, asynchronous cache in progress");
                return;
            }
        }

        self.stop();
        self.discard_stale_caches();

        if self.base.is_none() {
            self.pass = Some(self.begin_pass(Target::Base, None));
        }
        self.playback = Some(Playback {
            target: Target::Base,
            cursor: 0,
        });
    }

    /// Plays a mutation of the sound.
    ///
    /// While fewer than `count` mutations are cached, each call synthesizes
    /// and caches a new one while it plays. Once the set holds `count`
    /// mutations, every call replays one of the cached mutations chosen at
    /// random. The latest `count` always wins, so raising it grows the set.
    ///
    /// # Arguments
    ///
    /// * `amount` - Largest change applied to each perturbed field
    /// * `count` - Size of the mutation set to build up
    ///
    /// Ignored while mutations are being cached asynchronously, or while any
    /// asynchronous cache runs and a mutation would need synthesizing.
    pub fn play_mutated(&mut self, amount: f32, count: usize) {
        self.cancel_playback();
        let needs_synthesis = self.params.is_dirty() || self.mutations.len() < count;
        if let Some(job) = &self.async_cache {
            if matches!(job.kind, AsyncKind::Mutations { .. }) || needs_synthesis {
                debug!("play_mutated ignored, asynchronous cache in progress");
                return;
            }
        }

        self.stop();
        self.discard_stale_caches();

        self.mutations_wanted = count;

        let target = if self.mutations.len() < self.mutations_wanted {
            let index = self.mutations.len();
            self.pass = Some(self.begin_pass(Target::Mutation(index), Some(amount)));
            Target::Mutation(index)
        } else if !self.mutations.is_empty() {
            Target::Mutation(self.rng.gen_range(0..self.mutations.len()))
        } else {
            return;
        };

        self.playback = Some(Playback { target, cursor: 0 });
    }

    /// Stops playback.
    ///
    /// A sound that was being synthesized while it played is abandoned. An
    /// asynchronous cache keeps running.
    pub fn stop(&mut self) {
        self.playback = None;

        if self.async_cache.is_some() {
            return;
        }
        if let Some(pass) = self.pass.take() {
            debug!(sound = ?pass.target, "live pass abandoned");
        }
    }

    /// Pull interface for the host audio callback.
    ///
    /// Copies the next interleaved stereo samples of the playing sound into
    /// `out` and returns how many were written. Fewer than `out.len()` means
    /// the sound ended; 0 means nothing is playing. Never reads past the
    /// synthesized data.
    pub fn fill(&mut self, out: &mut [f32]) -> usize {
        let Some(mut playback) = self.playback.take() else {
            return 0;
        };

        self.pump_live_pass(playback.target, playback.cursor + out.len());

        let source = self.buffer(playback.target);
        let available = source.len().saturating_sub(playback.cursor);
        let count = out.len().min(available);
        out[..count].copy_from_slice(&source[playback.cursor..playback.cursor + count]);
        playback.cursor += count;

        let ended = playback.cursor >= source.len() && !self.is_live(playback.target);
        if !ended {
            self.playback = Some(playback);
        }
        count
    }

    pub(crate) fn rng_mut(&mut self) -> &mut R {
        &mut self.rng
    }

    fn reject_if_caching_async(&self, request: &str) -> bool {
        if self.async_cache.is_some() {
            debug!(request, "ignored, asynchronous cache in progress");
            return true;
        }
        false
    }

    /// Cached waveforms stop matching the recipe once it is dirty. The
    /// caches rebuilt from here on follow the current recipe.
    fn discard_stale_caches(&mut self) {
        if self.params.is_dirty() {
            self.base = None;
            self.mutations.clear();
            self.mutations_wanted = 0;
            self.params.mark_clean();
        }
    }

    fn cancel_playback(&mut self) {
        if self.playback.take().is_some() {
            debug!("playback cancelled by cache request");
        }
    }

    /// Resets the synthesizer for a new pass. Mutations are applied to a
    /// copy; the caller's recipe is never touched by them.
    fn begin_pass(&mut self, target: Target, mutation: Option<f32>) -> Pass {
        match mutation {
            Some(amount) => {
                let mut mutated = self.params.clone();
                mutated.mutate(amount, &mut self.rng);
                self.synth.reset(&mut mutated, &mut self.rng);
            }
            None => self.synth.reset(&mut self.params, &mut self.rng),
        }
        debug!(
            sound = ?target,
            samples = self.synth.total_samples(),
            "synthesis pass started"
        );

        Pass {
            target,
            entry: CacheEntry::new(self.config.capacity_frames),
            remaining: self.synth.total_samples(),
        }
    }

    fn run_pass(&mut self, pass: Pass) {
        self.pass = Some(pass);
        self.advance_pass(usize::MAX);
        if let Some(pass) = self.pass.take() {
            self.complete_pass(pass);
        }
    }

    /// Runs the engine for up to `samples` samples of the current pass.
    /// Returns true once the pass is done.
    fn advance_pass(&mut self, samples: usize) -> bool {
        let Some(pass) = self.pass.as_mut() else {
            return true;
        };
        let budget = samples.min(pass.remaining);
        let finished = self.synth.synth_wave(&mut pass.entry, budget, &mut self.rng);
        pass.remaining -= budget;
        finished || pass.remaining == 0
    }

    fn complete_pass(&mut self, mut pass: Pass) {
        pass.entry.finish();

        debug!(
            sound = ?pass.target,
            frames = pass.entry.frames_written(),
            "synthesis pass complete"
        );

        match pass.target {
            Target::Base => self.base = Some(pass.entry),
            Target::Mutation(_) => self.mutations.push(pass.entry),
        }
    }

    fn start_next_async_pass(&mut self) -> bool {
        let next = match self.async_cache.as_ref().map(|job| &job.kind) {
            Some(&AsyncKind::Mutations { count, amount }) if self.mutations.len() < count => {
                Some((self.mutations.len(), amount))
            }
            _ => None,
        };

        match next {
            Some((index, amount)) => {
                self.pass = Some(self.begin_pass(Target::Mutation(index), Some(amount)));
                true
            }
            None => false,
        }
    }

    fn finish_async(&mut self) -> CacheProgress {
        self.state = CacheState::Complete;
        if let Some(mut job) = self.async_cache.take() {
            debug!("asynchronous cache complete");
            if let Some(on_complete) = job.on_complete.take() {
                on_complete();
            }
        }
        CacheProgress::Finished
    }

    fn is_live(&self, target: Target) -> bool {
        self.async_cache.is_none()
            && self
                .pass
                .as_ref()
                .is_some_and(|pass| pass.target == target)
    }

    /// Synthesizes live chunks until `needed` interleaved samples of `target`
    /// exist or its pass completes.
    fn pump_live_pass(&mut self, target: Target, needed: usize) {
        if !self.is_live(target) {
            return;
        }

        while let Some(pass) = &self.pass {
            if pass.entry.written().len() >= needed {
                return;
            }
            if self.advance_pass(self.config.live_chunk_frames.max(1)) {
                if let Some(pass) = self.pass.take() {
                    self.complete_pass(pass);
                }
                return;
            }
        }
    }

    fn buffer(&self, target: Target) -> &[f32] {
        if self.is_live(target) {
            if let Some(pass) = &self.pass {
                return pass.entry.written();
            }
        }

        let entry = match target {
            Target::Base => self.base.as_ref(),
            Target::Mutation(index) => self.mutations.get(index),
        };
        entry.map(CacheEntry::written).unwrap_or_default()
    }
}

impl<R: Rng> fmt::Debug for Sfxr<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sfxr")
            .field("params", &self.params)
            .field("state", &self.state)
            .field("cached", &self.base.is_some())
            .field("mutations", &self.mutations.len())
            .field("playing", &self.playback.is_some())
            .finish()
    }
}
