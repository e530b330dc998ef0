//! Cache configuration.

use std::time::Duration;

/// Reference output sample rate in Hz.
pub const SAMPLE_RATE: u32 = 44_100;

/// The only other sample rate the file encoder supports.
pub const HALF_SAMPLE_RATE: u32 = 22_050;

/// Longest possible sound in output frames: three envelope stages of
/// 1e5 samples each, plus the 10 sample decay tail.
pub const MAX_SOUND_FRAMES: usize = 300_010;

/// Frames synthesized per pull while a sound is played before it is cached.
pub const LIVE_CHUNK_FRAMES: usize = 3072;

/// Samples per engine call in time-budgeted asynchronous slices.
pub const ASYNC_CHUNK_SAMPLES: usize = 500;

/// How much work one [`tick`](crate::Sfxr::tick) of an asynchronous cache does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SliceBudget {
    /// Keep synthesizing 500 sample chunks until the wall-clock budget is
    /// spent. At least one chunk runs per tick.
    Time(Duration),
    /// Run exactly one engine call of this many samples per tick. Output
    /// timing is then independent of host speed.
    Samples(usize),
}

impl Default for SliceBudget {
    fn default() -> Self {
        SliceBudget::Time(Duration::from_millis(5))
    }
}

/// Settings for [`Sfxr`](crate::Sfxr) caching and playback.
///
/// # Examples
///
/// ```
/// use sfxr::{CacheConfig, SliceBudget};
///
/// let config = CacheConfig::default().with_slice_budget(SliceBudget::Samples(256));
/// assert_eq!(config.slice_budget, SliceBudget::Samples(256));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Work done per asynchronous tick
    pub slice_budget: SliceBudget,
    /// Capacity of every cached buffer, in stereo frames
    pub capacity_frames: usize,
    /// Frames synthesized per pull during live playback
    pub live_chunk_frames: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            slice_budget: SliceBudget::default(),
            capacity_frames: MAX_SOUND_FRAMES,
            live_chunk_frames: LIVE_CHUNK_FRAMES,
        }
    }
}

impl CacheConfig {
    pub fn with_slice_budget(mut self, budget: SliceBudget) -> Self {
        self.slice_budget = budget;
        self
    }

    /// Sets the cached buffer capacity. Sounds longer than this are cut off.
    pub fn with_capacity_frames(mut self, frames: usize) -> Self {
        self.capacity_frames = frames;
        self
    }

    pub fn with_live_chunk_frames(mut self, frames: usize) -> Self {
        self.live_chunk_frames = frames.max(1);
        self
    }
}
