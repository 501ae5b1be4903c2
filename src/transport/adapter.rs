// Playback backend seam
// One adapter per track. The engine never decodes audio itself: adapters own
// decoding, output and their own clock, and report back through the event queue.

use crate::messaging::EventSender;
use crate::track::{Track, TrackSource};

/// Errors reported by playback backends
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AdapterError {
    /// Backend refused to start (autoplay policy, output device gone, ...)
    #[error("Playback rejected: {0}")]
    PlayRejected(String),

    #[error("Failed to load {track_source}: {reason}")]
    LoadFailed {
        track_source: TrackSource,
        reason: String,
    },

    #[error("Backend unavailable: {0}")]
    Unavailable(String),
}

/// Per-track playback backend
///
/// Implementations are expected to emit `Ready` once loaded, `TimeUpdate` while
/// playing and right after `set_time`, and `Finished` when the playhead reaches
/// the end of the track.
pub trait PlaybackAdapter: Send {
    /// Load (and decode) the track audio
    fn load(&mut self, source: &TrackSource) -> Result<(), AdapterError>;

    /// Start output. Fire-and-forget: an error means this track stays silent.
    fn play(&mut self) -> Result<(), AdapterError>;

    fn pause(&mut self);

    /// Move the playhead (seconds)
    fn set_time(&mut self, seconds: f64);

    /// Sample-accurate playhead (seconds)
    fn current_time(&self) -> f64;

    /// Track duration (seconds), 0.0 until loaded
    fn duration(&self) -> f64;

    fn set_playback_rate(&mut self, rate: f64, preserve_pitch: bool);

    /// Final gain (track volume × master volume)
    fn set_volume(&mut self, volume: f32);

    fn set_muted(&mut self, muted: bool);

    /// Waveform zoom level, for backends that render
    fn zoom(&mut self, _level: f32) {}
}

/// Creates adapters for tracks loaded at runtime (project open, finished recordings)
pub trait AdapterFactory: Send {
    fn create(
        &mut self,
        track: &Track,
        events: EventSender,
    ) -> Result<Box<dyn PlaybackAdapter>, AdapterError>;
}
