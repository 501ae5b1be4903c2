// Engine events - Backends → Engine
// Playback adapters and the capture device report through one ordered queue.

use crate::recording::capture::CaptureError;
use crate::track::TrackId;

/// What a playback adapter reports
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AdapterEventKind {
    /// Audio decoded, duration known
    Ready { duration: f64 },
    /// Periodic playhead report
    TimeUpdate { seconds: f64 },
    /// Playhead reached the end of this track
    Finished,
}

/// What the capture device reports
#[derive(Debug, Clone, PartialEq)]
pub enum CaptureEvent {
    /// Capture truly began
    Started,
    /// Capture stopped, encoded bytes available
    Completed {
        bytes: Vec<u8>,
        /// File extension of the container, if known ("wav", "ogg", ...)
        format_hint: Option<String>,
    },
    /// Device could not start or failed while capturing
    Failed(CaptureError),
}

#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    Adapter {
        track_id: TrackId,
        /// Seek epoch at the time the event was emitted
        epoch: u64,
        kind: AdapterEventKind,
    },
    Capture(CaptureEvent),
}
