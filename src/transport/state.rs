// Playback state - the one logical clock shared by every track

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Authoritative transport state
///
/// Mutated only by `TransportController`; everybody else reads copies.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlaybackState {
    pub is_playing: bool,
    /// Position in seconds
    pub current_time: f64,
    /// Longest track duration in seconds
    pub duration: f64,
    pub playback_rate: f64,
}

impl Default for PlaybackState {
    fn default() -> Self {
        Self {
            is_playing: false,
            current_time: 0.0,
            duration: 0.0,
            playback_rate: 1.0,
        }
    }
}

impl PlaybackState {
    /// Clamp a requested position into [0, duration]
    pub fn clamp_time(&self, time: f64) -> f64 {
        if !time.is_finite() {
            return 0.0;
        }
        time.clamp(0.0, self.duration.max(0.0))
    }

    /// Position as a fraction of the duration (0.0 when nothing is loaded)
    pub fn progress(&self) -> f64 {
        if self.duration > 0.0 {
            (self.current_time / self.duration).clamp(0.0, 1.0)
        } else {
            0.0
        }
    }
}

/// Lightweight playhead for the UI
///
/// Updated on every processed time update, lock-free so a render loop can poll it
/// at any cadence without touching the transport.
#[derive(Debug, Clone, Default)]
pub struct SharedClock {
    seconds_bits: Arc<AtomicU64>,
}

impl SharedClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seconds(&self) -> f64 {
        f64::from_bits(self.seconds_bits.load(Ordering::Relaxed))
    }

    pub fn set(&self, seconds: f64) {
        self.seconds_bits
            .store(seconds.to_bits(), Ordering::Relaxed);
    }
}
