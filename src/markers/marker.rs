// Marker - a named point on the shared timeline

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for markers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MarkerId(pub uuid::Uuid);

impl MarkerId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for MarkerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MarkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Marker {
    pub id: MarkerId,

    /// Position in seconds
    pub time: f64,

    pub created_at: DateTime<Utc>,

    #[serde(default)]
    pub label: Option<String>,
}

impl Marker {
    pub fn new(time: f64) -> Self {
        Self {
            id: MarkerId::new(),
            time,
            created_at: Utc::now(),
            label: None,
        }
    }
}

/// Clamp a marker time to the timeline
///
/// The upper bound only applies once a duration is known.
pub fn clamp_marker_time(time: f64, duration: f64) -> f64 {
    if !time.is_finite() {
        return 0.0;
    }
    let time = time.max(0.0);
    if duration > 0.0 { time.min(duration) } else { time }
}
