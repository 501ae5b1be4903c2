// Types for project persistence

use crate::markers::LoopState;
use crate::track::{Track, TrackList};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Project settings format version
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProjectVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl ProjectVersion {
    pub fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    pub fn current() -> Self {
        Self::new(1, 0, 0)
    }

    /// Same major version as the running code
    pub fn is_compatible(&self) -> bool {
        self.major == Self::current().major
    }
}

impl Default for ProjectVersion {
    fn default() -> Self {
        Self::current()
    }
}

impl fmt::Display for ProjectVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Project ("piece") identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProjectId(pub uuid::Uuid);

impl ProjectId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for ProjectId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Everything needed to rebuild a practice session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectSettings {
    #[serde(default)]
    pub version: ProjectVersion,
    pub name: String,
    pub track_settings: Vec<Track>,
    #[serde(default)]
    pub loop_state: LoopState,
    pub playback_rate: f64,
    pub master_volume: f32,
    pub saved_at: DateTime<Utc>,
}

impl ProjectSettings {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            version: ProjectVersion::current(),
            name: name.into(),
            track_settings: Vec::new(),
            loop_state: LoopState::default(),
            playback_rate: 1.0,
            master_volume: 1.0,
            saved_at: Utc::now(),
        }
    }

    /// Snapshot of the live session state
    pub fn snapshot(
        name: impl Into<String>,
        tracks: &TrackList,
        loop_state: &LoopState,
        playback_rate: f64,
        master_volume: f32,
    ) -> Self {
        Self {
            track_settings: tracks.as_slice().to_vec(),
            loop_state: loop_state.clone(),
            playback_rate,
            master_volume,
            ..Self::new(name)
        }
    }
}

/// Human-facing project info, stored next to the settings as JSON
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectManifest {
    pub name: String,
    pub version: ProjectVersion,
    pub created: DateTime<Utc>,
    pub modified: DateTime<Utc>,
    #[serde(default)]
    pub track_count: usize,
}
