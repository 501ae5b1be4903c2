// Project persistence - track files and per-project settings
// The session writes through a ProjectStore after every mutation and rebuilds
// itself from a ProjectSettings snapshot on open.

pub mod file;
pub mod memory;
pub mod store;
pub mod types;

pub use file::FileProjectStore;
pub use memory::MemoryProjectStore;
pub use store::ProjectStore;
pub use types::{ProjectId, ProjectManifest, ProjectSettings, ProjectVersion};

use crate::config::EngineConfig;
use std::collections::HashSet;

/// Project error types
#[derive(Debug, thiserror::Error)]
pub enum ProjectError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("RON error: {0}")]
    Ron(#[from] ron::Error),

    #[error("RON parse error: {0}")]
    RonParse(#[from] ron::error::SpannedError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Project {0} not found")]
    NotFound(ProjectId),

    #[error("Track file not found: {0}")]
    MissingTrackFile(String),

    #[error("Invalid track source: {0}")]
    InvalidSource(String),

    #[error("Unsupported project version {0}")]
    IncompatibleVersion(ProjectVersion),

    #[error("Project validation failed: {0}")]
    ValidationFailed(String),
}

/// Check a loaded snapshot before rebuilding a session from it
pub fn validate_project_settings(
    settings: &ProjectSettings,
    config: &EngineConfig,
) -> Result<(), ProjectError> {
    let invalid = |msg: String| Err(ProjectError::ValidationFailed(msg));

    if !settings.version.is_compatible() {
        return Err(ProjectError::IncompatibleVersion(settings.version));
    }

    if settings.name.trim().is_empty() {
        return invalid("Project name cannot be empty".to_string());
    }
    if settings.name.len() > 255 {
        return invalid("Project name cannot exceed 255 characters".to_string());
    }

    let rate = settings.playback_rate;
    if !(config.transport.min_playback_rate..=config.transport.max_playback_rate).contains(&rate) {
        return invalid(format!(
            "Playback rate {} outside [{}, {}]",
            rate, config.transport.min_playback_rate, config.transport.max_playback_rate
        ));
    }
    if !(0.0..=1.0).contains(&settings.master_volume) {
        return invalid("Master volume must be between 0.0 and 1.0".to_string());
    }

    // Tracks
    if settings.track_settings.len() > config.transport.max_tracks {
        return invalid(format!(
            "Too many tracks ({} > {})",
            settings.track_settings.len(),
            config.transport.max_tracks
        ));
    }
    let mut track_ids = HashSet::new();
    for track in &settings.track_settings {
        if !track_ids.insert(track.id) {
            return invalid(format!("Duplicate track ID: {}", track.id));
        }
        if track.name.trim().is_empty() {
            return invalid(format!("Track {} name cannot be empty", track.id));
        }
        if !(0.0..=1.0).contains(&track.volume) {
            return invalid(format!(
                "Track {} volume must be between 0.0 and 1.0",
                track.id
            ));
        }
        if track.source.is_none() && !track.recordable {
            return invalid(format!("Track {} has no audio", track.id));
        }
    }

    // Markers and loops
    let loops = &settings.loop_state;
    if loops.markers().len() > config.loops.max_markers {
        return invalid(format!("Too many markers ({})", loops.markers().len()));
    }
    if loops.loops().len() > config.loops.max_loops {
        return invalid(format!("Too many loops ({})", loops.loops().len()));
    }
    if !loops.markers().is_sorted_by(|a, b| a.time <= b.time) {
        return invalid("Markers are not sorted by time".to_string());
    }
    for l in loops.loops() {
        let (Some(start), Some(end)) = (loops.marker(l.start_marker), loops.marker(l.end_marker))
        else {
            return invalid(format!("Loop {} references a missing marker", l.id));
        };
        if start.time >= end.time {
            return invalid(format!("Loop {} does not start before it ends", l.id));
        }
    }
    let enabled: Vec<_> = loops.loops().iter().filter(|l| l.enabled).collect();
    if enabled.len() > 1 {
        return invalid("More than one loop is enabled".to_string());
    }
    if enabled.first().map(|l| l.id) != loops.active_loop_id() {
        return invalid("Active loop does not match the enabled loop".to_string());
    }

    Ok(())
}
