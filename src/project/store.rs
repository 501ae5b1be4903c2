// Persistence façade consumed by the session

use crate::project::ProjectError;
use crate::project::types::{ProjectId, ProjectSettings};
use crate::track::{TrackId, TrackSource};

/// Durable storage of project settings and track audio, keyed by project id
pub trait ProjectStore: Send {
    fn save_settings(
        &mut self,
        project: ProjectId,
        settings: &ProjectSettings,
    ) -> Result<(), ProjectError>;

    fn load_settings(&self, project: ProjectId) -> Result<ProjectSettings, ProjectError>;

    /// Store track audio, returning the reference to put in `Track::source`
    fn save_track_file(
        &mut self,
        project: ProjectId,
        track: TrackId,
        bytes: &[u8],
    ) -> Result<TrackSource, ProjectError>;

    fn load_track_file(
        &self,
        project: ProjectId,
        source: &TrackSource,
    ) -> Result<Vec<u8>, ProjectError>;

    fn delete_track_file(
        &mut self,
        project: ProjectId,
        source: &TrackSource,
    ) -> Result<(), ProjectError>;
}

/// Relative location of a track's audio inside a project
pub fn track_file_name(track: TrackId) -> String {
    format!("tracks/{}.wav", track)
}

/// Reject sources that would escape the project
pub fn check_source(source: &TrackSource) -> Result<(), ProjectError> {
    let s = source.as_str();
    if s.is_empty() || !s.starts_with("tracks/") || s.contains("..") || s.contains('\\') {
        return Err(ProjectError::InvalidSource(s.to_string()));
    }
    Ok(())
}
