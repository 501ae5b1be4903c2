// Tracks - identity and per-track mix settings
// The transport only keys adapters by TrackId; the track list itself lives here.

pub mod mix;

use serde::{Deserialize, Serialize};
use std::fmt;

pub use mix::{effective_gain, is_effectively_muted, muted_track_ids};

/// Stable track identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrackId(pub uuid::Uuid);

impl TrackId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for TrackId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque reference to stored track audio, handed out by the project store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrackSource(pub String);

impl TrackSource {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TrackSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Recording sub-state of a recordable track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecordState {
    #[default]
    Idle,
    Armed,
    Recording,
    Stopped,
}

impl RecordState {
    /// Armed or currently capturing
    pub fn is_active(&self) -> bool {
        matches!(self, RecordState::Armed | RecordState::Recording)
    }
}

/// Track configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub id: TrackId,
    pub name: String,
    /// Stored audio (None for an empty recordable track)
    pub source: Option<TrackSource>,
    /// Track volume (0.0 - 1.0)
    pub volume: f32,
    pub muted: bool,
    pub soloed: bool,
    /// Track color (for UI)
    pub color: [u8; 3],
    /// Track accepts a recording
    #[serde(default)]
    pub recordable: bool,
    #[serde(skip)]
    pub record_state: RecordState,
}

const TRACK_PALETTE: [[u8; 3]; 6] = [
    [100, 150, 200],
    [220, 120, 90],
    [120, 190, 120],
    [200, 170, 80],
    [160, 120, 200],
    [90, 180, 180],
];

impl Track {
    fn blank(id: TrackId, name: String) -> Self {
        Self {
            id,
            name,
            source: None,
            volume: 1.0,
            muted: false,
            soloed: false,
            color: TRACK_PALETTE[0],
            recordable: false,
            record_state: RecordState::Idle,
        }
    }

    /// New track backed by stored audio
    pub fn imported(name: impl Into<String>, source: TrackSource) -> Self {
        Self::imported_as(TrackId::new(), name, source)
    }

    /// Imported track whose id was chosen before its audio was stored
    pub fn imported_as(id: TrackId, name: impl Into<String>, source: TrackSource) -> Self {
        Self {
            source: Some(source),
            ..Self::blank(id, name.into())
        }
    }

    /// New empty track waiting for a recording
    pub fn recordable(name: impl Into<String>) -> Self {
        Self {
            recordable: true,
            ..Self::blank(TrackId::new(), name.into())
        }
    }
}

/// Errors from track list edits
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TrackError {
    #[error("Track limit reached ({limit})")]
    TrackLimitReached { limit: usize },

    #[error("Unknown track {0}")]
    UnknownTrack(TrackId),
}

/// Ordered list of the project's tracks
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrackList {
    tracks: Vec<Track>,
}

impl TrackList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_tracks(tracks: Vec<Track>) -> Self {
        Self { tracks }
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Track> {
        self.tracks.iter()
    }

    pub fn as_slice(&self) -> &[Track] {
        &self.tracks
    }

    pub fn get(&self, id: TrackId) -> Option<&Track> {
        self.tracks.iter().find(|t| t.id == id)
    }

    pub fn get_mut(&mut self, id: TrackId) -> Option<&mut Track> {
        self.tracks.iter_mut().find(|t| t.id == id)
    }

    /// Append a track, assigning it the next palette color
    pub fn add(&mut self, mut track: Track, limit: usize) -> Result<TrackId, TrackError> {
        if self.tracks.len() >= limit {
            return Err(TrackError::TrackLimitReached { limit });
        }
        track.color = TRACK_PALETTE[self.tracks.len() % TRACK_PALETTE.len()];
        let id = track.id;
        self.tracks.push(track);
        Ok(id)
    }

    pub fn remove(&mut self, id: TrackId) -> Result<Track, TrackError> {
        let index = self
            .tracks
            .iter()
            .position(|t| t.id == id)
            .ok_or(TrackError::UnknownTrack(id))?;
        Ok(self.tracks.remove(index))
    }

    pub fn rename(&mut self, id: TrackId, name: impl Into<String>) -> Result<(), TrackError> {
        self.track_mut(id)?.name = name.into();
        Ok(())
    }

    pub fn set_volume(&mut self, id: TrackId, volume: f32) -> Result<(), TrackError> {
        self.track_mut(id)?.volume = volume.clamp(0.0, 1.0);
        Ok(())
    }

    /// Returns the new muted flag
    pub fn toggle_mute(&mut self, id: TrackId) -> Result<bool, TrackError> {
        let track = self.track_mut(id)?;
        track.muted = !track.muted;
        Ok(track.muted)
    }

    /// Returns the new solo flag
    pub fn toggle_solo(&mut self, id: TrackId) -> Result<bool, TrackError> {
        let track = self.track_mut(id)?;
        track.soloed = !track.soloed;
        Ok(track.soloed)
    }

    /// Solo one track and mute every other one
    pub fn exclusive_solo(&mut self, id: TrackId) -> Result<(), TrackError> {
        if self.get(id).is_none() {
            return Err(TrackError::UnknownTrack(id));
        }
        for track in &mut self.tracks {
            let selected = track.id == id;
            track.soloed = selected;
            track.muted = !selected;
        }
        Ok(())
    }

    /// Clear every mute and solo flag
    pub fn unmute_all(&mut self) {
        for track in &mut self.tracks {
            track.muted = false;
            track.soloed = false;
        }
    }

    /// Any track soloed
    pub fn any_solo(&self) -> bool {
        self.tracks.iter().any(|t| t.soloed)
    }

    /// First track that is armed or recording
    pub fn active_recording_track(&self) -> Option<&Track> {
        self.tracks.iter().find(|t| t.record_state.is_active())
    }

    fn track_mut(&mut self, id: TrackId) -> Result<&mut Track, TrackError> {
        self.get_mut(id).ok_or(TrackError::UnknownTrack(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list_of(names: &[&str]) -> (TrackList, Vec<TrackId>) {
        let mut list = TrackList::new();
        let ids = names
            .iter()
            .map(|name| {
                list.add(
                    Track::imported(*name, TrackSource(format!("memory://{}", name))),
                    16,
                )
                .unwrap()
            })
            .collect();
        (list, ids)
    }

    #[test]
    fn test_add_respects_limit() {
        let (mut list, _) = list_of(&["a", "b"]);
        let err = list
            .add(Track::imported("c", TrackSource("x".into())), 2)
            .unwrap_err();
        assert_eq!(err, TrackError::TrackLimitReached { limit: 2 });
        assert_eq!(list.len(), 2);
    }

    #[test]
    fn test_colors_follow_palette() {
        let (list, ids) = list_of(&["a", "b"]);
        assert_eq!(list.get(ids[0]).unwrap().color, TRACK_PALETTE[0]);
        assert_eq!(list.get(ids[1]).unwrap().color, TRACK_PALETTE[1]);
    }

    #[test]
    fn test_volume_is_clamped() {
        let (mut list, ids) = list_of(&["a"]);
        list.set_volume(ids[0], 1.7).unwrap();
        assert_eq!(list.get(ids[0]).unwrap().volume, 1.0);
        list.set_volume(ids[0], -0.2).unwrap();
        assert_eq!(list.get(ids[0]).unwrap().volume, 0.0);
    }

    #[test]
    fn test_exclusive_solo() {
        let (mut list, ids) = list_of(&["a", "b", "c"]);
        list.toggle_solo(ids[1]).unwrap();
        list.exclusive_solo(ids[2]).unwrap();

        let c = list.get(ids[2]).unwrap();
        assert!(c.soloed && !c.muted);
        for id in &ids[..2] {
            let t = list.get(*id).unwrap();
            assert!(!t.soloed && t.muted);
        }
    }

    #[test]
    fn test_unmute_all() {
        let (mut list, ids) = list_of(&["a", "b"]);
        list.exclusive_solo(ids[0]).unwrap();
        list.unmute_all();
        assert!(list.iter().all(|t| !t.muted && !t.soloed));
    }

    #[test]
    fn test_unknown_track() {
        let (mut list, _) = list_of(&["a"]);
        let ghost = TrackId::new();
        assert_eq!(
            list.toggle_mute(ghost).unwrap_err(),
            TrackError::UnknownTrack(ghost)
        );
        assert!(list.remove(ghost).is_err());
    }

    #[test]
    fn test_recordable_track_has_no_source() {
        let track = Track::recordable("Take");
        assert!(track.recordable);
        assert!(track.source.is_none());
        assert_eq!(track.record_state, RecordState::Idle);
    }

    #[test]
    fn test_imported_as_keeps_chosen_id() {
        let id = TrackId::new();
        let track = Track::imported_as(id, "Bass", TrackSource(format!("tracks/{}.wav", id)));
        assert_eq!(track.id, id);
        assert!(!track.recordable);
        assert_eq!(track.source.as_ref().map(|s| s.as_str().to_string()), Some(format!("tracks/{}.wav", id)));
    }
}
