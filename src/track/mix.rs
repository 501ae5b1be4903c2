// Solo/mute resolution
// A track is silent iff it is muted, or some other track is soloed and it is not.

use super::{Track, TrackId, TrackList};

/// Resolve the audible state of one track given the solo state of the project
#[inline]
pub fn is_effectively_muted(track: &Track, any_solo: bool) -> bool {
    track.muted || (any_solo && !track.soloed)
}

/// Gain the adapter should apply (master volume is never mixed in the engine)
#[inline]
pub fn effective_gain(track: &Track, master_volume: f32) -> f32 {
    (track.volume * master_volume).clamp(0.0, 1.0)
}

/// Ids of every track that must be muted
pub fn muted_track_ids(tracks: &TrackList) -> Vec<TrackId> {
    let any_solo = tracks.any_solo();
    tracks
        .iter()
        .filter(|t| is_effectively_muted(t, any_solo))
        .map(|t| t.id)
        .collect()
}
