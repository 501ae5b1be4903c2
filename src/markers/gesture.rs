// Gesture classification for the timeline edit surface

use crate::markers::marker::{Marker, MarkerId};

/// Shape of a completed pointer gesture
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Gesture {
    /// Short gesture, one marker at the press position
    Tap { at: f64 },
    /// Long gesture, two markers and a loop between them
    Span { start: f64, end: f64 },
}

/// Classify a press/release pair
///
/// Anything shorter than `tap_threshold` seconds of timeline is a tap.
pub fn classify(pressed_at: f64, released_at: f64, tap_threshold: f64) -> Gesture {
    let distance = (released_at - pressed_at).abs();
    if distance < tap_threshold {
        Gesture::Tap { at: pressed_at }
    } else {
        Gesture::Span {
            start: pressed_at.min(released_at),
            end: pressed_at.max(released_at),
        }
    }
}

/// Closest marker within `radius` seconds of `time`
pub fn grab_target(markers: &[Marker], time: f64, radius: f64) -> Option<MarkerId> {
    if radius <= 0.0 {
        return None;
    }
    markers
        .iter()
        .map(|m| (m.id, (m.time - time).abs()))
        .filter(|(_, d)| *d <= radius)
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(id, _)| id)
}
