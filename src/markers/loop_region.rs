// Loop - a region between two markers that can auto-repeat

use crate::markers::marker::MarkerId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for loops
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LoopId(pub uuid::Uuid);

impl LoopId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for LoopId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for LoopId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Loop {
    pub id: LoopId,
    /// Earlier marker
    pub start_marker: MarkerId,
    /// Later marker
    pub end_marker: MarkerId,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
}

impl Loop {
    pub fn new(start_marker: MarkerId, end_marker: MarkerId) -> Self {
        Self {
            id: LoopId::new(),
            start_marker,
            end_marker,
            enabled: false,
            created_at: Utc::now(),
        }
    }

    pub fn references(&self, marker: MarkerId) -> bool {
        self.start_marker == marker || self.end_marker == marker
    }
}

/// Resolved time span of a loop, half-open [start, end)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoopSpan {
    pub loop_id: LoopId,
    pub start: f64,
    pub end: f64,
}

impl LoopSpan {
    pub fn contains(&self, time: f64) -> bool {
        time >= self.start && time < self.end
    }

    pub fn length(&self) -> f64 {
        self.end - self.start
    }

    /// Clamp a time into the span (end excluded by one microsecond)
    pub fn clamp(&self, time: f64) -> f64 {
        let last = (self.end - 1e-6).max(self.start);
        time.clamp(self.start, last)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_span_is_half_open() {
        let span = LoopSpan {
            loop_id: LoopId::new(),
            start: 2.0,
            end: 5.0,
        };
        assert!(span.contains(2.0));
        assert!(span.contains(4.999));
        assert!(!span.contains(5.0));
        assert!(!span.contains(1.9));
        assert_eq!(span.length(), 3.0);
    }

    #[test]
    fn test_span_clamp() {
        let span = LoopSpan {
            loop_id: LoopId::new(),
            start: 2.0,
            end: 5.0,
        };
        assert_eq!(span.clamp(1.0), 2.0);
        assert_eq!(span.clamp(3.5), 3.5);
        assert!(span.contains(span.clamp(9.0)));
    }

    #[test]
    fn test_references() {
        let a = MarkerId::new();
        let b = MarkerId::new();
        let l = Loop::new(a, b);
        assert!(l.references(a) && l.references(b));
        assert!(!l.references(MarkerId::new()));
        assert!(!l.enabled);
    }
}
