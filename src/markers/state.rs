// Loop state - markers, loops and the active loop
//
// Every edit goes through one method that leaves the state consistent:
// markers sorted by time, loops referencing existing markers with
// start.time < end.time, and at most one enabled loop (the active one).

use crate::config::LoopConfig;
use crate::markers::loop_region::{Loop, LoopId, LoopSpan};
use crate::markers::marker::{Marker, MarkerId, clamp_marker_time};
use serde::{Deserialize, Serialize};

/// Marker / loop edit errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LoopError {
    #[error("Marker limit reached ({limit})")]
    MarkerLimitReached { limit: usize },

    #[error("Loop limit reached ({limit})")]
    LoopLimitReached { limit: usize },

    #[error("Unknown marker {0}")]
    UnknownMarker(MarkerId),

    #[error("Unknown loop {0}")]
    UnknownLoop(LoopId),

    #[error("Loop markers must be at different times")]
    DegenerateLoop,
}

impl LoopError {
    /// Cap exceeded (as opposed to a stale reference)
    pub fn is_capacity(&self) -> bool {
        matches!(
            self,
            LoopError::MarkerLimitReached { .. } | LoopError::LoopLimitReached { .. }
        )
    }
}

/// Marker and loop caps
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopLimits {
    pub max_markers: usize,
    pub max_loops: usize,
}

impl Default for LoopLimits {
    fn default() -> Self {
        Self {
            max_markers: 20,
            max_loops: 10,
        }
    }
}

impl From<&LoopConfig> for LoopLimits {
    fn from(config: &LoopConfig) -> Self {
        Self {
            max_markers: config.max_markers,
            max_loops: config.max_loops,
        }
    }
}

/// Result of a marker removal, cascade included
#[derive(Debug, Clone, PartialEq)]
pub struct MarkerRemoval {
    pub marker: Marker,
    pub removed_loops: Vec<Loop>,
    /// The active loop was among the removed loops
    pub cleared_active: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopCreation {
    Created(LoopId),
    /// Same (start, end) pair already exists, nothing created
    AlreadyExists(LoopId),
}

impl LoopCreation {
    pub fn loop_id(&self) -> LoopId {
        match self {
            LoopCreation::Created(id) | LoopCreation::AlreadyExists(id) => *id,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoopState {
    markers: Vec<Marker>,
    loops: Vec<Loop>,
    active_loop: Option<LoopId>,
    edit_mode: bool,
    #[serde(skip)]
    limits: LoopLimits,
}

impl LoopState {
    pub fn new(limits: LoopLimits) -> Self {
        Self {
            limits,
            ..Default::default()
        }
    }

    pub fn markers(&self) -> &[Marker] {
        &self.markers
    }

    pub fn loops(&self) -> &[Loop] {
        &self.loops
    }

    pub fn marker(&self, id: MarkerId) -> Option<&Marker> {
        self.markers.iter().find(|m| m.id == id)
    }

    pub fn loop_by_id(&self, id: LoopId) -> Option<&Loop> {
        self.loops.iter().find(|l| l.id == id)
    }

    pub fn active_loop_id(&self) -> Option<LoopId> {
        self.active_loop
    }

    pub fn edit_mode(&self) -> bool {
        self.edit_mode
    }

    pub fn set_edit_mode(&mut self, edit_mode: bool) {
        self.edit_mode = edit_mode;
    }

    /// Returns the new edit mode
    pub fn toggle_edit_mode(&mut self) -> bool {
        self.edit_mode = !self.edit_mode;
        self.edit_mode
    }

    pub fn limits(&self) -> LoopLimits {
        self.limits
    }

    pub fn set_limits(&mut self, limits: LoopLimits) {
        self.limits = limits;
    }

    pub fn marker_capacity_left(&self) -> usize {
        self.limits.max_markers.saturating_sub(self.markers.len())
    }

    pub fn loop_capacity_left(&self) -> usize {
        self.limits.max_loops.saturating_sub(self.loops.len())
    }

    /// Insert a marker at `time` (clamped), keeping the collection sorted
    pub fn add_marker(&mut self, time: f64, duration: f64) -> Result<MarkerId, LoopError> {
        if self.markers.len() >= self.limits.max_markers {
            return Err(LoopError::MarkerLimitReached {
                limit: self.limits.max_markers,
            });
        }
        let marker = Marker::new(clamp_marker_time(time, duration));
        let id = marker.id;
        self.insert_sorted(marker);
        Ok(id)
    }

    /// Remove a marker and every loop referencing it, in one step
    pub fn remove_marker(&mut self, id: MarkerId) -> Result<MarkerRemoval, LoopError> {
        let index = self
            .markers
            .iter()
            .position(|m| m.id == id)
            .ok_or(LoopError::UnknownMarker(id))?;

        let (removed_loops, kept): (Vec<Loop>, Vec<Loop>) = std::mem::take(&mut self.loops)
            .into_iter()
            .partition(|l| l.references(id));
        self.loops = kept;

        let cleared_active = self
            .active_loop
            .is_some_and(|active| removed_loops.iter().any(|l| l.id == active));
        if cleared_active {
            self.active_loop = None;
        }

        let marker = self.markers.remove(index);
        Ok(MarkerRemoval {
            marker,
            removed_loops,
            cleared_active,
        })
    }

    /// Move a marker (clamped) and re-sort
    ///
    /// Loops whose markers end up inverted get their start/end swapped. A move
    /// onto the time of a loop partner is refused with `DegenerateLoop` and
    /// leaves the state untouched. Returns the applied time.
    pub fn update_marker_time(
        &mut self,
        id: MarkerId,
        time: f64,
        duration: f64,
    ) -> Result<f64, LoopError> {
        let index = self
            .markers
            .iter()
            .position(|m| m.id == id)
            .ok_or(LoopError::UnknownMarker(id))?;

        let applied = clamp_marker_time(time, duration);
        let collapses = self
            .loops
            .iter()
            .filter(|l| l.references(id))
            .map(|l| if l.start_marker == id { l.end_marker } else { l.start_marker })
            .any(|partner| self.time_of(partner) == Some(applied));
        if collapses {
            return Err(LoopError::DegenerateLoop);
        }

        let mut marker = self.markers.remove(index);
        marker.time = applied;
        self.insert_sorted(marker);

        for i in 0..self.loops.len() {
            if !self.loops[i].references(id) {
                continue;
            }
            let (start, end) = (self.loops[i].start_marker, self.loops[i].end_marker);
            if let (Some(s), Some(e)) = (self.time_of(start), self.time_of(end))
                && s > e
            {
                let l = &mut self.loops[i];
                std::mem::swap(&mut l.start_marker, &mut l.end_marker);
            }
        }
        Ok(applied)
    }

    pub fn rename_marker(&mut self, id: MarkerId, label: Option<String>) -> Result<(), LoopError> {
        let marker = self
            .markers
            .iter_mut()
            .find(|m| m.id == id)
            .ok_or(LoopError::UnknownMarker(id))?;
        marker.label = label.filter(|l| !l.trim().is_empty());
        Ok(())
    }

    /// Create a loop between two markers, in either order
    pub fn create_loop(&mut self, a: MarkerId, b: MarkerId) -> Result<LoopCreation, LoopError> {
        let time_a = self.time_of(a).ok_or(LoopError::UnknownMarker(a))?;
        let time_b = self.time_of(b).ok_or(LoopError::UnknownMarker(b))?;
        if a == b || time_a == time_b {
            return Err(LoopError::DegenerateLoop);
        }
        let (start, end) = if time_a < time_b { (a, b) } else { (b, a) };

        if let Some(existing) = self
            .loops
            .iter()
            .find(|l| l.start_marker == start && l.end_marker == end)
        {
            return Ok(LoopCreation::AlreadyExists(existing.id));
        }

        if self.loops.len() >= self.limits.max_loops {
            return Err(LoopError::LoopLimitReached {
                limit: self.limits.max_loops,
            });
        }

        let new_loop = Loop::new(start, end);
        let id = new_loop.id;
        self.loops.push(new_loop);
        Ok(LoopCreation::Created(id))
    }

    pub fn remove_loop(&mut self, id: LoopId) -> Result<Loop, LoopError> {
        let index = self
            .loops
            .iter()
            .position(|l| l.id == id)
            .ok_or(LoopError::UnknownLoop(id))?;
        if self.active_loop == Some(id) {
            self.active_loop = None;
        }
        Ok(self.loops.remove(index))
    }

    /// Flip a loop, disabling every other one. Returns whether it is now enabled.
    pub fn toggle_loop(&mut self, id: LoopId) -> Result<bool, LoopError> {
        let enabled = self
            .loop_by_id(id)
            .map(|l| l.enabled)
            .ok_or(LoopError::UnknownLoop(id))?;
        self.apply_active(if enabled { None } else { Some(id) });
        Ok(!enabled)
    }

    /// Enable exactly `id`, or nothing
    pub fn set_active_loop(&mut self, id: Option<LoopId>) -> Result<(), LoopError> {
        if let Some(id) = id
            && self.loop_by_id(id).is_none()
        {
            return Err(LoopError::UnknownLoop(id));
        }
        self.apply_active(id);
        Ok(())
    }

    /// Disable the active loop, returning it
    pub fn disable_active_loop(&mut self) -> Option<LoopId> {
        let previous = self.active_loop;
        self.apply_active(None);
        previous
    }

    pub fn span(&self, id: LoopId) -> Option<LoopSpan> {
        let l = self.loop_by_id(id)?;
        Some(LoopSpan {
            loop_id: id,
            start: self.time_of(l.start_marker)?,
            end: self.time_of(l.end_marker)?,
        })
    }

    /// Span of the active loop, if it is enabled and not empty
    pub fn active_span(&self) -> Option<LoopSpan> {
        let id = self.active_loop?;
        self.loop_by_id(id).filter(|l| l.enabled)?;
        self.span(id).filter(|s| s.length() > 0.0)
    }

    /// Replace markers and loops with those of `snapshot`
    ///
    /// Edit mode and limits are kept. The current active loop stays active if it
    /// still exists in the snapshot.
    pub fn restore_structure(&mut self, snapshot: &LoopState) {
        let active = self.active_loop;
        self.markers = snapshot.markers.clone();
        self.loops = snapshot.loops.clone();
        let active = active.filter(|id| self.loops.iter().any(|l| l.id == *id));
        self.apply_active(active);
    }

    /// Bring a deserialized state back to a consistent shape
    ///
    /// Returns the number of corrections made.
    pub fn repair(&mut self) -> usize {
        let mut fixes = 0;

        if !self.markers.is_sorted_by(|a, b| a.time <= b.time) {
            self.markers.sort_by(|a, b| a.time.total_cmp(&b.time));
            fixes += 1;
        }

        let before = self.loops.len();
        let markers = &self.markers;
        let time_of = |id: MarkerId| markers.iter().find(|m| m.id == id).map(|m| m.time);
        self.loops.retain(|l| match (time_of(l.start_marker), time_of(l.end_marker)) {
            (Some(s), Some(e)) => s != e,
            _ => false,
        });
        fixes += before - self.loops.len();

        for i in 0..self.loops.len() {
            let (s, e) = (
                self.time_of(self.loops[i].start_marker),
                self.time_of(self.loops[i].end_marker),
            );
            if let (Some(s), Some(e)) = (s, e)
                && s > e
            {
                let l = &mut self.loops[i];
                std::mem::swap(&mut l.start_marker, &mut l.end_marker);
                fixes += 1;
            }
        }

        let active = self
            .active_loop
            .filter(|id| self.loops.iter().any(|l| l.id == *id))
            .or_else(|| self.loops.iter().find(|l| l.enabled).map(|l| l.id));
        let consistent = self.active_loop == active
            && self.loops.iter().all(|l| l.enabled == (Some(l.id) == active));
        if !consistent {
            fixes += 1;
        }
        self.apply_active(active);

        fixes
    }

    fn apply_active(&mut self, active: Option<LoopId>) {
        for l in &mut self.loops {
            l.enabled = Some(l.id) == active;
        }
        self.active_loop = active;
    }

    fn time_of(&self, id: MarkerId) -> Option<f64> {
        self.marker(id).map(|m| m.time)
    }

    fn insert_sorted(&mut self, marker: Marker) {
        let index = self.markers.partition_point(|m| m.time <= marker.time);
        self.markers.insert(index, marker);
    }
}
