// Marker/loop engine - edit mode, boundary checks and the seek preserve flag
//
// The engine never talks to the transport directly. Operations that need the
// playhead to move return the target time; the session performs the seek.

use crate::config::LoopConfig;
use crate::markers::gesture::{Gesture, classify, grab_target};
use crate::markers::loop_region::{LoopId, LoopSpan};
use crate::markers::marker::MarkerId;
use crate::markers::state::{LoopCreation, LoopError, LoopLimits, LoopState, MarkerRemoval};

/// Pointer press waiting for its release
#[derive(Debug, Clone, Copy, PartialEq)]
struct PendingGesture {
    pressed_at: f64,
    grabbed: Option<MarkerId>,
}

/// What a completed pointer gesture did
#[derive(Debug, Clone, PartialEq)]
pub enum GestureOutcome {
    /// No press recorded
    None,
    /// Edit mode off: the gesture is a scrub to this time
    Seek(f64),
    MarkerCreated(MarkerId),
    LoopCreated {
        start: MarkerId,
        end: MarkerId,
        loop_id: LoopId,
    },
    MarkerMoved {
        marker: MarkerId,
        time: f64,
    },
    Rejected(LoopError),
}

pub struct MarkerLoopEngine {
    state: LoopState,
    config: LoopConfig,
    /// Next seek must not disable the active loop
    preserve_next_seek: bool,
    pending: Option<PendingGesture>,
}

impl MarkerLoopEngine {
    pub fn new(config: LoopConfig) -> Self {
        Self::with_state(LoopState::default(), config)
    }

    /// Engine over an existing state (project load)
    pub fn with_state(mut state: LoopState, config: LoopConfig) -> Self {
        state.set_limits(LoopLimits::from(&config));
        Self {
            state,
            config,
            preserve_next_seek: false,
            pending: None,
        }
    }

    pub fn state(&self) -> &LoopState {
        &self.state
    }

    /// Swap in a whole new state, e.g. after loading a project
    pub fn replace_state(&mut self, mut state: LoopState) {
        state.set_limits(LoopLimits::from(&self.config));
        let fixes = state.repair();
        if fixes > 0 {
            log::warn!("Loop state needed {} correction(s)", fixes);
        }
        self.state = state;
        self.preserve_next_seek = false;
        self.pending = None;
    }

    /// Undo/redo entry point: markers and loops from `snapshot`, active loop kept if it survives
    pub fn restore_structure(&mut self, snapshot: &LoopState) {
        self.state.restore_structure(snapshot);
    }

    pub fn preserve_pending(&self) -> bool {
        self.preserve_next_seek
    }

    pub fn toggle_edit_mode(&mut self) -> bool {
        self.pending = None;
        self.state.toggle_edit_mode()
    }

    pub fn add_marker(&mut self, time: f64, duration: f64) -> Result<MarkerId, LoopError> {
        self.state.add_marker(time, duration)
    }

    pub fn remove_marker(&mut self, id: MarkerId) -> Result<MarkerRemoval, LoopError> {
        let removal = self.state.remove_marker(id)?;
        if !removal.removed_loops.is_empty() {
            log::debug!(
                "Marker {} removed with {} loop(s)",
                id,
                removal.removed_loops.len()
            );
        }
        Ok(removal)
    }

    pub fn update_marker_time(
        &mut self,
        id: MarkerId,
        time: f64,
        duration: f64,
    ) -> Result<f64, LoopError> {
        self.state.update_marker_time(id, time, duration)
    }

    pub fn rename_marker(&mut self, id: MarkerId, label: Option<String>) -> Result<(), LoopError> {
        self.state.rename_marker(id, label)
    }

    pub fn create_loop(&mut self, a: MarkerId, b: MarkerId) -> Result<LoopCreation, LoopError> {
        self.state.create_loop(a, b)
    }

    pub fn remove_loop(&mut self, id: LoopId) -> Result<(), LoopError> {
        self.state.remove_loop(id).map(|_| ())
    }

    /// Flip a loop. When it becomes active, returns the start time to seek to.
    pub fn toggle_loop_by_id(&mut self, id: LoopId) -> Result<Option<f64>, LoopError> {
        if !self.state.toggle_loop(id)? {
            return Ok(None);
        }
        self.preserve_next_seek = true;
        Ok(self.state.span(id).map(|s| s.start))
    }

    /// Enable exactly one loop (or none); the next seek keeps it armed
    pub fn set_active_loop(&mut self, id: Option<LoopId>) -> Result<(), LoopError> {
        self.state.set_active_loop(id)?;
        self.preserve_next_seek = id.is_some();
        Ok(())
    }

    /// Click inside a loop zone: activate the loop and return the time to seek to
    pub fn jump_into_loop(&mut self, id: LoopId, time: f64) -> Result<f64, LoopError> {
        let span = self.state.span(id).ok_or(LoopError::UnknownLoop(id))?;
        self.set_active_loop(Some(id))?;
        Ok(span.clamp(time))
    }

    /// Reactivate a loop saved before recording, if it still exists
    pub fn restore_active_loop(&mut self, id: Option<LoopId>) -> bool {
        let id = id.filter(|id| self.state.loop_by_id(*id).is_some());
        let restored = id.is_some();
        // Set directly: no preserve flag for a restore
        if self.state.set_active_loop(id).is_err() {
            return false;
        }
        restored
    }

    pub fn disable_active_loop(&mut self) -> Option<LoopId> {
        self.preserve_next_seek = false;
        self.state.disable_active_loop()
    }

    pub fn active_span(&self) -> Option<LoopSpan> {
        self.state.active_span()
    }

    /// Reconcile the active loop with a seek about to happen
    ///
    /// Consumes the preserve flag. Returns the loop that got disabled, if any.
    pub fn on_seek(&mut self, target: f64, origin_preserves: bool) -> Option<LoopId> {
        let preserve = std::mem::take(&mut self.preserve_next_seek) || origin_preserves;
        if preserve {
            return None;
        }
        let span = self.state.active_span()?;
        if span.contains(target) {
            return None;
        }
        log::debug!("Seek to {:.3}s left loop {}, disabling it", target, span.loop_id);
        self.state.disable_active_loop()
    }

    /// Auto-repeat: returns the loop start when the playhead reached the loop end
    pub fn check_boundary(&self, current_time: f64) -> Option<f64> {
        let span = self.state.active_span()?;
        (current_time >= span.end).then_some(span.start)
    }

    /// Record a press on the timeline. Only meaningful in edit mode.
    pub fn pointer_down(&mut self, time: f64, duration: f64) {
        if !self.state.edit_mode() {
            self.pending = None;
            return;
        }
        let radius = duration.max(0.0) * self.config.drag_proximity_ratio;
        self.pending = Some(PendingGesture {
            pressed_at: time,
            grabbed: grab_target(self.state.markers(), time, radius),
        });
    }

    /// Complete a gesture
    pub fn pointer_up(&mut self, time: f64, duration: f64) -> GestureOutcome {
        if !self.state.edit_mode() {
            self.pending = None;
            return GestureOutcome::Seek(time);
        }
        let Some(pending) = self.pending.take() else {
            return GestureOutcome::None;
        };

        if let Some(marker) = pending.grabbed {
            return match self.state.update_marker_time(marker, time, duration) {
                Ok(time) => GestureOutcome::MarkerMoved { marker, time },
                Err(e) => GestureOutcome::Rejected(e),
            };
        }

        match classify(pending.pressed_at, time, self.config.tap_threshold) {
            Gesture::Tap { at } => match self.state.add_marker(at, duration) {
                Ok(id) => GestureOutcome::MarkerCreated(id),
                Err(e) => GestureOutcome::Rejected(e),
            },
            Gesture::Span { start, end } => match self.create_span(start, end, duration) {
                Ok(outcome) => outcome,
                Err(e) => GestureOutcome::Rejected(e),
            },
        }
    }

    /// Two markers and a loop, or nothing at all
    fn create_span(
        &mut self,
        start: f64,
        end: f64,
        duration: f64,
    ) -> Result<GestureOutcome, LoopError> {
        let limits = self.state.limits();
        if self.state.marker_capacity_left() < 2 {
            return Err(LoopError::MarkerLimitReached {
                limit: limits.max_markers,
            });
        }
        if self.state.loop_capacity_left() < 1 {
            return Err(LoopError::LoopLimitReached {
                limit: limits.max_loops,
            });
        }

        let start_id = self.state.add_marker(start, duration)?;
        let end_id = match self.state.add_marker(end, duration) {
            Ok(id) => id,
            Err(e) => {
                let _ = self.state.remove_marker(start_id);
                return Err(e);
            }
        };
        match self.state.create_loop(start_id, end_id) {
            Ok(creation) => Ok(GestureOutcome::LoopCreated {
                start: start_id,
                end: end_id,
                loop_id: creation.loop_id(),
            }),
            Err(e) => {
                let _ = self.state.remove_marker(end_id);
                let _ = self.state.remove_marker(start_id);
                Err(e)
            }
        }
    }
}
