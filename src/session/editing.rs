// Marker and loop editing on the session
//
// Structural edits go through the command manager so they can be undone.
// Loop activation moves the playhead and is never recorded.

use super::PracticeSession;
use crate::command::{CommandError, EditOutcome, LoopEdit, LoopEditCommand, RecordedEditCommand};
use crate::markers::{
    GestureOutcome, LoopCreation, LoopError, LoopId, LoopState, MarkerId, MarkerRemoval,
};
use crate::messaging::NotificationCategory;
use crate::transport::SeekOrigin;

impl PracticeSession {
    pub fn edit_mode(&self) -> bool {
        self.loops.state().edit_mode()
    }

    pub fn toggle_edit_mode(&mut self) -> bool {
        let on = self.loops.toggle_edit_mode();
        self.persist();
        on
    }

    pub fn add_marker(&mut self, time: f64) -> Option<MarkerId> {
        let duration = self.transport.state().duration;
        match self.apply_edit(LoopEdit::AddMarker { time, duration })? {
            EditOutcome::MarkerAdded(id) => Some(id),
            _ => None,
        }
    }

    /// Remove a marker and every loop built on it
    pub fn remove_marker(&mut self, id: MarkerId) -> Option<MarkerRemoval> {
        match self.apply_edit(LoopEdit::RemoveMarker { id })? {
            EditOutcome::MarkerRemoved(removal) => Some(removal),
            _ => None,
        }
    }

    /// Returns the applied (clamped) time
    pub fn update_marker_time(&mut self, id: MarkerId, time: f64) -> Option<f64> {
        let duration = self.transport.state().duration;
        match self.apply_edit(LoopEdit::MoveMarker { id, time, duration })? {
            EditOutcome::MarkerMoved(time) => Some(time),
            _ => None,
        }
    }

    pub fn rename_marker(&mut self, id: MarkerId, label: Option<String>) -> bool {
        self.apply_edit(LoopEdit::RenameMarker { id, label })
            .is_some()
    }

    /// Loop between two markers, in either order
    ///
    /// An identical loop is not duplicated: its id is returned instead.
    pub fn create_loop(&mut self, a: MarkerId, b: MarkerId) -> Option<LoopId> {
        match self.apply_edit(LoopEdit::CreateLoop { a, b })? {
            EditOutcome::LoopCreated(LoopCreation::Created(id)) => Some(id),
            EditOutcome::LoopCreated(LoopCreation::AlreadyExists(id)) => {
                log::info!("Loop {} already spans these markers", id);
                Some(id)
            }
            _ => None,
        }
    }

    pub fn remove_loop(&mut self, id: LoopId) -> bool {
        self.apply_edit(LoopEdit::RemoveLoop { id }).is_some()
    }

    /// Flip a loop on or off; turning it on jumps to its start
    ///
    /// Returns the new enabled flag, None for an unknown loop.
    pub fn toggle_loop_by_id(&mut self, id: LoopId) -> Option<bool> {
        match self.loops.toggle_loop_by_id(id) {
            Ok(Some(start)) => {
                self.seek_with(start, SeekOrigin::LoopJump);
                self.persist();
                Some(true)
            }
            Ok(None) => {
                self.persist();
                Some(false)
            }
            Err(e) => {
                self.reject_loop_edit(&e);
                None
            }
        }
    }

    /// Enable exactly this loop (or none) without moving the playhead
    pub fn set_active_loop(&mut self, id: Option<LoopId>) -> bool {
        match self.loops.set_active_loop(id) {
            Ok(()) => {
                self.persist();
                true
            }
            Err(e) => {
                self.reject_loop_edit(&e);
                false
            }
        }
    }

    /// Click inside a loop zone: enable that loop and jump to the clicked time
    pub fn jump_into_loop(&mut self, id: LoopId, time: f64) -> Option<f64> {
        match self.loops.jump_into_loop(id, time) {
            Ok(target) => {
                let applied = self.seek_with(target, SeekOrigin::LoopJump);
                self.persist();
                Some(applied)
            }
            Err(e) => {
                self.reject_loop_edit(&e);
                None
            }
        }
    }

    // Timeline gestures

    pub fn pointer_down(&mut self, time: f64) {
        let duration = self.transport.state().duration;
        self.loops.pointer_down(time, duration);
    }

    /// Finish a gesture: an edit in edit mode, a seek otherwise
    pub fn pointer_up(&mut self, time: f64) -> GestureOutcome {
        let duration = self.transport.state().duration;
        let before = self.loops.state().clone();
        let outcome = self.loops.pointer_up(time, duration);

        match &outcome {
            GestureOutcome::None => {}
            GestureOutcome::Seek(target) => {
                self.seek(*target);
            }
            GestureOutcome::MarkerCreated(_) => self.record_gesture("Add Marker", before),
            GestureOutcome::LoopCreated { .. } => self.record_gesture("Create Loop", before),
            GestureOutcome::MarkerMoved { time, .. } => {
                self.record_gesture(format!("Move Marker to {:.2}s", time), before)
            }
            GestureOutcome::Rejected(e) => self.reject_loop_edit(e),
        }
        outcome
    }

    // History

    /// Returns the description of the undone edit
    pub fn undo(&mut self) -> Option<String> {
        match self.history.undo(&mut self.loops) {
            Ok(description) => {
                log::debug!("Undo: {}", description);
                self.persist();
                Some(description)
            }
            Err(CommandError::NothingToUndo) => None,
            Err(e) => {
                log::warn!("Undo failed: {}", e);
                None
            }
        }
    }

    pub fn redo(&mut self) -> Option<String> {
        match self.history.redo(&mut self.loops) {
            Ok(description) => {
                log::debug!("Redo: {}", description);
                self.persist();
                Some(description)
            }
            Err(CommandError::NothingToRedo) => None,
            Err(e) => {
                log::warn!("Redo failed: {}", e);
                None
            }
        }
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    pub fn undo_description(&self) -> Option<String> {
        self.history.undo_description()
    }

    pub fn redo_description(&self) -> Option<String> {
        self.history.redo_description()
    }

    fn apply_edit(&mut self, edit: LoopEdit) -> Option<EditOutcome> {
        let command = Box::new(LoopEditCommand::new(edit));
        match self.history.execute(command, &mut self.loops) {
            Ok(outcome) => {
                if outcome.changed() {
                    self.persist();
                }
                Some(outcome)
            }
            Err(CommandError::Rejected(e)) => {
                self.reject_loop_edit(&e);
                None
            }
            Err(e) => {
                log::warn!("Edit failed: {}", e);
                None
            }
        }
    }

    fn record_gesture(&mut self, description: impl Into<String>, before: LoopState) {
        let after = self.loops.state().clone();
        let command = Box::new(RecordedEditCommand::new(description, before, after));
        if let Err(e) = self.history.execute(command, &mut self.loops) {
            log::warn!("Could not record gesture: {}", e);
        }
        self.persist();
    }

    /// Capacity and stale-reference errors are no-ops with a warning
    pub(super) fn reject_loop_edit(&mut self, error: &LoopError) {
        let message = if error.is_capacity() {
            format!("{}. Remove one to add another.", error)
        } else {
            error.to_string()
        };
        self.notifier.warning(NotificationCategory::Loop, message);
    }
}

#[cfg(test)]
mod tests {
    use super::super::rig::Rig;
    use crate::markers::GestureOutcome;
    use crate::messaging::{NotificationCategory, NotificationLevel};
    use crate::project::ProjectStore;

    fn rig_with_track(duration: f64) -> Rig {
        let mut rig = Rig::new();
        rig.import("Band", duration);
        rig
    }

    #[test]
    fn test_move_onto_loop_partner_is_refused() {
        let mut rig = rig_with_track(30.0);
        let a = rig.session.add_marker(2.0).unwrap();
        let b = rig.session.add_marker(5.0).unwrap();
        let id = rig.session.create_loop(a, b).unwrap();
        rig.drain_notifications();

        assert_eq!(rig.session.update_marker_time(b, 2.0), None);
        let warnings = rig.drain_notifications();
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].level, NotificationLevel::Warning);
        assert_eq!(warnings[0].category, NotificationCategory::Loop);

        let span = rig.session.loop_state().span(id).unwrap();
        assert_eq!((span.start, span.end), (2.0, 5.0));
        let saved = rig.store.load_settings(rig.session.project_id()).unwrap();
        assert!(crate::project::validate_project_settings(&saved, rig.session.config()).is_ok());
    }

    #[test]
    fn test_marker_edits_are_persisted() {
        let mut rig = rig_with_track(60.0);
        let saves = rig.store.save_count();

        let id = rig.session.add_marker(12.5).unwrap();
        assert!(rig.session.rename_marker(id, Some("Bridge".into())));
        assert_eq!(rig.session.update_marker_time(id, 90.0), Some(60.0));

        assert_eq!(rig.store.save_count(), saves + 3);
        let saved = rig.store.load_settings(rig.session.project_id()).unwrap();
        let marker = saved.loop_state.marker(id).unwrap();
        assert_eq!(marker.time, 60.0);
        assert_eq!(marker.label.as_deref(), Some("Bridge"));
    }

    #[test]
    fn test_marker_cap_warns() {
        let mut rig = rig_with_track(60.0);
        for i in 0..20 {
            assert!(rig.session.add_marker(i as f64).is_some());
        }
        rig.drain_notifications();

        assert!(rig.session.add_marker(30.5).is_none());
        assert_eq!(rig.session.loop_state().markers().len(), 20);
        let notes = rig.drain_notifications();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].level, NotificationLevel::Warning);
        assert_eq!(notes[0].category, NotificationCategory::Loop);
    }

    #[test]
    fn test_toggle_loop_jumps_to_start() {
        let mut rig = rig_with_track(60.0);
        let a = rig.session.add_marker(8.0).unwrap();
        let b = rig.session.add_marker(4.0).unwrap();
        let id = rig.session.create_loop(a, b).unwrap();

        rig.session.seek(20.0);
        assert_eq!(rig.session.toggle_loop_by_id(id), Some(true));
        assert_eq!(rig.session.playback_state().current_time, 4.0);
        assert_eq!(rig.session.loop_state().active_loop_id(), Some(id));

        assert_eq!(rig.session.toggle_loop_by_id(id), Some(false));
        assert_eq!(rig.session.loop_state().active_loop_id(), None);
    }

    #[test]
    fn test_seek_outside_disables_loop() {
        let mut rig = rig_with_track(60.0);
        let a = rig.session.add_marker(2.0).unwrap();
        let b = rig.session.add_marker(5.0).unwrap();
        let id = rig.session.create_loop(a, b).unwrap();
        rig.session.toggle_loop_by_id(id);

        rig.session.seek(3.0);
        assert_eq!(rig.session.loop_state().active_loop_id(), Some(id));
        rig.session.seek(10.0);
        assert_eq!(rig.session.loop_state().active_loop_id(), None);
        rig.session.seek(10.0);
        assert_eq!(rig.session.playback_state().current_time, 10.0);
        assert_eq!(rig.session.loop_state().active_loop_id(), None);
    }

    #[test]
    fn test_set_active_loop_preserves_next_seek() {
        let mut rig = rig_with_track(60.0);
        let a = rig.session.add_marker(2.0).unwrap();
        let b = rig.session.add_marker(5.0).unwrap();
        let id = rig.session.create_loop(a, b).unwrap();

        assert!(rig.session.set_active_loop(Some(id)));
        rig.session.seek(30.0);
        assert_eq!(rig.session.loop_state().active_loop_id(), Some(id));
        // Preserve is one-shot
        rig.session.seek(40.0);
        assert_eq!(rig.session.loop_state().active_loop_id(), None);
    }

    #[test]
    fn test_loop_auto_repeat_during_playback() {
        let mut rig = rig_with_track(60.0);
        let a = rig.session.add_marker(2.0).unwrap();
        let b = rig.session.add_marker(5.0).unwrap();
        let id = rig.session.create_loop(a, b).unwrap();
        rig.session.jump_into_loop(id, 2.0);
        rig.session.play();
        rig.session.dispatch_events();

        for _ in 0..3 {
            rig.advance(1.0);
        }
        // Reached 5.0: back to 2.0 with the loop still active
        let state = rig.session.playback_state();
        assert_eq!(state.current_time, 2.0);
        assert!(state.is_playing);
        assert_eq!(rig.session.loop_state().active_loop_id(), Some(id));

        rig.advance(1.0);
        assert!((rig.session.clock().seconds() - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_loop_ending_at_track_end_keeps_repeating() {
        let mut rig = Rig::new();
        let band = rig.import("Band", 10.0);
        let a = rig.session.add_marker(6.0).unwrap();
        let b = rig.session.add_marker(10.0).unwrap();
        let id = rig.session.create_loop(a, b).unwrap();
        rig.session.jump_into_loop(id, 7.0);
        rig.session.play();
        rig.session.dispatch_events();

        // The adapter reports its end and Finished in the same tick
        rig.advance(5.0);
        let handle = rig.backend.handle(band).unwrap();
        assert_eq!(handle.position(), 6.0);
        assert!(handle.is_playing());
        assert!(rig.session.playback_state().is_playing);
        assert_eq!(rig.session.loop_state().active_loop_id(), Some(id));

        rig.advance(1.0);
        assert!((rig.session.clock().seconds() - 7.0).abs() < 1e-9);
        assert!(handle.is_playing());
    }

    #[test]
    fn test_gesture_tap_and_span() {
        let mut rig = rig_with_track(60.0);
        rig.session.toggle_edit_mode();

        rig.session.pointer_down(10.0);
        assert!(matches!(
            rig.session.pointer_up(10.3),
            GestureOutcome::MarkerCreated(_)
        ));
        assert_eq!(rig.session.loop_state().markers().len(), 1);
        assert_eq!(rig.session.loop_state().markers()[0].time, 10.0);

        rig.session.pointer_down(30.0);
        assert!(matches!(
            rig.session.pointer_up(20.0),
            GestureOutcome::LoopCreated { .. }
        ));
        let state = rig.session.loop_state();
        assert_eq!(state.markers().len(), 3);
        assert_eq!(state.loops().len(), 1);
        let span = state.span(state.loops()[0].id).unwrap();
        assert_eq!((span.start, span.end), (20.0, 30.0));
    }

    #[test]
    fn test_pointer_outside_edit_mode_seeks() {
        let mut rig = rig_with_track(60.0);
        rig.session.pointer_down(5.0);
        assert_eq!(rig.session.pointer_up(7.0), GestureOutcome::Seek(7.0));
        assert_eq!(rig.session.playback_state().current_time, 7.0);
        assert!(rig.session.loop_state().markers().is_empty());
    }

    #[test]
    fn test_undo_redo_edits() {
        let mut rig = rig_with_track(60.0);
        let a = rig.session.add_marker(1.0).unwrap();
        let b = rig.session.add_marker(3.0).unwrap();
        let id = rig.session.create_loop(a, b).unwrap();

        assert_eq!(rig.session.undo().as_deref(), Some("Create Loop"));
        assert!(rig.session.loop_state().loops().is_empty());
        assert_eq!(rig.session.redo().as_deref(), Some("Create Loop"));
        assert_eq!(rig.session.loop_state().loops()[0].id, id);

        rig.session.remove_marker(a);
        assert!(rig.session.loop_state().loops().is_empty());
        rig.session.undo();
        assert_eq!(rig.session.loop_state().loops().len(), 1);
        assert_eq!(rig.session.loop_state().markers().len(), 2);
    }

    #[test]
    fn test_gestures_are_undoable() {
        let mut rig = rig_with_track(60.0);
        rig.session.toggle_edit_mode();
        rig.session.pointer_down(10.0);
        rig.session.pointer_up(12.0);
        assert_eq!(rig.session.loop_state().loops().len(), 1);

        assert_eq!(rig.session.undo().as_deref(), Some("Create Loop"));
        assert!(rig.session.loop_state().markers().is_empty());
        assert!(rig.session.loop_state().loops().is_empty());
    }

    #[test]
    fn test_duplicate_loop_is_soft_skip() {
        let mut rig = rig_with_track(60.0);
        let a = rig.session.add_marker(1.0).unwrap();
        let b = rig.session.add_marker(3.0).unwrap();
        let first = rig.session.create_loop(a, b).unwrap();
        rig.drain_notifications();

        assert_eq!(rig.session.create_loop(b, a), Some(first));
        assert_eq!(rig.session.loop_state().loops().len(), 1);
        assert!(rig.drain_notifications().is_empty());
        // Nothing recorded for the skip
        assert_eq!(rig.session.undo().as_deref(), Some("Create Loop"));
        assert!(rig.session.loop_state().loops().is_empty());
        assert_eq!(rig.session.loop_state().markers().len(), 2);
    }

    #[test]
    fn test_stale_loop_id_is_a_warning() {
        let mut rig = rig_with_track(60.0);
        let a = rig.session.add_marker(1.0).unwrap();
        let b = rig.session.add_marker(3.0).unwrap();
        let id = rig.session.create_loop(a, b).unwrap();
        rig.session.remove_loop(id);
        rig.drain_notifications();

        assert_eq!(rig.session.toggle_loop_by_id(id), None);
        assert!(!rig.session.set_active_loop(Some(id)));
        assert_eq!(rig.drain_notifications().len(), 2);
    }
}
