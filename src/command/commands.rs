// Concrete command implementations
//
// Edits are undone by restoring a snapshot of the markers and loops taken
// before execution. Redo restores the snapshot taken after, so ids created by
// the first execution stay valid.

use crate::command::trait_def::{CommandError, CommandResult, EditOutcome, UndoableCommand};
use crate::markers::{LoopId, LoopState, MarkerId, MarkerLoopEngine};

/// A structural marker/loop edit
#[derive(Debug, Clone, PartialEq)]
pub enum LoopEdit {
    AddMarker { time: f64, duration: f64 },
    RemoveMarker { id: MarkerId },
    MoveMarker { id: MarkerId, time: f64, duration: f64 },
    RenameMarker { id: MarkerId, label: Option<String> },
    CreateLoop { a: MarkerId, b: MarkerId },
    RemoveLoop { id: LoopId },
}

impl LoopEdit {
    fn apply(&self, engine: &mut MarkerLoopEngine) -> CommandResult<EditOutcome> {
        let outcome = match self {
            LoopEdit::AddMarker { time, duration } => {
                EditOutcome::MarkerAdded(engine.add_marker(*time, *duration)?)
            }
            LoopEdit::RemoveMarker { id } => EditOutcome::MarkerRemoved(engine.remove_marker(*id)?),
            LoopEdit::MoveMarker { id, time, duration } => {
                EditOutcome::MarkerMoved(engine.update_marker_time(*id, *time, *duration)?)
            }
            LoopEdit::RenameMarker { id, label } => {
                engine.rename_marker(*id, label.clone())?;
                EditOutcome::MarkerRenamed
            }
            LoopEdit::CreateLoop { a, b } => EditOutcome::LoopCreated(engine.create_loop(*a, *b)?),
            LoopEdit::RemoveLoop { id } => {
                engine.remove_loop(*id)?;
                EditOutcome::LoopRemoved
            }
        };
        Ok(outcome)
    }
}

/// Command wrapping one `LoopEdit`
pub struct LoopEditCommand {
    edit: LoopEdit,
    before: Option<LoopState>,
    after: Option<LoopState>,
}

impl LoopEditCommand {
    pub fn new(edit: LoopEdit) -> Self {
        Self {
            edit,
            before: None,
            after: None,
        }
    }
}

impl UndoableCommand for LoopEditCommand {
    fn execute(&mut self, engine: &mut MarkerLoopEngine) -> CommandResult<EditOutcome> {
        // Redo: replay the recorded result
        if let Some(after) = &self.after {
            engine.restore_structure(after);
            return Ok(EditOutcome::Restored);
        }

        let before = engine.state().clone();
        let outcome = self.edit.apply(engine)?;
        self.before = Some(before);
        self.after = Some(engine.state().clone());
        Ok(outcome)
    }

    fn undo(&mut self, engine: &mut MarkerLoopEngine) -> CommandResult<()> {
        let before = self
            .before
            .as_ref()
            .ok_or_else(|| CommandError::InvalidState("edit was never executed".into()))?;
        engine.restore_structure(before);
        Ok(())
    }

    fn description(&self) -> String {
        match &self.edit {
            LoopEdit::AddMarker { time, .. } => format!("Add Marker at {:.2}s", time),
            LoopEdit::RemoveMarker { .. } => "Remove Marker".to_string(),
            LoopEdit::MoveMarker { time, .. } => format!("Move Marker to {:.2}s", time),
            LoopEdit::RenameMarker { label, .. } => match label {
                Some(label) => format!("Rename Marker to \"{}\"", label),
                None => "Clear Marker Label".to_string(),
            },
            LoopEdit::CreateLoop { .. } => "Create Loop".to_string(),
            LoopEdit::RemoveLoop { .. } => "Remove Loop".to_string(),
        }
    }
}

/// An edit that already happened (pointer gesture), recorded as two snapshots
pub struct RecordedEditCommand {
    description: String,
    before: LoopState,
    after: LoopState,
}

impl RecordedEditCommand {
    pub fn new(description: impl Into<String>, before: LoopState, after: LoopState) -> Self {
        Self {
            description: description.into(),
            before,
            after,
        }
    }
}

impl UndoableCommand for RecordedEditCommand {
    fn execute(&mut self, engine: &mut MarkerLoopEngine) -> CommandResult<EditOutcome> {
        engine.restore_structure(&self.after);
        Ok(EditOutcome::Restored)
    }

    fn undo(&mut self, engine: &mut MarkerLoopEngine) -> CommandResult<()> {
        engine.restore_structure(&self.before);
        Ok(())
    }

    fn description(&self) -> String {
        self.description.clone()
    }
}
