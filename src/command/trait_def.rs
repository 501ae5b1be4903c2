// UndoableCommand trait definition

use crate::markers::{LoopCreation, LoopError, MarkerId, MarkerLoopEngine, MarkerRemoval};

/// Result type for command operations
pub type CommandResult<T> = Result<T, CommandError>;

/// Errors that can occur during command execution
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CommandError {
    /// The edit itself was refused (cap reached, stale id, ...)
    #[error(transparent)]
    Rejected(#[from] LoopError),

    #[error("Nothing to undo")]
    NothingToUndo,

    #[error("Nothing to redo")]
    NothingToRedo,

    /// Undo/redo called on a command that never ran
    #[error("Invalid state: {0}")]
    InvalidState(String),
}

/// What an executed edit produced
#[derive(Debug, Clone, PartialEq)]
pub enum EditOutcome {
    MarkerAdded(MarkerId),
    MarkerRemoved(MarkerRemoval),
    /// Applied (clamped) time
    MarkerMoved(f64),
    MarkerRenamed,
    LoopCreated(LoopCreation),
    LoopRemoved,
    /// Snapshot re-applied (redo, recorded gestures)
    Restored,
}

impl EditOutcome {
    /// False for soft skips that left the state untouched
    pub fn changed(&self) -> bool {
        !matches!(self, EditOutcome::LoopCreated(LoopCreation::AlreadyExists(_)))
    }
}

/// Trait for structural marker/loop edits that support undo/redo
///
/// Commands run against the loop engine on the session thread. Loop activation
/// is playback control, not an edit, and never goes through a command.
pub trait UndoableCommand: Send {
    /// Execute the command
    ///
    /// Should store the previous state internally for undo capability.
    fn execute(&mut self, engine: &mut MarkerLoopEngine) -> CommandResult<EditOutcome>;

    /// Restore the state to what it was before execute()
    fn undo(&mut self, engine: &mut MarkerLoopEngine) -> CommandResult<()>;

    /// Human-readable description (e.g. "Undo: Add Marker at 12.50s")
    fn description(&self) -> String;
}
