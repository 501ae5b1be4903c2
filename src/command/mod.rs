// Command Pattern for Undo/Redo of marker and loop edits
//
// Architecture:
// - UndoableCommand trait: execute(), undo(), description()
// - CommandManager: undo/redo stacks with a bounded history
// - Concrete commands: LoopEditCommand (one structural edit),
//   RecordedEditCommand (an already-applied gesture)
//
// Playback control (play, seek, loop activation) is never recorded.

pub mod commands;
pub mod manager;
pub mod trait_def;

pub use commands::{LoopEdit, LoopEditCommand, RecordedEditCommand};
pub use manager::CommandManager;
pub use trait_def::{CommandError, CommandResult, EditOutcome, UndoableCommand};
