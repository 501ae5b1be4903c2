// CommandManager - bounded undo/redo history of marker and loop edits

use crate::command::trait_def::{CommandError, CommandResult, EditOutcome, UndoableCommand};
use crate::markers::MarkerLoopEngine;
use std::collections::VecDeque;

const DEFAULT_UNDO_DEPTH: usize = 100;

/// One direction of the history, newest edit at the back
struct EditStack {
    edits: VecDeque<Box<dyn UndoableCommand>>,
    depth: usize,
}

impl EditStack {
    fn new(depth: usize) -> Self {
        Self {
            edits: VecDeque::with_capacity(depth.min(DEFAULT_UNDO_DEPTH)),
            depth,
        }
    }

    /// Push, forgetting the oldest edit once the depth is exceeded
    fn push(&mut self, command: Box<dyn UndoableCommand>) {
        self.edits.push_back(command);
        while self.edits.len() > self.depth {
            self.edits.pop_front();
        }
    }

    fn pop(&mut self) -> Option<Box<dyn UndoableCommand>> {
        self.edits.pop_back()
    }

    fn peek_description(&self) -> Option<String> {
        self.edits.back().map(|c| c.description())
    }
}

/// Edit history of one session
///
/// Only edits that changed the loop state are recorded. A new edit after an
/// undo discards the redo side. A command whose undo or redo fails goes back
/// where it came from, so the history never loses its place.
pub struct CommandManager {
    undo: EditStack,
    redo: EditStack,
}

impl CommandManager {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_UNDO_DEPTH)
    }

    /// History keeping at most `depth` undoable edits
    pub fn with_capacity(depth: usize) -> Self {
        Self {
            undo: EditStack::new(depth),
            redo: EditStack::new(depth),
        }
    }

    /// Apply an edit and record it
    ///
    /// # Errors
    /// The edit's own rejection; the history is untouched then.
    pub fn execute(
        &mut self,
        mut command: Box<dyn UndoableCommand>,
        engine: &mut MarkerLoopEngine,
    ) -> CommandResult<EditOutcome> {
        let outcome = command.execute(engine)?;
        if outcome.changed() {
            log::debug!("Recorded edit: {}", command.description());
            self.undo.push(command);
            self.redo.edits.clear();
        }
        Ok(outcome)
    }

    /// Revert the newest edit, returning its description
    pub fn undo(&mut self, engine: &mut MarkerLoopEngine) -> CommandResult<String> {
        let mut command = self.undo.pop().ok_or(CommandError::NothingToUndo)?;
        let description = command.description();
        if let Err(e) = command.undo(engine) {
            self.undo.push(command);
            return Err(e);
        }
        self.redo.push(command);
        Ok(description)
    }

    /// Re-apply the newest undone edit, returning its description
    pub fn redo(&mut self, engine: &mut MarkerLoopEngine) -> CommandResult<String> {
        let mut command = self.redo.pop().ok_or(CommandError::NothingToRedo)?;
        let description = command.description();
        if let Err(e) = command.execute(engine) {
            self.redo.push(command);
            return Err(e);
        }
        self.undo.push(command);
        Ok(description)
    }

    pub fn can_undo(&self) -> bool {
        !self.undo.edits.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.edits.is_empty()
    }

    pub fn undo_description(&self) -> Option<String> {
        self.undo.peek_description()
    }

    pub fn redo_description(&self) -> Option<String> {
        self.redo.peek_description()
    }

    /// Forget everything (another project was opened)
    pub fn clear(&mut self) {
        self.undo.edits.clear();
        self.redo.edits.clear();
    }

    pub fn undo_count(&self) -> usize {
        self.undo.edits.len()
    }

    pub fn redo_count(&self) -> usize {
        self.redo.edits.len()
    }
}

impl Default for CommandManager {
    fn default() -> Self {
        Self::new()
    }
}
