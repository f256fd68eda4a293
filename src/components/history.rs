// ============================================================================
// HISTORY — bounded undo/redo stacks of document snapshots
// ============================================================================
//
// Entries own their buffers outright. Undo/redo move an entry out of one
// stack, swap its buffers with the live document, and move the displaced
// state onto the other stack; no buffer is ever shared between a stack and
// the document.
// ============================================================================

use std::collections::VecDeque;

use crate::buffer::PixelBuffer;
use crate::error::{EditorError, Result};
use crate::ops::tone::ToneState;
use crate::ops::transform::TransformState;

/// Undo depth used when the settings don't say otherwise.
pub const DEFAULT_MAX_UNDO: usize = 40;

/// The document state just before an edit.
#[derive(Clone, Debug)]
pub struct HistoryEntry {
    /// Human-readable name of the edit this entry undoes.
    pub description: String,
    pub pixels: PixelBuffer,
    pub transform: TransformState,
    pub tone: ToneState,
    /// The canonical source, for edits that replaced it (resize, crop).
    pub original: Option<PixelBuffer>,
}

impl HistoryEntry {
    pub fn memory_size(&self) -> usize {
        self.pixels.memory_size() + self.original.as_ref().map_or(0, |o| o.memory_size())
    }
}

pub struct HistoryManager {
    undo_stack: VecDeque<HistoryEntry>,
    redo_stack: VecDeque<HistoryEntry>,
    max_history_size: usize,
    /// Running memory total across both stacks.
    total_memory: usize,
}

impl Default for HistoryManager {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_UNDO)
    }
}

impl HistoryManager {
    pub fn new(max_history_size: usize) -> Self {
        Self {
            undo_stack: VecDeque::new(),
            redo_stack: VecDeque::new(),
            max_history_size: max_history_size.max(1),
            total_memory: 0,
        }
    }

    /// Record a new edit. Invalidates everything on the redo stack.
    pub fn push(&mut self, entry: HistoryEntry) {
        for e in self.redo_stack.drain(..) {
            self.total_memory = self.total_memory.saturating_sub(e.memory_size());
        }
        self.push_undo_keep_redo(entry);
    }

    /// Put an entry back on the undo stack without touching redo (the redo
    /// half of an undo/redo pair).
    pub fn push_undo_keep_redo(&mut self, entry: HistoryEntry) {
        self.total_memory += entry.memory_size();
        self.undo_stack.push_back(entry);
        self.prune();
    }

    pub fn pop_undo(&mut self) -> Result<HistoryEntry> {
        let entry = self.undo_stack.pop_back().ok_or(EditorError::EmptyHistory)?;
        self.total_memory = self.total_memory.saturating_sub(entry.memory_size());
        Ok(entry)
    }

    pub fn push_redo(&mut self, entry: HistoryEntry) {
        self.total_memory += entry.memory_size();
        self.redo_stack.push_back(entry);
    }

    pub fn pop_redo(&mut self) -> Result<HistoryEntry> {
        let entry = self.redo_stack.pop_back().ok_or(EditorError::EmptyHistory)?;
        self.total_memory = self.total_memory.saturating_sub(entry.memory_size());
        Ok(entry)
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo_len(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn redo_len(&self) -> usize {
        self.redo_stack.len()
    }

    pub fn undo_description(&self) -> Option<&str> {
        self.undo_stack.back().map(|e| e.description.as_str())
    }

    pub fn redo_description(&self) -> Option<&str> {
        self.redo_stack.back().map(|e| e.description.as_str())
    }

    /// Get all undo descriptions (most recent first)
    pub fn undo_history(&self) -> Vec<String> {
        self.undo_stack.iter().rev().map(|e| e.description.clone()).collect()
    }

    pub fn redo_history(&self) -> Vec<String> {
        self.redo_stack.iter().rev().map(|e| e.description.clone()).collect()
    }

    /// Bytes held by both stacks.
    pub fn memory_usage(&self) -> usize {
        self.total_memory
    }

    pub fn max_history_size(&self) -> usize {
        self.max_history_size
    }

    /// Drop the oldest entries beyond the depth limit.
    fn prune(&mut self) {
        while self.undo_stack.len() > self.max_history_size {
            if let Some(removed) = self.undo_stack.pop_front() {
                self.total_memory = self.total_memory.saturating_sub(removed.memory_size());
            }
        }
    }

    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
        self.total_memory = 0;
    }
}
