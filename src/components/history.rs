use egui::{Key, Modifiers};
use std::collections::VecDeque;

/// Size accounting for history entries.
pub trait Snapshot {
    fn memory_size(&self) -> usize;
}

/// Default cap on bytes held across both stacks.
pub const DEFAULT_MEMORY_LIMIT: usize = 256 * 1024 * 1024;

/// Linear undo/redo over full-frame snapshots.
///
/// The bottom of the undo stack is the origin: it is never undone past, so
/// `current()` is always defined once anything has been committed. Redo is a
/// single branch and any fresh commit drops it.
///
/// Past the memory limit the oldest entries after the origin are dropped, so
/// undo may jump further back but always lands on the origin eventually.
#[derive(Clone, Debug)]
pub struct HistoryStore<T> {
    undo_stack: VecDeque<T>,
    /// Front is the next entry to redo.
    redo_stack: VecDeque<T>,
    max_memory_bytes: Option<usize>,
    total_memory: usize,
}

impl<T> Default for HistoryStore<T> {
    fn default() -> Self {
        Self {
            undo_stack: VecDeque::new(),
            redo_stack: VecDeque::new(),
            max_memory_bytes: Some(DEFAULT_MEMORY_LIMIT),
            total_memory: 0,
        }
    }
}

impl<T: Snapshot> HistoryStore<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// History that starts at `origin`.
    pub fn with_origin(origin: T) -> Self {
        let mut history = Self::new();
        history.commit(origin);
        history
    }

    /// `None` keeps every entry.
    pub fn with_memory_limit(mut self, max_bytes: Option<usize>) -> Self {
        self.max_memory_bytes = max_bytes;
        self.prune();
        self
    }

    pub fn commit(&mut self, snapshot: T) {
        for entry in self.redo_stack.drain(..) {
            self.total_memory = self.total_memory.saturating_sub(entry.memory_size());
        }
        self.total_memory += snapshot.memory_size();
        self.undo_stack.push_back(snapshot);
        self.prune();
    }

    /// Drop the oldest entries after the origin until under the limit. The
    /// origin and the current entry always stay.
    fn prune(&mut self) {
        let Some(max_bytes) = self.max_memory_bytes else { return };
        while self.total_memory > max_bytes && self.undo_stack.len() > 2 {
            if let Some(removed) = self.undo_stack.remove(1) {
                self.total_memory = self.total_memory.saturating_sub(removed.memory_size());
            }
        }
    }

    /// Step back one entry. Returns the new current entry, or `None` if already at the origin.
    pub fn undo(&mut self) -> Option<&T> {
        if self.undo_stack.len() <= 1 {
            return None;
        }
        let top = self.undo_stack.pop_back()?;
        self.redo_stack.push_front(top);
        self.undo_stack.back()
    }

    pub fn redo(&mut self) -> Option<&T> {
        let next = self.redo_stack.pop_front()?;
        self.undo_stack.push_back(next);
        self.undo_stack.back()
    }

    pub fn current(&self) -> Option<&T> {
        self.undo_stack.back()
    }

    pub fn origin(&self) -> Option<&T> {
        self.undo_stack.front()
    }

    pub fn can_undo(&self) -> bool {
        self.undo_stack.len() > 1
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

    pub fn is_empty(&self) -> bool {
        self.undo_stack.is_empty()
    }

    /// Bytes held across both stacks.
    pub fn memory_usage(&self) -> usize {
        self.total_memory
    }

    /// Drop everything and start over from `origin`.
    pub fn reset_with(&mut self, origin: T) {
        self.clear();
        self.commit(origin);
    }

    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
        self.total_memory = 0;
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HistoryAction {
    Undo,
    Redo,
}

/// Map a key press to a history action: command+Z undoes, command+shift+Z or
/// command+Y redoes. `command` is Ctrl, or Cmd on macOS.
pub fn shortcut(key: Key, modifiers: Modifiers) -> Option<HistoryAction> {
    if !modifiers.command || modifiers.alt {
        return None;
    }
    match key {
        Key::Z if modifiers.shift => Some(HistoryAction::Redo),
        Key::Z => Some(HistoryAction::Undo),
        Key::Y => Some(HistoryAction::Redo),
        _ => None,
    }
}

/// Consume the first history shortcut pressed this frame so no widget also sees it.
pub fn take_shortcut(ctx: &egui::Context) -> Option<HistoryAction> {
    ctx.input_mut(|i| {
        let mut found = None;
        i.events.retain(|event| {
            if found.is_some() {
                return true;
            }
            if let egui::Event::Key {
                key,
                pressed: true,
                modifiers,
                ..
            } = event
                && let Some(action) = shortcut(*key, *modifiers)
            {
                found = Some(action);
                return false;
            }
            true
        });
        found
    })
}
