use std::collections::VecDeque;

pub const DEFAULT_CAPACITY: usize = 100;

/// Bounded undo/redo over immutable snapshots. Linear: recording a new
/// state after an undo discards whatever could have been redone.
#[derive(Clone, Debug)]
pub struct History<T> {
    past: VecDeque<T>,
    future: Vec<T>,
    capacity: usize,
}

impl<T> Default for History<T> {
    fn default() -> Self {
        History::with_capacity(DEFAULT_CAPACITY)
    }
}

impl<T> History<T> {
    pub fn with_capacity(capacity: usize) -> Self {
        History { past: VecDeque::new(), future: Vec::new(), capacity: capacity.max(1) }
    }

    /// Remember `previous` as the state to return to on undo.
    pub fn record(&mut self, previous: T) {
        self.future.clear();
        self.past.push_back(previous);
        while self.past.len() > self.capacity {
            self.past.pop_front();
        }
    }

    /// Swap `current` for the last recorded state.
    pub fn undo(&mut self, current: T) -> Option<T> {
        let prev = self.past.pop_back()?;
        self.future.push(current);
        Some(prev)
    }

    pub fn redo(&mut self, current: T) -> Option<T> {
        let next = self.future.pop()?;
        self.past.push_back(current);
        Some(next)
    }

    pub fn can_undo(&self) -> bool {
        !self.past.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.future.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.past.clear();
        self.future.clear();
    }
}
