//! Undo/redo history using the command pattern: every world mutation is an
//! [`Action`] owning the snapshots it needs to reverse itself.
//!
//! Unlike a plain editor history, pushing does not apply. The interactive
//! session pushes an action, mutates its delta fields while it is current,
//! and stages `do_step` once per tick; applying recomputes from the
//! snapshots, so repeated applies converge instead of accumulating.

mod actions;

pub use actions::{
    Action, AlignHeightAction, BulldozeAction, CloneAction, SelectAction, Selection,
    TransformAction,
};

use crate::world::World;

/// Default history depth, matching the configurable undo limit's default.
pub const DEFAULT_UNDO_LIMIT: usize = 100;

pub struct ActionQueue {
    done: Vec<Action>,
    undone: Vec<Action>,
    limit: usize,
}

impl Default for ActionQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl ActionQueue {
    pub fn new() -> Self {
        Self::with_limit(DEFAULT_UNDO_LIMIT)
    }

    pub fn with_limit(limit: usize) -> Self {
        Self {
            done: Vec::new(),
            undone: Vec::new(),
            limit: limit.max(1),
        }
    }

    /// Append `action` as the new current entry. Any redo tail is
    /// discarded; the oldest entry falls off beyond the depth limit. Does
    /// not apply.
    pub fn push(&mut self, action: Action) {
        self.undone.clear();
        self.done.push(action);
        if self.done.len() > self.limit {
            self.done.remove(0);
        }
    }

    /// The top-of-stack action, possibly still being edited.
    pub fn current(&self) -> Option<&Action> {
        self.done.last()
    }

    /// Mutable access to the current action, for in-place delta updates
    /// while a gesture is live. Refused once an undo has happened: entries
    /// reachable by redo are immutable.
    pub fn current_mut(&mut self) -> Option<&mut Action> {
        if self.undone.is_empty() {
            self.done.last_mut()
        } else {
            None
        }
    }

    /// Apply the current action. Errors are caught here: the failure is
    /// logged and the world is left as the action's rollback put it, with
    /// the action still current so the user can retry or cancel.
    pub fn do_step(&mut self, world: &mut dyn World, selection: &mut Selection) {
        if let Some(action) = self.done.last_mut()
            && let Err(err) = action.apply(world, selection)
        {
            log::error!("{} failed to apply: {err}", action.name());
        }
    }

    /// Reverse the most recent action and move it to the redo tail.
    /// Silently does nothing with an empty history; driven by key-repeat
    /// polling, so running past the end is normal.
    pub fn undo(&mut self, world: &mut dyn World, selection: &mut Selection) {
        if let Some(mut action) = self.done.pop() {
            match action.unapply(world, selection) {
                Ok(()) => self.undone.push(action),
                Err(err) => {
                    log::error!("{} failed to undo: {err}", action.name());
                    self.done.push(action);
                }
            }
        }
    }

    /// Re-apply the next undone action. Silent no-op with an empty tail.
    pub fn redo(&mut self, world: &mut dyn World, selection: &mut Selection) {
        if let Some(mut action) = self.undone.pop() {
            match action.apply(world, selection) {
                Ok(()) => self.done.push(action),
                Err(err) => {
                    log::error!("{} failed to redo: {err}", action.name());
                    self.undone.push(action);
                }
            }
        }
    }

    /// Discard the current action without recording it, leaving the queue
    /// as it was before the push. The cancellation path for an operation
    /// that was staged but never committed.
    pub fn invalidate(&mut self) {
        if let Some(action) = self.done.pop() {
            log::debug!("invalidated pending {}", action.name());
        }
    }

    pub fn can_undo(&self) -> bool {
        !self.done.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.undone.is_empty()
    }

    pub fn undo_len(&self) -> usize {
        self.done.len()
    }

    pub fn redo_len(&self) -> usize {
        self.undone.len()
    }

    pub fn clear(&mut self) {
        self.done.clear();
        self.undone.clear();
    }
}
