//! Bounded undo/redo history over whole-document snapshots.
//!
//! `past` is oldest-first and always keeps at least one entry (the session
//! baseline) once the session has started. Every recorded edit pushes the
//! pre-edit snapshot and clears `future`. Undo/redo move snapshots between
//! the two stacks without recording anything new.
//!
//! Keystroke-level edits that share a coalescing key and arrive within the
//! coalescing window collapse into the entry recorded by the first of them.
//! Structural actions carry no key and always get their own entry.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;

use crate::editor::store::{ChangeOrigin, ChangeSubscriber, SnapshotChange};
use crate::models::Document;

pub const DEFAULT_HISTORY_LIMIT: usize = 100;
pub const DEFAULT_COALESCE_WINDOW: Duration = Duration::from_millis(500);

#[derive(Debug, Clone)]
pub struct HistoryEntry {
    pub snapshot: Arc<Document>,
    pub recorded_at: Instant,
}

/// Read-only view for the keyboard-shortcut / toolbar surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HistoryStatus {
    pub can_undo: bool,
    pub can_redo: bool,
    pub past: usize,
    pub future: usize,
}

#[derive(Debug)]
pub struct HistoryManager {
    past: VecDeque<HistoryEntry>,
    future: Vec<HistoryEntry>,
    /// Maximum entries kept in `past`. `future` only ever grows by draining
    /// `past`, so this also bounds both stacks together.
    limit: usize,
    coalesce_window: Duration,
    /// Coalescing key of the edit that produced the newest `past` entry.
    last_key: Option<String>,
}

impl HistoryManager {
    pub fn new(limit: usize, coalesce_window: Duration) -> Self {
        Self {
            past: VecDeque::new(),
            future: Vec::new(),
            limit: limit.max(1),
            coalesce_window,
            last_key: None,
        }
    }

    /// Starts a new session with `baseline` as the only `past` entry.
    pub fn reset(&mut self, baseline: Arc<Document>) {
        self.clear();
        self.past.push_back(HistoryEntry {
            snapshot: baseline,
            recorded_at: Instant::now(),
        });
    }

    pub fn clear(&mut self) {
        self.past.clear();
        self.future.clear();
        self.last_key = None;
    }

    /// Records an edit as of `now`. Undo/redo changes are ignored.
    pub fn record_at(&mut self, change: &SnapshotChange, now: Instant) {
        let ChangeOrigin::Edit { coalesce } = &change.origin else {
            return;
        };

        self.future.clear();

        if coalesce.is_some() && *coalesce == self.last_key {
            if let Some(top) = self.past.back_mut() {
                if now.saturating_duration_since(top.recorded_at) <= self.coalesce_window {
                    // Sliding window: the burst stays open while edits keep coming.
                    top.recorded_at = now;
                    return;
                }
            }
        }

        self.past.push_back(HistoryEntry {
            snapshot: Arc::clone(&change.previous),
            recorded_at: now,
        });
        self.last_key = coalesce.clone();
        self.evict();
    }

    /// Returns the snapshot to install, or `None` when only the baseline is
    /// left.
    pub fn undo(&mut self, current: &Arc<Document>) -> Option<Arc<Document>> {
        if !self.can_undo() {
            return None;
        }
        let entry = self.past.pop_back()?;
        self.future.push(HistoryEntry {
            snapshot: Arc::clone(current),
            recorded_at: Instant::now(),
        });
        self.last_key = None;
        Some(entry.snapshot)
    }

    pub fn redo(&mut self, current: &Arc<Document>) -> Option<Arc<Document>> {
        let entry = self.future.pop()?;
        self.past.push_back(HistoryEntry {
            snapshot: Arc::clone(current),
            recorded_at: Instant::now(),
        });
        self.last_key = None;
        self.evict();
        Some(entry.snapshot)
    }

    pub fn can_undo(&self) -> bool {
        self.past.len() > 1
    }

    pub fn can_redo(&self) -> bool {
        !self.future.is_empty()
    }

    pub fn status(&self) -> HistoryStatus {
        HistoryStatus {
            can_undo: self.can_undo(),
            can_redo: self.can_redo(),
            past: self.past.len(),
            future: self.future.len(),
        }
    }

    fn evict(&mut self) {
        while self.past.len() > self.limit {
            self.past.pop_front();
        }
    }
}

impl Default for HistoryManager {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_LIMIT, DEFAULT_COALESCE_WINDOW)
    }
}

impl ChangeSubscriber for HistoryManager {
    fn on_change(&mut self, change: &SnapshotChange) {
        self.record_at(change, Instant::now());
    }
}
