//! Intervention and optimization queues
//!
//! Two independent append-only collections with snapshot reads, idempotent
//! completion, and debounced duplicate suppression. Both processing paths
//! enqueue concurrently; consumers drain through `mark_processed`.

use std::sync::Mutex;

use chrono::{Duration, Utc};
use tracing::{debug, info};
use uuid::Uuid;

use crate::types::{IntegratedAnalysis, Priority, QueueItem, QueueKind};

/// Default window within which a same-kind, same-priority trigger is
/// treated as a duplicate (milliseconds)
pub const DEFAULT_DEBOUNCE_MS: i64 = 5_000;

#[derive(Default)]
struct QueueState {
    interventions: Vec<QueueItem>,
    optimizations: Vec<QueueItem>,
    processed: Vec<QueueItem>,
}

impl QueueState {
    fn active_mut(&mut self, kind: QueueKind) -> &mut Vec<QueueItem> {
        match kind {
            QueueKind::Intervention => &mut self.interventions,
            QueueKind::Optimization => &mut self.optimizations,
        }
    }

    fn active(&self, kind: QueueKind) -> &Vec<QueueItem> {
        match kind {
            QueueKind::Intervention => &self.interventions,
            QueueKind::Optimization => &self.optimizations,
        }
    }
}

/// Snapshot of both queues for downstream consumers
#[derive(Debug, Clone)]
pub struct QueueSnapshot {
    pub interventions: Vec<QueueItem>,
    pub optimizations: Vec<QueueItem>,
}

/// Current unprocessed depth of both queues
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueDepths {
    pub interventions: usize,
    pub optimizations: usize,
}

/// Append-only queue pair with idempotent completion.
///
/// Items are never silently dropped: an item leaves the active view only
/// through `mark_processed`, after which it is retained in a processed
/// audit log until `clear_processed`.
pub struct QueueManager {
    state: Mutex<QueueState>,
    debounce: Duration,
}

impl Default for QueueManager {
    fn default() -> Self {
        Self::new(DEFAULT_DEBOUNCE_MS)
    }
}

impl QueueManager {
    /// Create a manager with the given duplicate-suppression window.
    pub fn new(debounce_ms: i64) -> Self {
        Self {
            state: Mutex::new(QueueState::default()),
            debounce: Duration::milliseconds(debounce_ms.max(0)),
        }
    }

    /// Append an item triggered by the given analysis.
    ///
    /// Returns the enqueued item, or `None` when an unprocessed item of
    /// the same kind and priority was created within the debounce window
    /// (duplicate suppression keeps item creation idempotent across the
    /// two processing paths).
    pub fn enqueue(
        &self,
        kind: QueueKind,
        priority: Priority,
        trigger: IntegratedAnalysis,
    ) -> Option<QueueItem> {
        let now = Utc::now();
        let mut state = self.state.lock().expect("queue lock poisoned");

        let duplicate = state
            .active(kind)
            .iter()
            .any(|item| item.priority == priority && now - item.created_at < self.debounce);
        if duplicate {
            debug!(kind = ?kind, priority = ?priority, "Duplicate queue item suppressed");
            return None;
        }

        let item = QueueItem {
            id: Uuid::new_v4(),
            kind,
            priority,
            trigger,
            created_at: now,
            processed: false,
        };
        match kind {
            QueueKind::Intervention => {
                info!(id = %item.id, priority = ?priority, "Intervention enqueued")
            }
            QueueKind::Optimization => {
                debug!(id = %item.id, priority = ?priority, "Optimization enqueued")
            }
        }
        state.active_mut(kind).push(item.clone());
        Some(item)
    }

    /// Snapshot copy of the active items of one kind.
    ///
    /// The caller receives clones; mutating the snapshot does not affect
    /// the live queue.
    pub fn peek_all(&self, kind: QueueKind) -> Vec<QueueItem> {
        let state = self.state.lock().expect("queue lock poisoned");
        state.active(kind).clone()
    }

    /// Snapshot copy of both queues.
    pub fn snapshot(&self) -> QueueSnapshot {
        let state = self.state.lock().expect("queue lock poisoned");
        QueueSnapshot {
            interventions: state.interventions.clone(),
            optimizations: state.optimizations.clone(),
        }
    }

    /// Mark an item processed, removing it from the active view.
    ///
    /// Idempotent: returns `true` when the item transitioned, `false` when
    /// the id is unknown or already processed.
    pub fn mark_processed(&self, id: Uuid) -> bool {
        let mut state = self.state.lock().expect("queue lock poisoned");
        for kind in [QueueKind::Intervention, QueueKind::Optimization] {
            let active = state.active_mut(kind);
            if let Some(index) = active.iter().position(|item| item.id == id) {
                let mut item = active.remove(index);
                item.processed = true;
                state.processed.push(item);
                return true;
            }
        }
        false
    }

    /// Drop the processed audit log.
    pub fn clear_processed(&self) {
        let mut state = self.state.lock().expect("queue lock poisoned");
        state.processed.clear();
    }

    /// Number of items in the processed audit log.
    pub fn processed_count(&self) -> usize {
        let state = self.state.lock().expect("queue lock poisoned");
        state.processed.len()
    }

    /// Unprocessed depth of both queues.
    pub fn depths(&self) -> QueueDepths {
        let state = self.state.lock().expect("queue lock poisoned");
        QueueDepths {
            interventions: state.interventions.len(),
            optimizations: state.optimizations.len(),
        }
    }
}
