//! One-shot expire/imminent callbacks.
//!
//! The scheduler is a wall-clock driven queue with no internal threads. The
//! owner asks for [`EventScheduler::next_deadline`], waits however it likes,
//! and then drains the due callbacks with [`EventScheduler::take_due`].
//!
//! ## Guarantees
//!
//! - A callback whose time is already past is delivered on the next
//!   `take_due`, never dropped.
//! - Delivery removes the callback, so each one fires at most once.
//! - Canceling a delivered callback is a no-op.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::model::Level;

/// Cancel token for a single scheduled callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CallbackId(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallbackKind {
    /// The timer has run out.
    Expire,
    /// The timer entered its imminent window.
    Imminent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledCallback {
    pub id: CallbackId,
    pub level: Level,
    pub kind: CallbackKind,
    pub fire_at_ms: i64,
}

#[derive(Debug, Default)]
pub struct EventScheduler {
    /// Pending callbacks ordered by `(fire_at_ms, id)`.
    queue: BTreeMap<(i64, CallbackId), ScheduledCallback>,
    /// Fire time of every pending id.
    fire_times: HashMap<CallbackId, i64>,
    by_level: HashMap<Level, Vec<CallbackId>>,
    next_id: u64,
}

impl EventScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm a one-shot callback for `level`.
    pub fn schedule(&mut self, level: Level, kind: CallbackKind, fire_at_ms: i64) -> CallbackId {
        let id = CallbackId(self.next_id);
        self.next_id += 1;

        self.queue.insert(
            (fire_at_ms, id),
            ScheduledCallback {
                id,
                level,
                kind,
                fire_at_ms,
            },
        );
        self.fire_times.insert(id, fire_at_ms);
        self.by_level.entry(level).or_default().push(id);

        debug!(level, ?kind, fire_at_ms, "callback armed");
        id
    }

    /// Cancel a single callback. Returns whether it was still pending.
    pub fn cancel(&mut self, id: CallbackId) -> bool {
        let Some(fire_at_ms) = self.fire_times.remove(&id) else {
            return false;
        };
        if let Some(callback) = self.queue.remove(&(fire_at_ms, id)) {
            self.forget_for_level(callback.level, id);
        }
        true
    }

    /// Cancel every pending callback for `level`, returning how many were dropped.
    pub fn cancel_all(&mut self, level: Level) -> usize {
        let Some(ids) = self.by_level.remove(&level) else {
            return 0;
        };
        let mut canceled = 0;
        for id in ids {
            if let Some(fire_at_ms) = self.fire_times.remove(&id) {
                self.queue.remove(&(fire_at_ms, id));
                canceled += 1;
            }
        }
        if canceled > 0 {
            debug!(level, canceled, "callbacks canceled");
        }
        canceled
    }

    /// Remove and return every callback due at `now_ms`, earliest first.
    pub fn take_due(&mut self, now_ms: i64) -> Vec<ScheduledCallback> {
        let mut due = Vec::new();
        while let Some((&(fire_at_ms, _), _)) = self.queue.first_key_value() {
            if fire_at_ms > now_ms {
                break;
            }
            let Some((_, callback)) = self.queue.pop_first() else {
                break;
            };
            self.fire_times.remove(&callback.id);
            self.forget_for_level(callback.level, callback.id);
            due.push(callback);
        }
        due
    }

    /// Earliest pending fire time.
    pub fn next_deadline(&self) -> Option<i64> {
        self.queue.keys().next().map(|&(fire_at_ms, _)| fire_at_ms)
    }

    /// Pending callbacks for `level`, earliest first.
    pub fn pending_for(&self, level: Level) -> Vec<ScheduledCallback> {
        let mut pending: Vec<ScheduledCallback> = self
            .by_level
            .get(&level)
            .into_iter()
            .flatten()
            .filter_map(|id| {
                let fire_at_ms = self.fire_times.get(id)?;
                self.queue.get(&(*fire_at_ms, *id)).copied()
            })
            .collect();
        pending.sort_by_key(|c| (c.fire_at_ms, c.id));
        pending
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    fn forget_for_level(&mut self, level: Level, id: CallbackId) {
        if let Some(ids) = self.by_level.get_mut(&level) {
            ids.retain(|&other| other != id);
            if ids.is_empty() {
                self.by_level.remove(&level);
            }
        }
    }
}
