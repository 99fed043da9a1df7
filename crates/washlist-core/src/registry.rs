//! Expiry-ordered registry of live timers.
//!
//! The registry is the single source of truth for what the presentation
//! renders and for duplicate/range checks. It mirrors the store restricted to
//! non-expired records.

use crate::model::{Level, RegistryEntry, TimerRecord};
use crate::storage::TimersConfig;

#[derive(Debug, Clone)]
pub struct TimerRegistry {
    entries: Vec<RegistryEntry>,
    first_valid_level: Level,
    last_valid_level: Level,
}

impl TimerRegistry {
    pub fn new(first_valid_level: Level, last_valid_level: Level) -> Self {
        Self {
            entries: Vec::new(),
            first_valid_level,
            last_valid_level,
        }
    }

    pub fn from_config(config: &TimersConfig) -> Self {
        Self::new(config.first_valid_level, config.last_valid_level)
    }

    /// Inclusive `(first, last)` valid levels.
    pub fn level_range(&self) -> (Level, Level) {
        (self.first_valid_level, self.last_valid_level)
    }

    pub fn level_in_range(&self, level: Level) -> bool {
        (self.first_valid_level..=self.last_valid_level).contains(&level)
    }

    /// True iff `level` is in range and has no live timer.
    pub fn is_valid_new_level(&self, level: Level) -> bool {
        self.level_in_range(level) && !self.contains(level)
    }

    /// Insert keeping ascending expiry; returns the insertion index.
    ///
    /// The entry lands before the first entry that expires strictly later,
    /// so equal expiries keep insertion order. Callers check for duplicates.
    pub fn insert_sorted(&mut self, entry: RegistryEntry) -> usize {
        debug_assert!(!self.contains(entry.level()), "duplicate level");
        let index = self
            .entries
            .iter()
            .position(|e| e.expires_at_ms() > entry.expires_at_ms())
            .unwrap_or(self.entries.len());
        self.entries.insert(index, entry);
        index
    }

    pub fn remove(&mut self, level: Level) -> Option<RegistryEntry> {
        let index = self.position(level)?;
        Some(self.entries.remove(index))
    }

    /// Set the imminent flag. Returns `true` only on the first call.
    pub fn mark_imminent(&mut self, level: Level) -> bool {
        match self.get_mut(level) {
            Some(entry) if !entry.is_imminent => {
                entry.is_imminent = true;
                true
            }
            _ => false,
        }
    }

    /// Flag the entry as being dragged away. Returns whether it changed.
    pub fn begin_dismiss(&mut self, level: Level) -> bool {
        self.set_dismissing(level, true)
    }

    /// Clear the dragging flag after a release short of the threshold.
    pub fn cancel_dismiss(&mut self, level: Level) -> bool {
        self.set_dismissing(level, false)
    }

    pub fn get(&self, level: Level) -> Option<&RegistryEntry> {
        self.entries.iter().find(|e| e.level() == level)
    }

    pub fn contains(&self, level: Level) -> bool {
        self.get(level).is_some()
    }

    pub fn position(&self, level: Level) -> Option<usize> {
        self.entries.iter().position(|e| e.level() == level)
    }

    /// Live entries, ascending by expiry.
    pub fn entries(&self) -> &[RegistryEntry] {
        &self.entries
    }

    pub fn records(&self) -> Vec<TimerRecord> {
        self.entries.iter().map(|e| e.record).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn get_mut(&mut self, level: Level) -> Option<&mut RegistryEntry> {
        self.entries.iter_mut().find(|e| e.level() == level)
    }

    fn set_dismissing(&mut self, level: Level, dismissing: bool) -> bool {
        match self.get_mut(level) {
            Some(entry) if entry.is_being_dismissed != dismissing => {
                entry.is_being_dismissed = dismissing;
                true
            }
            _ => false,
        }
    }
}

impl Default for TimerRegistry {
    fn default() -> Self {
        Self::from_config(&TimersConfig::default())
    }
}
