use serde::{Deserialize, Serialize};

use crate::model::Level;

/// Every registry mutation produces an Event.
/// The presentation renders from them; notifications are routed separately.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Event {
    /// A timer row appeared at `index` in the expiry-ordered list.
    Inserted { level: Level, index: usize },
    Removed { level: Level, reason: RemovalReason },
    MarkedImminent { level: Level },
    /// Drag gesture started on the row.
    DismissStarted { level: Level },
    /// Drag released short of the dismissal threshold.
    DismissCanceled { level: Level },
    /// The timer entered its imminent window. `minutes_remaining` is the
    /// time left when the callback ran, rounded up to whole minutes.
    Notification { level: Level, minutes_remaining: u32 },
}

/// How a timer left the registry.
///
/// Both end the timer the same way; the presentation animates them
/// differently (scale-down for expiry, swipe-out for dismissal).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RemovalReason {
    Expired,
    Dismissed,
}

impl Event {
    pub fn level(&self) -> Level {
        match *self {
            Event::Inserted { level, .. }
            | Event::Removed { level, .. }
            | Event::MarkedImminent { level }
            | Event::DismissStarted { level }
            | Event::DismissCanceled { level }
            | Event::Notification { level, .. } => level,
        }
    }

    pub fn is_notification(&self) -> bool {
        matches!(self, Event::Notification { .. })
    }
}

/// Receives presentation events after each successful mutation.
pub trait Presenter {
    fn present(&mut self, event: &Event);
}

impl<F: FnMut(&Event)> Presenter for F {
    fn present(&mut self, event: &Event) {
        self(event)
    }
}

/// Delivers imminent-timer notifications.
pub trait Notifier {
    fn notify(&mut self, level: Level, minutes_remaining: u32);
}

impl<F: FnMut(Level, u32)> Notifier for F {
    fn notify(&mut self, level: Level, minutes_remaining: u32) {
        self(level, minutes_remaining)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_serialize_with_snake_case_tag() {
        let json = serde_json::to_value(Event::Inserted { level: 5, index: 2 }).unwrap();
        assert_eq!(json, serde_json::json!({"event": "inserted", "level": 5, "index": 2}));

        let json = serde_json::to_value(Event::Removed {
            level: 7,
            reason: RemovalReason::Dismissed,
        })
        .unwrap();
        assert_eq!(
            json,
            serde_json::json!({"event": "removed", "level": 7, "reason": "dismissed"})
        );

        let json = serde_json::to_value(Event::MarkedImminent { level: 3 }).unwrap();
        assert_eq!(json["event"], "marked_imminent");
    }

    #[test]
    fn closures_act_as_presenters() {
        let mut seen = Vec::new();
        {
            let mut presenter = |event: &Event| seen.push(event.level());
            presenter.present(&Event::MarkedImminent { level: 4 });
            presenter.present(&Event::Notification {
                level: 6,
                minutes_remaining: 2,
            });
        }
        assert_eq!(seen, vec![4, 6]);
    }
}
