use crate::event::{Event, EventBus};
use crate::fixed::Millis;

/// Running session score. Every change is published as `ScoreChanged`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Score {
    total: i64,
}

impl Score {
    pub fn total(&self) -> i64 {
        self.total
    }

    /// Apply a delta and publish it. A zero delta publishes nothing.
    pub fn apply(&mut self, delta: i64, events: &mut EventBus, at: Millis) -> i64 {
        if delta != 0 {
            self.total += delta;
            events.emit(Event::ScoreChanged {
                total: self.total,
                delta,
                at,
            });
        }
        self.total
    }

    pub fn reset(&mut self) {
        self.total = 0;
    }
}
