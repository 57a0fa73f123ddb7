//! Player actions queued from the input layer and applied at a step
//! boundary, after transport and overlays have run for that step.

use crate::fixed::Millis;
use crate::id::{ItemId, ReceptacleId};

/// A single player action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Drop `item` into `receptacle`.
    Sort {
        item: ItemId,
        receptacle: ReceptacleId,
    },
    /// Abandon the active order.
    FailOrder { reason: String },
}

/// Commands waiting for the next step, with optional history for replay
/// and debugging.
#[derive(Debug, Default)]
pub struct CommandQueue {
    pending: Vec<Command>,
    /// Applied commands with the simulation time they ran at.
    history: Vec<(Millis, Command)>,
    /// Maximum history entries to retain. 0 = no history.
    max_history: usize,
}

impl CommandQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_history(max_history: usize) -> Self {
        Self {
            max_history,
            ..Self::default()
        }
    }

    pub fn push(&mut self, command: Command) {
        self.pending.push(command);
    }

    /// Drain all pending commands in submission order, recording them at `now`.
    pub fn drain(&mut self, now: Millis) -> Vec<Command> {
        let commands: Vec<Command> = self.pending.drain(..).collect();

        if self.max_history > 0 {
            self.history
                .extend(commands.iter().map(|cmd| (now, cmd.clone())));
            let excess = self.history.len().saturating_sub(self.max_history);
            if excess > 0 {
                self.history.drain(..excess);
            }
        }

        commands
    }

    /// Drop pending commands without applying them.
    pub fn discard_pending(&mut self) -> usize {
        let dropped = self.pending.len();
        self.pending.clear();
        dropped
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn history(&self) -> &[(Millis, Command)] {
        &self.history
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sort(receptacle: u32) -> Command {
        Command::Sort {
            item: ItemId::default(),
            receptacle: ReceptacleId(receptacle),
        }
    }

    #[test]
    fn drain_preserves_submission_order() {
        let mut q = CommandQueue::new();
        q.push(sort(2));
        q.push(sort(0));
        assert_eq!(q.pending_count(), 2);
        assert_eq!(q.drain(33), vec![sort(2), sort(0)]);
        assert!(q.is_empty());
    }

    #[test]
    fn no_history_by_default() {
        let mut q = CommandQueue::new();
        q.push(sort(1));
        q.drain(0);
        assert!(q.history().is_empty());
    }

    #[test]
    fn history_is_trimmed_to_limit() {
        let mut q = CommandQueue::with_max_history(2);
        for i in 0..3 {
            q.push(sort(i));
            q.drain(i as Millis * 100);
        }
        assert_eq!(q.history(), &[(100, sort(1)), (200, sort(2))]);
        q.clear_history();
        assert!(q.history().is_empty());
    }

    #[test]
    fn discard_pending_drops_without_history() {
        let mut q = CommandQueue::with_max_history(8);
        q.push(Command::FailOrder {
            reason: "abandoned".to_string(),
        });
        assert_eq!(q.discard_pending(), 1);
        assert!(q.is_empty());
        assert!(q.history().is_empty());
    }
}
