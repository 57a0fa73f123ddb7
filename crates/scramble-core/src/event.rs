//! Typed domain events with buffered, chronological delivery.
//!
//! Components emit events while a step runs; the session delivers them in
//! one batch at the end of the step (or at the end of a direct call such as
//! [`crate::session::Session::resolve_sort`]). Delivery preserves emission
//! order across all kinds, so presentation sees e.g. a sort before the score
//! change it caused.
//!
//! # Subscribers
//!
//! Passive listeners are read-only and run in `(priority, registration)`
//! order. The session additionally routes every event through the difficulty
//! controller before any listener sees it.
//!
//! # Suppression
//!
//! Event kinds can be suppressed via [`EventBus::suppress`]. Suppression
//! only mutes the outside: a suppressed event still reaches the delivery
//! observer, but it is never counted, recorded or handed to a listener.

use std::collections::VecDeque;

use crate::fixed::Millis;
use crate::id::{ItemId, OrderId, OverlayId, ReceptacleId, RequesterId};
use crate::item::ItemKind;
use crate::query::OrderSnapshot;
use crate::sort::SortVerdict;

// ---------------------------------------------------------------------------
// Event types
// ---------------------------------------------------------------------------

/// Styling hint for player-facing messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Severity {
    Info,
    Success,
    Error,
}

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EndReason {
    TimeExpired,
    Stopped,
}

/// A domain event. All events carry the simulation time they occurred at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    // -- Items --
    ItemSpawned {
        item: ItemId,
        kind: ItemKind,
        at: Millis,
    },
    ItemSorted {
        item: ItemId,
        kind: ItemKind,
        receptacle: ReceptacleId,
        verdict: SortVerdict,
        delta: i64,
        at: Millis,
    },
    ItemMissed {
        item: ItemId,
        kind: ItemKind,
        at: Millis,
    },
    ItemExploded {
        item: ItemId,
        kind: ItemKind,
        at: Millis,
    },

    // -- Orders --
    OrderGenerated {
        order: OrderSnapshot,
        at: Millis,
    },
    OrderProgressed {
        order: OrderSnapshot,
        at: Millis,
    },
    OrderCompleted {
        order: OrderId,
        requester: RequesterId,
        reward: i64,
        at: Millis,
    },
    OrderFailed {
        order: OrderId,
        requester: RequesterId,
        reason: String,
        at: Millis,
    },

    // -- Session --
    ScoreChanged {
        total: i64,
        delta: i64,
        at: Millis,
    },
    TimeChanged {
        seconds_left: u64,
        at: Millis,
    },
    Feedback {
        text: String,
        severity: Severity,
        duration: Millis,
        at: Millis,
    },
    OverlayStarted {
        overlay: OverlayId,
        name: String,
        duration: Millis,
        at: Millis,
    },
    OverlayEnded {
        overlay: OverlayId,
        at: Millis,
    },
    DifficultyChanged {
        from: u32,
        to: u32,
        at: Millis,
    },
    SessionEnded {
        final_score: i64,
        reason: EndReason,
        at: Millis,
    },
}

/// Discriminant tag for event types, used for suppression and filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    ItemSpawned,
    ItemSorted,
    ItemMissed,
    ItemExploded,
    OrderGenerated,
    OrderProgressed,
    OrderCompleted,
    OrderFailed,
    ScoreChanged,
    TimeChanged,
    Feedback,
    OverlayStarted,
    OverlayEnded,
    DifficultyChanged,
    SessionEnded,
}

/// Total number of event kinds.
const EVENT_KIND_COUNT: usize = 15;

impl Event {
    /// Get the discriminant kind for this event.
    pub fn kind(&self) -> EventKind {
        match self {
            Event::ItemSpawned { .. } => EventKind::ItemSpawned,
            Event::ItemSorted { .. } => EventKind::ItemSorted,
            Event::ItemMissed { .. } => EventKind::ItemMissed,
            Event::ItemExploded { .. } => EventKind::ItemExploded,
            Event::OrderGenerated { .. } => EventKind::OrderGenerated,
            Event::OrderProgressed { .. } => EventKind::OrderProgressed,
            Event::OrderCompleted { .. } => EventKind::OrderCompleted,
            Event::OrderFailed { .. } => EventKind::OrderFailed,
            Event::ScoreChanged { .. } => EventKind::ScoreChanged,
            Event::TimeChanged { .. } => EventKind::TimeChanged,
            Event::Feedback { .. } => EventKind::Feedback,
            Event::OverlayStarted { .. } => EventKind::OverlayStarted,
            Event::OverlayEnded { .. } => EventKind::OverlayEnded,
            Event::DifficultyChanged { .. } => EventKind::DifficultyChanged,
            Event::SessionEnded { .. } => EventKind::SessionEnded,
        }
    }

    /// Simulation time the event occurred at.
    pub fn at(&self) -> Millis {
        match self {
            Event::ItemSpawned { at, .. }
            | Event::ItemSorted { at, .. }
            | Event::ItemMissed { at, .. }
            | Event::ItemExploded { at, .. }
            | Event::OrderGenerated { at, .. }
            | Event::OrderProgressed { at, .. }
            | Event::OrderCompleted { at, .. }
            | Event::OrderFailed { at, .. }
            | Event::ScoreChanged { at, .. }
            | Event::TimeChanged { at, .. }
            | Event::Feedback { at, .. }
            | Event::OverlayStarted { at, .. }
            | Event::OverlayEnded { at, .. }
            | Event::DifficultyChanged { at, .. }
            | Event::SessionEnded { at, .. } => *at,
        }
    }
}

impl EventKind {
    fn index(self) -> usize {
        self as usize
    }
}

// ---------------------------------------------------------------------------
// Subscribers
// ---------------------------------------------------------------------------

/// A passive listener receives events read-only.
pub type PassiveListener = Box<dyn FnMut(&Event)>;

/// Priority level for event subscribers. Lower priorities run first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SubscriberPriority {
    Pre = 0,
    Normal = 1,
    Post = 2,
}

/// Optional predicate that filters events for a subscriber.
pub type EventFilter = Box<dyn Fn(&Event) -> bool>;

struct SubscriberEntry {
    listener: PassiveListener,
    priority: SubscriberPriority,
    filter: Option<EventFilter>,
    insertion_order: u64,
}

impl std::fmt::Debug for SubscriberEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriberEntry")
            .field("priority", &self.priority)
            .field("filtered", &self.filter.is_some())
            .field("insertion_order", &self.insertion_order)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// The session's event bus: a chronological pending queue, a bounded
/// history of delivered events, per-kind counters and subscriber lists.
pub struct EventBus {
    pending: VecDeque<Event>,
    history: VecDeque<Event>,
    history_capacity: usize,
    suppressed: [bool; EVENT_KIND_COUNT],
    emitted: [u64; EVENT_KIND_COUNT],
    subscribers: [Vec<SubscriberEntry>; EVENT_KIND_COUNT],
    next_insertion_order: u64,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("pending", &self.pending.len())
            .field("history", &self.history.len())
            .field("suppressed", &self.suppressed)
            .field("emitted", &self.emitted)
            .finish_non_exhaustive()
    }
}

impl EventBus {
    /// Create a bus that keeps the last `history_capacity` delivered events.
    pub fn new(history_capacity: usize) -> Self {
        Self {
            pending: VecDeque::new(),
            history: VecDeque::new(),
            history_capacity: history_capacity.max(1),
            suppressed: [false; EVENT_KIND_COUNT],
            emitted: [0; EVENT_KIND_COUNT],
            subscribers: std::array::from_fn(|_| Vec::new()),
            next_insertion_order: 0,
        }
    }

    pub fn suppress(&mut self, kind: EventKind) {
        self.suppressed[kind.index()] = true;
    }

    pub fn is_suppressed(&self, kind: EventKind) -> bool {
        self.suppressed[kind.index()]
    }

    /// Queue an event for the next delivery. Suppressed kinds are queued
    /// for the observer but not counted.
    pub fn emit(&mut self, event: Event) {
        let idx = event.kind().index();
        if !self.suppressed[idx] {
            self.emitted[idx] += 1;
        }
        self.pending.push_back(event);
    }

    /// Queue a player-facing message.
    pub fn feedback(
        &mut self,
        text: impl Into<String>,
        severity: Severity,
        duration: Millis,
        at: Millis,
    ) {
        self.emit(Event::Feedback {
            text: text.into(),
            severity,
            duration,
            at,
        });
    }

    /// Register a passive listener with Normal priority and no filter.
    pub fn on_passive(&mut self, kind: EventKind, listener: PassiveListener) {
        self.on_passive_filtered(kind, SubscriberPriority::Normal, None, listener);
    }

    /// Register a passive listener with explicit priority and optional filter.
    pub fn on_passive_filtered(
        &mut self,
        kind: EventKind,
        priority: SubscriberPriority,
        filter: Option<EventFilter>,
        listener: PassiveListener,
    ) {
        let order = self.next_insertion_order;
        self.next_insertion_order += 1;
        let list = &mut self.subscribers[kind.index()];
        list.push(SubscriberEntry {
            listener,
            priority,
            filter,
            insertion_order: order,
        });
        list.sort_by_key(|entry| (entry.priority, entry.insertion_order));
    }

    /// Deliver every pending event to its subscribers, oldest first.
    pub fn deliver(&mut self) {
        self.deliver_with(|_| None);
    }

    /// Deliver pending events, first handing each one to `observer`.
    ///
    /// The observer sees suppressed events too. An event it returns is
    /// queued behind the current batch and delivered in the same call.
    pub fn deliver_with<F>(&mut self, mut observer: F)
    where
        F: FnMut(&Event) -> Option<Event>,
    {
        while let Some(event) = self.pending.pop_front() {
            if let Some(follow_up) = observer(&event) {
                self.emit(follow_up);
            }
            if self.suppressed[event.kind().index()] {
                continue;
            }
            for entry in &mut self.subscribers[event.kind().index()] {
                if let Some(ref filter) = entry.filter
                    && !filter(&event)
                {
                    continue;
                }
                (entry.listener)(&event);
            }
            if self.history.len() == self.history_capacity {
                self.history.pop_front();
            }
            self.history.push_back(event);
        }
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Delivered events, oldest first, bounded by the history capacity.
    pub fn history(&self) -> &VecDeque<Event> {
        &self.history
    }

    /// Total events emitted for a kind since creation.
    pub fn total_emitted(&self, kind: EventKind) -> u64 {
        self.emitted[kind.index()]
    }

    /// Drop pending events and history. Subscribers, suppression settings
    /// and lifetime counters are kept.
    pub fn clear_all(&mut self) {
        self.pending.clear();
        self.history.clear();
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn score(total: i64, at: Millis) -> Event {
        Event::ScoreChanged {
            total,
            delta: 0,
            at,
        }
    }

    fn time(seconds_left: u64) -> Event {
        Event::TimeChanged {
            seconds_left,
            at: 0,
        }
    }

    #[test]
    fn history_keeps_newest_events() {
        let mut bus = EventBus::new(3);
        for i in 0..5 {
            bus.emit(score(i, i as Millis));
        }
        bus.deliver();
        let totals: Vec<i64> = bus
            .history()
            .iter()
            .map(|e| match e {
                Event::ScoreChanged { total, .. } => *total,
                other => panic!("unexpected {other:?}"),
            })
            .collect();
        assert_eq!(totals, vec![2, 3, 4]);
        assert_eq!(bus.total_emitted(EventKind::ScoreChanged), 5);
    }

    #[test]
    fn zero_history_capacity_keeps_one() {
        let mut bus = EventBus::new(0);
        bus.emit(time(3));
        bus.emit(time(2));
        bus.deliver();
        assert_eq!(bus.history().len(), 1);
    }

    #[test]
    fn emit_counts_per_kind() {
        let mut bus = EventBus::new(16);
        bus.emit(score(1, 0));
        bus.emit(score(2, 0));
        bus.emit(time(5));
        assert_eq!(bus.pending_count(), 3);
        assert_eq!(bus.total_emitted(EventKind::ScoreChanged), 2);
        assert_eq!(bus.total_emitted(EventKind::TimeChanged), 1);
        assert_eq!(bus.total_emitted(EventKind::Feedback), 0);
    }

    #[test]
    fn suppressed_events_skip_listeners_and_history() {
        let mut bus = EventBus::new(16);
        let heard = Rc::new(RefCell::new(0));
        let sink = heard.clone();
        bus.on_passive(
            EventKind::TimeChanged,
            Box::new(move |_| *sink.borrow_mut() += 1),
        );
        bus.emit(time(5));
        bus.suppress(EventKind::TimeChanged);
        bus.emit(time(4));
        assert!(bus.is_suppressed(EventKind::TimeChanged));
        assert_eq!(bus.total_emitted(EventKind::TimeChanged), 1);

        let mut observed = 0;
        bus.deliver_with(|_| {
            observed += 1;
            None
        });
        assert_eq!(observed, 2);
        assert_eq!(*heard.borrow(), 0);
        assert!(bus.history().is_empty());
        assert_eq!(bus.pending_count(), 0);
    }

    #[test]
    fn delivery_is_chronological_across_kinds() {
        let mut bus = EventBus::new(16);
        let log = Rc::new(RefCell::new(Vec::new()));
        for kind in [EventKind::ScoreChanged, EventKind::TimeChanged] {
            let log = log.clone();
            bus.on_passive(kind, Box::new(move |e| log.borrow_mut().push(e.kind())));
        }
        bus.emit(score(1, 0));
        bus.emit(time(9));
        bus.emit(score(2, 0));
        bus.deliver();
        assert_eq!(
            *log.borrow(),
            vec![
                EventKind::ScoreChanged,
                EventKind::TimeChanged,
                EventKind::ScoreChanged
            ]
        );
        assert_eq!(bus.pending_count(), 0);
        assert_eq!(bus.history().len(), 3);
    }

    #[test]
    fn priorities_order_listeners() {
        let mut bus = EventBus::new(16);
        let log = Rc::new(RefCell::new(Vec::new()));
        for (label, priority) in [
            ("post", SubscriberPriority::Post),
            ("normal", SubscriberPriority::Normal),
            ("pre", SubscriberPriority::Pre),
        ] {
            let log = log.clone();
            bus.on_passive_filtered(
                EventKind::ScoreChanged,
                priority,
                None,
                Box::new(move |_| log.borrow_mut().push(label)),
            );
        }
        bus.emit(score(1, 0));
        bus.deliver();
        assert_eq!(*log.borrow(), vec!["pre", "normal", "post"]);
    }

    #[test]
    fn filter_blocks_non_matching() {
        let mut bus = EventBus::new(16);
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        bus.on_passive_filtered(
            EventKind::ScoreChanged,
            SubscriberPriority::Normal,
            Some(Box::new(|e| matches!(e, Event::ScoreChanged { total, .. } if *total > 10))),
            Box::new(move |e| sink.borrow_mut().push(e.clone())),
        );
        bus.emit(score(5, 0));
        bus.emit(score(50, 1));
        bus.deliver();
        assert_eq!(*seen.borrow(), vec![score(50, 1)]);
    }

    #[test]
    fn observer_follow_up_is_delivered_in_same_pass() {
        let mut bus = EventBus::new(16);
        let log = Rc::new(RefCell::new(Vec::new()));
        for kind in [EventKind::ScoreChanged, EventKind::DifficultyChanged] {
            let log = log.clone();
            bus.on_passive(kind, Box::new(move |e| log.borrow_mut().push(e.kind())));
        }
        bus.emit(score(100, 7));
        bus.deliver_with(|e| match e {
            Event::ScoreChanged { at, .. } => Some(Event::DifficultyChanged {
                from: 1,
                to: 2,
                at: *at,
            }),
            _ => None,
        });
        assert_eq!(
            *log.borrow(),
            vec![EventKind::ScoreChanged, EventKind::DifficultyChanged]
        );
        assert_eq!(bus.pending_count(), 0);
    }

    #[test]
    fn event_at_reports_timestamp() {
        assert_eq!(score(0, 1234).at(), 1234);
    }

    #[test]
    fn clear_all_keeps_counters() {
        let mut bus = EventBus::new(4);
        bus.emit(score(1, 0));
        bus.deliver();
        bus.emit(score(2, 0));
        bus.clear_all();
        assert_eq!(bus.pending_count(), 0);
        assert!(bus.history().is_empty());
        assert_eq!(bus.total_emitted(EventKind::ScoreChanged), 2);
    }
}
