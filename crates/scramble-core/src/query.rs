//! Read-only snapshots for presentation layers.
//!
//! Snapshots are owned copies, so callers can hold them across steps
//! without borrowing the session.

use crate::fixed::Millis;
use crate::id::{OrderId, OverlayId, ReceptacleId, RequesterId};
use crate::item::ItemKind;

/// Display view of the active order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderSnapshot {
    pub order: OrderId,
    pub requester: RequesterId,
    pub requester_name: String,
    pub kind: ItemKind,
    pub item_label: String,
    pub collected: u32,
    pub required: u32,
    /// `"collected/required"`.
    pub progress: String,
    pub target: ReceptacleId,
    pub target_label: String,
    pub description: String,
    /// Reward rounded to whole points, before any overlay bonus.
    pub reward: i64,
}

/// Display view of the running overlay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverlaySnapshot {
    pub overlay: OverlayId,
    pub name: String,
    pub remaining: Millis,
}

/// Summary of the whole session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub now: Millis,
    pub score: i64,
    pub seconds_left: u64,
    pub level: u32,
    pub items_on_lane: usize,
    pub orders_completed: u32,
    pub orders_failed: u32,
    pub order: Option<OrderSnapshot>,
    pub overlay: Option<OverlaySnapshot>,
}
