use serde::{Deserialize, Serialize};
use slotmap::new_key_type;

new_key_type! {
    /// Identifies a live item on the conveyor. Stale after the item leaves.
    pub struct ItemId;
}

/// Identifies a receptacle in the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ReceptacleId(pub u32);

/// Identifies a requester profile in the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RequesterId(pub u32);

/// Identifies an overlay definition in the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct OverlayId(pub u32);

/// Monotonic order number, unique within a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct OrderId(pub u64);

/// Handle to a deferred task. Cancelling a stale handle is a no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TaskId(pub u64);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn receptacle_id_equality() {
        assert_eq!(ReceptacleId(0), ReceptacleId(0));
        assert_ne!(ReceptacleId(0), ReceptacleId(1));
    }

    #[test]
    fn ids_are_hashable() {
        use std::collections::HashMap;
        let mut map = HashMap::new();
        map.insert(RequesterId(0), "whisper");
        map.insert(RequesterId(1), "doc_nyx");
        assert_eq!(map[&RequesterId(1)], "doc_nyx");
    }

    #[test]
    fn item_ids_from_slotmap_are_unique() {
        let mut map = slotmap::SlotMap::<ItemId, u8>::with_key();
        let a = map.insert(1);
        let b = map.insert(2);
        assert_ne!(a, b);
        map.remove(a);
        let c = map.insert(3);
        assert_ne!(a, c);
    }
}
