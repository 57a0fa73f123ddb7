//! Sort resolution: turns one player drop (item + receptacle) into a single
//! score delta, order credit and a feedback line. Also owns the penalties for
//! items that leave the lane unsorted.

use thiserror::Error;
use tracing::{debug, info};

use crate::event::{Event, Severity};
use crate::fixed::{round_to_i64, Fixed64};
use crate::id::{ItemId, ReceptacleId};
use crate::item::Item;
use crate::order::{CreditOutcome, OrderContext, OrderManager};
use crate::transport::Conveyor;
use crate::upgrade::UpgradeProvider;

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

/// How a drop was judged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SortVerdict {
    /// Accepted and credited to the active order.
    OrderItem,
    /// Accepted with no active order involved.
    Accepted,
    /// Accepted, but another kind is on order.
    OffOrder,
    /// Discardable kind dropped in the discard receptacle.
    Recycled,
    /// The order's kind, dropped somewhere other than the order's target.
    WrongBinForOrder,
    /// The receptacle does not take this kind.
    Rejected { fragile: bool },
}

impl SortVerdict {
    pub fn is_accepted(&self) -> bool {
        !matches!(self, SortVerdict::Rejected { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SortError {
    #[error("session is not running")]
    Inactive,
    #[error("session is paused")]
    Paused,
    #[error("item not found: {0:?}")]
    UnknownItem(ItemId),
    #[error("receptacle not found: {0:?}")]
    UnknownReceptacle(ReceptacleId),
}

/// Everything a resolved sort did.
#[derive(Debug, Clone, PartialEq)]
pub struct SortReport {
    /// The consumed item record.
    pub item: Item,
    pub receptacle: ReceptacleId,
    pub verdict: SortVerdict,
    /// Net score change of the drop itself, excluding any order reward.
    pub delta: i64,
    pub credit: Option<CreditOutcome>,
}

/// Mutable session state a sort touches.
pub struct SortContext<'a> {
    pub conveyor: &'a mut Conveyor,
    pub orders: &'a mut OrderManager,
    pub order: OrderContext<'a>,
    pub upgrades: &'a dyn UpgradeProvider,
}

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

/// Resolve a drop. The receptacle is validated before the item is taken off
/// the lane, so a bad receptacle never loses an item.
pub fn resolve_sort(
    ctx: &mut SortContext<'_>,
    item_id: ItemId,
    receptacle_id: ReceptacleId,
) -> Result<SortReport, SortError> {
    let catalog = ctx.order.catalog;
    let config = ctx.order.config;
    let scoring = &config.scoring;
    let receptacle = catalog
        .receptacle(receptacle_id)
        .ok_or(SortError::UnknownReceptacle(receptacle_id))?;
    let item = ctx
        .conveyor
        .remove(item_id)
        .map_err(|_| SortError::UnknownItem(item_id))?;

    let recycle = receptacle.discard && item.kind.is_discardable();
    let base = if recycle {
        scoring.recycle_award + ctx.upgrades.recycle_bonus_value()
    } else {
        scoring.correct_sort
    };
    let order = ctx.orders.active().map(|o| (o.kind, o.target));

    let mut text;
    let mut severity = Severity::Success;
    let mut credit = None;
    let (verdict, delta) = if !receptacle.accepts(item.kind) {
        text = format!("WRONG BIN! \"{}\" to {}.", item.name, receptacle.label);
        severity = Severity::Error;
        let mut delta = scoring.incorrect_sort;
        if item.fragile {
            let extra = round_to_i64(
                Fixed64::from_num(scoring.fragile_extra) * ctx.upgrades.fragile_penalty_modifier(),
            );
            text.push_str(&format!(" It shattered! (-{extra} extra)"));
            delta -= extra;
        }
        (SortVerdict::Rejected { fragile: item.fragile }, delta)
    } else {
        text = format!("Correct: \"{}\" to {}.", item.name, receptacle.label);
        match order {
            Some((kind, target)) if kind == item.kind && target != receptacle_id => {
                let target_label = catalog
                    .receptacle(target)
                    .map(|r| r.label.as_str())
                    .unwrap_or_default();
                text = format!(
                    "\"{}\" belongs in {target_label} for this order.",
                    item.name
                );
                severity = Severity::Info;
                (SortVerdict::WrongBinForOrder, scoring.wrong_bin_for_order)
            }
            Some((kind, _)) if kind == item.kind => {
                let outcome = ctx
                    .orders
                    .credit_progress(item.kind, receptacle_id, &mut ctx.order);
                credit = Some(outcome);
                if outcome.contributed() {
                    text.push_str(" Order progress!");
                    (SortVerdict::OrderItem, base + scoring.order_item_bonus)
                } else {
                    (SortVerdict::Accepted, base)
                }
            }
            Some(_) if !recycle => {
                text.push_str(" (Not current order).");
                severity = Severity::Info;
                (SortVerdict::OffOrder, base + scoring.off_order_sort)
            }
            _ if recycle => (SortVerdict::Recycled, base),
            _ => (SortVerdict::Accepted, base),
        }
    };
    if recycle && verdict.is_accepted() {
        let bonus = ctx.upgrades.recycle_bonus_value();
        if bonus > 0 {
            text.push_str(&format!(" +{bonus} recycle bonus!"));
        }
    }

    let now = ctx.order.now;
    ctx.order.score.apply(delta, ctx.order.events, now);
    info!(
        item = %item.name,
        kind = %item.kind,
        receptacle = %receptacle.key,
        ?verdict,
        delta,
        "Item sorted"
    );
    ctx.order.events.emit(Event::ItemSorted {
        item: item.id,
        kind: item.kind,
        receptacle: receptacle_id,
        verdict,
        delta,
        at: now,
    });
    ctx.order
        .events
        .feedback(text, severity, config.feedback_duration, now);

    Ok(SortReport {
        item,
        receptacle: receptacle_id,
        verdict,
        delta,
        credit,
    })
}

// ---------------------------------------------------------------------------
// Unsorted exits
// ---------------------------------------------------------------------------

/// Penalize an item that ran off the end of the lane. Never fails the order.
pub fn handle_miss(item: &Item, orders: &OrderManager, ctx: &mut OrderContext<'_>) -> i64 {
    let delta = ctx.config.scoring.missed_item;
    ctx.score.apply(delta, ctx.events, ctx.now);
    debug!(item = %item.name, kind = %item.kind, "Item missed");
    if orders.active().is_some_and(|o| o.kind == item.kind) {
        debug!(kind = %item.kind, "Missed item was part of the current order");
    }
    ctx.events.emit(Event::ItemMissed {
        item: item.id,
        kind: item.kind,
        at: ctx.now,
    });
    let duration = ctx.config.feedback_duration;
    ctx.events
        .feedback(format!("Missed: {}!", item.name), Severity::Error, duration, ctx.now);
    delta
}

/// Penalize a volatile item whose lifespan ran out on the lane.
pub fn handle_explosion(item: &Item, ctx: &mut OrderContext<'_>) -> i64 {
    let delta = ctx.config.scoring.exploded_item;
    ctx.score.apply(delta, ctx.events, ctx.now);
    debug!(item = %item.name, kind = %item.kind, "Volatile item exploded");
    ctx.events.emit(Event::ItemExploded {
        item: item.id,
        kind: item.kind,
        at: ctx.now,
    });
    let duration = ctx.config.feedback_duration;
    ctx.events.feedback(
        format!("{} exploded! ({delta})", item.name),
        Severity::Error,
        duration,
        ctx.now,
    );
    delta
}
