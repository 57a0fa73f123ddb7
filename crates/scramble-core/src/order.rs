//! Order lifecycle: one active order at a time, generated from a random
//! requester profile, credited item by item, then completed or failed.
//! The next order is generated by a cancellable deferred task.
//!
//! ```text
//! NoOrder -> Active -> Completed | Failed -> (delay) -> NoOrder -> Active
//! ```

use tracing::{debug, info, warn};

use crate::catalog::Catalog;
use crate::config::SessionConfig;
use crate::difficulty::{DifficultyParams, OrderParameters};
use crate::event::{Event, EventBus, Severity};
use crate::fixed::{permille, round_to_i64, Fixed64, Millis};
use crate::id::{OrderId, ReceptacleId, RequesterId, TaskId};
use crate::item::ItemKind;
use crate::query::OrderSnapshot;
use crate::rng::SimRng;
use crate::schedule::{DeferredTask, Scheduler};
use crate::score::Score;
use crate::transport::OrderDemand;

// ---------------------------------------------------------------------------
// Orders
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    pub id: OrderId,
    pub requester: RequesterId,
    pub kind: ItemKind,
    pub required: u32,
    collected: u32,
    pub target: ReceptacleId,
    /// Unrounded reward; rounded when awarded.
    pub reward: Fixed64,
    pub description: String,
    /// Special-property chance for spawns biased toward this order.
    pub property_chance: Fixed64,
}

impl Order {
    pub fn collected(&self) -> u32 {
        self.collected
    }

    pub fn remaining(&self) -> u32 {
        self.required - self.collected
    }

    pub fn is_fulfilled(&self) -> bool {
        self.collected >= self.required
    }

    pub fn progress(&self) -> String {
        format!("{}/{}", self.collected, self.required)
    }

    pub fn demand(&self) -> OrderDemand {
        OrderDemand {
            kind: self.kind,
            remaining: self.remaining(),
            property_chance: self.property_chance,
        }
    }

    pub fn snapshot(&self, catalog: &Catalog) -> OrderSnapshot {
        OrderSnapshot {
            order: self.id,
            requester: self.requester,
            requester_name: catalog
                .requester(self.requester)
                .map(|r| r.name.clone())
                .unwrap_or_default(),
            kind: self.kind,
            item_label: catalog.item_label(self.kind),
            collected: self.collected,
            required: self.required,
            progress: self.progress(),
            target: self.target,
            target_label: catalog
                .receptacle(self.target)
                .map(|r| r.label.clone())
                .unwrap_or_default(),
            description: self.description.clone(),
            reward: round_to_i64(self.reward),
        }
    }
}

/// `quantity × value × (1 + (complexity − 1) × 0.1)`, where the value is
/// floored at the level's minimum item value.
pub fn compute_reward(quantity: u32, kind_value: u32, params: &DifficultyParams) -> Fixed64 {
    let value = kind_value.max(params.min_item_value);
    let level_bonus = permille(100 * (i64::from(params.order_complexity) - 1));
    Fixed64::from_num(quantity) * Fixed64::from_num(value) * (Fixed64::ONE + level_bonus)
}

/// A fully specified order to open, bypassing random generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderRequest {
    pub requester: RequesterId,
    pub kind: ItemKind,
    pub quantity: u32,
    /// Defaults to the catalog's routing for `kind`.
    pub target: Option<ReceptacleId>,
}

/// Result of [`OrderManager::credit_progress`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreditOutcome {
    NoActiveOrder,
    WrongKind,
    WrongReceptacle,
    /// Guard against crediting past the required quantity.
    AlreadyFulfilled,
    Credited { completed: bool },
}

impl CreditOutcome {
    pub fn contributed(&self) -> bool {
        matches!(self, CreditOutcome::Credited { .. })
    }
}

/// Session state an order operation reads and writes.
pub struct OrderContext<'a> {
    pub catalog: &'a Catalog,
    pub config: &'a SessionConfig,
    pub params: DifficultyParams,
    pub order_params: OrderParameters,
    pub rng: &'a mut SimRng,
    pub scheduler: &'a mut Scheduler,
    pub events: &'a mut EventBus,
    pub score: &'a mut Score,
    /// Overlay bonus added to completed order rewards.
    pub order_bonus: i64,
    pub now: Millis,
}

impl OrderContext<'_> {
    fn feedback(&mut self, text: String, severity: Severity) {
        let duration = self.config.feedback_duration;
        self.events.feedback(text, severity, duration, self.now);
    }

    fn requester_line(&mut self, requester: RequesterId, success: bool) -> Option<String> {
        let catalog = self.catalog;
        let profile = catalog.requester(requester)?;
        let lines = if success {
            &profile.dialogue.success
        } else {
            &profile.dialogue.failure
        };
        self.rng.pick(lines).cloned()
    }
}

// ---------------------------------------------------------------------------
// Manager
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct OrderManager {
    active: Option<Order>,
    /// The single pending generation task, if any.
    pending: Option<TaskId>,
    next_id: u64,
    completed: u32,
    failed: u32,
}

impl OrderManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop the active order, cancel pending generation and zero the counters.
    pub fn reset(&mut self, scheduler: &mut Scheduler) {
        self.cancel_pending(scheduler);
        self.active = None;
        self.completed = 0;
        self.failed = 0;
    }

    pub fn active(&self) -> Option<&Order> {
        self.active.as_ref()
    }

    pub fn pending_task(&self) -> Option<TaskId> {
        self.pending
    }

    pub fn completed_count(&self) -> u32 {
        self.completed
    }

    pub fn failed_count(&self) -> u32 {
        self.failed
    }

    pub fn demand(&self) -> Option<OrderDemand> {
        self.active.as_ref().map(Order::demand)
    }

    pub fn cancel_pending(&mut self, scheduler: &mut Scheduler) {
        if let Some(task) = self.pending.take() {
            scheduler.cancel(task);
        }
    }

    /// Generate a random order from the catalog. Cancels any pending
    /// generation task and replaces any active order.
    pub fn generate(&mut self, ctx: &mut OrderContext<'_>) -> Option<&Order> {
        let catalog = ctx.catalog;
        let requester = ctx
            .rng
            .index(catalog.requester_count())
            .map(|i| RequesterId(i as u32));
        let Some(requester) = requester else {
            warn!("No requesters in catalog, cannot generate order");
            return None;
        };
        let profile = catalog.requester(requester)?;

        let preferred: Vec<ItemKind> = profile
            .preferred
            .iter()
            .copied()
            .filter(|k| catalog.item(*k).is_some())
            .collect();
        let pool: Vec<ItemKind> = if preferred.is_empty() {
            warn!(requester = %profile.key, "Requester has no usable preferred kinds, using global pool");
            catalog.items().iter().map(|d| d.kind).collect()
        } else {
            preferred
        };
        let kind = *ctx.rng.pick(&pool)?;

        let drawn = ctx
            .rng
            .range_u64(u64::from(profile.quantity.min), u64::from(profile.quantity.max))
            as u32;
        let quantity = drawn.min(ctx.order_params.max_items_in_order).max(1);

        self.open(
            OrderRequest {
                requester,
                kind,
                quantity,
                target: None,
            },
            ctx,
        )
    }

    /// Open a specific order. Cancels any pending generation task and
    /// replaces any active order.
    pub fn open(&mut self, request: OrderRequest, ctx: &mut OrderContext<'_>) -> Option<&Order> {
        self.cancel_pending(ctx.scheduler);
        let catalog = ctx.catalog;
        let profile = catalog.requester(request.requester)?;
        let Some(target) = request
            .target
            .or_else(|| catalog.receptacle_for(request.kind))
        else {
            warn!(kind = %request.kind, "No receptacle to target, cannot open order");
            return None;
        };
        let quantity = request.quantity.max(1);

        let kind_value = catalog.item(request.kind).map_or(0, |d| d.value);
        let reward = compute_reward(quantity, kind_value, &ctx.params);

        let label = catalog.item_label(request.kind);
        let target_label = catalog
            .receptacle(target)
            .map(|r| r.label.clone())
            .unwrap_or_default();
        let body = format!("Collect {quantity}x {label} → {target_label}");
        let description = match ctx.rng.pick(&profile.dialogue.order_prefixes) {
            Some(prefix) => format!("{prefix} {body}"),
            None => body,
        };

        let id = OrderId(self.next_id);
        self.next_id += 1;
        let order = Order {
            id,
            requester: request.requester,
            kind: request.kind,
            required: quantity,
            collected: 0,
            target,
            reward,
            description,
            property_chance: profile.property_chance,
        };
        info!(
            order = id.0,
            requester = %profile.key,
            kind = %order.kind,
            quantity,
            "Order generated"
        );
        ctx.events.emit(Event::OrderGenerated {
            order: order.snapshot(catalog),
            at: ctx.now,
        });
        ctx.feedback(format!("New order from {}", profile.name), Severity::Info);
        self.active = Some(order);
        self.active.as_ref()
    }

    /// Credit one item toward the active order. Only an item of the order's
    /// kind dropped into the order's target receptacle counts. Reaching the
    /// required quantity completes the order.
    pub fn credit_progress(
        &mut self,
        kind: ItemKind,
        receptacle: ReceptacleId,
        ctx: &mut OrderContext<'_>,
    ) -> CreditOutcome {
        let Some(order) = self.active.as_mut() else {
            return CreditOutcome::NoActiveOrder;
        };
        if order.kind != kind {
            return CreditOutcome::WrongKind;
        }
        if order.target != receptacle {
            return CreditOutcome::WrongReceptacle;
        }
        if order.is_fulfilled() {
            debug!(order = order.id.0, "Credit rejected, order already fulfilled");
            return CreditOutcome::AlreadyFulfilled;
        }

        order.collected += 1;
        debug!(order = order.id.0, progress = %order.progress(), "Order progressed");
        ctx.events.emit(Event::OrderProgressed {
            order: order.snapshot(ctx.catalog),
            at: ctx.now,
        });
        let completed = order.is_fulfilled();
        if completed {
            self.complete(ctx);
        }
        CreditOutcome::Credited { completed }
    }

    fn complete(&mut self, ctx: &mut OrderContext<'_>) {
        let Some(order) = self.active.take() else {
            return;
        };
        let reward = round_to_i64(order.reward) + ctx.order_bonus;
        ctx.score.apply(reward, ctx.events, ctx.now);
        self.completed += 1;
        info!(order = order.id.0, reward, "Order completed");
        ctx.events.emit(Event::OrderCompleted {
            order: order.id,
            requester: order.requester,
            reward,
            at: ctx.now,
        });
        let mut text = format!("Order Complete! +{reward} Creds");
        if let Some(line) = ctx.requester_line(order.requester, true) {
            text = format!("{text} \"{line}\"");
        }
        ctx.feedback(text, Severity::Success);
        let delay = ctx.config.order_complete_delay;
        self.schedule_next(ctx, delay);
    }

    /// Fail the active order. Returns false when no order is active.
    pub fn fail(&mut self, reason: &str, ctx: &mut OrderContext<'_>) -> bool {
        let Some(order) = self.active.take() else {
            return false;
        };
        self.failed += 1;
        info!(order = order.id.0, reason, "Order failed");
        ctx.events.emit(Event::OrderFailed {
            order: order.id,
            requester: order.requester,
            reason: reason.to_string(),
            at: ctx.now,
        });
        let mut text = format!("Order Failed: {}", ctx.catalog.item_label(order.kind));
        if let Some(line) = ctx.requester_line(order.requester, false) {
            text = format!("{text} \"{line}\"");
        }
        ctx.feedback(text, Severity::Error);
        let delay = ctx.config.order_fail_delay;
        self.schedule_next(ctx, delay);
        true
    }

    fn schedule_next(&mut self, ctx: &mut OrderContext<'_>, delay: Millis) {
        self.cancel_pending(ctx.scheduler);
        let due = ctx.now.saturating_add(delay);
        self.pending = Some(ctx.scheduler.schedule(due, DeferredTask::GenerateOrder));
    }

    /// Run a due generation task. Stale handles are ignored.
    pub fn run_deferred(&mut self, task: TaskId, ctx: &mut OrderContext<'_>) -> bool {
        if self.pending != Some(task) {
            debug!(task = task.0, "Ignoring stale order task");
            return false;
        }
        self.pending = None;
        self.generate(ctx).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventKind;
    use crate::fixed::f64_to_fixed64;

    struct Fixture {
        catalog: Catalog,
        config: SessionConfig,
        rng: SimRng,
        scheduler: Scheduler,
        events: EventBus,
        score: Score,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                catalog: Catalog::standard(),
                config: SessionConfig::default(),
                rng: SimRng::new(99),
                scheduler: Scheduler::new(),
                events: EventBus::default(),
                score: Score::default(),
            }
        }

        fn ctx(&mut self, now: Millis) -> OrderContext<'_> {
            OrderContext {
                catalog: &self.catalog,
                config: &self.config,
                params: DifficultyParams::for_level(1),
                order_params: OrderParameters {
                    max_items_in_order: 2,
                    min_rarity: 1,
                },
                rng: &mut self.rng,
                scheduler: &mut self.scheduler,
                events: &mut self.events,
                score: &mut self.score,
                order_bonus: 0,
                now,
            }
        }
    }

    fn chip_order(orders: &mut OrderManager, fx: &mut Fixture, quantity: u32) -> OrderId {
        let requester = fx.catalog.requester_id("whisper").unwrap();
        let mut ctx = fx.ctx(0);
        orders
            .open(
                OrderRequest {
                    requester,
                    kind: ItemKind::Datachip,
                    quantity,
                    target: None,
                },
                &mut ctx,
            )
            .unwrap()
            .id
    }

    #[test]
    fn reward_formula() {
        let level1 = DifficultyParams::for_level(1);
        assert_eq!(compute_reward(2, 50, &level1), Fixed64::from_num(100));
        let level3 = DifficultyParams::for_level(3);
        assert_eq!(round_to_i64(compute_reward(2, 50, &level3)), 110);
        let level10 = DifficultyParams::for_level(10);
        assert_eq!(round_to_i64(compute_reward(1, 5, &level10)), 60);
    }

    #[test]
    fn generated_order_respects_bounds() {
        let mut fx = Fixture::new();
        let mut orders = OrderManager::new();
        for _ in 0..100 {
            let mut ctx = fx.ctx(0);
            let order = orders.generate(&mut ctx).unwrap().clone();
            let profile = fx.catalog.requester(order.requester).unwrap();
            assert!(profile.preferred.contains(&order.kind));
            assert!((1..=2).contains(&order.required));
            assert_eq!(order.collected(), 0);
            assert_eq!(Some(order.target), fx.catalog.receptacle_for(order.kind));
            assert!(order.description.contains(&format!("Collect {}x", order.required)));
        }
    }

    #[test]
    fn matching_credit_progresses() {
        let mut fx = Fixture::new();
        let mut orders = OrderManager::new();
        chip_order(&mut orders, &mut fx, 2);
        let tech = fx.catalog.receptacle_id("bin-tech").unwrap();
        let mut ctx = fx.ctx(100);
        let outcome = orders.credit_progress(ItemKind::Datachip, tech, &mut ctx);
        assert_eq!(outcome, CreditOutcome::Credited { completed: false });
        assert_eq!(orders.active().unwrap().progress(), "1/2");
    }

    #[test]
    fn mismatches_do_not_progress() {
        let mut fx = Fixture::new();
        let mut orders = OrderManager::new();
        chip_order(&mut orders, &mut fx, 2);
        let tech = fx.catalog.receptacle_id("bin-tech").unwrap();
        let bio = fx.catalog.receptacle_id("bin-bio").unwrap();
        let mut ctx = fx.ctx(100);
        assert_eq!(
            orders.credit_progress(ItemKind::Hardware, tech, &mut ctx),
            CreditOutcome::WrongKind
        );
        assert_eq!(
            orders.credit_progress(ItemKind::Datachip, bio, &mut ctx),
            CreditOutcome::WrongReceptacle
        );
        assert_eq!(orders.active().unwrap().progress(), "0/2");
    }

    #[test]
    fn completion_awards_reward_and_schedules_next() {
        let mut fx = Fixture::new();
        let mut orders = OrderManager::new();
        let id = chip_order(&mut orders, &mut fx, 1);
        let tech = fx.catalog.receptacle_id("bin-tech").unwrap();
        {
            let mut ctx = fx.ctx(1000);
            ctx.order_bonus = 50;
            let outcome = orders.credit_progress(ItemKind::Datachip, tech, &mut ctx);
            assert_eq!(outcome, CreditOutcome::Credited { completed: true });
        }
        assert!(orders.active().is_none());
        assert_eq!(orders.completed_count(), 1);
        assert_eq!(fx.score.total(), 50 + 50);
        assert_eq!(fx.scheduler.next_due(), Some(2500));
        assert_eq!(fx.events.total_emitted(EventKind::OrderCompleted), 1);

        let mut ctx = fx.ctx(1000);
        assert_eq!(
            orders.credit_progress(ItemKind::Datachip, tech, &mut ctx),
            CreditOutcome::NoActiveOrder
        );

        let due = fx.scheduler.take_due(2500);
        assert_eq!(due.len(), 1);
        let mut ctx = fx.ctx(2500);
        assert!(orders.run_deferred(due[0].0, &mut ctx));
        assert_ne!(orders.active().unwrap().id, id);
    }

    #[test]
    fn fail_requires_active_order() {
        let mut fx = Fixture::new();
        let mut orders = OrderManager::new();
        assert!(!orders.fail("time expired", &mut fx.ctx(0)));
        chip_order(&mut orders, &mut fx, 2);
        assert!(orders.fail("time expired", &mut fx.ctx(500)));
        assert_eq!(orders.failed_count(), 1);
        assert_eq!(fx.scheduler.next_due(), Some(2500));
        assert!(!orders.fail("again", &mut fx.ctx(600)));
    }

    #[test]
    fn at_most_one_pending_generation() {
        let mut fx = Fixture::new();
        let mut orders = OrderManager::new();
        chip_order(&mut orders, &mut fx, 2);
        orders.fail("abandoned", &mut fx.ctx(0));
        let stale = orders.pending_task().unwrap();

        orders.generate(&mut fx.ctx(10)).unwrap();
        assert_eq!(orders.pending_task(), None);
        assert_eq!(fx.scheduler.pending_count(), 0);
        assert!(!orders.run_deferred(stale, &mut fx.ctx(5000)));
    }

    #[test]
    fn credit_guard_holds_at_required() {
        let mut order = Order {
            id: OrderId(0),
            requester: RequesterId(0),
            kind: ItemKind::Biomod,
            required: 1,
            collected: 1,
            target: ReceptacleId(1),
            reward: Fixed64::ZERO,
            description: String::new(),
            property_chance: f64_to_fixed64(0.25),
        };
        assert!(order.is_fulfilled());
        assert_eq!(order.remaining(), 0);
        order.collected = 0;
        assert_eq!(order.demand().remaining, 1);
    }

    #[test]
    fn reset_cancels_pending_task() {
        let mut fx = Fixture::new();
        let mut orders = OrderManager::new();
        chip_order(&mut orders, &mut fx, 2);
        orders.fail("abandoned", &mut fx.ctx(0));
        orders.reset(&mut fx.scheduler);
        assert_eq!(fx.scheduler.pending_count(), 0);
        assert_eq!(orders.failed_count(), 0);
        assert!(orders.active().is_none());
    }
}
