//! The session: owns every component and drives them through one step.
//!
//! # Step pipeline
//!
//! Each step runs:
//! 1. **Pre-tick** -- run due deferred tasks (order generation)
//! 2. **Transport** -- spawn, move, collect misses and explosions
//! 3. **Overlays** -- advance the overlay timer, start or end an overlay
//! 4. **Commands** -- apply queued player sorts
//! 5. **Timer** -- count the session clock down, end on expiry
//! 6. **Post-tick** -- deliver events (difficulty first, then listeners)
//!
//! [`Session::resolve_sort`] may also be called between steps; its events are
//! delivered before it returns.

use tracing::{debug, info, warn};

use crate::catalog::{Catalog, CatalogError};
use crate::command_queue::{Command, CommandQueue};
use crate::config::SessionConfig;
use crate::difficulty::DifficultyController;
use crate::event::{
    EndReason, Event, EventBus, EventFilter, EventKind, PassiveListener, Severity,
    SubscriberPriority,
};
use crate::fixed::{f64_to_fixed64, Fixed64, Millis};
use crate::id::{ItemId, OverlayId, ReceptacleId};
use crate::item::ItemBlueprint;
use crate::order::{Order, OrderContext, OrderManager, OrderRequest};
use crate::overlay::{ActiveOverlay, OverlayModifiers, OverlayScheduler, OverlayTransition};
use crate::query::{OrderSnapshot, OverlaySnapshot, SessionSnapshot};
use crate::rng::SimRng;
use crate::schedule::{DeferredTask, Scheduler};
use crate::score::Score;
use crate::sim::{AdvanceResult, SimClock, StateHash, StepReport};
use crate::sort::{self, SortContext, SortError, SortReport};
use crate::transport::{Conveyor, TransportEnv};
use crate::upgrade::{NoUpgrades, UpgradeProvider};

// ---------------------------------------------------------------------------
// Status and errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionStatus {
    Idle,
    Running,
    Paused,
    Ended,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SessionError {
    #[error("invalid catalog: {0}")]
    Catalog(#[from] CatalogError),
    #[error("session is already running")]
    AlreadyRunning,
    #[error("session is not running")]
    NotRunning,
    #[error("session is not paused")]
    NotPaused,
}

/// Running tallies for the session summary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub spawned: u32,
    pub sorted: u32,
    pub rejected: u32,
    pub missed: u32,
    pub exploded: u32,
}

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

/// State every component operation reads or writes. Kept apart from the
/// conveyor and order manager so both can be borrowed alongside it.
#[derive(Debug)]
struct Shared {
    config: SessionConfig,
    catalog: Catalog,
    rng: SimRng,
    clock: SimClock,
    scheduler: Scheduler,
    events: EventBus,
    score: Score,
    difficulty: DifficultyController,
    overlays: OverlayScheduler,
}

impl Shared {
    fn order_ctx(&mut self) -> OrderContext<'_> {
        OrderContext {
            catalog: &self.catalog,
            config: &self.config,
            params: self.difficulty.current_parameters(),
            order_params: self.difficulty.order_parameters(),
            rng: &mut self.rng,
            scheduler: &mut self.scheduler,
            events: &mut self.events,
            score: &mut self.score,
            order_bonus: self.overlays.modifiers().order_bonus,
            now: self.clock.now,
        }
    }

    fn feedback(&mut self, text: impl Into<String>, severity: Severity) {
        let duration = self.config.feedback_duration;
        self.events.feedback(text, severity, duration, self.clock.now);
    }

    /// Deliver pending events. The difficulty controller sees each event
    /// first; any level change it makes is delivered in the same pass.
    fn deliver(&mut self) {
        let now = self.clock.now;
        let difficulty = &mut self.difficulty;
        self.events.deliver_with(|event| {
            difficulty
                .observe(event)
                .map(|change| Event::DifficultyChanged {
                    from: change.from,
                    to: change.to,
                    at: now,
                })
        });
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct Session {
    shared: Shared,
    conveyor: Conveyor,
    orders: OrderManager,
    upgrades: Box<dyn UpgradeProvider>,
    commands: CommandQueue,
    status: SessionStatus,
    seed: u64,
    time_left: Millis,
    stats: SessionStats,
}

impl Session {
    pub fn new(
        catalog: Catalog,
        config: SessionConfig,
        upgrades: Box<dyn UpgradeProvider>,
        seed: u64,
    ) -> Self {
        let mut rng = SimRng::new(seed);
        let conveyor = Conveyor::new(&config, &mut rng);
        let overlays = OverlayScheduler::new(
            config.overlay_window,
            config.overlay_trigger_chance,
            &mut rng,
        );
        let shared = Shared {
            clock: SimClock::new(config.tick_duration),
            scheduler: Scheduler::new(),
            events: EventBus::new(config.event_history),
            score: Score::default(),
            difficulty: DifficultyController::new(config.incorrect_sort_policy),
            overlays,
            rng,
            catalog,
            config,
        };
        let time_left = shared.config.session_length;
        Self {
            shared,
            conveyor,
            orders: OrderManager::new(),
            upgrades,
            commands: CommandQueue::new(),
            status: SessionStatus::Idle,
            seed,
            time_left,
            stats: SessionStats::default(),
        }
    }

    /// The stock catalog with default configuration and no upgrades.
    pub fn with_standard_catalog(seed: u64) -> Self {
        Self::new(
            Catalog::standard(),
            SessionConfig::default(),
            Box::new(NoUpgrades),
            seed,
        )
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Reset every component to its starting state. Listeners and
    /// suppression settings survive.
    pub fn init(&mut self) {
        let spawn_multiplier = self.upgrade_spawn_multiplier();
        let shared = &mut self.shared;
        shared.rng = SimRng::new(self.seed);
        shared.clock.reset();
        shared.scheduler.cancel_all();
        shared.events.clear_all();
        shared.score.reset();
        shared.difficulty.reset();
        shared.overlays.reset(&mut shared.rng);
        self.orders.reset(&mut shared.scheduler);
        self.conveyor.reset(&mut shared.rng, spawn_multiplier);
        self.commands.discard_pending();
        self.commands.clear_history();
        self.time_left = shared.config.session_length;
        self.stats = SessionStats::default();
        self.status = SessionStatus::Idle;
        debug!(seed = self.seed, "Session initialized");
    }

    /// Reset and start. Fails if the catalog cannot support a session.
    pub fn start(&mut self) -> Result<(), SessionError> {
        if matches!(self.status, SessionStatus::Running | SessionStatus::Paused) {
            return Err(SessionError::AlreadyRunning);
        }
        self.shared.catalog.validate()?;
        self.init();
        self.status = SessionStatus::Running;
        info!(
            seed = self.seed,
            length_ms = self.time_left,
            "Session started"
        );
        let now = self.shared.clock.now;
        self.shared.events.emit(Event::TimeChanged {
            seconds_left: self.seconds_left(),
            at: now,
        });
        self.orders.generate(&mut self.shared.order_ctx());
        self.shared.deliver();
        Ok(())
    }

    /// Freeze the session. Banked frame time is dropped, so resuming does
    /// not replay it.
    pub fn pause(&mut self) -> Result<(), SessionError> {
        if self.status != SessionStatus::Running {
            return Err(SessionError::NotRunning);
        }
        self.status = SessionStatus::Paused;
        self.shared.clock.discard_pending();
        info!(now = self.shared.clock.now, "Session paused");
        Ok(())
    }

    pub fn resume(&mut self) -> Result<(), SessionError> {
        if self.status != SessionStatus::Paused {
            return Err(SessionError::NotPaused);
        }
        self.status = SessionStatus::Running;
        info!(now = self.shared.clock.now, "Session resumed");
        Ok(())
    }

    /// The session timer ran out: fail any active order, then end.
    pub fn on_time_expired(&mut self) {
        if !self.is_active() {
            return;
        }
        self.time_left = 0;
        self.orders.fail("time expired", &mut self.shared.order_ctx());
        self.finish(EndReason::TimeExpired);
    }

    /// Stop the session early.
    pub fn end(&mut self) {
        if self.is_active() {
            self.finish(EndReason::Stopped);
        }
    }

    fn finish(&mut self, reason: EndReason) {
        let now = self.shared.clock.now;
        if let Some(overlay) = self.shared.overlays.force_end() {
            self.overlay_ended(overlay, now);
        }
        self.orders.cancel_pending(&mut self.shared.scheduler);
        let cancelled = self.shared.scheduler.cancel_all();
        let dropped = self.commands.discard_pending();
        self.status = SessionStatus::Ended;

        let final_score = self.shared.score.total();
        info!(
            ?reason,
            final_score,
            cancelled,
            dropped,
            "Session ended"
        );
        self.shared.events.emit(Event::SessionEnded {
            final_score,
            reason,
            at: now,
        });
        let text = match reason {
            EndReason::TimeExpired => format!("TIME'S UP! Final Score: {final_score}"),
            EndReason::Stopped => format!("Shift ended. Final Score: {final_score}"),
        };
        self.shared.feedback(text, Severity::Info);
        self.shared.deliver();
    }

    // -----------------------------------------------------------------------
    // Time
    // -----------------------------------------------------------------------

    /// Feed one host frame. Runs at most one step, covering all banked time.
    /// Frames are discarded while the session is not running.
    pub fn advance(&mut self, frame: Millis) -> AdvanceResult {
        let mut result = AdvanceResult::default();
        if self.status != SessionStatus::Running {
            self.shared.clock.discard_pending();
            return result;
        }
        if let Some(dt) = self.shared.clock.accumulate(frame) {
            result.steps.push(self.step(dt));
        }
        result
    }

    /// Run one step of `dt` directly, bypassing frame pacing.
    pub fn step(&mut self, dt: Millis) -> StepReport {
        let mut report = StepReport {
            dt,
            ..StepReport::default()
        };
        if self.status != SessionStatus::Running {
            return report;
        }
        let now = self.shared.clock.tick(dt);

        self.phase_deferred(now, &mut report);
        self.phase_transport(dt, now, &mut report);
        self.phase_overlays(dt, now, &mut report);
        self.phase_commands(now, &mut report);
        self.phase_timer(dt, now, &mut report);
        self.shared.deliver();

        report
    }

    fn phase_deferred(&mut self, now: Millis, report: &mut StepReport) {
        for (task, kind) in self.shared.scheduler.take_due(now) {
            match kind {
                DeferredTask::GenerateOrder => {
                    if self.orders.run_deferred(task, &mut self.shared.order_ctx()) {
                        report.deferred_tasks_run += 1;
                    }
                }
            }
        }
    }

    fn phase_transport(&mut self, dt: Millis, now: Millis, report: &mut StepReport) {
        let params = self.shared.difficulty.transport_parameters();
        let modifiers = *self.shared.overlays.modifiers();
        let env = TransportEnv {
            catalog: &self.shared.catalog,
            demand: self.orders.demand(),
            order_bias: self.shared.config.order_bias,
            special_chance: params.special_item_chance,
            volatile_lifespan: self.shared.config.volatile_lifespan,
            spawn_interval_multiplier: params.spawn_interval_modifier
                * self.upgrade_spawn_multiplier()
                * modifiers.spawn_interval,
            speed_multiplier: modifiers.conveyor_speed,
            now,
        };
        let transport = self.conveyor.advance(dt, &env, &mut self.shared.rng);

        for id in transport.spawned {
            if let Some(item) = self.conveyor.get(id) {
                self.shared.events.emit(Event::ItemSpawned {
                    item: id,
                    kind: item.kind,
                    at: now,
                });
                report.spawned += 1;
                self.stats.spawned += 1;
            }
        }
        for item in &transport.missed {
            sort::handle_miss(item, &self.orders, &mut self.shared.order_ctx());
            report.missed += 1;
            self.stats.missed += 1;
        }
        for item in &transport.exploded {
            sort::handle_explosion(item, &mut self.shared.order_ctx());
            report.exploded += 1;
            self.stats.exploded += 1;
        }
    }

    fn phase_overlays(&mut self, dt: Millis, now: Millis, report: &mut StepReport) {
        let shared = &mut self.shared;
        let level = shared.difficulty.level();
        let transition = shared
            .overlays
            .advance(dt, level, &shared.catalog, &mut shared.rng, now);
        match transition {
            Some(OverlayTransition::Started(active)) => {
                self.overlay_started(active, now);
                report.overlay_started = true;
            }
            Some(OverlayTransition::Ended(overlay)) => {
                self.overlay_ended(overlay, now);
                report.overlay_ended = true;
            }
            None => {}
        }
    }

    fn overlay_started(&mut self, active: ActiveOverlay, now: Millis) {
        let name = self
            .shared
            .catalog
            .overlay(active.overlay)
            .map(|def| def.name.clone())
            .unwrap_or_default();
        self.shared.events.emit(Event::OverlayStarted {
            overlay: active.overlay,
            name: name.clone(),
            duration: active.duration,
            at: now,
        });
        self.shared.feedback(format!("EVENT: {name}!"), Severity::Info);
    }

    fn overlay_ended(&mut self, overlay: OverlayId, now: Millis) {
        let name = self
            .shared
            .catalog
            .overlay(overlay)
            .map(|def| def.name.clone())
            .unwrap_or_default();
        self.shared
            .events
            .emit(Event::OverlayEnded { overlay, at: now });
        self.shared.feedback(format!("{name} ended."), Severity::Info);
    }

    fn phase_commands(&mut self, now: Millis, report: &mut StepReport) {
        for command in self.commands.drain(now) {
            match command {
                Command::Sort { item, receptacle } => {
                    if self.sort_now(item, receptacle).is_ok() {
                        report.sorts_resolved += 1;
                    }
                }
                Command::FailOrder { reason } => {
                    self.orders.fail(&reason, &mut self.shared.order_ctx());
                }
            }
        }
    }

    fn phase_timer(&mut self, dt: Millis, now: Millis, report: &mut StepReport) {
        let before = self.seconds_left();
        self.time_left = self.time_left.saturating_sub(dt);
        let after = self.seconds_left();
        if after != before {
            self.shared.events.emit(Event::TimeChanged {
                seconds_left: after,
                at: now,
            });
        }
        if self.time_left == 0 {
            report.time_expired = true;
            self.on_time_expired();
        }
    }

    fn upgrade_spawn_multiplier(&self) -> Fixed64 {
        self.upgrades
            .base_spawn_interval_multiplier()
            .clamp(f64_to_fixed64(0.5), f64_to_fixed64(2.0))
    }

    // -----------------------------------------------------------------------
    // Player actions
    // -----------------------------------------------------------------------

    /// Resolve a drop right away and deliver its events. Invalid references
    /// surface as feedback; nothing panics.
    pub fn resolve_sort(
        &mut self,
        item: ItemId,
        receptacle: ReceptacleId,
    ) -> Result<SortReport, SortError> {
        match self.status {
            SessionStatus::Running => {}
            SessionStatus::Paused => {
                warn!(?item, "Sort attempted while paused");
                return Err(SortError::Paused);
            }
            SessionStatus::Idle | SessionStatus::Ended => {
                warn!(?item, "Sort attempted while session inactive");
                return Err(SortError::Inactive);
            }
        }
        let result = self.sort_now(item, receptacle);
        self.shared.deliver();
        result
    }

    /// Queue a drop for the next step.
    pub fn submit_sort(
        &mut self,
        item: ItemId,
        receptacle: ReceptacleId,
    ) -> Result<(), SortError> {
        match self.status {
            SessionStatus::Running => {
                self.commands.push(Command::Sort { item, receptacle });
                Ok(())
            }
            SessionStatus::Paused => Err(SortError::Paused),
            SessionStatus::Idle | SessionStatus::Ended => Err(SortError::Inactive),
        }
    }

    fn sort_now(
        &mut self,
        item: ItemId,
        receptacle: ReceptacleId,
    ) -> Result<SortReport, SortError> {
        let mut ctx = SortContext {
            conveyor: &mut self.conveyor,
            orders: &mut self.orders,
            order: self.shared.order_ctx(),
            upgrades: self.upgrades.as_ref(),
        };
        match sort::resolve_sort(&mut ctx, item, receptacle) {
            Ok(report) => {
                self.stats.sorted += 1;
                if !report.verdict.is_accepted() {
                    self.stats.rejected += 1;
                }
                Ok(report)
            }
            Err(err) => {
                warn!(%err, "Sort rejected");
                let text = match err {
                    SortError::UnknownItem(_) => "Item not found",
                    SortError::UnknownReceptacle(_) => "Receptacle not found",
                    SortError::Inactive | SortError::Paused => "Sorting unavailable",
                };
                self.shared.feedback(text, Severity::Error);
                Err(err)
            }
        }
    }

    /// Fail the active order now. Returns false when no order is active.
    pub fn fail_order(&mut self, reason: &str) -> bool {
        if !self.is_active() {
            return false;
        }
        let failed = self.orders.fail(reason, &mut self.shared.order_ctx());
        self.shared.deliver();
        failed
    }

    /// Queue an order failure for the next step.
    pub fn submit_fail_order(&mut self, reason: impl Into<String>) -> Result<(), SessionError> {
        if !self.is_active() {
            return Err(SessionError::NotRunning);
        }
        self.commands.push(Command::FailOrder {
            reason: reason.into(),
        });
        Ok(())
    }

    /// Open a specific order, replacing any active one. `None` when the
    /// session is not running or paused, or the order cannot be routed.
    pub fn open_order(&mut self, request: OrderRequest) -> Option<OrderSnapshot> {
        if !self.is_active() {
            warn!(kind = %request.kind, "Order opened while session inactive");
            return None;
        }
        let snapshot = self
            .orders
            .open(request, &mut self.shared.order_ctx())
            .map(|order| order.snapshot(&self.shared.catalog));
        self.shared.deliver();
        snapshot
    }

    /// Generate a random order now, replacing any active one.
    pub fn generate_order(&mut self) -> Option<OrderSnapshot> {
        if !self.is_active() {
            warn!("Order generated while session inactive");
            return None;
        }
        let snapshot = self
            .orders
            .generate(&mut self.shared.order_ctx())
            .map(|order| order.snapshot(&self.shared.catalog));
        self.shared.deliver();
        snapshot
    }

    /// Put a specific item on the lane, e.g. a scripted spawn.
    pub fn place_item(&mut self, blueprint: ItemBlueprint) -> Result<ItemId, SessionError> {
        if !self.is_active() {
            warn!(kind = %blueprint.kind, "Item placed while session inactive");
            return Err(SessionError::NotRunning);
        }
        let kind = blueprint.kind;
        let id = self.conveyor.place(blueprint);
        self.stats.spawned += 1;
        self.shared.events.emit(Event::ItemSpawned {
            item: id,
            kind,
            at: self.shared.clock.now,
        });
        self.shared.deliver();
        Ok(id)
    }

    // -----------------------------------------------------------------------
    // Listeners
    // -----------------------------------------------------------------------

    pub fn on_event(&mut self, kind: EventKind, listener: PassiveListener) {
        self.shared.events.on_passive(kind, listener);
    }

    pub fn on_event_filtered(
        &mut self,
        kind: EventKind,
        priority: SubscriberPriority,
        filter: Option<EventFilter>,
        listener: PassiveListener,
    ) {
        self.shared
            .events
            .on_passive_filtered(kind, priority, filter, listener);
    }

    pub fn suppress(&mut self, kind: EventKind) {
        self.shared.events.suppress(kind);
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    fn is_active(&self) -> bool {
        matches!(self.status, SessionStatus::Running | SessionStatus::Paused)
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn now(&self) -> Millis {
        self.shared.clock.now
    }

    pub fn steps(&self) -> u64 {
        self.shared.clock.steps
    }

    pub fn score(&self) -> i64 {
        self.shared.score.total()
    }

    pub fn time_left(&self) -> Millis {
        self.time_left
    }

    /// Whole seconds left, rounded up.
    pub fn seconds_left(&self) -> u64 {
        self.time_left.div_ceil(1000)
    }

    pub fn level(&self) -> u32 {
        self.shared.difficulty.level()
    }

    pub fn difficulty(&self) -> &DifficultyController {
        &self.shared.difficulty
    }

    pub fn catalog(&self) -> &Catalog {
        &self.shared.catalog
    }

    pub fn config(&self) -> &SessionConfig {
        &self.shared.config
    }

    pub fn conveyor(&self) -> &Conveyor {
        &self.conveyor
    }

    pub fn orders(&self) -> &OrderManager {
        &self.orders
    }

    pub fn active_order(&self) -> Option<&Order> {
        self.orders.active()
    }

    pub fn order_snapshot(&self) -> Option<OrderSnapshot> {
        self.orders
            .active()
            .map(|order| order.snapshot(&self.shared.catalog))
    }

    pub fn active_overlay(&self) -> Option<&ActiveOverlay> {
        self.shared.overlays.active()
    }

    pub fn overlay_modifiers(&self) -> &OverlayModifiers {
        self.shared.overlays.modifiers()
    }

    pub fn pending_tasks(&self) -> usize {
        self.shared.scheduler.pending_count()
    }

    pub fn pending_commands(&self) -> usize {
        self.commands.pending_count()
    }

    pub fn events(&self) -> &EventBus {
        &self.shared.events
    }

    pub fn stats(&self) -> SessionStats {
        self.stats
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let overlay = self.shared.overlays.active().map(|active| OverlaySnapshot {
            overlay: active.overlay,
            name: self
                .shared
                .catalog
                .overlay(active.overlay)
                .map(|def| def.name.clone())
                .unwrap_or_default(),
            remaining: active.remaining(),
        });
        SessionSnapshot {
            now: self.now(),
            score: self.score(),
            seconds_left: self.seconds_left(),
            level: self.level(),
            items_on_lane: self.conveyor.len(),
            orders_completed: self.orders.completed_count(),
            orders_failed: self.orders.failed_count(),
            order: self.order_snapshot(),
            overlay,
        }
    }

    /// Hash of the simulation state. Two sessions with the same seed, config
    /// and inputs hash equal after the same steps.
    pub fn state_hash(&self) -> u64 {
        let mut hash = StateHash::new();
        hash.write_u64(self.shared.clock.now);
        hash.write_u64(self.shared.rng.state());
        hash.write_i64(self.shared.score.total());
        hash.write_u64(self.time_left);
        hash.write_u32(self.shared.difficulty.level());
        hash.write_u64(self.conveyor.len() as u64);
        for item in self.conveyor.items() {
            hash.write_u32(item.kind as u32);
            hash.write_fixed64(item.position);
        }
        if let Some(order) = self.orders.active() {
            hash.write_u64(order.id.0);
            hash.write_u32(order.collected());
            hash.write_u32(order.required);
        }
        if let Some(active) = self.shared.overlays.active() {
            hash.write_u32(active.overlay.0);
            hash.write_u64(active.elapsed);
        }
        hash.finish()
    }
}
