//! Frame pacing and per-step bookkeeping.
//!
//! The host calls [`SimClock::accumulate`] with each frame's elapsed time.
//! Frames are banked until the tick duration is reached, then released as a
//! single step covering everything banked. Sub-threshold frames never run a
//! step of their own, so every step sees at least one full tick of time.

use crate::fixed::{Fixed64, Millis};

// ---------------------------------------------------------------------------
// Clock
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimClock {
    /// Simulation time since session start.
    pub now: Millis,
    /// Frame time banked toward the next step.
    pub accumulator: Millis,
    pub tick_duration: Millis,
    /// Steps run since session start.
    pub steps: u64,
}

impl SimClock {
    pub fn new(tick_duration: Millis) -> Self {
        Self {
            now: 0,
            accumulator: 0,
            tick_duration: tick_duration.max(1),
            steps: 0,
        }
    }

    pub fn reset(&mut self) {
        self.now = 0;
        self.accumulator = 0;
        self.steps = 0;
    }

    /// Bank a frame. Returns the step length to run, if the threshold was
    /// reached.
    pub fn accumulate(&mut self, frame: Millis) -> Option<Millis> {
        self.accumulator = self.accumulator.saturating_add(frame);
        if self.accumulator < self.tick_duration {
            return None;
        }
        Some(std::mem::take(&mut self.accumulator))
    }

    /// Drop banked time, e.g. on pause, so resuming does not replay it.
    pub fn discard_pending(&mut self) {
        self.accumulator = 0;
    }

    /// Advance simulation time by one step of `dt`.
    pub fn tick(&mut self, dt: Millis) -> Millis {
        self.now = self.now.saturating_add(dt);
        self.steps += 1;
        self.now
    }
}

impl Default for SimClock {
    fn default() -> Self {
        Self::new(33)
    }
}

// ---------------------------------------------------------------------------
// Step report
// ---------------------------------------------------------------------------

/// What one step did.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct StepReport {
    pub dt: Millis,
    pub spawned: u32,
    pub missed: u32,
    pub exploded: u32,
    pub sorts_resolved: u32,
    pub deferred_tasks_run: u32,
    pub overlay_started: bool,
    pub overlay_ended: bool,
    pub time_expired: bool,
}

/// Result of [`crate::session::Session::advance`].
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct AdvanceResult {
    /// Empty when the frame was banked, or discarded while paused.
    pub steps: Vec<StepReport>,
}

impl AdvanceResult {
    pub fn steps_run(&self) -> usize {
        self.steps.len()
    }
}

// ---------------------------------------------------------------------------
// State hash
// ---------------------------------------------------------------------------

/// FNV-1a (64-bit) hash over session state, for determinism checks.
/// Not cryptographic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateHash(pub u64);

impl StateHash {
    const FNV_OFFSET: u64 = 0xcbf29ce484222325;
    const FNV_PRIME: u64 = 0x100000001b3;

    pub fn new() -> Self {
        Self(Self::FNV_OFFSET)
    }

    pub fn write(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.0 ^= b as u64;
            self.0 = self.0.wrapping_mul(Self::FNV_PRIME);
        }
    }

    pub fn write_u64(&mut self, v: u64) {
        self.write(&v.to_le_bytes());
    }

    pub fn write_u32(&mut self, v: u32) {
        self.write(&v.to_le_bytes());
    }

    pub fn write_i64(&mut self, v: i64) {
        self.write(&v.to_le_bytes());
    }

    pub fn write_fixed64(&mut self, v: Fixed64) {
        self.write(&v.to_bits().to_le_bytes());
    }

    pub fn finish(self) -> u64 {
        self.0
    }
}

impl Default for StateHash {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sub_threshold_frames_are_banked() {
        let mut clock = SimClock::new(33);
        assert_eq!(clock.accumulate(16), None);
        assert_eq!(clock.accumulator, 16);
        assert_eq!(clock.accumulate(16), None);
        assert_eq!(clock.accumulate(16), Some(48));
        assert_eq!(clock.accumulator, 0);
    }

    #[test]
    fn long_frame_runs_one_step_with_all_time() {
        let mut clock = SimClock::new(33);
        assert_eq!(clock.accumulate(250), Some(250));
        assert_eq!(clock.tick(250), 250);
        assert_eq!(clock.steps, 1);
    }

    #[test]
    fn discarding_pending_time() {
        let mut clock = SimClock::new(33);
        clock.accumulate(20);
        clock.discard_pending();
        assert_eq!(clock.accumulate(20), None);
    }

    #[test]
    fn zero_tick_duration_is_clamped() {
        let mut clock = SimClock::new(0);
        assert_eq!(clock.tick_duration, 1);
        assert_eq!(clock.accumulate(0), None);
        assert_eq!(clock.accumulate(1), Some(1));
    }

    #[test]
    fn state_hash_deterministic() {
        let mut h1 = StateHash::new();
        h1.write_u64(42);
        h1.write_i64(-7);

        let mut h2 = StateHash::new();
        h2.write_u64(42);
        h2.write_i64(-7);

        assert_eq!(h1.finish(), h2.finish());
    }

    #[test]
    fn state_hash_order_matters() {
        let mut h1 = StateHash::new();
        h1.write_u32(1);
        h1.write_u32(2);

        let mut h2 = StateHash::new();
        h2.write_u32(2);
        h2.write_u32(1);

        assert_ne!(h1.finish(), h2.finish());
    }
}
