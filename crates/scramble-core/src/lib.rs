//! Scramble Core -- the simulation core of a timed item-sorting game.
//!
//! Items ride a conveyor toward the end of a lane; the player drops them into
//! receptacles to score points and fill orders from requesters. A difficulty
//! controller adjusts the pace from order outcomes, and timed overlays apply
//! global modifiers on top. The crate has no I/O; presentation layers observe
//! it through [`event::EventBus`] and [`query`] snapshots.
//!
//! # Step Pipeline
//!
//! Each [`session::Session::step`] runs:
//!
//! 1. **Pre-tick** -- Run due deferred tasks (next-order generation).
//! 2. **Transport** -- Spawn, move, and report missed or exploded items.
//! 3. **Overlays** -- Start or end timed global modifiers.
//! 4. **Commands** -- Apply player sorts queued since the last step.
//! 5. **Timer** -- Count the session clock down; end the session at zero.
//! 6. **Post-tick** -- Deliver events, difficulty controller first.
//!
//! Host frames go through [`session::Session::advance`], which banks frame
//! time until one tick's worth has accumulated.
//!
//! # Key Types
//!
//! - [`session::Session`] -- Owns every component and runs the pipeline.
//! - [`transport::Conveyor`] -- Item spawning, movement and expiry.
//! - [`difficulty::DifficultyController`] -- Level from order outcome streaks.
//! - [`order::OrderManager`] -- One active order, credited item by item.
//! - [`sort::resolve_sort`] -- Turns a drop into a score delta and order credit.
//! - [`overlay::OverlayScheduler`] -- Mutually exclusive timed overlays.
//! - [`catalog::Catalog`] -- Immutable item, receptacle, requester and
//!   overlay data (frozen at build).
//! - [`fixed::Fixed64`] -- Q32.32 fixed-point type for deterministic math.

pub mod catalog;
pub mod command_queue;
pub mod config;
pub mod difficulty;
pub mod event;
pub mod fixed;
pub mod id;
pub mod item;
pub mod order;
pub mod overlay;
pub mod query;
pub mod rng;
pub mod schedule;
pub mod score;
pub mod session;
pub mod sim;
pub mod sort;
pub mod transport;
pub mod upgrade;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
