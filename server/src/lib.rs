//! # Authoritative FPS Room Simulation
//!
//! The server holds the only copy of game state that matters: player
//! positions, health, ammo, projectiles, pickups, and round state all live
//! here, keyed by stable entity id inside a [`room::Room`]. Clients send
//! inputs; the server validates and applies them on its own tick; clients
//! receive snapshots. Nothing a client sends is ever trusted outright.
//!
//! ## Module organization
//!
//! - [`collision`] — sphere/AABB/ray primitives the rest of the simulation
//!   is built on.
//! - [`nav`] — a coarse A* grid used by bot pathing.
//! - [`movement`], [`weapons`], [`projectiles`], [`damage`], [`pickups`],
//!   [`scoring`], [`bots`] — one system per tick concern, each a free
//!   function operating on `&mut room::Room` by entity id.
//! - [`room`] — entity ownership, the two-queue event model, and snapshot
//!   assembly.
//! - [`net`] — the WebSocket edge: message validation, rate limiting, and
//!   the per-player snapshot diff cache.
//! - [`driver`] — the fixed-timestep tick loop and the mutex-guarded room
//!   registry the net edge is allowed to touch.
//! - [`persistence`] — the trait rooms call into on kills; an in-memory
//!   implementation for tests and single-process deployments.
//!
//! ## What this crate does not do
//! Lag compensation/reconciliation beyond acking `lastInputSeq`, anti-cheat
//! beyond rate limiting and sequence windows, team play, spectator mode,
//! the HTTP control surface, a durable persistence store, and map authoring
//! tooling are all out of scope (see `DESIGN.md`).

pub mod bots;
pub mod collision;
pub mod damage;
pub mod driver;
pub mod movement;
pub mod nav;
pub mod net;
pub mod persistence;
pub mod pickups;
pub mod projectiles;
pub mod room;
pub mod scoring;
pub mod weapons;
