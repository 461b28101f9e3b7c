//! # Shared FPS Protocol & World Library
//!
//! Data structures, constants, and wire protocol shared between the
//! authoritative room simulation (`server`) and anything speaking its
//! WebSocket protocol. This crate does no I/O — it only defines types and
//! pure parsing/validation helpers so the server and any client can agree on
//! wire shapes without duplicating logic.
//!
//! ## Core Components
//!
//! ### World primitives (`world`)
//! `Vec3`, `Aabb`, `clamp`, and the map JSON document loader.
//!
//! ### Configuration (`config`)
//! `ServerConfig`, `MovementCaps`, `WeaponSpec` — populated data, no env/file
//! loading (that's an external concern per the core's scope).
//!
//! ### Wire protocol (`protocol`)
//! The `{"type": ..., "data": ...}` envelope, per-message-type parsers with
//! the same permissive-with-required-fields validation as the reference
//! implementation, and `PlayerCommand` (the validated, normalized input a
//! player's last command is replaced with).
//!
//! ## Design Philosophy
//!
//! ### Server authority
//! Every type here describes *data*, never behavior that mutates game
//! state. Validation functions return `Result`s; they do not panic on
//! malformed input, since malformed input is the normal case for a
//! network-facing parser (§7 "Protocol errors").
//!
//! ### JSON wire format
//! Unlike this crate's UDP/bincode ancestor, the protocol here is
//! JSON-over-WebSocket (§6), chosen for interoperability with browser
//! clients and human-readable debugging of the snapshot/event stream.

pub mod config;
pub mod protocol;
pub mod world;

pub use config::{MovementCaps, ServerConfig, WeaponFamily, WeaponSpec};
pub use protocol::{PlayerCommand, ProtocolError};
pub use world::{Aabb, MapData, MapError, PickupKind, Vec3};
