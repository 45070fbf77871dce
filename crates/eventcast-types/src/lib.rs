//! Shared type definitions for the eventcast generator.
//!
//! This crate is the single source of truth for the wire record that the
//! generator emits and the identifiers used by the broadcast server. The
//! JSON shape of [`Event`] is the only contract with downstream consumers.
//!
//! # Modules
//!
//! - [`event`] -- The synthetic event record and its kind enumeration
//! - [`ids`] -- Type-safe UUID wrappers for runtime entities

pub mod event;
pub mod ids;

// Re-export all public types at crate root for convenience.
pub use event::{Event, EventKind};
pub use ids::ConnectionId;
