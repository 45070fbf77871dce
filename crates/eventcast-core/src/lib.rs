//! Event generation, rate control, and the producer loop for eventcast.
//!
//! This crate owns everything that happens on the producing side of the
//! pipeline. The network side lives in `eventcast-broadcast`, which plugs
//! into the loop through the [`EventSink`] trait.
//!
//! # Modules
//!
//! - [`config`] -- YAML configuration with environment overrides.
//! - [`control`] -- Shared producer phase, stop signal, and counters.
//! - [`factory`] -- Synthetic [`Event`] construction.
//! - [`producer`] -- The rate-limited, cancellable producer loop.
//! - [`rate`] -- Mapping from events-per-second to a tick interval.
//! - [`sink`] -- [`EventSink`] trait and the console sink.
//!
//! [`EventSink`]: sink::EventSink
//! [`Event`]: eventcast_types::Event

pub mod config;
pub mod control;
pub mod factory;
pub mod producer;
pub mod rate;
pub mod sink;
