//! Lifecycle controller for the eventcast generator.
//!
//! Wires the producer loop from `eventcast-core` to its sinks (stdout
//! and, optionally, the TCP broadcast server from `eventcast-broadcast`)
//! and owns startup and shutdown ordering. The `eventcast-generator`
//! binary is a thin CLI over [`run`].

pub mod error;
pub mod lifecycle;

pub use error::GeneratorError;
pub use lifecycle::{Generator, RunSummary, RunningGenerator, run};
