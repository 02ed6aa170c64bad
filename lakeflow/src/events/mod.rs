//! Run lifecycle events.
//!
//! The runner reports what it does through an [`EventSink`]; the CLI logs
//! events through `tracing`, tests collect them.

mod sink;

pub use sink::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};
