//! Protocol boundary of the zone simulation.
//!
//! The world core never talks to sockets. It reports visibility changes and
//! broadcasts through [`ProtocolSink`]; the real session layer implements the
//! trait, and tests use [`RecordingSink`] to assert on what was emitted.

pub mod messages;
pub mod sink;

pub use messages::{EntityCreate, EntityDestroy, Notification, ServerTime, ZoneBroadcast};
pub use sink::{NullSink, ProtocolSink, RecordingSink};
