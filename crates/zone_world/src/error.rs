//! World-layer error types.
//!
//! Only setup and bootstrap can fail as errors. In-simulation anomalies
//! (missing containers, stale ids) are logged and absorbed, never surfaced
//! as `Err`.

use zone_persist::PersistError;

/// Errors raised while configuring or bootstrapping a zone.
#[derive(Debug, thiserror::Error)]
pub enum WorldError {
    /// A bootstrap query failed; the zone cannot reach a consistent state.
    #[error("bootstrap query failed: {0}")]
    Bootstrap(#[from] PersistError),

    /// The configuration is unusable.
    #[error("invalid world config: {0}")]
    Config(String),
}
