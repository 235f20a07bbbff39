//! Persistence-layer error types.

/// Errors a backend can report for a query.
#[derive(Debug, Clone, thiserror::Error)]
pub enum PersistError {
    /// The underlying store failed.
    #[error("backend failure: {0}")]
    Backend(String),

    /// The backend does not serve this query.
    #[error("unsupported query: {0}")]
    Unsupported(String),
}
