//! Async query dispatch with tick-thread completion delivery.
//!
//! Queries run on tokio blocking workers; each finished query becomes a
//! [`Completion`] on an unbounded channel. The tick thread calls
//! [`PersistHandle::drain`] once per tick and applies the results while it
//! alone holds the world — no other thread ever touches world state.

use crate::backend::QueryBackend;
use crate::error::PersistError;
use crate::query::{Query, QueryResult};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::error;

/// A finished query: the request and what came back.
#[derive(Debug)]
pub struct Completion {
    pub query: Query,
    pub result: Result<QueryResult, PersistError>,
}

#[derive(Debug, Clone, Copy)]
enum Mode {
    /// Run queries on tokio blocking workers. Requires a runtime.
    Spawned,
    /// Run queries on the calling thread. For tests and bootstrap tools.
    Inline,
}

/// Handle the world core uses to talk to persistence.
pub struct PersistHandle {
    backend: Arc<dyn QueryBackend>,
    tx: mpsc::UnboundedSender<Completion>,
    rx: mpsc::UnboundedReceiver<Completion>,
    mode: Mode,
}

impl PersistHandle {
    /// Handle that executes queries on tokio workers. Must be created inside
    /// a tokio runtime.
    #[must_use]
    pub fn spawned(backend: Arc<dyn QueryBackend>) -> Self {
        Self::with_mode(backend, Mode::Spawned)
    }

    /// Handle that executes queries inline on dispatch. Completions still
    /// arrive through the channel, so drain-driven code paths behave the
    /// same; only the asynchrony is gone.
    #[must_use]
    pub fn inline(backend: Arc<dyn QueryBackend>) -> Self {
        Self::with_mode(backend, Mode::Inline)
    }

    fn with_mode(backend: Arc<dyn QueryBackend>, mode: Mode) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            backend,
            tx,
            rx,
            mode,
        }
    }

    /// Queue a query for execution. Never blocks the tick thread.
    pub fn dispatch(&self, query: Query) {
        match self.mode {
            Mode::Inline => {
                let result = self.backend.execute(&query);
                let _ = self.tx.send(Completion { query, result });
            }
            Mode::Spawned => {
                let backend = Arc::clone(&self.backend);
                let tx = self.tx.clone();
                tokio::task::spawn_blocking(move || {
                    let result = backend.execute(&query);
                    if tx.send(Completion { query, result }).is_err() {
                        error!("persistence completion channel closed");
                    }
                });
            }
        }
    }

    /// Take every completion that has arrived since the last drain.
    pub fn drain(&mut self) -> Vec<Completion> {
        let mut out = Vec::new();
        while let Ok(completion) = self.rx.try_recv() {
            out.push(completion);
        }
        out
    }

    /// Execute a query on the calling thread, bypassing the channel. Only
    /// for end-of-life paths (shutdown, final disconnect save) where the
    /// result must land before the process or player state goes away.
    pub fn execute_sync(&self, query: Query) -> Result<QueryResult, PersistError> {
        self.backend.execute(&query)
    }
}
