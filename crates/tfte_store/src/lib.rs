//! Time-indexed event persistence.
//!
//! The store is a logical ordered mapping from the composite key
//! `(ts, event_id)` to a binary-encoded event. `SqliteStore` is the durable
//! implementation; `MemStore` mirrors its semantics in memory for tests and
//! tooling. Scan order is always `(ts asc, event_id asc lex)`, equivalent to
//! the canonical zero-padded string key layout.

mod mem;
mod sqlite;

pub use mem::MemStore;
pub use sqlite::SqliteStore;

use tfte_events::{CodecError, Event, GraphSnapshot};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),
    #[error("store lock poisoned")]
    LockPoisoned,
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Union of event-log and snapshot-cache operations. Implementations are
/// shared across request handlers, so everything takes `&self`.
pub trait Store: Send + Sync {
    /// Atomic batch append. Re-ingesting an existing `(ts, id)` key
    /// overwrites, so replaying an input file is idempotent.
    fn ingest_events(&self, events: &[Event]) -> Result<()>;

    /// Events with `start_ts <= ts < end_ts` in `(ts, id)` order, filtered by
    /// emitting service before pagination, then `offset`-skipped and capped
    /// at `limit`. A malformed stored value aborts the whole query.
    fn get_events(
        &self,
        start_ts: i64,
        end_ts: i64,
        service_filter: Option<&str>,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Event>>;

    /// Optional snapshot cache.
    fn save_snapshot(&self, snapshot: &GraphSnapshot) -> Result<()>;

    /// Nearest cached snapshot with `timestamp <= ts`, if any.
    fn load_snapshot(&self, ts: i64) -> Result<Option<GraphSnapshot>>;
}
