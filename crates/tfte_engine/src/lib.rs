//! Query facade over the event store: graph reconstruction, edge evidence,
//! and root-cause selection, all anchored at a caller-chosen timestamp.

mod rca;
mod reconstruct;

pub use rca::select_candidates;
pub use reconstruct::{reconstruct, EvidenceMap};

use std::sync::Arc;

use tfte_events::{Event, GraphSnapshot, Node};
use tfte_scoring::EdgeEvidence;
use tfte_store::{Store, StoreError};
use thiserror::Error;

/// Reconstruction lookback: one hour of events before the anchor timestamp.
pub const RECONSTRUCT_WINDOW_MS: i64 = 3_600_000;
/// Per-reconstruction event cap; snapshot properties are defined relative to
/// this bounded window, not the full log.
pub const RECONSTRUCT_EVENT_CAP: usize = 10_000;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("evidence not found for edge {edge_source}->{target} at ts {ts}")]
    EvidenceNotFound {
        edge_source: String,
        target: String,
        ts: i64,
    },
}

pub type Result<T> = std::result::Result<T, EngineError>;

/// Stateless facade; every operation reads through the store handle. The
/// store type is monomorphized so reconstruction stays free of dynamic
/// dispatch.
pub struct Engine<S> {
    store: Arc<S>,
}

impl<S> Clone for Engine<S> {
    fn clone(&self) -> Self {
        Engine {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: Store> Engine<S> {
    pub fn new(store: Arc<S>) -> Self {
        Engine { store }
    }

    /// Durable batch ingest. Returns the number of events written.
    pub fn ingest_events(&self, events: &[Event]) -> Result<usize> {
        self.store.ingest_events(events)?;
        Ok(events.len())
    }

    pub fn get_events(
        &self,
        start_ts: i64,
        end_ts: i64,
        service_filter: Option<&str>,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Event>> {
        Ok(self
            .store
            .get_events(start_ts, end_ts, service_filter, limit, offset)?)
    }

    /// Reconstruct the dependency graph and its evidence map at `ts`, from
    /// the bounded lookback window.
    pub fn graph_with_evidence(&self, ts: i64) -> Result<(GraphSnapshot, EvidenceMap)> {
        let start_ts = (ts - RECONSTRUCT_WINDOW_MS).max(0);
        let events = self
            .store
            .get_events(start_ts, ts, None, RECONSTRUCT_EVENT_CAP, 0)?;
        Ok(reconstruct(ts, events))
    }

    pub fn graph_at(&self, ts: i64) -> Result<GraphSnapshot> {
        let (snapshot, _) = self.graph_with_evidence(ts)?;
        Ok(snapshot)
    }

    /// Evidence for one edge of the graph reconstructed at `ts`. The
    /// timestamp anchors the reconstruction and doubles as the failure time
    /// the scorer measures proximity against.
    pub fn edge_evidence(&self, source: &str, target: &str, ts: i64) -> Result<EdgeEvidence> {
        let (_, evidence) = self.graph_with_evidence(ts)?;
        evidence
            .get(&(source.to_string(), target.to_string()))
            .cloned()
            .ok_or_else(|| EngineError::EvidenceNotFound {
                edge_source: source.to_string(),
                target: target.to_string(),
                ts,
            })
    }

    /// Root-cause candidates at `ts`: unhealthy nodes whose failure is not
    /// well explained by any outgoing dependency edge.
    pub fn root_cause_at(&self, ts: i64) -> Result<Vec<Node>> {
        let snapshot = self.graph_at(ts)?;
        Ok(select_candidates(&snapshot))
    }
}
