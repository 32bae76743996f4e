use std::collections::BTreeMap;
use std::sync::Mutex;

use tfte_events::{Event, GraphSnapshot};

use crate::{Result, Store, StoreError};

#[derive(Default)]
struct Inner {
    events: BTreeMap<(i64, String), Event>,
    snapshots: BTreeMap<i64, Vec<u8>>,
}

/// In-memory store with the same contract as `SqliteStore`. Backs engine and
/// proof tests, and tooling that has no need for a durable log.
#[derive(Default)]
pub struct MemStore {
    inner: Mutex<Inner>,
}

impl MemStore {
    pub fn new() -> Self {
        MemStore::default()
    }
}

impl Store for MemStore {
    fn ingest_events(&self, events: &[Event]) -> Result<()> {
        let mut inner = self.inner.lock().map_err(|_| StoreError::LockPoisoned)?;
        for event in events {
            inner
                .events
                .insert((event.ts, event.id.clone()), event.clone());
        }
        Ok(())
    }

    fn get_events(
        &self,
        start_ts: i64,
        end_ts: i64,
        service_filter: Option<&str>,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Event>> {
        let inner = self.inner.lock().map_err(|_| StoreError::LockPoisoned)?;
        // (end_ts, "") sorts before every real key at end_ts, so the range is
        // end-exclusive like the SQL scan.
        let events = inner
            .events
            .range((start_ts, String::new())..(end_ts, String::new()))
            .map(|(_, event)| event)
            .filter(|event| service_filter.map_or(true, |s| event.service == s))
            .skip(offset)
            .take(limit)
            .cloned()
            .collect();
        Ok(events)
    }

    fn save_snapshot(&self, snapshot: &GraphSnapshot) -> Result<()> {
        let body = snapshot.encode()?;
        let mut inner = self.inner.lock().map_err(|_| StoreError::LockPoisoned)?;
        inner.snapshots.insert(snapshot.timestamp, body);
        Ok(())
    }

    fn load_snapshot(&self, ts: i64) -> Result<Option<GraphSnapshot>> {
        let inner = self.inner.lock().map_err(|_| StoreError::LockPoisoned)?;
        match inner.snapshots.range(..=ts).next_back() {
            Some((_, body)) => Ok(Some(GraphSnapshot::decode(body)?)),
            None => Ok(None),
        }
    }
}
