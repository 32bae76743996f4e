//! Range-scan properties of the durable store: order stability, pagination
//! equivalence and filter commutativity over a few hundred events on disk.

use tfte_events::{Event, EventType};
use tfte_store::{SqliteStore, Store};

fn event(id: &str, ts: i64, service: &str) -> Event {
    Event {
        id: id.to_string(),
        ts,
        event_type: EventType::RpcCall,
        service: service.to_string(),
        host: String::new(),
        trace_ids: Vec::new(),
        payload: serde_json::to_vec(&serde_json::json!({"dest_service": "sink"})).unwrap(),
    }
}

fn seeded_store() -> (tempfile::TempDir, SqliteStore) {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = SqliteStore::open(dir.path().join("tfte.db")).expect("open");

    // 250 events over ts in [1..250], ingested out of order in batches.
    let services = ["web-frontend", "api-gateway", "product-service"];
    let mut batch = Vec::new();
    for ts in (1..=250).rev() {
        batch.push(event(
            &format!("evt-{ts:04}"),
            ts,
            services[(ts % 3) as usize],
        ));
        if batch.len() == 100 {
            store.ingest_events(&batch).expect("ingest");
            batch.clear();
        }
    }
    store.ingest_events(&batch).expect("ingest");

    (dir, store)
}

#[test]
fn scan_is_sorted_by_ts_then_id() {
    let (_dir, store) = seeded_store();
    let events = store.get_events(0, 1000, None, 10_000, 0).expect("query");
    assert_eq!(events.len(), 250);
    for pair in events.windows(2) {
        assert!((pair[0].ts, &pair[0].id) < (pair[1].ts, &pair[1].id));
    }
}

#[test]
fn pagination_pages_concatenate() {
    let (_dir, store) = seeded_store();

    let first = store.get_events(0, 1000, None, 100, 0).expect("page 1");
    let second = store.get_events(0, 1000, None, 100, 100).expect("page 2");
    let both = store.get_events(0, 1000, None, 200, 0).expect("combined");

    let mut concatenated = first;
    concatenated.extend(second);
    assert_eq!(concatenated, both);
}

#[test]
fn offset_window_returns_middle_slice() {
    let (_dir, store) = seeded_store();

    let events = store.get_events(0, 1000, None, 100, 100).expect("query");
    assert_eq!(events.len(), 100);
    assert_eq!(events.first().unwrap().ts, 101);
    assert_eq!(events.last().unwrap().ts, 200);
}

#[test]
fn filter_commutes_with_client_side_filtering() {
    let (_dir, store) = seeded_store();

    let filtered = store
        .get_events(0, 1000, Some("api-gateway"), 10_000, 0)
        .expect("filtered");
    let client_side: Vec<_> = store
        .get_events(0, 1000, None, 10_000, 0)
        .expect("unfiltered")
        .into_iter()
        .filter(|e| e.service == "api-gateway")
        .collect();

    assert_eq!(filtered, client_side);
}
