//! Graph reconstruction scenarios driven end to end through the engine.

use std::sync::Arc;

use tfte_engine::{reconstruct, Engine, EngineError};
use tfte_events::{Event, EventType, Node};
use tfte_store::{MemStore, Store};

fn rpc_call(id: &str, ts: i64, source: &str, dest: &str) -> Event {
    Event {
        id: id.to_string(),
        ts,
        event_type: EventType::RpcCall,
        service: source.to_string(),
        host: String::new(),
        trace_ids: Vec::new(),
        payload: serde_json::to_vec(&serde_json::json!({"dest_service": dest})).unwrap(),
    }
}

fn rpc_error(id: &str, ts: i64, source: &str, dest: &str, trace_ids: &[&str]) -> Event {
    Event {
        id: id.to_string(),
        ts,
        event_type: EventType::RpcError,
        service: source.to_string(),
        host: String::new(),
        trace_ids: trace_ids.iter().map(|t| t.to_string()).collect(),
        payload: serde_json::to_vec(&serde_json::json!({
            "dest_service": dest,
            "error_code": "503"
        }))
        .unwrap(),
    }
}

fn health_change(id: &str, ts: i64, service: &str, status: &str, trace_ids: &[&str]) -> Event {
    Event {
        id: id.to_string(),
        ts,
        event_type: EventType::HealthChange,
        service: service.to_string(),
        host: String::new(),
        trace_ids: trace_ids.iter().map(|t| t.to_string()).collect(),
        payload: serde_json::to_vec(&serde_json::json!({"new_status": status})).unwrap(),
    }
}

fn find_node<'a>(nodes: &'a [Node], id: &str) -> &'a Node {
    nodes.iter().find(|n| n.id == id).expect("node present")
}

#[test]
fn simple_call_with_down_target() {
    let events = vec![
        rpc_call("1", 100, "A", "B"),
        health_change("2", 200, "B", "DOWN", &[]),
    ];

    let (snapshot, evidence) = reconstruct(300, events);

    assert_eq!(snapshot.nodes.len(), 2);
    assert_eq!(find_node(&snapshot.nodes, "A").health_status, 0);
    assert_eq!(find_node(&snapshot.nodes, "B").health_status, 2);

    assert_eq!(snapshot.edges.len(), 1);
    let edge = &snapshot.edges[0];
    assert_eq!((edge.source.as_str(), edge.target.as_str()), ("A", "B"));
    assert!(edge.is_active);
    assert!(edge.causal_confidence >= 0.1);

    let ev = evidence
        .get(&("A".to_string(), "B".to_string()))
        .expect("evidence for A->B");
    assert_eq!(ev.score, edge.causal_confidence);
    assert_eq!(ev.contributing_event_ids, vec!["1"]);
}

#[test]
fn chain_root_cause_is_the_leaf() {
    let store = Arc::new(MemStore::new());
    store
        .ingest_events(&[
            rpc_call("1", 100, "A", "B"),
            rpc_call("2", 150, "B", "C"),
            health_change("3", 200, "C", "DOWN", &[]),
        ])
        .expect("ingest");

    let engine = Engine::new(store);
    let candidates = engine.root_cause_at(250).expect("root cause");

    let ids: Vec<&str> = candidates.iter().map(|n| n.id.as_str()).collect();
    assert_eq!(ids, vec!["C"]);
}

#[test]
fn reconstruction_is_order_independent() {
    let events = vec![
        rpc_call("1", 100, "A", "B"),
        rpc_error("2", 150, "A", "B", &["t1"]),
        rpc_call("3", 150, "B", "C"),
        health_change("4", 200, "B", "DEGRADED", &["t1"]),
        health_change("5", 220, "C", "DOWN", &[]),
        rpc_call("6", 230, "D", "B"),
    ];

    let mut shuffled = events.clone();
    shuffled.reverse();
    shuffled.swap(0, 3);
    shuffled.swap(1, 4);

    let (snapshot_a, evidence_a) = reconstruct(300, events);
    let (snapshot_b, evidence_b) = reconstruct(300, shuffled);

    assert_eq!(snapshot_a, snapshot_b);
    assert_eq!(evidence_a, evidence_b);

    // The canonical serializations match byte for byte.
    assert_eq!(
        serde_json::to_vec(&snapshot_a).unwrap(),
        serde_json::to_vec(&snapshot_b).unwrap()
    );
}

#[test]
fn events_after_anchor_are_dropped() {
    let events = vec![
        rpc_call("1", 100, "A", "B"),
        health_change("2", 400, "B", "DOWN", &[]),
    ];

    let (snapshot, _) = reconstruct(300, events);
    // The late health change is invisible at ts=300.
    assert_eq!(find_node(&snapshot.nodes, "B").health_status, 0);
}

#[test]
fn healthy_target_gets_suppressed_base_score() {
    let down_target = vec![
        rpc_call("1", 299_000, "A", "B"),
        health_change("2", 299_500, "B", "DOWN", &[]),
    ];
    let healthy_target = vec![rpc_call("1", 299_000, "A", "B")];

    let (_, unhealthy_evidence) = reconstruct(300_000, down_target);
    let (_, healthy_evidence) = reconstruct(300_000, healthy_target);

    let key = ("A".to_string(), "B".to_string());
    let unhealthy_score = unhealthy_evidence[&key].score;
    let healthy_score = healthy_evidence[&key].score;

    assert_eq!(unhealthy_evidence[&key].base_score, 0.1);
    assert_eq!(healthy_evidence[&key].base_score, 0.01);
    assert!(healthy_score < unhealthy_score);
}

#[test]
fn trace_match_through_failure_event() {
    // The degraded target's health change carries the same trace id as the
    // error on the inbound edge, so the edge earns the trace bonus.
    let events = vec![
        rpc_error("1", 299_000, "A", "B", &["trace-1"]),
        health_change("2", 299_500, "B", "DEGRADED", &["trace-1"]),
    ];

    let (_, evidence) = reconstruct(300_000, events);
    let ev = &evidence[&("A".to_string(), "B".to_string())];
    assert_eq!(ev.trace_bonus, 0.7);
    assert_eq!(ev.score, 1.0);
}

#[test]
fn amplification_counts_errors_toward_unhealthy_targets() {
    let base = vec![
        rpc_error("1", 299_000, "A", "B", &[]),
        health_change("2", 299_500, "B", "DOWN", &[]),
    ];
    let with_extra_error = {
        let mut events = base.clone();
        events.push(rpc_error("3", 299_100, "A", "B", &[]));
        events
    };

    let (snapshot_base, _) = reconstruct(300_000, base);
    let (snapshot_more, _) = reconstruct(300_000, with_extra_error);

    let amp_base = find_node(&snapshot_base.nodes, "A").amplification_score;
    let amp_more = find_node(&snapshot_more.nodes, "A").amplification_score;

    assert_eq!(amp_base, 1.0);
    assert_eq!(amp_more, 2.0);
    assert!(amp_more >= amp_base);
}

#[test]
fn empty_dest_service_creates_no_edge() {
    let events = vec![rpc_call("1", 100, "A", "")];
    let (snapshot, evidence) = reconstruct(300, events);

    assert_eq!(snapshot.nodes.len(), 1);
    assert!(snapshot.edges.is_empty());
    assert!(evidence.is_empty());
}

#[test]
fn unknown_event_types_only_create_their_node() {
    let mut event = rpc_call("1", 100, "worker", "B");
    event.event_type = EventType::Unknown(9);

    let (snapshot, _) = reconstruct(300, vec![event]);
    assert_eq!(snapshot.nodes.len(), 1);
    assert_eq!(snapshot.nodes[0].id, "worker");
    assert!(snapshot.edges.is_empty());
}

#[test]
fn missing_edge_evidence_is_not_found() {
    let store = Arc::new(MemStore::new());
    store
        .ingest_events(&[rpc_call("1", 100, "A", "B")])
        .expect("ingest");

    let engine = Engine::new(store);

    let ok = engine.edge_evidence("A", "B", 300).expect("edge exists");
    assert_eq!(ok.source_service, "A");

    let missing = engine.edge_evidence("B", "A", 300);
    assert!(matches!(
        missing,
        Err(EngineError::EvidenceNotFound { .. })
    ));
}

#[test]
fn last_health_change_wins() {
    let events = vec![
        health_change("1", 100, "B", "DOWN", &[]),
        health_change("2", 200, "B", "UP", &[]),
    ];
    let (snapshot, _) = reconstruct(300, events);
    assert_eq!(find_node(&snapshot.nodes, "B").health_status, 0);
}
