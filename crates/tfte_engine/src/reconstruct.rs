//! Event replay into a graph snapshot plus per-edge evidence.

use std::collections::{BTreeMap, HashMap};

use tfte_events::{Event, EventType, GraphSnapshot, Node, Payload};
use tfte_scoring::{score_edge, EdgeEvidence, ScoreConfig};

/// Evidence keyed by `(source, target)`. The `"source|target"` string form
/// only appears when evidence is exported to JSON.
pub type EvidenceMap = BTreeMap<(String, String), EdgeEvidence>;

struct EdgeState {
    is_active: bool,
    causal_confidence: f64,
}

/// Replay `events` up to and including `at_ts` into a snapshot and score
/// every edge.
///
/// Deterministic: the input multiset is sorted by `(ts, id)` first, nodes and
/// edges come out in ascending key order, and scoring iterates edges in that
/// same order. Reconstructing a shuffled copy of the same events yields a
/// byte-identical serialization.
pub fn reconstruct(at_ts: i64, mut events: Vec<Event>) -> (GraphSnapshot, EvidenceMap) {
    events.sort_by(|a, b| a.ts.cmp(&b.ts).then_with(|| a.id.cmp(&b.id)));

    let mut nodes: BTreeMap<String, Node> = BTreeMap::new();
    let mut edges: BTreeMap<(String, String), EdgeState> = BTreeMap::new();
    let mut interactions: BTreeMap<(String, String), Vec<Event>> = BTreeMap::new();
    // Trace ids of the most recent HEALTH_CHANGE that left a service
    // unhealthy; the scoring pass uses them as failure-trace context.
    let mut failure_traces: HashMap<String, Vec<String>> = HashMap::new();

    for event in &events {
        if event.ts > at_ts {
            break;
        }

        ensure_node(&mut nodes, &event.service);

        match event.decode_payload() {
            Payload::HealthChange(hc) => {
                let status = hc.new_status.as_i32();
                if let Some(node) = nodes.get_mut(&event.service) {
                    node.health_status = status;
                }
                if status > 0 {
                    failure_traces.insert(event.service.clone(), event.trace_ids.clone());
                } else {
                    failure_traces.remove(&event.service);
                }
            }
            Payload::RpcCall(rpc) => {
                record_interaction(
                    &mut nodes,
                    &mut edges,
                    &mut interactions,
                    event,
                    &rpc.dest_service,
                );
            }
            Payload::RpcError(rpc) => {
                record_interaction(
                    &mut nodes,
                    &mut edges,
                    &mut interactions,
                    event,
                    &rpc.dest_service,
                );
            }
            // Unknown types and malformed payloads still created the
            // emitting node above; they contribute nothing else.
            Payload::Raw(_) => {}
        }
    }

    let default_cfg = ScoreConfig::default();
    let mut evidence_map = EvidenceMap::new();

    for (key, edge) in edges.iter_mut() {
        let (source, target) = key;
        let target_health = nodes.get(target).map(|n| n.health_status).unwrap_or(0);

        // A healthy target cannot plausibly explain its caller's distress.
        let mut cfg = default_cfg;
        if target_health == 0 {
            cfg.base_score = 0.01;
        }

        let empty = Vec::new();
        let failure_trace_ids = if target_health > 0 {
            failure_traces.get(target).unwrap_or(&empty)
        } else {
            &empty
        };

        let edge_interactions = interactions.get(key).map(Vec::as_slice).unwrap_or(&[]);
        let mut evidence = score_edge(&cfg, at_ts, failure_trace_ids, edge_interactions);
        evidence.source_service = source.clone();
        evidence.target_service = target.clone();
        edge.causal_confidence = evidence.score;

        if target_health > 0 {
            let error_count = edge_interactions
                .iter()
                .filter(|e| e.event_type == EventType::RpcError)
                .count();
            if error_count > 0 {
                if let Some(source_node) = nodes.get_mut(source) {
                    source_node.amplification_score += error_count as f64;
                }
            }
        }

        evidence_map.insert(key.clone(), evidence);
    }

    let snapshot = GraphSnapshot {
        timestamp: at_ts,
        nodes: nodes.into_values().collect(),
        edges: edges
            .into_iter()
            .map(|((source, target), state)| tfte_events::Edge {
                source,
                target,
                is_active: state.is_active,
                causal_confidence: state.causal_confidence,
            })
            .collect(),
    };

    (snapshot, evidence_map)
}

fn ensure_node(nodes: &mut BTreeMap<String, Node>, service: &str) {
    if service.is_empty() {
        return;
    }
    nodes
        .entry(service.to_string())
        .or_insert_with(|| Node::new(service));
}

fn record_interaction(
    nodes: &mut BTreeMap<String, Node>,
    edges: &mut BTreeMap<(String, String), EdgeState>,
    interactions: &mut BTreeMap<(String, String), Vec<Event>>,
    event: &Event,
    dest_service: &str,
) {
    if dest_service.is_empty() {
        return;
    }
    ensure_node(nodes, dest_service);

    let key = (event.service.clone(), dest_service.to_string());
    interactions.entry(key.clone()).or_default().push(event.clone());
    edges.entry(key).or_insert(EdgeState {
        is_active: true,
        // Placeholder until the scoring pass runs.
        causal_confidence: 0.1,
    });
}
