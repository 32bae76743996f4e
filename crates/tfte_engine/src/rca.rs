//! Root-cause candidate selection.
//!
//! An unhealthy node whose best outgoing causal edge is weak is not well
//! explained by its dependencies, which makes it a likely origin of the
//! fault rather than a victim of one.

use std::collections::HashMap;

use tfte_events::{GraphSnapshot, Node};

/// Below this max-outgoing confidence an unhealthy node counts as unexplained.
const EXPLAINED_THRESHOLD: f64 = 0.5;

/// Select root-cause candidates from a scored snapshot, ordered worst health
/// first (DOWN before DEGRADED), id ascending on ties.
pub fn select_candidates(snapshot: &GraphSnapshot) -> Vec<Node> {
    let mut max_outgoing: HashMap<&str, f64> = HashMap::new();
    for edge in &snapshot.edges {
        let entry = max_outgoing.entry(edge.source.as_str()).or_insert(0.0);
        if edge.causal_confidence > *entry {
            *entry = edge.causal_confidence;
        }
    }

    let mut candidates: Vec<Node> = snapshot
        .nodes
        .iter()
        .filter(|node| node.health_status > 0)
        .filter(|node| {
            max_outgoing.get(node.id.as_str()).copied().unwrap_or(0.0) < EXPLAINED_THRESHOLD
        })
        .cloned()
        .collect();

    candidates.sort_by(|a, b| {
        b.health_status
            .cmp(&a.health_status)
            .then_with(|| a.id.cmp(&b.id))
    });

    candidates
}
