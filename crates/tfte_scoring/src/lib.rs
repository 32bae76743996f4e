//! Causal-confidence scoring for dependency edges.
//!
//! `score_edge` is a pure function from a failure instant and the edge's
//! interaction events to an evidence breakdown. It never mutates its inputs
//! and is deterministic: the same interactions in any order produce the same
//! evidence, and the final score is rounded to six decimal places with
//! half-away-from-zero semantics so serialized output is stable across
//! platforms.

use serde::{Deserialize, Serialize};
use tfte_events::{Event, EventType};

/// Tunable scoring parameters. The process-wide default is an immutable
/// value; reconstruction copies it per edge when it needs to adjust the base.
#[derive(Debug, Clone, Copy)]
pub struct ScoreConfig {
    /// Scoring lookback from the failure instant, in milliseconds.
    pub window_size_ms: i64,
    pub base_score: f64,
    pub trace_bonus: f64,
    pub rpc_error_bonus: f64,
    pub time_proximity_bonus: f64,
    pub amplification_penalty: f64,
}

impl Default for ScoreConfig {
    fn default() -> Self {
        ScoreConfig {
            window_size_ms: 30_000,
            base_score: 0.1,
            trace_bonus: 0.7,
            rpc_error_bonus: 0.4,
            time_proximity_bonus: 0.3,
            amplification_penalty: 0.2,
        }
    }
}

/// Per-edge scoring breakdown: which components produced the final score and
/// which events fell inside the scoring window.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EdgeEvidence {
    pub source_service: String,
    pub target_service: String,
    pub base_score: f64,
    pub trace_bonus: f64,
    pub rpc_bonus: f64,
    pub time_proximity_bonus: f64,
    /// Final score, clamped to [0, 1] and rounded to 6 decimals.
    pub score: f64,
    pub contributing_event_ids: Vec<String>,
}

/// Score one edge given that its target failed at `failure_ts`.
///
/// `failure_trace_ids` are the correlation ids of the failure event itself;
/// an interaction sharing any of them earns the trace bonus. Callers without
/// failure-trace context pass an empty slice and the bonus stays zero.
pub fn score_edge(
    cfg: &ScoreConfig,
    failure_ts: i64,
    failure_trace_ids: &[String],
    interactions: &[Event],
) -> EdgeEvidence {
    let mut evidence = EdgeEvidence {
        base_score: cfg.base_score,
        ..EdgeEvidence::default()
    };

    let mut total = cfg.base_score;
    let mut has_trace_match = false;
    let mut has_rpc_error = false;
    let mut min_delta = cfg.window_size_ms;

    for event in interactions {
        if event.ts > failure_ts {
            continue;
        }
        let delta = failure_ts - event.ts;
        if delta > cfg.window_size_ms {
            continue;
        }

        evidence.contributing_event_ids.push(event.id.clone());

        if delta < min_delta {
            min_delta = delta;
        }

        if event.event_type == EventType::RpcError {
            has_rpc_error = true;
        }

        if !failure_trace_ids.is_empty()
            && event
                .trace_ids
                .iter()
                .any(|id| failure_trace_ids.contains(id))
        {
            has_trace_match = true;
        }
    }

    if has_trace_match {
        evidence.trace_bonus = cfg.trace_bonus;
        total += cfg.trace_bonus;
    }

    if has_rpc_error {
        evidence.rpc_bonus = cfg.rpc_error_bonus;
        total += cfg.rpc_error_bonus;
    }

    if !evidence.contributing_event_ids.is_empty() {
        let proximity_factor =
            ((cfg.window_size_ms - min_delta) as f64 / cfg.window_size_ms as f64).max(0.0);
        evidence.time_proximity_bonus = proximity_factor * cfg.time_proximity_bonus;
        total += evidence.time_proximity_bonus;
    }

    total = total.clamp(0.0, 1.0);

    // f64::round is half-away-from-zero, which is what keeps serialized
    // scores identical across platforms.
    evidence.score = (total * 1_000_000.0).round() / 1_000_000.0;

    evidence
}
