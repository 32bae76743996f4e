//! Graph snapshot model: nodes and edges synthesized from the event log.
//!
//! These types are derived in memory per query and never stored directly,
//! except for the optional snapshot cache which uses the same binary codec as
//! events. Sort order (nodes by id, edges by (source, target)) is an
//! invariant the proof bundle's determinism depends on.

use bincode::{Decode, Encode};
use serde::{Deserialize, Serialize};

use crate::Result;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Encode, Decode)]
pub struct Node {
    /// Service name; identity and display name in one.
    pub id: String,
    /// 0 UP, 1 DEGRADED, 2 DOWN. Defaults to 0 when no HEALTH_CHANGE was
    /// observed in the window.
    pub health_status: i32,
    /// Outbound error propagation accumulated during reconstruction.
    pub amplification_score: f64,
}

impl Node {
    pub fn new(id: &str) -> Self {
        Node {
            id: id.to_string(),
            health_status: 0,
            amplification_score: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Encode, Decode)]
pub struct Edge {
    pub source: String,
    pub target: String,
    pub is_active: bool,
    pub causal_confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Encode, Decode)]
pub struct GraphSnapshot {
    pub timestamp: i64,
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}

impl GraphSnapshot {
    /// Binary encoding for the snapshot cache.
    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(bincode::encode_to_vec(self, bincode::config::standard())?)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let (snapshot, _): (GraphSnapshot, usize) =
            bincode::decode_from_slice(bytes, bincode::config::standard())?;
        Ok(snapshot)
    }
}
