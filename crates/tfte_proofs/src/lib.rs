//! Reproducible proof bundles.
//!
//! A bundle binds a graph snapshot, its edge evidence, and the raw events of
//! the reconstruction window into one gzip-compressed tar archive with a
//! SHA-256 manifest. Everything about the archive is pinned: canonical JSON
//! (sorted keys, two-space indent), a fixed entry order, mode 0600 and mtime
//! zero on every entry. Generating the same bundle twice over the same store
//! state yields identical bytes and an identical hash.

mod verify;

pub use verify::{verify_bundle, VerificationReport};

use std::collections::BTreeMap;
use std::io::Write;

use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tfte_engine::{Engine, EngineError, RECONSTRUCT_EVENT_CAP, RECONSTRUCT_WINDOW_MS};
use tfte_events::WireEvent;
use tfte_scoring::EdgeEvidence;
use tfte_store::Store;
use thiserror::Error;

/// Fixed archive entry order; the manifest always comes last.
pub const BUNDLE_FILES: [&str; 4] = [
    "snapshot.json",
    "evidence.json",
    "events.json",
    "manifest.json",
];

#[derive(Debug, Error)]
pub enum ProofError {
    #[error("engine error: {0}")]
    Engine(#[from] EngineError),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("archive error: {0}")]
    Io(#[from] std::io::Error),
    #[error("bundle has no manifest.json")]
    MissingManifest,
    #[error("malformed bundle: {0}")]
    MalformedBundle(String),
}

pub type Result<T> = std::result::Result<T, ProofError>;

/// Content manifest binding the bundle together: each file name maps to the
/// lowercase hex SHA-256 of its bytes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    pub root_event_id: String,
    pub timestamp: i64,
    pub files: BTreeMap<String, String>,
}

/// Generate the proof bundle for a root-cause determination anchored at
/// `at_ts`. Returns the archive bytes and their SHA-256 hex digest.
pub fn generate_proof<S: Store>(
    engine: &Engine<S>,
    root_event_id: &str,
    at_ts: i64,
) -> Result<(Vec<u8>, String)> {
    let (snapshot, evidence) = engine.graph_with_evidence(at_ts)?;

    let start_ts = (at_ts - RECONSTRUCT_WINDOW_MS).max(0);
    let events = engine.get_events(start_ts, at_ts, None, RECONSTRUCT_EVENT_CAP, 0)?;

    // Composite keys stringify only here, at the export boundary.
    let evidence_export: BTreeMap<String, &EdgeEvidence> = evidence
        .iter()
        .map(|((source, target), ev)| (format!("{source}|{target}"), ev))
        .collect();
    let events_export: Vec<WireEvent> = events.iter().map(WireEvent::from_event).collect();

    let snapshot_bytes = canonical_json(&snapshot)?;
    let evidence_bytes = canonical_json(&evidence_export)?;
    let events_bytes = canonical_json(&events_export)?;

    let mut manifest = Manifest {
        root_event_id: root_event_id.to_string(),
        timestamp: at_ts,
        files: BTreeMap::new(),
    };
    for (name, bytes) in [
        ("snapshot.json", &snapshot_bytes),
        ("evidence.json", &evidence_bytes),
        ("events.json", &events_bytes),
    ] {
        manifest.files.insert(name.to_string(), sha256_hex(bytes));
    }
    let manifest_bytes = canonical_json(&manifest)?;

    let gz = GzEncoder::new(Vec::new(), Compression::default());
    let mut archive = tar::Builder::new(gz);
    for (name, bytes) in [
        ("snapshot.json", &snapshot_bytes),
        ("evidence.json", &evidence_bytes),
        ("events.json", &events_bytes),
        ("manifest.json", &manifest_bytes),
    ] {
        append_entry(&mut archive, name, bytes)?;
    }
    let archive_bytes = archive.into_inner()?.finish()?;

    let bundle_hash = sha256_hex(&archive_bytes);
    Ok((archive_bytes, bundle_hash))
}

fn append_entry<W: Write>(
    archive: &mut tar::Builder<W>,
    name: &str,
    bytes: &[u8],
) -> std::io::Result<()> {
    let mut header = tar::Header::new_gnu();
    header.set_size(bytes.len() as u64);
    header.set_mode(0o600);
    // mtime pinned to epoch; archive determinism is a contract.
    header.set_mtime(0);
    header.set_cksum();
    archive.append_data(&mut header, name, bytes)
}

pub(crate) fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Serialize with recursively sorted object keys and two-space indentation.
fn canonical_json<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    let value = serde_json::to_value(value)?;
    let sorted = sort_keys(&value);
    Ok(serde_json::to_vec_pretty(&sorted)?)
}

fn sort_keys(value: &serde_json::Value) -> serde_json::Value {
    match value {
        serde_json::Value::Object(map) => {
            let mut entries: Vec<_> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            let mut out = serde_json::Map::new();
            for (key, inner) in entries {
                out.insert(key.clone(), sort_keys(inner));
            }
            serde_json::Value::Object(out)
        }
        serde_json::Value::Array(items) => {
            serde_json::Value::Array(items.iter().map(sort_keys).collect())
        }
        _ => value.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_json_sorts_keys_recursively() {
        let scrambled = serde_json::json!({
            "zebra": 1,
            "apple": {"z": 1, "a": 2},
            "list": [{"b": 1, "a": 2}]
        });
        let reordered = serde_json::json!({
            "apple": {"a": 2, "z": 1},
            "list": [{"a": 2, "b": 1}],
            "zebra": 1
        });

        assert_eq!(
            canonical_json(&scrambled).unwrap(),
            canonical_json(&reordered).unwrap()
        );
    }

    #[test]
    fn canonical_json_uses_two_space_indent() {
        let bytes = canonical_json(&serde_json::json!({"k": 1})).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert_eq!(text, "{\n  \"k\": 1\n}");
    }
}
