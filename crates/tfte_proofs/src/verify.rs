//! Offline bundle verification: the third-party side of the proof contract.

use std::collections::BTreeMap;
use std::io::Read;

use flate2::read::GzDecoder;

use crate::{sha256_hex, Manifest, ProofError, Result};

/// Outcome of checking a bundle's manifest against its actual contents.
#[derive(Debug, Clone)]
pub struct VerificationReport {
    pub root_event_id: String,
    pub timestamp: i64,
    pub files_verified: usize,
    pub mismatches: Vec<String>,
}

impl VerificationReport {
    pub fn is_valid(&self) -> bool {
        self.mismatches.is_empty()
    }
}

/// Extract the archive, recompute every content hash and compare with the
/// manifest. Needs nothing but the archive bytes.
pub fn verify_bundle(archive_bytes: &[u8]) -> Result<VerificationReport> {
    let mut archive = tar::Archive::new(GzDecoder::new(archive_bytes));

    let mut contents: BTreeMap<String, Vec<u8>> = BTreeMap::new();
    for entry in archive.entries()? {
        let mut entry = entry?;
        let name = entry
            .path()?
            .to_str()
            .map(str::to_string)
            .ok_or_else(|| ProofError::MalformedBundle("non-utf8 entry name".to_string()))?;
        let mut bytes = Vec::new();
        entry.read_to_end(&mut bytes)?;
        contents.insert(name, bytes);
    }

    let manifest_bytes = contents
        .get("manifest.json")
        .ok_or(ProofError::MissingManifest)?;
    let manifest: Manifest = serde_json::from_slice(manifest_bytes)
        .map_err(|e| ProofError::MalformedBundle(format!("manifest.json: {e}")))?;

    let mut report = VerificationReport {
        root_event_id: manifest.root_event_id.clone(),
        timestamp: manifest.timestamp,
        files_verified: 0,
        mismatches: Vec::new(),
    };

    for (name, expected) in &manifest.files {
        match contents.get(name) {
            Some(bytes) => {
                let actual = sha256_hex(bytes);
                if &actual == expected {
                    report.files_verified += 1;
                } else {
                    report
                        .mismatches
                        .push(format!("{name}: expected {expected}, got {actual}"));
                }
            }
            None => report.mismatches.push(format!("{name}: missing from archive")),
        }
    }

    Ok(report)
}
