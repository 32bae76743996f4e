//! Proof bundle round-trip: generate, extract, check the manifest, verify,
//! and regenerate byte-identically.

use std::collections::BTreeMap;
use std::io::Read;
use std::sync::Arc;

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use sha2::{Digest, Sha256};
use tfte_engine::Engine;
use tfte_events::{Event, EventType};
use tfte_proofs::{generate_proof, verify_bundle, Manifest, BUNDLE_FILES};
use tfte_store::{MemStore, Store};

fn seeded_engine() -> Engine<MemStore> {
    let store = Arc::new(MemStore::new());
    store
        .ingest_events(&[
            Event {
                id: "1".to_string(),
                ts: 100,
                event_type: EventType::RpcCall,
                service: "A".to_string(),
                host: String::new(),
                trace_ids: Vec::new(),
                payload: serde_json::to_vec(&serde_json::json!({"dest_service": "B"})).unwrap(),
            },
            Event {
                id: "2".to_string(),
                ts: 200,
                event_type: EventType::HealthChange,
                service: "B".to_string(),
                host: String::new(),
                trace_ids: Vec::new(),
                payload: serde_json::to_vec(&serde_json::json!({"new_status": "DOWN"})).unwrap(),
            },
        ])
        .expect("ingest");
    Engine::new(store)
}

fn extract(bytes: &[u8]) -> (Vec<String>, BTreeMap<String, Vec<u8>>) {
    let mut archive = tar::Archive::new(GzDecoder::new(bytes));
    let mut names = Vec::new();
    let mut contents = BTreeMap::new();
    for entry in archive.entries().expect("entries") {
        let mut entry = entry.expect("entry");
        let name = entry.path().unwrap().to_str().unwrap().to_string();
        let mut data = Vec::new();
        entry.read_to_end(&mut data).expect("read entry");
        names.push(name.clone());
        contents.insert(name, data);
    }
    (names, contents)
}

#[test]
fn bundle_has_fixed_entry_order_and_matching_hashes() {
    let engine = seeded_engine();
    let (bytes, hash) = generate_proof(&engine, "2", 300).expect("generate");

    assert!(!bytes.is_empty());
    assert_eq!(hash.len(), 64);

    let (names, contents) = extract(&bytes);
    assert_eq!(names, BUNDLE_FILES);

    let manifest: Manifest =
        serde_json::from_slice(&contents["manifest.json"]).expect("manifest");
    assert_eq!(manifest.root_event_id, "2");
    assert_eq!(manifest.timestamp, 300);

    for (name, expected) in &manifest.files {
        let mut hasher = Sha256::new();
        hasher.update(&contents[name]);
        assert_eq!(&hex::encode(hasher.finalize()), expected, "hash of {name}");
    }

    // The archive hash is the hash of the returned bytes.
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    assert_eq!(hex::encode(hasher.finalize()), hash);
}

#[test]
fn bundle_events_cover_the_window() {
    let engine = seeded_engine();
    let (bytes, _) = generate_proof(&engine, "2", 300).expect("generate");
    let (_, contents) = extract(&bytes);

    let events: serde_json::Value =
        serde_json::from_slice(&contents["events.json"]).expect("events");
    assert_eq!(events.as_array().expect("array").len(), 2);

    let snapshot: serde_json::Value =
        serde_json::from_slice(&contents["snapshot.json"]).expect("snapshot");
    assert_eq!(snapshot["nodes"].as_array().unwrap().len(), 2);

    let evidence: serde_json::Value =
        serde_json::from_slice(&contents["evidence.json"]).expect("evidence");
    assert!(evidence.get("A|B").is_some());
}

#[test]
fn regeneration_is_byte_identical() {
    let engine = seeded_engine();
    let (first_bytes, first_hash) = generate_proof(&engine, "2", 300).expect("first");
    let (second_bytes, second_hash) = generate_proof(&engine, "2", 300).expect("second");

    assert_eq!(first_bytes, second_bytes);
    assert_eq!(first_hash, second_hash);
}

#[test]
fn verifier_accepts_a_fresh_bundle() {
    let engine = seeded_engine();
    let (bytes, _) = generate_proof(&engine, "2", 300).expect("generate");

    let report = verify_bundle(&bytes).expect("verify");
    assert!(report.is_valid());
    assert_eq!(report.files_verified, 3);
    assert_eq!(report.root_event_id, "2");
}

#[test]
fn verifier_flags_tampered_content() {
    let engine = seeded_engine();
    let (bytes, _) = generate_proof(&engine, "2", 300).expect("generate");
    let (names, mut contents) = extract(&bytes);

    // Repack with a doctored snapshot while keeping the untouched manifest.
    contents.insert("snapshot.json".to_string(), b"{}".to_vec());
    let gz = GzEncoder::new(Vec::new(), Compression::default());
    let mut builder = tar::Builder::new(gz);
    for name in &names {
        let data = &contents[name];
        let mut header = tar::Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(0o600);
        header.set_mtime(0);
        header.set_cksum();
        builder.append_data(&mut header, name, data.as_slice()).unwrap();
    }
    let tampered = builder.into_inner().unwrap().finish().unwrap();

    let report = verify_bundle(&tampered).expect("verify");
    assert!(!report.is_valid());
    assert!(report
        .mismatches
        .iter()
        .any(|m| m.contains("snapshot.json")));
}
