//! tfte-core: the fault-tracing engine server.
//!
//! Serves the fixed query surface over HTTP with permissive CORS. All state
//! lives in the event store; every request is independently served through
//! the engine facade.

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use clap::Parser;
use serde::{Deserialize, Serialize};
use tfte_engine::{Engine, EngineError};
use tfte_events::{GraphSnapshot, Node, WireEvent};
use tfte_proofs::{generate_proof, ProofError};
use tfte_scoring::EdgeEvidence;
use tfte_store::SqliteStore;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "tfte-core", about = "Temporal fault-tracing engine server", version)]
struct Args {
    /// Path to the SQLite event store.
    #[arg(long, default_value = "./data/tfte.db")]
    db: String,

    /// HTTP listen port.
    #[arg(long, default_value_t = 8081)]
    port: u16,
}

#[derive(Clone)]
struct AppState {
    engine: Engine<SqliteStore>,
}

type ApiResult<T> = Result<Json<T>, (StatusCode, String)>;

const DEFAULT_LIMIT: usize = 100;
const MAX_LIMIT: usize = 10_000;

#[derive(Serialize)]
struct IngestResponse {
    events_processed: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Deserialize)]
struct EventsQuery {
    #[serde(default)]
    start_ts: i64,
    #[serde(default)]
    end_ts: i64,
    service_filter: Option<String>,
    limit: Option<usize>,
    #[serde(default)]
    offset: usize,
}

#[derive(Serialize)]
struct EventsResponse {
    events: Vec<WireEvent>,
}

#[derive(Deserialize)]
struct TimestampQuery {
    #[serde(default)]
    timestamp: i64,
}

#[derive(Deserialize)]
struct EvidenceQuery {
    source: String,
    target: String,
    #[serde(default)]
    timestamp: i64,
}

#[derive(Serialize)]
struct RootCauseResponse {
    candidates: Vec<Node>,
}

#[derive(Deserialize)]
struct ProofQuery {
    #[serde(default)]
    root_event_id: String,
    #[serde(default)]
    timestamp: i64,
}

#[derive(Serialize)]
struct ProofResponse {
    root_event_id: String,
    sha256_hash: String,
    /// gzip-compressed tar archive, base64-encoded.
    bundle_tar_gz: String,
}

fn engine_error(err: EngineError) -> (StatusCode, String) {
    match &err {
        EngineError::EvidenceNotFound { .. } => (StatusCode::NOT_FOUND, err.to_string()),
        EngineError::Store(_) => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
    }
}

async fn ingest_events(
    State(state): State<AppState>,
    Json(batch): Json<Vec<WireEvent>>,
) -> (StatusCode, Json<IngestResponse>) {
    let events: Vec<_> = batch.into_iter().map(WireEvent::into_event).collect();
    match state.engine.ingest_events(&events) {
        Ok(count) => {
            tracing::info!(count, "ingested event batch");
            (
                StatusCode::OK,
                Json(IngestResponse {
                    events_processed: count,
                    error: None,
                }),
            )
        }
        Err(err) => {
            tracing::error!(error = %err, "ingest failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(IngestResponse {
                    events_processed: 0,
                    error: Some(err.to_string()),
                }),
            )
        }
    }
}

async fn get_events(
    State(state): State<AppState>,
    Query(query): Query<EventsQuery>,
) -> ApiResult<EventsResponse> {
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT);
    let events = state
        .engine
        .get_events(
            query.start_ts,
            query.end_ts,
            query.service_filter.as_deref(),
            limit,
            query.offset,
        )
        .map_err(engine_error)?;

    Ok(Json(EventsResponse {
        events: events.iter().map(WireEvent::from_event).collect(),
    }))
}

async fn get_graph(
    State(state): State<AppState>,
    Query(query): Query<TimestampQuery>,
) -> ApiResult<GraphSnapshot> {
    let snapshot = state.engine.graph_at(query.timestamp).map_err(engine_error)?;
    Ok(Json(snapshot))
}

async fn get_evidence(
    State(state): State<AppState>,
    Query(query): Query<EvidenceQuery>,
) -> ApiResult<EdgeEvidence> {
    let evidence = state
        .engine
        .edge_evidence(&query.source, &query.target, query.timestamp)
        .map_err(engine_error)?;
    Ok(Json(evidence))
}

async fn get_root_cause(
    State(state): State<AppState>,
    Query(query): Query<TimestampQuery>,
) -> ApiResult<RootCauseResponse> {
    let candidates = state
        .engine
        .root_cause_at(query.timestamp)
        .map_err(engine_error)?;
    Ok(Json(RootCauseResponse { candidates }))
}

async fn get_proof(
    State(state): State<AppState>,
    Query(query): Query<ProofQuery>,
) -> ApiResult<ProofResponse> {
    let (archive, hash) =
        generate_proof(&state.engine, &query.root_event_id, query.timestamp).map_err(
            |err| match err {
                ProofError::Engine(inner) => engine_error(inner),
                other => (StatusCode::INTERNAL_SERVER_ERROR, other.to_string()),
            },
        )?;

    Ok(Json(ProofResponse {
        root_event_id: query.root_event_id,
        sha256_hash: hash,
        bundle_tar_gz: BASE64.encode(archive),
    }))
}

fn init_tracing() {
    let filter = EnvFilter::from_default_env();
    let fmt_layer = tracing_subscriber::fmt::layer();

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .init();
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        tracing::info!("shutting down");
    }
}

#[tokio::main]
async fn main() {
    init_tracing();
    let args = Args::parse();

    if let Some(parent) = Path::new(&args.db).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).expect("failed to create db directory");
        }
    }

    let store = Arc::new(SqliteStore::open(&args.db).expect("failed to open event store"));
    let state = AppState {
        engine: Engine::new(store),
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/api/events", post(ingest_events).get(get_events))
        .route("/api/graph", get(get_graph))
        .route("/api/evidence", get(get_evidence))
        .route("/api/root-cause", get(get_root_cause))
        .route("/api/proof", get(get_proof))
        .layer(cors)
        .with_state(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], args.port));
    tracing::info!(%addr, db = %args.db, "tfte-core listening");

    let listener = TcpListener::bind(addr)
        .await
        .expect("failed to bind listener");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");
}
