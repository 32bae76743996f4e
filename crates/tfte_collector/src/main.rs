//! tfte-collector: batch-ingest NDJSON event exports into the store.
//!
//! One JSON object per line in the wire shape; malformed lines and unknown
//! event-type names are logged and skipped, the rest of the file continues.
//! Events are written in batches of 100.

use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;
use std::process::ExitCode;

use clap::Parser;
use tfte_events::{Event, WireEvent};
use tfte_store::{SqliteStore, Store};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

const BATCH_SIZE: usize = 100;

#[derive(Parser)]
#[command(
    name = "tfte-collector",
    about = "Ingest NDJSON telemetry events into the fault-tracing store",
    version
)]
struct Args {
    /// Path to the SQLite event store.
    #[arg(long, default_value = "./data/tfte.db")]
    db: String,

    /// NDJSON file to ingest, one event per line.
    #[arg(long)]
    file: String,
}

fn run(args: &Args) -> Result<usize, String> {
    if let Some(parent) = Path::new(&args.db).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .map_err(|e| format!("failed to create db directory: {e}"))?;
        }
    }

    let store =
        SqliteStore::open(&args.db).map_err(|e| format!("failed to open store: {e}"))?;
    let file = File::open(&args.file).map_err(|e| format!("failed to open input file: {e}"))?;
    let reader = BufReader::new(file);

    let mut batch: Vec<Event> = Vec::with_capacity(BATCH_SIZE);
    let mut count = 0usize;
    let mut skipped = 0usize;

    for (line_no, line) in reader.lines().enumerate() {
        let line = line.map_err(|e| format!("failed to read input: {e}"))?;
        if line.trim().is_empty() {
            continue;
        }

        let wire: WireEvent = match serde_json::from_str(&line) {
            Ok(wire) => wire,
            Err(err) => {
                tracing::warn!(line = line_no + 1, error = %err, "skipping invalid line");
                skipped += 1;
                continue;
            }
        };

        batch.push(wire.into_event());
        if batch.len() >= BATCH_SIZE {
            store
                .ingest_events(&batch)
                .map_err(|e| format!("failed to ingest batch: {e}"))?;
            count += batch.len();
            batch.clear();
            print!("Ingested {count} events...\r");
            std::io::stdout().flush().ok();
        }
    }

    if !batch.is_empty() {
        store
            .ingest_events(&batch)
            .map_err(|e| format!("failed to ingest batch: {e}"))?;
        count += batch.len();
    }

    if skipped > 0 {
        tracing::warn!(skipped, "some lines were skipped");
    }
    Ok(count)
}

fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    match run(&args) {
        Ok(count) => {
            println!("\nDone. Total events ingested: {count}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            tracing::error!(error = %err, "collector failed");
            ExitCode::FAILURE
        }
    }
}
