use std::path::Path;
use std::sync::Mutex;

use rusqlite::{params, Connection, OptionalExtension};
use tfte_events::{Event, GraphSnapshot};

use crate::{Result, Store, StoreError};

/// SQLite-backed store. The composite `(ts, event_id)` primary key gives the
/// same scan order as the canonical `event:{ts:020}:{id}` byte layout, and a
/// single transaction per batch gives none-or-all visibility to concurrent
/// readers.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open or create the store at the given path and run migrations.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    /// In-memory store, used by tests.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS events (
                ts INTEGER NOT NULL,
                event_id TEXT NOT NULL,
                service TEXT NOT NULL,
                body BLOB NOT NULL,
                PRIMARY KEY (ts, event_id)
            );

            CREATE INDEX IF NOT EXISTS idx_events_service_ts ON events(service, ts);

            CREATE TABLE IF NOT EXISTS snapshots (
                snapshot_ts INTEGER PRIMARY KEY,
                body BLOB NOT NULL
            );
            "#,
        )?;
        Ok(SqliteStore {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StoreError::LockPoisoned)
    }
}

impl Store for SqliteStore {
    fn ingest_events(&self, events: &[Event]) -> Result<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT OR REPLACE INTO events (ts, event_id, service, body)
                 VALUES (?1, ?2, ?3, ?4)",
            )?;
            for event in events {
                let body = event.encode()?;
                stmt.execute(params![event.ts, event.id, event.service, body])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn get_events(
        &self,
        start_ts: i64,
        end_ts: i64,
        service_filter: Option<&str>,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Event>> {
        let conn = self.lock()?;

        let mut stmt = match service_filter {
            Some(_) => conn.prepare(
                "SELECT body FROM events
                 WHERE ts >= ?1 AND ts < ?2 AND service = ?3
                 ORDER BY ts ASC, event_id ASC
                 LIMIT ?4 OFFSET ?5",
            )?,
            None => conn.prepare(
                "SELECT body FROM events
                 WHERE ts >= ?1 AND ts < ?2
                 ORDER BY ts ASC, event_id ASC
                 LIMIT ?3 OFFSET ?4",
            )?,
        };

        let bodies: Vec<Vec<u8>> = match service_filter {
            Some(service) => stmt
                .query_map(
                    params![start_ts, end_ts, service, limit as i64, offset as i64],
                    |row| row.get(0),
                )?
                .collect::<std::result::Result<_, _>>()?,
            None => stmt
                .query_map(
                    params![start_ts, end_ts, limit as i64, offset as i64],
                    |row| row.get(0),
                )?
                .collect::<std::result::Result<_, _>>()?,
        };

        let mut events = Vec::with_capacity(bodies.len());
        for body in bodies {
            // A value that fails to decode aborts the query; the store never
            // hands back a partial or garbage result.
            events.push(Event::decode(&body)?);
        }
        Ok(events)
    }

    fn save_snapshot(&self, snapshot: &GraphSnapshot) -> Result<()> {
        let body = snapshot.encode()?;
        let conn = self.lock()?;
        conn.execute(
            "INSERT OR REPLACE INTO snapshots (snapshot_ts, body) VALUES (?1, ?2)",
            params![snapshot.timestamp, body],
        )?;
        Ok(())
    }

    fn load_snapshot(&self, ts: i64) -> Result<Option<GraphSnapshot>> {
        let conn = self.lock()?;
        let body: Option<Vec<u8>> = conn
            .query_row(
                "SELECT body FROM snapshots WHERE snapshot_ts <= ?1
                 ORDER BY snapshot_ts DESC LIMIT 1",
                params![ts],
                |row| row.get(0),
            )
            .optional()?;
        match body {
            Some(body) => Ok(Some(GraphSnapshot::decode(&body)?)),
            None => Ok(None),
        }
    }
}
