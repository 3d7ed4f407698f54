use crate::{StationStore, StoreError, StoreResult};
use evq_core::{RequestRecord, Station};
use rusqlite::{Connection, OptionalExtension, params};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

const BUSY_TIMEOUT: Duration = Duration::from_millis(5_000);

/// SQLite-backed document store.
///
/// Station documents and request records are stored as JSON text, one row
/// per id.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open the database named by a connection string.
    ///
    /// Accepts `sqlite://path/to/file.db`, a bare file path, or `:memory:`.
    pub fn open(url: &str) -> StoreResult<Self> {
        let path = url.strip_prefix("sqlite://").unwrap_or(url);
        if path.trim().is_empty() {
            return Err(StoreError::Unavailable(format!(
                "invalid database url '{}'",
                url
            )));
        }
        let conn = Connection::open(path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS stations (
                id TEXT PRIMARY KEY,
                document TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS requests (
                id TEXT PRIMARY KEY,
                station_id TEXT,
                document TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_requests_station ON requests (station_id);
            "#,
        )?;
        tracing::info!("Opened station database at {}", path);
        Ok(SqliteStore {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn get_conn(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| StoreError::Unavailable(e.to_string()))
    }

    fn query_records(
        conn: &Connection,
        sql: &str,
        args: impl rusqlite::Params,
    ) -> StoreResult<Vec<RequestRecord>> {
        let mut stmt = conn.prepare(sql)?;
        let documents = stmt
            .query_map(args, |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        documents
            .iter()
            .map(|document| serde_json::from_str(document).map_err(StoreError::from))
            .collect()
    }
}

impl StationStore for SqliteStore {
    fn load_station(&self, station_id: &str) -> StoreResult<Option<Station>> {
        let conn = self.get_conn()?;
        let document: Option<String> = conn
            .query_row(
                "SELECT document FROM stations WHERE id = ?1",
                params![station_id],
                |row| row.get(0),
            )
            .optional()?;

        match document {
            Some(document) => {
                let mut station: Station = serde_json::from_str(&document)?;
                station.id = station_id.to_string();
                Ok(Some(station))
            }
            None => Ok(None),
        }
    }

    fn save_station(&self, station: &Station) -> StoreResult<()> {
        let document = serde_json::to_string(station)?;
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO stations (id, document) VALUES (?1, ?2)
            ON CONFLICT(id) DO UPDATE SET document = excluded.document
            "#,
            params![station.id, document],
        )?;
        tracing::debug!("Saved station {}", station.id);
        Ok(())
    }

    fn list_stations(&self) -> StoreResult<Vec<Station>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare("SELECT id, document FROM stations ORDER BY id")?;
        let rows = stmt
            .query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(id, document)| -> StoreResult<Station> {
                let mut station: Station = serde_json::from_str(&document)?;
                station.id = id;
                Ok(station)
            })
            .collect()
    }

    fn list_requests(&self) -> StoreResult<Vec<RequestRecord>> {
        let conn = self.get_conn()?;
        Self::query_records(&conn, "SELECT document FROM requests ORDER BY rowid", [])
    }

    fn insert_request(&self, record: &RequestRecord) -> StoreResult<()> {
        let document = serde_json::to_string(record)?;
        let conn = self.get_conn()?;
        conn.execute(
            "INSERT OR REPLACE INTO requests (id, station_id, document) VALUES (?1, ?2, ?3)",
            params![record.id, record.station_id, document],
        )?;
        Ok(())
    }

    fn update_request(
        &self,
        request_id: &str,
        record: &RequestRecord,
    ) -> StoreResult<Option<RequestRecord>> {
        let mut updated = record.clone();
        updated.id = request_id.to_string();
        let document = serde_json::to_string(&updated)?;

        let conn = self.get_conn()?;
        let changed = conn.execute(
            "UPDATE requests SET station_id = ?2, document = ?3 WHERE id = ?1",
            params![request_id, updated.station_id, document],
        )?;
        Ok((changed > 0).then_some(updated))
    }

    fn requests_for_station(&self, station_id: &str) -> StoreResult<Vec<RequestRecord>> {
        let conn = self.get_conn()?;
        Self::query_records(
            &conn,
            "SELECT document FROM requests WHERE station_id = ?1 ORDER BY rowid",
            params![station_id],
        )
    }
}
