//! Document storage for station state and auxiliary request records.
//!
//! Every station is kept as one JSON document keyed by its id. Writes are
//! plain upserts: the last writer wins.

mod memory;
mod sqlite;

pub use crate::memory::MemoryStore;
pub use crate::sqlite::SqliteStore;

use evq_core::{RequestRecord, Station};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Persistence unavailable: {0}")]
    Unavailable(String),
    #[error("Persistence call timed out after {0:?}")]
    Timeout(Duration),
    #[error("Could not (de)serialize document: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Blocking access to the backing document store.
pub trait StationStore: Send + Sync {
    fn load_station(&self, station_id: &str) -> StoreResult<Option<Station>>;

    /// Insert or replace the document under `station.id`.
    fn save_station(&self, station: &Station) -> StoreResult<()>;

    fn list_stations(&self) -> StoreResult<Vec<Station>>;

    fn list_requests(&self) -> StoreResult<Vec<RequestRecord>>;

    fn insert_request(&self, record: &RequestRecord) -> StoreResult<()>;

    /// Replace an existing record, returning `None` if `request_id` is unknown.
    fn update_request(
        &self,
        request_id: &str,
        record: &RequestRecord,
    ) -> StoreResult<Option<RequestRecord>>;

    fn requests_for_station(&self, station_id: &str) -> StoreResult<Vec<RequestRecord>>;
}
