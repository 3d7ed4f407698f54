use crate::{StationStore, StoreError, StoreResult};
use evq_core::{RequestRecord, Station};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

#[derive(Default)]
struct Documents {
    stations: BTreeMap<String, Station>,
    requests: Vec<RequestRecord>,
}

/// Process-local store, used by tests and `DATABASE_URL=memory`.
#[derive(Default)]
pub struct MemoryStore {
    documents: Mutex<Documents>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn documents(&self) -> StoreResult<MutexGuard<'_, Documents>> {
        self.documents
            .lock()
            .map_err(|e| StoreError::Unavailable(e.to_string()))
    }
}

impl StationStore for MemoryStore {
    fn load_station(&self, station_id: &str) -> StoreResult<Option<Station>> {
        Ok(self.documents()?.stations.get(station_id).cloned())
    }

    fn save_station(&self, station: &Station) -> StoreResult<()> {
        self.documents()?
            .stations
            .insert(station.id.clone(), station.clone());
        Ok(())
    }

    fn list_stations(&self) -> StoreResult<Vec<Station>> {
        Ok(self.documents()?.stations.values().cloned().collect())
    }

    fn list_requests(&self) -> StoreResult<Vec<RequestRecord>> {
        Ok(self.documents()?.requests.clone())
    }

    fn insert_request(&self, record: &RequestRecord) -> StoreResult<()> {
        let mut documents = self.documents()?;
        match documents.requests.iter_mut().find(|r| r.id == record.id) {
            Some(existing) => *existing = record.clone(),
            None => documents.requests.push(record.clone()),
        }
        Ok(())
    }

    fn update_request(
        &self,
        request_id: &str,
        record: &RequestRecord,
    ) -> StoreResult<Option<RequestRecord>> {
        let mut documents = self.documents()?;
        let Some(existing) = documents.requests.iter_mut().find(|r| r.id == request_id) else {
            return Ok(None);
        };
        *existing = RequestRecord {
            id: request_id.to_string(),
            ..record.clone()
        };
        Ok(Some(existing.clone()))
    }

    fn requests_for_station(&self, station_id: &str) -> StoreResult<Vec<RequestRecord>> {
        Ok(self
            .documents()?
            .requests
            .iter()
            .filter(|r| r.station_id.as_deref() == Some(station_id))
            .cloned()
            .collect())
    }
}
