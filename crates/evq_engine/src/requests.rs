use evq_core::RequestRecord;

use crate::{Engine, EngineError};

/// Auxiliary request records. These go straight to the store and never
/// touch the queue.
impl Engine {
    pub async fn list_requests(&self) -> Result<Vec<RequestRecord>, EngineError> {
        self.blocking(|store| store.list_requests()).await
    }

    pub async fn create_request(&self, record: RequestRecord) -> Result<RequestRecord, EngineError> {
        let record = record.with_generated_id();
        let saved = record.clone();
        self.blocking(move |store| store.insert_request(&saved))
            .await?;
        tracing::info!("Created request record {}", record.id);
        Ok(record)
    }

    pub async fn update_request(
        &self,
        request_id: &str,
        record: RequestRecord,
    ) -> Result<Option<RequestRecord>, EngineError> {
        let id = request_id.to_string();
        self.blocking(move |store| store.update_request(&id, &record))
            .await
    }

    pub async fn requests_for_station(
        &self,
        station_id: &str,
    ) -> Result<Vec<RequestRecord>, EngineError> {
        let id = station_id.to_string();
        self.blocking(move |store| store.requests_for_station(&id))
            .await
    }
}
