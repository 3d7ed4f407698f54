use evq_core::Station;
use evq_store::{StationStore, StoreError, StoreResult};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

pub(crate) enum WriteCommand {
    Save(Station),
    /// Save and report the outcome to the caller.
    SaveAndReply(Station, oneshot::Sender<StoreResult<()>>),
    Flush(oneshot::Sender<()>),
}

/// Run a blocking store call on the blocking pool, bounded by `timeout`.
pub(crate) async fn run_blocking<T, F>(
    store: Arc<dyn StationStore>,
    timeout: Duration,
    call: F,
) -> StoreResult<T>
where
    T: Send + 'static,
    F: FnOnce(&dyn StationStore) -> StoreResult<T> + Send + 'static,
{
    let task = tokio::task::spawn_blocking(move || call(store.as_ref()));
    match tokio::time::timeout(timeout, task).await {
        Ok(Ok(result)) => result,
        Ok(Err(join_error)) => Err(StoreError::Unavailable(join_error.to_string())),
        Err(_) => Err(StoreError::Timeout(timeout)),
    }
}

/// Save one station under `timeout`.
///
/// A save that times out keeps running on the blocking pool; its handle is
/// returned so the writer can wait for it before the next write.
async fn save_station(
    store: Arc<dyn StationStore>,
    timeout: Duration,
    station: Station,
) -> (StoreResult<()>, Option<JoinHandle<StoreResult<()>>>) {
    let mut task = tokio::task::spawn_blocking(move || store.save_station(&station));
    match tokio::time::timeout(timeout, &mut task).await {
        Ok(Ok(result)) => (result, None),
        Ok(Err(join_error)) => (Err(StoreError::Unavailable(join_error.to_string())), None),
        Err(_) => (Err(StoreError::Timeout(timeout)), Some(task)),
    }
}

fn record_outcome(warning: &Mutex<Option<String>>, station_id: &str, result: &StoreResult<()>) {
    let mut current = match warning.lock() {
        Ok(current) => current,
        Err(poisoned) => poisoned.into_inner(),
    };
    match result {
        Ok(()) => {
            tracing::debug!("Persisted station {}", station_id);
            *current = None;
        }
        Err(error) => {
            tracing::warn!("Could not persist station {}: {}", station_id, error);
            *current = Some(error.to_string());
        }
    }
}

/// Drain station writes one at a time so saves reach the store in order.
///
/// A failed write is logged and kept as the current warning; the next
/// successful write clears it. A timed-out save is still waited for before
/// the next command runs, so it can never land after a newer document.
pub(crate) async fn run_writer(
    store: Arc<dyn StationStore>,
    timeout: Duration,
    warning: Arc<Mutex<Option<String>>>,
    mut commands: mpsc::UnboundedReceiver<WriteCommand>,
) {
    while let Some(command) = commands.recv().await {
        let (station, reply) = match command {
            WriteCommand::Save(station) => (station, None),
            WriteCommand::SaveAndReply(station, reply) => (station, Some(reply)),
            WriteCommand::Flush(done) => {
                let _ = done.send(());
                continue;
            }
        };

        let station_id = station.id.clone();
        let (result, pending) = save_station(Arc::clone(&store), timeout, station).await;
        record_outcome(&warning, &station_id, &result);
        if let Some(reply) = reply {
            let _ = reply.send(result);
        }
        if let Some(pending) = pending {
            match pending.await {
                Ok(Ok(())) => tracing::debug!("Late save of station {} finished", station_id),
                Ok(Err(error)) => {
                    tracing::warn!("Late save of station {} failed: {}", station_id, error)
                }
                Err(join_error) => {
                    tracing::warn!("Late save of station {} aborted: {}", station_id, join_error)
                }
            }
        }
    }
    tracing::debug!("Station writer stopped");
}
