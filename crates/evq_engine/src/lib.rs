//! Shared station registry on top of the pure queue operations.
//!
//! The engine keeps every loaded station in memory, applies `admit`,
//! `depart` and `tick` there first, and hands the resulting document to a
//! background writer. A slow or failing store never holds back the queue.

mod requests;
mod writer;

use evq_core::{ChargingRequest, QueueError, Station, TickOutcome};
use evq_store::{StationStore, StoreError, StoreResult};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::writer::{WriteCommand, run_blocking, run_writer};

#[derive(Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    Queue(#[from] QueueError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("Station state lock poisoned: {0}")]
    StateLock(String),
}

#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// Upper bound for a single store call.
    pub persist_timeout: Duration,
    /// Ticks between periodic saves of a running countdown. Promotions and
    /// completions are saved right away. 0 disables periodic saves.
    pub persist_every_ticks: u32,
    /// Spots allowed to request a charge; `None` accepts any spot id.
    pub allowed_spots: Option<HashSet<String>>,
}

impl Default for EngineSettings {
    fn default() -> Self {
        EngineSettings {
            persist_timeout: Duration::from_secs(10),
            persist_every_ticks: 60,
            allowed_spots: None,
        }
    }
}

#[derive(Default)]
struct Registry {
    stations: HashMap<String, Station>,
    ticks: u64,
}

pub struct Engine {
    store: Arc<dyn StationStore>,
    settings: EngineSettings,
    registry: Mutex<Registry>,
    writer: mpsc::UnboundedSender<WriteCommand>,
    warning: Arc<Mutex<Option<String>>>,
}

impl Engine {
    /// Create the engine and start its background writer.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(store: Arc<dyn StationStore>, settings: EngineSettings) -> Self {
        let (writer, commands) = mpsc::unbounded_channel();
        let warning = Arc::new(Mutex::new(None));
        tokio::spawn(run_writer(
            Arc::clone(&store),
            settings.persist_timeout,
            Arc::clone(&warning),
            commands,
        ));
        Engine {
            store,
            settings,
            registry: Mutex::new(Registry::default()),
            writer,
            warning,
        }
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// The error of the last failed background write, if it has not
    /// been followed by a successful one, or of the last failed tick.
    pub fn persistence_warning(&self) -> Option<String> {
        match self.warning.lock() {
            Ok(warning) => warning.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn set_warning(&self, message: String) {
        let mut warning = match self.warning.lock() {
            Ok(warning) => warning,
            Err(poisoned) => poisoned.into_inner(),
        };
        *warning = Some(message);
    }

    fn registry(&self) -> Result<MutexGuard<'_, Registry>, EngineError> {
        self.registry
            .lock()
            .map_err(|e| EngineError::StateLock(e.to_string()))
    }

    async fn blocking<T, F>(&self, call: F) -> Result<T, EngineError>
    where
        T: Send + 'static,
        F: FnOnce(&dyn StationStore) -> StoreResult<T> + Send + 'static,
    {
        Ok(run_blocking(Arc::clone(&self.store), self.settings.persist_timeout, call).await?)
    }

    /// Queue a background save. Callers hold the registry lock so queued
    /// documents follow the order of in-memory updates.
    fn persist(&self, station: Station) {
        if self.writer.send(WriteCommand::Save(station)).is_err() {
            tracing::warn!("Station writer is gone, dropping write");
        }
    }

    /// Queue a save behind every earlier write; the returned receiver
    /// yields its outcome.
    fn persist_and_reply(&self, station: Station) -> oneshot::Receiver<StoreResult<()>> {
        let (reply, outcome) = oneshot::channel();
        // On a closed channel the reply sender is dropped and the receiver
        // reports the writer as gone.
        let _ = self.writer.send(WriteCommand::SaveAndReply(station, reply));
        outcome
    }

    async fn await_write(
        &self,
        outcome: oneshot::Receiver<StoreResult<()>>,
    ) -> Result<(), EngineError> {
        match outcome.await {
            Ok(result) => Ok(result?),
            Err(_) => Err(StoreError::Unavailable("station writer stopped".to_string()).into()),
        }
    }

    /// Wait until every write queued so far has been attempted.
    pub async fn flush(&self) {
        let (done, finished) = oneshot::channel();
        if self.writer.send(WriteCommand::Flush(done)).is_ok() {
            let _ = finished.await;
        }
    }

    /// Current state of a station.
    ///
    /// Loaded from the store on first access; a station that does not exist
    /// yet is created empty and saved before it is returned.
    pub async fn station(&self, station_id: &str) -> Result<Station, EngineError> {
        let cached = self.registry()?.stations.get(station_id).cloned();
        if let Some(station) = cached {
            return Ok(station);
        }

        let id = station_id.to_string();
        let loaded = self
            .blocking(move |store| store.load_station(&id))
            .await?;
        let station = match loaded {
            Some(mut station) => {
                station.normalize();
                tracing::info!("Loaded station {} from the store", station_id);
                station
            }
            None => {
                let station = Station::new(station_id);
                let outcome = {
                    let registry = self.registry()?;
                    if let Some(current) = registry.stations.get(station_id) {
                        return Ok(current.clone());
                    }
                    self.persist_and_reply(station.clone())
                };
                self.await_write(outcome).await?;
                tracing::info!("Created empty station {}", station_id);
                station
            }
        };

        let mut registry = self.registry()?;
        Ok(registry
            .stations
            .entry(station_id.to_string())
            .or_insert(station)
            .clone())
    }

    /// Load or create a station at startup so its document exists in the store.
    pub async fn ensure_station(&self, station_id: &str) -> Result<Station, EngineError> {
        let station = self.station(station_id).await?;
        tracing::info!(
            "Station {} ready: {} waiting, available: {}",
            station.id,
            station.queue.len(),
            station.is_available
        );
        Ok(station)
    }

    /// All stored stations, with in-memory state taking precedence.
    pub async fn list_stations(&self) -> Result<Vec<Station>, EngineError> {
        let stored = self.blocking(|store| store.list_stations()).await?;
        let registry = self.registry()?;
        let mut stations: Vec<Station> = stored
            .into_iter()
            .map(|station| {
                registry
                    .stations
                    .get(&station.id)
                    .cloned()
                    .unwrap_or(station)
            })
            .collect();
        for (id, station) in registry.stations.iter() {
            if !stations.iter().any(|s| &s.id == id) {
                stations.push(station.clone());
            }
        }
        stations.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(stations)
    }

    /// Overwrite a station document.
    ///
    /// Memory is updated first and the save is queued behind earlier
    /// writes, then awaited. A failed save is reported but not rolled back.
    pub async fn replace(
        &self,
        station_id: &str,
        mut station: Station,
    ) -> Result<Station, EngineError> {
        station.id = station_id.to_string();
        station.normalize();
        let outcome = {
            let mut registry = self.registry()?;
            registry
                .stations
                .insert(station_id.to_string(), station.clone());
            self.persist_and_reply(station.clone())
        };
        self.await_write(outcome).await?;
        tracing::info!("Replaced station {}", station_id);
        Ok(station)
    }

    /// Apply a pure operation to a loaded station and queue the save.
    async fn apply<T>(
        &self,
        station_id: &str,
        operation: impl FnOnce(&Station) -> Result<(Station, T), QueueError>,
    ) -> Result<(Station, T), EngineError> {
        self.station(station_id).await?;
        let mut registry = self.registry()?;
        let current = registry
            .stations
            .entry(station_id.to_string())
            .or_insert_with(|| Station::new(station_id));
        let (next, value) = operation(current)?;
        *current = next.clone();
        self.persist(next.clone());
        Ok((next, value))
    }

    pub async fn admit(
        &self,
        station_id: &str,
        spot_id: &str,
        requested_minutes: f64,
    ) -> Result<(Station, ChargingRequest), EngineError> {
        if let Some(allowed) = &self.settings.allowed_spots {
            if !allowed.contains(spot_id) {
                return Err(QueueError::UnknownSpot {
                    spot_id: spot_id.to_string(),
                }
                .into());
            }
        }
        self.apply(station_id, |station| {
            evq_core::admit(station, spot_id, requested_minutes)
        })
        .await
    }

    pub async fn depart(&self, station_id: &str, spot_id: &str) -> Result<Station, EngineError> {
        let (station, ()) = self
            .apply(station_id, |station| {
                evq_core::depart(station, spot_id).map(|next| (next, ()))
            })
            .await?;
        Ok(station)
    }

    /// Advance a single station by hand and save the result.
    pub async fn tick(
        &self,
        station_id: &str,
        elapsed_minutes: f64,
    ) -> Result<TickOutcome, EngineError> {
        let (_, outcome) = self
            .apply(station_id, |station| {
                let outcome = evq_core::tick_with_outcome(station, elapsed_minutes);
                Ok((outcome.station.clone(), outcome))
            })
            .await?;
        Ok(outcome)
    }

    /// Advance every loaded station by `elapsed_minutes`.
    ///
    /// Returns the number of stations whose charger changed hands.
    pub fn tick_all(&self, elapsed_minutes: f64) -> Result<usize, EngineError> {
        let mut transitions = 0;
        let mut registry = self.registry()?;
        registry.ticks += 1;
        let every = u64::from(self.settings.persist_every_ticks);
        let periodic = every > 0 && registry.ticks % every == 0;

        for station in registry.stations.values_mut() {
            let outcome = evq_core::tick_with_outcome(station, elapsed_minutes);
            let transition = outcome.is_transition();
            let changed = outcome.station != *station;
            *station = outcome.station;
            if transition {
                transitions += 1;
            }
            if transition || (changed && periodic) {
                self.persist(station.clone());
            }
        }
        tracing::trace!("Tick advanced stations by {} min", elapsed_minutes);
        Ok(transitions)
    }

    /// Call [`Engine::tick_all`] every `period`, advancing `elapsed_minutes`
    /// of simulated time each time.
    pub fn spawn_ticker(self: &Arc<Self>, period: Duration, elapsed_minutes: f64) -> JoinHandle<()> {
        let engine = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            interval.tick().await;
            let mut failing = false;
            loop {
                interval.tick().await;
                match engine.tick_all(elapsed_minutes) {
                    Ok(_) => {
                        if failing {
                            tracing::info!("Ticker recovered");
                            failing = false;
                        }
                    }
                    Err(error) => {
                        if !failing {
                            tracing::error!("Ticker failed: {}", error);
                            failing = true;
                        }
                        engine.set_warning(format!("Queue ticker failed: {}", error));
                    }
                }
            }
        })
    }
}
