use clap::Parser;
use evq_core::DEFAULT_STATION_ID;
use evq_engine::EngineSettings;
use std::time::Duration;

/// Server settings, read from flags or the matching environment variables.
#[derive(Parser, Debug, Clone)]
#[command(name = "evq-server")]
#[command(about = "EV charging spot queue server")]
pub struct ServerConfig {
    /// Station database: `sqlite://path`, a file path, `:memory:` or `memory`
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: Option<String>,

    /// Port to bind the server to
    #[arg(short, long, env = "PORT", default_value = "5000")]
    pub port: u16,

    /// Station document created at startup if missing
    #[arg(long, env = "STATION_ID", default_value_t = DEFAULT_STATION_ID.to_string())]
    pub station_id: String,

    /// Wall-clock milliseconds between two ticks
    #[arg(
        long,
        env = "TICK_INTERVAL_MS",
        default_value = "1000",
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub tick_interval_ms: u64,

    /// Timeout for a single database call
    #[arg(long, env = "PERSIST_TIMEOUT_SECS", default_value = "10")]
    pub persist_timeout_secs: u64,

    /// Ticks between periodic saves of a running countdown
    #[arg(long, env = "PERSIST_EVERY_TICKS", default_value = "60")]
    pub persist_every_ticks: u32,

    /// Comma-separated list of parking spots allowed to queue
    #[arg(long, env = "ALLOWED_SPOTS", value_delimiter = ',')]
    pub allowed_spots: Vec<String>,
}

impl ServerConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    /// Simulated minutes that pass on every tick, so the countdown follows
    /// the wall clock.
    pub fn minutes_per_tick(&self) -> f64 {
        self.tick_interval().as_secs_f64() / 60.0
    }

    pub fn engine_settings(&self) -> EngineSettings {
        let allowed_spots: Vec<String> = self
            .allowed_spots
            .iter()
            .map(|spot| spot.trim().to_string())
            .filter(|spot| !spot.is_empty())
            .collect();

        EngineSettings {
            persist_timeout: Duration::from_secs(self.persist_timeout_secs),
            persist_every_ticks: self.persist_every_ticks,
            allowed_spots: (!allowed_spots.is_empty())
                .then(|| allowed_spots.into_iter().collect()),
        }
    }
}
