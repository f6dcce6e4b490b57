//! Sensor Gateway Microservice
//!
//! Environmental sensor platform front door:
//! - AQI and water report ingestion
//! - Per-locality history lookups
//! - Short-horizon AQI forecasting
//! - Server-sent live feeds of new readings
//! - Bangalore locality catalogue

mod config;
mod error;
mod forecast;
mod handlers;
mod ingest;
mod live;
mod localities;
mod routes;


use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;
use surge_core::{DependencyStatus, HealthStatus, MicroserviceRuntime, ReadinessStatus, SurgeService};
use surge_store::{MemoryStore, PgStore, PoolConfig, StoreGateway};
use tokio::net::TcpListener;
use tokio::sync::Notify;
use tracing::{info, warn};

pub use config::{Config, StoreBackend};
pub use error::{Error, Result};

use forecast::ForecastService;
use ingest::IngestService;
use live::LiveFeed;

const SERVICE_ID: &str = "sensor-gateway";

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn StoreGateway>,
    pub ingest: IngestService,
    pub forecasts: ForecastService,
    pub live: LiveFeed,
    pub config: Arc<Config>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(store: Arc<dyn StoreGateway>, config: Config) -> Self {
        Self {
            ingest: IngestService::new(store.clone()),
            forecasts: ForecastService::new(store.clone(), &config.forecast),
            live: LiveFeed::new(store.clone(), config.live.clone()),
            store,
            config: Arc::new(config),
            started_at: Instant::now(),
        }
    }

    pub fn uptime_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }

    /// Cap a caller-supplied row count
    pub fn clamp_limit(&self, limit: usize) -> usize {
        limit.min(self.config.listing_max_limit)
    }

    pub fn health(&self) -> HealthStatus {
        HealthStatus {
            healthy: true,
            service_id: SERVICE_ID.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_seconds: self.uptime_secs(),
        }
    }

    pub async fn readiness(&self) -> ReadinessStatus {
        let started = Instant::now();
        let store_ok = self.store.is_healthy().await;

        ReadinessStatus {
            ready: store_ok,
            dependencies: vec![DependencyStatus {
                name: "store".to_string(),
                available: store_ok,
                latency_ms: Some(started.elapsed().as_millis() as u64),
            }],
        }
    }
}

/// HTTP front end run under [`MicroserviceRuntime`]
pub struct SensorGatewayService {
    state: AppState,
    shutdown: Arc<Notify>,
}

impl SensorGatewayService {
    pub fn new(state: AppState) -> Self {
        Self {
            state,
            shutdown: Arc::new(Notify::new()),
        }
    }
}

#[async_trait]
impl SurgeService for SensorGatewayService {
    fn service_id(&self) -> &'static str {
        SERVICE_ID
    }

    async fn health(&self) -> HealthStatus {
        self.state.health()
    }

    async fn ready(&self) -> ReadinessStatus {
        self.state.readiness().await
    }

    async fn shutdown(&self) -> surge_core::Result<()> {
        self.shutdown.notify_one();
        Ok(())
    }

    async fn start(&self) -> surge_core::Result<()> {
        let bind_addr = self.state.config.service.bind_address();
        let app = routes::create_router(self.state.clone());

        let listener = TcpListener::bind(&bind_addr).await?;
        info!("Sensor Gateway listening on {}", bind_addr);

        let shutdown = self.shutdown.clone();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move { shutdown.notified().await })
            .await?;

        Ok(())
    }
}

async fn connect_store(config: &Config) -> anyhow::Result<Arc<dyn StoreGateway>> {
    match config.store_backend {
        StoreBackend::Memory => {
            warn!("Using in-memory store, readings will not survive a restart");
            let store: Arc<dyn StoreGateway> = Arc::new(MemoryStore::new());
            Ok(store)
        }
        StoreBackend::Postgres => {
            let pool = PoolConfig {
                url: config.service.database_url.clone(),
                max_size: config.db_pool_size,
            };
            let store = PgStore::connect(&pool).await?;
            if config.run_migrations {
                store.migrate().await?;
            }
            let store: Arc<dyn StoreGateway> = Arc::new(store);
            Ok(store)
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    surge_telemetry::init(SERVICE_ID)?;

    info!("Starting Sensor Gateway microservice");

    let config = Config::from_env()?;
    info!(
        backend = ?config.store_backend,
        horizons = ?config.forecast.horizons,
        keep_alive_secs = config.live.keep_alive.as_secs(),
        "Configuration loaded"
    );

    let store = connect_store(&config).await?;
    let service = Arc::new(SensorGatewayService::new(AppState::new(store, config)));

    MicroserviceRuntime::run(service).await?;

    Ok(())
}
