//! HTTP handlers for the Sensor Gateway API

use axum::{
    extract::{rejection::JsonRejection, Query, State},
    http::StatusCode,
    response::sse::Sse,
    Json,
};
use serde::{Deserialize, Serialize};
use surge_core::{HealthStatus, Locality, Reading, ReadinessStatus};
use surge_store::{Column, Filter, Order, RecordQuery, Table};

use crate::forecast::ForecastResponse;
use crate::live::LiveStream;
use crate::localities;
use crate::{AppState, Error, Result};

/// `?locality=&limit=`
#[derive(Debug, Default, Deserialize)]
pub struct HistoryQuery {
    pub locality: Option<String>,
    pub limit: Option<usize>,
}

impl HistoryQuery {
    fn locality(&self) -> Result<&str> {
        self.locality
            .as_deref()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .ok_or(Error::MissingLocality)
    }
}

/// `?limit=`
#[derive(Debug, Default, Deserialize)]
pub struct ListingQuery {
    pub limit: Option<usize>,
}

#[derive(Serialize)]
pub struct ReadyResponse {
    #[serde(flatten)]
    pub readiness: ReadinessStatus,
    pub active_subscriptions: u64,
}

#[derive(Serialize)]
pub struct StatsResponse {
    pub uptime_secs: u64,
    pub readings_ingested: u64,
    pub readings_rejected: u64,
    pub forecasts_served: u64,
    pub live_connections: u64,
    pub active_subscriptions: u64,
}

#[derive(Serialize)]
pub struct ReportResponse {
    pub status: &'static str,
    pub record: Reading,
}

#[derive(Serialize)]
pub struct HistoricalResponse {
    pub data: Vec<Reading>,
}

// ============================================
// Health & Metrics Handlers
// ============================================

pub async fn health(State(state): State<AppState>) -> Json<HealthStatus> {
    Json(state.health())
}

pub async fn ready(State(state): State<AppState>) -> (StatusCode, Json<ReadyResponse>) {
    let readiness = state.readiness().await;
    let status = if readiness.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(ReadyResponse {
            readiness,
            active_subscriptions: state.store.active_subscriptions(),
        }),
    )
}

pub async fn stats(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(StatsResponse {
        uptime_secs: state.uptime_secs(),
        readings_ingested: state.ingest.ingested(),
        readings_rejected: state.ingest.rejected(),
        forecasts_served: state.forecasts.served(),
        live_connections: state.live.open_connections(),
        active_subscriptions: state.store.active_subscriptions(),
    })
}

// ============================================
// Ingestion
// ============================================

pub async fn report(
    State(state): State<AppState>,
    body: std::result::Result<Json<serde_json::Value>, JsonRejection>,
) -> Result<(StatusCode, Json<ReportResponse>)> {
    let Json(body) = body.map_err(|e| Error::InvalidPayload(e.body_text()))?;
    let record = state.ingest.submit_json(body).await?;

    Ok((
        StatusCode::CREATED,
        Json(ReportResponse {
            status: "added",
            record,
        }),
    ))
}

// ============================================
// History
// ============================================

pub async fn historical(
    State(state): State<AppState>,
    Query(params): Query<HistoryQuery>,
) -> Result<Json<HistoricalResponse>> {
    let locality = params.locality()?;
    let limit = state.clamp_limit(params.limit.unwrap_or(state.config.history_default_limit));

    let data = state
        .store
        .query(Table::AqiRecords, newest_first(Some(locality), Some(limit)))
        .await?;

    Ok(Json(HistoricalResponse { data }))
}

pub async fn water_history(
    State(state): State<AppState>,
    Query(params): Query<HistoryQuery>,
) -> Result<Json<Vec<Reading>>> {
    let locality = params.locality()?;
    let limit = state.config.water_history_limit;

    let rows = state
        .store
        .query(Table::WaterRecords, newest_first(Some(locality), Some(limit)))
        .await?;

    Ok(Json(rows))
}

pub async fn aqi_records(
    State(state): State<AppState>,
    Query(params): Query<ListingQuery>,
) -> Result<Json<Vec<Reading>>> {
    list_table(&state, Table::AqiRecords, params).await
}

pub async fn water_records(
    State(state): State<AppState>,
    Query(params): Query<ListingQuery>,
) -> Result<Json<Vec<Reading>>> {
    list_table(&state, Table::WaterRecords, params).await
}

async fn list_table(state: &AppState, table: Table, params: ListingQuery) -> Result<Json<Vec<Reading>>> {
    let limit = state.clamp_limit(params.limit.unwrap_or(state.config.listing_max_limit));
    let rows = state.store.query(table, newest_first(None, Some(limit))).await?;
    Ok(Json(rows))
}

fn newest_first(locality: Option<&str>, limit: Option<usize>) -> RecordQuery {
    let mut query = RecordQuery::new().order(Order::desc(Column::CreatedAt));
    if let Some(locality) = locality {
        query = query.filter(Filter::Locality(locality.to_string()));
    }
    if let Some(limit) = limit {
        query = query.limit(limit);
    }
    query
}

// ============================================
// Forecast
// ============================================

pub async fn predict_aqi(
    State(state): State<AppState>,
    Query(params): Query<HistoryQuery>,
) -> Result<Json<ForecastResponse>> {
    let locality = params.locality()?;
    let response = state.forecasts.forecast_locality(locality).await?;
    Ok(Json(response))
}

// ============================================
// Live Feeds
// ============================================

pub async fn live_updates(State(state): State<AppState>) -> Result<Sse<LiveStream>> {
    let stream = state.live.open(Table::AqiRecords).await?;
    Ok(Sse::new(stream))
}

pub async fn water_updates(State(state): State<AppState>) -> Result<Sse<LiveStream>> {
    let stream = state.live.open(Table::WaterRecords).await?;
    Ok(Sse::new(stream))
}

// ============================================
// Catalogue
// ============================================

pub async fn list_localities() -> Json<Vec<Locality>> {
    Json(localities::bangalore())
}
