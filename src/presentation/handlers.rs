// HTTP request handlers
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{HeaderMap, Response, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::json;

use crate::application::analysis_service::AnalysisError;
use crate::application::building_service::ProcessingError;
use crate::application::results_store::{StoreEntry, StoreError};
use crate::domain::footprint::FootprintError;
use crate::infrastructure::chunked_json::stream_from_receiver;
use crate::infrastructure::geojson_mapper::{buildings_layer, panels_layer};
use crate::infrastructure::http_response::{json_response, json_response_with, GEOJSON_CONTENT_TYPE};
use crate::presentation::app_state::AppState;

#[derive(Debug, Deserialize)]
pub struct HorizonImpactQuery {
    pub horizon_impact: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct TiltRequest {
    pub tilts: Option<Vec<f64>>,
}

/// Error body `{"error": ...}` with a status chosen per failure kind.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

impl From<FootprintError> for ApiError {
    fn from(e: FootprintError) -> Self {
        let status = match e {
            FootprintError::IndexOutOfRange { .. } => StatusCode::NOT_FOUND,
            FootprintError::EmptyGeometry { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        };
        Self::new(status, e.to_string())
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
    }
}

impl From<ProcessingError> for ApiError {
    fn from(e: ProcessingError) -> Self {
        match e {
            ProcessingError::Input(e) => e.into(),
            ProcessingError::Simulation(e) => Self::new(StatusCode::BAD_GATEWAY, e.to_string()),
            ProcessingError::Store(e) => e.into(),
        }
    }
}

impl From<AnalysisError> for ApiError {
    fn from(e: AnalysisError) -> Self {
        match e {
            AnalysisError::Input(e) => e.into(),
            AnalysisError::NotProcessed { .. } => Self::new(StatusCode::NOT_FOUND, e.to_string()),
            AnalysisError::Store(e) => e.into(),
        }
    }
}

impl From<StatusCode> for ApiError {
    fn from(status: StatusCode) -> Self {
        Self::new(status, status.canonical_reason().unwrap_or("error"))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

type ApiResult = Result<Response<Body>, ApiError>;

/// Whether the client accepts Brotli-encoded bodies.
fn accepts_brotli(headers: &HeaderMap) -> bool {
    headers
        .get("accept-encoding")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.contains("br"))
        .unwrap_or(false)
}

/// Health check endpoint
pub async fn health_check() -> &'static str {
    "ok"
}

pub async fn list_buildings(headers: HeaderMap, State(state): State<Arc<AppState>>) -> ApiResult {
    let statuses = state.building_service.statuses().await?;
    Ok(json_response(&statuses, accepts_brotli(&headers)).await?)
}

pub async fn get_building(
    Path(index): Path<usize>,
    headers: HeaderMap,
    State(state): State<Arc<AppState>>,
) -> ApiResult {
    match state.building_service.stored(index).await? {
        Some(StoreEntry::Processed(result)) => Ok(json_response(&result, accepts_brotli(&headers)).await?),
        Some(StoreEntry::Failed) => Err(ApiError::new(
            StatusCode::NOT_FOUND,
            format!("building {} failed processing", index),
        )),
        None => Err(ApiError::new(
            StatusCode::NOT_FOUND,
            format!("building {} has not been processed", index),
        )),
    }
}

/// Horizon and orientation diagnostics, computed without calling PVGIS
pub async fn inspect_building(
    Path(index): Path<usize>,
    headers: HeaderMap,
    State(state): State<Arc<AppState>>,
) -> ApiResult {
    let inspection = state.building_service.inspect(index)?;
    Ok(json_response(&inspection, accepts_brotli(&headers)).await?)
}

pub async fn process_building(
    Path(index): Path<usize>,
    Query(query): Query<HorizonImpactQuery>,
    headers: HeaderMap,
    State(state): State<Arc<AppState>>,
) -> ApiResult {
    let result = state
        .building_service
        .process_building(index, query.horizon_impact.unwrap_or(false))
        .await?;
    Ok(json_response(&result, accepts_brotli(&headers)).await?)
}

pub async fn tilt_sensitivity(
    Path(index): Path<usize>,
    headers: HeaderMap,
    State(state): State<Arc<AppState>>,
    body: Option<Json<TiltRequest>>,
) -> ApiResult {
    let tilts = body.and_then(|Json(request)| request.tilts);
    let result = state.analysis_service.tilt_sensitivity(index, tilts).await?;
    Ok(json_response(&result, accepts_brotli(&headers)).await?)
}

pub async fn horizon_impact(
    Path(index): Path<usize>,
    headers: HeaderMap,
    State(state): State<Arc<AppState>>,
) -> ApiResult {
    let result = state.analysis_service.horizon_impact(index).await?;
    Ok(json_response(&result, accepts_brotli(&headers)).await?)
}

pub async fn run_batch(
    Query(query): Query<HorizonImpactQuery>,
    headers: HeaderMap,
    State(state): State<Arc<AppState>>,
) -> ApiResult {
    let with_horizon_impact = query.horizon_impact.unwrap_or(state.horizon_impact_on_batch);
    let summary = state.building_service.process_all(with_horizon_impact, None).await;
    Ok(json_response(&summary, accepts_brotli(&headers)).await?)
}

/// Run a batch, streaming progress as newline-delimited JSON
pub async fn stream_batch(
    Query(query): Query<HorizonImpactQuery>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let with_horizon_impact = query.horizon_impact.unwrap_or(state.horizon_impact_on_batch);
    let rx = state.batch_stream_service.stream_batch(with_horizon_impact);
    stream_from_receiver(rx)
}

pub async fn export_buildings(headers: HeaderMap, State(state): State<Arc<AppState>>) -> ApiResult {
    let results = state.building_service.processed_results().await?;
    let layer = buildings_layer(state.building_service.collection(), &results);
    Ok(json_response_with(StatusCode::OK, &layer, GEOJSON_CONTENT_TYPE, accepts_brotli(&headers)).await?)
}

pub async fn export_panels(headers: HeaderMap, State(state): State<Arc<AppState>>) -> ApiResult {
    let results = state.building_service.processed_results().await?;
    let layer = panels_layer(state.building_service.collection(), &results);
    Ok(json_response_with(StatusCode::OK, &layer, GEOJSON_CONTENT_TYPE, accepts_brotli(&headers)).await?)
}
