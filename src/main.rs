// Main entry point - Dependency injection and server setup
mod application;
mod domain;
mod infrastructure;
mod presentation;

use std::{net::SocketAddr, path::Path, sync::Arc, time::Duration};

use anyhow::Context;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use crate::application::analysis_service::AnalysisService;
use crate::application::batch_stream_service::BatchStreamService;
use crate::application::building_service::BuildingService;
use crate::application::results_store::ResultsStore;
use crate::domain::footprint::HeightRules;
use crate::infrastructure::config::{load_app_config, StoreKind};
use crate::infrastructure::file_store::FileStore;
use crate::infrastructure::footprint_loader::load_footprints;
use crate::infrastructure::memory_store::MemoryStore;
use crate::infrastructure::pvgis_client::PvgisClient;
use crate::presentation::app_state::AppState;
use crate::presentation::handlers::{
    export_buildings, export_panels, get_building, health_check, horizon_impact, inspect_building,
    list_buildings, process_building, run_batch, stream_batch, tilt_sensitivity,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let app_config = load_app_config()?;

    // Footprints are read once and shared read-only
    let height_rules = HeightRules::new(app_config.roof.default_height_m, app_config.roof.level_height_m);
    let collection = Arc::new(load_footprints(
        Path::new(&app_config.input.footprints_path),
        &height_rules,
    )?);

    let simulator = Arc::new(PvgisClient::new(
        app_config.pvgis.endpoint.clone(),
        app_config.pvgis.year,
        Duration::from_secs(app_config.pvgis.timeout_secs),
    )?);

    let store: Arc<dyn ResultsStore> = match app_config.store.kind {
        StoreKind::Memory => Arc::new(MemoryStore::new()),
        StoreKind::File => Arc::new(
            FileStore::open(&app_config.store.path)
                .await
                .with_context(|| format!("Failed to open results store {}", app_config.store.path))?,
        ),
    };

    let settings = app_config.processing_settings();
    let building_service = BuildingService::new(
        collection.clone(),
        simulator.clone(),
        store.clone(),
        settings.clone(),
    );
    let analysis_service = AnalysisService::new(
        collection,
        simulator,
        store,
        settings.step_deg,
        settings.tilt_values,
    );
    let batch_stream_service = BatchStreamService::new(building_service.clone());

    if app_config.batch.run_on_startup {
        let summary = building_service
            .process_all(app_config.analysis.horizon_impact_on_batch, None)
            .await;
        tracing::info!(
            "Startup batch: {} processed, {} cached, {} failed",
            summary.processed,
            summary.cached,
            summary.failed
        );
    }

    let state = Arc::new(AppState {
        building_service,
        analysis_service,
        batch_stream_service,
        horizon_impact_on_batch: app_config.analysis.horizon_impact_on_batch,
    });

    // Compression is applied per response in the handlers
    let router = Router::new()
        .route("/healthz", get(health_check))
        .route("/buildings", get(list_buildings))
        .route("/buildings/:idx", get(get_building))
        .route("/buildings/:idx/horizon", get(inspect_building))
        .route("/buildings/:idx/process", post(process_building))
        .route("/buildings/:idx/tilt-sensitivity", post(tilt_sensitivity))
        .route("/buildings/:idx/horizon-impact", post(horizon_impact))
        .route("/batch", post(run_batch))
        .route("/batch/stream", get(stream_batch))
        .route("/export/buildings.geojson", get(export_buildings))
        .route("/export/panels.geojson", get(export_panels))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr: SocketAddr = app_config
        .server
        .bind_addr
        .parse()
        .with_context(|| format!("Invalid bind address {}", app_config.server.bind_addr))?;
    tracing::info!("Starting rooftop-pv service on {}", addr);

    axum::serve(tokio::net::TcpListener::bind(addr).await?, router).await?;

    Ok(())
}
