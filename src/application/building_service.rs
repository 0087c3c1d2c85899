// Building orchestrator - per-building pipeline and batch runs over a results store
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::application::analysis_service::measure_horizon_impact;
use crate::application::results_store::{ResultsStore, StoreEntry, StoreError};
use crate::application::simulation::{PvSimulator, SimulationError, SimulationRequest};
use crate::domain::footprint::{Footprint, FootprintCollection, FootprintError};
use crate::domain::horizon::{estimate_horizon, HorizonSample, DEFAULT_RAY_LENGTH_M, DEFAULT_STEP_DEG};
use crate::domain::metrics::{compute_annual_metrics, compute_best_worst_days};
use crate::domain::orientation::{resolve_orientation, OrientationResult};
use crate::domain::peak_power::{estimate_peak_power, POWER_DENSITY_W_PER_M2, ROOF_AREA_FACTOR};
use crate::domain::result::{BuildingProps, Location, ProcessingResult};
use crate::domain::sensitivity::DEFAULT_TILT_VALUES;

#[derive(Debug, Clone, PartialEq)]
pub struct ProcessingSettings {
    pub step_deg: u32,
    pub ray_length_m: f64,
    pub roof_area_factor: f64,
    pub power_density_w_per_m2: f64,
    pub default_tilt_deg: f64,
    pub tilt_values: Vec<f64>,
}

impl Default for ProcessingSettings {
    fn default() -> Self {
        Self {
            step_deg: DEFAULT_STEP_DEG,
            ray_length_m: DEFAULT_RAY_LENGTH_M,
            roof_area_factor: ROOF_AREA_FACTOR,
            power_density_w_per_m2: POWER_DENSITY_W_PER_M2,
            default_tilt_deg: 35.0,
            tilt_values: DEFAULT_TILT_VALUES.to_vec(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ProcessingError {
    #[error(transparent)]
    Input(#[from] FootprintError),
    #[error(transparent)]
    Simulation(#[from] SimulationError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildingState {
    Processed,
    Failed,
    Pending,
}

/// One row of the building listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BuildingStatus {
    pub index: usize,
    pub building_id: String,
    pub status: BuildingState,
    pub energy_kwh: Option<f64>,
    pub capacity_factor: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchFailure {
    pub index: usize,
    pub building_id: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchSummary {
    pub total: usize,
    pub processed: usize,
    pub cached: usize,
    pub failed: usize,
    pub failures: Vec<BatchFailure>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildingOutcome {
    Processed,
    Cached,
    Failed,
}

/// Progress events emitted while a batch runs.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum BatchEvent {
    Started {
        total: usize,
    },
    Building {
        index: usize,
        building_id: String,
        outcome: BuildingOutcome,
        energy_kwh: Option<f64>,
        error: Option<String>,
    },
    Completed {
        summary: BatchSummary,
    },
}

/// Geometry-only view of one building, computed without any simulation call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BuildingInspection {
    pub index: usize,
    pub building_id: String,
    pub crs: String,
    pub centroid_xy: [f64; 2],
    pub height_m: f64,
    pub area_m2: f64,
    pub peak_power_kwp: f64,
    pub step_deg: u32,
    pub userhorizon: String,
    pub max_elevation_deg: f64,
    pub horizon: Vec<HorizonSample>,
    pub orientation: OrientationResult,
}

#[derive(Clone)]
pub struct BuildingService {
    collection: Arc<FootprintCollection>,
    simulator: Arc<dyn PvSimulator>,
    store: Arc<dyn ResultsStore>,
    settings: ProcessingSettings,
}

impl BuildingService {
    pub fn new(
        collection: Arc<FootprintCollection>,
        simulator: Arc<dyn PvSimulator>,
        store: Arc<dyn ResultsStore>,
        settings: ProcessingSettings,
    ) -> Self {
        Self {
            collection,
            simulator,
            store,
            settings,
        }
    }

    pub fn collection(&self) -> &FootprintCollection {
        &self.collection
    }

    /// Horizon, orientation and roof estimate for one building.
    pub fn inspect(&self, index: usize) -> Result<BuildingInspection, FootprintError> {
        let footprint = self.collection.get(index)?;
        let horizon = estimate_horizon(
            &self.collection,
            index,
            self.settings.step_deg,
            self.settings.ray_length_m,
        )?;
        let peak = estimate_peak_power(
            &footprint.projected,
            self.settings.roof_area_factor,
            self.settings.power_density_w_per_m2,
        );

        Ok(BuildingInspection {
            index,
            building_id: footprint.id.clone(),
            crs: self.collection.crs(),
            centroid_xy: [horizon.centroid.x, horizon.centroid.y],
            height_m: horizon.target_height_m,
            area_m2: peak.area_m2,
            peak_power_kwp: peak.peak_power_kwp,
            step_deg: horizon.step_deg,
            userhorizon: horizon.to_userhorizon(),
            max_elevation_deg: horizon.elevations().into_iter().fold(0.0, f64::max),
            horizon: horizon.samples,
            orientation: resolve_orientation(&footprint.projected),
        })
    }

    /// Process one building. A stored result is returned unchanged without
    /// any simulation call; a failure is recorded as a null entry.
    pub async fn process_building(
        &self,
        index: usize,
        with_horizon_impact: bool,
    ) -> Result<ProcessingResult, ProcessingError> {
        let (result, _) = self.run_building(index, with_horizon_impact).await?;
        Ok(result)
    }

    /// Stored entry for a valid index; `None` when not attempted yet.
    pub async fn stored(&self, index: usize) -> Result<Option<StoreEntry>, ProcessingError> {
        self.collection.get(index)?;
        Ok(self.store.get(index).await?)
    }

    /// All processed results in index order.
    pub async fn processed_results(&self) -> Result<BTreeMap<usize, ProcessingResult>, StoreError> {
        let entries = self.store.entries().await?;
        Ok(entries
            .into_iter()
            .filter_map(|(index, entry)| entry.into_option().map(|r| (index, r)))
            .collect())
    }

    pub async fn statuses(&self) -> Result<Vec<BuildingStatus>, StoreError> {
        let entries = self.store.entries().await?;

        Ok(self
            .collection
            .footprints
            .iter()
            .map(|footprint| {
                let entry = entries.get(&footprint.index);
                let status = match entry {
                    Some(StoreEntry::Processed(_)) => BuildingState::Processed,
                    Some(StoreEntry::Failed) => BuildingState::Failed,
                    None => BuildingState::Pending,
                };
                let result = entry.and_then(StoreEntry::result);
                BuildingStatus {
                    index: footprint.index,
                    building_id: footprint.id.clone(),
                    status,
                    energy_kwh: result.map(|r| r.annual_metrics.energy_kwh),
                    capacity_factor: result.map(|r| r.annual_metrics.capacity_factor),
                }
            })
            .collect())
    }

    /// Run every building in collection order. Failures are recorded and
    /// counted; they never stop the batch.
    pub async fn process_all(
        &self,
        with_horizon_impact: bool,
        events: Option<mpsc::Sender<BatchEvent>>,
    ) -> BatchSummary {
        let total = self.collection.len();
        if self.collection.is_empty() {
            tracing::warn!("Batch started on an empty footprint collection");
        }
        let start_time = Instant::now();
        tracing::info!("Batch started: {} buildings", total);
        emit(&events, BatchEvent::Started { total }).await;

        let mut summary = BatchSummary {
            total,
            ..BatchSummary::default()
        };

        for footprint in &self.collection.footprints {
            let index = footprint.index;
            let event = match self.run_building(index, with_horizon_impact).await {
                Ok((result, cached)) => {
                    let outcome = if cached {
                        summary.cached += 1;
                        BuildingOutcome::Cached
                    } else {
                        summary.processed += 1;
                        BuildingOutcome::Processed
                    };
                    BatchEvent::Building {
                        index,
                        building_id: result.building_id,
                        outcome,
                        energy_kwh: Some(result.annual_metrics.energy_kwh),
                        error: None,
                    }
                }
                Err(e) => {
                    tracing::warn!("Building {} ({}) failed: {}", index, footprint.id, e);
                    summary.failed += 1;
                    summary.failures.push(BatchFailure {
                        index,
                        building_id: footprint.id.clone(),
                        error: e.to_string(),
                    });
                    BatchEvent::Building {
                        index,
                        building_id: footprint.id.clone(),
                        outcome: BuildingOutcome::Failed,
                        energy_kwh: None,
                        error: Some(e.to_string()),
                    }
                }
            };
            emit(&events, event).await;
        }

        tracing::info!(
            "Batch completed in {} ms: {} processed, {} cached, {} failed",
            start_time.elapsed().as_millis(),
            summary.processed,
            summary.cached,
            summary.failed
        );
        emit(&events, BatchEvent::Completed { summary: summary.clone() }).await;
        summary
    }

    /// Returns the result and whether it came from the store.
    async fn run_building(
        &self,
        index: usize,
        with_horizon_impact: bool,
    ) -> Result<(ProcessingResult, bool), ProcessingError> {
        let footprint = self.collection.get(index)?;

        if let Some(result) = self.store.processed(index).await? {
            tracing::debug!("Cache hit for building {}", index);
            return Ok((result, true));
        }

        match self.compute(footprint, with_horizon_impact).await {
            Ok(result) => {
                self.store
                    .put(index, StoreEntry::Processed(Box::new(result.clone())))
                    .await?;
                tracing::info!(
                    "Processed building {} ({}): {} kWh/year",
                    index,
                    result.building_id,
                    result.annual_metrics.energy_kwh
                );
                Ok((result, false))
            }
            Err(e) => {
                if let Err(store_err) = self.store.put(index, StoreEntry::Failed).await {
                    tracing::error!("Could not record failure of building {}: {}", index, store_err);
                }
                Err(e)
            }
        }
    }

    async fn compute(
        &self,
        footprint: &Footprint,
        with_horizon_impact: bool,
    ) -> Result<ProcessingResult, ProcessingError> {
        let index = footprint.index;
        let horizon = estimate_horizon(
            &self.collection,
            index,
            self.settings.step_deg,
            self.settings.ray_length_m,
        )?;
        let orientation = resolve_orientation(&footprint.projected);
        let peak = estimate_peak_power(
            &footprint.projected,
            self.settings.roof_area_factor,
            self.settings.power_density_w_per_m2,
        );

        let (lon, lat) = self.collection.zone.unproject(horizon.centroid);
        let userhorizon = horizon.to_userhorizon();
        tracing::debug!("Building {} horizon: {}", index, userhorizon);

        let request = SimulationRequest {
            lat,
            lon,
            userhorizon: userhorizon.clone(),
            peak_power_kwp: peak.peak_power_kwp,
            tilt_deg: self.settings.default_tilt_deg,
            aspect_deg: orientation.aspect_deg,
        };
        let output = self.simulator.simulate(&request).await?;
        if output.series.is_empty() {
            tracing::warn!("Simulation for building {} returned no hourly rows", index);
        }

        let result = ProcessingResult {
            building_index: index,
            building_id: footprint.id.clone(),
            location: Location {
                lat,
                lon,
                centroid_xy: [horizon.centroid.x, horizon.centroid.y],
                crs: self.collection.crs(),
            },
            building: BuildingProps {
                area_m2: peak.area_m2,
                height_m: footprint.height_m,
                aspect_deg: orientation.aspect_deg,
                azimuth_deg: orientation.panel_azimuth_deg,
                peak_power_kwp: peak.peak_power_kwp,
                uncertain_orientation: orientation.uncertain,
                long_side_endpoints: orientation.chosen_long_side_endpoints,
                long_side_midpoint: orientation.chosen_long_side_midpoint,
            },
            tilt_deg: self.settings.default_tilt_deg,
            annual_metrics: compute_annual_metrics(&output.series, peak.peak_power_kwp),
            best_worst_days: compute_best_worst_days(&output.series),
            userhorizon,
            radiation_db: output.radiation_db,
            tilt_sensitivity: None,
            horizon_impact: None,
        };

        if result.best_worst_days.is_empty() {
            tracing::debug!("Building {} series has no complete day", index);
        }

        if with_horizon_impact {
            let impact =
                measure_horizon_impact(self.simulator.as_ref(), &result, self.settings.step_deg).await;
            return Ok(result.with_horizon_impact(impact));
        }
        Ok(result)
    }
}

async fn emit(events: &Option<mpsc::Sender<BatchEvent>>, event: BatchEvent) {
    if let Some(tx) = events {
        let _ = tx.send(event).await;
    }
}
