// On-demand analyses over stored results: tilt sweep and horizon impact
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::Mutex;

use crate::application::results_store::{ResultsStore, StoreEntry, StoreError};
use crate::application::simulation::{PvSimulator, SimulationRequest};
use crate::domain::footprint::{FootprintCollection, FootprintError};
use crate::domain::horizon::flat_userhorizon;
use crate::domain::result::ProcessingResult;
use crate::domain::sensitivity::{sorted_tilts, HorizonImpact, TiltSensitivity};

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error(transparent)]
    Input(#[from] FootprintError),
    #[error("building {index} has no processed result")]
    NotProcessed { index: usize },
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Simulation request reproducing the primary run of `result`.
fn base_request(result: &ProcessingResult) -> SimulationRequest {
    SimulationRequest {
        lat: result.location.lat,
        lon: result.location.lon,
        userhorizon: result.userhorizon.clone(),
        peak_power_kwp: result.building.peak_power_kwp,
        tilt_deg: result.tilt_deg,
        aspect_deg: result.building.aspect_deg,
    }
}

/// One extra simulation with a flat horizon at the result's tilt and aspect.
/// A failed call, or a response without a power column, is reported as zero
/// shading loss.
pub(crate) async fn measure_horizon_impact(
    simulator: &dyn PvSimulator,
    result: &ProcessingResult,
    step_deg: u32,
) -> HorizonImpact {
    let flat = flat_userhorizon(step_deg);
    let request = SimulationRequest {
        userhorizon: flat.clone(),
        ..base_request(result)
    };

    let without = match simulator.simulate(&request).await {
        Ok(output) if output.series.power_w.is_some() => Some(output.series.energy_kwh()),
        Ok(_) => {
            tracing::warn!(
                "Flat-horizon simulation for building {} returned no power column",
                result.building_index
            );
            None
        }
        Err(e) => {
            tracing::warn!(
                "Flat-horizon simulation failed for building {}: {}",
                result.building_index,
                e
            );
            None
        }
    };

    HorizonImpact::compare(flat, result.tilt_deg, result.annual_metrics.energy_kwh, without)
}

#[derive(Clone)]
pub struct AnalysisService {
    collection: Arc<FootprintCollection>,
    simulator: Arc<dyn PvSimulator>,
    store: Arc<dyn ResultsStore>,
    step_deg: u32,
    default_tilts: Vec<f64>,
    // Serialises read-check-write of stored results.
    write_lock: Arc<Mutex<()>>,
}

impl AnalysisService {
    pub fn new(
        collection: Arc<FootprintCollection>,
        simulator: Arc<dyn PvSimulator>,
        store: Arc<dyn ResultsStore>,
        step_deg: u32,
        default_tilts: Vec<f64>,
    ) -> Self {
        Self {
            collection,
            simulator,
            store,
            step_deg,
            default_tilts,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    async fn load(&self, index: usize) -> Result<ProcessingResult, AnalysisError> {
        self.collection.get(index)?;
        self.store
            .processed(index)
            .await?
            .ok_or(AnalysisError::NotProcessed { index })
    }

    /// Sweep tilts (default list when `None`), one simulation each. Every call
    /// re-issues the sweep and replaces any earlier one.
    pub async fn tilt_sensitivity(
        &self,
        index: usize,
        tilts: Option<Vec<f64>>,
    ) -> Result<ProcessingResult, AnalysisError> {
        let result = self.load(index).await?;
        let tilt_values = sorted_tilts(tilts.as_deref().unwrap_or(&self.default_tilts));
        let base = base_request(&result);

        let mut energy_values = Vec::with_capacity(tilt_values.len());
        for tilt in &tilt_values {
            let request = SimulationRequest {
                tilt_deg: *tilt,
                ..base.clone()
            };
            let energy = match self.simulator.simulate(&request).await {
                Ok(output) => output.series.energy_kwh(),
                Err(e) => {
                    tracing::warn!("Tilt {} simulation failed for building {}: {}", tilt, index, e);
                    0.0
                }
            };
            energy_values.push(energy);
        }

        let analysis = TiltSensitivity::from_sweep(tilt_values, energy_values);
        tracing::info!(
            "Building {} optimal tilt {} ({} kWh)",
            index,
            analysis.optimal_tilt,
            analysis.optimal_energy_kwh
        );

        let _guard = self.write_lock.lock().await;
        // Pick up fields written since the sweep started.
        let latest = self.store.processed(index).await?.unwrap_or(result);
        let updated = latest.with_tilt_sensitivity(analysis);
        self.store
            .put(index, StoreEntry::Processed(Box::new(updated.clone())))
            .await?;
        Ok(updated)
    }

    /// Attach the shading loss to a stored result. Already-measured results
    /// are returned as stored without any simulation call.
    pub async fn horizon_impact(&self, index: usize) -> Result<ProcessingResult, AnalysisError> {
        let result = self.load(index).await?;
        if result.horizon_impact.is_some() {
            tracing::debug!("Horizon impact already present for building {}", index);
            return Ok(result);
        }

        let impact = measure_horizon_impact(self.simulator.as_ref(), &result, self.step_deg).await;

        let _guard = self.write_lock.lock().await;
        let latest = self.store.processed(index).await?.unwrap_or(result);
        if latest.horizon_impact.is_some() {
            // Another request stored its measurement first.
            return Ok(latest);
        }
        let updated = latest.with_horizon_impact(impact);
        self.store
            .put(index, StoreEntry::Processed(Box::new(updated.clone())))
            .await?;
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::simulation::SimulationError;
    use crate::application::testing::FakeSimulator;
    use crate::domain::geometry::round_to;
    use crate::domain::horizon::tests::{collection, rect_footprint};
    use crate::domain::result::tests::sample_result;
    use crate::infrastructure::memory_store::MemoryStore;

    async fn seeded_store(energy_kwh: f64) -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        store
            .put(0, StoreEntry::Processed(Box::new(sample_result(0, energy_kwh))))
            .await
            .unwrap();
        store
    }

    fn service(simulator: Arc<FakeSimulator>, store: Arc<MemoryStore>) -> AnalysisService {
        let collection = Arc::new(collection(vec![
            rect_footprint(0, 0.0, 0.0, 10.0, 10.0, 10.0),
            rect_footprint(1, 50.0, 0.0, 10.0, 10.0, 10.0),
        ]));
        AnalysisService::new(collection, simulator, store, 10, vec![15.0, 20.0, 25.0, 30.0, 35.0])
    }

    #[tokio::test]
    async fn test_tilt_sweep_picks_best_tilt() {
        // Energy peaks at 30 degrees.
        let simulator = Arc::new(FakeSimulator::new(|request| {
            let power = 1000.0 - (request.tilt_deg - 30.0).abs() * 10.0;
            Ok(FakeSimulator::output(power))
        }));
        let store = seeded_store(40.0).await;
        let updated = service(simulator.clone(), store.clone())
            .tilt_sensitivity(0, Some(vec![35.0, 15.0, 30.0]))
            .await
            .unwrap();

        let sweep = updated.tilt_sensitivity.clone().unwrap();
        assert_eq!(sweep.tilt_values, vec![15.0, 30.0, 35.0]);
        assert_eq!(sweep.optimal_tilt, 30.0);
        assert_eq!(sweep.optimal_energy_kwh, 48.0);
        assert_eq!(simulator.calls(), 3);
        assert_eq!(store.processed(0).await.unwrap(), Some(updated));
    }

    #[tokio::test]
    async fn test_tilt_sweep_with_all_calls_failing() {
        let simulator = Arc::new(FakeSimulator::failing());
        let updated = service(simulator.clone(), seeded_store(40.0).await)
            .tilt_sensitivity(0, None)
            .await
            .unwrap();

        let sweep = updated.tilt_sensitivity.unwrap();
        assert_eq!(sweep.optimal_tilt, 25.0);
        assert_eq!(sweep.optimal_energy_kwh, 0.0);
        assert_eq!(sweep.energy_values, vec![0.0; 5]);
        assert_eq!(simulator.calls(), 5);
    }

    #[tokio::test]
    async fn test_tilt_sweep_reissues_calls() {
        let simulator = Arc::new(FakeSimulator::constant(100.0));
        let svc = service(simulator.clone(), seeded_store(40.0).await);
        svc.tilt_sensitivity(0, None).await.unwrap();
        svc.tilt_sensitivity(0, None).await.unwrap();
        assert_eq!(simulator.calls(), 10);
    }

    #[tokio::test]
    async fn test_horizon_impact_is_idempotent() {
        let simulator = Arc::new(FakeSimulator::constant(1000.0));
        let store = seeded_store(40.0).await;
        let svc = service(simulator.clone(), store.clone());

        let first = svc.horizon_impact(0).await.unwrap();
        let second = svc.horizon_impact(0).await.unwrap();

        let impact = first.horizon_impact.clone().unwrap();
        assert_eq!(impact.energy_without_horizon_kwh, 48.0);
        assert_eq!(impact.loss_abs_kwh, 8.0);
        assert_eq!(impact.loss_pct, round_to(8.0 / 48.0 * 100.0, 2));
        assert_eq!(first, second);
        assert_eq!(simulator.calls(), 1);
        assert_eq!(simulator.requests()[0].userhorizon, vec!["0"; 36].join(","));
        assert_eq!(store.processed(0).await.unwrap(), Some(first));
    }

    #[tokio::test]
    async fn test_horizon_impact_failure_means_no_loss() {
        let simulator = Arc::new(FakeSimulator::new(|_| Err(SimulationError::Timeout)));
        let updated = service(simulator, seeded_store(40.0).await)
            .horizon_impact(0)
            .await
            .unwrap();

        let impact = updated.horizon_impact.unwrap();
        assert_eq!(impact.energy_without_horizon_kwh, 40.0);
        assert_eq!(impact.loss_abs_kwh, 0.0);
        assert_eq!(impact.loss_pct, 0.0);
    }

    fn no_power_column() -> Arc<FakeSimulator> {
        Arc::new(FakeSimulator::new(|_| {
            let mut output = FakeSimulator::output(1000.0);
            output.series.power_w = None;
            Ok(output)
        }))
    }

    #[tokio::test]
    async fn test_horizon_impact_without_power_column_means_no_loss() {
        let updated = service(no_power_column(), seeded_store(40.0).await)
            .horizon_impact(0)
            .await
            .unwrap();

        let impact = updated.horizon_impact.unwrap();
        assert_eq!(impact.energy_with_horizon_kwh, 40.0);
        assert_eq!(impact.energy_without_horizon_kwh, 40.0);
        assert_eq!(impact.loss_abs_kwh, 0.0);
        assert_eq!(impact.loss_pct, 0.0);
    }

    #[tokio::test]
    async fn test_tilt_point_without_power_column_is_zero() {
        let simulator = no_power_column();
        let updated = service(simulator.clone(), seeded_store(40.0).await)
            .tilt_sensitivity(0, Some(vec![20.0, 30.0]))
            .await
            .unwrap();

        let sweep = updated.tilt_sensitivity.unwrap();
        assert_eq!(sweep.energy_values, vec![0.0, 0.0]);
        assert_eq!(sweep.optimal_energy_kwh, 0.0);
        assert_eq!(simulator.calls(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_horizon_impact_keeps_first_measurement() {
        let store = seeded_store(40.0).await;
        let svc = service(Arc::new(FakeSimulator::constant(1000.0)), store.clone());
        let (a, b) = tokio::join!(svc.horizon_impact(0), svc.horizon_impact(0));
        let (a, b) = (a.unwrap(), b.unwrap());

        assert_eq!(a.horizon_impact, b.horizon_impact);
        assert_eq!(store.processed(0).await.unwrap(), Some(a));
    }

    #[tokio::test]
    async fn test_unprocessed_building_is_rejected() {
        let svc = service(Arc::new(FakeSimulator::constant(1.0)), seeded_store(40.0).await);
        assert!(matches!(
            svc.horizon_impact(1).await,
            Err(AnalysisError::NotProcessed { index: 1 })
        ));
        assert!(matches!(
            svc.tilt_sensitivity(9, None).await,
            Err(AnalysisError::Input(FootprintError::IndexOutOfRange { .. }))
        ));
    }
}
