// Simulation service seam: horizon + panel parameters -> hourly power series
use async_trait::async_trait;
use thiserror::Error;

use crate::domain::metrics::HourlySeries;

/// Parameters for one simulation run. Fixed service options (year, system
/// loss, mounting) belong to the adapter.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationRequest {
    pub lat: f64,
    pub lon: f64,
    /// Comma-joined horizon elevations in bucket order.
    pub userhorizon: String,
    pub peak_power_kwp: f64,
    pub tilt_deg: f64,
    /// South-zero aspect, -180..180.
    pub aspect_deg: f64,
}

#[derive(Debug, Clone, Default)]
pub struct SimulationOutput {
    pub series: HourlySeries,
    pub radiation_db: Option<String>,
}

#[derive(Debug, Error)]
pub enum SimulationError {
    #[error("simulation request failed: {0}")]
    Transport(String),
    #[error("simulation request timed out")]
    Timeout,
    #[error("simulation service returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("malformed simulation response: {0}")]
    Malformed(String),
}

#[async_trait]
pub trait PvSimulator: Send + Sync {
    /// Run one hourly simulation for the given point and panel.
    async fn simulate(&self, request: &SimulationRequest) -> Result<SimulationOutput, SimulationError>;
}
