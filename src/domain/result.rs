// Per-building processing result
use serde::{Deserialize, Serialize};

use super::metrics::{AnnualMetrics, BestWorstDays};
use super::sensitivity::{HorizonImpact, TiltSensitivity};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub lat: f64,
    pub lon: f64,
    /// Projected centroid in `crs`.
    pub centroid_xy: [f64; 2],
    pub crs: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildingProps {
    pub area_m2: f64,
    pub height_m: f64,
    pub aspect_deg: f64,
    pub azimuth_deg: f64,
    pub peak_power_kwp: f64,
    pub uncertain_orientation: bool,
    pub long_side_endpoints: Option<[[f64; 2]; 2]>,
    pub long_side_midpoint: Option<[f64; 2]>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingResult {
    pub building_index: usize,
    pub building_id: String,
    pub location: Location,
    pub building: BuildingProps,
    /// Tilt used for the primary simulation.
    pub tilt_deg: f64,
    pub annual_metrics: AnnualMetrics,
    pub best_worst_days: BestWorstDays,
    pub userhorizon: String,
    pub radiation_db: Option<String>,
    pub tilt_sensitivity: Option<TiltSensitivity>,
    pub horizon_impact: Option<HorizonImpact>,
}

impl ProcessingResult {
    /// New variant carrying `analysis`; replaces any earlier sweep.
    pub fn with_tilt_sensitivity(&self, analysis: TiltSensitivity) -> Self {
        Self {
            tilt_sensitivity: Some(analysis),
            ..self.clone()
        }
    }

    /// New variant carrying `impact`; an already attached impact is kept.
    pub fn with_horizon_impact(&self, impact: HorizonImpact) -> Self {
        if self.horizon_impact.is_some() {
            return self.clone();
        }
        Self {
            horizon_impact: Some(impact),
            ..self.clone()
        }
    }
}
