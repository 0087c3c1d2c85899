// Installable peak power from roof area
use geo::{Area, MultiPolygon};

use super::geometry::{largest_part, round_to};

pub const ROOF_AREA_FACTOR: f64 = 0.4;
pub const POWER_DENSITY_W_PER_M2: f64 = 200.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PeakPowerEstimate {
    pub peak_power_kwp: f64,
    pub area_m2: f64,
}

/// Peak power (kWp) and footprint area (m²), both rounded to 2 decimals.
/// Only the largest part of a multi-part footprint counts; empty input is (0, 0).
pub fn estimate_peak_power(
    geometry: &MultiPolygon<f64>,
    roof_area_factor: f64,
    power_density_w_per_m2: f64,
) -> PeakPowerEstimate {
    let area_m2 = largest_part(geometry).map(|p| p.unsigned_area()).unwrap_or(0.0);
    let peak_power_wp = area_m2 * roof_area_factor * power_density_w_per_m2;

    PeakPowerEstimate {
        peak_power_kwp: round_to(peak_power_wp / 1000.0, 2),
        area_m2: round_to(area_m2, 2),
    }
}
