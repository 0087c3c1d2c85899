// On-demand sensitivity analyses: tilt sweep and horizon impact
use serde::{Deserialize, Serialize};

use super::geometry::round_to;

pub const DEFAULT_TILT_VALUES: [f64; 5] = [15.0, 20.0, 25.0, 30.0, 35.0];
const FALLBACK_TILT_DEG: f64 = 25.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TiltSensitivity {
    pub tilt_values: Vec<f64>,
    pub energy_values: Vec<f64>,
    pub optimal_tilt: f64,
    pub optimal_energy_kwh: f64,
    pub computed: bool,
}

/// Sorted copy of the requested tilts.
pub fn sorted_tilts(tilts: &[f64]) -> Vec<f64> {
    let mut sorted = tilts.to_vec();
    sorted.sort_by(f64::total_cmp);
    sorted
}

impl TiltSensitivity {
    /// Build from sorted tilts and their annual energies (failed points are 0).
    ///
    /// The optimum is the first maximum; with no positive energy it is the
    /// middle tilt at 0 kWh.
    pub fn from_sweep(tilt_values: Vec<f64>, energy_values: Vec<f64>) -> Self {
        let optimum = energy_values
            .iter()
            .copied()
            .enumerate()
            .filter(|(_, e)| *e > 0.0)
            .fold(None, |best: Option<(usize, f64)>, (i, e)| match best {
                Some((_, b)) if b >= e => best,
                _ => Some((i, e)),
            });

        let (optimal_tilt, optimal_energy) = match optimum {
            Some((i, e)) => (tilt_values[i], e),
            None => (
                tilt_values.get(tilt_values.len() / 2).copied().unwrap_or(FALLBACK_TILT_DEG),
                0.0,
            ),
        };

        Self {
            energy_values: energy_values.iter().map(|e| round_to(*e, 2)).collect(),
            tilt_values,
            optimal_tilt,
            optimal_energy_kwh: round_to(optimal_energy, 2),
            computed: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HorizonImpact {
    /// Comparison horizon sent to the simulation (all zeros).
    pub flat_horizon: String,
    pub tilt_deg: f64,
    pub energy_with_horizon_kwh: f64,
    pub energy_without_horizon_kwh: f64,
    pub loss_abs_kwh: f64,
    pub loss_pct: f64,
    pub computed: bool,
}

impl HorizonImpact {
    /// `energy_without` is `None` when the flat-horizon run failed; the
    /// shading loss is then reported as zero.
    pub fn compare(
        flat_horizon: String,
        tilt_deg: f64,
        energy_with_kwh: f64,
        energy_without_kwh: Option<f64>,
    ) -> Self {
        let energy_without = energy_without_kwh.unwrap_or(energy_with_kwh);
        let loss_abs = energy_without - energy_with_kwh;
        let loss_pct = if energy_without > 0.0 {
            loss_abs / energy_without * 100.0
        } else {
            0.0
        };

        Self {
            flat_horizon,
            tilt_deg,
            energy_with_horizon_kwh: round_to(energy_with_kwh, 2),
            energy_without_horizon_kwh: round_to(energy_without, 2),
            loss_abs_kwh: round_to(loss_abs, 2),
            loss_pct: round_to(loss_pct, 2),
            computed: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_optimal_tilt_is_first_maximum() {
        let s = TiltSensitivity::from_sweep(vec![15.0, 20.0, 25.0], vec![900.0, 1100.0, 1100.0]);
        assert_eq!(s.optimal_tilt, 20.0);
        assert_eq!(s.optimal_energy_kwh, 1100.0);
        assert!(s.computed);
    }

    #[test]
    fn test_all_failed_points_pick_middle_tilt() {
        let tilts = DEFAULT_TILT_VALUES.to_vec();
        let s = TiltSensitivity::from_sweep(tilts, vec![0.0; 5]);
        assert_eq!(s.optimal_tilt, 25.0);
        assert_eq!(s.optimal_energy_kwh, 0.0);
    }

    #[test]
    fn test_even_length_middle() {
        let s = TiltSensitivity::from_sweep(vec![10.0, 20.0, 30.0, 40.0], vec![0.0; 4]);
        assert_eq!(s.optimal_tilt, 30.0);
    }

    #[test]
    fn test_empty_sweep() {
        let s = TiltSensitivity::from_sweep(vec![], vec![]);
        assert_eq!(s.optimal_tilt, 25.0);
        assert!(s.energy_values.is_empty());
    }

    #[test]
    fn test_sorted_tilts() {
        assert_eq!(sorted_tilts(&[35.0, 15.0, 25.0]), vec![15.0, 25.0, 35.0]);
    }

    #[test]
    fn test_horizon_impact_loss() {
        let hi = HorizonImpact::compare("0,0".into(), 35.0, 900.0, Some(1000.0));
        assert_eq!(hi.loss_abs_kwh, 100.0);
        assert_eq!(hi.loss_pct, 10.0);
        assert_eq!(hi.energy_without_horizon_kwh, 1000.0);
    }

    #[test]
    fn test_failed_flat_run_reports_no_loss() {
        let hi = HorizonImpact::compare("0,0".into(), 35.0, 900.0, None);
        assert_eq!(hi.energy_without_horizon_kwh, 900.0);
        assert_eq!(hi.loss_abs_kwh, 0.0);
        assert_eq!(hi.loss_pct, 0.0);
    }
}
