// Horizon profile estimation by ray casting against neighboring footprints
use geo::Coord;
use serde::{Deserialize, Serialize};

use super::footprint::{FootprintCollection, FootprintError};
use super::geometry::{distance, nearest_intersection_multi, round_to, LENGTH_EPS};

pub const DEFAULT_STEP_DEG: u32 = 10;
pub const DEFAULT_RAY_LENGTH_M: f64 = 200.0;

/// One compass bucket of a horizon profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HorizonSample {
    /// Compass angle, 0 = north, clockwise.
    pub angle_deg: u32,
    /// Obstruction elevation, rounded to 2 decimals, never negative.
    pub elevation_deg: f64,
    pub occluder_point: Option<[f64; 2]>,
    pub occluder_height_m: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HorizonProfile {
    pub step_deg: u32,
    pub centroid: Coord<f64>,
    pub target_height_m: f64,
    pub samples: Vec<HorizonSample>,
}

impl HorizonProfile {
    pub fn elevations(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.elevation_deg).collect()
    }

    /// Comma-joined elevations in bucket order, as the simulation service expects.
    pub fn to_userhorizon(&self) -> String {
        self.samples
            .iter()
            .map(|s| format_degrees(s.elevation_deg))
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// Horizon string with every bucket at zero.
pub fn flat_userhorizon(step_deg: u32) -> String {
    vec!["0"; bucket_count(step_deg)].join(",")
}

pub fn bucket_count(step_deg: u32) -> usize {
    (360 / step_deg.max(1)) as usize
}

/// Shortest decimal form with a mandatory fractional part ("0.0", "36.87").
fn format_degrees(value: f64) -> String {
    let text = value.to_string();
    if text.contains('.') || !value.is_finite() {
        text
    } else {
        format!("{}.0", text)
    }
}

/// Maximum obstruction elevation per compass bucket around building `target_index`.
pub fn estimate_horizon(
    collection: &FootprintCollection,
    target_index: usize,
    step_deg: u32,
    ray_length_m: f64,
) -> Result<HorizonProfile, FootprintError> {
    let target = collection.get(target_index)?;
    let centroid = match target.centroid() {
        Some(c) if !target.is_empty() => c,
        _ => return Err(FootprintError::EmptyGeometry { index: target_index }),
    };
    let target_height = target.height_m;

    let samples = (0..bucket_count(step_deg))
        .map(|bucket| {
            let angle = bucket as u32 * step_deg;
            let theta = (angle as f64).to_radians();
            let end = Coord {
                x: centroid.x + ray_length_m * theta.sin(),
                y: centroid.y + ray_length_m * theta.cos(),
            };

            let mut max_angle = 0.0_f64;
            let mut occluder_point = None;
            let mut occluder_height = None;

            for other in &collection.footprints {
                if other.index == target_index || other.is_empty() {
                    continue;
                }
                let Some(hit) = nearest_intersection_multi(centroid, end, &other.projected) else {
                    continue;
                };

                let d = distance(centroid, hit);
                if d <= LENGTH_EPS {
                    continue;
                }
                let dh = other.height_m - target_height;
                if dh <= 0.0 {
                    continue;
                }

                let elevation = (dh / d).atan().to_degrees();
                if elevation > max_angle {
                    max_angle = elevation;
                    occluder_point = Some([hit.x, hit.y]);
                    occluder_height = Some(other.height_m);
                }
            }

            HorizonSample {
                angle_deg: angle,
                elevation_deg: round_to(max_angle.max(0.0), 2),
                occluder_point,
                occluder_height_m: occluder_height,
            }
        })
        .collect();

    Ok(HorizonProfile {
        step_deg,
        centroid,
        target_height_m: target_height,
        samples,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::domain::footprint::Footprint;
    use crate::domain::projection::UtmZone;
    use geo::{MultiPolygon, Polygon};

    pub(crate) fn rect_footprint(index: usize, x0: f64, y0: f64, w: f64, h: f64, height_m: f64) -> Footprint {
        let ring = vec![(x0, y0), (x0 + w, y0), (x0 + w, y0 + h), (x0, y0 + h)];
        let poly = Polygon::new(ring.into(), vec![]);
        Footprint {
            index,
            id: index.to_string(),
            height_m,
            geographic: MultiPolygon::new(vec![poly.clone()]),
            projected: MultiPolygon::new(vec![poly]),
        }
    }

    pub(crate) fn collection(footprints: Vec<Footprint>) -> FootprintCollection {
        FootprintCollection::new(footprints, UtmZone { number: 32, north: true })
    }

    #[test]
    fn test_no_neighbors_gives_flat_profile() {
        let c = collection(vec![rect_footprint(0, 0.0, 0.0, 10.0, 10.0, 10.0)]);
        let profile = estimate_horizon(&c, 0, 10, 200.0).unwrap();
        assert_eq!(profile.samples.len(), 36);
        assert!(profile.elevations().iter().all(|e| *e == 0.0));
        assert_eq!(profile.to_userhorizon(), vec!["0.0"; 36].join(","));
    }

    #[test]
    fn test_bucket_count_follows_step() {
        let c = collection(vec![rect_footprint(0, 0.0, 0.0, 10.0, 10.0, 10.0)]);
        assert_eq!(estimate_horizon(&c, 0, 15, 200.0).unwrap().samples.len(), 24);
        assert_eq!(estimate_horizon(&c, 0, 5, 200.0).unwrap().samples.len(), 72);
    }

    #[test]
    fn test_taller_neighbor_to_the_north() {
        // Target centroid (5, 5); neighbor face starts 20 m north of it, 15 m taller.
        let c = collection(vec![
            rect_footprint(0, 0.0, 0.0, 10.0, 10.0, 10.0),
            rect_footprint(1, -5.0, 25.0, 20.0, 10.0, 25.0),
            rect_footprint(2, 60.0, -30.0, 10.0, 10.0, 8.0),
        ]);
        let profile = estimate_horizon(&c, 0, 10, 200.0).unwrap();

        let north = &profile.samples[0];
        let expected = round_to((15.0_f64 / 20.0).atan().to_degrees(), 2);
        assert_eq!(north.elevation_deg, expected);
        assert_eq!(north.occluder_height_m, Some(25.0));

        for sample in &profile.samples {
            let northward = sample.angle_deg <= 40 || sample.angle_deg >= 320;
            if !northward {
                assert_eq!(sample.elevation_deg, 0.0, "bucket {}", sample.angle_deg);
            }
            assert!(sample.elevation_deg >= 0.0);
        }
        assert!(profile.to_userhorizon().starts_with("36.87,"));
    }

    #[test]
    fn test_lower_neighbor_is_ignored() {
        let c = collection(vec![
            rect_footprint(0, 0.0, 0.0, 10.0, 10.0, 20.0),
            rect_footprint(1, -5.0, 25.0, 20.0, 10.0, 12.0),
        ]);
        let profile = estimate_horizon(&c, 0, 10, 200.0).unwrap();
        assert!(profile.elevations().iter().all(|e| *e == 0.0));
    }

    #[test]
    fn test_neighbor_beyond_ray_is_ignored() {
        let c = collection(vec![
            rect_footprint(0, 0.0, 0.0, 10.0, 10.0, 10.0),
            rect_footprint(1, -5.0, 300.0, 20.0, 10.0, 50.0),
        ]);
        let profile = estimate_horizon(&c, 0, 10, 200.0).unwrap();
        assert_eq!(profile.samples[0].elevation_deg, 0.0);
    }

    #[test]
    fn test_empty_and_missing_targets() {
        let mut empty = rect_footprint(1, 0.0, 0.0, 1.0, 1.0, 10.0);
        empty.projected = MultiPolygon::new(vec![]);
        let c = collection(vec![rect_footprint(0, 0.0, 0.0, 10.0, 10.0, 10.0), empty]);

        assert_eq!(
            estimate_horizon(&c, 1, 10, 200.0),
            Err(FootprintError::EmptyGeometry { index: 1 })
        );
        assert_eq!(
            estimate_horizon(&c, 7, 10, 200.0),
            Err(FootprintError::IndexOutOfRange { index: 7, len: 2 })
        );
    }

    #[test]
    fn test_format_degrees() {
        assert_eq!(format_degrees(0.0), "0.0");
        assert_eq!(format_degrees(12.5), "12.5");
        assert_eq!(format_degrees(36.87), "36.87");
        assert_eq!(format_degrees(45.0), "45.0");
        assert_eq!(flat_userhorizon(10), vec!["0"; 36].join(","));
    }
}
