// Mapper from processed results to GeoJSON map layers
use std::collections::BTreeMap;

use geo::{Coord, LineString, MultiPolygon, Polygon};
use serde_json::{json, Value};

use crate::domain::footprint::FootprintCollection;
use crate::domain::geometry::{panel_rectangle, round_to};
use crate::domain::result::ProcessingResult;

const QUINTILE_COLORS: [&str; 5] = ["#d73027", "#fc8d59", "#fee08b", "#91bfdb", "#1a9850"];

/// Capacity-factor category and its fill color.
pub fn cf_category(capacity_factor: f64) -> (&'static str, &'static str) {
    if capacity_factor >= 0.20 {
        ("high", "#2ECC71")
    } else if capacity_factor >= 0.15 {
        ("medium", "#F1C40F")
    } else if capacity_factor >= 0.10 {
        ("low", "#E67E22")
    } else {
        ("very_low", "#E74C3C")
    }
}

/// Linear-interpolated percentile of sorted values.
fn percentile(sorted: &[f64], p: f64) -> f64 {
    let rank = p / 100.0 * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = (lo + 1).min(sorted.len() - 1);
    sorted[lo] + (rank - lo as f64) * (sorted[hi] - sorted[lo])
}

#[derive(Debug, Clone, PartialEq)]
pub struct Quintiles {
    pub bounds: Vec<f64>,
    pub labels: Vec<String>,
}

impl Quintiles {
    /// Bounds over the positive energies; `[0, 1]` when there are none.
    pub fn from_energies(energies: impl IntoIterator<Item = f64>) -> Self {
        let mut values: Vec<f64> = energies.into_iter().filter(|v| *v > 0.0).collect();
        if values.is_empty() {
            return Self {
                bounds: vec![0.0, 1.0],
                labels: vec!["0-1".to_string()],
            };
        }
        values.sort_by(f64::total_cmp);

        let mut bounds = vec![values[0]];
        bounds.extend([20.0, 40.0, 60.0, 80.0].iter().map(|p| percentile(&values, *p)));
        bounds.push(values[values.len() - 1]);

        let labels = bounds
            .windows(2)
            .map(|w| format!("{:.0}-{:.0}", w[0], w[1]))
            .collect();
        Self { bounds, labels }
    }

    /// Bucket of `value`; non-positive values land in the lowest bucket and
    /// values at or above the top bound in the highest.
    pub fn bucket(&self, value: f64) -> usize {
        if value <= 0.0 {
            return 0;
        }
        self.bounds
            .windows(2)
            .position(|w| w[0] <= value && value < w[1])
            .unwrap_or(self.bounds.len() - 2)
    }

    pub fn label(&self, bucket: usize) -> &str {
        &self.labels[bucket.min(self.labels.len() - 1)]
    }
}

fn ring_coordinates(ring: &LineString<f64>) -> Vec<[f64; 2]> {
    ring.0.iter().map(|c| [c.x, c.y]).collect()
}

fn polygon_coordinates(polygon: &Polygon<f64>) -> Vec<Vec<[f64; 2]>> {
    std::iter::once(polygon.exterior())
        .chain(polygon.interiors())
        .map(ring_coordinates)
        .collect()
}

/// GeoJSON geometry; single-part footprints are written as `Polygon`.
fn geometry_to_geojson(geometry: &MultiPolygon<f64>) -> Value {
    match geometry.0.as_slice() {
        [single] => json!({"type": "Polygon", "coordinates": polygon_coordinates(single)}),
        parts => json!({
            "type": "MultiPolygon",
            "coordinates": parts.iter().map(polygon_coordinates).collect::<Vec<_>>()
        }),
    }
}

fn feature_collection(features: Vec<Value>) -> Value {
    json!({"type": "FeatureCollection", "features": features})
}

/// One feature per processed building, colored by capacity factor.
pub fn buildings_layer(collection: &FootprintCollection, results: &BTreeMap<usize, ProcessingResult>) -> Value {
    let features = results
        .iter()
        .filter_map(|(index, result)| {
            let footprint = collection.footprints.get(*index)?;
            let energy = result.annual_metrics.energy_kwh;
            let cf = result.annual_metrics.capacity_factor;
            let (category, color) = cf_category(cf);

            Some(json!({
                "type": "Feature",
                "geometry": geometry_to_geojson(&footprint.geographic),
                "properties": {
                    "building_index": index,
                    "building_id": result.building_id,
                    "energy_kwh": round_to(energy, 2),
                    "capacity_factor": round_to(cf, 4),
                    "cf_category": category,
                    "color": color,
                    "peak_power_kwp": result.building.peak_power_kwp,
                    "popup_text": format!(
                        "Building {}: {:.0} kWh/yr, CF {:.1}%",
                        result.building_id,
                        energy,
                        cf * 100.0
                    ),
                }
            }))
        })
        .collect();

    feature_collection(features)
}

/// Panel rectangles on the chosen long side, colored by energy quintile.
/// Rectangles are built in the projected zone and written as lon/lat.
pub fn panels_layer(collection: &FootprintCollection, results: &BTreeMap<usize, ProcessingResult>) -> Value {
    let quintiles = Quintiles::from_energies(results.values().map(|r| r.annual_metrics.energy_kwh));

    let features = results
        .iter()
        .filter_map(|(index, result)| {
            let footprint = collection.footprints.get(*index)?;
            let [p1, p2] = result.building.long_side_endpoints?;
            let centroid = footprint.centroid()?;
            let rect = panel_rectangle(
                centroid,
                Coord { x: p1[0], y: p1[1] },
                Coord { x: p2[0], y: p2[1] },
            )?;
            let rect_ll = collection.zone.unproject_geometry(&MultiPolygon::new(vec![rect]));

            let energy = result.annual_metrics.energy_kwh;
            let bucket = quintiles.bucket(energy);
            let label = quintiles.label(bucket);

            Some(json!({
                "type": "Feature",
                "geometry": geometry_to_geojson(&rect_ll),
                "properties": {
                    "building_index": index,
                    "building_id": result.building_id,
                    "energy_kwh": round_to(energy, 2),
                    "quintile": bucket,
                    "color": QUINTILE_COLORS[bucket.min(QUINTILE_COLORS.len() - 1)],
                    "label": label,
                    "popup_text": format!(
                        "Building {} – {:.0} kWh/yr – Q{} ({})",
                        result.building_id,
                        energy,
                        bucket + 1,
                        label
                    ),
                }
            }))
        })
        .collect();

    feature_collection(features)
}
