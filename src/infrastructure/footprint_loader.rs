// GeoJSON footprint loading and projection into a shared UTM zone
use std::path::Path;

use anyhow::Context;
use geo::{Centroid, LineString, MultiPolygon, Polygon};
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::domain::footprint::{infer_building_id, Footprint, FootprintCollection, HeightRules};
use crate::domain::projection::UtmZone;

type Position = Vec<f64>;

#[derive(Debug, Deserialize)]
struct FeatureCollection {
    #[serde(default)]
    features: Vec<Feature>,
}

#[derive(Debug, Deserialize)]
struct Feature {
    #[serde(default)]
    properties: Option<Map<String, Value>>,
    #[serde(default)]
    geometry: Option<Geometry>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum Geometry {
    Polygon { coordinates: Vec<Vec<Position>> },
    MultiPolygon { coordinates: Vec<Vec<Vec<Position>>> },
    #[serde(other)]
    Unsupported,
}

fn ring(positions: &[Position]) -> LineString<f64> {
    positions
        .iter()
        .filter(|p| p.len() >= 2)
        .map(|p| (p[0], p[1]))
        .collect::<Vec<_>>()
        .into()
}

fn polygon(rings: &[Vec<Position>]) -> Option<Polygon<f64>> {
    let (exterior, interiors) = rings.split_first()?;
    Some(Polygon::new(ring(exterior), interiors.iter().map(|r| ring(r)).collect()))
}

fn to_multi_polygon(geometry: Option<&Geometry>) -> MultiPolygon<f64> {
    let parts = match geometry {
        Some(Geometry::Polygon { coordinates }) => polygon(coordinates).into_iter().collect(),
        Some(Geometry::MultiPolygon { coordinates }) => coordinates.iter().filter_map(|p| polygon(p)).collect(),
        Some(Geometry::Unsupported) | None => Vec::new(),
    };
    MultiPolygon::new(parts)
}

/// Parse a WGS84 FeatureCollection. Features without polygonal geometry keep
/// their index as empty footprints.
pub fn parse_footprints(geojson: &str, rules: &HeightRules) -> anyhow::Result<FootprintCollection> {
    let collection: FeatureCollection =
        serde_json::from_str(geojson).context("Failed to parse footprint GeoJSON")?;

    let geographic: Vec<MultiPolygon<f64>> = collection
        .features
        .iter()
        .map(|f| to_multi_polygon(f.geometry.as_ref()))
        .collect();

    let all_parts = MultiPolygon::new(geographic.iter().flat_map(|g| g.0.iter().cloned()).collect());
    let center = all_parts
        .centroid()
        .context("Footprint collection contains no polygon geometry")?;
    let zone = UtmZone::from_lon_lat(center.x(), center.y());

    let empty = Map::new();
    let footprints = collection
        .features
        .iter()
        .zip(geographic)
        .enumerate()
        .map(|(index, (feature, geographic))| {
            let properties = feature.properties.as_ref().unwrap_or(&empty);
            Footprint {
                index,
                id: infer_building_id(properties, index),
                height_m: rules.estimate(properties),
                projected: zone.project_geometry(&geographic),
                geographic,
            }
        })
        .collect::<Vec<_>>();

    let empty_count = footprints.iter().filter(|f| f.is_empty()).count();
    if empty_count > 0 {
        tracing::warn!("{} footprints have no polygon geometry", empty_count);
    }
    tracing::info!("Loaded {} footprints, projected to EPSG:{}", footprints.len(), zone.epsg());

    Ok(FootprintCollection::new(footprints, zone))
}

pub fn load_footprints(path: &Path, rules: &HeightRules) -> anyhow::Result<FootprintCollection> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read footprints from {}", path.display()))?;
    parse_footprints(&text, rules)
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::Area;
    use serde_json::json;

    fn square(lon: f64, lat: f64, size: f64) -> Value {
        json!([[
            [lon, lat], [lon + size, lat], [lon + size, lat + size], [lon, lat + size], [lon, lat]
        ]])
    }

    #[test]
    fn test_parse_feature_collection() {
        let geojson = json!({
            "type": "FeatureCollection",
            "features": [
                {
                    "type": "Feature",
                    "properties": {"OBJECTID": 101, "building:levels": "4"},
                    "geometry": {"type": "Polygon", "coordinates": square(9.19, 45.46, 0.0001)}
                },
                {
                    "type": "Feature",
                    "properties": {"Height": 21.0},
                    "geometry": {"type": "MultiPolygon", "coordinates": [square(9.1905, 45.46, 0.0001)]}
                },
                {
                    "type": "Feature",
                    "properties": null,
                    "geometry": {"type": "Point", "coordinates": [9.19, 45.46]}
                }
            ]
        })
        .to_string();

        let collection = parse_footprints(&geojson, &HeightRules::default()).unwrap();
        assert_eq!(collection.len(), 3);
        assert_eq!(collection.crs(), "EPSG:32632");

        let first = collection.get(0).unwrap();
        assert_eq!(first.id, "101");
        assert_eq!(first.height_m, 12.0);
        let area = first.projected.unsigned_area();
        assert!(area > 84.0 && area < 90.0, "area {}", area);

        let second = collection.get(1).unwrap();
        assert_eq!(second.id, "1");
        assert_eq!(second.height_m, 21.0);

        let third = collection.get(2).unwrap();
        assert!(third.is_empty());
        assert_eq!(third.id, "2");
        assert_eq!(third.height_m, 10.0);
    }

    #[test]
    fn test_southern_hemisphere_zone() {
        let geojson = json!({
            "type": "FeatureCollection",
            "features": [{
                "type": "Feature",
                "properties": {},
                "geometry": {"type": "Polygon", "coordinates": square(151.2, -33.87, 0.0002)}
            }]
        })
        .to_string();

        let collection = parse_footprints(&geojson, &HeightRules::default()).unwrap();
        assert_eq!(collection.crs(), "EPSG:32756");
        let centroid = collection.get(0).unwrap().centroid().unwrap();
        assert!(centroid.y > 6_000_000.0 && centroid.y < 6_500_000.0);
    }

    #[test]
    fn test_collection_without_polygons_is_rejected() {
        let geojson = r#"{"type": "FeatureCollection", "features": []}"#;
        assert!(parse_footprints(geojson, &HeightRules::default()).is_err());
    }
}
