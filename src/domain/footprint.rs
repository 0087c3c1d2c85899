// Building footprint domain model
use geo::{Centroid, Coord, MultiPolygon};
use serde_json::{Map, Value};
use thiserror::Error;

use super::projection::UtmZone;

pub const DEFAULT_HEIGHT_M: f64 = 10.0;
pub const LEVEL_HEIGHT_M: f64 = 3.0;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum FootprintError {
    #[error("building index {index} out of range [0, {len})")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("target geometry of building {index} is empty")]
    EmptyGeometry { index: usize },
}

/// How a matched attribute converts to meters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HeightUnit {
    Meters,
    Levels,
}

/// Ordered attribute rules used to infer a building height.
#[derive(Debug, Clone)]
pub struct HeightRules {
    pub rules: Vec<(String, HeightUnit)>,
    pub default_height_m: f64,
    pub level_height_m: f64,
}

impl Default for HeightRules {
    fn default() -> Self {
        Self::new(DEFAULT_HEIGHT_M, LEVEL_HEIGHT_M)
    }
}

impl HeightRules {
    pub fn new(default_height_m: f64, level_height_m: f64) -> Self {
        let rules = [
            ("Height", HeightUnit::Meters),
            ("building:height", HeightUnit::Meters),
            ("bldg:height", HeightUnit::Meters),
            ("roof:height", HeightUnit::Meters),
            ("levels", HeightUnit::Levels),
            ("building:levels", HeightUnit::Levels),
            ("floors", HeightUnit::Levels),
        ]
        .into_iter()
        .map(|(k, u)| (k.to_string(), u))
        .collect();

        Self {
            rules,
            default_height_m,
            level_height_m,
        }
    }

    /// First rule with a positive value wins; otherwise the default height.
    pub fn estimate(&self, properties: &Map<String, Value>) -> f64 {
        for (key, unit) in &self.rules {
            let Some(value) = properties.get(key).and_then(attribute_number) else {
                continue;
            };
            if value <= 0.0 {
                continue;
            }
            return match unit {
                HeightUnit::Meters => value,
                HeightUnit::Levels => value * self.level_height_m,
            };
        }
        self.default_height_m
    }
}

const ID_KEYS: [&str; 11] = [
    "building_id", "b_id", "id", "ID", "fid", "FID", "objectid", "OBJECTID", "OBJECTID_1", "gid", "GID",
];

/// Building id from the first known id attribute, or the feature index.
pub fn infer_building_id(properties: &Map<String, Value>, index: usize) -> String {
    ID_KEYS
        .iter()
        .filter_map(|k| properties.get(*k))
        .find_map(|v| match v {
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
        .unwrap_or_else(|| index.to_string())
}

/// Numbers, or strings such as "12.5 m" whose first token is a number.
fn attribute_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.split(' ').next()?.parse::<f64>().ok().filter(|v| v.is_finite()),
        _ => None,
    }
}

#[derive(Debug, Clone)]
pub struct Footprint {
    pub index: usize,
    pub id: String,
    pub height_m: f64,
    /// Original lon/lat geometry.
    pub geographic: MultiPolygon<f64>,
    /// Geometry in the collection's UTM zone (meters).
    pub projected: MultiPolygon<f64>,
}

impl Footprint {
    pub fn is_empty(&self) -> bool {
        self.projected.0.iter().all(|p| p.exterior().0.is_empty())
    }

    /// Projected centroid of the whole footprint.
    pub fn centroid(&self) -> Option<Coord<f64>> {
        self.projected.centroid().map(|p| p.0)
    }
}

/// Footprints in input order, sharing one metric projection.
#[derive(Debug, Clone)]
pub struct FootprintCollection {
    pub footprints: Vec<Footprint>,
    pub zone: UtmZone,
}

impl FootprintCollection {
    pub fn new(footprints: Vec<Footprint>, zone: UtmZone) -> Self {
        Self { footprints, zone }
    }

    pub fn len(&self) -> usize {
        self.footprints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.footprints.is_empty()
    }

    pub fn get(&self, index: usize) -> Result<&Footprint, FootprintError> {
        self.footprints.get(index).ok_or(FootprintError::IndexOutOfRange {
            index,
            len: self.footprints.len(),
        })
    }

    pub fn crs(&self) -> String {
        format!("EPSG:{}", self.zone.epsg())
    }
}
