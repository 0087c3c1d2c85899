// Panel orientation from a footprint's minimum bounding rectangle
use geo::{Coord, MultiPolygon};
use serde::{Deserialize, Serialize};

use super::geometry::{
    aspect_from_azimuth, decompose_rect, distinct_vertex_count, largest_part, minimum_bounding_rect,
    round_to, Side, LENGTH_EPS,
};

/// Long/short ratio below which a rectangle counts as nearly square.
pub const ORIENTATION_UNCERTAINTY_RATIO: f64 = 1.05;

/// Which comparison picked the south-facing long side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LongSideRule {
    /// Midpoint with the smaller Y.
    SouthMostMidpoint,
    /// Equal midpoint Y; midpoint with the smaller X.
    WestMostOnTie,
    /// Resolution failed, defaults applied.
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrientationResult {
    pub panel_azimuth_deg: f64,
    pub aspect_deg: f64,
    pub chosen_long_side_endpoints: Option<[[f64; 2]; 2]>,
    pub chosen_long_side_midpoint: Option<[f64; 2]>,
    pub long_side_midpoints: Vec<[f64; 2]>,
    pub chosen_side_azimuth_deg: f64,
    pub candidate_azimuths: [f64; 2],
    pub candidate_aspects: [f64; 2],
    pub chosen_candidate: usize,
    pub rule: LongSideRule,
    pub long_side_length: f64,
    pub short_side_length: f64,
    pub num_exterior_vertices: usize,
    pub uncertain: bool,
    pub error: Option<String>,
}

impl Default for OrientationResult {
    fn default() -> Self {
        Self {
            panel_azimuth_deg: 0.0,
            aspect_deg: -180.0,
            chosen_long_side_endpoints: None,
            chosen_long_side_midpoint: None,
            long_side_midpoints: Vec::new(),
            chosen_side_azimuth_deg: 0.0,
            candidate_azimuths: [0.0, 0.0],
            candidate_aspects: [-180.0, -180.0],
            chosen_candidate: 0,
            rule: LongSideRule::Fallback,
            long_side_length: 0.0,
            short_side_length: 0.0,
            num_exterior_vertices: 0,
            uncertain: true,
            error: None,
        }
    }
}

fn xy(c: Coord<f64>) -> [f64; 2] {
    [c.x, c.y]
}

/// Resolve panel orientation; never fails, problems land in `error` with
/// `uncertain` forced on and default azimuth/aspect.
pub fn resolve_orientation(geometry: &MultiPolygon<f64>) -> OrientationResult {
    let mut result = OrientationResult::default();
    if let Err(reason) = resolve_into(geometry, &mut result) {
        tracing::debug!("orientation fallback: {}", reason);
        result.error = Some(reason);
        result.uncertain = true;
    }
    result
}

fn resolve_into(geometry: &MultiPolygon<f64>, result: &mut OrientationResult) -> Result<(), String> {
    let polygon = largest_part(geometry).ok_or("input geometry is empty")?;
    let ring_len = polygon.exterior().0.len();
    if ring_len < 4 {
        return Err(format!("polygon exterior has only {} coordinates", ring_len));
    }
    result.num_exterior_vertices = ring_len - 1;

    let rect = minimum_bounding_rect(polygon).ok_or("minimum bounding rectangle is empty")?;
    let distinct = distinct_vertex_count(&rect);
    if distinct != 4 {
        return Err(format!("bounding rectangle has {} unique vertices, expected 4", distinct));
    }

    let sides = decompose_rect(&rect);
    let long_len = sides.long[0].length();
    let short_len = sides.short[0].length();
    result.long_side_length = round_to(long_len, 2);
    result.short_side_length = round_to(short_len, 2);
    if long_len < LENGTH_EPS {
        return Err("bounding rectangle is degenerate (zero length)".to_string());
    }

    let [first, second] = sides.long;
    let (m1, m2) = (first.midpoint(), second.midpoint());
    result.long_side_midpoints = vec![xy(m1), xy(m2)];

    let (chosen, rule): (Side, LongSideRule) = if m1.y < m2.y {
        (first, LongSideRule::SouthMostMidpoint)
    } else if m2.y < m1.y {
        (second, LongSideRule::SouthMostMidpoint)
    } else if m1.x <= m2.x {
        (first, LongSideRule::WestMostOnTie)
    } else {
        (second, LongSideRule::WestMostOnTie)
    };
    result.rule = rule;
    result.chosen_long_side_midpoint = Some(xy(chosen.midpoint()));
    result.chosen_long_side_endpoints = Some([xy(chosen.p1), xy(chosen.p2)]);

    let side_azimuth = chosen.azimuth_deg();
    result.chosen_side_azimuth_deg = round_to(side_azimuth, 2);

    let cand0 = (side_azimuth + 90.0) % 360.0;
    let cand1 = (side_azimuth - 90.0 + 360.0) % 360.0;
    result.candidate_azimuths = [round_to(cand0, 2), round_to(cand1, 2)];

    let aspect0 = aspect_from_azimuth(cand0);
    let aspect1 = aspect_from_azimuth(cand1);
    result.candidate_aspects = [round_to(aspect0, 2), round_to(aspect1, 2)];

    result.chosen_candidate = if aspect0.abs() <= aspect1.abs() { 0 } else { 1 };
    result.panel_azimuth_deg = result.candidate_azimuths[result.chosen_candidate];
    result.aspect_deg = result.candidate_aspects[result.chosen_candidate];

    result.uncertain = if result.num_exterior_vertices > 4 {
        true
    } else if short_len > LENGTH_EPS {
        long_len / short_len < ORIENTATION_UNCERTAINTY_RATIO
    } else {
        true
    };

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{polygon, Polygon};

    fn single(poly: Polygon<f64>) -> MultiPolygon<f64> {
        MultiPolygon::new(vec![poly])
    }

    #[test]
    fn test_east_west_rectangle_faces_south() {
        let res = resolve_orientation(&single(polygon![
            (x: 0.0, y: 0.0), (x: 10.0, y: 0.0), (x: 10.0, y: 4.0), (x: 0.0, y: 4.0)
        ]));
        assert_eq!(res.panel_azimuth_deg, 180.0);
        assert_eq!(res.aspect_deg, 0.0);
        assert!(!res.uncertain);
        assert_eq!(res.rule, LongSideRule::SouthMostMidpoint);
        assert_eq!(res.chosen_long_side_midpoint, Some([5.0, 0.0]));
        assert_eq!(res.long_side_length, 10.0);
        assert_eq!(res.short_side_length, 4.0);
        assert_eq!(res.num_exterior_vertices, 4);
        assert_eq!(res.error, None);
    }

    #[test]
    fn test_north_south_rectangle_uses_tie_break() {
        let res = resolve_orientation(&single(polygon![
            (x: 0.0, y: 0.0), (x: 4.0, y: 0.0), (x: 4.0, y: 10.0), (x: 0.0, y: 10.0)
        ]));
        assert_eq!(res.panel_azimuth_deg, 90.0);
        assert_eq!(res.aspect_deg, -90.0);
        assert!(!res.uncertain);
        assert_eq!(res.rule, LongSideRule::WestMostOnTie);
        assert_eq!(res.chosen_long_side_midpoint, Some([0.0, 5.0]));
    }

    #[test]
    fn test_near_square_is_uncertain() {
        let res = resolve_orientation(&single(polygon![
            (x: 0.0, y: 0.0), (x: 10.0, y: 0.0), (x: 10.0, y: 9.8), (x: 0.0, y: 9.8)
        ]));
        assert!(res.uncertain);
        assert_eq!(res.error, None);
    }

    #[test]
    fn test_complex_polygon_is_uncertain() {
        let res = resolve_orientation(&single(polygon![
            (x: 0.0, y: 0.0), (x: 10.0, y: 0.0), (x: 10.0, y: 4.0), (x: 5.0, y: 6.0), (x: 0.0, y: 4.0)
        ]));
        assert!(res.uncertain);
        assert_eq!(res.num_exterior_vertices, 5);
        assert_eq!(res.panel_azimuth_deg, 180.0);
    }

    #[test]
    fn test_largest_part_is_used() {
        let small = polygon![(x: 100.0, y: 0.0), (x: 102.0, y: 0.0), (x: 102.0, y: 8.0), (x: 100.0, y: 8.0)];
        let big = polygon![(x: 0.0, y: 0.0), (x: 20.0, y: 0.0), (x: 20.0, y: 5.0), (x: 0.0, y: 5.0)];
        let res = resolve_orientation(&MultiPolygon::new(vec![small, big]));
        assert_eq!(res.long_side_length, 20.0);
        assert_eq!(res.aspect_deg, 0.0);
    }

    #[test]
    fn test_empty_geometry_falls_back() {
        let res = resolve_orientation(&MultiPolygon::new(vec![]));
        assert!(res.uncertain);
        assert!(res.error.is_some());
        assert_eq!(res.panel_azimuth_deg, 0.0);
        assert_eq!(res.aspect_deg, -180.0);
        assert_eq!(res.rule, LongSideRule::Fallback);
    }

    #[test]
    fn test_degenerate_polygon_falls_back() {
        let res = resolve_orientation(&single(polygon![
            (x: 0.0, y: 0.0), (x: 5.0, y: 0.0), (x: 10.0, y: 0.0)
        ]));
        assert!(res.uncertain);
        assert!(res.error.is_some());
        assert_eq!(res.aspect_deg, -180.0);
    }

    #[test]
    fn test_rotated_rectangle_aspect() {
        // 20 x 6 rectangle rotated 30 degrees counter-clockwise.
        let (s, c) = 30f64.to_radians().sin_cos();
        let rot = |x: f64, y: f64| (x * c - y * s, x * s + y * c);
        let pts = [rot(0.0, 0.0), rot(20.0, 0.0), rot(20.0, 6.0), rot(0.0, 6.0)];
        let poly = Polygon::new(pts.to_vec().into(), vec![]);
        let res = resolve_orientation(&single(poly));
        assert!(!res.uncertain);
        // The lower long side faces south-east.
        assert!((res.aspect_deg + 30.0).abs() < 0.01, "aspect {}", res.aspect_deg);
        assert!((res.panel_azimuth_deg - 150.0).abs() < 0.01);
    }
}
