// Planar geometry helpers shared by the horizon, orientation and export code
use geo::line_intersection::{line_intersection, LineIntersection};
use geo::{Area, Contains, ConvexHull, Coord, InteriorPoint, Intersects, Line, MultiPolygon, Polygon};

/// Lengths below this are treated as zero (meters).
pub const LENGTH_EPS: f64 = 1e-6;

/// Round to a fixed number of decimals, ties to even (0.125 -> 0.12).
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round_ties_even() / factor
}

/// Wrap an angle in degrees into [-180, 180).
pub fn wrap_to_minus180_180(deg: f64) -> f64 {
    (deg + 180.0).rem_euclid(360.0) - 180.0
}

/// Convert a 0..360 azimuth (N=0, E=90) into the PVGIS aspect (-180..180, S=0).
pub fn aspect_from_azimuth(azimuth_deg: f64) -> f64 {
    wrap_to_minus180_180(azimuth_deg - 180.0)
}

/// Azimuth of the direction `from -> to`, normalized to [0, 360).
pub fn azimuth_deg(from: Coord<f64>, to: Coord<f64>) -> f64 {
    let dx = to.x - from.x;
    let dy = to.y - from.y;
    (dx.atan2(dy).to_degrees() + 360.0) % 360.0
}

pub fn distance(a: Coord<f64>, b: Coord<f64>) -> f64 {
    (b.x - a.x).hypot(b.y - a.y)
}

pub fn midpoint(a: Coord<f64>, b: Coord<f64>) -> Coord<f64> {
    Coord {
        x: (a.x + b.x) / 2.0,
        y: (a.y + b.y) / 2.0,
    }
}

/// Perpendicular projection of `c` onto the segment `p1 -> p2`, clamped to the segment.
pub fn project_onto_segment(c: Coord<f64>, p1: Coord<f64>, p2: Coord<f64>) -> Coord<f64> {
    let vx = p2.x - p1.x;
    let vy = p2.y - p1.y;
    let len2 = vx * vx + vy * vy;
    if len2 < LENGTH_EPS * LENGTH_EPS {
        return p1;
    }
    let t = (((c.x - p1.x) * vx + (c.y - p1.y) * vy) / len2).clamp(0.0, 1.0);
    Coord {
        x: p1.x + t * vx,
        y: p1.y + t * vy,
    }
}

/// Largest-area part of a multi-part footprint.
pub fn largest_part(geometry: &MultiPolygon<f64>) -> Option<&Polygon<f64>> {
    geometry
        .0
        .iter()
        .max_by(|a, b| a.unsigned_area().total_cmp(&b.unsigned_area()))
}

/// Point of `polygon` hit by the segment `origin -> end` that lies closest to `origin`.
///
/// When `origin` is inside the polygon the nearest point is `origin` itself.
/// Returns `None` when the segment misses the polygon.
pub fn nearest_intersection(
    origin: Coord<f64>,
    end: Coord<f64>,
    polygon: &Polygon<f64>,
) -> Option<Coord<f64>> {
    if polygon.contains(&origin) {
        return Some(origin);
    }

    let ray = Line::new(origin, end);
    let rings = std::iter::once(polygon.exterior()).chain(polygon.interiors().iter());

    let mut nearest: Option<(f64, Coord<f64>)> = None;
    let mut consider = |pt: Coord<f64>| {
        let d = distance(origin, pt);
        if nearest.is_none_or(|(best, _)| d < best) {
            nearest = Some((d, pt));
        }
    };

    for ring in rings {
        for edge in ring.lines() {
            match line_intersection(ray, edge) {
                Some(LineIntersection::SinglePoint { intersection, .. }) => consider(intersection),
                Some(LineIntersection::Collinear { intersection }) => {
                    consider(intersection.start);
                    consider(intersection.end);
                }
                None => {}
            }
        }
    }

    nearest.map(|(_, pt)| pt)
}

/// Nearest hit over every part of a multi-part footprint, falling back to an
/// interior representative point when the segment touches the geometry but
/// no single hit point can be extracted.
pub fn nearest_intersection_multi(
    origin: Coord<f64>,
    end: Coord<f64>,
    geometry: &MultiPolygon<f64>,
) -> Option<Coord<f64>> {
    let ray = Line::new(origin, end);
    if !geometry.0.iter().any(|part| ray.intersects(part)) {
        return None;
    }

    let hit = geometry
        .0
        .iter()
        .filter_map(|part| nearest_intersection(origin, end, part))
        .min_by(|a, b| distance(origin, *a).total_cmp(&distance(origin, *b)));

    hit.or_else(|| geometry.interior_point().map(|p| p.0))
}

/// One edge of a rectangle, kept in ring order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Side {
    pub p1: Coord<f64>,
    pub p2: Coord<f64>,
}

impl Side {
    pub fn length(&self) -> f64 {
        distance(self.p1, self.p2)
    }

    pub fn midpoint(&self) -> Coord<f64> {
        midpoint(self.p1, self.p2)
    }

    pub fn azimuth_deg(&self) -> f64 {
        azimuth_deg(self.p1, self.p2)
    }
}

/// Rectangle sides sorted by length, longest first.
#[derive(Debug, Clone, Copy)]
pub struct RectSides {
    pub long: [Side; 2],
    pub short: [Side; 2],
}

/// Minimum-area rectangle enclosing `polygon`, as four corners wound clockwise.
///
/// Uses rotating calipers over the convex hull edges; the first edge reaching
/// the minimum area wins, so axis-aligned inputs produce exact corners.
pub fn minimum_bounding_rect(polygon: &Polygon<f64>) -> Option<[Coord<f64>; 4]> {
    let hull = polygon.convex_hull();
    let mut pts: Vec<Coord<f64>> = hull.exterior().0.clone();
    if pts.len() > 1 && pts.first() == pts.last() {
        pts.pop();
    }
    if pts.len() < 2 {
        return None;
    }

    let mut best: Option<(f64, [Coord<f64>; 4])> = None;
    for i in 0..pts.len() {
        let a = pts[i];
        let b = pts[(i + 1) % pts.len()];
        let len = distance(a, b);
        if len < LENGTH_EPS {
            continue;
        }
        let u = Coord { x: (b.x - a.x) / len, y: (b.y - a.y) / len };
        let v = Coord { x: -u.y, y: u.x };

        let (mut min_u, mut max_u) = (f64::INFINITY, f64::NEG_INFINITY);
        let (mut min_v, mut max_v) = (f64::INFINITY, f64::NEG_INFINITY);
        for p in &pts {
            let pu = p.x * u.x + p.y * u.y;
            let pv = p.x * v.x + p.y * v.y;
            min_u = min_u.min(pu);
            max_u = max_u.max(pu);
            min_v = min_v.min(pv);
            max_v = max_v.max(pv);
        }

        let area = (max_u - min_u) * (max_v - min_v);
        if best.as_ref().is_none_or(|(best_area, _)| area < *best_area) {
            let corner = |su: f64, sv: f64| Coord {
                x: su * u.x + sv * v.x,
                y: su * u.y + sv * v.y,
            };
            let rect = [
                corner(min_u, min_v),
                corner(max_u, min_v),
                corner(max_u, max_v),
                corner(min_u, max_v),
            ];
            best = Some((area, rect));
        }
    }

    best.map(|(_, rect)| orient_clockwise(rect))
}

fn orient_clockwise(mut rect: [Coord<f64>; 4]) -> [Coord<f64>; 4] {
    let signed_twice_area: f64 = (0..4)
        .map(|i| {
            let a = rect[i];
            let b = rect[(i + 1) % 4];
            a.x * b.y - b.x * a.y
        })
        .sum();
    if signed_twice_area > 0.0 {
        rect.reverse();
    }
    rect
}

/// Number of pairwise-distinct corners.
pub fn distinct_vertex_count(rect: &[Coord<f64>; 4]) -> usize {
    let mut distinct: Vec<Coord<f64>> = Vec::with_capacity(4);
    for c in rect {
        if !distinct.iter().any(|d| distance(*c, *d) < LENGTH_EPS) {
            distinct.push(*c);
        }
    }
    distinct.len()
}

/// Split a rectangle into its two long and two short sides.
pub fn decompose_rect(rect: &[Coord<f64>; 4]) -> RectSides {
    let mut sides: Vec<Side> = (0..4)
        .map(|i| Side { p1: rect[i], p2: rect[(i + 1) % 4] })
        .collect();
    sides.sort_by(|a, b| b.length().total_cmp(&a.length()));
    RectSides {
        long: [sides[0], sides[1]],
        short: [sides[2], sides[3]],
    }
}

/// Panel rectangle drawn on the long side `p1 -> p2`, extending toward `centroid`.
///
/// Height is the distance from the centroid to its projection on the side; a
/// centroid lying on the side gets 10% of the side length instead.
pub fn panel_rectangle(centroid: Coord<f64>, p1: Coord<f64>, p2: Coord<f64>) -> Option<Polygon<f64>> {
    let len = distance(p1, p2);
    if len < LENGTH_EPS {
        return None;
    }

    let mut perp = Coord { x: -(p2.y - p1.y) / len, y: (p2.x - p1.x) / len };
    let mid = midpoint(p1, p2);
    if perp.x * (centroid.x - mid.x) + perp.y * (centroid.y - mid.y) < 0.0 {
        perp = Coord { x: -perp.x, y: -perp.y };
    }

    let foot = project_onto_segment(centroid, p1, p2);
    let mut height = distance(centroid, foot);
    if height < LENGTH_EPS {
        height = 0.1 * len;
    }

    let p3 = Coord { x: p2.x + height * perp.x, y: p2.y + height * perp.y };
    let p4 = Coord { x: p1.x + height * perp.x, y: p1.y + height * perp.y };
    Some(Polygon::new(vec![p1, p2, p3, p4].into(), vec![]))
}
