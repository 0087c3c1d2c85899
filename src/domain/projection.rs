// UTM (transverse Mercator on WGS84) zone selection and projection
use geo::{Coord, MapCoords, MultiPolygon};
use serde::{Deserialize, Serialize};

const WGS84_A: f64 = 6_378_137.0;
const WGS84_F: f64 = 1.0 / 298.257_223_563;
const K0: f64 = 0.9996;
const FALSE_EASTING: f64 = 500_000.0;
const FALSE_NORTHING_SOUTH: f64 = 10_000_000.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UtmZone {
    pub number: u8,
    pub north: bool,
}

impl UtmZone {
    /// Zone containing a lon/lat point.
    pub fn from_lon_lat(lon: f64, lat: f64) -> Self {
        let number = (((lon + 180.0) / 6.0).floor() as i32 + 1).clamp(1, 60) as u8;
        Self {
            number,
            north: lat >= 0.0,
        }
    }

    pub fn epsg(&self) -> u32 {
        let base = if self.north { 32600 } else { 32700 };
        base + self.number as u32
    }

    fn central_meridian_rad(&self) -> f64 {
        ((self.number as f64 - 1.0) * 6.0 - 180.0 + 3.0).to_radians()
    }

    fn false_northing(&self) -> f64 {
        if self.north { 0.0 } else { FALSE_NORTHING_SOUTH }
    }

    /// lon/lat degrees to easting/northing meters.
    pub fn project(&self, lon: f64, lat: f64) -> Coord<f64> {
        let e2 = WGS84_F * (2.0 - WGS84_F);
        let ep2 = e2 / (1.0 - e2);
        let phi = lat.to_radians();
        let (sin_phi, cos_phi) = phi.sin_cos();
        let tan_phi = phi.tan();

        let n = WGS84_A / (1.0 - e2 * sin_phi * sin_phi).sqrt();
        let t = tan_phi * tan_phi;
        let c = ep2 * cos_phi * cos_phi;
        let a = cos_phi * (lon.to_radians() - self.central_meridian_rad());
        let m = meridian_arc(phi, e2);

        let x = K0
            * n
            * (a + (1.0 - t + c) * a.powi(3) / 6.0
                + (5.0 - 18.0 * t + t * t + 72.0 * c - 58.0 * ep2) * a.powi(5) / 120.0)
            + FALSE_EASTING;
        let y = K0
            * (m + n
                * tan_phi
                * (a * a / 2.0
                    + (5.0 - t + 9.0 * c + 4.0 * c * c) * a.powi(4) / 24.0
                    + (61.0 - 58.0 * t + t * t + 600.0 * c - 330.0 * ep2) * a.powi(6) / 720.0))
            + self.false_northing();

        Coord { x, y }
    }

    /// Easting/northing meters back to (lon, lat) degrees.
    pub fn unproject(&self, point: Coord<f64>) -> (f64, f64) {
        let e2 = WGS84_F * (2.0 - WGS84_F);
        let ep2 = e2 / (1.0 - e2);
        let e1 = (1.0 - (1.0 - e2).sqrt()) / (1.0 + (1.0 - e2).sqrt());

        let m = (point.y - self.false_northing()) / K0;
        let mu = m / (WGS84_A * (1.0 - e2 / 4.0 - 3.0 * e2 * e2 / 64.0 - 5.0 * e2.powi(3) / 256.0));
        let phi1 = mu
            + (3.0 * e1 / 2.0 - 27.0 * e1.powi(3) / 32.0) * (2.0 * mu).sin()
            + (21.0 * e1 * e1 / 16.0 - 55.0 * e1.powi(4) / 32.0) * (4.0 * mu).sin()
            + (151.0 * e1.powi(3) / 96.0) * (6.0 * mu).sin()
            + (1097.0 * e1.powi(4) / 512.0) * (8.0 * mu).sin();

        let (sin_phi1, cos_phi1) = phi1.sin_cos();
        let tan_phi1 = phi1.tan();
        let c1 = ep2 * cos_phi1 * cos_phi1;
        let t1 = tan_phi1 * tan_phi1;
        let denom = 1.0 - e2 * sin_phi1 * sin_phi1;
        let n1 = WGS84_A / denom.sqrt();
        let r1 = WGS84_A * (1.0 - e2) / denom.powf(1.5);
        let d = (point.x - FALSE_EASTING) / (n1 * K0);

        let lat = phi1
            - (n1 * tan_phi1 / r1)
                * (d * d / 2.0
                    - (5.0 + 3.0 * t1 + 10.0 * c1 - 4.0 * c1 * c1 - 9.0 * ep2) * d.powi(4) / 24.0
                    + (61.0 + 90.0 * t1 + 298.0 * c1 + 45.0 * t1 * t1 - 252.0 * ep2 - 3.0 * c1 * c1)
                        * d.powi(6)
                        / 720.0);
        let lon = self.central_meridian_rad()
            + (d - (1.0 + 2.0 * t1 + c1) * d.powi(3) / 6.0
                + (5.0 - 2.0 * c1 + 28.0 * t1 - 3.0 * c1 * c1 + 8.0 * ep2 + 24.0 * t1 * t1) * d.powi(5)
                    / 120.0)
                / cos_phi1;

        (lon.to_degrees(), lat.to_degrees())
    }

    pub fn project_geometry(&self, geometry: &MultiPolygon<f64>) -> MultiPolygon<f64> {
        geometry.map_coords(|c| self.project(c.x, c.y))
    }

    pub fn unproject_geometry(&self, geometry: &MultiPolygon<f64>) -> MultiPolygon<f64> {
        geometry.map_coords(|c| {
            let (lon, lat) = self.unproject(c);
            Coord { x: lon, y: lat }
        })
    }
}

fn meridian_arc(phi: f64, e2: f64) -> f64 {
    let e4 = e2 * e2;
    let e6 = e4 * e2;
    WGS84_A
        * ((1.0 - e2 / 4.0 - 3.0 * e4 / 64.0 - 5.0 * e6 / 256.0) * phi
            - (3.0 * e2 / 8.0 + 3.0 * e4 / 32.0 + 45.0 * e6 / 1024.0) * (2.0 * phi).sin()
            + (15.0 * e4 / 256.0 + 45.0 * e6 / 1024.0) * (4.0 * phi).sin()
            - (35.0 * e6 / 3072.0) * (6.0 * phi).sin())
}
