//! WGS84 transverse Mercator (UTM) projection.
//!
//! Inversions work in a local Cartesian frame: the hypocentre and every
//! station are projected into one UTM zone (the hypocentre's unless a zone is
//! configured) and differenced in metres.

use serde::{Deserialize, Serialize};

const A: f64 = 6_378_137.0;
const ESQ: f64 = 0.006_694_380_069_978_522;
const K0: f64 = 0.9996;
const FALSE_EASTING: f64 = 500_000.0;
const FALSE_NORTHING_SOUTH: f64 = 10_000_000.0;

/// A projected point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UtmPoint {
    pub northing: f64,
    pub easting: f64,
    pub zone: u8,
    /// Northern hemisphere.
    pub north: bool,
}

/// UTM zone (1..=60) containing a longitude in degrees, `[0, 360)` or `[-180, 180]`.
pub fn zone_for_longitude(lon_deg: f64) -> u8 {
    let lon = wrap_longitude(lon_deg);
    let zone = ((lon + 180.0) / 6.0).floor().rem_euclid(60.0);
    zone as u8 + 1
}

fn wrap_longitude(lon_deg: f64) -> f64 {
    if lon_deg > 180.0 { lon_deg - 360.0 } else { lon_deg }
}

fn central_meridian(zone: u8) -> f64 {
    f64::from(zone) * 6.0 - 183.0
}

/// Project latitude/longitude (degrees) to UTM.
///
/// With `zone = None` the zone is chosen from the longitude.
pub fn ll2utm(lat_deg: f64, lon_deg: f64, zone: Option<u8>) -> UtmPoint {
    let lon_deg = wrap_longitude(lon_deg);
    let zone = zone.unwrap_or_else(|| zone_for_longitude(lon_deg));
    let epsq = ESQ / (1.0 - ESQ);

    let lat = lat_deg.to_radians();
    let lon = lon_deg.to_radians();
    let lon0 = central_meridian(zone).to_radians();

    let a_term = (lon - lon0) * lat.cos();
    let v = A / (1.0 - ESQ * lat.sin().powi(2)).sqrt();
    let t = lat.tan().powi(2);
    let c = ESQ * lat.cos().powi(2) / (1.0 - ESQ);
    let e2 = ESQ * ESQ;
    let e3 = e2 * ESQ;
    let m = A
        * ((1.0 - ESQ / 4.0 - 3.0 * e2 / 64.0 - 5.0 * e3 / 256.0) * lat
            - (3.0 * ESQ / 8.0 + 3.0 * e2 / 32.0 + 45.0 * e3 / 1024.0) * (2.0 * lat).sin()
            + (15.0 * e2 / 256.0 + 45.0 * e3 / 1024.0) * (4.0 * lat).sin()
            - (35.0 * e3 / 3072.0) * (6.0 * lat).sin());

    let mut northing = K0
        * (m + v
            * lat.tan()
            * (a_term * a_term / 2.0
                + (5.0 - t + 9.0 * c + 4.0 * c * c) * a_term.powi(4) / 24.0
                + (61.0 - 58.0 * t + t * t + 600.0 * c - 330.0 * epsq) * a_term.powi(6) / 720.0));
    let easting = K0
        * v
        * (a_term
            + (1.0 - t + c) * a_term.powi(3) / 6.0
            + (5.0 - 18.0 * t + t * t + 72.0 * c - 58.0 * epsq) * a_term.powi(5) / 120.0)
        + FALSE_EASTING;

    let north = lat_deg >= 0.0;
    if !north {
        northing += FALSE_NORTHING_SOUTH;
    }
    UtmPoint {
        northing,
        easting,
        zone,
        north,
    }
}

/// Inverse projection. Returns `(lat, lon)` in degrees with `lon` in `[0, 360)`.
pub fn utm2ll(zone: u8, north: bool, northing: f64, easting: f64) -> (f64, f64) {
    let epsq = ESQ / (1.0 - ESQ);
    let lon0 = central_meridian(zone).to_radians();

    let m1 = if north {
        northing / K0
    } else {
        (northing - FALSE_NORTHING_SOUTH) / K0
    };
    let mu1 = m1 / (A * (1.0 - ESQ / 4.0 - 3.0 / 64.0 * ESQ.powi(2) - 5.0 / 256.0 * ESQ.powi(3)));
    let e1 = (1.0 - (1.0 - ESQ).sqrt()) / (1.0 + (1.0 - ESQ).sqrt());
    let e1_2 = e1 * e1;
    let e1_3 = e1_2 * e1;
    let e1_4 = e1_3 * e1;
    let lat1 = mu1
        + (3.0 * e1 / 2.0 - 27.0 / 32.0 * e1_3) * (2.0 * mu1).sin()
        + (21.0 / 16.0 * e1_2 - 55.0 / 32.0 * e1_4) * (4.0 * mu1).sin()
        + (151.0 / 96.0 * e1_3) * (6.0 * mu1).sin()
        + (1097.0 / 512.0 * e1_4) * (8.0 * mu1).sin();

    let t1 = lat1.tan().powi(2);
    let c1 = epsq * lat1.cos().powi(2);
    let v1 = A / (1.0 - ESQ * lat1.sin().powi(2)).sqrt();
    let p1 = A * (1.0 - ESQ) / (1.0 - ESQ * lat1.sin().powi(2)).powf(1.5);
    let d = (easting - FALSE_EASTING) / v1 / K0;

    let lat = lat1
        - (v1 * lat1.tan() / p1)
            * (d.powi(2) / 2.0
                - (5.0 + 3.0 * t1 + 10.0 * c1 - 4.0 * c1 * c1 - 9.0 * epsq) * d.powi(4) / 24.0
                + (61.0 + 90.0 * t1 + 298.0 * c1 + 45.0 * t1 * t1 - 252.0 * epsq - 3.0 * c1 * c1)
                    * d.powi(6)
                    / 720.0);
    let lon = lon0
        + (d - (1.0 + 2.0 * t1 + c1) * d.powi(3) / 6.0
            + (5.0 - 2.0 * c1 + 28.0 * t1 - 3.0 * c1 * c1 + 8.0 * epsq + 24.0 * t1 * t1) * d.powi(5)
                / 120.0)
            / lat1.cos();

    let lat_deg = lat.to_degrees();
    let mut lon_deg = lon.to_degrees();
    if lon_deg < 0.0 {
        lon_deg += 360.0;
    }
    (lat_deg, lon_deg)
}

/// Horizontal distance in metres between two projected points.
pub fn horizontal_distance(a: &UtmPoint, b: &UtmPoint) -> f64 {
    (a.easting - b.easting).hypot(a.northing - b.northing)
}
