//! Meshing a candidate fault plane around the hypocentre.
//!
//! Fault dimensions come from the Dreger & Kaverina (2000) magnitude scaling,
//! inflated by a safety percentage so a unilateral rupture still fits. The
//! plane is centred on the hypocentre unless that would push its top above
//! the surface, in which case it is hung from the surface instead.

use crate::coords::{ll2utm, utm2ll};
use crate::domain::{FaultPatch, FaultPlane, FfProps, PatchVertex};
use crate::error::{InversionError, InversionResult};

/// Fallback safety factor when a negative percentage is configured.
const DEFAULT_SAFETY: f64 = 0.1;

/// Patch layout and safety factors for [`mesh_fault_plane`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeshParams {
    pub nstr: usize,
    pub ndip: usize,
    pub flen_pct: f64,
    pub fwid_pct: f64,
    pub utm_zone: Option<u8>,
}

impl MeshParams {
    pub fn from_props(props: &FfProps, utm_zone: Option<u8>) -> Self {
        Self {
            nstr: props.nstr,
            ndip: props.ndip,
            flen_pct: props.flen_pct,
            fwid_pct: props.fwid_pct,
            utm_zone,
        }
    }
}

/// Fault `(length, width)` in km for moment magnitude `m`, before padding.
pub fn fault_dimensions(m: f64) -> (f64, f64) {
    let area = 10f64.powf(-3.49 + 0.91 * m);
    let len = 10f64.powf(-2.44 + 0.59 * m);
    (len, area / len)
}

fn safety_factor(pct: f64) -> f64 {
    if pct < 0.0 { DEFAULT_SAFETY } else { pct / 100.0 }
}

/// Mesh an `nstr x ndip` fault with the given strike and dip (degrees)
/// through a hypocentre at `depth` km.
///
/// Patch `j * nstr + i` is the `i`-th along strike in the `j`-th row down dip.
pub fn mesh_fault_plane(
    latitude: f64,
    longitude: f64,
    depth: f64,
    magnitude: f64,
    strike: f64,
    dip: f64,
    params: &MeshParams,
) -> InversionResult<FaultPlane> {
    let MeshParams { nstr, ndip, .. } = *params;
    if nstr < 1 || ndip < 1 {
        return Err(InversionError::InvalidGrid(format!(
            "cannot mesh a fault with {nstr} x {ndip} patches"
        )));
    }
    if ![latitude, longitude, depth, magnitude, strike, dip].iter().all(|v| v.is_finite()) {
        return Err(InversionError::InvalidInput("fault seed is not finite".to_string()));
    }

    let origin = ll2utm(latitude, longitude, params.utm_zone);
    let (len, wid) = fault_dimensions(magnitude);
    let len = len * (1.0 + safety_factor(params.flen_pct));
    let wid = wid * (1.0 + safety_factor(params.fwid_pct));

    let (sin_str, cos_str) = strike.to_radians().sin_cos();
    let (sin_perp, cos_perp) = (strike + 90.0).to_radians().sin_cos();
    let (sin_dip, cos_dip) = dip.to_radians().sin_cos();

    // Horizontal offset from the hypocentre to the up-dip edge, km.
    let (z0, updip) = if wid / 2.0 * sin_dip > depth {
        (0.0, depth)
    } else {
        (depth - wid / 2.0 * sin_dip, wid / 2.0)
    };
    let x0 = origin.easting * 1.0e-3 - len / 2.0 * sin_str - updip * cos_dip * sin_perp;
    let y0 = origin.northing * 1.0e-3 - len / 2.0 * cos_str - updip * cos_dip * cos_perp;

    let dlen = len / nstr as f64;
    let dwid = wid / ndip as f64;
    let dalt = dwid * sin_dip;
    let (xdoff, ydoff) = (dwid * cos_dip * sin_perp, dwid * cos_dip * cos_perp);
    let (xsoff, ysoff) = (dlen * sin_str, dlen * cos_str);

    // Point `s` steps along strike and `d` steps down dip from the corner, in metres.
    let at = |s: f64, d: f64| {
        (
            (x0 + s * xsoff + d * xdoff) * 1.0e3,
            (y0 + s * ysoff + d * ydoff) * 1.0e3,
            z0 + d * dalt,
        )
    };
    let vertex = |s: f64, d: f64| {
        let (x, y, z) = at(s, d);
        let (lat, lon) = utm2ll(origin.zone, origin.north, y, x);
        PatchVertex {
            latitude: lat,
            longitude: lon,
            depth: z,
        }
    };

    let mut patches = Vec::with_capacity(nstr * ndip);
    for j in 0..ndip {
        for i in 0..nstr {
            let (di, dj) = (i as f64, j as f64);
            let (x, y, z) = at(0.5 + di, 0.5 + dj);
            let (lat, lon) = utm2ll(origin.zone, origin.north, y, x);
            patches.push(FaultPatch {
                latitude: lat,
                longitude: lon,
                easting: x,
                northing: y,
                depth: z,
                strike,
                dip,
                length: dlen * 1.0e3,
                width: dwid * 1.0e3,
                vertices: [
                    vertex(di, dj),
                    vertex(di + 1.0, dj),
                    vertex(di + 1.0, dj + 1.0),
                    vertex(di, dj + 1.0),
                ],
            });
        }
    }
    Ok(FaultPlane { nstr, ndip, patches })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(nstr: usize, ndip: usize) -> MeshParams {
        MeshParams {
            nstr,
            ndip,
            flen_pct: 10.0,
            fwid_pct: 10.0,
            utm_zone: None,
        }
    }

    #[test]
    fn deep_plane_is_centred_on_the_hypocentre() {
        let p = params(10, 5);
        let plane = mesh_fault_plane(47.19, -122.66, 57.0, 7.0, 30.0, 40.0, &p).unwrap();
        assert_eq!(plane.len(), 50);

        let origin = ll2utm(47.19, -122.66, None);
        let n = plane.len() as f64;
        let mean_e = plane.patches.iter().map(|q| q.easting).sum::<f64>() / n;
        let mean_n = plane.patches.iter().map(|q| q.northing).sum::<f64>() / n;
        let mean_z = plane.patches.iter().map(|q| q.depth).sum::<f64>() / n;
        assert!((mean_e - origin.easting).abs() < 1e-3);
        assert!((mean_n - origin.northing).abs() < 1e-3);
        assert!((mean_z - 57.0).abs() < 1e-9);
        // Centre latitude/longitude round-trips through UTM.
        let mean_lat = plane.patches.iter().map(|q| q.latitude).sum::<f64>() / n;
        assert!((mean_lat - 47.19).abs() < 1e-3);
    }

    #[test]
    fn patch_sizes_follow_the_scaling_law() {
        let p = params(4, 2);
        let plane = mesh_fault_plane(40.0, -124.0, 30.0, 6.5, 0.0, 90.0, &p).unwrap();
        let (len, wid) = fault_dimensions(6.5);
        for patch in &plane.patches {
            assert!((patch.length - len * 1.1 / 4.0 * 1.0e3).abs() < 1e-6);
            assert!((patch.width - wid * 1.1 / 2.0 * 1.0e3).abs() < 1e-6);
        }
        // North-striking: second patch along strike is one length further north.
        let dn = plane.patches[1].northing - plane.patches[0].northing;
        assert!((dn - plane.patches[0].length).abs() < 1e-6);
        assert!((plane.patches[1].easting - plane.patches[0].easting).abs() < 1e-6);
        // Vertical: rows below sit one width deeper.
        let dz = plane.patches[4].depth - plane.patches[0].depth;
        assert!((dz * 1.0e3 - plane.patches[0].width).abs() < 1e-6);
    }

    #[test]
    fn shallow_plane_is_hung_from_the_surface() {
        let p = params(3, 3);
        let plane = mesh_fault_plane(40.0, -124.0, 2.0, 8.0, 120.0, 60.0, &p).unwrap();
        let (_, wid) = fault_dimensions(8.0);
        let dalt = wid * 1.1 / 3.0 * 60f64.to_radians().sin();
        assert!((plane.patches[0].depth - 0.5 * dalt).abs() < 1e-9);
        for patch in &plane.patches {
            assert!(patch.vertices.iter().all(|v| v.depth >= -1e-12));
        }
        assert!(plane.patches[0].vertices[0].depth.abs() < 1e-12);
    }

    #[test]
    fn negative_safety_percent_falls_back() {
        let mut p = params(1, 1);
        p.flen_pct = -5.0;
        let plane = mesh_fault_plane(40.0, -124.0, 50.0, 7.0, 0.0, 45.0, &p).unwrap();
        let (len, _) = fault_dimensions(7.0);
        assert!((plane.patches[0].length - len * 1.1e3).abs() < 1e-6);
        assert!(mesh_fault_plane(40.0, -124.0, 50.0, 7.0, 0.0, 45.0, &params(0, 2)).is_err());
    }
}
