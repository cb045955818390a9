//! Surface displacement due to rectangular dislocations in an elastic
//! half-space (Okada, 1985).
//!
//! Every patch has two unknowns, strike-slip and dip-slip, so the forward
//! model is `3·nsites x 2·npatches`. Rows per site are east, north, up;
//! column `2i` is strike-slip on patch `i` and column `2i + 1` dip-slip.

use std::f64::consts::PI;

use nalgebra::DMatrix;

use crate::domain::{EarthModel, FaultPatch};
use crate::error::{InversionError, InversionResult};

/// `cos(dip)` at or below this is treated as a vertical fault.
const VERTICAL_EPS: f64 = 6.1232e-14;

/// A station position in the shared UTM frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Receiver {
    pub easting: f64,
    pub northing: f64,
    /// m
    pub altitude: f64,
}

/// Displacement in the fault frame for unit strike-slip and dip-slip.
#[derive(Debug, Clone, Copy, Default)]
struct FaultFrame {
    ux_ss: f64,
    uy_ss: f64,
    uz_ss: f64,
    ux_ds: f64,
    uy_ds: f64,
    uz_ds: f64,
}

impl FaultFrame {
    /// Chinnery's notation `f(ξ, p) - f(ξ, p - W) - f(ξ - L, p) + f(ξ - L, p - W)`.
    fn chinnery(a: Self, b: Self, c: Self, d: Self) -> Self {
        let combine = |f: fn(&Self) -> f64| f(&a) - f(&b) - f(&c) + f(&d);
        Self {
            ux_ss: combine(|s| s.ux_ss),
            uy_ss: combine(|s| s.uy_ss),
            uz_ss: combine(|s| s.uz_ss),
            ux_ds: combine(|s| s.ux_ds),
            uy_ds: combine(|s| s.uy_ds),
            uz_ds: combine(|s| s.uz_ds),
        }
    }
}

/// Dipping fault.
fn with_dip(nu: f64, cos_dip: f64, sin_dip: f64, xi: f64, eta: f64, q: f64) -> FaultFrame {
    let r = (xi * xi + eta * eta + q * q).sqrt();
    let yb = eta * cos_dip + q * sin_dip;
    let db = eta * sin_dip - q * cos_dip;
    let x = (xi * xi + q * q).sqrt();
    let log_rpeta = (r + eta).ln();
    let atan_xeqr = (xi * eta / (q * r)).atan();
    let k = 1.0 - 2.0 * nu;

    let i5 = k * 2.0 / cos_dip
        * ((eta * (x + q * cos_dip) + x * (r + x) * sin_dip) / (xi * (r + x) * cos_dip)).atan();
    let i4 = k / cos_dip * ((r + db).ln() - sin_dip * log_rpeta);
    let i3 = k * (yb / cos_dip / (r + db) - log_rpeta) + sin_dip / cos_dip * i4;
    let i2 = k * (-log_rpeta) - i3;
    let i1 = k * (-xi / cos_dip / (r + db)) - sin_dip / cos_dip * i5;

    FaultFrame {
        ux_ss: xi * q / (r * (r + eta)) + atan_xeqr + i1 * sin_dip,
        uy_ss: yb * q / (r * (r + eta)) + q * cos_dip / (r + eta) + i2 * sin_dip,
        uz_ss: db * q / (r * (r + eta)) + q * sin_dip / (r + eta) + i4 * sin_dip,
        ux_ds: q / r - i3 * sin_dip * cos_dip,
        uy_ds: yb * q / (r * (r + xi)) + cos_dip * atan_xeqr - i1 * sin_dip * cos_dip,
        uz_ds: db * q / (r * (r + xi)) + sin_dip * atan_xeqr - i5 * sin_dip * cos_dip,
    }
}

/// Vertical fault (`cos(dip) = 0`).
fn zero_dip(nu: f64, sin_dip: f64, xi: f64, eta: f64, q: f64) -> FaultFrame {
    let r = (xi * xi + eta * eta + q * q).sqrt();
    let yb = q * sin_dip;
    let db = eta * sin_dip;
    let log_rpeta = (r + eta).ln();
    let rpdb = r + db;
    let rpdb2 = rpdb * rpdb;
    let atan_xeqr = (xi * eta / (q * r)).atan();
    let k = 1.0 - 2.0 * nu;

    let i4 = -k * q / rpdb;
    let i3 = k / 2.0 * (eta / rpdb + yb * q / rpdb2 - log_rpeta);
    let i2 = k * (-log_rpeta) - i3;
    let i1 = -k / 2.0 * xi * q / rpdb2;

    FaultFrame {
        ux_ss: xi * q / (r * (r + eta)) + atan_xeqr + i1 * sin_dip,
        uy_ss: yb * q / (r * (r + eta)) + i2 * sin_dip,
        uz_ss: db * q / (r * (r + eta)) + q * sin_dip / (r + eta) + i4 * sin_dip,
        ux_ds: q / r,
        uy_ds: yb * q / (r * (r + xi)),
        uz_ds: db * q / (r * (r + xi)) + sin_dip * atan_xeqr,
    }
}

/// Green's functions `[[e_ss, e_ds], [n_ss, n_ds], [u_ss, u_ds]]` of one patch
/// at one receiver.
///
/// `(e, n)` is receiver minus patch centre (m) and `depth` the patch centre
/// depth below the receiver (m).
fn patch_response(
    nu: f64,
    vertical: bool,
    patch: &FaultPatch,
    e: f64,
    n: f64,
    depth: f64,
) -> [[f64; 2]; 3] {
    let (sin_str, cos_str) = patch.strike.to_radians().sin_cos();
    let sin_dip = patch.dip.to_radians().sin();
    let cos_dip = if vertical { 0.0 } else { patch.dip.to_radians().cos() };
    let (w, l) = (patch.width, patch.length);

    let d = depth + sin_dip * w * 0.5;
    let ec = e + cos_str * cos_dip * w * 0.5;
    let nc = n - sin_str * cos_dip * w * 0.5;
    let x = cos_str * nc + sin_str * ec + l * 0.5;
    let y = sin_str * nc - cos_str * ec + cos_dip * w;
    let p = y * cos_dip + d * sin_dip;
    let q = y * sin_dip - d * cos_dip;

    let corner = |xi: f64, eta: f64| {
        if vertical {
            zero_dip(nu, sin_dip, xi, eta, q)
        } else {
            with_dip(nu, cos_dip, sin_dip, xi, eta, q)
        }
    };
    let u = FaultFrame::chinnery(corner(x, p), corner(x, p - w), corner(x - l, p), corner(x - l, p - w));

    let scale = -1.0 / (2.0 * PI);
    let (g1, g2) = (scale * u.ux_ss, scale * u.ux_ds);
    let (g3, g4) = (scale * u.uy_ss, scale * u.uy_ds);
    let (g5, g6) = (scale * u.uz_ss, scale * u.uz_ds);

    // Fault frame to east/north.
    [
        [sin_str * g1 - cos_str * g3, sin_str * g2 - cos_str * g4],
        [cos_str * g1 + sin_str * g3, cos_str * g2 + sin_str * g4],
        [g5, g6],
    ]
}

/// `3·nsites x 2·npatches` Green's function matrix.
///
/// All patches are treated as vertical when none of them dips measurably.
pub fn forward_model(
    earth: &EarthModel,
    patches: &[FaultPatch],
    receivers: &[Receiver],
) -> InversionResult<DMatrix<f64>> {
    if patches.is_empty() || receivers.is_empty() {
        return Err(InversionError::InvalidInput(format!(
            "dislocation model needs patches and receivers (got {} and {})",
            patches.len(),
            receivers.len()
        )));
    }
    if let Some(p) = patches.iter().find(|p| !(p.length > 0.0 && p.width > 0.0)) {
        return Err(InversionError::InvalidInput(format!(
            "patch size {} x {} m must be positive",
            p.length, p.width
        )));
    }
    let nu = earth.poisson_ratio;
    let vertical = !patches.iter().any(|p| p.dip.to_radians().cos() > VERTICAL_EPS);

    let mut g = DMatrix::zeros(3 * receivers.len(), 2 * patches.len());
    for (j, rx) in receivers.iter().enumerate() {
        for (i, patch) in patches.iter().enumerate() {
            let e = rx.easting - patch.easting;
            let n = rx.northing - patch.northing;
            let depth = patch.depth * 1.0e3 + rx.altitude;
            let resp = patch_response(nu, vertical, patch, e, n, depth);
            for (row, pair) in resp.iter().enumerate() {
                g[(3 * j + row, 2 * i)] = pair[0];
                g[(3 * j + row, 2 * i + 1)] = pair[1];
            }
        }
    }
    if g.iter().any(|v| !v.is_finite()) {
        return Err(InversionError::Solver(
            "dislocation Green's functions are not finite (receiver on a patch edge?)".to_string(),
        ));
    }
    Ok(g)
}
