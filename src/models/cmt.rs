//! Deviatoric point-source Green's functions for static offsets.
//!
//! Each site contributes three rows (north, east, negative up) and five
//! columns, one per deviatoric coefficient
//! `[mxy, mxz, mzz, (mxx - myy)/2, myz]`. Coordinates are receiver minus
//! source: `x` north, `y` east, `z` positive up (so normally negative).

use std::f64::consts::PI;

use nalgebra::DMatrix;

use crate::domain::{Displacement, EarthModel, OffsetSite};
use crate::error::{InversionError, InversionResult};

/// Number of deviatoric moment tensor coefficients.
pub const NCOEFF: usize = 5;

/// Source-receiver separation in the observation frame (metres).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Separation {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// Fill the three rows of one site.
fn site_rows(earth: &EarthModel, s: Separation) -> [[f64; NCOEFF]; 3] {
    let Separation { x, y, z } = s;
    let mu = earth.shear_modulus;
    let k = earth.bulk_modulus;
    let r = (x * x + y * y + z * z).sqrt();
    let r3 = r.powi(3);
    let c1 = 1.0 / (r * r) / mu / PI / 8.0;
    let c2 = (3.0 * k + mu) / (3.0 * k + 4.0 * mu);

    // Displacement component `i` due to moment component `jk`.
    let g111 = c1 * (c2 * 3.0 * x * x * x / r3 - 3.0 * c2 * x / r + 2.0 * x / r);
    let g122 = c1 * (c2 * 3.0 * x * y * y / r3 - c2 * x / r);
    let g133 = c1 * (c2 * 3.0 * x * z * z / r3 - c2 * x / r);
    let g112 = c1 * (c2 * 6.0 * x * x * y / r3 - 2.0 * c2 * y / r + 2.0 * y / r);
    let g113 = c1 * (c2 * 6.0 * x * x * z / r3 - 2.0 * c2 * z / r + 2.0 * z / r);
    let g123 = c1 * (c2 * 6.0 * x * y * z / r3);

    let g211 = c1 * (c2 * 3.0 * y * x * x / r3 - c2 * y / r);
    let g222 = c1 * (c2 * 3.0 * y * y * y / r3 - 3.0 * c2 * y / r + 2.0 * y / r);
    let g233 = c1 * (c2 * 3.0 * y * z * z / r3 - c2 * y / r);
    let g212 = c1 * (c2 * 6.0 * y * x * y / r3 - 2.0 * c2 * x / r + 2.0 * x / r);
    let g213 = c1 * (c2 * 6.0 * y * x * z / r3);
    let g223 = c1 * (c2 * 6.0 * y * y * z / r3 - 2.0 * c2 * z / r + 2.0 * z / r);

    let g311 = c1 * (c2 * 3.0 * z * x * x / r3 - c2 * z / r);
    let g322 = c1 * (c2 * 3.0 * z * y * y / r3 - c2 * z / r);
    let g333 = c1 * (c2 * 3.0 * z * z * z / r3 - 3.0 * c2 * z / r + 2.0 * z / r);
    let g312 = c1 * (c2 * 6.0 * z * x * y / r3);
    let g313 = c1 * (c2 * 6.0 * z * x * z / r3 - 2.0 * c2 * x / r + 2.0 * x / r);
    let g323 = c1 * (c2 * 6.0 * z * y * z / r3 - 2.0 * c2 * y / r + 2.0 * y / r);

    [
        [g112, g113, g133, 0.5 * (g111 - g122), g123],
        [g212, g213, g233, 0.5 * (g211 - g222), g223],
        [g312, g313, g333, 0.5 * (g311 - g322), g323],
    ]
}

/// `3n x 5` deviatoric Green's function matrix.
pub fn forward_model(earth: &EarthModel, separations: &[Separation]) -> InversionResult<DMatrix<f64>> {
    if separations.is_empty() {
        return Err(InversionError::InvalidInput("no sites for CMT forward model".to_string()));
    }
    let mut g = DMatrix::zeros(3 * separations.len(), NCOEFF);
    for (i, s) in separations.iter().enumerate() {
        if !(s.x * s.x + s.y * s.y + s.z * s.z > 0.0) {
            return Err(InversionError::InvalidInput(format!(
                "site {i} coincides with the source"
            )));
        }
        for (row, coeffs) in site_rows(earth, *s).iter().enumerate() {
            for (col, v) in coeffs.iter().enumerate() {
                g[(3 * i + row, col)] = *v;
            }
        }
    }
    Ok(g)
}

/// Observation vector `[n, e, -u]` per site.
pub fn rhs(offsets: &[Displacement]) -> Vec<f64> {
    offsets.iter().flat_map(|d| [d.north, d.east, -d.up]).collect()
}

/// Diagonal weights `[wn, we, wu]` per site.
pub fn diagonal_weights(sites: &[&OffsetSite]) -> Vec<f64> {
    sites
        .iter()
        .flat_map(|s| [s.weight_north, s.weight_east, s.weight_up])
        .collect()
}

/// Undo the row convention of [`rhs`] on a predicted vector.
pub fn unpack_prediction(up: &[f64]) -> Vec<Displacement> {
    up.chunks_exact(3)
        .map(|c| Displacement {
            north: c[0],
            east: c[1],
            up: -c[2],
        })
        .collect()
}
