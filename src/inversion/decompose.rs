//! Moment tensor decomposition into nodal planes, magnitude and double-couple
//! percentage.
//!
//! Tensors are in north-east-down coordinates. The fault normal `n` and slip
//! `d` of a double couple are recovered from the tension (T) and pressure (P)
//! eigenvectors as `n = (t + p)/√2`, `d = (t - p)/√2`; swapping them gives the
//! auxiliary plane.

use nalgebra::{SymmetricEigen, Vector3};

use crate::domain::{Mechanism, MomentTensor, NodalPlane};
use crate::error::{InversionError, InversionResult};

/// Scalar moment `sqrt(Σ Mij² / 2)` (N·m).
pub fn scalar_moment(mt: &MomentTensor) -> f64 {
    (mt.to_matrix().norm_squared() / 2.0).sqrt()
}

/// Moment magnitude from a scalar moment in N·m.
pub fn moment_magnitude(m0: f64) -> f64 {
    2.0 / 3.0 * (m0.log10() - 9.1)
}

/// Inverse of [`moment_magnitude`].
pub fn scalar_moment_from_mw(mw: f64) -> f64 {
    10f64.powf(1.5 * mw + 9.1)
}

/// Strike, dip and rake of the plane with normal `n` and slip `d`.
fn nodal_plane(n: Vector3<f64>, d: Vector3<f64>) -> NodalPlane {
    // Normal points up (negative down component).
    let (n, d) = if n.z > 0.0 { (-n, -d) } else { (n, d) };
    let dip = (-n.z).clamp(-1.0, 1.0).acos();
    let strike = if dip.sin().abs() < 1.0e-12 {
        0.0
    } else {
        (-n.x).atan2(n.y)
    };
    let (sin_str, cos_str) = strike.sin_cos();
    let cos_rake = d.x * cos_str + d.y * sin_str;
    let sin_rake = if dip.sin() > 0.1 {
        -d.z / dip.sin()
    } else {
        (d.x * sin_str - d.y * cos_str) / dip.cos()
    };
    let mut rake = sin_rake.atan2(cos_rake).to_degrees();
    if rake <= -180.0 {
        rake += 360.0;
    }
    NodalPlane {
        strike: strike.to_degrees().rem_euclid(360.0),
        dip: dip.to_degrees(),
        rake,
    }
}

/// Decompose a moment tensor.
///
/// The double-couple percentage uses the deviatoric eigenvalues:
/// `ε = -λ_minabs/λ_maxabs`, `DC = (1 - 2|ε|)·100`.
pub fn decompose(mt: &MomentTensor) -> InversionResult<Mechanism> {
    let m = mt.to_matrix();
    if m.iter().any(|v| !v.is_finite()) {
        return Err(InversionError::Solver("moment tensor is not finite".to_string()));
    }
    let m0 = scalar_moment(mt);
    if !(m0 > 0.0) {
        return Err(InversionError::Solver("cannot decompose a zero moment tensor".to_string()));
    }

    let iso = m.trace() / 3.0;
    let mut dev = m;
    for i in 0..3 {
        dev[(i, i)] -= iso;
    }
    let eig = SymmetricEigen::new(dev);
    let vals = eig.eigenvalues;

    let mut order = [0usize, 1, 2];
    order.sort_by(|&a, &b| vals[a].total_cmp(&vals[b]));
    let (ip, it) = (order[0], order[2]);

    let abs_min = vals.iter().map(|v| v.abs()).fold(f64::INFINITY, f64::min);
    let abs_max = vals.iter().map(|v| v.abs()).fold(0.0, f64::max);
    let pct_dc = if abs_max > 0.0 {
        let eps = abs_min / abs_max;
        ((1.0 - 2.0 * eps) * 100.0).clamp(0.0, 100.0)
    } else {
        0.0
    };

    let t: Vector3<f64> = eig.eigenvectors.column(it).into_owned();
    let p: Vector3<f64> = eig.eigenvectors.column(ip).into_owned();
    let n = (t + p) / std::f64::consts::SQRT_2;
    let d = (t - p) / std::f64::consts::SQRT_2;

    Ok(Mechanism {
        plane1: nodal_plane(n, d),
        plane2: nodal_plane(d, n),
        m0,
        mw: moment_magnitude(m0),
        pct_dc,
    })
}

/// Fault normal and slip vector of a plane (Aki & Richards).
pub fn plane_vectors(plane: &NodalPlane) -> (Vector3<f64>, Vector3<f64>) {
    let (ss, cs) = plane.strike.to_radians().sin_cos();
    let (sd, cd) = plane.dip.to_radians().sin_cos();
    let (sr, cr) = plane.rake.to_radians().sin_cos();
    let n = Vector3::new(-sd * ss, sd * cs, -cd);
    let d = Vector3::new(cr * cs + cd * sr * ss, cr * ss - cd * sr * cs, -sd * sr);
    (n, d)
}

/// Double-couple tensor `M0 (n dᵀ + d nᵀ)` of a plane.
pub fn double_couple(plane: &NodalPlane, m0: f64) -> MomentTensor {
    let (n, d) = plane_vectors(plane);
    let m = (n * d.transpose() + d * n.transpose()) * m0;
    MomentTensor::from_matrix(&m)
}
