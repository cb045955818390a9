//! Empirical peak-ground-displacement scaling law.
//!
//! `log10(PGD) = A + B·M + C·M·log10(R)` with PGD in centimetres and the
//! hypocentral distance `R` in kilometres. For a fixed source the law is linear
//! in `M`, so every depth hypothesis is a one-column least-squares problem:
//! `log10(d) - A = (B + C·log10(R))·M`.

use nalgebra::DMatrix;

use crate::error::{InversionError, InversionResult};

/// Regression coefficients of the scaling law.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PgdScaling {
    pub a: f64,
    pub b: f64,
    pub c: f64,
}

impl Default for PgdScaling {
    fn default() -> Self {
        Self {
            a: -6.687,
            b: 1.5,
            c: -0.214,
        }
    }
}

impl PgdScaling {
    /// Design row entry `B + C·log10(r)` for a hypocentral distance in km.
    pub fn design_entry(&self, r_km: f64) -> f64 {
        self.b + self.c * r_km.log10()
    }

    /// One-column design matrix for a set of hypocentral distances (km).
    pub fn forward_model(&self, r_km: &[f64]) -> InversionResult<DMatrix<f64>> {
        if r_km.is_empty() {
            return Err(InversionError::InvalidInput("no distances for PGD forward model".to_string()));
        }
        if let Some(r) = r_km.iter().find(|r| !(r.is_finite() && **r > 0.0)) {
            return Err(InversionError::InvalidInput(format!(
                "hypocentral distance {r} km must be positive"
            )));
        }
        Ok(DMatrix::from_iterator(
            r_km.len(),
            1,
            r_km.iter().map(|&r| self.design_entry(r)),
        ))
    }

    /// Right-hand side `log10(d) - A`.
    ///
    /// Displacements below `dist_tol` (cm) are replaced by `disp_def`.
    pub fn rhs(&self, pgd_cm: &[f64], dist_tol: f64, disp_def: f64) -> InversionResult<Vec<f64>> {
        pgd_cm
            .iter()
            .map(|&d| {
                let d = if d < dist_tol { disp_def } else { d };
                if d > 0.0 {
                    Ok(d.log10() - self.a)
                } else {
                    Err(InversionError::InvalidInput(format!(
                        "peak displacement {d} cm is not positive"
                    )))
                }
            })
            .collect()
    }

    /// Predicted peak displacement (cm) for one design entry and magnitude.
    pub fn predict(&self, design_entry: f64, magnitude: f64) -> f64 {
        10f64.powf(design_entry * magnitude + self.a)
    }

    /// Closed-form PGD (cm) at `r_km` for magnitude `m`.
    pub fn pgd_at(&self, r_km: f64, magnitude: f64) -> f64 {
        self.predict(self.design_entry(r_km), magnitude)
    }
}

/// Hypocentral distance (km) between a source at `depth_km` and a station at
/// altitude `alt_m`, separated horizontally by `(de, dn)` metres.
pub fn hypocentral_distance_km(de: f64, dn: f64, depth_km: f64, alt_m: f64) -> f64 {
    let dz = depth_km * 1000.0 - alt_m;
    (de * de + dn * dn + dz * dz).sqrt() * 1.0e-3
}

/// Distance-decay data weights `exp(-repi²/(8·repi_min²))·w`.
///
/// The nearest station always gets its full weight; weights fall off on the
/// scale of the minimum epicentral distance.
pub fn distance_weights(repi_km: &[f64], weights: &[f64]) -> InversionResult<Vec<f64>> {
    if repi_km.is_empty() || repi_km.len() != weights.len() {
        return Err(InversionError::InvalidInput(format!(
            "{} epicentral distances for {} weights",
            repi_km.len(),
            weights.len()
        )));
    }
    let repi_min = repi_km.iter().copied().fold(f64::INFINITY, f64::min);
    // A station on the epicentre would zero the decay scale.
    let repi_min2 = repi_min.max(MIN_EPICENTRAL_KM).powi(2);
    Ok(repi_km
        .iter()
        .zip(weights)
        .map(|(r, w)| (-(r * r) / 8.0 / repi_min2).exp() * w)
        .collect())
}

/// Floor (km) for the minimum epicentral distance in [`distance_weights`].
pub const MIN_EPICENTRAL_KM: f64 = 1.0e-3;

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn prediction_inverts_the_rhs() {
        let law = PgdScaling::default();
        let r = 120.0;
        let m = 8.2;
        let pgd = law.pgd_at(r, m);
        let b = law.rhs(&[pgd], 0.0, 0.01).unwrap()[0];
        assert_relative_eq!(b / law.design_entry(r), m, epsilon = 1e-12);
    }

    #[test]
    fn small_displacements_use_the_default() {
        let law = PgdScaling::default();
        let b = law.rhs(&[2.0, 10.0], 6.0, 0.01).unwrap();
        assert!((b[0] - (0.01f64.log10() + 6.687)).abs() < 1e-12);
        assert!((b[1] - (1.0 + 6.687)).abs() < 1e-12);
        assert!(law.rhs(&[-1.0], -5.0, 0.01).is_err());
    }

    #[test]
    fn nearest_station_keeps_full_weight() {
        let w = distance_weights(&[10.0, 20.0, 40.0], &[1.0, 1.0, 0.5]).unwrap();
        assert!((w[0] - (-1.0f64 / 8.0).exp()).abs() < 1e-12);
        assert!((w[1] - (-0.5f64).exp()).abs() < 1e-12);
        assert!((w[2] - 0.5 * (-2.0f64).exp()).abs() < 1e-12);
        assert!(w[0] > w[1] && w[1] > w[2]);
        assert!(distance_weights(&[1.0], &[]).is_err());
    }

    #[test]
    fn hypocentral_distance_includes_altitude() {
        let r = hypocentral_distance_km(3000.0, 4000.0, 12.0, 0.0);
        assert!((r - 13.0).abs() < 1e-12);
        let r = hypocentral_distance_km(0.0, 0.0, 1.0, 1000.0);
        assert!(r.abs() < 1e-12);
        assert!(PgdScaling::default().forward_model(&[r]).is_err());
    }
}
