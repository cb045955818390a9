//! Finite-fault slip inversion over candidate fault planes.
//!
//! Each plane is meshed around the CMT optimum and solved for strike-slip and
//! dip-slip on every patch, with a smoothing regularizer stacked under the
//! weighted dislocation model.

use nalgebra::{DMatrix, DVector};
use tracing::{debug, info};

use crate::coords::{ll2utm, zone_for_longitude};
use crate::domain::{
    CmtResults, Displacement, EarthModel, FaultPlane, FaultSeed, FaultSlipEstimate, FfResults, GfastConfig,
    OffsetSite,
};
use crate::error::{InversionError, InversionResult};
use crate::inversion::grid_search::{GridSearchOutcome, search};
use crate::inversion::mesh::{MeshParams, mesh_fault_plane};
use crate::inversion::selection::select_fault_plane;
use crate::math::{parameter_uncertainty, solve_qr_vector, weight_rows};
use crate::models::okada;
use crate::models::regularizer::{regularization_weight, regularizer};
use crate::models::Receiver;

/// A usable site projected into the inversion's UTM zone.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FfSite {
    pub receiver: Receiver,
    pub offset: Displacement,
    pub weight_east: f64,
    pub weight_north: f64,
    pub weight_up: f64,
}

/// Moment magnitude from a scalar moment in N·m, zero for no slip.
pub fn slip_magnitude(m0: f64) -> f64 {
    if m0 > 0.0 {
        ((m0 * 1.0e7).log10() - 16.1) / 1.5
    } else {
        0.0
    }
}

fn solve_plane(
    earth: &EarthModel,
    plane: &FaultPlane,
    receivers: &[Receiver],
    ud: &[f64],
    diag: &[f64],
    want_unc: bool,
) -> InversionResult<FaultSlipEstimate> {
    let g = okada::forward_model(earth, &plane.patches, receivers)?;
    let wg = weight_rows(&g, diag);
    let t = regularizer(plane)?;
    let lampred = regularization_weight(&wg, plane)?;

    let (nobs, ncols) = wg.shape();
    let nreg = t.nrows();
    let mut a = DMatrix::<f64>::zeros(nobs + nreg, ncols);
    a.rows_mut(0, nobs).copy_from(&wg);
    a.rows_mut(nobs, nreg).copy_from(&(t * lampred));
    // Regularizer rows are fit to zero.
    let mut b = DVector::<f64>::zeros(nobs + nreg);
    for (i, (d, w)) in ud.iter().zip(diag).enumerate() {
        b[i] = d * w;
    }

    let (s, r) = solve_qr_vector(&a, &b, want_unc)?;
    let unc = r.as_ref().map(parameter_uncertainty).transpose()?;

    let up: DVector<f64> = &g * &s;
    let mut xnum = 0.0;
    let mut xden = 0.0;
    for ((p, d), w) in up.iter().zip(ud).zip(diag) {
        xnum += (w * (p - d)).powi(2);
        xden += (w * d).powi(2);
    }
    if !(xden > 0.0) {
        return Err(InversionError::Solver("weighted offsets are all zero".to_string()));
    }

    let strike_slip: Vec<f64> = s.iter().step_by(2).copied().collect();
    let dip_slip: Vec<f64> = s.iter().skip(1).step_by(2).copied().collect();
    let m0: f64 = plane
        .patches
        .iter()
        .zip(strike_slip.iter().zip(&dip_slip))
        .map(|(p, (ss, ds))| earth.shear_modulus * ss.hypot(*ds) * p.length * p.width)
        .sum();
    let predicted = up
        .as_slice()
        .chunks_exact(3)
        .map(|c| Displacement {
            east: c[0],
            north: c[1],
            up: c[2],
        })
        .collect();

    Ok(FaultSlipEstimate {
        strike_slip,
        dip_slip,
        strike_slip_unc: unc.as_ref().map(|u| u.iter().step_by(2).copied().collect()),
        dip_slip_unc: unc.map(|u| u.into_iter().skip(1).step_by(2).collect()),
        mw: slip_magnitude(m0),
        variance_reduction: (1.0 - xnum / xden) * 100.0,
        predicted,
    })
}

/// Solve every candidate plane.
pub fn fault_plane_grid_search(
    earth: &EarthModel,
    planes: &[FaultPlane],
    sites: &[FfSite],
    want_unc: bool,
) -> InversionResult<GridSearchOutcome<FaultSlipEstimate>> {
    if sites.is_empty() {
        return Err(InversionError::InvalidInput("no sites for the slip inversion".to_string()));
    }
    if planes.is_empty() {
        return Err(InversionError::InvalidGrid("no candidate fault planes".to_string()));
    }
    let receivers: Vec<Receiver> = sites.iter().map(|s| s.receiver).collect();
    let ud: Vec<f64> = sites
        .iter()
        .flat_map(|s| [s.offset.east, s.offset.north, s.offset.up])
        .collect();
    let diag: Vec<f64> = sites
        .iter()
        .flat_map(|s| [s.weight_east, s.weight_north, s.weight_up])
        .collect();
    Ok(search("ff", planes, |plane| {
        solve_plane(earth, plane, &receivers, &ud, &diag, want_unc)
    }))
}

/// Seed the slip inversion from the CMT optimum: its location, depth,
/// magnitude and both nodal planes.
pub fn seed_from_cmt(cmt: &CmtResults) -> InversionResult<FaultSeed> {
    let (idx, best) = cmt
        .optimal
        .zip(cmt.optimum())
        .ok_or_else(|| InversionError::InvalidInput("CMT has no optimal solution to seed from".to_string()))?;
    let mech = &best.mechanism;
    Ok(FaultSeed {
        latitude: cmt.grid.latitudes[idx.ilat],
        longitude: cmt.grid.longitudes[idx.ilon],
        depth: cmt.grid.depths[idx.idep],
        magnitude: mech.mw,
        planes: vec![
            (mech.plane1.strike, mech.plane1.dip),
            (mech.plane2.strike, mech.plane2.dip),
        ],
    })
}

/// Mesh each seed plane and invert offsets for slip on it.
///
/// `results` carries the seed and must be sized for `sites.len()` sites.
pub fn drive_ff(config: &GfastConfig, sites: &[OffsetSite], results: &mut FfResults) -> InversionResult<()> {
    let props = &config.ff;
    if results.nsites != sites.len() || results.site_used.len() != sites.len() {
        return Err(InversionError::InvalidInput(format!(
            "finite fault results sized for {} sites, got {}",
            results.nsites,
            sites.len()
        )));
    }
    let nfp = results.seed.planes.len();
    if nfp != props.nfp || results.estimates.len() != nfp {
        return Err(InversionError::InvalidGrid(format!(
            "finite fault results hold {} planes, configured for {}",
            results.estimates.len(),
            props.nfp
        )));
    }

    let index: Vec<usize> = (0..sites.len()).filter(|&i| sites[i].is_usable()).collect();
    if index.len() < props.min_sites {
        debug!(used = index.len(), required = props.min_sites, "too few finite fault sites");
        return Err(InversionError::InsufficientData {
            used: index.len(),
            required: props.min_sites,
        });
    }

    let seed = &results.seed;
    let zone = config.utm_zone.unwrap_or_else(|| zone_for_longitude(seed.longitude));
    let mesh = MeshParams::from_props(props, Some(zone));
    let planes = seed
        .planes
        .iter()
        .map(|&(strike, dip)| {
            mesh_fault_plane(seed.latitude, seed.longitude, seed.depth, seed.magnitude, strike, dip, &mesh)
        })
        .collect::<InversionResult<Vec<_>>>()?;

    results.reset();
    let projected: Vec<FfSite> = index
        .iter()
        .map(|&i| {
            let s = &sites[i];
            let p = ll2utm(s.station.latitude, s.station.longitude, Some(zone));
            FfSite {
                receiver: Receiver {
                    easting: p.easting,
                    northing: p.northing,
                    altitude: s.station.altitude,
                },
                offset: s.offset(),
                weight_east: s.weight_east,
                weight_north: s.weight_north,
                weight_up: s.weight_up,
            }
        })
        .collect();
    for &i in &index {
        results.site_used[i] = true;
        results.observed[i] = sites[i].offset();
    }

    debug!(sites = projected.len(), planes = planes.len(), "starting slip inversion");
    let outcome = fault_plane_grid_search(&config.earth, &planes, &projected, props.slip_uncertainty)?;
    let status = outcome.status();
    results.planes.clear();
    results.planes.extend(planes);

    let nsites = sites.len();
    for (slot, est) in results.estimates.iter_mut().zip(outcome.results) {
        *slot = est.map(|e| {
            let mut predicted = vec![Displacement::default(); nsites];
            for (k, &i) in index.iter().enumerate() {
                predicted[i] = e.predicted[k];
            }
            FaultSlipEstimate { predicted, ..e }
        });
    }

    results.preferred_plane = select_fault_plane(&results.estimates);
    if let (Some(i), Some((plane, best))) = (results.preferred_plane, results.preferred()) {
        let first = plane.patches.first();
        info!(
            plane = i,
            strike = first.map(|p| p.strike),
            dip = first.map(|p| p.dip),
            mw = best.mw,
            vr = best.variance_reduction,
            "preferred fault plane"
        );
    }
    status
}
