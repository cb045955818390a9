//! Deviatoric centroid moment tensor grid search over depth (and optionally
//! latitude/longitude) from static offsets.

use nalgebra::DVector;
use tracing::{debug, info, warn};

use crate::coords::{ll2utm, zone_for_longitude};
use crate::domain::{
    CmtEstimate, CmtResults, Displacement, EarthModel, GfastConfig, Hypocenter, MomentTensor, OffsetSite,
    SourcePoint,
};
use crate::error::{InversionError, InversionResult};
use crate::inversion::decompose::decompose;
use crate::inversion::grid_search::{GridSearchOutcome, search};
use crate::inversion::selection::select_cmt_optimum;
use crate::math::{solve_qr_vector, weight_rows, weight_vector};
use crate::models::cmt::{self, NCOEFF, Separation};

/// A usable site projected into the inversion's UTM zone.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CmtSite {
    pub easting: f64,
    pub northing: f64,
    /// m
    pub altitude: f64,
    pub offset: Displacement,
}

fn solve_point(
    earth: &EarthModel,
    zone: u8,
    sites: &[CmtSite],
    rhs: &[f64],
    weights: &[f64],
    point: &SourcePoint,
) -> InversionResult<CmtEstimate> {
    let src = ll2utm(point.latitude, point.longitude, Some(zone));
    let eq_alt = point.depth * 1.0e3;
    let separations: Vec<Separation> = sites
        .iter()
        .map(|s| Separation {
            x: s.northing - src.northing,
            y: s.easting - src.easting,
            z: -(s.altitude + eq_alt),
        })
        .collect();
    let g = cmt::forward_model(earth, &separations)?;
    let (coeffs, _) = solve_qr_vector(&weight_rows(&g, weights), &weight_vector(rhs, weights), false)?;
    let mut c = [0.0; NCOEFF];
    c.copy_from_slice(coeffs.as_slice());
    let moment_tensor = MomentTensor::from_deviatoric(&c);

    let up: DVector<f64> = &g * &coeffs;
    let predicted = cmt::unpack_prediction(up.as_slice());
    let residual_norm = sites
        .iter()
        .zip(&predicted)
        .map(|(s, est)| (s.offset - *est).norm_squared())
        .sum::<f64>()
        .sqrt();

    let mechanism = decompose(&moment_tensor)?;
    Ok(CmtEstimate {
        moment_tensor,
        mechanism,
        residual_norm,
        l2: 0.5 * residual_norm.sqrt(),
        objective: residual_norm / mechanism.pct_dc,
        predicted,
    })
}

/// Solve every grid point. `weights` holds `[wn, we, wu]` per site.
pub fn cmt_grid_search(
    earth: &EarthModel,
    zone: u8,
    points: &[SourcePoint],
    sites: &[CmtSite],
    weights: &[f64],
) -> InversionResult<GridSearchOutcome<CmtEstimate>> {
    if sites.is_empty() {
        return Err(InversionError::InvalidInput("no sites for the CMT grid search".to_string()));
    }
    if weights.len() != 3 * sites.len() {
        return Err(InversionError::InvalidInput(format!(
            "{} weights for {} three-component sites",
            weights.len(),
            sites.len()
        )));
    }
    if points.is_empty() {
        return Err(InversionError::InvalidGrid("CMT grid has no points".to_string()));
    }
    let offsets: Vec<Displacement> = sites.iter().map(|s| s.offset).collect();
    let rhs = cmt::rhs(&offsets);
    Ok(search("cmt", points, |p| solve_point(earth, zone, sites, &rhs, weights, p)))
}

/// Invert static offsets for the deviatoric moment tensor at every grid point
/// and mark the optimum.
pub fn drive_cmt(
    config: &GfastConfig,
    hypo: &Hypocenter,
    sites: &[OffsetSite],
    results: &mut CmtResults,
) -> InversionResult<()> {
    let props = &config.cmt;
    if !props.deviatoric {
        return Err(InversionError::NotImplemented("general (non-deviatoric) moment tensor inversion"));
    }
    if results.nsites != sites.len() || results.site_used.len() != sites.len() {
        return Err(InversionError::InvalidInput(format!(
            "CMT results sized for {} sites, got {}",
            results.nsites,
            sites.len()
        )));
    }
    let dims = results.grid.dims();
    if dims != (props.nlons, props.nlats, props.ndeps) || results.estimates.dims() != dims {
        return Err(InversionError::InvalidGrid(format!(
            "CMT results grid {dims:?} does not match the configured {}x{}x{}",
            props.nlons, props.nlats, props.ndeps
        )));
    }

    let used: Vec<&OffsetSite> = sites.iter().filter(|s| s.is_usable()).collect();
    if used.len() < props.min_sites {
        debug!(used = used.len(), required = props.min_sites, "too few CMT sites");
        return Err(InversionError::InsufficientData {
            used: used.len(),
            required: props.min_sites,
        });
    }
    results.reset();

    let depths = &results.grid.depths;
    if let (Some(first), Some(last)) = (depths.first(), depths.last())
        && (hypo.depth_km < *first || hypo.depth_km > *last)
    {
        warn!(depth = hypo.depth_km, "hypocentre depth is outside the CMT depth grid");
    }

    let zone = config.utm_zone.unwrap_or_else(|| zone_for_longitude(hypo.longitude));
    let projected: Vec<CmtSite> = used
        .iter()
        .map(|s| {
            let p = ll2utm(s.station.latitude, s.station.longitude, Some(zone));
            CmtSite {
                easting: p.easting,
                northing: p.northing,
                altitude: s.station.altitude,
                offset: s.offset(),
            }
        })
        .collect();
    let weights = cmt::diagonal_weights(&used);

    let index: Vec<usize> = (0..sites.len()).filter(|&i| sites[i].is_usable()).collect();
    for &i in &index {
        results.site_used[i] = true;
        results.observed[i] = sites[i].offset();
    }

    debug!(sites = projected.len(), points = results.grid.len(), "starting CMT grid search");
    let outcome = cmt_grid_search(&config.earth, zone, &results.grid.points(), &projected, &weights)?;
    let status = outcome.status();

    let nsites = sites.len();
    for (slot, est) in results.estimates.as_mut_slice().iter_mut().zip(outcome.results) {
        *slot = est.map(|e| {
            let mut predicted = vec![Displacement::default(); nsites];
            for (k, &i) in index.iter().enumerate() {
                predicted[i] = e.predicted[k];
            }
            CmtEstimate { predicted, ..e }
        });
    }

    results.optimal = select_cmt_optimum(&results.estimates);
    if let (Some(depth), Some(best)) = (results.optimal_depth(), results.optimum()) {
        let np = best.mechanism.plane1;
        info!(
            depth,
            mw = best.mechanism.mw,
            dc = best.mechanism.pct_dc,
            strike = np.strike,
            dip = np.dip,
            rake = np.rake,
            "CMT optimum"
        );
    }
    status
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::synthetic::{Noise, cmt_offsets, ring_layout};
    use crate::domain::{GridIndex, NodalPlane, SourceGrid};
    use crate::inversion::decompose::{double_couple, scalar_moment_from_mw};
    use chrono::Utc;

    const STLA: [f64; 9] = [
        48.83532872, 42.83609887, 45.48651503, 49.87305293, 50.64035267, 41.90232489, 48.29785467, 40.87630594,
        40.50478709,
    ];
    const STLO: [f64; 9] = [
        -125.13510527, -124.56334629, -123.97812400, -127.12266484, -128.13499899, -120.30283244, -124.62490719,
        -124.07537043, -124.28278289,
    ];

    fn thrust() -> MomentTensor {
        let plane = NodalPlane {
            strike: 350.0,
            dip: 15.0,
            rake: 95.0,
        };
        double_couple(&plane, scalar_moment_from_mw(7.5))
    }

    fn hypo(depth_km: f64) -> Hypocenter {
        Hypocenter {
            event_id: "test".to_string(),
            latitude: 47.19,
            longitude: -122.66,
            depth_km,
            origin_time: Utc::now(),
            magnitude: None,
        }
    }

    #[test]
    fn nine_station_double_couple_at_57_km() {
        let earth = EarthModel::default();
        let src = ll2utm(47.19, -122.66, Some(10));
        let mt = thrust();
        let truth = mt.deviatoric_coefficients();

        let mut sites: Vec<CmtSite> = (0..9)
            .map(|i| {
                let p = ll2utm(STLA[i], STLO[i], Some(10));
                CmtSite {
                    easting: p.easting,
                    northing: p.northing,
                    altitude: 0.0,
                    offset: Displacement::default(),
                }
            })
            .collect();
        let seps: Vec<Separation> = sites
            .iter()
            .map(|s| Separation {
                x: s.northing - src.northing,
                y: s.easting - src.easting,
                z: -57.0e3,
            })
            .collect();
        let g = cmt::forward_model(&earth, &seps).unwrap();
        let up = &g * DVector::from_column_slice(&truth);
        for (s, d) in sites.iter_mut().zip(cmt::unpack_prediction(up.as_slice())) {
            s.offset = d;
        }
        let data_norm = sites.iter().map(|s| s.offset.norm_squared()).sum::<f64>().sqrt();
        assert!(data_norm > 0.0);

        let grid = SourceGrid::depths_at(47.19, -122.66, vec![57.0]).unwrap();
        let out = cmt_grid_search(&earth, 10, &grid.points(), &sites, &[1.0; 27]).unwrap();
        assert_eq!(out.failed, 0);
        let est = out.results[0].as_ref().unwrap();

        let got = est.moment_tensor.deviatoric_coefficients();
        let scale = truth.iter().fold(0.0_f64, |m, v| m.max(v.abs()));
        for (a, b) in got.iter().zip(truth) {
            assert!((a - b).abs() < 1e-4 * scale, "{a} vs {b}");
        }
        assert!(est.moment_tensor.trace().abs() < 1e-6 * scale);
        assert!(est.residual_norm < 1e-8 * data_norm);
        assert!(est.mechanism.pct_dc > 99.99);
        assert!(est.objective < 1e-8 * data_norm);
        assert!((est.mechanism.mw - 7.5).abs() < 1e-4);
    }

    fn synthetic(depth: f64) -> (GfastConfig, Hypocenter, Vec<OffsetSite>) {
        let mut config = GfastConfig::default();
        config.cmt.ndeps = 60;
        config.validate().unwrap();
        let h = hypo(depth);
        let stations = ring_layout(h.latitude, h.longitude, 16, 30.0, 300.0);
        let sites = cmt_offsets(&config.earth, &h, &stations, &thrust(), None, &mut Noise::none()).unwrap();
        (config, h, sites)
    }

    #[test]
    fn depth_search_finds_the_source_depth() {
        let (config, h, sites) = synthetic(57.0);
        let mut results = CmtResults::new(config.cmt.source_grid(&h).unwrap(), sites.len());
        drive_cmt(&config, &h, &sites, &mut results).unwrap();
        assert_eq!(results.optimal, Some(GridIndex { ilon: 0, ilat: 0, idep: 56 }));
        assert_eq!(results.optimal_depth(), Some(57.0));
        for (_, est) in results.estimates.iter() {
            let est = est.as_ref().unwrap();
            assert!(est.moment_tensor.trace().abs() < 1e-6 * est.mechanism.m0);
            assert_eq!(est.predicted.len(), sites.len());
        }
        let best = results.optimum().unwrap();
        assert!((best.mechanism.mw - 7.5).abs() < 1e-3);
    }

    #[test]
    fn thread_count_does_not_change_the_optimum() {
        let (mut config, h, sites) = synthetic(20.0);
        config.cmt.ndeps = 30;
        config.cmt.nlats = 3;
        config.cmt.nlons = 3;
        let run = |threads: usize| {
            let mut results = CmtResults::new(config.cmt.source_grid(&h).unwrap(), sites.len());
            rayon::ThreadPoolBuilder::new()
                .num_threads(threads)
                .build()
                .unwrap()
                .install(|| drive_cmt(&config, &h, &sites, &mut results))
                .unwrap();
            results
        };
        let one = run(1);
        let many = run(3);
        assert_eq!(one, many);
        assert_eq!(one.optimal, Some(GridIndex { ilon: 1, ilat: 1, idep: 19 }));
    }

    #[test]
    fn masked_sites_are_skipped_and_zeroed() {
        let (config, h, mut sites) = synthetic(40.0);
        sites[0].masked = true;
        sites[1].north = f64::NAN;
        let mut results = CmtResults::new(config.cmt.source_grid(&h).unwrap(), sites.len());
        drive_cmt(&config, &h, &sites, &mut results).unwrap();
        assert!(!results.site_used[0] && !results.site_used[1]);
        let best = results.optimum().unwrap();
        assert_eq!(best.predicted[0], Displacement::default());
        assert_eq!(results.observed[1], Displacement::default());
        assert_eq!(results.optimal_depth(), Some(40.0));
    }

    #[test]
    fn general_tensor_and_insufficient_data_are_reported() {
        let (mut config, h, sites) = synthetic(10.0);
        let mut results = CmtResults::new(config.cmt.source_grid(&h).unwrap(), sites.len());
        let before = results.clone();

        let few: Vec<OffsetSite> = sites
            .iter()
            .cloned()
            .enumerate()
            .map(|(i, mut s)| {
                s.active = i < 3;
                s
            })
            .collect();
        assert_eq!(
            drive_cmt(&config, &h, &few, &mut results),
            Err(InversionError::InsufficientData { used: 3, required: 4 })
        );
        assert_eq!(results, before);

        config.cmt.deviatoric = false;
        assert!(matches!(
            drive_cmt(&config, &h, &sites, &mut results),
            Err(InversionError::NotImplemented(_))
        ));
    }
}
