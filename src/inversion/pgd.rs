//! Peak-ground-displacement magnitude grid search.
//!
//! Every candidate source location is a one-parameter regression of
//! `log10(pgd) - A` on `B + C·log10(r)`, weighted so stations close to the
//! epicentre dominate.

use tracing::{debug, info, warn};

use crate::coords::{ll2utm, zone_for_longitude};
use crate::domain::{GfastConfig, Hypocenter, PeakDisplacementSite, PgdEstimate, PgdResults, SourcePoint};
use crate::error::{InversionError, InversionResult};
use crate::inversion::grid_search::{GridSearchOutcome, search};
use crate::inversion::selection::{apply_iqr_weighting, select_pgd};
use crate::math::{interquartile_range, solve_qr_vector, weight_rows, weight_vector};
use crate::models::pgd::{distance_weights, hypocentral_distance_km};
use crate::models::PgdScaling;

/// A usable site projected into the inversion's UTM zone.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PgdSite {
    pub easting: f64,
    pub northing: f64,
    /// m
    pub altitude: f64,
    /// cm
    pub pgd: f64,
    pub weight: f64,
}

/// Constants of one PGD search.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PgdSearch {
    pub scaling: PgdScaling,
    /// cm
    pub dist_tol: f64,
    /// cm
    pub disp_def: f64,
    pub zone: u8,
}

fn solve_point(params: &PgdSearch, sites: &[PgdSite], rhs: &[f64], point: &SourcePoint) -> InversionResult<PgdEstimate> {
    let src = ll2utm(point.latitude, point.longitude, Some(params.zone));
    let repi: Vec<f64> = sites
        .iter()
        .map(|s| (s.easting - src.easting).hypot(s.northing - src.northing) * 1.0e-3)
        .collect();
    let wts: Vec<f64> = sites.iter().map(|s| s.weight).collect();
    let w = distance_weights(&repi, &wts)?;

    let r: Vec<f64> = sites
        .iter()
        .map(|s| hypocentral_distance_km(s.easting - src.easting, s.northing - src.northing, point.depth, s.altitude))
        .collect();
    let g = params.scaling.forward_model(&r)?;
    let (m, _) = solve_qr_vector(&weight_rows(&g, &w), &weight_vector(rhs, &w), false)?;
    let magnitude = m[0];

    let predicted: Vec<f64> = g.iter().map(|&gi| params.scaling.predict(gi, magnitude)).collect();
    let wres: Vec<f64> = sites
        .iter()
        .zip(&predicted)
        .zip(&w)
        .map(|((s, est), wi)| wi * (s.pgd - est))
        .collect();
    let xnum: f64 = wres.iter().map(|v| v * v).sum();
    let xden: f64 = sites.iter().zip(&w).map(|(s, wi)| (wi * s.pgd).powi(2)).sum();
    if !(xden > 0.0) {
        return Err(InversionError::Solver("weighted observations are all zero".to_string()));
    }
    let iqr = interquartile_range(&wres).unwrap_or_else(|e| {
        debug!(error = %e, "interquartile range failed; using 1");
        1.0
    });

    Ok(PgdEstimate {
        magnitude,
        variance_reduction: (1.0 - xnum / xden) * 100.0,
        iqr,
        iqr_weighted_magnitude: magnitude,
        predicted,
        distances: r,
    })
}

/// Solve every grid point. Per-point vectors follow the order of `sites`.
pub fn pgd_grid_search(
    params: &PgdSearch,
    points: &[SourcePoint],
    sites: &[PgdSite],
) -> InversionResult<GridSearchOutcome<PgdEstimate>> {
    if sites.is_empty() {
        return Err(InversionError::InvalidInput("no sites for the PGD grid search".to_string()));
    }
    if points.is_empty() {
        return Err(InversionError::InvalidGrid("PGD grid has no points".to_string()));
    }
    let pgd: Vec<f64> = sites.iter().map(|s| s.pgd).collect();
    let rhs = params.scaling.rhs(&pgd, params.dist_tol, params.disp_def)?;
    Ok(search("pgd", points, |p| solve_point(params, sites, &rhs, p)))
}

/// Estimate magnitude from peak ground displacement over the configured grid.
///
/// `results` must have been created for `sites.len()` sites and this
/// configuration's grid. It is left untouched when too few sites are usable.
pub fn drive_pgd(
    config: &GfastConfig,
    hypo: &Hypocenter,
    sites: &[PeakDisplacementSite],
    results: &mut PgdResults,
) -> InversionResult<()> {
    let props = &config.pgd;
    if results.nsites != sites.len() || results.site_used.len() != sites.len() {
        return Err(InversionError::InvalidInput(format!(
            "PGD results sized for {} sites, got {}",
            results.nsites,
            sites.len()
        )));
    }
    let dims = results.grid.dims();
    if dims != (props.nlons, props.nlats, props.ndeps) || results.estimates.dims() != dims {
        return Err(InversionError::InvalidGrid(format!(
            "PGD results grid {dims:?} does not match the configured {}x{}x{}",
            props.nlons, props.nlats, props.ndeps
        )));
    }

    let used: Vec<usize> = (0..sites.len()).filter(|&i| sites[i].is_usable()).collect();
    if used.len() < props.min_sites {
        debug!(used = used.len(), required = props.min_sites, "too few PGD sites");
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
        warn!(depth = hypo.depth_km, "hypocentre depth is outside the PGD depth grid");
    }

    let zone = config.utm_zone.unwrap_or_else(|| zone_for_longitude(hypo.longitude));
    let projected: Vec<PgdSite> = used
        .iter()
        .map(|&i| {
            let s = &sites[i];
            let p = ll2utm(s.station.latitude, s.station.longitude, Some(zone));
            PgdSite {
                easting: p.easting,
                northing: p.northing,
                altitude: s.station.altitude,
                pgd: s.pgd * 100.0,
                weight: s.weight,
            }
        })
        .collect();
    for (&i, p) in used.iter().zip(&projected) {
        results.site_used[i] = true;
        results.observed[i] = p.pgd;
    }

    let params = PgdSearch {
        scaling: PgdScaling::default(),
        dist_tol: props.dist_tol,
        disp_def: props.disp_def,
        zone,
    };
    debug!(sites = projected.len(), points = results.grid.len(), "starting PGD grid search");
    let outcome = pgd_grid_search(&params, &results.grid.points(), &projected)?;

    let nsites = sites.len();
    for (slot, est) in results.estimates.as_mut_slice().iter_mut().zip(&outcome.results) {
        *slot = est.as_ref().map(|e| {
            let mut predicted = vec![0.0; nsites];
            let mut distances = vec![0.0; nsites];
            for (k, &i) in used.iter().enumerate() {
                predicted[i] = e.predicted[k];
                distances[i] = e.distances[k];
            }
            PgdEstimate {
                predicted,
                distances,
                ..e.clone()
            }
        });
    }

    apply_iqr_weighting(&mut results.estimates);
    let (by_vr, by_iqr) = select_pgd(&results.estimates);
    results.preferred_by_variance_reduction = by_vr;
    results.preferred_by_iqr = by_iqr;
    if let (Some(idx), Some(best)) = (by_iqr, results.preferred()) {
        info!(
            magnitude = best.magnitude,
            depth = results.grid.depths[idx.idep],
            vr = best.variance_reduction,
            "PGD preferred solution"
        );
    }
    outcome.status()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::synthetic::{Noise, peak_displacements, ring_layout};
    use crate::domain::{GridIndex, SourceGrid};
    use chrono::Utc;

    const STLA: [f64; 9] = [
        48.83532872, 42.83609887, 45.48651503, 49.87305293, 50.64035267, 41.90232489, 48.29785467, 40.87630594,
        40.50478709,
    ];
    const STLO: [f64; 9] = [
        -125.13510527, -124.56334629, -123.97812400, -127.12266484, -128.13499899, -120.30283244, -124.62490719,
        -124.07537043, -124.28278289,
    ];

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
    fn nine_station_reference_magnitude() {
        let pgd_cm = [4.0, 7.1, 8.0, 3.0, 1.0, 9.0, 6.0, 5.5, 6.5];
        let sites: Vec<PgdSite> = (0..9)
            .map(|i| {
                let p = ll2utm(STLA[i], STLO[i], Some(10));
                PgdSite {
                    easting: p.easting,
                    northing: p.northing,
                    altitude: 0.0,
                    pgd: pgd_cm[i],
                    weight: 1.0,
                }
            })
            .collect();
        let params = PgdSearch {
            scaling: PgdScaling::default(),
            dist_tol: 6.0,
            disp_def: 0.01,
            zone: 10,
        };
        let grid = SourceGrid::depths_at(47.19, -122.66, vec![57.0]).unwrap();
        let out = pgd_grid_search(&params, &grid.points(), &sites).unwrap();
        assert_eq!(out.failed, 0);
        let est = out.results[0].as_ref().unwrap();
        assert!((est.magnitude - 6.6379784).abs() < 1e-4, "M = {}", est.magnitude);
        assert_eq!(est.distances.len(), 9);
    }

    fn synthetic_sites(magnitude: f64, depth: f64) -> (GfastConfig, Vec<PeakDisplacementSite>) {
        let mut config = GfastConfig::default();
        config.pgd.ndeps = 40;
        config.validate().unwrap();
        let stations = ring_layout(47.19, -122.66, 12, 40.0, 250.0);
        let sites = peak_displacements(&hypo(depth), &stations, magnitude, None, &mut Noise::none()).unwrap();
        (config, sites)
    }

    #[test]
    fn noise_free_data_recovers_magnitude_at_true_depth() {
        let (config, sites) = synthetic_sites(8.0, 20.0);
        let h = hypo(20.0);
        let mut results = PgdResults::new(config.pgd.source_grid(&h).unwrap(), sites.len());
        drive_pgd(&config, &h, &sites, &mut results).unwrap();

        let at_true = results.estimates[GridIndex { ilon: 0, ilat: 0, idep: 19 }]
            .as_ref()
            .unwrap();
        assert!((at_true.magnitude - 8.0).abs() < 1e-9);
        assert!((at_true.variance_reduction - 100.0).abs() < 1e-6);
        assert_eq!(results.preferred_by_variance_reduction.map(|i| i.idep), Some(19));
        assert!(results.preferred_by_iqr.is_some());
        // Observations are reported in centimetres.
        assert!((results.observed[0] - sites[0].pgd * 100.0).abs() < 1e-9);
        assert!(results.site_used.iter().all(|u| *u));
    }

    #[test]
    fn unusable_sites_are_zeroed_in_the_output() {
        let (config, mut sites) = synthetic_sites(7.5, 30.0);
        sites[2].masked = true;
        sites[5].active = false;
        let h = hypo(30.0);
        let mut results = PgdResults::new(config.pgd.source_grid(&h).unwrap(), sites.len());
        drive_pgd(&config, &h, &sites, &mut results).unwrap();
        let best = results.preferred().unwrap();
        assert_eq!(best.predicted.len(), sites.len());
        assert_eq!(best.predicted[2], 0.0);
        assert_eq!(best.distances[5], 0.0);
        assert!(best.predicted[0] > 0.0);
        assert!(!results.site_used[2] && !results.site_used[5]);
        assert_eq!(results.observed[2], 0.0);
    }

    #[test]
    fn insufficient_data_leaves_results_untouched() {
        let (config, mut sites) = synthetic_sites(7.0, 10.0);
        for s in sites.iter_mut().skip(3) {
            s.weight = 0.0;
        }
        let h = hypo(10.0);
        let mut results = PgdResults::new(config.pgd.source_grid(&h).unwrap(), sites.len());
        results.observed[0] = 42.0;
        let before = results.clone();
        let err = drive_pgd(&config, &h, &sites, &mut results).unwrap_err();
        assert_eq!(err, InversionError::InsufficientData { used: 3, required: 4 });
        assert_eq!(results, before);
    }

    #[test]
    fn mis_sized_results_are_rejected() {
        let (config, sites) = synthetic_sites(7.0, 10.0);
        let h = hypo(10.0);
        let mut results = PgdResults::new(config.pgd.source_grid(&h).unwrap(), sites.len() - 1);
        assert!(matches!(
            drive_pgd(&config, &h, &sites, &mut results),
            Err(InversionError::InvalidInput(_))
        ));
        let grid = SourceGrid::depths_at(h.latitude, h.longitude, vec![10.0]).unwrap();
        let mut results = PgdResults::new(grid, sites.len());
        assert!(matches!(
            drive_pgd(&config, &h, &sites, &mut results),
            Err(InversionError::InvalidGrid(_))
        ));
    }

    #[test]
    fn lat_lon_search_is_thread_independent() {
        let (mut config, sites) = synthetic_sites(7.8, 15.0);
        config.pgd.ndeps = 25;
        config.pgd.nlats = 3;
        config.pgd.nlons = 3;
        let h = hypo(15.0);
        let run = |threads: usize| {
            let mut results = PgdResults::new(config.pgd.source_grid(&h).unwrap(), sites.len());
            rayon::ThreadPoolBuilder::new()
                .num_threads(threads)
                .build()
                .unwrap()
                .install(|| drive_pgd(&config, &h, &sites, &mut results))
                .unwrap();
            results
        };
        let one = run(1);
        let many = run(4);
        assert_eq!(one, many);
        // The true epicentre is the centre node.
        assert_eq!(
            one.preferred_by_variance_reduction,
            Some(GridIndex { ilon: 1, ilat: 1, idep: 14 })
        );
    }
}
