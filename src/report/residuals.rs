//! Observed vs predicted values at the selected optimum of each inversion.

use serde::Serialize;

use crate::domain::{CmtResults, Displacement, FfResults, OffsetSite, PeakDisplacementSite, PgdResults, Station};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Product {
    Pgd,
    Cmt,
    Ff,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Component {
    /// Peak ground displacement, cm.
    Pgd,
    North,
    East,
    Up,
}

/// One row of a residual table. PGD values are in cm, offsets in m.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SiteResidual {
    pub product: Product,
    pub station: String,
    pub latitude: f64,
    pub longitude: f64,
    pub component: Component,
    pub observed: f64,
    pub predicted: f64,
    pub residual: f64,
}

impl SiteResidual {
    fn new(product: Product, station: &Station, component: Component, observed: f64, predicted: f64) -> Self {
        Self {
            product,
            station: station.name.clone(),
            latitude: station.latitude,
            longitude: station.longitude,
            component,
            observed,
            predicted,
            residual: observed - predicted,
        }
    }
}

/// Residuals at the IQR-weighted PGD optimum. Empty if nothing was selected.
pub fn pgd_site_residuals(sites: &[PeakDisplacementSite], results: &PgdResults) -> Vec<SiteResidual> {
    let Some(best) = results.preferred() else {
        return Vec::new();
    };
    sites
        .iter()
        .enumerate()
        .filter(|(i, _)| results.site_used.get(*i).copied().unwrap_or(false))
        .map(|(i, site)| {
            SiteResidual::new(Product::Pgd, &site.station, Component::Pgd, results.observed[i], best.predicted[i])
        })
        .collect()
}

pub fn cmt_site_residuals(sites: &[OffsetSite], results: &CmtResults) -> Vec<SiteResidual> {
    let Some(best) = results.optimum() else {
        return Vec::new();
    };
    offset_residuals(Product::Cmt, sites, &results.site_used, &results.observed, &best.predicted)
}

pub fn ff_site_residuals(sites: &[OffsetSite], results: &FfResults) -> Vec<SiteResidual> {
    let Some((_, best)) = results.preferred() else {
        return Vec::new();
    };
    offset_residuals(Product::Ff, sites, &results.site_used, &results.observed, &best.predicted)
}

fn offset_residuals(
    product: Product,
    sites: &[OffsetSite],
    used: &[bool],
    observed: &[Displacement],
    predicted: &[Displacement],
) -> Vec<SiteResidual> {
    let mut out = Vec::new();
    for (i, site) in sites.iter().enumerate() {
        if !used.get(i).copied().unwrap_or(false) {
            continue;
        }
        let (obs, est) = (observed[i], predicted[i]);
        out.push(SiteResidual::new(product, &site.station, Component::North, obs.north, est.north));
        out.push(SiteResidual::new(product, &site.station, Component::East, obs.east, est.east));
        out.push(SiteResidual::new(product, &site.station, Component::Up, obs.up, est.up));
    }
    out
}

/// Root-mean-square residual of a table.
pub fn rms(rows: &[SiteResidual]) -> Option<f64> {
    if rows.is_empty() {
        return None;
    }
    let ss: f64 = rows.iter().map(|r| r.residual * r.residual).sum();
    Some((ss / rows.len() as f64).sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CmtEstimate, GridIndex, Mechanism, MomentTensor, PgdEstimate, SourceGrid};

    fn station(name: &str) -> Station {
        Station {
            name: name.to_string(),
            latitude: 40.0,
            longitude: -124.0,
            altitude: 0.0,
        }
    }

    fn offset_site(name: &str) -> OffsetSite {
        OffsetSite {
            station: station(name),
            north: 0.0,
            east: 0.0,
            up: 0.0,
            weight_north: 1.0,
            weight_east: 1.0,
            weight_up: 1.0,
            active: true,
            masked: false,
        }
    }

    #[test]
    fn pgd_residuals_skip_unused_sites() {
        let sites: Vec<_> = ["A", "B", "C"]
            .iter()
            .map(|n| PeakDisplacementSite {
                station: station(n),
                pgd: 0.1,
                weight: 1.0,
                active: true,
                masked: false,
            })
            .collect();
        let grid = SourceGrid::depths_at(40.0, -124.0, vec![10.0]).unwrap();
        let mut results = PgdResults::new(grid, 3);
        results.site_used = vec![true, false, true];
        results.observed = vec![10.0, 0.0, 4.0];
        let idx = GridIndex { ilon: 0, ilat: 0, idep: 0 };
        *results.estimates.get_mut(idx).unwrap() = Some(PgdEstimate {
            magnitude: 7.0,
            variance_reduction: 90.0,
            iqr: 1.0,
            iqr_weighted_magnitude: 7.0,
            predicted: vec![9.0, 0.0, 5.0],
            distances: vec![10.0, 0.0, 20.0],
        });
        assert!(pgd_site_residuals(&sites, &results).is_empty());

        results.preferred_by_iqr = Some(idx);
        let rows = pgd_site_residuals(&sites, &results);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].station, "A");
        assert!((rows[0].residual - 1.0).abs() < 1e-12);
        assert_eq!(rows[1].station, "C");
        assert!((rows[1].residual + 1.0).abs() < 1e-12);
        assert!((rms(&rows).unwrap() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn offset_residuals_expand_components() {
        let sites = vec![offset_site("A"), offset_site("B")];
        let grid = SourceGrid::depths_at(40.0, -124.0, vec![10.0, 20.0]).unwrap();
        let mut results = CmtResults::new(grid, 2);
        results.site_used = vec![false, true];
        results.observed[1] = Displacement { north: 0.3, east: -0.2, up: 0.1 };
        let idx = GridIndex { ilon: 0, ilat: 0, idep: 1 };
        *results.estimates.get_mut(idx).unwrap() = Some(CmtEstimate {
            moment_tensor: MomentTensor::default(),
            mechanism: Mechanism::default(),
            residual_norm: 0.0,
            l2: 0.0,
            objective: 0.0,
            predicted: vec![Displacement::default(), Displacement { north: 0.1, east: -0.2, up: 0.0 }],
        });
        results.optimal = Some(idx);

        let rows = cmt_site_residuals(&sites, &results);
        assert_eq!(rows.len(), 3);
        assert!(rows.iter().all(|r| r.station == "B" && r.product == Product::Cmt));
        assert_eq!(rows[0].component, Component::North);
        assert!((rows[0].residual - 0.2).abs() < 1e-12);
        assert!(rows[1].residual.abs() < 1e-12);
        assert!((rows[2].residual - 0.1).abs() < 1e-12);
    }

    #[test]
    fn rms_of_empty_table_is_none() {
        assert_eq!(rms(&[]), None);
    }
}
