//! Result collections filled in place by the inversion drivers.
//!
//! A collection is sized by the caller for the whole grid (and site list)
//! before an inversion runs. Drivers only write into it; they never resize it.
//! Points whose least-squares solve failed stay `None`.

use serde::{Deserialize, Serialize};

use crate::domain::grid::{Grid3, GridIndex, SourceGrid};
use crate::domain::types::{Displacement, Mechanism, MomentTensor};

/// One solved PGD hypothesis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PgdEstimate {
    pub magnitude: f64,
    pub variance_reduction: f64,
    /// Interquartile range of the weighted residuals.
    pub iqr: f64,
    /// `magnitude * min(iqr) / iqr`, set once the whole grid is solved.
    pub iqr_weighted_magnitude: f64,
    /// Predicted peak displacement per input site (cm); zero for unused sites.
    pub predicted: Vec<f64>,
    /// Hypocentral distance per input site (km); zero for unused sites.
    pub distances: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PgdResults {
    pub grid: SourceGrid,
    pub nsites: usize,
    pub estimates: Grid3<Option<PgdEstimate>>,
    /// Observed peak displacement per input site (cm); zero for unused sites.
    pub observed: Vec<f64>,
    pub site_used: Vec<bool>,
    /// Highest variance reduction.
    pub preferred_by_variance_reduction: Option<GridIndex>,
    /// Highest IQR-weighted magnitude.
    pub preferred_by_iqr: Option<GridIndex>,
}

impl PgdResults {
    pub fn new(grid: SourceGrid, nsites: usize) -> Self {
        let estimates = grid.allocate(None);
        Self {
            grid,
            nsites,
            estimates,
            observed: vec![0.0; nsites],
            site_used: vec![false; nsites],
            preferred_by_variance_reduction: None,
            preferred_by_iqr: None,
        }
    }

    pub fn reset(&mut self) {
        self.estimates.fill(None);
        self.observed.fill(0.0);
        self.site_used.fill(false);
        self.preferred_by_variance_reduction = None;
        self.preferred_by_iqr = None;
    }

    /// Estimate at the IQR-weighted optimum.
    pub fn preferred(&self) -> Option<&PgdEstimate> {
        self.preferred_by_iqr
            .and_then(|idx| self.estimates.get(idx))
            .and_then(Option::as_ref)
    }
}

/// One solved CMT hypothesis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CmtEstimate {
    pub moment_tensor: MomentTensor,
    pub mechanism: Mechanism,
    /// `sqrt(Σ residual²)` over all used components (m).
    pub residual_norm: f64,
    /// `0.5 * sqrt(residual_norm)`.
    pub l2: f64,
    /// `residual_norm / pct_dc`; smaller is better.
    pub objective: f64,
    /// Predicted offsets per input site; zero for unused sites.
    pub predicted: Vec<Displacement>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CmtResults {
    pub grid: SourceGrid,
    pub nsites: usize,
    pub estimates: Grid3<Option<CmtEstimate>>,
    /// Observed offsets per input site; zero for unused sites.
    pub observed: Vec<Displacement>,
    pub site_used: Vec<bool>,
    pub optimal: Option<GridIndex>,
}

impl CmtResults {
    pub fn new(grid: SourceGrid, nsites: usize) -> Self {
        let estimates = grid.allocate(None);
        Self {
            grid,
            nsites,
            estimates,
            observed: vec![Displacement::default(); nsites],
            site_used: vec![false; nsites],
            optimal: None,
        }
    }

    pub fn reset(&mut self) {
        self.estimates.fill(None);
        self.observed.fill(Displacement::default());
        self.site_used.fill(false);
        self.optimal = None;
    }

    pub fn optimum(&self) -> Option<&CmtEstimate> {
        self.optimal
            .and_then(|idx| self.estimates.get(idx))
            .and_then(Option::as_ref)
    }

    /// Source depth (km) of the optimum.
    pub fn optimal_depth(&self) -> Option<f64> {
        self.optimal.map(|idx| self.grid.depths[idx.idep])
    }
}

/// Corner of a fault patch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PatchVertex {
    pub latitude: f64,
    pub longitude: f64,
    /// km
    pub depth: f64,
}

/// One rectangular sub-fault.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaultPatch {
    pub latitude: f64,
    pub longitude: f64,
    /// Patch centre, UTM metres.
    pub easting: f64,
    pub northing: f64,
    /// Patch centre depth, km.
    pub depth: f64,
    pub strike: f64,
    pub dip: f64,
    /// Along-strike length, m.
    pub length: f64,
    /// Down-dip width, m.
    pub width: f64,
    /// Corners in the order top-left, top-right, bottom-right, bottom-left.
    pub vertices: [PatchVertex; 4],
}

/// A meshed candidate fault plane. Patch `j * nstr + i` is the `i`-th along
/// strike in the `j`-th row down dip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaultPlane {
    pub nstr: usize,
    pub ndip: usize,
    pub patches: Vec<FaultPatch>,
}

impl FaultPlane {
    pub fn len(&self) -> usize {
        self.patches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patches.is_empty()
    }
}

/// Slip solution for one fault plane.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaultSlipEstimate {
    pub strike_slip: Vec<f64>,
    pub dip_slip: Vec<f64>,
    /// Present only when uncertainty was requested.
    pub strike_slip_unc: Option<Vec<f64>>,
    pub dip_slip_unc: Option<Vec<f64>>,
    pub mw: f64,
    pub variance_reduction: f64,
    /// Predicted offsets per input site; zero for unused sites.
    pub predicted: Vec<Displacement>,
}

/// Starting point of the slip inversion, usually the CMT optimum.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaultSeed {
    pub latitude: f64,
    pub longitude: f64,
    /// km
    pub depth: f64,
    pub magnitude: f64,
    /// `(strike, dip)` of every candidate plane, degrees.
    pub planes: Vec<(f64, f64)>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FfResults {
    pub seed: FaultSeed,
    pub nsites: usize,
    pub planes: Vec<FaultPlane>,
    pub estimates: Vec<Option<FaultSlipEstimate>>,
    pub observed: Vec<Displacement>,
    pub site_used: Vec<bool>,
    pub preferred_plane: Option<usize>,
}

impl FfResults {
    pub fn new(seed: FaultSeed, nsites: usize) -> Self {
        let nfp = seed.planes.len();
        Self {
            seed,
            nsites,
            planes: Vec::with_capacity(nfp),
            estimates: vec![None; nfp],
            observed: vec![Displacement::default(); nsites],
            site_used: vec![false; nsites],
            preferred_plane: None,
        }
    }

    pub fn reset(&mut self) {
        self.planes.clear();
        self.estimates.fill(None);
        self.observed.fill(Displacement::default());
        self.site_used.fill(false);
        self.preferred_plane = None;
    }

    pub fn preferred(&self) -> Option<(&FaultPlane, &FaultSlipEstimate)> {
        let i = self.preferred_plane?;
        Some((self.planes.get(i)?, self.estimates.get(i)?.as_ref()?))
    }
}
