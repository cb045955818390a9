//! Inversion configuration.
//!
//! Every field has a default so a partial (or empty) JSON file is valid.
//! [`GfastConfig::validate`] rejects impossible settings and nudges the
//! correctable ones (even lat/lon counts) with a warning.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::domain::grid::{SourceGrid, default_depths};
use crate::domain::types::{EarthModel, Hypocenter};
use crate::error::{InversionError, InversionResult};

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GfastConfig {
    /// Fixed UTM zone; `None` uses the hypocentre's zone.
    pub utm_zone: Option<u8>,
    pub earth: EarthModel,
    pub pgd: PgdProps,
    pub cmt: CmtProps,
    pub ff: FfProps,
}

impl Default for GfastConfig {
    fn default() -> Self {
        Self {
            utm_zone: None,
            earth: EarthModel::default(),
            pgd: PgdProps::default(),
            cmt: CmtProps::default(),
            ff: FfProps::default(),
        }
    }
}

/// Peak-ground-displacement magnitude scaling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PgdProps {
    /// Displacements below this (cm) are replaced by `disp_def`.
    pub dist_tol: f64,
    /// Replacement displacement (cm).
    pub disp_def: f64,
    pub min_sites: usize,
    pub ndeps: usize,
    pub nlats: usize,
    pub nlons: usize,
    pub dlat: f64,
    pub dlon: f64,
}

impl Default for PgdProps {
    fn default() -> Self {
        Self {
            dist_tol: 6.0,
            disp_def: 0.01,
            min_sites: 4,
            ndeps: 100,
            nlats: 1,
            nlons: 1,
            dlat: 0.1,
            dlon: 0.1,
        }
    }
}

/// Centroid moment tensor depth search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CmtProps {
    pub min_sites: usize,
    pub ndeps: usize,
    pub nlats: usize,
    pub nlons: usize,
    pub dlat: f64,
    pub dlon: f64,
    /// Only the deviatoric (5 parameter) inversion exists.
    pub deviatoric: bool,
}

impl Default for CmtProps {
    fn default() -> Self {
        Self {
            min_sites: 4,
            ndeps: 100,
            nlats: 1,
            nlons: 1,
            dlat: 0.1,
            dlon: 0.1,
            deviatoric: true,
        }
    }
}

/// Finite-fault slip inversion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FfProps {
    /// Number of candidate fault planes (the two CMT nodal planes).
    pub nfp: usize,
    /// Patches along strike.
    pub nstr: usize,
    /// Patches down dip.
    pub ndip: usize,
    pub min_sites: usize,
    /// Percent added to the scaling-law fault length.
    pub flen_pct: f64,
    /// Percent added to the scaling-law fault width.
    pub fwid_pct: f64,
    /// Propagate per-patch slip uncertainty from the triangular factor.
    pub slip_uncertainty: bool,
}

impl Default for FfProps {
    fn default() -> Self {
        Self {
            nfp: 2,
            nstr: 10,
            ndip: 5,
            min_sites: 4,
            flen_pct: 10.0,
            fwid_pct: 10.0,
            slip_uncertainty: true,
        }
    }
}

fn make_odd(n: &mut usize, what: &str) {
    if *n % 2 == 0 {
        warn!("adding 1 point to {what} so the grid is centred on the hypocentre");
        *n += 1;
    }
}

fn invalid(msg: impl Into<String>) -> InversionError {
    InversionError::InvalidInput(msg.into())
}

impl GfastConfig {
    /// Check every section, fixing up even lat/lon counts in place.
    pub fn validate(&mut self) -> InversionResult<()> {
        if let Some(zone) = self.utm_zone
            && !(1..=60).contains(&zone)
        {
            return Err(invalid(format!("UTM zone {zone} outside 1..=60")));
        }
        let em = &self.earth;
        if !(em.shear_modulus > 0.0 && em.bulk_modulus > 0.0) {
            return Err(invalid("elastic moduli must be positive"));
        }
        if !(em.poisson_ratio > 0.0 && em.poisson_ratio < 0.5) {
            return Err(invalid("Poisson ratio must lie in (0, 0.5)"));
        }

        let pgd = &mut self.pgd;
        if pgd.dist_tol < 0.0 {
            return Err(invalid(format!("PGD distance tolerance {} cannot be negative", pgd.dist_tol)));
        }
        if pgd.disp_def <= 0.0 {
            return Err(invalid(format!("PGD default displacement {} must be positive", pgd.disp_def)));
        }
        if pgd.dlat < 0.0 || pgd.dlon < 0.0 {
            return Err(invalid("PGD lat/lon spacing must be non-negative"));
        }
        if pgd.nlats < 1 || pgd.nlons < 1 || pgd.ndeps < 1 {
            return Err(InversionError::InvalidGrid("PGD grid dimensions must be positive".to_string()));
        }
        make_odd(&mut pgd.nlats, "PGD latitude grid");
        make_odd(&mut pgd.nlons, "PGD longitude grid");
        if pgd.min_sites < 1 {
            return Err(invalid("at least one site is needed to estimate PGD"));
        }

        let cmt = &mut self.cmt;
        if cmt.dlat < 0.0 || cmt.dlon < 0.0 {
            return Err(invalid("CMT lat/lon spacing must be non-negative"));
        }
        if cmt.nlats < 1 || cmt.nlons < 1 || cmt.ndeps < 1 {
            return Err(InversionError::InvalidGrid("CMT grid dimensions must be positive".to_string()));
        }
        make_odd(&mut cmt.nlats, "CMT latitude grid");
        make_odd(&mut cmt.nlons, "CMT longitude grid");
        if cmt.min_sites < 3 {
            return Err(invalid("at least three sites are needed to estimate a CMT"));
        }
        if !cmt.deviatoric {
            return Err(InversionError::NotImplemented("general (non-deviatoric) moment tensor inversion"));
        }

        let cmt_min_sites = cmt.min_sites;
        let ff = &self.ff;
        if ff.nfp != 2 {
            return Err(invalid(format!("only 2 fault planes are considered, got {}", ff.nfp)));
        }
        if ff.nstr < 1 || ff.ndip < 1 {
            return Err(InversionError::InvalidGrid("fault needs patches along strike and down dip".to_string()));
        }
        if ff.min_sites < cmt_min_sites {
            return Err(invalid("finite fault needs at least as many sites as the CMT"));
        }
        if ff.flen_pct < 0.0 || ff.fwid_pct < 0.0 {
            return Err(invalid("cannot shrink the fault length or width"));
        }
        Ok(())
    }
}

impl PgdProps {
    pub fn source_grid(&self, hypo: &Hypocenter) -> InversionResult<SourceGrid> {
        SourceGrid::centered(
            hypo.latitude,
            hypo.longitude,
            self.nlats,
            self.nlons,
            self.dlat,
            self.dlon,
            default_depths(self.ndeps),
        )
    }
}

impl CmtProps {
    pub fn source_grid(&self, hypo: &Hypocenter) -> InversionResult<SourceGrid> {
        SourceGrid::centered(
            hypo.latitude,
            hypo.longitude,
            self.nlats,
            self.nlons,
            self.dlat,
            self.dlon,
            default_depths(self.ndeps),
        )
    }
}
