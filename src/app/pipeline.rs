//! Shared inversion pipeline used by every run command.
//!
//! Load -> PGD -> CMT -> finite fault (seeded from the CMT optimum).
//!
//! A failing product never stops the others: its error is recorded and the
//! front end decides what to print and which exit code to return.

use std::path::Path;

use tracing::{info, warn};

use crate::domain::{CmtResults, Event, FfResults, GfastConfig, PgdResults};
use crate::error::{AppError, InversionError};
use crate::inversion::{drive_cmt, drive_ff, drive_pgd, seed_from_cmt};
use crate::io::{apply_mask, apply_station_overrides, load_mask_csv, load_station_csv, read_event};
use crate::report::Product;

/// Which inversions a run performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stages {
    pub pgd: bool,
    pub cmt: bool,
    pub ff: bool,
}

impl Stages {
    pub const PGD: Self = Self { pgd: true, cmt: false, ff: false };
    pub const CMT: Self = Self { pgd: false, cmt: true, ff: false };
    /// The slip inversion needs the CMT for its seed.
    pub const FF: Self = Self { pgd: false, cmt: true, ff: true };
    pub const ALL: Self = Self { pgd: true, cmt: true, ff: true };
}

/// All computed outputs of a single run.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub pgd: Option<PgdResults>,
    pub cmt: Option<CmtResults>,
    pub ff: Option<FfResults>,
    pub failures: Vec<(Product, InversionError)>,
}

impl RunOutput {
    /// First failure of a product that ended up with no selected solution.
    pub fn first_unsolved(&self) -> Option<&(Product, InversionError)> {
        self.failures.iter().find(|(product, _)| !self.solved(*product))
    }

    pub fn solved(&self, product: Product) -> bool {
        match product {
            Product::Pgd => self.pgd.as_ref().is_some_and(|r| r.preferred().is_some()),
            Product::Cmt => self.cmt.as_ref().is_some_and(|r| r.optimum().is_some()),
            Product::Ff => self.ff.as_ref().is_some_and(|r| r.preferred().is_some()),
        }
    }
}

/// Event JSON with optional station metadata and mask applied.
pub fn load_event(path: &Path, stations: Option<&Path>, mask: Option<&Path>) -> Result<Event, AppError> {
    let mut event = read_event(path)?;
    if let Some(path) = stations {
        let meta = load_station_csv(path)?;
        let updated = apply_station_overrides(&mut event, &meta);
        info!(updated, "station positions overridden from {}", path.display());
    }
    if let Some(path) = mask {
        let names = load_mask_csv(path)?;
        let masked = apply_mask(&mut event, &names);
        info!(masked, "observations masked from {}", path.display());
    }
    Ok(event)
}

/// Run the requested inversions on one event.
pub fn run_inversions(event: &Event, config: &GfastConfig, stages: Stages) -> RunOutput {
    let hypo = &event.hypocenter;
    let mut out = RunOutput {
        pgd: None,
        cmt: None,
        ff: None,
        failures: Vec::new(),
    };

    if stages.pgd {
        let result = config.pgd.source_grid(hypo).map(|grid| {
            let mut results = PgdResults::new(grid, event.peak_displacements.len());
            let status = drive_pgd(config, hypo, &event.peak_displacements, &mut results);
            (results, status)
        });
        out.pgd = settle(Product::Pgd, result, &mut out.failures);
    }

    if stages.cmt {
        let result = config.cmt.source_grid(hypo).map(|grid| {
            let mut results = CmtResults::new(grid, event.offsets.len());
            let status = drive_cmt(config, hypo, &event.offsets, &mut results);
            (results, status)
        });
        out.cmt = settle(Product::Cmt, result, &mut out.failures);
    }

    if stages.ff {
        let seed = match out.cmt.as_ref() {
            Some(cmt) => seed_from_cmt(cmt),
            None => Err(InversionError::InvalidInput("no CMT solution to seed the finite fault".to_string())),
        };
        let result = seed.map(|seed| {
            let mut results = FfResults::new(seed, event.offsets.len());
            let status = drive_ff(config, &event.offsets, &mut results);
            (results, status)
        });
        out.ff = settle(Product::Ff, result, &mut out.failures);
    }

    out
}

/// Keep results whose driver ran (possibly with some failed grid points) and
/// record every error.
fn settle<T>(
    product: Product,
    result: Result<(T, Result<(), InversionError>), InversionError>,
    failures: &mut Vec<(Product, InversionError)>,
) -> Option<T> {
    match result {
        Ok((results, Ok(()))) => Some(results),
        Ok((results, Err(err @ InversionError::GridSearch { .. }))) => {
            warn!(?product, "{err}; keeping the points that solved");
            failures.push((product, err));
            Some(results)
        }
        Ok((_, Err(err))) | Err(err) => {
            warn!(?product, "inversion skipped: {err}");
            failures.push((product, err));
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    use crate::data::synthetic::{SynthSpec, synth_event};
    use crate::domain::{EarthModel, NodalPlane};

    fn small_config() -> GfastConfig {
        let mut config = GfastConfig::default();
        config.utm_zone = Some(10);
        config.pgd.ndeps = 30;
        config.cmt.ndeps = 30;
        config.ff.nstr = 6;
        config.ff.ndip = 3;
        config.validate().unwrap();
        config
    }

    fn event() -> Event {
        let spec = SynthSpec {
            latitude: 40.0,
            longitude: -124.0,
            depth_km: 20.0,
            magnitude: 7.0,
            mechanism: NodalPlane {
                strike: 350.0,
                dip: 20.0,
                rake: 90.0,
            },
            stations: 16,
            min_radius_km: 30.0,
            max_radius_km: 250.0,
            noise: 0.0,
            seed: 7,
            origin_time: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        };
        synth_event(&spec, &EarthModel::default(), Some(10)).unwrap()
    }

    #[test]
    fn all_stages_solve_a_synthetic_event() {
        let event = event();
        let out = run_inversions(&event, &small_config(), Stages::ALL);
        assert!(out.failures.is_empty(), "{:?}", out.failures);
        assert!(out.solved(Product::Pgd));
        assert!(out.solved(Product::Cmt));
        assert!(out.solved(Product::Ff));

        let cmt = out.cmt.as_ref().unwrap();
        assert!((cmt.optimal_depth().unwrap() - 20.0).abs() < 1e-9);
        let mw = cmt.optimum().unwrap().mechanism.mw;
        assert!((mw - 7.0).abs() < 0.01);

        let ff = out.ff.as_ref().unwrap();
        assert_eq!(ff.planes.len(), 2);
        assert!((ff.seed.depth - 20.0).abs() < 1e-9);
    }

    #[test]
    fn pgd_only_leaves_other_products_empty() {
        let out = run_inversions(&event(), &small_config(), Stages::PGD);
        assert!(out.pgd.is_some());
        assert!(out.cmt.is_none() && out.ff.is_none());
        assert!(out.first_unsolved().is_none());
    }

    #[test]
    fn missing_cmt_skips_the_finite_fault() {
        let mut event = event();
        event.offsets.truncate(2);
        let out = run_inversions(&event, &small_config(), Stages::FF);
        assert!(out.cmt.is_none());
        assert!(out.ff.is_none());
        assert_eq!(out.failures.len(), 2);
        let (product, err) = out.first_unsolved().unwrap();
        assert_eq!(*product, Product::Cmt);
        assert!(matches!(err, InversionError::InsufficientData { used: 2, required: 4 }));
    }
}
