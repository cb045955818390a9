//! Export inversion results.
//!
//! - JSON: the full result collections, for downstream tooling.
//! - CSV: observed vs predicted per site at each selected optimum, easy to
//!   open in a spreadsheet.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::{CmtResults, Event, FfResults, GfastConfig, Hypocenter, PgdResults};
use crate::error::AppError;
use crate::report::{SiteResidual, cmt_site_residuals, ff_site_residuals, pgd_site_residuals};

/// Schema of the results JSON.
#[derive(Debug, Serialize)]
pub struct ResultsFile<'a> {
    pub tool: &'static str,
    pub version: &'static str,
    pub generated_at: DateTime<Utc>,
    pub hypocenter: &'a Hypocenter,
    pub config: &'a GfastConfig,
    pub pgd: Option<&'a PgdResults>,
    pub cmt: Option<&'a CmtResults>,
    pub ff: Option<&'a FfResults>,
}

impl<'a> ResultsFile<'a> {
    pub fn new(hypocenter: &'a Hypocenter, config: &'a GfastConfig) -> Self {
        Self {
            tool: "gfast",
            version: env!("CARGO_PKG_VERSION"),
            generated_at: Utc::now(),
            hypocenter,
            config,
            pgd: None,
            cmt: None,
            ff: None,
        }
    }
}

pub fn write_results_json(path: &Path, results: &ResultsFile<'_>) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::new(2, format!("Failed to create results JSON '{}': {e}", path.display())))?;
    serde_json::to_writer_pretty(file, results)
        .map_err(|e| AppError::new(2, format!("Failed to write results JSON: {e}")))?;
    Ok(())
}

/// Gather the residual rows of every product present, PGD first.
pub fn collect_site_residuals(
    event: &Event,
    pgd: Option<&PgdResults>,
    cmt: Option<&CmtResults>,
    ff: Option<&FfResults>,
) -> Vec<SiteResidual> {
    let mut rows = Vec::new();
    if let Some(r) = pgd {
        rows.extend(pgd_site_residuals(&event.peak_displacements, r));
    }
    if let Some(r) = cmt {
        rows.extend(cmt_site_residuals(&event.offsets, r));
    }
    if let Some(r) = ff {
        rows.extend(ff_site_residuals(&event.offsets, r));
    }
    rows
}

/// Write residual rows as CSV to any writer.
pub fn write_site_csv<W: Write>(writer: W, rows: &[SiteResidual]) -> Result<(), AppError> {
    let mut wtr = csv::Writer::from_writer(writer);
    for row in rows {
        wtr.serialize(row)
            .map_err(|e| AppError::new(2, format!("Failed to write export CSV row: {e}")))?;
    }
    if rows.is_empty() {
        // The header is normally written with the first serialized row.
        wtr.write_record([
            "product",
            "station",
            "latitude",
            "longitude",
            "component",
            "observed",
            "predicted",
            "residual",
        ])
        .map_err(|e| AppError::new(2, format!("Failed to write export CSV header: {e}")))?;
    }
    wtr.flush()
        .map_err(|e| AppError::new(2, format!("Failed to flush export CSV: {e}")))?;
    Ok(())
}

pub fn write_site_csv_file(path: &Path, rows: &[SiteResidual]) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::new(2, format!("Failed to create export CSV '{}': {e}", path.display())))?;
    write_site_csv(file, rows)
}
