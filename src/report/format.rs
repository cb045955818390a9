//! Plain-text terminal reports.
//!
//! Formatting stays out of the inversion code so output changes are localized.

use crate::domain::{CmtResults, Event, FfResults, GridIndex, PgdResults};
use crate::report::residuals::{SiteResidual, rms};

/// Event header: hypocentre and how many observations are usable.
pub fn format_event_summary(event: &Event) -> String {
    let hypo = &event.hypocenter;
    let mut out = String::new();
    out.push_str(&format!("=== gfast - event {} ===\n", hypo.event_id));
    out.push_str(&format!("Origin: {}\n", hypo.origin_time.to_rfc3339()));
    out.push_str(&format!(
        "Hypocentre: lat={:.4} lon={:.4} depth={:.1}km",
        hypo.latitude, hypo.longitude, hypo.depth_km
    ));
    if let Some(m) = hypo.magnitude {
        out.push_str(&format!(" M={m:.2}"));
    }
    out.push('\n');

    let pgd_used = event.peak_displacements.iter().filter(|s| s.is_usable()).count();
    let off_used = event.offsets.iter().filter(|s| s.is_usable()).count();
    out.push_str(&format!(
        "Sites: pgd={}/{} usable | offsets={}/{} usable\n",
        pgd_used,
        event.peak_displacements.len(),
        off_used,
        event.offsets.len()
    ));
    out.push('\n');
    out
}

/// PGD table: one row per grid point. `*` marks the IQR-weighted choice and
/// `+` the variance-reduction choice.
pub fn format_pgd_report(results: &PgdResults) -> String {
    let mut out = String::new();
    out.push_str("PGD magnitude search:\n");
    push_row(
        &mut out,
        format!(
            "  {:>9} {:>10} {:>7} {:>7} {:>8} {:>8} {:>7}",
            "lat", "lon", "depth", "M", "VR(%)", "IQR", "M_iqr"
        ),
    );
    push_rule(&mut out, &[9, 10, 7, 7, 8, 8, 7]);

    for (idx, est) in results.estimates.iter() {
        let flag = match (
            results.preferred_by_iqr == Some(idx),
            results.preferred_by_variance_reduction == Some(idx),
        ) {
            (true, _) => '*',
            (false, true) => '+',
            _ => ' ',
        };
        let (lat, lon, depth) = point_coords(&results.grid, idx);
        let row = match est {
            Some(e) => format!(
                "{flag} {lat:>9.4} {lon:>10.4} {depth:>7.1} {:>7.3} {:>8.2} {:>8.4} {:>7.3}",
                e.magnitude, e.variance_reduction, e.iqr, e.iqr_weighted_magnitude
            ),
            None => format!("{flag} {lat:>9.4} {lon:>10.4} {depth:>7.1} {:>7}", "failed"),
        };
        push_row(&mut out, row);
    }

    match results.preferred() {
        Some(best) => out.push_str(&format!(
            "Preferred: M={:.2} (VR={:.1}%) at depth {:.1}km\n",
            best.magnitude,
            best.variance_reduction,
            results
                .preferred_by_iqr
                .map(|i| results.grid.depths[i.idep])
                .unwrap_or(f64::NAN)
        )),
        None => out.push_str("Preferred: none\n"),
    }
    out.push('\n');
    out
}

/// CMT table: one row per grid point, `*` on the optimum.
pub fn format_cmt_report(results: &CmtResults) -> String {
    let mut out = String::new();
    out.push_str("CMT depth search:\n");
    push_row(
        &mut out,
        format!(
            "  {:>9} {:>10} {:>7} {:>6} {:>11} {:>6} {:>17} {:>17}",
            "lat", "lon", "depth", "Mw", "objective", "DC(%)", "plane1 s/d/r", "plane2 s/d/r"
        ),
    );
    push_rule(&mut out, &[9, 10, 7, 6, 11, 6, 17, 17]);

    for (idx, est) in results.estimates.iter() {
        let flag = if results.optimal == Some(idx) { '*' } else { ' ' };
        let (lat, lon, depth) = point_coords(&results.grid, idx);
        let row = match est {
            Some(e) => {
                let m = &e.mechanism;
                format!(
                    "{flag} {lat:>9.4} {lon:>10.4} {depth:>7.1} {:>6.2} {:>11.4e} {:>6.1} {:>17} {:>17}",
                    m.mw,
                    e.objective,
                    m.pct_dc,
                    fmt_plane(m.plane1.strike, m.plane1.dip, m.plane1.rake),
                    fmt_plane(m.plane2.strike, m.plane2.dip, m.plane2.rake),
                )
            }
            None => format!("{flag} {lat:>9.4} {lon:>10.4} {depth:>7.1} {:>6}", "failed"),
        };
        push_row(&mut out, row);
    }

    match (results.optimum(), results.optimal_depth()) {
        (Some(best), Some(depth)) => {
            let m = &best.mechanism;
            out.push_str(&format!(
                "Optimum: Mw={:.2} depth={depth:.1}km DC={:.1}% planes {} and {}\n",
                m.mw,
                m.pct_dc,
                fmt_plane(m.plane1.strike, m.plane1.dip, m.plane1.rake),
                fmt_plane(m.plane2.strike, m.plane2.dip, m.plane2.rake),
            ));
        }
        _ => out.push_str("Optimum: none\n"),
    }
    out.push('\n');
    out
}

/// Finite-fault table: one row per candidate plane, `*` on the preferred.
pub fn format_ff_report(results: &FfResults) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "Finite fault (seed depth {:.1}km, M {:.2}):\n",
        results.seed.depth, results.seed.magnitude
    ));
    push_row(
        &mut out,
        format!(
            "  {:>5} {:>7} {:>6} {:>6} {:>8} {:>10}",
            "plane", "strike", "dip", "Mw", "VR(%)", "max slip"
        ),
    );
    push_rule(&mut out, &[5, 7, 6, 6, 8, 10]);

    for (i, est) in results.estimates.iter().enumerate() {
        let flag = if results.preferred_plane == Some(i) { '*' } else { ' ' };
        let (strike, dip) = results.seed.planes.get(i).copied().unwrap_or((f64::NAN, f64::NAN));
        let row = match est {
            Some(e) => {
                let max_slip = e
                    .strike_slip
                    .iter()
                    .zip(&e.dip_slip)
                    .map(|(ss, ds)| ss.hypot(*ds))
                    .fold(0.0_f64, f64::max);
                format!(
                    "{flag} {:>5} {strike:>7.1} {dip:>6.1} {:>6.2} {:>8.2} {:>9.3}m",
                    i + 1,
                    e.mw,
                    e.variance_reduction,
                    max_slip
                )
            }
            None => format!("{flag} {:>5} {strike:>7.1} {dip:>6.1} {:>6}", i + 1, "failed"),
        };
        push_row(&mut out, row);
    }
    out.push('\n');
    out
}

/// Per-site residual table at an optimum.
pub fn format_site_residuals(title: &str, rows: &[SiteResidual], unit: &str) -> String {
    let mut out = String::new();
    out.push_str(&format!("{title} residuals ({unit}):\n"));
    if rows.is_empty() {
        out.push_str("  (no optimum)\n\n");
        return out;
    }
    push_row(
        &mut out,
        format!(
            "{:<8} {:<5} {:>11} {:>11} {:>11}",
            "station", "comp", "observed", "predicted", "residual"
        ),
    );
    push_row(
        &mut out,
        format!("{:-<8} {:-<5} {:-<11} {:-<11} {:-<11}", "", "", "", "", ""),
    );
    for r in rows {
        let comp = format!("{:?}", r.component).to_lowercase();
        push_row(
            &mut out,
            format!(
                "{:<8} {:<5} {:>11.5} {:>11.5} {:>11.5}",
                truncate(&r.station, 8),
                comp,
                r.observed,
                r.predicted,
                r.residual
            ),
        );
    }
    if let Some(v) = rms(rows) {
        out.push_str(&format!("RMS residual: {v:.5}\n"));
    }
    out.push('\n');
    out
}

fn point_coords(grid: &crate::domain::SourceGrid, idx: GridIndex) -> (f64, f64, f64) {
    (
        grid.latitudes.get(idx.ilat).copied().unwrap_or(f64::NAN),
        grid.longitudes.get(idx.ilon).copied().unwrap_or(f64::NAN),
        grid.depths.get(idx.idep).copied().unwrap_or(f64::NAN),
    )
}

fn fmt_plane(strike: f64, dip: f64, rake: f64) -> String {
    format!("{strike:.0}/{dip:.0}/{rake:.0}")
}

fn push_row(out: &mut String, row: String) {
    out.push_str(row.trim_end());
    out.push('\n');
}

fn push_rule(out: &mut String, widths: &[usize]) {
    let cols: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    push_row(out, format!("  {}", cols.join(" ")));
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max.saturating_sub(1)).collect();
    out.push('.');
    out
}
