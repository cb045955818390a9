//! Choosing the preferred hypothesis of each inversion.
//!
//! Selections walk the grid in flat order and only replace the incumbent on a
//! strict improvement, so ties go to the lowest index. Unsolved points and
//! non-finite scores never win.

use crate::domain::{CmtEstimate, FaultSlipEstimate, Grid3, GridIndex, PgdEstimate};

/// Index of the smallest finite score; ties keep the earliest.
pub fn argmin<I>(scores: I) -> Option<usize>
where
    I: IntoIterator<Item = (usize, f64)>,
{
    let mut best: Option<(usize, f64)> = None;
    for (idx, s) in scores {
        if !s.is_finite() {
            continue;
        }
        match best {
            Some((_, b)) if s >= b => {}
            _ => best = Some((idx, s)),
        }
    }
    best.map(|(idx, _)| idx)
}

/// Index of the largest finite score; ties keep the earliest.
pub fn argmax<I>(scores: I) -> Option<usize>
where
    I: IntoIterator<Item = (usize, f64)>,
{
    argmin(scores.into_iter().map(|(idx, s)| (idx, -s)))
}

fn flat_scores<'a, T: 'a>(
    grid: &'a Grid3<Option<T>>,
    score: impl Fn(&T) -> f64 + 'a,
) -> impl Iterator<Item = (usize, f64)> + 'a {
    grid.as_slice()
        .iter()
        .enumerate()
        .filter_map(move |(flat, est)| est.as_ref().map(|e| (flat, score(e))))
}

/// CMT optimum: smallest `residual_norm / pct_dc`.
pub fn select_cmt_optimum(estimates: &Grid3<Option<CmtEstimate>>) -> Option<GridIndex> {
    argmin(flat_scores(estimates, |e| e.objective)).and_then(|flat| estimates.grid_index(flat))
}

/// Fill in `magnitude · min(iqr) / iqr` for every solved PGD point.
///
/// A zero IQR (a perfect or degenerate fit) keeps the raw magnitude.
pub fn apply_iqr_weighting(estimates: &mut Grid3<Option<PgdEstimate>>) {
    let iqr_min = estimates
        .as_slice()
        .iter()
        .flatten()
        .map(|e| e.iqr)
        .filter(|v| v.is_finite())
        .fold(f64::INFINITY, f64::min);
    for est in estimates.as_mut_slice().iter_mut().flatten() {
        let ratio = if est.iqr == 0.0 || !iqr_min.is_finite() {
            1.0
        } else {
            iqr_min / est.iqr
        };
        est.iqr_weighted_magnitude = est.magnitude * ratio;
    }
}

/// `(highest variance reduction, highest IQR-weighted magnitude)`.
pub fn select_pgd(estimates: &Grid3<Option<PgdEstimate>>) -> (Option<GridIndex>, Option<GridIndex>) {
    let by_vr = argmax(flat_scores(estimates, |e| e.variance_reduction));
    let by_iqr = argmax(flat_scores(estimates, |e| e.iqr_weighted_magnitude));
    (
        by_vr.and_then(|flat| estimates.grid_index(flat)),
        by_iqr.and_then(|flat| estimates.grid_index(flat)),
    )
}

/// Fault plane with the highest variance reduction.
pub fn select_fault_plane(estimates: &[Option<FaultSlipEstimate>]) -> Option<usize> {
    argmax(
        estimates
            .iter()
            .enumerate()
            .filter_map(|(i, e)| e.as_ref().map(|e| (i, e.variance_reduction))),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pgd(m: f64, vr: f64, iqr: f64) -> Option<PgdEstimate> {
        Some(PgdEstimate {
            magnitude: m,
            variance_reduction: vr,
            iqr,
            iqr_weighted_magnitude: 0.0,
            predicted: vec![],
            distances: vec![],
        })
    }

    #[test]
    fn ties_break_to_lowest_index() {
        assert_eq!(argmin([(0, 2.0), (1, 1.0), (2, 1.0)]), Some(1));
        assert_eq!(argmax([(0, 5.0), (1, 5.0)]), Some(0));
        assert_eq!(argmin([(0, f64::NAN), (1, 3.0)]), Some(1));
        assert_eq!(argmin(std::iter::empty()), None);
    }

    #[test]
    fn pgd_keeps_both_selections() {
        let mut g = Grid3::new(1, 1, 4, None);
        let slots = g.as_mut_slice();
        slots[0] = pgd(7.0, 60.0, 0.2);
        slots[1] = pgd(7.5, 90.0, 0.4);
        slots[2] = None;
        slots[3] = pgd(7.2, 80.0, 0.1);
        apply_iqr_weighting(&mut g);

        let w: Vec<f64> = g.as_slice().iter().flatten().map(|e| e.iqr_weighted_magnitude).collect();
        assert!((w[0] - 3.5).abs() < 1e-12);
        assert!((w[1] - 7.5 * 0.25).abs() < 1e-12);
        assert!((w[2] - 7.2).abs() < 1e-12);

        let (by_vr, by_iqr) = select_pgd(&g);
        assert_eq!(by_vr.map(|i| i.idep), Some(1));
        assert_eq!(by_iqr.map(|i| i.idep), Some(3));
    }

    #[test]
    fn zero_iqr_keeps_magnitude() {
        let mut g = Grid3::new(1, 1, 2, None);
        g.as_mut_slice()[0] = pgd(8.0, 100.0, 0.0);
        g.as_mut_slice()[1] = pgd(7.0, 50.0, 0.5);
        apply_iqr_weighting(&mut g);
        let w: Vec<f64> = g.as_slice().iter().flatten().map(|e| e.iqr_weighted_magnitude).collect();
        assert_eq!(w, vec![8.0, 0.0]);
    }

    #[test]
    fn failed_planes_never_win() {
        let est = FaultSlipEstimate {
            strike_slip: vec![],
            dip_slip: vec![],
            strike_slip_unc: None,
            dip_slip_unc: None,
            mw: 7.0,
            variance_reduction: -20.0,
            predicted: vec![],
        };
        assert_eq!(select_fault_plane(&[None, Some(est.clone())]), Some(1));
        let tied = est.clone();
        assert_eq!(select_fault_plane(&[Some(est), Some(tied)]), Some(0));
        assert_eq!(select_fault_plane(&[None, None]), None);
    }
}
