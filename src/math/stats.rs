//! Order statistics used by the PGD residual-spread penalty.

use crate::error::{InversionError, InversionResult};

/// Interpolation rule between the two sorted samples bracketing a quantile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PercentileMethod {
    #[default]
    Linear,
    Lower,
    Higher,
    Midpoint,
    Nearest,
}

/// Percentiles `qs` (each in `[0, 100]`) of `values`.
///
/// The fractional sample index is `q/100 * (n - 1)`; the method decides how the
/// two neighbouring sorted samples are blended.
pub fn percentiles(values: &[f64], qs: &[f64], method: PercentileMethod) -> InversionResult<Vec<f64>> {
    if values.is_empty() {
        return Err(InversionError::InvalidInput("percentile of an empty sample".to_string()));
    }
    if qs.is_empty() {
        return Err(InversionError::InvalidInput("no quantiles requested".to_string()));
    }
    if let Some(q) = qs.iter().find(|q| !(0.0..=100.0).contains(*q)) {
        return Err(InversionError::InvalidInput(format!("quantile {q} outside [0, 100]")));
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let n = sorted.len();

    Ok(qs
        .iter()
        .map(|q| {
            let index = q / 100.0 * (n - 1) as f64;
            let lhs = (index as usize).min(n - 1);
            let frac = index - lhs as f64;
            if lhs == n - 1 {
                return sorted[lhs];
            }
            let delta = match method {
                PercentileMethod::Linear => frac,
                PercentileMethod::Lower => frac.floor(),
                PercentileMethod::Higher => frac.ceil(),
                PercentileMethod::Midpoint => 0.5 * (frac.floor() + frac.ceil()),
                PercentileMethod::Nearest => {
                    if frac <= 0.5 {
                        frac.floor()
                    } else {
                        frac.ceil()
                    }
                }
            };
            (1.0 - delta) * sorted[lhs] + delta * sorted[lhs + 1]
        })
        .collect())
}

/// Interquartile range `p75 - p25` with linear interpolation.
pub fn interquartile_range(values: &[f64]) -> InversionResult<f64> {
    let p = percentiles(values, &[25.0, 75.0], PercentileMethod::Linear)?;
    Ok(p[1] - p[0])
}
