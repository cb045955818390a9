//! Laplacian smoothing and edge damping for the slip inversion.
//!
//! The first `2·npatches` rows are a finite-difference Laplacian of each slip
//! component over the patch grid. The remaining rows damp slip on the patches
//! along the bottom and the two lateral edges of the fault; the top edge is
//! left free so slip can reach the surface.

use nalgebra::DMatrix;

use crate::domain::FaultPlane;
use crate::error::{InversionError, InversionResult};

/// Edge patches are damped this much harder than the Laplacian cross term.
const EDGE_DAMPING: f64 = 100.0;

fn is_edge(i: usize, j: usize, nstr: usize, ndip: usize) -> bool {
    j == ndip - 1 || i == 0 || i == nstr - 1
}

/// Number of rows [`regularizer`] produces for an `nstr x ndip` fault.
pub fn regularizer_rows(nstr: usize, ndip: usize) -> usize {
    let edges = (0..ndip)
        .flat_map(|j| (0..nstr).map(move |i| (i, j)))
        .filter(|&(i, j)| is_edge(i, j, nstr, ndip))
        .count();
    2 * nstr * ndip + 2 * edges
}

/// Smoothing matrix with `2·npatches` columns, ordered like the forward model.
///
/// Neighbours are looked up by flat patch index, so the along-strike stencil
/// of the last patch in a row reaches the first patch of the next row.
pub fn regularizer(plane: &FaultPlane) -> InversionResult<DMatrix<f64>> {
    let (nstr, ndip) = (plane.nstr, plane.ndip);
    let l2 = plane.patches.len();
    if nstr < 1 || ndip < 1 || l2 != nstr * ndip {
        return Err(InversionError::InvalidGrid(format!(
            "{l2} patches do not form a {nstr} x {ndip} fault"
        )));
    }

    let mut t = DMatrix::zeros(regularizer_rows(nstr, ndip), 2 * l2);
    let in_range = |idx: isize| idx >= 0 && (idx as usize) < l2;

    for j in 0..ndip {
        for i in 0..nstr {
            let l = j * nstr + i;
            let patch = &plane.patches[l];
            let wid02i = 1.0 / (patch.width * patch.width) * 1.0e6;
            let len02i = 1.0 / (patch.length * patch.length) * 1.0e6;
            let centre = l as isize;
            let stencil = [
                (centre - nstr as isize, wid02i),
                (centre - 1, len02i),
                (centre, -2.0 * (len02i + wid02i)),
                (centre + 1, len02i),
                (centre + nstr as isize, wid02i),
            ];
            for m in 0..2 {
                let row = 2 * l + m;
                for &(idx, value) in &stencil {
                    if in_range(idx) {
                        t[(row, 2 * idx as usize + m)] = value;
                    }
                }
            }
        }
    }

    let mut row = 2 * l2;
    for j in 0..ndip {
        for i in 0..nstr {
            if !is_edge(i, j, nstr, ndip) {
                continue;
            }
            let l = j * nstr + i;
            let patch = &plane.patches[l];
            let lnwidi = 1.0 / (patch.width * patch.length) * 1.0e6;
            for m in 0..2 {
                t[(row, 2 * l + m)] = EDGE_DAMPING * lnwidi;
                row += 1;
            }
        }
    }
    Ok(t)
}

/// Scale applied to the regularizer so its strength tracks the mean absolute
/// entry of the weighted forward model.
pub fn regularization_weight(weighted_g: &DMatrix<f64>, plane: &FaultPlane) -> InversionResult<f64> {
    let first = plane
        .patches
        .first()
        .ok_or_else(|| InversionError::InvalidGrid("fault plane has no patches".to_string()))?;
    let ng = weighted_g.len();
    let mean_abs = weighted_g.iter().map(|v| v.abs()).sum::<f64>() / ng as f64;
    if !(mean_abs > 0.0) {
        return Err(InversionError::Solver("weighted forward model is identically zero".to_string()));
    }
    let l2 = plane.patches.len() as f64;
    Ok(1.0 / (2.0 * l2).powi(2) / mean_abs / 4.0 * first.length * first.width / 1.0e6)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{FaultPatch, PatchVertex};

    fn plane(nstr: usize, ndip: usize) -> FaultPlane {
        let patch = FaultPatch {
            latitude: 0.0,
            longitude: 0.0,
            easting: 0.0,
            northing: 0.0,
            depth: 5.0,
            strike: 0.0,
            dip: 45.0,
            length: 2000.0,
            width: 1000.0,
            vertices: [PatchVertex::default(); 4],
        };
        FaultPlane {
            nstr,
            ndip,
            patches: vec![patch; nstr * ndip],
        }
    }

    #[test]
    fn row_count_matches_edge_count() {
        assert_eq!(regularizer_rows(10, 5), 2 * 50 + 2 * (2 * 5 + 10 - 2));
        assert_eq!(regularizer_rows(3, 1), 6 + 6);
        // A single column of patches is all edge.
        assert_eq!(regularizer_rows(1, 4), 8 + 8);
        let t = regularizer(&plane(4, 3)).unwrap();
        assert_eq!(t.shape(), (regularizer_rows(4, 3), 24));
    }

    #[test]
    fn laplacian_row_of_interior_patch() {
        let p = plane(3, 3);
        let t = regularizer(&p).unwrap();
        let wid02i = 1.0e6 / (1000.0 * 1000.0);
        let len02i = 1.0e6 / (2000.0 * 2000.0);
        // Patch (i=1, j=1) is flat index 4; its dip-slip row is 9.
        let row = t.row(9);
        assert!((row[2 * 4 + 1] + 2.0 * (len02i + wid02i)).abs() < 1e-12);
        assert!((row[2 * 3 + 1] - len02i).abs() < 1e-12);
        assert!((row[2 * 5 + 1] - len02i).abs() < 1e-12);
        assert!((row[2 * 1 + 1] - wid02i).abs() < 1e-12);
        assert!((row[2 * 7 + 1] - wid02i).abs() < 1e-12);
        let nonzero = row.iter().filter(|v| **v != 0.0).count();
        assert_eq!(nonzero, 5);
        // Laplacian of uniform slip vanishes in the interior.
        assert!(row.iter().sum::<f64>().abs() < 1e-12);
    }

    #[test]
    fn top_edge_is_not_damped() {
        let p = plane(3, 2);
        let t = regularizer(&p).unwrap();
        let damped: Vec<usize> = (2 * 6..t.nrows())
            .map(|r| (0..t.ncols()).find(|&c| t[(r, c)] != 0.0).unwrap() / 2)
            .collect();
        // Edges: (0,0), (2,0) on the top row sides, then the whole bottom row.
        assert_eq!(damped, vec![0, 0, 2, 2, 3, 3, 4, 4, 5, 5]);
    }

    #[test]
    fn weight_scales_with_forward_model_amplitude() {
        let p = plane(2, 2);
        let g = DMatrix::from_element(6, 8, 2.0);
        let lam = regularization_weight(&g, &p).unwrap();
        let expected = 1.0 / 64.0 / 2.0 / 4.0 * 2000.0 * 1000.0 / 1.0e6;
        assert!((lam - expected).abs() < 1e-15);
        assert!(regularization_weight(&DMatrix::zeros(6, 8), &p).is_err());
        assert!(regularizer(&FaultPlane { nstr: 2, ndip: 2, patches: vec![] }).is_err());
    }
}
