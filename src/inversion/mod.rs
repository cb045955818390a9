//! Grid-search inversions and the pieces they share.
//!
//! - `pgd`: magnitude from peak ground displacement
//! - `cmt`: deviatoric moment tensor depth search
//! - `ff`: slip on the two CMT nodal planes
//!
//! Each exposes a core search over projected sites plus a `drive_*` entry point
//! that selects usable sites and fills a caller-owned result collection.

pub mod cmt;
pub mod decompose;
pub mod ff;
pub mod grid_search;
pub mod mesh;
pub mod pgd;
pub mod selection;

pub use cmt::{cmt_grid_search, drive_cmt};
pub use decompose::{decompose, double_couple};
pub use ff::{drive_ff, fault_plane_grid_search, seed_from_cmt};
pub use grid_search::{GridSearchOutcome, search};
pub use mesh::{MeshParams, mesh_fault_plane};
pub use pgd::{drive_pgd, pgd_grid_search};
