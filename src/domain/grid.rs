//! The `(lon, lat, depth)` result container and the source-location search grid.
//!
//! Result collections are sized once for the whole grid and filled in place
//! through [`GridIndex`] instead of hand-written offset arithmetic.

use std::ops::Index;

use serde::{Deserialize, Serialize};

use crate::error::{InversionError, InversionResult};

/// Position of one hypothesis in a `(longitude, latitude, depth)` grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GridIndex {
    pub ilon: usize,
    pub ilat: usize,
    pub idep: usize,
}

/// `nlons x nlats x ndeps` array; depth varies fastest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Grid3<T> {
    nlons: usize,
    nlats: usize,
    ndeps: usize,
    data: Vec<T>,
}

impl<T: Clone> Grid3<T> {
    pub fn new(nlons: usize, nlats: usize, ndeps: usize, fill: T) -> Self {
        Self {
            nlons,
            nlats,
            ndeps,
            data: vec![fill; nlons * nlats * ndeps],
        }
    }

    pub fn fill(&mut self, value: T) {
        self.data.fill(value);
    }
}

impl<T> Grid3<T> {
    pub fn dims(&self) -> (usize, usize, usize) {
        (self.nlons, self.nlats, self.ndeps)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn flat_index(&self, idx: GridIndex) -> Option<usize> {
        (idx.ilon < self.nlons && idx.ilat < self.nlats && idx.idep < self.ndeps)
            .then(|| (idx.ilon * self.nlats + idx.ilat) * self.ndeps + idx.idep)
    }

    pub fn grid_index(&self, flat: usize) -> Option<GridIndex> {
        (flat < self.data.len()).then(|| GridIndex {
            ilon: flat / (self.nlats * self.ndeps),
            ilat: (flat / self.ndeps) % self.nlats,
            idep: flat % self.ndeps,
        })
    }

    pub fn get(&self, idx: GridIndex) -> Option<&T> {
        self.flat_index(idx).map(|i| &self.data[i])
    }

    pub fn get_mut(&mut self, idx: GridIndex) -> Option<&mut T> {
        match self.flat_index(idx) {
            Some(i) => Some(&mut self.data[i]),
            None => None,
        }
    }

    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.data
    }

    pub fn iter(&self) -> impl Iterator<Item = (GridIndex, &T)> {
        self.data.iter().enumerate().map(move |(flat, v)| {
            (
                GridIndex {
                    ilon: flat / (self.nlats * self.ndeps),
                    ilat: (flat / self.ndeps) % self.nlats,
                    idep: flat % self.ndeps,
                },
                v,
            )
        })
    }
}

impl<T> Index<GridIndex> for Grid3<T> {
    type Output = T;

    fn index(&self, idx: GridIndex) -> &T {
        match self.flat_index(idx) {
            Some(i) => &self.data[i],
            None => panic!("Grid3 index {idx:?} out of bounds"),
        }
    }
}

/// One candidate source location.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SourcePoint {
    pub index: GridIndex,
    pub latitude: f64,
    pub longitude: f64,
    /// km, positive down.
    pub depth: f64,
}

/// Candidate depths and epicentres searched by the PGD and CMT inversions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceGrid {
    pub latitudes: Vec<f64>,
    pub longitudes: Vec<f64>,
    pub depths: Vec<f64>,
}

impl SourceGrid {
    /// Grid centred on `(lat0, lon0)`; `nlats`/`nlons` should be odd so the
    /// centre node is the epicentre itself.
    pub fn centered(
        lat0: f64,
        lon0: f64,
        nlats: usize,
        nlons: usize,
        dlat: f64,
        dlon: f64,
        depths: Vec<f64>,
    ) -> InversionResult<Self> {
        if nlats == 0 || nlons == 0 || depths.is_empty() {
            return Err(InversionError::InvalidGrid(format!(
                "grid needs at least one node per axis (nlats={nlats}, nlons={nlons}, ndeps={})",
                depths.len()
            )));
        }
        if depths.iter().any(|d| !d.is_finite()) {
            return Err(InversionError::InvalidGrid("non-finite source depth".to_string()));
        }
        let half_lat = (nlats / 2) as f64;
        let half_lon = (nlons / 2) as f64;
        Ok(Self {
            latitudes: (0..nlats).map(|i| lat0 + (i as f64 - half_lat) * dlat).collect(),
            longitudes: (0..nlons).map(|j| lon0 + (j as f64 - half_lon) * dlon).collect(),
            depths,
        })
    }

    /// Depth-only search at a fixed epicentre.
    pub fn depths_at(lat0: f64, lon0: f64, depths: Vec<f64>) -> InversionResult<Self> {
        Self::centered(lat0, lon0, 1, 1, 0.0, 0.0, depths)
    }

    pub fn dims(&self) -> (usize, usize, usize) {
        (self.longitudes.len(), self.latitudes.len(), self.depths.len())
    }

    pub fn len(&self) -> usize {
        self.longitudes.len() * self.latitudes.len() * self.depths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Allocate a per-point array shaped like this grid.
    pub fn allocate<T: Clone>(&self, fill: T) -> Grid3<T> {
        let (nlons, nlats, ndeps) = self.dims();
        Grid3::new(nlons, nlats, ndeps, fill)
    }

    /// Every hypothesis in flat (longitude, latitude, depth) order.
    pub fn points(&self) -> Vec<SourcePoint> {
        let mut out = Vec::with_capacity(self.len());
        for (ilon, &longitude) in self.longitudes.iter().enumerate() {
            for (ilat, &latitude) in self.latitudes.iter().enumerate() {
                for (idep, &depth) in self.depths.iter().enumerate() {
                    out.push(SourcePoint {
                        index: GridIndex { ilon, ilat, idep },
                        latitude,
                        longitude,
                        depth,
                    });
                }
            }
        }
        out
    }
}

/// Depths `1, 2, ..., ndeps` km.
pub fn default_depths(ndeps: usize) -> Vec<f64> {
    (1..=ndeps).map(|d| d as f64).collect()
}
