//! Core domain types: stations, observations, hypocentre, elastic constants,
//! moment tensors.

use chrono::{DateTime, Utc};
use nalgebra::Matrix3;
use serde::{Deserialize, Serialize};

/// A geodetic receiver. Altitude is metres above the ellipsoid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Station {
    #[serde(rename = "station")]
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub altitude: f64,
}

fn default_true() -> bool {
    true
}

/// Peak ground displacement observed at one site (metres).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeakDisplacementSite {
    #[serde(flatten)]
    pub station: Station,
    pub pgd: f64,
    #[serde(default = "default_weight")]
    pub weight: f64,
    #[serde(default = "default_true")]
    pub active: bool,
    #[serde(default)]
    pub masked: bool,
}

fn default_weight() -> f64 {
    1.0
}

impl PeakDisplacementSite {
    /// A site contributes only if active, unmasked and positively weighted.
    pub fn is_usable(&self) -> bool {
        self.active && !self.masked && self.weight > 0.0 && self.pgd.is_finite()
    }
}

/// Static offset observed at one site (metres, north/east/up).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OffsetSite {
    #[serde(flatten)]
    pub station: Station,
    pub north: f64,
    pub east: f64,
    pub up: f64,
    #[serde(default = "default_weight")]
    pub weight_north: f64,
    #[serde(default = "default_weight")]
    pub weight_east: f64,
    #[serde(default = "default_weight")]
    pub weight_up: f64,
    #[serde(default = "default_true")]
    pub active: bool,
    #[serde(default)]
    pub masked: bool,
}

impl OffsetSite {
    pub fn max_weight(&self) -> f64 {
        self.weight_north.max(self.weight_east).max(self.weight_up)
    }

    /// Active, unmasked and at least one component positively weighted.
    pub fn is_usable(&self) -> bool {
        self.active
            && !self.masked
            && self.max_weight() > 0.0
            && self.north.is_finite()
            && self.east.is_finite()
            && self.up.is_finite()
    }

    pub fn offset(&self) -> Displacement {
        Displacement {
            north: self.north,
            east: self.east,
            up: self.up,
        }
    }
}

/// Three-component displacement, metres.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Displacement {
    pub north: f64,
    pub east: f64,
    pub up: f64,
}

impl Displacement {
    pub fn norm_squared(&self) -> f64 {
        self.north * self.north + self.east * self.east + self.up * self.up
    }
}

impl std::ops::Sub for Displacement {
    type Output = Displacement;

    fn sub(self, rhs: Self) -> Self {
        Self {
            north: self.north - rhs.north,
            east: self.east - rhs.east,
            up: self.up - rhs.up,
        }
    }
}

/// Event hypocentre as reported by the triggering system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hypocenter {
    pub event_id: String,
    pub latitude: f64,
    pub longitude: f64,
    /// km, positive down.
    pub depth_km: f64,
    pub origin_time: DateTime<Utc>,
    #[serde(default)]
    pub magnitude: Option<f64>,
}

/// Everything one processing cycle hands to the inversions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub hypocenter: Hypocenter,
    #[serde(default)]
    pub peak_displacements: Vec<PeakDisplacementSite>,
    #[serde(default)]
    pub offsets: Vec<OffsetSite>,
}

/// Homogeneous elastic half-space used by every forward model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EarthModel {
    /// Shear modulus μ (Pa).
    pub shear_modulus: f64,
    /// Bulk modulus K (Pa).
    pub bulk_modulus: f64,
    /// Poisson ratio ν used by the dislocation solution.
    pub poisson_ratio: f64,
}

impl Default for EarthModel {
    fn default() -> Self {
        let mu = 3.0e10;
        Self {
            shear_modulus: mu,
            bulk_modulus: 5.0 * mu / 3.0,
            poisson_ratio: 0.25,
        }
    }
}

/// Symmetric moment tensor in north-east-down coordinates (N·m).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MomentTensor {
    pub mxx: f64,
    pub myy: f64,
    pub mzz: f64,
    pub mxy: f64,
    pub mxz: f64,
    pub myz: f64,
}

impl MomentTensor {
    /// Rebuild the full tensor from the five deviatoric coefficients
    /// `[mxy, mxz, mzz, (mxx - myy)/2, myz]` solved by the CMT inversion.
    pub fn from_deviatoric(c: &[f64; 5]) -> Self {
        Self {
            mxx: c[3] - 0.5 * c[2],
            myy: -c[3] - 0.5 * c[2],
            mzz: c[2],
            mxy: c[0],
            mxz: c[1],
            myz: c[4],
        }
    }

    /// Inverse of [`MomentTensor::from_deviatoric`] for a traceless tensor.
    pub fn deviatoric_coefficients(&self) -> [f64; 5] {
        [self.mxy, self.mxz, self.mzz, 0.5 * (self.mxx - self.myy), self.myz]
    }

    /// `[mxx, myy, mzz, mxy, mxz, myz]`.
    pub fn to_array(&self) -> [f64; 6] {
        [self.mxx, self.myy, self.mzz, self.mxy, self.mxz, self.myz]
    }

    pub fn trace(&self) -> f64 {
        self.mxx + self.myy + self.mzz
    }

    pub fn to_matrix(&self) -> Matrix3<f64> {
        Matrix3::new(
            self.mxx, self.mxy, self.mxz, //
            self.mxy, self.myy, self.myz, //
            self.mxz, self.myz, self.mzz,
        )
    }

    pub fn from_matrix(m: &Matrix3<f64>) -> Self {
        Self {
            mxx: m[(0, 0)],
            myy: m[(1, 1)],
            mzz: m[(2, 2)],
            mxy: 0.5 * (m[(0, 1)] + m[(1, 0)]),
            mxz: 0.5 * (m[(0, 2)] + m[(2, 0)]),
            myz: 0.5 * (m[(1, 2)] + m[(2, 1)]),
        }
    }
}

/// Strike, dip and rake of one nodal plane (degrees, Aki & Richards).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct NodalPlane {
    pub strike: f64,
    pub dip: f64,
    pub rake: f64,
}

/// Decomposed source mechanism.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Mechanism {
    pub plane1: NodalPlane,
    pub plane2: NodalPlane,
    /// Scalar moment (N·m).
    pub m0: f64,
    pub mw: f64,
    /// Percent double couple, 0..=100.
    pub pct_dc: f64,
}
