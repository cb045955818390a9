//! Synthetic observations forward-modelled from a known source.
//!
//! The same Green's functions the inversions use generate the data, so a
//! noise-free event is reproduced exactly at the true grid point.

use chrono::{DateTime, Utc};
use nalgebra::DVector;
use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::Normal;

use crate::coords::{ll2utm, utm2ll, zone_for_longitude};
use crate::domain::{
    Displacement, EarthModel, Event, FaultPlane, Hypocenter, MomentTensor, NodalPlane, OffsetSite,
    PeakDisplacementSite, Station,
};
use crate::error::{InversionError, InversionResult};
use crate::inversion::decompose::{double_couple, scalar_moment_from_mw};
use crate::models::cmt::{self, Separation};
use crate::models::pgd::hypocentral_distance_km;
use crate::models::{PgdScaling, Receiver, okada};

/// Golden angle in degrees; spreads spiral stations evenly in azimuth.
const GOLDEN_ANGLE: f64 = 137.507_764_050_037_86;

/// Gaussian observation noise with a fixed seed, or none at all.
#[derive(Debug, Clone)]
pub struct Noise {
    rng: StdRng,
    normal: Option<Normal<f64>>,
}

impl Noise {
    pub fn none() -> Self {
        Self {
            rng: StdRng::seed_from_u64(0),
            normal: None,
        }
    }

    /// Zero-mean noise with standard deviation `sigma` (metres).
    pub fn gaussian(sigma: f64, seed: u64) -> InversionResult<Self> {
        if sigma == 0.0 {
            return Ok(Self::none());
        }
        let normal = Normal::new(0.0, sigma)
            .map_err(|e| InversionError::InvalidInput(format!("noise distribution: {e}")))?;
        Ok(Self {
            rng: StdRng::seed_from_u64(seed),
            normal: Some(normal),
        })
    }

    pub fn sample(&mut self) -> f64 {
        match &self.normal {
            Some(n) => n.sample(&mut self.rng),
            None => 0.0,
        }
    }
}

/// `n` stations on a spiral between `min_radius_km` and `max_radius_km`
/// of the epicentre.
pub fn ring_layout(lat0: f64, lon0: f64, n: usize, min_radius_km: f64, max_radius_km: f64) -> Vec<Station> {
    let origin = ll2utm(lat0, lon0, None);
    (0..n)
        .map(|k| {
            let frac = if n > 1 { k as f64 / (n - 1) as f64 } else { 0.0 };
            let radius = (min_radius_km + frac * (max_radius_km - min_radius_km)) * 1.0e3;
            let (s, c) = (k as f64 * GOLDEN_ANGLE).to_radians().sin_cos();
            let (lat, lon) = utm2ll(
                origin.zone,
                origin.north,
                origin.northing + radius * c,
                origin.easting + radius * s,
            );
            Station {
                name: format!("S{:03}", k + 1),
                latitude: lat,
                longitude: if lon > 180.0 { lon - 360.0 } else { lon },
                altitude: 0.0,
            }
        })
        .collect()
}

fn shared_zone(hypo_lon: f64, zone: Option<u8>) -> u8 {
    zone.unwrap_or_else(|| zone_for_longitude(hypo_lon))
}

/// Peak displacements (m) predicted by the PGD scaling law for magnitude `m`.
pub fn peak_displacements(
    hypo: &Hypocenter,
    stations: &[Station],
    magnitude: f64,
    zone: Option<u8>,
    noise: &mut Noise,
) -> InversionResult<Vec<PeakDisplacementSite>> {
    let zone = shared_zone(hypo.longitude, zone);
    let src = ll2utm(hypo.latitude, hypo.longitude, Some(zone));
    let law = PgdScaling::default();
    stations
        .iter()
        .map(|st| {
            let p = ll2utm(st.latitude, st.longitude, Some(zone));
            let r = hypocentral_distance_km(
                p.easting - src.easting,
                p.northing - src.northing,
                hypo.depth_km,
                st.altitude,
            );
            if !(r > 0.0) {
                return Err(InversionError::InvalidInput(format!("station {} is at the hypocentre", st.name)));
            }
            let pgd = (law.pgd_at(r, magnitude) * 1.0e-2 + noise.sample()).abs();
            Ok(PeakDisplacementSite {
                station: st.clone(),
                pgd,
                weight: 1.0,
                active: true,
                masked: false,
            })
        })
        .collect()
}

fn offset_site(station: &Station, d: Displacement, noise: &mut Noise) -> OffsetSite {
    OffsetSite {
        station: station.clone(),
        north: d.north + noise.sample(),
        east: d.east + noise.sample(),
        up: d.up + noise.sample(),
        weight_north: 1.0,
        weight_east: 1.0,
        weight_up: 1.0,
        active: true,
        masked: false,
    }
}

/// Static offsets from a deviatoric point source at the hypocentre.
pub fn cmt_offsets(
    earth: &EarthModel,
    hypo: &Hypocenter,
    stations: &[Station],
    mt: &MomentTensor,
    zone: Option<u8>,
    noise: &mut Noise,
) -> InversionResult<Vec<OffsetSite>> {
    let zone = shared_zone(hypo.longitude, zone);
    let src = ll2utm(hypo.latitude, hypo.longitude, Some(zone));
    let separations: Vec<Separation> = stations
        .iter()
        .map(|st| {
            let p = ll2utm(st.latitude, st.longitude, Some(zone));
            Separation {
                x: p.northing - src.northing,
                y: p.easting - src.easting,
                z: -(st.altitude + hypo.depth_km * 1.0e3),
            }
        })
        .collect();
    let g = cmt::forward_model(earth, &separations)?;
    let up = &g * DVector::from_column_slice(&mt.deviatoric_coefficients());
    Ok(stations
        .iter()
        .zip(cmt::unpack_prediction(up.as_slice()))
        .map(|(st, d)| offset_site(st, d, noise))
        .collect())
}

/// Static offsets from prescribed slip (m) on every patch of a plane.
pub fn fault_offsets(
    earth: &EarthModel,
    plane: &FaultPlane,
    stations: &[Station],
    strike_slip: &[f64],
    dip_slip: &[f64],
    zone: Option<u8>,
    noise: &mut Noise,
) -> InversionResult<Vec<OffsetSite>> {
    if strike_slip.len() != plane.len() || dip_slip.len() != plane.len() {
        return Err(InversionError::InvalidInput(format!(
            "slip given for {}/{} of {} patches",
            strike_slip.len(),
            dip_slip.len(),
            plane.len()
        )));
    }
    let zone = match (zone, plane.patches.first()) {
        (Some(z), _) => z,
        (None, Some(p)) => zone_for_longitude(p.longitude),
        (None, None) => return Err(InversionError::InvalidGrid("fault plane has no patches".to_string())),
    };
    let receivers: Vec<Receiver> = stations
        .iter()
        .map(|st| {
            let p = ll2utm(st.latitude, st.longitude, Some(zone));
            Receiver {
                easting: p.easting,
                northing: p.northing,
                altitude: st.altitude,
            }
        })
        .collect();
    let g = okada::forward_model(earth, &plane.patches, &receivers)?;
    let slip = DVector::from_iterator(
        2 * plane.len(),
        strike_slip.iter().zip(dip_slip).flat_map(|(s, d)| [*s, *d]),
    );
    let up = &g * slip;
    Ok(stations
        .iter()
        .zip(up.as_slice().chunks_exact(3))
        .map(|(st, c)| {
            let d = Displacement {
                east: c[0],
                north: c[1],
                up: c[2],
            };
            offset_site(st, d, noise)
        })
        .collect())
}

/// Parameters of a synthetic event.
#[derive(Debug, Clone, PartialEq)]
pub struct SynthSpec {
    pub latitude: f64,
    pub longitude: f64,
    pub depth_km: f64,
    pub magnitude: f64,
    pub mechanism: NodalPlane,
    pub stations: usize,
    pub min_radius_km: f64,
    pub max_radius_km: f64,
    /// Noise standard deviation, m.
    pub noise: f64,
    pub seed: u64,
    pub origin_time: DateTime<Utc>,
}

/// A complete event: PGD from the scaling law and offsets from a double
/// couple of the same magnitude.
pub fn synth_event(spec: &SynthSpec, earth: &EarthModel, zone: Option<u8>) -> InversionResult<Event> {
    if spec.stations == 0 {
        return Err(InversionError::InvalidInput("synthetic event needs stations".to_string()));
    }
    if !(spec.min_radius_km > 0.0 && spec.max_radius_km >= spec.min_radius_km) {
        return Err(InversionError::InvalidInput(format!(
            "invalid station radii {}..{} km",
            spec.min_radius_km, spec.max_radius_km
        )));
    }
    let hypocenter = Hypocenter {
        event_id: format!("synthetic-m{:.1}", spec.magnitude),
        latitude: spec.latitude,
        longitude: spec.longitude,
        depth_km: spec.depth_km,
        origin_time: spec.origin_time,
        magnitude: Some(spec.magnitude),
    };
    let stations = ring_layout(
        spec.latitude,
        spec.longitude,
        spec.stations,
        spec.min_radius_km,
        spec.max_radius_km,
    );
    let mut noise = Noise::gaussian(spec.noise, spec.seed)?;
    let peak_displacements = peak_displacements(&hypocenter, &stations, spec.magnitude, zone, &mut noise)?;
    let mt = double_couple(&spec.mechanism, scalar_moment_from_mw(spec.magnitude));
    let offsets = cmt_offsets(earth, &hypocenter, &stations, &mt, zone, &mut noise)?;
    Ok(Event {
        hypocenter,
        peak_displacements,
        offsets,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coords::horizontal_distance;

    fn spec(noise: f64) -> SynthSpec {
        SynthSpec {
            latitude: 40.5,
            longitude: -124.5,
            depth_km: 15.0,
            magnitude: 7.2,
            mechanism: NodalPlane {
                strike: 330.0,
                dip: 20.0,
                rake: 90.0,
            },
            stations: 10,
            min_radius_km: 25.0,
            max_radius_km: 200.0,
            noise,
            seed: 7,
            origin_time: DateTime::from_timestamp(1_700_000_000, 0).unwrap_or_default(),
        }
    }

    #[test]
    fn ring_layout_spans_the_requested_radii() {
        let stations = ring_layout(40.5, -124.5, 5, 25.0, 200.0);
        let origin = ll2utm(40.5, -124.5, None);
        let r: Vec<f64> = stations
            .iter()
            .map(|s| horizontal_distance(&origin, &ll2utm(s.latitude, s.longitude, Some(origin.zone))) * 1.0e-3)
            .collect();
        assert!((r[0] - 25.0).abs() < 1e-3);
        assert!((r[4] - 200.0).abs() < 1e-3);
        assert!(r.windows(2).all(|w| w[1] > w[0]));
        assert!(stations.iter().all(|s| s.longitude < 0.0));
        assert_eq!(stations[2].name, "S003");
    }

    #[test]
    fn seeded_noise_is_reproducible() {
        let a = synth_event(&spec(0.01), &EarthModel::default(), None).unwrap();
        let b = synth_event(&spec(0.01), &EarthModel::default(), None).unwrap();
        let clean = synth_event(&spec(0.0), &EarthModel::default(), None).unwrap();
        assert_eq!(a, b);
        assert_ne!(a.offsets[0].north, clean.offsets[0].north);
        assert_eq!(a.peak_displacements.len(), 10);
        assert!(a.peak_displacements.iter().all(|p| p.pgd > 0.0));
    }

    #[test]
    fn peak_displacement_decays_with_distance() {
        let event = synth_event(&spec(0.0), &EarthModel::default(), None).unwrap();
        let pgd: Vec<f64> = event.peak_displacements.iter().map(|p| p.pgd).collect();
        assert!(pgd.windows(2).all(|w| w[1] < w[0]));
    }

    #[test]
    fn slip_vector_length_is_checked() {
        let plane = FaultPlane {
            nstr: 1,
            ndip: 1,
            patches: vec![],
        };
        let stations = ring_layout(40.0, -124.0, 3, 10.0, 20.0);
        let res = fault_offsets(
            &EarthModel::default(),
            &plane,
            &stations,
            &[1.0],
            &[0.0],
            None,
            &mut Noise::none(),
        );
        assert!(res.is_err());
    }
}
