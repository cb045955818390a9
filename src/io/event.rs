//! Event JSON plus the station metadata and site mask CSVs applied on top of it.
//!
//! Station CSVs are matched to observations by station name. Header names are
//! case-insensitive and a leading UTF-8 BOM is ignored.

use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::Read;
use std::path::Path;

use csv::StringRecord;
use tracing::{debug, warn};

use crate::domain::{Event, Station};
use crate::error::AppError;

pub fn read_event(path: &Path) -> Result<Event, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::new(2, format!("Failed to open event JSON '{}': {e}", path.display())))?;
    parse_event(file)
}

pub fn parse_event<R: Read>(reader: R) -> Result<Event, AppError> {
    let event: Event =
        serde_json::from_reader(reader).map_err(|e| AppError::new(2, format!("Invalid event JSON: {e}")))?;
    let hypo = &event.hypocenter;
    if !(hypo.latitude.is_finite() && hypo.longitude.is_finite() && hypo.depth_km.is_finite()) {
        return Err(AppError::new(2, "Event hypocentre must have finite latitude, longitude and depth."));
    }
    Ok(event)
}

pub fn write_event(path: &Path, event: &Event) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::new(2, format!("Failed to create event JSON '{}': {e}", path.display())))?;
    serde_json::to_writer_pretty(file, event)
        .map_err(|e| AppError::new(2, format!("Failed to write event JSON: {e}")))?;
    Ok(())
}

/// Read `station,latitude,longitude[,altitude]` rows keyed by station name.
pub fn read_station_csv<R: Read>(reader: R) -> Result<HashMap<String, Station>, AppError> {
    let mut reader = csv_reader(reader);
    let headers = normalized_headers(&mut reader)?;
    for required in ["station", "latitude", "longitude"] {
        if !headers.iter().any(|h| h == required) {
            return Err(AppError::new(2, format!("Missing required column: `{required}`")));
        }
    }
    reader.set_headers(headers);

    let mut stations = HashMap::new();
    for (idx, result) in reader.deserialize::<Station>().enumerate() {
        let line = idx + 2;
        let station = result.map_err(|e| AppError::new(2, format!("Station CSV line {line}: {e}")))?;
        if !(station.latitude.is_finite() && station.longitude.is_finite() && station.altitude.is_finite()) {
            return Err(AppError::new(2, format!("Station CSV line {line}: non-finite position")));
        }
        if stations.insert(station.name.clone(), station).is_some() {
            warn!(line, "duplicate station row; the last one wins");
        }
    }
    Ok(stations)
}

/// Read a single-column `station` list.
pub fn read_mask_csv<R: Read>(reader: R) -> Result<HashSet<String>, AppError> {
    let mut reader = csv_reader(reader);
    let headers = normalized_headers(&mut reader)?;
    let col = headers
        .iter()
        .position(|h| h == "station")
        .ok_or_else(|| AppError::new(2, "Missing required column: `station`"))?;

    let mut names = HashSet::new();
    for (idx, result) in reader.records().enumerate() {
        let record = result.map_err(|e| AppError::new(2, format!("Mask CSV line {}: {e}", idx + 2)))?;
        match record.get(col) {
            Some(name) if !name.is_empty() => {
                names.insert(name.to_string());
            }
            _ => {}
        }
    }
    Ok(names)
}

/// Replace observation positions with the CSV metadata. Returns the number of
/// observations updated.
pub fn apply_station_overrides(event: &mut Event, stations: &HashMap<String, Station>) -> usize {
    let mut updated = 0;
    let sites = event
        .peak_displacements
        .iter_mut()
        .map(|s| &mut s.station)
        .chain(event.offsets.iter_mut().map(|s| &mut s.station));
    for site in sites {
        if let Some(meta) = stations.get(&site.name) {
            site.latitude = meta.latitude;
            site.longitude = meta.longitude;
            site.altitude = meta.altitude;
            updated += 1;
        }
    }
    debug!(updated, known = stations.len(), "applied station metadata");
    updated
}

/// Mask every observation whose station is listed. Returns the number masked.
pub fn apply_mask(event: &mut Event, masked: &HashSet<String>) -> usize {
    let mut count = 0;
    for site in &mut event.peak_displacements {
        if masked.contains(&site.station.name) {
            site.masked = true;
            count += 1;
        }
    }
    for site in &mut event.offsets {
        if masked.contains(&site.station.name) {
            site.masked = true;
            count += 1;
        }
    }
    debug!(count, listed = masked.len(), "applied site mask");
    count
}

pub fn load_station_csv(path: &Path) -> Result<HashMap<String, Station>, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::new(2, format!("Failed to open station CSV '{}': {e}", path.display())))?;
    read_station_csv(file)
}

pub fn load_mask_csv(path: &Path) -> Result<HashSet<String>, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::new(2, format!("Failed to open mask CSV '{}': {e}", path.display())))?;
    read_mask_csv(file)
}

fn csv_reader<R: Read>(reader: R) -> csv::Reader<R> {
    csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader)
}

fn normalized_headers<R: Read>(reader: &mut csv::Reader<R>) -> Result<StringRecord, AppError> {
    let headers = reader
        .headers()
        .map_err(|e| AppError::new(2, format!("Failed to read CSV headers: {e}")))?;
    Ok(headers.iter().map(normalize_header_name).collect())
}

fn normalize_header_name(name: &str) -> String {
    name.trim().trim_start_matches('\u{feff}').to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    const EVENT: &str = r#"{
        "hypocenter": {
            "event_id": "nc72282711",
            "latitude": 38.22,
            "longitude": -122.31,
            "depth_km": 11.1,
            "origin_time": "2014-08-24T10:20:44Z",
            "magnitude": 6.0
        },
        "peak_displacements": [
            { "station": "P200", "latitude": 38.2, "longitude": -122.4, "pgd": 0.05 },
            { "station": "P261", "latitude": 38.4, "longitude": -122.2, "altitude": 12.0,
              "pgd": 0.03, "weight": 0.5, "active": false }
        ],
        "offsets": [
            { "station": "P200", "latitude": 38.2, "longitude": -122.4,
              "north": 0.01, "east": -0.02, "up": 0.001 }
        ]
    }"#;

    #[test]
    fn event_defaults_are_filled() {
        let event = parse_event(EVENT.as_bytes()).unwrap();
        assert_eq!(event.hypocenter.event_id, "nc72282711");
        assert_eq!(event.hypocenter.magnitude, Some(6.0));

        let first = &event.peak_displacements[0];
        assert_eq!(first.station.name, "P200");
        assert_eq!(first.weight, 1.0);
        assert!(first.active && !first.masked);
        assert_eq!(first.station.altitude, 0.0);

        let second = &event.peak_displacements[1];
        assert!(!second.is_usable());
        assert_eq!(second.station.altitude, 12.0);

        let offset = &event.offsets[0];
        assert_eq!(offset.weight_up, 1.0);
        assert!(offset.is_usable());
    }

    #[test]
    fn event_without_observations_parses() {
        let json = r#"{ "hypocenter": { "event_id": "x", "latitude": 0.0, "longitude": 0.0,
            "depth_km": 8.0, "origin_time": "2020-01-01T00:00:00Z" } }"#;
        let event = parse_event(json.as_bytes()).unwrap();
        assert!(event.peak_displacements.is_empty());
        assert!(event.offsets.is_empty());
        assert_eq!(event.hypocenter.magnitude, None);
    }

    #[test]
    fn bad_origin_time_is_rejected() {
        let json = r#"{ "hypocenter": { "event_id": "x", "latitude": 0.0, "longitude": 0.0,
            "depth_km": 8.0, "origin_time": "yesterday" } }"#;
        let err = parse_event(json.as_bytes()).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn station_csv_overrides_positions() {
        let csv = "\u{feff}Station, Latitude, Longitude, Altitude\nP200,38.25,-122.45,30.5\nXXXX,1,2,3\n";
        let stations = read_station_csv(csv.as_bytes()).unwrap();
        assert_eq!(stations.len(), 2);

        let mut event = parse_event(EVENT.as_bytes()).unwrap();
        let updated = apply_station_overrides(&mut event, &stations);
        // P200 appears once in each observation list.
        assert_eq!(updated, 2);
        assert_eq!(event.peak_displacements[0].station.latitude, 38.25);
        assert_eq!(event.offsets[0].station.altitude, 30.5);
        assert_eq!(event.peak_displacements[1].station.latitude, 38.4);
    }

    #[test]
    fn station_csv_altitude_is_optional() {
        let csv = "station,latitude,longitude\nP200,38.25,-122.45\n";
        let stations = read_station_csv(csv.as_bytes()).unwrap();
        assert_eq!(stations["P200"].altitude, 0.0);
    }

    #[test]
    fn station_csv_requires_position_columns() {
        let err = read_station_csv("station,latitude\nP200,38.0\n".as_bytes()).unwrap_err();
        assert!(err.to_string().contains("longitude"));

        let err = read_station_csv("station,latitude,longitude\nP200,north,-122\n".as_bytes()).unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn mask_marks_listed_stations() {
        let masked = read_mask_csv("station\nP261\n\nP999\n".as_bytes()).unwrap();
        assert_eq!(masked.len(), 2);

        let mut event = parse_event(EVENT.as_bytes()).unwrap();
        assert_eq!(apply_mask(&mut event, &masked), 1);
        assert!(event.peak_displacements[1].masked);
        assert!(!event.peak_displacements[0].masked);
        assert!(!event.offsets[0].masked);
    }

    #[test]
    fn mask_requires_station_column() {
        assert!(read_mask_csv("name\nP261\n".as_bytes()).is_err());
    }
}
