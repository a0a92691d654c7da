//! Persistence of stop records and the dead-station exports.
//!
//! Stop records are written to a sibling `.tmp` file and renamed into place,
//! so a `.json` file in a result directory is always complete.

use anyhow::{Context, Result};
use csv::WriterBuilder;
use geojson::{Feature, FeatureCollection, Geometry, Value};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::model::StopRecord;

/// Serializes `value` as JSON and atomically replaces `path` with it.
pub fn write_json_atomic(path: &Path, value: &impl Serialize) -> Result<()> {
    let body = serde_json::to_vec(value)?;
    let tmp = tmp_path(path);

    fs::write(&tmp, &body).with_context(|| format!("writing {}", tmp.display()))?;
    fs::rename(&tmp, path).with_context(|| format!("renaming into {}", path.display()))?;

    debug!(path = %path.display(), bytes = body.len(), "Record persisted");
    Ok(())
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

/// A row of `dead_stations.csv`.
#[derive(Debug, Serialize)]
struct DeadStationRow<'a> {
    stop_id: &'a str,
    stop_name: &'a str,
    municipality: &'a str,
    lat: f64,
    lon: f64,
}

const DEAD_STATIONS_HEADER: [&str; 5] = ["stop_id", "stop_name", "municipality", "lat", "lon"];

/// Writes the tabular dead-station listing, replacing any previous file. The
/// header row is written even when there are no dead stations.
pub fn write_dead_stations_csv(path: &Path, stops: &[StopRecord]) -> Result<()> {
    let mut writer = WriterBuilder::new()
        .has_headers(false)
        .from_path(path)
        .with_context(|| format!("creating {}", path.display()))?;
    writer.write_record(DEAD_STATIONS_HEADER)?;

    for stop in stops {
        writer.serialize(DeadStationRow {
            stop_id: &stop.id,
            stop_name: &stop.name,
            municipality: &stop.municipality,
            lat: stop.coord.lat(),
            lon: stop.coord.lon(),
        })?;
    }

    writer.flush()?;
    Ok(())
}

fn stop_to_feature(stop: &StopRecord) -> Feature {
    let mut properties = serde_json::Map::new();
    properties.insert("stop_id".to_string(), serde_json::json!(stop.id));
    properties.insert("stop_name".to_string(), serde_json::json!(stop.name));
    properties.insert("municipality".to_string(), serde_json::json!(stop.municipality));

    Feature {
        bbox: None,
        // GeoJSON positions are [lon, lat]
        geometry: Some(Geometry::new(Value::Point(vec![
            stop.coord.lon(),
            stop.coord.lat(),
        ]))),
        id: None,
        properties: Some(properties),
        foreign_members: None,
    }
}

/// Builds the point-feature collection of dead stations.
pub fn dead_stations_collection(stops: &[StopRecord]) -> FeatureCollection {
    FeatureCollection {
        bbox: None,
        features: stops.iter().map(stop_to_feature).collect(),
        foreign_members: None,
    }
}

pub fn write_dead_stations_geojson(path: &Path, stops: &[StopRecord]) -> Result<()> {
    let collection = dead_stations_collection(stops);
    fs::write(path, serde_json::to_string(&collection)?)
        .with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}
