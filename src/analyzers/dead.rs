//! Dead-station export and the final collection of journey results.

use anyhow::Result;
use std::path::Path;
use tracing::{info, warn};

use super::aggregate::classify_dead;
use crate::config::DataLayout;
use crate::input::{list_json_files, load_record};
use crate::model::{StopRecord, StopTravelRecord};
use crate::output::{write_dead_stations_csv, write_dead_stations_geojson, write_json_atomic};

/// Loads every record in `dir`, in file name order. Unreadable files are
/// logged and left out.
fn load_all(dir: &Path) -> Result<Vec<StopTravelRecord>> {
    let mut records = Vec::new();

    for file_name in list_json_files(dir)? {
        match load_record(&dir.join(&file_name)) {
            Ok(record) => records.push(record),
            Err(e) => warn!(file = %file_name, error = %e, "Skipping unreadable record"),
        }
    }

    Ok(records)
}

/// Classifies every merged record and writes `dead_stations.csv` and
/// `dead_stations.geojson`. Returns the dead stops.
#[tracing::instrument(skip(layout))]
pub fn export_dead_stations(layout: &DataLayout) -> Result<Vec<StopRecord>> {
    let records = load_all(&layout.merged_dir())?;
    let total = records.len();

    let dead: Vec<StopRecord> = records
        .into_iter()
        .filter(classify_dead)
        .map(|r| r.stop_info)
        .collect();

    let base = layout.dead_stations_base();
    write_dead_stations_csv(&base.with_extension("csv"), &dead)?;
    write_dead_stations_geojson(&base.with_extension("geojson"), &dead)?;

    info!(total, dead = dead.len(), "Dead stations exported");
    Ok(dead)
}

/// Folds the records of the last journey pass into one JSON array.
#[tracing::instrument(skip(layout))]
pub fn collect(layout: &DataLayout) -> Result<usize> {
    let records = load_all(&layout.google_dir())?;
    write_json_atomic(&layout.collected_file(), &records)?;

    let connections: usize = records
        .iter()
        .map(|r| r.travel_times.connection_count())
        .sum();
    info!(records = records.len(), connections, "Records collected");
    Ok(records.len())
}
