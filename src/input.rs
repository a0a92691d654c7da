//! Readers for the pipeline's input files.

use anyhow::{Context, Result};
use std::fs::{self, File};
use std::io::BufReader;
use std::path::Path;

use crate::model::{BandFile, CityCentre, RosterEntry, StopTravelRecord};

/// Loads the stop roster.
pub fn load_roster(path: &Path) -> Result<Vec<RosterEntry>> {
    let file = File::open(path).with_context(|| format!("opening roster {}", path.display()))?;
    let roster = serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("parsing roster {}", path.display()))?;
    Ok(roster)
}

/// Loads one upstream per-band result file, or `None` if the run produced none
/// for this stop.
pub fn load_band_file(path: &Path) -> Result<Option<BandFile>> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    let band = serde_json::from_str(&content)
        .with_context(|| format!("parsing band file {}", path.display()))?;
    Ok(Some(band))
}

pub fn load_record(path: &Path) -> Result<StopTravelRecord> {
    let content =
        fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("parsing {}", path.display()))
}

/// Loads the city-centre ranking for a dead stop, nearest first, keeping at
/// most `limit` rows.
///
/// Returns `None` when no ranking exists, i.e. the stop was not a dead-station
/// candidate when the rankings were computed.
pub fn load_nearby_centres(path: &Path, limit: usize) -> Result<Option<Vec<CityCentre>>> {
    if !path.exists() {
        return Ok(None);
    }

    let file = File::open(path)?;
    let mut rdr = csv::Reader::from_reader(file);
    let mut rows = Vec::new();

    for result in rdr.deserialize::<CityCentre>() {
        let row: CityCentre = result.with_context(|| format!("parsing {}", path.display()))?;
        rows.push(row);
    }

    rows.sort_by(|a, b| a.distance.total_cmp(&b.distance));
    rows.truncate(limit);
    Ok(Some(rows))
}

/// Sorted `*.json` file names directly inside `dir`.
pub fn list_json_files(dir: &Path) -> Result<Vec<String>> {
    let mut names = Vec::new();

    for entry in fs::read_dir(dir).with_context(|| format!("listing {}", dir.display()))? {
        let entry = entry?;
        let path = entry.path();
        if !entry.file_type()?.is_file()
            || path.extension().and_then(|e| e.to_str()) != Some("json")
        {
            continue;
        }
        if let Some(name) = entry.file_name().to_str() {
            names.push(name.to_string());
        }
    }

    names.sort();
    Ok(names)
}
