use crate::config::{DataLayout, RunSlot, stop_key};
use crate::input::{load_band_file, load_roster};
use crate::model::{BandFile, RosterEntry, StopRecord, StopTravelRecord, TravelTimeMatrix};
use crate::output::write_json_atomic;
use anyhow::{Context, Result};
use std::collections::HashSet;
use std::fs;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{Instrument, debug, error, info, warn};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeSummary {
    pub merged: usize,
    pub dead: usize,
    pub failed: usize,
}

/// Folds the per-band results of one stop into a single record.
///
/// Slots are filled in the order given, a later source for the same slot
/// replacing an earlier one. Stop info comes from the first source; without
/// any source the roster entry stands in. The municipality is always taken
/// from the roster.
pub fn aggregate(
    entry: &RosterEntry,
    sources: impl IntoIterator<Item = (RunSlot, BandFile)>,
) -> StopTravelRecord {
    let mut stop_info: Option<StopRecord> = None;
    let mut travel_times = TravelTimeMatrix::default();

    for (slot, band) in sources {
        stop_info.get_or_insert(band.stop_info);
        travel_times.replace_slot(slot, band.destinations);
    }

    let mut stop_info = stop_info.unwrap_or_else(|| StopRecord {
        id: String::new(),
        name: entry.name().to_string(),
        municipality: String::new(),
        coord: entry.coord(),
    });
    stop_info.municipality = entry.municipality().to_string();

    StopTravelRecord {
        stop_info,
        travel_times,
    }
}

/// A stop is dead when none of its six slots holds a connection.
pub fn classify_dead(record: &StopTravelRecord) -> bool {
    record.travel_times.is_empty()
}

/// Loads whatever band files exist for a roster stop and aggregates them.
pub fn merge_stop(layout: &DataLayout, entry: &RosterEntry) -> Result<StopTravelRecord> {
    let file_name = format!("{}.json", stop_key(entry.name()));
    let mut sources = Vec::new();

    for slot in RunSlot::all() {
        if let Some(band) = load_band_file(&layout.band_dir(slot).join(&file_name))? {
            sources.push((slot, band));
        }
    }

    debug!(stop = entry.name(), sources = sources.len(), "Band files loaded");
    Ok(aggregate(entry, sources))
}

/// Merges one stop into `merged/`; true when the stop is dead.
fn merge_and_write(layout: &DataLayout, entry: &RosterEntry) -> Result<bool> {
    let record = merge_stop(layout, entry)?;
    let path = layout
        .merged_dir()
        .join(format!("{}.json", stop_key(entry.name())));
    write_json_atomic(&path, &record)?;
    Ok(classify_dead(&record))
}

/// Merges every roster stop into `merged/`, at most `concurrency` stops at a
/// time. A failing stop is logged and does not cancel the others.
#[tracing::instrument(skip(layout), fields(root = %layout.root().display()))]
pub async fn merge_all(layout: &DataLayout, concurrency: usize) -> Result<MergeSummary> {
    let roster = load_roster(&layout.roster_file())?;
    let merged_dir = layout.merged_dir();
    fs::create_dir_all(&merged_dir)
        .with_context(|| format!("creating {}", merged_dir.display()))?;

    let mut seen = HashSet::new();
    let roster: Vec<RosterEntry> = roster
        .into_iter()
        .filter(|entry| {
            let fresh = seen.insert(entry.name().to_string());
            if !fresh {
                warn!(stop = entry.name(), "Duplicate roster entry ignored");
            }
            fresh
        })
        .collect();

    info!(stops = roster.len(), concurrency, "Merging band results");

    let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
    let layout = Arc::new(layout.clone());
    let mut tasks = Vec::with_capacity(roster.len());

    for entry in roster {
        let sem = semaphore.clone();
        let layout = layout.clone();
        let span = tracing::info_span!("merge_stop", stop = %entry.name());

        let task = tokio::spawn(
            async move {
                let _permit = sem.acquire().await?;
                let span = tracing::Span::current();
                tokio::task::spawn_blocking(move || {
                    span.in_scope(|| merge_and_write(&layout, &entry))
                })
                .await?
            }
            .instrument(span),
        );

        tasks.push(task);
    }

    let mut summary = MergeSummary::default();
    for task in tasks {
        match task.await {
            Ok(Ok(dead)) => {
                summary.merged += 1;
                if dead {
                    summary.dead += 1;
                }
            }
            Ok(Err(e)) => {
                error!(error = %e, "Merging stop failed");
                summary.failed += 1;
            }
            Err(e) => {
                error!(error = %e, "Merge task aborted");
                summary.failed += 1;
            }
        }
    }

    info!(
        merged = summary.merged,
        dead = summary.dead,
        failed = summary.failed,
        "Merge complete"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DayType, TimeBand};
    use crate::model::{ConnectionRecord, Coord};

    fn entry() -> RosterEntry {
        RosterEntry("Caputh, Bahnhof".into(), "Schwielowsee".into(), 52.35, 12.99)
    }

    fn band(destinations: Vec<ConnectionRecord>) -> BandFile {
        BandFile {
            stop_info: StopRecord {
                id: "de:12069:900220071".into(),
                name: "Caputh, Bahnhof".into(),
                municipality: String::new(),
                coord: Coord(52.351, 12.991),
            },
            destinations,
        }
    }

    fn connection(name: &str) -> ConnectionRecord {
        ConnectionRecord {
            destination_id: "1".into(),
            destination_name: name.into(),
            duration_seconds: 1200.0,
            transfer_count: 0,
            destination_coord: Coord(52.39, 13.06),
            is_walking_only: false,
        }
    }

    #[test]
    fn test_without_sources_roster_stands_in() {
        let record = aggregate(&entry(), Vec::new());

        assert_eq!(record.stop_info.name, "Caputh, Bahnhof");
        assert_eq!(record.stop_info.municipality, "Schwielowsee");
        assert_eq!(record.stop_info.coord, Coord(52.35, 12.99));
        assert!(classify_dead(&record));
    }

    #[test]
    fn test_sources_fill_their_slots() {
        let weekday_day = RunSlot::new(DayType::Weekday, TimeBand::Day);
        let sunday_night = RunSlot::new(DayType::Sunday, TimeBand::Night);

        let record = aggregate(
            &entry(),
            vec![
                (weekday_day, band(vec![connection("Potsdam")])),
                (sunday_night, band(vec![])),
            ],
        );

        assert_eq!(record.stop_info.id, "de:12069:900220071");
        assert_eq!(record.stop_info.municipality, "Schwielowsee");
        assert_eq!(record.travel_times.slot(weekday_day).len(), 1);
        assert!(record.travel_times.slot(sunday_night).is_empty());
        assert!(!classify_dead(&record));
    }

    #[test]
    fn test_later_source_wins_for_same_slot() {
        let slot = RunSlot::new(DayType::Saturday, TimeBand::Day);

        let record = aggregate(
            &entry(),
            vec![
                (slot, band(vec![connection("first")])),
                (slot, band(vec![connection("second")])),
            ],
        );

        assert_eq!(record.travel_times.slot(slot)[0].destination_name, "second");
    }

    #[test]
    fn test_any_single_connection_makes_stop_alive() {
        for slot in RunSlot::all() {
            let mut record = aggregate(&entry(), Vec::new());
            assert!(classify_dead(&record));
            record.travel_times.slot_mut(slot).push(connection("x"));
            assert!(!classify_dead(&record), "slot {slot}");
        }
    }
}
