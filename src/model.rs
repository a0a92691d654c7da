//! Persisted data shapes.
//!
//! Field names follow the JSON documents the downstream map consumes, so a
//! record written here round-trips byte-for-byte through the same code.

use serde::{Deserialize, Serialize};

use crate::config::{DayType, RunSlot, TimeBand};

/// `[lat, lon]` pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coord(pub f64, pub f64);

impl Coord {
    pub fn lat(&self) -> f64 {
        self.0
    }

    pub fn lon(&self) -> f64 {
        self.1
    }

    /// `"lat,lon"`, the form directions providers take as origin/destination.
    pub fn to_query(&self) -> String {
        format!("{},{}", self.0, self.1)
    }
}

/// A transit stop as known to the upstream stop data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StopRecord {
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub municipality: String,
    pub coord: Coord,
}

/// One accepted connection from a stop to a city centre.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionRecord {
    #[serde(rename = "id")]
    pub destination_id: String,
    #[serde(rename = "name")]
    pub destination_name: String,
    #[serde(rename = "time")]
    pub duration_seconds: f64,
    #[serde(rename = "trans")]
    pub transfer_count: u32,
    #[serde(rename = "coords")]
    pub destination_coord: Coord,
    #[serde(rename = "walking", default, skip_serializing_if = "is_false")]
    pub is_walking_only: bool,
}

fn is_false(b: &bool) -> bool {
    !*b
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BandSlots {
    #[serde(rename = "Tag", default)]
    pub day: Vec<ConnectionRecord>,
    #[serde(rename = "Nacht", default)]
    pub night: Vec<ConnectionRecord>,
}

impl BandSlots {
    fn get(&self, band: TimeBand) -> &Vec<ConnectionRecord> {
        match band {
            TimeBand::Day => &self.day,
            TimeBand::Night => &self.night,
        }
    }

    fn get_mut(&mut self, band: TimeBand) -> &mut Vec<ConnectionRecord> {
        match band {
            TimeBand::Day => &mut self.day,
            TimeBand::Night => &mut self.night,
        }
    }
}

/// Connections per day type and time band.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TravelTimeMatrix {
    #[serde(rename = "Werktag", default)]
    pub weekday: BandSlots,
    #[serde(rename = "Samstag", default)]
    pub saturday: BandSlots,
    #[serde(rename = "Sonntag", default)]
    pub sunday: BandSlots,
}

impl TravelTimeMatrix {
    fn days(&self, day: DayType) -> &BandSlots {
        match day {
            DayType::Weekday => &self.weekday,
            DayType::Saturday => &self.saturday,
            DayType::Sunday => &self.sunday,
        }
    }

    fn days_mut(&mut self, day: DayType) -> &mut BandSlots {
        match day {
            DayType::Weekday => &mut self.weekday,
            DayType::Saturday => &mut self.saturday,
            DayType::Sunday => &mut self.sunday,
        }
    }

    pub fn slot(&self, slot: RunSlot) -> &[ConnectionRecord] {
        self.days(slot.day).get(slot.band)
    }

    pub fn slot_mut(&mut self, slot: RunSlot) -> &mut Vec<ConnectionRecord> {
        self.days_mut(slot.day).get_mut(slot.band)
    }

    /// Replaces a slot wholesale with the connections of one attempt.
    pub fn replace_slot(&mut self, slot: RunSlot, connections: Vec<ConnectionRecord>) {
        *self.slot_mut(slot) = connections;
    }

    /// True when all six slots hold no connection.
    pub fn is_empty(&self) -> bool {
        RunSlot::all().all(|slot| self.slot(slot).is_empty())
    }

    pub fn connection_count(&self) -> usize {
        RunSlot::all().map(|slot| self.slot(slot).len()).sum()
    }
}

/// The unit of persistence: one stop and everything known about its reach.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StopTravelRecord {
    #[serde(rename = "stopInfo")]
    pub stop_info: StopRecord,
    #[serde(rename = "travelTimes")]
    pub travel_times: TravelTimeMatrix,
}

impl StopTravelRecord {
    pub fn new(stop_info: StopRecord) -> Self {
        Self {
            stop_info,
            travel_times: TravelTimeMatrix::default(),
        }
    }
}

/// Result file of one upstream collection run for one stop.
#[derive(Debug, Clone, Deserialize)]
pub struct BandFile {
    pub stop_info: StopRecord,
    #[serde(default)]
    pub destinations: Vec<ConnectionRecord>,
}

/// A row of the stop roster: `[name, municipality, lat, lon]`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RosterEntry(pub String, pub String, pub f64, pub f64);

impl RosterEntry {
    pub fn name(&self) -> &str {
        &self.0
    }

    pub fn municipality(&self) -> &str {
        &self.1
    }

    pub fn coord(&self) -> Coord {
        Coord(self.2, self.3)
    }
}

/// A city-centre stop ranked by straight-line distance from a dead stop.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CityCentre {
    pub stop_id: String,
    pub stop_name: String,
    pub stop_lat: f64,
    pub stop_lon: f64,
    pub distance: f64,
}

impl CityCentre {
    pub fn coord(&self) -> Coord {
        Coord(self.stop_lat, self.stop_lon)
    }
}
