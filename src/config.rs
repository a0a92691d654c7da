//! Run configuration: day types, time bands, travel windows and the on-disk
//! layout of the data directory.

use anyhow::{Context, Result};
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime};
use clap::ValueEnum;
use std::fmt;
use std::path::{Path, PathBuf};

/// Longest accepted journey, in seconds.
pub const MAX_DURATION_SECS: f64 = 3600.0;

/// UTC offset of the reference dates (CET, February).
pub const REFERENCE_OFFSET_SECS: i32 = 3600;

/// Day type of a collection run. The CLI token for weekdays is `wednesday`,
/// the day the weekday timetable was sampled on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum)]
pub enum DayType {
    #[value(name = "wednesday")]
    Weekday,
    Saturday,
    Sunday,
}

impl DayType {
    pub const ALL: [DayType; 3] = [DayType::Weekday, DayType::Saturday, DayType::Sunday];

    /// Token used on the command line and in upstream directory names.
    pub fn token(self) -> &'static str {
        match self {
            DayType::Weekday => "wednesday",
            DayType::Saturday => "saturday",
            DayType::Sunday => "sunday",
        }
    }

    /// Key used for this day type inside persisted travel-time matrices.
    pub fn label(self) -> &'static str {
        match self {
            DayType::Weekday => "Werktag",
            DayType::Saturday => "Samstag",
            DayType::Sunday => "Sonntag",
        }
    }
}

impl fmt::Display for DayType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

/// Departure time band of a collection run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum)]
pub enum TimeBand {
    Day,
    Night,
}

impl TimeBand {
    pub const ALL: [TimeBand; 2] = [TimeBand::Day, TimeBand::Night];

    pub fn token(self) -> &'static str {
        match self {
            TimeBand::Day => "day",
            TimeBand::Night => "night",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            TimeBand::Day => "Tag",
            TimeBand::Night => "Nacht",
        }
    }

    /// Inclusive start and end of the departure window.
    pub fn bounds(self) -> (NaiveTime, NaiveTime) {
        match self {
            TimeBand::Day => (hms(8, 0, 0), hms(20, 0, 0)),
            TimeBand::Night => (hms(20, 0, 0), hms(23, 59, 59)),
        }
    }
}

impl fmt::Display for TimeBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

fn hms(h: u32, m: u32, s: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, s).unwrap_or(NaiveTime::MIN)
}

/// The external journey-planning service a pass talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    /// transport.rest stop lookup, station search and journeys.
    Vbb,
    /// Google Maps directions.
    Google,
}

impl Provider {
    /// How many of the nearest city centres are queried per dead stop.
    pub fn destinations_per_stop(self) -> usize {
        match self {
            Provider::Vbb => 5,
            Provider::Google => 1,
        }
    }

    /// Requests allowed per rolling minute before the governor cools down.
    pub fn request_threshold(self) -> u32 {
        match self {
            Provider::Vbb => 90,
            Provider::Google => 100,
        }
    }

    /// Calendar date sampled for a day type.
    ///
    /// The Google pass sampled the Saturday one week later than the
    /// transport.rest pass.
    pub fn reference_date(self, day: DayType) -> NaiveDate {
        let (y, m, d) = match (self, day) {
            (_, DayType::Weekday) => (2023, 2, 8),
            (Provider::Vbb, DayType::Saturday) => (2023, 2, 4),
            (Provider::Google, DayType::Saturday) => (2023, 2, 11),
            (_, DayType::Sunday) => (2023, 2, 12),
        };
        NaiveDate::from_ymd_opt(y, m, d).unwrap_or(NaiveDate::MIN)
    }
}

/// One day-type / time-band combination, the unit a journey pass works on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RunSlot {
    pub day: DayType,
    pub band: TimeBand,
}

impl RunSlot {
    pub fn new(day: DayType, band: TimeBand) -> Self {
        Self { day, band }
    }

    /// All six slots in matrix order.
    pub fn all() -> impl Iterator<Item = RunSlot> {
        DayType::ALL
            .into_iter()
            .flat_map(|day| TimeBand::ALL.into_iter().map(move |band| RunSlot { day, band }))
    }

    /// Departure window of this slot on the provider's reference date.
    pub fn window(self, provider: Provider) -> Result<TravelWindow> {
        TravelWindow::on(provider.reference_date(self.day), self.band)
    }
}

impl fmt::Display for RunSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.day, self.band)
    }
}

/// Inclusive departure window, anchored in the reference time zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TravelWindow {
    pub start: DateTime<FixedOffset>,
    pub end: DateTime<FixedOffset>,
}

impl TravelWindow {
    pub fn on(date: NaiveDate, band: TimeBand) -> Result<Self> {
        let offset = reference_offset()?;
        let (start, end) = band.bounds();
        let anchor = |t: NaiveTime| {
            date.and_time(t)
                .and_local_timezone(offset)
                .single()
                .with_context(|| format!("ambiguous local time {date} {t}"))
        };
        Ok(Self {
            start: anchor(start)?,
            end: anchor(end)?,
        })
    }

    pub fn contains(&self, t: DateTime<FixedOffset>) -> bool {
        t >= self.start && t <= self.end
    }

    /// Departure sent to providers: the window start.
    pub fn departure(&self) -> DateTime<FixedOffset> {
        self.start
    }
}

pub fn reference_offset() -> Result<FixedOffset> {
    FixedOffset::east_opt(REFERENCE_OFFSET_SECS).context("invalid reference offset")
}

/// Directory and file naming below the data root.
#[derive(Debug, Clone)]
pub struct DataLayout {
    root: PathBuf,
}

impl DataLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Roster of all stops: `[[name, municipality, lat, lon], ...]`.
    pub fn roster_file(&self) -> PathBuf {
        self.root.join("stops_with_coords.json")
    }

    /// Upstream per-stop results of one collection run.
    pub fn band_dir(&self, slot: RunSlot) -> PathBuf {
        self.root.join(format!(
            "travel_times_proc_{}_{}_combine",
            slot.day.token(),
            slot.band.token()
        ))
    }

    pub fn merged_dir(&self) -> PathBuf {
        self.root.join("merged")
    }

    /// Dead-station listing without extension; `.csv` and `.geojson` are added.
    pub fn dead_stations_base(&self) -> PathBuf {
        self.root.join("dead_stations")
    }

    /// Per dead stop, city centres ranked by straight-line distance.
    pub fn nearby_dir(&self) -> PathBuf {
        self.root.join("cities_nearby_dead_stations")
    }

    pub fn vbb_dir(&self) -> PathBuf {
        self.root.join("with_vbb_data")
    }

    pub fn google_dir(&self) -> PathBuf {
        self.root.join("with_google_maps_data")
    }

    pub fn collected_file(&self) -> PathBuf {
        self.root.join("with_google_maps_data.json")
    }

    /// Input and output directory of a provider pass.
    pub fn pass_dirs(&self, provider: Provider) -> (PathBuf, PathBuf) {
        match provider {
            Provider::Vbb => (self.merged_dir(), self.vbb_dir()),
            Provider::Google => (self.vbb_dir(), self.google_dir()),
        }
    }
}

/// URL-safe key of a stop, used as its file stem everywhere.
pub fn stop_key(display_name: &str) -> String {
    urlencoding::encode(display_name).into_owned()
}
