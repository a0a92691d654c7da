//! Acceptance rules for a provider journey.

use std::fmt;

use crate::config::{MAX_DURATION_SECS, TravelWindow};
use crate::model::{CityCentre, ConnectionRecord};
use crate::services::journey_api::RawLeg;

/// Why a journey was not turned into a [`ConnectionRecord`].
#[derive(Debug, Clone, PartialEq)]
pub enum FilterRejection {
    NoLegs,
    MissingTimes,
    DepartureOutsideWindow { departure: String },
    TooLong { duration_secs: f64 },
    NegativeDuration,
    NoTransitLegs,
}

impl fmt::Display for FilterRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterRejection::NoLegs => write!(f, "no legs"),
            FilterRejection::MissingTimes => write!(f, "departure or arrival missing"),
            FilterRejection::DepartureOutsideWindow { departure } => {
                write!(f, "start time {departure} not in given range")
            }
            FilterRejection::TooLong { duration_secs } => {
                write!(f, "duration {duration_secs}s over budget")
            }
            FilterRejection::NegativeDuration => write!(f, "arrival before departure"),
            FilterRejection::NoTransitLegs => write!(f, "no non-walking legs"),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct TravelWindowFilter {
    window: TravelWindow,
    max_duration_secs: f64,
}

impl TravelWindowFilter {
    pub fn new(window: TravelWindow) -> Self {
        Self {
            window,
            max_duration_secs: MAX_DURATION_SECS,
        }
    }

    pub fn window(&self) -> TravelWindow {
        self.window
    }

    /// Accepts a journey to `destination` or says why not.
    ///
    /// A journey made of a single walking leg is accepted whenever it fits
    /// the duration budget: walking does not depend on a timetable, so the
    /// departure window does not apply.
    pub fn evaluate(
        &self,
        legs: &[RawLeg],
        destination: &CityCentre,
    ) -> Result<ConnectionRecord, FilterRejection> {
        let (first, last) = match (legs.first(), legs.last()) {
            (Some(first), Some(last)) => (first, last),
            _ => return Err(FilterRejection::NoLegs),
        };

        if let [only] = legs {
            if only.walking {
                let duration = only.duration().ok_or(FilterRejection::MissingTimes)? as f64;
                self.check_duration(duration)?;
                return Ok(self.record(destination, duration, 0, true));
            }
        }

        let (departure, arrival) = match (first.departure, last.arrival) {
            (Some(dep), Some(arr)) => (dep, arr),
            _ => return Err(FilterRejection::MissingTimes),
        };

        if !self.window.contains(departure) {
            return Err(FilterRejection::DepartureOutsideWindow {
                departure: departure.to_rfc3339(),
            });
        }

        let duration = (arrival - departure).num_seconds() as f64;
        self.check_duration(duration)?;

        let transit_legs = legs.iter().filter(|l| !l.walking).count();
        if transit_legs == 0 {
            return Err(FilterRejection::NoTransitLegs);
        }

        Ok(self.record(destination, duration, (transit_legs - 1) as u32, false))
    }

    fn check_duration(&self, duration: f64) -> Result<(), FilterRejection> {
        if duration < 0.0 {
            return Err(FilterRejection::NegativeDuration);
        }
        if duration > self.max_duration_secs {
            return Err(FilterRejection::TooLong {
                duration_secs: duration,
            });
        }
        Ok(())
    }

    fn record(
        &self,
        destination: &CityCentre,
        duration: f64,
        transfers: u32,
        walking: bool,
    ) -> ConnectionRecord {
        ConnectionRecord {
            destination_id: destination.stop_id.clone(),
            destination_name: destination.stop_name.clone(),
            duration_seconds: duration,
            transfer_count: transfers,
            destination_coord: destination.coord(),
            is_walking_only: walking,
        }
    }
}
