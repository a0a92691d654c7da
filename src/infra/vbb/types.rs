//! Wire types of the transport.rest API.

use chrono::{DateTime, FixedOffset};
use serde::Deserialize;
use std::collections::BTreeMap;

use crate::services::journey_api::{RawLeg, StationHit};

#[derive(Debug, Deserialize)]
pub(crate) struct ErrorBody {
    pub message: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct JourneysBody {
    #[serde(default)]
    pub journeys: Vec<JourneyBody>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct JourneyBody {
    #[serde(default)]
    pub legs: Vec<LegBody>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct LegBody {
    pub planned_departure: Option<DateTime<FixedOffset>>,
    pub planned_arrival: Option<DateTime<FixedOffset>>,
    #[serde(default)]
    pub walking: bool,
}

impl From<LegBody> for RawLeg {
    fn from(leg: LegBody) -> Self {
        RawLeg {
            departure: leg.planned_departure,
            arrival: leg.planned_arrival,
            duration_secs: None,
            walking: leg.walking,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct StationBody {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub score: f64,
}

impl From<StationBody> for StationHit {
    fn from(s: StationBody) -> Self {
        StationHit {
            id: s.id,
            name: s.name,
            score: s.score,
        }
    }
}

/// `/stations` answers with an object keyed by station id; some deployments
/// answer with a plain list.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum StationsBody {
    Keyed(BTreeMap<String, StationBody>),
    List(Vec<StationBody>),
}

impl StationsBody {
    pub fn into_hits(self) -> Vec<StationHit> {
        match self {
            StationsBody::Keyed(map) => map.into_values().map(Into::into).collect(),
            StationsBody::List(list) => list.into_iter().map(Into::into).collect(),
        }
    }
}
