//! Wire types of the directions API.

use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub(crate) struct DirectionsBody {
    pub status: String,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub routes: Vec<RouteBody>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RouteBody {
    #[serde(default)]
    pub legs: Vec<LegBody>,
}

/// Only transit routes carry departure and arrival times.
#[derive(Debug, Deserialize)]
pub(crate) struct LegBody {
    pub departure_time: Option<TimeValue>,
    pub arrival_time: Option<TimeValue>,
    pub duration: Option<TimeValue>,
    #[serde(default)]
    pub steps: Vec<StepBody>,
}

/// `{"value": <seconds>, "text": ...}`; for times the value is a unix timestamp.
#[derive(Debug, Deserialize)]
pub(crate) struct TimeValue {
    pub value: i64,
}

#[derive(Debug, Deserialize)]
pub(crate) struct StepBody {
    pub travel_mode: String,
    pub duration: Option<TimeValue>,
}

impl StepBody {
    pub fn is_walking(&self) -> bool {
        self.travel_mode == "WALKING"
    }
}
