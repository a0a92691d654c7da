use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, TimeDelta};
use reqwest::{StatusCode, Url};
use tracing::debug;

use super::types::{DirectionsBody, LegBody};
use crate::config::reference_offset;
use crate::fetch::{HttpClient, get_json};
use crate::services::journey_api::{Endpoint, JourneyPlanner, PlannerResponse, RawLeg};

pub const DEFAULT_BASE_URL: &str = "https://maps.googleapis.com/maps/api/directions/json";

/// Directions client. Origin and destination are sent as coordinates; the
/// API key is expected to be injected by the wrapped [`HttpClient`].
pub struct GoogleDirectionsClient<C> {
    http: C,
    base_url: String,
}

impl<C: HttpClient> GoogleDirectionsClient<C> {
    pub fn new(http: C, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
        }
    }
}

fn timestamp(value: i64, offset: FixedOffset) -> Option<DateTime<FixedOffset>> {
    DateTime::from_timestamp(value, 0).map(|t| t.with_timezone(&offset))
}

/// Flattens the first leg of a route into one [`RawLeg`] per step. Times are
/// only known for the whole leg, so the first step carries the departure and
/// the last step the arrival.
fn leg_to_raw(leg: LegBody, offset: FixedOffset) -> Vec<RawLeg> {
    let departure = leg
        .departure_time
        .as_ref()
        .and_then(|t| timestamp(t.value, offset));
    let total = leg.duration.as_ref().map(|d| d.value);
    // out-of-range durations fall back to the reported arrival
    let arrival = departure
        .zip(total)
        .and_then(|(dep, secs)| dep.checked_add_signed(TimeDelta::try_seconds(secs)?))
        .or_else(|| {
            leg.arrival_time
                .as_ref()
                .and_then(|t| timestamp(t.value, offset))
        });

    let n = leg.steps.len();
    leg.steps
        .into_iter()
        .enumerate()
        .map(|(i, step)| RawLeg {
            departure: if i == 0 { departure } else { None },
            arrival: if i + 1 == n { arrival } else { None },
            duration_secs: if n == 1 {
                total
            } else {
                step.duration.as_ref().map(|d| d.value)
            },
            walking: step.is_walking(),
        })
        .collect()
}

/// Maps a directions answer onto a [`PlannerResponse`].
pub(crate) fn classify_directions(
    status: StatusCode,
    body: serde_json::Value,
) -> Result<PlannerResponse> {
    if !status.is_success() {
        let reason = body["error_message"]
            .as_str()
            .or_else(|| body["message"].as_str())
            .map(str::to_string)
            .unwrap_or_else(|| status.to_string());
        return Ok(PlannerResponse::Failed {
            status: status.as_u16(),
            reason,
        });
    }

    let body: DirectionsBody = serde_json::from_value(body)?;
    match body.status.as_str() {
        "OK" => {}
        "ZERO_RESULTS" => return Ok(PlannerResponse::NoJourneys),
        other => {
            return Ok(PlannerResponse::Failed {
                status: status.as_u16(),
                reason: body.error_message.unwrap_or_else(|| other.to_string()),
            });
        }
    }

    let Some(route) = body.routes.into_iter().next() else {
        return Ok(PlannerResponse::NoJourneys);
    };
    let offset = reference_offset()?;
    Ok(PlannerResponse::Journey(
        route
            .legs
            .into_iter()
            .next()
            .map(|leg| leg_to_raw(leg, offset))
            .unwrap_or_default(),
    ))
}

#[async_trait]
impl<C: HttpClient> JourneyPlanner for GoogleDirectionsClient<C> {
    async fn plan(
        &self,
        origin: &Endpoint,
        destination: &Endpoint,
        departure: DateTime<FixedOffset>,
    ) -> Result<PlannerResponse> {
        let url = Url::parse_with_params(
            &self.base_url,
            &[
                ("origin", origin.coord.to_query()),
                ("destination", destination.coord.to_query()),
                ("mode", "transit".to_string()),
                ("units", "metric".to_string()),
                ("departure_time", departure.timestamp().to_string()),
            ],
        )?;
        debug!(%url, "Requesting directions");

        let (status, body) = get_json(&self.http, url).await?;
        classify_directions(status, body)
    }
}
