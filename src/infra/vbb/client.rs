use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use reqwest::{StatusCode, Url};
use tracing::debug;

use super::types::{ErrorBody, JourneysBody, StationsBody};
use crate::fetch::{HttpClient, get_json};
use crate::services::journey_api::{
    Endpoint, JourneyPlanner, PlannerResponse, RawLeg, StationHit, StopLookup,
};

pub const DEFAULT_BASE_URL: &str = "https://v5.vbb.transport.rest";

/// Failure message the provider returns for an unknown stop identifier.
pub const STOP_NOT_FOUND: &str = "location/stop not found";

/// transport.rest client. Pacing is the job of the wrapped [`HttpClient`].
pub struct VbbClient<C> {
    http: C,
    base_url: String,
}

impl<C: HttpClient> VbbClient<C> {
    pub fn new(http: C, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str, params: &[(&str, String)]) -> Result<Url> {
        let raw = format!("{}/{}", self.base_url, path);
        let url = if params.is_empty() {
            Url::parse(&raw)?
        } else {
            Url::parse_with_params(&raw, params)?
        };
        Ok(url)
    }
}

/// Query parameters of a journey request. A single result with minimal
/// detail keeps responses small.
fn journey_params(origin: &str, destination: &str, departure: i64) -> Vec<(&'static str, String)> {
    vec![
        ("from", origin.to_string()),
        ("to", destination.to_string()),
        ("departure", departure.to_string()),
        ("results", "1".to_string()),
        ("transfers", "3".to_string()),
        ("startWithWalking", "false".to_string()),
        ("subStops", "false".to_string()),
        ("entrances", "false".to_string()),
        ("remarks", "false".to_string()),
    ]
}

/// Maps a `/journeys` answer onto a [`PlannerResponse`].
pub(crate) fn classify_journeys(
    status: StatusCode,
    body: serde_json::Value,
) -> Result<PlannerResponse> {
    if !status.is_success() {
        let err: ErrorBody = serde_json::from_value(body)?;
        let reason = err.message.unwrap_or_else(|| status.to_string());
        if reason == STOP_NOT_FOUND {
            return Ok(PlannerResponse::UnknownStop { reason });
        }
        return Ok(PlannerResponse::Failed {
            status: status.as_u16(),
            reason,
        });
    }

    let body: JourneysBody = serde_json::from_value(body)?;
    Ok(match body.journeys.into_iter().next() {
        None => PlannerResponse::NoJourneys,
        Some(journey) => {
            PlannerResponse::Journey(journey.legs.into_iter().map(RawLeg::from).collect())
        }
    })
}

#[async_trait]
impl<C: HttpClient> JourneyPlanner for VbbClient<C> {
    async fn plan(
        &self,
        origin: &Endpoint,
        destination: &Endpoint,
        departure: DateTime<FixedOffset>,
    ) -> Result<PlannerResponse> {
        let url = self.url(
            "journeys",
            &journey_params(&origin.id, &destination.id, departure.timestamp()),
        )?;
        debug!(%url, "Requesting journeys");

        let (status, body) = get_json(&self.http, url).await?;
        classify_journeys(status, body)
    }
}

#[async_trait]
impl<C: HttpClient> StopLookup for VbbClient<C> {
    async fn stop_exists(&self, id: &str) -> Result<bool> {
        let url = self.url(&format!("stops/{}", urlencoding::encode(id)), &[])?;
        let req = reqwest::Request::new(reqwest::Method::GET, url);
        let resp = self.http.execute(req).await?;
        Ok(resp.status().is_success())
    }

    async fn search_stations(&self, query: &str) -> Result<Vec<StationHit>> {
        let url = self.url("stations", &[("query", query.to_string())])?;
        let (status, body) = get_json(&self.http, url).await?;

        if !status.is_success() {
            anyhow::bail!("station search for '{query}' failed with HTTP {status}");
        }

        let stations: StationsBody = serde_json::from_value(body)?;
        Ok(stations.into_hits())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::testing::StubClient;
    use crate::model::Coord;

    fn endpoint(id: &str) -> Endpoint {
        Endpoint {
            id: id.to_string(),
            name: id.to_string(),
            coord: Coord(0.0, 0.0),
        }
    }

    fn departure() -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339("2023-02-08T08:00:00+01:00").unwrap()
    }

    #[tokio::test]
    async fn test_journey_request_parameters() {
        let stub = StubClient::new();
        stub.push(200, r#"{"journeys":[]}"#);
        let client = VbbClient::new(stub.clone(), "https://vbb.example/");

        let resp = client
            .plan(&endpoint("900220071"), &endpoint("900230999"), departure())
            .await
            .unwrap();

        assert_eq!(resp, PlannerResponse::NoJourneys);
        assert_eq!(
            stub.requested_urls(),
            vec![
                "https://vbb.example/journeys?from=900220071&to=900230999&departure=1675839600\
                 &results=1&transfers=3&startWithWalking=false&subStops=false&entrances=false&remarks=false"
            ]
        );
    }

    #[tokio::test]
    async fn test_journey_legs_parsed() {
        let stub = StubClient::new();
        stub.push(
            200,
            r#"{"journeys":[{"legs":[
                {"plannedDeparture":"2023-02-08T08:04:00+01:00","plannedArrival":"2023-02-08T08:10:00+01:00","walking":true},
                {"plannedDeparture":"2023-02-08T08:12:00+01:00","plannedArrival":"2023-02-08T08:40:00+01:00","line":{"name":"RE1"}}
            ]}]}"#,
        );
        let client = VbbClient::new(stub, DEFAULT_BASE_URL);

        let resp = client
            .plan(&endpoint("1"), &endpoint("2"), departure())
            .await
            .unwrap();

        let legs = match resp {
            PlannerResponse::Journey(legs) => legs,
            other => panic!("expected a journey, got {other:?}"),
        };
        assert_eq!(legs.len(), 2);
        assert!(legs[0].walking);
        assert!(!legs[1].walking);
        assert_eq!(
            legs[1].arrival.unwrap().to_rfc3339(),
            "2023-02-08T08:40:00+01:00"
        );
    }

    #[test]
    fn test_unknown_stop_is_distinguished() {
        let resp = classify_journeys(
            StatusCode::NOT_FOUND,
            serde_json::json!({"message": "location/stop not found"}),
        )
        .unwrap();
        assert!(matches!(resp, PlannerResponse::UnknownStop { .. }));

        let resp = classify_journeys(
            StatusCode::BAD_GATEWAY,
            serde_json::json!({"message": "HAFAS error"}),
        )
        .unwrap();
        assert_eq!(
            resp,
            PlannerResponse::Failed {
                status: 502,
                reason: "HAFAS error".into()
            }
        );
    }

    #[test]
    fn test_journey_without_legs() {
        let resp =
            classify_journeys(StatusCode::OK, serde_json::json!({"journeys":[{"legs":[]}]}))
                .unwrap();
        assert_eq!(resp, PlannerResponse::Journey(vec![]));
    }

    #[tokio::test]
    async fn test_stop_exists_by_status() {
        let stub = StubClient::new();
        stub.push(200, r#"{"id":"900220071"}"#);
        stub.push(404, r#"{"message":"not found"}"#);
        let client = VbbClient::new(stub.clone(), "https://vbb.example");

        assert!(client.stop_exists("900220071").await.unwrap());
        assert!(!client.stop_exists("de:12:x").await.unwrap());
        assert_eq!(stub.requested_urls()[1], "https://vbb.example/stops/de%3A12%3Ax");
    }

    #[tokio::test]
    async fn test_search_accepts_keyed_object() {
        let stub = StubClient::new();
        stub.push(
            200,
            r#"{"900100001":{"id":"900100001","name":"S+U Friedrichstr.","score":12.5},
                "900100002":{"id":"900100002","name":"Friedrichstr./Mitte","score":3.0}}"#,
        );
        let client = VbbClient::new(stub.clone(), "https://vbb.example");

        let hits = client.search_stations("Friedrichstraße").await.unwrap();

        assert_eq!(hits.len(), 2);
        assert!(hits.iter().any(|h| h.id == "900100001" && h.score == 12.5));
        assert_eq!(
            stub.requested_urls()[0],
            "https://vbb.example/stations?query=Friedrichstra%C3%9Fe"
        );
    }
}
