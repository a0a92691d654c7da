//! Traits and normalized types for journey-planning providers.

use anyhow::Result;
use chrono::{DateTime, FixedOffset};

use crate::model::Coord;

/// One end of a journey query. Identifier-based providers read `id`,
/// coordinate-based ones read `coord`.
#[derive(Debug, Clone, PartialEq)]
pub struct Endpoint {
    pub id: String,
    pub name: String,
    pub coord: Coord,
}

/// One journey segment as reported by a provider, reduced to what the
/// travel-window filter needs.
#[derive(Debug, Clone, PartialEq)]
pub struct RawLeg {
    pub departure: Option<DateTime<FixedOffset>>,
    pub arrival: Option<DateTime<FixedOffset>>,
    /// Provider-reported duration, when it reports one directly.
    pub duration_secs: Option<i64>,
    pub walking: bool,
}

impl RawLeg {
    /// Duration reported by the provider, else arrival minus departure.
    pub fn duration(&self) -> Option<i64> {
        self.duration_secs.or_else(|| {
            let (dep, arr) = (self.departure?, self.arrival?);
            Some((arr - dep).num_seconds())
        })
    }
}

/// Provider answer to one journey request.
#[derive(Debug, Clone, PartialEq)]
pub enum PlannerResponse {
    /// Legs of the first journey found; may be empty.
    Journey(Vec<RawLeg>),
    NoJourneys,
    /// The provider did not recognize the origin or destination identifier.
    UnknownStop { reason: String },
    Failed { status: u16, reason: String },
}

#[async_trait::async_trait]
pub trait JourneyPlanner: Send + Sync {
    /// Requests the earliest journey departing at `departure`.
    async fn plan(
        &self,
        origin: &Endpoint,
        destination: &Endpoint,
        departure: DateTime<FixedOffset>,
    ) -> Result<PlannerResponse>;
}

/// A candidate from a name-based station search.
#[derive(Debug, Clone, PartialEq)]
pub struct StationHit {
    pub id: String,
    pub name: String,
    pub score: f64,
}

/// Stop identifier lookups offered by identifier-based providers.
#[async_trait::async_trait]
pub trait StopLookup: Send + Sync {
    /// Whether the provider knows a stop under this identifier.
    async fn stop_exists(&self, id: &str) -> Result<bool>;

    /// Stations matching a free-text name, in provider order.
    async fn search_stations(&self, query: &str) -> Result<Vec<StationHit>>;
}
