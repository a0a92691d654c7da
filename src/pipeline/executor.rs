//! One origin/destination journey query, with a single identifier repair.

use anyhow::Result;
use chrono::{DateTime, FixedOffset};
use std::sync::Arc;
use tracing::{info, warn};

use super::resolver::{Resolution, StopIdentifierResolver};
use crate::services::journey_api::{Endpoint, JourneyPlanner, PlannerResponse, RawLeg};

#[derive(Debug, Clone, PartialEq)]
pub enum JourneyResult {
    Accepted(Vec<RawLeg>),
    RejectedProviderError(String),
    RejectedNoJourneys,
    RejectedNoLegs,
    /// An identifier was rejected and no replacement could be found for the
    /// named stop.
    Unresolved { stop: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct QueryOutcome {
    pub result: JourneyResult,
    /// Origin identifier the last request used; differs from the input after
    /// a repair.
    pub origin_id: String,
}

/// Position in the retry state machine. A query starts `Initial`; an
/// unrecognized identifier moves it to `Repaired` and any further failure is
/// terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Attempt {
    Initial,
    Repaired,
}

pub struct JourneyQueryExecutor {
    planner: Arc<dyn JourneyPlanner>,
    resolver: Option<StopIdentifierResolver>,
}

impl JourneyQueryExecutor {
    /// Executor for identifier-based providers, able to repair identifiers.
    pub fn with_resolver(planner: Arc<dyn JourneyPlanner>, resolver: StopIdentifierResolver) -> Self {
        Self {
            planner,
            resolver: Some(resolver),
        }
    }

    /// Executor for coordinate-based providers.
    pub fn without_resolver(planner: Arc<dyn JourneyPlanner>) -> Self {
        Self {
            planner,
            resolver: None,
        }
    }

    /// Resolves an upstream stop id into a provider id. Without a resolver
    /// the raw id is passed through.
    pub async fn resolve(&mut self, raw_id: &str, display_name: &str) -> Result<Resolution> {
        match self.resolver.as_mut() {
            Some(resolver) => resolver.resolve(raw_id, display_name).await,
            None => Ok(Resolution::Resolved(raw_id.to_string())),
        }
    }

    pub async fn query(
        &mut self,
        origin: &Endpoint,
        destination: &Endpoint,
        departure: DateTime<FixedOffset>,
    ) -> Result<QueryOutcome> {
        let mut origin = origin.clone();
        let mut destination = destination.clone();
        let mut attempt = Attempt::Initial;

        loop {
            let response = self.planner.plan(&origin, &destination, departure).await?;

            let result = match response {
                PlannerResponse::UnknownStop { reason }
                    if attempt == Attempt::Initial && self.resolver.is_some() =>
                {
                    warn!(
                        from = %origin.name,
                        to = %destination.name,
                        %reason,
                        "Response not ok, repairing stop ids"
                    );
                    match self.repair(&origin, &destination).await? {
                        Ok((origin_id, destination_id)) => {
                            origin.id = origin_id;
                            destination.id = destination_id;
                            attempt = Attempt::Repaired;
                            info!(from = %origin.name, to = %destination.name, "Retry...");
                            continue;
                        }
                        Err(stop) => JourneyResult::Unresolved { stop },
                    }
                }
                PlannerResponse::UnknownStop { reason } => JourneyResult::RejectedProviderError(reason),
                PlannerResponse::Failed { status, reason } => {
                    JourneyResult::RejectedProviderError(format!("HTTP {status}: {reason}"))
                }
                PlannerResponse::NoJourneys => JourneyResult::RejectedNoJourneys,
                PlannerResponse::Journey(legs) if legs.is_empty() => JourneyResult::RejectedNoLegs,
                PlannerResponse::Journey(legs) => JourneyResult::Accepted(legs),
            };

            return Ok(QueryOutcome {
                result,
                origin_id: origin.id,
            });
        }
    }

    /// Repairs both identifiers independently. `Err` names the first stop
    /// that could not be resolved.
    async fn repair(
        &mut self,
        origin: &Endpoint,
        destination: &Endpoint,
    ) -> Result<Result<(String, String), String>> {
        let Some(resolver) = self.resolver.as_mut() else {
            return Ok(Err(origin.name.clone()));
        };

        let origin_id = resolver.repair(&origin.id, &origin.name).await?;
        let destination_id = resolver.repair(&destination.id, &destination.name).await?;

        Ok(match (origin_id, destination_id) {
            (Resolution::Resolved(o), Resolution::Resolved(d)) => Ok((o, d)),
            (Resolution::NotFound, _) => Err(origin.name.clone()),
            (_, Resolution::NotFound) => Err(destination.name.clone()),
        })
    }
}
