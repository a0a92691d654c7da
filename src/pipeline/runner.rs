//! A journey pass: one provider, one day type and time band, every stop of
//! the previous stage.

use anyhow::Result;
use std::path::PathBuf;
use tracing::{debug, error, info, warn};

use super::executor::{JourneyQueryExecutor, JourneyResult};
use super::filter::TravelWindowFilter;
use super::resolver::Resolution;
use super::resume::{RecordSource, ResultStore};
use crate::config::{Provider, RunSlot};
use crate::input::load_nearby_centres;
use crate::model::{CityCentre, ConnectionRecord, StopTravelRecord};
use crate::services::journey_api::Endpoint;

/// What one origin/destination attempt amounted to.
#[derive(Debug, Clone, PartialEq)]
pub enum AttemptOutcome {
    Connected(ConnectionRecord),
    /// The provider answered, but with nothing usable.
    Rejected(String),
    /// The attempt could not be carried out.
    Skipped(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub stops: usize,
    pub reused: usize,
    pub queried: usize,
    pub connections_added: usize,
    pub rejected: usize,
    pub skipped: usize,
    pub failed_stops: usize,
    /// Requests issued through the governor, filled in by the caller.
    pub requests: u64,
}

pub struct JourneyPass {
    provider: Provider,
    slot: RunSlot,
    store: ResultStore,
    nearby_dir: PathBuf,
    executor: JourneyQueryExecutor,
    filter: TravelWindowFilter,
}

impl JourneyPass {
    pub fn new(
        provider: Provider,
        slot: RunSlot,
        store: ResultStore,
        nearby_dir: impl Into<PathBuf>,
        executor: JourneyQueryExecutor,
    ) -> Result<Self> {
        Ok(Self {
            provider,
            slot,
            store,
            nearby_dir: nearby_dir.into(),
            executor,
            filter: TravelWindowFilter::new(slot.window(provider)?),
        })
    }

    /// Processes every pending stop. Only a failure to list the input aborts
    /// the pass; a failing stop is logged and skipped.
    #[tracing::instrument(skip(self), fields(provider = ?self.provider, slot = %self.slot))]
    pub async fn run(&mut self) -> Result<RunSummary> {
        let files = self.store.pending_files()?;
        let total = files.len();
        let mut summary = RunSummary::default();
        info!(total, "Starting journey pass");

        for (i, file_name) in files.iter().enumerate() {
            summary.stops += 1;
            if let Err(e) = self.process_stop(i + 1, total, file_name, &mut summary).await {
                error!(file = %file_name, error = %e, "Stop failed, skipping");
                summary.failed_stops += 1;
            }
        }

        Ok(summary)
    }

    async fn process_stop(
        &mut self,
        index: usize,
        total: usize,
        file_name: &str,
        summary: &mut RunSummary,
    ) -> Result<()> {
        let key = file_name.trim_end_matches(".json");
        let (mut record, source) = self.store.working_record(file_name)?;

        let centres = load_nearby_centres(
            &self.nearby_dir.join(format!("{key}.csv")),
            self.provider.destinations_per_stop(),
        )?;

        let centres = match centres {
            Some(centres) if !self.store.should_reuse_existing(&record) => centres,
            _ => {
                debug!(stop = %record.stop_info.name, ?source, "Not dead, reusing record");
                summary.reused += 1;
                return self.store.persist(key, &record);
            }
        };

        if source == RecordSource::Resumed {
            info!(stop = %record.stop_info.name, "Retrying dead stop from earlier run");
        }
        summary.queried += 1;

        let connections = match self.origin(&record).await {
            Some(mut origin) => {
                self.query_centres(index, total, &mut origin, &centres, summary)
                    .await
            }
            None => {
                summary.skipped += 1;
                Vec::new()
            }
        };

        summary.connections_added += connections.len();
        record.travel_times.replace_slot(self.slot, connections);
        self.store.persist(key, &record)
    }

    /// Origin endpoint of a stop, or `None` when no provider id can be found.
    async fn origin(&mut self, record: &StopTravelRecord) -> Option<Endpoint> {
        let stop = &record.stop_info;
        match self.executor.resolve(&stop.id, &stop.name).await {
            Ok(Resolution::Resolved(id)) => Some(Endpoint {
                id,
                name: stop.name.clone(),
                coord: stop.coord,
            }),
            Ok(Resolution::NotFound) => {
                warn!(stop = %stop.name, "No provider id for stop");
                None
            }
            Err(e) => {
                warn!(stop = %stop.name, error = %e, "Resolving stop failed");
                None
            }
        }
    }

    async fn query_centres(
        &mut self,
        index: usize,
        total: usize,
        origin: &mut Endpoint,
        centres: &[CityCentre],
        summary: &mut RunSummary,
    ) -> Vec<ConnectionRecord> {
        let mut connections = Vec::new();

        for centre in centres {
            info!("{index} / {total} {} -> {}", origin.name, centre.stop_name);

            match self.attempt(origin, centre).await {
                AttemptOutcome::Connected(connection) => {
                    debug!(
                        to = %centre.stop_name,
                        time = connection.duration_seconds,
                        trans = connection.transfer_count,
                        "Connection found"
                    );
                    connections.push(connection);
                }
                AttemptOutcome::Rejected(reason) => {
                    info!(from = %origin.name, to = %centre.stop_name, %reason, "Rejected");
                    summary.rejected += 1;
                }
                AttemptOutcome::Skipped(reason) => {
                    warn!(from = %origin.name, to = %centre.stop_name, %reason, "Skipped");
                    summary.skipped += 1;
                }
            }
        }

        connections
    }

    /// Error boundary of one attempt: nothing inside may abort the stop.
    async fn attempt(&mut self, origin: &mut Endpoint, centre: &CityCentre) -> AttemptOutcome {
        match self.try_attempt(origin, centre).await {
            Ok(outcome) => outcome,
            Err(e) => AttemptOutcome::Skipped(format!("{e:#}")),
        }
    }

    async fn try_attempt(
        &mut self,
        origin: &mut Endpoint,
        centre: &CityCentre,
    ) -> Result<AttemptOutcome> {
        let destination = match self
            .executor
            .resolve(&centre.stop_id, &centre.stop_name)
            .await?
        {
            Resolution::Resolved(id) => Endpoint {
                id,
                name: centre.stop_name.clone(),
                coord: centre.coord(),
            },
            Resolution::NotFound => {
                return Ok(AttemptOutcome::Skipped(format!(
                    "no provider id for {}",
                    centre.stop_name
                )));
            }
        };

        let outcome = self
            .executor
            .query(origin, &destination, self.filter.window().departure())
            .await?;
        // a repaired origin id stays valid for the remaining centres
        origin.id = outcome.origin_id;

        Ok(match outcome.result {
            JourneyResult::Accepted(legs) => match self.filter.evaluate(&legs, centre) {
                Ok(connection) => AttemptOutcome::Connected(connection),
                Err(rejection) => AttemptOutcome::Rejected(rejection.to_string()),
            },
            JourneyResult::RejectedProviderError(reason) => AttemptOutcome::Rejected(reason),
            JourneyResult::RejectedNoJourneys => AttemptOutcome::Rejected("no journeys".into()),
            JourneyResult::RejectedNoLegs => AttemptOutcome::Rejected("no legs".into()),
            JourneyResult::Unresolved { stop } => {
                AttemptOutcome::Skipped(format!("could not resolve {stop}"))
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DayType, TimeBand};
    use crate::input::load_record;
    use crate::model::{Coord, StopRecord};
    use crate::output::write_json_atomic;
    use crate::pipeline::executor::tests::ScriptedPlanner;
    use crate::pipeline::resolver::StopIdentifierResolver;
    use crate::pipeline::resolver::tests::{FakeLookup, hit};
    use crate::services::journey_api::{PlannerResponse, RawLeg};
    use chrono::DateTime;
    use std::fs;
    use std::sync::Arc;
    use tempfile::TempDir;

    const CENTRES: &str = "stop_id,stop_name,stop_lat,stop_lon,distance\n\
        de:12054:900230998,Potsdam Rathaus,52.40,13.06,9000.5\n\
        de:12054:900230999,S Potsdam Hauptbahnhof,52.39,13.06,8000.0\n";

    const GOOGLE_CENTRES: &str = "stop_id,stop_name,stop_lat,stop_lon,distance\n\
        de:12054:900230998,Potsdam Rathaus,52.40,13.06,9000.5\n\
        de:12069:900220249,Werder (Havel) Markt,52.38,12.93,4100.0\n\
        de:12054:900230999,S Potsdam Hauptbahnhof,52.39,13.06,8000.0\n";

    fn slot() -> RunSlot {
        RunSlot::new(DayType::Weekday, TimeBand::Day)
    }

    fn stop(name: &str) -> StopTravelRecord {
        StopTravelRecord::new(StopRecord {
            id: "de:12069:900220071".into(),
            name: name.into(),
            municipality: "Schwielowsee".into(),
            coord: Coord(52.33, 12.96),
        })
    }

    fn connection() -> ConnectionRecord {
        ConnectionRecord {
            destination_id: "x".into(),
            destination_name: "Werder (Havel), Markt".into(),
            duration_seconds: 900.0,
            transfer_count: 0,
            destination_coord: Coord(52.38, 12.93),
            is_walking_only: false,
        }
    }

    fn transit(dep: &str, arr: &str) -> RawLeg {
        RawLeg {
            departure: Some(DateTime::parse_from_rfc3339(dep).unwrap()),
            arrival: Some(DateTime::parse_from_rfc3339(arr).unwrap()),
            duration_secs: None,
            walking: false,
        }
    }

    struct Fixture {
        tmp: TempDir,
    }

    impl Fixture {
        fn new() -> Self {
            let tmp = TempDir::new().unwrap();
            for dir in ["in", "out", "nearby"] {
                fs::create_dir_all(tmp.path().join(dir)).unwrap();
            }
            Self { tmp }
        }

        fn input(&self, key: &str, record: &StopTravelRecord) {
            write_json_atomic(&self.tmp.path().join(format!("in/{key}.json")), record).unwrap();
        }

        fn output(&self, key: &str) -> StopTravelRecord {
            load_record(&self.tmp.path().join(format!("out/{key}.json"))).unwrap()
        }

        fn nearby(&self, key: &str) {
            fs::write(self.tmp.path().join(format!("nearby/{key}.csv")), CENTRES).unwrap();
        }

        fn google_pass(&self, planner: Arc<ScriptedPlanner>, slot: RunSlot) -> JourneyPass {
            let store =
                ResultStore::new(self.tmp.path().join("in"), self.tmp.path().join("out")).unwrap();
            JourneyPass::new(
                Provider::Google,
                slot,
                store,
                self.tmp.path().join("nearby"),
                JourneyQueryExecutor::without_resolver(planner),
            )
            .unwrap()
        }

        fn pass(&self, planner: Arc<ScriptedPlanner>, lookup: FakeLookup) -> JourneyPass {
            let store =
                ResultStore::new(self.tmp.path().join("in"), self.tmp.path().join("out")).unwrap();
            let executor = JourneyQueryExecutor::with_resolver(
                planner,
                StopIdentifierResolver::new(Arc::new(lookup)),
            );
            JourneyPass::new(
                Provider::Vbb,
                slot(),
                store,
                self.tmp.path().join("nearby"),
                executor,
            )
            .unwrap()
        }
    }

    #[tokio::test]
    async fn test_dead_stop_gets_connections_nearest_centre_first() {
        let fx = Fixture::new();
        fx.input("Caputh", &stop("Caputh"));
        fx.nearby("Caputh");
        let planner = Arc::new(ScriptedPlanner::new(vec![
            Ok(PlannerResponse::Journey(vec![transit(
                "2023-02-08T08:10:00+01:00",
                "2023-02-08T08:40:00+01:00",
            )])),
            Ok(PlannerResponse::NoJourneys),
        ]));

        let summary = fx.pass(planner.clone(), FakeLookup::default()).run().await.unwrap();

        assert_eq!(
            planner.calls(),
            vec![
                ("900220071".to_string(), "900230999".to_string()),
                ("900220071".to_string(), "900230998".to_string()),
            ]
        );
        let out = fx.output("Caputh");
        let slot = out.travel_times.slot(slot());
        assert_eq!(slot.len(), 1);
        assert_eq!(slot[0].destination_name, "S Potsdam Hauptbahnhof");
        assert_eq!(slot[0].duration_seconds, 1800.0);
        assert_eq!(summary.queried, 1);
        assert_eq!(summary.connections_added, 1);
        assert_eq!(summary.rejected, 1);
    }

    #[tokio::test]
    async fn test_resumed_reachable_stop_is_not_queried() {
        let fx = Fixture::new();
        fx.input("Caputh", &stop("Caputh"));
        fx.nearby("Caputh");
        let mut done = stop("Caputh");
        done.travel_times
            .replace_slot(RunSlot::new(DayType::Sunday, TimeBand::Night), vec![connection()]);
        write_json_atomic(&fx.tmp.path().join("out/Caputh.json"), &done).unwrap();
        let planner = Arc::new(ScriptedPlanner::default());

        let summary = fx.pass(planner.clone(), FakeLookup::default()).run().await.unwrap();

        assert!(planner.calls().is_empty());
        assert_eq!(fx.output("Caputh"), done);
        assert_eq!(summary.reused, 1);
        assert_eq!(summary.queried, 0);
    }

    #[tokio::test]
    async fn test_dead_resumed_stop_slot_holds_only_fresh_attempt() {
        let fx = Fixture::new();
        fx.input("Caputh", &stop("Caputh"));
        fx.nearby("Caputh");
        let mut dead = stop("Caputh");
        dead.stop_info.municipality = "resumed".into();
        write_json_atomic(&fx.tmp.path().join("out/Caputh.json"), &dead).unwrap();
        let planner = Arc::new(ScriptedPlanner::new(vec![
            Ok(PlannerResponse::NoJourneys),
            Ok(PlannerResponse::Journey(vec![transit(
                "2023-02-08T09:00:00+01:00",
                "2023-02-08T09:45:00+01:00",
            )])),
        ]));

        let summary = fx.pass(planner.clone(), FakeLookup::default()).run().await.unwrap();

        assert_eq!(planner.calls().len(), 2);
        let out = fx.output("Caputh");
        assert_eq!(out.stop_info.municipality, "resumed");
        let slot = out.travel_times.slot(slot());
        assert_eq!(slot.len(), 1);
        assert_eq!(slot[0].destination_name, "Potsdam Rathaus");
        assert_eq!(slot[0].duration_seconds, 2700.0);
        assert_eq!(out.travel_times.connection_count(), 1);
        assert_eq!(summary.queried, 1);
        assert_eq!(summary.reused, 0);
    }

    #[tokio::test]
    async fn test_google_pass_queries_nearest_centre_by_coordinates() {
        let fx = Fixture::new();
        fx.input("Caputh", &stop("Caputh"));
        fs::write(fx.tmp.path().join("nearby/Caputh.csv"), GOOGLE_CENTRES).unwrap();
        let planner = Arc::new(ScriptedPlanner::new(vec![Ok(PlannerResponse::Journey(
            vec![RawLeg {
                departure: None,
                arrival: None,
                duration_secs: Some(840),
                walking: true,
            }],
        ))]));
        let saturday_day = RunSlot::new(DayType::Saturday, TimeBand::Day);

        let summary = fx
            .google_pass(planner.clone(), saturday_day)
            .run()
            .await
            .unwrap();

        let requests = planner.requests();
        assert_eq!(requests.len(), 1);
        let (origin, destination, departure) = &requests[0];
        assert_eq!(origin.coord, Coord(52.33, 12.96));
        assert_eq!(destination.name, "Werder (Havel) Markt");
        assert_eq!(destination.coord, Coord(52.38, 12.93));
        assert_eq!(departure.to_rfc3339(), "2023-02-11T08:00:00+01:00");

        let out = fx.output("Caputh");
        let slot = out.travel_times.slot(saturday_day);
        assert_eq!(slot.len(), 1);
        assert!(slot[0].is_walking_only);
        assert_eq!(slot[0].duration_seconds, 840.0);
        assert_eq!(slot[0].transfer_count, 0);
        assert_eq!(summary.connections_added, 1);

        let raw: serde_json::Value =
            serde_json::from_slice(&fs::read(fx.tmp.path().join("out/Caputh.json")).unwrap())
                .unwrap();
        assert_eq!(raw["travelTimes"]["Samstag"]["Tag"][0]["walking"], true);
    }

    #[tokio::test]
    async fn test_stop_without_ranking_is_copied_unchanged() {
        let fx = Fixture::new();
        fx.input("Ferch", &stop("Ferch"));
        let planner = Arc::new(ScriptedPlanner::default());

        fx.pass(planner.clone(), FakeLookup::default()).run().await.unwrap();

        assert!(planner.calls().is_empty());
        assert_eq!(fx.output("Ferch"), stop("Ferch"));
    }

    #[tokio::test]
    async fn test_repaired_origin_is_reused_for_later_centres() {
        let fx = Fixture::new();
        fx.input("Caputh", &stop("Caputh"));
        fx.nearby("Caputh");
        let planner = Arc::new(ScriptedPlanner::new(vec![
            Ok(PlannerResponse::UnknownStop {
                reason: "location/stop not found".into(),
            }),
            Ok(PlannerResponse::NoJourneys),
            Ok(PlannerResponse::NoJourneys),
        ]));
        let mut lookup = FakeLookup::default();
        lookup.known.push("900230999".into());
        lookup.hits.insert("Caputh".into(), vec![hit("111", 5.0)]);

        fx.pass(planner.clone(), lookup).run().await.unwrap();

        let calls = planner.calls();
        assert_eq!(calls.len(), 3);
        assert_eq!(calls[1], ("111".to_string(), "900230999".to_string()));
        assert_eq!(calls[2], ("111".to_string(), "900230998".to_string()));
    }

    #[tokio::test]
    async fn test_transport_error_skips_only_that_attempt() {
        let fx = Fixture::new();
        fx.input("Caputh", &stop("Caputh"));
        fx.nearby("Caputh");
        let planner = Arc::new(ScriptedPlanner::new(vec![
            Err(anyhow::anyhow!("connection reset")),
            Ok(PlannerResponse::Journey(vec![transit(
                "2023-02-08T19:50:00+01:00",
                "2023-02-08T20:20:00+01:00",
            )])),
        ]));

        let summary = fx.pass(planner.clone(), FakeLookup::default()).run().await.unwrap();

        assert_eq!(planner.calls().len(), 2);
        assert_eq!(summary.skipped, 1);
        let out = fx.output("Caputh");
        assert_eq!(out.travel_times.slot(slot())[0].destination_name, "Potsdam Rathaus");
    }

    #[tokio::test]
    async fn test_broken_stop_file_does_not_stop_the_pass() {
        let fx = Fixture::new();
        fs::write(fx.tmp.path().join("in/Broken.json"), "{not json").unwrap();
        fx.input("Ferch", &stop("Ferch"));
        let planner = Arc::new(ScriptedPlanner::default());

        let summary = fx.pass(planner, FakeLookup::default()).run().await.unwrap();

        assert_eq!(summary.stops, 2);
        assert_eq!(summary.failed_stops, 1);
        assert_eq!(fx.output("Ferch"), stop("Ferch"));
    }
}
