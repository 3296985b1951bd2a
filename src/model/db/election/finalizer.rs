use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Duration, FixedOffset, Utc};
use mongodb::{bson::doc, error::Error as DbError, Client, Database};
use rocket::{
    fairing::{Fairing, Info, Kind},
    futures::{
        future::{BoxFuture, FutureExt},
        TryStreamExt,
    },
    tokio::sync::Mutex,
    Build, Rocket,
};

use crate::{
    config::Config,
    error::Error,
    model::{
        common::{
            day::{civil_day, day_end},
            ElectionState,
        },
        db::election::{close_election, Election},
        mongodb::{Coll, Id},
    },
    scheduled_task::ScheduledTask,
};

/// Map from election IDs to finalizer tasks.
type TaskMap = HashMap<Id, ScheduledTask<Result<(), Error>>>;

/// Election finalizers: scheduled tasks that close each election when its
/// polling day runs out.
///
/// The voting core itself never closes anything on its own; these tasks are
/// just an automated caller of [`close_election`], on equal footing with an
/// administrator's "end now" request.
pub struct ElectionFinalizers {
    tasks: Arc<Mutex<TaskMap>>,
}

impl ElectionFinalizers {
    /// Create an empty set of election finalizers.
    pub fn new() -> Self {
        Self {
            tasks: Default::default(),
        }
    }

    /// Does the given election have a finalizer scheduled?
    pub async fn has_finalizer(&self, election_id: Id) -> bool {
        self.tasks.lock().await.contains_key(&election_id)
    }

    /// Schedule a finalizer for every election not yet in a terminal state.
    pub async fn schedule_elections(
        &self,
        db_client: &Client,
        db: &Database,
        offset: FixedOffset,
    ) -> Result<(), DbError> {
        let filter = doc! {
            "$or": [{"state": ElectionState::Scheduled}, {"state": ElectionState::Active}],
        };
        let open_elections: Vec<_> = Coll::<Election>::from_db(db)
            .find(filter, None)
            .await?
            .try_collect()
            .await?;
        for election in open_elections {
            self.schedule_election(db_client.clone(), db.clone(), &election, offset)
                .await;
        }

        Ok(())
    }

    /// Schedule a finalizer for the given election at the end of its polling
    /// day. If one already exists, it is rescheduled.
    pub async fn schedule_election(
        &self,
        db_client: Client,
        db: Database,
        election: &Election,
        offset: FixedOffset,
    ) {
        let close_at = day_end(civil_day(election.metadata.end_date, offset), offset);
        let finalizer = Self::finalizer(db_client, db, election.id, self.tasks.clone());

        let mut tasks_locked = self.tasks.lock().await;
        if let Some(task) = tasks_locked.remove(&election.id) {
            task.cancel().await;
        }
        tasks_locked.insert(election.id, ScheduledTask::new(finalizer, close_at));
    }

    /// Drop the pending finalizer for the given election, if any. Used when
    /// an election is cancelled, deleted, or closed by hand.
    pub async fn cancel_election(&self, election_id: Id) {
        let task = self.tasks.lock().await.remove(&election_id);
        if let Some(task) = task {
            task.cancel().await;
        }
    }

    /// The finalizer itself: close the election and publish its result.
    /// Since this is a recursive async function, we must use `BoxFuture` to
    /// avoid an infinitely-recursive state machine.
    fn finalizer(
        db_client: Client,
        db: Database,
        election_id: Id,
        tasks: Arc<Mutex<TaskMap>>,
    ) -> BoxFuture<'static, Result<(), Error>> {
        async move {
            debug!("Running finalizer for election {election_id}");
            let result = close_election(&db_client, &db, election_id, None)
                .await
                .map(|_| ());
            match result {
                Ok(()) => {
                    tasks.lock().await.remove(&election_id);
                    trace!("Finalizer completed; removed self from list");
                }
                Err(ref e) => {
                    error!("Finalizer for election {election_id} failed: {e}");
                    // Closing left no partial state, so simply try again later.
                    const RETRY_INTERVAL_SECONDS: i64 = 300;
                    let retry = Self::finalizer(db_client, db, election_id, tasks.clone());
                    let retry_time = Utc::now() + Duration::seconds(RETRY_INTERVAL_SECONDS);
                    let mut tasks_locked = tasks.lock().await;
                    tasks_locked.insert(election_id, ScheduledTask::new(retry, retry_time));
                    warn!("Failed finalizer will be retried in {RETRY_INTERVAL_SECONDS} seconds");
                }
            }
            result
        }
        .boxed()
    }
}

impl Default for ElectionFinalizers {
    fn default() -> Self {
        Self::new()
    }
}

/// A fairing that schedules finalizers for all applicable elections during
/// Rocket ignition, and places an `ElectionFinalizers` into managed state.
/// This fairing depends on the database being available in managed state,
/// and so must be attached after the fairing responsible for that.
pub struct ElectionFinalizerFairing;

#[rocket::async_trait]
impl Fairing for ElectionFinalizerFairing {
    fn info(&self) -> Info {
        Info {
            name: "Election Finalizers",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        info!("Scheduling election finalizers...");
        let election_finalizers = ElectionFinalizers::new();
        let (db_client, db, config) = match (
            rocket.state::<Client>(),
            rocket.state::<Database>(),
            rocket.state::<Config>(),
        ) {
            (Some(db_client), Some(db), Some(config)) => (db_client, db, config),
            _ => {
                error!("Database or config was not available when scheduling finalizers");
                return Err(rocket);
            }
        };
        if let Err(e) = election_finalizers
            .schedule_elections(db_client, db, config.region_offset())
            .await
        {
            error!("Failed to schedule election finalizers: {e}");
            return Err(rocket);
        }
        info!("...election finalizers scheduled!");

        // Manage the state.
        rocket = rocket.manage(election_finalizers);
        Ok(rocket)
    }
}
