use mongodb::bson::doc;
use rocket::{futures::TryStreamExt, serde::json::Json, Route, State};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::model::{
    api::{
        election::{ElectionDescription, ElectionSummary, ElectionsOverview},
        results::ResultDescription,
    },
    common::day,
    db::{election::Election, result::ElectionResult},
    mongodb::{Coll, Id},
};

pub fn routes() -> Vec<Route> {
    routes![elections, election, election_result, results]
}

/// List every election. The states in the response are derived from the
/// polling windows, never the raw stored states, so listings can't flap
/// between servers disagreeing about staleness.
#[get("/elections")]
async fn elections(
    elections: Coll<Election>,
    config: &State<Config>,
) -> Result<Json<ElectionsOverview>> {
    let offset = config.region_offset();
    let today = day::today(offset);

    let all_elections: Vec<Election> = elections.find(None, None).await?.try_collect().await?;
    let summaries = all_elections
        .iter()
        .map(|election| ElectionSummary::from_election(election, today, offset))
        .collect();

    Ok(Json(ElectionsOverview::new(summaries)))
}

#[get("/elections/<election_id>")]
async fn election(
    election_id: Id,
    elections: Coll<Election>,
    config: &State<Config>,
) -> Result<Json<ElectionDescription>> {
    let offset = config.region_offset();
    let election = elections
        .find_one(election_id.as_doc(), None)
        .await?
        .ok_or_else(|| Error::not_found(format!("Election {}", election_id)))?;
    Ok(Json(ElectionDescription::from_election(
        election,
        day::today(offset),
        offset,
    )))
}

#[get("/elections/<election_id>/result")]
async fn election_result(
    election_id: Id,
    results: Coll<ElectionResult>,
) -> Result<Json<ResultDescription>> {
    let result = results
        .find_one(doc! {"election_id": election_id}, None)
        .await?
        .ok_or_else(|| Error::not_found(format!("Result for election {}", election_id)))?;
    Ok(Json(result.into()))
}

#[get("/results")]
async fn results(results: Coll<ElectionResult>) -> Result<Json<Vec<ResultDescription>>> {
    let all_results: Vec<ElectionResult> = results.find(None, None).await?.try_collect().await?;
    Ok(Json(all_results.into_iter().map(Into::into).collect()))
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use mongodb::Database;
    use rocket::{http::Status, local::asynchronous::Client, serde::json::serde_json};

    use crate::model::{
        common::ElectionState,
        db::{
            election::ElectionCore,
            result::{NewElectionResult, VoteBreakdown},
        },
    };

    use super::*;

    #[backend_test]
    async fn listing_derives_states_from_windows(client: Client, db: Database) {
        insert_election(&db, "Future Election", 10, ElectionState::Scheduled).await;
        insert_election(&db, "Open Election", 0, ElectionState::Scheduled).await;
        // Stored state is stale on purpose; the listing must not echo it.
        insert_election(&db, "Past Election", -10, ElectionState::Active).await;
        insert_election(&db, "Cancelled Election", 0, ElectionState::Cancelled).await;

        let response = client.get(uri!(elections)).dispatch().await;
        assert_eq!(Status::Ok, response.status());
        let overview: ElectionsOverview =
            serde_json::from_str(&response.into_string().await.unwrap()).unwrap();

        let state_of = |title: &str| {
            overview
                .elections
                .iter()
                .find(|summary| summary.title == title)
                .unwrap()
                .state
        };
        assert_eq!(state_of("Future Election"), ElectionState::Scheduled);
        assert_eq!(state_of("Open Election"), ElectionState::Active);
        assert_eq!(state_of("Past Election"), ElectionState::Completed);
        assert_eq!(state_of("Cancelled Election"), ElectionState::Cancelled);

        for state in [
            ElectionState::Scheduled,
            ElectionState::Active,
            ElectionState::Completed,
            ElectionState::Cancelled,
        ] {
            assert_eq!(overview.state_counts.get(&state), Some(&1), "{state:?}");
        }
    }

    #[backend_test]
    async fn description_includes_snapshot_sizes(client: Client, db: Database) {
        let eligible_voters = vec![Id::new(), Id::new(), Id::new()];
        let candidates = vec![Id::new(), Id::new()];
        let mut core = ElectionCore::example_with(candidates.clone(), eligible_voters);
        core.metadata.title = "Detail Election".to_string();
        let id: Id = Coll::<ElectionCore>::from_db(&db)
            .insert_one(&core, None)
            .await
            .unwrap()
            .inserted_id
            .as_object_id()
            .unwrap()
            .into();

        let response = client.get(uri!(election(id))).dispatch().await;
        assert_eq!(Status::Ok, response.status());
        let description: ElectionDescription =
            serde_json::from_str(&response.into_string().await.unwrap()).unwrap();
        assert_eq!(description.title, "Detail Election");
        assert_eq!(description.state, ElectionState::Active);
        assert_eq!(description.candidates, candidates);
        assert_eq!(description.eligible_voter_count, 3);

        // Unknown elections are a clean 404.
        let response = client.get(uri!(election(Id::new()))).dispatch().await;
        assert_eq!(Status::NotFound, response.status());
    }

    #[backend_test]
    async fn results_are_served_read_only(client: Client, db: Database) {
        let election_id = Id::new();
        let winner = Id::new();
        let published = NewElectionResult {
            election_id,
            total_votes: 3,
            turnout_percentage: 75.0,
            winners: vec![winner],
            vote_breakdown: vec![
                VoteBreakdown {
                    candidate_id: winner,
                    votes: 2,
                    percentage: 66.7,
                },
                VoteBreakdown {
                    candidate_id: Id::new(),
                    votes: 1,
                    percentage: 33.3,
                },
            ],
            is_tie: false,
            published_at: Utc::now(),
            published_by: None,
        };
        Coll::<NewElectionResult>::from_db(&db)
            .insert_one(&published, None)
            .await
            .unwrap();

        let response = client
            .get(uri!(election_result(election_id)))
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());
        let fetched: ResultDescription =
            serde_json::from_str(&response.into_string().await.unwrap()).unwrap();
        assert_eq!(fetched.total_votes, 3);
        assert_eq!(fetched.winners, vec![winner]);

        let response = client.get(uri!(results)).dispatch().await;
        assert_eq!(Status::Ok, response.status());
        let all: Vec<ResultDescription> =
            serde_json::from_str(&response.into_string().await.unwrap()).unwrap();
        assert_eq!(all.len(), 1);

        // No result yet for an unknown election.
        let response = client
            .get(uri!(election_result(Id::new())))
            .dispatch()
            .await;
        assert_eq!(Status::NotFound, response.status());
    }

    /// Insert an election whose polling day starts `day_offset` days from
    /// now, with the given stored state.
    async fn insert_election(db: &Database, title: &str, day_offset: i64, state: ElectionState) {
        let mut core = ElectionCore::example_with(vec![Id::new(), Id::new()], vec![Id::new()]);
        core.metadata.title = title.to_string();
        core.metadata.state = state;
        core.metadata.start_date = Utc::now() + Duration::days(day_offset);
        core.metadata.end_date = core.metadata.start_date + Duration::days(1);
        Coll::<ElectionCore>::from_db(db)
            .insert_one(&core, None)
            .await
            .unwrap();
    }
}
