use std::collections::HashMap;

use aws_sdk_sns::Client as SnsClient;
use mongodb::{
    bson::doc,
    options::{Collation, CollationStrength, FindOneOptions},
    Client, Database,
};
use rocket::{futures::TryStreamExt, serde::json::Json, Route, State};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::model::{
    api::{
        auth::{Admin, AuthToken},
        election::{ElectionDescription, ElectionSpec},
        notification::Notice,
        results::ResultDescription,
    },
    common::{day, ElectionState},
    db::{
        candidate::Candidate,
        election::{close_election, Election, ElectionFinalizers, NewElection},
        result::ElectionResult,
        totals::{CandidateTotals, NewCandidateTotals},
        vote::Vote,
        voter::Voter,
    },
    mongodb::{Coll, Id},
};

pub fn routes() -> Vec<Route> {
    routes![
        create_election,
        modify_election,
        cancel_election,
        end_election,
        delete_election,
    ]
}

#[post("/elections", data = "<spec>", format = "json")]
#[allow(clippy::too_many_arguments)]
async fn create_election(
    _token: AuthToken<Admin>,
    spec: Json<ElectionSpec>,
    elections: Coll<Election>,
    new_elections: Coll<NewElection>,
    voters: Coll<Voter>,
    candidates: Coll<Candidate>,
    totals: Coll<NewCandidateTotals>,
    finalizers: &State<ElectionFinalizers>,
    config: &State<Config>,
    db_client: &State<Client>,
    db: &State<Database>,
) -> Result<Json<ElectionDescription>> {
    let offset = config.region_offset();
    let today = day::today(offset);
    spec.validate(today, offset)?;

    ensure_title_free(&elections, spec.title.trim(), None).await?;
    let roster = resolve_candidates(&candidates, &spec.candidates).await?;
    let eligible_voters = eligible_voter_ids(&voters).await?;

    let election = {
        let mut session = db_client.start_session(None).await?;
        session.start_transaction(None).await?;

        // Create and insert the election.
        let election: NewElection = spec.0.into_election(eligible_voters, roster.clone());
        let new_id: Id = new_elections
            .insert_one_with_session(&election, None, &mut session)
            .await?
            .inserted_id
            .as_object_id()
            .unwrap() // Valid because the ID comes directly from the DB
            .into();

        // Seed a zeroed live tally for every roster member.
        let zeroed_totals = roster
            .iter()
            .map(|candidate_id| NewCandidateTotals::new(new_id, *candidate_id))
            .collect::<Vec<_>>();
        totals
            .insert_many_with_session(&zeroed_totals, None, &mut session)
            .await?;

        session.commit_transaction().await?;

        // Retrieve the full election information including ID.
        elections.find_one(new_id.as_doc(), None).await?.unwrap()
    };

    // Schedule automatic closure at the end of its polling day.
    finalizers
        .schedule_election(
            db_client.inner().clone(),
            db.inner().clone(),
            &election,
            offset,
        )
        .await;

    Ok(Json(ElectionDescription::from_election(
        election, today, offset,
    )))
}

#[put("/elections/<election_id>", data = "<spec>", format = "json")]
#[allow(clippy::too_many_arguments)]
async fn modify_election(
    _token: AuthToken<Admin>,
    election_id: Id,
    spec: Json<ElectionSpec>,
    elections: Coll<Election>,
    new_elections: Coll<NewElection>,
    voters: Coll<Voter>,
    candidates: Coll<Candidate>,
    new_totals: Coll<NewCandidateTotals>,
    totals: Coll<CandidateTotals>,
    finalizers: &State<ElectionFinalizers>,
    config: &State<Config>,
    db_client: &State<Client>,
    db: &State<Database>,
) -> Result<Json<ElectionDescription>> {
    let offset = config.region_offset();
    let today = day::today(offset);

    // Get the existing election.
    let election = elections
        .find_one(election_id.as_doc(), None)
        .await?
        .ok_or_else(|| Error::not_found(format!("Election {}", election_id)))?;

    // Modification is only allowed before the polling day opens; once votes
    // can exist, the roster and window are frozen.
    if election.metadata.current_state(today, offset) != ElectionState::Scheduled {
        return Err(Error::bad_request(format!(
            "Cannot modify election {} after its polling day has opened",
            election_id
        )));
    }

    spec.validate(today, offset)?;
    ensure_title_free(&elections, spec.title.trim(), Some(election_id)).await?;
    let roster = resolve_candidates(&candidates, &spec.candidates).await?;
    let eligible_voters = eligible_voter_ids(&voters).await?;

    let election = {
        let mut session = db_client.start_session(None).await?;
        session.start_transaction(None).await?;

        // Replace with the new spec, re-snapshotting voters and roster.
        let new_election: NewElection = spec.0.into_election(eligible_voters, roster.clone());
        let result = new_elections
            .replace_one_with_session(election_id.as_doc(), &new_election, None, &mut session)
            .await?;
        assert_eq!(result.modified_count, 1);

        // The old roster's live tallies no longer apply.
        let election_totals = doc! {
            "election_id": election_id,
        };
        totals
            .delete_many_with_session(election_totals, None, &mut session)
            .await?;
        let zeroed_totals = roster
            .iter()
            .map(|candidate_id| NewCandidateTotals::new(election_id, *candidate_id))
            .collect::<Vec<_>>();
        new_totals
            .insert_many_with_session(&zeroed_totals, None, &mut session)
            .await?;

        session.commit_transaction().await?;

        elections
            .find_one(election_id.as_doc(), None)
            .await?
            .unwrap()
    };

    // The polling day may have moved.
    finalizers
        .schedule_election(
            db_client.inner().clone(),
            db.inner().clone(),
            &election,
            offset,
        )
        .await;

    Ok(Json(ElectionDescription::from_election(
        election, today, offset,
    )))
}

#[post("/elections/<election_id>/cancel")]
async fn cancel_election(
    _token: AuthToken<Admin>,
    election_id: Id,
    elections: Coll<Election>,
    finalizers: &State<ElectionFinalizers>,
    config: &State<Config>,
    notifier: &State<SnsClient>,
) -> Result<()> {
    // Cancellation is terminal and only reachable from non-terminal states.
    let filter = doc! {
        "_id": election_id,
        "state": {"$nin": [ElectionState::Completed, ElectionState::Cancelled]},
    };
    let update = doc! {
        "$set": {
            "state": ElectionState::Cancelled,
        }
    };
    let result = elections.update_one(filter, update, None).await?;
    if result.modified_count != 1 {
        return Err(Error::bad_request(format!(
            "Election {} doesn't exist or has already finished; cannot cancel.",
            election_id
        )));
    }

    // No point closing a cancelled election.
    finalizers.cancel_election(election_id).await;

    let election = elections
        .find_one(election_id.as_doc(), None)
        .await?
        .unwrap(); // Presence already checked.
    Notice::status_changed(election_id, &election.metadata.title, ElectionState::Cancelled)
        .publish(notifier, config)
        .await;

    Ok(())
}

/// End an election now and publish its result.
///
/// Also the idempotent re-close: ending an already-completed election
/// recounts the same ledger and republishes the same numbers.
#[post("/elections/<election_id>/end")]
async fn end_election(
    token: AuthToken<Admin>,
    election_id: Id,
    elections: Coll<Election>,
    finalizers: &State<ElectionFinalizers>,
    config: &State<Config>,
    notifier: &State<SnsClient>,
    db_client: &State<Client>,
    db: &State<Database>,
) -> Result<Json<ResultDescription>> {
    // The scheduled closure is redundant once we close by hand.
    finalizers.cancel_election(election_id).await;

    let result = close_election(db_client, db, election_id, Some(token.id)).await?;

    let election = elections
        .find_one(election_id.as_doc(), None)
        .await?
        .unwrap(); // Presence checked by the close.
    Notice::status_changed(election_id, &election.metadata.title, ElectionState::Completed)
        .publish(notifier, config)
        .await;

    Ok(Json(result.into()))
}

/// Administrative escape hatch: remove an election and everything attached
/// to it. The ledger entries go with it, so this deliberately sits outside
/// the usual append-only guarantees.
#[delete("/elections/<election_id>")]
#[allow(clippy::too_many_arguments)]
async fn delete_election(
    _token: AuthToken<Admin>,
    election_id: Id,
    elections: Coll<Election>,
    votes: Coll<Vote>,
    totals: Coll<CandidateTotals>,
    results: Coll<ElectionResult>,
    finalizers: &State<ElectionFinalizers>,
    config: &State<Config>,
    db_client: &State<Client>,
) -> Result<()> {
    // Get the election.
    let election = elections
        .find_one(election_id.as_doc(), None)
        .await?
        .ok_or_else(|| Error::not_found(format!("Election {}", election_id)))?;

    // Deleting mid-poll is too destructive even for an escape hatch.
    let offset = config.region_offset();
    if election.metadata.current_state(day::today(offset), offset) == ElectionState::Active {
        return Err(Error::bad_request(format!(
            "Cannot delete election {} while its polling day is running",
            election_id
        )));
    }

    finalizers.cancel_election(election_id).await;

    // Atomically delete the election and all associated data.
    {
        let mut session = db_client.start_session(None).await?;
        session.start_transaction(None).await?;

        let result = elections
            .delete_one_with_session(election_id.as_doc(), None, &mut session)
            .await?;
        assert_eq!(result.deleted_count, 1);

        let filter = doc! {
            "election_id": election_id,
        };
        votes
            .delete_many_with_session(filter.clone(), None, &mut session)
            .await?;
        totals
            .delete_many_with_session(filter.clone(), None, &mut session)
            .await?;
        results
            .delete_many_with_session(filter, None, &mut session)
            .await?;

        session.commit_transaction().await?;
    }

    Ok(())
}

/// Reject the spec if another election already uses its title,
/// case-insensitively.
async fn ensure_title_free(
    elections: &Coll<Election>,
    title: &str,
    exclude: Option<Id>,
) -> Result<()> {
    let mut filter = doc! {
        "title": title,
    };
    if let Some(election_id) = exclude {
        filter.insert("_id", doc! {"$ne": election_id});
    }
    let case_insensitive = Collation::builder()
        .locale("en")
        .strength(CollationStrength::Secondary)
        .build();
    let options = FindOneOptions::builder()
        .collation(case_insensitive)
        .build();
    let existing = elections.find_one(filter, options).await?;
    if existing.is_some() {
        return Err(Error::bad_request(format!(
            "An election titled '{}' already exists",
            title
        )));
    }
    Ok(())
}

/// Resolve candidate student IDs to their database records, rejecting the
/// spec if any are unknown.
async fn resolve_candidates(
    candidates: &Coll<Candidate>,
    student_ids: &[String],
) -> Result<Vec<Id>> {
    let filter = doc! {
        "student_id": {"$in": student_ids.to_vec()},
    };
    let mut by_student_id: HashMap<String, Id> = candidates
        .find(filter, None)
        .await?
        .map_ok(|candidate| (candidate.student_id.clone(), candidate.id))
        .try_collect()
        .await?;

    let mut roster = Vec::with_capacity(student_ids.len());
    for student_id in student_ids {
        let id = by_student_id.remove(student_id).ok_or_else(|| {
            Error::bad_request(format!("Unknown candidate student ID '{}'", student_id))
        })?;
        roster.push(id);
    }
    Ok(roster)
}

/// The eligible-voter snapshot: everyone currently verified.
async fn eligible_voter_ids(voters: &Coll<Voter>) -> Result<Vec<Id>> {
    let verified = doc! {
        "is_verified": true,
    };
    let ids = voters
        .find(verified, None)
        .await?
        .map_ok(|voter| voter.id)
        .try_collect()
        .await?;
    Ok(ids)
}
