use mongodb::{
    bson::{doc, DateTime as BsonDateTime},
    options::ReplaceOptions,
    Client, Database,
};
use rocket::http::Status;

use crate::error::{Error, Result};
use crate::model::{
    common::ElectionState,
    db::{
        candidate::Candidate,
        election::Election,
        result::{ElectionResult, NewElectionResult},
        vote::Vote,
    },
    mongodb::{Coll, Id},
};

/// Close an election and publish its result.
///
/// Reads the full ledger for the election and rewrites the election record,
/// winner flags, and result document inside a single transaction, so the
/// tally is a point-in-time snapshot: a vote racing with the close is either
/// in every derived field or in none, and a failure part-way leaves no trace.
///
/// Closing is idempotent. Re-closing recounts the same immutable ledger and
/// replaces the result with identical numbers (only `published_at` moves).
pub async fn close_election(
    db_client: &Client,
    db: &Database,
    election_id: Id,
    closed_by: Option<Id>,
) -> Result<ElectionResult> {
    let elections = Coll::<Election>::from_db(db);
    let candidates = Coll::<Candidate>::from_db(db);
    let votes = Coll::<Vote>::from_db(db);
    let new_results = Coll::<NewElectionResult>::from_db(db);
    let results = Coll::<ElectionResult>::from_db(db);

    let mut session = db_client.start_session(None).await?;
    session.start_transaction(None).await?;

    // Get the election.
    let election = elections
        .find_one_with_session(election_id.as_doc(), None, &mut session)
        .await?
        .ok_or_else(|| Error::not_found(format!("Election {}", election_id)))?;
    if election.metadata.state == ElectionState::Cancelled {
        return Err(Error::Status(
            Status::BadRequest,
            format!("Cannot close cancelled election {}", election_id),
        ));
    }

    // Read the whole ledger for this election.
    let ledger_filter = doc! {
        "election_id": election_id,
    };
    let mut cursor = votes
        .find_with_session(ledger_filter, None, &mut session)
        .await?;
    let mut ledger = Vec::new();
    while let Some(vote) = cursor.next(&mut session).await {
        ledger.push(vote?);
    }

    let result = NewElectionResult::compute(&election, &ledger, closed_by);

    // Mark the election completed and persist the recounted total.
    let update = doc! {
        "$set": {
            "state": ElectionState::Completed,
            "ended_at": BsonDateTime::now(),
            "total_votes": result.total_votes as i64,
        }
    };
    elections
        .update_one_with_session(election_id.as_doc(), update, None, &mut session)
        .await?;

    // Rewrite the winner flags across the roster.
    let roster_filter = doc! {
        "_id": { "$in": election.candidates.clone() },
    };
    candidates
        .update_many_with_session(
            roster_filter,
            doc! { "$set": { "is_winner": false } },
            None,
            &mut session,
        )
        .await?;
    if !result.winners.is_empty() {
        let winners_filter = doc! {
            "_id": { "$in": result.winners.clone() },
        };
        candidates
            .update_many_with_session(
                winners_filter,
                doc! { "$set": { "is_winner": true } },
                None,
                &mut session,
            )
            .await?;
    }

    // Upsert the result, replacing any previous close's output.
    let options = ReplaceOptions::builder().upsert(true).build();
    new_results
        .replace_one_with_session(
            doc! { "election_id": election_id },
            &result,
            options,
            &mut session,
        )
        .await?;

    session.commit_transaction().await?;

    info!(
        "Closed election {election_id}: {} votes, {} winner(s){}",
        result.total_votes,
        result.winners.len(),
        if result.is_tie { ", tied" } else { "" },
    );

    // Re-read to pick up the result document's ID.
    let result = results
        .find_one(doc! { "election_id": election_id }, None)
        .await?
        .expect("the result was just committed");
    Ok(result)
}
