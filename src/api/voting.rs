use aws_sdk_sns::Client as SnsClient;
use mongodb::bson::doc;
use rocket::{http::Status, serde::json::Json, Route, State};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::model::{
    api::{auth::AuthToken, notification::Notice, receipt::VoteReceipt},
    common::{day, ElectionState},
    db::{
        candidate::Candidate,
        election::Election,
        totals::CandidateTotals,
        vote::{NewVote, Vote},
        voter::Voter,
    },
    mongodb::{Coll, Id},
};

pub fn routes() -> Vec<Route> {
    routes![cast_vote]
}

/// The vote admission gate.
///
/// Every check before the ledger append is advisory, producing a friendly
/// rejection; the one-vote-per-voter guarantee itself lives in the ledger's
/// unique index, which arbitrates between concurrent requests that all pass
/// the pre-checks.
#[post("/voter/elections/<election_id>/votes", data = "<ballot_spec>", format = "json")]
#[allow(clippy::too_many_arguments)]
async fn cast_vote(
    token: AuthToken<Voter>,
    election_id: Id,
    ballot_spec: Json<BallotSpec>,
    voters: Coll<Voter>,
    elections: Coll<Election>,
    candidates: Coll<Candidate>,
    votes: Coll<Vote>,
    new_votes: Coll<NewVote>,
    totals: Coll<CandidateTotals>,
    config: &State<Config>,
    notifier: &State<SnsClient>,
) -> Result<Json<VoteReceipt>> {
    // Get the voter behind the token.
    let voter = voters
        .find_one(token.id.as_doc(), None)
        .await?
        .ok_or_else(|| Error::not_found(format!("Voter {}", token.id)))?;

    // Get the election.
    let election = elections
        .find_one(election_id.as_doc(), None)
        .await?
        .ok_or_else(|| Error::not_found(format!("Election {}", election_id)))?;

    // The chosen candidate must be on this election's roster.
    let candidate_id = ballot_spec.candidate;
    if !election.candidates.contains(&candidate_id) {
        return Err(Error::bad_request(format!(
            "Candidate {} does not belong to election {}",
            candidate_id, election_id
        )));
    }
    let candidate = candidates
        .find_one(candidate_id.as_doc(), None)
        .await?
        .ok_or_else(|| Error::not_found(format!("Candidate {}", candidate_id)))?;

    // The voter must be in the eligible-voter snapshot.
    if !election.eligible_voters.contains(&voter.id) {
        return Err(Error::Status(
            Status::Forbidden,
            format!(
                "Voter {} is not eligible to vote in election {}",
                voter.id, election_id
            ),
        ));
    }

    // The polling window must be open right now.
    let state = election
        .metadata
        .current_state(day::today(config.region_offset()), config.region_offset());
    if state != ElectionState::Active {
        return Err(Error::bad_request(format!(
            "Election {} is not open for voting (currently {:?})",
            election_id, state
        )));
    }

    // Fast-path duplicate check for a friendly error. Advisory only: two
    // racing requests can both get past this.
    let prior_vote = doc! {
        "election_id": election_id,
        "voter_id": voter.id,
    };
    if votes.find_one(prior_vote, None).await?.is_some() {
        return Err(Error::Status(
            Status::Conflict,
            format!("Voter has already voted in election {}", election_id),
        ));
    }

    // Append to the ledger; the unique index is the authoritative guard.
    let vote = NewVote::new(election_id, voter.id, candidate.id);
    if vote.append_if_absent(&new_votes).await?.is_none() {
        return Err(Error::Status(
            Status::Conflict,
            format!("Voter has already voted in election {}", election_id),
        ));
    }

    // Bump the live counters. These are a display cache: if this fails the
    // vote stands, the caller sees an error, and a retry reports the vote
    // as a duplicate rather than counting it twice.
    CandidateTotals::increment(&totals, &elections, election_id, candidate.id).await?;

    // Hand back a receipt and let the notifier confirm out-of-band.
    let receipt = VoteReceipt::new(config, election_id, voter.id, candidate.id, vote.voted_at);
    Notice::vote_accepted(&voter, &election, &candidate, &receipt)
        .publish(notifier, config)
        .await;

    Ok(Json(receipt))
}

/// A vote that the voter wishes to cast for a specific candidate.
#[derive(Debug, PartialEq, Eq, Serialize, Deserialize)]
struct BallotSpec {
    pub candidate: Id,
}
