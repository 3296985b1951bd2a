use std::ops::{Deref, DerefMut};

use mongodb::{bson::doc, options::UpdateOptions};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::model::{
    db::election::Election,
    mongodb::{Coll, Id},
};

/// Live vote tally for one candidate in one election.
///
/// Tallies are scoped per (election, candidate) pair so that a candidate
/// standing in several elections never mixes counts. They are a best-effort
/// display cache maintained on the side of the ledger; the tally engine
/// always recounts from the ledger and never reads these.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCandidateTotals {
    pub election_id: Id,
    pub candidate_id: Id,
    pub tally: u64,
}

impl NewCandidateTotals {
    /// A zeroed tally, seeded when the candidate joins an election's roster.
    pub fn new(election_id: Id, candidate_id: Id) -> Self {
        Self {
            election_id,
            candidate_id,
            tally: 0,
        }
    }
}

/// Candidate totals from the database, with their unique ID.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateTotals {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub totals: NewCandidateTotals,
}

impl CandidateTotals {
    /// Record an admitted vote in the live counters: bump the candidate's
    /// scoped tally and the election's total. Called only after the ledger
    /// append succeeded; upserts so a missing totals document can never
    /// block an already-recorded vote.
    pub async fn increment(
        totals: &Coll<CandidateTotals>,
        elections: &Coll<Election>,
        election_id: Id,
        candidate_id: Id,
    ) -> Result<()> {
        let filter = doc! {
            "election_id": election_id,
            "candidate_id": candidate_id,
        };
        let update = doc! {
            "$inc": { "tally": 1 }
        };
        let options = UpdateOptions::builder().upsert(true).build();
        totals.update_one(filter, update, options).await?;

        let update = doc! {
            "$inc": { "total_votes": 1 }
        };
        elections
            .update_one(election_id.as_doc(), update, None)
            .await?;
        Ok(())
    }
}

impl Deref for CandidateTotals {
    type Target = NewCandidateTotals;

    fn deref(&self) -> &Self::Target {
        &self.totals
    }
}

impl DerefMut for CandidateTotals {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.totals
    }
}
