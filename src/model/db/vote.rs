use std::ops::Deref;

use chrono::{DateTime, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::model::mongodb::{is_duplicate_key_error, Coll, Id};

/// A single entry in the vote ledger.
///
/// Entries are append-only: once written they are never updated or deleted
/// (short of the administrative election-delete escape hatch). The ledger is
/// the source of truth for tallying; the live counters are merely a cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteCore {
    pub election_id: Id,
    pub voter_id: Id,
    pub candidate_id: Id,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub voted_at: DateTime<Utc>,
}

/// A ledger entry without an ID.
pub type NewVote = VoteCore;

impl VoteCore {
    /// A new ledger entry stamped with the current instant.
    pub fn new(election_id: Id, voter_id: Id, candidate_id: Id) -> Self {
        Self {
            election_id,
            voter_id,
            candidate_id,
            voted_at: Utc::now(),
        }
    }

    /// Append this vote to the ledger unless the voter has already voted in
    /// this election. Returns the new entry's ID, or `None` if an entry for
    /// the same (election, voter) pair already exists.
    ///
    /// The uniqueness guarantee comes from the ledger's compound unique
    /// index, not from any prior read: concurrent appends for the same pair
    /// result in exactly one success with the rest observing `None`. This
    /// also makes a client retry of a failed cast safe, since re-appending
    /// an already-recorded vote reports a duplicate rather than
    /// double-counting.
    pub async fn append_if_absent(&self, votes: &Coll<NewVote>) -> Result<Option<Id>> {
        match votes.insert_one(self, None).await {
            Ok(result) => {
                // Unwrap is valid because the ID comes directly from the DB.
                let id = result.inserted_id.as_object_id().unwrap().into();
                Ok(Some(id))
            }
            Err(ref err) if is_duplicate_key_error(err) => Ok(None),
            Err(err) => Err(err.into()),
        }
    }
}

/// A ledger entry from the database, with its unique ID.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vote {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub vote: VoteCore,
}

impl Deref for Vote {
    type Target = VoteCore;

    fn deref(&self) -> &Self::Target {
        &self.vote
    }
}
