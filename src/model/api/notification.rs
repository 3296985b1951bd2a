use aws_sdk_sns::Client as SnsClient;
use chrono::{DateTime, Utc};
use rocket::serde::json::serde_json;
use serde::Serialize;

use crate::config::Config;
use crate::model::{
    api::receipt::VoteReceipt,
    common::ElectionState,
    db::{candidate::Candidate, election::Election, voter::Voter},
    mongodb::Id,
};

/// An event published for the external notifier.
///
/// The notifier owns delivery (confirmation emails and the like); this
/// service only emits the event. Publish failures are logged and swallowed:
/// a vote or state change must never be rolled back because a notification
/// could not be sent.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notice {
    /// A vote was admitted to the ledger.
    VoteAccepted {
        to_address: String,
        voter_name: String,
        election_title: String,
        candidate_name: String,
        vote_timestamp: DateTime<Utc>,
        receipt_id: String,
    },
    /// An election moved to a new lifecycle state.
    StatusChanged {
        election_id: Id,
        election_title: String,
        state: ElectionState,
        changed_at: DateTime<Utc>,
    },
}

impl Notice {
    pub fn vote_accepted(
        voter: &Voter,
        election: &Election,
        candidate: &Candidate,
        receipt: &VoteReceipt,
    ) -> Self {
        Self::VoteAccepted {
            to_address: voter.email.clone(),
            voter_name: voter.name.clone(),
            election_title: election.metadata.title.clone(),
            candidate_name: candidate.name.clone(),
            vote_timestamp: receipt.voted_at,
            receipt_id: receipt.receipt_id.clone(),
        }
    }

    pub fn status_changed(election_id: Id, election_title: &str, state: ElectionState) -> Self {
        Self::StatusChanged {
            election_id,
            election_title: election_title.to_string(),
            state,
            changed_at: Utc::now(),
        }
    }

    fn subject(&self) -> String {
        match self {
            Self::VoteAccepted { election_title, .. } => {
                format!("Voting Confirmation: {election_title}")
            }
            Self::StatusChanged {
                election_title,
                state,
                ..
            } => format!("Election {election_title} is now {state:?}"),
        }
    }

    /// Publish this notice to the configured SNS topic, best-effort.
    pub async fn publish(&self, notifier: &SnsClient, config: &Config) {
        let message =
            serde_json::to_string(self).expect("Notice serialisation is infallible");
        let outcome = notifier
            .publish()
            .topic_arn(config.notify_topic_arn())
            .subject(self.subject())
            .message(message)
            .send()
            .await;
        match outcome {
            Ok(_) => debug!("Published notice: {}", self.subject()),
            Err(e) => warn!("Failed to publish notice '{}': {e}", self.subject()),
        }
    }
}
