use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{
    db::result::{ElectionResult, VoteBreakdown},
    mongodb::Id,
};

/// A published election result, as served to result consumers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultDescription {
    pub election_id: Id,
    pub total_votes: u64,
    pub turnout_percentage: f64,
    pub winners: Vec<Id>,
    pub vote_breakdown: Vec<VoteBreakdown>,
    pub is_tie: bool,
    pub published_at: DateTime<Utc>,
    pub published_by: Option<Id>,
}

impl From<ElectionResult> for ResultDescription {
    fn from(result: ElectionResult) -> Self {
        Self {
            election_id: result.result.election_id,
            total_votes: result.result.total_votes,
            turnout_percentage: result.result.turnout_percentage,
            winners: result.result.winners,
            vote_breakdown: result.result.vote_breakdown,
            is_tie: result.result.is_tie,
            published_at: result.result.published_at,
            published_by: result.result.published_by,
        }
    }
}
