use std::collections::HashMap;
use std::ops::Deref;

use chrono::{DateTime, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use serde::{Deserialize, Serialize};

use crate::model::{
    db::{election::Election, vote::Vote},
    mongodb::Id,
};

/// One candidate's share of a final tally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoteBreakdown {
    pub candidate_id: Id,
    pub votes: u64,
    /// Share of the total vote, rounded to one decimal place.
    /// Zero when no votes were cast at all.
    pub percentage: f64,
}

/// The final, immutable outcome of an election, recounted from the ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewElectionResult {
    pub election_id: Id,
    pub total_votes: u64,
    /// Votes cast as a share of the eligible-voter snapshot, rounded to one
    /// decimal place. Zero when the snapshot is empty.
    pub turnout_percentage: f64,
    /// Every candidate sharing the maximum vote count. Empty when no votes
    /// were cast.
    pub winners: Vec<Id>,
    /// Per-candidate counts, sorted by votes descending (candidate ID breaks
    /// ties so recounts are reproducible).
    pub vote_breakdown: Vec<VoteBreakdown>,
    pub is_tie: bool,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub published_at: DateTime<Utc>,
    /// The administrator who closed the election, or `None` when the
    /// scheduled finalizer closed it.
    pub published_by: Option<Id>,
}

/// Round to one decimal place.
fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

impl NewElectionResult {
    /// Tally the given ledger entries into a final result.
    ///
    /// The ledger, not the live counters, is the input here: counters can
    /// drift, the ledger cannot. Candidates on the roster with no votes
    /// still appear in the breakdown with a zero count.
    pub fn compute(election: &Election, ledger: &[Vote], published_by: Option<Id>) -> Self {
        // Count votes per candidate, starting every roster member at zero.
        let mut counts: HashMap<Id, u64> = election
            .candidates
            .iter()
            .map(|candidate_id| (*candidate_id, 0))
            .collect();
        for vote in ledger {
            *counts.entry(vote.candidate_id).or_insert(0) += 1;
        }

        let total_votes = ledger.len() as u64;

        let eligible = election.eligible_voters.len();
        let turnout_percentage = if eligible == 0 {
            0.0
        } else {
            round1(total_votes as f64 / eligible as f64 * 100.0)
        };

        let max_votes = counts.values().copied().max().unwrap_or(0);
        let mut winners = if max_votes == 0 {
            // No votes cast: nobody wins, and that is not a tie.
            Vec::new()
        } else {
            counts
                .iter()
                .filter(|(_, votes)| **votes == max_votes)
                .map(|(candidate_id, _)| *candidate_id)
                .collect()
        };
        winners.sort_unstable();
        let is_tie = winners.len() > 1;

        let mut vote_breakdown = counts
            .into_iter()
            .map(|(candidate_id, votes)| VoteBreakdown {
                candidate_id,
                votes,
                percentage: if total_votes == 0 {
                    0.0
                } else {
                    round1(votes as f64 / total_votes as f64 * 100.0)
                },
            })
            .collect::<Vec<_>>();
        vote_breakdown.sort_unstable_by(|a, b| {
            b.votes
                .cmp(&a.votes)
                .then(a.candidate_id.cmp(&b.candidate_id))
        });

        Self {
            election_id: election.id,
            total_votes,
            turnout_percentage,
            winners,
            vote_breakdown,
            is_tie,
            published_at: Utc::now(),
            published_by,
        }
    }
}

/// An election result from the database, with its unique ID.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElectionResult {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub result: NewElectionResult,
}

impl Deref for ElectionResult {
    type Target = NewElectionResult;

    fn deref(&self) -> &Self::Target {
        &self.result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::model::db::{election::ElectionCore, vote::VoteCore};

    fn election_with(candidates: Vec<Id>, eligible_voters: Vec<Id>) -> Election {
        Election {
            id: Id::new(),
            election: ElectionCore::example_with(candidates, eligible_voters),
        }
    }

    fn ballot(election: &Election, voter_id: Id, candidate_id: Id) -> Vote {
        Vote {
            id: Id::new(),
            vote: VoteCore::new(election.id, voter_id, candidate_id),
        }
    }

    #[test]
    fn two_way_tie_with_full_turnout() {
        // Campus Council 2024: A:2, B:2, C:1 across five voters.
        let mut candidates = vec![Id::new(), Id::new(), Id::new()];
        candidates.sort_unstable();
        let (a, b, c) = (candidates[0], candidates[1], candidates[2]);
        let voters: Vec<Id> = (0..5).map(|_| Id::new()).collect();
        let election = election_with(candidates, voters.clone());

        let ledger = vec![
            ballot(&election, voters[0], a),
            ballot(&election, voters[1], a),
            ballot(&election, voters[2], b),
            ballot(&election, voters[3], b),
            ballot(&election, voters[4], c),
        ];
        let result = NewElectionResult::compute(&election, &ledger, None);

        assert_eq!(result.total_votes, 5);
        assert_eq!(result.turnout_percentage, 100.0);
        assert_eq!(result.winners, vec![a, b]);
        assert!(result.is_tie);
        let shares = result
            .vote_breakdown
            .iter()
            .map(|entry| (entry.candidate_id, entry.votes, entry.percentage))
            .collect::<Vec<_>>();
        assert_eq!(shares, vec![(a, 2, 40.0), (b, 2, 40.0), (c, 1, 20.0)]);
    }

    #[test]
    fn no_votes_means_no_winner_not_a_tie() {
        let candidates = vec![Id::new(), Id::new()];
        let election = election_with(candidates.clone(), vec![Id::new()]);

        let result = NewElectionResult::compute(&election, &[], None);

        assert_eq!(result.total_votes, 0);
        assert_eq!(result.turnout_percentage, 0.0);
        assert!(result.winners.is_empty());
        assert!(!result.is_tie);
        // Roster members still appear, with zero counts and zero shares.
        assert_eq!(result.vote_breakdown.len(), 2);
        for entry in &result.vote_breakdown {
            assert_eq!(entry.votes, 0);
            assert_eq!(entry.percentage, 0.0);
        }
    }

    #[test]
    fn empty_eligible_snapshot_never_divides_by_zero() {
        let candidate = Id::new();
        let election = election_with(vec![candidate, Id::new()], vec![]);
        // A vote from outside the (empty) snapshot can only happen if the
        // snapshot was edited after the fact; turnout must still be sane.
        let ledger = vec![ballot(&election, Id::new(), candidate)];

        let result = NewElectionResult::compute(&election, &ledger, None);

        assert_eq!(result.total_votes, 1);
        assert_eq!(result.turnout_percentage, 0.0);
        assert_eq!(result.winners, vec![candidate]);
        assert!(!result.is_tie);
    }

    #[test]
    fn breakdown_shares_sum_to_whole() {
        let candidates: Vec<Id> = (0..3).map(|_| Id::new()).collect();
        let voters: Vec<Id> = (0..7).map(|_| Id::new()).collect();
        let election = election_with(candidates.clone(), voters.clone());

        // 4 / 2 / 1 split.
        let mut ledger = Vec::new();
        for (i, voter) in voters.iter().enumerate() {
            let candidate = match i {
                0..=3 => candidates[0],
                4..=5 => candidates[1],
                _ => candidates[2],
            };
            ledger.push(ballot(&election, *voter, candidate));
        }
        let result = NewElectionResult::compute(&election, &ledger, None);

        assert_eq!(
            result.vote_breakdown.iter().map(|e| e.votes).sum::<u64>(),
            result.total_votes
        );
        let share_sum: f64 = result.vote_breakdown.iter().map(|e| e.percentage).sum();
        assert!((share_sum - 100.0).abs() < 0.2);
        // Sorted by votes descending.
        assert_eq!(
            result
                .vote_breakdown
                .iter()
                .map(|e| e.votes)
                .collect::<Vec<_>>(),
            vec![4, 2, 1]
        );
    }

    #[test]
    fn recount_is_reproducible() {
        let candidates = vec![Id::new(), Id::new()];
        let voters: Vec<Id> = (0..3).map(|_| Id::new()).collect();
        let election = election_with(candidates.clone(), voters.clone());
        let ledger = vec![
            ballot(&election, voters[0], candidates[0]),
            ballot(&election, voters[1], candidates[1]),
            ballot(&election, voters[2], candidates[1]),
        ];

        let first = NewElectionResult::compute(&election, &ledger, None);
        let second = NewElectionResult::compute(&election, &ledger, None);

        assert_eq!(first.total_votes, second.total_votes);
        assert_eq!(first.turnout_percentage, second.turnout_percentage);
        assert_eq!(first.winners, second.winners);
        assert_eq!(first.vote_breakdown, second.vote_breakdown);
        assert_eq!(first.is_tie, second.is_tie);
    }
}
