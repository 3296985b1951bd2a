use std::collections::HashMap;

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::{
    common::{day::civil_day, ElectionState, ElectionType, Priority},
    db::election::{Election, ElectionCore, ElectionMetadata, NewElection},
    mongodb::Id,
};

/// An election specification, as submitted by an administrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElectionSpec {
    pub title: String,
    pub description: String,
    pub election_type: ElectionType,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub priority: Priority,
    /// Student IDs of the participating candidates.
    pub candidates: Vec<String>,
}

impl ElectionSpec {
    /// Check everything that can be checked without the database: length
    /// bounds, date ordering, the one-day window, and the candidate count.
    pub fn validate(&self, today: NaiveDate, offset: FixedOffset) -> Result<()> {
        let title = self.title.trim();
        if title.len() < 5 {
            return Err(Error::bad_request("Title must be at least 5 characters"));
        }
        if title.len() > 25 {
            return Err(Error::bad_request("Title must be at most 25 characters"));
        }
        let description = self.description.trim();
        if description.len() < 10 {
            return Err(Error::bad_request(
                "Description must be at least 10 characters",
            ));
        }
        if description.len() > 250 {
            return Err(Error::bad_request(
                "Description must be at most 250 characters",
            ));
        }

        if civil_day(self.start_date, offset) <= today {
            return Err(Error::bad_request("Start date must be after today"));
        }
        if self.end_date <= self.start_date {
            return Err(Error::bad_request("End date must be after start date"));
        }
        if self.end_date - self.start_date != Duration::days(1) {
            return Err(Error::bad_request("Election must be exactly one day long"));
        }

        let mut candidates = self.candidates.clone();
        candidates.sort_unstable();
        candidates.dedup();
        if candidates.len() != self.candidates.len() {
            return Err(Error::bad_request("Duplicate candidate entries"));
        }
        if candidates.len() < 2 {
            return Err(Error::bad_request(
                "Two or more candidates must participate",
            ));
        }

        Ok(())
    }

    /// Convert this spec into a storable election with the given snapshots.
    pub fn into_election(self, eligible_voters: Vec<Id>, candidates: Vec<Id>) -> NewElection {
        ElectionCore {
            metadata: ElectionMetadata {
                title: self.title.trim().to_string(),
                description: self.description.trim().to_string(),
                election_type: self.election_type,
                state: ElectionState::Scheduled,
                start_date: self.start_date,
                end_date: self.end_date,
                priority: self.priority,
                ended_at: None,
            },
            eligible_voters,
            candidates,
            total_votes: 0,
        }
    }
}

/// Election metadata for listings, with the lifecycle state already derived.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectionSummary {
    pub id: Id,
    pub title: String,
    pub election_type: ElectionType,
    /// The effective state, never the raw stored one.
    pub state: ElectionState,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub priority: Priority,
    pub total_votes: u64,
}

impl ElectionSummary {
    pub fn from_election(election: &Election, today: NaiveDate, offset: FixedOffset) -> Self {
        Self {
            id: election.id,
            title: election.metadata.title.clone(),
            election_type: election.metadata.election_type,
            state: election.metadata.current_state(today, offset),
            start_date: election.metadata.start_date,
            end_date: election.metadata.end_date,
            priority: election.metadata.priority,
            total_votes: election.total_votes,
        }
    }
}

/// All elections at a glance, with a tally of effective states.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectionsOverview {
    pub elections: Vec<ElectionSummary>,
    pub state_counts: HashMap<ElectionState, u64>,
}

impl ElectionsOverview {
    pub fn new(elections: Vec<ElectionSummary>) -> Self {
        let mut state_counts = HashMap::new();
        for summary in &elections {
            *state_counts.entry(summary.state).or_insert(0) += 1;
        }
        Self {
            elections,
            state_counts,
        }
    }
}

/// The full election view returned by the detail endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectionDescription {
    pub id: Id,
    pub title: String,
    pub description: String,
    pub election_type: ElectionType,
    pub state: ElectionState,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub priority: Priority,
    pub candidates: Vec<Id>,
    pub eligible_voter_count: usize,
    pub total_votes: u64,
    pub ended_at: Option<DateTime<Utc>>,
}

impl ElectionDescription {
    pub fn from_election(election: Election, today: NaiveDate, offset: FixedOffset) -> Self {
        let state = election.metadata.current_state(today, offset);
        Self {
            id: election.id,
            title: election.election.metadata.title,
            description: election.election.metadata.description,
            election_type: election.election.metadata.election_type,
            state,
            start_date: election.election.metadata.start_date,
            end_date: election.election.metadata.end_date,
            priority: election.election.metadata.priority,
            candidates: election.election.candidates,
            eligible_voter_count: election.election.eligible_voters.len(),
            total_votes: election.election.total_votes,
            ended_at: election.election.metadata.ended_at.map(|at| at.to_chrono()),
        }
    }
}

/// Example data for tests.
#[cfg(test)]
mod examples {
    use super::*;

    impl ElectionSpec {
        /// A valid spec whose polling day is the day after tomorrow.
        pub fn example(candidates: Vec<String>) -> Self {
            let start_date = Utc::now() + Duration::days(2);
            Self {
                title: "Student Union 2024".to_string(),
                description: "Annual student union election".to_string(),
                election_type: ElectionType::General,
                start_date,
                end_date: start_date + Duration::days(1),
                priority: Priority::Medium,
                candidates,
            }
        }
    }
}
