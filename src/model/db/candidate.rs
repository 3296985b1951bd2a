use std::ops::{Deref, DerefMut};

use serde::{Deserialize, Serialize};

use crate::model::{
    common::{AcademicLevel, Department},
    mongodb::Id,
};

/// Core candidate data, as stored in the database.
///
/// Candidates are nominated from verified voters by the external roster
/// management; this service reads them and writes exactly one field:
/// `is_winner`, owned by the tally engine.
///
/// There is deliberately no running vote counter here. A candidate may stand
/// in several elections, so live tallies are scoped per (election, candidate)
/// in the `candidate_totals` collection instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateCore {
    /// External student identifier of the nominated voter.
    pub student_id: String,
    /// Display name.
    pub name: String,
    /// The position the candidate is standing for.
    pub position: String,
    pub department: Department,
    pub academic_level: AcademicLevel,
    /// Set only by the tally engine when an election closes.
    pub is_winner: bool,
}

/// A candidate without an ID.
pub type NewCandidate = CandidateCore;

/// A candidate from the database, with their unique ID.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candidate {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub candidate: CandidateCore,
}

impl Deref for Candidate {
    type Target = CandidateCore;

    fn deref(&self) -> &Self::Target {
        &self.candidate
    }
}

impl DerefMut for Candidate {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.candidate
    }
}

/// Example data for tests.
#[cfg(test)]
mod examples {
    use super::*;

    impl CandidateCore {
        pub fn example(n: u32) -> Self {
            Self {
                student_id: format!("C{:04}", n),
                name: format!("Candidate {n}"),
                position: "Class Representative".to_string(),
                department: Department::Bsc,
                academic_level: AcademicLevel::ThirdYear,
                is_winner: false,
            }
        }
    }
}
