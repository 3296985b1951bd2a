use std::ops::{Deref, DerefMut};

use serde::{Deserialize, Serialize};

use crate::model::{
    common::{AcademicLevel, Department},
    mongodb::Id,
};

/// Core voter data, as stored in the database.
///
/// Voter records are created and verified by the external registration
/// system; this service only reads them. Only verified voters end up in an
/// election's eligible-voter snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoterCore {
    /// External student identifier.
    pub student_id: String,
    /// Display name.
    pub name: String,
    /// Contact address for vote confirmations.
    pub email: String,
    pub department: Department,
    pub academic_level: AcademicLevel,
    /// Has the registration system verified this voter?
    pub is_verified: bool,
}

/// A voter without an ID.
pub type NewVoter = VoterCore;

/// A voter from the database, with their unique ID.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Voter {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub voter: VoterCore,
}

impl Deref for Voter {
    type Target = VoterCore;

    fn deref(&self) -> &Self::Target {
        &self.voter
    }
}

impl DerefMut for Voter {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.voter
    }
}

/// Example data for tests.
#[cfg(test)]
mod examples {
    use super::*;

    impl VoterCore {
        pub fn example(n: u32) -> Self {
            Self {
                student_id: format!("S{:04}", n),
                name: format!("Voter {n}"),
                email: format!("voter{n}@example.edu"),
                department: Department::Bca,
                academic_level: AcademicLevel::SecondYear,
                is_verified: true,
            }
        }

        pub fn unverified_example() -> Self {
            Self {
                is_verified: false,
                ..Self::example(999)
            }
        }
    }
}
