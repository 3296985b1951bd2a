use mongodb::bson::{to_bson, Bson};
use serde::{Deserialize, Serialize};

/// States in the Election lifecycle.
///
/// The stored state and the *effective* state can differ: outside the
/// terminal states, the effective state is derived from the polling window
/// (see `ElectionMetadata::current_state`).
#[derive(Debug, Copy, Clone, Hash, PartialEq, Eq, Serialize, Deserialize)]
pub enum ElectionState {
    /// Polling day has not yet arrived.
    Scheduled,
    /// Polling day; votes are accepted.
    Active,
    /// Closed and tallied. Terminal.
    Completed,
    /// Called off by an administrator. Terminal.
    Cancelled,
}

impl From<ElectionState> for Bson {
    fn from(state: ElectionState) -> Self {
        to_bson(&state).expect("Serialisation is infallible")
    }
}

/// The scope of an election.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ElectionType {
    Department,
    Year,
    General,
}

impl From<ElectionType> for Bson {
    fn from(election_type: ElectionType) -> Self {
        to_bson(&election_type).expect("Serialisation is infallible")
    }
}

/// Administrative priority of an election. Display metadata only.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl From<Priority> for Bson {
    fn from(priority: Priority) -> Self {
        to_bson(&priority).expect("Serialisation is infallible")
    }
}
