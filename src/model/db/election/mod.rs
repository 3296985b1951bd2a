mod base;
mod close;
mod finalizer;
mod metadata;

pub use base::{Election, ElectionCore, NewElection};
pub use close::close_election;
pub use finalizer::{ElectionFinalizerFairing, ElectionFinalizers};
pub use metadata::ElectionMetadata;
