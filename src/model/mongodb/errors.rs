//! The mongodb crate reports server write errors by numeric code only;
//! this module names the codes we care about.

use mongodb::error::{Error as DbError, ErrorKind, WriteFailure};

/// Server error code for a unique index violation.
pub const DUPLICATE_KEY: i32 = 11000;

/// Was this write rejected by a unique index?
///
/// This is the authoritative signal for the one-vote-per-voter constraint:
/// the ledger's compound unique index turns a second vote for the same
/// (election, voter) pair into this error, no matter how many writers race.
pub fn is_duplicate_key_error(err: &DbError) -> bool {
    matches!(
        *err.kind,
        ErrorKind::Write(WriteFailure::WriteError(ref e)) if e.code == DUPLICATE_KEY
    )
}
