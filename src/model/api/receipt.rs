use chrono::{DateTime, Utc};
use data_encoding::BASE32_NOPAD;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::config::Config;
use crate::model::mongodb::Id;

type HmacSha256 = Hmac<Sha256>;

/// User-facing confirmation of an accepted vote.
///
/// The receipt identifier is an HMAC over the (election, voter) pair, so a
/// voter re-requesting confirmation sees the same opaque identifier without
/// the ballot linkage being derivable by anyone without the key. It is
/// display-only: deduplication is enforced by the ledger, never by receipts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteReceipt {
    pub receipt_id: String,
    pub election_id: Id,
    pub candidate_id: Id,
    pub voted_at: DateTime<Utc>,
}

impl VoteReceipt {
    pub fn new(
        config: &Config,
        election_id: Id,
        voter_id: Id,
        candidate_id: Id,
        voted_at: DateTime<Utc>,
    ) -> Self {
        let mut mac = HmacSha256::new_from_slice(config.hmac_secret())
            .expect("HMAC can take key of any size");
        mac.update(&election_id.to_bytes());
        mac.update(&voter_id.to_bytes());
        let digest = mac.finalize().into_bytes();

        Self {
            receipt_id: format!("RCPT-{}", BASE32_NOPAD.encode(&digest[..10])),
            election_id,
            candidate_id,
            voted_at,
        }
    }
}
