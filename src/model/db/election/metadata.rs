use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use serde::{Deserialize, Serialize};

use crate::model::common::{day::civil_day, ElectionState, ElectionType, Priority};

/// A view on just the election's top-level metadata.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub struct ElectionMetadata {
    /// Election title, unique across all elections.
    pub title: String,
    pub description: String,
    pub election_type: ElectionType,
    /// Stored state. Prefer [`current_state`](Self::current_state), which
    /// folds the polling window in.
    pub state: ElectionState,
    /// Start of the polling window. The window is always exactly one
    /// regional calendar day, enforced when the election is created or
    /// modified.
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub start_date: DateTime<Utc>,
    /// End of the polling window, one day after `start_date`.
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub end_date: DateTime<Utc>,
    pub priority: Priority,
    /// When the election was closed, stamped by the tally engine.
    pub ended_at: Option<mongodb::bson::DateTime>,
}

impl ElectionMetadata {
    /// The effective lifecycle state on the given regional calendar day.
    ///
    /// Terminal stored states are sticky: a cancelled election stays
    /// cancelled, and a closed election stays completed even if its polling
    /// day has not run out. Otherwise the stored state is ignored and the
    /// state follows the polling window, inclusive on both ends.
    pub fn current_state(&self, today: NaiveDate, offset: FixedOffset) -> ElectionState {
        match self.state {
            ElectionState::Cancelled | ElectionState::Completed => self.state,
            ElectionState::Scheduled | ElectionState::Active => {
                let opens = civil_day(self.start_date, offset);
                let closes = civil_day(self.end_date, offset);
                if today < opens {
                    ElectionState::Scheduled
                } else if today <= closes {
                    ElectionState::Active
                } else {
                    ElectionState::Completed
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::{Duration, TimeZone};

    fn offset() -> FixedOffset {
        FixedOffset::east_opt(5 * 3600 + 30 * 60).unwrap()
    }

    fn metadata(state: ElectionState, start_date: DateTime<Utc>) -> ElectionMetadata {
        ElectionMetadata {
            title: "Test Election".to_string(),
            description: "A one-day test election".to_string(),
            election_type: ElectionType::General,
            state,
            start_date,
            end_date: start_date + Duration::days(1),
            priority: Priority::Medium,
            ended_at: None,
        }
    }

    #[test]
    fn window_drives_non_terminal_states() {
        let start = Utc.with_ymd_and_hms(2024, 6, 10, 0, 0, 0).unwrap();
        let meta = metadata(ElectionState::Scheduled, start);
        let opens = civil_day(start, offset());

        assert_eq!(
            meta.current_state(opens - Duration::days(1), offset()),
            ElectionState::Scheduled
        );
        assert_eq!(meta.current_state(opens, offset()), ElectionState::Active);
        // The window is a single day, inclusive of the end day.
        assert_eq!(
            meta.current_state(civil_day(meta.end_date, offset()), offset()),
            ElectionState::Active
        );
        assert_eq!(
            meta.current_state(opens + Duration::days(2), offset()),
            ElectionState::Completed
        );
    }

    #[test]
    fn stored_state_is_ignored_within_the_window() {
        // A stale stored `Active` does not keep an expired election open,
        // and a stale `Scheduled` does not hide an open one.
        let start = Utc.with_ymd_and_hms(2024, 6, 10, 0, 0, 0).unwrap();
        let opens = civil_day(start, offset());

        let stale_active = metadata(ElectionState::Active, start);
        assert_eq!(
            stale_active.current_state(opens + Duration::days(5), offset()),
            ElectionState::Completed
        );

        let stale_scheduled = metadata(ElectionState::Scheduled, start);
        assert_eq!(
            stale_scheduled.current_state(opens, offset()),
            ElectionState::Active
        );
    }

    #[test]
    fn terminal_states_are_sticky() {
        let start = Utc.with_ymd_and_hms(2024, 6, 10, 0, 0, 0).unwrap();
        let opens = civil_day(start, offset());

        let cancelled = metadata(ElectionState::Cancelled, start);
        let completed = metadata(ElectionState::Completed, start);
        for day in [opens - Duration::days(3), opens, opens + Duration::days(3)] {
            assert_eq!(
                cancelled.current_state(day, offset()),
                ElectionState::Cancelled
            );
            // Closed early by an administrator: stays closed for the rest of
            // its polling day.
            assert_eq!(
                completed.current_state(day, offset()),
                ElectionState::Completed
            );
        }
    }
}
