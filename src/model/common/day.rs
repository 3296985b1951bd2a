//! Civil calendar day normalisation.
//!
//! All lifecycle comparisons happen on the operating region's calendar day,
//! not on raw instants. Two servers in different timezones must agree on
//! whether an election is open, so every instant is first shifted into the
//! configured regional offset and only then truncated to a date.

use chrono::{DateTime, Days, FixedOffset, NaiveDate, TimeZone, Utc};

/// The regional calendar day containing the given instant.
pub fn civil_day(instant: DateTime<Utc>, offset: FixedOffset) -> NaiveDate {
    instant.with_timezone(&offset).date_naive()
}

/// The regional calendar day containing the current instant.
pub fn today(offset: FixedOffset) -> NaiveDate {
    civil_day(Utc::now(), offset)
}

/// The first instant after the given regional day, as UTC.
/// Used to schedule automatic election closure.
pub fn day_end(day: NaiveDate, offset: FixedOffset) -> DateTime<Utc> {
    let next_midnight = day
        .checked_add_days(Days::new(1))
        .expect("in-range election dates have a next day")
        .and_hms_opt(0, 0, 0)
        .expect("midnight is always a valid time");
    offset
        .from_local_datetime(&next_midnight)
        .single()
        .expect("fixed offsets have no DST gaps")
        .with_timezone(&Utc)
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::TimeZone;

    fn ist() -> FixedOffset {
        FixedOffset::east_opt(5 * 3600 + 30 * 60).unwrap()
    }

    #[test]
    fn same_instant_different_days() {
        // 20:00 UTC is 01:30 the next day in the +05:30 region.
        let instant = Utc.with_ymd_and_hms(2024, 3, 1, 20, 0, 0).unwrap();
        assert_eq!(
            civil_day(instant, ist()),
            NaiveDate::from_ymd_opt(2024, 3, 2).unwrap()
        );
        assert_eq!(
            civil_day(instant, FixedOffset::east_opt(0).unwrap()),
            NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
        );
    }

    #[test]
    fn day_end_is_next_local_midnight() {
        let day = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let end = day_end(day, ist());
        // Local midnight of March 2nd is 18:30 UTC on March 1st.
        assert_eq!(end, Utc.with_ymd_and_hms(2024, 3, 1, 18, 30, 0).unwrap());
        // The instant just before the boundary is still March 1st locally.
        let just_before = end - chrono::Duration::seconds(1);
        assert_eq!(civil_day(just_before, ist()), day);
        assert_eq!(
            civil_day(end, ist()),
            day.checked_add_days(Days::new(1)).unwrap()
        );
    }
}
