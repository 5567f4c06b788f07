//! Wire-date codec.
//!
//! ATIH binary tables encode dates as 16-bit day offsets from 1979-12-31
//! (Gregorian). Offset 0 is the epoch itself; u16::MAX (≈ 2159) doubles as
//! the "open end" sentinel for validity intervals.

use chrono::{Days, NaiveDate};

/// Largest representable wire offset, used for open-ended validity ranges.
pub const WIRE_DAYS_MAX: u16 = u16::MAX;

/// The wire epoch: 1979-12-31.
pub fn wire_epoch() -> NaiveDate {
    NaiveDate::from_ymd_opt(1979, 12, 31).unwrap()
}

/// Decode a 16-bit day offset into a calendar date.
pub fn date_from_1980(days: u16) -> NaiveDate {
    wire_epoch() + Days::new(days as u64)
}

/// Encode a calendar date as a day offset. Dates before the epoch clamp to 0,
/// dates past the horizon clamp to `WIRE_DAYS_MAX`.
pub fn date_to_1980(date: NaiveDate) -> u16 {
    let days = date.signed_duration_since(wire_epoch()).num_days();
    days.clamp(0, WIRE_DAYS_MAX as i64) as u16
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn epoch_roundtrip() {
        assert_eq!(date_from_1980(0), wire_epoch());
        assert_eq!(date_from_1980(1), NaiveDate::from_ymd_opt(1980, 1, 1).unwrap());

        let date = NaiveDate::from_ymd_opt(2019, 3, 1).unwrap();
        assert_eq!(date_from_1980(date_to_1980(date)), date);
    }

    #[test]
    fn clamping() {
        assert_eq!(date_to_1980(NaiveDate::from_ymd_opt(1950, 1, 1).unwrap()), 0);
        assert_eq!(date_to_1980(NaiveDate::from_ymd_opt(2200, 1, 1).unwrap()), WIRE_DAYS_MAX);
    }
}
