//! Working-day arithmetic for the processing-time SOP.

use chrono::{Datelike, Duration, NaiveDate, Weekday};

fn is_weekday(date: NaiveDate) -> bool {
    !matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// Monday to Friday days from `start` to `end`, both inclusive.
///
/// The same calendar day always counts as one. A missing date, or an `end`
/// before `start`, counts as zero.
pub fn business_days_between(start: Option<NaiveDate>, end: Option<NaiveDate>) -> i64 {
    let (Some(start), Some(end)) = (start, end) else {
        return 0;
    };
    if end < start {
        return 0;
    }
    if start == end {
        return 1;
    }

    let calendar_days = (end - start).num_days() + 1;
    let full_weeks = calendar_days / 7;
    let mut count = full_weeks * 5;

    let mut day = start + Duration::days(full_weeks * 7);
    while day <= end {
        if is_weekday(day) {
            count += 1;
        }
        day += Duration::days(1);
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn d(y: i32, m: u32, day: u32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(y, m, day)
    }

    // 2024-01-01 is a Monday.
    #[rstest]
    #[case(d(2024, 1, 1), d(2024, 1, 1), 1)]
    #[case(d(2024, 1, 1), d(2024, 1, 5), 5)]
    #[case(d(2024, 1, 5), d(2024, 1, 8), 2)]
    #[case(d(2024, 1, 6), d(2024, 1, 7), 0)]
    #[case(d(2024, 1, 6), d(2024, 1, 6), 1)]
    #[case(d(2024, 1, 1), d(2024, 1, 31), 23)]
    #[case(d(2024, 1, 8), d(2024, 1, 1), 0)]
    #[case(None, d(2024, 1, 1), 0)]
    #[case(d(2024, 1, 1), None, 0)]
    fn counts_weekdays_inclusive(
        #[case] start: Option<NaiveDate>,
        #[case] end: Option<NaiveDate>,
        #[case] expected: i64,
    ) {
        assert_eq!(business_days_between(start, end), expected);
    }
}
