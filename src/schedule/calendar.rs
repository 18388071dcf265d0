//! Mexican national holiday calendar and business-day adjustment.
//!
//! Payment dates roll backward to the nearest preceding business day.
//! Each fixed holiday is first substituted to its observed weekday
//! (Saturday observed Friday, Sunday observed Monday) before the
//! rollback rule applies, so an observed date can land in the prior
//! year (Jan 1 on a Saturday is observed Dec 31).

use chrono::{Datelike, NaiveDate, Weekday};

/// fixed national holidays as (month, day)
const HOLIDAYS: [(u32, u32); 7] = [
    (1, 1),   // New Year
    (2, 5),   // Constitution Day
    (3, 21),  // Benito Juarez's birthday
    (5, 1),   // Labor Day
    (9, 16),  // Independence Day
    (11, 20), // Revolution Day
    (12, 25), // Christmas
];

/// observed date of a holiday rule in a given year, nearest-workday substituted
fn observed(year: i32, month: u32, day: u32) -> Option<NaiveDate> {
    let date = NaiveDate::from_ymd_opt(year, month, day)?;
    match date.weekday() {
        Weekday::Sat => date.pred_opt(),
        Weekday::Sun => date.succ_opt(),
        _ => Some(date),
    }
}

/// check whether a date is an observed holiday
///
/// Scans the rules of the surrounding years as well, since observance can
/// shift a holiday across a year boundary.
pub fn is_observed_holiday(date: NaiveDate) -> bool {
    for year in date.year() - 1..=date.year() + 1 {
        for (month, day) in HOLIDAYS {
            if observed(year, month, day) == Some(date) {
                return true;
            }
        }
    }
    false
}

/// check whether a date is a business day (weekday, not an observed holiday)
pub fn is_business_day(date: NaiveDate) -> bool {
    !matches!(date.weekday(), Weekday::Sat | Weekday::Sun) && !is_observed_holiday(date)
}

/// roll a date backward to the nearest preceding business day
///
/// Business days pass through unchanged.
pub fn previous_business_day(mut date: NaiveDate) -> NaiveDate {
    while !is_business_day(date) {
        match date.pred_opt() {
            Some(prev) => date = prev,
            None => break,
        }
    }
    date
}
