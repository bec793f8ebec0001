//! Calendar-month helpers for exposure bucketing and contract months.
//!
//! All bucket months and contract months in the system are normalized to the
//! first day of the month.

use chrono::{Datelike, Duration, Months, NaiveDate};

/// First day of the month containing `d`.
pub fn month_start(d: NaiveDate) -> NaiveDate {
    d.with_day(1).unwrap_or(d)
}

/// `d` shifted forward by `n` calendar months.
pub fn add_months(d: NaiveDate, n: u32) -> NaiveDate {
    d.checked_add_months(Months::new(n)).unwrap_or(d)
}

/// Inclusive list of month-start dates covering `[start, end]`.
///
/// Returns an empty list when `end < start`.
pub fn months_spanned(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    let mut months = Vec::new();
    let mut current = month_start(start);
    let last = month_start(end);

    while current <= last {
        months.push(current);
        current = add_months(current, 1);
    }

    months
}

/// Signed distance in whole calendar months between two month-start dates.
pub fn month_distance(from: NaiveDate, to: NaiveDate) -> i32 {
    (to.year() - from.year()) * 12 + to.month() as i32 - from.month() as i32
}

/// Number of days of `month` covered by the inclusive window `[start, end]`.
///
/// Zero when the window does not touch the month at all.
pub fn overlap_days(month: NaiveDate, start: NaiveDate, end: NaiveDate) -> i64 {
    let month_first = month_start(month);
    let month_last = add_months(month_first, 1) - Duration::days(1);

    let lo = start.max(month_first);
    let hi = end.min(month_last);

    if hi < lo {
        0
    } else {
        (hi - lo).num_days() + 1
    }
}
