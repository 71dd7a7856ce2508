//! Time-window admission (spec §4.4 step 3).

use chrono::{DateTime, Datelike, TimeZone, Timelike, Utc};
use chrono_tz::Tz;
use ulh_core::TimeWindow;

/// Whether `now` falls inside `window`.
///
/// The window is `[start_hour, end_hour)` in the window's timezone (UTC if
/// unset). When `start_hour >= end_hour` the window wraps past midnight
/// (e.g. `22..6` admits 10pm through 5:59am). `days` is `0=Sunday..6=Saturday`;
/// an empty or absent list places no restriction on the day.
#[must_use]
pub fn within(window: &TimeWindow, now: DateTime<Utc>) -> bool {
    let tz: Tz = window
        .timezone
        .as_deref()
        .and_then(|name| name.parse().ok())
        .unwrap_or(Tz::UTC);
    let local = now.with_timezone(&tz);

    let hour = local.hour() as u8;
    let hour_ok = if window.start_hour < window.end_hour {
        hour >= window.start_hour && hour < window.end_hour
    } else if window.start_hour > window.end_hour {
        hour >= window.start_hour || hour < window.end_hour
    } else {
        // start == end: the `hour >= start || hour < end` formula is a
        // tautology at this point, so every hour is admitted.
        true
    };
    if !hour_ok {
        return false;
    }

    match &window.days {
        Some(days) if !days.is_empty() => {
            let weekday = local.weekday().num_days_from_sunday() as u8;
            days.contains(&weekday)
        }
        _ => true,
    }
}
