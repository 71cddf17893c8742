use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, Timelike, Utc, Weekday};

use crate::models::MarketSession;

/// Classify an instant against the US equity trading calendar:
/// pre-market 04:00-09:30, regular 09:30-16:00, after-hours 16:00-20:00
/// Eastern, weekends and everything else closed.
pub fn classify_session(at: DateTime<Utc>) -> MarketSession {
    let eastern = at.with_timezone(&eastern_offset(at));

    if matches!(eastern.weekday(), Weekday::Sat | Weekday::Sun) {
        return MarketSession::Closed;
    }

    let minute_of_day = eastern.hour() * 60 + eastern.minute();
    match minute_of_day {
        240..=569 => MarketSession::PreMarket,
        570..=959 => MarketSession::Regular,
        960..=1199 => MarketSession::AfterHours,
        _ => MarketSession::Closed,
    }
}

/// EST/EDT offset for the given instant. DST runs from the second Sunday of
/// March (07:00 UTC, 2am EST) to the first Sunday of November (06:00 UTC,
/// 2am EDT).
fn eastern_offset(at: DateTime<Utc>) -> FixedOffset {
    let year = at.year();
    let dst_start = nth_sunday(year, 3, 2)
        .and_hms_opt(7, 0, 0)
        .unwrap()
        .and_utc();
    let dst_end = nth_sunday(year, 11, 1)
        .and_hms_opt(6, 0, 0)
        .unwrap()
        .and_utc();

    let hours = if at >= dst_start && at < dst_end { 4 } else { 5 };
    FixedOffset::west_opt(hours * 3600).unwrap()
}

fn nth_sunday(year: i32, month: u32, nth: u32) -> NaiveDate {
    let mut date = NaiveDate::from_ymd_opt(year, month, 1).unwrap();
    let mut seen = 0;
    loop {
        if date.weekday() == Weekday::Sun {
            seen += 1;
            if seen == nth {
                return date;
            }
        }
        date = date.succ_opt().unwrap();
    }
}
