use chrono::{DateTime, LocalResult, NaiveDate, NaiveDateTime, TimeZone};
use chrono_tz::{Asia::Shanghai, Tz};

/// Exchange-local instant; every quote and bar timestamp is expressed in it.
pub type MarketTime = DateTime<Tz>;

pub const DATE_FMT: &str = "%Y-%m-%d";
pub const DATETIME_FMT: &str = "%Y-%m-%d %H:%M:%S";

/// Attach the exchange time zone to a wall-clock reading.
pub fn to_market_time(naive: NaiveDateTime) -> Option<MarketTime> {
    match Shanghai.from_local_datetime(&naive) {
        LocalResult::Single(dt) => Some(dt),
        LocalResult::Ambiguous(first, _) => Some(first),
        LocalResult::None => None,
    }
}

/// Trading days are anchored at local midnight.
pub fn trading_day_start(date: NaiveDate) -> Option<MarketTime> {
    date.and_hms_opt(0, 0, 0).and_then(to_market_time)
}

pub fn format_market_time(time: &MarketTime) -> String {
    time.format("%Y-%m-%d %H:%M").to_string()
}
