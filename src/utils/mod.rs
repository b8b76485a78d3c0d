pub mod time;

pub use time::{format_market_time, to_market_time, trading_day_start, MarketTime};
