use crate::utils::MarketTime;

/// Number of price levels quoted on each side of the book.
pub const DEPTH_LEVELS: usize = 5;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DepthLevel {
    pub price: f64,
    pub volume: f64,
}

/// Valuation figures only the tilde-delimited feed carries.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct QuoteMetrics {
    pub market_value: f64,
    pub circulating_value: f64,
    pub total_shares: f64,
    pub circulating_shares: f64,
    pub turnover_rate: f64,
    pub pe_ratio: f64,
    pub pb_ratio: f64,
}

/// One realtime quote observation.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub name: String,
    pub current: f64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub prev_close: f64,
    pub timestamp: MarketTime,
    pub bids: [DepthLevel; DEPTH_LEVELS],
    pub asks: [DepthLevel; DEPTH_LEVELS],
    pub metrics: Option<QuoteMetrics>,
}

impl Sample {
    /// Bar accumulated from this quote, if every OHLC field is usable.
    pub fn to_bar(&self) -> Option<Bar> {
        let bar = Bar {
            open: self.open,
            high: self.high,
            low: self.low,
            close: self.current,
            timestamp: self.timestamp,
        };
        bar.has_positive_prices().then_some(bar)
    }
}

/// One OHLC aggregate: a trading day, or a single accumulated quote.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bar {
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub timestamp: MarketTime,
}

impl Bar {
    pub fn has_positive_prices(&self) -> bool {
        [self.open, self.high, self.low, self.close]
            .iter()
            .all(|price| *price > 0.0)
    }

    /// `low <= open, close <= high`. Upstream data is trusted, so this is
    /// informational only and never used to reject a bar.
    pub fn is_consistent(&self) -> bool {
        let body_high = self.open.max(self.close);
        let body_low = self.open.min(self.close);
        self.high >= body_high && body_low >= self.low
    }
}
