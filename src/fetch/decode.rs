//! Wire decoding for the realtime quote line and the daily history document.
//!
//! Realtime numeric fields that fail to convert decode as `0.0`; only the
//! timestamp and negative prices reject a quote. Historical records are
//! validated field by field and skipped individually.

use chrono::{NaiveDate, NaiveDateTime};
use log::{debug, warn};
use serde_json::Value;

use crate::config::QuoteFormat;
use crate::error::ParseError;
use crate::quote::{Bar, DepthLevel, QuoteMetrics, Sample};
use crate::utils::time::{to_market_time, trading_day_start, DATETIME_FMT, DATE_FMT};

use super::instrument::InstrumentId;

/// Minimum field count of any realtime payload.
pub const MIN_REALTIME_FIELDS: usize = 32;

/// Tilde feed payloads must reach the P/B column.
const TENCENT_MIN_FIELDS: usize = 47;

/// Tilde feed quotes market values in units of 100 million.
const TENCENT_VALUE_UNIT: f64 = 1e8;

/// Outcome of decoding one history document.
#[derive(Debug, Clone, Default)]
pub struct HistoryBatch {
    pub name: Option<String>,
    pub bars: Vec<Bar>,
    pub skipped: Vec<ParseError>,
}

pub fn parse_realtime(raw: &str, format: QuoteFormat) -> Result<Sample, ParseError> {
    let payload = quoted_payload(raw)?;
    let fields: Vec<&str> = payload.split(format.delimiter()).collect();

    let required = match format {
        QuoteFormat::Sina => MIN_REALTIME_FIELDS,
        QuoteFormat::Tencent => TENCENT_MIN_FIELDS,
    };
    if fields.len() < required {
        return Err(ParseError::MalformedRealtime(format!(
            "expected at least {required} fields, got {}",
            fields.len()
        )));
    }

    let sample = match format {
        QuoteFormat::Sina => decode_sina(&fields)?,
        QuoteFormat::Tencent => decode_tencent(&fields)?,
    };

    let prices = [
        sample.current,
        sample.open,
        sample.high,
        sample.low,
        sample.prev_close,
    ];
    if prices.iter().any(|price| *price < 0.0) {
        return Err(ParseError::MalformedRealtime(format!(
            "negative price in quote for {}",
            sample.name
        )));
    }

    Ok(sample)
}

fn quoted_payload(raw: &str) -> Result<&str, ParseError> {
    let start = raw
        .find('"')
        .ok_or_else(|| ParseError::MalformedRealtime("no quoted payload".to_string()))?;
    let rest = &raw[start + 1..];
    let end = rest
        .find('"')
        .ok_or_else(|| ParseError::MalformedRealtime("unterminated quoted payload".to_string()))?;

    let payload = &rest[..end];
    if payload.trim().is_empty() {
        return Err(ParseError::MalformedRealtime(
            "empty payload, instrument may be unknown or delisted".to_string(),
        ));
    }
    Ok(payload)
}

// name,open,prev_close,current,high,low,bid,ask,volume,amount,
// (bid volume,bid price) x5, (ask volume,ask price) x5, date, time
fn decode_sina(fields: &[&str]) -> Result<Sample, ParseError> {
    let number = |idx: usize| parse_or_zero(fields[idx]);
    let level = |base: usize, n: usize| DepthLevel {
        volume: number(base + n * 2),
        price: number(base + n * 2 + 1),
    };

    let stamp = format!("{} {}", fields[30].trim(), fields[31].trim());
    let timestamp = NaiveDateTime::parse_from_str(&stamp, DATETIME_FMT)
        .ok()
        .and_then(to_market_time)
        .ok_or(ParseError::InvalidTimestamp(stamp))?;

    Ok(Sample {
        name: fields[0].trim().to_string(),
        open: number(1),
        prev_close: number(2),
        current: number(3),
        high: number(4),
        low: number(5),
        timestamp,
        bids: std::array::from_fn(|n| level(10, n)),
        asks: std::array::from_fn(|n| level(20, n)),
        metrics: None,
    })
}

// 1 name, 3 current, 4 prev_close, 5 open, 9..=18 bids (price,volume),
// 19..=28 asks, 30 yyyyMMddHHmmss, 33 high, 34 low, 38 turnover,
// 39 P/E, 44 circulating value, 45 market value, 46 P/B
fn decode_tencent(fields: &[&str]) -> Result<Sample, ParseError> {
    let number = |idx: usize| parse_or_zero(fields[idx]);
    let level = |base: usize, n: usize| DepthLevel {
        price: number(base + n * 2),
        volume: number(base + n * 2 + 1),
    };

    let stamp = fields[30].trim();
    let timestamp = NaiveDateTime::parse_from_str(stamp, "%Y%m%d%H%M%S")
        .ok()
        .and_then(to_market_time)
        .ok_or_else(|| ParseError::InvalidTimestamp(stamp.to_string()))?;

    let current = number(3);
    let market_value = number(45) * TENCENT_VALUE_UNIT;
    let circulating_value = number(44) * TENCENT_VALUE_UNIT;
    let total_shares = ratio_or_zero(market_value, current, "total shares");
    let circulating_shares = ratio_or_zero(circulating_value, total_shares, "circulating shares");

    Ok(Sample {
        name: fields[1].trim().to_string(),
        current,
        prev_close: number(4),
        open: number(5),
        high: number(33),
        low: number(34),
        timestamp,
        bids: std::array::from_fn(|n| level(9, n)),
        asks: std::array::from_fn(|n| level(19, n)),
        metrics: Some(QuoteMetrics {
            market_value,
            circulating_value,
            total_shares,
            circulating_shares,
            turnover_rate: number(38),
            pe_ratio: number(39),
            pb_ratio: number(46),
        }),
    })
}

fn ratio_or_zero(numerator: f64, denominator: f64, label: &str) -> f64 {
    if denominator.abs() < f64::EPSILON {
        debug!("{label} undefined for zero denominator, using 0");
        0.0
    } else {
        numerator / denominator
    }
}

/// Decode a daily history document rooted at `data → <id> → <day_key>`.
///
/// Structural failures abort the batch; a bad record only drops itself.
pub fn parse_history_payload(
    body: &str,
    instrument: &InstrumentId,
    day_key: &str,
) -> Result<HistoryBatch, ParseError> {
    if body.trim().is_empty() {
        return Err(ParseError::MissingField("data".to_string()));
    }

    let root: Value = serde_json::from_str(body)
        .map_err(|err| ParseError::MalformedHistorical(err.to_string()))?;

    let data = root
        .get("data")
        .ok_or_else(|| ParseError::MissingField("data".to_string()))?;
    let entry = data
        .get(instrument.as_str())
        .ok_or_else(|| ParseError::MissingField(instrument.to_string()))?;

    let days = entry
        .get(day_key)
        .or_else(|| entry.get("day"))
        .ok_or_else(|| ParseError::MissingField(day_key.to_string()))?
        .as_array()
        .ok_or_else(|| {
            ParseError::MalformedHistorical(format!("`{day_key}` is not an array"))
        })?;
    if days.is_empty() {
        return Err(ParseError::MissingField(day_key.to_string()));
    }

    let name = entry
        .get("qt")
        .and_then(|qt| qt.get(instrument.as_str()))
        .and_then(|fields| fields.get(1))
        .map(value_to_string)
        .filter(|name| !name.is_empty());

    let mut batch = HistoryBatch {
        name,
        bars: Vec::with_capacity(days.len()),
        skipped: Vec::new(),
    };

    for (index, record) in days.iter().enumerate() {
        match parse_historical_bar(index, record) {
            Ok(bar) => {
                if !bar.is_consistent() {
                    debug!("record {index} has OHLC outside its range, kept as reported");
                }
                batch.bars.push(bar);
            }
            Err(err) => {
                warn!("{err}");
                batch.skipped.push(err);
            }
        }
    }

    Ok(batch)
}

/// Decode one `[date, open, close, high, low, ...]` record.
pub fn parse_historical_bar(index: usize, record: &Value) -> Result<Bar, ParseError> {
    let invalid = |reason: String| ParseError::InvalidRecord { index, reason };

    let row = record
        .as_array()
        .ok_or_else(|| invalid("record is not an array".to_string()))?;
    if row.len() < 5 {
        return Err(invalid(format!("expected 5 fields, got {}", row.len())));
    }

    let date_text = value_to_string(&row[0]);
    let timestamp = NaiveDate::parse_from_str(date_text.trim(), DATE_FMT)
        .ok()
        .and_then(trading_day_start)
        .ok_or_else(|| invalid(format!("invalid date `{date_text}`")))?;

    let price = |position: usize, label: &str| -> Result<f64, ParseError> {
        let text = value_to_string(&row[position]);
        match parse_f64(text.trim()) {
            Some(value) if value > 0.0 => Ok(value),
            _ => Err(invalid(format!(
                "{label} price `{text}` is not a positive number"
            ))),
        }
    };

    Ok(Bar {
        open: price(1, "open")?,
        close: price(2, "close")?,
        high: price(3, "high")?,
        low: price(4, "low")?,
        timestamp,
    })
}

pub fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

pub fn parse_f64(value: &str) -> Option<f64> {
    value.parse::<f64>().ok().filter(|v| v.is_finite())
}

fn parse_or_zero(value: &str) -> f64 {
    parse_f64(value.trim()).unwrap_or(0.0)
}
