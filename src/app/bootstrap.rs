use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use log::{info, warn};

use crate::chart::{ChartMode, Series, View};
use crate::config::FeedConfig;
use crate::error::{AppError, Result};
use crate::fetch::{FeedEvent, FeedEvents, Fetcher, HttpQuoteSource, RequestKind};
use crate::utils::time::format_market_time;

use super::session::ChartSession;

#[derive(Debug, Clone)]
pub struct WatchOptions {
    pub code: String,
    pub interval: Duration,
    pub mode: ChartMode,
    /// Stop after this many polled quotes; run until Ctrl-C when unset.
    pub max_quotes: Option<usize>,
}

/// Fetcher wired to the HTTP quote endpoints from `config`.
pub fn http_fetcher(config: &FeedConfig) -> Result<(Fetcher, FeedEvents)> {
    let source = HttpQuoteSource::new(config.realtime.clone(), config.history.clone())?;
    Ok(Fetcher::new(Arc::new(source), config))
}

/// Poll one instrument and log each refreshed view until interrupted or
/// `max_quotes` quotes have arrived.
pub async fn watch(
    config: &FeedConfig,
    fetcher: &Fetcher,
    events: &mut FeedEvents,
    options: &WatchOptions,
) -> Result<ChartSession> {
    fetcher.start_polling(&options.code, options.interval)?;
    info!(
        "watching {} every {:?} ({} mode)",
        options.code, options.interval, options.mode
    );

    let mut session = ChartSession::new(config.chart.clone(), options.mode);
    let mut quotes = 0usize;
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else { break };
                let is_quote = matches!(event, FeedEvent::Quote(_));
                if session.apply(event) {
                    log_view(&session);
                }
                if is_quote {
                    quotes += 1;
                    if options.max_quotes.is_some_and(|limit| quotes >= limit) {
                        break;
                    }
                }
            }
            _ = &mut shutdown => {
                info!("interrupted");
                break;
            }
        }
    }

    fetcher.stop_polling();
    Ok(session)
}

/// Prime metadata with one quote, then load daily bars for `[start, end]`.
pub async fn history(
    config: &FeedConfig,
    fetcher: &Fetcher,
    events: &mut FeedEvents,
    code: &str,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<ChartSession> {
    fetcher.fetch_realtime_once(code)?;
    fetcher.fetch_historical(code, start, end)?;

    let mut session = ChartSession::new(config.chart.clone(), ChartMode::Bars);
    while let Some(event) = events.recv().await {
        match event {
            FeedEvent::Failed {
                kind: RequestKind::History,
                error,
            } => return Err(error),
            FeedEvent::Failed { kind, error } => {
                warn!("{kind:?} request failed: {error}");
            }
            event => {
                let done = matches!(event, FeedEvent::History { .. });
                if session.apply(event) {
                    log_view(&session);
                }
                if done {
                    log_overlays(&session);
                    return Ok(session);
                }
            }
        }
    }

    Err(AppError::Cancelled)
}

fn log_view(session: &ChartSession) {
    let Some(view) = session.view() else {
        return;
    };
    info!("{}", describe_view(session.name().unwrap_or("-"), view));
}

pub fn describe_view(name: &str, view: &View) -> String {
    let detail = match &view.series {
        Series::Line(points) => {
            let last = points.last().map(|p| p.price).unwrap_or_default();
            format!("{} points, last {:.3}", points.len(), last)
        }
        Series::Bars {
            bars,
            window,
            tick_count,
        } => {
            let last = bars.last().map(|bar| bar.close).unwrap_or_default();
            format!(
                "bars {}..{}, {} ticks, last close {:.3}",
                window.start_index,
                window.start_index + window.visible_count,
                tick_count,
                last
            )
        }
    };

    format!(
        "{name} [{}] {detail}; x {} .. {}; y {:.3} .. {:.3}",
        view.mode,
        format_market_time(&view.x_range.min),
        format_market_time(&view.x_range.max),
        view.y_range.min,
        view.y_range.max
    )
}

fn log_overlays(session: &ChartSession) {
    let overlays = session.overlays();
    let last = |values: &[Option<f64>]| {
        values
            .last()
            .copied()
            .flatten()
            .map(|v| format!("{v:.3}"))
            .unwrap_or_else(|| "-".to_string())
    };

    for (period, values) in &overlays.moving_averages {
        info!("MA{period}: {}", last(values));
    }
    if let (Some(dif), Some(dea), Some(hist)) = (
        overlays.macd.dif.last(),
        overlays.macd.dea.last(),
        overlays.macd.histogram.last(),
    ) {
        info!("MACD: dif {dif:.3} dea {dea:.3} hist {hist:.3}");
    }
    info!("RSI{}: {}", super::session::RSI_PERIOD, last(&overlays.rsi));

    for (label, result) in overlays.backtests(&session.bars().closes()) {
        info!(
            "{label} backtest: {} trades, return {:.2}%, max drawdown {:.2}%, sharpe {:.2}",
            result.trades.len(),
            result.total_return,
            result.max_drawdown,
            result.sharpe_ratio
        );
    }
}
