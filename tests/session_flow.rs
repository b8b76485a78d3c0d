use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;

use stock_feed::app::{self, WatchOptions};
use stock_feed::chart::{ChartMode, Series};
use stock_feed::config::FeedConfig;
use stock_feed::fetch::{FetchResult, Fetcher, HistoryQuery, InstrumentId, QuoteSource};
use stock_feed::{AppError, ParseError};

fn sina_line(price: f64) -> String {
    format!(
        "var hq_str_sh600000=\"浦发银行,7.050,7.060,{price:.3},9.900,6.000,7.070,7.080,28733316,203290145.000,\
31900,7.070,96400,7.060,80100,7.050,60500,7.040,51300,7.030,\
73700,7.080,123200,7.090,146500,7.100,38900,7.110,59600,7.120,2024-03-01,15:00:00,00,\";"
    )
}

fn history_body(days: usize) -> String {
    let mut records: Vec<String> = (0..days)
        .map(|i| {
            let close = 10.0 + i as f64 * 0.1;
            format!(
                "[\"2024-02-{:02}\",\"{:.2}\",\"{:.2}\",\"{:.2}\",\"{:.2}\",\"1000\"]",
                i + 1,
                close - 0.05,
                close,
                close + 0.2,
                close - 0.2
            )
        })
        .collect();
    records.insert(3, "[\"2024-02-04\",\"n/a\",\"10.3\",\"10.5\",\"10.1\"]".to_string());

    format!(
        "{{\"code\":0,\"data\":{{\"sh600000\":{{\"qfqday\":[{}],\"qt\":{{\"sh600000\":[\"1\",\"浦发银行\",\"600000\"]}}}}}}}}",
        records.join(",")
    )
}

/// Serves queued realtime responses in order, repeating the last one.
#[derive(Default)]
struct ScriptedSource {
    realtime: Mutex<VecDeque<String>>,
    history: Option<String>,
    calls: AtomicUsize,
}

impl ScriptedSource {
    fn with_prices(prices: &[f64]) -> Self {
        Self {
            realtime: Mutex::new(prices.iter().map(|p| sina_line(*p)).collect()),
            ..Self::default()
        }
    }
}

#[async_trait]
impl QuoteSource for ScriptedSource {
    async fn fetch_realtime(&self, _instrument: &InstrumentId) -> FetchResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut queue = self.realtime.lock().unwrap();
        let line = if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        };
        line.ok_or_else(|| AppError::network("no quote scripted"))
    }

    async fn fetch_history(&self, _query: &HistoryQuery) -> FetchResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.history
            .clone()
            .ok_or_else(|| AppError::network("connection refused"))
    }
}

fn watch_options(code: &str, max_quotes: usize) -> WatchOptions {
    WatchOptions {
        code: code.to_string(),
        interval: Duration::from_millis(5),
        mode: ChartMode::Line,
        max_quotes: Some(max_quotes),
    }
}

fn date(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 2, day).unwrap()
}

#[tokio::test]
async fn watch_projects_polled_quotes() {
    let config = FeedConfig::default();
    let source = Arc::new(ScriptedSource::with_prices(&[7.0, 7.5, 7.25]));
    let (fetcher, mut events) = Fetcher::new(source.clone(), &config);

    let session = app::watch(&config, &fetcher, &mut events, &watch_options("sh600000", 3))
        .await
        .expect("watch completes");

    assert!(!fetcher.is_polling());
    assert_eq!(session.samples().len(), 3);
    assert_eq!(session.bars().closes(), vec![7.0, 7.5, 7.25]);

    let view = session.view().expect("line view");
    match &view.series {
        Series::Line(points) => {
            let prices: Vec<f64> = points.iter().map(|p| p.price).collect();
            assert_eq!(prices, vec![7.0, 7.5, 7.25]);
        }
        other => panic!("expected line series, got {other:?}"),
    }
    assert!((view.y_range.min - 6.95).abs() < 1e-9);
    assert!((view.y_range.max - 7.55).abs() < 1e-9);
}

#[tokio::test]
async fn window_evicts_oldest_quotes() {
    let mut config = FeedConfig::default();
    config.chart.window_capacity = 5;
    let prices: Vec<f64> = (1..=8).map(|i| 7.0 + i as f64 * 0.01).collect();
    let source = Arc::new(ScriptedSource::with_prices(&prices));
    let (fetcher, mut events) = Fetcher::new(source, &config);

    let mut session = app::watch(&config, &fetcher, &mut events, &watch_options("sh600000", 8))
        .await
        .expect("watch completes");

    let kept: Vec<f64> = session.samples().iter().map(|s| s.current).collect();
    assert_eq!(kept, prices[3..].to_vec());
    assert_eq!(session.bars().len(), 8);

    assert!(session.set_mode(ChartMode::Bars));
    assert_eq!(session.view().map(|v| v.len()), Some(8));
    assert_eq!(session.samples().len(), 5);
}

#[tokio::test]
async fn invalid_code_never_reaches_source() {
    let config = FeedConfig::default();
    let source = Arc::new(ScriptedSource::with_prices(&[7.0]));
    let (fetcher, mut events) = Fetcher::new(source.clone(), &config);

    let err = app::watch(&config, &fetcher, &mut events, &watch_options("xx123456", 1))
        .await
        .expect_err("bad prefix");
    assert!(err.is_validation());

    let err = app::history(&config, &fetcher, &mut events, "sh12345", date(1), date(20))
        .await
        .expect_err("short code");
    assert!(err.is_validation());

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(source.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn history_loads_visible_window() {
    let config = FeedConfig::default();
    let source = Arc::new(ScriptedSource {
        history: Some(history_body(25)),
        ..ScriptedSource::with_prices(&[7.0])
    });
    let (fetcher, mut events) = Fetcher::new(source, &config);

    let session = app::history(&config, &fetcher, &mut events, "sh600000", date(1), date(29))
        .await
        .expect("history loads");

    assert_eq!(session.name(), Some("浦发银行"));
    assert_eq!(session.bars().len(), 25);
    assert_eq!(session.skipped(), 1);

    let view = session.view().expect("bar view");
    assert_eq!(view.mode, ChartMode::Bars);
    match &view.series {
        Series::Bars {
            bars,
            window,
            tick_count,
        } => {
            assert_eq!(window.start_index, 5);
            assert_eq!(window.visible_count, 20);
            assert_eq!(bars.len(), 20);
            assert_eq!(*tick_count, 10);
        }
        other => panic!("expected bar series, got {other:?}"),
    }

    let overlays = session.overlays();
    assert_eq!(overlays.rsi.len(), 25);
    assert!(overlays.rsi[24].is_some());
}

#[tokio::test]
async fn history_transport_failure_is_reported() {
    let config = FeedConfig::default();
    let source = Arc::new(ScriptedSource::with_prices(&[7.0]));
    let (fetcher, mut events) = Fetcher::new(source, &config);

    let err = app::history(&config, &fetcher, &mut events, "sh600000", date(1), date(29))
        .await
        .expect_err("history fails");
    assert!(matches!(err, AppError::Network(_)), "got {err:?}");
}

#[tokio::test]
async fn empty_day_list_fails_the_history_request() {
    let config = FeedConfig::default();
    let source = Arc::new(ScriptedSource {
        history: Some(r#"{"code":0,"data":{"sh600000":{"qfqday":[]}}}"#.to_string()),
        ..ScriptedSource::with_prices(&[7.0])
    });
    let (fetcher, mut events) = Fetcher::new(source, &config);

    let err = app::history(&config, &fetcher, &mut events, "sh600000", date(1), date(29))
        .await
        .expect_err("empty history fails");
    assert!(
        matches!(err, AppError::Parse(ParseError::MissingField(ref key)) if key == "qfqday"),
        "got {err:?}"
    );
}
