use log::{debug, info};

use crate::chart::signals::{RSI_OVERBOUGHT, RSI_OVERSOLD};
use crate::chart::{self, Backtest, ChartMode, Macd, Signal, View};
use crate::config::ChartConfig;
use crate::fetch::{FeedEvent, RequestKind};
use crate::quote::Sample;
use crate::series::{BarStore, SampleBuffer};

pub const MA_PERIODS: [usize; 3] = [5, 10, 20];
pub const MA_CROSS_PERIODS: (usize, usize) = (5, 20);
pub const RSI_PERIOD: usize = 14;
pub const BACKTEST_CASH: f64 = 100_000.0;

/// Indicator values over the current bar closes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Overlays {
    /// One series per entry of [`MA_PERIODS`].
    pub moving_averages: Vec<(usize, Vec<Option<f64>>)>,
    pub macd: Macd,
    pub rsi: Vec<Option<f64>>,
    /// MA5 / MA20 crossings.
    pub ma_cross: Vec<Signal>,
    pub macd_cross: Vec<Signal>,
    /// RSI below 30 buys, above 70 sells.
    pub rsi_signals: Vec<Signal>,
}

impl Overlays {
    /// Each strategy replayed over `closes` with [`BACKTEST_CASH`].
    pub fn backtests(&self, closes: &[f64]) -> Vec<(&'static str, Backtest)> {
        [
            ("MA cross", &self.ma_cross),
            ("MACD cross", &self.macd_cross),
            ("RSI", &self.rsi_signals),
        ]
        .into_iter()
        .filter_map(|(label, signals)| {
            chart::backtest(closes, signals, BACKTEST_CASH).map(|result| (label, result))
        })
        .collect()
    }
}

/// Consumes fetcher events, owns the sample window and bar series, and keeps
/// the most recent projection.
#[derive(Debug)]
pub struct ChartSession {
    config: ChartConfig,
    mode: ChartMode,
    samples: SampleBuffer,
    bars: BarStore,
    name: Option<String>,
    latest: Option<Sample>,
    view: Option<View>,
    skipped: usize,
    last_error: Option<(RequestKind, String)>,
}

impl ChartSession {
    pub fn new(config: ChartConfig, mode: ChartMode) -> Self {
        Self {
            samples: SampleBuffer::new(config.window_capacity),
            bars: BarStore::new(),
            config,
            mode,
            name: None,
            latest: None,
            view: None,
            skipped: 0,
            last_error: None,
        }
    }

    /// Apply one event. Returns `true` when the view was re-projected.
    pub fn apply(&mut self, event: FeedEvent) -> bool {
        match event {
            FeedEvent::Quote(sample) => {
                self.remember(&sample);
                match sample.to_bar() {
                    Some(bar) => {
                        let seq = self.bars.append_one(bar);
                        debug!("accumulated bar #{seq}");
                    }
                    None => debug!("quote at {} not accumulated as a bar", sample.timestamp),
                }
                self.samples.append(sample);
                self.last_error = None;
                self.refresh()
            }
            FeedEvent::Snapshot(sample) => {
                self.remember(&sample);
                false
            }
            FeedEvent::HistoryStarted(query) => {
                debug!(
                    "history {} {}..{} requested, clearing series",
                    query.instrument, query.start, query.end
                );
                self.samples.clear();
                self.bars.clear();
                self.skipped = 0;
                false
            }
            FeedEvent::History { query, batch } => {
                if let Some(name) = batch.name {
                    self.name = Some(name);
                }
                info!(
                    "{}: {} daily bars loaded, {} skipped",
                    query.instrument,
                    batch.bars.len(),
                    batch.skipped.len()
                );
                self.bars.load_batch(batch.bars);
                self.last_error = None;
                self.refresh()
            }
            FeedEvent::RecordSkipped(_) => {
                self.skipped += 1;
                false
            }
            FeedEvent::Failed { kind, error } => {
                self.last_error = Some((kind, error.to_string()));
                // the stores were cleared when the request started
                if kind == RequestKind::History && self.samples.is_empty() && self.bars.is_empty()
                {
                    self.view = None;
                }
                false
            }
        }
    }

    /// Re-project the stored data under `mode`. Storage is left untouched.
    pub fn set_mode(&mut self, mode: ChartMode) -> bool {
        self.mode = mode;
        self.refresh()
    }

    /// Drop every stored sample and bar along with the current view.
    pub fn clear(&mut self) {
        self.samples.clear();
        self.bars.clear();
        self.view = None;
        self.skipped = 0;
    }

    pub fn overlays(&self) -> Overlays {
        let closes = self.bars.closes();
        let (short, long) = MA_CROSS_PERIODS;
        let macd = chart::macd(&closes);
        let rsi = chart::rsi(&closes, RSI_PERIOD);

        Overlays {
            moving_averages: MA_PERIODS
                .iter()
                .map(|&period| (period, chart::moving_average(&closes, period)))
                .collect(),
            ma_cross: chart::ma_cross(
                &chart::moving_average(&closes, short),
                &chart::moving_average(&closes, long),
            ),
            macd_cross: chart::macd_cross(&macd),
            rsi_signals: chart::rsi_thresholds(&rsi, RSI_OVERBOUGHT, RSI_OVERSOLD),
            macd,
            rsi,
        }
    }

    pub fn mode(&self) -> ChartMode {
        self.mode
    }

    pub fn view(&self) -> Option<&View> {
        self.view.as_ref()
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn latest(&self) -> Option<&Sample> {
        self.latest.as_ref()
    }

    pub fn samples(&self) -> &SampleBuffer {
        &self.samples
    }

    pub fn bars(&self) -> &BarStore {
        &self.bars
    }

    /// Historical records dropped since the last history request.
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    pub fn last_error(&self) -> Option<(RequestKind, &str)> {
        self.last_error
            .as_ref()
            .map(|(kind, message)| (*kind, message.as_str()))
    }

    fn remember(&mut self, sample: &Sample) {
        if !sample.name.is_empty() {
            self.name = Some(sample.name.clone());
        }
        self.latest = Some(sample.clone());
    }

    fn refresh(&mut self) -> bool {
        let samples: Vec<Sample> = self.samples.snapshot();
        let bars = self.bars.snapshot();
        match chart::project(self.mode, &samples, &bars, &self.config) {
            Some(view) => {
                self.view = Some(view);
                true
            }
            None => false,
        }
    }
}
