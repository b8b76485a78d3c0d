use std::fmt;
use std::str::FromStr;

use crate::config::ChartConfig;
use crate::error::AppError;
use crate::quote::{Bar, Sample};
use crate::utils::MarketTime;

/// Half-width of the y range when every price in view is identical:
/// 1% of the price, but never less than one cent.
const FLAT_RANGE_RATIO: f64 = 0.01;
const FLAT_RANGE_FLOOR: f64 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChartMode {
    #[default]
    Line,
    Bars,
}

impl FromStr for ChartMode {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "line" => Ok(Self::Line),
            "bar" | "bars" | "candle" => Ok(Self::Bars),
            other => Err(AppError::validation(format!("unknown chart mode `{other}`"))),
        }
    }
}

impl fmt::Display for ChartMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Line => "line",
            Self::Bars => "bars",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisRange<T> {
    pub min: T,
    pub max: T,
}

impl AxisRange<f64> {
    pub fn span(&self) -> f64 {
        self.max - self.min
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinePoint {
    pub timestamp: MarketTime,
    pub price: f64,
}

/// Trailing slice of the bar series that is on screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BarWindow {
    pub start_index: usize,
    pub visible_count: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Series {
    Line(Vec<LinePoint>),
    Bars {
        bars: Vec<Bar>,
        window: BarWindow,
        tick_count: usize,
    },
}

/// Display-ready projection. Rendering it is the caller's business.
#[derive(Debug, Clone, PartialEq)]
pub struct View {
    pub mode: ChartMode,
    pub series: Series,
    pub x_range: AxisRange<MarketTime>,
    pub y_range: AxisRange<f64>,
}

impl View {
    pub fn len(&self) -> usize {
        match &self.series {
            Series::Line(points) => points.len(),
            Series::Bars { bars, .. } => bars.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Project stored data for `mode`. `None` means there is nothing to draw and
/// the previous view should stay on screen.
pub fn project(
    mode: ChartMode,
    samples: &[Sample],
    bars: &[Bar],
    config: &ChartConfig,
) -> Option<View> {
    match mode {
        ChartMode::Line => project_line(samples, config.margin_ratio),
        ChartMode::Bars => project_bars(bars, config),
    }
}

fn project_line(samples: &[Sample], margin_ratio: f64) -> Option<View> {
    let first = samples.first()?;
    let last = samples.last()?;
    let y_range = price_range(samples.iter().map(|s| s.current), margin_ratio)?;

    let points = samples
        .iter()
        .map(|s| LinePoint {
            timestamp: s.timestamp,
            price: s.current,
        })
        .collect();

    Some(View {
        mode: ChartMode::Line,
        series: Series::Line(points),
        x_range: AxisRange {
            min: first.timestamp,
            max: last.timestamp,
        },
        y_range,
    })
}

fn project_bars(bars: &[Bar], config: &ChartConfig) -> Option<View> {
    if bars.is_empty() {
        return None;
    }
    let window = bar_window(bars.len(), config.visible_bars);
    let visible = &bars[window.start_index..];
    let first = visible.first()?;
    let last = visible.last()?;

    let y_range = price_range(
        visible.iter().flat_map(|bar| [bar.low, bar.high]),
        config.margin_ratio,
    )?;

    Some(View {
        mode: ChartMode::Bars,
        series: Series::Bars {
            bars: visible.to_vec(),
            window,
            tick_count: config.max_ticks.min(window.visible_count),
        },
        x_range: AxisRange {
            min: first.timestamp,
            max: last.timestamp,
        },
        y_range,
    })
}

pub fn bar_window(total: usize, cap: usize) -> BarWindow {
    let visible_count = total.min(cap);
    BarWindow {
        start_index: total - visible_count,
        visible_count,
    }
}

/// `[min - m, max + m]` with `m = (max - min) * margin_ratio`. A flat set
/// gets a small symmetric band instead of a zero-height range. Non-finite
/// values are ignored.
pub fn price_range<I>(values: I, margin_ratio: f64) -> Option<AxisRange<f64>>
where
    I: IntoIterator<Item = f64>,
{
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    for value in values.into_iter().filter(|v| v.is_finite()) {
        min = min.min(value);
        max = max.max(value);
    }
    if min > max {
        return None;
    }

    let span = max - min;
    let margin = if span > 0.0 {
        span * margin_ratio
    } else {
        (max.abs() * FLAT_RANGE_RATIO).max(FLAT_RANGE_FLOOR)
    };

    Some(AxisRange {
        min: min - margin,
        max: max + margin,
    })
}
