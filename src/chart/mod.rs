//! Pure derivations from stored samples and bars: the renderable view,
//! indicator overlays and the signals built on them.

pub mod indicators;
pub mod projector;
pub mod signals;

pub use indicators::{macd, moving_average, rsi, Macd};
pub use signals::{backtest, ma_cross, macd_cross, rsi_thresholds, Backtest, Signal, Trade};
pub use projector::{
    bar_window, price_range, project, AxisRange, BarWindow, ChartMode, LinePoint, Series, View,
};
