//! Trading signals derived from indicator series, and a long-only backtest
//! that replays them over bar closes.

use super::indicators::Macd;

pub const RSI_OVERBOUGHT: f64 = 70.0;
pub const RSI_OVERSOLD: f64 = 30.0;
pub const TRADING_DAYS: f64 = 252.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Signal {
    Buy,
    Sell,
    #[default]
    Hold,
}

impl Signal {
    /// `+1`, `-1` or `0`.
    pub fn value(self) -> i8 {
        match self {
            Signal::Buy => 1,
            Signal::Sell => -1,
            Signal::Hold => 0,
        }
    }
}

/// Buy where the short average moves above the long one, sell where it
/// drops back to or below it. Indices lacking either average count as
/// "not above".
pub fn ma_cross(short: &[Option<f64>], long: &[Option<f64>]) -> Vec<Signal> {
    let above: Vec<bool> = short
        .iter()
        .zip(long)
        .map(|pair| matches!(pair, (Some(s), Some(l)) if s > l))
        .collect();

    let mut out = vec![Signal::Hold; above.len()];
    for i in 1..above.len() {
        out[i] = match (above[i - 1], above[i]) {
            (false, true) => Signal::Buy,
            (true, false) => Signal::Sell,
            _ => Signal::Hold,
        };
    }
    out
}

/// Golden cross (DIF crosses above DEA) buys, death cross sells.
pub fn macd_cross(macd: &Macd) -> Vec<Signal> {
    let len = macd.dif.len().min(macd.dea.len());
    let mut out = vec![Signal::Hold; len];
    for i in 1..len {
        let (dif, dea) = (macd.dif[i], macd.dea[i]);
        let (prev_dif, prev_dea) = (macd.dif[i - 1], macd.dea[i - 1]);
        out[i] = if dif > dea && prev_dif <= prev_dea {
            Signal::Buy
        } else if dif < dea && prev_dif >= prev_dea {
            Signal::Sell
        } else {
            Signal::Hold
        };
    }
    out
}

/// Buy while oversold, sell while overbought.
pub fn rsi_thresholds(rsi: &[Option<f64>], overbought: f64, oversold: f64) -> Vec<Signal> {
    rsi.iter()
        .map(|value| match value {
            Some(v) if *v < oversold => Signal::Buy,
            Some(v) if *v > overbought => Signal::Sell,
            _ => Signal::Hold,
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Trade {
    pub index: usize,
    pub side: Signal,
    pub price: f64,
    pub shares: u64,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Backtest {
    pub initial_capital: f64,
    pub final_capital: f64,
    /// Percent.
    pub total_return: f64,
    /// Mean daily return scaled to a year, percent.
    pub annual_return: f64,
    /// Sample deviation of daily returns scaled to a year, percent.
    pub volatility: f64,
    pub sharpe_ratio: f64,
    /// Worst drop from a running peak, percent (zero or negative).
    pub max_drawdown: f64,
    pub trades: Vec<Trade>,
    /// Portfolio value after each close.
    pub equity: Vec<f64>,
}

/// Replay `signals` over `closes`: a buy spends all cash on whole shares, a
/// sell liquidates the position. `None` when there is nothing to replay.
pub fn backtest(closes: &[f64], signals: &[Signal], initial_cash: f64) -> Option<Backtest> {
    if closes.is_empty() {
        return None;
    }

    let mut cash = initial_cash;
    let mut position: u64 = 0;
    let mut trades = Vec::new();
    let mut equity = Vec::with_capacity(closes.len());

    for (index, (&price, &signal)) in closes.iter().zip(signals).enumerate() {
        match signal {
            Signal::Buy if cash > 0.0 && price > 0.0 => {
                let shares = (cash / price).floor() as u64;
                if shares > 0 {
                    let value = shares as f64 * price;
                    cash -= value;
                    position += shares;
                    trades.push(Trade {
                        index,
                        side: Signal::Buy,
                        price,
                        shares,
                        value,
                    });
                }
            }
            Signal::Sell if position > 0 => {
                let value = position as f64 * price;
                cash += value;
                trades.push(Trade {
                    index,
                    side: Signal::Sell,
                    price,
                    shares: position,
                    value,
                });
                position = 0;
            }
            _ => {}
        }
        equity.push(cash + position as f64 * price);
    }

    let final_capital = equity.last().copied().unwrap_or(initial_cash);
    let returns: Vec<f64> = equity
        .windows(2)
        .filter(|pair| pair[0] != 0.0)
        .map(|pair| pair[1] / pair[0] - 1.0)
        .collect();
    let mean = mean(&returns);
    let deviation = sample_deviation(&returns, mean);

    let mut peak = f64::NEG_INFINITY;
    let mut max_drawdown: f64 = 0.0;
    for &value in &equity {
        peak = peak.max(value);
        if peak > 0.0 {
            max_drawdown = max_drawdown.min(value / peak - 1.0);
        }
    }

    Some(Backtest {
        initial_capital: initial_cash,
        final_capital,
        total_return: if initial_cash == 0.0 {
            0.0
        } else {
            (final_capital - initial_cash) / initial_cash * 100.0
        },
        annual_return: mean * TRADING_DAYS * 100.0,
        volatility: deviation * TRADING_DAYS.sqrt() * 100.0,
        sharpe_ratio: if deviation == 0.0 {
            0.0
        } else {
            (mean * TRADING_DAYS) / (deviation * TRADING_DAYS.sqrt())
        },
        max_drawdown: max_drawdown * 100.0,
        trades,
        equity,
    })
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

fn sample_deviation(values: &[f64], mean: f64) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let squares: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();
    (squares / (values.len() - 1) as f64).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    #[test]
    fn ma_cross_marks_crossings_only() {
        let short = [None, Some(1.0), Some(3.0), Some(4.0), Some(2.0), Some(1.0)];
        let long = [None, Some(2.0), Some(2.0), Some(2.0), Some(2.0), Some(2.0)];

        let values: Vec<i8> = ma_cross(&short, &long).into_iter().map(Signal::value).collect();
        assert_eq!(values, vec![0, 0, 1, 0, -1, 0]);
    }

    #[test]
    fn ma_cross_buys_when_averages_first_appear_above() {
        let short = [None, Some(3.0)];
        let long = [None, Some(2.0)];
        assert_eq!(ma_cross(&short, &long), vec![Signal::Hold, Signal::Buy]);
    }

    #[test]
    fn macd_golden_and_death_cross() {
        let macd = Macd {
            dif: vec![-1.0, 0.5, 1.0, 0.2, -0.5],
            dea: vec![0.0, 0.0, 0.5, 0.4, 0.1],
            histogram: Vec::new(),
        };
        assert_eq!(
            macd_cross(&macd),
            vec![
                Signal::Hold,
                Signal::Buy,
                Signal::Hold,
                Signal::Sell,
                Signal::Hold
            ]
        );
    }

    #[test]
    fn rsi_thresholds_are_exclusive() {
        let rsi = [None, Some(25.0), Some(30.0), Some(50.0), Some(70.0), Some(85.0)];
        let values: Vec<i8> = rsi_thresholds(&rsi, RSI_OVERBOUGHT, RSI_OVERSOLD)
            .into_iter()
            .map(Signal::value)
            .collect();
        assert_eq!(values, vec![0, 1, 0, 0, 0, -1]);
    }

    #[test]
    fn backtest_buys_whole_shares_and_liquidates() {
        let closes = [10.0, 10.0, 12.0, 11.0];
        let signals = [Signal::Hold, Signal::Buy, Signal::Sell, Signal::Hold];

        let result = backtest(&closes, &signals, 105.0).unwrap();

        assert_eq!(result.trades.len(), 2);
        assert_eq!(result.trades[0].shares, 10);
        assert_eq!(result.trades[1].side, Signal::Sell);
        assert!((result.final_capital - 125.0).abs() < EPS);
        assert!((result.total_return - 20.0 / 105.0 * 100.0).abs() < EPS);
        assert_eq!(result.equity.len(), 4);
        assert!(result.max_drawdown.abs() < EPS);
    }

    #[test]
    fn backtest_tracks_drawdown_while_holding() {
        let closes = [10.0, 8.0, 9.0];
        let signals = [Signal::Buy, Signal::Hold, Signal::Hold];

        let result = backtest(&closes, &signals, 100.0).unwrap();

        assert!((result.max_drawdown + 20.0).abs() < EPS);
        assert!(result.volatility > 0.0);
        assert!(result.trades.iter().all(|t| t.side == Signal::Buy));
    }

    #[test]
    fn backtest_without_signals_keeps_cash() {
        let result = backtest(&[5.0, 6.0], &[Signal::Hold; 2], 50.0).unwrap();
        assert!((result.final_capital - 50.0).abs() < EPS);
        assert_eq!(result.sharpe_ratio, 0.0);
        assert!(backtest(&[], &[], 50.0).is_none());
    }
}
