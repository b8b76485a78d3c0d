//! Indicator overlays over bar closes. Every output is aligned index for
//! index with its input.

use std::collections::VecDeque;

pub const MACD_FAST: usize = 12;
pub const MACD_SLOW: usize = 26;
pub const MACD_SIGNAL: usize = 9;

/// Simple moving average; `None` until `period` values are available.
pub fn moving_average(values: &[f64], period: usize) -> Vec<Option<f64>> {
    if period == 0 {
        return vec![None; values.len()];
    }

    let mut window = VecDeque::with_capacity(period);
    let mut sum = 0.0;
    values
        .iter()
        .map(|&value| {
            window.push_back(value);
            sum += value;
            if window.len() > period {
                sum -= window.pop_front().unwrap_or_default();
            }
            (window.len() == period).then(|| sum / period as f64)
        })
        .collect()
}

/// Exponential moving average seeded with the first value.
pub fn exponential_average(values: &[f64], period: usize) -> Vec<f64> {
    let alpha = 2.0 / (period as f64 + 1.0);
    let mut out = Vec::with_capacity(values.len());
    let mut prev: Option<f64> = None;
    for &value in values {
        let next = match prev {
            Some(prev) => alpha * value + (1.0 - alpha) * prev,
            None => value,
        };
        out.push(next);
        prev = Some(next);
    }
    out
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Macd {
    /// Fast EMA minus slow EMA.
    pub dif: Vec<f64>,
    /// Signal line, EMA of `dif`.
    pub dea: Vec<f64>,
    /// `2 * (dif - dea)`.
    pub histogram: Vec<f64>,
}

/// MACD(12, 26, 9). The EMAs are seeded from the first close, so every
/// index has a value.
pub fn macd(closes: &[f64]) -> Macd {
    let fast = exponential_average(closes, MACD_FAST);
    let slow = exponential_average(closes, MACD_SLOW);
    let dif: Vec<f64> = fast.iter().zip(&slow).map(|(f, s)| f - s).collect();
    let dea = exponential_average(&dif, MACD_SIGNAL);
    let histogram = dif.iter().zip(&dea).map(|(d, e)| 2.0 * (d - e)).collect();

    Macd {
        dif,
        dea,
        histogram,
    }
}

/// RSI over `period` price changes using the plain mean of gains and losses.
/// A window with no movement at all reads 50.
pub fn rsi(closes: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; closes.len()];
    if period == 0 || closes.len() <= period {
        return out;
    }

    let changes: Vec<f64> = closes.windows(2).map(|pair| pair[1] - pair[0]).collect();
    for (end, slot) in out.iter_mut().enumerate().skip(period) {
        let window = &changes[end - period..end];
        let gain: f64 = window.iter().filter(|c| **c > 0.0).sum::<f64>() / period as f64;
        let loss: f64 = -window.iter().filter(|c| **c < 0.0).sum::<f64>() / period as f64;

        *slot = Some(if loss == 0.0 {
            if gain == 0.0 {
                50.0
            } else {
                100.0
            }
        } else {
            100.0 - 100.0 / (1.0 + gain / loss)
        });
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    #[test]
    fn moving_average_waits_for_full_window() {
        let ma = moving_average(&[1.0, 2.0, 3.0, 4.0, 5.0], 3);
        assert_eq!(ma[..2], [None, None]);
        assert!((ma[2].unwrap() - 2.0).abs() < EPS);
        assert!((ma[3].unwrap() - 3.0).abs() < EPS);
        assert!((ma[4].unwrap() - 4.0).abs() < EPS);
    }

    #[test]
    fn zero_period_yields_nothing() {
        assert_eq!(moving_average(&[1.0, 2.0], 0), vec![None, None]);
        assert_eq!(rsi(&[1.0, 2.0], 0), vec![None, None]);
    }

    #[test]
    fn macd_of_flat_series_is_zero() {
        let result = macd(&[10.0; 40]);
        assert_eq!(result.dif.len(), 40);
        assert!(result.dif.iter().all(|v| v.abs() < EPS));
        assert!(result.histogram.iter().all(|v| v.abs() < EPS));
    }

    #[test]
    fn macd_turns_positive_in_uptrend() {
        let closes: Vec<f64> = (0..60).map(|i| 10.0 + i as f64 * 0.1).collect();
        let result = macd(&closes);
        let last = closes.len() - 1;
        assert!(result.dif[last] > 0.0);
        assert!(result.dif[last] > result.dif[10]);
        assert!(
            (result.histogram[last] - 2.0 * (result.dif[last] - result.dea[last])).abs() < EPS
        );
    }

    #[test]
    fn rsi_extremes() {
        let rising: Vec<f64> = (0..10).map(|i| i as f64).collect();
        let values = rsi(&rising, 6);
        assert!(values[..6].iter().all(Option::is_none));
        assert_eq!(values[6], Some(100.0));

        let falling: Vec<f64> = rising.iter().rev().copied().collect();
        assert_eq!(rsi(&falling, 6)[9], Some(0.0));
        assert_eq!(rsi(&[5.0; 8], 6)[7], Some(50.0));
    }

    #[test]
    fn rsi_balances_gains_and_losses() {
        // +1, -1, +1, -1 : equal mean gain and loss
        let values = rsi(&[10.0, 11.0, 10.0, 11.0, 10.0], 4);
        assert!((values[4].unwrap() - 50.0).abs() < EPS);
    }
}
