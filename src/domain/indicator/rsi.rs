//! RSI (Relative Strength Index) with Wilder's smoothing.
//!
//! - First average: simple mean of gains/losses over the first n changes
//! - Subsequent: avg = (prev_avg * (n-1) + current) / n
//!
//! Formula: RSI = 100 - (100 / (1 + avg_gain / avg_loss))
//! If avg_loss == 0 the ratio is pinned at 100, so RSI tops out at 100 - 100/101
//!
//! Warmup: first n points are invalid (need n price changes).

use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType, invalid_point};
use crate::domain::market::PricePoint;

/// Ratio used when there are no losses in the window.
const NO_LOSS_RS: f64 = 100.0;

/// Highest value the indicator can report.
pub const RSI_CEILING: f64 = 100.0 - 100.0 / (1.0 + NO_LOSS_RS);

fn rsi_value(avg_gain: f64, avg_loss: f64) -> f64 {
    let rs = if avg_loss == 0.0 {
        NO_LOSS_RS
    } else {
        avg_gain / avg_loss
    };
    100.0 - (100.0 / (1.0 + rs))
}

pub fn calculate_rsi(points: &[PricePoint], period: usize) -> IndicatorSeries {
    if period == 0 || points.len() < 2 {
        return IndicatorSeries {
            indicator_type: IndicatorType::Rsi(period),
            values: points.iter().map(|p| invalid_point(p.date)).collect(),
        };
    }

    let mut values = Vec::with_capacity(points.len());
    values.push(invalid_point(points[0].date));

    let (gains, losses): (Vec<f64>, Vec<f64>) = points
        .windows(2)
        .map(|w| {
            let change = w[1].price - w[0].price;
            (change.max(0.0), (-change).max(0.0))
        })
        .unzip();

    let mut avg_gain = 0.0;
    let mut avg_loss = 0.0;

    for (i, point) in points.iter().enumerate().skip(1) {
        let idx = i - 1;

        if idx + 1 < period {
            values.push(invalid_point(point.date));
            continue;
        }
        if idx + 1 == period {
            avg_gain = gains[..period].iter().sum::<f64>() / period as f64;
            avg_loss = losses[..period].iter().sum::<f64>() / period as f64;
        } else {
            avg_gain = (avg_gain * (period - 1) as f64 + gains[idx]) / period as f64;
            avg_loss = (avg_loss * (period - 1) as f64 + losses[idx]) / period as f64;
        }
        values.push(IndicatorPoint {
            date: point.date,
            valid: true,
            value: rsi_value(avg_gain, avg_loss),
        });
    }

    IndicatorSeries {
        indicator_type: IndicatorType::Rsi(period),
        values,
    }
}
