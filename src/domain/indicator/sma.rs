//! Simple moving average of the price over a fixed window.
//!
//! Warmup: the first `period - 1` points are invalid.

use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType, invalid_point};
use crate::domain::market::PricePoint;

pub fn calculate_sma(points: &[PricePoint], period: usize) -> IndicatorSeries {
    let mut values = Vec::with_capacity(points.len());

    for (i, point) in points.iter().enumerate() {
        if period == 0 {
            values.push(invalid_point(point.date));
            continue;
        }
        if i + 1 < period {
            values.push(invalid_point(point.date));
        } else {
            let sum: f64 = points[i + 1 - period..=i].iter().map(|p| p.price).sum();
            values.push(IndicatorPoint {
                date: point.date,
                valid: true,
                value: sum / period as f64,
            });
        }
    }

    IndicatorSeries {
        indicator_type: IndicatorType::Sma(period),
        values,
    }
}
