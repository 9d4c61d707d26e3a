//! Support/resistance and long-horizon important price levels.
//!
//! Both use centered-window extrema: a value is a level when it is the
//! highest (or lowest) value of a window centered on it. Windows that would
//! run past either end of the series are not evaluated.

use chrono::{DateTime, Duration, Utc};
use fxpulse_market_data::Candle;
use serde::{Deserialize, Serialize};

/// Indices of centered-window maxima.
///
/// The window spans `window / 2` values before the candidate and
/// `(window - 1) / 2` after it. With `strict`, the candidate must exceed
/// every neighbour; otherwise ties count.
pub fn centered_maxima(values: &[f64], window: usize, strict: bool) -> Vec<usize> {
    centered_extrema(values, window, strict, |candidate, other| candidate > other, |c, o| c >= o)
}

/// Indices of centered-window minima. See [`centered_maxima`].
pub fn centered_minima(values: &[f64], window: usize, strict: bool) -> Vec<usize> {
    centered_extrema(values, window, strict, |candidate, other| candidate < other, |c, o| c <= o)
}

fn centered_extrema(
    values: &[f64],
    window: usize,
    strict: bool,
    beats: fn(f64, f64) -> bool,
    matches: fn(f64, f64) -> bool,
) -> Vec<usize> {
    let window = window.max(1);
    let before = window / 2;
    let after = (window - 1) / 2;
    if values.len() < before + after + 1 {
        return Vec::new();
    }

    (before..values.len() - after)
        .filter(|&i| {
            let candidate = values[i];
            (i - before..=i + after)
                .filter(|&j| j != i)
                .all(|j| {
                    if strict {
                        beats(candidate, values[j])
                    } else {
                        matches(candidate, values[j])
                    }
                })
        })
        .collect()
}

/// Support and resistance picture around the current price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SupportResistance {
    /// Pivot lows, highest first.
    pub support: Vec<f64>,
    /// Pivot highs, highest first.
    pub resistance: Vec<f64>,
    pub nearest_support: f64,
    pub nearest_resistance: f64,
    /// Classic floor pivot `(H + L + C) / 3` of the last candle.
    pub pivot: f64,
    pub current_price: f64,
}

impl SupportResistance {
    /// Distance from the price down to the nearest support, in percent.
    pub fn support_distance_pct(&self) -> f64 {
        if self.current_price > 0.0 {
            (self.current_price - self.nearest_support) / self.current_price * 100.0
        } else {
            f64::INFINITY
        }
    }

    /// Distance from the price up to the nearest resistance, in percent.
    pub fn resistance_distance_pct(&self) -> f64 {
        if self.current_price > 0.0 {
            (self.nearest_resistance - self.current_price) / self.current_price * 100.0
        } else {
            f64::INFINITY
        }
    }
}

/// Pivot-based support and resistance.
///
/// A pivot high is a high strictly above the `span` highs on either side;
/// pivot lows mirror that. At most `max_levels` of each are kept. The
/// nearest support is the highest pivot low at or below the price, falling
/// back to the lowest close of the last `fallback_window` candles; the
/// nearest resistance mirrors that.
pub fn support_resistance(
    candles: &[Candle],
    span: usize,
    max_levels: usize,
    fallback_window: usize,
) -> Option<SupportResistance> {
    let last = candles.last()?;
    let price = last.close;
    let highs: Vec<f64> = candles.iter().map(|c| c.high).collect();
    let lows: Vec<f64> = candles.iter().map(|c| c.low).collect();
    let window = 2 * span + 1;

    let mut resistance: Vec<f64> = centered_maxima(&highs, window, true)
        .into_iter()
        .map(|i| highs[i])
        .collect();
    let mut support: Vec<f64> = centered_minima(&lows, window, true)
        .into_iter()
        .map(|i| lows[i])
        .collect();

    let recent = &candles[candles.len().saturating_sub(fallback_window.max(1))..];
    let recent_low = recent.iter().map(|c| c.close).fold(f64::INFINITY, f64::min);
    let recent_high = recent.iter().map(|c| c.close).fold(f64::NEG_INFINITY, f64::max);

    let nearest_support = support
        .iter()
        .copied()
        .filter(|l| *l <= price)
        .fold(None, |best: Option<f64>, l| Some(best.map_or(l, |b| b.max(l))))
        .unwrap_or(recent_low);
    let nearest_resistance = resistance
        .iter()
        .copied()
        .filter(|l| *l >= price)
        .fold(None, |best: Option<f64>, l| Some(best.map_or(l, |b| b.min(l))))
        .unwrap_or(recent_high);

    sort_descending(&mut resistance);
    sort_descending(&mut support);
    resistance.truncate(max_levels);
    support.truncate(max_levels);

    Some(SupportResistance {
        support,
        resistance,
        nearest_support,
        nearest_resistance,
        pivot: (last.high + last.low + last.close) / 3.0,
        current_price: price,
    })
}

fn sort_descending(values: &mut [f64]) {
    values.sort_by(|a, b| b.total_cmp(a));
}

/// Closing prices that were the highest or lowest close of a `window`-wide
/// centered window, restricted to candles within `lookback_years` of the
/// last candle. Sorted ascending, exact duplicates removed.
pub fn important_levels(candles: &[Candle], window: usize, lookback_years: u32) -> Vec<f64> {
    let Some(last) = candles.last() else {
        return Vec::new();
    };
    let cutoff = lookback_cutoff(last.timestamp, lookback_years);
    let closes: Vec<f64> = candles
        .iter()
        .filter(|c| c.timestamp >= cutoff && c.close.is_finite())
        .map(|c| c.close)
        .collect();

    let mut levels: Vec<f64> = centered_maxima(&closes, window, false)
        .into_iter()
        .chain(centered_minima(&closes, window, false))
        .map(|i| closes[i])
        .collect();
    levels.sort_by(f64::total_cmp);
    levels.dedup();
    levels
}

fn lookback_cutoff(last: DateTime<Utc>, years: u32) -> DateTime<Utc> {
    last - Duration::days(365 * i64::from(years))
}

/// True when `price` is within `tolerance` (relative) of any level.
pub fn is_at_important_level(price: f64, levels: &[f64], tolerance: f64) -> bool {
    levels
        .iter()
        .filter(|lvl| **lvl > 0.0)
        .any(|lvl| ((price - lvl) / lvl).abs() < tolerance)
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn candles_from_closes(closes: &[f64]) -> Vec<Candle> {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        closes
            .iter()
            .enumerate()
            .map(|(i, c)| {
                Candle::new(
                    start + Duration::hours(i as i64),
                    *c,
                    c + 0.001,
                    c - 0.001,
                    *c,
                    0.0,
                )
            })
            .collect()
    }

    #[test]
    fn test_centered_extrema_strict() {
        let values = [1.0, 2.0, 5.0, 2.0, 1.0, 0.5, 1.0];
        assert_eq!(centered_maxima(&values, 5, true), vec![2]);
        assert!(centered_minima(&values, 5, true).is_empty());
        assert_eq!(centered_minima(&values, 3, true), vec![5]);
    }

    #[test]
    fn test_centered_extrema_ties() {
        let values = [1.0, 1.0, 1.0];
        assert!(centered_maxima(&values, 3, true).is_empty());
        assert_eq!(centered_maxima(&values, 3, false), vec![1]);
    }

    #[test]
    fn test_short_series_has_no_extrema() {
        assert!(centered_maxima(&[1.0, 2.0], 30, false).is_empty());
    }

    #[test]
    fn test_support_resistance_nearest_levels() {
        // peak at 1.20, trough at 1.05, price ends at 1.10
        let closes = [1.10, 1.12, 1.15, 1.20, 1.15, 1.12, 1.08, 1.05, 1.08, 1.09, 1.10, 1.10];
        let candles = candles_from_closes(&closes);
        let sr = support_resistance(&candles, 2, 3, 20).unwrap();

        assert_eq!(sr.resistance.len(), 1);
        assert!((sr.nearest_resistance - 1.201).abs() < 1e-9);
        assert!((sr.nearest_support - 1.049).abs() < 1e-9);
        assert!(sr.support_distance_pct() > 0.0);
        assert!(sr.resistance_distance_pct() > 0.0);
    }

    #[test]
    fn test_support_resistance_fallback_to_recent_range() {
        let closes: Vec<f64> = (0..25).map(|i| 1.0 + i as f64 * 0.01).collect();
        let candles = candles_from_closes(&closes);
        let sr = support_resistance(&candles, 2, 3, 20).unwrap();
        assert!(sr.support.is_empty());
        assert!((sr.nearest_support - closes[5]).abs() < 1e-12);
        assert!((sr.nearest_resistance - closes[24]).abs() < 1e-12);
        assert_eq!(sr.resistance_distance_pct(), 0.0);
    }

    #[test]
    fn test_important_levels_sorted_and_deduplicated() {
        let mut closes = Vec::new();
        for _ in 0..3 {
            closes.extend((0..10).map(|i| 1.0 + i as f64 * 0.01));
            closes.extend((0..10).map(|i| 1.1 - i as f64 * 0.01));
        }
        let candles = candles_from_closes(&closes);
        let levels = important_levels(&candles, 5, 10);
        assert!(!levels.is_empty());
        assert!(levels.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_important_levels_lookback() {
        let start = Utc.with_ymd_and_hms(2010, 1, 1, 0, 0, 0).unwrap();
        let mut candles: Vec<Candle> = (0..5)
            .map(|i| {
                let c = if i == 2 { 9.0 } else { 1.0 };
                Candle::new(start + Duration::days(i), c, c, c, c, 0.0)
            })
            .collect();
        let recent = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        candles.extend((0..5).map(|i| {
            let c = if i == 2 { 2.0 } else { 1.5 };
            Candle::new(recent + Duration::days(i), c, c, c, c, 0.0)
        }));

        let levels = important_levels(&candles, 5, 1);
        assert!(levels.contains(&2.0));
        assert!(!levels.contains(&9.0));
    }

    #[test]
    fn test_at_important_level() {
        let levels = [1.0850, 1.1000];
        assert!(is_at_important_level(1.0855, &levels, 0.001));
        assert!(!is_at_important_level(1.0900, &levels, 0.001));
        assert!(!is_at_important_level(1.0, &[0.0], 0.001));
    }
}
