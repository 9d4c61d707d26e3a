//! Response body parsers for the provider table.
//!
//! Each parser navigates a `serde_json::Value` and returns a plain error
//! string on shape mismatches; the HTTP provider wraps it into
//! `MarketDataError::Parse` with its own id.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde_json::Value;

use super::traits::PricePoint;
use crate::models::{Candle, Pair};

pub type QuoteParser = fn(&Value, &Pair) -> Result<PricePoint, String>;
pub type SeriesParser = fn(&Value, &Pair) -> Result<Vec<Candle>, String>;

/// Numbers arrive either as JSON numbers or as decimal strings.
fn as_price(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
    .filter(|p: &f64| p.is_finite())
}

fn unix_seconds(value: &Value) -> Option<DateTime<Utc>> {
    value
        .as_i64()
        .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
}

fn unix_millis(value: &Value) -> Option<DateTime<Utc>> {
    value
        .as_i64()
        .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
}

/// "2024-03-13 14:00:00" or "2024-03-13", read as UTC.
fn utc_datetime(text: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S")
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(text, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
        .map(|naive| Utc.from_utc_datetime(&naive))
}

fn yahoo_result(body: &Value) -> Result<&Value, String> {
    if let Some(err) = body.pointer("/chart/error").filter(|e| !e.is_null()) {
        let description = err
            .get("description")
            .and_then(Value::as_str)
            .unwrap_or("unknown error");
        return Err(format!("chart error: {}", description));
    }
    body.pointer("/chart/result/0")
        .ok_or_else(|| "missing chart.result".to_string())
}

/// Yahoo chart API: `chart.result[0].meta.regularMarketPrice`.
pub fn yahoo_quote(body: &Value, _pair: &Pair) -> Result<PricePoint, String> {
    let meta = yahoo_result(body)?
        .get("meta")
        .ok_or_else(|| "missing chart meta".to_string())?;
    let price = meta
        .get("regularMarketPrice")
        .and_then(as_price)
        .ok_or_else(|| "missing regularMarketPrice".to_string())?;
    let timestamp = meta.get("regularMarketTime").and_then(unix_seconds);
    Ok(PricePoint::new(price, timestamp))
}

fn column<'a>(quote: &'a Value, name: &str) -> Result<&'a Vec<Value>, String> {
    quote
        .get(name)
        .and_then(Value::as_array)
        .ok_or_else(|| format!("missing {} column", name))
}

/// Yahoo chart API: parallel `timestamp` and `indicators.quote[0]` arrays.
/// Rows with a null field are skipped.
pub fn yahoo_series(body: &Value, _pair: &Pair) -> Result<Vec<Candle>, String> {
    let result = yahoo_result(body)?;
    let timestamps = match result.get("timestamp").and_then(Value::as_array) {
        Some(ts) => ts,
        // Yahoo omits the array entirely for an empty range
        None => return Ok(Vec::new()),
    };
    let quote = result
        .pointer("/indicators/quote/0")
        .ok_or_else(|| "missing indicators.quote".to_string())?;
    let (opens, highs, lows, closes) = (
        column(quote, "open")?,
        column(quote, "high")?,
        column(quote, "low")?,
        column(quote, "close")?,
    );
    let volumes = quote.get("volume").and_then(Value::as_array);

    let mut candles = Vec::with_capacity(timestamps.len());
    for (i, ts) in timestamps.iter().enumerate() {
        let Some(timestamp) = unix_seconds(ts) else {
            continue;
        };
        let field = |col: &Vec<Value>| col.get(i).and_then(as_price);
        let (Some(open), Some(high), Some(low), Some(close)) =
            (field(opens), field(highs), field(lows), field(closes))
        else {
            continue;
        };
        let volume = volumes
            .and_then(|v| v.get(i))
            .and_then(as_price)
            .unwrap_or(0.0);
        candles.push(Candle::new(timestamp, open, high, low, close, volume));
    }
    Ok(candles)
}

/// Alpha Vantage reports throttling and bad keys as 200 responses.
fn alpha_vantage_error(body: &Value) -> Option<String> {
    ["Error Message", "Note", "Information"]
        .iter()
        .find_map(|key| body.get(*key).and_then(Value::as_str))
        .map(|msg| msg.to_string())
}

/// `CURRENCY_EXCHANGE_RATE`: `"Realtime Currency Exchange Rate"."5. Exchange Rate"`.
pub fn alpha_vantage_quote(body: &Value, _pair: &Pair) -> Result<PricePoint, String> {
    if let Some(msg) = alpha_vantage_error(body) {
        return Err(msg);
    }
    let rate = body
        .get("Realtime Currency Exchange Rate")
        .ok_or_else(|| "missing exchange rate block".to_string())?;
    let price = rate
        .get("5. Exchange Rate")
        .and_then(as_price)
        .ok_or_else(|| "missing exchange rate".to_string())?;
    let timestamp = rate
        .get("6. Last Refreshed")
        .and_then(Value::as_str)
        .and_then(utc_datetime);
    Ok(PricePoint::new(price, timestamp))
}

/// `FX_INTRADAY` / `FX_DAILY` / `FX_WEEKLY`: an object keyed by date under
/// a "Time Series FX (...)" member.
pub fn alpha_vantage_series(body: &Value, _pair: &Pair) -> Result<Vec<Candle>, String> {
    if let Some(msg) = alpha_vantage_error(body) {
        return Err(msg);
    }
    let rows = body
        .as_object()
        .and_then(|obj| {
            obj.iter()
                .find(|(key, _)| key.starts_with("Time Series FX"))
                .and_then(|(_, v)| v.as_object())
        })
        .ok_or_else(|| "missing time series block".to_string())?;

    let mut candles = Vec::with_capacity(rows.len());
    for (date, row) in rows {
        let Some(timestamp) = utc_datetime(date) else {
            continue;
        };
        let field = |name: &str| row.get(name).and_then(as_price);
        if let (Some(open), Some(high), Some(low), Some(close)) = (
            field("1. open"),
            field("2. high"),
            field("3. low"),
            field("4. close"),
        ) {
            candles.push(Candle::new(timestamp, open, high, low, close, 0.0));
        }
    }
    Ok(candles)
}

/// `rates[QUOTE]` keyed by upper-case code, shared by exchangerate-api and
/// exchangerate.host.
pub fn rates_table_quote(body: &Value, pair: &Pair) -> Result<PricePoint, String> {
    if body.get("success").and_then(Value::as_bool) == Some(false) {
        return Err("API request failed".to_string());
    }
    let price = body
        .get("rates")
        .and_then(|rates| rates.get(&*pair.quote))
        .and_then(as_price)
        .ok_or_else(|| format!("no rate for {}", pair.quote))?;
    let timestamp = body
        .get("time_last_updated")
        .and_then(unix_seconds)
        .or_else(|| body.get("timestamp").and_then(unix_seconds));
    Ok(PricePoint::new(price, timestamp))
}

/// `{"date": "...", "eur": {"usd": 1.08}}` keyed by lower-case codes.
///
/// The feed is daily, so its date is not used as the observation time.
pub fn fawaz_quote(body: &Value, pair: &Pair) -> Result<PricePoint, String> {
    let base = pair.base.to_lowercase();
    let quote = pair.quote.to_lowercase();
    let price = body
        .get(&base)
        .and_then(|table| table.get(&quote))
        .and_then(as_price)
        .ok_or_else(|| format!("no rate for {}/{}", base, quote))?;
    Ok(PricePoint::new(price, None))
}

/// `{"symbol": "BTCUSDT", "price": "65000.10"}`
pub fn binance_quote(body: &Value, _pair: &Pair) -> Result<PricePoint, String> {
    if let Some(msg) = body.get("msg").and_then(Value::as_str) {
        return Err(msg.to_string());
    }
    let price = body
        .get("price")
        .and_then(as_price)
        .ok_or_else(|| "missing price".to_string())?;
    Ok(PricePoint::new(price, None))
}

/// Klines: `[[open_time_ms, "o", "h", "l", "c", "v", ...], ...]`
pub fn binance_klines(body: &Value, _pair: &Pair) -> Result<Vec<Candle>, String> {
    let rows = body
        .as_array()
        .ok_or_else(|| "klines body is not an array".to_string())?;
    let candles = rows
        .iter()
        .filter_map(|row| {
            let row = row.as_array()?;
            let timestamp = unix_millis(row.first()?)?;
            let field = |i: usize| row.get(i).and_then(as_price);
            Some(Candle::new(
                timestamp,
                field(1)?,
                field(2)?,
                field(3)?,
                field(4)?,
                field(5).unwrap_or(0.0),
            ))
        })
        .collect();
    Ok(candles)
}

/// CoinGecko coin id for a catalog crypto base.
pub fn coingecko_id(base: &str) -> Option<&'static str> {
    match base {
        "BTC" => Some("bitcoin"),
        "ETH" => Some("ethereum"),
        "XRP" => Some("ripple"),
        "LTC" => Some("litecoin"),
        "SOL" => Some("solana"),
        _ => None,
    }
}

/// `{"bitcoin": {"usd": 65000, "last_updated_at": 1710338400}}`
pub fn coingecko_quote(body: &Value, pair: &Pair) -> Result<PricePoint, String> {
    let id = coingecko_id(&pair.base).ok_or_else(|| format!("no coin id for {}", pair.base))?;
    let entry = body
        .get(id)
        .ok_or_else(|| format!("missing entry for {}", id))?;
    let price = entry
        .get(pair.quote.to_lowercase())
        .and_then(as_price)
        .ok_or_else(|| format!("missing {} price", pair.quote))?;
    let timestamp = entry.get("last_updated_at").and_then(unix_seconds);
    Ok(PricePoint::new(price, timestamp))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::models::catalog;

    fn eurusd() -> Pair {
        catalog::lookup("EURUSD").unwrap()
    }

    fn btcusd() -> Pair {
        catalog::lookup("BTCUSD").unwrap()
    }

    #[test]
    fn test_yahoo_quote() {
        let body = json!({
            "chart": {
                "result": [{
                    "meta": {"regularMarketPrice": 1.0851, "regularMarketTime": 1710338400}
                }],
                "error": null
            }
        });
        let point = yahoo_quote(&body, &eurusd()).unwrap();
        assert_eq!(point.price, 1.0851);
        assert_eq!(point.timestamp.unwrap().timestamp(), 1710338400);
    }

    #[test]
    fn test_yahoo_chart_error() {
        let body = json!({
            "chart": {"result": null, "error": {"code": "Not Found", "description": "No data found"}}
        });
        let err = yahoo_quote(&body, &eurusd()).unwrap_err();
        assert!(err.contains("No data found"));
    }

    #[test]
    fn test_yahoo_series_skips_null_rows() {
        let body = json!({
            "chart": {
                "result": [{
                    "meta": {},
                    "timestamp": [1710288000, 1710291600, 1710295200],
                    "indicators": {"quote": [{
                        "open":   [1.0840, null, 1.0850],
                        "high":   [1.0860, 1.0870, 1.0870],
                        "low":    [1.0830, 1.0840, 1.0845],
                        "close":  [1.0850, 1.0860, 1.0865],
                        "volume": [0, 0, null]
                    }]}
                }],
                "error": null
            }
        });
        let candles = yahoo_series(&body, &eurusd()).unwrap();
        assert_eq!(candles.len(), 2);
        assert_eq!(candles[1].close, 1.0865);
        assert_eq!(candles[1].volume, 0.0);
    }

    #[test]
    fn test_alpha_vantage_quote() {
        let body = json!({
            "Realtime Currency Exchange Rate": {
                "1. From_Currency Code": "EUR",
                "5. Exchange Rate": "1.08520000",
                "6. Last Refreshed": "2024-03-13 14:00:01"
            }
        });
        let point = alpha_vantage_quote(&body, &eurusd()).unwrap();
        assert_eq!(point.price, 1.0852);
        assert_eq!(
            point.timestamp.unwrap().to_rfc3339(),
            "2024-03-13T14:00:01+00:00"
        );
    }

    #[test]
    fn test_alpha_vantage_throttle_note() {
        let body = json!({"Note": "Thank you for using Alpha Vantage! Our standard API call frequency is 5 calls per minute"});
        let err = alpha_vantage_quote(&body, &eurusd()).unwrap_err();
        assert!(err.contains("call frequency"));
    }

    #[test]
    fn test_alpha_vantage_daily_series() {
        let body = json!({
            "Meta Data": {},
            "Time Series FX (Daily)": {
                "2024-03-13": {"1. open": "1.0930", "2. high": "1.0960", "3. low": "1.0920", "4. close": "1.0950"},
                "2024-03-12": {"1. open": "1.0920", "2. high": "1.0940", "3. low": "1.0900", "4. close": "1.0930"}
            }
        });
        let candles = alpha_vantage_series(&body, &eurusd()).unwrap();
        assert_eq!(candles.len(), 2);
        assert!(candles.iter().all(|c| c.is_consistent()));
    }

    #[test]
    fn test_rates_table_quote() {
        let body = json!({"base": "EUR", "rates": {"USD": 1.0849, "GBP": 0.8581}, "time_last_updated": 1710288001});
        let point = rates_table_quote(&body, &eurusd()).unwrap();
        assert_eq!(point.price, 1.0849);
        assert!(point.timestamp.is_some());

        let missing = json!({"rates": {"GBP": 0.8581}});
        assert!(rates_table_quote(&missing, &eurusd()).is_err());
    }

    #[test]
    fn test_fawaz_quote_lowercase_keys() {
        let body = json!({"date": "2024-03-13", "btc": {"usd": 71234.5, "eur": 65432.1}});
        let point = fawaz_quote(&body, &btcusd()).unwrap();
        assert_eq!(point.price, 71234.5);
        assert!(point.timestamp.is_none());
    }

    #[test]
    fn test_binance_quote_and_error() {
        let body = json!({"symbol": "BTCUSDT", "price": "65000.10000000"});
        assert_eq!(binance_quote(&body, &btcusd()).unwrap().price, 65000.1);

        let err = json!({"code": -1121, "msg": "Invalid symbol."});
        assert_eq!(binance_quote(&err, &btcusd()).unwrap_err(), "Invalid symbol.");
    }

    #[test]
    fn test_binance_klines() {
        let body = json!([
            [1710288000000i64, "65000.0", "65500.0", "64800.0", "65200.0", "12.5", 1710291599999i64],
            [1710291600000i64, "65200.0", "65300.0", "64900.0", "65000.0", "8.1", 1710295199999i64],
            ["garbage"]
        ]);
        let candles = binance_klines(&body, &btcusd()).unwrap();
        assert_eq!(candles.len(), 2);
        assert_eq!(candles[0].volume, 12.5);
        assert_eq!(candles[0].timestamp.timestamp(), 1710288000);
    }

    #[test]
    fn test_coingecko_quote() {
        let body = json!({"bitcoin": {"usd": 65010.0, "last_updated_at": 1710338400}});
        let point = coingecko_quote(&body, &btcusd()).unwrap();
        assert_eq!(point.price, 65010.0);
        assert_eq!(coingecko_id("DOGE"), None);
    }
}
