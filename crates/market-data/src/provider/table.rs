//! Data-driven provider table.
//!
//! Every supported upstream is one [`ProviderSpec`] entry: endpoint
//! templates, symbol/interval/range mappings, body parsers, a per-call
//! timeout and a request quota. [`TableProvider`](super::TableProvider)
//! executes any entry generically, so adding a source is a table edit.
//!
//! Templates understand these placeholders:
//!
//! | Placeholder    | Value                                   |
//! |----------------|-----------------------------------------|
//! | `{symbol}`     | provider symbol, URL-encoded            |
//! | `{base}`       | base currency, upper case               |
//! | `{quote}`      | quote currency, upper case              |
//! | `{base_lower}` | base currency, lower case               |
//! | `{quote_lower}`| quote currency, lower case              |
//! | `{interval}`   | provider interval for the timeframe     |
//! | `{range}`      | provider range for the period           |
//! | `{limit}`      | candle count for period/timeframe       |
//! | `{api_key}`    | configured API key, URL-encoded         |

use std::fmt;
use std::time::Duration;

use urlencoding::encode;

use super::parsers::{self, QuoteParser, SeriesParser};
use crate::models::{AssetClass, Pair, Period, Timeframe};
use crate::registry::ProviderQuota;

const FOREX: &[AssetClass] = &[AssetClass::Forex];
const CRYPTO: &[AssetClass] = &[AssetClass::Crypto];
const FOREX_AND_CRYPTO: &[AssetClass] = &[AssetClass::Forex, AssetClass::Crypto];

/// Binance caps a klines request at 1000 rows.
const BINANCE_MAX_KLINES: usize = 1_000;

/// One row of the provider table.
pub struct ProviderSpec {
    pub id: &'static str,
    pub asset_classes: &'static [AssetClass],
    /// Lower is tried first.
    pub priority: u8,
    pub quote_endpoint: Option<&'static str>,
    pub series_endpoint: Option<&'static str>,
    pub symbol: fn(&Pair) -> String,
    /// `None` when the provider has no equivalent interval.
    pub interval: fn(Timeframe) -> Option<&'static str>,
    pub range: fn(Period) -> &'static str,
    pub quote_parser: Option<QuoteParser>,
    pub series_parser: Option<SeriesParser>,
    pub timeout: Duration,
    pub quota: ProviderQuota,
    pub requires_api_key: bool,
}

impl fmt::Debug for ProviderSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderSpec")
            .field("id", &self.id)
            .field("asset_classes", &self.asset_classes)
            .field("priority", &self.priority)
            .field("timeout", &self.timeout)
            .field("quota", &self.quota)
            .finish_non_exhaustive()
    }
}

impl ProviderSpec {
    pub fn supports_quotes(&self) -> bool {
        self.quote_endpoint.is_some() && self.quote_parser.is_some()
    }

    pub fn supports_series(&self) -> bool {
        self.series_endpoint.is_some() && self.series_parser.is_some()
    }

    /// Latest-price URL for `pair`, or `None` when the entry has no quote endpoint.
    pub fn quote_url(&self, pair: &Pair, api_key: Option<&str>) -> Option<String> {
        let template = self.quote_endpoint?;
        Some(self.render(template, pair, api_key, None))
    }

    /// Historical URL, or `None` when the entry cannot serve this timeframe.
    pub fn series_url(
        &self,
        pair: &Pair,
        period: Period,
        timeframe: Timeframe,
        api_key: Option<&str>,
    ) -> Option<String> {
        let template = self.series_endpoint?;
        let interval = (self.interval)(timeframe)?;
        let window = SeriesWindow {
            interval,
            range: (self.range)(period),
            limit: period.candle_count(timeframe).min(BINANCE_MAX_KLINES),
        };
        Some(self.render(template, pair, api_key, Some(window)))
    }

    fn render(
        &self,
        template: &str,
        pair: &Pair,
        api_key: Option<&str>,
        window: Option<SeriesWindow>,
    ) -> String {
        let symbol = (self.symbol)(pair);
        let mut url = template
            .replace("{symbol}", &encode(&symbol))
            .replace("{base_lower}", &pair.base.to_lowercase())
            .replace("{quote_lower}", &pair.quote.to_lowercase())
            .replace("{base}", &pair.base)
            .replace("{quote}", &pair.quote)
            .replace("{api_key}", &encode(api_key.unwrap_or_default()));
        if let Some(window) = window {
            url = url
                .replace("{interval}", window.interval)
                .replace("{range}", window.range)
                .replace("{limit}", &window.limit.to_string());
        }
        url
    }
}

struct SeriesWindow {
    interval: &'static str,
    range: &'static str,
    limit: usize,
}

// ----------------------------------------------------------------------------
// Symbol, interval and range mappings
// ----------------------------------------------------------------------------

fn plain_symbol(pair: &Pair) -> String {
    pair.symbol.to_string()
}

/// `EURUSD=X` for forex, `BTC-USD` for crypto.
pub fn yahoo_symbol(pair: &Pair) -> String {
    match pair.asset_class {
        AssetClass::Forex => format!("{}{}=X", pair.base, pair.quote),
        AssetClass::Crypto => format!("{}-{}", pair.base, pair.quote),
    }
}

/// Binance quotes USD pairs against USDT.
pub fn binance_symbol(pair: &Pair) -> String {
    let quote = if pair.quote == "USD" {
        "USDT"
    } else {
        &pair.quote[..]
    };
    format!("{}{}", pair.base, quote)
}

fn coingecko_symbol(pair: &Pair) -> String {
    parsers::coingecko_id(&pair.base)
        .map(str::to_string)
        .unwrap_or_else(|| pair.base.to_lowercase())
}

fn yahoo_interval(tf: Timeframe) -> Option<&'static str> {
    match tf {
        Timeframe::M1 => Some("1m"),
        Timeframe::M5 => Some("5m"),
        Timeframe::M15 => Some("15m"),
        Timeframe::M30 => Some("30m"),
        Timeframe::H1 => Some("60m"),
        Timeframe::H4 => None,
        Timeframe::D1 => Some("1d"),
        Timeframe::W1 => Some("1wk"),
    }
}

/// Alpha Vantage selects the resolution through the `function` parameter.
fn alpha_vantage_interval(tf: Timeframe) -> Option<&'static str> {
    match tf {
        Timeframe::M1 => Some("FX_INTRADAY&interval=1min"),
        Timeframe::M5 => Some("FX_INTRADAY&interval=5min"),
        Timeframe::M15 => Some("FX_INTRADAY&interval=15min"),
        Timeframe::M30 => Some("FX_INTRADAY&interval=30min"),
        Timeframe::H1 => Some("FX_INTRADAY&interval=60min"),
        Timeframe::H4 => None,
        Timeframe::D1 => Some("FX_DAILY"),
        Timeframe::W1 => Some("FX_WEEKLY"),
    }
}

fn binance_interval(tf: Timeframe) -> Option<&'static str> {
    match tf {
        Timeframe::M1 => Some("1m"),
        Timeframe::M5 => Some("5m"),
        Timeframe::M15 => Some("15m"),
        Timeframe::M30 => Some("30m"),
        Timeframe::H1 => Some("1h"),
        Timeframe::H4 => Some("4h"),
        Timeframe::D1 => Some("1d"),
        Timeframe::W1 => Some("1w"),
    }
}

fn no_interval(_tf: Timeframe) -> Option<&'static str> {
    None
}

/// Yahoo's range names match our period names.
fn period_range(period: Period) -> &'static str {
    period.as_str()
}

/// Alpha Vantage has no range parameter; `full` returns everything.
fn full_range(_period: Period) -> &'static str {
    "full"
}

const fn quota(hourly_limit: u32, daily_limit: u32, pacing_ms: u64) -> ProviderQuota {
    ProviderQuota {
        hourly_limit,
        daily_limit,
        pacing: Duration::from_millis(pacing_ms),
    }
}

// ----------------------------------------------------------------------------
// Table
// ----------------------------------------------------------------------------

pub static YAHOO: ProviderSpec = ProviderSpec {
    id: "YAHOO",
    asset_classes: FOREX_AND_CRYPTO,
    priority: 1,
    quote_endpoint: Some(
        "https://query1.finance.yahoo.com/v8/finance/chart/{symbol}?interval=1m&range=1d",
    ),
    series_endpoint: Some(
        "https://query1.finance.yahoo.com/v8/finance/chart/{symbol}?interval={interval}&range={range}",
    ),
    symbol: yahoo_symbol,
    interval: yahoo_interval,
    range: period_range,
    quote_parser: Some(parsers::yahoo_quote),
    series_parser: Some(parsers::yahoo_series),
    timeout: Duration::from_secs(10),
    quota: quota(100, 2_400, 1_000),
    requires_api_key: false,
};

pub static ALPHA_VANTAGE: ProviderSpec = ProviderSpec {
    id: "ALPHA_VANTAGE",
    asset_classes: FOREX,
    priority: 6,
    quote_endpoint: Some(
        "https://www.alphavantage.co/query?function=CURRENCY_EXCHANGE_RATE&from_currency={base}&to_currency={quote}&apikey={api_key}",
    ),
    series_endpoint: Some(
        "https://www.alphavantage.co/query?function={interval}&from_symbol={base}&to_symbol={quote}&outputsize={range}&apikey={api_key}",
    ),
    symbol: plain_symbol,
    interval: alpha_vantage_interval,
    range: full_range,
    quote_parser: Some(parsers::alpha_vantage_quote),
    series_parser: Some(parsers::alpha_vantage_series),
    timeout: Duration::from_secs(15),
    quota: quota(20, 20, 3_000),
    requires_api_key: true,
};

pub static EXCHANGERATE_API: ProviderSpec = ProviderSpec {
    id: "EXCHANGERATE_API",
    asset_classes: FOREX,
    priority: 2,
    quote_endpoint: Some("https://api.exchangerate-api.com/v4/latest/{base}"),
    series_endpoint: None,
    symbol: plain_symbol,
    interval: no_interval,
    range: period_range,
    quote_parser: Some(parsers::rates_table_quote),
    series_parser: None,
    timeout: Duration::from_secs(10),
    quota: quota(50, 1_200, 1_500),
    requires_api_key: false,
};

pub static EXCHANGERATE_HOST: ProviderSpec = ProviderSpec {
    id: "EXCHANGERATE_HOST",
    asset_classes: FOREX,
    priority: 5,
    quote_endpoint: Some("https://api.exchangerate.host/latest?base={base}&symbols={quote}"),
    series_endpoint: None,
    symbol: plain_symbol,
    interval: no_interval,
    range: period_range,
    quote_parser: Some(parsers::rates_table_quote),
    series_parser: None,
    timeout: Duration::from_secs(10),
    quota: quota(500, 12_000, 500),
    requires_api_key: false,
};

pub static FAWAZ_CURRENCY: ProviderSpec = ProviderSpec {
    id: "FAWAZ_CURRENCY",
    asset_classes: FOREX_AND_CRYPTO,
    priority: 4,
    quote_endpoint: Some(
        "https://cdn.jsdelivr.net/npm/@fawazahmed0/currency-api@latest/v1/currencies/{base_lower}.json",
    ),
    series_endpoint: None,
    symbol: plain_symbol,
    interval: no_interval,
    range: period_range,
    quote_parser: Some(parsers::fawaz_quote),
    series_parser: None,
    timeout: Duration::from_secs(10),
    quota: quota(1_000, 24_000, 200),
    requires_api_key: false,
};

pub static BINANCE: ProviderSpec = ProviderSpec {
    id: "BINANCE",
    asset_classes: CRYPTO,
    priority: 1,
    quote_endpoint: Some("https://api.binance.com/api/v3/ticker/price?symbol={symbol}"),
    series_endpoint: Some(
        "https://api.binance.com/api/v3/klines?symbol={symbol}&interval={interval}&limit={limit}",
    ),
    symbol: binance_symbol,
    interval: binance_interval,
    range: period_range,
    quote_parser: Some(parsers::binance_quote),
    series_parser: Some(parsers::binance_klines),
    timeout: Duration::from_secs(5),
    quota: quota(1_200, 28_800, 200),
    requires_api_key: false,
};

pub static COINGECKO: ProviderSpec = ProviderSpec {
    id: "COINGECKO",
    asset_classes: CRYPTO,
    priority: 3,
    quote_endpoint: Some(
        "https://api.coingecko.com/api/v3/simple/price?ids={symbol}&vs_currencies={quote_lower}&include_last_updated_at=true",
    ),
    series_endpoint: None,
    symbol: coingecko_symbol,
    interval: no_interval,
    range: period_range,
    quote_parser: Some(parsers::coingecko_quote),
    series_parser: None,
    timeout: Duration::from_secs(10),
    quota: quota(50, 1_200, 1_500),
    requires_api_key: false,
};

/// Every table entry, in declaration order.
pub static PROVIDER_TABLE: [&ProviderSpec; 7] = [
    &YAHOO,
    &ALPHA_VANTAGE,
    &EXCHANGERATE_API,
    &EXCHANGERATE_HOST,
    &FAWAZ_CURRENCY,
    &BINANCE,
    &COINGECKO,
];

/// Look up an entry by id, case-insensitively.
pub fn spec(id: &str) -> Option<&'static ProviderSpec> {
    PROVIDER_TABLE
        .iter()
        .copied()
        .find(|spec| spec.id.eq_ignore_ascii_case(id))
}
