use academy::portfolio::Position;
use academy::types::{Instrument, OptionDetails, OptionRight};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_PERIOD: &str = "1mo";
pub const VALID_PERIODS: [&str; 10] = [
    "1d", "5d", "1mo", "3mo", "6mo", "1y", "2y", "5y", "ytd", "max",
];
pub const SEARCH_LIMIT: usize = 10;

#[derive(Debug, Error)]
pub enum MarketDataError {
    #[error("No data found for symbol {0}")]
    NotFound(String),
    #[error("Invalid period: {0}")]
    InvalidPeriod(String),
    #[error("No options available for {0}")]
    NoOptions(String),
    #[error("Market data request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Malformed market data response: {0}")]
    Malformed(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub symbol: String,
    pub price: f64,
    pub change: f64,
    pub change_percent: f64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub volume: u64,
    pub previous_close: f64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionContract {
    pub contract_symbol: String,
    pub strike: f64,
    pub last_price: f64,
    pub bid: f64,
    pub ask: f64,
    pub volume: u64,
    pub open_interest: u64,
    pub implied_volatility: f64,
    pub in_the_money: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionChain {
    pub symbol: String,
    pub expiration: NaiveDate,
    pub expirations: Vec<NaiveDate>,
    pub underlying_price: Option<f64>,
    pub calls: Vec<OptionContract>,
    pub puts: Vec<OptionContract>,
}

impl OptionChain {
    /// Contract matching the strike and right, if listed
    pub fn contract(&self, strike: f64, right: OptionRight) -> Option<&OptionContract> {
        let side = match right {
            OptionRight::Call => &self.calls,
            OptionRight::Put => &self.puts,
        };
        side.iter().find(|c| (c.strike - strike).abs() < 1e-6)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SymbolMatch {
    pub symbol: &'static str,
    pub name: &'static str,
}

const POPULAR_SYMBOLS: &[(&str, &str)] = &[
    ("AAPL", "Apple Inc."),
    ("MSFT", "Microsoft Corporation"),
    ("GOOGL", "Alphabet Inc."),
    ("AMZN", "Amazon.com Inc."),
    ("TSLA", "Tesla Inc."),
    ("META", "Meta Platforms Inc."),
    ("NVDA", "NVIDIA Corporation"),
    ("NFLX", "Netflix Inc."),
    ("AMD", "Advanced Micro Devices Inc."),
    ("INTC", "Intel Corporation"),
    ("SPY", "SPDR S&P 500 ETF Trust"),
    ("QQQ", "Invesco QQQ Trust"),
    ("IWM", "iShares Russell 2000 ETF"),
    ("DIS", "The Walt Disney Company"),
    ("BA", "The Boeing Company"),
    ("JPM", "JPMorgan Chase & Co."),
    ("V", "Visa Inc."),
    ("KO", "The Coca-Cola Company"),
];

/// Case-insensitive match on symbol or company name over the popular list
pub fn search(query: &str) -> Vec<SymbolMatch> {
    let query = query.trim().to_lowercase();
    if query.is_empty() {
        return Vec::new();
    }
    POPULAR_SYMBOLS
        .iter()
        .filter(|(symbol, name)| {
            symbol.to_lowercase().contains(&query) || name.to_lowercase().contains(&query)
        })
        .take(SEARCH_LIMIT)
        .map(|&(symbol, name)| SymbolMatch { symbol, name })
        .collect()
}

pub fn validate_period(period: Option<&str>) -> Result<&str, MarketDataError> {
    let period = period.unwrap_or(DEFAULT_PERIOD);
    if VALID_PERIODS.contains(&period) {
        Ok(period)
    } else {
        Err(MarketDataError::InvalidPeriod(period.to_string()))
    }
}

#[async_trait]
pub trait MarketData: Send + Sync {
    async fn quote(&self, symbol: &str) -> Result<Quote, MarketDataError>;

    async fn history(&self, symbol: &str, period: &str) -> Result<Vec<Candle>, MarketDataError>;

    /// Chain for `expiration`, or the nearest listed expiration
    async fn option_chain(
        &self,
        symbol: &str,
        expiration: Option<NaiveDate>,
    ) -> Result<OptionChain, MarketDataError>;

    /// Last premium of one contract
    async fn option_quote(
        &self,
        symbol: &str,
        details: &OptionDetails,
    ) -> Result<f64, MarketDataError> {
        let chain = self.option_chain(symbol, Some(details.expiry)).await?;
        chain
            .contract(details.strike, details.right)
            .map(|c| c.last_price)
            .ok_or_else(|| MarketDataError::NotFound(format!("{symbol} {}", details.strike)))
    }

    /// Live price for a held position. Failures are logged and reported as
    /// no price.
    async fn last_price(&self, position: &Position) -> Option<f64> {
        let result = match (position.instrument, &position.option_details) {
            (Instrument::Option, Some(details)) => {
                self.option_quote(&position.symbol, details).await
            }
            _ => self.quote(&position.symbol).await.map(|q| q.price),
        };
        match result {
            Ok(price) if price > 0.0 => Some(price),
            Ok(_) => None,
            Err(e) => {
                tracing::warn!("No live price for {}: {}", position.symbol, e);
                None
            }
        }
    }
}

// Yahoo Finance wire format

#[derive(Debug, Deserialize)]
struct ChartEnvelope {
    chart: ChartBody,
}

#[derive(Debug, Deserialize)]
struct ChartBody {
    result: Option<Vec<ChartResult>>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    meta: ChartMeta,
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChartMeta {
    symbol: String,
    regular_market_price: Option<f64>,
    chart_previous_close: Option<f64>,
    previous_close: Option<f64>,
    regular_market_time: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    #[serde(default)]
    quote: Vec<QuoteSeries>,
}

#[derive(Debug, Default, Deserialize)]
struct QuoteSeries {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<u64>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OptionsEnvelope {
    option_chain: OptionsBody,
}

#[derive(Debug, Deserialize)]
struct OptionsBody {
    result: Option<Vec<OptionsResult>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OptionsResult {
    underlying_symbol: String,
    #[serde(default)]
    expiration_dates: Vec<i64>,
    quote: Option<OptionsUnderlying>,
    #[serde(default)]
    options: Vec<OptionsExpiry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OptionsUnderlying {
    regular_market_price: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OptionsExpiry {
    expiration_date: i64,
    #[serde(default)]
    calls: Vec<RawContract>,
    #[serde(default)]
    puts: Vec<RawContract>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawContract {
    #[serde(default)]
    contract_symbol: String,
    strike: f64,
    last_price: Option<f64>,
    bid: Option<f64>,
    ask: Option<f64>,
    volume: Option<u64>,
    open_interest: Option<u64>,
    implied_volatility: Option<f64>,
    in_the_money: Option<bool>,
}

impl From<RawContract> for OptionContract {
    fn from(raw: RawContract) -> Self {
        Self {
            contract_symbol: raw.contract_symbol,
            strike: raw.strike,
            last_price: raw.last_price.unwrap_or(0.0),
            bid: raw.bid.unwrap_or(0.0),
            ask: raw.ask.unwrap_or(0.0),
            volume: raw.volume.unwrap_or(0),
            open_interest: raw.open_interest.unwrap_or(0),
            implied_volatility: raw.implied_volatility.unwrap_or(0.0),
            in_the_money: raw.in_the_money.unwrap_or(false),
        }
    }
}

fn date_of(ts: i64) -> Option<NaiveDate> {
    Utc.timestamp_opt(ts, 0).single().map(|dt| dt.date_naive())
}

fn first_chart(body: ChartEnvelope, symbol: &str) -> Result<ChartResult, MarketDataError> {
    body.chart
        .result
        .and_then(|r| r.into_iter().next())
        .ok_or_else(|| MarketDataError::NotFound(symbol.to_string()))
}

/// Daily candles, skipping days the provider left blank
fn parse_candles(body: ChartEnvelope, symbol: &str) -> Result<Vec<Candle>, MarketDataError> {
    let mut result = first_chart(body, symbol)?;
    let series = result.indicators.quote.pop().unwrap_or_default();
    let candles = result
        .timestamp
        .iter()
        .enumerate()
        .filter_map(|(i, &ts)| {
            let at = |v: &Vec<Option<f64>>| v.get(i).copied().flatten();
            Some(Candle {
                date: date_of(ts)?,
                open: at(&series.open)?,
                high: at(&series.high)?,
                low: at(&series.low)?,
                close: at(&series.close)?,
                volume: series.volume.get(i).copied().flatten().unwrap_or(0),
            })
        })
        .collect();
    Ok(candles)
}

fn parse_quote(body: ChartEnvelope, symbol: &str) -> Result<Quote, MarketDataError> {
    let result = first_chart(body, symbol)?;
    let meta = &result.meta;
    let timestamp = meta
        .regular_market_time
        .and_then(|ts| Utc.timestamp_opt(ts, 0).single())
        .unwrap_or_else(Utc::now);
    let quote_symbol = meta.symbol.clone();
    let market_price = meta.regular_market_price;
    let reference_close = meta.chart_previous_close.or(meta.previous_close);

    let candles = parse_candles(
        ChartEnvelope {
            chart: ChartBody {
                result: Some(vec![result]),
            },
        },
        symbol,
    )?;
    let last = candles
        .last()
        .ok_or_else(|| MarketDataError::NotFound(symbol.to_string()))?;

    let price = market_price.unwrap_or(last.close);
    // Previous session close, falling back to the chart reference close
    let previous_close = candles
        .len()
        .checked_sub(2)
        .map(|i| candles[i].close)
        .or(reference_close)
        .unwrap_or(last.open);
    let change = price - previous_close;
    let change_percent = if previous_close > 0.0 {
        change / previous_close * 100.0
    } else {
        0.0
    };

    Ok(Quote {
        symbol: quote_symbol,
        price,
        change,
        change_percent,
        open: last.open,
        high: last.high,
        low: last.low,
        volume: last.volume,
        previous_close,
        timestamp,
    })
}

fn parse_option_chain(body: OptionsEnvelope, symbol: &str) -> Result<OptionChain, MarketDataError> {
    let result = body
        .option_chain
        .result
        .and_then(|r| r.into_iter().next())
        .ok_or_else(|| MarketDataError::NotFound(symbol.to_string()))?;
    let expirations: Vec<NaiveDate> = result
        .expiration_dates
        .iter()
        .filter_map(|&ts| date_of(ts))
        .collect();
    let chain = result
        .options
        .into_iter()
        .next()
        .ok_or_else(|| MarketDataError::NoOptions(symbol.to_string()))?;
    if expirations.is_empty() {
        return Err(MarketDataError::NoOptions(symbol.to_string()));
    }
    let expiration = date_of(chain.expiration_date)
        .ok_or_else(|| MarketDataError::Malformed("expiration date".to_string()))?;

    Ok(OptionChain {
        symbol: result.underlying_symbol,
        expiration,
        expirations,
        underlying_price: result.quote.and_then(|q| q.regular_market_price),
        calls: chain.calls.into_iter().map(Into::into).collect(),
        puts: chain.puts.into_iter().map(Into::into).collect(),
    })
}

/// Yahoo Finance chart and options endpoints
pub struct YahooFinance {
    client: Client,
    base_url: String,
}

impl YahooFinance {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, MarketDataError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent("Mozilla/5.0 (compatible; options-academy/0.1)")
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn get<T>(&self, url: &str, query: &[(&str, String)], symbol: &str) -> Result<T, MarketDataError>
    where
        T: serde::de::DeserializeOwned,
    {
        tracing::debug!("GET {}", url);
        let response = self.client.get(url).query(query).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(MarketDataError::NotFound(symbol.to_string()));
        }
        let body = response.error_for_status()?.json::<T>().await?;
        Ok(body)
    }

    async fn chart(&self, symbol: &str, range: &str) -> Result<ChartEnvelope, MarketDataError> {
        let url = format!("{}/v8/finance/chart/{}", self.base_url, symbol);
        self.get(
            &url,
            &[("range", range.to_string()), ("interval", "1d".to_string())],
            symbol,
        )
        .await
    }
}

#[async_trait]
impl MarketData for YahooFinance {
    async fn quote(&self, symbol: &str) -> Result<Quote, MarketDataError> {
        let symbol = symbol.to_uppercase();
        let body = self.chart(&symbol, "5d").await?;
        parse_quote(body, &symbol)
    }

    async fn history(&self, symbol: &str, period: &str) -> Result<Vec<Candle>, MarketDataError> {
        let period = validate_period(Some(period))?;
        let symbol = symbol.to_uppercase();
        let body = self.chart(&symbol, period).await?;
        let candles = parse_candles(body, &symbol)?;
        if candles.is_empty() {
            return Err(MarketDataError::NotFound(symbol));
        }
        Ok(candles)
    }

    async fn option_chain(
        &self,
        symbol: &str,
        expiration: Option<NaiveDate>,
    ) -> Result<OptionChain, MarketDataError> {
        let symbol = symbol.to_uppercase();
        let url = format!("{}/v7/finance/options/{}", self.base_url, symbol);
        let query: Vec<(&str, String)> = expiration
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|dt| vec![("date", dt.and_utc().timestamp().to_string())])
            .unwrap_or_default();
        let body = self.get::<OptionsEnvelope>(&url, &query, &symbol).await?;
        parse_option_chain(body, &symbol)
    }
}

/// Fixed prices served from memory
#[derive(Debug, Clone, Default)]
pub struct StaticMarketData {
    prices: HashMap<String, f64>,
}

impl StaticMarketData {
    pub fn new() -> Self {
        Self::default()
    }

    /// A handful of well known tickers, for running without network access
    pub fn with_defaults() -> Self {
        [("AAPL", 190.0), ("MSFT", 410.0), ("SPY", 520.0), ("TSLA", 240.0)]
            .into_iter()
            .fold(Self::new(), |md, (s, p)| md.with_price(s, p))
    }

    pub fn with_price(mut self, symbol: &str, price: f64) -> Self {
        self.prices.insert(symbol.to_uppercase(), price);
        self
    }

    fn price(&self, symbol: &str) -> Result<f64, MarketDataError> {
        self.prices
            .get(&symbol.to_uppercase())
            .copied()
            .ok_or_else(|| MarketDataError::NotFound(symbol.to_uppercase()))
    }
}

#[async_trait]
impl MarketData for StaticMarketData {
    async fn quote(&self, symbol: &str) -> Result<Quote, MarketDataError> {
        let price = self.price(symbol)?;
        Ok(Quote {
            symbol: symbol.to_uppercase(),
            price,
            change: 0.0,
            change_percent: 0.0,
            open: price,
            high: price,
            low: price,
            volume: 0,
            previous_close: price,
            timestamp: Utc::now(),
        })
    }

    async fn history(&self, symbol: &str, period: &str) -> Result<Vec<Candle>, MarketDataError> {
        validate_period(Some(period))?;
        let price = self.price(symbol)?;
        Ok(vec![Candle {
            date: Utc::now().date_naive(),
            open: price,
            high: price,
            low: price,
            close: price,
            volume: 0,
        }])
    }

    async fn option_chain(
        &self,
        symbol: &str,
        _expiration: Option<NaiveDate>,
    ) -> Result<OptionChain, MarketDataError> {
        self.price(symbol)?;
        Err(MarketDataError::NoOptions(symbol.to_uppercase()))
    }
}
