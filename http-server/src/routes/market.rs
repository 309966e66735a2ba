use axum::extract::State;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::{ApiResult, ok};
use crate::{
    AppState,
    extract::{ApiPath, ApiQuery},
    market_data::{Candle, OptionChain, Quote, SymbolMatch, search, validate_period},
};

#[derive(Deserialize)]
pub struct ChainQuery {
    pub expiration: Option<NaiveDate>,
}

#[derive(Deserialize)]
pub struct ChartQuery {
    pub period: Option<String>,
}

#[derive(Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
}

#[derive(Serialize)]
pub struct Chart {
    pub symbol: String,
    pub period: String,
    pub candles: Vec<Candle>,
}

pub async fn get_quote(
    State(state): State<AppState>,
    ApiPath(symbol): ApiPath<String>,
) -> ApiResult<Quote> {
    let quote = state.market_data.quote(&symbol).await?;
    ok(quote)
}

pub async fn get_options(
    State(state): State<AppState>,
    ApiPath(symbol): ApiPath<String>,
    ApiQuery(query): ApiQuery<ChainQuery>,
) -> ApiResult<OptionChain> {
    let chain = state
        .market_data
        .option_chain(&symbol, query.expiration)
        .await?;
    ok(chain)
}

pub async fn get_chart(
    State(state): State<AppState>,
    ApiPath(symbol): ApiPath<String>,
    ApiQuery(query): ApiQuery<ChartQuery>,
) -> ApiResult<Chart> {
    let period = validate_period(query.period.as_deref())?.to_string();
    let candles = state.market_data.history(&symbol, &period).await?;
    ok(Chart {
        symbol: symbol.to_uppercase(),
        period,
        candles,
    })
}

pub async fn search_symbols(ApiQuery(query): ApiQuery<SearchQuery>) -> ApiResult<Vec<SymbolMatch>> {
    ok(search(&query.q))
}
