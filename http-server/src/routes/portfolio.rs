use academy::portfolio::{BuyReceipt, CloseReceipt, Fill, PortfolioSummary};
use academy::social::ActivityKind;
use academy::types::{Instrument, OptionDetails, TradeSide};
use axum::extract::State;
use chrono::Utc;
use futures_util::future::join_all;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use super::{ApiResult, Created, created, ok, ok_with};
use crate::{
    AppState,
    error::ApiError,
    extract::{ApiJson, ApiPath},
    middleware::AuthUser,
    models::TradeRecord,
};

pub const HISTORY_LIMIT: usize = 100;

fn default_instrument() -> Instrument {
    Instrument::Stock
}

#[derive(Deserialize)]
pub struct BuyRequest {
    #[serde(default)]
    pub symbol: String,
    #[serde(default = "default_instrument")]
    pub instrument: Instrument,
    pub quantity: f64,
    /// Omitted to buy at the live market price
    pub price: Option<f64>,
    pub option_details: Option<OptionDetails>,
}

#[derive(Serialize)]
pub struct CloseResponse {
    #[serde(flatten)]
    pub receipt: CloseReceipt,
    pub badges_earned: Vec<String>,
}

fn describe(symbol: &str, instrument: Instrument, details: Option<&OptionDetails>) -> String {
    match (instrument, details) {
        (Instrument::Option, Some(d)) => format!(
            "{} {} {:?} {}",
            symbol,
            d.strike,
            d.right,
            d.expiry.format("%Y-%m-%d")
        ),
        _ => symbol.to_string(),
    }
}

pub async fn get_portfolio(
    State(state): State<AppState>,
    auth: AuthUser,
) -> ApiResult<PortfolioSummary> {
    let portfolio = state
        .storage
        .read(|t| t.user(auth.user_id).map(|u| u.portfolio.clone()))?;

    // Quotes are fetched concurrently; a failed one falls back to cost
    let market_data = &state.market_data;
    let prices = join_all(
        portfolio
            .positions
            .iter()
            .map(|p| async move { (p.id, market_data.last_price(p).await) }),
    )
    .await;
    let prices: HashMap<Uuid, Option<f64>> = prices.into_iter().collect();

    let summary = portfolio.valuate(|p| prices.get(&p.id).copied().flatten());
    ok(summary)
}

pub async fn open_position(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiJson(payload): ApiJson<BuyRequest>,
) -> Created<BuyReceipt> {
    let symbol = payload.symbol.trim().to_uppercase();
    if symbol.is_empty() {
        return Err(ApiError::bad_request("Symbol is required"));
    }

    let price = match payload.price {
        Some(price) => price,
        None => match (payload.instrument, &payload.option_details) {
            (Instrument::Option, Some(details)) => {
                state.market_data.option_quote(&symbol, details).await?
            }
            (Instrument::Option, None) => {
                return Err(ApiError::bad_request("Option details are required"));
            }
            _ => state.market_data.quote(&symbol).await?.price,
        },
    };

    let fill = Fill {
        symbol,
        instrument: payload.instrument,
        quantity: payload.quantity,
        price,
        option_details: payload.option_details,
    };

    let receipt = state.write(|t| {
        let now = Utc::now();
        let user = t.user_mut(auth.user_id)?;
        let receipt = user.portfolio.buy(fill.clone(), now)?;
        user.last_active = now;

        t.trades.push(TradeRecord {
            id: Uuid::new_v4(),
            user_id: auth.user_id,
            side: TradeSide::Buy,
            symbol: receipt.symbol.clone(),
            instrument: fill.instrument,
            quantity: fill.quantity,
            price: fill.price,
            total: receipt.cost,
            realized_pl: None,
            option_details: fill.option_details.clone(),
            created_at: now,
        });
        t.record_activity(
            auth.user_id,
            ActivityKind::Trade,
            format!(
                "Bought {} {}",
                fill.quantity,
                describe(&receipt.symbol, fill.instrument, fill.option_details.as_ref())
            ),
            now,
        );
        Ok::<_, ApiError>(receipt)
    })?;

    tracing::info!(
        "User {} bought {} {} at {:.2} (cost {:.2})",
        auth.user_id,
        receipt.quantity,
        receipt.symbol,
        price,
        receipt.cost
    );
    created("Position opened", receipt)
}

pub async fn close_position(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiPath(position_id): ApiPath<Uuid>,
) -> ApiResult<CloseResponse> {
    let position = state.storage.read(|t| {
        t.user(auth.user_id)?
            .portfolio
            .position(position_id)
            .cloned()
            .ok_or_else(|| ApiError::not_found("Position not found"))
    })?;

    let live_price = state.market_data.last_price(&position).await;

    let response = state.write(|t| {
        let now = Utc::now();
        let user = t.user_mut(auth.user_id)?;
        let receipt = user.portfolio.close(position_id, live_price)?;
        user.stats.record(receipt.position.instrument, receipt.realized_pl);
        user.last_active = now;

        let position = &receipt.position;
        t.trades.push(TradeRecord {
            id: Uuid::new_v4(),
            user_id: auth.user_id,
            side: TradeSide::Sell,
            symbol: position.symbol.clone(),
            instrument: position.instrument,
            quantity: position.quantity,
            price: receipt.exit_price,
            total: receipt.proceeds,
            realized_pl: Some(receipt.realized_pl),
            option_details: position.option_details.clone(),
            created_at: now,
        });
        t.record_activity(
            auth.user_id,
            ActivityKind::Trade,
            format!(
                "Closed {} {} for {:+.2}",
                position.quantity,
                describe(&position.symbol, position.instrument, position.option_details.as_ref()),
                receipt.realized_pl
            ),
            now,
        );
        let badges_earned = t.check_achievements(auth.user_id, now)?;
        Ok::<_, ApiError>(CloseResponse {
            receipt,
            badges_earned,
        })
    })?;

    tracing::info!(
        "User {} closed position {} (realized {:.2})",
        auth.user_id,
        position_id,
        response.receipt.realized_pl
    );
    ok_with("Position closed", response)
}

pub async fn get_history(
    State(state): State<AppState>,
    auth: AuthUser,
) -> ApiResult<Vec<TradeRecord>> {
    let mut trades: Vec<TradeRecord> = state.storage.read(|t| {
        t.trades
            .iter()
            .filter(|r| r.user_id == auth.user_id)
            .cloned()
            .collect()
    });
    // Stored in execution order
    trades.reverse();
    trades.truncate(HISTORY_LIMIT);
    ok(trades)
}
