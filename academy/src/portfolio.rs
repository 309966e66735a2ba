//! Simulated brokerage account: a cash balance and a list of open positions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::types::{Instrument, OptionDetails};

/// Cash every new account starts with
pub const STARTING_CASH: f64 = 10_000.0;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PortfolioError {
    #[error("Insufficient funds: need ${need:.2}, available ${available:.2}")]
    InsufficientFunds { need: f64, available: f64 },
    #[error("Position not found")]
    PositionNotFound,
    #[error("Symbol is required")]
    EmptySymbol,
    #[error("Quantity must be greater than 0")]
    InvalidQuantity,
    #[error("Price must be greater than 0")]
    InvalidPrice,
    #[error("Option positions require option details")]
    MissingOptionDetails,
    #[error("Stock positions cannot carry option details")]
    UnexpectedOptionDetails,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub id: Uuid,
    pub symbol: String,
    pub instrument: Instrument,
    pub quantity: f64,
    /// Quantity-weighted mean fill price
    pub avg_price: f64,
    pub option_details: Option<OptionDetails>,
    pub opened_at: DateTime<Utc>,
}

impl Position {
    /// Cash paid for the position at its average price
    pub fn cost_basis(&self) -> f64 {
        self.quantity * self.avg_price * self.instrument.multiplier()
    }

    fn matches(&self, fill: &Fill) -> bool {
        self.symbol == fill.symbol
            && self.instrument == fill.instrument
            && self.option_details == fill.option_details
    }
}

/// A buy execution to apply to the portfolio
#[derive(Debug, Clone, PartialEq)]
pub struct Fill {
    pub symbol: String,
    pub instrument: Instrument,
    pub quantity: f64,
    pub price: f64,
    pub option_details: Option<OptionDetails>,
}

impl Fill {
    fn validate(&mut self) -> Result<(), PortfolioError> {
        self.symbol = self.symbol.trim().to_uppercase();
        if self.symbol.is_empty() {
            return Err(PortfolioError::EmptySymbol);
        }
        if !self.quantity.is_finite() || self.quantity <= 0.0 {
            return Err(PortfolioError::InvalidQuantity);
        }
        if !self.price.is_finite() || self.price <= 0.0 {
            return Err(PortfolioError::InvalidPrice);
        }
        match (self.instrument, &self.option_details) {
            (Instrument::Option, None) => Err(PortfolioError::MissingOptionDetails),
            (Instrument::Stock, Some(_)) => Err(PortfolioError::UnexpectedOptionDetails),
            _ => Ok(()),
        }
    }

    pub fn cost(&self) -> f64 {
        self.quantity * self.price * self.instrument.multiplier()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BuyReceipt {
    pub position_id: Uuid,
    pub symbol: String,
    pub cost: f64,
    pub quantity: f64,
    pub avg_price: f64,
    pub cash_balance: f64,
    /// True when the fill was merged into an existing position
    pub averaged: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CloseReceipt {
    pub position: Position,
    pub exit_price: f64,
    /// False when no live quote was available and the average price was used
    pub live_price: bool,
    pub proceeds: f64,
    pub realized_pl: f64,
    pub cash_balance: f64,
}

/// Valuation of a single position against a current price
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PositionValuation {
    #[serde(flatten)]
    pub position: Position,
    pub current_price: f64,
    pub quote_available: bool,
    pub market_value: f64,
    pub unrealized_pl: f64,
    pub unrealized_pl_percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PortfolioSummary {
    pub total_value: f64,
    pub total_pl: f64,
    pub total_pl_percent: f64,
    pub cash_balance: f64,
    pub buying_power: f64,
    pub positions: Vec<PositionValuation>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Portfolio {
    pub cash_balance: f64,
    pub positions: Vec<Position>,
}

impl Default for Portfolio {
    fn default() -> Self {
        Self::with_cash(STARTING_CASH)
    }
}

impl Portfolio {
    pub fn with_cash(cash_balance: f64) -> Self {
        Self {
            cash_balance,
            positions: Vec::new(),
        }
    }

    pub fn position(&self, id: Uuid) -> Option<&Position> {
        self.positions.iter().find(|p| p.id == id)
    }

    /// Applies a buy. Repeated buys of the same symbol, instrument and
    /// option terms are merged at the quantity-weighted average price.
    /// Nothing changes when the fill is invalid or cash is insufficient.
    pub fn buy(&mut self, mut fill: Fill, now: DateTime<Utc>) -> Result<BuyReceipt, PortfolioError> {
        fill.validate()?;

        let cost = fill.cost();
        if cost > self.cash_balance {
            return Err(PortfolioError::InsufficientFunds {
                need: cost,
                available: self.cash_balance,
            });
        }

        let (position_id, quantity, avg_price, averaged) =
            match self.positions.iter_mut().find(|p| p.matches(&fill)) {
                Some(existing) => {
                    let new_quantity = existing.quantity + fill.quantity;
                    existing.avg_price = (existing.quantity * existing.avg_price
                        + fill.quantity * fill.price)
                        / new_quantity;
                    existing.quantity = new_quantity;
                    (existing.id, existing.quantity, existing.avg_price, true)
                }
                None => {
                    let position = Position {
                        id: Uuid::new_v4(),
                        symbol: fill.symbol.clone(),
                        instrument: fill.instrument,
                        quantity: fill.quantity,
                        avg_price: fill.price,
                        option_details: fill.option_details.clone(),
                        opened_at: now,
                    };
                    let receipt = (position.id, position.quantity, position.avg_price, false);
                    self.positions.push(position);
                    receipt
                }
            };

        // Clamp float dust; cost <= cash was checked above
        self.cash_balance = (self.cash_balance - cost).max(0.0);

        Ok(BuyReceipt {
            position_id,
            symbol: fill.symbol,
            cost,
            quantity,
            avg_price,
            cash_balance: self.cash_balance,
            averaged,
        })
    }

    /// Closes a whole position. Proceeds use `live_price` when given,
    /// otherwise the position's average price.
    pub fn close(
        &mut self,
        position_id: Uuid,
        live_price: Option<f64>,
    ) -> Result<CloseReceipt, PortfolioError> {
        let index = self
            .positions
            .iter()
            .position(|p| p.id == position_id)
            .ok_or(PortfolioError::PositionNotFound)?;

        let live_price = live_price.filter(|p| p.is_finite() && *p >= 0.0);
        let position = self.positions.remove(index);
        let exit_price = live_price.unwrap_or(position.avg_price);
        let proceeds = position.quantity * exit_price * position.instrument.multiplier();
        let realized_pl = proceeds - position.cost_basis();

        self.cash_balance += proceeds;

        Ok(CloseReceipt {
            position,
            exit_price,
            live_price: live_price.is_some(),
            proceeds,
            realized_pl,
            cash_balance: self.cash_balance,
        })
    }

    /// Adds a signed amount to cash, never letting it go below zero
    pub fn adjust_cash(&mut self, amount: f64) -> f64 {
        if amount.is_finite() {
            self.cash_balance = (self.cash_balance + amount).max(0.0);
        }
        self.cash_balance
    }

    /// Marks every position to market. `price_for` returns the current price
    /// of a position, or `None` when no quote could be obtained, in which case
    /// the average price is used.
    pub fn valuate<F>(&self, mut price_for: F) -> PortfolioSummary
    where
        F: FnMut(&Position) -> Option<f64>,
    {
        let mut positions_value = 0.0;
        let mut total_pl = 0.0;
        let mut total_basis = 0.0;

        let positions = self
            .positions
            .iter()
            .map(|position| {
                let quote = price_for(position).filter(|p| p.is_finite());
                let current_price = quote.unwrap_or(position.avg_price);
                let market_value =
                    position.quantity * current_price * position.instrument.multiplier();
                let basis = position.cost_basis();
                let unrealized_pl = market_value - basis;
                let unrealized_pl_percent = if basis > 0.0 {
                    unrealized_pl / basis * 100.0
                } else {
                    0.0
                };

                positions_value += market_value;
                total_pl += unrealized_pl;
                total_basis += basis;

                PositionValuation {
                    position: position.clone(),
                    current_price,
                    quote_available: quote.is_some(),
                    market_value,
                    unrealized_pl,
                    unrealized_pl_percent,
                }
            })
            .collect();

        PortfolioSummary {
            total_value: self.cash_balance + positions_value,
            total_pl,
            total_pl_percent: if total_basis > 0.0 {
                total_pl / total_basis * 100.0
            } else {
                0.0
            },
            cash_balance: self.cash_balance,
            buying_power: self.cash_balance,
            positions,
        }
    }
}
