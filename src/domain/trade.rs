//! Market order execution against a user's simulated portfolio.
//!
//! Execution never mutates the caller's user: it works on a deep copy and
//! returns it, so a rejected order leaves no trace and the caller decides
//! when to persist.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::CoinfolioError;
use super::transaction::{OrderType, Transaction, TransactionStatus, TransactionType};
use super::user::{normalize_symbol, User};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeSide {
    Buy,
    Sell,
}

impl TradeSide {
    fn transaction_type(self) -> TransactionType {
        match self {
            TradeSide::Buy => TransactionType::Buy,
            TradeSide::Sell => TransactionType::Sell,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TradeOrder {
    pub side: TradeSide,
    pub symbol: String,
    pub name: String,
    pub amount_coin: f64,
    pub price_per_coin: f64,
}

impl TradeOrder {
    pub fn amount_usd(&self) -> f64 {
        self.amount_coin * self.price_per_coin
    }

    fn validate(&self) -> Result<(), CoinfolioError> {
        if !self.amount_coin.is_finite() || self.amount_coin <= 0.0 {
            return Err(CoinfolioError::InvalidAmount {
                reason: "Please enter a valid amount.".into(),
            });
        }
        if !self.price_per_coin.is_finite() || self.price_per_coin <= 0.0 {
            return Err(CoinfolioError::InvalidAmount {
                reason: "Market price is unavailable, trade cannot be executed.".into(),
            });
        }
        if normalize_symbol(&self.symbol).is_empty() {
            return Err(CoinfolioError::InvalidInput {
                reason: "coin symbol is required".into(),
            });
        }
        Ok(())
    }
}

pub fn execute_trade(
    user: &User,
    order: &TradeOrder,
    tx_id: String,
    now: DateTime<Utc>,
) -> Result<User, CoinfolioError> {
    order.validate()?;

    let symbol = normalize_symbol(&order.symbol);
    let amount_usd = order.amount_usd();
    let mut updated = user.clone();

    match order.side {
        TradeSide::Buy => {
            if updated.balance < amount_usd {
                return Err(CoinfolioError::InsufficientBalance {
                    required: amount_usd,
                    available: updated.balance,
                });
            }
            updated.balance -= amount_usd;
            updated.credit_holding(&symbol, &order.name, order.amount_coin, amount_usd);
        }
        TradeSide::Sell => {
            let held = updated.holding_amount(&symbol);
            if updated.holding(&symbol).is_none() || held < order.amount_coin {
                return Err(CoinfolioError::InsufficientHoldings {
                    symbol,
                    requested: order.amount_coin,
                    available: held,
                });
            }
            updated.balance += amount_usd;
            updated.debit_holding(&symbol, order.amount_coin);
        }
    }

    updated.record(Transaction {
        id: tx_id,
        date: now,
        kind: order.side.transaction_type(),
        order_type: Some(OrderType::Market),
        asset: order.name.clone(),
        symbol,
        amount_coin: order.amount_coin,
        amount_usd,
        price_per_coin: order.price_per_coin,
        status: TransactionStatus::Completed,
        target_address: None,
    });

    Ok(updated)
}
