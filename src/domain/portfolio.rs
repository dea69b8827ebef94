//! Portfolio valuation against live market quotes.

use std::collections::HashMap;

use serde::Serialize;

use super::market::Coin;
use super::transaction::TransactionType;
use super::user::{normalize_symbol, Holding, User};

/// Allocation slices at or below this value are dropped.
pub const MIN_SLICE_VALUE: f64 = 0.01;

/// Live price data for one symbol.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MarketQuote {
    pub price: f64,
    pub change_24h: f64,
    pub change_percent_24h: f64,
}

impl MarketQuote {
    pub fn from_coin(coin: &Coin) -> Option<Self> {
        let price = coin.current_price.filter(|p| p.is_finite())?;
        Some(MarketQuote {
            price,
            change_24h: coin.price_change_24h.unwrap_or(0.0),
            change_percent_24h: coin.price_change_percentage_24h.unwrap_or(0.0),
        })
    }
}

/// Index a market listing by upper-case symbol. The first (highest ranked)
/// coin wins when several share a ticker.
pub fn quotes_by_symbol(coins: &[Coin]) -> HashMap<String, MarketQuote> {
    let mut quotes = HashMap::new();
    for coin in coins {
        if let Some(quote) = MarketQuote::from_coin(coin) {
            quotes.entry(normalize_symbol(&coin.symbol)).or_insert(quote);
        }
    }
    quotes
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GainLoss {
    pub amount: f64,
    pub percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioHolding {
    pub symbol: String,
    pub name: String,
    pub amount: f64,
    pub value_usd: f64,
    pub current_price: f64,
    pub todays_change_percent: f64,
    pub avg_cost: f64,
    pub total_gain_loss: GainLoss,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioSummary {
    pub cash_balance: f64,
    pub total_holdings_value: f64,
    pub total_portfolio_value: f64,
    pub change_amount: f64,
    pub change_percent: f64,
    pub holdings: Vec<PortfolioHolding>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AllocationSlice {
    pub name: String,
    pub value: f64,
}

/// Mean price paid across Buy transactions of `symbol`, 0 without any.
pub fn average_cost(user: &User, symbol: &str) -> f64 {
    let (amount, cost) = user
        .transactions
        .iter()
        .filter(|t| t.kind == TransactionType::Buy && t.symbol == symbol)
        .fold((0.0, 0.0), |(a, c), t| (a + t.amount_coin, c + t.amount_usd));
    if amount > 0.0 { cost / amount } else { 0.0 }
}

fn value_holding(
    user: &User,
    holding: &Holding,
    quote: Option<&MarketQuote>,
) -> (PortfolioHolding, f64) {
    let fallback = if holding.amount > 0.0 {
        holding.value_usd / holding.amount
    } else {
        0.0
    };
    let current_price = quote.map(|q| q.price).unwrap_or(fallback);
    let value = holding.amount * current_price;
    let change_24h = quote.map(|q| holding.amount * q.change_24h).unwrap_or(0.0);

    let avg_cost = average_cost(user, &holding.symbol);
    let cost_basis = avg_cost * holding.amount;
    let gain = value - cost_basis;
    let gain_percent = if cost_basis > 0.0 {
        gain / cost_basis * 100.0
    } else {
        0.0
    };

    let valued = PortfolioHolding {
        symbol: holding.symbol.clone(),
        name: holding.name.clone(),
        amount: holding.amount,
        value_usd: value,
        current_price,
        todays_change_percent: quote.map(|q| q.change_percent_24h).unwrap_or(0.0),
        avg_cost,
        total_gain_loss: GainLoss {
            amount: gain,
            percent: gain_percent,
        },
    };
    (valued, change_24h)
}

pub fn value_portfolio(user: &User, quotes: &HashMap<String, MarketQuote>) -> PortfolioSummary {
    let mut total_holdings_value = 0.0;
    let mut change_amount = 0.0;
    let holdings: Vec<PortfolioHolding> = user
        .holdings
        .iter()
        .map(|h| {
            let (valued, change) = value_holding(user, h, quotes.get(&h.symbol));
            total_holdings_value += valued.value_usd;
            change_amount += change;
            valued
        })
        .collect();

    let previous = total_holdings_value - change_amount;
    let change_percent = if previous > 0.0 {
        change_amount / previous * 100.0
    } else {
        0.0
    };

    PortfolioSummary {
        cash_balance: user.balance,
        total_holdings_value,
        total_portfolio_value: total_holdings_value + user.balance,
        change_amount,
        change_percent,
        holdings,
    }
}

impl PortfolioSummary {
    /// One slice per holding plus cash, tiny slices omitted.
    pub fn allocation(&self) -> Vec<AllocationSlice> {
        self.holdings
            .iter()
            .map(|h| AllocationSlice {
                name: h.symbol.clone(),
                value: h.value_usd,
            })
            .chain(std::iter::once(AllocationSlice {
                name: "Cash".to_string(),
                value: self.cash_balance,
            }))
            .filter(|s| s.value > MIN_SLICE_VALUE)
            .collect()
    }
}
