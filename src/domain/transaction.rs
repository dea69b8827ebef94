//! Transaction history records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransactionType {
    Buy,
    Sell,
    Deposit,
    Adjustment,
    #[serde(rename = "Mt Profit")]
    MtProfit,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Buy => "Buy",
            TransactionType::Sell => "Sell",
            TransactionType::Deposit => "Deposit",
            TransactionType::Adjustment => "Adjustment",
            TransactionType::MtProfit => "Mt Profit",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Buy" => Some(TransactionType::Buy),
            "Sell" => Some(TransactionType::Sell),
            "Deposit" => Some(TransactionType::Deposit),
            "Adjustment" => Some(TransactionType::Adjustment),
            "Mt Profit" => Some(TransactionType::MtProfit),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderType {
    Market,
    Limit,
}

impl OrderType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderType::Market => "Market",
            OrderType::Limit => "Limit",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Market" => Some(OrderType::Market),
            "Limit" => Some(OrderType::Limit),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionStatus {
    Completed,
    Pending,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Completed => "Completed",
            TransactionStatus::Pending => "Pending",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Completed" => Some(TransactionStatus::Completed),
            "Pending" => Some(TransactionStatus::Pending),
            _ => None,
        }
    }
}

/// One entry in a user's history. Records are never edited after creation;
/// an administrator may delete one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: String,
    pub date: DateTime<Utc>,
    #[serde(rename = "type")]
    pub kind: TransactionType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_type: Option<OrderType>,
    pub asset: String,
    pub symbol: String,
    pub amount_coin: f64,
    pub amount_usd: f64,
    pub price_per_coin: f64,
    pub status: TransactionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_address: Option<String>,
}

impl Transaction {
    /// A completed USD cash movement (deposit or balance adjustment).
    pub fn cash(id: String, kind: TransactionType, amount: f64, date: DateTime<Utc>) -> Self {
        Transaction {
            id,
            date,
            kind,
            order_type: None,
            asset: "USD".to_string(),
            symbol: "USD".to_string(),
            amount_coin: amount,
            amount_usd: amount,
            price_per_coin: 1.0,
            status: TransactionStatus::Completed,
            target_address: None,
        }
    }
}
