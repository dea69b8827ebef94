//! Administrator mutations of a user's portfolio.
//!
//! Like trade execution, each operation takes the current user and returns a
//! modified copy for the store to persist.

use chrono::{DateTime, Utc};

use super::error::CoinfolioError;
use super::transaction::{Transaction, TransactionStatus, TransactionType};
use super::user::{normalize_symbol, User};

/// Add a signed amount to the cash balance and record an Adjustment.
pub fn adjust_balance(
    user: &User,
    amount: f64,
    tx_id: String,
    now: DateTime<Utc>,
) -> Result<User, CoinfolioError> {
    if !amount.is_finite() {
        return Err(CoinfolioError::InvalidAmount {
            reason: "adjustment must be a finite number".into(),
        });
    }
    let mut updated = user.clone();
    updated.balance += amount;
    updated.record(Transaction::cash(
        tx_id,
        TransactionType::Adjustment,
        amount,
        now,
    ));
    Ok(updated)
}

#[derive(Debug, Clone, PartialEq)]
pub struct HoldingGrant {
    pub symbol: String,
    pub name: String,
    pub amount: f64,
    /// Market price at grant time, 0 when no quote was available.
    pub price_per_coin: f64,
    pub target_address: String,
}

/// Credit coins to a user and record them as a Mt Profit transaction.
pub fn grant_holding(
    user: &User,
    grant: &HoldingGrant,
    tx_id: String,
    now: DateTime<Utc>,
) -> Result<User, CoinfolioError> {
    if !grant.amount.is_finite() || grant.amount <= 0.0 {
        return Err(CoinfolioError::InvalidAmount {
            reason: "granted amount must be positive".into(),
        });
    }
    let symbol = normalize_symbol(&grant.symbol);
    if symbol.is_empty() {
        return Err(CoinfolioError::InvalidInput {
            reason: "coin symbol is required".into(),
        });
    }
    let target_address = grant.target_address.trim();
    if target_address.is_empty() {
        return Err(CoinfolioError::InvalidInput {
            reason: "target address is required".into(),
        });
    }
    let price = if grant.price_per_coin.is_finite() && grant.price_per_coin > 0.0 {
        grant.price_per_coin
    } else {
        0.0
    };
    let name = if grant.name.trim().is_empty() {
        symbol.clone()
    } else {
        grant.name.trim().to_string()
    };
    let value_usd = grant.amount * price;

    let mut updated = user.clone();
    updated.credit_holding(&symbol, &name, grant.amount, value_usd);
    updated.record(Transaction {
        id: tx_id,
        date: now,
        kind: TransactionType::MtProfit,
        order_type: None,
        asset: name,
        symbol,
        amount_coin: grant.amount,
        amount_usd: value_usd,
        price_per_coin: price,
        status: TransactionStatus::Completed,
        target_address: Some(target_address.to_string()),
    });
    Ok(updated)
}

/// Remove one transaction from the history. Balances and holdings are left
/// as they are.
pub fn delete_transaction(user: &User, tx_id: &str) -> Result<User, CoinfolioError> {
    let Some(index) = user.transactions.iter().position(|t| t.id == tx_id) else {
        return Err(CoinfolioError::TransactionNotFound {
            id: tx_id.to_string(),
        });
    };
    let mut updated = user.clone();
    updated.transactions.remove(index);
    Ok(updated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn user() -> User {
        let mut u = User::new("u1".into(), "a@example.com".into(), "Alice".into());
        u.balance = 100.0;
        u
    }

    fn grant(amount: f64, price: f64) -> HoldingGrant {
        HoldingGrant {
            symbol: "eth".into(),
            name: "Ethereum".into(),
            amount,
            price_per_coin: price,
            target_address: "0xabc".into(),
        }
    }

    #[test]
    fn adjustment_accepts_negative_amounts() {
        let updated = adjust_balance(&user(), -40.0, "t1".into(), Utc::now()).unwrap();
        assert_relative_eq!(updated.balance, 60.0);
        let tx = &updated.transactions[0];
        assert_eq!(tx.kind, TransactionType::Adjustment);
        assert_eq!(tx.symbol, "USD");
        assert_relative_eq!(tx.amount_usd, -40.0);
    }

    #[test]
    fn adjustment_rejects_nan() {
        assert!(adjust_balance(&user(), f64::NAN, "t1".into(), Utc::now()).is_err());
    }

    #[test]
    fn grant_creates_holding_and_mt_profit_record() {
        let updated = grant_holding(&user(), &grant(2.0, 3000.0), "t1".into(), Utc::now()).unwrap();
        assert_relative_eq!(updated.holding_amount("ETH"), 2.0);
        assert_relative_eq!(updated.balance, 100.0);
        let tx = &updated.transactions[0];
        assert_eq!(tx.kind, TransactionType::MtProfit);
        assert_eq!(tx.target_address.as_deref(), Some("0xabc"));
        assert_relative_eq!(tx.amount_usd, 6000.0);
    }

    #[test]
    fn grant_without_quote_records_zero_price() {
        let updated = grant_holding(&user(), &grant(1.0, f64::NAN), "t1".into(), Utc::now()).unwrap();
        assert_eq!(updated.transactions[0].price_per_coin, 0.0);
        assert_eq!(updated.holdings[0].value_usd, 0.0);
    }

    #[test]
    fn grant_requires_positive_amount_and_address() {
        assert!(grant_holding(&user(), &grant(0.0, 1.0), "t".into(), Utc::now()).is_err());
        let mut g = grant(1.0, 1.0);
        g.target_address = "  ".into();
        assert!(matches!(
            grant_holding(&user(), &g, "t".into(), Utc::now()),
            Err(CoinfolioError::InvalidInput { .. })
        ));
    }

    #[test]
    fn delete_removes_only_the_named_transaction() {
        let u = adjust_balance(&user(), 10.0, "t1".into(), Utc::now()).unwrap();
        let u = adjust_balance(&u, 5.0, "t2".into(), Utc::now()).unwrap();
        let updated = delete_transaction(&u, "t1").unwrap();
        assert_eq!(updated.transactions.len(), 1);
        assert_eq!(updated.transactions[0].id, "t2");
        assert_relative_eq!(updated.balance, 115.0);
    }

    #[test]
    fn delete_unknown_transaction_is_not_found() {
        assert!(matches!(
            delete_transaction(&user(), "missing"),
            Err(CoinfolioError::TransactionNotFound { .. })
        ));
    }
}
