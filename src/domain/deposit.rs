//! Deposit requests and their admin-driven status transitions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::error::CoinfolioError;
use super::transaction::{Transaction, TransactionType};
use super::user::User;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DepositStatus {
    Pending,
    Approved,
    Rejected,
}

impl DepositStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DepositStatus::Pending => "Pending",
            DepositStatus::Approved => "Approved",
            DepositStatus::Rejected => "Rejected",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Pending" => Some(DepositStatus::Pending),
            "Approved" => Some(DepositStatus::Approved),
            "Rejected" => Some(DepositStatus::Rejected),
            _ => None,
        }
    }
}

impl fmt::Display for DepositStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the user says they sent the funds. The form accepts free text, so
/// anything other than the two known labels is kept as entered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum DepositMethod {
    Crypto,
    BankTransfer,
    Other(String),
}

impl From<String> for DepositMethod {
    fn from(s: String) -> Self {
        match s.trim() {
            "Crypto" => DepositMethod::Crypto,
            "Bank Transfer" => DepositMethod::BankTransfer,
            other => DepositMethod::Other(other.to_string()),
        }
    }
}

impl From<DepositMethod> for String {
    fn from(m: DepositMethod) -> Self {
        m.to_string()
    }
}

impl fmt::Display for DepositMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DepositMethod::Crypto => f.write_str("Crypto"),
            DepositMethod::BankTransfer => f.write_str("Bank Transfer"),
            DepositMethod::Other(s) => f.write_str(s),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DepositRequest {
    pub id: String,
    pub user_id: String,
    pub user_name: String,
    pub amount: f64,
    pub method: DepositMethod,
    pub status: DepositStatus,
    pub date: DateTime<Utc>,
}

impl DepositRequest {
    pub fn new(
        id: String,
        user: &User,
        amount: f64,
        method: DepositMethod,
        date: DateTime<Utc>,
    ) -> Result<Self, CoinfolioError> {
        if !amount.is_finite() || amount <= 0.0 {
            return Err(CoinfolioError::InvalidAmount {
                reason: "deposit amount must be a positive number".into(),
            });
        }
        if method.to_string().trim().is_empty() {
            return Err(CoinfolioError::InvalidInput {
                reason: "deposit method is required".into(),
            });
        }
        Ok(DepositRequest {
            id,
            user_id: user.id.clone(),
            user_name: user.name.clone(),
            amount,
            method,
            status: DepositStatus::Pending,
            date,
        })
    }

    fn ensure_pending(&self) -> Result<(), CoinfolioError> {
        if self.status != DepositStatus::Pending {
            return Err(CoinfolioError::InvalidTransition {
                id: self.id.clone(),
                status: self.status.to_string(),
            });
        }
        Ok(())
    }
}

/// Approve a pending request: the request becomes Approved and the owner is
/// credited once, with a Deposit transaction recorded. Both values are meant
/// to be persisted together.
pub fn approve(
    request: &DepositRequest,
    owner: &User,
    tx_id: String,
    now: DateTime<Utc>,
) -> Result<(DepositRequest, User), CoinfolioError> {
    request.ensure_pending()?;
    if owner.id != request.user_id {
        return Err(CoinfolioError::InvalidInput {
            reason: format!(
                "deposit {} belongs to {}, not {}",
                request.id, request.user_id, owner.id
            ),
        });
    }

    let mut decided = request.clone();
    decided.status = DepositStatus::Approved;

    let mut credited = owner.clone();
    credited.balance += request.amount;
    credited.record(Transaction::cash(
        tx_id,
        TransactionType::Deposit,
        request.amount,
        now,
    ));

    Ok((decided, credited))
}

/// Reject a pending request. Balances are untouched.
pub fn reject(request: &DepositRequest) -> Result<DepositRequest, CoinfolioError> {
    request.ensure_pending()?;
    let mut decided = request.clone();
    decided.status = DepositStatus::Rejected;
    Ok(decided)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn owner() -> User {
        let mut u = User::new("u1".into(), "a@example.com".into(), "Alice".into());
        u.balance = 100.0;
        u
    }

    fn pending(amount: f64) -> DepositRequest {
        DepositRequest::new(
            "d1".into(),
            &owner(),
            amount,
            DepositMethod::BankTransfer,
            Utc::now(),
        )
        .unwrap()
    }

    #[test]
    fn new_request_is_pending() {
        let req = pending(500.0);
        assert_eq!(req.status, DepositStatus::Pending);
        assert_eq!(req.user_name, "Alice");
    }

    #[test]
    fn rejects_non_positive_amount() {
        for amount in [0.0, -10.0, f64::NAN] {
            let result = DepositRequest::new(
                "d".into(),
                &owner(),
                amount,
                DepositMethod::Crypto,
                Utc::now(),
            );
            assert!(matches!(result, Err(CoinfolioError::InvalidAmount { .. })));
        }
    }

    #[test]
    fn rejects_blank_method() {
        let result = DepositRequest::new(
            "d".into(),
            &owner(),
            10.0,
            DepositMethod::from("   ".to_string()),
            Utc::now(),
        );
        assert!(matches!(result, Err(CoinfolioError::InvalidInput { .. })));
    }

    #[test]
    fn approval_credits_once_with_one_deposit_record() {
        let (decided, credited) = approve(&pending(500.0), &owner(), "tx".into(), Utc::now()).unwrap();
        assert_eq!(decided.status, DepositStatus::Approved);
        assert!((credited.balance - 600.0).abs() < 1e-9);
        assert_eq!(credited.transactions.len(), 1);
        assert_eq!(credited.transactions[0].kind, TransactionType::Deposit);
        assert!((credited.transactions[0].amount_usd - 500.0).abs() < 1e-9);

        let again = approve(&decided, &credited, "tx2".into(), Utc::now());
        assert!(matches!(again, Err(CoinfolioError::InvalidTransition { .. })));
    }

    #[test]
    fn rejection_only_changes_status() {
        let decided = reject(&pending(500.0)).unwrap();
        assert_eq!(decided.status, DepositStatus::Rejected);
        assert!(reject(&decided).is_err());
    }

    #[test]
    fn approval_checks_owner() {
        let other = User::new("u2".into(), "b@example.com".into(), "Bob".into());
        assert!(approve(&pending(5.0), &other, "tx".into(), Utc::now()).is_err());
    }

    #[test]
    fn method_labels() {
        assert_eq!(DepositMethod::from("Crypto".to_string()), DepositMethod::Crypto);
        assert_eq!(
            DepositMethod::from("Bank Transfer".to_string()),
            DepositMethod::BankTransfer
        );
        assert_eq!(
            DepositMethod::from("Wire".to_string()).to_string(),
            "Wire".to_string()
        );
    }
}
