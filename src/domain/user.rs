//! User profile, holdings and account validation.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::error::{AuthError, CoinfolioError};
use super::transaction::Transaction;

/// Holdings whose amount falls below this are removed.
pub const DUST_THRESHOLD: f64 = 0.000001;

pub const MIN_PASSWORD_LEN: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UserRole {
    #[serde(rename = "USER")]
    User,
    #[serde(rename = "ADMIN")]
    Admin,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::User => "USER",
            UserRole::Admin => "ADMIN",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "USER" => Some(UserRole::User),
            "ADMIN" => Some(UserRole::Admin),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gender {
    Male,
    Female,
    Other,
    PreferNotToSay,
}

impl Gender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Male => "male",
            Gender::Female => "female",
            Gender::Other => "other",
            Gender::PreferNotToSay => "prefer_not_to_say",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "male" => Some(Gender::Male),
            "female" => Some(Gender::Female),
            "other" => Some(Gender::Other),
            "prefer_not_to_say" => Some(Gender::PreferNotToSay),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Holding {
    pub symbol: String,
    pub name: String,
    pub amount: f64,
    pub value_usd: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: UserRole,
    pub balance: f64,
    pub holdings: Vec<Holding>,
    /// Newest first.
    pub transactions: Vec<Transaction>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_of_birth: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gender: Option<Gender>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    /// Bumped by the store on every successful save.
    #[serde(default)]
    pub version: u64,
}

impl User {
    /// A freshly registered user: USER role, zero balance, empty history.
    pub fn new(id: String, email: String, name: String) -> Self {
        User {
            id,
            name,
            email,
            role: UserRole::User,
            balance: 0.0,
            holdings: Vec::new(),
            transactions: Vec::new(),
            date_of_birth: None,
            gender: None,
            address: None,
            version: 0,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }

    pub fn holding(&self, symbol: &str) -> Option<&Holding> {
        self.holdings.iter().find(|h| h.symbol == symbol)
    }

    pub fn holding_amount(&self, symbol: &str) -> f64 {
        self.holding(symbol).map(|h| h.amount).unwrap_or(0.0)
    }

    pub fn transaction(&self, id: &str) -> Option<&Transaction> {
        self.transactions.iter().find(|t| t.id == id)
    }

    /// Add to an existing holding or create one.
    pub(crate) fn credit_holding(&mut self, symbol: &str, name: &str, amount: f64, value_usd: f64) {
        match self.holdings.iter_mut().find(|h| h.symbol == symbol) {
            Some(holding) => {
                holding.amount += amount;
                holding.value_usd += value_usd;
            }
            None => self.holdings.push(Holding {
                symbol: symbol.to_string(),
                name: name.to_string(),
                amount,
                value_usd,
            }),
        }
    }

    /// Remove `amount` from a holding, scaling its value snapshot with the
    /// remaining quantity. Dust is dropped.
    pub(crate) fn debit_holding(&mut self, symbol: &str, amount: f64) {
        if let Some(holding) = self.holdings.iter_mut().find(|h| h.symbol == symbol) {
            let before = holding.amount;
            holding.amount -= amount;
            if before > 0.0 {
                holding.value_usd *= (holding.amount / before).max(0.0);
            }
        }
        self.holdings.retain(|h| h.amount >= DUST_THRESHOLD);
    }

    pub(crate) fn record(&mut self, transaction: Transaction) {
        self.transactions.insert(0, transaction);
    }
}

pub fn normalize_symbol(symbol: &str) -> String {
    symbol.trim().to_uppercase()
}

pub fn validate_email(email: &str) -> Result<(), AuthError> {
    let email = email.trim();
    let Some((local, domain)) = email.split_once('@') else {
        return Err(AuthError::InvalidEmail);
    };
    if local.is_empty()
        || domain.len() < 3
        || !domain.contains('.')
        || domain.starts_with('.')
        || domain.ends_with('.')
        || email.contains(char::is_whitespace)
    {
        return Err(AuthError::InvalidEmail);
    }
    Ok(())
}

pub fn validate_password(password: &str) -> Result<(), AuthError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AuthError::WeakPassword);
    }
    Ok(())
}

/// Partial profile edit. Absent fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub email: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub gender: Option<Gender>,
    pub address: Option<String>,
}

impl ProfileUpdate {
    pub fn apply(&self, user: &User) -> Result<User, CoinfolioError> {
        let mut updated = user.clone();
        if let Some(name) = &self.name {
            let name = name.trim();
            if name.is_empty() {
                return Err(CoinfolioError::InvalidInput {
                    reason: "name must not be empty".into(),
                });
            }
            updated.name = name.to_string();
        }
        if let Some(email) = &self.email {
            validate_email(email)?;
            updated.email = email.trim().to_lowercase();
        }
        if self.date_of_birth.is_some() {
            updated.date_of_birth = self.date_of_birth;
        }
        if self.gender.is_some() {
            updated.gender = self.gender;
        }
        if let Some(address) = &self.address {
            updated.address = Some(address.trim().to_string()).filter(|a| !a.is_empty());
        }
        Ok(updated)
    }
}
