//! Persistence port for user documents and deposit requests.

use crate::domain::deposit::{DepositRequest, DepositStatus};
use crate::domain::error::CoinfolioError;
use crate::domain::user::User;

/// Login material for one account, kept apart from the user document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub user_id: String,
    pub email: String,
    pub password_hash: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DepositFilter {
    pub status: Option<DepositStatus>,
    pub user_id: Option<String>,
}

impl DepositFilter {
    pub fn by_status(status: DepositStatus) -> Self {
        DepositFilter {
            status: Some(status),
            user_id: None,
        }
    }

    pub fn by_user(user_id: &str) -> Self {
        DepositFilter {
            status: None,
            user_id: Some(user_id.to_string()),
        }
    }
}

pub trait ProfileStore: Send + Sync {
    /// Insert a new account. Fails with `EmailInUse` when the email is taken.
    fn create_user(&self, user: &User, password_hash: &str) -> Result<User, CoinfolioError>;

    fn get_user(&self, id: &str) -> Result<User, CoinfolioError>;

    fn list_users(&self) -> Result<Vec<User>, CoinfolioError>;

    /// Replace the stored document. `user.version` must match the stored
    /// version, otherwise `Conflict`. Returns the user with its new version.
    fn save_user(&self, user: &User) -> Result<User, CoinfolioError>;

    fn credentials_by_email(&self, email: &str) -> Result<Option<Credentials>, CoinfolioError>;

    fn credentials_by_id(&self, user_id: &str) -> Result<Option<Credentials>, CoinfolioError>;

    fn set_password_hash(&self, user_id: &str, password_hash: &str) -> Result<(), CoinfolioError>;

    fn create_deposit(&self, request: &DepositRequest) -> Result<(), CoinfolioError>;

    fn get_deposit(&self, id: &str) -> Result<DepositRequest, CoinfolioError>;

    /// Newest first.
    fn list_deposits(&self, filter: &DepositFilter) -> Result<Vec<DepositRequest>, CoinfolioError>;

    /// Persist a decision on a pending request in one transaction: the
    /// request's new status and, for approvals, the credited owner. Fails
    /// with `InvalidTransition` if the request is no longer pending.
    fn decide_deposit(
        &self,
        decided: &DepositRequest,
        credited: Option<&User>,
    ) -> Result<Option<User>, CoinfolioError>;
}
