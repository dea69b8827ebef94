//! Domain error types.

use std::fmt;

/// Authentication failures. Each carries a stable code, sent to clients next
/// to the user-facing message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthError {
    InvalidCredentials,
    EmailInUse,
    InvalidEmail,
    WeakPassword,
    RequiresLogin,
}

impl AuthError {
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::InvalidCredentials => "auth/invalid-credential",
            AuthError::EmailInUse => "auth/email-already-in-use",
            AuthError::InvalidEmail => "auth/invalid-email",
            AuthError::WeakPassword => "auth/weak-password",
            AuthError::RequiresLogin => "auth/requires-login",
        }
    }

    pub fn user_message(&self) -> &'static str {
        match self {
            AuthError::InvalidCredentials => "Incorrect email or password.",
            AuthError::EmailInUse => "An account with this email already exists.",
            AuthError::InvalidEmail => "Please enter a valid email address.",
            AuthError::WeakPassword => "Password must be at least 8 characters long.",
            AuthError::RequiresLogin => "Please sign in to continue.",
        }
    }
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.user_message())
    }
}

/// Top-level error type for coinfolio.
#[derive(Debug, thiserror::Error)]
pub enum CoinfolioError {
    #[error("database error: {reason}")]
    Database { reason: String },

    #[error("database query error: {reason}")]
    DatabaseQuery { reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("{0}")]
    Auth(AuthError),

    #[error("administrator role required")]
    Forbidden,

    #[error("user {id} not found")]
    UserNotFound { id: String },

    #[error("transaction {id} not found")]
    TransactionNotFound { id: String },

    #[error("deposit request {id} not found")]
    DepositNotFound { id: String },

    #[error("Insufficient balance: need {required:.2} USD, have {available:.2} USD")]
    InsufficientBalance { required: f64, available: f64 },

    #[error("Insufficient coin balance: need {requested} {symbol}, have {available}")]
    InsufficientHoldings {
        symbol: String,
        requested: f64,
        available: f64,
    },

    #[error("invalid amount: {reason}")]
    InvalidAmount { reason: String },

    #[error("invalid input: {reason}")]
    InvalidInput { reason: String },

    #[error("deposit request {id} is already {status}")]
    InvalidTransition { id: String, status: String },

    #[error("user {id} was modified concurrently, reload and retry")]
    Conflict { id: String },

    #[error("{message}")]
    Upstream { status: u16, message: String },

    #[error("insufficient data: have {points} price points, need {minimum}")]
    InsufficientData { points: usize, minimum: usize },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<AuthError> for CoinfolioError {
    fn from(err: AuthError) -> Self {
        CoinfolioError::Auth(err)
    }
}

impl From<&CoinfolioError> for std::process::ExitCode {
    fn from(err: &CoinfolioError) -> Self {
        let code: u8 = match err {
            CoinfolioError::Io(_) => 1,
            CoinfolioError::ConfigParse { .. }
            | CoinfolioError::ConfigMissing { .. }
            | CoinfolioError::ConfigInvalid { .. } => 2,
            CoinfolioError::Database { .. }
            | CoinfolioError::DatabaseQuery { .. }
            | CoinfolioError::Conflict { .. } => 3,
            CoinfolioError::UserNotFound { .. }
            | CoinfolioError::TransactionNotFound { .. }
            | CoinfolioError::DepositNotFound { .. } => 4,
            CoinfolioError::InsufficientData { .. } => 5,
            CoinfolioError::Upstream { .. } => 6,
            _ => 1,
        };
        std::process::ExitCode::from(code)
    }
}
