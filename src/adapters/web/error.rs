//! JSON error responses for the web adapter.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::error;

use crate::domain::error::{AuthError, CoinfolioError};

/// Rendered as `{"error": message}`, plus `"code"` for authentication failures.
#[derive(Debug)]
pub struct WebError {
    pub status: StatusCode,
    pub message: String,
    pub code: Option<&'static str>,
}

impl WebError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            code: None,
        }
    }

    fn with_code(mut self, code: &'static str) -> Self {
        self.code = Some(code);
        self
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn unauthorized() -> Self {
        AuthError::RequiresLogin.into()
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }
}

pub fn status_from_error(err: &CoinfolioError) -> StatusCode {
    match err {
        CoinfolioError::Auth(AuthError::InvalidCredentials | AuthError::RequiresLogin) => {
            StatusCode::UNAUTHORIZED
        }
        CoinfolioError::Auth(AuthError::EmailInUse) => StatusCode::CONFLICT,
        CoinfolioError::Auth(_) => StatusCode::BAD_REQUEST,
        CoinfolioError::Forbidden => StatusCode::FORBIDDEN,
        CoinfolioError::UserNotFound { .. }
        | CoinfolioError::TransactionNotFound { .. }
        | CoinfolioError::DepositNotFound { .. } => StatusCode::NOT_FOUND,
        CoinfolioError::InsufficientBalance { .. }
        | CoinfolioError::InsufficientHoldings { .. }
        | CoinfolioError::InvalidAmount { .. }
        | CoinfolioError::InvalidInput { .. } => StatusCode::BAD_REQUEST,
        CoinfolioError::InvalidTransition { .. } | CoinfolioError::Conflict { .. } => {
            StatusCode::CONFLICT
        }
        CoinfolioError::InsufficientData { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        CoinfolioError::Upstream { status, .. } => {
            StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
        }
        CoinfolioError::Database { .. }
        | CoinfolioError::DatabaseQuery { .. }
        | CoinfolioError::ConfigParse { .. }
        | CoinfolioError::ConfigMissing { .. }
        | CoinfolioError::ConfigInvalid { .. }
        | CoinfolioError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<CoinfolioError> for WebError {
    fn from(err: CoinfolioError) -> Self {
        let status = status_from_error(&err);
        if status.is_server_error() && !matches!(err, CoinfolioError::Upstream { .. }) {
            error!(error = %err, "request failed");
            return Self::internal("Internal server error");
        }
        let web = Self::new(status, err.to_string());
        match err {
            CoinfolioError::Auth(auth) => web.with_code(auth.code()),
            _ => web,
        }
    }
}

impl From<AuthError> for WebError {
    fn from(err: AuthError) -> Self {
        CoinfolioError::Auth(err).into()
    }
}

impl From<axum_login::Error<super::auth::Backend>> for WebError {
    fn from(err: axum_login::Error<super::auth::Backend>) -> Self {
        match err {
            axum_login::Error::Backend(e) => e.into(),
            axum_login::Error::Session(e) => {
                error!(error = %e, "session store failure");
                Self::internal("Internal server error")
            }
        }
    }
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        let body = match self.code {
            Some(code) => json!({ "error": self.message, "code": code }),
            None => json!({ "error": self.message }),
        };
        (self.status, Json(body)).into_response()
    }
}
