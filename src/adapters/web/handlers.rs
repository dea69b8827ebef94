//! Account, portfolio and trading handlers.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::domain::deposit::{DepositMethod, DepositRequest};
use crate::domain::error::{AuthError, CoinfolioError};
use crate::domain::portfolio::{quotes_by_symbol, value_portfolio, AllocationSlice, PortfolioSummary};
use crate::domain::trade::{execute_trade, TradeOrder, TradeSide};
use crate::domain::transaction::Transaction;
use crate::domain::user::{validate_email, validate_password, Gender, ProfileUpdate, User};
use crate::ports::store_port::DepositFilter;

use super::auth::{hash_password, verify_password, Credentials, SessionUser};
use super::{AppState, AuthSession, WebError};

/// Coins fetched to price a portfolio.
pub(super) const QUOTE_PAGE_SIZE: u32 = 250;

pub(super) fn new_id() -> String {
    Uuid::new_v4().to_string()
}

pub async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub async fn not_found() -> WebError {
    WebError::not_found("Not found")
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupRequest {
    pub email: String,
    pub password: String,
    pub name: String,
    pub date_of_birth: Option<NaiveDate>,
    pub gender: Option<Gender>,
    pub address: Option<String>,
}

pub async fn signup(
    State(state): State<Arc<AppState>>,
    mut auth_session: AuthSession,
    Json(req): Json<SignupRequest>,
) -> Result<Response, WebError> {
    validate_email(&req.email)?;
    validate_password(&req.password)?;
    let name = req.name.trim();
    if name.is_empty() {
        return Err(WebError::bad_request("Name is required."));
    }

    let mut user = User::new(new_id(), req.email.trim().to_lowercase(), name.to_string());
    user.date_of_birth = req.date_of_birth;
    user.gender = req.gender;
    user.address = req.address.map(|a| a.trim().to_string()).filter(|a| !a.is_empty());

    let password_hash = hash_password(&req.password)?;
    let user = state.store.create_user(&user, &password_hash)?;
    info!(user_id = %user.id, "account created");

    let principal = state
        .store
        .credentials_by_id(&user.id)?
        .map(SessionUser::from)
        .ok_or_else(WebError::unauthorized)?;
    auth_session.login(&principal).await?;

    Ok((StatusCode::CREATED, Json(user)).into_response())
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    mut auth_session: AuthSession,
    Json(creds): Json<Credentials>,
) -> Result<Json<User>, WebError> {
    let principal = match auth_session.authenticate(creds).await? {
        Some(principal) => principal,
        None => return Err(CoinfolioError::from(AuthError::InvalidCredentials).into()),
    };
    auth_session.login(&principal).await?;
    Ok(Json(state.store.get_user(&principal.id)?))
}

pub async fn logout(mut auth_session: AuthSession) -> Result<StatusCode, WebError> {
    auth_session.logout().await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn me(
    State(state): State<Arc<AppState>>,
    auth_session: AuthSession,
) -> Result<Json<User>, WebError> {
    Ok(Json(state.current_user(&auth_session)?))
}

pub async fn update_me(
    State(state): State<Arc<AppState>>,
    auth_session: AuthSession,
    Json(update): Json<ProfileUpdate>,
) -> Result<Json<User>, WebError> {
    let user = state.current_user(&auth_session)?;
    let updated = update.apply(&user)?;
    Ok(Json(state.store.save_user(&updated)?))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PasswordChange {
    pub current_password: String,
    pub new_password: String,
}

pub async fn change_password(
    State(state): State<Arc<AppState>>,
    mut auth_session: AuthSession,
    Json(req): Json<PasswordChange>,
) -> Result<StatusCode, WebError> {
    let principal = auth_session.user.clone().ok_or_else(WebError::unauthorized)?;
    let stored = state
        .store
        .credentials_by_id(&principal.id)?
        .ok_or_else(WebError::unauthorized)?;
    if !verify_password(&req.current_password, &stored.password_hash) {
        return Err(CoinfolioError::from(AuthError::InvalidCredentials).into());
    }
    validate_password(&req.new_password)?;

    let password_hash = hash_password(&req.new_password)?;
    state.store.set_password_hash(&principal.id, &password_hash)?;

    // The session hash changed with the password; re-issue it for this session.
    let refreshed = state
        .store
        .credentials_by_id(&principal.id)?
        .map(SessionUser::from)
        .ok_or_else(WebError::unauthorized)?;
    auth_session.login(&refreshed).await?;
    info!(user_id = %principal.id, "password changed");
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioView {
    #[serde(flatten)]
    pub summary: PortfolioSummary,
    pub allocation: Vec<AllocationSlice>,
}

pub async fn portfolio(
    State(state): State<Arc<AppState>>,
    auth_session: AuthSession,
) -> Result<Json<PortfolioView>, WebError> {
    let user = state.current_user(&auth_session)?;
    let quotes = match state.market.markets(1, QUOTE_PAGE_SIZE).await {
        Ok(coins) => quotes_by_symbol(&coins),
        Err(e) => {
            warn!(error = %e, "market quotes unavailable, valuing from stored snapshots");
            HashMap::new()
        }
    };
    let summary = value_portfolio(&user, &quotes);
    let allocation = summary.allocation();
    Ok(Json(PortfolioView {
        summary,
        allocation,
    }))
}

pub async fn transactions(
    State(state): State<Arc<AppState>>,
    auth_session: AuthSession,
) -> Result<Json<Vec<Transaction>>, WebError> {
    Ok(Json(state.current_user(&auth_session)?.transactions))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeRequest {
    pub coin_id: String,
    pub side: TradeSide,
    pub amount: f64,
}

#[derive(Debug, Serialize)]
pub struct TradeReceipt {
    pub user: User,
    pub transaction: Option<Transaction>,
}

pub async fn trade(
    State(state): State<Arc<AppState>>,
    auth_session: AuthSession,
    Json(req): Json<TradeRequest>,
) -> Result<Response, WebError> {
    let user = state.current_user(&auth_session)?;
    let coin = state.market.coin_detail(&req.coin_id).await?;
    let price = coin.usd_price().ok_or_else(|| CoinfolioError::InvalidAmount {
        reason: format!("no USD price available for {}", coin.id),
    })?;

    let order = TradeOrder {
        side: req.side,
        symbol: coin.symbol.clone(),
        name: coin.name.clone(),
        amount_coin: req.amount,
        price_per_coin: price,
    };
    let tx_id = new_id();
    let updated = execute_trade(&user, &order, tx_id.clone(), Utc::now())?;
    let saved = state.store.save_user(&updated)?;
    info!(user_id = %saved.id, tx_id = %tx_id, side = ?req.side, coin = %coin.id, "trade executed");

    let transaction = saved.transaction(&tx_id).cloned();
    Ok((
        StatusCode::CREATED,
        Json(TradeReceipt {
            user: saved,
            transaction,
        }),
    )
        .into_response())
}

pub async fn my_deposits(
    State(state): State<Arc<AppState>>,
    auth_session: AuthSession,
) -> Result<Json<Vec<DepositRequest>>, WebError> {
    let user = state.current_user(&auth_session)?;
    Ok(Json(state.store.list_deposits(&DepositFilter::by_user(&user.id))?))
}

#[derive(Debug, Deserialize)]
pub struct DepositForm {
    pub amount: f64,
    pub method: DepositMethod,
}

pub async fn request_deposit(
    State(state): State<Arc<AppState>>,
    auth_session: AuthSession,
    Json(form): Json<DepositForm>,
) -> Result<Response, WebError> {
    let user = state.current_user(&auth_session)?;
    let request = DepositRequest::new(new_id(), &user, form.amount, form.method, Utc::now())?;
    state.store.create_deposit(&request)?;
    info!(user_id = %user.id, deposit_id = %request.id, amount = request.amount, "deposit requested");
    Ok((StatusCode::CREATED, Json(request)).into_response())
}
