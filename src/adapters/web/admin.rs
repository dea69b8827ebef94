//! Administrator handlers. Every route reloads the caller and checks the
//! stored role before touching another account.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, warn};

use crate::domain::admin::{self, HoldingGrant};
use crate::domain::deposit::{self, DepositRequest, DepositStatus};
use crate::domain::portfolio::quotes_by_symbol;
use crate::domain::user::{normalize_symbol, ProfileUpdate, User};
use crate::ports::store_port::DepositFilter;

use super::handlers::{new_id, QUOTE_PAGE_SIZE};
use super::{AppState, AuthSession, WebError};

pub async fn list_users(
    State(state): State<Arc<AppState>>,
    auth_session: AuthSession,
) -> Result<Json<Vec<User>>, WebError> {
    state.current_admin(&auth_session)?;
    Ok(Json(state.store.list_users()?))
}

pub async fn get_user(
    State(state): State<Arc<AppState>>,
    auth_session: AuthSession,
    Path(id): Path<String>,
) -> Result<Json<User>, WebError> {
    state.current_admin(&auth_session)?;
    Ok(Json(state.store.get_user(&id)?))
}

pub async fn update_user(
    State(state): State<Arc<AppState>>,
    auth_session: AuthSession,
    Path(id): Path<String>,
    Json(update): Json<ProfileUpdate>,
) -> Result<Json<User>, WebError> {
    let caller = state.current_admin(&auth_session)?;
    let user = state.store.get_user(&id)?;
    let saved = state.store.save_user(&update.apply(&user)?)?;
    info!(admin = %caller.id, user_id = %id, "profile edited by admin");
    Ok(Json(saved))
}

#[derive(Debug, Deserialize)]
pub struct BalanceAdjustment {
    pub amount: f64,
}

pub async fn adjust_balance(
    State(state): State<Arc<AppState>>,
    auth_session: AuthSession,
    Path(id): Path<String>,
    Json(req): Json<BalanceAdjustment>,
) -> Result<Json<User>, WebError> {
    let caller = state.current_admin(&auth_session)?;
    let user = state.store.get_user(&id)?;
    let updated = admin::adjust_balance(&user, req.amount, new_id(), Utc::now())?;
    let saved = state.store.save_user(&updated)?;
    info!(admin = %caller.id, user_id = %id, amount = req.amount, "balance adjusted");
    Ok(Json(saved))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HoldingGrantRequest {
    pub symbol: String,
    pub amount: f64,
    pub target_address: String,
    pub name: Option<String>,
}

pub async fn grant_holding(
    State(state): State<Arc<AppState>>,
    auth_session: AuthSession,
    Path(id): Path<String>,
    Json(req): Json<HoldingGrantRequest>,
) -> Result<Json<User>, WebError> {
    let caller = state.current_admin(&auth_session)?;
    let user = state.store.get_user(&id)?;

    let symbol = normalize_symbol(&req.symbol);
    let (price, listed_name) = match state.market.markets(1, QUOTE_PAGE_SIZE).await {
        Ok(coins) => {
            let name = coins
                .iter()
                .find(|c| normalize_symbol(&c.symbol) == symbol)
                .map(|c| c.name.clone());
            let price = quotes_by_symbol(&coins)
                .get(&symbol)
                .map(|q| q.price)
                .unwrap_or(0.0);
            (price, name)
        }
        Err(e) => {
            warn!(error = %e, %symbol, "no quote for granted coin, recording at zero");
            (0.0, None)
        }
    };

    let grant = HoldingGrant {
        symbol,
        name: req.name.or(listed_name).unwrap_or_default(),
        amount: req.amount,
        price_per_coin: price,
        target_address: req.target_address,
    };
    let updated = admin::grant_holding(&user, &grant, new_id(), Utc::now())?;
    let saved = state.store.save_user(&updated)?;
    info!(admin = %caller.id, user_id = %id, symbol = %grant.symbol, amount = grant.amount, "holding granted");
    Ok(Json(saved))
}

pub async fn delete_transaction(
    State(state): State<Arc<AppState>>,
    auth_session: AuthSession,
    Path((id, tx)): Path<(String, String)>,
) -> Result<Json<User>, WebError> {
    let caller = state.current_admin(&auth_session)?;
    let user = state.store.get_user(&id)?;
    let saved = state.store.save_user(&admin::delete_transaction(&user, &tx)?)?;
    info!(admin = %caller.id, user_id = %id, tx_id = %tx, "transaction deleted");
    Ok(Json(saved))
}

#[derive(Debug, Deserialize)]
pub struct DepositQuery {
    pub status: Option<String>,
}

pub async fn list_deposits(
    State(state): State<Arc<AppState>>,
    auth_session: AuthSession,
    Query(query): Query<DepositQuery>,
) -> Result<Json<Vec<DepositRequest>>, WebError> {
    state.current_admin(&auth_session)?;
    let filter = match query.status.as_deref() {
        None | Some("") => DepositFilter::default(),
        Some(raw) => DepositStatus::parse(raw)
            .map(DepositFilter::by_status)
            .ok_or_else(|| WebError::bad_request(format!("unknown deposit status {raw:?}")))?,
    };
    Ok(Json(state.store.list_deposits(&filter)?))
}

pub async fn approve_deposit(
    State(state): State<Arc<AppState>>,
    auth_session: AuthSession,
    Path(id): Path<String>,
) -> Result<Json<DepositRequest>, WebError> {
    let caller = state.current_admin(&auth_session)?;
    let request = state.store.get_deposit(&id)?;
    let owner = state.store.get_user(&request.user_id)?;
    let (decided, credited) = deposit::approve(&request, &owner, new_id(), Utc::now())?;
    state.store.decide_deposit(&decided, Some(&credited))?;
    info!(admin = %caller.id, deposit_id = %id, user_id = %owner.id, amount = decided.amount, "deposit approved");
    Ok(Json(decided))
}

pub async fn reject_deposit(
    State(state): State<Arc<AppState>>,
    auth_session: AuthSession,
    Path(id): Path<String>,
) -> Result<Json<DepositRequest>, WebError> {
    let caller = state.current_admin(&auth_session)?;
    let request = state.store.get_deposit(&id)?;
    let decided = deposit::reject(&request)?;
    state.store.decide_deposit(&decided, None)?;
    info!(admin = %caller.id, deposit_id = %id, "deposit rejected");
    Ok(Json(decided))
}
