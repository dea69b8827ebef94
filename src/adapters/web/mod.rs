//! JSON API over axum.
//!
//! Public market routes, session-authenticated account routes and admin
//! routes that re-check the caller's role on every request.

mod admin;
pub mod auth;
mod error;
mod handlers;
mod market;

pub use auth::{Backend, SessionUser};
pub use error::WebError;

use axum::{
    Router,
    routing::{delete, get, post},
};
use axum_login::{AuthManagerLayerBuilder, login_required};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tower_sessions::cookie::Key;
use tower_sessions::{Expiry, SessionManagerLayer};
use tower_sessions_rusqlite_store::RusqliteStore;

use crate::domain::config_validation::{AuthSettings, CachePolicy};
use crate::domain::error::CoinfolioError;
use crate::domain::user::User;
use crate::ports::market_port::MarketDataPort;
use crate::ports::store_port::ProfileStore;

pub type AuthSession = axum_login::AuthSession<Backend>;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ProfileStore>,
    pub market: Arc<dyn MarketDataPort>,
    pub cache_policy: CachePolicy,
}

impl AppState {
    /// Reload the signed-in user from the store.
    pub(crate) fn current_user(&self, session: &AuthSession) -> Result<User, WebError> {
        let principal = session.user.as_ref().ok_or_else(WebError::unauthorized)?;
        Ok(self.store.get_user(&principal.id)?)
    }

    /// As `current_user`, but the stored role must be ADMIN.
    pub(crate) fn current_admin(&self, session: &AuthSession) -> Result<User, WebError> {
        let user = self.current_user(session)?;
        if !user.is_admin() {
            return Err(CoinfolioError::Forbidden.into());
        }
        Ok(user)
    }
}

fn session_err(reason: impl std::fmt::Display) -> CoinfolioError {
    CoinfolioError::ConfigInvalid {
        section: "auth".into(),
        key: "session_db".into(),
        reason: reason.to_string(),
    }
}

async fn session_store(auth: &AuthSettings) -> Result<RusqliteStore, CoinfolioError> {
    let conn = tokio_rusqlite::Connection::open(&auth.session_db)
        .await
        .map_err(session_err)?;
    let store = RusqliteStore::new(conn);
    store.migrate().await.map_err(session_err)?;
    Ok(store)
}

fn session_key(auth: &AuthSettings) -> Result<Key, CoinfolioError> {
    let invalid = |reason: String| CoinfolioError::ConfigInvalid {
        section: "auth".into(),
        key: "session_secret".into(),
        reason,
    };
    let secret = hex::decode(&auth.session_secret).map_err(|e| invalid(e.to_string()))?;
    Key::try_from(secret.as_slice()).map_err(|e| invalid(e.to_string()))
}

pub async fn build_router(state: AppState, auth: &AuthSettings) -> Result<Router, CoinfolioError> {
    let backend = Backend::new(state.store.clone());
    let session_layer = SessionManagerLayer::new(session_store(auth).await?)
        .with_secure(auth.secure_cookie)
        .with_expiry(Expiry::OnInactivity(time::Duration::seconds(
            auth.session_lifetime_secs,
        )))
        .with_signed(session_key(auth)?);
    let auth_layer = AuthManagerLayerBuilder::new(backend, session_layer).build();

    let account = Router::new()
        .route("/api/me", get(handlers::me).patch(handlers::update_me))
        .route("/api/me/password", post(handlers::change_password))
        .route("/api/portfolio", get(handlers::portfolio))
        .route("/api/transactions", get(handlers::transactions))
        .route("/api/trades", post(handlers::trade))
        .route(
            "/api/deposits",
            get(handlers::my_deposits).post(handlers::request_deposit),
        )
        .route("/api/admin/users", get(admin::list_users))
        .route(
            "/api/admin/users/{id}",
            get(admin::get_user).patch(admin::update_user),
        )
        .route("/api/admin/users/{id}/balance", post(admin::adjust_balance))
        .route("/api/admin/users/{id}/holdings", post(admin::grant_holding))
        .route(
            "/api/admin/users/{id}/transactions/{tx}",
            delete(admin::delete_transaction),
        )
        .route("/api/admin/deposits", get(admin::list_deposits))
        .route("/api/admin/deposits/{id}/approve", post(admin::approve_deposit))
        .route("/api/admin/deposits/{id}/reject", post(admin::reject_deposit))
        .route_layer(login_required!(Backend));

    Ok(Router::new()
        .route("/health", get(handlers::health))
        .route("/signup", post(handlers::signup))
        .route("/login", post(handlers::login))
        .route("/logout", post(handlers::logout))
        .route("/api/proxy", get(market::proxy))
        .route("/api/market", get(market::listing))
        .route("/api/coins/{id}", get(market::coin))
        .route("/api/coins/{id}/chart", get(market::chart))
        .route("/api/coins/{id}/signal", get(market::signal))
        .merge(account)
        .fallback(handlers::not_found)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(auth_layer),
        )
        .with_state(Arc::new(state)))
}
