//! Market-data proxy and typed market views.

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::debug;

use crate::domain::error::CoinfolioError;
use crate::domain::market::{Coin, CoinDetail, PricePoint};
use crate::domain::signal::{generate_signal, TechnicalSignal, MIN_POINTS};

use super::{AppState, WebError};

const MAX_PER_PAGE: u32 = 250;
const MAX_CHART_DAYS: u32 = 365;
/// History requested for a signal; comfortably above the long SMA period.
const SIGNAL_HISTORY_DAYS: u32 = 365;

/// Upstream paths must be absolute and stay inside the API root. An encoded
/// dot (`%2e`) is refused too, since the URL parser decodes it into a dot segment.
pub(crate) fn check_endpoint(endpoint: &str) -> Result<(), WebError> {
    let escapes = endpoint.contains("..")
        || endpoint.contains("://")
        || endpoint.to_ascii_lowercase().contains("%2e");
    if !endpoint.starts_with('/') || escapes {
        return Err(WebError::bad_request("Endpoint must be an absolute API path."));
    }
    Ok(())
}

/// `GET /api/proxy?endpoint=/coins/markets&vs_currency=usd`
pub async fn proxy(
    State(state): State<Arc<AppState>>,
    Query(params): Query<Vec<(String, String)>>,
) -> Result<Response, WebError> {
    let endpoint = params
        .iter()
        .find(|(k, _)| k == "endpoint")
        .map(|(_, v)| v.clone())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| WebError::bad_request("Endpoint query parameter is required."))?;
    check_endpoint(&endpoint)?;

    let forwarded: Vec<(String, String)> =
        params.into_iter().filter(|(k, _)| k != "endpoint").collect();
    debug!(%endpoint, params = forwarded.len(), "proxying");

    let reply = state.market.forward(&endpoint, &forwarded).await?;
    let status = StatusCode::from_u16(reply.status).unwrap_or(StatusCode::BAD_GATEWAY);
    if !reply.is_success() {
        return Err(WebError::new(status, reply.error_message()));
    }

    let mut response = (status, Json(reply.body)).into_response();
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static(state.cache_policy.header_value()),
    );
    Ok(response)
}

#[derive(Debug, Deserialize)]
pub struct ListingQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

pub async fn listing(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListingQuery>,
) -> Result<Json<Vec<Coin>>, WebError> {
    let page = query.page.unwrap_or(1).max(1);
    let per_page = query.per_page.unwrap_or(100).clamp(1, MAX_PER_PAGE);
    Ok(Json(state.market.markets(page, per_page).await?))
}

pub async fn coin(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<CoinDetail>, WebError> {
    Ok(Json(state.market.coin_detail(&id).await?))
}

#[derive(Debug, Deserialize)]
pub struct ChartQuery {
    pub days: Option<u32>,
}

pub async fn chart(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(query): Query<ChartQuery>,
) -> Result<Json<Vec<PricePoint>>, WebError> {
    let days = query.days.unwrap_or(30).clamp(1, MAX_CHART_DAYS);
    Ok(Json(state.market.ohlc(&id, days).await?))
}

pub async fn signal(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<TechnicalSignal>, WebError> {
    let history = state.market.daily_history(&id, SIGNAL_HISTORY_DAYS).await?;
    let signal = generate_signal(&history).ok_or(CoinfolioError::InsufficientData {
        points: history.len(),
        minimum: MIN_POINTS,
    })?;
    Ok(Json(signal))
}
