//! Credit accounting endpoints

use std::sync::Arc;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use serde::{Deserialize, Serialize};
use tower_cookies::Cookies;

use siteforge_core::{
    CreditStore, NewTransaction, TenantStore, Transaction, TransactionReason, UserId,
};

use crate::error::ApiError;
use crate::images::ImageSearch;
use crate::state::AppState;

/// Idempotency key that makes the welcome grant apply once per user
const WELCOME_GRANT_KEY: &str = "welcome";

/// Apply the configured welcome grant the first time a user shows up.
/// The idempotency key keeps this exactly-once even under concurrent
/// first requests.
fn apply_welcome_grant<C, T, P>(
    state: &AppState<C, T, P>,
    user: &UserId,
) -> Result<(), ApiError>
where
    C: CreditStore,
    T: TenantStore,
    P: ImageSearch,
{
    if state.config.welcome_grant_credits > 0 {
        state.credit_store.append_transaction(NewTransaction {
            user_id: user.clone(),
            amount: state.config.welcome_grant_credits,
            reason: TransactionReason::Grant,
            related_conversion_id: None,
            idempotency_key: Some(WELCOME_GRANT_KEY.to_string()),
        })?;
    }
    Ok(())
}

#[derive(Serialize)]
pub struct BalanceResponse {
    pub balance: i64,
}

/// GET /credits/balance
pub async fn balance<C, T, P>(
    State(state): State<Arc<AppState<C, T, P>>>,
    cookies: Cookies,
    headers: HeaderMap,
) -> Result<Json<BalanceResponse>, ApiError>
where
    C: CreditStore,
    T: TenantStore,
    P: ImageSearch,
{
    let user = state
        .identity
        .principal(&headers, &cookies)
        .ok_or(ApiError::Unauthorized)?;

    apply_welcome_grant(&state, &user)?;
    let balance = state.credit_store.user_credits(&user)?;

    Ok(Json(BalanceResponse { balance }))
}

#[derive(Serialize)]
pub struct TransactionsResponse {
    pub transactions: Vec<Transaction>,
}

/// GET /credits/transactions
pub async fn list_transactions<C, T, P>(
    State(state): State<Arc<AppState<C, T, P>>>,
    cookies: Cookies,
    headers: HeaderMap,
) -> Result<Json<TransactionsResponse>, ApiError>
where
    C: CreditStore,
    T: TenantStore,
    P: ImageSearch,
{
    let user = state
        .identity
        .principal(&headers, &cookies)
        .ok_or(ApiError::Unauthorized)?;

    let transactions = state.credit_store.transactions_for_user(&user)?;

    Ok(Json(TransactionsResponse { transactions }))
}

#[derive(Deserialize)]
pub struct RecordConversionRequest {
    pub anonymous_session_id: String,
    pub amount: i64,
}

#[derive(Serialize)]
pub struct RecordConversionResponse {
    pub success: bool,
}

/// POST /credits/pending-conversion
///
/// Registers credits accrued by an anonymous session for later
/// reconciliation. Recording over an existing pending conversion replaces
/// it; the user never holds more than one.
pub async fn record_pending_conversion<C, T, P>(
    State(state): State<Arc<AppState<C, T, P>>>,
    cookies: Cookies,
    headers: HeaderMap,
    Json(request): Json<RecordConversionRequest>,
) -> Result<Json<RecordConversionResponse>, ApiError>
where
    C: CreditStore,
    T: TenantStore,
    P: ImageSearch,
{
    let user = state
        .identity
        .principal(&headers, &cookies)
        .ok_or(ApiError::Unauthorized)?;

    if request.anonymous_session_id.trim().is_empty() {
        return Err(ApiError::Validation(
            "Anonymous session id must not be empty".to_string(),
        ));
    }

    state.credit_store.record_pending_conversion(
        &user,
        request.anonymous_session_id.trim(),
        request.amount,
    )?;

    Ok(Json(RecordConversionResponse { success: true }))
}

#[derive(Serialize)]
pub struct ResolveConversionResponse {
    pub success: bool,
    /// Amount folded into the ledger, absent when nothing was pending
    #[serde(skip_serializing_if = "Option::is_none")]
    pub converted_amount: Option<i64>,
}

/// POST /credits/resolve-conversion
pub async fn resolve_conversion<C, T, P>(
    State(state): State<Arc<AppState<C, T, P>>>,
    cookies: Cookies,
    headers: HeaderMap,
) -> Result<Json<ResolveConversionResponse>, ApiError>
where
    C: CreditStore,
    T: TenantStore,
    P: ImageSearch,
{
    let user = state
        .identity
        .principal(&headers, &cookies)
        .ok_or(ApiError::Unauthorized)?;

    let converted = state.credit_store.resolve_pending_conversion(&user)?;
    if let Some(record) = &converted {
        tracing::info!(
            user_id = %user.0,
            amount = record.amount,
            "Settled pending conversion"
        );
    }

    Ok(Json(ResolveConversionResponse {
        success: true,
        converted_amount: converted.map(|record| record.amount),
    }))
}

#[derive(Serialize)]
pub struct ClearConversionResponse {
    pub success: bool,
}

/// POST /credits/clear-conversion
///
/// Discards the pending conversion without converting it. This is the one
/// route that honors the dev-mode default principal, so local frontends can
/// reset conversion state without a full identity setup.
pub async fn clear_conversion<C, T, P>(
    State(state): State<Arc<AppState<C, T, P>>>,
    cookies: Cookies,
    headers: HeaderMap,
) -> Result<Json<ClearConversionResponse>, ApiError>
where
    C: CreditStore,
    T: TenantStore,
    P: ImageSearch,
{
    let user = state
        .identity
        .principal_or_default(&headers, &cookies)
        .ok_or(ApiError::Unauthorized)?;

    state.credit_store.clear_pending_conversion(&user)?;

    Ok(Json(ClearConversionResponse { success: true }))
}
