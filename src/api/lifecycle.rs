//! Lifecycle surface consumed by the onboarding/launch collaborators:
//! pending activations, direct registration, reactivation by proof of
//! wallet possession.

use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::model::amount::sol_to_lamports;
use crate::model::{PendingKind, PendingPayload};
use crate::store::RegisterTokenSpec;

use super::auth::verify_detached;
use super::error::ApiError;
use super::state::AppState;

#[derive(Deserialize)]
pub struct CreatePendingRequest {
    pub kind: PendingKind,
    pub expected_deposit_address: String,
    pub min_amount_sol: f64,
    pub payload: PendingPayload,
}

pub async fn create_pending(
    State(state): State<AppState>,
    Json(req): Json<CreatePendingRequest>,
) -> Result<Json<Value>, ApiError> {
    if req.min_amount_sol <= 0.0 {
        return Err(ApiError::BadRequest("min_amount_sol must be positive".into()));
    }
    if req.expected_deposit_address.is_empty() {
        return Err(ApiError::BadRequest("deposit address required".into()));
    }

    let pending = state
        .ctx
        .store
        .create_pending(
            req.kind,
            &req.expected_deposit_address,
            sol_to_lamports(req.min_amount_sol),
            &req.payload,
        )
        .await
        .map_err(ApiError::from)?;

    Ok(Json(json!({
        "id": pending.id,
        "status": pending.status.as_str(),
        "expires_at": pending.expires_at.to_rfc3339(),
    })))
}

pub async fn cancel_pending(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    state
        .ctx
        .store
        .cancel_pending(&id)
        .await
        .map_err(|e| ApiError::Conflict(format!("{e:#}")))?;
    Ok(Json(json!({ "ok": true })))
}

pub async fn register_token(
    State(state): State<AppState>,
    Json(spec): Json<RegisterTokenSpec>,
) -> Result<Json<Value>, ApiError> {
    let token = state
        .ctx
        .store
        .register_token(&spec)
        .await
        .map_err(|e| ApiError::Conflict(format!("{e:#}")))?;

    // Platform wheel tokens trade within the configured wheel bounds.
    if token.source == crate::model::TokenSource::Platform {
        if let Some(row) = state
            .ctx
            .store
            .token_row_by_mint(&token.mint)
            .await
            .map_err(ApiError::from)?
        {
            let mut config = row.config;
            config.min_buy_lamports = state.ctx.env.wheel_min_buy_lamports;
            config.max_buy_lamports = state.ctx.env.wheel_max_buy_lamports;
            state
                .ctx
                .store
                .update_token_config(&token.id, &config)
                .await
                .map_err(ApiError::from)?;
        }
    }

    Ok(Json(json!({
        "id": token.id,
        "mint": token.mint,
        "source": token.source.as_str(),
    })))
}

#[derive(Deserialize)]
pub struct ReactivateRequest {
    pub mint: String,
    pub nonce: String,
    /// Detached signatures over the nonce by the dev and ops wallet
    /// keys; possession of both wallets is the reactivation proof.
    pub dev_signature: String,
    pub ops_signature: String,
}

pub async fn reactivate_token(
    State(state): State<AppState>,
    Json(req): Json<ReactivateRequest>,
) -> Result<Json<Value>, ApiError> {
    if !state.nonces.consume(&req.nonce) {
        return Err(ApiError::Unauthorized("unknown or expired nonce".into()));
    }

    let row = state
        .ctx
        .store
        .token_row_by_mint(&req.mint)
        .await
        .map_err(ApiError::from)?
        .ok_or_else(|| ApiError::NotFound(format!("no token with mint {}", req.mint)))?;
    if row.token.active {
        return Err(ApiError::Conflict("token is already active".into()));
    }

    let verifier = |wallet_address: &str, signature: &str| -> bool {
        verify_detached(wallet_address, &req.nonce, signature)
    };
    if !verifier(&row.dev_wallet.address, &req.dev_signature) {
        return Err(ApiError::Unauthorized("dev wallet proof failed".into()));
    }
    if !verifier(&row.ops_wallet.address, &req.ops_signature) {
        return Err(ApiError::Unauthorized("ops wallet proof failed".into()));
    }

    let token = state
        .ctx
        .store
        .reactivate_token(&req.mint)
        .await
        .map_err(|e| ApiError::Conflict(format!("{e:#}")))?;

    Ok(Json(json!({
        "id": token.id,
        "mint": token.mint,
        "active": token.active,
    })))
}
