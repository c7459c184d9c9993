//! Read surface for user-facing UIs: token list, token detail, live
//! claimable amounts.

use axum::extract::{Path, State};
use axum::Json;
use serde_json::{json, Value};

use super::error::ApiError;
use super::state::AppState;

pub async fn list_tokens(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let rows = state.ctx.store.list_token_rows().await.map_err(ApiError::from)?;
    let tokens: Vec<Value> = rows
        .iter()
        .map(|row| {
            json!({
                "mint": row.token.mint,
                "symbol": row.token.symbol,
                "source": row.token.source.as_str(),
                "active": row.token.active,
                "graduated": row.token.graduated,
                "algorithm": row.config.algorithm().as_str(),
                "flywheel_active": row.config.flywheel_active,
                "auto_claim_enabled": row.config.auto_claim_enabled,
            })
        })
        .collect();
    Ok(Json(json!({ "tokens": tokens })))
}

pub async fn token_detail(
    State(state): State<AppState>,
    Path(mint): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let row = state
        .ctx
        .store
        .token_row_by_mint(&mint)
        .await
        .map_err(ApiError::from)?
        .ok_or_else(|| ApiError::NotFound(format!("no token with mint {mint}")))?;

    let trades = state
        .ctx
        .store
        .recent_trades(&row.token.id, 50)
        .await
        .map_err(ApiError::from)?;
    let claims = state
        .ctx
        .store
        .recent_claims(&row.token.id, 50)
        .await
        .map_err(ApiError::from)?;

    Ok(Json(json!({
        "token": row.token,
        "config": row.config,
        "cycle": row.cycle,
        "recent_trades": trades,
        "recent_claims": claims,
    })))
}

pub async fn claimable_amount(
    State(state): State<AppState>,
    Path(mint): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let row = state
        .ctx
        .store
        .token_row_by_mint(&mint)
        .await
        .map_err(ApiError::from)?
        .ok_or_else(|| ApiError::NotFound(format!("no token with mint {mint}")))?;

    let positions = state
        .ctx
        .sdk
        .list_claimable(&row.dev_wallet.address)
        .await
        .map_err(ApiError::from)?;
    let claimable = positions
        .iter()
        .find(|p| p.mint == mint)
        .map(|p| p.claimable_lamports)
        .unwrap_or(0);

    Ok(Json(json!({ "mint": mint, "claimable_lamports": claimable })))
}
