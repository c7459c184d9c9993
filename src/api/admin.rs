//! Admin control plane: runtime toggles, per-job triggers, threshold
//! and fee updates, per-token config overrides. All writes land in the
//! store; components observe them on their next tick.

use std::collections::HashMap;

use axum::extract::{Path, State};
use axum::Json;
use serde_json::{json, Value};

use crate::engine::Job;
use crate::store::OVERRIDABLE_KEYS;

use super::auth::AdminAuth;
use super::error::ApiError;
use super::state::AppState;

pub async fn issue_nonce(State(state): State<AppState>) -> Json<Value> {
    Json(json!({ "nonce": state.nonces.issue() }))
}

/// Partial runtime-config update. Unknown keys are rejected so schema
/// drift between surfaces cannot creep in silently.
pub async fn update_config(
    _auth: AdminAuth,
    State(state): State<AppState>,
    Json(updates): Json<HashMap<String, Value>>,
) -> Result<Json<Value>, ApiError> {
    for key in updates.keys() {
        if !OVERRIDABLE_KEYS.contains(&key.as_str()) {
            return Err(ApiError::BadRequest(format!("unknown setting '{key}'")));
        }
    }

    for (key, value) in &updates {
        let rendered = match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        state
            .ctx
            .store
            .set_platform_setting(key, &rendered)
            .await
            .map_err(ApiError::from)?;
    }

    let merged = state
        .ctx
        .store
        .runtime_settings(&state.ctx.env.settings)
        .await
        .map_err(ApiError::from)?;
    Ok(Json(json!({ "ok": true, "settings": merged })))
}

pub async fn list_jobs(
    _auth: AdminAuth,
    State(state): State<AppState>,
) -> Result<Json<Value>, ApiError> {
    let settings = state
        .ctx
        .store
        .runtime_settings(&state.ctx.env.settings)
        .await
        .map_err(ApiError::from)?;
    let overrides = state
        .ctx
        .store
        .platform_overrides()
        .await
        .map_err(ApiError::from)?;

    let jobs: Vec<Value> = Job::ALL
        .iter()
        .map(|job| {
            let enabled = match job {
                Job::Flywheel | Job::TurboFlywheel => settings.multi_user_flywheel_enabled,
                Job::Claim => settings.fast_claim_job_enabled,
                Job::DepositMonitor => settings.deposit_monitor_enabled,
            };
            json!({ "job": job.as_str(), "enabled": enabled })
        })
        .collect();

    Ok(Json(json!({
        "jobs": jobs,
        "settings": settings,
        "overrides": overrides.into_iter().collect::<HashMap<_, _>>(),
    })))
}

pub async fn trigger_job(
    _auth: AdminAuth,
    State(state): State<AppState>,
    Path(job): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let job: Job = job
        .parse()
        .map_err(|e: anyhow::Error| ApiError::BadRequest(e.to_string()))?;
    state
        .triggers
        .send(job)
        .await
        .map_err(|_| ApiError::Internal("trigger channel closed".into()))?;
    Ok(Json(json!({ "ok": true, "triggered": job.as_str() })))
}

/// Replace a token's configuration. Validation happens at this single
/// write boundary; the scheduler and monitor only ever read the stored
/// variant.
pub async fn update_token_config(
    _auth: AdminAuth,
    State(state): State<AppState>,
    Path(mint): Path<String>,
    Json(config): Json<crate::model::TokenConfig>,
) -> Result<Json<Value>, ApiError> {
    let row = state
        .ctx
        .store
        .token_row_by_mint(&mint)
        .await
        .map_err(ApiError::from)?
        .ok_or_else(|| ApiError::NotFound(format!("no token with mint {mint}")))?;

    state
        .ctx
        .store
        .update_token_config(&row.token.id, &config)
        .await
        .map_err(|e| ApiError::BadRequest(format!("{e:#}")))?;
    Ok(Json(json!({ "ok": true })))
}

/// Status of the platform's own self-trade wheel.
pub async fn wheel_status(
    _auth: AdminAuth,
    State(state): State<AppState>,
) -> Result<Json<Value>, ApiError> {
    let rows = state
        .ctx
        .store
        .platform_token_rows()
        .await
        .map_err(ApiError::from)?;

    let mut wheels = Vec::new();
    for row in rows {
        let trades = state
            .ctx
            .store
            .recent_trades(&row.token.id, 20)
            .await
            .map_err(ApiError::from)?;
        wheels.push(json!({
            "mint": row.token.mint,
            "symbol": row.token.symbol,
            "phase": row.cycle.phase.as_str(),
            "buy_count": row.cycle.buy_count,
            "sell_count": row.cycle.sell_count,
            "consecutive_failures": row.cycle.consecutive_failures,
            "algorithm": row.config.algorithm().as_str(),
            "recent_trades": trades,
        }));
    }
    Ok(Json(json!({ "wheel": wheels })))
}
