//! The fleet scheduler: one pass over every eligible token, one cycle
//! step each, under the global trade budget.

use anyhow::Result;
use rand::seq::SliceRandom;
use std::time::Duration;
use tracing::warn;

use crate::config::RuntimeSettings;
use crate::model::{AlgoParams, Algorithm};
use crate::report::{ActorIds, ErrorReport, ReportKind};

use super::cycle::{step_token, trade_limit, StepOutcome};
use super::strategy::SkipReason;
use super::EngineCtx;

/// A token pauses for one tick once its failure streak reaches this.
const FAILURE_PAUSE_THRESHOLD: u32 = 10;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TickSummary {
    pub eligible: usize,
    pub attempted: usize,
    pub traded: usize,
    pub transitions: usize,
    pub skipped: usize,
    pub failed: usize,
    pub budget_exhausted: bool,
}

/// One scheduler pass. `turbo` selects the short-period turbo scan;
/// the main pass covers every other algorithm.
pub async fn run_flywheel_tick(
    ctx: &EngineCtx,
    settings: &RuntimeSettings,
    turbo: bool,
) -> Result<TickSummary> {
    let mut rows = ctx.store.list_tokens_for_scheduler(None).await?;
    rows.retain(|r| (r.config.algorithm() == Algorithm::TurboLite) == turbo);

    let mut summary = TickSummary {
        eligible: rows.len(),
        ..TickSummary::default()
    };

    // Per-tick budget: the governing per-minute cap prorated over this
    // tick's period, never more than one step per eligible token. The
    // turbo pass takes its cap from the turbo rows themselves, the same
    // source the per-decision check reads.
    let (tick_cap, period_minutes) = if turbo {
        let cap = rows
            .iter()
            .map(|r| trade_limit(r, settings).1)
            .max()
            .unwrap_or(settings.max_trades_per_minute);
        (cap, 1)
    } else {
        (
            settings.max_trades_per_minute,
            settings.flywheel_interval_minutes.max(1),
        )
    };
    let tick_budget = ((tick_cap as u64) * period_minutes).min(rows.len() as u64) as usize;

    // Shuffle so the same tokens are not starved under contention.
    rows.shuffle(&mut rand::rng());

    for row in &rows {
        if summary.traded >= tick_budget && tick_budget > 0 {
            summary.budget_exhausted = true;
            break;
        }

        // Soft circuit breaker: sit out one tick, then resume.
        if row.cycle.consecutive_failures >= FAILURE_PAUSE_THRESHOLD {
            warn!(
                token = row.token.mint.as_str(),
                failures = row.cycle.consecutive_failures,
                "pausing token for one tick"
            );
            let mut cycle = row.cycle.clone();
            cycle.consecutive_failures = 0;
            ctx.store.advance_cycle(&row.token.id, &cycle).await?;
            summary.skipped += 1;
            continue;
        }

        // Skip-if-busy; the claimer may hold this token right now.
        let Some(_guard) = ctx.locks.try_acquire(&row.token.id) else {
            summary.skipped += 1;
            continue;
        };

        summary.attempted += 1;
        match step_token(ctx, row, settings).await {
            Ok(StepOutcome::Traded(_)) => summary.traded += 1,
            Ok(StepOutcome::Transitioned) => summary.transitions += 1,
            Ok(StepOutcome::Skipped(SkipReason::RateLimited)) => {
                summary.skipped += 1;
                summary.budget_exhausted = true;
                break;
            }
            Ok(StepOutcome::Skipped(_)) => summary.skipped += 1,
            Ok(StepOutcome::Failed(_)) => summary.failed += 1,
            Err(e) => {
                summary.failed += 1;
                ctx.reporter.report(&ErrorReport {
                    kind: ReportKind::InvariantViolation,
                    module: "scheduler",
                    operation: "step_token",
                    actors: ActorIds {
                        token: Some(row.token.mint.clone()),
                        wallet: Some(row.ops_wallet.address.clone()),
                        signature: None,
                    },
                    detail: format!("{e:#}"),
                });
            }
        }

        let delay = inter_token_delay(&row.config.params);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }

    Ok(summary)
}

fn inter_token_delay(params: &AlgoParams) -> Duration {
    match params {
        AlgoParams::TurboLite {
            inter_token_delay_ms,
            ..
        } => Duration::from_millis(*inter_token_delay_ms),
        _ => Duration::ZERO,
    }
}
