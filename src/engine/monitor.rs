//! Deposit/activation monitor: watches funded wallets of pending
//! launches and mm-only registrations, and activates them atomically
//! once the deposit threshold is met. Only ever *creates* work for the
//! scheduler.

use anyhow::Result;
use tracing::{info, warn};

use crate::report::{ActorIds, ErrorReport, ReportKind};

use super::EngineCtx;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MonitorSummary {
    pub checked: usize,
    pub activated: usize,
    pub expired: usize,
}

pub async fn run_deposit_tick(ctx: &EngineCtx) -> Result<MonitorSummary> {
    let mut summary = MonitorSummary {
        expired: ctx.store.expire_due_pending().await?,
        ..MonitorSummary::default()
    };

    for pending in ctx.store.list_awaiting_deposit().await? {
        summary.checked += 1;

        // Fresh read, not the cache: the whole point is spotting a new
        // deposit the moment it lands.
        let balance = match ctx
            .reader
            .native_balance(&pending.expected_deposit_address)
            .await
        {
            Ok(balance) => balance,
            Err(e) => {
                warn!(
                    pending = pending.id.as_str(),
                    error = %e,
                    "deposit balance check failed"
                );
                continue;
            }
        };

        if balance < pending.min_amount_lamports {
            continue;
        }

        match ctx.store.activate_pending(&pending.id).await {
            Ok(token) => {
                summary.activated += 1;
                info!(
                    pending = pending.id.as_str(),
                    mint = token.mint.as_str(),
                    "pending activation completed"
                );
                // Post-commit; a notification failure never rolls back.
                ctx.notifier
                    .notify(&format!(
                        "Token {} ({}) activated: deposit of {} base units detected",
                        token.symbol, token.mint, balance
                    ))
                    .await;
            }
            Err(e) => {
                ctx.reporter.report(&ErrorReport {
                    kind: ReportKind::InvariantViolation,
                    module: "monitor",
                    operation: "activate_pending",
                    actors: ActorIds {
                        wallet: Some(pending.expected_deposit_address.clone()),
                        token: Some(pending.payload.mint.clone()),
                        signature: None,
                    },
                    detail: format!("{e:#}"),
                });
            }
        }
    }

    Ok(summary)
}
