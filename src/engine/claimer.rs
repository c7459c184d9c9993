//! The reward-harvest pipeline: discover claimable creator fees across
//! every eligible token, claim them in bounded parallel batches, and
//! settle the platform/owner split.

use std::collections::HashMap;
use std::time::Duration;

use anyhow::Result;
use tokio::task::JoinSet;
use tracing::{info, warn};

use solwire::ClaimablePosition;

use crate::config::RuntimeSettings;
use crate::gateway::{SubmitError, WalletRef};
use crate::model::{Claim, Trade, TradeSide};
use crate::report::{ActorIds, ErrorReport, ReportKind};
use crate::store::TokenRow;

use super::EngineCtx;

/// Wallet discovery runs in parallel batches of this size.
const WALLET_BATCH: usize = 10;
const WALLET_BATCH_PAUSE: Duration = Duration::from_millis(200);

/// Claim attempts run this many at a time.
const CLAIM_CONCURRENCY: usize = 5;
const CLAIM_BATCH_PAUSE: Duration = Duration::from_millis(500);

const CLAIM_ATTEMPTS: u32 = 3;

/// Native units left in the dev wallet to pay for future claims.
pub const CLAIM_RESERVE_LAMPORTS: u64 = 100_000_000; // 0.1

/// Failing this many cycles in a row gets reported (but stays eligible).
const FAILSTREAK_REPORT_AT: u32 = 3;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ClaimSummary {
    pub wallets_scanned: usize,
    pub qualifying: usize,
    pub claimed: usize,
    pub failed: usize,
    pub skipped_busy: usize,
}

pub async fn run_claim_cycle(
    ctx: &EngineCtx,
    settings: &RuntimeSettings,
) -> Result<ClaimSummary> {
    let rows = ctx.store.list_tokens_for_claim().await?;
    let mut summary = ClaimSummary::default();

    // Many tokens may share one dev wallet; discovery is per wallet.
    let mut by_wallet: HashMap<String, Vec<TokenRow>> = HashMap::new();
    for row in rows {
        by_wallet
            .entry(row.dev_wallet.address.clone())
            .or_default()
            .push(row);
    }
    summary.wallets_scanned = by_wallet.len();

    let wallets: Vec<String> = by_wallet.keys().cloned().collect();
    let mut positions: HashMap<String, Vec<ClaimablePosition>> = HashMap::new();

    for batch in wallets.chunks(WALLET_BATCH) {
        let mut tasks = JoinSet::new();
        for wallet in batch {
            let sdk = ctx.sdk.clone();
            let wallet = wallet.clone();
            tasks.spawn(async move {
                let result = sdk.list_claimable(&wallet).await;
                (wallet, result)
            });
        }
        while let Some(joined) = tasks.join_next().await {
            let Ok((wallet, result)) = joined else { continue };
            match result {
                Ok(found) => {
                    positions.insert(wallet, found);
                }
                Err(e) => warn!(wallet, error = %e, "claimable discovery failed"),
            }
        }
        tokio::time::sleep(WALLET_BATCH_PAUSE).await;
    }

    // Pair each qualifying position with its token row.
    let mut work: Vec<(TokenRow, ClaimablePosition)> = Vec::new();
    for (wallet, found) in positions {
        let Some(rows) = by_wallet.get(&wallet) else {
            continue;
        };
        for position in found {
            let Some(row) = rows.iter().find(|r| r.token.mint == position.mint) else {
                continue;
            };
            let threshold = if row.token.fee_exempt() {
                settings.platform_claim_threshold_lamports
            } else {
                settings.fast_claim_threshold_lamports
            };
            if position.claimable_lamports >= threshold {
                work.push((row.clone(), position));
            }
        }
    }
    summary.qualifying = work.len();

    for batch in work.chunks(CLAIM_CONCURRENCY) {
        let mut tasks = JoinSet::new();
        for (row, position) in batch {
            let ctx = ctx.clone();
            let settings = settings.clone();
            let row = row.clone();
            let position = position.clone();
            tasks.spawn(async move { claim_one(&ctx, &settings, &row, &position).await });
        }
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(ClaimOutcome::Claimed) => summary.claimed += 1,
                Ok(ClaimOutcome::Busy) => summary.skipped_busy += 1,
                Ok(ClaimOutcome::Failed) => summary.failed += 1,
                Err(e) => {
                    summary.failed += 1;
                    warn!(error = %e, "claim task panicked");
                }
            }
        }
        tokio::time::sleep(CLAIM_BATCH_PAUSE).await;
    }

    Ok(summary)
}

enum ClaimOutcome {
    Claimed,
    Busy,
    Failed,
}

async fn claim_one(
    ctx: &EngineCtx,
    settings: &RuntimeSettings,
    row: &TokenRow,
    position: &ClaimablePosition,
) -> ClaimOutcome {
    let token = &row.token;

    // Same lock the scheduler uses: never race the wheel on this token.
    let Some(_guard) = ctx.locks.try_acquire(&token.id) else {
        return ClaimOutcome::Busy;
    };

    let signature = match execute_claim(ctx, row).await {
        Ok(signature) => signature,
        Err(e) => {
            warn!(token = token.mint.as_str(), error = %e, "claim failed after retries");
            note_failure(ctx, token);
            return ClaimOutcome::Failed;
        }
    };

    clear_failures(ctx, token);
    let gross = position.claimable_lamports;
    let (platform_fee, owner_share) = split_amounts(
        gross,
        row.config.fee_percentage,
        token.fee_exempt(),
        settings.platform_fee_percentage,
    );

    settle_split(ctx, row, platform_fee, owner_share).await;

    // The claim row is written once the gross claim lands; transfer
    // hiccups reconcile on the next cycle from fresh on-chain state.
    let claim = Claim::new(&token.id, gross, platform_fee, owner_share, signature);
    if let Err(e) = ctx.store.record_claim(&claim).await {
        ctx.reporter.report(&ErrorReport {
            kind: ReportKind::InvariantViolation,
            module: "claimer",
            operation: "record_claim",
            actors: ActorIds {
                token: Some(token.mint.clone()),
                wallet: Some(row.dev_wallet.address.clone()),
                signature: Some(claim.signature.clone()),
            },
            detail: format!("{e:#}"),
        });
    }

    ctx.balances.invalidate_wallet(&row.dev_wallet.address).await;
    info!(
        token = token.mint.as_str(),
        gross, platform_fee, owner_share, "claim settled"
    );
    ClaimOutcome::Claimed
}

/// Up to three attempts with exponential backoff. Every attempt builds a
/// *fresh* unsigned claim transaction; a stale one is never re-signed.
async fn execute_claim(ctx: &EngineCtx, row: &TokenRow) -> Result<String> {
    let dev = &row.dev_wallet;
    let wallet = WalletRef::from(dev);
    let mints = vec![row.token.mint.clone()];
    let mut last_error: Option<anyhow::Error> = None;

    for attempt in 1..=CLAIM_ATTEMPTS {
        if attempt > 1 {
            // 2s before the second attempt, 4s before the third.
            let backoff = Duration::from_secs(1 << (attempt - 1));
            tokio::time::sleep(backoff).await;
        }

        let txs = match ctx.sdk.build_claim_txs(&dev.address, &mints).await {
            Ok(txs) => txs,
            Err(e) => {
                last_error = Some(e);
                continue;
            }
        };

        let mut signature = None;
        let mut attempt_failed = None;
        for tx in &txs {
            match ctx.gateway.submit(&wallet, tx, "claim").await {
                Ok(confirmation) => signature = Some(confirmation.signature),
                Err(e) => {
                    attempt_failed = Some(e);
                    break;
                }
            }
        }

        match attempt_failed {
            None => {
                if let Some(signature) = signature {
                    return Ok(signature);
                }
                anyhow::bail!("claim builder returned no transactions");
            }
            Some(e @ SubmitError::BlockhashExpired)
            | Some(e @ SubmitError::ConfirmationTimeout) => {
                // Regenerate next attempt; never resubmit these bytes.
                last_error = Some(e.into());
            }
            Some(e) => return Err(e.into()),
        }
    }

    Err(last_error.unwrap_or_else(|| anyhow::anyhow!("claim attempts exhausted")))
}

/// Split the harvested amount. A fixed reserve stays in the dev wallet
/// for future claim fees; platform-owned tokens skip the fee leg.
pub fn split_amounts(
    gross: u64,
    token_fee_percentage: f64,
    fee_exempt: bool,
    default_fee_percentage: f64,
) -> (u64, u64) {
    let transferable = gross.saturating_sub(CLAIM_RESERVE_LAMPORTS);
    if transferable == 0 {
        return (0, 0);
    }
    if fee_exempt {
        return (0, transferable);
    }
    let pct = if token_fee_percentage > 0.0 {
        token_fee_percentage
    } else {
        default_fee_percentage
    };
    let platform_fee = (transferable as f64 * pct / 100.0).round() as u64;
    let platform_fee = platform_fee.min(transferable);
    (platform_fee, transferable - platform_fee)
}

/// Submit the two split legs independently. A failed leg is logged and
/// left for the next cycle, which recomputes from the live balance.
async fn settle_split(ctx: &EngineCtx, row: &TokenRow, platform_fee: u64, owner_share: u64) {
    let dev = &row.dev_wallet;

    if platform_fee > 0 {
        match ctx.env.platform_ops_wallet.as_deref() {
            Some(platform_ops) => {
                transfer_leg(ctx, row, &dev.address, platform_ops, platform_fee, "fee split")
                    .await;
            }
            None => warn!("platform ops wallet not configured; fee leg deferred"),
        }
    }

    if owner_share > 0 {
        let owner_ops = row.ops_wallet.address.clone();
        transfer_leg(ctx, row, &dev.address, &owner_ops, owner_share, "owner split").await;
    }
}

async fn transfer_leg(
    ctx: &EngineCtx,
    row: &TokenRow,
    from: &str,
    to: &str,
    lamports: u64,
    context: &str,
) {
    let wallet = WalletRef::from(&row.dev_wallet);
    let tx = match ctx.sdk.build_transfer(from, to, lamports).await {
        Ok(tx) => tx,
        Err(e) => {
            warn!(context, error = %e, "transfer build failed");
            return;
        }
    };
    match ctx.gateway.submit(&wallet, &tx, context).await {
        Ok(confirmation) => {
            let trade = Trade::confirmed(
                &row.token.id,
                TradeSide::Transfer,
                lamports,
                confirmation.signature,
            );
            if let Err(e) = ctx.store.record_trade(&trade).await {
                warn!(context, error = %e, "recording transfer trade failed");
            }
        }
        Err(e) => {
            warn!(context, error = %e, "transfer failed; next cycle reconciles");
            let trade = Trade::failed(&row.token.id, TradeSide::Transfer, lamports, e.to_string());
            let _ = ctx.store.record_trade(&trade).await;
        }
    }
}

fn note_failure(ctx: &EngineCtx, token: &crate::model::Token) {
    let mut streaks = ctx
        .claim_failstreaks
        .lock()
        .unwrap_or_else(|p| p.into_inner());
    let streak = streaks.entry(token.id.clone()).or_insert(0);
    *streak += 1;
    if *streak >= FAILSTREAK_REPORT_AT {
        // Reported to observability; the token stays eligible.
        ctx.reporter.report(&ErrorReport {
            kind: ReportKind::Transient,
            module: "claimer",
            operation: "execute_claim",
            actors: ActorIds {
                token: Some(token.mint.clone()),
                ..ActorIds::default()
            },
            detail: format!("claim failed {streak} cycles in a row"),
        });
    }
}

fn clear_failures(ctx: &EngineCtx, token: &crate::model::Token) {
    let mut streaks = ctx
        .claim_failstreaks
        .lock()
        .unwrap_or_else(|p| p.into_inner());
    streaks.remove(&token.id);
}
