//! One step of the per-token market-making automaton. The scheduler
//! holds the token's lock for the duration of a call; everything here
//! persists cycle transitions before any further RPC touches the token,
//! so a crash replays at most one confirmed side-effect.

use anyhow::Result;
use chrono::Utc;

use crate::config::RuntimeSettings;
use crate::gateway::WalletRef;
use crate::model::{AlgoParams, Phase, Trade, TradeSide};
use crate::store::TokenRow;

use super::strategy::{strategy_for, Decision, Observed, SkipReason};
use super::{EngineCtx, NATIVE_MINT, NATIVE_SYMBOL};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    Traded(TradeSide),
    /// Phase flip with no trade submitted this tick.
    Transitioned,
    Skipped(SkipReason),
    Failed(String),
}

/// The rate-limit bucket and per-minute cap that govern this token's
/// trades. Turbo tokens carry their own cap number and run against
/// their own bucket; every other algorithm shares the default bucket
/// under the global cap.
pub fn trade_limit(row: &TokenRow, settings: &RuntimeSettings) -> (&'static str, u32) {
    match &row.config.params {
        AlgoParams::TurboLite {
            max_trades_per_minute,
            ..
        } => ("turbo", *max_trades_per_minute),
        _ => ("main", settings.max_trades_per_minute),
    }
}

pub async fn step_token(
    ctx: &EngineCtx,
    row: &TokenRow,
    settings: &RuntimeSettings,
) -> Result<StepOutcome> {
    let token = &row.token;
    let config = &row.config;
    let ops = &row.ops_wallet;
    let mut cycle = row.cycle.clone();
    let now = Utc::now();

    let native_balance = ctx.balances.native_balance(&ops.address).await?;
    let token_balance = ctx.balances.token_balance(&ops.address, &token.mint).await?;
    let native_price_usd = ctx.prices.price(NATIVE_SYMBOL).await.unwrap_or(0.0);
    let token_price_usd = ctx.prices.price(&token.symbol).await.ok();

    let obs = Observed {
        native_balance,
        token_balance,
        token_decimals: token.decimals,
        native_price_usd,
        token_price_usd,
        now,
    };

    let decision = strategy_for(config.algorithm()).decide(config, &cycle, &obs);

    // A `NotDue` skip is free: the token was not actually attempted, so
    // leave last_attempt_at alone for interval gating.
    if decision != Decision::Skip(SkipReason::NotDue) {
        cycle.touch(now);
    }

    match decision {
        Decision::Skip(reason) => {
            // Degenerate sell states flip straight back to buying.
            if cycle.phase == Phase::Sell
                && matches!(reason, SkipReason::NoTokens | SkipReason::TooSmall)
            {
                cycle.begin_buy_phase();
                ctx.store.advance_cycle(&token.id, &cycle).await?;
                return Ok(StepOutcome::Skipped(reason));
            }
            if reason != SkipReason::NotDue {
                ctx.store.advance_cycle(&token.id, &cycle).await?;
            }
            Ok(StepOutcome::Skipped(reason))
        }

        Decision::ForceSellTransition => {
            let sells = config.params.cycle_sizes().map(|(_, s)| s).unwrap_or(1);
            cycle.begin_sell_phase(token_balance, sells);
            ctx.store.advance_cycle(&token.id, &cycle).await?;
            Ok(StepOutcome::Transitioned)
        }

        Decision::Buy { lamports } => {
            let (bucket, cap) = trade_limit(row, settings);
            if !ctx.budget.try_consume(bucket, cap) {
                return Ok(StepOutcome::Skipped(SkipReason::RateLimited));
            }
            execute_buy(ctx, row, cycle, lamports).await
        }

        Decision::Sell { raw } => {
            let (bucket, cap) = trade_limit(row, settings);
            if !ctx.budget.try_consume(bucket, cap) {
                return Ok(StepOutcome::Skipped(SkipReason::RateLimited));
            }
            execute_sell(ctx, row, cycle, raw).await
        }
    }
}

async fn execute_buy(
    ctx: &EngineCtx,
    row: &TokenRow,
    mut cycle: crate::model::CycleState,
    lamports: u64,
) -> Result<StepOutcome> {
    let token = &row.token;
    let ops = &row.ops_wallet;

    let quote = ctx
        .sdk
        .quote(NATIVE_MINT, &token.mint, lamports, row.config.slippage_bps)
        .await;
    let tx = match quote {
        Ok(q) => ctx.sdk.build_swap(&q, &ops.address).await,
        Err(e) => Err(e),
    };
    let tx = match tx {
        Ok(tx) => tx,
        Err(e) => {
            // Nothing was submitted; not a trade failure.
            ctx.store.advance_cycle(&token.id, &cycle).await?;
            return Ok(StepOutcome::Failed(format!("quote/build: {e}")));
        }
    };

    let wallet = WalletRef::from(ops);
    match ctx
        .gateway
        .submit(&wallet, &tx, &format!("buy {}", token.symbol))
        .await
    {
        Ok(confirmation) => {
            ctx.balances.invalidate_wallet(&ops.address).await;
            cycle.record_confirmed();

            let cycle_driven = row.config.params.cycle_sizes().is_some();
            if cycle_driven {
                cycle.buy_count += 1;
            }
            let trade =
                Trade::confirmed(&token.id, TradeSide::Buy, lamports, confirmation.signature);
            ctx.store.record_trade_and_cycle(&trade, &cycle).await?;

            if let Some((buys, sells)) = row.config.params.cycle_sizes() {
                if cycle.buy_count >= buys {
                    // Snapshot the fresh post-buy holdings, then flip.
                    let snapshot = ctx
                        .balances
                        .token_balance(&ops.address, &token.mint)
                        .await?;
                    cycle.begin_sell_phase(snapshot, sells);
                    ctx.store.advance_cycle(&token.id, &cycle).await?;
                }
            }
            Ok(StepOutcome::Traded(TradeSide::Buy))
        }
        Err(e) => {
            ctx.balances.invalidate_wallet(&ops.address).await;
            cycle.record_failure();
            let trade = Trade::failed(&token.id, TradeSide::Buy, lamports, e.to_string());
            ctx.store.record_trade_and_cycle(&trade, &cycle).await?;
            Ok(StepOutcome::Failed(e.to_string()))
        }
    }
}

async fn execute_sell(
    ctx: &EngineCtx,
    row: &TokenRow,
    mut cycle: crate::model::CycleState,
    raw: u64,
) -> Result<StepOutcome> {
    let token = &row.token;
    let ops = &row.ops_wallet;

    let quote = ctx
        .sdk
        .quote(&token.mint, NATIVE_MINT, raw, row.config.slippage_bps)
        .await;
    let tx = match quote {
        Ok(q) => ctx.sdk.build_swap(&q, &ops.address).await,
        Err(e) => Err(e),
    };
    let tx = match tx {
        Ok(tx) => tx,
        Err(e) => {
            ctx.store.advance_cycle(&token.id, &cycle).await?;
            return Ok(StepOutcome::Failed(format!("quote/build: {e}")));
        }
    };

    let wallet = WalletRef::from(ops);
    match ctx
        .gateway
        .submit(&wallet, &tx, &format!("sell {}", token.symbol))
        .await
    {
        Ok(confirmation) => {
            ctx.balances.invalidate_wallet(&ops.address).await;
            cycle.record_confirmed();

            let cycle_driven = row.config.params.cycle_sizes().is_some();
            if cycle_driven {
                cycle.sell_count += 1;
            }
            let trade =
                Trade::confirmed(&token.id, TradeSide::Sell, raw, confirmation.signature);
            ctx.store.record_trade_and_cycle(&trade, &cycle).await?;

            if let Some((_, sells)) = row.config.params.cycle_sizes() {
                if cycle.sell_count >= sells {
                    cycle.begin_buy_phase();
                    ctx.store.advance_cycle(&token.id, &cycle).await?;
                }
            }
            Ok(StepOutcome::Traded(TradeSide::Sell))
        }
        Err(e) => {
            ctx.balances.invalidate_wallet(&ops.address).await;
            cycle.record_failure();
            let trade = Trade::failed(&token.id, TradeSide::Sell, raw, e.to_string());
            ctx.store.record_trade_and_cycle(&trade, &cycle).await?;
            Ok(StepOutcome::Failed(e.to_string()))
        }
    }
}
