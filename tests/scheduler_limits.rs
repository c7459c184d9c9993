//! Scheduler-level guarantees: the global trade budget, skip-if-busy,
//! and the soft circuit breaker.

mod common;

use flywheel::engine::scheduler::run_flywheel_tick;
use flywheel::model::{Algorithm, TokenSource};

use common::{fund_native, harness, register_token};

/// With a cap of 3 and five hungry tokens, a tick confirms exactly 3
/// trades.
#[tokio::test]
async fn global_cap_bounds_trades_per_tick() {
    let mut h = harness().await;
    h.settings.max_trades_per_minute = 3;

    for i in 0..5 {
        let row = register_token(
            &h.ctx,
            &format!("MINTcap{i}111111111111111111111111111111111"),
            &format!("WC{i}"),
            TokenSource::Registered,
            Algorithm::Simple,
        )
        .await;
        fund_native(&h.ledger, &row.ops_wallet.address, 1_000_000_000);
    }

    let summary = run_flywheel_tick(&h.ctx, &h.settings, false).await.unwrap();
    assert_eq!(summary.eligible, 5);
    assert_eq!(summary.traded, 3);
    assert!(summary.budget_exhausted);

    // The sliding window is still saturated on the next tick.
    let summary = run_flywheel_tick(&h.ctx, &h.settings, false).await.unwrap();
    assert_eq!(summary.traded, 0);
}

/// A token whose lock is held (claim in flight) is skipped, not queued.
#[tokio::test]
async fn busy_token_is_skipped_for_the_tick() {
    let h = harness().await;
    let row = register_token(
        &h.ctx,
        "MINTbusy11111111111111111111111111111111111",
        "WHLY",
        TokenSource::Registered,
        Algorithm::Simple,
    )
    .await;
    fund_native(&h.ledger, &row.ops_wallet.address, 1_000_000_000);

    let _held = h.ctx.locks.try_acquire(&row.token.id).unwrap();

    let summary = run_flywheel_tick(&h.ctx, &h.settings, false).await.unwrap();
    assert_eq!(summary.traded, 0);
    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.attempted, 0);
}

/// Ten consecutive failures pause the token for exactly one tick; the
/// streak resets and the next tick trades again.
#[tokio::test]
async fn failure_streak_pauses_one_tick_only() {
    let h = harness().await;
    let row = register_token(
        &h.ctx,
        "MINTpause1111111111111111111111111111111111",
        "WHLZ",
        TokenSource::Registered,
        Algorithm::Simple,
    )
    .await;
    fund_native(&h.ledger, &row.ops_wallet.address, 1_000_000_000);

    let mut cycle = row.cycle.clone();
    cycle.consecutive_failures = 10;
    h.ctx.store.advance_cycle(&row.token.id, &cycle).await.unwrap();

    let summary = run_flywheel_tick(&h.ctx, &h.settings, false).await.unwrap();
    assert_eq!(summary.traded, 0);
    assert_eq!(summary.skipped, 1);

    let cycle = h.ctx.store.get_cycle(&row.token.id).await.unwrap();
    assert_eq!(cycle.consecutive_failures, 0, "breaker resets the streak");

    let summary = run_flywheel_tick(&h.ctx, &h.settings, false).await.unwrap();
    assert_eq!(summary.traded, 1, "token resumes after its pause");
}

/// A wallet funded to exactly min_buy + dust reserve still buys.
#[tokio::test]
async fn exact_boundary_balance_still_buys() {
    let h = harness().await;
    let row = register_token(
        &h.ctx,
        "MINTedge11111111111111111111111111111111111",
        "WHLE",
        TokenSource::Registered,
        Algorithm::Simple,
    )
    .await;
    // min_buy (0.01) + dust reserve (0.01)
    fund_native(&h.ledger, &row.ops_wallet.address, 20_000_000);

    let summary = run_flywheel_tick(&h.ctx, &h.settings, false).await.unwrap();
    assert_eq!(summary.traded, 1, "boundary balance proceeds");
}

/// Saturating the default cap must not starve turbo tokens: the two
/// algorithm classes budget against separate buckets.
#[tokio::test]
async fn saturated_main_cap_leaves_turbo_unaffected() {
    let mut h = harness().await;
    h.settings.max_trades_per_minute = 2;

    for i in 0..3 {
        let row = register_token(
            &h.ctx,
            &format!("MINTiso{i}111111111111111111111111111111111"),
            &format!("WI{i}"),
            TokenSource::Registered,
            Algorithm::Simple,
        )
        .await;
        fund_native(&h.ledger, &row.ops_wallet.address, 1_000_000_000);
    }
    let turbo = register_token(
        &h.ctx,
        "MINTisot11111111111111111111111111111111111",
        "WIT",
        TokenSource::Registered,
        Algorithm::TurboLite,
    )
    .await;
    fund_native(&h.ledger, &turbo.ops_wallet.address, 1_000_000_000);

    // Fill the default window to its cap.
    let main = run_flywheel_tick(&h.ctx, &h.settings, false).await.unwrap();
    assert_eq!(main.traded, 2);
    assert!(main.budget_exhausted);

    // The turbo token still trades: its bucket is untouched.
    let turbo_tick = run_flywheel_tick(&h.ctx, &h.settings, true).await.unwrap();
    assert_eq!(turbo_tick.traded, 1);
}

/// And the other direction: a saturated turbo bucket must not block
/// default-algorithm trades.
#[tokio::test]
async fn saturated_turbo_cap_leaves_main_unaffected() {
    let h = harness().await;
    let simple = register_token(
        &h.ctx,
        "MINTios111111111111111111111111111111111111",
        "WIS",
        TokenSource::Registered,
        Algorithm::Simple,
    )
    .await;
    let turbo = register_token(
        &h.ctx,
        "MINTiost11111111111111111111111111111111111",
        "WIU",
        TokenSource::Registered,
        Algorithm::TurboLite,
    )
    .await;
    fund_native(&h.ledger, &simple.ops_wallet.address, 1_000_000_000);
    fund_native(&h.ledger, &turbo.ops_wallet.address, 1_000_000_000);

    // Exhaust the turbo bucket at the turbo cap.
    let turbo_row = h
        .ctx
        .store
        .token_row_by_mint(&turbo.token.mint)
        .await
        .unwrap()
        .unwrap();
    let (bucket, cap) = flywheel::engine::cycle::trade_limit(&turbo_row, &h.settings);
    for _ in 0..cap {
        assert!(h.ctx.budget.try_consume(bucket, cap));
    }

    let turbo_tick = run_flywheel_tick(&h.ctx, &h.settings, true).await.unwrap();
    assert_eq!(turbo_tick.traded, 0, "turbo bucket is saturated");
    assert!(turbo_tick.budget_exhausted);

    // Default-bucket trades proceed regardless.
    let main = run_flywheel_tick(&h.ctx, &h.settings, false).await.unwrap();
    assert_eq!(main.traded, 1);
}

/// The turbo scan only touches turbo tokens, and the main tick leaves
/// them alone.
#[tokio::test]
async fn turbo_and_main_scans_partition_the_fleet() {
    let h = harness().await;
    let simple = register_token(
        &h.ctx,
        "MINTmain11111111111111111111111111111111111",
        "WHLG",
        TokenSource::Registered,
        Algorithm::Simple,
    )
    .await;
    let turbo = register_token(
        &h.ctx,
        "MINTtbo111111111111111111111111111111111111",
        "WHLH",
        TokenSource::Registered,
        Algorithm::TurboLite,
    )
    .await;
    fund_native(&h.ledger, &simple.ops_wallet.address, 1_000_000_000);
    fund_native(&h.ledger, &turbo.ops_wallet.address, 1_000_000_000);

    let main = run_flywheel_tick(&h.ctx, &h.settings, false).await.unwrap();
    assert_eq!(main.eligible, 1);

    let turbo_tick = run_flywheel_tick(&h.ctx, &h.settings, true).await.unwrap();
    assert_eq!(turbo_tick.eligible, 1);
}
