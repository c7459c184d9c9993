//! End-to-end cycle behavior through the fleet scheduler against the
//! scripted venue.

mod common;

use flywheel::engine::scheduler::run_flywheel_tick;
use flywheel::model::{Algorithm, Phase, TokenSource, TradeSide, TradeStatus};

use common::{fund_native, fund_token, harness, register_token};

/// A simple-algorithm token walks 5 buys then 5 sells over 10 ticks and
/// ends back at the start of the buy phase with 10 trade rows.
#[tokio::test]
async fn clean_cycle_simple_algorithm() {
    let h = harness().await;
    let row = register_token(
        &h.ctx,
        "MINTsimple111111111111111111111111111111111",
        "WHLT",
        TokenSource::Registered,
        Algorithm::Simple,
    )
    .await;
    fund_native(&h.ledger, &row.ops_wallet.address, 1_000_000_000);

    for _ in 0..10 {
        let summary = run_flywheel_tick(&h.ctx, &h.settings, false)
            .await
            .expect("tick");
        assert_eq!(summary.traded, 1, "every tick should trade once");
    }

    let after = h
        .ctx
        .store
        .token_row_by_mint(&row.token.mint)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(after.cycle.phase, Phase::Buy);
    assert_eq!(after.cycle.buy_count, 0);
    assert_eq!(after.cycle.sell_count, 0);

    let trades = h.ctx.store.recent_trades(&row.token.id, 100).await.unwrap();
    assert_eq!(trades.len(), 10);
    assert!(trades.iter().all(|t| t.status == TradeStatus::Confirmed));
    assert_eq!(
        trades.iter().filter(|t| t.side == TradeSide::Buy).count(),
        5
    );
    assert_eq!(
        trades.iter().filter(|t| t.side == TradeSide::Sell).count(),
        5
    );
}

/// Cycle counters never leave their configured bounds at any
/// observable point.
#[tokio::test]
async fn cycle_counts_stay_within_bounds() {
    let h = harness().await;
    let row = register_token(
        &h.ctx,
        "MINTbounds111111111111111111111111111111111",
        "WHLB",
        TokenSource::Registered,
        Algorithm::Simple,
    )
    .await;
    fund_native(&h.ledger, &row.ops_wallet.address, 1_000_000_000);

    let (buys, sells) = row.config.params.cycle_sizes().unwrap();
    for _ in 0..23 {
        run_flywheel_tick(&h.ctx, &h.settings, false).await.unwrap();
        let cycle = h.ctx.store.get_cycle(&row.token.id).await.unwrap();
        assert!(cycle.buy_count <= buys);
        assert!(cycle.sell_count <= sells);
        if cycle.phase == Phase::Buy {
            assert_eq!(cycle.sell_phase_token_snapshot, 0);
            assert_eq!(cycle.sell_amount_per_tx, 0);
        }
    }
}

/// A wallet holding exactly one per-tx amount sells it whole and the
/// phase flips.
#[tokio::test]
async fn exact_final_slice_consumes_and_transitions() {
    let h = harness().await;
    let row = register_token(
        &h.ctx,
        "MINTslice1111111111111111111111111111111111",
        "WHLS",
        TokenSource::Registered,
        Algorithm::Simple,
    )
    .await;

    // Hand-place the cycle at the last sell with balance == per-tx.
    let mut cycle = row.cycle.clone();
    cycle.begin_sell_phase(1_000_000, 5);
    cycle.sell_count = 4;
    h.ctx.store.advance_cycle(&row.token.id, &cycle).await.unwrap();
    fund_token(
        &h.ledger,
        &row.ops_wallet.address,
        &row.token.mint,
        cycle.sell_amount_per_tx,
    );

    let summary = run_flywheel_tick(&h.ctx, &h.settings, false).await.unwrap();
    assert_eq!(summary.traded, 1);

    let after = h.ctx.store.get_cycle(&row.token.id).await.unwrap();
    assert_eq!(after.phase, Phase::Buy);
    assert_eq!(after.sell_count, 0);
    assert_eq!(
        h.ledger
            .lock()
            .unwrap()
            .token_of(&row.ops_wallet.address, &row.token.mint),
        0,
        "final slice fully consumed"
    );
}

/// turbo_lite flips straight to the sell phase when native funds run
/// low mid-buy-phase, without submitting a buy.
#[tokio::test]
async fn turbo_low_native_forces_sell_transition() {
    let h = harness().await;
    let row = register_token(
        &h.ctx,
        "MINTturbo1111111111111111111111111111111111",
        "WHLX",
        TokenSource::Registered,
        Algorithm::TurboLite,
    )
    .await;

    let mut cycle = row.cycle.clone();
    cycle.buy_count = 3;
    h.ctx.store.advance_cycle(&row.token.id, &cycle).await.unwrap();

    // 0.05 native: below the 0.1 force-sell floor.
    fund_native(&h.ledger, &row.ops_wallet.address, 50_000_000);
    fund_token(&h.ledger, &row.ops_wallet.address, &row.token.mint, 2_000_000);

    let summary = run_flywheel_tick(&h.ctx, &h.settings, true).await.unwrap();
    assert_eq!(summary.transitions, 1);
    assert_eq!(summary.traded, 0);
    assert_eq!(h.gateway.submission_count(), 0, "no buy submitted");

    let after = h.ctx.store.get_cycle(&row.token.id).await.unwrap();
    assert_eq!(after.phase, Phase::Sell);
    assert_eq!(after.buy_count, 0);
    assert_eq!(after.sell_phase_token_snapshot, 2_000_000);
    let (_, sells) = row.config.params.cycle_sizes().unwrap();
    assert_eq!(after.sell_amount_per_tx, 2_000_000 / sells as u64);
}

/// A failed submission increments the failure streak; a confirmed trade
/// clears it.
#[tokio::test]
async fn failures_count_and_reset() {
    let h = harness().await;
    let row = register_token(
        &h.ctx,
        "MINTfail11111111111111111111111111111111111",
        "WHLF",
        TokenSource::Registered,
        Algorithm::Simple,
    )
    .await;
    fund_native(&h.ledger, &row.ops_wallet.address, 1_000_000_000);

    h.gateway
        .inject_failure(flywheel::gateway::SubmitError::SendFailed("rpc down".into()));
    run_flywheel_tick(&h.ctx, &h.settings, false).await.unwrap();
    let cycle = h.ctx.store.get_cycle(&row.token.id).await.unwrap();
    assert_eq!(cycle.consecutive_failures, 1);

    run_flywheel_tick(&h.ctx, &h.settings, false).await.unwrap();
    let cycle = h.ctx.store.get_cycle(&row.token.id).await.unwrap();
    assert_eq!(cycle.consecutive_failures, 0);

    let trades = h.ctx.store.recent_trades(&row.token.id, 10).await.unwrap();
    assert_eq!(trades.len(), 2);
    assert!(trades.iter().any(|t| t.status == TradeStatus::Failed));
    assert!(trades.iter().any(|t| t.status == TradeStatus::Confirmed));
}
