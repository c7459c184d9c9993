//! Deposit-monitor activation: pending rows become live tokens with
//! fully populated defaults, and the lifecycle transitions are
//! irreversible.

mod common;

use flywheel::engine::monitor::run_deposit_tick;
use flywheel::model::{
    AlgoParams, Algorithm, PendingKind, PendingPayload, PendingStatus, Phase,
};

use common::{fund_native, harness};

fn mm_only_payload(mint: &str) -> PendingPayload {
    PendingPayload {
        owner_handle: "owner-pending".into(),
        mint: mint.into(),
        symbol: "WHLN".into(),
        decimals: 6,
        algorithm: Algorithm::TurboLite,
        dev_wallet_address: format!("{mint}-dev"),
        dev_signer_handle: Some(format!("{mint}-dev-handle")),
        ops_wallet_address: format!("{mint}-ops"),
        ops_signer_handle: Some(format!("{mint}-ops-handle")),
    }
}

/// A funded deposit address activates the pending row atomically: the
/// token triple exists, turbo-lite defaults are populated, and mm-only
/// stays out of the claim engine.
#[tokio::test]
async fn deposit_activates_mm_only_registration() {
    let h = harness().await;
    let mint = "MINTpend11111111111111111111111111111111111";
    let pending = h
        .ctx
        .store
        .create_pending(
            PendingKind::MmOnly,
            "DEPOSITaddr1111111111111111111111111111111",
            100_000_000, // 0.1 minimum
            &mm_only_payload(mint),
        )
        .await
        .unwrap();

    // 0.12 deposited: over the threshold.
    fund_native(&h.ledger, "DEPOSITaddr1111111111111111111111111111111", 120_000_000);

    let summary = run_deposit_tick(&h.ctx).await.unwrap();
    assert_eq!(summary.activated, 1);

    let after = h.ctx.store.get_pending(&pending.id).await.unwrap().unwrap();
    assert_eq!(after.status, PendingStatus::Activated);

    let row = h.ctx.store.token_row_by_mint(mint).await.unwrap().unwrap();
    assert!(row.token.active);
    assert!(!row.config.auto_claim_enabled, "mm-only never auto-claims");
    assert_eq!(row.cycle.phase, Phase::Buy);
    assert_eq!(row.cycle.buy_count, 0);

    // Every algorithm-specific field carries its default.
    let AlgoParams::TurboLite {
        cycle_size_buys,
        cycle_size_sells,
        ..
    } = row.config.params
    else {
        panic!("expected turbo-lite params, got {:?}", row.config.params);
    };
    assert_eq!(cycle_size_buys, 8);
    assert_eq!(cycle_size_sells, 8);
}

/// Below-threshold deposits do nothing.
#[tokio::test]
async fn underfunded_deposit_stays_pending() {
    let h = harness().await;
    let pending = h
        .ctx
        .store
        .create_pending(
            PendingKind::MmOnly,
            "DEPOSITlow11111111111111111111111111111111",
            100_000_000,
            &mm_only_payload("MINTlow111111111111111111111111111111111111"),
        )
        .await
        .unwrap();
    fund_native(&h.ledger, "DEPOSITlow11111111111111111111111111111111", 99_999_999);

    let summary = run_deposit_tick(&h.ctx).await.unwrap();
    assert_eq!(summary.activated, 0);

    let after = h.ctx.store.get_pending(&pending.id).await.unwrap().unwrap();
    assert_eq!(after.status, PendingStatus::AwaitingDeposit);
}

/// Once activated, a pending row can be neither cancelled nor
/// activated again.
#[tokio::test]
async fn activation_is_irreversible() {
    let h = harness().await;
    let mint = "MINTirrev1111111111111111111111111111111111";
    let pending = h
        .ctx
        .store
        .create_pending(
            PendingKind::MmOnly,
            "DEPOSITirr11111111111111111111111111111111",
            100_000_000,
            &mm_only_payload(mint),
        )
        .await
        .unwrap();
    fund_native(&h.ledger, "DEPOSITirr11111111111111111111111111111111", 200_000_000);

    run_deposit_tick(&h.ctx).await.unwrap();
    assert!(h.ctx.store.cancel_pending(&pending.id).await.is_err());
    assert!(h.ctx.store.activate_pending(&pending.id).await.is_err());

    let after = h.ctx.store.get_pending(&pending.id).await.unwrap().unwrap();
    assert_eq!(after.status, PendingStatus::Activated);
}

/// Cancellation works only from awaiting_deposit, and a cancelled row
/// never activates even if the deposit later arrives.
#[tokio::test]
async fn cancelled_pending_never_activates() {
    let h = harness().await;
    let pending = h
        .ctx
        .store
        .create_pending(
            PendingKind::MmOnly,
            "DEPOSITcan11111111111111111111111111111111",
            100_000_000,
            &mm_only_payload("MINTcan111111111111111111111111111111111111"),
        )
        .await
        .unwrap();

    h.ctx.store.cancel_pending(&pending.id).await.unwrap();
    fund_native(&h.ledger, "DEPOSITcan11111111111111111111111111111111", 500_000_000);

    let summary = run_deposit_tick(&h.ctx).await.unwrap();
    assert_eq!(summary.activated, 0);

    let after = h.ctx.store.get_pending(&pending.id).await.unwrap().unwrap();
    assert_eq!(after.status, PendingStatus::Cancelled);
}
