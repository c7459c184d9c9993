//! Persistence laws: exact cycle-state recovery, active-mint
//! uniqueness, and identity-preserving reactivation.

mod common;

use chrono::{DateTime, Utc};

use flywheel::model::{Algorithm, CycleState, Phase, TokenSource};
use flywheel::store::{RegisterTokenSpec, Store};

use common::{harness, register_token};

fn spec(mint: &str, owner: &str) -> RegisterTokenSpec {
    RegisterTokenSpec {
        owner_handle: owner.into(),
        mint: mint.into(),
        symbol: "WHLT".into(),
        decimals: 6,
        source: TokenSource::Registered,
        algorithm: Algorithm::Simple,
        dev_wallet_address: format!("{mint}-dev"),
        dev_signer_handle: None,
        ops_wallet_address: format!("{mint}-ops"),
        ops_signer_handle: None,
    }
}

/// Saving and reloading a cycle state yields exactly equal counts and
/// phase.
#[tokio::test]
async fn cycle_state_round_trips_exactly() {
    let h = harness().await;
    let row = register_token(
        &h.ctx,
        "MINTrt1111111111111111111111111111111111111",
        "WHLT",
        TokenSource::Registered,
        Algorithm::Simple,
    )
    .await;

    // Whole-second timestamp: storage resolution is seconds.
    let at = DateTime::<Utc>::from_timestamp(Utc::now().timestamp(), 0).unwrap();
    let state = CycleState {
        phase: Phase::Sell,
        buy_count: 0,
        sell_count: 3,
        sell_phase_token_snapshot: 18_446_744_073_709_551_000, // near u64::MAX
        sell_amount_per_tx: 3_689_348_814_741_910_200,
        consecutive_failures: 7,
        last_attempt_at: Some(at),
    };
    h.ctx.store.advance_cycle(&row.token.id, &state).await.unwrap();

    let reloaded = h.ctx.store.get_cycle(&row.token.id).await.unwrap();
    assert_eq!(reloaded, state);
}

/// Registering the same mint twice for the same owner rejects the
/// second attempt.
#[tokio::test]
async fn duplicate_active_mint_is_rejected() {
    let store = Store::open_in_memory().unwrap();
    let mint = "MINTdup111111111111111111111111111111111111";

    store.register_token(&spec(mint, "owner-a")).await.unwrap();
    let second = store.register_token(&spec(mint, "owner-a")).await;
    assert!(second.is_err(), "duplicate active mint must be rejected");
}

/// Deactivating then reactivating restores the identical id, config,
/// and cycle state, and frees the mint for the interim.
#[tokio::test]
async fn reactivation_restores_identity() {
    let store = Store::open_in_memory().unwrap();
    let mint = "MINTreact111111111111111111111111111111111";
    store.register_token(&spec(mint, "owner-b")).await.unwrap();

    let before = store.token_row_by_mint(mint).await.unwrap().unwrap();

    // Put some non-default state on the cycle so restoration is
    // observable.
    let mut cycle = before.cycle.clone();
    cycle.begin_sell_phase(500_000, 5);
    store.advance_cycle(&before.token.id, &cycle).await.unwrap();

    store.deactivate_token(mint).await.unwrap();
    let inactive = store.token_row_by_mint(mint).await.unwrap().unwrap();
    assert!(!inactive.token.active);

    let token = store.reactivate_token(mint).await.unwrap();
    assert_eq!(token.id, before.token.id);

    let after = store.token_row_by_mint(mint).await.unwrap().unwrap();
    assert!(after.token.active);
    assert_eq!(after.config, before.config);
    assert_eq!(after.cycle.sell_phase_token_snapshot, 500_000);
    assert_eq!(after.cycle.sell_amount_per_tx, 100_000);
}

/// While a mint is deactivated it may be registered again; the old
/// registration then blocks reactivation until the new one goes away.
#[tokio::test]
async fn deactivated_mint_may_reappear() {
    let store = Store::open_in_memory().unwrap();
    let mint = "MINTfree11111111111111111111111111111111111";

    store.register_token(&spec(mint, "owner-c")).await.unwrap();
    store.deactivate_token(mint).await.unwrap();
    store.register_token(&spec(mint, "owner-d")).await.unwrap();

    let reactivation = store.reactivate_token(mint).await;
    assert!(
        reactivation.is_err(),
        "reactivation must fail while another registration is active"
    );
}

/// Scheduler and claim listings honor the eligibility predicates.
#[tokio::test]
async fn eligibility_listings_filter_correctly() {
    let h = harness().await;
    register_token(
        &h.ctx,
        "MINTelig11111111111111111111111111111111111",
        "WHLA",
        TokenSource::Registered,
        Algorithm::Simple,
    )
    .await;
    let mm = register_token(
        &h.ctx,
        "MINTelig21111111111111111111111111111111111",
        "WHLB",
        TokenSource::MmOnly,
        Algorithm::Simple,
    )
    .await;

    let claimable = h.ctx.store.list_tokens_for_claim().await.unwrap();
    assert!(claimable.iter().all(|r| r.token.id != mm.token.id));

    let scheduled = h.ctx.store.list_tokens_for_scheduler(None).await.unwrap();
    assert_eq!(scheduled.len(), 2, "mm-only still market-makes");

    h.ctx
        .store
        .deactivate_token("MINTelig11111111111111111111111111111111111")
        .await
        .unwrap();
    let scheduled = h.ctx.store.list_tokens_for_scheduler(None).await.unwrap();
    assert_eq!(scheduled.len(), 1, "deactivated tokens drop out");
}

/// Amount columns written as decimal text normalise to u64 on read.
#[tokio::test]
async fn amounts_survive_text_storage() {
    let store = Store::open_in_memory().unwrap();
    let mint = "MINTamt111111111111111111111111111111111111";
    store.register_token(&spec(mint, "owner-e")).await.unwrap();
    let row = store.token_row_by_mint(mint).await.unwrap().unwrap();

    let state = CycleState {
        phase: Phase::Sell,
        sell_phase_token_snapshot: u64::MAX,
        sell_amount_per_tx: u64::MAX / 5,
        ..CycleState::default()
    };
    store.advance_cycle(&row.token.id, &state).await.unwrap();

    let reloaded = store.get_cycle(&row.token.id).await.unwrap();
    assert_eq!(reloaded.sell_phase_token_snapshot, u64::MAX);
    assert_eq!(reloaded.sell_amount_per_tx, u64::MAX / 5);
}
