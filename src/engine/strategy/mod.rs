//! Trade-sizing/timing policies. Strategies are pure functions of
//! `(config, cycle_state, observed on-chain state)`; the scheduler
//! supplies the observations and executes the decision; nothing here
//! performs I/O.

mod rebalance;
mod simple;
mod turbo_lite;
mod twap_vwap;

use chrono::{DateTime, Utc};
use rand::Rng;
use tracing::warn;

use crate::model::amount::sol_to_lamports;
use crate::model::{Algorithm, CycleState, Phase, TokenConfig};

pub use rebalance::Rebalance;
pub use simple::Simple;
pub use turbo_lite::TurboLite;
pub use twap_vwap::TwapVwap;

/// Native units below the configured minimum that must stay in the ops
/// wallet for fees.
pub const BUY_DUST_RESERVE: u64 = 10_000_000; // 0.01

/// No single sell may move more than this share of the wallet's tokens.
pub const MAX_SELL_FRACTION: f64 = 0.30;

/// State of the world as observed by the scheduler for one token, just
/// before asking the strategy what to do.
#[derive(Debug, Clone)]
pub struct Observed {
    /// Ops-wallet native balance, base units.
    pub native_balance: u64,
    /// Ops-wallet balance of the token, raw units.
    pub token_balance: u64,
    pub token_decimals: u8,
    pub native_price_usd: f64,
    pub token_price_usd: Option<f64>,
    pub now: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    InsufficientFunds,
    NoTokens,
    TooSmall,
    Balanced,
    NotDue,
    PriceUnavailable,
    RateLimited,
    Busy,
    Paused,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::InsufficientFunds => "insufficient_funds",
            SkipReason::NoTokens => "no_tokens",
            SkipReason::TooSmall => "too_small",
            SkipReason::Balanced => "balanced",
            SkipReason::NotDue => "not_due",
            SkipReason::PriceUnavailable => "price_unavailable",
            SkipReason::RateLimited => "rate_limited",
            SkipReason::Busy => "busy",
            SkipReason::Paused => "paused",
        }
    }
}

/// What the state machine should do for this token on this tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Buy { lamports: u64 },
    Sell { raw: u64 },
    /// Flip to sell phase immediately without trading this tick.
    ForceSellTransition,
    Skip(SkipReason),
}

pub trait Strategy: Send + Sync {
    fn decide(&self, config: &TokenConfig, cycle: &CycleState, obs: &Observed) -> Decision;
}

pub fn strategy_for(algorithm: Algorithm) -> &'static dyn Strategy {
    match algorithm {
        Algorithm::Simple => &Simple,
        Algorithm::TurboLite => &TurboLite,
        Algorithm::Rebalance => &Rebalance,
        Algorithm::TwapVwap => &TwapVwap,
    }
}

// ── Shared phase sizing ─────────────────────────────────────────────

/// Uniform buy size within the configured bounds. An inverted range
/// coerces to the minimum.
pub(crate) fn draw_buy_size(config: &TokenConfig) -> u64 {
    let (min, max) = (config.min_buy_lamports, config.max_buy_lamports);
    if min > max {
        warn!(min, max, "min buy exceeds max buy; coercing to min");
        return min;
    }
    if min == max {
        return min;
    }
    rand::rng().random_range(min..=max)
}

/// The standard buy-phase decision shared by the cycle algorithms.
pub(crate) fn phase_buy(config: &TokenConfig, obs: &Observed) -> Decision {
    if obs.native_balance < config.min_buy_lamports + BUY_DUST_RESERVE {
        return Decision::Skip(SkipReason::InsufficientFunds);
    }
    let mut size = draw_buy_size(config);
    // Never spend into the reserve.
    let spendable = obs.native_balance - BUY_DUST_RESERVE;
    if size > spendable {
        size = spendable;
    }
    Decision::Buy { lamports: size }
}

/// The standard sell-phase decision shared by the cycle algorithms.
/// The machine interprets `NoTokens`/`TooSmall` as a transition back to
/// the buy phase.
pub(crate) fn phase_sell(config: &TokenConfig, cycle: &CycleState, obs: &Observed) -> Decision {
    if obs.token_balance < 1 {
        return Decision::Skip(SkipReason::NoTokens);
    }
    // Final slice: the remainder is at most one per-tx amount, so
    // consume it whole rather than stranding a capped tail.
    let mut size = if obs.token_balance <= cycle.sell_amount_per_tx {
        obs.token_balance
    } else {
        let cap = (obs.token_balance as f64 * MAX_SELL_FRACTION) as u64;
        cycle.sell_amount_per_tx.min(cap)
    };
    if size > config.max_sell_raw {
        size = config.max_sell_raw;
    }
    if size < 1 {
        return Decision::Skip(SkipReason::TooSmall);
    }
    Decision::Sell { raw: size }
}

/// Shared skeleton for phase-driven algorithms.
pub(crate) fn phase_step(config: &TokenConfig, cycle: &CycleState, obs: &Observed) -> Decision {
    match cycle.phase {
        Phase::Buy => phase_buy(config, obs),
        Phase::Sell => phase_sell(config, cycle, obs),
    }
}

pub(crate) fn low_native_threshold() -> u64 {
    sol_to_lamports(0.1)
}
