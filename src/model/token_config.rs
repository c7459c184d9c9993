use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

use super::amount::sol_to_lamports;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Algorithm {
    Simple,
    TurboLite,
    Rebalance,
    TwapVwap,
}

impl Algorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            Algorithm::Simple => "simple",
            Algorithm::TurboLite => "turbo_lite",
            Algorithm::Rebalance => "rebalance",
            Algorithm::TwapVwap => "twap_vwap",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "simple" => Ok(Algorithm::Simple),
            "turbo_lite" => Ok(Algorithm::TurboLite),
            "rebalance" => Ok(Algorithm::Rebalance),
            "twap_vwap" => Ok(Algorithm::TwapVwap),
            other => bail!("unknown algorithm '{other}'"),
        }
    }
}

/// Algorithm-specific knobs. One arm per algorithm with explicit
/// defaults; every consumer reads values from the variant rather than
/// inventing them, so new algorithms only touch this enum, a `Strategy`
/// impl, and `defaults_for`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "algorithm", rename_all = "snake_case")]
pub enum AlgoParams {
    Simple {
        cycle_size_buys: u32,
        cycle_size_sells: u32,
    },
    TurboLite {
        cycle_size_buys: u32,
        cycle_size_sells: u32,
        /// Scheduler period for turbo tokens, 5–60 s.
        interval_secs: u64,
        /// Turbo tokens carry their own per-minute trade cap.
        max_trades_per_minute: u32,
        inter_token_delay_ms: u64,
        confirm_timeout_secs: u64,
        batch_updates: bool,
    },
    Rebalance {
        /// Target share of portfolio value held in the native asset.
        target_native_pct: f64,
        target_token_pct: f64,
    },
    TwapVwap {
        notional_lamports: u64,
        window_secs: u64,
        slices: u32,
    },
}

impl AlgoParams {
    pub fn defaults_for(algorithm: Algorithm) -> Self {
        match algorithm {
            Algorithm::Simple => AlgoParams::Simple {
                cycle_size_buys: 5,
                cycle_size_sells: 5,
            },
            Algorithm::TurboLite => AlgoParams::TurboLite {
                cycle_size_buys: 8,
                cycle_size_sells: 8,
                interval_secs: 30,
                max_trades_per_minute: 60,
                inter_token_delay_ms: 250,
                confirm_timeout_secs: 45,
                batch_updates: false,
            },
            Algorithm::Rebalance => AlgoParams::Rebalance {
                target_native_pct: 50.0,
                target_token_pct: 50.0,
            },
            Algorithm::TwapVwap => AlgoParams::TwapVwap {
                notional_lamports: sol_to_lamports(1.0),
                window_secs: 3600,
                slices: 12,
            },
        }
    }

    pub fn algorithm(&self) -> Algorithm {
        match self {
            AlgoParams::Simple { .. } => Algorithm::Simple,
            AlgoParams::TurboLite { .. } => Algorithm::TurboLite,
            AlgoParams::Rebalance { .. } => Algorithm::Rebalance,
            AlgoParams::TwapVwap { .. } => Algorithm::TwapVwap,
        }
    }

    /// Phase lengths for cycle-driven algorithms. TWAP slices map onto
    /// the same phase machinery. `None` for algorithms that ignore the
    /// phase counters.
    pub fn cycle_sizes(&self) -> Option<(u32, u32)> {
        match self {
            AlgoParams::Simple {
                cycle_size_buys,
                cycle_size_sells,
            }
            | AlgoParams::TurboLite {
                cycle_size_buys,
                cycle_size_sells,
                ..
            } => Some((*cycle_size_buys, *cycle_size_sells)),
            AlgoParams::TwapVwap { slices, .. } => Some((*slices, *slices)),
            AlgoParams::Rebalance { .. } => None,
        }
    }

    pub fn validate(&self) -> Result<()> {
        match self {
            AlgoParams::Simple {
                cycle_size_buys,
                cycle_size_sells,
            } => {
                if *cycle_size_buys == 0 || *cycle_size_sells == 0 {
                    bail!("cycle sizes must be at least 1");
                }
            }
            AlgoParams::TurboLite {
                cycle_size_buys,
                cycle_size_sells,
                interval_secs,
                max_trades_per_minute,
                ..
            } => {
                if *cycle_size_buys == 0 || *cycle_size_sells == 0 {
                    bail!("cycle sizes must be at least 1");
                }
                if !(5..=60).contains(interval_secs) {
                    bail!("turbo interval must be 5-60 seconds, got {interval_secs}");
                }
                if *max_trades_per_minute == 0 {
                    bail!("turbo trade cap must be at least 1");
                }
            }
            AlgoParams::Rebalance {
                target_native_pct,
                target_token_pct,
            } => {
                let sum = target_native_pct + target_token_pct;
                if (sum - 100.0).abs() > 0.01 {
                    bail!("rebalance targets must sum to 100, got {sum}");
                }
                if *target_native_pct < 0.0 || *target_token_pct < 0.0 {
                    bail!("rebalance targets must be non-negative");
                }
            }
            AlgoParams::TwapVwap {
                notional_lamports,
                window_secs,
                slices,
            } => {
                if *notional_lamports == 0 || *window_secs == 0 || *slices == 0 {
                    bail!("twap parameters must be positive");
                }
            }
        }
        Ok(())
    }
}

/// Per-token configuration. Validated once at the write boundary; the
/// scheduler and activation monitor only read it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenConfig {
    pub flywheel_active: bool,
    pub auto_claim_enabled: bool,
    pub min_buy_lamports: u64,
    pub max_buy_lamports: u64,
    /// Upper bound on a single sell, in raw token units.
    pub max_sell_raw: u64,
    pub slippage_bps: u32,
    /// Platform share of claimed rewards, percent. Zero for
    /// platform-owned tokens.
    pub fee_percentage: f64,
    pub params: AlgoParams,
}

impl TokenConfig {
    pub fn defaults(algorithm: Algorithm) -> Self {
        TokenConfig {
            flywheel_active: true,
            auto_claim_enabled: true,
            min_buy_lamports: sol_to_lamports(0.01),
            max_buy_lamports: sol_to_lamports(0.05),
            max_sell_raw: u64::MAX,
            slippage_bps: 300,
            fee_percentage: 10.0,
            params: AlgoParams::defaults_for(algorithm),
        }
    }

    pub fn algorithm(&self) -> Algorithm {
        self.params.algorithm()
    }

    pub fn validate(&self) -> Result<()> {
        if self.min_buy_lamports == 0 {
            bail!("min buy must be positive");
        }
        if self.slippage_bps == 0 || self.slippage_bps > 5000 {
            bail!("slippage must be 1-5000 bps, got {}", self.slippage_bps);
        }
        if !(0.0..=100.0).contains(&self.fee_percentage) {
            bail!("fee percentage must be 0-100, got {}", self.fee_percentage);
        }
        self.params.validate()
    }
}
