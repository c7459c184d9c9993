use crate::model::amount::{lamports_to_sol, sol_to_lamports};
use crate::model::{AlgoParams, CycleState, TokenConfig};

use super::{Decision, Observed, SkipReason, Strategy, MAX_SELL_FRACTION};

/// Allowed drift around the target allocation before acting, in
/// percentage points.
const DRIFT_TOLERANCE_PCT: f64 = 2.0;

/// Holds the wallet near a configured native:token value split. Each
/// step moves half the distance to target, clamped to the configured
/// trade bounds. Phase counters are persisted but unused here.
pub struct Rebalance;

impl Strategy for Rebalance {
    fn decide(&self, config: &TokenConfig, _cycle: &CycleState, obs: &Observed) -> Decision {
        let AlgoParams::Rebalance {
            target_native_pct, ..
        } = &config.params
        else {
            return Decision::Skip(SkipReason::NotDue);
        };

        let Some(token_price) = obs.token_price_usd.filter(|p| *p > 0.0) else {
            return Decision::Skip(SkipReason::PriceUnavailable);
        };
        if obs.native_price_usd <= 0.0 {
            return Decision::Skip(SkipReason::PriceUnavailable);
        }

        let native_value = lamports_to_sol(obs.native_balance) * obs.native_price_usd;
        let token_units = obs.token_balance as f64 / 10f64.powi(obs.token_decimals as i32);
        let token_value = token_units * token_price;
        let total = native_value + token_value;
        if total <= 0.0 {
            return Decision::Skip(SkipReason::InsufficientFunds);
        }

        let current_native_pct = native_value / total * 100.0;
        let drift = current_native_pct - target_native_pct;

        if drift.abs() <= DRIFT_TOLERANCE_PCT {
            return Decision::Skip(SkipReason::Balanced);
        }

        // Move half the distance to target per step.
        let value_to_move = (drift.abs() / 100.0) * total / 2.0;

        if drift > 0.0 {
            // Too much native: buy tokens.
            let lamports = sol_to_lamports(value_to_move / obs.native_price_usd);
            let lamports = lamports.clamp(config.min_buy_lamports, config.max_buy_lamports.max(config.min_buy_lamports));
            if lamports > obs.native_balance {
                return Decision::Skip(SkipReason::InsufficientFunds);
            }
            Decision::Buy { lamports }
        } else {
            // Too much token value: sell some back to native.
            let raw = (value_to_move / token_price * 10f64.powi(obs.token_decimals as i32)) as u64;
            let cap = (obs.token_balance as f64 * MAX_SELL_FRACTION) as u64;
            let raw = raw.min(cap).min(config.max_sell_raw);
            if raw < 1 {
                return Decision::Skip(SkipReason::TooSmall);
            }
            Decision::Sell { raw }
        }
    }
}
