use chrono::Duration;
use rand::Rng;

use crate::model::{AlgoParams, CycleState, Phase, TokenConfig};

use super::{phase_sell, Decision, Observed, SkipReason, Strategy, BUY_DUST_RESERVE};

/// Time-weighted slicing for the platform's own token. The notional
/// target is cut into equal slices across the window, each jittered
/// ±20% so the schedule is time-weighted without being clockwork. User
/// tokens never run this.
pub struct TwapVwap;

impl Strategy for TwapVwap {
    fn decide(&self, config: &TokenConfig, cycle: &CycleState, obs: &Observed) -> Decision {
        let AlgoParams::TwapVwap {
            notional_lamports,
            window_secs,
            slices,
        } = &config.params
        else {
            return Decision::Skip(SkipReason::NotDue);
        };

        let slice_interval = Duration::seconds((*window_secs / (*slices).max(1) as u64) as i64);
        if let Some(last) = cycle.last_attempt_at {
            if obs.now - last < slice_interval {
                return Decision::Skip(SkipReason::NotDue);
            }
        }

        let base_slice = notional_lamports / (*slices).max(1) as u64;
        let jitter = rand::rng().random_range(0.8..=1.2);
        let slice = (base_slice as f64 * jitter) as u64;

        match cycle.phase {
            Phase::Buy => {
                if obs.native_balance < slice + BUY_DUST_RESERVE {
                    // Wheel out of native runway; work the held tokens
                    // back down instead.
                    if obs.token_balance >= 1 {
                        return Decision::ForceSellTransition;
                    }
                    return Decision::Skip(SkipReason::InsufficientFunds);
                }
                Decision::Buy { lamports: slice }
            }
            Phase::Sell => phase_sell(config, cycle, obs),
        }
    }
}
