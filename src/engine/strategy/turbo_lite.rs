use chrono::Duration;

use crate::model::{AlgoParams, CycleState, Phase, TokenConfig};

use super::{low_native_threshold, phase_step, Decision, Observed, SkipReason, Strategy};

/// The tight-period variant: larger cycles, its own scheduler interval
/// and per-minute cap, and a forced buy→sell flip when the ops wallet
/// runs low on native funds mid-cycle.
pub struct TurboLite;

impl Strategy for TurboLite {
    fn decide(&self, config: &TokenConfig, cycle: &CycleState, obs: &Observed) -> Decision {
        let AlgoParams::TurboLite { interval_secs, .. } = &config.params else {
            return Decision::Skip(SkipReason::NotDue);
        };

        if let Some(last) = cycle.last_attempt_at {
            if obs.now - last < Duration::seconds(*interval_secs as i64) {
                return Decision::Skip(SkipReason::NotDue);
            }
        }

        // Out of runway mid-buy-phase: flip to selling what we hold
        // rather than stalling the wheel.
        if cycle.phase == Phase::Buy && obs.native_balance < low_native_threshold() {
            if obs.token_balance >= 1 {
                return Decision::ForceSellTransition;
            }
            return Decision::Skip(SkipReason::InsufficientFunds);
        }

        phase_step(config, cycle, obs)
    }
}
