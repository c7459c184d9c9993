use anyhow::bail;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Buy,
    Sell,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Buy => "buy",
            Phase::Sell => "sell",
        }
    }

    pub fn parse(s: &str) -> anyhow::Result<Self> {
        match s {
            "buy" => Ok(Phase::Buy),
            "sell" => Ok(Phase::Sell),
            other => bail!("unknown phase '{other}'"),
        }
    }
}

/// Per-token runtime state of the market-making automaton. Recovered
/// exactly from storage on restart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleState {
    pub phase: Phase,
    pub buy_count: u32,
    pub sell_count: u32,
    /// Token balance captured at the buy→sell transition. Zero while in
    /// buy phase.
    pub sell_phase_token_snapshot: u64,
    /// Derived: snapshot / cycle_size_sells. Zero while in buy phase.
    pub sell_amount_per_tx: u64,
    pub consecutive_failures: u32,
    pub last_attempt_at: Option<DateTime<Utc>>,
}

impl Default for CycleState {
    fn default() -> Self {
        CycleState {
            phase: Phase::Buy,
            buy_count: 0,
            sell_count: 0,
            sell_phase_token_snapshot: 0,
            sell_amount_per_tx: 0,
            consecutive_failures: 0,
            last_attempt_at: None,
        }
    }
}

impl CycleState {
    /// Enter the sell phase with a freshly captured token balance.
    pub fn begin_sell_phase(&mut self, snapshot: u64, cycle_size_sells: u32) {
        self.phase = Phase::Sell;
        self.buy_count = 0;
        self.sell_count = 0;
        self.sell_phase_token_snapshot = snapshot;
        self.sell_amount_per_tx = if cycle_size_sells == 0 {
            0
        } else {
            snapshot / cycle_size_sells as u64
        };
    }

    /// Return to the buy phase with all sell bookkeeping cleared.
    pub fn begin_buy_phase(&mut self) {
        self.phase = Phase::Buy;
        self.buy_count = 0;
        self.sell_count = 0;
        self.sell_phase_token_snapshot = 0;
        self.sell_amount_per_tx = 0;
    }

    pub fn record_confirmed(&mut self) {
        self.consecutive_failures = 0;
    }

    pub fn record_failure(&mut self) {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
    }

    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.last_attempt_at = Some(now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_state_is_buy_with_zero_counters() {
        let state = CycleState::default();
        assert_eq!(state.phase, Phase::Buy);
        assert_eq!(state.buy_count, 0);
        assert_eq!(state.sell_count, 0);
        assert_eq!(state.sell_phase_token_snapshot, 0);
        assert_eq!(state.sell_amount_per_tx, 0);
    }

    #[test]
    fn sell_phase_derives_per_tx_amount() {
        let mut state = CycleState::default();
        state.buy_count = 5;
        state.begin_sell_phase(1_000_000, 5);
        assert_eq!(state.phase, Phase::Sell);
        assert_eq!(state.buy_count, 0);
        assert_eq!(state.sell_phase_token_snapshot, 1_000_000);
        assert_eq!(state.sell_amount_per_tx, 200_000);
    }

    #[test]
    fn buy_phase_clears_sell_bookkeeping() {
        let mut state = CycleState::default();
        state.begin_sell_phase(1_000_000, 4);
        state.sell_count = 4;
        state.begin_buy_phase();
        assert_eq!(state.phase, Phase::Buy);
        assert_eq!(state.sell_phase_token_snapshot, 0);
        assert_eq!(state.sell_amount_per_tx, 0);
        assert_eq!(state.sell_count, 0);
    }

    #[test]
    fn failures_accumulate_until_a_confirmation() {
        let mut state = CycleState::default();
        for _ in 0..3 {
            state.record_failure();
        }
        assert_eq!(state.consecutive_failures, 3);
        state.record_confirmed();
        assert_eq!(state.consecutive_failures, 0);
    }
}
