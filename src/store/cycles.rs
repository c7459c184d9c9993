use anyhow::{bail, Result};
use rusqlite::params;

use crate::model::{CycleState, Phase, Trade};

use super::{amount_col, opt_ts_col, Store};

impl Store {
    pub async fn get_cycle(&self, token_id: &str) -> Result<CycleState> {
        let conn = self.conn().await;
        let state = conn.query_row(
            "SELECT phase, buy_count, sell_count, sell_phase_token_snapshot,
                    sell_amount_per_tx, consecutive_failures, last_attempt_at
               FROM cycle_states WHERE token_id = ?1",
            [token_id],
            |row| {
                let phase: String = row.get(0)?;
                Ok(CycleState {
                    phase: Phase::parse(&phase).map_err(|e| super::conv_err(0, e))?,
                    buy_count: row.get::<_, i64>(1)? as u32,
                    sell_count: row.get::<_, i64>(2)? as u32,
                    sell_phase_token_snapshot: amount_col(row, 3)?,
                    sell_amount_per_tx: amount_col(row, 4)?,
                    consecutive_failures: row.get::<_, i64>(5)? as u32,
                    last_attempt_at: opt_ts_col(row, 6)?,
                })
            },
        )?;
        Ok(state)
    }

    /// Atomically replace a token's cycle state. Phase and counters are
    /// recovered exactly from this row after a restart.
    pub async fn advance_cycle(&self, token_id: &str, state: &CycleState) -> Result<()> {
        let conn = self.conn().await;
        write_cycle(&conn, token_id, state)?;
        Ok(())
    }

    /// Record a trade outcome and the cycle state it produced in a
    /// single transaction, so a crash cannot separate them.
    pub async fn record_trade_and_cycle(
        &self,
        trade: &Trade,
        state: &CycleState,
    ) -> Result<()> {
        let mut conn = self.conn().await;
        let tx = conn.transaction()?;
        super::trades::insert_trade(&tx, trade)?;
        write_cycle(&tx, &trade.token_id, state)?;
        tx.commit()?;
        Ok(())
    }
}

pub(crate) fn write_cycle(
    conn: &rusqlite::Connection,
    token_id: &str,
    state: &CycleState,
) -> Result<()> {
    let changed = conn.execute(
        "UPDATE cycle_states SET
            phase = ?2, buy_count = ?3, sell_count = ?4,
            sell_phase_token_snapshot = ?5, sell_amount_per_tx = ?6,
            consecutive_failures = ?7, last_attempt_at = ?8,
            updated_at = unixepoch()
         WHERE token_id = ?1",
        params![
            token_id,
            state.phase.as_str(),
            state.buy_count as i64,
            state.sell_count as i64,
            state.sell_phase_token_snapshot.to_string(),
            state.sell_amount_per_tx.to_string(),
            state.consecutive_failures as i64,
            state.last_attempt_at.map(|t| t.timestamp()),
        ],
    )?;
    if changed == 0 {
        bail!("no cycle state for token {token_id}");
    }
    Ok(())
}
