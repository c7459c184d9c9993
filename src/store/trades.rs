use anyhow::Result;
use rusqlite::params;

use crate::model::{Trade, TradeSide, TradeStatus};

use super::{amount_col, ts_col, Store};

impl Store {
    /// Append a trade row. Trades are never mutated after insert.
    pub async fn record_trade(&self, trade: &Trade) -> Result<()> {
        let conn = self.conn().await;
        insert_trade(&conn, trade)?;
        Ok(())
    }

    pub async fn recent_trades(&self, token_id: &str, limit: u32) -> Result<Vec<Trade>> {
        let conn = self.conn().await;
        let mut stmt = conn.prepare(
            "SELECT id, token_id, side, amount, signature, status, reason, created_at
               FROM trades WHERE token_id = ?1
              ORDER BY created_at DESC, id DESC LIMIT ?2",
        )?;
        let trades = stmt
            .query_map(params![token_id, limit], read_trade)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(trades)
    }

    pub async fn trade_count(&self, token_id: &str) -> Result<u64> {
        let conn = self.conn().await;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM trades WHERE token_id = ?1",
            [token_id],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }
}

pub(crate) fn insert_trade(conn: &rusqlite::Connection, trade: &Trade) -> Result<()> {
    conn.execute(
        "INSERT INTO trades (id, token_id, side, amount, signature, status, reason, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            trade.id,
            trade.token_id,
            trade.side.as_str(),
            trade.amount.to_string(),
            trade.signature,
            trade.status.as_str(),
            trade.reason,
            trade.created_at.timestamp(),
        ],
    )?;
    Ok(())
}

fn read_trade(row: &rusqlite::Row<'_>) -> rusqlite::Result<Trade> {
    let side: String = row.get(2)?;
    let status: String = row.get(5)?;
    Ok(Trade {
        id: row.get(0)?,
        token_id: row.get(1)?,
        side: TradeSide::parse(&side).map_err(|e| super::conv_err(2, e))?,
        amount: amount_col(row, 3)?,
        signature: row.get(4)?,
        status: TradeStatus::parse(&status).map_err(|e| super::conv_err(5, e))?,
        reason: row.get(6)?,
        created_at: ts_col(row, 7)?,
    })
}
