use anyhow::Result;
use rusqlite::params;

use crate::model::Claim;

use super::{amount_col, ts_col, Store};

impl Store {
    /// Append a claim row. Claims are never mutated after insert.
    pub async fn record_claim(&self, claim: &Claim) -> Result<()> {
        let conn = self.conn().await;
        conn.execute(
            "INSERT INTO claims (id, token_id, gross_lamports, platform_fee_lamports,
                                 owner_received_lamports, signature, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                claim.id,
                claim.token_id,
                claim.gross_lamports.to_string(),
                claim.platform_fee_lamports.to_string(),
                claim.owner_received_lamports.to_string(),
                claim.signature,
                claim.created_at.timestamp(),
            ],
        )?;
        Ok(())
    }

    pub async fn recent_claims(&self, token_id: &str, limit: u32) -> Result<Vec<Claim>> {
        let conn = self.conn().await;
        let mut stmt = conn.prepare(
            "SELECT id, token_id, gross_lamports, platform_fee_lamports,
                    owner_received_lamports, signature, created_at
               FROM claims WHERE token_id = ?1
              ORDER BY created_at DESC, id DESC LIMIT ?2",
        )?;
        let claims = stmt
            .query_map(params![token_id, limit], |row| {
                Ok(Claim {
                    id: row.get(0)?,
                    token_id: row.get(1)?,
                    gross_lamports: amount_col(row, 2)?,
                    platform_fee_lamports: amount_col(row, 3)?,
                    owner_received_lamports: amount_col(row, 4)?,
                    signature: row.get(5)?,
                    created_at: ts_col(row, 6)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(claims)
    }
}
