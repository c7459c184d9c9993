use anyhow::{bail, Context, Result};
use chrono::Utc;
use rusqlite::params;

use crate::model::{
    PendingActivation, PendingKind, PendingPayload, PendingStatus, Token, TokenConfig,
    TokenSource, WalletRole,
};

use super::tokens::{ensure_owner_tx, ensure_wallet_tx, insert_token_tx};
use super::{amount_col, ts_col, Store};

impl Store {
    pub async fn create_pending(
        &self,
        kind: PendingKind,
        expected_deposit_address: &str,
        min_amount_lamports: u64,
        payload: &PendingPayload,
    ) -> Result<PendingActivation> {
        let created_at = Utc::now();
        let pending = PendingActivation {
            id: uuid::Uuid::new_v4().to_string(),
            kind,
            expected_deposit_address: expected_deposit_address.to_string(),
            min_amount_lamports,
            status: PendingStatus::AwaitingDeposit,
            payload: payload.clone(),
            created_at,
            expires_at: PendingActivation::expiry_for(created_at),
        };

        let conn = self.conn().await;
        conn.execute(
            "INSERT INTO pending_activations
                (id, kind, expected_deposit_address, min_amount_lamports,
                 status, payload, created_at, expires_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                pending.id,
                pending.kind.as_str(),
                pending.expected_deposit_address,
                pending.min_amount_lamports.to_string(),
                pending.status.as_str(),
                serde_json::to_string(&pending.payload)?,
                pending.created_at.timestamp(),
                pending.expires_at.timestamp(),
            ],
        )?;
        Ok(pending)
    }

    pub async fn get_pending(&self, id: &str) -> Result<Option<PendingActivation>> {
        let conn = self.conn().await;
        let mut stmt = conn.prepare(
            "SELECT id, kind, expected_deposit_address, min_amount_lamports,
                    status, payload, created_at, expires_at
               FROM pending_activations WHERE id = ?1",
        )?;
        let mut rows = stmt.query_map([id], read_pending)?;
        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    pub async fn list_awaiting_deposit(&self) -> Result<Vec<PendingActivation>> {
        let conn = self.conn().await;
        let mut stmt = conn.prepare(
            "SELECT id, kind, expected_deposit_address, min_amount_lamports,
                    status, payload, created_at, expires_at
               FROM pending_activations
              WHERE status = 'awaiting_deposit'
              ORDER BY created_at",
        )?;
        let rows = stmt
            .query_map([], read_pending)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// The only reversal the lifecycle allows: awaiting_deposit → cancelled.
    pub async fn cancel_pending(&self, id: &str) -> Result<()> {
        let conn = self.conn().await;
        let changed = conn.execute(
            "UPDATE pending_activations
                SET status = 'cancelled', updated_at = unixepoch()
              WHERE id = ?1 AND status = 'awaiting_deposit'",
            [id],
        )?;
        if changed == 0 {
            bail!("pending activation {id} is not awaiting a deposit");
        }
        Ok(())
    }

    /// Flip rows whose deadline has passed. Returns how many expired.
    pub async fn expire_due_pending(&self) -> Result<usize> {
        let conn = self.conn().await;
        let changed = conn.execute(
            "UPDATE pending_activations
                SET status = 'expired', updated_at = unixepoch()
              WHERE status = 'awaiting_deposit' AND expires_at < unixepoch()",
            [],
        )?;
        Ok(changed)
    }

    /// Atomic activation: creates the Token, TokenConfig (with every
    /// algorithm-specific field populated from defaults), and CycleState
    /// rows, and flips the pending row to `activated`, all in one
    /// transaction. Fails closed unless the row is still
    /// `awaiting_deposit`.
    pub async fn activate_pending(&self, pending_id: &str) -> Result<Token> {
        let mut conn = self.conn().await;
        let tx = conn.transaction()?;

        let (status, kind, payload_json): (String, String, String) = tx
            .query_row(
                "SELECT status, kind, payload FROM pending_activations WHERE id = ?1",
                [pending_id],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .with_context(|| format!("pending activation {pending_id} not found"))?;

        if PendingStatus::parse(&status)? != PendingStatus::AwaitingDeposit {
            bail!("pending activation {pending_id} is '{status}', not awaiting_deposit");
        }
        let kind = PendingKind::parse(&kind)?;
        let payload: PendingPayload = serde_json::from_str(&payload_json)?;

        let active_conflict: bool = tx
            .query_row(
                "SELECT COUNT(*) FROM tokens WHERE mint = ?1 AND active = 1",
                [&payload.mint],
                |row| row.get::<_, i64>(0),
            )
            .map(|n| n > 0)?;
        if active_conflict {
            bail!("mint {} already active; refusing activation", payload.mint);
        }

        let owner_id = ensure_owner_tx(&tx, &payload.owner_handle)?;
        let dev_wallet_id = ensure_wallet_tx(
            &tx,
            &owner_id,
            WalletRole::Dev,
            &payload.dev_wallet_address,
            payload.dev_signer_handle.as_deref(),
        )?;
        let ops_wallet_id = ensure_wallet_tx(
            &tx,
            &owner_id,
            WalletRole::Ops,
            &payload.ops_wallet_address,
            payload.ops_signer_handle.as_deref(),
        )?;

        let source = match kind {
            PendingKind::Launch => TokenSource::Launched,
            PendingKind::MmOnly => TokenSource::MmOnly,
        };
        let mut config = TokenConfig::defaults(payload.algorithm);
        if source == TokenSource::MmOnly {
            config.auto_claim_enabled = false;
        }

        let token = Token {
            id: uuid::Uuid::new_v4().to_string(),
            owner_id,
            mint: payload.mint.clone(),
            symbol: payload.symbol.clone(),
            decimals: payload.decimals,
            source,
            dev_wallet_id,
            ops_wallet_id,
            active: true,
            graduated: source != TokenSource::Launched,
            created_at: Utc::now(),
        };
        insert_token_tx(&tx, &token, &config)?;

        let flipped = tx.execute(
            "UPDATE pending_activations
                SET status = 'activated', updated_at = unixepoch()
              WHERE id = ?1 AND status = 'awaiting_deposit'",
            [pending_id],
        )?;
        if flipped == 0 {
            bail!("pending activation {pending_id} changed state mid-activation");
        }

        tx.commit()?;
        Ok(token)
    }
}

fn read_pending(row: &rusqlite::Row<'_>) -> rusqlite::Result<PendingActivation> {
    let kind: String = row.get(1)?;
    let status: String = row.get(4)?;
    let payload_json: String = row.get(5)?;
    Ok(PendingActivation {
        id: row.get(0)?,
        kind: PendingKind::parse(&kind).map_err(|e| super::conv_err(1, e))?,
        expected_deposit_address: row.get(2)?,
        min_amount_lamports: amount_col(row, 3)?,
        status: PendingStatus::parse(&status).map_err(|e| super::conv_err(4, e))?,
        payload: serde_json::from_str(&payload_json).map_err(|e| super::conv_err(5, e))?,
        created_at: ts_col(row, 6)?,
        expires_at: ts_col(row, 7)?,
    })
}
