use anyhow::{bail, Context, Result};
use chrono::Utc;
use rusqlite::params;

use crate::model::{
    Algorithm, CycleState, Token, TokenConfig, TokenSource, Wallet, WalletRole,
};

use super::{read_token_row, Store, TOKEN_ROW_SELECT};

/// Joined view of a token with everything the engine needs for one step.
#[derive(Debug, Clone)]
pub struct TokenRow {
    pub token: Token,
    pub config: TokenConfig,
    pub cycle: CycleState,
    pub dev_wallet: Wallet,
    pub ops_wallet: Wallet,
}

/// Inputs for registering a token that already has funded wallets.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct RegisterTokenSpec {
    pub owner_handle: String,
    pub mint: String,
    pub symbol: String,
    pub decimals: u8,
    pub source: TokenSource,
    pub algorithm: Algorithm,
    pub dev_wallet_address: String,
    pub dev_signer_handle: Option<String>,
    pub ops_wallet_address: String,
    pub ops_signer_handle: Option<String>,
}

impl Store {
    /// Find or create the owner for a handle. Owners are never deleted.
    pub async fn ensure_owner(&self, handle: &str) -> Result<String> {
        let conn = self.conn().await;
        ensure_owner_tx(&conn, handle)
    }

    /// Register a token with its wallet pair, config defaults, and a
    /// fresh cycle state, in one transaction. Rejects a mint that is
    /// already registered and active.
    pub async fn register_token(&self, spec: &RegisterTokenSpec) -> Result<Token> {
        if spec.dev_wallet_address == spec.ops_wallet_address {
            bail!("dev and ops wallets must be distinct");
        }

        let mut config = TokenConfig::defaults(spec.algorithm);
        if spec.source == TokenSource::MmOnly {
            // mm-only registrations are never claim targets
            config.auto_claim_enabled = false;
        }
        if spec.source == TokenSource::Platform {
            config.fee_percentage = 0.0;
        }
        config.validate()?;

        let mut conn = self.conn().await;
        let tx = conn.transaction()?;

        let exists: bool = tx
            .query_row(
                "SELECT COUNT(*) FROM tokens WHERE mint = ?1 AND active = 1",
                [&spec.mint],
                |row| row.get::<_, i64>(0),
            )
            .map(|n| n > 0)?;
        if exists {
            bail!("mint {} is already registered and active", spec.mint);
        }

        let owner_id = ensure_owner_tx(&tx, &spec.owner_handle)?;
        let dev_wallet_id = ensure_wallet_tx(
            &tx,
            &owner_id,
            WalletRole::Dev,
            &spec.dev_wallet_address,
            spec.dev_signer_handle.as_deref(),
        )?;
        let ops_wallet_id = ensure_wallet_tx(
            &tx,
            &owner_id,
            WalletRole::Ops,
            &spec.ops_wallet_address,
            spec.ops_signer_handle.as_deref(),
        )?;

        let token = Token {
            id: uuid::Uuid::new_v4().to_string(),
            owner_id: owner_id.clone(),
            mint: spec.mint.clone(),
            symbol: spec.symbol.clone(),
            decimals: spec.decimals,
            source: spec.source,
            dev_wallet_id,
            ops_wallet_id,
            active: true,
            graduated: spec.source != TokenSource::Launched,
            created_at: Utc::now(),
        };

        insert_token_tx(&tx, &token, &config)?;
        tx.commit()?;
        Ok(token)
    }

    /// Tokens the fleet scheduler should consider this tick.
    pub async fn list_tokens_for_scheduler(
        &self,
        algorithm: Option<Algorithm>,
    ) -> Result<Vec<TokenRow>> {
        let conn = self.conn().await;
        let sql = format!(
            "{TOKEN_ROW_SELECT} WHERE t.active = 1 AND c.flywheel_active = 1 ORDER BY t.created_at"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map([], read_token_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows
            .into_iter()
            .filter(|r| algorithm.is_none_or(|a| r.config.algorithm() == a))
            .collect())
    }

    /// Tokens eligible for the reward claim engine. mm-only tokens are
    /// never claim targets.
    pub async fn list_tokens_for_claim(&self) -> Result<Vec<TokenRow>> {
        let conn = self.conn().await;
        let sql = format!(
            "{TOKEN_ROW_SELECT}
             WHERE t.active = 1 AND c.auto_claim_enabled = 1 AND t.source != 'mm_only'
             ORDER BY t.created_at"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map([], read_token_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Every registered token, active or not. Read-API surface.
    pub async fn list_token_rows(&self) -> Result<Vec<TokenRow>> {
        let conn = self.conn().await;
        let sql = format!("{TOKEN_ROW_SELECT} ORDER BY t.created_at");
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map([], read_token_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Active platform-owned tokens (the self-trade wheel).
    pub async fn platform_token_rows(&self) -> Result<Vec<TokenRow>> {
        let conn = self.conn().await;
        let sql = format!(
            "{TOKEN_ROW_SELECT} WHERE t.active = 1 AND t.source = 'platform' ORDER BY t.created_at"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map([], read_token_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    pub async fn token_row_by_mint(&self, mint: &str) -> Result<Option<TokenRow>> {
        let conn = self.conn().await;
        let sql = format!("{TOKEN_ROW_SELECT} WHERE t.mint = ?1 ORDER BY t.active DESC LIMIT 1");
        let mut stmt = conn.prepare(&sql)?;
        let mut rows = stmt.query_map([mint], read_token_row)?;
        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    pub async fn token_row_by_id(&self, token_id: &str) -> Result<Option<TokenRow>> {
        let conn = self.conn().await;
        let sql = format!("{TOKEN_ROW_SELECT} WHERE t.id = ?1");
        let mut stmt = conn.prepare(&sql)?;
        let mut rows = stmt.query_map([token_id], read_token_row)?;
        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    pub async fn deactivate_token(&self, mint: &str) -> Result<()> {
        let conn = self.conn().await;
        let changed = conn.execute(
            "UPDATE tokens SET active = 0, updated_at = unixepoch() WHERE mint = ?1 AND active = 1",
            [mint],
        )?;
        if changed == 0 {
            bail!("no active token with mint {mint}");
        }
        Ok(())
    }

    /// Re-enable a deactivated token. The caller has already run the
    /// wallet-possession verifier against both wallets; this is the
    /// transactional tail. Restores the token with its original id,
    /// config, and cycle state.
    pub async fn reactivate_token(&self, mint: &str) -> Result<Token> {
        {
            let mut conn = self.conn().await;
            let tx = conn.transaction()?;

            let conflict: bool = tx
                .query_row(
                    "SELECT COUNT(*) FROM tokens WHERE mint = ?1 AND active = 1",
                    [mint],
                    |row| row.get::<_, i64>(0),
                )
                .map(|n| n > 0)?;
            if conflict {
                bail!("mint {mint} already has an active registration");
            }

            let changed = tx.execute(
                "UPDATE tokens SET active = 1, updated_at = unixepoch()
                 WHERE id = (SELECT id FROM tokens WHERE mint = ?1 AND active = 0
                             ORDER BY updated_at DESC LIMIT 1)",
                [mint],
            )?;
            if changed == 0 {
                bail!("no deactivated token with mint {mint}");
            }
            tx.commit()?;
        }

        let row = self
            .token_row_by_mint(mint)
            .await?
            .context("token vanished during reactivation")?;
        Ok(row.token)
    }

    /// Per-token config override from the admin surface. Validated here,
    /// at the single write boundary.
    pub async fn update_token_config(&self, token_id: &str, config: &TokenConfig) -> Result<()> {
        config.validate()?;
        let conn = self.conn().await;
        let changed = conn.execute(
            "UPDATE token_configs SET
                flywheel_active = ?2, auto_claim_enabled = ?3,
                min_buy_lamports = ?4, max_buy_lamports = ?5, max_sell_raw = ?6,
                slippage_bps = ?7, fee_percentage = ?8, params = ?9,
                updated_at = unixepoch()
             WHERE token_id = ?1",
            params![
                token_id,
                config.flywheel_active as i64,
                config.auto_claim_enabled as i64,
                config.min_buy_lamports.to_string(),
                config.max_buy_lamports.to_string(),
                config.max_sell_raw.to_string(),
                config.slippage_bps as i64,
                config.fee_percentage,
                serde_json::to_string(&config.params)?,
            ],
        )?;
        if changed == 0 {
            bail!("no token with id {token_id}");
        }
        Ok(())
    }
}

// ── Transaction-scoped helpers (shared with pending activation) ─────

pub(crate) fn ensure_owner_tx(conn: &rusqlite::Connection, handle: &str) -> Result<String> {
    if let Some(id) = conn
        .query_row(
            "SELECT id FROM owners WHERE handle = ?1",
            [handle],
            |row| row.get::<_, String>(0),
        )
        .ok()
    {
        return Ok(id);
    }
    let id = uuid::Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO owners (id, handle, created_at) VALUES (?1, ?2, unixepoch())",
        params![id, handle],
    )?;
    Ok(id)
}

pub(crate) fn ensure_wallet_tx(
    conn: &rusqlite::Connection,
    owner_id: &str,
    role: WalletRole,
    address: &str,
    signer_handle: Option<&str>,
) -> Result<String> {
    if let Some(id) = conn
        .query_row(
            "SELECT id FROM wallets WHERE owner_id = ?1 AND role = ?2 AND address = ?3",
            params![owner_id, role.as_str(), address],
            |row| row.get::<_, String>(0),
        )
        .ok()
    {
        return Ok(id);
    }
    let id = uuid::Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO wallets (id, owner_id, role, address, signer_handle)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![id, owner_id, role.as_str(), address, signer_handle],
    )?;
    Ok(id)
}

pub(crate) fn insert_token_tx(
    conn: &rusqlite::Connection,
    token: &Token,
    config: &TokenConfig,
) -> Result<()> {
    conn.execute(
        "INSERT INTO tokens (id, owner_id, mint, symbol, decimals, source,
                             dev_wallet_id, ops_wallet_id, active, graduated, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?11)",
        params![
            token.id,
            token.owner_id,
            token.mint,
            token.symbol,
            token.decimals as i64,
            token.source.as_str(),
            token.dev_wallet_id,
            token.ops_wallet_id,
            token.active as i64,
            token.graduated as i64,
            token.created_at.timestamp(),
        ],
    )?;
    conn.execute(
        "INSERT INTO token_configs (token_id, flywheel_active, auto_claim_enabled,
                                    min_buy_lamports, max_buy_lamports, max_sell_raw,
                                    slippage_bps, fee_percentage, params)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            token.id,
            config.flywheel_active as i64,
            config.auto_claim_enabled as i64,
            config.min_buy_lamports.to_string(),
            config.max_buy_lamports.to_string(),
            config.max_sell_raw.to_string(),
            config.slippage_bps as i64,
            config.fee_percentage,
            serde_json::to_string(&config.params)?,
        ],
    )?;
    conn.execute(
        "INSERT INTO cycle_states (token_id) VALUES (?1)",
        [&token.id],
    )?;
    Ok(())
}
