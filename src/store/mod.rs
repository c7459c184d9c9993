//! Durable store and transactional query surface. One table per entity,
//! foreign keys enforced, WAL journal. Every amount column is read back
//! through [`crate::model::amount::amount_from_sql`] so INTEGER, REAL,
//! and TEXT cells all normalise to `u64` base units before arithmetic.

mod claims;
mod cycles;
mod pending;
mod platform;
mod tokens;
mod trades;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use tokio::sync::Mutex;

use crate::model::{
    AlgoParams, CycleState, Phase, Token, TokenConfig, TokenSource, Wallet, WalletRole,
};

pub use platform::OVERRIDABLE_KEYS;
pub use tokens::{RegisterTokenSpec, TokenRow};

#[derive(Clone)]
pub struct Store {
    db: Arc<Mutex<Connection>>,
}

impl Store {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context("creating db directory")?;
        }
        let conn = Connection::open(path)
            .with_context(|| format!("opening sqlite at {}", path.display()))?;
        conn.execute_batch("PRAGMA journal_mode = WAL; PRAGMA foreign_keys = ON;")?;
        migrate(&conn)?;
        Ok(Store {
            db: Arc::new(Mutex::new(conn)),
        })
    }

    /// In-memory store for tests.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        migrate(&conn)?;
        Ok(Store {
            db: Arc::new(Mutex::new(conn)),
        })
    }

    pub(crate) async fn conn(&self) -> tokio::sync::MutexGuard<'_, Connection> {
        self.db.lock().await
    }
}

fn migrate(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS owners (
            id          TEXT PRIMARY KEY,
            handle      TEXT UNIQUE NOT NULL,
            created_at  INTEGER NOT NULL DEFAULT (unixepoch())
        );

        CREATE TABLE IF NOT EXISTS wallets (
            id             TEXT PRIMARY KEY,
            owner_id       TEXT NOT NULL REFERENCES owners(id),
            role           TEXT NOT NULL CHECK (role IN ('dev', 'ops')),
            address        TEXT NOT NULL,
            signer_handle  TEXT,
            created_at     INTEGER NOT NULL DEFAULT (unixepoch()),
            UNIQUE(owner_id, role, address)
        );

        CREATE TABLE IF NOT EXISTS tokens (
            id             TEXT PRIMARY KEY,
            owner_id       TEXT NOT NULL REFERENCES owners(id),
            mint           TEXT NOT NULL,
            symbol         TEXT NOT NULL,
            decimals       INTEGER NOT NULL,
            source         TEXT NOT NULL,
            dev_wallet_id  TEXT NOT NULL REFERENCES wallets(id),
            ops_wallet_id  TEXT NOT NULL REFERENCES wallets(id),
            active         INTEGER NOT NULL DEFAULT 1,
            graduated      INTEGER NOT NULL DEFAULT 0,
            created_at     INTEGER NOT NULL DEFAULT (unixepoch()),
            updated_at     INTEGER NOT NULL DEFAULT (unixepoch())
        );

        -- Mint uniqueness applies to active tokens only; a deactivated
        -- token's mint may reappear after reactivation.
        CREATE UNIQUE INDEX IF NOT EXISTS idx_tokens_active_mint
            ON tokens(mint) WHERE active = 1;

        CREATE TABLE IF NOT EXISTS token_configs (
            token_id           TEXT PRIMARY KEY REFERENCES tokens(id) ON DELETE CASCADE,
            flywheel_active    INTEGER NOT NULL DEFAULT 1,
            auto_claim_enabled INTEGER NOT NULL DEFAULT 1,
            min_buy_lamports   TEXT NOT NULL,
            max_buy_lamports   TEXT NOT NULL,
            max_sell_raw       TEXT NOT NULL,
            slippage_bps       INTEGER NOT NULL,
            fee_percentage     REAL NOT NULL,
            params             TEXT NOT NULL,
            updated_at         INTEGER NOT NULL DEFAULT (unixepoch())
        );

        CREATE TABLE IF NOT EXISTS cycle_states (
            token_id                   TEXT PRIMARY KEY REFERENCES tokens(id) ON DELETE CASCADE,
            phase                      TEXT NOT NULL DEFAULT 'buy',
            buy_count                  INTEGER NOT NULL DEFAULT 0,
            sell_count                 INTEGER NOT NULL DEFAULT 0,
            sell_phase_token_snapshot  TEXT NOT NULL DEFAULT '0',
            sell_amount_per_tx         TEXT NOT NULL DEFAULT '0',
            consecutive_failures       INTEGER NOT NULL DEFAULT 0,
            last_attempt_at            INTEGER,
            updated_at                 INTEGER NOT NULL DEFAULT (unixepoch())
        );

        CREATE TABLE IF NOT EXISTS pending_activations (
            id                        TEXT PRIMARY KEY,
            kind                      TEXT NOT NULL,
            expected_deposit_address  TEXT NOT NULL,
            min_amount_lamports       TEXT NOT NULL,
            status                    TEXT NOT NULL DEFAULT 'awaiting_deposit',
            payload                   TEXT NOT NULL,
            created_at                INTEGER NOT NULL,
            expires_at                INTEGER NOT NULL,
            updated_at                INTEGER NOT NULL DEFAULT (unixepoch())
        );

        CREATE TABLE IF NOT EXISTS trades (
            id          TEXT PRIMARY KEY,
            token_id    TEXT NOT NULL REFERENCES tokens(id),
            side        TEXT NOT NULL,
            amount      TEXT NOT NULL,
            signature   TEXT,
            status      TEXT NOT NULL,
            reason      TEXT,
            created_at  INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_trades_token ON trades(token_id, created_at);

        CREATE TABLE IF NOT EXISTS claims (
            id                       TEXT PRIMARY KEY,
            token_id                 TEXT NOT NULL REFERENCES tokens(id),
            gross_lamports           TEXT NOT NULL,
            platform_fee_lamports    TEXT NOT NULL,
            owner_received_lamports  TEXT NOT NULL,
            signature                TEXT NOT NULL,
            created_at               INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_claims_token ON claims(token_id, created_at);

        CREATE TABLE IF NOT EXISTS platform_config (
            key    TEXT PRIMARY KEY,
            value  TEXT NOT NULL
        );
        ",
    )?;
    Ok(())
}

// ── Row-reading helpers ─────────────────────────────────────────────

pub(crate) fn conv_err(idx: usize, e: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, e.into())
}

pub(crate) fn amount_col(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<u64> {
    let value = row.get_ref(idx)?;
    crate::model::amount::amount_from_sql(value).map_err(|e| conv_err(idx, e))
}

pub(crate) fn ts_col(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let secs: i64 = row.get(idx)?;
    DateTime::<Utc>::from_timestamp(secs, 0)
        .ok_or_else(|| conv_err(idx, format!("invalid timestamp {secs}")))
}

pub(crate) fn opt_ts_col(
    row: &rusqlite::Row<'_>,
    idx: usize,
) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let secs: Option<i64> = row.get(idx)?;
    match secs {
        None => Ok(None),
        Some(s) => DateTime::<Utc>::from_timestamp(s, 0)
            .map(Some)
            .ok_or_else(|| conv_err(idx, format!("invalid timestamp {s}"))),
    }
}

/// Shared SELECT for the token + config + cycle + wallet join used by
/// the scheduler, claimer, and read API.
pub(crate) const TOKEN_ROW_SELECT: &str = "
    SELECT t.id, t.owner_id, t.mint, t.symbol, t.decimals, t.source,
           t.dev_wallet_id, t.ops_wallet_id, t.active, t.graduated, t.created_at,
           c.flywheel_active, c.auto_claim_enabled, c.min_buy_lamports,
           c.max_buy_lamports, c.max_sell_raw, c.slippage_bps, c.fee_percentage, c.params,
           y.phase, y.buy_count, y.sell_count, y.sell_phase_token_snapshot,
           y.sell_amount_per_tx, y.consecutive_failures, y.last_attempt_at,
           dw.id, dw.owner_id, dw.role, dw.address, dw.signer_handle,
           ow.id, ow.owner_id, ow.role, ow.address, ow.signer_handle
      FROM tokens t
      JOIN token_configs c ON c.token_id = t.id
      JOIN cycle_states y  ON y.token_id = t.id
      JOIN wallets dw      ON dw.id = t.dev_wallet_id
      JOIN wallets ow      ON ow.id = t.ops_wallet_id
";

pub(crate) fn read_token_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<TokenRow> {
    let source: String = row.get(5)?;
    let token = Token {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        mint: row.get(2)?,
        symbol: row.get(3)?,
        decimals: row.get::<_, i64>(4)? as u8,
        source: TokenSource::parse(&source).map_err(|e| conv_err(5, e))?,
        dev_wallet_id: row.get(6)?,
        ops_wallet_id: row.get(7)?,
        active: row.get::<_, i64>(8)? != 0,
        graduated: row.get::<_, i64>(9)? != 0,
        created_at: ts_col(row, 10)?,
    };

    let params_json: String = row.get(18)?;
    let params: AlgoParams =
        serde_json::from_str(&params_json).map_err(|e| conv_err(18, e))?;
    let config = TokenConfig {
        flywheel_active: row.get::<_, i64>(11)? != 0,
        auto_claim_enabled: row.get::<_, i64>(12)? != 0,
        min_buy_lamports: amount_col(row, 13)?,
        max_buy_lamports: amount_col(row, 14)?,
        max_sell_raw: amount_col(row, 15)?,
        slippage_bps: row.get::<_, i64>(16)? as u32,
        fee_percentage: row.get(17)?,
        params,
    };

    let phase: String = row.get(19)?;
    let cycle = CycleState {
        phase: Phase::parse(&phase).map_err(|e| conv_err(19, e))?,
        buy_count: row.get::<_, i64>(20)? as u32,
        sell_count: row.get::<_, i64>(21)? as u32,
        sell_phase_token_snapshot: amount_col(row, 22)?,
        sell_amount_per_tx: amount_col(row, 23)?,
        consecutive_failures: row.get::<_, i64>(24)? as u32,
        last_attempt_at: opt_ts_col(row, 25)?,
    };

    let dev_wallet = read_wallet_at(row, 26)?;
    let ops_wallet = read_wallet_at(row, 31)?;

    Ok(TokenRow {
        token,
        config,
        cycle,
        dev_wallet,
        ops_wallet,
    })
}

pub(crate) fn read_wallet_at(row: &rusqlite::Row<'_>, base: usize) -> rusqlite::Result<Wallet> {
    let role: String = row.get(base + 2)?;
    Ok(Wallet {
        id: row.get(base)?,
        owner_id: row.get(base + 1)?,
        role: WalletRole::parse(&role)
            .map_err(|e| conv_err(base + 2, e))?,
        address: row.get(base + 3)?,
        signer_handle: row.get(base + 4)?,
    })
}
