use anyhow::bail;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::token_config::Algorithm;

/// How long a pending activation waits for its deposit.
pub const PENDING_TTL_HOURS: i64 = 24;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PendingKind {
    Launch,
    MmOnly,
}

impl PendingKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PendingKind::Launch => "launch",
            PendingKind::MmOnly => "mm_only",
        }
    }

    pub fn parse(s: &str) -> anyhow::Result<Self> {
        match s {
            "launch" => Ok(PendingKind::Launch),
            "mm_only" => Ok(PendingKind::MmOnly),
            other => bail!("unknown pending kind '{other}'"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PendingStatus {
    AwaitingDeposit,
    Activated,
    Expired,
    Cancelled,
}

impl PendingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PendingStatus::AwaitingDeposit => "awaiting_deposit",
            PendingStatus::Activated => "activated",
            PendingStatus::Expired => "expired",
            PendingStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> anyhow::Result<Self> {
        match s {
            "awaiting_deposit" => Ok(PendingStatus::AwaitingDeposit),
            "activated" => Ok(PendingStatus::Activated),
            "expired" => Ok(PendingStatus::Expired),
            "cancelled" => Ok(PendingStatus::Cancelled),
            other => bail!("unknown pending status '{other}'"),
        }
    }
}

/// Everything activation needs to create the Token + TokenConfig +
/// CycleState triple, captured at registration time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingPayload {
    pub owner_handle: String,
    pub mint: String,
    pub symbol: String,
    pub decimals: u8,
    pub algorithm: Algorithm,
    pub dev_wallet_address: String,
    pub dev_signer_handle: Option<String>,
    pub ops_wallet_address: String,
    pub ops_signer_handle: Option<String>,
}

/// An intention to activate a token once its deposit arrives.
/// Transitions are irreversible except `awaiting_deposit → cancelled`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingActivation {
    pub id: String,
    pub kind: PendingKind,
    pub expected_deposit_address: String,
    pub min_amount_lamports: u64,
    pub status: PendingStatus,
    pub payload: PendingPayload,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl PendingActivation {
    pub fn expiry_for(created_at: DateTime<Utc>) -> DateTime<Utc> {
        created_at + Duration::hours(PENDING_TTL_HOURS)
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.status == PendingStatus::AwaitingDeposit && now > self.expires_at
    }
}
