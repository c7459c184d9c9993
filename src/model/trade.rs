use anyhow::bail;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TradeSide {
    Buy,
    Sell,
    /// Reward-split settlement leg, recorded alongside claims.
    Transfer,
}

impl TradeSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeSide::Buy => "buy",
            TradeSide::Sell => "sell",
            TradeSide::Transfer => "transfer",
        }
    }

    pub fn parse(s: &str) -> anyhow::Result<Self> {
        match s {
            "buy" => Ok(TradeSide::Buy),
            "sell" => Ok(TradeSide::Sell),
            "transfer" => Ok(TradeSide::Transfer),
            other => bail!("unknown trade side '{other}'"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TradeStatus {
    Submitted,
    Confirmed,
    Failed,
}

impl TradeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeStatus::Submitted => "submitted",
            TradeStatus::Confirmed => "confirmed",
            TradeStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> anyhow::Result<Self> {
        match s {
            "submitted" => Ok(TradeStatus::Submitted),
            "confirmed" => Ok(TradeStatus::Confirmed),
            "failed" => Ok(TradeStatus::Failed),
            other => bail!("unknown trade status '{other}'"),
        }
    }
}

/// Immutable record of one attempted on-chain trade. Append-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trade {
    pub id: String,
    pub token_id: String,
    pub side: TradeSide,
    /// Buy/transfer amounts are native base units; sells are raw token
    /// units.
    pub amount: u64,
    pub signature: Option<String>,
    pub status: TradeStatus,
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Trade {
    pub fn confirmed(
        token_id: &str,
        side: TradeSide,
        amount: u64,
        signature: String,
    ) -> Self {
        Trade {
            id: uuid::Uuid::new_v4().to_string(),
            token_id: token_id.to_string(),
            side,
            amount,
            signature: Some(signature),
            status: TradeStatus::Confirmed,
            reason: None,
            created_at: Utc::now(),
        }
    }

    pub fn failed(token_id: &str, side: TradeSide, amount: u64, reason: String) -> Self {
        Trade {
            id: uuid::Uuid::new_v4().to_string(),
            token_id: token_id.to_string(),
            side,
            amount,
            signature: None,
            status: TradeStatus::Failed,
            reason: Some(reason),
            created_at: Utc::now(),
        }
    }
}
