use anyhow::bail;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A tenant. Owns wallets and tokens; created at onboarding and never
/// destroyed while it owns live tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Owner {
    pub id: String,
    pub handle: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WalletRole {
    /// Receives creator-fee rewards; never trades.
    Dev,
    /// Holds working capital and executes buy/sell trades.
    Ops,
}

impl WalletRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            WalletRole::Dev => "dev",
            WalletRole::Ops => "ops",
        }
    }

    pub fn parse(s: &str) -> anyhow::Result<Self> {
        match s {
            "dev" => Ok(WalletRole::Dev),
            "ops" => Ok(WalletRole::Ops),
            other => bail!("unknown wallet role '{other}'"),
        }
    }
}

/// An on-chain wallet the process can spend from, by address only. A
/// populated `signer_handle` means the key lives behind the delegated
/// signing service; `None` means the platform's own in-process key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Wallet {
    pub id: String,
    pub owner_id: String,
    pub role: WalletRole,
    pub address: String,
    pub signer_handle: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenSource {
    Launched,
    Registered,
    MmOnly,
    Platform,
}

impl TokenSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenSource::Launched => "launched",
            TokenSource::Registered => "registered",
            TokenSource::MmOnly => "mm_only",
            TokenSource::Platform => "platform",
        }
    }

    pub fn parse(s: &str) -> anyhow::Result<Self> {
        match s {
            "launched" => Ok(TokenSource::Launched),
            "registered" => Ok(TokenSource::Registered),
            "mm_only" => Ok(TokenSource::MmOnly),
            "platform" => Ok(TokenSource::Platform),
            other => bail!("unknown token source '{other}'"),
        }
    }
}

/// A registered asset under management.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Token {
    pub id: String,
    pub owner_id: String,
    pub mint: String,
    pub symbol: String,
    pub decimals: u8,
    pub source: TokenSource,
    pub dev_wallet_id: String,
    pub ops_wallet_id: String,
    pub active: bool,
    /// True once the asset has migrated off its bonding curve and is
    /// routable on the AMM.
    pub graduated: bool,
    pub created_at: DateTime<Utc>,
}

impl Token {
    /// Platform-owned tokens bypass the reward split entirely.
    pub fn fee_exempt(&self) -> bool {
        self.source == TokenSource::Platform
    }
}
