use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::SolwireError;
use crate::tx::UnsignedTransaction;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// A quote from the routing service. Carried back verbatim into the swap
/// build call so the route the user saw is the route that executes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwapQuote {
    pub input_mint: String,
    pub output_mint: String,
    pub in_amount: String,
    pub out_amount: String,
    pub slippage_bps: u32,
    /// Opaque route plan, passed through to the swap builder.
    #[serde(default)]
    pub route_plan: serde_json::Value,
}

/// One claimable creator-fee position on the launch platform.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimablePosition {
    pub mint: String,
    /// Accumulated fees in native base units.
    pub claimable_lamports: u64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SwapBuildResponse {
    swap_transaction: String,
    recent_blockhash: String,
    last_valid_block_height: u64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ClaimBuildResponse {
    transactions: Vec<SwapBuildResponse>,
}

#[derive(Deserialize)]
struct ClaimableResponse {
    positions: Vec<ClaimablePosition>,
}

/// HTTP client for the external trading/launch-platform SDK: quoting,
/// swap building, claimable-fee discovery, and claim/transfer builders.
/// All transactions come back serialized with their blockhash metadata;
/// nothing here mutates them.
pub struct SwapClient {
    http: reqwest::Client,
    base_url: String,
}

impl SwapClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, SolwireError> {
        Ok(SwapClient {
            http: reqwest::Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .build()?,
            base_url: base_url.into(),
        })
    }

    async fn check<T: serde::de::DeserializeOwned>(
        resp: reqwest::Response,
    ) -> Result<T, SolwireError> {
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(SolwireError::Http {
                status: status.as_u16(),
                body,
            });
        }
        resp.json::<T>()
            .await
            .map_err(|e| SolwireError::InvalidResponse(e.to_string()))
    }

    pub async fn quote(
        &self,
        input_mint: &str,
        output_mint: &str,
        amount: u64,
        slippage_bps: u32,
    ) -> Result<SwapQuote, SolwireError> {
        let resp = self
            .http
            .get(format!("{}/quote", self.base_url))
            .query(&[
                ("inputMint", input_mint),
                ("outputMint", output_mint),
                ("amount", &amount.to_string()),
                ("slippageBps", &slippage_bps.to_string()),
            ])
            .send()
            .await?;
        Self::check(resp).await
    }

    /// Build an unsigned swap transaction for a previously fetched quote.
    pub async fn build_swap(
        &self,
        quote: &SwapQuote,
        user_pubkey: &str,
    ) -> Result<UnsignedTransaction, SolwireError> {
        let resp = self
            .http
            .post(format!("{}/swap", self.base_url))
            .json(&json!({
                "quoteResponse": quote,
                "userPublicKey": user_pubkey,
            }))
            .send()
            .await?;
        let built: SwapBuildResponse = Self::check(resp).await?;
        Ok(UnsignedTransaction {
            tx_base64: built.swap_transaction,
            recent_blockhash: built.recent_blockhash,
            last_valid_block_height: built.last_valid_block_height,
        })
    }

    /// Claimable creator-fee positions for one dev wallet.
    pub async fn list_claimable(
        &self,
        wallet: &str,
    ) -> Result<Vec<ClaimablePosition>, SolwireError> {
        let resp = self
            .http
            .get(format!("{}/creator-fees/{wallet}", self.base_url))
            .send()
            .await?;
        let parsed: ClaimableResponse = Self::check(resp).await?;
        Ok(parsed.positions)
    }

    /// Build fresh unsigned claim transactions for the given mints. Each
    /// call stamps a new blockhash; retries must come back here rather
    /// than resubmitting an old result.
    pub async fn build_claim_txs(
        &self,
        wallet: &str,
        mints: &[String],
    ) -> Result<Vec<UnsignedTransaction>, SolwireError> {
        let resp = self
            .http
            .post(format!("{}/creator-fees/claim", self.base_url))
            .json(&json!({ "wallet": wallet, "mints": mints }))
            .send()
            .await?;
        let built: ClaimBuildResponse = Self::check(resp).await?;
        Ok(built
            .transactions
            .into_iter()
            .map(|t| UnsignedTransaction {
                tx_base64: t.swap_transaction,
                recent_blockhash: t.recent_blockhash,
                last_valid_block_height: t.last_valid_block_height,
            })
            .collect())
    }

    /// Build an unsigned native transfer. Used for reward splits.
    pub async fn build_transfer(
        &self,
        from: &str,
        to: &str,
        lamports: u64,
    ) -> Result<UnsignedTransaction, SolwireError> {
        let resp = self
            .http
            .post(format!("{}/transfer", self.base_url))
            .json(&json!({ "from": from, "to": to, "lamports": lamports }))
            .send()
            .await?;
        let built: SwapBuildResponse = Self::check(resp).await?;
        Ok(UnsignedTransaction {
            tx_base64: built.swap_transaction,
            recent_blockhash: built.recent_blockhash,
            last_valid_block_height: built.last_valid_block_height,
        })
    }
}
