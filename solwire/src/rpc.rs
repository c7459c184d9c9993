use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::error::SolwireError;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const CONFIRM_POLL_INTERVAL: Duration = Duration::from_millis(1500);

/// Outcome of waiting for a submitted transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfirmOutcome {
    /// Landed at `confirmed` commitment (or better).
    Confirmed { slot: u64 },
    /// The chain moved past `last_valid_block_height` without the
    /// transaction landing, so the blockhash is dead.
    BlockhashExpired,
    /// The caller-supplied deadline elapsed first.
    TimedOut,
}

/// JSON-RPC client pinned to `confirmed` commitment.
pub struct RpcClient {
    http: reqwest::Client,
    url: String,
    api_key: Option<String>,
    next_id: AtomicU64,
}

#[derive(Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcErrorBody>,
}

#[derive(Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
}

#[derive(Deserialize)]
struct WithContext<T> {
    value: T,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct BlockhashValue {
    blockhash: String,
    last_valid_block_height: u64,
}

#[derive(Deserialize)]
struct ParsedTokenAccount {
    account: ParsedAccount,
}

#[derive(Deserialize)]
struct ParsedAccount {
    data: ParsedData,
}

#[derive(Deserialize)]
struct ParsedData {
    parsed: ParsedInfo,
}

#[derive(Deserialize)]
struct ParsedInfo {
    info: TokenAccountInfo,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenAccountInfo {
    token_amount: TokenAmount,
}

#[derive(Deserialize)]
struct TokenAmount {
    amount: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignatureStatus {
    slot: u64,
    confirmation_status: Option<String>,
    err: Option<Value>,
}

impl RpcClient {
    pub fn new(url: impl Into<String>) -> Result<Self, SolwireError> {
        Ok(RpcClient {
            http: reqwest::Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .build()?,
            url: url.into(),
            api_key: None,
            next_id: AtomicU64::new(1),
        })
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        let key = api_key.into();
        if !key.is_empty() {
            self.api_key = Some(key);
        }
        self
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Value,
    ) -> Result<T, SolwireError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });

        let mut req = self.http.post(&self.url).json(&body);
        if let Some(key) = &self.api_key {
            req = req.header("x-api-key", key);
        }

        let resp = req.send().await?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(SolwireError::Http {
                status: status.as_u16(),
                body: text,
            });
        }

        let parsed: RpcResponse<T> = resp.json().await?;
        if let Some(err) = parsed.error {
            return Err(SolwireError::Rpc {
                code: err.code,
                message: err.message,
            });
        }
        parsed
            .result
            .ok_or_else(|| SolwireError::InvalidResponse(format!("{method}: empty result")))
    }

    /// Native balance of an address, in base units.
    pub async fn get_balance(&self, address: &str) -> Result<u64, SolwireError> {
        let resp: WithContext<u64> = self
            .call(
                "getBalance",
                json!([address, { "commitment": "confirmed" }]),
            )
            .await?;
        Ok(resp.value)
    }

    /// Sum of the owner's token-account balances for one mint, in raw units.
    pub async fn get_token_balance(
        &self,
        owner: &str,
        mint: &str,
    ) -> Result<u64, SolwireError> {
        let resp: WithContext<Vec<ParsedTokenAccount>> = self
            .call(
                "getParsedTokenAccountsByOwner",
                json!([
                    owner,
                    { "mint": mint },
                    { "commitment": "confirmed", "encoding": "jsonParsed" }
                ]),
            )
            .await?;

        let mut total: u64 = 0;
        for account in resp.value {
            let raw = &account.account.data.parsed.info.token_amount.amount;
            let amount: u64 = raw.parse().map_err(|_| {
                SolwireError::InvalidResponse(format!("non-numeric token amount '{raw}'"))
            })?;
            total = total.saturating_add(amount);
        }
        Ok(total)
    }

    pub async fn get_latest_blockhash(&self) -> Result<(String, u64), SolwireError> {
        let resp: WithContext<BlockhashValue> = self
            .call(
                "getLatestBlockhash",
                json!([{ "commitment": "confirmed" }]),
            )
            .await?;
        Ok((resp.value.blockhash, resp.value.last_valid_block_height))
    }

    pub async fn get_block_height(&self) -> Result<u64, SolwireError> {
        self.call("getBlockHeight", json!([{ "commitment": "confirmed" }]))
            .await
    }

    /// Broadcast a signed transaction. Returns the signature string.
    pub async fn send_transaction(&self, tx_base64: &str) -> Result<String, SolwireError> {
        self.call(
            "sendTransaction",
            json!([
                tx_base64,
                { "encoding": "base64", "preflightCommitment": "confirmed" }
            ]),
        )
        .await
    }

    /// Poll `getSignatureStatuses` until the transaction confirms, the
    /// blockhash expires, or `deadline` elapses.
    pub async fn await_confirmation(
        &self,
        signature: &str,
        last_valid_block_height: u64,
        deadline: Duration,
    ) -> Result<ConfirmOutcome, SolwireError> {
        let started = tokio::time::Instant::now();

        loop {
            let resp: WithContext<Vec<Option<SignatureStatus>>> = self
                .call(
                    "getSignatureStatuses",
                    json!([[signature], { "searchTransactionHistory": false }]),
                )
                .await?;

            if let Some(Some(status)) = resp.value.first() {
                if status.err.is_some() {
                    return Err(SolwireError::Rpc {
                        code: -1,
                        message: format!(
                            "transaction {signature} failed on chain: {:?}",
                            status.err
                        ),
                    });
                }
                match status.confirmation_status.as_deref() {
                    Some("confirmed") | Some("finalized") => {
                        debug!(signature, slot = status.slot, "transaction confirmed");
                        return Ok(ConfirmOutcome::Confirmed { slot: status.slot });
                    }
                    _ => {}
                }
            }

            if self.get_block_height().await? > last_valid_block_height {
                return Ok(ConfirmOutcome::BlockhashExpired);
            }
            if started.elapsed() >= deadline {
                return Ok(ConfirmOutcome::TimedOut);
            }
            tokio::time::sleep(CONFIRM_POLL_INTERVAL).await;
        }
    }
}
