//! The single funnel for on-chain sends. Callers hand over a resolved
//! wallet and an unsigned transaction; the gateway signs (remotely or
//! locally), broadcasts, and polls confirmation. It never mutates the
//! transaction between the builder and the signer, and it never
//! retries; retry paths upstream must regenerate a fresh transaction.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::info;

use solwire::{ConfirmOutcome, LocalSigner, RemoteSigner, RpcClient, SolwireError, UnsignedTransaction};

use crate::model::Wallet;

pub const DEFAULT_CONFIRM_TIMEOUT: Duration = Duration::from_secs(60);

/// Failure taxonomy for a submission. Each maps to a caller policy:
/// retryable kinds get a *fresh* transaction on the next attempt,
/// the rest abort.
#[derive(Error, Debug)]
pub enum SubmitError {
    #[error("blockhash expired before confirmation")]
    BlockhashExpired,

    #[error("simulation failed: {0}")]
    SimulationFailed(String),

    #[error("send failed: {0}")]
    SendFailed(String),

    #[error("confirmation timed out")]
    ConfirmationTimeout,

    #[error("signer unreachable: {0}")]
    SignerUnreachable(String),

    #[error("signer rejected: {0}")]
    SignerRejected(String),

    #[error("rpc error: {0}")]
    Rpc(String),
}

impl SubmitError {
    /// Whether a caller should regenerate a fresh transaction and try
    /// again. Never means "resubmit the same bytes".
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SubmitError::BlockhashExpired
                | SubmitError::ConfirmationTimeout
                | SubmitError::SendFailed(_)
                | SubmitError::SignerUnreachable(_)
        )
    }
}

#[derive(Debug, Clone)]
pub struct Confirmation {
    pub signature: String,
    pub confirmed_slot: u64,
}

/// How a wallet's signature is produced.
#[derive(Debug, Clone)]
pub enum SignerKind {
    /// Key held by the delegated signing service under this handle.
    Delegated { handle: String },
    /// The platform's own in-process key.
    Local,
}

/// A wallet resolved for submission: address plus signing route.
#[derive(Debug, Clone)]
pub struct WalletRef {
    pub address: String,
    pub signer: SignerKind,
}

impl From<&Wallet> for WalletRef {
    fn from(wallet: &Wallet) -> Self {
        WalletRef {
            address: wallet.address.clone(),
            signer: match &wallet.signer_handle {
                Some(handle) => SignerKind::Delegated {
                    handle: handle.clone(),
                },
                None => SignerKind::Local,
            },
        }
    }
}

#[async_trait]
pub trait Gateway: Send + Sync {
    /// Sign, broadcast, and confirm. `context` is used only for the log
    /// line.
    async fn submit(
        &self,
        wallet: &WalletRef,
        tx: &UnsignedTransaction,
        context: &str,
    ) -> Result<Confirmation, SubmitError>;
}

pub struct SignerGateway {
    rpc: Arc<RpcClient>,
    remote: RemoteSigner,
    local: Option<Arc<LocalSigner>>,
    confirm_timeout: Duration,
}

impl SignerGateway {
    pub fn new(
        rpc: Arc<RpcClient>,
        remote: RemoteSigner,
        local: Option<Arc<LocalSigner>>,
    ) -> Self {
        SignerGateway {
            rpc,
            remote,
            local,
            confirm_timeout: DEFAULT_CONFIRM_TIMEOUT,
        }
    }

    pub fn with_confirm_timeout(mut self, timeout: Duration) -> Self {
        self.confirm_timeout = timeout;
        self
    }
}

#[async_trait]
impl Gateway for SignerGateway {
    async fn submit(
        &self,
        wallet: &WalletRef,
        tx: &UnsignedTransaction,
        context: &str,
    ) -> Result<Confirmation, SubmitError> {
        let signed = match &wallet.signer {
            SignerKind::Delegated { handle } => {
                self.remote.sign(handle, tx).await.map_err(|e| match e {
                    SolwireError::SignerUnreachable(msg) => SubmitError::SignerUnreachable(msg),
                    SolwireError::SignerRejected(msg) => SubmitError::SignerRejected(msg),
                    other => SubmitError::SignerUnreachable(other.to_string()),
                })?
            }
            SignerKind::Local => {
                let signer = self
                    .local
                    .as_ref()
                    .ok_or_else(|| SubmitError::SignerRejected("no local key configured".into()))?;
                signer
                    .sign(tx)
                    .map_err(|e| SubmitError::SignerRejected(e.to_string()))?
            }
        };

        let signature = self
            .rpc
            .send_transaction(&signed.tx_base64)
            .await
            .map_err(classify_send_error)?;

        let outcome = self
            .rpc
            .await_confirmation(&signature, tx.last_valid_block_height, self.confirm_timeout)
            .await
            .map_err(|e| SubmitError::Rpc(e.to_string()))?;

        info!(
            wallet = wallet.address.as_str(),
            signature = signature.as_str(),
            context,
            outcome = ?outcome,
            "transaction submitted"
        );

        match outcome {
            ConfirmOutcome::Confirmed { slot } => Ok(Confirmation {
                signature,
                confirmed_slot: slot,
            }),
            ConfirmOutcome::BlockhashExpired => Err(SubmitError::BlockhashExpired),
            ConfirmOutcome::TimedOut => Err(SubmitError::ConfirmationTimeout),
        }
    }
}

fn classify_send_error(e: SolwireError) -> SubmitError {
    match e {
        SolwireError::Rpc { message, .. } => {
            if message.contains("BlockhashNotFound") || message.contains("blockhash not found") {
                SubmitError::BlockhashExpired
            } else if message.contains("simulation failed")
                || message.contains("Transaction simulation failed")
            {
                SubmitError::SimulationFailed(message)
            } else {
                SubmitError::Rpc(message)
            }
        }
        SolwireError::Network(msg) => SubmitError::SendFailed(msg),
        other => SubmitError::SendFailed(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn send_errors_classify_into_the_taxonomy() {
        let e = classify_send_error(SolwireError::Rpc {
            code: -32002,
            message: "Transaction simulation failed: BlockhashNotFound".into(),
        });
        assert!(matches!(e, SubmitError::BlockhashExpired));

        let e = classify_send_error(SolwireError::Rpc {
            code: -32002,
            message: "Transaction simulation failed: insufficient funds".into(),
        });
        assert!(matches!(e, SubmitError::SimulationFailed(_)));

        let e = classify_send_error(SolwireError::Network("connection reset".into()));
        assert!(matches!(e, SubmitError::SendFailed(_)));
    }

    #[test]
    fn retry_policy_covers_fresh_input_kinds_only() {
        assert!(SubmitError::BlockhashExpired.is_retryable());
        assert!(SubmitError::ConfirmationTimeout.is_retryable());
        assert!(!SubmitError::SimulationFailed("x".into()).is_retryable());
        assert!(!SubmitError::SignerRejected("x".into()).is_retryable());
    }
}
