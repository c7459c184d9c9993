use std::sync::Arc;
use std::time::Duration;

use base64::{engine::general_purpose, Engine as _};
use ed25519_dalek::{Signer as _, SigningKey};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

use crate::error::SolwireError;
use crate::tx::{SignedTransaction, UnsignedTransaction};

const SIGN_TIMEOUT: Duration = Duration::from_secs(30);

/// Client for the delegated-signing service. The service holds the key;
/// we post serialized transaction bytes against a wallet handle and get
/// the signed wire form back.
#[derive(Clone)]
pub struct RemoteSigner {
    client: Arc<Client>,
    base_url: String,
    app_id: String,
    basic_auth: String,
    authorization_key: String,
}

#[derive(Deserialize)]
struct SignResponse {
    data: SignData,
}

#[derive(Deserialize)]
struct SignData {
    signed_transaction: String,
}

impl RemoteSigner {
    pub fn new(
        base_url: impl Into<String>,
        app_id: impl Into<String>,
        app_secret: &str,
        authorization_key: impl Into<String>,
    ) -> Result<Self, SolwireError> {
        let app_id = app_id.into();
        let creds = general_purpose::STANDARD.encode(format!("{app_id}:{app_secret}"));

        Ok(Self {
            client: Arc::new(
                Client::builder()
                    .timeout(SIGN_TIMEOUT)
                    .build()
                    .map_err(|e| SolwireError::Network(e.to_string()))?,
            ),
            base_url: base_url.into(),
            app_id,
            basic_auth: format!("Basic {creds}"),
            authorization_key: authorization_key.into(),
        })
    }

    /// Sign a serialized transaction with the wallet behind `wallet_handle`.
    /// The transaction bytes are passed through untouched; the service
    /// only fills signature slots.
    pub async fn sign(
        &self,
        wallet_handle: &str,
        tx: &UnsignedTransaction,
    ) -> Result<SignedTransaction, SolwireError> {
        let url = format!("{}/v1/wallets/{wallet_handle}/rpc", self.base_url);
        let body = json!({
            "method": "signTransaction",
            "params": {
                "transaction": tx.tx_base64,
                "encoding": "base64",
            }
        });

        let resp = self
            .client
            .post(&url)
            .header("Authorization", &self.basic_auth)
            .header("x-app-id", &self.app_id)
            .header("x-authorization-key", &self.authorization_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| SolwireError::SignerUnreachable(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            if status.is_server_error() {
                return Err(SolwireError::SignerUnreachable(format!(
                    "{status}: {text}"
                )));
            }
            return Err(SolwireError::SignerRejected(format!("{status}: {text}")));
        }

        let parsed: SignResponse = resp
            .json()
            .await
            .map_err(|e| SolwireError::InvalidResponse(e.to_string()))?;

        Ok(SignedTransaction {
            tx_base64: parsed.data.signed_transaction,
        })
    }
}

/// In-process ed25519 signer for the platform's own wallet. Signs the
/// message portion of the wire bytes and splices the signature into the
/// fee-payer slot.
pub struct LocalSigner {
    key: SigningKey,
    address: String,
}

impl LocalSigner {
    pub fn new(key: SigningKey) -> Self {
        let address = bs58::encode(key.verifying_key().as_bytes()).into_string();
        LocalSigner { key, address }
    }

    pub fn from_base58_secret(secret: &str) -> Result<Self, SolwireError> {
        let bytes = bs58::decode(secret)
            .into_vec()
            .map_err(|e| SolwireError::InvalidResponse(format!("bad secret key: {e}")))?;
        // Accept either a 32-byte seed or a 64-byte seed+pubkey keypair dump.
        let seed: [u8; 32] = match bytes.len() {
            32 => bytes.as_slice().try_into().unwrap_or([0u8; 32]),
            64 => bytes[..32].try_into().unwrap_or([0u8; 32]),
            n => {
                return Err(SolwireError::InvalidResponse(format!(
                    "secret key must be 32 or 64 bytes, got {n}"
                )))
            }
        };
        Ok(Self::new(SigningKey::from_bytes(&seed)))
    }

    /// Base58 public key of this signer.
    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn sign(&self, tx: &UnsignedTransaction) -> Result<SignedTransaction, SolwireError> {
        let message = tx.message_bytes()?;
        let signature = self.key.sign(&message);
        tx.with_fee_payer_signature(&signature.to_bytes())
    }
}
