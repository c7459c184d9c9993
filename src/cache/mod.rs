pub mod balance;
pub mod price;

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

pub use balance::BalanceCache;
pub use price::PriceCache;

/// Read-only chain access used by the caches and the deposit monitor.
/// The live implementation wraps the JSON-RPC client; tests substitute
/// an in-memory ledger.
#[async_trait]
pub trait ChainReader: Send + Sync {
    async fn native_balance(&self, address: &str) -> Result<u64>;
    async fn token_balance(&self, address: &str, mint: &str) -> Result<u64>;
}

pub struct RpcReader {
    rpc: Arc<solwire::RpcClient>,
}

impl RpcReader {
    pub fn new(rpc: Arc<solwire::RpcClient>) -> Self {
        RpcReader { rpc }
    }
}

#[async_trait]
impl ChainReader for RpcReader {
    async fn native_balance(&self, address: &str) -> Result<u64> {
        Ok(self.rpc.get_balance(address).await?)
    }

    async fn token_balance(&self, address: &str, mint: &str) -> Result<u64> {
        Ok(self.rpc.get_token_balance(address, mint).await?)
    }
}
