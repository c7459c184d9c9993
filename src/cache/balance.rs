use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::ChainReader;

const BALANCE_TTL: Duration = Duration::from_secs(30);
const REFRESH_BATCH_SIZE: usize = 50;
const REFRESH_BATCH_DELAY: Duration = Duration::from_millis(100);

/// Cache key: a wallet's native balance, or one of its token balances.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Key {
    Native(String),
    Token(String, String),
}

struct Entry {
    amount: u64,
    fetched_at: Instant,
}

/// Short-TTL cache over on-chain balances. Reads are cheap under
/// parallel access; callers invalidate a wallet right after submitting
/// a transaction that settles against it.
pub struct BalanceCache {
    reader: Arc<dyn ChainReader>,
    entries: Mutex<HashMap<Key, Entry>>,
}

impl BalanceCache {
    pub fn new(reader: Arc<dyn ChainReader>) -> Self {
        BalanceCache {
            reader,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub async fn native_balance(&self, wallet: &str) -> Result<u64> {
        let key = Key::Native(wallet.to_string());
        if let Some(amount) = self.fresh(&key).await {
            return Ok(amount);
        }
        let amount = self.reader.native_balance(wallet).await?;
        self.put(key, amount).await;
        Ok(amount)
    }

    pub async fn token_balance(&self, wallet: &str, mint: &str) -> Result<u64> {
        let key = Key::Token(wallet.to_string(), mint.to_string());
        if let Some(amount) = self.fresh(&key).await {
            return Ok(amount);
        }
        let amount = self.reader.token_balance(wallet, mint).await?;
        self.put(key, amount).await;
        Ok(amount)
    }

    /// Drop every cached balance for a wallet. Called immediately after
    /// submitting a transaction that settles against it.
    pub async fn invalidate_wallet(&self, wallet: &str) {
        let mut entries = self.entries.lock().await;
        entries.retain(|key, _| match key {
            Key::Native(w) => w != wallet,
            Key::Token(w, _) => w != wallet,
        });
    }

    async fn fresh(&self, key: &Key) -> Option<u64> {
        let entries = self.entries.lock().await;
        entries
            .get(key)
            .filter(|e| e.fetched_at.elapsed() < BALANCE_TTL)
            .map(|e| e.amount)
    }

    async fn put(&self, key: Key, amount: u64) {
        let mut entries = self.entries.lock().await;
        entries.insert(
            key,
            Entry {
                amount,
                fetched_at: Instant::now(),
            },
        );
    }

    /// One pass of the background refresher: re-fetch stale keys in
    /// batches, pausing between batches so foreground reads are not
    /// starved.
    pub async fn refresh_stale(&self) {
        let stale: Vec<Key> = {
            let entries = self.entries.lock().await;
            entries
                .iter()
                .filter(|(_, e)| e.fetched_at.elapsed() >= BALANCE_TTL)
                .map(|(k, _)| k.clone())
                .collect()
        };
        if stale.is_empty() {
            return;
        }
        debug!(count = stale.len(), "refreshing stale balances");

        for batch in stale.chunks(REFRESH_BATCH_SIZE) {
            for key in batch {
                let fetched = match key {
                    Key::Native(wallet) => self.reader.native_balance(wallet).await,
                    Key::Token(wallet, mint) => {
                        self.reader.token_balance(wallet, mint).await
                    }
                };
                match fetched {
                    Ok(amount) => self.put(key.clone(), amount).await,
                    Err(e) => warn!(error = %e, "balance refresh failed"),
                }
            }
            tokio::time::sleep(REFRESH_BATCH_DELAY).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU64, Ordering};

    use async_trait::async_trait;

    use super::*;

    struct CountingReader {
        calls: AtomicU64,
    }

    #[async_trait]
    impl ChainReader for CountingReader {
        async fn native_balance(&self, _address: &str) -> Result<u64> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(1_000_000_000)
        }

        async fn token_balance(&self, _address: &str, _mint: &str) -> Result<u64> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(500)
        }
    }

    #[tokio::test]
    async fn second_read_is_served_from_cache() {
        let reader = Arc::new(CountingReader {
            calls: AtomicU64::new(0),
        });
        let cache = BalanceCache::new(reader.clone());

        assert_eq!(cache.native_balance("w1").await.unwrap(), 1_000_000_000);
        assert_eq!(cache.native_balance("w1").await.unwrap(), 1_000_000_000);
        assert_eq!(reader.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn invalidation_forces_a_refetch() {
        let reader = Arc::new(CountingReader {
            calls: AtomicU64::new(0),
        });
        let cache = BalanceCache::new(reader.clone());

        cache.native_balance("w1").await.unwrap();
        cache.token_balance("w1", "mint").await.unwrap();
        cache.invalidate_wallet("w1").await;
        cache.native_balance("w1").await.unwrap();
        assert_eq!(reader.calls.load(Ordering::SeqCst), 3);
    }
}
