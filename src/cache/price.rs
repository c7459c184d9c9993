use std::collections::HashMap;
use std::time::{Duration, Instant};

use anyhow::{bail, Result};
use tokio::sync::Mutex;
use tracing::{debug, warn};

const PRICE_TTL: Duration = Duration::from_secs(300);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

struct CachedPrice {
    usd: f64,
    fetched_at: Instant,
}

/// Time-bounded cache of external asset prices. Sources are tried in
/// the configured order; on total failure the last cached value is
/// served without refreshing the timestamp, so the next read retries.
pub struct PriceCache {
    http: reqwest::Client,
    /// Ordered (name, url) pairs. `{asset}` in the url is substituted.
    sources: Vec<(String, String)>,
    entries: Mutex<HashMap<String, CachedPrice>>,
}

impl PriceCache {
    pub fn new(sources: Vec<(String, String)>) -> Result<Self> {
        Ok(PriceCache {
            http: reqwest::Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .build()?,
            sources,
            entries: Mutex::new(HashMap::new()),
        })
    }

    /// USD price for an asset symbol, at most 5 minutes old.
    pub async fn price(&self, asset: &str) -> Result<f64> {
        {
            let entries = self.entries.lock().await;
            if let Some(cached) = entries.get(asset) {
                if cached.fetched_at.elapsed() < PRICE_TTL {
                    return Ok(cached.usd);
                }
            }
        }

        match self.fetch(asset).await {
            Ok(usd) => {
                let mut entries = self.entries.lock().await;
                entries.insert(
                    asset.to_string(),
                    CachedPrice {
                        usd,
                        fetched_at: Instant::now(),
                    },
                );
                Ok(usd)
            }
            Err(e) => {
                // Stale fallback; freshness timestamp deliberately not
                // updated so the next caller retries the sources.
                let entries = self.entries.lock().await;
                if let Some(cached) = entries.get(asset) {
                    warn!(asset, error = %e, "all price sources failed, serving stale value");
                    return Ok(cached.usd);
                }
                Err(e)
            }
        }
    }

    async fn fetch(&self, asset: &str) -> Result<f64> {
        for (name, url_template) in &self.sources {
            let url = url_template.replace("{asset}", asset);
            match self.fetch_one(&url, asset).await {
                Ok(usd) => {
                    debug!(asset, source = name.as_str(), usd, "price fetched");
                    return Ok(usd);
                }
                Err(e) => {
                    debug!(asset, source = name.as_str(), error = %e, "price source failed");
                }
            }
        }
        bail!("every price source failed for {asset}");
    }

    async fn fetch_one(&self, url: &str, asset: &str) -> Result<f64> {
        let resp = self.http.get(url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            bail!("price source returned {status}");
        }
        // Sources respond with `{ "<asset>": <usd> }`.
        let body: HashMap<String, f64> = resp.json().await?;
        match body.get(asset) {
            Some(usd) if *usd > 0.0 => Ok(*usd),
            _ => bail!("price source response missing {asset}"),
        }
    }

    /// Test/seeding hook: pre-populate a price as if freshly fetched.
    pub async fn seed(&self, asset: &str, usd: f64) {
        let mut entries = self.entries.lock().await;
        entries.insert(
            asset.to_string(),
            CachedPrice {
                usd,
                fetched_at: Instant::now(),
            },
        );
    }
}
