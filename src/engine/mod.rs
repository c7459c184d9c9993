//! The multi-tenant engine: shared context, external-SDK seam, and the
//! daemon loop that drives the fleet scheduler, reward claim engine,
//! deposit monitor, and balance refresher on independent tickers.

pub mod budget;
pub mod claimer;
pub mod cycle;
pub mod locks;
pub mod monitor;
pub mod scheduler;
pub mod strategy;

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use solwire::{ClaimablePosition, SwapClient, SwapQuote, UnsignedTransaction};

use crate::cache::{BalanceCache, ChainReader, PriceCache};
use crate::config::PlatformConfig;
use crate::gateway::Gateway;
use crate::notify::Notifier;
use crate::report::Reporter;
use crate::store::Store;

pub use budget::TradeBudget;
pub use locks::TokenLocks;

/// Wrapped-native mint used for swap routing.
pub const NATIVE_MINT: &str = "So11111111111111111111111111111111111111112";
pub const NATIVE_SYMBOL: &str = "SOL";

/// How often the turbo scan wakes up to check per-token intervals.
const TURBO_SCAN_PERIOD: Duration = Duration::from_secs(5);
const MONITOR_PERIOD: Duration = Duration::from_secs(30);
const REFRESHER_PERIOD: Duration = Duration::from_secs(10);

/// External trading/launch-platform SDK seam. The live implementation
/// wraps the HTTP client; tests substitute a scripted venue.
#[async_trait]
pub trait TradeSdk: Send + Sync {
    async fn quote(
        &self,
        input_mint: &str,
        output_mint: &str,
        amount: u64,
        slippage_bps: u32,
    ) -> Result<SwapQuote>;

    async fn build_swap(&self, quote: &SwapQuote, user: &str) -> Result<UnsignedTransaction>;

    async fn list_claimable(&self, wallet: &str) -> Result<Vec<ClaimablePosition>>;

    /// Always returns freshly built transactions; retry paths must call
    /// this again rather than resubmitting a previous result.
    async fn build_claim_txs(
        &self,
        wallet: &str,
        mints: &[String],
    ) -> Result<Vec<UnsignedTransaction>>;

    async fn build_transfer(&self, from: &str, to: &str, lamports: u64)
        -> Result<UnsignedTransaction>;
}

pub struct LiveSdk {
    client: SwapClient,
}

impl LiveSdk {
    pub fn new(client: SwapClient) -> Self {
        LiveSdk { client }
    }
}

#[async_trait]
impl TradeSdk for LiveSdk {
    async fn quote(
        &self,
        input_mint: &str,
        output_mint: &str,
        amount: u64,
        slippage_bps: u32,
    ) -> Result<SwapQuote> {
        Ok(self
            .client
            .quote(input_mint, output_mint, amount, slippage_bps)
            .await?)
    }

    async fn build_swap(&self, quote: &SwapQuote, user: &str) -> Result<UnsignedTransaction> {
        Ok(self.client.build_swap(quote, user).await?)
    }

    async fn list_claimable(&self, wallet: &str) -> Result<Vec<ClaimablePosition>> {
        Ok(self.client.list_claimable(wallet).await?)
    }

    async fn build_claim_txs(
        &self,
        wallet: &str,
        mints: &[String],
    ) -> Result<Vec<UnsignedTransaction>> {
        Ok(self.client.build_claim_txs(wallet, mints).await?)
    }

    async fn build_transfer(
        &self,
        from: &str,
        to: &str,
        lamports: u64,
    ) -> Result<UnsignedTransaction> {
        Ok(self.client.build_transfer(from, to, lamports).await?)
    }
}

/// Everything a job needs for one tick. Cheap to clone; all heavy
/// members are shared.
#[derive(Clone)]
pub struct EngineCtx {
    pub store: Store,
    pub balances: Arc<BalanceCache>,
    pub prices: Arc<PriceCache>,
    pub reader: Arc<dyn ChainReader>,
    pub gateway: Arc<dyn Gateway>,
    pub sdk: Arc<dyn TradeSdk>,
    pub reporter: Arc<Reporter>,
    pub notifier: Arc<dyn Notifier>,
    pub locks: TokenLocks,
    pub budget: Arc<TradeBudget>,
    pub env: Arc<PlatformConfig>,
    /// Per-token streak of claim cycles that failed outright.
    pub claim_failstreaks: Arc<StdMutex<HashMap<String, u32>>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Job {
    Flywheel,
    TurboFlywheel,
    Claim,
    DepositMonitor,
}

impl Job {
    pub fn as_str(&self) -> &'static str {
        match self {
            Job::Flywheel => "flywheel",
            Job::TurboFlywheel => "turbo_flywheel",
            Job::Claim => "claim",
            Job::DepositMonitor => "deposit_monitor",
        }
    }

    pub const ALL: &'static [Job] = &[
        Job::Flywheel,
        Job::TurboFlywheel,
        Job::Claim,
        Job::DepositMonitor,
    ];
}

impl FromStr for Job {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "flywheel" => Ok(Job::Flywheel),
            "turbo_flywheel" => Ok(Job::TurboFlywheel),
            "claim" => Ok(Job::Claim),
            "deposit_monitor" => Ok(Job::DepositMonitor),
            other => anyhow::bail!("unknown job '{other}'"),
        }
    }
}

/// Run one tick of a job, ignoring its enable flag. Used by the admin
/// trigger surface and the one-shot CLI.
pub async fn run_job_once(ctx: &EngineCtx, job: Job) -> Result<String> {
    let settings = ctx.store.runtime_settings(&ctx.env.settings).await?;
    match job {
        Job::Flywheel => {
            let summary = scheduler::run_flywheel_tick(ctx, &settings, false).await?;
            Ok(format!("{summary:?}"))
        }
        Job::TurboFlywheel => {
            let summary = scheduler::run_flywheel_tick(ctx, &settings, true).await?;
            Ok(format!("{summary:?}"))
        }
        Job::Claim => {
            let summary = claimer::run_claim_cycle(ctx, &settings).await?;
            Ok(format!("{summary:?}"))
        }
        Job::DepositMonitor => {
            let summary = monitor::run_deposit_tick(ctx).await?;
            Ok(format!("{summary:?}"))
        }
    }
}

/// Spawn every ticker. Tasks exit when the shutdown channel fires; the
/// returned set is drained (bounded) by the caller.
pub fn spawn_jobs(
    ctx: EngineCtx,
    shutdown: broadcast::Sender<()>,
    mut triggers: mpsc::Receiver<Job>,
) -> JoinSet<()> {
    let mut tasks = JoinSet::new();

    // Fleet scheduler (everything except turbo tokens).
    {
        let ctx = ctx.clone();
        let mut rx = shutdown.subscribe();
        tasks.spawn(async move {
            loop {
                let settings = match ctx.store.runtime_settings(&ctx.env.settings).await {
                    Ok(s) => s,
                    Err(e) => {
                        error!(error = %e, "reading runtime settings");
                        ctx.env.settings.clone()
                    }
                };
                let period =
                    Duration::from_secs(settings.flywheel_interval_minutes.max(1) * 60);
                tokio::select! {
                    _ = rx.recv() => break,
                    _ = tokio::time::sleep(period) => {}
                }
                if !settings.multi_user_flywheel_enabled {
                    continue;
                }
                match scheduler::run_flywheel_tick(&ctx, &settings, false).await {
                    Ok(summary) => info!(?summary, "flywheel tick"),
                    Err(e) => error!(error = %e, "flywheel tick failed"),
                }
            }
            info!("flywheel ticker stopped");
        });
    }

    // Turbo scan: short fixed period, per-token intervals gate inside.
    {
        let ctx = ctx.clone();
        let mut rx = shutdown.subscribe();
        tasks.spawn(async move {
            loop {
                tokio::select! {
                    _ = rx.recv() => break,
                    _ = tokio::time::sleep(TURBO_SCAN_PERIOD) => {}
                }
                let Ok(settings) = ctx.store.runtime_settings(&ctx.env.settings).await else {
                    continue;
                };
                if !settings.multi_user_flywheel_enabled {
                    continue;
                }
                if let Err(e) = scheduler::run_flywheel_tick(&ctx, &settings, true).await {
                    error!(error = %e, "turbo tick failed");
                }
            }
            info!("turbo ticker stopped");
        });
    }

    // Reward claim engine.
    {
        let ctx = ctx.clone();
        let mut rx = shutdown.subscribe();
        tasks.spawn(async move {
            loop {
                let settings = match ctx.store.runtime_settings(&ctx.env.settings).await {
                    Ok(s) => s,
                    Err(_) => ctx.env.settings.clone(),
                };
                let period = Duration::from_secs(settings.fast_claim_interval_seconds.max(5));
                tokio::select! {
                    _ = rx.recv() => break,
                    _ = tokio::time::sleep(period) => {}
                }
                if !settings.fast_claim_job_enabled {
                    continue;
                }
                match claimer::run_claim_cycle(&ctx, &settings).await {
                    Ok(summary) => info!(?summary, "claim cycle"),
                    Err(e) => error!(error = %e, "claim cycle failed"),
                }
            }
            info!("claim ticker stopped");
        });
    }

    // Deposit/activation monitor.
    {
        let ctx = ctx.clone();
        let mut rx = shutdown.subscribe();
        tasks.spawn(async move {
            loop {
                tokio::select! {
                    _ = rx.recv() => break,
                    _ = tokio::time::sleep(MONITOR_PERIOD) => {}
                }
                let Ok(settings) = ctx.store.runtime_settings(&ctx.env.settings).await else {
                    continue;
                };
                if !settings.deposit_monitor_enabled {
                    continue;
                }
                match monitor::run_deposit_tick(&ctx).await {
                    Ok(summary) => {
                        if summary.activated > 0 || summary.expired > 0 {
                            info!(?summary, "deposit monitor tick");
                        }
                    }
                    Err(e) => error!(error = %e, "deposit monitor tick failed"),
                }
            }
            info!("deposit monitor stopped");
        });
    }

    // Balance refresher.
    {
        let ctx = ctx.clone();
        let mut rx = shutdown.subscribe();
        tasks.spawn(async move {
            loop {
                tokio::select! {
                    _ = rx.recv() => break,
                    _ = tokio::time::sleep(REFRESHER_PERIOD) => {}
                }
                let Ok(settings) = ctx.store.runtime_settings(&ctx.env.settings).await else {
                    continue;
                };
                if settings.balance_update_job_enabled {
                    ctx.balances.refresh_stale().await;
                }
            }
            info!("balance refresher stopped");
        });
    }

    // One-shot triggers from the admin surface.
    {
        let ctx = ctx.clone();
        let mut rx = shutdown.subscribe();
        tasks.spawn(async move {
            loop {
                tokio::select! {
                    _ = rx.recv() => break,
                    job = triggers.recv() => {
                        let Some(job) = job else { break };
                        info!(job = job.as_str(), "manual trigger");
                        match run_job_once(&ctx, job).await {
                            Ok(summary) => info!(job = job.as_str(), summary, "trigger complete"),
                            Err(e) => warn!(job = job.as_str(), error = %e, "trigger failed"),
                        }
                    }
                }
            }
        });
    }

    tasks
}
