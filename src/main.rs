use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::{broadcast, mpsc};
use tracing::error;
use tracing_subscriber::EnvFilter;

use solwire::{LocalSigner, RemoteSigner, RpcClient, SwapClient};

use flywheel::api;
use flywheel::cache::{BalanceCache, PriceCache, RpcReader};
use flywheel::config::PlatformConfig;
use flywheel::engine::{self, EngineCtx, LiveSdk, TokenLocks, TradeBudget};
use flywheel::gateway::SignerGateway;
use flywheel::notify::{LogNotifier, Notifier, WebhookNotifier};
use flywheel::report::Reporter;
use flywheel::store::Store;

mod cli;

const SHUTDOWN_DRAIN: Duration = Duration::from_secs(30);

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = cli::Cli::parse();
    std::process::exit(run(cli));
}

fn run(cli: cli::Cli) -> i32 {
    // Configuration failures refuse to start.
    let env = match PlatformConfig::from_env() {
        Ok(env) => Arc::new(env),
        Err(e) => {
            eprintln!("configuration error: {e:#}");
            return 1;
        }
    };

    if matches!(cli.command, cli::Command::CheckConfig) {
        println!("configuration ok");
        println!("  rpc:        {}", env.rpc_url);
        println!("  signer:     {}", env.signer_url);
        println!("  swap api:   {}", env.swap_api_url);
        println!("  database:   {}", env.db_path.display());
        println!("  price srcs: {}", env.price_sources.len());
        return 0;
    }

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("failed to start runtime: {e}");
            return 2;
        }
    };

    match cli.command {
        cli::Command::Run { host, port } => {
            let host = host.unwrap_or_else(|| env.api_host.clone());
            let port = port.unwrap_or(env.api_port);
            match rt.block_on(run_daemon(env, host, port)) {
                Ok(()) => 0,
                Err(e) => {
                    error!(error = format!("{e:#}"), "fatal runtime failure");
                    2
                }
            }
        }
        cli::Command::Tick { job } => {
            let result = rt.block_on(async {
                let ctx = build_ctx(env)?;
                let job = job.parse()?;
                engine::run_job_once(&ctx, job).await
            });
            match result {
                Ok(summary) => {
                    println!("{summary}");
                    0
                }
                Err(e) => {
                    eprintln!("tick failed: {e:#}");
                    2
                }
            }
        }
        cli::Command::CheckConfig => unreachable!("handled above"),
    }
}

fn build_ctx(env: Arc<PlatformConfig>) -> Result<EngineCtx> {
    let store = Store::open(&env.db_path).context("opening state store")?;

    let mut rpc = RpcClient::new(env.rpc_url.clone()).context("building rpc client")?;
    if let Some(key) = &env.rpc_api_key {
        rpc = rpc.with_api_key(key.clone());
    }
    let rpc = Arc::new(rpc);

    let reader = Arc::new(RpcReader::new(rpc.clone()));
    let balances = Arc::new(BalanceCache::new(reader.clone()));
    let prices = Arc::new(PriceCache::new(env.price_sources.clone())?);

    let remote = RemoteSigner::new(
        env.signer_url.clone(),
        env.signer_app_id.clone(),
        &env.signer_app_secret,
        env.signer_authorization_key.clone(),
    )
    .context("building remote signer")?;

    let local = match &env.platform_wallet_secret {
        Some(secret) => Some(Arc::new(
            LocalSigner::from_base58_secret(secret).context("loading platform wallet key")?,
        )),
        None => None,
    };

    let gateway = Arc::new(SignerGateway::new(rpc, remote, local));
    let sdk = Arc::new(LiveSdk::new(
        SwapClient::new(env.swap_api_url.clone()).context("building swap client")?,
    ));

    let notifier: Arc<dyn Notifier> = match &env.notify_webhook_url {
        Some(url) => Arc::new(WebhookNotifier::new(url.clone())?),
        None => Arc::new(LogNotifier),
    };

    Ok(EngineCtx {
        store,
        balances,
        prices,
        reader,
        gateway,
        sdk,
        reporter: Arc::new(Reporter::default()),
        notifier,
        locks: TokenLocks::new(),
        budget: Arc::new(TradeBudget::new()),
        env,
        claim_failstreaks: Arc::new(StdMutex::new(HashMap::new())),
    })
}

async fn run_daemon(env: Arc<PlatformConfig>, host: String, port: u16) -> Result<()> {
    let ctx = build_ctx(env)?;

    println!("=== flywheel ===");
    println!("Database: {}", ctx.env.db_path.display());
    println!("RPC:      {}", ctx.env.rpc_url);
    println!();

    let (shutdown_tx, _) = broadcast::channel::<()>(4);
    let (trigger_tx, trigger_rx) = mpsc::channel(16);

    let mut tasks = engine::spawn_jobs(ctx.clone(), shutdown_tx.clone(), trigger_rx);

    let api_state = api::AppState::new(ctx, trigger_tx);
    let api_shutdown = shutdown_tx.clone();
    let api_task = tokio::spawn(async move {
        api::serve(api_state, &host, port, api_shutdown).await
    });

    tokio::signal::ctrl_c()
        .await
        .context("listening for shutdown signal")?;
    println!("shutdown requested; draining in-flight work (up to 30s)");
    let _ = shutdown_tx.send(());

    // Cease new ticks, let in-flight steps finish, then go.
    let drain = async {
        while tasks.join_next().await.is_some() {}
    };
    if tokio::time::timeout(SHUTDOWN_DRAIN, drain).await.is_err() {
        error!("drain window elapsed with work still in flight");
    }

    match tokio::time::timeout(Duration::from_secs(5), api_task).await {
        Ok(Ok(Ok(()))) => {}
        Ok(Ok(Err(e))) => return Err(e),
        Ok(Err(join_err)) => return Err(anyhow::anyhow!("API task panicked: {join_err}")),
        Err(_) => {}
    }

    println!("clean shutdown");
    Ok(())
}
