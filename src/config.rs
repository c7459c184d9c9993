use std::path::PathBuf;

use anyhow::{bail, Context, Result};

use crate::model::amount::sol_to_lamports;

/// Process-wide configuration resolved from the environment once at
/// startup. Anything malformed here refuses to start (exit code 1).
/// Runtime-mutable settings are merged over these defaults from the
/// `platform_config` table; see [`RuntimeSettings`].
#[derive(Debug, Clone)]
pub struct PlatformConfig {
    // Upstream chain access
    pub rpc_url: String,
    pub rpc_ws_url: Option<String>,
    pub rpc_api_key: Option<String>,

    // Delegated signing service
    pub signer_url: String,
    pub signer_app_id: String,
    pub signer_app_secret: String,
    pub signer_authorization_key: String,

    // Trading/launch-platform SDK and price feeds
    pub swap_api_url: String,
    /// Ordered `name=url` price sources, first match wins.
    pub price_sources: Vec<(String, String)>,

    pub settings: RuntimeSettings,

    // Platform self-trade wheel
    pub wheel_min_buy_lamports: u64,
    pub wheel_max_buy_lamports: u64,
    pub platform_ops_wallet: Option<String>,
    /// Base58 secret for the platform's locally-keyed wallet.
    pub platform_wallet_secret: Option<String>,

    // Admin API
    pub admin_allowed_keys: Vec<String>,

    pub notify_webhook_url: Option<String>,
    pub db_path: PathBuf,
    pub api_host: String,
    pub api_port: u16,
}

/// The runtime-observable subset: job switches and tunables the Admin
/// Control Plane may override while the process runs.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RuntimeSettings {
    pub platform_fee_percentage: f64,
    pub fast_claim_threshold_lamports: u64,
    pub platform_claim_threshold_lamports: u64,
    pub fast_claim_interval_seconds: u64,
    pub max_trades_per_minute: u32,
    pub flywheel_interval_minutes: u64,
    pub fast_claim_job_enabled: bool,
    pub multi_user_flywheel_enabled: bool,
    pub deposit_monitor_enabled: bool,
    pub balance_update_job_enabled: bool,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        RuntimeSettings {
            platform_fee_percentage: 10.0,
            fast_claim_threshold_lamports: sol_to_lamports(0.15),
            platform_claim_threshold_lamports: sol_to_lamports(0.05),
            fast_claim_interval_seconds: 30,
            max_trades_per_minute: 30,
            flywheel_interval_minutes: 1,
            fast_claim_job_enabled: true,
            multi_user_flywheel_enabled: true,
            deposit_monitor_enabled: true,
            balance_update_job_enabled: true,
        }
    }
}

impl PlatformConfig {
    pub fn from_env() -> Result<Self> {
        let rpc_url = require("RPC_URL")?;
        let signer_url = require("SIGNER_URL")?;
        let signer_app_id = require("SIGNER_APP_ID")?;
        let signer_app_secret = require("SIGNER_APP_SECRET")?;
        let signer_authorization_key = require("SIGNER_AUTHORIZATION_KEY")?;
        let swap_api_url = require("SWAP_API_URL")?;

        let price_sources = parse_price_sources(
            &std::env::var("PRICE_SOURCE_URLS").unwrap_or_default(),
        )?;
        if price_sources.is_empty() {
            bail!("PRICE_SOURCE_URLS must list at least one name=url source");
        }

        let settings = RuntimeSettings {
            platform_fee_percentage: env_f64("PLATFORM_FEE_PERCENTAGE", 10.0)?,
            fast_claim_threshold_lamports: env_sol("FAST_CLAIM_THRESHOLD", 0.15)?,
            platform_claim_threshold_lamports: env_sol("PLATFORM_CLAIM_THRESHOLD", 0.05)?,
            fast_claim_interval_seconds: env_u64("FAST_CLAIM_INTERVAL_SECONDS", 30)?,
            max_trades_per_minute: env_u64("MAX_TRADES_PER_MINUTE", 30)? as u32,
            flywheel_interval_minutes: env_u64("FLYWHEEL_INTERVAL_MINUTES", 1)?,
            fast_claim_job_enabled: env_bool("FAST_CLAIM_JOB_ENABLED", true)?,
            multi_user_flywheel_enabled: env_bool("MULTI_USER_FLYWHEEL_ENABLED", true)?,
            deposit_monitor_enabled: env_bool("DEPOSIT_MONITOR_ENABLED", true)?,
            balance_update_job_enabled: env_bool("BALANCE_UPDATE_JOB_ENABLED", true)?,
        };

        if !(0.0..=100.0).contains(&settings.platform_fee_percentage) {
            bail!(
                "PLATFORM_FEE_PERCENTAGE must be 0-100, got {}",
                settings.platform_fee_percentage
            );
        }
        if settings.max_trades_per_minute == 0 {
            bail!("MAX_TRADES_PER_MINUTE must be at least 1");
        }

        let wheel_min_buy_lamports = env_sol("WHEEL_MIN_BUY", 0.01)?;
        let wheel_max_buy_lamports = env_sol("WHEEL_MAX_BUY", 0.05)?;
        if wheel_min_buy_lamports > wheel_max_buy_lamports {
            bail!("WHEEL_MIN_BUY must not exceed WHEEL_MAX_BUY");
        }

        let admin_allowed_keys: Vec<String> = std::env::var("ADMIN_ALLOWED_KEYS")
            .unwrap_or_default()
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let db_path = match std::env::var("FLYWHEEL_DB") {
            Ok(path) => PathBuf::from(path),
            Err(_) => dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".flywheel")
                .join("flywheel.db"),
        };

        Ok(PlatformConfig {
            rpc_url,
            rpc_ws_url: optional("RPC_WS_URL"),
            rpc_api_key: optional("RPC_API_KEY"),
            signer_url,
            signer_app_id,
            signer_app_secret,
            signer_authorization_key,
            swap_api_url,
            price_sources,
            settings,
            wheel_min_buy_lamports,
            wheel_max_buy_lamports,
            platform_ops_wallet: optional("PLATFORM_OPS_WALLET"),
            platform_wallet_secret: optional("PLATFORM_WALLET_SECRET"),
            admin_allowed_keys,
            notify_webhook_url: optional("NOTIFY_WEBHOOK_URL"),
            db_path,
            api_host: optional("API_HOST").unwrap_or_else(|| "127.0.0.1".to_string()),
            api_port: env_u64("API_PORT", 8787)? as u16,
        })
    }
}

fn require(name: &str) -> Result<String> {
    match std::env::var(name) {
        Ok(v) if !v.trim().is_empty() => Ok(v),
        _ => bail!("missing required environment variable {name}"),
    }
}

fn optional(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn env_u64(name: &str, default: u64) -> Result<u64> {
    match std::env::var(name) {
        Ok(v) => v
            .trim()
            .parse()
            .with_context(|| format!("{name} must be an integer, got '{v}'")),
        Err(_) => Ok(default),
    }
}

fn env_f64(name: &str, default: f64) -> Result<f64> {
    match std::env::var(name) {
        Ok(v) => v
            .trim()
            .parse()
            .with_context(|| format!("{name} must be a number, got '{v}'")),
        Err(_) => Ok(default),
    }
}

fn env_sol(name: &str, default_sol: f64) -> Result<u64> {
    Ok(sol_to_lamports(env_f64(name, default_sol)?))
}

fn env_bool(name: &str, default: bool) -> Result<bool> {
    match std::env::var(name) {
        Ok(v) => match v.trim().to_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            other => bail!("{name} must be a boolean, got '{other}'"),
        },
        Err(_) => Ok(default),
    }
}

fn parse_price_sources(raw: &str) -> Result<Vec<(String, String)>> {
    let mut sources = Vec::new();
    for entry in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let Some((name, url)) = entry.split_once('=') else {
            bail!("price source entry '{entry}' is not name=url");
        };
        sources.push((name.trim().to_string(), url.trim().to_string()));
    }
    Ok(sources)
}
