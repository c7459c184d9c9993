use anyhow::Result;
use rusqlite::params;

use crate::config::RuntimeSettings;
use crate::model::amount::sol_to_lamports;

use super::Store;

impl Store {
    /// The runtime-observable settings: env defaults with any admin
    /// overrides from the `platform_config` table merged on top. Jobs
    /// call this at the start of every tick so toggles take effect
    /// without a restart.
    pub async fn runtime_settings(&self, defaults: &RuntimeSettings) -> Result<RuntimeSettings> {
        let conn = self.conn().await;
        let mut stmt = conn.prepare("SELECT key, value FROM platform_config")?;
        let overrides: Vec<(String, String)> = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut settings = defaults.clone();
        for (key, value) in overrides {
            apply_override(&mut settings, &key, &value);
        }
        Ok(settings)
    }

    pub async fn set_platform_setting(&self, key: &str, value: &str) -> Result<()> {
        let conn = self.conn().await;
        conn.execute(
            "INSERT INTO platform_config (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )?;
        Ok(())
    }

    pub async fn platform_overrides(&self) -> Result<Vec<(String, String)>> {
        let conn = self.conn().await;
        let mut stmt =
            conn.prepare("SELECT key, value FROM platform_config ORDER BY key")?;
        let rows = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }
}

fn apply_override(settings: &mut RuntimeSettings, key: &str, value: &str) {
    match key {
        "platform_fee_percentage" => {
            if let Ok(v) = value.parse::<f64>() {
                if (0.0..=100.0).contains(&v) {
                    settings.platform_fee_percentage = v;
                }
            }
        }
        "fast_claim_threshold" => {
            if let Ok(v) = value.parse::<f64>() {
                settings.fast_claim_threshold_lamports = sol_to_lamports(v);
            }
        }
        "platform_claim_threshold" => {
            if let Ok(v) = value.parse::<f64>() {
                settings.platform_claim_threshold_lamports = sol_to_lamports(v);
            }
        }
        "fast_claim_interval_seconds" => {
            if let Ok(v) = value.parse() {
                settings.fast_claim_interval_seconds = v;
            }
        }
        "max_trades_per_minute" => {
            if let Ok(v) = value.parse::<u32>() {
                if v > 0 {
                    settings.max_trades_per_minute = v;
                }
            }
        }
        "flywheel_interval_minutes" => {
            if let Ok(v) = value.parse::<u64>() {
                if v > 0 {
                    settings.flywheel_interval_minutes = v;
                }
            }
        }
        "fast_claim_job_enabled" => {
            if let Ok(v) = value.parse() {
                settings.fast_claim_job_enabled = v;
            }
        }
        "multi_user_flywheel_enabled" => {
            if let Ok(v) = value.parse() {
                settings.multi_user_flywheel_enabled = v;
            }
        }
        "deposit_monitor_enabled" => {
            if let Ok(v) = value.parse() {
                settings.deposit_monitor_enabled = v;
            }
        }
        "balance_update_job_enabled" => {
            if let Ok(v) = value.parse() {
                settings.balance_update_job_enabled = v;
            }
        }
        _ => {}
    }
}

/// Keys the admin surface may write. Anything else is rejected at the
/// API boundary.
pub const OVERRIDABLE_KEYS: &[&str] = &[
    "platform_fee_percentage",
    "fast_claim_threshold",
    "platform_claim_threshold",
    "fast_claim_interval_seconds",
    "max_trades_per_minute",
    "flywheel_interval_minutes",
    "fast_claim_job_enabled",
    "multi_user_flywheel_enabled",
    "deposit_monitor_enabled",
    "balance_update_job_enabled",
];
