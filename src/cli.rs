use clap::{Parser, Subcommand};

/// Autonomous market-making engine for launch-platform tokens:
/// per-token buy/sell cycles, reward harvesting with fee splits, and
/// deposit-triggered activation.
#[derive(Parser)]
#[command(name = "flywheel", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the engine: fleet scheduler, claim engine, deposit monitor,
    /// and the admin/lifecycle API
    Run {
        /// Bind host for the API (overrides API_HOST)
        #[arg(long)]
        host: Option<String>,

        /// Bind port for the API (overrides API_PORT)
        #[arg(long)]
        port: Option<u16>,
    },

    /// Run one tick of a job, then exit
    /// (flywheel | turbo_flywheel | claim | deposit_monitor)
    Tick {
        /// Job name
        job: String,
    },

    /// Validate environment configuration and exit
    CheckConfig,
}
