pub mod amount;
pub mod claim;
pub mod cycle;
pub mod pending;
pub mod token;
pub mod token_config;
pub mod trade;

pub use amount::{lamports_to_sol, sol_to_lamports, LAMPORTS_PER_SOL};
pub use claim::Claim;
pub use cycle::{CycleState, Phase};
pub use pending::{PendingActivation, PendingKind, PendingPayload, PendingStatus};
pub use token::{Owner, Token, TokenSource, Wallet, WalletRole};
pub use token_config::{AlgoParams, Algorithm, TokenConfig};
pub use trade::{Trade, TradeSide, TradeStatus};
