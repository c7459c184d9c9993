//! Shared fixtures: an in-memory ledger standing in for the chain, and
//! scripted implementations of the chain-reader, trade-SDK, and gateway
//! seams.

use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex};

use anyhow::Result;
use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use serde_json::{json, Value};

use flywheel::cache::{BalanceCache, ChainReader, PriceCache};
use flywheel::config::{PlatformConfig, RuntimeSettings};
use flywheel::engine::{EngineCtx, TokenLocks, TradeBudget, TradeSdk, NATIVE_MINT, NATIVE_SYMBOL};
use flywheel::gateway::{Confirmation, Gateway, SubmitError, WalletRef};
use flywheel::model::{Algorithm, TokenSource};
use flywheel::notify::{LogNotifier, Notifier};
use flywheel::report::Reporter;
use flywheel::store::{RegisterTokenSpec, Store, TokenRow};

use solwire::{ClaimablePosition, SwapQuote, UnsignedTransaction};

pub const PLATFORM_OPS: &str = "PLATFORMopsWALLETxxxxxxxxxxxxxxxxxxxxxxxxx";

// ── Ledger ──────────────────────────────────────────────────────────

/// In-memory stand-in for on-chain state. Swaps settle 1:1 between
/// lamports and raw token units, which keeps cycle math easy to assert.
#[derive(Default)]
pub struct Ledger {
    pub native: HashMap<String, u64>,
    pub token: HashMap<(String, String), u64>,
    /// (dev wallet, mint) → accumulated creator fees.
    pub claimable: HashMap<(String, String), u64>,
}

impl Ledger {
    pub fn native_of(&self, wallet: &str) -> u64 {
        self.native.get(wallet).copied().unwrap_or(0)
    }

    pub fn token_of(&self, wallet: &str, mint: &str) -> u64 {
        self.token
            .get(&(wallet.to_string(), mint.to_string()))
            .copied()
            .unwrap_or(0)
    }
}

pub struct MockChain {
    pub ledger: Arc<StdMutex<Ledger>>,
}

#[async_trait]
impl ChainReader for MockChain {
    async fn native_balance(&self, address: &str) -> Result<u64> {
        Ok(self.ledger.lock().unwrap().native_of(address))
    }

    async fn token_balance(&self, address: &str, mint: &str) -> Result<u64> {
        Ok(self.ledger.lock().unwrap().token_of(address, mint))
    }
}

// ── Scripted SDK ────────────────────────────────────────────────────

/// Builds transactions whose payload is JSON describing the intended
/// effect; the mock gateway decodes and applies it on confirmation.
pub struct MockSdk {
    pub ledger: Arc<StdMutex<Ledger>>,
    pub builds: AtomicU64,
    pub claim_builds: AtomicU64,
}

impl MockSdk {
    pub fn new(ledger: Arc<StdMutex<Ledger>>) -> Self {
        MockSdk {
            ledger,
            builds: AtomicU64::new(0),
            claim_builds: AtomicU64::new(0),
        }
    }

    fn wrap(&self, payload: Value) -> UnsignedTransaction {
        let n = self.builds.fetch_add(1, Ordering::SeqCst);
        UnsignedTransaction {
            tx_base64: general_purpose::STANDARD.encode(payload.to_string()),
            recent_blockhash: format!("hash-{n}"),
            last_valid_block_height: 1_000 + n,
        }
    }
}

#[async_trait]
impl TradeSdk for MockSdk {
    async fn quote(
        &self,
        input_mint: &str,
        output_mint: &str,
        amount: u64,
        slippage_bps: u32,
    ) -> Result<SwapQuote> {
        Ok(SwapQuote {
            input_mint: input_mint.to_string(),
            output_mint: output_mint.to_string(),
            in_amount: amount.to_string(),
            out_amount: amount.to_string(),
            slippage_bps,
            route_plan: Value::Null,
        })
    }

    async fn build_swap(&self, quote: &SwapQuote, user: &str) -> Result<UnsignedTransaction> {
        Ok(self.wrap(json!({
            "kind": "swap",
            "in_mint": quote.input_mint,
            "out_mint": quote.output_mint,
            "amount": quote.in_amount.parse::<u64>().unwrap_or(0),
            "user": user,
        })))
    }

    async fn list_claimable(&self, wallet: &str) -> Result<Vec<ClaimablePosition>> {
        let ledger = self.ledger.lock().unwrap();
        Ok(ledger
            .claimable
            .iter()
            .filter(|((w, _), amount)| w == wallet && **amount > 0)
            .map(|((_, mint), amount)| ClaimablePosition {
                mint: mint.clone(),
                claimable_lamports: *amount,
            })
            .collect())
    }

    async fn build_claim_txs(
        &self,
        wallet: &str,
        mints: &[String],
    ) -> Result<Vec<UnsignedTransaction>> {
        self.claim_builds.fetch_add(1, Ordering::SeqCst);
        Ok(vec![self.wrap(json!({
            "kind": "claim",
            "wallet": wallet,
            "mints": mints,
        }))])
    }

    async fn build_transfer(
        &self,
        from: &str,
        to: &str,
        lamports: u64,
    ) -> Result<UnsignedTransaction> {
        Ok(self.wrap(json!({
            "kind": "transfer",
            "from": from,
            "to": to,
            "lamports": lamports,
        })))
    }
}

// ── Scripted gateway ────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct Submission {
    pub wallet: String,
    pub context: String,
    pub blockhash: String,
}

pub struct MockGateway {
    pub ledger: Arc<StdMutex<Ledger>>,
    pub submissions: StdMutex<Vec<Submission>>,
    pub fail_queue: StdMutex<VecDeque<SubmitError>>,
    pub sequence: AtomicU64,
}

impl MockGateway {
    pub fn new(ledger: Arc<StdMutex<Ledger>>) -> Self {
        MockGateway {
            ledger,
            submissions: StdMutex::new(Vec::new()),
            fail_queue: StdMutex::new(VecDeque::new()),
            sequence: AtomicU64::new(0),
        }
    }

    pub fn inject_failure(&self, error: SubmitError) {
        self.fail_queue.lock().unwrap().push_back(error);
    }

    pub fn submission_count(&self) -> usize {
        self.submissions.lock().unwrap().len()
    }

    fn apply(&self, payload: &Value) {
        let mut ledger = self.ledger.lock().unwrap();
        match payload["kind"].as_str() {
            Some("swap") => {
                let user = payload["user"].as_str().unwrap_or_default().to_string();
                let in_mint = payload["in_mint"].as_str().unwrap_or_default();
                let out_mint = payload["out_mint"].as_str().unwrap_or_default().to_string();
                let amount = payload["amount"].as_u64().unwrap_or(0);
                if in_mint == NATIVE_MINT {
                    // Buy: spend native, receive tokens 1:1.
                    let native = ledger.native.entry(user.clone()).or_insert(0);
                    *native = native.saturating_sub(amount);
                    *ledger.token.entry((user, out_mint)).or_insert(0) += amount;
                } else {
                    // Sell: spend tokens, receive native 1:1.
                    let held = ledger
                        .token
                        .entry((user.clone(), in_mint.to_string()))
                        .or_insert(0);
                    *held = held.saturating_sub(amount);
                    *ledger.native.entry(user).or_insert(0) += amount;
                }
            }
            Some("transfer") => {
                let from = payload["from"].as_str().unwrap_or_default().to_string();
                let to = payload["to"].as_str().unwrap_or_default().to_string();
                let lamports = payload["lamports"].as_u64().unwrap_or(0);
                let src = ledger.native.entry(from).or_insert(0);
                *src = src.saturating_sub(lamports);
                *ledger.native.entry(to).or_insert(0) += lamports;
            }
            Some("claim") => {
                let wallet = payload["wallet"].as_str().unwrap_or_default().to_string();
                let mut credited = 0u64;
                if let Some(mints) = payload["mints"].as_array() {
                    for mint in mints {
                        let key = (wallet.clone(), mint.as_str().unwrap_or("").to_string());
                        if let Some(amount) = ledger.claimable.get_mut(&key) {
                            credited += *amount;
                            *amount = 0;
                        }
                    }
                }
                *ledger.native.entry(wallet).or_insert(0) += credited;
            }
            _ => {}
        }
    }
}

#[async_trait]
impl Gateway for MockGateway {
    async fn submit(
        &self,
        wallet: &WalletRef,
        tx: &UnsignedTransaction,
        context: &str,
    ) -> Result<Confirmation, SubmitError> {
        self.submissions.lock().unwrap().push(Submission {
            wallet: wallet.address.clone(),
            context: context.to_string(),
            blockhash: tx.recent_blockhash.clone(),
        });

        if let Some(error) = self.fail_queue.lock().unwrap().pop_front() {
            return Err(error);
        }

        let decoded = general_purpose::STANDARD
            .decode(&tx.tx_base64)
            .map_err(|e| SubmitError::SendFailed(e.to_string()))?;
        let payload: Value = serde_json::from_slice(&decoded)
            .map_err(|e| SubmitError::SendFailed(e.to_string()))?;
        self.apply(&payload);

        let n = self.sequence.fetch_add(1, Ordering::SeqCst);
        Ok(Confirmation {
            signature: format!("sig-{n}"),
            confirmed_slot: 10_000 + n,
        })
    }
}

// ── Harness ─────────────────────────────────────────────────────────

pub struct Harness {
    pub ctx: EngineCtx,
    pub ledger: Arc<StdMutex<Ledger>>,
    pub gateway: Arc<MockGateway>,
    pub sdk: Arc<MockSdk>,
    pub settings: RuntimeSettings,
}

pub fn test_env() -> PlatformConfig {
    PlatformConfig {
        rpc_url: "http://localhost:1".into(),
        rpc_ws_url: None,
        rpc_api_key: None,
        signer_url: "http://localhost:1".into(),
        signer_app_id: "test-app".into(),
        signer_app_secret: "test-secret".into(),
        signer_authorization_key: "test-auth".into(),
        swap_api_url: "http://localhost:1".into(),
        price_sources: vec![],
        settings: RuntimeSettings::default(),
        wheel_min_buy_lamports: 10_000_000,
        wheel_max_buy_lamports: 50_000_000,
        platform_ops_wallet: Some(PLATFORM_OPS.to_string()),
        platform_wallet_secret: None,
        admin_allowed_keys: vec![],
        notify_webhook_url: None,
        db_path: PathBuf::from(":memory:"),
        api_host: "127.0.0.1".into(),
        api_port: 0,
    }
}

pub async fn harness() -> Harness {
    let ledger: Arc<StdMutex<Ledger>> = Arc::new(StdMutex::new(Ledger::default()));
    let store = Store::open_in_memory().expect("in-memory store");

    let reader = Arc::new(MockChain {
        ledger: ledger.clone(),
    });
    let balances = Arc::new(BalanceCache::new(reader.clone()));
    let prices = Arc::new(PriceCache::new(vec![]).expect("price cache"));
    prices.seed(NATIVE_SYMBOL, 150.0).await;

    let gateway = Arc::new(MockGateway::new(ledger.clone()));
    let sdk = Arc::new(MockSdk::new(ledger.clone()));
    let notifier: Arc<dyn Notifier> = Arc::new(LogNotifier);

    let env = Arc::new(test_env());
    let settings = env.settings.clone();

    let ctx = EngineCtx {
        store,
        balances,
        prices,
        reader,
        gateway: gateway.clone(),
        sdk: sdk.clone(),
        reporter: Arc::new(Reporter::default()),
        notifier,
        locks: TokenLocks::new(),
        budget: Arc::new(TradeBudget::new()),
        env,
        claim_failstreaks: Arc::new(StdMutex::new(HashMap::new())),
    };

    Harness {
        ctx,
        ledger,
        gateway,
        sdk,
        settings,
    }
}

/// Register a token with the standard defaults and return its row.
pub async fn register_token(
    ctx: &EngineCtx,
    mint: &str,
    symbol: &str,
    source: TokenSource,
    algorithm: Algorithm,
) -> TokenRow {
    let spec = RegisterTokenSpec {
        owner_handle: format!("owner-{symbol}"),
        mint: mint.to_string(),
        symbol: symbol.to_string(),
        decimals: 6,
        source,
        algorithm,
        dev_wallet_address: format!("{mint}-dev"),
        dev_signer_handle: Some(format!("{mint}-dev-handle")),
        ops_wallet_address: format!("{mint}-ops"),
        ops_signer_handle: Some(format!("{mint}-ops-handle")),
    };
    ctx.store.register_token(&spec).await.expect("register token");
    ctx.store
        .token_row_by_mint(mint)
        .await
        .expect("load token row")
        .expect("token row present")
}

pub fn fund_native(ledger: &Arc<StdMutex<Ledger>>, wallet: &str, lamports: u64) {
    ledger
        .lock()
        .unwrap()
        .native
        .insert(wallet.to_string(), lamports);
}

pub fn fund_token(ledger: &Arc<StdMutex<Ledger>>, wallet: &str, mint: &str, raw: u64) {
    ledger
        .lock()
        .unwrap()
        .token
        .insert((wallet.to_string(), mint.to_string()), raw);
}

pub fn set_claimable(ledger: &Arc<StdMutex<Ledger>>, wallet: &str, mint: &str, lamports: u64) {
    ledger
        .lock()
        .unwrap()
        .claimable
        .insert((wallet.to_string(), mint.to_string()), lamports);
}
