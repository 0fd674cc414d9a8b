//! Test doubles for the engine, loader and metadata store
//!
//! The mock engine keeps everything in memory; the mock loader only touches
//! the filesystem to create and detect the wallet data directory.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::oneshot::error::TryRecvError;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

use super::WalletManager;
use crate::core::config::WalletManagerConfig;
use crate::core::engine::{
    AccountProperties, AccountResult, AccountsResult, EngineBalances, EngineError, LoaderFactory,
    RelockReceiver, WalletEngine, WalletLoader, INSECURE_PUBLIC_PASSPHRASE,
};
use crate::core::wallet::Wallet;
use crate::core::wallet_info::{PassphraseType, WalletRecord};
use crate::storage::{MemoryMetadataStore, MetadataStore, RecordField, StoreError};

/// Valid 12-word BIP-39 mnemonic.
pub const TEST_SEED: &str =
    "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

/// File the mock loader drops into a created wallet directory.
pub const WALLET_MARKER: &str = "wallet.db";

struct MockAccount {
    properties: AccountProperties,
    balances: EngineBalances,
}

struct EngineState {
    private_passphrase: Vec<u8>,
    public_passphrase: Vec<u8>,
    locked: bool,
    pending_relock: Option<RelockReceiver>,
    relock_count: usize,
    accounts: BTreeMap<u32, MockAccount>,
    failing_balances: HashSet<u32>,
    block_hash: [u8; 32],
    block_height: i32,
}

impl EngineState {
    /// Applies a fired (or abandoned) relock token.
    fn settle_relock(&mut self) {
        let fired = match self.pending_relock.as_mut().map(|rx| rx.try_recv()) {
            Some(Ok(())) | Some(Err(TryRecvError::Closed)) => true,
            Some(Err(TryRecvError::Empty)) | None => false,
        };
        if fired {
            self.pending_relock = None;
            self.locked = true;
            self.relock_count += 1;
        }
    }

    fn account(&self, number: u32) -> Result<&MockAccount, EngineError> {
        self.accounts
            .get(&number)
            .ok_or_else(|| EngineError::NotExist(format!("account {}", number)))
    }

    fn number_of(&self, name: &str) -> Option<u32> {
        self.accounts
            .values()
            .find(|a| a.properties.account_name == name)
            .map(|a| a.properties.account_number)
    }

    fn insert_account(&mut self, name: &str, external: u32, internal: u32, imported: u32) -> u32 {
        let number = self.accounts.keys().next_back().map_or(0, |n| n + 1);
        self.accounts.insert(
            number,
            MockAccount {
                properties: AccountProperties {
                    account_number: number,
                    account_name: name.to_string(),
                    last_used_external_index: external,
                    last_used_internal_index: internal,
                    imported_key_count: imported,
                },
                balances: EngineBalances::default(),
            },
        );
        number
    }
}

/// In-memory wallet engine. Starts locked with a single account 0 named
/// `"default"`.
pub struct MockEngine {
    state: Mutex<EngineState>,
    stall_next_account: AtomicBool,
    next_account_started: Notify,
}

impl MockEngine {
    pub fn with_passphrase(private_passphrase: &[u8]) -> Self {
        let mut state = EngineState {
            private_passphrase: private_passphrase.to_vec(),
            public_passphrase: INSECURE_PUBLIC_PASSPHRASE.to_vec(),
            locked: true,
            pending_relock: None,
            relock_count: 0,
            accounts: BTreeMap::new(),
            failing_balances: HashSet::new(),
            block_hash: [0xab; 32],
            block_height: 4_210,
        };
        state.insert_account("default", 0, 0, 0);
        Self {
            state: Mutex::new(state),
            stall_next_account: AtomicBool::new(false),
            next_account_started: Notify::new(),
        }
    }

    fn with_passphrases(public: &[u8], private: &[u8]) -> Self {
        let engine = Self::with_passphrase(private);
        engine.state.lock().public_passphrase = public.to_vec();
        engine
    }

    /// Number of relock tokens that have fired so far.
    pub fn relock_count(&self) -> usize {
        let mut state = self.state.lock();
        state.settle_relock();
        state.relock_count
    }

    pub fn public_passphrase(&self) -> Vec<u8> {
        self.state.lock().public_passphrase.clone()
    }

    pub fn block_height(&self) -> i32 {
        self.state.lock().block_height
    }

    pub fn block_hash(&self) -> [u8; 32] {
        self.state.lock().block_hash
    }

    /// Adds an account after the current highest and returns its number.
    pub fn add_account(&self, name: &str, last_external: u32, last_internal: u32, imported: u32) -> u32 {
        self.state.lock().insert_account(name, last_external, last_internal, imported)
    }

    pub fn properties(&self, number: u32) -> Option<AccountProperties> {
        self.state.lock().accounts.get(&number).map(|a| a.properties.clone())
    }

    pub fn set_balances(&self, number: u32, balances: EngineBalances) {
        if let Some(account) = self.state.lock().accounts.get_mut(&number) {
            account.balances = balances;
        }
    }

    /// Makes every balance computation for `number` fail.
    pub fn fail_balance_for(&self, number: u32) {
        self.state.lock().failing_balances.insert(number);
    }

    /// While set, `next_account` blocks until its context is cancelled.
    pub fn stall_next_account(&self, stall: bool) {
        self.stall_next_account.store(stall, Ordering::SeqCst);
    }

    /// Resolves once a `next_account` call has passed the lock check.
    pub async fn next_account_started(&self) {
        self.next_account_started.notified().await;
    }
}

#[async_trait]
impl WalletEngine for MockEngine {
    async fn accounts(&self) -> Result<AccountsResult, EngineError> {
        let state = self.state.lock();
        Ok(AccountsResult {
            accounts: state
                .accounts
                .values()
                .map(|a| AccountResult {
                    properties: a.properties.clone(),
                    total_balance: a.balances.total,
                })
                .collect(),
            current_block_hash: state.block_hash,
            current_block_height: state.block_height,
        })
    }

    async fn account_properties(&self, account: u32) -> Result<AccountProperties, EngineError> {
        Ok(self.state.lock().account(account)?.properties.clone())
    }

    async fn calculate_account_balance(
        &self,
        account: u32,
        _confirmations: u32,
    ) -> Result<EngineBalances, EngineError> {
        let state = self.state.lock();
        if state.failing_balances.contains(&account) {
            return Err(EngineError::Other("balance backend failure".to_string()));
        }
        Ok(state.account(account)?.balances)
    }

    async fn unlock(&self, passphrase: &[u8], relock: Option<RelockReceiver>) -> Result<(), EngineError> {
        let mut state = self.state.lock();
        if passphrase != state.private_passphrase.as_slice() {
            return Err(EngineError::Passphrase);
        }
        state.locked = false;
        state.pending_relock = relock;
        Ok(())
    }

    async fn lock(&self) {
        let mut state = self.state.lock();
        state.locked = true;
        state.pending_relock = None;
    }

    async fn locked(&self) -> bool {
        let mut state = self.state.lock();
        state.settle_relock();
        state.locked
    }

    async fn next_account(&self, ctx: &CancellationToken, name: &str) -> Result<u32, EngineError> {
        {
            let mut state = self.state.lock();
            state.settle_relock();
            if state.locked {
                return Err(EngineError::Locked);
            }
        }
        self.next_account_started.notify_one();

        if self.stall_next_account.load(Ordering::SeqCst) {
            ctx.cancelled().await;
            return Err(EngineError::Cancelled);
        }
        if ctx.is_cancelled() {
            return Err(EngineError::Cancelled);
        }

        let mut state = self.state.lock();
        if state.number_of(name).is_some() {
            return Err(EngineError::Exist(format!("account {}", name)));
        }
        Ok(state.insert_account(name, 0, 0, 0))
    }

    async fn rename_account(&self, account: u32, name: &str) -> Result<(), EngineError> {
        let mut state = self.state.lock();
        state.account(account)?;
        if state.number_of(name).is_some_and(|n| n != account) {
            return Err(EngineError::Exist(format!("account {}", name)));
        }
        if let Some(entry) = state.accounts.get_mut(&account) {
            entry.properties.account_name = name.to_string();
        }
        Ok(())
    }

    async fn account_name(&self, account: u32) -> Result<String, EngineError> {
        Ok(self.state.lock().account(account)?.properties.account_name.clone())
    }

    async fn account_number(&self, name: &str) -> Result<u32, EngineError> {
        self.state
            .lock()
            .number_of(name)
            .ok_or_else(|| EngineError::NotExist(format!("account {}", name)))
    }

    async fn change_private_passphrase(&self, old: &[u8], new: &[u8]) -> Result<(), EngineError> {
        let mut state = self.state.lock();
        if old != state.private_passphrase.as_slice() {
            return Err(EngineError::Passphrase);
        }
        state.private_passphrase = new.to_vec();
        Ok(())
    }

    async fn change_public_passphrase(&self, old: &[u8], new: &[u8]) -> Result<(), EngineError> {
        let mut state = self.state.lock();
        if old != state.public_passphrase.as_slice() {
            return Err(EngineError::Passphrase);
        }
        state.public_passphrase = new.to_vec();
        Ok(())
    }
}

type EngineMap = Arc<Mutex<HashMap<PathBuf, Arc<MockEngine>>>>;

/// Loader bound to one data directory. Engines outlive unloads so a reopened
/// wallet sees its previous state.
pub struct MockLoader {
    data_dir: PathBuf,
    engines: EngineMap,
}

impl MockLoader {
    fn marker(&self) -> PathBuf {
        self.data_dir.join(WALLET_MARKER)
    }
}

#[async_trait]
impl WalletLoader for MockLoader {
    async fn create_new_wallet(
        &self,
        public_passphrase: &[u8],
        private_passphrase: &[u8],
        _seed: &[u8],
    ) -> Result<Arc<dyn WalletEngine>, EngineError> {
        if self.marker().exists() {
            return Err(EngineError::Exist("wallet".to_string()));
        }
        tokio::fs::create_dir_all(&self.data_dir)
            .await
            .map_err(|e| EngineError::Other(e.to_string()))?;
        tokio::fs::write(self.marker(), b"mock")
            .await
            .map_err(|e| EngineError::Other(e.to_string()))?;

        let engine = Arc::new(MockEngine::with_passphrases(public_passphrase, private_passphrase));
        self.engines.lock().insert(self.data_dir.clone(), engine.clone());
        Ok(engine as Arc<dyn WalletEngine>)
    }

    async fn open_existing_wallet(
        &self,
        public_passphrase: &[u8],
    ) -> Result<Arc<dyn WalletEngine>, EngineError> {
        let engine = match self.engines.lock().get(&self.data_dir) {
            Some(engine) if self.marker().exists() => engine.clone(),
            _ => return Err(EngineError::NotExist("wallet".to_string())),
        };
        if engine.public_passphrase() != public_passphrase {
            return Err(EngineError::Passphrase);
        }
        Ok(engine as Arc<dyn WalletEngine>)
    }

    async fn unload_wallet(&self) -> Result<(), EngineError> {
        Ok(())
    }

    async fn wallet_exists(&self) -> Result<bool, EngineError> {
        Ok(self.marker().exists())
    }
}

/// Hands out [`MockLoader`]s sharing one engine map.
#[derive(Default)]
pub struct MockLoaderFactory {
    engines: EngineMap,
}

impl MockLoaderFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// The engine created for `data_dir`, if any.
    pub fn engine_for(&self, data_dir: &Path) -> Option<Arc<MockEngine>> {
        self.engines.lock().get(data_dir).cloned()
    }

    /// Registers an engine for a wallet that exists before the registry starts.
    pub fn insert_engine(&self, data_dir: &Path, engine: Arc<MockEngine>) {
        self.engines.lock().insert(data_dir.to_path_buf(), engine);
    }
}

impl LoaderFactory for MockLoaderFactory {
    fn loader_for(&self, data_dir: &Path) -> Arc<dyn WalletLoader> {
        Arc::new(MockLoader {
            data_dir: data_dir.to_path_buf(),
            engines: self.engines.clone(),
        })
    }
}

/// Lays down an on-disk wallet at `data_dir` as if a previous process had
/// created it, and registers its engine with `factory`.
pub fn seed_existing_wallet(factory: &MockLoaderFactory, data_dir: &Path, private_passphrase: &[u8]) {
    std::fs::create_dir_all(data_dir).expect("create wallet dir");
    std::fs::write(data_dir.join(WALLET_MARKER), b"mock").expect("write wallet marker");
    factory.insert_engine(data_dir, Arc::new(MockEngine::with_passphrase(private_passphrase)));
}

/// Creates and opens wallet 1 under `root` with [`TEST_SEED`].
pub async fn open_test_wallet(factory: &Arc<MockLoaderFactory>, root: &Path, passphrase: &[u8]) -> Wallet {
    let data_dir = root.join("wallets").join("1");
    let record = WalletRecord::new(1, "test", &data_dir, PassphraseType::Password);
    let wallet = Wallet::new(record, factory.loader_for(&data_dir), CancellationToken::new());
    wallet
        .create(&mut passphrase.to_vec(), TEST_SEED)
        .await
        .expect("create test wallet");
    wallet
}

/// Registry over an in-memory store with mock engines rooted at `root`.
pub async fn test_manager(root: &Path) -> (WalletManager, Arc<MockLoaderFactory>, Arc<FailingStore>) {
    let config = WalletManagerConfig::in_memory(root);
    let factory = Arc::new(MockLoaderFactory::new());
    let store = Arc::new(FailingStore::new(Arc::new(MemoryMetadataStore::new())));
    let manager = WalletManager::new(config, store.clone(), factory.clone())
        .await
        .expect("build test manager");
    (manager, factory, store)
}

/// Metadata store wrapper that fails writes on demand.
pub struct FailingStore {
    inner: Arc<dyn MetadataStore>,
    fail_saves: AtomicBool,
    fail_deletes: AtomicBool,
}

impl FailingStore {
    pub fn new(inner: Arc<dyn MetadataStore>) -> Self {
        Self {
            inner,
            fail_saves: AtomicBool::new(false),
            fail_deletes: AtomicBool::new(false),
        }
    }

    pub fn fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    pub fn fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    fn injected() -> StoreError {
        StoreError::Database("injected failure".to_string())
    }
}

#[async_trait]
impl MetadataStore for FailingStore {
    async fn save(&self, record: &WalletRecord) -> Result<(), StoreError> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(Self::injected());
        }
        self.inner.save(record).await
    }

    async fn delete_record(&self, record: &WalletRecord) -> Result<(), StoreError> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(Self::injected());
        }
        self.inner.delete_record(record).await
    }

    async fn one(&self, field: RecordField, value: &str) -> Result<WalletRecord, StoreError> {
        self.inner.one(field, value).await
    }

    async fn all(&self) -> Result<Vec<WalletRecord>, StoreError> {
        self.inner.all().await
    }
}
