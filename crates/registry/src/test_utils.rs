//! Scripted fakes for manager tests.

use crate::{
    contract::{ILandRegistry, LandRecord},
    provider::{
        EventHandler, ProviderError, Subscription, TxReceipt, TxRequest, WalletEvent,
        WalletProvider,
    },
};
use alloy_primitives::{keccak256, Address, Bytes, ChainId, TxHash, U256};
use alloy_sol_types::{SolCall, SolValue};
use async_trait::async_trait;
use cadastre_config::{Config, ConfigError, SettingsStore};
use parking_lot::Mutex;
use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering},
        Arc,
    },
};
use tokio::sync::oneshot;

/// In-memory [`WalletProvider`] with scripted accounts, chains, contract code
/// and officer registries.
#[derive(Clone)]
pub struct FakeWalletProvider {
    inner: Arc<FakeInner>,
}

#[derive(Default)]
struct FakeInner {
    unavailable: AtomicBool,
    accounts: Mutex<Vec<Address>>,
    chain: AtomicU64,
    code: Mutex<HashMap<(ChainId, Address), Bytes>>,
    officers: Mutex<HashMap<(ChainId, Address), bool>>,
    lands: Mutex<HashMap<U256, LandRecord>>,
    revert_writes: AtomicBool,
    prompts: AtomicUsize,
    code_fetches: AtomicUsize,
    officer_checks: AtomicUsize,
    officer_gates: Mutex<Vec<oneshot::Receiver<()>>>,
    subscribers: Mutex<HashMap<u64, EventHandler>>,
    next_subscriber: AtomicU64,
    sent: Mutex<Vec<TxRequest>>,
    pending: Mutex<HashMap<TxHash, TxRequest>>,
}

impl FakeWalletProvider {
    pub fn new() -> Self {
        Self { inner: Arc::new(FakeInner::default()) }
    }

    /// Simulates a missing wallet extension.
    pub fn set_unavailable(&self) {
        self.inner.unavailable.store(true, Ordering::SeqCst);
    }

    pub fn set_accounts(&self, accounts: Vec<Address>) {
        *self.inner.accounts.lock() = accounts;
    }

    pub fn set_chain(&self, chain_id: ChainId) {
        self.inner.chain.store(chain_id, Ordering::SeqCst);
    }

    pub fn put_code(&self, chain_id: ChainId, address: Address, code: impl Into<Bytes>) {
        self.inner.code.lock().insert((chain_id, address), code.into());
    }

    pub fn set_officer(&self, chain_id: ChainId, account: Address, status: bool) {
        self.inner.officers.lock().insert((chain_id, account), status);
    }

    pub fn put_land(&self, record: LandRecord) {
        self.inner.lands.lock().insert(record.id, record);
    }

    /// All write transactions from now on confirm with a failed status.
    pub fn set_revert_writes(&self, revert: bool) {
        self.inner.revert_writes.store(revert, Ordering::SeqCst);
    }

    /// Holds the next officer query until the returned sender fires, so a
    /// test can interleave newer state changes with an in-flight resolution.
    pub fn gate_next_officer_check(&self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.inner.officer_gates.lock().push(rx);
        tx
    }

    /// Dispatches an event to every live subscriber.
    pub fn emit(&self, event: WalletEvent) {
        let handlers: Vec<EventHandler> =
            self.inner.subscribers.lock().values().cloned().collect();
        for handler in handlers {
            handler(event.clone());
        }
    }

    pub fn prompt_count(&self) -> usize {
        self.inner.prompts.load(Ordering::SeqCst)
    }

    pub fn code_fetch_count(&self) -> usize {
        self.inner.code_fetches.load(Ordering::SeqCst)
    }

    pub fn officer_check_count(&self) -> usize {
        self.inner.officer_checks.load(Ordering::SeqCst)
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.lock().len()
    }

    pub fn sent_transactions(&self) -> Vec<TxRequest> {
        self.inner.sent.lock().clone()
    }

    fn ensure_available(&self) -> Result<(), ProviderError> {
        if self.inner.unavailable.load(Ordering::SeqCst) {
            return Err(ProviderError::Unavailable);
        }
        Ok(())
    }

    fn chain(&self) -> ChainId {
        self.inner.chain.load(Ordering::SeqCst)
    }
}

impl Default for FakeWalletProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WalletProvider for FakeWalletProvider {
    fn is_available(&self) -> bool {
        !self.inner.unavailable.load(Ordering::SeqCst)
    }

    async fn authorized_accounts(&self) -> Result<Vec<Address>, ProviderError> {
        self.ensure_available()?;
        Ok(self.inner.accounts.lock().clone())
    }

    async fn request_accounts(&self) -> Result<Vec<Address>, ProviderError> {
        self.ensure_available()?;
        self.inner.prompts.fetch_add(1, Ordering::SeqCst);
        Ok(self.inner.accounts.lock().clone())
    }

    async fn chain_id(&self) -> Result<ChainId, ProviderError> {
        self.ensure_available()?;
        Ok(self.chain())
    }

    async fn get_code(&self, address: Address) -> Result<Bytes, ProviderError> {
        self.ensure_available()?;
        self.inner.code_fetches.fetch_add(1, Ordering::SeqCst);
        Ok(self.inner.code.lock().get(&(self.chain(), address)).cloned().unwrap_or_default())
    }

    async fn call(&self, tx: &TxRequest) -> Result<Bytes, ProviderError> {
        self.ensure_available()?;
        let data = tx.input.as_ref();
        if data.starts_with(&ILandRegistry::officersCall::SELECTOR) {
            self.inner.officer_checks.fetch_add(1, Ordering::SeqCst);
            let gate = self.inner.officer_gates.lock().pop();
            if let Some(gate) = gate {
                let _ = gate.await;
            }
            let call = ILandRegistry::officersCall::abi_decode(data)
                .map_err(|err| ProviderError::Transport(err.to_string()))?;
            let status = self
                .inner
                .officers
                .lock()
                .get(&(self.chain(), call.account))
                .copied()
                .unwrap_or(false);
            return Ok(status.abi_encode().into());
        }
        if data.starts_with(&ILandRegistry::getLandCall::SELECTOR) {
            let call = ILandRegistry::getLandCall::abi_decode(data)
                .map_err(|err| ProviderError::Transport(err.to_string()))?;
            let record = self
                .inner
                .lands
                .lock()
                .get(&call.landId)
                .cloned()
                .ok_or_else(|| ProviderError::CallReverted("land not found".into()))?;
            let encoded = (
                record.owner,
                record.document_hash,
                record.storage_id,
                record.disputed,
                U256::from(record.timestamp),
            )
                .abi_encode_params();
            return Ok(encoded.into());
        }
        Err(ProviderError::CallReverted("unknown selector".into()))
    }

    async fn send_transaction(&self, tx: TxRequest) -> Result<TxHash, ProviderError> {
        self.ensure_available()?;
        let mut sent = self.inner.sent.lock();
        let mut preimage = tx.input.to_vec();
        preimage.push(sent.len() as u8);
        let hash = keccak256(&preimage);
        sent.push(tx.clone());
        self.inner.pending.lock().insert(hash, tx);
        Ok(hash)
    }

    async fn await_confirmation(&self, hash: TxHash) -> Result<TxReceipt, ProviderError> {
        self.ensure_available()?;
        let tx = self
            .inner
            .pending
            .lock()
            .remove(&hash)
            .ok_or_else(|| ProviderError::Transport("unknown transaction".into()))?;
        let success = !self.inner.revert_writes.load(Ordering::SeqCst);
        let contract_address =
            (tx.to.is_none() && success).then(|| Address::from_slice(&hash[12..]));
        Ok(TxReceipt { transaction_hash: hash, success, contract_address })
    }

    fn subscribe(&self, handler: EventHandler) -> Subscription {
        let id = self.inner.next_subscriber.fetch_add(1, Ordering::SeqCst);
        self.inner.subscribers.lock().insert(id, handler);
        let inner = Arc::clone(&self.inner);
        Subscription::new(move || {
            inner.subscribers.lock().remove(&id);
        })
    }
}

/// In-memory [`SettingsStore`].
#[derive(Clone, Default)]
pub struct MemorySettings {
    inner: Arc<Mutex<Config>>,
}

impl MemorySettings {
    pub fn contract_address(&self) -> Option<Address> {
        self.inner.lock().contract_address
    }

    pub fn deployer(&self) -> Option<Address> {
        self.inner.lock().deployer
    }

    /// Writes the override directly, bypassing the manager, as another
    /// process would.
    pub fn write_contract_address(&self, address: Address) {
        self.inner.lock().contract_address = Some(address);
    }
}

impl SettingsStore for MemorySettings {
    fn load(&self) -> Result<Config, ConfigError> {
        Ok(self.inner.lock().clone())
    }

    fn store(&self, config: &Config) -> Result<(), ConfigError> {
        *self.inner.lock() = config.clone();
        Ok(())
    }
}
