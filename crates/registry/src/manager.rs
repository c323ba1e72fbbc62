//! The session/contract binding manager.

use crate::{
    contract::{creation_calldata, LandRecord, LandRegistry, MIN_DISPUTE_STAKE},
    errors::{ErrorLog, RegistryError},
    provider::{ProviderError, Subscription, TxReceipt, TxRequest, WalletEvent, WalletProvider},
    session::{CodeStatus, OwnerRule, RoleState, Session, Snapshot},
};
use alloy_primitives::{Address, Bytes, B256, U256};
use cadastre_config::SettingsStore;
use parking_lot::Mutex;
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};
use tokio::sync::mpsc;

/// Single source of truth for wallet connectivity, contract-address
/// resolution and role derivation.
///
/// One manager is constructed per application session with its wallet
/// provider and settings store injected, then shared by reference; consumers
/// read [`Snapshot`]s and invoke the action methods, never the collaborators
/// directly.
///
/// Every operation re-derives its inputs (account, bound address) at call
/// time. Concurrent invocations are safe: a monotonic generation counter is
/// bumped on every session or binding change, and an in-flight role
/// resolution that finds the generation advanced on completion discards its
/// result instead of overwriting newer state.
pub struct BindingManager<P, S> {
    inner: Arc<Inner<P, S>>,
}

impl<P, S> Clone for BindingManager<P, S> {
    fn clone(&self) -> Self {
        Self { inner: Arc::clone(&self.inner) }
    }
}

struct Inner<P, S> {
    provider: Arc<P>,
    settings: S,
    default_address: Address,
    owner_rule: OwnerRule,
    state: Mutex<ManagerState>,
    generation: AtomicU64,
    events: Mutex<Option<EventTask>>,
}

#[derive(Default)]
struct ManagerState {
    session: Session,
    code_status: CodeStatus,
    roles: RoleState,
    errors: ErrorLog,
}

struct EventTask {
    subscription: Subscription,
    handle: tokio::task::JoinHandle<()>,
}

/// Result of one role derivation, applied atomically if still current.
#[derive(Default)]
struct RoleOutcome {
    code_status: CodeStatus,
    roles: RoleState,
    errors: Vec<String>,
}

impl<P: WalletProvider, S: SettingsStore> BindingManager<P, S> {
    /// Creates a manager over the given collaborators. `default_address` is
    /// the compiled-in contract address used when no override is persisted.
    pub fn new(provider: P, settings: S, default_address: Address) -> Self {
        Self {
            inner: Arc::new(Inner {
                provider: Arc::new(provider),
                settings,
                default_address,
                owner_rule: OwnerRule::default(),
                state: Mutex::new(ManagerState::default()),
                generation: AtomicU64::new(0),
                events: Mutex::new(None),
            }),
        }
    }

    /// Replaces the owner-derivation rule. Only effective right after
    /// construction, before the manager has been cloned or shared.
    pub fn with_owner_rule(mut self, owner_rule: OwnerRule) -> Self {
        if let Some(inner) = Arc::get_mut(&mut self.inner) {
            inner.owner_rule = owner_rule;
        }
        self
    }

    /// Non-interactive startup probe: adopts an already-authorized account if
    /// the wallet reports one, then resolves roles. Never surfaces a failure;
    /// a missing wallet simply leaves the session disconnected.
    pub async fn probe_existing_connection(&self) {
        if !self.inner.provider.is_available() {
            debug!("no wallet present, staying disconnected");
            return;
        }
        let accounts = match self.inner.provider.authorized_accounts().await {
            Ok(accounts) => accounts,
            Err(err) => {
                debug!(%err, "silent reconnection probe failed");
                return;
            }
        };
        let Some(&account) = accounts.first() else {
            return;
        };
        let chain_id = self.inner.provider.chain_id().await.ok();
        {
            let mut state = self.inner.state.lock();
            state.session.account = Some(account);
            state.session.chain_id = chain_id;
        }
        self.bump_generation();
        info!(%account, ?chain_id, "restored existing wallet session");
        self.resolve_roles().await;
    }

    /// Interactive connect. May prompt the user through the wallet. On
    /// rejection or wallet absence the session is left unchanged and the
    /// failure is both returned and recorded. Idempotent when already
    /// connected.
    pub async fn connect(&self) -> Result<Snapshot, RegistryError> {
        let accounts = match self.inner.provider.request_accounts().await {
            Ok(accounts) => accounts,
            Err(err) => {
                self.note_error(&err);
                return Err(err.into());
            }
        };
        let Some(&account) = accounts.first() else {
            let err = ProviderError::UserRejected("no account authorized".into());
            self.note_error(&err);
            return Err(err.into());
        };
        let chain_id = match self.inner.provider.chain_id().await {
            Ok(chain_id) => Some(chain_id),
            Err(err) => {
                self.note_error(&err);
                None
            }
        };
        let changed = {
            let mut state = self.inner.state.lock();
            let changed =
                state.session.account != Some(account) || state.session.chain_id != chain_id;
            state.session.account = Some(account);
            state.session.chain_id = chain_id;
            changed
        };
        if changed {
            self.bump_generation();
            info!(%account, ?chain_id, "wallet connected");
        }
        self.resolve_roles().await;
        Ok(self.snapshot())
    }

    /// Returns a fresh contract handle bound to the current wallet and the
    /// address re-read from the settings store. Never memoizes the address:
    /// an override written moments ago is honored on the very next call.
    pub fn resolve_contract(&self) -> Result<LandRegistry<P>, RegistryError> {
        if !self.inner.provider.is_available() {
            let err = ProviderError::Unavailable;
            self.note_error(&err);
            return Err(err.into());
        }
        let address = self.bound_address()?;
        Ok(LandRegistry::new(Arc::clone(&self.inner.provider), address))
    }

    /// The bound address right now: persisted override, else the compiled-in
    /// default. Reads the settings store on every call.
    pub fn bound_address(&self) -> Result<Address, RegistryError> {
        Ok(self
            .inner
            .settings
            .load()?
            .contract_address
            .unwrap_or(self.inner.default_address))
    }

    /// Persists `address` as the override and invalidates derived role
    /// state. Code existence at the new address is checked on the next
    /// resolution, not here. Works while disconnected.
    pub fn update_contract_address(&self, address: Address) -> Result<(), RegistryError> {
        self.inner.settings.update(&mut |config| config.contract_address = Some(address))?;
        {
            let mut state = self.inner.state.lock();
            state.code_status = CodeStatus::Unknown;
            state.roles = RoleState::default();
        }
        self.bump_generation();
        info!(%address, "contract address updated");
        Ok(())
    }

    /// Recomputes role state for the current `(account, chain, address)`
    /// triple. All failures are absorbed into the error log; roles fall back
    /// to "no authority". Safe to call concurrently: a superseded in-flight
    /// resolution discards its result.
    pub async fn resolve_roles(&self) {
        let generation = self.inner.generation.load(Ordering::SeqCst);

        let account = self.inner.state.lock().session.account;
        let Some(account) = account else {
            let mut state = self.inner.state.lock();
            state.roles = RoleState::default();
            state.code_status = CodeStatus::Unknown;
            return;
        };
        let address = match self.bound_address() {
            Ok(address) => address,
            Err(err) => {
                self.note_error(&err);
                return;
            }
        };

        let outcome = self.derive_roles(account, address).await;

        let mut state = self.inner.state.lock();
        if self.inner.generation.load(Ordering::SeqCst) != generation {
            debug!(%account, %address, "discarding superseded role resolution");
            return;
        }
        state.code_status = outcome.code_status;
        state.roles = outcome.roles;
        for message in outcome.errors {
            state.errors.push(message);
        }
    }

    async fn derive_roles(&self, account: Address, address: Address) -> RoleOutcome {
        let mut outcome = RoleOutcome::default();

        let code = match self.inner.provider.get_code(address).await {
            Ok(code) => code,
            Err(err) => {
                outcome.errors.push(err.to_string());
                return outcome;
            }
        };
        if code.is_empty() {
            outcome.code_status = CodeStatus::Absent;
            outcome
                .errors
                .push(format!("no contract found at {address}; wrong network or not deployed"));
            return outcome;
        }
        outcome.code_status = CodeStatus::Present;

        let registry = LandRegistry::new(Arc::clone(&self.inner.provider), address);
        match registry.is_officer(account).await {
            Ok(is_officer) => outcome.roles.is_officer = is_officer,
            Err(err) => {
                warn!(%err, %account, "officer check failed");
                outcome.errors.push(format!("officer check failed: {err}"));
            }
        }

        outcome.roles.is_owner = match self.inner.owner_rule {
            OwnerRule::Deployer => self
                .inner
                .settings
                .load()
                .ok()
                .and_then(|config| config.deployer)
                .is_some_and(|deployer| deployer == account),
            OwnerRule::OfficerIsOwner => outcome.roles.is_officer,
        };
        outcome
    }

    /// Applies a wallet event: account switches and chain switches supersede
    /// any in-flight resolution; an empty account set disconnects.
    pub async fn handle_event(&self, event: WalletEvent) {
        match event {
            WalletEvent::AccountsChanged(accounts) => match accounts.first() {
                Some(&account) => {
                    {
                        let mut state = self.inner.state.lock();
                        state.session.account = Some(account);
                    }
                    self.bump_generation();
                    debug!(%account, "wallet account changed");
                    self.resolve_roles().await;
                }
                None => {
                    {
                        let mut state = self.inner.state.lock();
                        state.session = Session::default();
                        state.roles = RoleState::default();
                        state.code_status = CodeStatus::Unknown;
                    }
                    self.bump_generation();
                    debug!("wallet disconnected");
                }
            },
            WalletEvent::ChainChanged(chain_id) => {
                let connected = {
                    let mut state = self.inner.state.lock();
                    state.session.chain_id = Some(chain_id);
                    state.session.connected()
                };
                self.bump_generation();
                debug!(chain_id, "wallet chain changed");
                if connected {
                    self.resolve_roles().await;
                }
            }
        }
    }

    /// Subscribes to wallet events and spawns the task that applies them.
    /// Idempotent; [`shutdown`](Self::shutdown) tears both down.
    pub fn start(&self) {
        let mut events = self.inner.events.lock();
        if events.is_some() {
            return;
        }
        let (tx, mut rx) = mpsc::unbounded_channel();
        let subscription = self.inner.provider.subscribe(Arc::new(move |event| {
            let _ = tx.send(event);
        }));
        let manager = self.clone();
        let handle = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                manager.handle_event(event).await;
            }
        });
        *events = Some(EventTask { subscription, handle });
    }

    /// Unsubscribes from wallet events and stops the event task.
    pub fn shutdown(&self) {
        if let Some(task) = self.inner.events.lock().take() {
            task.subscription.unsubscribe();
            task.handle.abort();
        }
    }

    /// Empties the error log. No other side effects.
    pub fn clear_errors(&self) {
        self.inner.state.lock().errors.clear();
    }

    /// Read-only view of the current state. The bound address is re-resolved
    /// from the settings store at snapshot time.
    pub fn snapshot(&self) -> Snapshot {
        let contract_address = match self.inner.settings.load() {
            Ok(config) => config.contract_address.unwrap_or(self.inner.default_address),
            Err(err) => {
                self.inner.state.lock().errors.push(err.to_string());
                self.inner.default_address
            }
        };
        let state = self.inner.state.lock();
        Snapshot {
            account: state.session.account,
            chain_id: state.session.chain_id,
            connected: state.session.connected(),
            contract_address,
            code_status: state.code_status,
            is_officer: state.roles.is_officer,
            is_owner: state.roles.is_owner,
            errors: state.errors.to_vec(),
        }
    }

    /// Reads a parcel from the bound contract.
    pub async fn get_land(&self, id: U256) -> Result<LandRecord, RegistryError> {
        let registry = self.resolve_contract()?;
        self.note_on_err(registry.get_land(id).await)
    }

    /// Registers a parcel. Officer-gated on chain; an authorization failure
    /// comes back as a reverted call.
    pub async fn register_land(
        &self,
        id: U256,
        owner: Address,
        document_hash: B256,
        storage_id: String,
    ) -> Result<TxReceipt, RegistryError> {
        let registry = self.resolve_contract()?;
        self.note_on_err(registry.register_land(id, owner, document_hash, storage_id).await)
    }

    /// Transfers a parcel with a refreshed document hash and storage id.
    pub async fn transfer_land(
        &self,
        id: U256,
        new_owner: Address,
        new_hash: B256,
        new_cid: String,
    ) -> Result<TxReceipt, RegistryError> {
        let registry = self.resolve_contract()?;
        self.note_on_err(registry.transfer_land(id, new_owner, new_hash, new_cid).await)
    }

    /// Raises a dispute with `stake` wei attached, after client-side guards:
    /// minimum stake, not the caller's own parcel, not already disputed.
    pub async fn raise_dispute(
        &self,
        id: U256,
        reason: String,
        stake: U256,
    ) -> Result<TxReceipt, RegistryError> {
        if stake < MIN_DISPUTE_STAKE {
            return self.note_on_err(Err(RegistryError::StakeTooLow));
        }
        let account = self.inner.state.lock().session.account;
        let Some(account) = account else {
            return self.note_on_err(Err(RegistryError::NotConnected));
        };
        let registry = self.resolve_contract()?;
        let land = self.note_on_err(registry.get_land(id).await)?;
        if land.disputed {
            return self.note_on_err(Err(RegistryError::AlreadyDisputed(id)));
        }
        if land.owner == account {
            return self.note_on_err(Err(RegistryError::OwnLandDispute));
        }
        self.note_on_err(registry.raise_dispute(id, reason, stake).await)
    }

    /// Resolves a dispute. Officer-gated on chain.
    pub async fn resolve_dispute(&self, id: U256, valid: bool) -> Result<TxReceipt, RegistryError> {
        let registry = self.resolve_contract()?;
        self.note_on_err(registry.resolve_dispute(id, valid).await)
    }

    /// Grants or revokes officer status. Owner-gated on chain.
    pub async fn set_officer(
        &self,
        officer: Address,
        status: bool,
    ) -> Result<TxReceipt, RegistryError> {
        let registry = self.resolve_contract()?;
        self.note_on_err(registry.set_officer(officer, status).await)
    }

    /// Deploys a new registry instance with the connected account as the
    /// constructor owner. On success the deployed address is persisted as the
    /// override and the deployer is remembered as the owner signal.
    pub async fn deploy(&self, bytecode: Bytes) -> Result<Address, RegistryError> {
        let account = self.inner.state.lock().session.account;
        let Some(account) = account else {
            return self.note_on_err(Err(RegistryError::NotConnected));
        };
        let tx = TxRequest::create(creation_calldata(&bytecode, account)).with_from(account);
        let result: Result<Address, RegistryError> = async {
            let hash = self.inner.provider.send_transaction(tx).await?;
            debug!(%hash, "deployment submitted");
            let receipt = self.inner.provider.await_confirmation(hash).await?;
            if !receipt.success {
                return Err(RegistryError::TransactionReverted(receipt.transaction_hash));
            }
            receipt.contract_address.ok_or(RegistryError::MissingDeployAddress)
        }
        .await;
        let address = self.note_on_err(result)?;

        self.inner.settings.update(&mut |config| config.deployer = Some(account))?;
        self.update_contract_address(address)?;
        info!(%address, deployer = %account, "registry deployed");
        Ok(address)
    }

    fn bump_generation(&self) {
        self.inner.generation.fetch_add(1, Ordering::SeqCst);
    }

    fn note_error(&self, err: &dyn std::fmt::Display) {
        self.inner.state.lock().errors.push(err.to_string());
    }

    /// Mirrors a failure into the shared error log while still surfacing it
    /// to the initiating caller.
    fn note_on_err<T>(&self, result: Result<T, RegistryError>) -> Result<T, RegistryError> {
        if let Err(err) = &result {
            self.note_error(err);
        }
        result
    }
}
