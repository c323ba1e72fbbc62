//! JSON-RPC wallet provider.
//!
//! Plays the role the injected browser extension plays in a web deployment: a
//! local private-key signer over an HTTP JSON-RPC endpoint. Account and chain
//! queries never prompt; chain switches (an endpoint pointed at a different
//! network, a local node restarted on another chain id) are detected by a
//! polling task and dispatched as [`WalletEvent`]s.

use crate::provider::{
    EventHandler, ProviderError, Subscription, TxReceipt, TxRequest, WalletEvent, WalletProvider,
};
use alloy_network::{EthereumWallet, TransactionBuilder};
use alloy_primitives::{Address, Bytes, ChainId, TxHash};
use alloy_provider::{DynProvider, Provider, ProviderBuilder};
use alloy_rpc_types::TransactionRequest;
use alloy_signer_local::PrivateKeySigner;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc, Weak,
    },
    time::Duration,
};

const CONFIRMATION_TIMEOUT: Duration = Duration::from_secs(120);

/// [`WalletProvider`] backed by an HTTP JSON-RPC endpoint and a local signer.
#[derive(Clone)]
pub struct RpcWalletProvider {
    inner: Arc<RpcInner>,
}

struct RpcInner {
    provider: DynProvider,
    sender: Address,
    poll_interval: Duration,
    subscribers: Mutex<HashMap<u64, EventHandler>>,
    next_subscriber: AtomicU64,
    poller_started: AtomicBool,
    last_chain: AtomicU64,
}

impl RpcWalletProvider {
    /// Connects to `rpc_url` with the given signer.
    pub async fn connect(
        rpc_url: &str,
        signer: PrivateKeySigner,
        poll_interval: Duration,
    ) -> Result<Self, ProviderError> {
        let sender = signer.address();
        let provider = ProviderBuilder::new()
            .wallet(EthereumWallet::from(signer))
            .connect(rpc_url)
            .await
            .map_err(|err| ProviderError::Transport(err.to_string()))?
            .erased();
        debug!(rpc_url, %sender, "rpc wallet connected");
        Ok(Self {
            inner: Arc::new(RpcInner {
                provider,
                sender,
                poll_interval,
                subscribers: Mutex::new(HashMap::new()),
                next_subscriber: AtomicU64::new(0),
                poller_started: AtomicBool::new(false),
                last_chain: AtomicU64::new(0),
            }),
        })
    }

    /// The signer's address.
    pub fn sender(&self) -> Address {
        self.inner.sender
    }

    fn build_request(&self, tx: &TxRequest) -> TransactionRequest {
        let request = TransactionRequest::default()
            .with_from(tx.from.unwrap_or(self.inner.sender))
            .with_value(tx.value);
        match tx.to {
            Some(to) => request.with_to(to).with_input(tx.input.clone()),
            None => request.with_deploy_code(tx.input.clone()),
        }
    }

    /// Spawns the change-detection poll loop once, on first subscription.
    /// The task holds only a weak reference and exits when the provider is
    /// dropped.
    fn ensure_poller(&self) {
        if self.inner.poller_started.swap(true, Ordering::SeqCst) {
            return;
        }
        let weak = Arc::downgrade(&self.inner);
        tokio::spawn(async move {
            poll_changes(weak).await;
        });
    }
}

async fn poll_changes(weak: Weak<RpcInner>) {
    loop {
        let Some(inner) = weak.upgrade() else { return };
        let interval = inner.poll_interval;

        match inner.provider.get_chain_id().await {
            Ok(chain_id) => {
                let previous = inner.last_chain.swap(chain_id, Ordering::SeqCst);
                if previous != 0 && previous != chain_id {
                    info!(previous, chain_id, "chain change detected");
                    let handlers: Vec<EventHandler> =
                        inner.subscribers.lock().values().cloned().collect();
                    for handler in handlers {
                        handler(WalletEvent::ChainChanged(chain_id));
                    }
                }
            }
            Err(err) => trace!(%err, "chain poll failed"),
        }

        drop(inner);
        tokio::time::sleep(interval).await;
    }
}

#[async_trait]
impl WalletProvider for RpcWalletProvider {
    async fn authorized_accounts(&self) -> Result<Vec<Address>, ProviderError> {
        // A configured local signer is authorized by definition.
        Ok(vec![self.inner.sender])
    }

    async fn request_accounts(&self) -> Result<Vec<Address>, ProviderError> {
        Ok(vec![self.inner.sender])
    }

    async fn chain_id(&self) -> Result<ChainId, ProviderError> {
        let chain_id = self
            .inner
            .provider
            .get_chain_id()
            .await
            .map_err(|err| ProviderError::Transport(err.to_string()))?;
        self.inner.last_chain.store(chain_id, Ordering::SeqCst);
        Ok(chain_id)
    }

    async fn get_code(&self, address: Address) -> Result<Bytes, ProviderError> {
        self.inner
            .provider
            .get_code_at(address)
            .await
            .map_err(|err| ProviderError::Transport(err.to_string()))
    }

    async fn call(&self, tx: &TxRequest) -> Result<Bytes, ProviderError> {
        self.inner
            .provider
            .call(self.build_request(tx))
            .await
            .map_err(map_call_error)
    }

    async fn send_transaction(&self, tx: TxRequest) -> Result<TxHash, ProviderError> {
        let pending = self
            .inner
            .provider
            .send_transaction(self.build_request(&tx))
            .await
            .map_err(map_call_error)?;
        Ok(*pending.tx_hash())
    }

    async fn await_confirmation(&self, hash: TxHash) -> Result<TxReceipt, ProviderError> {
        let started = std::time::Instant::now();
        loop {
            let receipt = self
                .inner
                .provider
                .get_transaction_receipt(hash)
                .await
                .map_err(|err| ProviderError::Transport(err.to_string()))?;
            if let Some(receipt) = receipt {
                return Ok(TxReceipt {
                    transaction_hash: hash,
                    success: receipt.status(),
                    contract_address: receipt.contract_address,
                });
            }
            if started.elapsed() > CONFIRMATION_TIMEOUT {
                return Err(ProviderError::Transport(format!(
                    "transaction {hash} not confirmed within {}s",
                    CONFIRMATION_TIMEOUT.as_secs()
                )));
            }
            tokio::time::sleep(Duration::from_secs(1)).await;
        }
    }

    fn subscribe(&self, handler: EventHandler) -> Subscription {
        self.ensure_poller();
        let id = self.inner.next_subscriber.fetch_add(1, Ordering::SeqCst);
        self.inner.subscribers.lock().insert(id, handler);
        let weak = Arc::downgrade(&self.inner);
        Subscription::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner.subscribers.lock().remove(&id);
            }
        })
    }
}

/// Maps an RPC failure onto the provider taxonomy: execution reverts keep
/// whatever reason the node supplies, everything else is transport.
fn map_call_error(err: impl std::fmt::Display) -> ProviderError {
    let message = err.to_string();
    let lowered = message.to_lowercase();
    if lowered.contains("revert") || lowered.contains("execution reverted") {
        ProviderError::CallReverted(message)
    } else if lowered.contains("rejected") || lowered.contains("denied") {
        ProviderError::UserRejected(message)
    } else {
        ProviderError::Transport(message)
    }
}
