//! The wallet-provider seam.
//!
//! [`WalletProvider`] is the capability set the binding manager consumes:
//! account and chain queries, bytecode and call access, transaction signing
//! and submission, and change notifications. Production code uses
//! [`rpc::RpcWalletProvider`]; tests inject a scripted fake.

use alloy_primitives::{Address, Bytes, ChainId, TxHash, U256};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::{fmt, sync::Arc};

pub mod rpc;

/// Notifications a wallet provider emits when its state changes out of band.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WalletEvent {
    /// The set of authorized accounts changed. Empty means the wallet
    /// disconnected entirely.
    AccountsChanged(Vec<Address>),
    /// The wallet switched to a different chain.
    ChainChanged(ChainId),
}

/// Callback invoked for every [`WalletEvent`].
pub type EventHandler = Arc<dyn Fn(WalletEvent) + Send + Sync>;

/// Handle for an active event subscription.
///
/// Dropping the handle unsubscribes, so teardown is deterministic rather than
/// left to garbage collection of the handler.
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    /// Creates a subscription that runs `cancel` when unsubscribed.
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self { cancel: Some(Box::new(cancel)) }
    }

    /// A subscription with nothing to tear down.
    pub fn noop() -> Self {
        Self { cancel: None }
    }

    /// Explicitly unsubscribes.
    pub fn unsubscribe(mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").field("active", &self.cancel.is_some()).finish()
    }
}

/// A transaction to be signed and sent by the wallet.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxRequest {
    /// Sender; the wallet's active account when unset.
    pub from: Option<Address>,
    /// Recipient; `None` is a contract-creation transaction.
    pub to: Option<Address>,
    /// Value attached to the transaction, in wei.
    pub value: U256,
    /// Calldata, or creation code for contract creation.
    pub input: Bytes,
}

impl TxRequest {
    /// A plain call to `to` with the given calldata.
    pub fn call(to: Address, input: impl Into<Bytes>) -> Self {
        Self { to: Some(to), input: input.into(), ..Default::default() }
    }

    /// A contract-creation transaction carrying the given creation code.
    pub fn create(input: impl Into<Bytes>) -> Self {
        Self { input: input.into(), ..Default::default() }
    }

    /// Sets the attached value.
    pub fn with_value(mut self, value: U256) -> Self {
        self.value = value;
        self
    }

    /// Sets the sender.
    pub fn with_from(mut self, from: Address) -> Self {
        self.from = Some(from);
        self
    }
}

/// Confirmation result of a submitted transaction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxReceipt {
    pub transaction_hash: TxHash,
    /// Whether the transaction executed successfully.
    pub success: bool,
    /// Address of the created contract, for creation transactions.
    pub contract_address: Option<Address>,
}

/// Failures originating at the wallet/network boundary.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("no wallet detected. Please install MetaMask or configure an RPC endpoint")]
    Unavailable,
    #[error("request rejected: {0}")]
    UserRejected(String),
    #[error("call reverted: {0}")]
    CallReverted(String),
    #[error("transport error: {0}")]
    Transport(String),
}

/// Capability set of an injected browser-style wallet.
///
/// All methods are non-interactive except [`request_accounts`], which may
/// prompt the user for authorization.
///
/// [`request_accounts`]: WalletProvider::request_accounts
#[async_trait]
pub trait WalletProvider: Send + Sync + 'static {
    /// Whether a wallet is present at all. A missing wallet is a normal,
    /// recoverable condition, not an error.
    fn is_available(&self) -> bool {
        true
    }

    /// Accounts already authorized for this application, without prompting.
    async fn authorized_accounts(&self) -> Result<Vec<Address>, ProviderError>;

    /// Requests account access, prompting the user if necessary.
    async fn request_accounts(&self) -> Result<Vec<Address>, ProviderError>;

    /// The chain the wallet is currently on.
    async fn chain_id(&self) -> Result<ChainId, ProviderError>;

    /// Deployed bytecode at `address` on the current chain. Empty bytes mean
    /// no code.
    async fn get_code(&self, address: Address) -> Result<Bytes, ProviderError>;

    /// Executes a read-only call and returns the raw return data.
    async fn call(&self, tx: &TxRequest) -> Result<Bytes, ProviderError>;

    /// Signs and submits a transaction, returning its hash.
    async fn send_transaction(&self, tx: TxRequest) -> Result<TxHash, ProviderError>;

    /// Waits for the transaction to be mined and returns its receipt.
    async fn await_confirmation(&self, hash: TxHash) -> Result<TxReceipt, ProviderError>;

    /// Registers `handler` for wallet events. The returned [`Subscription`]
    /// unsubscribes on drop.
    fn subscribe(&self, handler: EventHandler) -> Subscription;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn subscription_cancels_once() {
        static CANCELS: AtomicUsize = AtomicUsize::new(0);
        let sub = Subscription::new(|| {
            CANCELS.fetch_add(1, Ordering::SeqCst);
        });
        sub.unsubscribe();
        assert_eq!(CANCELS.load(Ordering::SeqCst), 1);

        let sub = Subscription::new(|| {
            CANCELS.fetch_add(1, Ordering::SeqCst);
        });
        drop(sub);
        assert_eq!(CANCELS.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn tx_request_builders() {
        let to = Address::repeat_byte(0x11);
        let tx = TxRequest::call(to, vec![0xde, 0xad]).with_value(U256::from(7));
        assert_eq!(tx.to, Some(to));
        assert_eq!(tx.value, U256::from(7));
        assert!(TxRequest::create(vec![0x60, 0x80]).to.is_none());
    }
}
