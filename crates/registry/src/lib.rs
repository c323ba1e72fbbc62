//! # cadastre-registry
//!
//! Client core for the Cadastre land-registry contract.
//!
//! The central type is [`BindingManager`]: the single source of truth for
//! wallet connectivity, contract-address resolution and role derivation. It
//! sits between a [`WalletProvider`] (account and chain queries, event
//! subscription, transaction signing) and the fixed-ABI contract endpoint
//! ([`LandRegistry`]), and exposes a read-only [`Snapshot`] plus a small
//! action surface to consumers.
//!
//! The bound contract address is re-read from the settings store on every
//! contract-call construction, so an override written moments ago (by a
//! deploy in another process, or a manual reset) is honored immediately.

#[macro_use]
extern crate tracing;

mod contract;
mod document;
mod errors;
mod manager;
mod provider;
mod session;

#[cfg(test)]
pub(crate) mod test_utils;

pub use contract::{
    creation_calldata, ILandRegistry, LandRecord, LandRegistry, MIN_DISPUTE_STAKE,
};
pub use document::{hash_document, hash_document_file};
pub use errors::{ErrorLog, RegistryError};
pub use manager::BindingManager;
pub use provider::{
    rpc::RpcWalletProvider, EventHandler, ProviderError, Subscription, TxReceipt, TxRequest,
    WalletEvent, WalletProvider,
};
pub use session::{CodeStatus, OwnerRule, RoleState, Session, Snapshot};
