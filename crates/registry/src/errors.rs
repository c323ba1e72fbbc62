//! Error accumulation and the library error type.

use crate::provider::ProviderError;
use alloy_primitives::{TxHash, U256};

/// Insertion-ordered, deduplicated log of human-readable failures.
///
/// The same provider failure tends to repeat on every retry ("no wallet
/// detected" once per attempted call); consumers want each message once, in
/// the order it first occurred.
#[derive(Clone, Debug, Default)]
pub struct ErrorLog {
    entries: Vec<String>,
}

impl ErrorLog {
    /// Appends a message unless an identical one is already present.
    /// Returns whether the message was newly added.
    pub fn push(&mut self, message: impl Into<String>) -> bool {
        let message = message.into();
        if self.entries.contains(&message) {
            return false;
        }
        self.entries.push(message);
        true
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn as_slice(&self) -> &[String] {
        &self.entries
    }

    pub fn to_vec(&self) -> Vec<String> {
        self.entries.clone()
    }
}

/// Failures surfaced by the binding manager and contract handle.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error("abi decoding failed: {0}")]
    Abi(#[from] alloy_sol_types::Error),
    #[error(transparent)]
    Config(#[from] cadastre_config::ConfigError),
    #[error("wallet not connected")]
    NotConnected,
    #[error("dispute stake below the 0.01 ether minimum")]
    StakeTooLow,
    #[error("cannot raise a dispute on your own land")]
    OwnLandDispute,
    #[error("land {0} is already under dispute")]
    AlreadyDisputed(U256),
    #[error("transaction {0} reverted")]
    TransactionReverted(TxHash),
    #[error("deployment confirmed but the receipt carries no contract address")]
    MissingDeployAddress,
}
