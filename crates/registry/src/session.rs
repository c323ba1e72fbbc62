//! Session, role and snapshot types.

use alloy_primitives::{Address, ChainId};
use serde::Serialize;

/// The current wallet binding. Empty at process start, populated by the
/// silent reconnection probe or an interactive connect, cleared when the
/// provider reports zero accounts.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Session {
    /// The active signer.
    pub account: Option<Address>,
    /// The network the wallet is currently on.
    pub chain_id: Option<ChainId>,
}

impl Session {
    /// Connected iff an account is present.
    pub fn connected(&self) -> bool {
        self.account.is_some()
    }
}

/// Whether the bound chain has executable code at the bound address.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CodeStatus {
    #[default]
    Unknown,
    Present,
    Absent,
}

/// The caller's authority against the bound contract. Only meaningful for
/// the `(account, chain, address)` triple that produced it; the manager
/// recomputes it whenever any of the three changes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct RoleState {
    pub is_officer: bool,
    pub is_owner: bool,
}

/// Strategy for deriving `is_owner`.
///
/// The deployed ABI exposes no `owner()` accessor, so ownership has to come
/// from a side channel. The authoritative rule is [`Deployer`]: the account
/// that deployed the contract through this tool was passed as the constructor
/// owner and is remembered in the settings store.
///
/// [`Deployer`]: OwnerRule::Deployer
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OwnerRule {
    /// Owner iff the connected account equals the remembered deployer.
    #[default]
    Deployer,
    /// Treat officer status as ownership, for deployments with no deployer
    /// record.
    OfficerIsOwner,
}

/// Read-only view of the manager's state, safe to hand to any consumer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Snapshot {
    pub account: Option<Address>,
    pub chain_id: Option<ChainId>,
    pub connected: bool,
    /// The bound address at snapshot time (override > persisted > default).
    pub contract_address: Address,
    pub code_status: CodeStatus,
    pub is_officer: bool,
    pub is_owner: bool,
    pub errors: Vec<String>,
}
