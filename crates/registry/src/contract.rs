//! The fixed-ABI contract endpoint.

use crate::provider::{ProviderError, TxReceipt, TxRequest, WalletProvider};
use crate::RegistryError;
use alloy_primitives::{Address, Bytes, B256, U256};
use alloy_sol_types::{sol, SolCall, SolValue};
use std::sync::Arc;

sol! {
    /// Land-registry interface, fixed by the deployed contract.
    #[derive(Debug, PartialEq, Eq)]
    interface ILandRegistry {
        function getLand(uint256 landId) external view returns (address owner, bytes32 documentHash, string storageId, bool disputed, uint256 timestamp);
        function officers(address account) external view returns (bool);
        function registerLand(uint256 landId, address owner, bytes32 documentHash, string storageId) external;
        function transferLand(uint256 landId, address newOwner, bytes32 newHash, string newCid) external;
        function raiseDispute(uint256 landId, string reason) external payable;
        function resolveDispute(uint256 landId, bool valid) external;
        function setOfficer(address officer, bool status) external;
    }
}

/// Minimum stake attached to a dispute, 0.01 ether. Client-side guard only;
/// contract-side enforcement is not assumed.
pub const MIN_DISPUTE_STAKE: U256 = U256::from_limbs([10_000_000_000_000_000, 0, 0, 0]);

/// A registered parcel as returned by `getLand`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LandRecord {
    pub id: U256,
    pub owner: Address,
    pub document_hash: B256,
    /// Identifier of the document in external storage (IPFS CID or similar).
    pub storage_id: String,
    pub disputed: bool,
    /// Registration time, seconds since the epoch.
    pub timestamp: u64,
}

/// Assembles the creation transaction payload: creation code followed by the
/// ABI-encoded constructor argument (the owner address).
pub fn creation_calldata(bytecode: &[u8], owner: Address) -> Bytes {
    let mut data = bytecode.to_vec();
    data.extend(owner.abi_encode());
    data.into()
}

/// A call handle bound to one contract address.
///
/// Handles are cheap and short-lived by design: [`crate::BindingManager`]
/// constructs a fresh one for every operation so that address overrides are
/// never served from a stale copy.
pub struct LandRegistry<P> {
    provider: Arc<P>,
    address: Address,
}

impl<P: WalletProvider> LandRegistry<P> {
    pub fn new(provider: Arc<P>, address: Address) -> Self {
        Self { provider, address }
    }

    /// The address this handle is bound to.
    pub fn address(&self) -> Address {
        self.address
    }

    /// Reads a parcel by id.
    pub async fn get_land(&self, id: U256) -> Result<LandRecord, RegistryError> {
        let data = self.call_raw(ILandRegistry::getLandCall { landId: id }.abi_encode()).await?;
        let ret = ILandRegistry::getLandCall::abi_decode_returns(&data)?;
        Ok(LandRecord {
            id,
            owner: ret.owner,
            document_hash: ret.documentHash,
            storage_id: ret.storageId,
            disputed: ret.disputed,
            timestamp: ret.timestamp.saturating_to(),
        })
    }

    /// Whether `account` is a registered officer.
    pub async fn is_officer(&self, account: Address) -> Result<bool, RegistryError> {
        let data = self.call_raw(ILandRegistry::officersCall { account }.abi_encode()).await?;
        Ok(ILandRegistry::officersCall::abi_decode_returns(&data)?)
    }

    /// Registers a new parcel. Officer-gated on chain.
    pub async fn register_land(
        &self,
        id: U256,
        owner: Address,
        document_hash: B256,
        storage_id: String,
    ) -> Result<TxReceipt, RegistryError> {
        let call = ILandRegistry::registerLandCall {
            landId: id,
            owner,
            documentHash: document_hash,
            storageId: storage_id,
        };
        self.send(call.abi_encode(), U256::ZERO).await
    }

    /// Transfers a parcel to a new owner with a refreshed document.
    pub async fn transfer_land(
        &self,
        id: U256,
        new_owner: Address,
        new_hash: B256,
        new_cid: String,
    ) -> Result<TxReceipt, RegistryError> {
        let call = ILandRegistry::transferLandCall {
            landId: id,
            newOwner: new_owner,
            newHash: new_hash,
            newCid: new_cid,
        };
        self.send(call.abi_encode(), U256::ZERO).await
    }

    /// Raises a dispute against a parcel, attaching `stake` wei.
    pub async fn raise_dispute(
        &self,
        id: U256,
        reason: String,
        stake: U256,
    ) -> Result<TxReceipt, RegistryError> {
        let call = ILandRegistry::raiseDisputeCall { landId: id, reason };
        self.send(call.abi_encode(), stake).await
    }

    /// Resolves a dispute. Officer-gated on chain.
    pub async fn resolve_dispute(&self, id: U256, valid: bool) -> Result<TxReceipt, RegistryError> {
        let call = ILandRegistry::resolveDisputeCall { landId: id, valid };
        self.send(call.abi_encode(), U256::ZERO).await
    }

    /// Grants or revokes officer status. Owner-gated on chain.
    pub async fn set_officer(&self, officer: Address, status: bool) -> Result<TxReceipt, RegistryError> {
        let call = ILandRegistry::setOfficerCall { officer, status };
        self.send(call.abi_encode(), U256::ZERO).await
    }

    async fn call_raw(&self, data: Vec<u8>) -> Result<Bytes, ProviderError> {
        self.provider.call(&TxRequest::call(self.address, data)).await
    }

    async fn send(&self, data: Vec<u8>, value: U256) -> Result<TxReceipt, RegistryError> {
        let tx = TxRequest::call(self.address, data).with_value(value);
        let hash = self.provider.send_transaction(tx).await?;
        debug!(%hash, address = %self.address, "transaction submitted");
        let receipt = self.provider.await_confirmation(hash).await?;
        if !receipt.success {
            return Err(RegistryError::TransactionReverted(receipt.transaction_hash));
        }
        Ok(receipt)
    }
}
