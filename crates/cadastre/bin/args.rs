use alloy_primitives::{Address, B256, U256};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Command-line client for the Cadastre land-registry contract.
#[derive(Debug, Parser)]
#[command(name = "cadastre", version, about)]
pub struct Cadastre {
    #[command(subcommand)]
    pub cmd: CadastreSubcommand,

    #[command(flatten)]
    pub opts: GlobalOpts,
}

/// Options shared by every subcommand.
#[derive(Clone, Debug, Parser)]
pub struct GlobalOpts {
    /// JSON-RPC endpoint. Falls back to `rpc_url` in the settings file.
    #[arg(long, env = "ETH_RPC_URL", global = true)]
    pub rpc_url: Option<String>,

    /// Private key of the signing account. Read-only commands work without
    /// one; transactions do not.
    #[arg(long, env = "CADASTRE_PRIVATE_KEY", global = true)]
    pub private_key: Option<String>,

    /// Path to the settings file.
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
pub enum CadastreSubcommand {
    /// Probe the wallet and print the full session snapshot.
    Status,

    /// Connect the wallet and resolve roles.
    Connect,

    /// Inspect or change the bound contract address.
    #[command(subcommand)]
    Address(AddressSubcommand),

    /// Read or mutate parcels.
    #[command(subcommand)]
    Land(LandSubcommand),

    /// Raise or resolve disputes.
    #[command(subcommand)]
    Dispute(DisputeSubcommand),

    /// Manage officer grants.
    #[command(subcommand)]
    Officer(OfficerSubcommand),

    /// Deploy a new registry instance and bind to it.
    Deploy {
        /// File containing the hex-encoded creation bytecode.
        #[arg(long, value_name = "PATH")]
        bytecode: PathBuf,
    },

    /// Follow wallet events and print the snapshot whenever it changes.
    Watch,
}

#[derive(Debug, Subcommand)]
pub enum AddressSubcommand {
    /// Print the currently bound address.
    Get,
    /// Persist an address override.
    Set { address: Address },
    /// Drop the override and fall back to the compiled-in default.
    Reset,
}

#[derive(Debug, Subcommand)]
pub enum LandSubcommand {
    /// Look up a parcel by id.
    Get { id: U256 },

    /// Register a parcel. Requires officer authority on chain.
    Register {
        id: U256,
        /// Owner of the new parcel.
        #[arg(long)]
        owner: Address,
        /// Deed document to hash and attach.
        #[arg(long, value_name = "PATH", conflicts_with = "hash")]
        document: Option<PathBuf>,
        /// Precomputed document hash; zero when neither is given.
        #[arg(long)]
        hash: Option<B256>,
        /// External storage id of the document (IPFS CID or similar).
        #[arg(long, default_value = "")]
        storage_id: String,
    },

    /// Transfer a parcel to a new owner with a refreshed document.
    Transfer {
        id: U256,
        #[arg(long)]
        new_owner: Address,
        #[arg(long, value_name = "PATH", conflicts_with = "hash")]
        document: Option<PathBuf>,
        #[arg(long)]
        hash: Option<B256>,
        #[arg(long, default_value = "")]
        cid: String,
    },
}

#[derive(Debug, Subcommand)]
pub enum DisputeSubcommand {
    /// Raise a dispute against a parcel, staking at least 0.01 ether.
    Raise {
        id: U256,
        #[arg(long)]
        reason: String,
        /// Stake in ether, e.g. `0.01`.
        #[arg(long, default_value = "0.01")]
        stake: String,
    },
    /// Resolve a dispute. Requires officer authority on chain.
    Resolve {
        id: U256,
        /// Whether the dispute was found valid.
        #[arg(long)]
        valid: bool,
    },
}

#[derive(Debug, Subcommand)]
pub enum OfficerSubcommand {
    /// Grant or revoke officer status. Requires owner authority on chain.
    Set {
        address: Address,
        /// Revoke instead of grant.
        #[arg(long)]
        revoke: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_cli() {
        use clap::CommandFactory;
        Cadastre::command().debug_assert();
    }

    #[test]
    fn parses_register() {
        let args = Cadastre::parse_from([
            "cadastre",
            "land",
            "register",
            "42",
            "--owner",
            "0x00000000000000000000000000000000deadbeef",
            "--storage-id",
            "bafybeigdyrzt5",
        ]);
        match args.cmd {
            CadastreSubcommand::Land(LandSubcommand::Register { id, storage_id, hash, .. }) => {
                assert_eq!(id, U256::from(42));
                assert_eq!(storage_id, "bafybeigdyrzt5");
                assert!(hash.is_none());
            }
            cmd => panic!("unexpected command: {cmd:?}"),
        }
    }
}
