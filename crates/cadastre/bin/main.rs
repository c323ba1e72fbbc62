use alloy_primitives::{address, hex, utils::parse_ether, Address, B256};
use alloy_signer_local::PrivateKeySigner;
use cadastre_config::{FileSettings, SettingsStore};
use cadastre_registry::{
    hash_document_file, BindingManager, RpcWalletProvider, Snapshot,
};
use clap::Parser;
use eyre::{eyre, Result, WrapErr};
use std::{path::Path, time::Duration};

mod args;
use args::{
    AddressSubcommand, Cadastre, CadastreSubcommand, DisputeSubcommand, GlobalOpts,
    LandSubcommand, OfficerSubcommand,
};

/// Compiled-in registry address, used when no override is persisted.
const DEFAULT_CONTRACT_ADDRESS: Address = address!("5040046acb526e5f432e377a84b09dd978a70458");

type Manager = BindingManager<RpcWalletProvider, FileSettings>;

fn main() -> Result<()> {
    color_eyre::install()?;
    subscriber();
    let args = Cadastre::parse();
    run(args)
}

/// Initializes the tracing subscriber from `RUST_LOG`.
fn subscriber() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();
}

#[tokio::main]
async fn run(args: Cadastre) -> Result<()> {
    let settings = match &args.opts.config {
        Some(path) => FileSettings::new(path),
        None => FileSettings::default_location(),
    };

    // Address commands are pure settings operations and need no RPC.
    if let CadastreSubcommand::Address(cmd) = &args.cmd {
        return address_command(cmd, &settings);
    }

    let manager = build_manager(&args.opts, settings).await?;
    match args.cmd {
        CadastreSubcommand::Status => {
            manager.probe_existing_connection().await;
            print_snapshot(&manager.snapshot())?;
        }
        CadastreSubcommand::Connect => {
            let snapshot = manager.connect().await?;
            print_snapshot(&snapshot)?;
        }
        CadastreSubcommand::Address(_) => unreachable!("handled above"),
        CadastreSubcommand::Land(cmd) => land_command(cmd, &manager).await?,
        CadastreSubcommand::Dispute(cmd) => dispute_command(cmd, &manager).await?,
        CadastreSubcommand::Officer(cmd) => officer_command(cmd, &manager).await?,
        CadastreSubcommand::Deploy { bytecode } => {
            manager.probe_existing_connection().await;
            let code = read_bytecode(&bytecode)?;
            let address = manager.deploy(code.into()).await?;
            println!("deployed: {address}");
            println!("address override persisted; officers can be added next");
        }
        CadastreSubcommand::Watch => watch(&manager).await?,
    }
    Ok(())
}

async fn build_manager(opts: &GlobalOpts, settings: FileSettings) -> Result<Manager> {
    let config = settings.load()?;
    let rpc_url = opts
        .rpc_url
        .clone()
        .or_else(|| config.rpc_url.clone())
        .ok_or_else(|| {
            eyre!(
                "no RPC endpoint; pass --rpc-url or set rpc_url in {}",
                settings.path().display()
            )
        })?;
    let signer = match &opts.private_key {
        Some(key) => key.parse::<PrivateKeySigner>().wrap_err("invalid private key")?,
        // Reads work with an ephemeral key; transactions will not.
        None => PrivateKeySigner::random(),
    };
    let provider = RpcWalletProvider::connect(
        &rpc_url,
        signer,
        Duration::from_millis(config.poll_interval_ms),
    )
    .await?;
    Ok(BindingManager::new(provider, settings, DEFAULT_CONTRACT_ADDRESS))
}

fn address_command(cmd: &AddressSubcommand, settings: &FileSettings) -> Result<()> {
    match cmd {
        AddressSubcommand::Get => {
            let address =
                settings.load()?.contract_address.unwrap_or(DEFAULT_CONTRACT_ADDRESS);
            println!("{address}");
        }
        AddressSubcommand::Set { address } => {
            let address = *address;
            settings.update(&mut |config| config.contract_address = Some(address))?;
            println!("bound to {address}");
        }
        AddressSubcommand::Reset => {
            settings.update(&mut |config| config.contract_address = None)?;
            println!("override cleared; bound to {DEFAULT_CONTRACT_ADDRESS}");
        }
    }
    Ok(())
}

async fn land_command(cmd: LandSubcommand, manager: &Manager) -> Result<()> {
    match cmd {
        LandSubcommand::Get { id } => {
            let land = manager.get_land(id).await?;
            println!("id:            {}", land.id);
            println!("owner:         {}", land.owner);
            println!("document hash: {}", land.document_hash);
            println!("storage id:    {}", land.storage_id);
            println!("disputed:      {}", land.disputed);
            println!("registered at: {}", land.timestamp);
        }
        LandSubcommand::Register { id, owner, document, hash, storage_id } => {
            manager.probe_existing_connection().await;
            let document_hash = resolve_document_hash(document.as_deref(), hash)?;
            let receipt = manager.register_land(id, owner, document_hash, storage_id).await?;
            println!("registered in {}", receipt.transaction_hash);
        }
        LandSubcommand::Transfer { id, new_owner, document, hash, cid } => {
            manager.probe_existing_connection().await;
            let new_hash = resolve_document_hash(document.as_deref(), hash)?;
            let receipt = manager.transfer_land(id, new_owner, new_hash, cid).await?;
            println!("transferred in {}", receipt.transaction_hash);
        }
    }
    Ok(())
}

async fn dispute_command(cmd: DisputeSubcommand, manager: &Manager) -> Result<()> {
    match cmd {
        DisputeSubcommand::Raise { id, reason, stake } => {
            manager.probe_existing_connection().await;
            let stake = parse_ether(&stake).wrap_err("invalid stake")?;
            let receipt = manager.raise_dispute(id, reason, stake).await?;
            println!("dispute raised in {}", receipt.transaction_hash);
        }
        DisputeSubcommand::Resolve { id, valid } => {
            manager.probe_existing_connection().await;
            let receipt = manager.resolve_dispute(id, valid).await?;
            println!("dispute resolved in {}", receipt.transaction_hash);
        }
    }
    Ok(())
}

async fn officer_command(cmd: OfficerSubcommand, manager: &Manager) -> Result<()> {
    match cmd {
        OfficerSubcommand::Set { address, revoke } => {
            manager.probe_existing_connection().await;
            let receipt = manager.set_officer(address, !revoke).await?;
            let verb = if revoke { "revoked" } else { "granted" };
            println!("officer {verb} in {}", receipt.transaction_hash);
        }
    }
    Ok(())
}

async fn watch(manager: &Manager) -> Result<()> {
    manager.probe_existing_connection().await;
    manager.start();
    let mut last = manager.snapshot();
    print_snapshot(&last)?;
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = tokio::time::sleep(Duration::from_millis(500)) => {
                let current = manager.snapshot();
                if current != last {
                    print_snapshot(&current)?;
                    last = current;
                }
            }
        }
    }
    manager.shutdown();
    Ok(())
}

fn resolve_document_hash(document: Option<&Path>, hash: Option<B256>) -> Result<B256> {
    match (document, hash) {
        (Some(path), None) => {
            hash_document_file(path).wrap_err_with(|| format!("reading {}", path.display()))
        }
        (None, Some(hash)) => Ok(hash),
        (None, None) => Ok(B256::ZERO),
        (Some(_), Some(_)) => unreachable!("clap rejects --document with --hash"),
    }
}

fn read_bytecode(path: &Path) -> Result<Vec<u8>> {
    let raw = std::fs::read_to_string(path)
        .wrap_err_with(|| format!("reading {}", path.display()))?;
    let trimmed = raw.trim().trim_start_matches("0x");
    hex::decode(trimmed).wrap_err("bytecode is not valid hex")
}

fn print_snapshot(snapshot: &Snapshot) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(snapshot)?);
    Ok(())
}
