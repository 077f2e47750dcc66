//! Bridge Bootstrap CLI
//!
//! Operator entry point for the genesis exchange between a side chain and the
//! relay chain, plus receipt inspection helpers.
//!
//! ## Usage
//!
//! ```bash
//! bridge-bootstrap register
//! bridge-bootstrap approve --validator 0     # once per relay validator
//! bridge-bootstrap push-genesis
//! bridge-bootstrap pull-genesis
//! bridge-bootstrap decode-lock 0x<tx hash>
//! bridge-bootstrap lock --asset 0x<token> --to-chain 2 --to-address 0x<recipient> --amount 1000
//! ```
//!
//! The config path comes from `--config`, else `BRIDGE_BOOTSTRAP_CONFIG_PATH`,
//! else `config/bridge-bootstrap.toml`.

use anyhow::{Context, Result};
use bridge_bootstrap::context::BridgeContext;
use bridge_bootstrap::events::{bytes_as_evm_address, EventKind, TransferEvent};
use bridge_bootstrap::rpc::balance_of;
use bridge_bootstrap::submission::{cancellation, dump_logs};
use bridge_bootstrap::transfer::{submit_lock, LockRequest};
use bridge_bootstrap::types::{parse_address, parse_h256, BlockTag};
use bridge_bootstrap::{Config, PhaseError, PhaseReport};
use chain_clients_common::{bytes_to_hex, hex_to_bytes};
use ethereum_types::U256;
use clap::{Parser, Subcommand};
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "bridge-bootstrap")]
#[command(about = "Register a side chain with the relay chain and exchange genesis headers")]
struct Args {
    /// Path to configuration file (overrides BRIDGE_BOOTSTRAP_CONFIG_PATH)
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Phase 1: register the side chain on the relay chain
    Register,
    /// Phase 2: approve the registration as a relay validator
    Approve {
        /// Index into relay_chain.validator_private_key_envs
        #[arg(long, default_value_t = 0, conflicts_with = "all")]
        validator: usize,
        /// Approve once with every configured validator, in order
        #[arg(long)]
        all: bool,
    },
    /// Phase 3: push the side chain's current header to the relay chain
    PushGenesis,
    /// Phase 4: pull the relay genesis header and validators into the side chain
    PullGenesis,
    /// Lock an asset through the wrapper and verify the proxy's lock event
    Lock {
        /// Asset to lock
        #[arg(long)]
        asset: String,
        /// Target chain id
        #[arg(long)]
        to_chain: u64,
        /// Recipient on the target chain (hex bytes)
        #[arg(long)]
        to_address: String,
        /// Decimal amount, fee included
        #[arg(long)]
        amount: String,
        /// Decimal wrapper fee
        #[arg(long, default_value = "0")]
        fee: String,
        /// Wrapper request id
        #[arg(long, default_value = "0")]
        id: String,
    },
    /// Decode the lock event of a side chain transaction
    DecodeLock {
        #[arg(value_name = "0x...")]
        tx_hash: String,
    },
    /// Decode the unlock event of a side chain transaction
    DecodeUnlock {
        #[arg(value_name = "0x...")]
        tx_hash: String,
    },
    /// Print a transaction's receipt and logs
    DumpTx {
        #[arg(value_name = "0x...")]
        tx_hash: String,
        /// Look the transaction up on the relay chain
        #[arg(long)]
        relay: bool,
    },
    /// Print the current block height
    Height {
        #[arg(long)]
        relay: bool,
    },
    /// Print a side chain token balance
    Balance {
        /// Token contract
        #[arg(long)]
        token: String,
        /// Account to query
        owner: String,
        /// Block height; latest when omitted
        #[arg(long)]
        block: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt::init();

    if let Some(path) = &args.config {
        std::env::set_var("BRIDGE_BOOTSTRAP_CONFIG_PATH", path);
        info!("Using custom config: {}", path);
    }

    let config = Config::load()?;
    info!("Configuration loaded successfully");
    let ctx = BridgeContext::new(config)?;

    let (cancel_handle, cancel) = cancellation();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, abandoning confirmation wait");
            cancel_handle.cancel();
        }
    });

    match args.command {
        Command::Register => {
            let operator = ctx.relay_operator_engine()?;
            let report = ctx.orchestrator(cancel)?.register_side_chain(&operator).await;
            finish_phase(report)
        }
        Command::Approve { validator, all } => {
            let orchestrator = ctx.orchestrator(cancel)?;
            let indices: Vec<usize> = if all {
                (0..ctx.validator_count()).collect()
            } else {
                vec![validator]
            };
            if indices.is_empty() {
                anyhow::bail!("No relay validator keys configured (relay_chain.validator_private_key_envs)");
            }
            for index in indices {
                let engine = ctx.relay_validator_engine(index)?;
                finish_phase(orchestrator.approve_registration(&engine).await)?;
            }
            Ok(())
        }
        Command::PushGenesis => {
            let operator = ctx.relay_operator_engine()?;
            let report = ctx.orchestrator(cancel)?.push_side_chain_genesis(&operator).await;
            finish_phase(report)
        }
        Command::PullGenesis => {
            let side_admin = ctx.side_admin_engine()?;
            let report = ctx.orchestrator(cancel)?.pull_relay_genesis(&side_admin).await;
            finish_phase(report)
        }
        Command::Lock {
            asset,
            to_chain,
            to_address,
            amount,
            fee,
            id,
        } => {
            let request = LockRequest {
                from_asset: parse_address(&asset)?,
                to_chain_id: to_chain,
                to_address: hex_to_bytes(&to_address).context("Invalid --to-address")?,
                amount: parse_decimal("--amount", &amount)?,
                fee: parse_decimal("--fee", &fee)?,
                id: parse_decimal("--id", &id)?,
            };
            let engine = ctx.side_admin_engine()?;
            let report = submit_lock(
                &engine,
                &ctx.event_decoder(),
                ctx.wrapper()?,
                ctx.lock_proxy()?,
                &request,
                cancel,
            )
            .await?;
            print_transfer(&format!("{:?}", report.record.tx_hash), &report.event);
            Ok(())
        }
        Command::DecodeLock { tx_hash } => decode_transfer(&ctx, &tx_hash, EventKind::Lock).await,
        Command::DecodeUnlock { tx_hash } => decode_transfer(&ctx, &tx_hash, EventKind::Unlock).await,
        Command::DumpTx { tx_hash, relay } => {
            let rpc = if relay { ctx.relay_rpc() } else { ctx.side_rpc() };
            let hash = parse_h256(&tx_hash)?;
            let record = rpc
                .receipt(hash)
                .await?
                .with_context(|| format!("No receipt for {}", tx_hash))?;
            dump_logs(&ctx.registry, &record);
            if !record.success {
                anyhow::bail!("receipt failed {:?}", record.tx_hash);
            }
            Ok(())
        }
        Command::Height { relay } => {
            let rpc = if relay { ctx.relay_rpc() } else { ctx.side_rpc() };
            println!("{}", rpc.block_number().await?);
            Ok(())
        }
        Command::Balance { token, owner, block } => {
            let tag = block.map(BlockTag::Number).unwrap_or(BlockTag::Latest);
            let balance = balance_of(
                ctx.side_rpc().as_ref(),
                &ctx.registry,
                parse_address(&token)?,
                parse_address(&owner)?,
                tag,
            )
            .await?;
            println!("{}", balance);
            Ok(())
        }
    }
}

fn finish_phase(result: Result<PhaseReport, PhaseError>) -> Result<()> {
    match result {
        Ok(report) => {
            println!(
                "{} succeeded: tx {:?} in block {}",
                report.phase, report.record.tx_hash, report.record.block_number
            );
            if let Some(genesis) = &report.genesis {
                println!("  header height {} hash {:?}", genesis.height, genesis.hash);
            }
            if let Some(validators) = &report.validators {
                println!("  {} validators at epoch height {}", validators.len(), validators.epoch_height);
            }
            Ok(())
        }
        Err(e) => {
            error!("{}", e);
            Err(e.into())
        }
    }
}

fn parse_decimal(flag: &str, value: &str) -> Result<U256> {
    U256::from_dec_str(value).map_err(|e| anyhow::anyhow!("Invalid {} '{}': {:?}", flag, value, e))
}

async fn decode_transfer(ctx: &BridgeContext, tx_hash: &str, kind: EventKind) -> Result<()> {
    let hash = parse_h256(tx_hash)?;
    let event = ctx
        .event_decoder()
        .decode_by_hash(ctx.side_rpc().as_ref(), hash, ctx.lock_proxy()?, kind)
        .await?;
    print_transfer(tx_hash, &event);
    Ok(())
}

fn print_transfer(tx_hash: &str, event: &TransferEvent) {
    match event {
        TransferEvent::Lock {
            from_asset,
            from_address,
            to_chain_id,
            to_asset,
            to_address,
            amount,
        } => {
            println!("lock event in {}", tx_hash);
            println!("  from asset   {:?}", from_asset);
            println!("  from address {:?}", from_address);
            println!("  to chain id  {}", to_chain_id);
            println!("  to asset     {}", bytes_to_hex(to_asset));
            match bytes_as_evm_address(to_address) {
                Some(addr) => println!("  to address   {:?}", addr),
                None => println!("  to address   {}", bytes_to_hex(to_address)),
            }
            println!("  amount       {}", amount);
        }
        TransferEvent::Unlock {
            to_asset,
            to_address,
            amount,
        } => {
            println!("unlock event in {}", tx_hash);
            println!("  to asset   {:?}", to_asset);
            println!("  to address {:?}", to_address);
            println!("  amount     {}", amount);
        }
    }
}
