//! chainwatch CLI — watch transactions for block timeouts from the terminal.
//!
//! Usage:
//! ```bash
//! # Print the current head of an endpoint
//! chainwatch head --url https://cloudflare-eth.com
//!
//! # Fail if 0xabc.. is not mined within 12 blocks (subscribes over ws://)
//! chainwatch watch --url wss://eth.example/ws --tx 0xabc.. --block-timeout 12
//!
//! # Wait for the receipt, giving up after the default 50 blocks
//! chainwatch receipt --url https://cloudflare-eth.com --tx 0xabc..
//! ```

use std::env;
use std::process;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context};
use chainwatch_core::{BlockProvider, ReceiptSource};
use chainwatch_http::HttpRpcClient;
use chainwatch_monitor::{wait_for_receipt, BlockTimeoutWatcher, MonitorConfig};
use chainwatch_ws::{WsClientConfig, WsRpcClient};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    init_tracing();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        print_usage();
        process::exit(1);
    }

    let result = match args[1].as_str() {
        "head" | "watch" | "receipt" => run(&args[1], &args[2..]).await,
        "version" | "--version" | "-V" => {
            println!("chainwatch {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        "help" | "--help" | "-h" => {
            print_usage();
            Ok(())
        }
        other => {
            eprintln!("Unknown command: {other}");
            print_usage();
            process::exit(1);
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn print_usage() {
    println!("chainwatch {}", env!("CARGO_PKG_VERSION"));
    println!("Watch blockchain transactions for block timeouts\n");
    println!("USAGE:");
    println!("    chainwatch <COMMAND> [FLAGS]\n");
    println!("COMMANDS:");
    println!("    head       Print the endpoint's current block number");
    println!("    watch      Fail once a transaction has waited too many blocks");
    println!("    receipt    Wait for a transaction receipt or a block timeout");
    println!("    version    Print version");
    println!("    help       Print this help\n");
    println!("FLAGS:");
    println!("    --url <URL>              RPC endpoint; ws:// or wss:// enables newHeads  [required]");
    println!("    --tx <HASH>              Transaction hash  [required for receipt]");
    println!("    --config <FILE>          JSON monitor config");
    println!("    --block-timeout <N>      Blocks to wait before failing  (default 50)");
    println!("    --poll-ms <MS>           Polling interval  (default 1000)");
    println!("    --setup-secs <S>         Wait for the first header before polling  (default 10)");
    println!("\nLogging is controlled by RUST_LOG (default: info).");
}

async fn run(command: &str, args: &[String]) -> anyhow::Result<()> {
    let url = parse_flag(args, "--url").context("--url is required")?;
    let config = monitor_config(args)?;

    if url.starts_with("ws://") || url.starts_with("wss://") {
        let client = WsRpcClient::connect(&url, WsClientConfig::default()).await?;
        dispatch(command, Arc::new(client), &config, args).await
    } else {
        let client = HttpRpcClient::default_for(&url)?;
        dispatch(command, Arc::new(client), &config, args).await
    }
}

async fn dispatch<P>(
    command: &str,
    provider: Arc<P>,
    config: &MonitorConfig,
    args: &[String],
) -> anyhow::Result<()>
where
    P: BlockProvider + ReceiptSource,
{
    let tx = parse_flag(args, "--tx");
    match command {
        "head" => cmd_head(&*provider).await,
        "watch" => cmd_watch(provider, config, tx.as_deref()).await,
        "receipt" => {
            let tx = tx.context("--tx is required")?;
            cmd_receipt(provider, config, &tx).await
        }
        other => bail!("unknown command {other}"),
    }
}

async fn cmd_head<P: BlockProvider>(provider: &P) -> anyhow::Result<()> {
    let start = std::time::Instant::now();
    let block = provider.block_number().await?;
    println!("  Block number: {block}");
    println!("  Latency:      {}ms", start.elapsed().as_millis());
    println!("  newHeads:     {}", provider.supports_subscriptions());
    Ok(())
}

async fn cmd_watch<P: BlockProvider>(
    provider: Arc<P>,
    config: &MonitorConfig,
    tx: Option<&str>,
) -> anyhow::Result<()> {
    let watcher = BlockTimeoutWatcher::new(provider, config.clone());
    let (failure, handle) = watcher.watch(tx).await?;
    println!(
        "Watching from block {} ({} blocks, {})",
        handle.starter_block_number(),
        config.block_timeout,
        handle.mode()
    );

    tokio::select! {
        err = failure => {
            handle.clean();
            Err(err.into())
        }
        signal = tokio::signal::ctrl_c() => {
            handle.clean();
            signal?;
            println!("Stopped in {} mode before any timeout", handle.mode());
            Ok(())
        }
    }
}

async fn cmd_receipt<P>(provider: Arc<P>, config: &MonitorConfig, tx: &str) -> anyhow::Result<()>
where
    P: BlockProvider + ReceiptSource,
{
    let receipt = wait_for_receipt(provider, config, tx).await?;
    println!("{}", serde_json::to_string_pretty(&receipt)?);
    if !receipt.is_success() {
        bail!("transaction {tx} reverted");
    }
    Ok(())
}

fn monitor_config(args: &[String]) -> anyhow::Result<MonitorConfig> {
    let mut config = match parse_flag(args, "--config") {
        Some(path) => {
            let raw = std::fs::read_to_string(&path).with_context(|| format!("reading {path}"))?;
            serde_json::from_str(&raw).with_context(|| format!("parsing {path}"))?
        }
        None => MonitorConfig::default(),
    };
    if let Some(n) = parse_number(args, "--block-timeout")? {
        config = config.with_block_timeout(n);
    }
    if let Some(ms) = parse_number(args, "--poll-ms")? {
        config = config.with_polling_interval(Duration::from_millis(ms));
    }
    if let Some(secs) = parse_number(args, "--setup-secs")? {
        config = config.with_header_setup_timeout(Duration::from_secs(secs));
    }
    Ok(config)
}

fn parse_number(args: &[String], flag: &str) -> anyhow::Result<Option<u64>> {
    parse_flag(args, flag)
        .map(|v| v.parse::<u64>().map_err(|e| anyhow!("{flag} {v:?}: {e}")))
        .transpose()
}

fn parse_flag(args: &[String], flag: &str) -> Option<String> {
    let pos = args.iter().position(|a| a == flag)?;
    args.get(pos + 1).cloned()
}
