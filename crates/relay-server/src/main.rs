//! payload-relay entry point.
//!
//! Finds devices on the local /24 that listen on the two device ports and
//! pushes payload files to them.
//!
//! # Usage
//!
//! ```text
//! payload-relay [--config FILE] serve [--bind ADDR]
//! payload-relay [--config FILE] scan  [--interface NAME]
//! payload-relay [--config FILE] send  --ip IP --port PORT (--file PATH | --payload NAME)
//! ```
//!
//! `serve` runs the WebSocket front end for browsers.  `scan` and `send` are
//! one-shot: progress events are printed as JSON lines while they happen and
//! the final result is printed as pretty JSON.
//!
//! # Environment variable overrides
//!
//! | Variable               | Default        | Description              |
//! |------------------------|----------------|--------------------------|
//! | `PAYLOAD_RELAY_CONFIG` | (none)         | TOML config file         |
//! | `PAYLOAD_RELAY_BIND`   | `0.0.0.0:3000` | WebSocket listen address |
//! | `RUST_LOG`             | `log_level`    | Log filter               |

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::EnvFilter;

use relay_server::application::{
    delivery_reply, DeliveryTrigger, EventBroadcaster, RelayService, Subscription, Upload,
};
use relay_server::build_service;
use relay_server::domain::{PortField, RelayConfig, RelayReply};
use relay_server::infrastructure::{load_config, run_server};

// ── CLI argument definitions ──────────────────────────────────────────────────

#[derive(Debug, Parser)]
#[command(
    name = "payload-relay",
    about = "Subnet discovery and payload delivery for devices on the local network",
    version
)]
struct Cli {
    /// TOML configuration file.  A missing file means built-in defaults.
    #[arg(long, global = true, env = "PAYLOAD_RELAY_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Serve the WebSocket front end until Ctrl+C.
    Serve {
        /// Address to listen on; overrides `server.bind_addr`.
        #[arg(long, env = "PAYLOAD_RELAY_BIND")]
        bind: Option<SocketAddr>,
    },

    /// Sweep the local /24 once and print the devices found.
    Scan {
        /// Interface to scan from.  Picked automatically when omitted.
        #[arg(long)]
        interface: Option<String>,
    },

    /// Deliver one payload and print the result.
    Send(SendArgs),
}

#[derive(Debug, Args)]
#[command(group(clap::ArgGroup::new("source").required(true).args(["file", "payload"])))]
struct SendArgs {
    /// Device IP address.
    #[arg(long)]
    ip: String,

    /// Device port.
    #[arg(long)]
    port: u16,

    /// Local file to upload.
    #[arg(long)]
    file: Option<PathBuf>,

    /// Name of a predefined payload in `server.payloads_dir`.
    #[arg(long)]
    payload: Option<String>,
}

impl SendArgs {
    async fn into_trigger(self) -> anyhow::Result<DeliveryTrigger> {
        let upload = match self.file {
            Some(path) => {
                let name = path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .with_context(|| format!("not a file path: {}", path.display()))?
                    .to_string();
                let bytes = tokio::fs::read(&path)
                    .await
                    .with_context(|| format!("failed to read {}", path.display()))?;
                Some(Upload { name, bytes })
            }
            None => None,
        };
        Ok(DeliveryTrigger {
            ip_address: Some(self.ip),
            port: Some(PortField::Number(u64::from(self.port))),
            file_name: self.payload,
            upload,
        })
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref()).context("failed to load configuration")?;

    // RUST_LOG wins; otherwise the configured level.
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    tracing::subscriber::set_global_default(log_subscriber(filter, std::io::stderr))
        .context("failed to install log subscriber")?;

    let events = Arc::new(EventBroadcaster::new());
    let service = build_service(&config, Arc::clone(&events));

    match cli.command {
        Command::Serve { bind } => serve(config, bind, service).await,
        Command::Scan { interface } => {
            let printer = print_events(events.subscribe());
            let report = service.handle_scan(interface.as_deref()).await;
            finish_printing(&service, printer).await;
            let report = report?;
            print_pretty(&RelayReply::ScanResult {
                local_ips: report.local_interfaces,
                active_hosts: report.live_hosts,
            })
        }
        Command::Send(args) => {
            let trigger = args.into_trigger().await?;
            let printer = print_events(events.subscribe());
            let result = service.handle_delivery(trigger).await;
            finish_printing(&service, printer).await;
            let result = result?;
            print_pretty(&delivery_reply(&result))?;
            match result.error() {
                Some(error) => anyhow::bail!("delivery failed: {error}"),
                None => Ok(()),
            }
        }
    }
}

async fn serve(config: RelayConfig, bind: Option<SocketAddr>, service: RelayService) -> anyhow::Result<()> {
    let bind_addr = bind.unwrap_or(config.server.bind_addr);
    info!("payload relay starting: ws={bind_addr}");

    let running = Arc::new(AtomicBool::new(true));
    let running_clone = Arc::clone(&running);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("received Ctrl+C, shutting down");
                running_clone.store(false, Ordering::Relaxed);
            }
            Err(e) => tracing::error!("failed to listen for Ctrl+C signal: {e}"),
        }
    });

    run_server(bind_addr, Arc::new(service), running).await?;
    info!("payload relay stopped");
    Ok(())
}

// ── Output ────────────────────────────────────────────────────────────────────

/// Log formatter writing to `writer`.  stdout is reserved for the JSON that
/// `scan` and `send` print, so the binary passes stderr.
fn log_subscriber<W>(filter: EnvFilter, writer: W) -> impl tracing::Subscriber + Send + Sync
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .finish()
}

struct EventPrinter {
    id: uuid::Uuid,
    task: tokio::task::JoinHandle<()>,
}

/// Prints each event as one JSON line until the subscription ends.
fn print_events(mut subscription: Subscription) -> EventPrinter {
    let id = subscription.id();
    let task = tokio::spawn(async move {
        while let Some(event) = subscription.recv().await {
            if let Ok(line) = serde_json::to_string(&event) {
                println!("{line}");
            }
        }
    });
    EventPrinter { id, task }
}

/// Ends the subscription and waits until every queued event is printed.
async fn finish_printing(service: &RelayService, printer: EventPrinter) {
    service.events().unsubscribe(printer.id);
    if let Err(e) = printer.task.await {
        tracing::warn!("event printer failed: {e}");
    }
}

fn print_pretty<T: Serialize>(value: &T) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(value).context("failed to serialize result")?;
    println!("{json}");
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
