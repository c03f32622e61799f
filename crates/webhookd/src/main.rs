//! webhookd — the webhook worker daemon.
//!
//! Runs the webhook controller against the local state store: every
//! scan interval it discovers the webhook workers configured for each
//! tenant, starts them, and keeps them health checked until Ctrl-C.
//! The `tenant` and `worker` subcommands edit the records it reads.
//!
//! # Usage
//!
//! ```text
//! webhookd tenant add acme
//! webhookd worker add --tenant acme --id billing --url https://billing.acme.example/webhook --secret s3cret
//! webhookd run --config /etc/webhookd.toml
//! ```

mod admin;
mod config;

use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use warpgrid_health::HttpProbe;
use warpgrid_state::StateStore;
use warpgrid_webhooks::{Controller, ControllerDeps, SigningKeyIssuer, StoreTransport};

use crate::config::{parse_duration_arg, DaemonConfig, Overrides};

const DEFAULT_LOG_FILTER: &str = "info,webhookd=debug,warpgrid=debug";

#[derive(Parser)]
#[command(name = "webhookd", about = "Webhook worker daemon")]
struct Cli {
    /// Path to webhookd.toml.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Data directory for the state store (overrides the config file).
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Log output format.
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Command {
    /// Run the webhook controller until Ctrl-C.
    Run {
        /// Tenant scan interval, e.g. 30s or 2m.
        #[arg(long, value_parser = parse_duration_arg)]
        scan_interval: Option<Duration>,

        /// Key used to sign worker tokens.
        #[arg(long)]
        signing_key: Option<String>,

        /// Scan once, release everything started, and exit.
        #[arg(long)]
        once: bool,
    },
    /// Manage tenants.
    Tenant {
        #[command(subcommand)]
        command: TenantCommand,
    },
    /// Manage webhook worker records.
    Worker {
        #[command(subcommand)]
        command: WorkerCommand,
    },
}

#[derive(Subcommand)]
enum TenantCommand {
    /// Create a tenant.
    Add { id: String },
    /// List tenants as JSON lines.
    List,
    /// Delete a tenant and every webhook worker record under it.
    Remove { id: String },
}

#[derive(Subcommand)]
enum WorkerCommand {
    /// Create or update a webhook worker.
    Add {
        #[arg(long)]
        tenant: String,
        #[arg(long)]
        id: String,
        #[arg(long)]
        url: String,
        #[arg(long)]
        secret: String,
    },
    /// List a tenant's webhook workers as JSON lines.
    List {
        #[arg(long)]
        tenant: String,
    },
    /// Delete a webhook worker record.
    Remove {
        #[arg(long)]
        tenant: String,
        #[arg(long)]
        id: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    let mut overrides = Overrides {
        data_dir: cli.data_dir,
        ..Default::default()
    };

    match cli.command {
        Command::Run {
            scan_interval,
            signing_key,
            once,
        } => {
            overrides.scan_interval = scan_interval;
            overrides.signing_key = signing_key;
            let config = DaemonConfig::load(cli.config.as_deref(), overrides)?;
            run(config, once).await
        }
        Command::Tenant { command } => {
            let config = DaemonConfig::load(cli.config.as_deref(), overrides)?;
            let store = open_store(&config)?;
            match command {
                TenantCommand::Add { id } => admin::add_tenant(&store, &id),
                TenantCommand::List => admin::list_tenants(&store, &mut io::stdout().lock()),
                TenantCommand::Remove { id } => admin::remove_tenant(&store, &id),
            }
        }
        Command::Worker { command } => {
            let config = DaemonConfig::load(cli.config.as_deref(), overrides)?;
            let store = open_store(&config)?;
            match command {
                WorkerCommand::Add {
                    tenant,
                    id,
                    url,
                    secret,
                } => admin::add_worker(&store, &tenant, &id, &url, &secret),
                WorkerCommand::List { tenant } => {
                    admin::list_workers(&store, &tenant, &mut io::stdout().lock())
                }
                WorkerCommand::Remove { tenant, id } => admin::remove_worker(&store, &tenant, &id),
            }
        }
    }
}

fn init_tracing(format: LogFormat) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

fn open_store(config: &DaemonConfig) -> anyhow::Result<StateStore> {
    std::fs::create_dir_all(&config.data_dir)
        .with_context(|| format!("creating data dir {}", config.data_dir.display()))?;
    let db_path = config.db_path();
    let store = StateStore::open(&db_path)?;
    info!(path = ?db_path, "state store opened");
    Ok(store)
}

async fn run(config: DaemonConfig, once: bool) -> anyhow::Result<()> {
    let Some(signing_key) = config.signing_key.clone() else {
        bail!("signing_key must be set in the config file or with --signing-key");
    };
    let store = open_store(&config)?;

    let deps = ControllerDeps {
        repository: Arc::new(store.clone()),
        issuer: Arc::new(SigningKeyIssuer::new(signing_key)?),
        transport: Arc::new(StoreTransport::new(store)),
        probe: Arc::new(HttpProbe::new(config.controller.probe_timeout)?),
    };
    let controller = Controller::new(deps, config.controller);

    if once {
        info!("webhookd running a single scan");
        let scanned = controller.scan_once().await;
        let released = controller.release_all().await;
        let report = scanned?;
        info!(?report, "single scan finished");
        released?;
        return Ok(());
    }

    let shutdown = controller.start()?;
    info!("webhookd running, press Ctrl-C to stop");

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "could not listen for Ctrl-C, shutting down");
    }
    info!(workers = ?controller.registered_workers(), "shutdown signal received");

    shutdown.shutdown().await?;
    info!("webhookd stopped");
    Ok(())
}
