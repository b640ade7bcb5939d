use anf_provision::abort::AbortSignal;
use anf_provision::azure::auth::AzureCredentials;
use anf_provision::azure::client::ArmClient;
use anf_provision::azure::http::format_arm_error;
use anf_provision::config::ServicePrincipal;
use anf_provision::demo::{self, DemoSettings};
use anf_provision::error::NetAppError;
use anf_provision::netapp::clients::ClientFactory;
use anf_provision::netapp::gateway::NetAppGateway;
use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;
use tracing::Level;
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::EnvFilter;

/// Provision an Azure NetApp Files demo topology
#[derive(Parser, Debug)]
#[command(name = "anf-provision", version, about, long_about = None)]
struct Args {
    /// Service principal file (az ad sp create-for-rbac --sdk-auth)
    #[arg(long, env = "AZURE_AUTH_LOCATION")]
    auth_file: Option<PathBuf>,

    /// Azure region
    #[arg(short, long, default_value = "eastus")]
    location: String,

    /// Existing resource group
    #[arg(short = 'g', long)]
    resource_group: String,

    /// Subnet delegated to Microsoft.NetApp/volumes
    #[arg(long)]
    subnet_id: String,

    #[arg(long, default_value = "anfaccount01")]
    account: String,

    #[arg(long, default_value = "pool01")]
    pool: String,

    /// Capacity pool size in TiB
    #[arg(long, default_value_t = 4)]
    pool_size_tib: u32,

    /// Ultra, Premium or Standard
    #[arg(long, default_value = "Premium")]
    service_level: String,

    #[arg(long, default_value = "nfsv3-vol01")]
    nfsv3_volume: String,

    #[arg(long, default_value = "nfsv41-vol01")]
    nfsv41_volume: String,

    /// Volume quota in GiB
    #[arg(long, default_value_t = 100)]
    volume_size_gib: u32,

    /// New quota of the NFSv4.1 volume in GiB
    #[arg(long, default_value_t = 200)]
    resized_volume_size_gib: u32,

    #[arg(long, default_value = "snapshot01")]
    snapshot: String,

    #[arg(long, default_value = "nfsv3-vol01-restored")]
    restored_volume: String,

    /// Seconds between resource checks
    #[arg(long, default_value_t = 10)]
    poll_interval: u64,

    /// Resource checks before giving up
    #[arg(long, default_value_t = 60)]
    poll_retries: u32,

    /// Delete everything again once the demo is done
    #[arg(long)]
    cleanup: bool,

    /// Log level (RUST_LOG takes precedence)
    #[arg(long, value_enum, default_value = "info")]
    log_level: LogLevel,

    /// Also write logs to this file
    #[arg(long)]
    log_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn to_tracing_level(self) -> Option<Level> {
        match self {
            LogLevel::Off => None,
            LogLevel::Error => Some(Level::ERROR),
            LogLevel::Warn => Some(Level::WARN),
            LogLevel::Info => Some(Level::INFO),
            LogLevel::Debug => Some(Level::DEBUG),
            LogLevel::Trace => Some(Level::TRACE),
        }
    }
}

fn setup_logging(level: LogLevel, log_file: Option<&PathBuf>) -> Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    let Some(tracing_level) = level.to_tracing_level() else {
        return Ok(None);
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(tracing_level.to_string().to_lowercase()));

    let Some(log_path) = log_file else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .init();
        return Ok(None);
    };

    if let Some(parent) = log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path)
        .with_context(|| format!("Failed to open log file {}", log_path.display()))?;

    let (non_blocking, guard) = tracing_appender::non_blocking(file);

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr.and(non_blocking))
        .with_ansi(false)
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .init();

    tracing::info!("Log file: {:?}", log_path);

    Ok(Some(guard))
}

fn load_principal(args: &Args) -> Result<ServicePrincipal> {
    let path = ServicePrincipal::resolve_path(args.auth_file.as_deref())
        .context("No auth file configured. Set AZURE_AUTH_LOCATION or use --auth-file")?;
    tracing::info!("Using auth file {}", path.display());
    ServicePrincipal::load(&path)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let log_guard = setup_logging(args.log_level, args.log_file.as_ref())?;

    let principal = load_principal(&args)?;
    let credentials = AzureCredentials::new(&principal)?;
    let arm = ArmClient::new(
        credentials,
        &principal.subscription_id,
        &principal.resource_manager_endpoint_url,
    )?;

    let (abort_tx, abort) = AbortSignal::new();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, aborting pending operations and waits");
            let _ = abort_tx.send(true);
        }
    });

    let gateway = NetAppGateway::new(ClientFactory::new(arm)).with_abort(abort);

    let settings = DemoSettings {
        location: args.location,
        resource_group: args.resource_group,
        subnet_id: args.subnet_id,
        account: args.account,
        pool: args.pool,
        pool_size_tib: args.pool_size_tib,
        service_level: args.service_level,
        nfsv3_volume: args.nfsv3_volume,
        nfsv41_volume: args.nfsv41_volume,
        volume_size_gib: args.volume_size_gib,
        resized_volume_size_gib: args.resized_volume_size_gib,
        snapshot: args.snapshot,
        restored_volume: args.restored_volume,
        poll_interval: Duration::from_secs(args.poll_interval),
        poll_retries: args.poll_retries,
        cleanup: args.cleanup,
    };

    if let Err(err) = demo::run(&gateway, &settings).await {
        tracing::error!("Demo failed: {}", err);
        eprintln!("Error: {}", describe(&err));
        drop(log_guard);
        std::process::exit(1);
    }

    println!("Done");
    Ok(())
}

fn describe(err: &NetAppError) -> String {
    match err {
        NetAppError::Submission { action, source } => format!("cannot {}: {}", action, format_arm_error(source)),
        NetAppError::Completion { action, source } => {
            format!("cannot get the {} response: {}", action, format_arm_error(source))
        }
        NetAppError::Api(source) => format_arm_error(source),
        other => other.to_string(),
    }
}
