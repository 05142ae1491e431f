//! `capstan serve` — run the update agent until interrupted.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use capstan_agent::{AgentConfig, SystemctlController, UpdateAgent};
use capstan_install::InstallLayout;
use capstan_net::{FileTokenSource, HttpClient};
use capstan_tuf::{HttpTufRepo, RepoOptions};
use clap::{Args, Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use url::Url;

const DEFAULT_METADATA_URL: &str =
    "https://sorayaormazabalmayo.github.io/TUF_Repository_YubiKey_Vault/metadata/";
const DEFAULT_TARGETS_URL: &str =
    "https://sorayaormazabalmayo.github.io/TUF_Repository_YubiKey_Vault/targets/";

#[derive(Parser)]
#[command(name = "capstan", about = "Secure update agent for a managed service")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the update agent loops.
    Serve(ServeArgs),
}

#[derive(Args)]
struct ServeArgs {
    /// Config file in yaml format (accepted for compatibility, unused).
    #[arg(long)]
    config: Option<PathBuf>,

    /// HTTP address of the managed service (informational).
    #[arg(long, default_value = "localhost:8000")]
    http_addr: String,

    /// Internal HTTP address of the managed service (informational).
    #[arg(long, default_value = "localhost:9000")]
    internal_http_addr: String,

    /// Enable debug logging.
    #[arg(long)]
    debug: bool,

    /// Apply updates as soon as they land, without waiting for consent.
    #[arg(long)]
    auto_update: bool,

    /// Base URL of the trusted metadata repository.
    #[arg(long, default_value = DEFAULT_METADATA_URL)]
    metadata_url: Url,

    /// Base URL of the target files.
    #[arg(long, default_value = DEFAULT_TARGETS_URL)]
    targets_url: Url,

    /// Root of the installation layout.
    #[arg(long, default_value = "/var/lib/capstan")]
    install_root: PathBuf,

    /// Name of the managed service.
    #[arg(long)]
    service_name: String,

    /// Active-executable symlink (defaults to /usr/local/bin/<service>).
    #[arg(long)]
    bin_link: Option<PathBuf>,

    /// Active-config symlink (defaults to /etc/<service>/<service>.yml).
    #[arg(long)]
    config_link: Option<PathBuf>,

    /// Unit to restart after a swap (defaults to <service>.service).
    #[arg(long)]
    unit: Option<String>,

    /// Bearer-token material for the artifact store.
    #[arg(long, default_value = "/etc/capstan/service-account.token")]
    service_account_key: PathBuf,

    /// Seconds between metadata refreshes.
    #[arg(long, default_value_t = 60)]
    poll_interval_metadata: u64,

    /// Seconds between consent checks.
    #[arg(long, default_value_t = 5)]
    poll_interval_consent: u64,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match cli.command {
        Command::Serve(args) => serve(args).await,
    }
}

async fn serve(args: ServeArgs) -> ExitCode {
    let mut config = AgentConfig::new(
        args.install_root,
        args.service_name,
        args.metadata_url.clone(),
        args.targets_url.clone(),
    )
    .with_service_account_key(args.service_account_key)
    .with_auto_apply(args.auto_update)
    .with_poll_intervals(
        Duration::from_secs(args.poll_interval_metadata),
        Duration::from_secs(args.poll_interval_consent),
    )
    .with_verbosity(u8::from(args.debug));
    if let Some(link) = args.bin_link {
        config = config.with_bin_link(link);
    }
    if let Some(link) = args.config_link {
        config = config.with_config_link(link);
    }
    if let Some(unit) = args.unit {
        config = config.with_managed_unit(unit);
    }

    let default_level = match config.verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    if let Err(e) = tracing_subscriber::fmt().with_env_filter(filter).try_init() {
        eprintln!("failed to initialize logging: {e}");
        return ExitCode::FAILURE;
    }

    info!(
        service = %config.service_name,
        install_root = %config.install_root.display(),
        http_addr = %args.http_addr,
        internal_http_addr = %args.internal_http_addr,
        "starting update agent"
    );

    let net = HttpClient::new(config.net.clone());

    let layout = InstallLayout::new(&config.install_root, &config.service_name);
    let repo = Arc::new(HttpTufRepo::new(
        net,
        RepoOptions {
            metadata_url: config.metadata_url.clone(),
            targets_url: config.targets_url.clone(),
            metadata_dir: layout.tmp_dir(),
            prefix_targets_with_hash: true,
        },
    ));

    let tokens = match &config.service_account_key_path {
        Some(path) => Arc::new(FileTokenSource::new(path)),
        None => {
            error!("a service account key path is required");
            return ExitCode::FAILURE;
        }
    };

    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received, shutting down");
            signal_cancel.cancel();
        }
    });

    let agent = UpdateAgent::new(config, repo, tokens, Arc::new(SystemctlController), cancel);
    match agent.run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "update agent failed to start");
            ExitCode::FAILURE
        }
    }
}
