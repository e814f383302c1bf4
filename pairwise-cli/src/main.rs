use std::process;

use clap::{Parser, Subcommand};

use rst_common::with_logging::log::{debug, error};
use rst_common::with_tokio::tokio;
use rst_common::with_tracing::tracing_subscriber::{
    self, layer::SubscriberExt, util::SubscriberInitExt,
};

use prople_pairwise_rpc::ConfigManager;

use prople_pairwise_cli::commands::connection::{connection_handler, ConnectionArgs};
use prople_pairwise_cli::commands::credential::{credential_handler, CredentialArgs};
use prople_pairwise_cli::commands::handler::ContextHandler;
use prople_pairwise_cli::commands::invite::{invite_handler, InviteArgs};
use prople_pairwise_cli::types::{CliError, PAIRWISE_CONFIG_FILE, PAIRWISE_DEFAULT_DIR};
use prople_pairwise_cli::utils::homedir::setup_homedir;

#[derive(Parser)]
#[command(name = "prople-pairwise-cli")]
#[command(version = "0.1.0")]
#[command(long_about = None)]
struct Cli {
    #[arg(long, default_value = "info")]
    log_level: String,

    /// config is the path of the toml configuration, defaults to ~/.pairwise/config.toml
    #[arg(long)]
    config: Option<String>,

    #[command(subcommand)]
    commands: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Decode invitations
    Invite(InviteArgs),

    /// Manage pairwise connections
    Connection(ConnectionArgs),

    /// Manage credential offers and issued credentials
    Credential(CredentialArgs),
}

fn setup_logging(log_level: &str) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!(
                    "{}={},prople_pairwise_core={},prople_pairwise_rpc={}",
                    env!("CARGO_CRATE_NAME"),
                    log_level,
                    log_level,
                    log_level
                )
                .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().without_time().compact())
        .init();
}

fn build_context(config: Option<String>) -> Result<ContextHandler, CliError> {
    let pairwise_dir = setup_homedir(PAIRWISE_DEFAULT_DIR)?;
    let config_file = config.unwrap_or(format!("{}/{}", pairwise_dir, PAIRWISE_CONFIG_FILE));
    debug!("[cli] config file: {}", config_file);

    let config = ConfigManager::new(config_file)
        .parse()
        .map_err(|err| CliError::ConfigError(err.to_string()))?;

    ContextHandler::new(config)
}

async fn run(cli: Cli) -> Result<(), CliError> {
    match cli.commands {
        Commands::Invite(args) => invite_handler(args.commands),
        Commands::Connection(args) => {
            let ctx = build_context(cli.config)?;
            connection_handler(&ctx, args.commands).await
        }
        Commands::Credential(args) => {
            let ctx = build_context(cli.config)?;
            credential_handler(&ctx, args.commands).await
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    setup_logging(&cli.log_level);

    if let Err(err) = run(cli).await {
        error!("{}", err);
        process::exit(1)
    }
}
