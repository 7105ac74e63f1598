use crate::server;
use clap::{Args, Parser, Subcommand};
use realty_listings::config::{AppConfig, StoreBackend};
use realty_listings::error::AppError;
use realty_listings::{seed, store, telemetry};
use tracing::info;

#[derive(Parser, Debug)]
#[command(
    name = "Real Estate Listing Platform",
    about = "Serve and bootstrap the real-estate listing API",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Create indexes and load the sample catalogue, then exit
    Init(StoreArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct StoreArgs {
    /// Override the configured store backend (`mongo` or `memory`)
    #[arg(long, value_parser = StoreBackend::parse)]
    pub(crate) store: Option<StoreBackend>,
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
    #[command(flatten)]
    pub(crate) store: StoreArgs,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Init(args) => run_init(args).await,
    }
}

async fn run_init(args: StoreArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;
    if let Some(backend) = args.store {
        config.store.backend = backend;
    }
    telemetry::init(&config.telemetry)?;

    let store = store::connect(&config.store)
        .await
        .map_err(AppError::Bootstrap)?;
    let outcome = seed::initialize(store.as_ref())
        .await
        .map_err(AppError::Bootstrap)?;

    info!(database = %config.store.database, ?outcome, "database initialized");
    println!("Database initialized successfully");
    Ok(())
}
