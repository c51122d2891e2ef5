use anyhow::Context;
use artpreneur_core::{ArtpreneurConfig, HealthScoreEngine};
use artpreneur_gateway::{GatewayServer, JwtIdentity};
use artpreneur_store::SqliteStore;
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(name = "artpreneur", author, version, about, long_about = None)]
struct Args {
    /// Path to the TOML config file
    #[arg(short, long, default_value = "artpreneur.toml", env = "ARTPRENEUR_CONFIG")]
    config: String,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the health score HTTP endpoints
    Serve,
    /// Calculate and store one user's health score, then print it
    Score {
        #[arg(long)]
        user: Uuid,
    },
    /// Mint a bearer token for a user with the configured secret
    Token {
        #[arg(long)]
        user: Uuid,
        /// Token lifetime; defaults to auth.token_ttl_secs
        #[arg(long)]
        ttl_secs: Option<u64>,
    },
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    // Logs go to stderr so `score` and `token` output stays pipeable
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn build_engine(config: &ArtpreneurConfig) -> anyhow::Result<HealthScoreEngine> {
    info!("Opening database at {}...", config.database.path);
    let store = Arc::new(SqliteStore::new(&config.database.path).await?);
    Ok(HealthScoreEngine::new(store, config.scoring.clone()))
}

fn build_identity(config: &ArtpreneurConfig) -> anyhow::Result<JwtIdentity> {
    JwtIdentity::new(config.auth.jwt_secret.clone(), config.auth.audience.clone())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let args = Args::parse();
    init_tracing(args.json);

    let config = ArtpreneurConfig::load_or_default(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config))?;

    match args.command {
        Command::Serve => {
            let identity = build_identity(&config)?;
            let engine = build_engine(&config).await?;
            let server = GatewayServer::new(
                engine,
                Arc::new(identity),
                &config.server.host,
                config.server.port,
            );
            server.serve().await?;
        }
        Command::Score { user } => {
            let engine = build_engine(&config).await?;
            let scores = engine.calculate(user).await?;
            println!("{}", serde_json::to_string_pretty(&scores)?);
        }
        Command::Token { user, ttl_secs } => {
            let identity = build_identity(&config)?;
            let token = identity.issue(user, ttl_secs.unwrap_or(config.auth.token_ttl_secs))?;
            println!("{}", token);
        }
    }

    Ok(())
}
