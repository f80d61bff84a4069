//! Cubby - Multi-user File Storage Backend
//!
//! Server binary: loads the configuration, wires the object store, user
//! store and token issuer together, and serves the HTTP API.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cubby::advisor::FolderAdvisor;
use cubby::api::{AppState, HttpServer};
use cubby::auth::TokenIssuer;
use cubby::config::{CubbyConfig, StorageBackend, StorageConfig};
use cubby::error::Result;
use cubby::namespace::Namespace;
use cubby::store::{MemoryStore, ObjectStore, S3Store};
use cubby::users::UserStore;

/// Cubby - Multi-user File Storage Backend
#[derive(Parser)]
#[command(name = "cubby")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "cubby.toml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error); overrides the config file
    #[arg(short, long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the API server
    Start,

    /// Initialize a new configuration file
    Init {
        /// Output path for configuration file
        #[arg(short, long, default_value = "cubby.toml")]
        output: PathBuf,

        /// Bucket holding user files
        #[arg(long, default_value = "cubby-files")]
        bucket: String,
    },

    /// Validate configuration file
    Validate,

    /// Show server configuration
    Info,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let logging = CubbyConfig::from_file(&cli.config).ok().map(|c| c.logging);
    let level = cli
        .log_level
        .clone()
        .or_else(|| logging.as_ref().map(|l| l.level.clone()))
        .unwrap_or_else(|| "info".to_string());
    let format = logging.map(|l| l.format).unwrap_or_else(|| "pretty".to_string());
    init_logging(&level, &format);

    match cli.command {
        Commands::Start => run_start(cli.config).await,
        Commands::Init { output, bucket } => run_init(output, bucket),
        Commands::Validate => run_validate(cli.config),
        Commands::Info => run_info(cli.config),
    }
}

/// Initialize logging
fn init_logging(level: &str, format: &str) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| level.into());

    let registry = tracing_subscriber::registry().with(env_filter);
    if format == "json" {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// Start the API server
async fn run_start(config_path: PathBuf) -> Result<()> {
    let config = CubbyConfig::from_file(&config_path)?;

    tracing::info!("Starting Cubby v{}", cubby::VERSION);
    tracing::info!(
        "Storage: {:?} bucket {:?}",
        config.storage.backend,
        config.storage.bucket
    );

    let store = build_store(&config.storage)?;
    let namespace = Arc::new(Namespace::new(store, &config.namespace));

    let users = Arc::new(UserStore::open(&config.users.database_path)?);
    tracing::info!(
        "User store at {} ({} users)",
        config.users.database_path.display(),
        users.count().await?
    );

    let tokens = TokenIssuer::new(&config.auth.jwt_secret, config.token_ttl())?;

    let advisor = FolderAdvisor::from_config(&config.advisor)?;
    match &advisor {
        Some(advisor) => tracing::info!("Folder advisor at {}", advisor.endpoint()),
        None => tracing::info!("Folder advisor disabled"),
    }

    let server = HttpServer::new(
        config.server.clone(),
        AppState {
            namespace,
            users,
            tokens,
            advisor,
        },
    );

    tokio::select! {
        result = server.start() => {
            if let Err(e) = result {
                tracing::error!("HTTP server error: {}", e);
                return Err(e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Received shutdown signal");
        }
    }

    tracing::info!("Cubby stopped");
    Ok(())
}

fn build_store(config: &StorageConfig) -> Result<Arc<dyn ObjectStore>> {
    match config.backend {
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory object store, files will not survive a restart");
            Ok(Arc::new(
                MemoryStore::new(config.bucket.clone()).with_page_size(config.page_size),
            ))
        }
        StorageBackend::S3 => Ok(Arc::new(S3Store::new(config)?)),
    }
}

/// Initialize a new configuration file
fn run_init(output: PathBuf, bucket: String) -> Result<()> {
    let config_content = format!(
        r#"# Cubby Configuration
# Generated configuration file

[server]
bind_address = "0.0.0.0:8080"
cors_enabled = true
cors_origins = ["http://localhost:5173"]
max_upload_mb = 100

[storage]
backend = "s3"
bucket = "{bucket}"
region = "us-east-1"
# endpoint = "http://localhost:9000"
# path_style = true
# Credentials can also come from CUBBY_S3_ACCESS_KEY / CUBBY_S3_SECRET_KEY
# access_key = ""
# secret_key = ""
page_size = 1000

[auth]
# At least 32 characters; can also come from CUBBY_JWT_SECRET
jwt_secret = ""
token_ttl_secs = 86400

[users]
database_path = "/var/lib/cubby/users.db"

[namespace]
max_attempts = 10000

[advisor]
# url = "http://localhost:5000"
timeout_ms = 5000

[logging]
level = "info"
format = "pretty"
"#
    );

    std::fs::write(&output, config_content)?;
    println!("Configuration file created: {}", output.display());
    println!("\nSet auth.jwt_secret and the storage settings.");
    println!("Then start with: cubby --config {} start", output.display());

    Ok(())
}

/// Validate configuration
fn run_validate(config_path: PathBuf) -> Result<()> {
    match CubbyConfig::from_file(&config_path) {
        Ok(config) => {
            println!("✓ Configuration is valid");
            println!("  Bind Address: {}", config.server.bind_address);
            println!(
                "  Storage: {:?} ({})",
                config.storage.backend, config.storage.bucket
            );
            println!("  Users DB: {}", config.users.database_path.display());
            println!(
                "  Advisor: {}",
                config.advisor.url.as_deref().unwrap_or("(disabled)")
            );
            Ok(())
        }
        Err(e) => {
            eprintln!("✗ Configuration error: {}", e);
            Err(e)
        }
    }
}

/// Show server configuration
fn run_info(config_path: PathBuf) -> Result<()> {
    let config = CubbyConfig::from_file(&config_path)?;

    println!("Cubby Server Information");
    println!("========================");
    println!();
    println!("Version:          {}", cubby::VERSION);
    println!("Bind Address:     {}", config.server.bind_address);
    println!("CORS:             {}", config.server.cors_enabled);
    if config.server.cors_enabled {
        println!("  Origins:        {:?}", config.server.cors_origins);
    }
    println!("Max Upload:       {} MB", config.server.max_upload_mb);
    println!();
    println!("Storage Configuration:");
    println!("  Backend:        {:?}", config.storage.backend);
    println!("  Bucket:         {}", config.storage.bucket);
    println!("  Region:         {}", config.storage.region);
    println!(
        "  Endpoint:       {}",
        config.storage.endpoint.as_deref().unwrap_or("(default)")
    );
    println!("  Path Style:     {}", config.storage.path_style);
    println!("  Page Size:      {}", config.storage.page_size);
    println!();
    println!("Namespace:");
    println!("  Max Attempts:   {}", config.namespace.max_attempts);
    println!();
    println!("Auth:");
    println!("  Token TTL:      {} s", config.auth.token_ttl_secs);
    println!("  Users DB:       {}", config.users.database_path.display());
    println!();
    println!(
        "Advisor:          {}",
        config.advisor.url.as_deref().unwrap_or("(disabled)")
    );

    Ok(())
}
