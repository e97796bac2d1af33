//! attr-ratings - rating and review aggregation service
//!
//! Serves the submission endpoint and writes aggregated state to a remote
//! field store (or an in-memory one with `--memory-store`).
//!
//! Exit codes:
//!   0 - Clean shutdown or --init-config written
//!   1 - Invalid arguments, bad configuration, or server failure

use anyhow::{Context, Result};
use attr_ratings::cli::Args;
use attr_ratings::config::{Config, DEFAULT_CONFIG_FILE};
use attr_ratings::router::SubmissionRouter;
use attr_ratings::server;
use attr_ratings::store::{FieldStore, GraphqlFieldStore, InMemoryFieldStore};
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    // Initialize logging
    init_logging(&args);

    info!("attr-ratings v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    if let Err(e) = run_server(args).await {
        error!("Server failed: {:#}", e);
        eprintln!("\n❌ Error: {:#}", e);
        std::process::exit(1);
    }
    Ok(())
}

/// Handle --init-config: generate a default config file.
fn handle_init_config() -> Result<()> {
    let path = std::path::Path::new(DEFAULT_CONFIG_FILE);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            DEFAULT_CONFIG_FILE
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", DEFAULT_CONFIG_FILE))?;

    println!("✅ Created {} with default settings.", DEFAULT_CONFIG_FILE);
    println!("   Edit it to customize the store, field keys, and aggregation.");
    Ok(())
}

/// Initialize logging. `RUST_LOG` wins over the -v/-q level when set.
fn init_logging(args: &Args) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(args.log_level().as_str().to_lowercase()));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

/// Build the store and router, then serve until the listener fails.
async fn run_server(args: Args) -> Result<()> {
    // Load configuration
    let mut config = load_config(&args)?;
    config.merge_with_args(&args);

    // Step 1: Build the field store
    let store = build_store(&args, &config)?;

    // Step 2: Wire the pipelines
    let submissions = Arc::new(SubmissionRouter::from_config(store, &config));
    let app = server::router(submissions, &config.server.path);

    // Step 3: Serve
    let addr = config.listen_addr();
    println!("🚀 Serving {} on {}", config.server.path, addr);
    server::serve(app, &addr)
        .await
        .with_context(|| format!("Failed to serve on {}", addr))
}

/// Pick the in-memory store or the GraphQL store.
fn build_store(args: &Args, config: &Config) -> Result<Arc<dyn FieldStore>> {
    if args.memory_store {
        warn!("Using in-memory store; data is lost on exit");
        return Ok(Arc::new(InMemoryFieldStore::new()));
    }

    config.validate_remote_store()?;
    let token = args
        .access_token
        .clone()
        .context("An access token is required for the remote store")?;
    let store = GraphqlFieldStore::new(&config.store, token)
        .context("Failed to create store client")?;
    Ok(Arc::new(store))
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Config::load(config_path);
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => {
            info!("Loaded default config from {}", DEFAULT_CONFIG_FILE);
            Ok(config)
        }
        Ok(None) => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
        Err(e) => {
            warn!("Failed to load config: {}", e);
            Ok(Config::default())
        }
    }
}
