use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use stashbox::auth::{TokenGenerator, issue_token, register_user};
use stashbox::blob::FsBlobStore;
use stashbox::config::ServerConfig;
use stashbox::server::{AppState, create_router};
use stashbox::store::{SqliteStore, Store};

const ADMIN_TOKEN_FILE: &str = ".admin_token";
const NOT_INITIALIZED: &str =
    "Server not initialized. Run 'stashbox init' first to create the database and admin token.";

#[cfg(unix)]
fn set_restrictive_permissions(path: &Path) {
    use std::os::unix::fs::PermissionsExt;
    if let Err(e) = fs::set_permissions(path, fs::Permissions::from_mode(0o600)) {
        tracing::warn!("Failed to set permissions on {}: {e}", path.display());
    }
}

#[derive(Parser)]
#[command(name = "stashbox")]
#[command(about = "A self-hosted object store with per-bucket sharing", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the server (create database and admin token)
    Init {
        /// Data directory for the database and blobs
        #[arg(long, default_value = "./data")]
        data_dir: PathBuf,
    },

    /// User management
    User {
        #[command(subcommand)]
        command: UserCommands,
    },

    /// Start the server
    Serve {
        /// TOML config file; flags below override its values
        #[arg(long, short)]
        config: Option<PathBuf>,

        /// Host to bind to
        #[arg(long)]
        host: Option<String>,

        /// Port to bind to
        #[arg(long, short)]
        port: Option<u16>,

        /// Data directory for the database and blobs
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum UserCommands {
    /// Register a user and print their token
    Add {
        /// Email address of the new user
        #[arg(long)]
        email: String,

        /// Data directory for the database and blobs
        #[arg(long, default_value = "./data")]
        data_dir: PathBuf,
    },
}

/// Opens the database of an initialized data directory.
fn open_store(data_dir: &Path) -> anyhow::Result<SqliteStore> {
    let db_path = data_dir.join("stashbox.db");
    if !db_path.exists() {
        bail!(NOT_INITIALIZED);
    }

    let store = SqliteStore::new(&db_path)?;
    store.initialize()?;
    if !store.has_admin_token()? {
        bail!(NOT_INITIALIZED);
    }
    Ok(store)
}

fn run_init(data_dir: &Path) -> anyhow::Result<()> {
    fs::create_dir_all(data_dir)
        .with_context(|| format!("Failed to create {}", data_dir.display()))?;

    let store = SqliteStore::new(data_dir.join("stashbox.db"))?;
    store.initialize()?;

    let token_file = data_dir.join(ADMIN_TOKEN_FILE);

    if store.has_admin_token()? {
        bail!(
            "Server already initialized. Admin token exists at: {}",
            token_file.display()
        );
    }

    let generator = TokenGenerator::new();
    let (_, raw_token) = issue_token(&store, &generator, None, true, None)?;
    fs::write(&token_file, &raw_token)?;

    #[cfg(unix)]
    set_restrictive_permissions(&token_file);

    println!();
    println!("========================================");
    println!("Admin token (save this, it won't be shown again):");
    println!();
    println!("  {raw_token}");
    println!();
    println!("Token also written to: {}", token_file.display());
    println!("========================================");
    println!();

    Ok(())
}

fn run_user_add(data_dir: &Path, email: &str) -> anyhow::Result<()> {
    let store = open_store(data_dir)?;
    let (user, raw_token) = register_user(&store, &TokenGenerator::new(), email)?;

    println!();
    println!("========================================");
    println!("User created: {} ({})", user.email, user.id);
    println!();
    println!("Token (save this, it won't be shown again):");
    println!();
    println!("  {raw_token}");
    println!("========================================");
    println!();

    Ok(())
}

async fn run_serve(config: ServerConfig) -> anyhow::Result<()> {
    let store = open_store(&config.data_dir)?;

    let token_file = config.data_dir.join(ADMIN_TOKEN_FILE);
    if token_file.exists() {
        info!("Admin token available at {}", token_file.display());
    }

    let blobs = FsBlobStore::new(&config.data_dir);
    let addr = config.socket_addr()?;
    let state = Arc::new(AppState::new(Arc::new(store), Arc::new(blobs), config));
    state.service.recover_blobs().await?;
    let app = create_router(state);

    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("stashbox=info".parse()?))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Init { data_dir } => run_init(&data_dir)?,
        Commands::User { command } => match command {
            UserCommands::Add { email, data_dir } => run_user_add(&data_dir, &email)?,
        },
        Commands::Serve {
            config,
            host,
            port,
            data_dir,
        } => {
            let mut config = match config {
                Some(path) => ServerConfig::load(&path)?,
                None => ServerConfig::default(),
            };
            if let Some(host) = host {
                config.host = host;
            }
            if let Some(port) = port {
                config.port = port;
            }
            if let Some(data_dir) = data_dir {
                config.data_dir = data_dir;
            }

            run_serve(config).await?;
        }
    }

    Ok(())
}
