use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::bail;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use dockyard::auth::TokenGenerator;
use dockyard::config::ServerConfig;
use dockyard::project::{AuditLogger, ProjectController, ProjectPolicy};
use dockyard::server::{AppState, create_router};
use dockyard::store::{SqliteStore, Store};

const ADMIN_USERNAME: &str = "admin";
const NOT_INITIALIZED: &str =
    "Server not initialized. Run 'dockyard admin init' first to create the database and admin user.";

#[cfg(unix)]
fn set_restrictive_permissions(path: &Path) {
    use std::os::unix::fs::PermissionsExt;
    if let Err(e) = fs::set_permissions(path, fs::Permissions::from_mode(0o600)) {
        tracing::warn!("Failed to set permissions on {}: {e}", path.display());
    }
}

#[derive(Parser)]
#[command(name = "dockyard")]
#[command(about = "A project registry server", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Administrative commands
    Admin {
        #[command(subcommand)]
        command: AdminCommands,
    },

    /// Start the server
    Serve {
        /// TOML configuration file; flags below override its values
        #[arg(long, short)]
        config: Option<PathBuf>,

        /// Host to bind to
        #[arg(long)]
        host: Option<String>,

        /// Port to bind to
        #[arg(long, short)]
        port: Option<u16>,

        /// Data directory for the database
        #[arg(long)]
        data_dir: Option<PathBuf>,

        /// Restrict project creation to system admins
        #[arg(long)]
        only_admin_create_project: bool,
    },
}

#[derive(Subcommand)]
enum AdminCommands {
    /// Initialize the server (create database and admin user)
    Init {
        /// Data directory for the database
        #[arg(long, default_value = "./data")]
        data_dir: PathBuf,

        /// Skip interactive prompts
        #[arg(long)]
        non_interactive: bool,
    },
}

fn print_token(heading: &str, raw_token: &str) {
    println!();
    println!("========================================");
    println!("{heading}");
    println!();
    println!("  {raw_token}");
    println!();
}

fn run_init(data_dir: &Path, non_interactive: bool) -> anyhow::Result<()> {
    fs::create_dir_all(data_dir)?;

    let config = ServerConfig {
        data_dir: data_dir.to_path_buf(),
        ..ServerConfig::default()
    };
    let store = SqliteStore::new(config.db_path())?;
    store.initialize()?;

    let token_file = data_dir.join(".admin_token");

    if store.has_system_admin()? {
        bail!(
            "Server already initialized. Admin token exists at: {}",
            token_file.display()
        );
    }

    let admin = store.create_user(ADMIN_USERNAME, true)?;
    let generator = TokenGenerator::new();
    let issued = generator.issue(admin.id, None)?;
    store.create_token(&issued.token)?;

    fs::write(&token_file, &issued.raw)?;
    #[cfg(unix)]
    set_restrictive_permissions(&token_file);

    print_token(
        "Admin token (save this, it won't be shown again):",
        &issued.raw,
    );
    println!("Token also written to: {}", token_file.display());
    println!("========================================");
    println!();

    if !non_interactive {
        create_user_prompt(&store, &generator)?;
    }

    Ok(())
}

fn create_user_prompt(store: &SqliteStore, generator: &TokenGenerator) -> anyhow::Result<()> {
    let create_user = inquire::Confirm::new("Would you like to create a regular user?")
        .with_default(false)
        .prompt()?;

    if !create_user {
        return Ok(());
    }

    let username = inquire::Text::new("Username:")
        .with_validator(|input: &str| {
            if input.trim().is_empty() {
                Ok(inquire::validator::Validation::Invalid(
                    "Username cannot be empty".into(),
                ))
            } else if input.contains(char::is_whitespace) {
                Ok(inquire::validator::Validation::Invalid(
                    "Username cannot contain whitespace".into(),
                ))
            } else {
                Ok(inquire::validator::Validation::Valid)
            }
        })
        .prompt()?;

    let user = store.create_user(&username, false)?;
    let issued = generator.issue(user.id, None)?;
    store.create_token(&issued.token)?;

    print_token(
        &format!("Created user '{username}' (id {}) with token:", user.id),
        &issued.raw,
    );
    println!("========================================");
    println!();

    Ok(())
}

fn resolve_config(
    path: Option<PathBuf>,
    host: Option<String>,
    port: Option<u16>,
    data_dir: Option<PathBuf>,
    only_admin_create_project: bool,
) -> anyhow::Result<ServerConfig> {
    let mut config = match path {
        Some(path) => ServerConfig::load(path)?,
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
    if only_admin_create_project {
        config.only_admin_create_project = true;
    }

    config.validate()?;
    Ok(config)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {e}");
    }
    info!("Shutting down");
}

async fn run_serve(config: ServerConfig) -> anyhow::Result<()> {
    let db_path = config.db_path();
    if !db_path.exists() {
        bail!(NOT_INITIALIZED);
    }

    let store = SqliteStore::new(&db_path)?;
    store.initialize()?;
    if !store.has_system_admin()? {
        bail!(NOT_INITIALIZED);
    }
    let store: Arc<dyn Store> = Arc::new(store);

    let (audit, audit_worker) = AuditLogger::spawn(store.clone(), config.audit_queue_capacity);
    let policy = ProjectPolicy {
        only_admin_create_project: config.only_admin_create_project,
    };
    let controller = ProjectController::new(store.clone(), audit, policy);

    let app = create_router(Arc::new(AppState::new(store.clone(), controller)));
    let addr = config.socket_addr()?;

    info!(
        only_admin_create_project = policy.only_admin_create_project,
        "Starting server on {}", addr
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // The router owned the last audit sender; wait for queued entries to land.
    if let Err(e) = audit_worker.await {
        tracing::error!("Access log worker failed: {e}");
    }
    store.close()?;

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("dockyard=info".parse()?))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Admin { command } => match command {
            AdminCommands::Init {
                data_dir,
                non_interactive,
            } => run_init(&data_dir, non_interactive)?,
        },
        Commands::Serve {
            config,
            host,
            port,
            data_dir,
            only_admin_create_project,
        } => {
            let config = resolve_config(config, host, port, data_dir, only_admin_create_project)?;
            run_serve(config).await?;
        }
    }

    Ok(())
}
