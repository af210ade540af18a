// ============================================
// File: crates/decada-agent/src/main.rs
// ============================================
//! # DECADA Agent Entry Point
//!
//! ## Creation Reason
//! Main entry point for the device agent binary.
//! Handles CLI parsing, logging setup and agent execution.
//!
//! ## Main Functionality
//! - CLI argument parsing with clap
//! - Logging initialization with tracing
//! - Configuration loading
//! - Agent execution and restart signalling
//!
//! ## Usage
//! ```bash
//! # Provision and run
//! decada-agent run --config /etc/decada/agent.toml
//!
//! # Other commands
//! decada-agent validate               # Validate config file
//! decada-agent uuid                   # Show the device UUID
//! decada-agent csr                    # Print a CSR for a fresh key (troubleshooting)
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - `run` exits with status 75 when the agent requests a restart; the
//!   service unit must restart on that status
//! - Ctrl+C is a clean shutdown (status 0)
//!
//! ## Last Modified
//! v0.1.0 - Initial CLI implementation

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use zeroize::Zeroizing;

use decada_agent::logging::{self, LogControl};
use decada_agent::services::{ProcessRestarter, RESTART_EXIT_CODE};
use decada_agent::{Agent, AgentConfig, AgentDeps};
use decada_common::{Clock, SystemClock};
use decada_core::crypto::{build_csr, IdentityGenerator, SubjectName, DRBG_SEED_LEN};
use decada_transport::{EntropySource, OsEntropy};

const DEFAULT_CONFIG: &str = "/etc/decada/agent.toml";

// ============================================
// CLI Definition
// ============================================

/// DECADA secure provisioning agent
#[derive(Parser, Debug)]
#[command(name = "decada-agent")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Provision the device and run the session
    Run {
        /// Path to configuration file
        #[arg(short, long, default_value = DEFAULT_CONFIG)]
        config: PathBuf,
    },

    /// Validate configuration file
    Validate {
        /// Path to configuration file
        #[arg(short, long, default_value = DEFAULT_CONFIG)]
        config: PathBuf,
    },

    /// Show the device UUID
    Uuid {
        /// Path to configuration file
        #[arg(short, long, default_value = DEFAULT_CONFIG)]
        config: PathBuf,
    },

    /// Print a CSR for a freshly generated key (troubleshooting)
    #[command(hide = true)]
    Csr {
        /// Path to configuration file
        #[arg(short, long, default_value = DEFAULT_CONFIG)]
        config: PathBuf,

        /// Write the private key here (mode 0600)
        #[arg(long)]
        key_out: Option<PathBuf>,
    },
}

// ============================================
// Main
// ============================================

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let log = logging::init("info");

    let result = match cli.command {
        Commands::Run { config } => cmd_run(config, log.as_ref()).await,
        Commands::Validate { config } => cmd_validate(config).await,
        Commands::Uuid { config } => cmd_uuid(config).await,
        Commands::Csr { config, key_out } => cmd_csr(config, key_out).await,
    };

    match result {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            error!("{:#}", e);
            std::process::exit(1);
        }
    }
}

// ============================================
// Commands
// ============================================

/// Runs the agent. Returns the process exit status.
async fn cmd_run(config_path: PathBuf, log: Option<&LogControl>) -> anyhow::Result<i32> {
    let config = AgentConfig::load(&config_path).await?;
    if let Some(log) = log {
        log.set_level(&config.logging.level)?;
    }

    let uuid = config.device.resolve_uuid().await?;

    let shutdown = CancellationToken::new();
    let restarter = Arc::new(ProcessRestarter::new(shutdown.clone()));
    let deps = AgentDeps::production(&config, restarter.clone()).await?;

    let ctrl_c = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Ctrl+C received");
            ctrl_c.cancel();
        }
    });

    let agent = Agent::new(config, uuid, deps, shutdown);
    let result = agent.run().await;

    if let Some(reason) = restarter.requested() {
        error!("Restart requested: {}", reason);
        return Ok(RESTART_EXIT_CODE);
    }
    result?;
    Ok(0)
}

/// Validates configuration file.
async fn cmd_validate(config_path: PathBuf) -> anyhow::Result<i32> {
    let config = AgentConfig::load(&config_path).await?;

    println!("✅ Configuration is valid");
    println!();
    println!("Cloud:");
    println!("   API:          {}", config.cloud.base_url());
    println!("   Product Key:  {}", display_or_missing(&config.cloud.product_key));
    match config.cloud.ensure_credentials() {
        Ok(()) => println!("   Credentials:  ✅ Present"),
        Err(e) => println!("   Credentials:  ❌ {}", e),
    }
    println!();
    println!("Broker:");
    println!("   Endpoint:     {}:{}", config.broker.host, config.broker.port);
    println!("   CA File:      {}", config.credentials.ca_cert_path);
    println!();
    println!("Identity:");
    println!("   Algorithm:    {}", config.identity.key_algorithm);
    println!("   Validity:     {} days", config.identity.cert_valid_days);
    println!();
    println!("Session:");
    println!(
        "   Connect:      {} attempts × {}s",
        config.session.connect_retries, config.session.connect_timeout_secs
    );
    println!("   Keep-alive:   {}s", config.session.keep_alive_secs);
    println!();
    println!("Telemetry:");
    println!("   Period:       {}s", config.telemetry.period_secs);
    println!("   Point:        {}", config.telemetry.measurepoint);
    println!();
    println!(
        "Watchdog:       {}",
        if config.watchdog.enabled {
            format!("enabled ({} ms)", config.watchdog.window_ms)
        } else {
            "disabled".to_string()
        }
    );
    println!();

    Ok(0)
}

/// Shows the device UUID.
async fn cmd_uuid(config_path: PathBuf) -> anyhow::Result<i32> {
    let config = load_or_default_config(&config_path).await?;
    let uuid = config.device.resolve_uuid().await?;
    println!("{uuid}");
    Ok(0)
}

/// Prints a CSR for a fresh key pair without contacting the cloud.
async fn cmd_csr(config_path: PathBuf, key_out: Option<PathBuf>) -> anyhow::Result<i32> {
    let config = load_or_default_config(&config_path).await?;
    let uuid = config.device.resolve_uuid().await?;

    let mut seed = Zeroizing::new([0u8; DRBG_SEED_LEN]);
    OsEntropy.fill_random(seed.as_mut_slice())?;
    let mut generator = IdentityGenerator::from_seed(&seed, config.identity.key_algorithm);

    info!("Generating {} key pair...", config.identity.key_algorithm);
    let keypair = tokio::task::spawn_blocking(move || generator.generate_keypair()).await??;

    let subject = SubjectName::for_device(
        config.identity.subject.clone(),
        &uuid,
        SystemClock::new().now_ms(),
    );
    let csr = build_csr(&keypair, &subject)?;
    print!("{csr}");

    if let Some(path) = key_out {
        save_private_key(&path, &keypair.into_private_key_pem()).await?;
        info!("Private key written to {}", path.display());
    }
    Ok(0)
}

// ============================================
// Helper Functions
// ============================================

/// Loads config or returns default when the file does not exist.
async fn load_or_default_config(path: &Path) -> anyhow::Result<AgentConfig> {
    if path.exists() {
        Ok(AgentConfig::load(path).await?)
    } else {
        Ok(AgentConfig::default())
    }
}

fn display_or_missing(value: &str) -> &str {
    if value.is_empty() {
        "<missing>"
    } else {
        value
    }
}

/// Writes a private key with owner-only permissions.
async fn save_private_key(path: &Path, pem: &str) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, pem).await?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = tokio::fs::metadata(path).await?.permissions();
        perms.set_mode(0o600);
        tokio::fs::set_permissions(path, perms).await?;
    }

    Ok(())
}
