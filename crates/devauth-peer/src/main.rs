// ============================================
// File: crates/devauth-peer/src/main.rs
// ============================================
//! # devauth Peer Entry Point
//!
//! ## Creation Reason
//! Command-line front end for running a device in one of its roles.
//!
//! ## Main Functionality
//! - CLI argument parsing with clap
//! - Configuration loading
//! - Logging initialization with tracing
//! - Role execution and exit status
//!
//! ## Usage
//! ```bash
//! # Device 2 (prover): answer challenges until Ctrl+C
//! devauth-peer respond --config device2.toml
//!
//! # Device 1 (verifier): one attempt, exit status 0 only if verified
//! devauth-peer authenticate --config device1.toml
//!
//! # Secure channel
//! devauth-peer listen --config device2.toml
//! devauth-peer send --config device1.toml --message "Hello Device 2"
//!
//! # Other commands
//! devauth-peer validate                 # Validate config file
//! devauth-peer device-id --secret abc   # Show derived device identity
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - RUST_LOG overrides `[logging] level`
//! - A missing config file means defaults, an invalid one is fatal
//!
//! ## Last Modified
//! v0.1.0 - Initial CLI implementation

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use devauth_core::crypto::derive_device_id;
use devauth_peer::services::RESPONSE_TIMEOUT;
use devauth_peer::{AuthOutcome, Peer, PeerConfig, Role};

// ============================================
// CLI Definition
// ============================================

/// Mutual device authentication and encrypted messaging over MQTT
#[derive(Parser, Debug)]
#[command(name = "devauth-peer")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Challenge the prover once and verify its signature
    Authenticate {
        /// Path to configuration file
        #[arg(short, long, default_value = "devauth.toml")]
        config: PathBuf,
    },

    /// Answer challenges with this device's private key until stopped
    Respond {
        /// Path to configuration file
        #[arg(short, long, default_value = "devauth.toml")]
        config: PathBuf,
    },

    /// Send one encrypted message, then print replies until stopped
    Send {
        /// Path to configuration file
        #[arg(short, long, default_value = "devauth.toml")]
        config: PathBuf,

        /// Message text
        #[arg(short, long)]
        message: String,
    },

    /// Print encrypted messages as they arrive until stopped
    Listen {
        /// Path to configuration file
        #[arg(short, long, default_value = "devauth.toml")]
        config: PathBuf,
    },

    /// Validate configuration file
    Validate {
        /// Path to configuration file
        #[arg(short, long, default_value = "devauth.toml")]
        config: PathBuf,
    },

    /// Show the device identity derived from a secret
    DeviceId {
        /// Device secret
        #[arg(short, long)]
        secret: String,
    },
}

// ============================================
// Main
// ============================================

#[tokio::main]
async fn main() {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Execute command
    let result = match cli.command {
        Commands::Authenticate { config } => cmd_authenticate(&config).await,
        Commands::Respond { config } => cmd_respond(&config).await,
        Commands::Send { config, message } => cmd_send(&config, &message).await,
        Commands::Listen { config } => cmd_listen(&config).await,
        Commands::Validate { config } => cmd_validate(&config).await,
        Commands::DeviceId { secret } => cmd_device_id(&secret),
    };

    // Handle errors
    if let Err(e) = result {
        init_logging("info");
        error!("{:#}", e);
        std::process::exit(1);
    }
}

// ============================================
// Commands
// ============================================

/// Runs one authentication attempt.
async fn cmd_authenticate(config_path: &Path) -> anyhow::Result<()> {
    let peer = start(config_path).await?;
    let _signals = peer.spawn_signal_listener();

    println!(
        "🔐 Challenging prover on '{}' (waiting up to {}s)",
        peer.config().topics.challenge,
        RESPONSE_TIMEOUT.as_secs()
    );
    let report = peer.authenticate().await?;

    println!();
    println!("════════════════════════════════════════");
    println!("   Attempt:    {}", report.attempt_id);
    println!("   Challenge:  {}", report.challenge);
    println!("   Elapsed:    {} ms", report.elapsed.as_millis());
    println!("════════════════════════════════════════");
    match &report.outcome {
        AuthOutcome::Verified => {
            println!("✅ Device authenticated successfully");
            Ok(())
        }
        AuthOutcome::Failed(reason) => {
            println!("❌ Authentication failed: {reason}");
            std::process::exit(1);
        }
        AuthOutcome::TimedOut => {
            println!("⏱️  No response within {}s", RESPONSE_TIMEOUT.as_secs());
            std::process::exit(1);
        }
        AuthOutcome::Aborted => {
            println!("⚠️  Authentication aborted");
            std::process::exit(1);
        }
    }
}

/// Serves challenges until shutdown.
async fn cmd_respond(config_path: &Path) -> anyhow::Result<()> {
    let peer = start(config_path).await?;
    let _signals = peer.spawn_signal_listener();

    let stats = peer.respond().await?;
    println!(
        "👋 Responder stopped: {} received, {} signed, {} dropped",
        stats.received, stats.signed, stats.dropped
    );
    Ok(())
}

/// Sends a message and waits for replies.
async fn cmd_send(config_path: &Path, message: &str) -> anyhow::Result<()> {
    let peer = start(config_path).await?;
    let _signals = peer.spawn_signal_listener();

    let replies = peer.send(message).await?;
    println!("👋 Sender stopped after {replies} replies");
    Ok(())
}

/// Receives messages until shutdown.
async fn cmd_listen(config_path: &Path) -> anyhow::Result<()> {
    let peer = start(config_path).await?;
    let _signals = peer.spawn_signal_listener();

    let received = peer.listen().await?;
    println!("👋 Listener stopped after {received} messages");
    Ok(())
}

/// Validates configuration file.
async fn cmd_validate(config_path: &Path) -> anyhow::Result<()> {
    if !config_path.exists() {
        println!("⚠️  Config file not found: {}", config_path.display());
        println!("   Peer will use default values.");
        return Ok(());
    }

    let config = PeerConfig::load(config_path).await?;

    println!("✅ Configuration is valid");
    println!();
    println!("Broker:");
    println!("   URL:            {}", config.broker.url);
    println!("   Client ID:      {}", config.client_id(Role::Verifier)?);
    println!("   Keep-alive:     {}s", config.broker.keep_alive_secs);
    println!("   Auto-reconnect: {}", config.broker.auto_reconnect);
    println!();
    println!("Topics:");
    println!("   Challenge:      {}", config.topics.challenge);
    println!("   Response:       {}", config.topics.response);
    println!("   Data:           {}", config.topics.data);
    println!("   Data response:  {}", config.topics.data_response);
    println!();
    println!("Keys:");
    println!("   Private key:    {}", config.keys.private_key_file);
    println!("   Public key:     {}", config.keys.public_key_file);
    if config.channel.uses_default_key() {
        println!();
        println!("⚠️  [channel] shared_key_hex is the built-in default key");
    }
    println!();

    Ok(())
}

/// Prints the identity derived from `secret`.
fn cmd_device_id(secret: &str) -> anyhow::Result<()> {
    println!("{}", derive_device_id(secret.as_bytes())?);
    Ok(())
}

// ============================================
// Helper Functions
// ============================================

/// Loads configuration, initializes logging and builds the peer.
async fn start(config_path: &Path) -> anyhow::Result<Peer> {
    let config = PeerConfig::load_or_default(config_path).await?;
    init_logging(&config.logging.level);
    info!(
        "Starting devauth peer v{} (config: {})",
        env!("CARGO_PKG_VERSION"),
        config_path.display()
    );
    Ok(Peer::new(config))
}

/// Initializes the tracing subscriber.
fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(filter)
        .try_init()
        .ok();
}
