//! # hostbridge
//!
//! Connects to a host compositor, authenticates its GPU device and logs
//! every event the bridge translates. Useful for checking what a host
//! compositor actually sends.

use anyhow::{Context, Result};
use clap::Parser;
use log::{error, info, warn};

use hostbridge::{
    BridgeConfig, BridgeError, DrmAuthenticator, HostError, HostedLoop, InitStatus, LoggingServer,
    SocketConnection,
};

#[derive(Parser)]
#[command(name = "hostbridge")]
#[command(about = "Run a hosted display bridge session and log translated events")]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "~/.config/hostbridge/hostbridge.toml")]
    config: String,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Host socket name (overrides the configuration)
    #[arg(short, long)]
    socket: Option<String>,

    /// Handshake timeout in milliseconds (overrides the configuration)
    #[arg(long)]
    timeout_ms: Option<u64>,
}

/// Apply command-line overrides on top of the loaded configuration.
fn apply_overrides(config: &mut BridgeConfig, cli: &Cli) -> Result<()> {
    if let Some(socket) = &cli.socket {
        config.host.socket_name = socket.clone();
    }
    if let Some(timeout_ms) = cli.timeout_ms {
        config.host.handshake_timeout_ms = timeout_ms;
    }
    if cli.debug {
        config.general.debug = true;
    }
    config.validate().context("Invalid command-line overrides")
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration before logging so `general.debug` can pick the filter
    let loaded = BridgeConfig::load(&cli.config);
    let debug = cli.debug || loaded.as_ref().map(|c| c.general.debug).unwrap_or(false);

    // Initialize logging
    if debug {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug")).init();
    } else {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    }

    info!("🚀 Starting hostbridge");
    info!("📄 Version: {}", hostbridge::VERSION);

    let mut config = match loaded {
        Ok(config) => {
            info!("✅ Configuration loaded from: {}", cli.config);
            config
        }
        Err(e) => {
            error!("❌ Failed to load configuration: {}", e);
            info!("📝 Using default configuration");
            BridgeConfig::default()
        }
    };
    apply_overrides(&mut config, &cli)?;

    let socket = config.host.socket_name.clone();
    info!(
        "🔌 Connecting to host compositor at {}{}",
        if config.host.abstract_socket { "@" } else { "" },
        socket
    );
    let conn = SocketConnection::connect(&socket, config.host.abstract_socket).map_err(|source| {
        BridgeError::Connect {
            socket: socket.clone(),
            source,
        }
    });

    let result =
        conn.and_then(|conn| HostedLoop::initialize(conn, LoggingServer::new(), &mut DrmAuthenticator, &config));
    let status = InitStatus::from_result(&result);
    let mut hosted = match result {
        Ok(hosted) => hosted,
        Err(e) => {
            error!("❌ Hosted session failed to start ({:?}): {}", status, e);
            return Err(e.into());
        }
    };
    info!(
        "✅ Session ready: {}x{} on {}",
        hosted.screen().width(),
        hosted.screen().height(),
        hosted.screen().device_name().unwrap_or("unknown device")
    );

    let signal = hosted.signal();
    ctrlc::set_handler(move || {
        signal.stop();
        signal.wakeup();
    })
    .context("Failed to install Ctrl-C handler")?;

    match hosted.run() {
        Ok(()) => {
            info!("👋 hostbridge shutting down");
            Ok(())
        }
        Err(BridgeError::Host(HostError::Disconnected)) => {
            warn!("🔌 Host compositor closed the connection");
            Ok(())
        }
        Err(e) => {
            error!("❌ Hosted session failed: {}", e);
            Err(e.into())
        }
    }
}
