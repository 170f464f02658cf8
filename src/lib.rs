//! # hostbridge
//!
//! Backend for an X-server-style display server running hosted inside a
//! host compositor. The host owns the real display and input; the bridge
//! shares its GPU device through DRM magic authentication and turns host
//! input and output events into events of the embedding server.
//!
//! ## Architecture
//!
//! - `protocol`: wire format and typed host events/requests
//! - `host`: connection trait and the Unix socket transport
//! - `bridge`: session bootstrap, global discovery, output tracking,
//!   input translation and surface management
//! - `auth`: GPU device opening and magic cookies
//! - `server`: the interface back into the embedding display server
//! - `event_loop`: calloop integration
//! - `config`: configuration parsing and management
//!
//! ## Usage
//!
//! ```rust,no_run
//! use hostbridge::{BridgeConfig, DrmAuthenticator, HostedLoop, LoggingServer, SocketConnection};
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = BridgeConfig::default();
//!     let conn = SocketConnection::connect(&config.host.socket_name, config.host.abstract_socket)?;
//!     let mut hosted =
//!         HostedLoop::initialize(conn, LoggingServer::new(), &mut DrmAuthenticator, &config)?;
//!     hosted.run()?;
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod bridge;
pub mod config;
pub mod error;
pub mod event_loop;
pub mod host;
pub mod protocol;
pub mod server;

pub use auth::{DeviceAuthenticator, DrmAuthenticator};
pub use bridge::{DamageBox, HostedScreen, InputDevice, Modifiers, Output, Session};
pub use config::BridgeConfig;
pub use error::{BridgeError, HostError, InitStatus, ProtocolError};
pub use event_loop::HostedLoop;
pub use host::{GlobalObjectListener, HostConnection, Interest, SocketConnection};
pub use protocol::ObjectId;
pub use server::{DeviceId, DisplayServer, InputHandles, LoggingServer, RedirectTarget, WindowId};

/// Version information for hostbridge
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");
