//! calloop driver for a hosted session
//!
//! Owns the event loop the host connection is registered with and runs the
//! block handler before every sleep, so queued requests always reach the
//! host before the loop waits for its replies.

use std::time::Duration;

use calloop::{EventLoop, LoopHandle, LoopSignal};
use log::{error, info};

use crate::auth::DeviceAuthenticator;
use crate::bridge::HostedScreen;
use crate::config::BridgeConfig;
use crate::error::{BridgeError, HostError};
use crate::host::HostConnection;
use crate::server::DisplayServer;

pub struct HostedLoop<C, S> {
    event_loop: EventLoop<'static, HostedScreen<C, S>>,
    screen: HostedScreen<C, S>,
}

impl<C, S> HostedLoop<C, S>
where
    C: HostConnection + 'static,
    S: DisplayServer + 'static,
{
    /// Create an event loop and bootstrap a hosted session on it.
    pub fn initialize<A: DeviceAuthenticator>(
        conn: C,
        server: S,
        auth: &mut A,
        config: &BridgeConfig,
    ) -> Result<Self, BridgeError> {
        let event_loop: EventLoop<'static, HostedScreen<C, S>> =
            EventLoop::try_new().map_err(|e| BridgeError::EventLoop(e.to_string()))?;
        let screen = HostedScreen::initialize(conn, server, auth, config, &event_loop.handle())?;
        Ok(Self { event_loop, screen })
    }

    /// Handle for stopping [`run`](Self::run) from other threads; call
    /// `wakeup` after `stop` so a sleeping loop notices.
    pub fn signal(&self) -> LoopSignal {
        self.event_loop.get_signal()
    }

    pub fn handle(&self) -> LoopHandle<'static, HostedScreen<C, S>> {
        self.event_loop.handle()
    }

    pub fn screen(&self) -> &HostedScreen<C, S> {
        &self.screen
    }

    pub fn screen_mut(&mut self) -> &mut HostedScreen<C, S> {
        &mut self.screen
    }

    /// Flush, then wait up to `timeout` for host events and process them.
    pub fn dispatch(&mut self, timeout: Option<Duration>) -> Result<(), BridgeError> {
        self.screen.block_handler()?;
        self.event_loop
            .dispatch(timeout, &mut self.screen)
            .map_err(|e| BridgeError::EventLoop(e.to_string()))?;
        match self.screen.take_error() {
            Some(e) => Err(e.into()),
            None => Ok(()),
        }
    }

    /// Run until [`signal`](Self::signal) stops the loop or the host goes away.
    pub fn run(&mut self) -> Result<(), BridgeError> {
        let signal = self.event_loop.get_signal();
        let mut failure: Option<HostError> = None;

        self.screen.block_handler()?;
        info!("🔄 Entering hosted event loop");
        self.event_loop
            .run(None, &mut self.screen, |screen| {
                if !screen.is_connected() {
                    signal.stop();
                    return;
                }
                if let Err(e) = screen.block_handler() {
                    error!("❌ Failed to flush requests to host: {}", e);
                    failure = Some(e);
                    signal.stop();
                }
            })
            .map_err(|e| BridgeError::EventLoop(e.to_string()))?;

        match failure.or_else(|| self.screen.take_error()) {
            Some(e) => Err(e.into()),
            None => {
                info!("👋 Hosted event loop stopped");
                Ok(())
            }
        }
    }
}
