//! Hosted screen session
//!
//! [`HostedScreen`] is what the embedding server holds for one bridge
//! instance. It bootstraps the host connection, authenticates the GPU
//! device, and afterwards turns host events into calls on the embedding
//! [`DisplayServer`] whenever the event loop reports the connection
//! readable.
//!
//! Host state lives in [`Session`], kept apart from the connection so the
//! connection can dispatch into it while both are borrowed from the screen.

mod input;
mod output;
mod surface;

pub use input::{
    button_index, modifier_for_key, server_keycode, InputDevice, Modifiers, BTN_LEFT, BTN_MIDDLE,
    BTN_RIGHT, KEYCODE_OFFSET, KEY_LEFTMETA, KEY_RIGHTMETA,
};
pub use output::Output;
pub use surface::{DamageBox, SurfaceTable};

use std::collections::{BTreeMap, HashMap};
use std::os::fd::{AsFd, AsRawFd, BorrowedFd, OwnedFd, RawFd};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use calloop::generic::Generic;
use calloop::{LoopHandle, Mode, PostAction, RegistrationToken};
use log::{debug, error, info, warn};

use crate::auth::DeviceAuthenticator;
use crate::config::BridgeConfig;
use crate::error::{BridgeError, HostError, ProtocolError};
use crate::host::{GlobalObjectListener, HostConnection, Interest};
use crate::protocol::{decode_event, HostEvent, Interface, ObjectId, Request, WireMessage, CLIENT_ID_START};
use crate::server::{DisplayServer, WindowId};

/// Host-side state: bound globals, outputs, input devices and surfaces.
pub struct Session<S> {
    server: S,
    objects: HashMap<ObjectId, Interface>,
    compositor: Option<ObjectId>,
    drm: Option<ObjectId>,
    device_name: Option<String>,
    auth_requested: bool,
    authenticated: bool,
    outputs: BTreeMap<ObjectId, Output>,
    input_devices: BTreeMap<ObjectId, InputDevice>,
    surfaces: SurfaceTable,
    width: i32,
    height: i32,
}

impl<S: DisplayServer> Session<S> {
    pub fn new(server: S) -> Self {
        Self {
            server,
            objects: HashMap::new(),
            compositor: None,
            drm: None,
            device_name: None,
            auth_requested: false,
            authenticated: false,
            outputs: BTreeMap::new(),
            input_devices: BTreeMap::new(),
            surfaces: SurfaceTable::new(),
            width: 0,
            height: 0,
        }
    }

    pub fn server(&self) -> &S {
        &self.server
    }

    pub fn compositor(&self) -> Option<ObjectId> {
        self.compositor
    }

    pub fn drm(&self) -> Option<ObjectId> {
        self.drm
    }

    pub fn device_name(&self) -> Option<&str> {
        self.device_name.as_deref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    pub fn outputs(&self) -> impl Iterator<Item = &Output> {
        self.outputs.values()
    }

    pub fn output(&self, id: ObjectId) -> Option<&Output> {
        self.outputs.get(&id)
    }

    pub fn input_devices(&self) -> impl Iterator<Item = &InputDevice> {
        self.input_devices.values()
    }

    pub fn input_device(&self, id: ObjectId) -> Option<&InputDevice> {
        self.input_devices.get(&id)
    }

    pub fn surfaces(&self) -> &SurfaceTable {
        &self.surfaces
    }

    pub fn size(&self) -> (i32, i32) {
        (self.width, self.height)
    }

    fn handle_event(&mut self, object: ObjectId, event: HostEvent) {
        match event {
            HostEvent::DrmDevice { name } => {
                info!("🖥️ Host GPU device: {}", name);
                self.device_name = Some(name);
            }
            HostEvent::DrmAuthenticated => {
                if !self.auth_requested {
                    warn!("⚠️ Host sent authenticated before any magic was sent, ignoring");
                } else if self.authenticated {
                    warn!("⚠️ Duplicate authenticated event from host, ignoring");
                } else {
                    info!("🔑 GPU device authenticated with host");
                    self.authenticated = true;
                }
            }
            HostEvent::OutputGeometry { width, height } => {
                if let Some(output) = self.outputs.get_mut(&object) {
                    output.set_geometry(width, height);
                    self.width = width;
                    self.height = height;
                    info!("🖥️ Output {} is {}x{}", object, width, height);
                }
            }
            HostEvent::Motion {
                surface_x,
                surface_y,
                ..
            } => {
                if let Some(device) = self.input_devices.get_mut(&object) {
                    device.handle_motion(&mut self.server, surface_x, surface_y);
                }
            }
            HostEvent::Button { button, state, .. } => {
                if let Some(device) = self.input_devices.get_mut(&object) {
                    device.handle_button(&mut self.server, button, state);
                }
            }
            HostEvent::Key { key, state, .. } => {
                if let Some(device) = self.input_devices.get_mut(&object) {
                    device.handle_key(&mut self.server, key, state);
                }
            }
            HostEvent::PointerFocus { surface, .. } => {
                let window = surface.and_then(|surface| {
                    let window = self.surfaces.window(surface);
                    if window.is_none() {
                        debug!("Pointer focus on unknown surface {}", surface);
                    }
                    window
                });
                if let Some(device) = self.input_devices.get_mut(&object) {
                    device.handle_pointer_focus(&mut self.server, window);
                }
            }
            HostEvent::KeyboardFocus { keys, .. } => {
                if let Some(device) = self.input_devices.get_mut(&object) {
                    device.handle_keyboard_focus(&keys);
                }
            }
            other => debug!("Ignoring {:?} on object {}", other, object),
        }
    }
}

impl<S: DisplayServer> GlobalObjectListener for Session<S> {
    fn global(&mut self, id: ObjectId, interface: &str, version: u32) {
        let Some(kind) = Interface::from_global_name(interface) else {
            debug!("Ignoring global {} ({} v{})", id, interface, version);
            return;
        };
        debug!("Binding global {} ({} v{})", id, interface, version);
        self.objects.insert(id, kind);

        match kind {
            Interface::Compositor => self.compositor = Some(id),
            Interface::Drm => self.drm = Some(id),
            Interface::Output => {
                self.outputs.insert(id, Output::new(id));
            }
            Interface::InputDevice => {
                let handles = self.server.add_input_device(id);
                self.input_devices.insert(id, InputDevice::new(id, handles));
            }
            Interface::Display | Interface::Surface => {}
        }
    }

    fn interface(&self, object: ObjectId) -> Option<Interface> {
        self.objects.get(&object).copied()
    }

    fn object_event(&mut self, interface: Interface, message: &WireMessage) -> Result<(), ProtocolError> {
        match decode_event(interface, message) {
            Ok(event) => {
                self.handle_event(message.sender_id, event);
                Ok(())
            }
            Err(ProtocolError::UnknownOpcode { interface, opcode }) => {
                debug!("Ignoring unknown {} event {}", interface, opcode);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}

/// One bridge instance, as held by the embedding server.
pub struct HostedScreen<C, S> {
    conn: C,
    session: Session<S>,
    host_fd: RawFd,
    /// Descriptor registered with the event loop; the connection's own fd
    /// until registration.
    poll_fd: RawFd,
    device_fd: Option<OwnedFd>,
    device_path: Option<PathBuf>,
    mask: Interest,
    next_id: u32,
    connected: bool,
    error: Option<HostError>,
}

impl<C, S> HostedScreen<C, S>
where
    C: HostConnection + 'static,
    S: DisplayServer + 'static,
{
    /// Bootstrap a session over an established host connection.
    ///
    /// Blocks until the host has named its GPU device and confirmed our
    /// authentication, each phase bounded by the configured handshake
    /// timeout. The connection is registered with `handle` before the
    /// device is opened; on failure the registration is undone.
    pub fn initialize<'l, A: DeviceAuthenticator>(
        conn: C,
        server: S,
        auth: &mut A,
        config: &BridgeConfig,
        handle: &LoopHandle<'l, HostedScreen<C, S>>,
    ) -> Result<Self, BridgeError> {
        let host_fd = conn.fd().as_raw_fd();
        let mask = conn.mask();
        let mut screen = Self {
            conn,
            session: Session::new(server),
            host_fd,
            poll_fd: host_fd,
            device_fd: None,
            device_path: None,
            mask,
            next_id: CLIENT_ID_START,
            connected: true,
            error: None,
        };
        let timeout = config.host.handshake_timeout();

        screen.discover(timeout)?;
        let token = screen.register(handle)?;

        if let Err(e) = screen.authenticate(auth, config.device.path_override.as_deref(), timeout) {
            error!("❌ Hosted session bootstrap failed: {}", e);
            handle.remove(token);
            return Err(e);
        }

        info!(
            "✅ Hosted session ready on {} ({} outputs, {} input devices)",
            screen.device_path.as_deref().unwrap_or(Path::new("?")).display(),
            screen.session.outputs.len(),
            screen.session.input_devices.len()
        );
        Ok(screen)
    }

    fn discover(&mut self, timeout: Duration) -> Result<(), BridgeError> {
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            self.pump(Interest::READABLE, Some(remaining))?;
            if self.session.device_name.is_some() || remaining.is_zero() {
                break;
            }
        }
        debug!(
            "Discovery finished: compositor={:?} drm={:?} device={:?}",
            self.session.compositor, self.session.drm, self.session.device_name
        );
        Ok(())
    }

    fn register(&mut self, handle: &LoopHandle<'_, HostedScreen<C, S>>) -> Result<RegistrationToken, BridgeError> {
        let fd = self
            .conn
            .fd()
            .try_clone_to_owned()
            .map_err(|e| BridgeError::EventLoop(e.to_string()))?;
        let poll_fd = fd.as_raw_fd();

        let token = handle
            .insert_source(
                Generic::new(fd, calloop::Interest::READ, Mode::Level),
                |readiness, fd, screen: &mut HostedScreen<C, S>| {
                    if !readiness.readable {
                        return Ok(PostAction::Continue);
                    }
                    let ready = fd.as_fd().as_raw_fd();
                    match screen.wakeup_handler(&[ready]) {
                        Ok(()) => Ok(PostAction::Continue),
                        Err(e) => {
                            error!("❌ Host connection lost: {}", e);
                            screen.connected = false;
                            screen.error = Some(e);
                            Ok(PostAction::Remove)
                        }
                    }
                },
            )
            .map_err(|e| BridgeError::EventLoop(e.error.to_string()))?;
        debug!("Host connection {} polled as fd {}", self.host_fd, poll_fd);
        self.poll_fd = poll_fd;
        Ok(token)
    }

    fn authenticate<A: DeviceAuthenticator>(
        &mut self,
        auth: &mut A,
        path_override: Option<&Path>,
        timeout: Duration,
    ) -> Result<(), BridgeError> {
        let drm = self.session.drm.ok_or(BridgeError::NoDevice)?;
        let advertised = self.session.device_name.as_deref().ok_or(BridgeError::NoDevice)?;
        let path = match path_override {
            Some(path) => {
                info!("🖥️ Using configured GPU device {} instead of {}", path.display(), advertised);
                path.to_path_buf()
            }
            None => PathBuf::from(advertised),
        };

        let device = auth.open(&path).map_err(|source| BridgeError::DeviceOpen {
            path: path.clone(),
            source,
        })?;
        let magic = auth.magic(device.as_fd()).map_err(BridgeError::DeviceMagic)?;
        self.device_fd = Some(device);
        self.device_path = Some(path);

        debug!("Sending magic {:#x} to drm object {}", magic, drm);
        self.conn.queue(&Request::Authenticate { drm, magic })?;
        self.session.auth_requested = true;
        self.mask = self.conn.mask();
        self.pump(Interest::WRITABLE, None)?;

        let deadline = Instant::now() + timeout;
        while !self.session.authenticated {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(BridgeError::AuthTimeout(timeout));
            }
            self.pump(Interest::READABLE, Some(remaining))?;
        }
        Ok(())
    }

    fn pump(&mut self, mask: Interest, timeout: Option<Duration>) -> Result<(), HostError> {
        let result = self.conn.iterate(mask, timeout, &mut self.session);
        self.mask = self.conn.mask();
        result
    }
}

impl<C: HostConnection, S: DisplayServer> HostedScreen<C, S> {
    /// Process pending host events if the polled descriptor is among
    /// `readable`.
    pub fn wakeup_handler(&mut self, readable: &[RawFd]) -> Result<(), HostError> {
        if !readable.contains(&self.poll_fd) {
            return Ok(());
        }
        let result = self
            .conn
            .iterate(Interest::READABLE, Some(Duration::ZERO), &mut self.session);
        self.mask = self.conn.mask();
        result
    }

    /// Flush queued requests before the event loop goes to sleep.
    pub fn block_handler(&mut self) -> Result<(), HostError> {
        while self.mask.contains(Interest::WRITABLE) {
            let result = self.conn.iterate(Interest::WRITABLE, None, &mut self.session);
            self.mask = self.conn.mask();
            result?;
        }
        Ok(())
    }

    /// Create a host surface for `window`.
    pub fn create_surface(&mut self, window: WindowId) -> Result<ObjectId, BridgeError> {
        let compositor = self.session.compositor.ok_or(BridgeError::NoCompositor)?;
        if self.session.surfaces.surface(window).is_some() {
            return Err(BridgeError::SurfaceExists(window.0));
        }

        let id = ObjectId(self.next_id);
        self.conn.queue(&Request::CreateSurface { compositor, id })?;
        self.next_id += 1;
        self.mask = self.conn.mask();

        self.session.objects.insert(id, Interface::Surface);
        self.session.surfaces.insert(id, window);
        debug!("Created surface {} for window {}", id, window);
        Ok(id)
    }

    /// Report damage on `window`'s surface.
    pub fn damage(&mut self, window: WindowId, damage: DamageBox) -> Result<(), BridgeError> {
        let surface = self
            .session
            .surfaces
            .surface(window)
            .ok_or(BridgeError::UnknownWindow(window.0))?;
        self.conn.queue(&Request::Damage {
            surface,
            x: damage.x1,
            y: damage.y1,
            width: damage.width(),
            height: damage.height(),
        })?;
        self.mask = self.conn.mask();
        Ok(())
    }

    /// Destroy `window`'s surface and drop any focus pointing at it.
    pub fn destroy_surface(&mut self, window: WindowId) -> Result<(), BridgeError> {
        let surface = self
            .session
            .surfaces
            .surface(window)
            .ok_or(BridgeError::UnknownWindow(window.0))?;
        self.conn.queue(&Request::DestroySurface { surface })?;
        self.mask = self.conn.mask();

        self.session.surfaces.remove_window(window);
        self.session.objects.remove(&surface);
        for device in self.session.input_devices.values_mut() {
            if device.clear_focus_if(window) {
                debug!("Input device {} lost focus with window {}", device.id(), window);
            }
        }
        Ok(())
    }

    pub fn session(&self) -> &Session<S> {
        &self.session
    }

    pub fn server(&self) -> &S {
        &self.session.server
    }

    pub fn server_mut(&mut self) -> &mut S {
        &mut self.session.server
    }

    pub fn width(&self) -> i32 {
        self.session.width
    }

    pub fn height(&self) -> i32 {
        self.session.height
    }

    pub fn is_authenticated(&self) -> bool {
        self.session.authenticated
    }

    pub fn device_name(&self) -> Option<&str> {
        self.session.device_name()
    }

    /// Path of the device node actually opened.
    pub fn device_path(&self) -> Option<&Path> {
        self.device_path.as_deref()
    }

    pub fn device_fd(&self) -> Option<BorrowedFd<'_>> {
        self.device_fd.as_ref().map(|fd| fd.as_fd())
    }

    pub fn host_fd(&self) -> RawFd {
        self.host_fd
    }

    /// Descriptor the event loop polls for this connection, as reported to
    /// [`wakeup_handler`](Self::wakeup_handler).
    pub fn poll_fd(&self) -> RawFd {
        self.poll_fd
    }

    pub fn mask(&self) -> Interest {
        self.mask
    }

    /// False once the event loop has seen the host connection fail.
    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// The error that broke the host connection, if any.
    pub fn take_error(&mut self) -> Option<HostError> {
        self.error.take()
    }

    #[cfg(test)]
    pub(crate) fn connection(&self) -> &C {
        &self.conn
    }
}

#[cfg(test)]
mod tests;
