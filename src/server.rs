//! Embedding display server interface
//!
//! The bridge never owns windows or input devices; it asks the display
//! server it is embedded in to create devices and posts synthesized events
//! into them through [`DisplayServer`].

use std::collections::HashMap;
use std::fmt;

use log::{debug, info};

use crate::protocol::ObjectId;

/// Window owned by the embedding server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WindowId(pub u32);

impl fmt::Display for WindowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Input device owned by the embedding server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceId(pub u32);

/// Pointer and keyboard devices backing one host input device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputHandles {
    pub pointer: DeviceId,
    pub keyboard: DeviceId,
}

/// Where the embedding server should deliver pointer events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirectTarget {
    Window(WindowId),
    PointerRoot,
}

/// Calls the bridge makes into the display server it runs inside.
pub trait DisplayServer {
    /// Create pointer and keyboard devices for a newly advertised host input device.
    fn add_input_device(&mut self, host_id: ObjectId) -> InputHandles;

    /// Post an absolute two-axis motion event.
    fn post_motion(&mut self, device: DeviceId, x: i32, y: i32);

    /// Post a button event with a 1-based button index.
    fn post_button(&mut self, device: DeviceId, index: u32, pressed: bool);

    /// Post a key event; `keycode` is already in the server's keycode space.
    fn post_key(&mut self, device: DeviceId, keycode: u32, pressed: bool);

    fn set_redirect_window(&mut self, device: DeviceId, target: RedirectTarget);

    /// Absolute origin of the window's drawable, if the window still exists.
    fn drawable_origin(&self, window: WindowId) -> Option<(i32, i32)>;
}

/// Display server that only logs what it is asked to do.
///
/// Used by the `hostbridge` binary to inspect what a host compositor sends.
#[derive(Debug, Default)]
pub struct LoggingServer {
    next_device: u32,
    windows: HashMap<WindowId, (i32, i32)>,
}

impl LoggingServer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `window` known with the given drawable origin.
    pub fn place_window(&mut self, window: WindowId, x: i32, y: i32) {
        self.windows.insert(window, (x, y));
    }

    fn allocate_device(&mut self) -> DeviceId {
        self.next_device += 1;
        DeviceId(self.next_device)
    }
}

impl DisplayServer for LoggingServer {
    fn add_input_device(&mut self, host_id: ObjectId) -> InputHandles {
        let handles = InputHandles {
            pointer: self.allocate_device(),
            keyboard: self.allocate_device(),
        };
        info!(
            "⌨️ Host input device {} -> pointer {:?}, keyboard {:?}",
            host_id, handles.pointer, handles.keyboard
        );
        handles
    }

    fn post_motion(&mut self, device: DeviceId, x: i32, y: i32) {
        debug!("🐁 {:?} motion to ({}, {})", device, x, y);
    }

    fn post_button(&mut self, device: DeviceId, index: u32, pressed: bool) {
        info!(
            "🐁 {:?} button {} {}",
            device,
            index,
            if pressed { "pressed" } else { "released" }
        );
    }

    fn post_key(&mut self, device: DeviceId, keycode: u32, pressed: bool) {
        info!(
            "⌨️ {:?} keycode {} {}",
            device,
            keycode,
            if pressed { "pressed" } else { "released" }
        );
    }

    fn set_redirect_window(&mut self, device: DeviceId, target: RedirectTarget) {
        info!("🎯 {:?} redirected to {:?}", device, target);
    }

    fn drawable_origin(&self, window: WindowId) -> Option<(i32, i32)> {
        self.windows.get(&window).copied()
    }
}
