//! Host input device translation
//!
//! Converts host pointer/keyboard events into calls on the embedding
//! [`DisplayServer`], tracking the focused window and a small modifier mask
//! per device.

use log::{debug, warn};

use crate::protocol::ObjectId;
use crate::server::{DisplayServer, InputHandles, RedirectTarget, WindowId};

// Linux input event codes used by the host.
pub const BTN_LEFT: u32 = 0x110;
pub const BTN_RIGHT: u32 = 0x111;
pub const BTN_MIDDLE: u32 = 0x112;
pub const KEY_LEFTMETA: u32 = 125;
pub const KEY_RIGHTMETA: u32 = 126;

/// Offset between host (evdev) keycodes and the embedding server's keycodes.
pub const KEYCODE_OFFSET: u32 = 8;

/// Modifier keys currently held on a host input device.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Modifiers(u32);

impl Modifiers {
    pub const META: u32 = 1 << 0;

    pub fn contains(self, bits: u32) -> bool {
        self.0 & bits == bits
    }

    pub fn insert(&mut self, bits: u32) {
        self.0 |= bits;
    }

    pub fn remove(&mut self, bits: u32) {
        self.0 &= !bits;
    }

    pub fn bits(self) -> u32 {
        self.0
    }
}

/// Modifier bit tracked for a host key, if any.
pub fn modifier_for_key(key: u32) -> u32 {
    match key {
        KEY_LEFTMETA | KEY_RIGHTMETA => Modifiers::META,
        _ => 0,
    }
}

/// 1-based server button index for a host button code.
///
/// Left, middle and right are 1, 2 and 3; every other code keeps its offset
/// from `BTN_LEFT`. Codes below `BTN_LEFT` are not buttons and yield
/// indices below 1.
pub fn button_index(code: u32) -> i32 {
    match code {
        BTN_LEFT => 1,
        BTN_MIDDLE => 2,
        BTN_RIGHT => 3,
        _ => (code as i32).wrapping_sub(BTN_LEFT as i32).wrapping_add(1),
    }
}

/// Keycode the embedding server expects for a host keycode.
pub fn server_keycode(key: u32) -> u32 {
    key.wrapping_add(KEYCODE_OFFSET)
}

/// Local state for one host input device.
#[derive(Debug, Clone)]
pub struct InputDevice {
    id: ObjectId,
    handles: InputHandles,
    modifiers: Modifiers,
    focus: Option<WindowId>,
}

impl InputDevice {
    pub fn new(id: ObjectId, handles: InputHandles) -> Self {
        Self {
            id,
            handles,
            modifiers: Modifiers::default(),
            focus: None,
        }
    }

    pub fn id(&self) -> ObjectId {
        self.id
    }

    pub fn handles(&self) -> InputHandles {
        self.handles
    }

    pub fn modifiers(&self) -> Modifiers {
        self.modifiers
    }

    pub fn focus(&self) -> Option<WindowId> {
        self.focus
    }

    /// Translate surface-local coordinates to absolute ones and post them.
    ///
    /// Without a focused window there is no origin to translate against, so
    /// the event is dropped.
    pub fn handle_motion<S: DisplayServer + ?Sized>(
        &mut self,
        server: &mut S,
        surface_x: i32,
        surface_y: i32,
    ) {
        let Some(window) = self.focus else {
            debug!("Dropping motion on input device {}: no focused window", self.id);
            return;
        };
        let Some((dx, dy)) = server.drawable_origin(window) else {
            debug!("Dropping motion on input device {}: window {} is gone", self.id, window);
            return;
        };
        server.post_motion(
            self.handles.pointer,
            surface_x.wrapping_add(dx),
            surface_y.wrapping_add(dy),
        );
    }

    pub fn handle_button<S: DisplayServer + ?Sized>(&mut self, server: &mut S, button: u32, state: u32) {
        let index = button_index(button);
        if index < 1 {
            warn!("⚠️ Ignoring host button code {:#x}: not a pointer button", button);
            return;
        }
        server.post_button(self.handles.pointer, index as u32, state != 0);
    }

    pub fn handle_key<S: DisplayServer + ?Sized>(&mut self, server: &mut S, key: u32, state: u32) {
        let modifier = modifier_for_key(key);
        if state != 0 {
            self.modifiers.insert(modifier);
        } else {
            self.modifiers.remove(modifier);
        }
        server.post_key(self.handles.keyboard, server_keycode(key), state != 0);
    }

    /// Point the device at `window`, or at the pointer root when there is none.
    pub fn handle_pointer_focus<S: DisplayServer + ?Sized>(
        &mut self,
        server: &mut S,
        window: Option<WindowId>,
    ) {
        self.focus = window;
        let target = match window {
            Some(window) => RedirectTarget::Window(window),
            None => RedirectTarget::PointerRoot,
        };
        debug!("Input device {} pointer focus -> {:?}", self.id, target);
        server.set_redirect_window(self.handles.pointer, target);
    }

    /// Merge the keys already held when keyboard focus arrives.
    ///
    /// Bits are only ever added here; a meta key released while another
    /// client had focus stays set until the next release we see.
    pub fn handle_keyboard_focus(&mut self, keys: &[u32]) {
        for &key in keys {
            self.modifiers.insert(modifier_for_key(key));
        }
    }

    /// Forget `window` if it is the current focus.
    pub(crate) fn clear_focus_if(&mut self, window: WindowId) -> bool {
        if self.focus == Some(window) {
            self.focus = None;
            true
        } else {
            false
        }
    }
}
