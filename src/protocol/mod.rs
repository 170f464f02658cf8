//! Hosted compositor wire protocol
//!
//! Messages use the Wayland wire layout in native byte order. Object 1 is
//! the display; every other object is either a global advertised by the
//! host (referenced directly by its global id) or a client-created surface.
//! Opcodes follow the listener order of each interface.
//!
//! Messages are held as `wayland_backend` [`Message`]s and parsed against
//! the per-interface signatures in [`descriptors`]. The display object is
//! not the standard `wl_display`: it announces globals itself as event 1,
//! with no registry object in between.

pub mod descriptors;
mod event;
mod request;
mod wire;

pub use event::{decode_event, HostEvent};
pub use request::Request;
pub use wayland_backend::protocol::{AllowNull, Argument, ArgumentType, Message, MessageDesc};
pub use wire::{wire_message, write_message, Incoming, MessageReader, WireArgument, WireMessage, HEADER_SIZE};

use std::fmt;

/// Identifier of a protocol object on the host connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjectId(pub u32);

impl ObjectId {
    /// The display object every connection starts with.
    pub const DISPLAY: ObjectId = ObjectId(1);

    /// Null object reference on the wire.
    pub const NULL: ObjectId = ObjectId(0);

    pub fn is_null(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// First id handed out for objects the bridge creates itself.
pub const CLIENT_ID_START: u32 = 0x0100_0000;

/// Interfaces the bridge knows how to talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Interface {
    Display,
    Compositor,
    Surface,
    Drm,
    Output,
    InputDevice,
}

impl Interface {
    const GLOBALS: [Interface; 4] = [
        Interface::Compositor,
        Interface::Drm,
        Interface::Output,
        Interface::InputDevice,
    ];

    /// Map an advertised global name onto an interface.
    ///
    /// Only the four globals the bridge binds are recognised; the display and
    /// surfaces are never advertised.
    pub fn from_global_name(name: &str) -> Option<Self> {
        Self::GLOBALS.into_iter().find(|interface| interface.name() == name)
    }

    /// Message descriptions for this interface.
    pub fn descriptor(self) -> &'static descriptors::InterfaceDesc {
        match self {
            Interface::Display => &descriptors::DISPLAY_INTERFACE,
            Interface::Compositor => &descriptors::COMPOSITOR_INTERFACE,
            Interface::Surface => &descriptors::SURFACE_INTERFACE,
            Interface::Drm => &descriptors::DRM_INTERFACE,
            Interface::Output => &descriptors::OUTPUT_INTERFACE,
            Interface::InputDevice => &descriptors::INPUT_DEVICE_INTERFACE,
        }
    }

    pub fn name(self) -> &'static str {
        self.descriptor().name
    }

    /// Argument layout of event `opcode`, if the interface has one.
    pub fn event_signature(self, opcode: u16) -> Option<&'static [ArgumentType]> {
        self.descriptor()
            .events
            .get(usize::from(opcode))
            .map(|desc| desc.signature)
    }

    /// Argument layout of request `opcode`, if the interface has one.
    pub fn request_signature(self, opcode: u16) -> Option<&'static [ArgumentType]> {
        self.descriptor()
            .requests
            .get(usize::from(opcode))
            .map(|desc| desc.signature)
    }
}

impl fmt::Display for Interface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

pub mod display {
    pub const EVENT_ERROR: u16 = 0;
    pub const EVENT_GLOBAL: u16 = 1;
}

pub mod compositor {
    pub const REQUEST_CREATE_SURFACE: u16 = 0;
}

pub mod surface {
    pub const REQUEST_DESTROY: u16 = 0;
    pub const REQUEST_DAMAGE: u16 = 1;
}

pub mod drm {
    pub const REQUEST_AUTHENTICATE: u16 = 0;
    pub const EVENT_DEVICE: u16 = 0;
    pub const EVENT_AUTHENTICATED: u16 = 1;
}

pub mod output {
    pub const EVENT_GEOMETRY: u16 = 0;
}

pub mod input_device {
    pub const EVENT_MOTION: u16 = 0;
    pub const EVENT_BUTTON: u16 = 1;
    pub const EVENT_KEY: u16 = 2;
    pub const EVENT_POINTER_FOCUS: u16 = 3;
    pub const EVENT_KEYBOARD_FOCUS: u16 = 4;
}
