//! Typed events delivered by the host

use std::ffi::CString;

use bytes::Buf;
use wayland_backend::protocol::Argument as Arg;

use super::wire::WireMessage;
use super::{display, drm, input_device, output, Interface, ObjectId};
use crate::error::ProtocolError;

/// A decoded host event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostEvent {
    /// Fatal error reported by the host about one of our objects.
    DisplayError {
        object: Option<ObjectId>,
        code: u32,
        message: String,
    },
    /// A global object became available.
    Global {
        id: ObjectId,
        interface: String,
        version: u32,
    },
    /// Path of the GPU device node the host renders with.
    DrmDevice { name: String },
    /// The magic cookie we sent was accepted.
    DrmAuthenticated,
    OutputGeometry { width: i32, height: i32 },
    Motion {
        time: u32,
        x: i32,
        y: i32,
        surface_x: i32,
        surface_y: i32,
    },
    Button { time: u32, button: u32, state: u32 },
    Key { time: u32, key: u32, state: u32 },
    PointerFocus {
        time: u32,
        surface: Option<ObjectId>,
        x: i32,
        y: i32,
        surface_x: i32,
        surface_y: i32,
    },
    KeyboardFocus {
        time: u32,
        surface: Option<ObjectId>,
        keys: Vec<u32>,
    },
}

/// Decode `message` as an event of `interface`.
///
/// The arguments must already follow the event's signature, as produced by
/// [`MessageReader`](super::MessageReader).
pub fn decode_event(interface: Interface, message: &WireMessage) -> Result<HostEvent, ProtocolError> {
    let event = match (interface, message.opcode, &message.args[..]) {
        (Interface::Display, display::EVENT_ERROR, [Arg::Object(object), Arg::Uint(code), Arg::Str(text)]) => {
            HostEvent::DisplayError {
                object: non_null(*object),
                code: *code,
                message: string(text)?,
            }
        }
        (Interface::Display, display::EVENT_GLOBAL, [Arg::Uint(id), Arg::Str(name), Arg::Uint(version)]) => {
            HostEvent::Global {
                id: ObjectId(*id),
                interface: string(name)?,
                version: *version,
            }
        }
        (Interface::Drm, drm::EVENT_DEVICE, [Arg::Str(name)]) => HostEvent::DrmDevice { name: string(name)? },
        (Interface::Drm, drm::EVENT_AUTHENTICATED, []) => HostEvent::DrmAuthenticated,
        (Interface::Output, output::EVENT_GEOMETRY, [Arg::Int(width), Arg::Int(height)]) => {
            HostEvent::OutputGeometry {
                width: *width,
                height: *height,
            }
        }
        (
            Interface::InputDevice,
            input_device::EVENT_MOTION,
            [Arg::Uint(time), Arg::Int(x), Arg::Int(y), Arg::Int(surface_x), Arg::Int(surface_y)],
        ) => HostEvent::Motion {
            time: *time,
            x: *x,
            y: *y,
            surface_x: *surface_x,
            surface_y: *surface_y,
        },
        (Interface::InputDevice, input_device::EVENT_BUTTON, [Arg::Uint(time), Arg::Uint(button), Arg::Uint(state)]) => {
            HostEvent::Button {
                time: *time,
                button: *button,
                state: *state,
            }
        }
        (Interface::InputDevice, input_device::EVENT_KEY, [Arg::Uint(time), Arg::Uint(key), Arg::Uint(state)]) => {
            HostEvent::Key {
                time: *time,
                key: *key,
                state: *state,
            }
        }
        (
            Interface::InputDevice,
            input_device::EVENT_POINTER_FOCUS,
            [Arg::Uint(time), Arg::Object(surface), Arg::Int(x), Arg::Int(y), Arg::Int(surface_x), Arg::Int(surface_y)],
        ) => HostEvent::PointerFocus {
            time: *time,
            surface: non_null(*surface),
            x: *x,
            y: *y,
            surface_x: *surface_x,
            surface_y: *surface_y,
        },
        (
            Interface::InputDevice,
            input_device::EVENT_KEYBOARD_FOCUS,
            [Arg::Uint(time), Arg::Object(surface), Arg::Array(keys)],
        ) => HostEvent::KeyboardFocus {
            time: *time,
            surface: non_null(*surface),
            keys: key_array(keys)?,
        },
        (interface, opcode, _) if interface.event_signature(opcode).is_some() => {
            return Err(ProtocolError::ArgumentMismatch { interface, opcode })
        }
        (interface, opcode, _) => return Err(ProtocolError::UnknownOpcode { interface, opcode }),
    };
    Ok(event)
}

fn non_null(object: ObjectId) -> Option<ObjectId> {
    (!object.is_null()).then_some(object)
}

fn string(text: &Option<Box<CString>>) -> Result<String, ProtocolError> {
    match text {
        Some(text) => text
            .to_str()
            .map(str::to_owned)
            .map_err(|_| ProtocolError::InvalidUtf8),
        None => Ok(String::new()),
    }
}

/// Held keys arrive as an array of native-endian `u32` keycodes.
fn key_array(bytes: &[u8]) -> Result<Vec<u32>, ProtocolError> {
    if bytes.len() % 4 != 0 {
        return Err(ProtocolError::MisalignedArray(bytes.len()));
    }
    let mut bytes = bytes;
    let mut keys = Vec::with_capacity(bytes.len() / 4);
    while bytes.has_remaining() {
        keys.push(bytes.get_u32_ne());
    }
    Ok(keys)
}
