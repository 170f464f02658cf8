//! Requests the bridge sends to the host

use wayland_backend::protocol::Argument as Arg;

use super::wire::{wire_message, WireMessage};
use super::{compositor, drm, surface, ObjectId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Request {
    /// Ask the surface factory for a new surface with a client-chosen id.
    CreateSurface { compositor: ObjectId, id: ObjectId },
    DestroySurface { surface: ObjectId },
    Damage {
        surface: ObjectId,
        x: i32,
        y: i32,
        width: i32,
        height: i32,
    },
    /// Hand the device magic cookie to the host for authentication.
    Authenticate { drm: ObjectId, magic: u32 },
}

impl Request {
    /// Object the request is addressed to.
    pub fn target(&self) -> ObjectId {
        match *self {
            Request::CreateSurface {
                compositor: factory, ..
            } => factory,
            Request::DestroySurface { surface: target } | Request::Damage { surface: target, .. } => target,
            Request::Authenticate { drm: channel, .. } => channel,
        }
    }

    pub fn to_message(&self) -> WireMessage {
        let target = self.target();
        match *self {
            Request::CreateSurface { id, .. } => {
                wire_message(target, compositor::REQUEST_CREATE_SURFACE, [Arg::NewId(id)])
            }
            Request::DestroySurface { .. } => wire_message(target, surface::REQUEST_DESTROY, []),
            Request::Damage {
                x,
                y,
                width,
                height,
                ..
            } => wire_message(
                target,
                surface::REQUEST_DAMAGE,
                [Arg::Int(x), Arg::Int(y), Arg::Int(width), Arg::Int(height)],
            ),
            Request::Authenticate { magic, .. } => {
                wire_message(target, drm::REQUEST_AUTHENTICATE, [Arg::Uint(magic)])
            }
        }
    }
}
