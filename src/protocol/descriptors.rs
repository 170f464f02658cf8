//! Message signatures of the host interfaces
//!
//! Laid out the way `wayland-scanner` lays out generated interfaces, so the
//! codec can walk `MessageDesc::signature` exactly like `wayland-backend`
//! does. Index in `requests`/`events` is the opcode.

use wayland_backend::protocol::{AllowNull, ArgumentType};

pub use wayland_backend::protocol::{Interface as InterfaceDesc, MessageDesc};

const fn message(name: &'static str, signature: &'static [ArgumentType]) -> MessageDesc {
    MessageDesc {
        name,
        signature,
        since: 1,
        is_destructor: false,
        child_interface: None,
        arg_interfaces: &[],
    }
}

pub static DISPLAY_INTERFACE: InterfaceDesc = InterfaceDesc {
    name: "display",
    version: 1,
    requests: &[],
    events: &[
        message(
            "error",
            &[
                ArgumentType::Object(AllowNull::Yes),
                ArgumentType::Uint,
                ArgumentType::Str(AllowNull::No),
            ],
        ),
        message(
            "global",
            &[ArgumentType::Uint, ArgumentType::Str(AllowNull::No), ArgumentType::Uint],
        ),
    ],
    c_ptr: None,
};

pub static COMPOSITOR_INTERFACE: InterfaceDesc = InterfaceDesc {
    name: "compositor",
    version: 1,
    requests: &[MessageDesc {
        child_interface: Some(&SURFACE_INTERFACE),
        ..message("create_surface", &[ArgumentType::NewId])
    }],
    events: &[],
    c_ptr: None,
};

pub static SURFACE_INTERFACE: InterfaceDesc = InterfaceDesc {
    name: "surface",
    version: 1,
    requests: &[
        MessageDesc {
            is_destructor: true,
            ..message("destroy", &[])
        },
        message(
            "damage",
            &[ArgumentType::Int, ArgumentType::Int, ArgumentType::Int, ArgumentType::Int],
        ),
    ],
    events: &[],
    c_ptr: None,
};

pub static DRM_INTERFACE: InterfaceDesc = InterfaceDesc {
    name: "drm",
    version: 1,
    requests: &[message("authenticate", &[ArgumentType::Uint])],
    events: &[
        message("device", &[ArgumentType::Str(AllowNull::No)]),
        message("authenticated", &[]),
    ],
    c_ptr: None,
};

pub static OUTPUT_INTERFACE: InterfaceDesc = InterfaceDesc {
    name: "output",
    version: 1,
    requests: &[],
    events: &[message("geometry", &[ArgumentType::Int, ArgumentType::Int])],
    c_ptr: None,
};

pub static INPUT_DEVICE_INTERFACE: InterfaceDesc = InterfaceDesc {
    name: "input_device",
    version: 1,
    requests: &[],
    events: &[
        message(
            "motion",
            &[
                ArgumentType::Uint,
                ArgumentType::Int,
                ArgumentType::Int,
                ArgumentType::Int,
                ArgumentType::Int,
            ],
        ),
        message(
            "button",
            &[ArgumentType::Uint, ArgumentType::Uint, ArgumentType::Uint],
        ),
        message("key", &[ArgumentType::Uint, ArgumentType::Uint, ArgumentType::Uint]),
        MessageDesc {
            arg_interfaces: &[&SURFACE_INTERFACE],
            ..message(
                "pointer_focus",
                &[
                    ArgumentType::Uint,
                    ArgumentType::Object(AllowNull::Yes),
                    ArgumentType::Int,
                    ArgumentType::Int,
                    ArgumentType::Int,
                    ArgumentType::Int,
                ],
            )
        },
        MessageDesc {
            arg_interfaces: &[&SURFACE_INTERFACE],
            ..message(
                "keyboard_focus",
                &[
                    ArgumentType::Uint,
                    ArgumentType::Object(AllowNull::Yes),
                    ArgumentType::Array,
                ],
            )
        },
    ],
    c_ptr: None,
};
