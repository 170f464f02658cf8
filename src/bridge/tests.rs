use super::*;
use crate::error::InitStatus;
use crate::protocol::{display, drm, input_device, output, wire_message, Argument, WireArgument};
use crate::server::{DeviceId, InputHandles, RedirectTarget};
use calloop::EventLoop;
use std::collections::VecDeque;
use std::ffi::CString;
use std::io::{self, Write};
use std::os::unix::net::UnixStream;

#[derive(Debug, Clone, PartialEq)]
enum Posted {
    Device(ObjectId),
    Motion(DeviceId, i32, i32),
    Button(DeviceId, u32, bool),
    Key(DeviceId, u32, bool),
    Redirect(DeviceId, RedirectTarget),
}

#[derive(Default)]
struct Recording {
    posted: Vec<Posted>,
    origins: HashMap<WindowId, (i32, i32)>,
    next_device: u32,
}

impl DisplayServer for Recording {
    fn add_input_device(&mut self, host_id: ObjectId) -> InputHandles {
        self.posted.push(Posted::Device(host_id));
        self.next_device += 2;
        InputHandles {
            pointer: DeviceId(self.next_device - 1),
            keyboard: DeviceId(self.next_device),
        }
    }

    fn post_motion(&mut self, device: DeviceId, x: i32, y: i32) {
        self.posted.push(Posted::Motion(device, x, y));
    }

    fn post_button(&mut self, device: DeviceId, index: u32, pressed: bool) {
        self.posted.push(Posted::Button(device, index, pressed));
    }

    fn post_key(&mut self, device: DeviceId, keycode: u32, pressed: bool) {
        self.posted.push(Posted::Key(device, keycode, pressed));
    }

    fn set_redirect_window(&mut self, device: DeviceId, target: RedirectTarget) {
        self.posted.push(Posted::Redirect(device, target));
    }

    fn drawable_origin(&self, window: WindowId) -> Option<(i32, i32)> {
        self.origins.get(&window).copied()
    }
}

/// Connection that replays one batch of host messages per readable round.
///
/// Nothing is ever read from `socket`; writing to `peer` only makes it
/// readable for the event loop.
struct ScriptedConnection {
    socket: UnixStream,
    peer: UnixStream,
    batches: VecDeque<Vec<WireMessage>>,
    queued: Vec<Request>,
    sent: Vec<Request>,
}

impl ScriptedConnection {
    fn new(batches: Vec<Vec<WireMessage>>) -> Self {
        let (socket, peer) = UnixStream::pair().unwrap();
        Self {
            socket,
            peer,
            batches: batches.into(),
            queued: Vec::new(),
            sent: Vec::new(),
        }
    }
}

impl HostConnection for ScriptedConnection {
    fn fd(&self) -> BorrowedFd<'_> {
        self.socket.as_fd()
    }

    fn mask(&self) -> Interest {
        if self.queued.is_empty() {
            Interest::READABLE
        } else {
            Interest::READABLE | Interest::WRITABLE
        }
    }

    fn queue(&mut self, request: &Request) -> Result<(), HostError> {
        self.queued.push(*request);
        Ok(())
    }

    fn iterate(
        &mut self,
        mask: Interest,
        _timeout: Option<Duration>,
        listener: &mut dyn GlobalObjectListener,
    ) -> Result<(), HostError> {
        if mask.contains(Interest::WRITABLE) {
            self.sent.append(&mut self.queued);
        }
        if mask.contains(Interest::READABLE) {
            for message in self.batches.pop_front().unwrap_or_default() {
                if message.sender_id == ObjectId::DISPLAY {
                    if let HostEvent::Global {
                        id,
                        interface,
                        version,
                    } = decode_event(Interface::Display, &message)?
                    {
                        listener.global(id, &interface, version);
                    }
                } else if let Some(interface) = listener.interface(message.sender_id) {
                    listener.object_event(interface, &message)?;
                }
            }
        }
        Ok(())
    }
}

struct FakeAuth {
    magic: io::Result<u32>,
    opened: Vec<PathBuf>,
}

impl FakeAuth {
    fn new(magic: u32) -> Self {
        Self {
            magic: Ok(magic),
            opened: Vec::new(),
        }
    }
}

impl DeviceAuthenticator for FakeAuth {
    fn open(&mut self, path: &Path) -> io::Result<OwnedFd> {
        self.opened.push(path.to_path_buf());
        if path.starts_with("/missing") {
            return Err(io::Error::from(io::ErrorKind::NotFound));
        }
        Ok(OwnedFd::from(tempfile::tempfile()?))
    }

    fn magic(&mut self, _device: BorrowedFd<'_>) -> io::Result<u32> {
        match &self.magic {
            Ok(magic) => Ok(*magic),
            Err(e) => Err(io::Error::new(e.kind(), e.to_string())),
        }
    }
}

type Screen = HostedScreen<ScriptedConnection, Recording>;

fn text(s: &str) -> WireArgument {
    Argument::Str(Some(Box::new(CString::new(s).unwrap())))
}

fn global(id: u32, name: &str) -> WireMessage {
    wire_message(
        ObjectId::DISPLAY,
        display::EVENT_GLOBAL,
        [Argument::Uint(id), text(name), Argument::Uint(1)],
    )
}

fn device_event(drm_id: u32, name: &str) -> WireMessage {
    wire_message(ObjectId(drm_id), drm::EVENT_DEVICE, [text(name)])
}

fn authenticated(drm_id: u32) -> WireMessage {
    wire_message(ObjectId(drm_id), drm::EVENT_AUTHENTICATED, [])
}

fn geometry(output_id: u32, width: i32, height: i32) -> WireMessage {
    wire_message(
        ObjectId(output_id),
        output::EVENT_GEOMETRY,
        [Argument::Int(width), Argument::Int(height)],
    )
}

fn button(device: u32, code: u32, state: u32) -> WireMessage {
    wire_message(
        ObjectId(device),
        input_device::EVENT_BUTTON,
        [Argument::Uint(0), Argument::Uint(code), Argument::Uint(state)],
    )
}

fn key(device: u32, code: u32, state: u32) -> WireMessage {
    wire_message(
        ObjectId(device),
        input_device::EVENT_KEY,
        [Argument::Uint(0), Argument::Uint(code), Argument::Uint(state)],
    )
}

fn motion(device: u32, sx: i32, sy: i32) -> WireMessage {
    wire_message(
        ObjectId(device),
        input_device::EVENT_MOTION,
        [
            Argument::Uint(0),
            Argument::Int(0),
            Argument::Int(0),
            Argument::Int(sx),
            Argument::Int(sy),
        ],
    )
}

fn pointer_focus(device: u32, surface: Option<ObjectId>) -> WireMessage {
    wire_message(
        ObjectId(device),
        input_device::EVENT_POINTER_FOCUS,
        [
            Argument::Uint(0),
            Argument::Object(surface.unwrap_or(ObjectId::NULL)),
            Argument::Int(0),
            Argument::Int(0),
            Argument::Int(0),
            Argument::Int(0),
        ],
    )
}

fn keyboard_focus(device: u32, keys: &[u32]) -> WireMessage {
    let keys = keys.iter().flat_map(|key| key.to_ne_bytes()).collect();
    wire_message(
        ObjectId(device),
        input_device::EVENT_KEYBOARD_FOCUS,
        [
            Argument::Uint(0),
            Argument::Object(ObjectId::NULL),
            Argument::Array(Box::new(keys)),
        ],
    )
}

/// Globals: compositor 2, drm 3, output 5, input device 6.
fn handshake() -> Vec<Vec<WireMessage>> {
    vec![
        vec![
            global(2, "compositor"),
            global(3, "drm"),
            global(4, "shell"),
            global(5, "output"),
            global(6, "input_device"),
            device_event(3, "/dev/dri/card0"),
        ],
        vec![authenticated(3)],
    ]
}

fn config(timeout_ms: u64) -> BridgeConfig {
    let mut config = BridgeConfig::default();
    config.host.handshake_timeout_ms = timeout_ms;
    config
}

fn initialize(
    conn: ScriptedConnection,
    auth: &mut FakeAuth,
    config: &BridgeConfig,
) -> (EventLoop<'static, Screen>, Result<Screen, BridgeError>) {
    let event_loop = EventLoop::try_new().unwrap();
    let result = HostedScreen::initialize(conn, Recording::default(), auth, config, &event_loop.handle());
    (event_loop, result)
}

fn ready_screen(extra: Vec<Vec<WireMessage>>) -> (EventLoop<'static, Screen>, Screen) {
    let mut batches = handshake();
    batches.extend(extra);
    let mut auth = FakeAuth::new(0xfeed);
    let (event_loop, result) = initialize(ScriptedConnection::new(batches), &mut auth, &config(200));
    (event_loop, result.unwrap())
}

fn pump(screen: &mut Screen) {
    let fd = screen.poll_fd();
    screen.wakeup_handler(&[fd]).unwrap();
}

#[test]
fn test_bootstrap_authenticates() {
    let mut auth = FakeAuth::new(0xfeed);
    let (_loop, result) = initialize(ScriptedConnection::new(handshake()), &mut auth, &config(200));
    let screen = result.unwrap();

    assert!(screen.is_authenticated());
    assert!(screen.is_connected());
    assert_eq!(screen.device_name(), Some("/dev/dri/card0"));
    assert_eq!(screen.device_path(), Some(Path::new("/dev/dri/card0")));
    assert!(screen.device_fd().is_some());
    assert_eq!(auth.opened, vec![PathBuf::from("/dev/dri/card0")]);
    assert_eq!(
        screen.connection().sent,
        vec![Request::Authenticate {
            drm: ObjectId(3),
            magic: 0xfeed,
        }]
    );
    assert_eq!(screen.mask(), Interest::READABLE);
}

#[test]
fn test_discovery_binds_known_globals_only() {
    let (_loop, screen) = ready_screen(Vec::new());
    let session = screen.session();

    assert_eq!(session.compositor(), Some(ObjectId(2)));
    assert_eq!(session.drm(), Some(ObjectId(3)));
    assert_eq!(session.outputs().count(), 1);
    assert_eq!(session.input_devices().count(), 1);
    assert!(session.input_device(ObjectId(6)).is_some());
    assert_eq!(screen.server().posted, vec![Posted::Device(ObjectId(6))]);
}

#[test]
fn test_device_name_may_arrive_in_a_later_round() {
    let batches = vec![
        vec![global(2, "compositor"), global(3, "drm")],
        Vec::new(),
        vec![device_event(3, "/dev/dri/renderD128")],
        vec![authenticated(3)],
    ];
    let mut auth = FakeAuth::new(1);
    let (_loop, result) = initialize(ScriptedConnection::new(batches), &mut auth, &config(200));
    let screen = result.unwrap();
    assert_eq!(screen.device_name(), Some("/dev/dri/renderD128"));
}

#[test]
fn test_path_override_is_opened() {
    let mut config = config(200);
    config.device.path_override = Some(PathBuf::from("/dev/dri/card1"));
    let mut auth = FakeAuth::new(1);
    let (_loop, result) = initialize(ScriptedConnection::new(handshake()), &mut auth, &config);
    let screen = result.unwrap();
    assert_eq!(auth.opened, vec![PathBuf::from("/dev/dri/card1")]);
    assert_eq!(screen.device_name(), Some("/dev/dri/card0"));
    assert_eq!(screen.device_path(), Some(Path::new("/dev/dri/card1")));
}

#[test]
fn test_missing_drm_global_is_no_device() {
    let batches = vec![vec![global(2, "compositor"), global(5, "output")]];
    let mut auth = FakeAuth::new(1);
    let (_loop, result) = initialize(ScriptedConnection::new(batches), &mut auth, &config(30));
    let err = result.err().unwrap();
    assert!(matches!(err, BridgeError::NoDevice));
    assert_eq!(err.status(), InitStatus::BadAccess);
    assert!(auth.opened.is_empty());
}

#[test]
fn test_unopenable_device_is_bad_access() {
    let batches = vec![vec![global(3, "drm"), device_event(3, "/missing/card0")]];
    let mut auth = FakeAuth::new(1);
    let (_loop, result) = initialize(ScriptedConnection::new(batches), &mut auth, &config(30));
    let err = result.err().unwrap();
    assert!(matches!(err, BridgeError::DeviceOpen { .. }));
    assert_eq!(err.status(), InitStatus::BadAccess);
}

#[test]
fn test_magic_failure_is_bad_access() {
    let mut auth = FakeAuth {
        magic: Err(io::Error::from(io::ErrorKind::PermissionDenied)),
        opened: Vec::new(),
    };
    let (_loop, result) = initialize(ScriptedConnection::new(handshake()), &mut auth, &config(30));
    let err = result.err().unwrap();
    assert!(matches!(err, BridgeError::DeviceMagic(_)));
    assert_eq!(err.status(), InitStatus::BadAccess);
}

#[test]
fn test_missing_confirmation_times_out() {
    let mut batches = handshake();
    batches.pop();
    let mut auth = FakeAuth::new(1);
    let (_loop, result) = initialize(ScriptedConnection::new(batches), &mut auth, &config(30));
    let err = result.err().unwrap();
    assert!(matches!(err, BridgeError::AuthTimeout(t) if t == Duration::from_millis(30)));
    assert_eq!(err.status(), InitStatus::BadAccess);
}

#[test]
fn test_authenticated_before_magic_is_ignored() {
    let batches = vec![vec![
        global(3, "drm"),
        device_event(3, "/dev/dri/card0"),
        authenticated(3),
    ]];
    let mut auth = FakeAuth::new(0xfeed);
    let (_loop, result) = initialize(ScriptedConnection::new(batches), &mut auth, &config(100));
    let err = result.err().unwrap();
    assert!(matches!(err, BridgeError::AuthTimeout(t) if t == Duration::from_millis(100)));
    assert_eq!(err.status(), InitStatus::BadAccess);
    assert_eq!(auth.opened, vec![PathBuf::from("/dev/dri/card0")]);
}

#[test]
fn test_confirmation_after_early_authenticated_still_counts() {
    let mut batches = handshake();
    batches[0].push(authenticated(3));
    let mut auth = FakeAuth::new(0xfeed);
    let (_loop, result) = initialize(ScriptedConnection::new(batches), &mut auth, &config(200));
    let screen = result.unwrap();
    assert!(screen.is_authenticated());
    assert_eq!(
        screen.connection().sent,
        vec![Request::Authenticate {
            drm: ObjectId(3),
            magic: 0xfeed,
        }]
    );
}

#[test]
fn test_output_geometry_scenario() {
    let (_loop, mut screen) = ready_screen(vec![vec![geometry(5, 1920, 1080)]]);
    pump(&mut screen);

    let output = screen.session().output(ObjectId(5)).unwrap();
    assert_eq!((output.x, output.y), (0, 0));
    assert_eq!((output.width, output.height), (1920, 1080));
    assert_eq!((screen.width(), screen.height()), (1920, 1080));
}

#[test]
fn test_session_size_follows_last_output() {
    let mut batches = handshake();
    batches[0].push(global(7, "output"));
    batches.push(vec![geometry(5, 1920, 1080), geometry(7, 800, 600)]);
    let mut auth = FakeAuth::new(1);
    let (_loop, result) = initialize(ScriptedConnection::new(batches), &mut auth, &config(200));
    let mut screen = result.unwrap();
    pump(&mut screen);

    assert_eq!(screen.session().output(ObjectId(5)).unwrap().width, 1920);
    assert_eq!(screen.session().output(ObjectId(7)).unwrap().width, 800);
    assert_eq!(screen.session().size(), (800, 600));
}

#[test]
fn test_left_button_scenario() {
    let (_loop, mut screen) = ready_screen(vec![vec![button(6, BTN_LEFT, 1), button(6, BTN_LEFT, 0)]]);
    screen.server_mut().posted.clear();
    pump(&mut screen);

    assert_eq!(
        screen.server().posted,
        vec![
            Posted::Button(DeviceId(1), 1, true),
            Posted::Button(DeviceId(1), 1, false),
        ]
    );
}

#[test]
fn test_null_pointer_focus_scenario() {
    let (_loop, mut screen) = ready_screen(vec![vec![pointer_focus(6, None)]]);
    screen.server_mut().posted.clear();
    pump(&mut screen);

    assert_eq!(screen.session().input_device(ObjectId(6)).unwrap().focus(), None);
    assert_eq!(
        screen.server().posted,
        vec![Posted::Redirect(DeviceId(1), RedirectTarget::PointerRoot)]
    );
}

#[test]
fn test_focus_and_motion_through_surface() {
    let window = WindowId(0x200001);
    let surface = ObjectId(CLIENT_ID_START);
    let (_loop, mut screen) = ready_screen(vec![vec![pointer_focus(6, Some(surface)), motion(6, 5, 6)]]);
    screen.server_mut().origins.insert(window, (100, 200));
    assert_eq!(screen.create_surface(window).unwrap(), surface);
    screen.server_mut().posted.clear();
    pump(&mut screen);

    assert_eq!(
        screen.session().input_device(ObjectId(6)).unwrap().focus(),
        Some(window)
    );
    assert_eq!(
        screen.server().posted,
        vec![
            Posted::Redirect(DeviceId(1), RedirectTarget::Window(window)),
            Posted::Motion(DeviceId(1), 105, 206),
        ]
    );
}

#[test]
fn test_unknown_surface_focus_goes_to_root() {
    let (_loop, mut screen) = ready_screen(vec![vec![pointer_focus(6, Some(ObjectId(0x0200_0000)))]]);
    screen.server_mut().posted.clear();
    pump(&mut screen);
    assert_eq!(
        screen.server().posted,
        vec![Posted::Redirect(DeviceId(1), RedirectTarget::PointerRoot)]
    );
}

#[test]
fn test_keys_and_keyboard_focus() {
    let (_loop, mut screen) = ready_screen(vec![
        vec![keyboard_focus(6, &[KEY_LEFTMETA])],
        vec![key(6, 30, 1), key(6, KEY_LEFTMETA, 0)],
    ]);
    screen.server_mut().posted.clear();

    pump(&mut screen);
    let device = screen.session().input_device(ObjectId(6)).unwrap();
    assert!(device.modifiers().contains(Modifiers::META));

    pump(&mut screen);
    let device = screen.session().input_device(ObjectId(6)).unwrap();
    assert!(!device.modifiers().contains(Modifiers::META));
    assert_eq!(
        screen.server().posted,
        vec![
            Posted::Key(DeviceId(2), 38, true),
            Posted::Key(DeviceId(2), KEY_LEFTMETA + 8, false),
        ]
    );
}

#[test]
fn test_events_for_unknown_objects_are_ignored() {
    let unknown_opcode = wire_message(ObjectId(5), 9, []);
    let (_loop, mut screen) = ready_screen(vec![vec![
        button(42, BTN_LEFT, 1),
        unknown_opcode,
        authenticated(3),
    ]]);
    screen.server_mut().posted.clear();
    pump(&mut screen);
    assert!(screen.server().posted.is_empty());
    assert!(screen.is_authenticated());
}

#[test]
fn test_wakeup_ignores_foreign_descriptors() {
    let (_loop, mut screen) = ready_screen(vec![vec![geometry(5, 640, 480)]]);
    let other = screen.poll_fd() + 100;
    screen.wakeup_handler(&[other]).unwrap();
    assert_eq!(screen.width(), 0);
    pump(&mut screen);
    assert_eq!(screen.width(), 640);
}

#[test]
fn test_wakeup_matches_the_polled_descriptor() {
    let (_loop, mut screen) = ready_screen(vec![vec![geometry(5, 640, 480)]]);
    // The loop polls a duplicate of the connection fd.
    assert_ne!(screen.poll_fd(), screen.host_fd());

    let own = screen.host_fd();
    screen.wakeup_handler(&[own]).unwrap();
    assert_eq!(screen.width(), 0);

    let polled = screen.poll_fd();
    screen.wakeup_handler(&[own, polled]).unwrap();
    assert_eq!(screen.width(), 640);
}

#[test]
fn test_event_loop_dispatch_reaches_the_session() {
    let (mut event_loop, mut screen) = ready_screen(vec![vec![geometry(5, 800, 600)]]);
    (&screen.connection().peer).write_all(&[0]).unwrap();

    event_loop
        .dispatch(Some(Duration::from_secs(1)), &mut screen)
        .unwrap();
    assert_eq!((screen.width(), screen.height()), (800, 600));
    assert!(screen.is_connected());
}

#[test]
fn test_surface_requests_flush_in_block_handler() {
    let window = WindowId(0x200001);
    let (_loop, mut screen) = ready_screen(Vec::new());

    let surface = screen.create_surface(window).unwrap();
    screen
        .damage(
            window,
            DamageBox {
                x1: 10,
                y1: 20,
                x2: 30,
                y2: 60,
            },
        )
        .unwrap();
    assert!(screen.mask().contains(Interest::WRITABLE));

    screen.block_handler().unwrap();
    assert_eq!(screen.mask(), Interest::READABLE);
    assert_eq!(
        &screen.connection().sent[1..],
        &[
            Request::CreateSurface {
                compositor: ObjectId(2),
                id: surface,
            },
            Request::Damage {
                surface,
                x: 10,
                y: 20,
                width: 20,
                height: 40,
            },
        ]
    );
}

#[test]
fn test_surface_errors() {
    let (_loop, mut screen) = ready_screen(Vec::new());
    let window = WindowId(7);
    let damage = DamageBox {
        x1: 0,
        y1: 0,
        x2: 1,
        y2: 1,
    };

    assert!(matches!(screen.damage(window, damage), Err(BridgeError::UnknownWindow(7))));
    assert!(matches!(screen.destroy_surface(window), Err(BridgeError::UnknownWindow(7))));

    screen.create_surface(window).unwrap();
    assert!(matches!(screen.create_surface(window), Err(BridgeError::SurfaceExists(7))));
}

#[test]
fn test_surfaces_need_a_compositor() {
    let batches = vec![
        vec![global(3, "drm"), device_event(3, "/dev/dri/card0")],
        vec![authenticated(3)],
    ];
    let mut auth = FakeAuth::new(1);
    let (_loop, result) = initialize(ScriptedConnection::new(batches), &mut auth, &config(200));
    let mut screen = result.unwrap();
    assert!(matches!(screen.create_surface(WindowId(1)), Err(BridgeError::NoCompositor)));
}

#[test]
fn test_destroy_clears_focus() {
    let window = WindowId(0x200001);
    let surface = ObjectId(CLIENT_ID_START);
    let (_loop, mut screen) = ready_screen(vec![vec![pointer_focus(6, Some(surface))]]);
    screen.create_surface(window).unwrap();
    pump(&mut screen);
    assert_eq!(
        screen.session().input_device(ObjectId(6)).unwrap().focus(),
        Some(window)
    );

    screen.destroy_surface(window).unwrap();
    screen.block_handler().unwrap();
    assert_eq!(screen.session().input_device(ObjectId(6)).unwrap().focus(), None);
    assert!(screen.session().surfaces().is_empty());
    assert_eq!(
        screen.connection().sent.last(),
        Some(&Request::DestroySurface { surface })
    );
}

#[test]
fn test_surface_ids_are_not_reused() {
    let (_loop, mut screen) = ready_screen(Vec::new());
    let first = screen.create_surface(WindowId(1)).unwrap();
    screen.destroy_surface(WindowId(1)).unwrap();
    let second = screen.create_surface(WindowId(1)).unwrap();
    assert_eq!(first, ObjectId(CLIENT_ID_START));
    assert_eq!(second, ObjectId(CLIENT_ID_START + 1));
}
