//! Host compositor connection
//!
//! [`HostConnection`] is the seam between the bridge and the transport to the
//! host compositor. The connection owns framing and the display object; for
//! every other object it asks the [`GlobalObjectListener`] which interface
//! the id was bound to, since only the listener's object table knows.

mod socket;

pub use socket::SocketConnection;

use std::ops::BitOr;
use std::os::fd::BorrowedFd;
use std::time::Duration;

use crate::error::{HostError, ProtocolError};
use crate::protocol::{Interface, ObjectId, Request, WireMessage};

/// Set of connection events to wait for or process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Interest(u32);

impl Interest {
    pub const NONE: Interest = Interest(0);
    pub const READABLE: Interest = Interest(0x01);
    pub const WRITABLE: Interest = Interest(0x02);

    pub fn contains(self, other: Interest) -> bool {
        self.0 & other.0 == other.0 && other.0 != 0
    }

    pub fn bits(self) -> u32 {
        self.0
    }
}

impl BitOr for Interest {
    type Output = Interest;

    fn bitor(self, rhs: Interest) -> Interest {
        Interest(self.0 | rhs.0)
    }
}

/// Receiver of everything the host sends, apart from display errors.
pub trait GlobalObjectListener {
    /// The host advertised a global object.
    fn global(&mut self, id: ObjectId, interface: &str, version: u32);

    /// Interface `object` was bound to, or `None` for ids the listener does
    /// not track. Messages for such ids are skipped.
    fn interface(&self, object: ObjectId) -> Option<Interface>;

    /// An event addressed to any object other than the display, already
    /// parsed against `interface`'s signature.
    fn object_event(&mut self, interface: Interface, message: &WireMessage) -> Result<(), ProtocolError>;
}

/// Connection to the host compositor.
pub trait HostConnection {
    /// Descriptor to poll for readability.
    fn fd(&self) -> BorrowedFd<'_>;

    /// Events the connection currently needs processed; `WRITABLE` is set
    /// while queued requests are waiting to be flushed.
    fn mask(&self) -> Interest;

    /// Queue a request for the next writable iteration.
    fn queue(&mut self, request: &Request) -> Result<(), HostError>;

    /// Process one round of `mask` events.
    ///
    /// A readable round performs at most one read, waiting up to `timeout`
    /// (`None` blocks), and dispatches every complete message to `listener`.
    /// Running out of time is not an error.
    fn iterate(
        &mut self,
        mask: Interest,
        timeout: Option<Duration>,
        listener: &mut dyn GlobalObjectListener,
    ) -> Result<(), HostError>;
}
