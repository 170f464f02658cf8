//! Unix socket transport to the host compositor

use std::io::{self, Read, Write};
use std::os::fd::{AsFd, BorrowedFd};
use std::os::unix::net::UnixStream;
use std::time::Duration;

use bytes::{Buf, BytesMut};
use log::{debug, trace};

use super::{GlobalObjectListener, HostConnection, Interest};
use crate::error::HostError;
use crate::protocol::{
    decode_event, write_message, HostEvent, Incoming, Interface, MessageReader, ObjectId, Request,
};

/// Host connection over a Unix stream socket.
pub struct SocketConnection {
    stream: UnixStream,
    reader: MessageReader,
    outgoing: BytesMut,
}

impl SocketConnection {
    const READ_CHUNK: usize = 4096;

    // A zero read timeout is rejected by the socket layer.
    const MIN_TIMEOUT: Duration = Duration::from_millis(1);

    /// Connect to the host by socket name.
    ///
    /// Abstract names are bound by the host including their terminating NUL,
    /// so `"wayland"` addresses the abstract socket `"\0wayland\0"`.
    pub fn connect(name: &str, abstract_socket: bool) -> io::Result<Self> {
        let stream = if abstract_socket {
            connect_abstract(name)?
        } else {
            UnixStream::connect(name)?
        };
        debug!("🔌 Connected to host socket {}", name);
        Ok(Self::from_stream(stream))
    }

    /// Wrap an already connected stream.
    pub fn from_stream(stream: UnixStream) -> Self {
        Self {
            stream,
            reader: MessageReader::new(),
            outgoing: BytesMut::new(),
        }
    }

    fn read_once(&mut self, timeout: Option<Duration>) -> Result<(), HostError> {
        self.stream
            .set_read_timeout(timeout.map(|t| t.max(Self::MIN_TIMEOUT)))?;

        let mut chunk = [0u8; Self::READ_CHUNK];
        match self.stream.read(&mut chunk) {
            Ok(0) => Err(HostError::Disconnected),
            Ok(n) => {
                trace!("read {} bytes from host", n);
                self.reader.push(&chunk[..n]);
                Ok(())
            }
            Err(e)
                if matches!(
                    e.kind(),
                    io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut | io::ErrorKind::Interrupted
                ) =>
            {
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    fn flush(&mut self) -> Result<(), HostError> {
        while !self.outgoing.is_empty() {
            match self.stream.write(&self.outgoing) {
                Ok(0) => return Err(HostError::Disconnected),
                Ok(n) => {
                    trace!("wrote {} bytes to host", n);
                    self.outgoing.advance(n);
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    fn dispatch(&mut self, listener: &mut dyn GlobalObjectListener) -> Result<(), HostError> {
        loop {
            let incoming = self.reader.next_message(|object, opcode| {
                let interface = if object == ObjectId::DISPLAY {
                    Interface::Display
                } else {
                    listener.interface(object)?
                };
                interface.event_signature(opcode)
            })?;

            let message = match incoming {
                None => return Ok(()),
                Some(Incoming::Skipped { object, opcode }) => {
                    debug!("Ignoring opcode {} for object {}", opcode, object);
                    continue;
                }
                Some(Incoming::Message(message)) => message,
            };

            if message.sender_id != ObjectId::DISPLAY {
                if let Some(interface) = listener.interface(message.sender_id) {
                    listener.object_event(interface, &message)?;
                }
                continue;
            }
            match decode_event(Interface::Display, &message)? {
                HostEvent::Global {
                    id,
                    interface,
                    version,
                } => listener.global(id, &interface, version),
                HostEvent::DisplayError {
                    object,
                    code,
                    message,
                } => {
                    return Err(HostError::HostReported {
                        object: object.unwrap_or(ObjectId::NULL),
                        code,
                        message,
                    })
                }
                other => debug!("Ignoring display event {:?}", other),
            }
        }
    }
}

impl HostConnection for SocketConnection {
    fn fd(&self) -> BorrowedFd<'_> {
        self.stream.as_fd()
    }

    fn mask(&self) -> Interest {
        if self.outgoing.is_empty() {
            Interest::READABLE
        } else {
            Interest::READABLE | Interest::WRITABLE
        }
    }

    fn queue(&mut self, request: &Request) -> Result<(), HostError> {
        trace!("queueing {:?}", request);
        write_message(&request.to_message(), &mut self.outgoing)?;
        Ok(())
    }

    fn iterate(
        &mut self,
        mask: Interest,
        timeout: Option<Duration>,
        listener: &mut dyn GlobalObjectListener,
    ) -> Result<(), HostError> {
        if mask.contains(Interest::WRITABLE) {
            self.flush()?;
        }
        if mask.contains(Interest::READABLE) {
            self.read_once(timeout)?;
            self.dispatch(listener)?;
        }
        Ok(())
    }
}

#[cfg(target_os = "linux")]
fn connect_abstract(name: &str) -> io::Result<UnixStream> {
    use std::os::linux::net::SocketAddrExt;
    use std::os::unix::net::SocketAddr;

    let mut bytes = name.as_bytes().to_vec();
    bytes.push(0);
    let addr = SocketAddr::from_abstract_name(&bytes)?;
    UnixStream::connect_addr(&addr)
}

#[cfg(not(target_os = "linux"))]
fn connect_abstract(_name: &str) -> io::Result<UnixStream> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "abstract sockets are only available on Linux",
    ))
}
