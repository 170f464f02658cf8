//! Message framing and argument marshalling

use std::ffi::CString;
use std::os::fd::RawFd;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use wayland_backend::protocol::{Argument, ArgumentType, Message};

use super::ObjectId;
use crate::error::ProtocolError;

/// Object id word plus the size/opcode word.
pub const HEADER_SIZE: usize = 8;

/// A message on the host connection. The protocol passes no file
/// descriptors, so the fd slot is never filled.
pub type WireMessage = Message<ObjectId, RawFd>;

pub type WireArgument = Argument<ObjectId, RawFd>;

/// Build a message from `sender_id`, `opcode` and its arguments in order.
pub fn wire_message(
    sender_id: ObjectId,
    opcode: u16,
    args: impl IntoIterator<Item = WireArgument>,
) -> WireMessage {
    Message {
        sender_id,
        opcode,
        args: args.into_iter().collect(),
    }
}

/// Result of pulling one framed message off the stream.
#[derive(Debug)]
pub enum Incoming {
    Message(WireMessage),
    /// No signature was known for this object and opcode; the frame was
    /// consumed without being parsed.
    Skipped { object: ObjectId, opcode: u16 },
}

/// Accumulates bytes read from the socket and splits them into messages.
#[derive(Debug, Default)]
pub struct MessageReader {
    buffer: BytesMut,
}

impl MessageReader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// Pop the next complete message, or `None` if more bytes are needed.
    ///
    /// `signature` names the argument layout for the header's object and
    /// opcode; the arguments are parsed against it.
    pub fn next_message<F>(&mut self, signature: F) -> Result<Option<Incoming>, ProtocolError>
    where
        F: FnOnce(ObjectId, u16) -> Option<&'static [ArgumentType]>,
    {
        if self.buffer.len() < HEADER_SIZE {
            return Ok(None);
        }
        let mut header = &self.buffer[..HEADER_SIZE];
        let object = ObjectId(header.get_u32_ne());
        let word = header.get_u32_ne();
        let size = (word >> 16) as usize;
        let opcode = (word & 0xffff) as u16;

        if size < HEADER_SIZE {
            return Err(ProtocolError::InvalidSize(size));
        }
        if self.buffer.len() < size {
            return Ok(None);
        }

        let mut body = self.buffer.split_to(size).freeze();
        body.advance(HEADER_SIZE);

        let Some(signature) = signature(object, opcode) else {
            return Ok(Some(Incoming::Skipped { object, opcode }));
        };

        let mut message: WireMessage = Message {
            sender_id: object,
            opcode,
            args: Default::default(),
        };
        for arg in signature {
            message.args.push(parse_arg(&mut body, arg)?);
        }
        if body.has_remaining() {
            return Err(ProtocolError::TrailingBytes(body.remaining()));
        }
        Ok(Some(Incoming::Message(message)))
    }
}

fn parse_arg(body: &mut Bytes, arg: &ArgumentType) -> Result<WireArgument, ProtocolError> {
    Ok(match arg {
        ArgumentType::Int => Argument::Int(take_u32(body)? as i32),
        ArgumentType::Uint => Argument::Uint(take_u32(body)?),
        ArgumentType::Fixed => Argument::Fixed(take_u32(body)? as i32),
        ArgumentType::Str(_) => {
            let len = take_u32(body)? as usize;
            if len == 0 {
                Argument::Str(None)
            } else {
                let bytes = take_padded(body, len)?;
                let string = CString::from_vec_with_nul(bytes.to_vec())
                    .map_err(|_| ProtocolError::UnterminatedString)?;
                Argument::Str(Some(Box::new(string)))
            }
        }
        ArgumentType::Object(_) => Argument::Object(ObjectId(take_u32(body)?)),
        ArgumentType::NewId => Argument::NewId(ObjectId(take_u32(body)?)),
        ArgumentType::Array => {
            let len = take_u32(body)? as usize;
            Argument::Array(Box::new(take_padded(body, len)?.to_vec()))
        }
        ArgumentType::Fd => return Err(ProtocolError::UnexpectedFd),
    })
}

fn take_u32(body: &mut Bytes) -> Result<u32, ProtocolError> {
    if body.remaining() < 4 {
        return Err(ProtocolError::Truncated {
            needed: 4 - body.remaining(),
        });
    }
    Ok(body.get_u32_ne())
}

/// Split off `len` bytes and skip the padding up to the next word.
fn take_padded(body: &mut Bytes, len: usize) -> Result<Bytes, ProtocolError> {
    let padded = len.div_ceil(4) * 4;
    if body.remaining() < padded {
        return Err(ProtocolError::Truncated {
            needed: padded - body.remaining(),
        });
    }
    let data = body.split_to(len);
    body.advance(padded - len);
    Ok(data)
}

/// Append the wire form of `message` to `dst`.
///
/// On error nothing is appended.
pub fn write_message(message: &WireMessage, dst: &mut BytesMut) -> Result<(), ProtocolError> {
    let start = dst.len();
    dst.put_u32_ne(message.sender_id.0);
    // size/opcode word, filled in once the size is known
    dst.put_u32_ne(0);

    for arg in message.args.iter() {
        match arg {
            Argument::Int(value) | Argument::Fixed(value) => dst.put_i32_ne(*value),
            Argument::Uint(value) => dst.put_u32_ne(*value),
            Argument::Str(None) => dst.put_u32_ne(0),
            Argument::Str(Some(string)) => put_padded(dst, string.as_bytes_with_nul()),
            Argument::Object(id) | Argument::NewId(id) => dst.put_u32_ne(id.0),
            Argument::Array(bytes) => put_padded(dst, bytes),
            Argument::Fd(_) => {
                dst.truncate(start);
                return Err(ProtocolError::UnexpectedFd);
            }
        }
    }

    let size = dst.len() - start;
    if size > usize::from(u16::MAX) {
        dst.truncate(start);
        return Err(ProtocolError::MessageTooLarge(size));
    }
    let word = ((size as u32) << 16) | u32::from(message.opcode);
    dst[start + 4..start + HEADER_SIZE].copy_from_slice(&word.to_ne_bytes());
    Ok(())
}

fn put_padded(dst: &mut BytesMut, bytes: &[u8]) {
    dst.put_u32_ne(bytes.len() as u32);
    dst.put_slice(bytes);
    dst.put_bytes(0, bytes.len().div_ceil(4) * 4 - bytes.len());
}
