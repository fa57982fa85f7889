//! The wire encoding of the SFTP sub-protocol: `length(4) || type(1) ||
//! [request-id(4)] || body`.

mod cursor;

pub mod attrs;
pub mod message;

pub use attrs::{AttrFlags, Attrs, FileType};
pub use message::{Message, NameEntry, OpenFlags};

use cursor::Reader;

use crate::error::{Error, Result};

/// The default packet-size cap applied to uploads and downloads
/// (an implementation constant, at least 32 KiB).
pub const DEFAULT_PACKET_SIZE: u32 = 32 * 1024;

/// The maximum size of an inbound SFTP packet this client accepts, guarding
/// against a server advertising an absurd length.
pub const MAX_PACKET_SIZE: u32 = 16 * 1024 * 1024;

/// A decoded `(request-id, message)` pair — `request-id` is `None` only for
/// `SSH_FXP_INIT`/`SSH_FXP_VERSION`, which precede request-id allocation.
#[derive(Debug, Clone)]
pub struct Frame {
    /// The request this frame answers or issues, absent for init/version.
    pub id: Option<u32>,
    /// The decoded message body.
    pub message: Message,
}

impl Frame {
    /// Parse a full frame body (the bytes following the `length` field).
    pub fn decode(version: u32, body: &[u8]) -> Result<Self> {
        if body.is_empty() {
            return Err(Error::BadMessage);
        }

        let type_byte = body[0];
        let mut cursor: Reader = &body[1..];

        let id = if Message::has_request_id(type_byte) {
            Some(cursor::read_u32(&mut cursor)?)
        } else {
            None
        };

        let message = Message::decode_body(type_byte, version, &mut cursor)?;

        Ok(Self { id, message })
    }

    /// Encode this frame, including the `length` prefix, ready to write to the channel.
    pub fn encode(version: u32, id: Option<u32>, message: &Message) -> Vec<u8> {
        let mut body = Vec::new();
        body.push(message.type_byte());
        if let Some(id) = id {
            cursor::write_u32(&mut body, id);
        }
        message.encode_body(version, &mut body);

        let mut framed = Vec::with_capacity(4 + body.len());
        cursor::write_u32(&mut framed, body.len() as u32);
        framed.extend_from_slice(&body);

        framed
    }
}
