//! The SFTP request/response message bodies ([draft-ietf-secsh-filexfer]).
//!
//! [draft-ietf-secsh-filexfer]: https://www.ietf.org/archive/id/draft-ietf-secsh-filexfer-13.txt

use bytes::Buf;

use crate::{
    error::{Error, Result},
    wire::{
        attrs::Attrs,
        cursor::{read_bytes, read_string, read_u32, read_u64, write_bytes, write_string, write_u32, write_u64, Reader},
    },
};

macro_rules! type_codes {
    ($($name:ident = $value:expr),+ $(,)?) => {
        $(pub(crate) const $name: u8 = $value;)+
    };
}

type_codes! {
    INIT = 1,
    VERSION = 2,
    OPEN = 3,
    CLOSE = 4,
    READ = 5,
    WRITE = 6,
    LSTAT = 7,
    FSTAT = 8,
    SETSTAT = 9,
    FSETSTAT = 10,
    OPENDIR = 11,
    READDIR = 12,
    REMOVE = 13,
    MKDIR = 14,
    RMDIR = 15,
    REALPATH = 16,
    STAT = 17,
    RENAME = 18,
    READLINK = 19,
    SYMLINK = 20,
    STATUS = 101,
    HANDLE = 102,
    DATA = 103,
    NAME = 104,
    ATTRS = 105,
    EXTENDED = 200,
    EXTENDED_REPLY = 201,
}

bitflags::bitflags! {
    /// `SSH_FXF_*` open flags (v3).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct OpenFlags: u32 {
        /// Open for reading.
        const READ = 0x01;
        /// Open for writing.
        const WRITE = 0x02;
        /// Force all writes to append.
        const APPEND = 0x04;
        /// Create the file if it doesn't exist.
        const CREATE = 0x08;
        /// Truncate an existing file to zero length.
        const TRUNCATE = 0x10;
        /// Fail if the file already exists (with `CREATE`).
        const EXCLUSIVE = 0x20;
    }
}

/// A single entry of a `SSH_FXP_NAME` reply.
#[derive(Debug, Clone)]
pub struct NameEntry {
    /// The bare file name.
    pub filename: String,
    /// The `ls -l`-style formatted entry, v3 only.
    pub longname: String,
    /// The entry's attributes.
    pub attrs: Attrs,
}

/// A decoded SFTP message body, sans the `length`/`type`/`id` framing (see
/// [`crate::client::poller`] for that).
#[derive(Debug, Clone)]
pub enum Message {
    /// `SSH_FXP_INIT`
    Init { version: u32 },
    /// `SSH_FXP_VERSION`
    Version { version: u32, extensions: Vec<(String, String)> },
    /// `SSH_FXP_OPEN`
    Open { path: String, flags: OpenFlags, attrs: Attrs },
    /// `SSH_FXP_CLOSE`
    Close { handle: Vec<u8> },
    /// `SSH_FXP_READ`
    Read { handle: Vec<u8>, offset: u64, len: u32 },
    /// `SSH_FXP_WRITE`
    Write { handle: Vec<u8>, offset: u64, data: Vec<u8> },
    /// `SSH_FXP_LSTAT`
    Lstat { path: String },
    /// `SSH_FXP_FSTAT`
    Fstat { handle: Vec<u8> },
    /// `SSH_FXP_SETSTAT`
    SetStat { path: String, attrs: Attrs },
    /// `SSH_FXP_FSETSTAT`
    FSetStat { handle: Vec<u8>, attrs: Attrs },
    /// `SSH_FXP_OPENDIR`
    OpenDir { path: String },
    /// `SSH_FXP_READDIR`
    ReadDir { handle: Vec<u8> },
    /// `SSH_FXP_REMOVE`
    Remove { path: String },
    /// `SSH_FXP_MKDIR`
    Mkdir { path: String, attrs: Attrs },
    /// `SSH_FXP_RMDIR`
    Rmdir { path: String },
    /// `SSH_FXP_REALPATH`
    Realpath { path: String },
    /// `SSH_FXP_STAT`
    Stat { path: String },
    /// `SSH_FXP_RENAME`
    Rename { old_path: String, new_path: String },
    /// `SSH_FXP_READLINK`
    Readlink { path: String },
    /// `SSH_FXP_SYMLINK`
    Symlink { link_path: String, target_path: String },
    /// `SSH_FXP_EXTENDED`
    Extended { request: String, data: Vec<u8> },

    /// `SSH_FXP_STATUS`
    Status { code: u32, message: String, language: String },
    /// `SSH_FXP_HANDLE`
    Handle { handle: Vec<u8> },
    /// `SSH_FXP_DATA`
    Data { data: Vec<u8> },
    /// `SSH_FXP_NAME`
    Name { entries: Vec<NameEntry> },
    /// `SSH_FXP_ATTRS`
    Attrs { attrs: Attrs },
    /// `SSH_FXP_EXTENDED_REPLY`
    ExtendedReply { data: Vec<u8> },
}

impl Message {
    /// Whether this message carries a `request-id` on the wire (every type
    /// except `INIT`/`VERSION`, per the draft).
    pub(crate) fn has_request_id(type_byte: u8) -> bool {
        !matches!(type_byte, INIT | VERSION)
    }

    pub(crate) fn type_byte(&self) -> u8 {
        match self {
            Self::Init { .. } => INIT,
            Self::Version { .. } => VERSION,
            Self::Open { .. } => OPEN,
            Self::Close { .. } => CLOSE,
            Self::Read { .. } => READ,
            Self::Write { .. } => WRITE,
            Self::Lstat { .. } => LSTAT,
            Self::Fstat { .. } => FSTAT,
            Self::SetStat { .. } => SETSTAT,
            Self::FSetStat { .. } => FSETSTAT,
            Self::OpenDir { .. } => OPENDIR,
            Self::ReadDir { .. } => READDIR,
            Self::Remove { .. } => REMOVE,
            Self::Mkdir { .. } => MKDIR,
            Self::Rmdir { .. } => RMDIR,
            Self::Realpath { .. } => REALPATH,
            Self::Stat { .. } => STAT,
            Self::Rename { .. } => RENAME,
            Self::Readlink { .. } => READLINK,
            Self::Symlink { .. } => SYMLINK,
            Self::Extended { .. } => EXTENDED,
            Self::Status { .. } => STATUS,
            Self::Handle { .. } => HANDLE,
            Self::Data { .. } => DATA,
            Self::Name { .. } => NAME,
            Self::Attrs { .. } => ATTRS,
            Self::ExtendedReply { .. } => EXTENDED_REPLY,
        }
    }

    /// Encode this message's body (sans `length`/`type`/`id`) for `version`.
    pub(crate) fn encode_body(&self, version: u32, out: &mut Vec<u8>) {
        match self {
            Self::Init { version } => write_u32(out, *version),
            Self::Version { version, extensions } => {
                write_u32(out, *version);
                for (name, value) in extensions {
                    write_string(out, name);
                    write_string(out, value);
                }
            }
            Self::Open { path, flags, attrs } => {
                write_string(out, path);
                write_u32(out, flags.bits());
                attrs.encode(version, out);
            }
            Self::Close { handle } | Self::Fstat { handle } | Self::ReadDir { handle } | Self::Handle { handle } => {
                write_bytes(out, handle)
            }
            Self::Read { handle, offset, len } => {
                write_bytes(out, handle);
                write_u64(out, *offset);
                write_u32(out, *len);
            }
            Self::Write { handle, offset, data } => {
                write_bytes(out, handle);
                write_u64(out, *offset);
                write_bytes(out, data);
            }
            Self::Lstat { path } | Self::OpenDir { path } | Self::Remove { path } | Self::Rmdir { path } | Self::Realpath { path } | Self::Stat { path } | Self::Readlink { path } => {
                write_string(out, path)
            }
            Self::SetStat { path, attrs } => {
                write_string(out, path);
                attrs.encode(version, out);
            }
            Self::FSetStat { handle, attrs } => {
                write_bytes(out, handle);
                attrs.encode(version, out);
            }
            Self::Mkdir { path, attrs } => {
                write_string(out, path);
                attrs.encode(version, out);
            }
            Self::Rename { old_path, new_path } => {
                write_string(out, old_path);
                write_string(out, new_path);
            }
            Self::Symlink { link_path, target_path } => {
                write_string(out, link_path);
                write_string(out, target_path);
            }
            Self::Extended { request, data } => {
                write_string(out, request);
                out.extend_from_slice(data);
            }
            Self::Status { code, message, language } => {
                write_u32(out, *code);
                write_string(out, message);
                write_string(out, language);
            }
            Self::Data { data } => write_bytes(out, data),
            Self::Name { entries } => {
                write_u32(out, entries.len() as u32);
                for entry in entries {
                    write_string(out, &entry.filename);
                    if version <= 3 {
                        write_string(out, &entry.longname);
                    }
                    entry.attrs.encode(version, out);
                }
            }
            Self::Attrs { attrs } => attrs.encode(version, out),
            Self::ExtendedReply { data } => out.extend_from_slice(data),
        }
    }

    /// Decode a message body of the given `type_byte`, for the negotiated `version`.
    pub(crate) fn decode_body(type_byte: u8, version: u32, cursor: &mut Reader) -> Result<Self> {
        Ok(match type_byte {
            INIT => Self::Init { version: read_u32(cursor)? },
            VERSION => {
                let version = read_u32(cursor)?;
                let mut extensions = Vec::new();
                // Extension pairs trail until the body is exhausted.
                while cursor.has_remaining() {
                    let name = read_string(cursor)?;
                    let value = read_string(cursor)?;
                    extensions.push((name, value));
                }
                Self::Version { version, extensions }
            }
            OPEN => Self::Open {
                path: read_string(cursor)?,
                flags: OpenFlags::from_bits_truncate(read_u32(cursor)?),
                attrs: Attrs::decode(version, cursor)?,
            },
            CLOSE => Self::Close { handle: read_bytes(cursor)? },
            READ => Self::Read {
                handle: read_bytes(cursor)?,
                offset: read_u64(cursor)?,
                len: read_u32(cursor)?,
            },
            WRITE => Self::Write {
                handle: read_bytes(cursor)?,
                offset: read_u64(cursor)?,
                data: read_bytes(cursor)?,
            },
            LSTAT => Self::Lstat { path: read_string(cursor)? },
            FSTAT => Self::Fstat { handle: read_bytes(cursor)? },
            SETSTAT => Self::SetStat {
                path: read_string(cursor)?,
                attrs: Attrs::decode(version, cursor)?,
            },
            FSETSTAT => Self::FSetStat {
                handle: read_bytes(cursor)?,
                attrs: Attrs::decode(version, cursor)?,
            },
            OPENDIR => Self::OpenDir { path: read_string(cursor)? },
            READDIR => Self::ReadDir { handle: read_bytes(cursor)? },
            REMOVE => Self::Remove { path: read_string(cursor)? },
            MKDIR => Self::Mkdir {
                path: read_string(cursor)?,
                attrs: Attrs::decode(version, cursor)?,
            },
            RMDIR => Self::Rmdir { path: read_string(cursor)? },
            REALPATH => Self::Realpath { path: read_string(cursor)? },
            STAT => Self::Stat { path: read_string(cursor)? },
            RENAME => Self::Rename {
                old_path: read_string(cursor)?,
                new_path: read_string(cursor)?,
            },
            READLINK => Self::Readlink { path: read_string(cursor)? },
            SYMLINK => Self::Symlink {
                link_path: read_string(cursor)?,
                target_path: read_string(cursor)?,
            },
            EXTENDED => {
                let request = read_string(cursor)?;
                let mut data = vec![0u8; cursor.remaining()];
                cursor.copy_to_slice(&mut data);
                Self::Extended { request, data }
            }
            STATUS => Self::Status {
                code: read_u32(cursor)?,
                message: read_string(cursor)?,
                language: read_string(cursor)?,
            },
            HANDLE => Self::Handle { handle: read_bytes(cursor)? },
            DATA => Self::Data { data: read_bytes(cursor)? },
            NAME => {
                let count = read_u32(cursor)?;
                let mut entries = Vec::with_capacity(count as usize);
                for _ in 0..count {
                    let filename = read_string(cursor)?;
                    let longname = if version <= 3 { read_string(cursor)? } else { String::new() };
                    let attrs = Attrs::decode(version, cursor)?;

                    entries.push(NameEntry { filename, longname, attrs });
                }
                Self::Name { entries }
            }
            ATTRS => Self::Attrs {
                attrs: Attrs::decode(version, cursor)?,
            },
            EXTENDED_REPLY => {
                let mut data = vec![0u8; cursor.remaining()];
                cursor.copy_to_slice(&mut data);
                Self::ExtendedReply { data }
            }
            other => {
                tracing::warn!("Unknown SFTP message type `{other}`");

                return Err(Error::BadMessage);
            }
        })
    }
}
