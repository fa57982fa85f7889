//! Normalized file attributes, decoded from whichever wire representation
//! the negotiated SFTP version uses.

use bitflags::bitflags;

use crate::{
    error::Result,
    wire::cursor::{read_string, read_u32, read_u64, read_u8, write_string, write_u32, write_u64, write_u8, Reader},
};

bitflags! {
    /// `ATTR_*` flag bits, valid range differs across versions but bit
    /// positions are stable for the subset this client round-trips.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct AttrFlags: u32 {
        /// `SSH_FILEXFER_ATTR_SIZE`
        const SIZE = 0x0000_0001;
        /// `SSH_FILEXFER_ATTR_UIDGID` (v3 only)
        const UIDGID = 0x0000_0002;
        /// `SSH_FILEXFER_ATTR_PERMISSIONS`
        const PERMISSIONS = 0x0000_0004;
        /// `SSH_FILEXFER_ATTR_ACMODTIME` (v3), roughly `ACCESSTIME|MODIFYTIME` in v4+
        const ACMODTIME = 0x0000_0008;
        /// `SSH_FILEXFER_ATTR_OWNERGROUP` (v4+, string owner/group instead of numeric)
        const OWNERGROUP = 0x0000_0080;
        /// `SSH_FILEXFER_ATTR_EXTENDED`
        const EXTENDED = 0x8000_0000;
    }
}

/// File type, normalized from the v4+ explicit type byte or inferred from
/// `permissions` on v3 (where no such byte exists on the wire).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FileType {
    /// A regular file.
    #[default]
    Regular,
    /// A directory.
    Directory,
    /// A symbolic link.
    Symlink,
    /// A named pipe, socket, device node, or anything else POSIX calls special.
    Special,
    /// Type couldn't be determined (no attribute data was returned).
    Unknown,
}

impl FileType {
    /// libc `S_IFMT`-family bits, as returned in `permissions` by a v3 server.
    fn from_mode(mode: u32) -> Self {
        match mode & 0o170000 {
            0o040000 => Self::Directory,
            0o120000 => Self::Symlink,
            0o100000 => Self::Regular,
            0 => Self::Unknown,
            _ => Self::Special,
        }
    }

    fn from_wire_byte(byte: u8) -> Self {
        match byte {
            1 => Self::Regular,
            2 => Self::Directory,
            3 => Self::Symlink,
            4 => Self::Special,
            _ => Self::Unknown,
        }
    }

    /// Whether the entry is a directory.
    pub fn is_dir(&self) -> bool {
        matches!(self, Self::Directory)
    }

    /// Whether the entry is a regular file.
    pub fn is_file(&self) -> bool {
        matches!(self, Self::Regular)
    }

    /// Whether the entry is a symbolic link.
    pub fn is_symlink(&self) -> bool {
        matches!(self, Self::Symlink)
    }
}

/// A normalized attribute record, spanning the union of what every
/// supported SFTP version (3 through 6) can express.
///
/// Unknown extended attributes are kept verbatim in [`Attrs::extended`] so a
/// `setstat` issued after a `stat` round-trips them even though this client
/// never interprets their meaning.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Attrs {
    /// The entry's type, `Unknown` when the server didn't report permission bits.
    pub file_type: FileType,
    /// Size in bytes, when reported.
    pub size: Option<u64>,
    /// Owning user id (v3) — v4+ owner strings are stored in `owner` instead.
    pub uid: Option<u32>,
    /// Owning group id (v3) — v4+ group strings are stored in `group` instead.
    pub gid: Option<u32>,
    /// Owner name, as reported by a v4+ server.
    pub owner: Option<String>,
    /// Group name, as reported by a v4+ server.
    pub group: Option<String>,
    /// POSIX permission bits, including the type bits on v3.
    pub permissions: Option<u32>,
    /// Last access time, Unix epoch seconds.
    pub atime: Option<u32>,
    /// Last modification time, Unix epoch seconds.
    pub mtime: Option<u32>,
    /// Extended attribute pairs preserved verbatim.
    pub extended: Vec<(String, String)>,
    /// The `longname` field from a v3 `SSH_FXP_NAME` entry, if any.
    pub longname: Option<String>,
}

impl Attrs {
    /// Build a bare-bones record carrying only a size, as produced for a `truncate`.
    pub fn with_size(size: u64) -> Self {
        Self {
            size: Some(size),
            ..Default::default()
        }
    }

    /// Build a record carrying only permission bits, as produced for a `chmod`.
    pub fn with_permissions(mode: u32) -> Self {
        Self {
            permissions: Some(mode),
            ..Default::default()
        }
    }

    /// Build a record carrying only access/modify times, as produced for a `touch`.
    pub fn with_times(atime: u32, mtime: u32) -> Self {
        Self {
            atime: Some(atime),
            mtime: Some(mtime),
            ..Default::default()
        }
    }

    pub(crate) fn decode(version: u32, cursor: &mut Reader) -> Result<Self> {
        let mut attrs = Self::default();

        let type_byte = if version >= 4 { Some(read_u8(cursor)?) } else { None };

        let flags = AttrFlags::from_bits_truncate(read_u32(cursor)?);

        if flags.contains(AttrFlags::SIZE) {
            attrs.size = Some(read_u64(cursor)?);
        }

        if version >= 4 {
            if flags.contains(AttrFlags::OWNERGROUP) {
                attrs.owner = Some(read_string(cursor)?);
                attrs.group = Some(read_string(cursor)?);
            }
        } else if flags.contains(AttrFlags::UIDGID) {
            attrs.uid = Some(read_u32(cursor)?);
            attrs.gid = Some(read_u32(cursor)?);
        }

        if flags.contains(AttrFlags::PERMISSIONS) {
            attrs.permissions = Some(read_u32(cursor)?);
        }

        if flags.contains(AttrFlags::ACMODTIME) {
            attrs.atime = Some(read_u32(cursor)?);
            attrs.mtime = Some(read_u32(cursor)?);
        }

        if flags.contains(AttrFlags::EXTENDED) {
            let count = read_u32(cursor)?;
            for _ in 0..count {
                let key = read_string(cursor)?;
                let value = read_string(cursor)?;
                attrs.extended.push((key, value));
            }
        }

        attrs.file_type = match type_byte {
            Some(byte) => FileType::from_wire_byte(byte),
            None => attrs.permissions.map(FileType::from_mode).unwrap_or(FileType::Unknown),
        };

        Ok(attrs)
    }

    pub(crate) fn encode(&self, version: u32, out: &mut Vec<u8>) {
        let mut flags = AttrFlags::empty();
        if self.size.is_some() {
            flags |= AttrFlags::SIZE;
        }
        if version >= 4 {
            if self.owner.is_some() || self.group.is_some() {
                flags |= AttrFlags::OWNERGROUP;
            }
        } else if self.uid.is_some() || self.gid.is_some() {
            flags |= AttrFlags::UIDGID;
        }
        if self.permissions.is_some() {
            flags |= AttrFlags::PERMISSIONS;
        }
        if self.atime.is_some() || self.mtime.is_some() {
            flags |= AttrFlags::ACMODTIME;
        }
        if !self.extended.is_empty() {
            flags |= AttrFlags::EXTENDED;
        }

        if version >= 4 {
            let byte = match self.file_type {
                FileType::Regular => 1u8,
                FileType::Directory => 2,
                FileType::Symlink => 3,
                FileType::Special => 4,
                FileType::Unknown => 0,
            };
            write_u8(out, byte);
        }

        write_u32(out, flags.bits());

        if let Some(size) = self.size {
            write_u64(out, size);
        }

        if version >= 4 {
            if let Some(owner) = &self.owner {
                write_string(out, owner);
            }
            if let Some(group) = &self.group {
                write_string(out, group);
            }
        } else {
            if let Some(uid) = self.uid {
                write_u32(out, uid);
            }
            if let Some(gid) = self.gid {
                write_u32(out, gid);
            }
        }

        if let Some(permissions) = self.permissions {
            write_u32(out, permissions);
        }

        if flags.contains(AttrFlags::ACMODTIME) {
            write_u32(out, self.atime.unwrap_or_default());
            write_u32(out, self.mtime.unwrap_or_default());
        }

        if !self.extended.is_empty() {
            write_u32(out, self.extended.len() as u32);
            for (key, value) in &self.extended {
                write_string(out, key);
                write_string(out, value);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attrs_v3_roundtrip() {
        let attrs = Attrs {
            size: Some(42),
            uid: Some(1000),
            gid: Some(1000),
            permissions: Some(0o100644),
            atime: Some(1_700_000_000),
            mtime: Some(1_700_000_001),
            ..Default::default()
        };

        let mut buf = Vec::new();
        attrs.encode(3, &mut buf);

        let mut cursor: Reader = &buf;
        let decoded = Attrs::decode(3, &mut cursor).unwrap();

        assert_eq!(decoded.size, Some(42));
        assert_eq!(decoded.uid, Some(1000));
        assert_eq!(decoded.permissions, Some(0o100644));
        assert_eq!(decoded.file_type, FileType::Regular);
    }

    #[test]
    fn attrs_preserve_unknown_extended_pairs() {
        let attrs = Attrs {
            extended: vec![("acl".into(), "opaque-blob".into())],
            ..Default::default()
        };

        let mut buf = Vec::new();
        attrs.encode(3, &mut buf);

        let mut cursor: Reader = &buf;
        let decoded = Attrs::decode(3, &mut cursor).unwrap();

        assert_eq!(decoded.extended, vec![("acl".to_string(), "opaque-blob".to_string())]);
    }
}
