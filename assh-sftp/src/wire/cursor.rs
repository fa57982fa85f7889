//! Tiny big-endian reader/writer helpers shared by [`super::attrs`] and
//! [`super::message`] — the SFTP wire format nests variable-length fields
//! (strings, attribute blocks, name lists) too irregularly for a single
//! derive to express, so bodies are walked by hand over [`bytes::Buf`]/
//! [`bytes::BufMut`], the way the rest of the pack's SFTP codecs do it.

use bytes::{Buf, BufMut};

use crate::error::{Error, Result};

/// A cursor over an in-memory SFTP message body.
pub(crate) type Reader<'a> = &'a [u8];

pub(crate) fn read_u8(cursor: &mut Reader) -> Result<u8> {
    if cursor.remaining() < 1 {
        return Err(Error::BadMessage);
    }

    Ok(cursor.get_u8())
}

pub(crate) fn read_u32(cursor: &mut Reader) -> Result<u32> {
    if cursor.remaining() < 4 {
        return Err(Error::BadMessage);
    }

    Ok(cursor.get_u32())
}

pub(crate) fn read_u64(cursor: &mut Reader) -> Result<u64> {
    if cursor.remaining() < 8 {
        return Err(Error::BadMessage);
    }

    Ok(cursor.get_u64())
}

pub(crate) fn read_bytes(cursor: &mut Reader) -> Result<Vec<u8>> {
    let len = read_u32(cursor)? as usize;
    if cursor.remaining() < len {
        return Err(Error::BadMessage);
    }

    let mut buf = vec![0u8; len];
    cursor.copy_to_slice(&mut buf);

    Ok(buf)
}

pub(crate) fn read_string(cursor: &mut Reader) -> Result<String> {
    Ok(String::from_utf8_lossy(&read_bytes(cursor)?).into_owned())
}

pub(crate) fn write_u8(out: &mut impl BufMut, value: u8) {
    out.put_u8(value);
}

pub(crate) fn write_u32(out: &mut impl BufMut, value: u32) {
    out.put_u32(value);
}

pub(crate) fn write_u64(out: &mut impl BufMut, value: u64) {
    out.put_u64(value);
}

pub(crate) fn write_bytes(out: &mut impl BufMut, value: &[u8]) {
    write_u32(out, value.len() as u32);
    out.put_slice(value);
}

pub(crate) fn write_string(out: &mut impl BufMut, value: &str) {
    write_bytes(out, value.as_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn u32_roundtrips() {
        let mut buf = Vec::new();
        write_u32(&mut buf, 0xdead_beef);

        let mut cursor: Reader = &buf;
        assert_eq!(read_u32(&mut cursor).unwrap(), 0xdead_beef);
    }

    #[test]
    fn string_roundtrips() {
        let mut buf = Vec::new();
        write_string(&mut buf, "hunter2");

        let mut cursor: Reader = &buf;
        assert_eq!(read_string(&mut cursor).unwrap(), "hunter2");
    }

    #[test]
    fn truncated_buffer_is_a_bad_message() {
        let mut cursor: Reader = &[0x00, 0x01][..];
        assert!(matches!(read_u32(&mut cursor), Err(Error::BadMessage)));
    }

    #[test]
    fn truncated_length_prefixed_field_is_a_bad_message() {
        let mut buf = Vec::new();
        write_u32(&mut buf, 10);
        buf.extend_from_slice(b"short");

        let mut cursor: Reader = &buf;
        assert!(matches!(read_bytes(&mut cursor), Err(Error::BadMessage)));
    }
}
