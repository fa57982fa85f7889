//! Pipelined `get`/`put` transfers: several `SSH_FXP_READ`/`SSH_FXP_WRITE`
//! requests are kept in flight at once instead of waiting for each reply
//! before issuing the next, so throughput isn't bound by the connection's
//! round-trip time.

use std::collections::VecDeque;

use assh::Pipe;
use futures::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use super::Sftp;
use crate::{
    error::{Error, Result},
    wire::{self, Message, OpenFlags},
};

/// How many `read`/`write` requests this client keeps unacknowledged at once.
const PIPELINE_DEPTH: usize = 16;

/// Progress notification emitted as a transfer proceeds.
#[derive(Debug, Clone, Copy)]
pub struct Progress {
    /// Bytes transferred so far.
    pub transferred: u64,
    /// The source's total size, when known ahead of time.
    pub total: Option<u64>,
}

/// How a [`Sftp::put`] upload should open the remote file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PutMode {
    /// `create|truncate|write`: the common case, overwriting any existing
    /// content at the destination.
    #[default]
    Overwrite,

    /// `create|append|write`: every write lands at the remote's current
    /// end-of-file, regardless of the offset the caller tracks locally.
    Append,

    /// `write` only: the file must already exist; used for partial
    /// rewrites starting at an explicit offset.
    Update,
}

impl PutMode {
    fn flags(self) -> OpenFlags {
        match self {
            Self::Overwrite => OpenFlags::WRITE | OpenFlags::CREATE | OpenFlags::TRUNCATE,
            Self::Append => OpenFlags::WRITE | OpenFlags::CREATE | OpenFlags::APPEND,
            Self::Update => OpenFlags::WRITE,
        }
    }
}

impl<'a, IO: Pipe> Sftp<'a, IO> {
    /// Download `remote` into `local`, issuing up to [`PIPELINE_DEPTH`]
    /// concurrent reads starting at `offset`. When `length` is `Some`, the
    /// transfer stops after that many bytes even if the server would send
    /// more; `None` reads until EOF. A reply shorter than requested ends the
    /// transfer.
    pub async fn get<W>(
        &self,
        remote: impl AsRef<str>,
        local: &mut W,
        offset: u64,
        length: Option<u64>,
        mut on_progress: impl FnMut(Progress),
    ) -> Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        let path = self.path(remote.as_ref()).await;
        let total = self.stat(&path).await.ok().and_then(|attrs| attrs.size);

        let handle = self.request_handle(Message::Open {
            path: path.clone(),
            flags: OpenFlags::READ,
            attrs: Default::default(),
        }).await?;

        let chunk_len = wire::DEFAULT_PACKET_SIZE;
        let mut next_offset = offset;
        let end = length.map(|len| offset + len);
        let mut transferred = 0u64;
        let mut eof_requested = false;
        let mut inflight: VecDeque<(u32, u64)> = VecDeque::new();

        let result = async {
            loop {
                while !eof_requested && inflight.len() < PIPELINE_DEPTH {
                    if end.is_some_and(|end| next_offset >= end) {
                        break;
                    }

                    let remaining = end.map_or(chunk_len, |end| (end - next_offset).min(chunk_len as u64) as u32);
                    if remaining == 0 {
                        break;
                    }

                    let id = self.next_id();
                    self.send_frame(
                        Some(id),
                        &Message::Read {
                            handle: handle.clone(),
                            offset: next_offset,
                            len: remaining,
                        },
                    )
                    .await?;

                    inflight.push_back((id, next_offset));
                    next_offset += remaining as u64;
                }

                let Some((id, req_offset)) = inflight.pop_front() else {
                    break;
                };

                match self.reply(id).await? {
                    Message::Data { data } => {
                        let requested = end.map_or(chunk_len, |end| (end - req_offset).min(chunk_len as u64) as u32);

                        local
                            .write_all(&data)
                            .await
                            .map_err(|_| Error::Failure("failed writing downloaded data locally".into()))?;

                        transferred += data.len() as u64;
                        on_progress(Progress { transferred, total });

                        if (data.len() as u32) < requested {
                            eof_requested = true;
                        }
                    }
                    Message::Status { code, message, .. } => match Error::from_status(code, message) {
                        Some(Error::Eof) => {
                            eof_requested = true;
                        }
                        Some(err) => return Err(err),
                        None => return Err(Error::BadMessage),
                    },
                    _ => return Err(Error::BadMessage),
                }

                if (eof_requested || end.is_some_and(|end| next_offset >= end)) && inflight.is_empty() {
                    break;
                }
            }

            local
                .flush()
                .await
                .map_err(|_| Error::Failure("failed flushing downloaded data locally".into()))?;

            Ok(())
        }
        .await;

        self.request_status(Message::Close { handle }).await?;

        result
    }

    /// Upload `local` into `remote`, pipelining up to [`PIPELINE_DEPTH`]
    /// unacknowledged writes starting at `start_offset`. `mode` selects the
    /// open flags. When date preservation is enabled, applies `times` via
    /// `SETSTAT` after a successful upload.
    pub async fn put<R>(
        &self,
        local: &mut R,
        remote: impl AsRef<str>,
        mode: PutMode,
        start_offset: u64,
        times: Option<(u32, u32)>,
        mut on_progress: impl FnMut(Progress),
    ) -> Result<()>
    where
        R: AsyncRead + Unpin,
    {
        let path = self.path(remote.as_ref()).await;

        let handle = self.request_handle(Message::Open {
            path: path.clone(),
            flags: mode.flags(),
            attrs: Default::default(),
        }).await?;

        let chunk_len = wire::DEFAULT_PACKET_SIZE as usize;
        let mut offset = start_offset;
        let mut transferred = 0u64;
        let mut inflight: VecDeque<u32> = VecDeque::new();

        let result: Result<()> = async {
            loop {
                let mut buf = vec![0u8; chunk_len];
                let read = local
                    .read(&mut buf)
                    .await
                    .map_err(|_| Error::Failure("failed reading local data to upload".into()))?;

                if read == 0 {
                    break;
                }

                buf.truncate(read);

                while inflight.len() >= PIPELINE_DEPTH {
                    let id = inflight.pop_front().expect("inflight checked non-empty");
                    self.expect_write_status(id).await?;
                }

                let id = self.next_id();
                self.send_frame(Some(id), &Message::Write { handle: handle.clone(), offset, data: buf })
                    .await?;
                inflight.push_back(id);

                offset += read as u64;
                transferred += read as u64;
                on_progress(Progress { transferred, total: None });
            }

            while let Some(id) = inflight.pop_front() {
                self.expect_write_status(id).await?;
            }

            Ok(())
        }
        .await;

        self.request_status(Message::Close { handle: handle.clone() }).await?;

        result?;

        if let Some((atime, mtime)) = times {
            if self.preserve_dates.load(std::sync::atomic::Ordering::SeqCst) {
                self.setstat(&path, wire::Attrs::with_times(atime, mtime)).await?;
            }
        }

        self.cache.lock().await.invalidate(&path);

        Ok(())
    }

    async fn expect_write_status(&self, id: u32) -> Result<()> {
        match self.reply(id).await? {
            Message::Status { code, message, .. } => match Error::from_status(code, message) {
                Some(err) => Err(err),
                None => Ok(()),
            },
            _ => Err(Error::BadMessage),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_mode_flags() {
        assert_eq!(
            PutMode::Overwrite.flags(),
            OpenFlags::WRITE | OpenFlags::CREATE | OpenFlags::TRUNCATE
        );
        assert_eq!(
            PutMode::Append.flags(),
            OpenFlags::WRITE | OpenFlags::CREATE | OpenFlags::APPEND
        );
        assert_eq!(PutMode::Update.flags(), OpenFlags::WRITE);
    }

    #[test]
    fn put_mode_default_is_overwrite() {
        assert_eq!(PutMode::default(), PutMode::Overwrite);
    }
}
