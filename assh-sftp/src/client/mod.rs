//! The client side of the SFTP subsystem, layered over exactly
//! one `session` channel carrying the `sftp` subsystem.

use std::{
    collections::HashMap,
    sync::atomic::{AtomicU32, Ordering},
};

use assh::Pipe;
use assh_connect::{
    channel::{Channel, ChannelRequestContext},
    connect::{ChannelOpenContext, Connect},
};
use futures::{lock::Mutex, AsyncReadExt, AsyncWriteExt};

mod cache;
use cache::StatCache;

mod dir;
mod transfer;

pub use transfer::{Progress, PutMode};

use crate::{
    error::{Error, Result},
    wire::{self, Frame, Message, OpenFlags},
};

/// The highest protocol version this client offers in its `SSH_FXP_INIT`;
/// a server offering more negotiates down to this.
const CLIENT_VERSION: u32 = 3;

/// The SFTP client session, bound to one `session` channel.
pub struct Sftp<'a, IO: Pipe> {
    channel: Channel<'a, IO>,

    version: u32,
    next_id: AtomicU32,

    /// Frames received out of turn, keyed by the request id they answer.
    delivered: Mutex<HashMap<u32, Message>>,
    /// Held by whichever in-flight caller currently owns the physical read.
    recv_lock: Mutex<()>,
    /// Held by whichever in-flight caller currently owns the physical write.
    send_lock: Mutex<()>,

    cwd: Mutex<String>,
    cache: Mutex<StatCache>,

    canonicalize: std::sync::atomic::AtomicBool,
    preserve_dates: std::sync::atomic::AtomicBool,
}

impl<'a, IO: Pipe> Sftp<'a, IO> {
    /// Open the `sftp` subsystem over a new `session` channel and run the
    /// `SSH_FXP_INIT`/`SSH_FXP_VERSION` handshake.
    pub async fn new(connect: &'a Connect<IO>) -> Result<Self> {
        let channel = match connect.channel_open(ChannelOpenContext::Session).await? {
            assh_connect::channel_open::Response::Success(channel) => channel,
            assh_connect::channel_open::Response::Rejected { reason, message } => {
                return Err(assh_connect::Error::ChannelOpenFailure { reason, message }.into())
            }
        };

        let response = channel
            .request_wait(ChannelRequestContext::Subsystem {
                name: "sftp".as_bytes().into(),
            })
            .await?;

        if response != assh_connect::channel::request::Response::Success {
            return Err(Error::OpUnsupported("peer refused the `sftp` subsystem request".into()));
        }

        let mut sftp = Self {
            channel,

            version: CLIENT_VERSION,
            next_id: AtomicU32::new(0),

            delivered: Default::default(),
            recv_lock: Default::default(),
            send_lock: Default::default(),

            cwd: Mutex::new(String::new()),
            cache: Default::default(),

            canonicalize: std::sync::atomic::AtomicBool::new(true),
            preserve_dates: std::sync::atomic::AtomicBool::new(false),
        };

        sftp.init().await?;

        let cwd = sftp.realpath(".").await?;
        *sftp.cwd.lock().await = cwd;

        Ok(sftp)
    }

    async fn init(&mut self) -> Result<()> {
        self.send_frame(None, &Message::Init { version: CLIENT_VERSION }).await?;

        let frame = self.recv_frame().await?;
        match frame.message {
            Message::Version { version, extensions } => {
                self.version = version.min(CLIENT_VERSION).max(3);

                tracing::debug!(
                    "Negotiated SFTP version {} (server offered {version}, extensions: {})",
                    self.version,
                    extensions.len()
                );

                Ok(())
            }
            _ => Err(Error::UnsupportedVersion),
        }
    }

    fn next_id(&self) -> u32 {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }

    async fn recv_frame(&self) -> Result<Frame> {
        let mut reader = self.channel.as_reader();

        let mut len_buf = [0u8; 4];
        reader
            .read_exact(&mut len_buf)
            .await
            .map_err(|_| Error::ConnectionLost("channel closed while awaiting an SFTP reply".into()))?;
        let len = u32::from_be_bytes(len_buf);

        if len == 0 || len > wire::MAX_PACKET_SIZE {
            return Err(Error::BadMessage);
        }

        let mut body = vec![0u8; len as usize];
        reader
            .read_exact(&mut body)
            .await
            .map_err(|_| Error::ConnectionLost("channel closed mid-frame".into()))?;

        Frame::decode(self.version, &body)
    }

    async fn send_frame(&self, id: Option<u32>, message: &Message) -> Result<()> {
        let _guard = self.send_lock.lock().await;

        let mut writer = self.channel.as_writer();
        let framed = Frame::encode(self.version, id, message);

        writer
            .write_all(&framed)
            .await
            .map_err(|_| Error::ConnectionLost("channel closed while sending an SFTP request".into()))?;
        writer
            .flush()
            .await
            .map_err(|_| Error::ConnectionLost("channel closed while sending an SFTP request".into()))?;

        Ok(())
    }

    /// Wait for the reply matching `id`, pumping the physical read whenever
    /// this caller is the one that acquires `recv_lock`; replies for other
    /// ids are stashed in `delivered` for their own waiter to pick up.
    async fn reply(&self, id: u32) -> Result<Message> {
        loop {
            if let Some(message) = self.delivered.lock().await.remove(&id) {
                return Ok(message);
            }

            let _guard = self.recv_lock.lock().await;

            // Someone may have delivered our reply while we queued for the lock.
            if let Some(message) = self.delivered.lock().await.remove(&id) {
                return Ok(message);
            }

            let frame = self.recv_frame().await?;

            match frame.id {
                Some(fid) if fid == id => return Ok(frame.message),
                Some(fid) => {
                    self.delivered.lock().await.insert(fid, frame.message);
                }
                None => {
                    tracing::warn!("Dropped an id-less SFTP frame received mid-session");
                }
            }
        }
    }

    async fn request(&self, message: Message) -> Result<Message> {
        let id = self.next_id();

        self.send_frame(Some(id), &message).await?;
        self.reply(id).await
    }

    /// Issue `message`, expecting a plain `SSH_FXP_STATUS` in reply, and
    /// turn a non-OK status into the matching [`Error`].
    async fn request_status(&self, message: Message) -> Result<()> {
        match self.request(message).await? {
            Message::Status { code, message, .. } => match Error::from_status(code, message) {
                Some(err) => Err(err),
                None => Ok(()),
            },
            _ => Err(Error::BadMessage),
        }
    }

    async fn request_handle(&self, message: Message) -> Result<Vec<u8>> {
        match self.request(message).await? {
            Message::Handle { handle } => Ok(handle),
            Message::Status { code, message, .. } => {
                Err(Error::from_status(code, message).unwrap_or(Error::BadMessage))
            }
            _ => Err(Error::BadMessage),
        }
    }

    async fn request_attrs(&self, message: Message) -> Result<wire::Attrs> {
        match self.request(message).await? {
            Message::Attrs { attrs } => Ok(attrs),
            Message::Status { code, message, .. } => {
                Err(Error::from_status(code, message).unwrap_or(Error::BadMessage))
            }
            _ => Err(Error::BadMessage),
        }
    }

    /// The negotiated protocol version, between 3 and 6 inclusive.
    pub fn version(&self) -> u32 {
        self.version
    }

    /// Toggle path canonicalization.
    ///
    /// When disabled, paths are transmitted to the server verbatim instead
    /// of being resolved through `chdir`'s cached working directory.
    pub fn enable_path_canonicalization(&self, enabled: bool) {
        self.canonicalize.store(enabled, Ordering::SeqCst);
    }

    /// Toggle preserving the source's mtime/atime after a successful `put`.
    pub fn enable_date_preservation(&self, enabled: bool) {
        self.preserve_dates.store(enabled, Ordering::SeqCst);
    }

    fn resolve(&self, path: &str, cwd: &str) -> String {
        if !self.canonicalize.load(Ordering::SeqCst) || path.starts_with('/') || cwd.is_empty() {
            path.to_string()
        } else {
            format!("{}/{}", cwd.trim_end_matches('/'), path)
        }
    }

    async fn path(&self, path: &str) -> String {
        let cwd = self.cwd.lock().await;
        self.resolve(path, &cwd)
    }

    /// `SSH_FXP_REALPATH`: resolve `path` to its canonical absolute form.
    pub async fn realpath(&self, path: &str) -> Result<String> {
        match self.request(Message::Realpath { path: path.to_string() }).await? {
            Message::Name { mut entries } if !entries.is_empty() => Ok(entries.remove(0).filename),
            Message::Status { code, message, .. } => {
                Err(Error::from_status(code, message).unwrap_or(Error::BadMessage))
            }
            _ => Err(Error::BadMessage),
        }
    }

    /// Change the client's cached working directory, verifying the target
    /// is a directory.
    pub async fn chdir(&self, path: impl AsRef<str>) -> Result<()> {
        let target = self.path(path.as_ref()).await;
        let canon = self.realpath(&target).await?;

        let attrs = self.stat(&canon).await?;
        if !attrs.file_type.is_dir() {
            return Err(Error::Failure(format!("{canon} is not a directory")));
        }

        *self.cwd.lock().await = canon;

        Ok(())
    }

    /// The client's cached working directory.
    pub async fn pwd(&self) -> String {
        self.cwd.lock().await.clone()
    }

    /// `SSH_FXP_STAT`: follows symlinks.
    pub async fn stat(&self, path: impl AsRef<str>) -> Result<wire::Attrs> {
        let path = self.path(path.as_ref()).await;

        if let Some(attrs) = self.cache.lock().await.get(&path) {
            return Ok(attrs.clone());
        }

        let attrs = self.request_attrs(Message::Stat { path: path.clone() }).await?;

        let mut cache = self.cache.lock().await;
        if attrs.file_type.is_dir() {
            // A path previously known as a non-directory leaf turned out to be a
            // directory: drop any stale listing so the next `readdir` repopulates it.
            cache.convert_to_directory(&path);
        }
        cache.insert_unlisted(&path, attrs.clone());

        Ok(attrs)
    }

    /// `SSH_FXP_LSTAT`: does not follow symlinks.
    pub async fn lstat(&self, path: impl AsRef<str>) -> Result<wire::Attrs> {
        let path = self.path(path.as_ref()).await;

        self.request_attrs(Message::Lstat { path }).await
    }

    /// The size, in bytes, of `path`.
    pub async fn size(&self, path: impl AsRef<str>) -> Result<u64> {
        self.stat(path)
            .await?
            .size
            .ok_or_else(|| Error::Failure("server did not report a size".into()))
    }

    /// The normalized [`wire::FileType`] of `path`.
    pub async fn filetype(&self, path: impl AsRef<str>) -> Result<wire::FileType> {
        Ok(self.stat(path).await?.file_type)
    }

    /// Whether `path` exists, treating `NoSuchFile` as `false` and
    /// propagating every other error.
    pub async fn file_exists(&self, path: impl AsRef<str>) -> Result<bool> {
        match self.stat(path).await {
            Ok(_) => Ok(true),
            Err(Error::NoSuchFile(_)) => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// Whether `path` is a directory.
    pub async fn is_dir(&self, path: impl AsRef<str>) -> Result<bool> {
        Ok(self.stat(path).await?.file_type.is_dir())
    }

    /// Whether `path` is a regular file.
    pub async fn is_file(&self, path: impl AsRef<str>) -> Result<bool> {
        Ok(self.stat(path).await?.file_type.is_file())
    }

    /// `SSH_FXP_READLINK`.
    pub async fn readlink(&self, path: impl AsRef<str>) -> Result<String> {
        let path = self.path(path.as_ref()).await;

        match self.request(Message::Readlink { path }).await? {
            Message::Name { mut entries } if !entries.is_empty() => Ok(entries.remove(0).filename),
            Message::Status { code, message, .. } => {
                Err(Error::from_status(code, message).unwrap_or(Error::BadMessage))
            }
            _ => Err(Error::BadMessage),
        }
    }

    /// `SSH_FXP_SYMLINK`.
    pub async fn symlink(&self, link_path: impl AsRef<str>, target_path: impl AsRef<str>) -> Result<()> {
        let link_path = self.path(link_path.as_ref()).await;

        self.request_status(Message::Symlink {
            link_path: link_path.clone(),
            target_path: target_path.as_ref().to_string(),
        })
        .await?;

        self.cache.lock().await.invalidate(&link_path);

        Ok(())
    }

    /// `SSH_FXP_RENAME`: on success, `stat(new)` succeeds and `stat(old)`
    /// fails with `NoSuchFile`.
    pub async fn rename(&self, old: impl AsRef<str>, new: impl AsRef<str>) -> Result<()> {
        let old_path = self.path(old.as_ref()).await;
        let new_path = self.path(new.as_ref()).await;

        self.request_status(Message::Rename {
            old_path: old_path.clone(),
            new_path: new_path.clone(),
        })
        .await?;

        self.cache.lock().await.invalidate_pair(&old_path, &new_path);

        Ok(())
    }

    /// `SSH_FXP_REMOVE` (non-recursive file deletion).
    pub async fn remove(&self, path: impl AsRef<str>) -> Result<()> {
        let path = self.path(path.as_ref()).await;

        self.request_status(Message::Remove { path: path.clone() }).await?;
        self.cache.lock().await.invalidate(&path);

        Ok(())
    }

    /// `SSH_FXP_RMDIR` (non-recursive directory removal).
    pub async fn rmdir_one(&self, path: impl AsRef<str>) -> Result<()> {
        let path = self.path(path.as_ref()).await;

        self.request_status(Message::Rmdir { path: path.clone() }).await?;
        self.cache.lock().await.invalidate(&path);

        Ok(())
    }

    /// `rmdir(path, recursive)`: a plain `SSH_FXP_RMDIR` when
    /// `recursive` is false, otherwise a client-driven walk-and-delete (the
    /// wire protocol has no recursive primitive — spec "Supplemented features").
    pub async fn rmdir(&self, path: impl AsRef<str>, recursive: bool) -> Result<()> {
        if recursive {
            self.delete(path, true).await
        } else {
            self.rmdir_one(path).await
        }
    }

    /// `delete(path, recursive)`: removes a file, or (when
    /// `recursive`) a whole directory tree.
    pub async fn delete(&self, path: impl AsRef<str>, recursive: bool) -> Result<()> {
        let path = self.path(path.as_ref()).await;
        let attrs = self.lstat(&path).await?;

        if attrs.file_type.is_dir() {
            if recursive {
                let entries = self.rawlist(&path, false).await?;
                for entry in entries {
                    if entry.filename == "." || entry.filename == ".." {
                        continue;
                    }

                    let child = format!("{}/{}", path.trim_end_matches('/'), entry.filename);
                    Box::pin(self.delete(&child, true)).await?;
                }
            }

            self.rmdir_one(&path).await
        } else {
            self.remove(&path).await
        }
    }

    /// `SSH_FXP_MKDIR` for a single path component.
    async fn mkdir_one(&self, path: &str, mode: Option<u32>) -> Result<()> {
        let attrs = mode.map(wire::Attrs::with_permissions).unwrap_or_default();

        self.request_status(Message::Mkdir { path: path.to_string(), attrs }).await?;
        self.cache.lock().await.invalidate(path);

        Ok(())
    }

    /// `mkdir(path, recursive, mode)`.
    pub async fn mkdir(&self, path: impl AsRef<str>, recursive: bool, mode: Option<u32>) -> Result<()> {
        let path = self.path(path.as_ref()).await;

        if !recursive {
            return self.mkdir_one(&path, mode).await;
        }

        let mut prefix = String::new();
        for (i, component) in path.trim_start_matches('/').split('/').enumerate() {
            if component.is_empty() {
                continue;
            }

            prefix = if i == 0 && path.starts_with('/') {
                format!("/{component}")
            } else if prefix.is_empty() {
                component.to_string()
            } else {
                format!("{prefix}/{component}")
            };

            match self.mkdir_one(&prefix, mode).await {
                Ok(()) | Err(Error::Failure(_)) => {}
                Err(err) => return Err(err),
            }
        }

        Ok(())
    }

    /// `SSH_FXP_SETSTAT` applied to `attrs`, for `chmod`/`chown`/`chgrp`/`touch`/`truncate`.
    async fn setstat(&self, path: &str, attrs: wire::Attrs) -> Result<()> {
        self.request_status(Message::SetStat { path: path.to_string(), attrs }).await?;
        self.cache.lock().await.invalidate(path);

        Ok(())
    }

    /// `chmod(path, mode, recursive)`.
    pub async fn chmod(&self, path: impl AsRef<str>, mode: u32, recursive: bool) -> Result<()> {
        let path = self.path(path.as_ref()).await;

        if recursive && self.lstat(&path).await?.file_type.is_dir() {
            let entries = self.rawlist(&path, false).await?;
            for entry in entries {
                if entry.filename == "." || entry.filename == ".." {
                    continue;
                }

                let child = format!("{}/{}", path.trim_end_matches('/'), entry.filename);
                Box::pin(self.chmod(&child, mode, true)).await?;
            }
        }

        self.setstat(&path, wire::Attrs::with_permissions(mode)).await
    }

    /// `chown(path, uid)`.
    pub async fn chown(&self, path: impl AsRef<str>, uid: u32) -> Result<()> {
        let path = self.path(path.as_ref()).await;

        self.setstat(
            &path,
            wire::Attrs {
                uid: Some(uid),
                ..Default::default()
            },
        )
        .await
    }

    /// `chgrp(path, gid)`.
    pub async fn chgrp(&self, path: impl AsRef<str>, gid: u32) -> Result<()> {
        let path = self.path(path.as_ref()).await;

        self.setstat(
            &path,
            wire::Attrs {
                gid: Some(gid),
                ..Default::default()
            },
        )
        .await
    }

    /// `truncate(path, size)`, issuing a plain `SETSTAT` since no
    /// handle needs to be open for it.
    pub async fn truncate(&self, path: impl AsRef<str>, size: u64) -> Result<()> {
        let path = self.path(path.as_ref()).await;

        self.setstat(&path, wire::Attrs::with_size(size)).await
    }

    /// `touch(path)`: creates the file if absent, then sets its
    /// access/modify times to now.
    pub async fn touch(&self, path: impl AsRef<str>) -> Result<()> {
        let path = self.path(path.as_ref()).await;

        let handle = self
            .request_handle(Message::Open {
                path: path.clone(),
                flags: OpenFlags::WRITE | OpenFlags::CREATE,
                attrs: Default::default(),
            })
            .await?;

        self.request_status(Message::Close { handle }).await?;

        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs() as u32)
            .unwrap_or_default();

        self.setstat(&path, wire::Attrs::with_times(now, now)).await
    }

    pub(crate) fn channel(&self) -> &Channel<'a, IO> {
        &self.channel
    }

    pub(crate) fn cache_mut(&self) -> &Mutex<StatCache> {
        &self.cache
    }
}
