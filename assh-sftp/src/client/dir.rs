//! Directory listing: the `SSH_FXP_OPENDIR`/`SSH_FXP_READDIR` loop, and the
//! `nlist`/`rawlist` conveniences built on top of it.

use assh::Pipe;

use super::Sftp;
use crate::{
    error::{Error, Result},
    wire::{Message, NameEntry},
};

impl<'a, IO: Pipe> Sftp<'a, IO> {
    /// List `path`'s entries, draining `SSH_FXP_READDIR` until the server
    /// answers with an `SSH_FX_EOF` status, then closing the handle.
    async fn list(&self, path: &str) -> Result<Vec<NameEntry>> {
        let handle = self.request_handle(Message::OpenDir { path: path.to_string() }).await?;

        let mut entries = Vec::new();
        loop {
            match self.request(Message::ReadDir { handle: handle.clone() }).await {
                Ok(Message::Name { entries: batch }) => entries.extend(batch),
                Ok(Message::Status { code, message, .. }) => {
                    let close_result = self.request_status(Message::Close { handle: handle.clone() }).await;

                    return match Error::from_status(code, message) {
                        Some(Error::Eof) => {
                            close_result?;
                            Ok(entries)
                        }
                        Some(err) => Err(err),
                        None => Err(Error::BadMessage),
                    };
                }
                Ok(_) => {
                    let _ = self.request_status(Message::Close { handle: handle.clone() }).await;
                    return Err(Error::BadMessage);
                }
                Err(err) => {
                    let _ = self.request_status(Message::Close { handle: handle.clone() }).await;
                    return Err(err);
                }
            }
        }
    }

    /// `rawlist(path, sorted)`: every entry of `path` along with
    /// its attributes, populating the stat cache for the listed directory.
    pub async fn rawlist(&self, path: impl AsRef<str>, sorted: bool) -> Result<Vec<NameEntry>> {
        let path = self.path(path.as_ref()).await;

        let mut entries = self.list(&path).await?;

        if sorted {
            entries.sort_by(|a, b| a.filename.cmp(&b.filename));
        }

        self.cache.lock().await.populate(
            &path,
            entries
                .iter()
                .filter(|entry| entry.filename != "." && entry.filename != "..")
                .map(|entry| (entry.filename.clone(), entry.attrs.clone())),
        );

        Ok(entries)
    }

    /// `nlist(path, sorted)`: bare file names of `path`'s entries,
    /// excluding `.`/`..`.
    pub async fn nlist(&self, path: impl AsRef<str>, sorted: bool) -> Result<Vec<String>> {
        let entries = self.rawlist(path, sorted).await?;

        Ok(entries
            .into_iter()
            .map(|entry| entry.filename)
            .filter(|name| name != "." && name != "..")
            .collect())
    }
}
