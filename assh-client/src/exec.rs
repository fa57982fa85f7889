//! Exec/shell facilities on a `session` channel: `exec`, `enable_pty`,
//! `set_env`, `get_exit_status`.

use std::num::NonZeroU32;

use assh::Pipe;
use assh_connect::channel::{ChannelRequestContext, request::Response};
use futures::{AsyncReadExt, AsyncWriteExt, FutureExt, TryStreamExt};

use crate::{Error, Result};

/// The well-known `SSH_EXTENDED_DATA_STDERR` stream identifier for
/// `CHANNEL_EXTENDED_DATA(subtype)`.
const STDERR: u32 = 1;

/// Pseudo-terminal parameters for [`crate::Connection::enable_pty`].
#[derive(Debug, Clone)]
pub struct Pty {
    /// `$TERM` value advertised to the peer.
    pub term: String,
    /// Terminal width, in columns.
    pub cols: u32,
    /// Terminal height, in rows.
    pub rows: u32,
    /// Terminal width, in pixels, when known.
    pub width_pixels: u32,
    /// Terminal height, in pixels, when known.
    pub height_pixels: u32,
}

impl Pty {
    /// A pty request for a `rows`x`cols` terminal advertising `term`.
    pub fn new(term: impl Into<String>, rows: u32, cols: u32) -> Self {
        Self {
            term: term.into(),
            cols,
            rows,
            width_pixels: 0,
            height_pixels: 0,
        }
    }
}

/// The outcome of a completed (or severed) [`crate::Connection::exec`].
#[derive(Debug, Clone, Default)]
pub struct ExecOutcome {
    /// The command's exit status, or `None` if the channel closed before one
    /// was received.
    pub exit_status: Option<u32>,

    /// The signal that terminated the command, when the peer sent
    /// `exit-signal` instead of `exit-status`.
    pub exit_signal: Option<String>,
}

/// A live interactive `shell` session opened by [`crate::Connection::shell`].
pub struct Shell<'a, IO: Pipe> {
    pub(crate) channel: assh_connect::channel::Channel<'a, IO>,
}

impl<'a, IO: Pipe> Shell<'a, IO> {
    /// Write `bytes` to the remote shell's stdin.
    pub async fn write(&self, bytes: &[u8]) -> Result<()> {
        let mut writer = self.channel.as_writer();

        writer.write_all(bytes).await.map_err(assh::Error::from)?;
        writer.flush().await.map_err(assh::Error::from)?;

        Ok(())
    }

    /// Read up to `buf.len()` bytes from the remote shell's stdout.
    pub async fn read(&self, buf: &mut [u8]) -> Result<usize> {
        let mut reader = self.channel.as_reader();

        Ok(reader.read(buf).await.map_err(assh::Error::from)?)
    }

    /// Read up to `buf.len()` bytes from the remote shell's stderr
    /// (`CHANNEL_EXTENDED_DATA` substream 1).
    pub async fn read_stderr(&self, buf: &mut [u8]) -> Result<usize> {
        let mut reader = self
            .channel
            .as_reader_ext(NonZeroU32::new(STDERR).expect("STDERR is non-zero"));

        Ok(reader.read(buf).await.map_err(assh::Error::from)?)
    }

    /// Notify the peer of a terminal resize via `window-change`.
    pub async fn resize(&self, rows: u32, cols: u32) -> Result<()> {
        self.channel
            .request(ChannelRequestContext::WindowChange {
                width_chars: cols,
                height_chars: rows,
                width_pixels: 0,
                height_pixels: 0,
            })
            .await?;

        Ok(())
    }

    /// Signal to the peer we won't send any more input.
    pub async fn eof(&self) -> Result<()> {
        self.channel.eof().await?;

        Ok(())
    }
}

/// Drive `command` to completion on a fresh `session` channel, streaming its
/// stdout/stderr to `stdout`/`stderr` as it arrives and returning once the
/// peer reports an exit status (or signal) followed by EOF/close.
///
/// If the channel is severed before an exit status arrives, this returns
/// `Ok` with [`ExecOutcome::exit_status`] set to `None` and whatever output
/// was accumulated before the close, rather than an error — the caller's
/// next `exec` call transparently opens a new channel.
pub(crate) async fn exec<IO, W1, W2>(
    channel: &assh_connect::channel::Channel<'_, IO>,
    command: &str,
    env: &[(String, String)],
    pty: Option<&Pty>,
    stdout: &mut W1,
    stderr: &mut W2,
) -> Result<ExecOutcome>
where
    IO: Pipe,
    W1: futures::AsyncWrite + Unpin,
    W2: futures::AsyncWrite + Unpin,
{
    if let Some(pty) = pty {
        let response = channel
            .request_wait(ChannelRequestContext::Pty {
                term: pty.term.as_bytes().into(),
                width_chars: pty.cols,
                height_chars: pty.rows,
                width_pixels: pty.width_pixels,
                height_pixels: pty.height_pixels,
                modes: Default::default(),
            })
            .await?;

        if response == Response::Failure {
            return Err(Error::InsufficientSetup("peer refused the `pty-req` channel request"));
        }
    }

    for (name, value) in env {
        // `want_reply=false`: per RFC 4254 §6.4 the server commonly ignores
        // `env` silently when the variable isn't on its accept-list, so we
        // don't treat that as fatal.
        channel
            .request(ChannelRequestContext::Env {
                name: name.as_bytes().into(),
                value: value.as_bytes().into(),
            })
            .await?;
    }

    let response = channel
        .request_wait(ChannelRequestContext::Exec {
            command: command.as_bytes().into(),
        })
        .await?;

    if response == Response::Failure {
        return Err(Error::InsufficientSetup("peer refused the `exec` channel request"));
    }

    let mut outcome = ExecOutcome::default();

    let mut stdout_reader = channel.as_reader();
    let mut stderr_reader = channel.as_reader_ext(NonZeroU32::new(STDERR).expect("STDERR is non-zero"));
    let mut stdout_buf = [0u8; 8192];
    let mut stderr_buf = [0u8; 8192];

    // Once a stream hits EOF, stop polling it: `AsyncRead` keeps returning
    // `Ok(0)` immediately afterwards, which would otherwise busy-loop the
    // `select!` below.
    let mut stdout_done = false;
    let mut stderr_done = false;

    let mut requests = std::pin::pin!(channel.requests());

    loop {
        if stdout_done && stderr_done {
            // Only the request stream (exit-status/signal, then close) is
            // still live; wait on it alone instead of spinning `select!`
            // with two always-pending branches.
            match requests.try_next().await? {
                Some(request) => {
                    record_exit(&mut outcome, request.cx());
                    request.accept().await?;
                }
                None => break,
            }

            continue;
        }

        futures::select! {
            read = stdout_reader.read(&mut stdout_buf).fuse() => {
                match read {
                    Ok(0) => stdout_done = true,
                    Ok(n) => { stdout.write_all(&stdout_buf[..n]).await.map_err(assh::Error::from)?; }
                    Err(err) => return Err(assh::Error::from(err).into()),
                }
            },
            read = stderr_reader.read(&mut stderr_buf).fuse() => {
                match read {
                    Ok(0) => stderr_done = true,
                    Ok(n) => { stderr.write_all(&stderr_buf[..n]).await.map_err(assh::Error::from)?; }
                    Err(err) => return Err(assh::Error::from(err).into()),
                }
            },
            request = requests.try_next().fuse() => {
                match request? {
                    Some(request) => {
                        record_exit(&mut outcome, request.cx());
                        request.accept().await?;
                    }
                    None => break,
                }
            },
        }
    }

    stdout.flush().await.map_err(assh::Error::from)?;
    stderr.flush().await.map_err(assh::Error::from)?;

    Ok(outcome)
}

fn record_exit(outcome: &mut ExecOutcome, cx: &ChannelRequestContext) {
    match cx {
        ChannelRequestContext::ExitStatus { code } => {
            outcome.exit_status = Some(*code);
        }
        ChannelRequestContext::ExitSignal { name, .. } => {
            outcome.exit_signal = Some(String::from_utf8_lossy(name).into_owned());
        }
        _ => {}
    }
}
