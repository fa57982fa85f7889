//! The facade's main handle: a multiplexed, authenticated connection (spec
//! §6 "Connection"/"Exec/shell"/"SFTP" callable surface).

use std::{sync::atomic::AtomicBool, time::Duration};

use assh::Pipe;
use assh_connect::connect::ChannelOpenContext;
use futures_time::future::FutureExt as _;

use crate::{
    exec::{self, ExecOutcome, Pty, Shell},
    Error, Result,
};

/// A thin wrapper so [`assh_auth::client::Auth`] can be layered over the
/// `ssh-connection` service while surfacing this crate's unified [`Error`]
/// (`assh_connect::Service::Err` is `assh::Error`, which knows nothing of
/// the auth/connect/sftp variants this facade adds).
pub(crate) struct ConnectService;

impl assh::service::Request for ConnectService {
    type Err = Error;
    type Ok<IO: Pipe> = assh_connect::Connect<IO>;

    const SERVICE_NAME: &'static str =
        <assh_connect::Service as assh::service::Request>::SERVICE_NAME;

    async fn on_accept<IO: Pipe>(&mut self, session: assh::Session<IO>) -> Result<Self::Ok<IO>> {
        Ok(assh_connect::Service.on_accept(session).await?)
    }
}

/// An authenticated, multiplexed connection, the return value of
/// [`crate::PendingSession::login`].
///
/// Every operation opens (and drops) its own `session` channel: nothing here
/// is reentrant across threads, but independent operations on the same
/// `Connection` may be interleaved cooperatively.
pub struct Connection<IO: Pipe> {
    connect: assh_connect::Connect<IO>,

    /// Per-operation timeout applied to channel opens and requests,
    /// independent of the transport-level identification timeout.
    timeout: Option<Duration>,

    /// Suppresses this facade's informational `tracing` output when set;
    /// warnings and errors still log.
    quiet: AtomicBool,
}

impl<IO: Pipe> Connection<IO> {
    pub(crate) fn new(connect: assh_connect::Connect<IO>) -> Self {
        Self {
            connect,
            timeout: None,
            quiet: AtomicBool::new(false),
        }
    }

    /// Bound every channel open and channel request issued by this
    /// `Connection` to `timeout`, surfacing [`assh::Error::Timeout`] should
    /// it elapse.
    pub fn with_channel_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);

        self
    }

    /// Suppress this facade's informational log lines.
    pub fn enable_quiet_mode(&self, enabled: bool) {
        self.quiet.store(enabled, std::sync::atomic::Ordering::SeqCst);
    }

    fn is_quiet(&self) -> bool {
        self.quiet.load(std::sync::atomic::Ordering::SeqCst)
    }

    /// The identification string advertised by the peer.
    pub fn peer_id(&self) -> &assh::Id {
        self.connect.peer_id()
    }

    /// The server's host key, verified during the key-exchange that
    /// preceded authentication.
    pub fn server_public_host_key(&self) -> Option<&ssh_key::PublicKey> {
        self.connect.server_public_host_key()
    }

    /// The algorithms negotiated during the key-exchange that preceded
    /// authentication.
    pub fn negotiated_algorithms(&self) -> Option<&assh::algorithm::NegotiatedAlgorithms> {
        self.connect.negotiated_algorithms()
    }

    /// The session identifier derived from the first key-exchange.
    pub fn session_id(&self) -> Option<&[u8]> {
        self.connect.session_id()
    }

    async fn open_session_channel(&self) -> Result<assh_connect::channel::Channel<'_, IO>> {
        let open = self.connect.channel_open(ChannelOpenContext::Session);

        let response = match self.timeout {
            Some(timeout) => open.timeout(timeout.into()).await.map_err(assh::Error::from)??,
            None => open.await?,
        };

        match response {
            assh_connect::channel_open::Response::Success(channel) => Ok(channel),
            assh_connect::channel_open::Response::Rejected { reason, message } => {
                Err(assh_connect::Error::ChannelOpenFailure { reason, message }.into())
            }
        }
    }

    /// Drive `command` to completion on a fresh channel, streaming its
    /// stdout/stderr to `stdout`/`stderr`; `pty`/`env` fold in
    /// `enable_pty`/`set_env`.
    pub async fn exec<W1, W2>(
        &self,
        command: &str,
        env: &[(String, String)],
        pty: Option<&Pty>,
        stdout: &mut W1,
        stderr: &mut W2,
    ) -> Result<ExecOutcome>
    where
        W1: futures::AsyncWrite + Unpin,
        W2: futures::AsyncWrite + Unpin,
    {
        let channel = self.open_session_channel().await?;

        if !self.is_quiet() {
            tracing::debug!("Executing `{command}` on a fresh session channel");
        }

        exec::exec(&channel, command, env, pty, stdout, stderr).await
    }

    /// Open an interactive `shell` on a fresh channel.
    pub async fn shell(&self, pty: Option<&Pty>) -> Result<Shell<'_, IO>> {
        let channel = self.open_session_channel().await?;

        if let Some(pty) = pty {
            let response = channel
                .request_wait(assh_connect::channel::ChannelRequestContext::Pty {
                    term: pty.term.as_bytes().into(),
                    width_chars: pty.cols,
                    height_chars: pty.rows,
                    width_pixels: pty.width_pixels,
                    height_pixels: pty.height_pixels,
                    modes: Default::default(),
                })
                .await?;

            if response == assh_connect::channel::request::Response::Failure {
                return Err(Error::InsufficientSetup(
                    "peer refused the `pty-req` channel request",
                ));
            }
        }

        let response = channel
            .request_wait(assh_connect::channel::ChannelRequestContext::Shell)
            .await?;

        if response == assh_connect::channel::request::Response::Failure {
            return Err(Error::InsufficientSetup(
                "peer refused the `shell` channel request",
            ));
        }

        Ok(Shell { channel })
    }

    /// Open the `sftp` subsystem on a fresh channel.
    pub async fn open_sftp(&self) -> Result<assh_sftp::Sftp<'_, IO>> {
        Ok(assh_sftp::Sftp::new(&self.connect).await?)
    }

    /// Ping the peer with a `keepalive@openssh.com` global request, treating
    /// the absence of any reply as fatal.
    pub async fn keepalive(&self) -> Result<()> {
        match self.timeout {
            Some(timeout) => self
                .connect
                .keepalive()
                .timeout(timeout.into())
                .await
                .map_err(assh::Error::from)??,
            None => self.connect.keepalive().await?,
        }

        Ok(())
    }
}
