//! Top-level configuration and the connect/login entry points.

use std::net::ToSocketAddrs as StdToSocketAddrs;

use assh::Pipe;
use async_std::net::TcpStream;
use futures::io::{BufReader, BufWriter};
use ssh_key::PrivateKey;

use crate::{
    connection::{Connection, ConnectService},
    Error, Result,
};

/// A TCP-backed [`Pipe`], buffered before handing it to [`assh::Session::new`].
type TcpPipe = BufReader<BufWriter<TcpStream>>;

/// The top-level, builder-style client configuration: aggregates the
/// transport layer's [`assh::Client`] and is the entry point for
/// [`Client::connect`].
#[derive(Debug, Default)]
pub struct Client {
    /// The transport-layer configuration: identification string, timeout,
    /// algorithm preferences and host-key verifier.
    pub transport: assh::Client,
}

impl Client {
    /// Replace the transport-layer configuration.
    pub fn with_transport(mut self, transport: assh::Client) -> Self {
        self.transport = transport;

        self
    }

    /// Connect over TCP to `addr` and run the identification exchange. The
    /// key-exchange is deferred to the first packet sent or received, which
    /// happens inside [`PendingSession::login`].
    pub async fn connect(self, addr: impl StdToSocketAddrs) -> Result<PendingSession<TcpPipe>> {
        let addr = addr
            .to_socket_addrs()
            .map_err(assh::Error::from)?
            .next()
            .ok_or(Error::InvalidArgument("no socket address resolved for the given host/port"))?;

        let stream = TcpStream::connect(addr).await.map_err(assh::Error::from)?;
        let io = BufReader::new(BufWriter::new(stream));

        self.connect_with(io).await
    }

    /// Run the identification exchange over an already-established [`Pipe`],
    /// e.g. a caller-supplied proxy socket.
    pub async fn connect_with<IO: Pipe>(self, io: IO) -> Result<PendingSession<IO>> {
        let session = assh::Session::new(io, self.transport).await?;

        Ok(PendingSession { session })
    }
}

/// A session that has completed the identification exchange but not yet
/// authenticated.
pub struct PendingSession<IO: Pipe> {
    session: assh::Session<IO>,
}

impl<IO: Pipe> PendingSession<IO> {
    /// The identification string advertised by the peer.
    pub fn peer_id(&self) -> &assh::Id {
        self.session.peer_id()
    }

    /// Request the `ssh-userauth` service and drive it to completion with
    /// `credentials`. On success, unlocks the connection layer and returns
    /// the multiplexed [`Connection`].
    pub async fn login(self, username: impl Into<String>, credentials: Credentials) -> Result<Connection<IO>> {
        if !credentials.has_any_method() {
            return Err(Error::NoPasswordProvided);
        }

        let auth = credentials.into_auth(username);

        let connect = self.session.request(auth).await?;

        Ok(Connection::new(connect))
    }
}

/// A builder for the credentials attempted during [`PendingSession::login`]:
/// `none`/`password`/`keyboard-interactive`/`publickey`, with multi-factor
/// sequencing handled transparently underneath.
#[derive(Default)]
pub struct Credentials {
    password: Option<String>,
    keys: Vec<PrivateKey>,
    keyboard_interactive: bool,
    prompter: Option<Box<dyn assh_auth::client::Prompter>>,
}

impl Credentials {
    /// Attempt the `password` method with `password`.
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());

        self
    }

    /// Attempt the `publickey` method with `key`, in addition to any other
    /// key already supplied.
    pub fn publickey(mut self, key: impl Into<PrivateKey>) -> Self {
        self.keys.push(key.into());

        self
    }

    /// Attempt the `keyboard-interactive` method.
    pub fn keyboard_interactive(mut self) -> Self {
        self.keyboard_interactive = true;

        self
    }

    /// Install the [`Prompter`](assh_auth::client::Prompter) used to answer
    /// password-change requests and keyboard-interactive challenges.
    pub fn prompter(mut self, prompter: impl assh_auth::client::Prompter + 'static) -> Self {
        self.prompter = Some(Box::new(prompter));

        self
    }

    /// Whether at least one authentication method was attached, i.e.
    /// whether [`PendingSession::login`] has anything to attempt besides
    /// the bare `none` probe.
    fn has_any_method(&self) -> bool {
        self.password.is_some() || !self.keys.is_empty() || self.keyboard_interactive
    }

    pub(crate) fn into_auth(
        self,
        username: impl Into<String>,
    ) -> assh_auth::client::Auth<ConnectService> {
        let mut auth = assh_auth::client::Auth::new(username, ConnectService);

        if let Some(password) = self.password {
            auth = auth.password(password);
        }

        for key in self.keys {
            auth = auth.publickey(key);
        }

        if self.keyboard_interactive {
            auth = auth.keyboard_interactive();
        }

        if let Some(prompter) = self.prompter {
            auth = auth.prompter(prompter);
        }

        auth
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credentials_with_no_method_has_no_method() {
        assert!(!Credentials::default().has_any_method());
    }

    #[test]
    fn password_counts_as_a_method() {
        assert!(Credentials::default().password("hunter2").has_any_method());
    }

    #[test]
    fn keyboard_interactive_counts_as_a_method() {
        assert!(Credentials::default().keyboard_interactive().has_any_method());
    }
}
