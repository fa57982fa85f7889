//! The unified error surfaced by the facade, projecting every per-layer
//! error taxonomy onto one enum.

use thiserror::Error;

/// The error types that can occur when driving a [`Connection`](crate::Connection).
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum Error {
    /// A transport-layer error: framing, key-exchange,
    /// MAC verification, or an outright disconnect. Fatal — the connection
    /// is unusable afterwards.
    #[error(transparent)]
    Transport(#[from] assh::Error),

    /// An authentication-layer error.
    #[error(transparent)]
    Auth(#[from] assh_auth::Error),

    /// A channel-multiplexing error.
    #[error(transparent)]
    Connect(#[from] assh_connect::Error),

    /// An SFTP-layer error.
    #[error(transparent)]
    Sftp(#[from] assh_sftp::Error),

    /// An operation was attempted before the required state was reached,
    /// e.g. `exec` before `login`.
    #[error("operation attempted before required state was reached: {0}")]
    InsufficientSetup(&'static str),

    /// A caller-supplied argument was invalid for the operation attempted.
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    /// [`crate::PendingSession::login`] was called with a [`crate::Credentials`]
    /// carrying no method at all, so there is nothing to attempt beyond the
    /// bare `none` probe.
    #[error("no credentials were supplied to attempt authentication")]
    NoPasswordProvided,
}

/// A handy [`std::result::Result`] alias bounding the [`enum@Error`] as `E`.
pub type Result<T, E = Error> = std::result::Result<T, E>;
