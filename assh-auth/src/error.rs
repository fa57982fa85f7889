//! Collection of error handling types and aliases.

use thiserror::Error;

use crate::Methods;

/// The error types that can occur when authenticating a session, matching
/// the _auth_ failure taxonomy.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum Error {
    /// Transport-level error (also covers a fatal disconnect sent in
    /// response to an authentication protocol violation).
    #[error(transparent)]
    Transport(#[from] assh::Error),

    /// The server requested a new password (`SSH_MSG_USERAUTH_PASSWD_CHANGEREQ`)
    /// but the caller's [`Prompter`](crate::client::Prompter) didn't supply one.
    #[error("the server requires a new password and none was provided")]
    PasswordChangeRequired,

    /// All attempted authentication methods were rejected by the server.
    ///
    /// Carries the last `remaining` set the server advertised, so a caller
    /// can report which methods it still hasn't offered credentials for.
    #[error("authentication methods exhausted for the current session")]
    AuthExhausted {
        /// Methods the server reported as still able to continue.
        remaining: Methods,
    },

    /// The keyboard-interactive exchange went on for more rounds than allowed.
    #[error("too many keyboard-interactive request rounds")]
    AuthLimitExceeded,
}

/// A handy [`std::result::Result`] alias bounding the [`enum@Error`] as `E`.
pub type Result<T, E = Error> = std::result::Result<T, E>;
