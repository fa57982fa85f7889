//! The error kinds surfaced by the SFTP client.

use thiserror::Error;

/// The error types that can occur when driving the SFTP subsystem.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum Error {
    /// The underlying channel or transport failed.
    #[error(transparent)]
    Connect(#[from] assh_connect::Error),

    /// The server's reply didn't parse as a well-formed SFTP message.
    #[error("Received a malformed SFTP message")]
    BadMessage,

    /// The reply carried a request-id this client never issued, or which
    /// already completed. Logged and dropped rather than surfaced to a
    /// caller.
    #[error("Received a reply for an unknown or already-completed request id `{0}`")]
    UnknownRequestId(u32),

    /// `SSH_FX_EOF`
    #[error("End of file")]
    Eof,

    /// `SSH_FX_NO_SUCH_FILE`
    #[error("No such file: {0}")]
    NoSuchFile(String),

    /// `SSH_FX_PERMISSION_DENIED`
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// `SSH_FX_OP_UNSUPPORTED`
    #[error("Operation unsupported by the server: {0}")]
    OpUnsupported(String),

    /// `SSH_FX_NO_CONNECTION` / `SSH_FX_CONNECTION_LOST`, the SFTP session
    /// is unusable and must be reopened.
    #[error("Lost connection to the SFTP subsystem: {0}")]
    ConnectionLost(String),

    /// `SSH_FX_FAILURE` and every other server-defined status code, carrying
    /// the server's human-readable message verbatim.
    #[error("SFTP operation failed: {0}")]
    Failure(String),

    /// A path operation was attempted before `open_sftp`'s `SSH_FXP_INIT`
    /// handshake completed.
    #[error("SFTP session used before initialization completed")]
    NotInitialized,

    /// The server didn't support any SFTP version this client speaks.
    #[error("No mutually supported SFTP protocol version")]
    UnsupportedVersion,
}

impl Error {
    /// Map a raw `SSH_FX_*` status code and its accompanying message into
    /// the corresponding [`Error`] variant, or `None` for `SSH_FX_OK`.
    pub(crate) fn from_status(code: u32, message: String) -> Option<Self> {
        match code {
            0 => None,
            1 => Some(Self::Eof),
            2 => Some(Self::NoSuchFile(message)),
            3 => Some(Self::PermissionDenied(message)),
            5 => Some(Self::BadMessage),
            // `SSH_FX_NO_CONNECTION` and `SSH_FX_CONNECTION_LOST`: the
            // session is unusable either way, so both discard alike.
            6 | 7 => Some(Self::ConnectionLost(message)),
            8 => Some(Self::OpUnsupported(message)),
            _ => Some(Self::Failure(message)),
        }
    }
}

/// A handy [`std::result::Result`] type alias bounding the [`enum@Error`] struct as `E`.
pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ok_status_is_not_an_error() {
        assert!(Error::from_status(0, String::new()).is_none());
    }

    #[test]
    fn no_connection_and_connection_lost_both_surface_as_connection_lost() {
        assert!(matches!(
            Error::from_status(6, "no connection".into()),
            Some(Error::ConnectionLost(_))
        ));
        assert!(matches!(
            Error::from_status(7, "connection lost".into()),
            Some(Error::ConnectionLost(_))
        ));
    }

    #[test]
    fn op_unsupported_is_code_eight() {
        assert!(matches!(
            Error::from_status(8, String::new()),
            Some(Error::OpUnsupported(_))
        ));
    }
}
