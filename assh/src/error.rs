//! Collection of error handling types and aliases.

use ssh_packet::trans::DisconnectReason;
use thiserror::Error;

/// The disconnection side for [`DisconnectedError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectedBy {
    /// The session has been disconnected by _us_.
    Us,

    /// The session has been disconnected by _them_.
    Them,
}

/// The error describing why the session was disconnected.
#[must_use]
#[derive(Debug, Error, Clone)]
#[error("session disconnected by {by:?} for {reason:?}: {description}")]
pub struct DisconnectedError {
    /// Side that sent the disconnect message.
    pub by: DisconnectedBy,

    /// Reason for the disconnect, see [`DisconnectReason`].
    pub reason: DisconnectReason,

    /// Human-readable description of the disconnect reason.
    pub description: String,
}

/// The error types that can occur when manipulating this crate, matching the
/// _protocol_ failure taxonomy.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum Error {
    /// Identification-string parsing error.
    #[error(transparent)]
    Id(#[from] ssh_packet::Error),

    /// I/O error reading from or writing to the underlying socket.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Binary (de)serialization error on the wire format.
    #[error(transparent)]
    Binary(#[from] ssh_packet::binrw::Error),

    /// SSH key parsing or usage error.
    #[error(transparent)]
    Key(#[from] ssh_key::Error),

    /// Signature verification or generation error during key-exchange.
    #[error(transparent)]
    Signature(#[from] signature::Error),

    /// The server's identification string was not a supported protocol version.
    #[error("unsupported protocol version advertised by the peer")]
    ProtocolVersion,

    /// No common key-exchange algorithm between both sides.
    #[error("unable to negotiate a common key-exchange algorithm")]
    NoCommonKex,

    /// No common host-key algorithm between both sides.
    #[error("unable to negotiate a common host-key algorithm")]
    NoCommonKey,

    /// No common cipher algorithm between both sides.
    #[error("unable to negotiate a common encryption algorithm")]
    NoCommonCipher,

    /// No common MAC algorithm between both sides.
    #[error("unable to negotiate a common HMAC algorithm")]
    NoCommonHmac,

    /// No common compression algorithm between both sides.
    #[error("unable to negotiate a common compression algorithm")]
    NoCommonCompression,

    /// An advertised algorithm name isn't recognized by this implementation.
    #[error("unsupported algorithm advertised by the peer")]
    UnsupportedAlgorithm,

    /// Protocol error while running the key-exchange.
    #[error("error in the key-exchange procedure")]
    KexError,

    /// The host key's signature over the exchange hash did not verify.
    #[error("host key signature verification failed")]
    HostKeyRejected,

    /// Error while encrypting or decrypting a packet.
    #[error("the cipher ended up in an error")]
    Cipher,

    /// MAC (or AEAD tag) verification failed.
    #[error(transparent)]
    MacError(#[from] digest::MacError),

    /// A received packet declared a length exceeding the configured maximum.
    #[error("packet length {0} exceeds the configured maximum")]
    InvalidPacketLength(usize),

    /// The peer sent a message that made no sense in the current context.
    #[error("peer sent a message that made no sense in the current context")]
    UnexpectedMessage,

    /// A requested or accepted service name did not match.
    #[error("the peer refused or does not know the requested service")]
    UnknownService,

    /// An operation timed out waiting for a packet.
    #[error("operation timed out")]
    Timeout(#[from] futures_time::future::TimeoutError),

    /// The session has been disconnected, either by us or by the peer.
    #[error(transparent)]
    Disconnected(#[from] DisconnectedError),
}

/// A handy [`std::result::Result`] alias bounding the [`enum@Error`] as `E`.
pub type Result<T, E = Error> = std::result::Result<T, E>;
