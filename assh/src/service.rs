//! The seam through which upper layers (`ssh-userauth`, `ssh-connection`, ...)
//! bolt themselves onto a negotiated [`Session`](crate::Session).
//!
//! Each SSH service name (e.g. `ssh-userauth`) is requested in turn over the
//! same transport; a successful request hands the (now-consumed) [`Session`]
//! to the service, which returns whatever type represents "the session,
//! evolved to understand this service" — `assh-auth` hands back the plain
//! [`Session`] once authenticated, `assh-connect` hands back its `Connect`
//! multiplexer.
//!
//! There is no server-side counterpart: this crate is a client only.

use crate::{session::Pipe, Result, Session};

/// A service requested by us, from the peer.
pub trait Request {
    /// The error type yielded by this service.
    type Err: std::error::Error + From<crate::Error>;

    /// The type yielded after successfully negotiating the service.
    type Ok<IO: Pipe>;

    /// The `SSH_MSG_SERVICE_REQUEST` name for this service, e.g. `ssh-userauth`.
    const SERVICE_NAME: &'static str;

    /// Called once the peer has accepted the service request, with the
    /// [`Session`] moved into the service for the remainder of its lifetime.
    async fn on_accept<IO: Pipe>(&mut self, session: Session<IO>) -> Result<Self::Ok<IO>, Self::Err>;
}
