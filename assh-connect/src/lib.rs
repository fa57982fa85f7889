#![doc = concat!(
    "[![crates.io](https://img.shields.io/crates/v/", env!("CARGO_PKG_NAME"), ")](https://crates.io/crates/", env!("CARGO_PKG_NAME"), ")",
    " ",
    "[![docs.rs](https://img.shields.io/docsrs/", env!("CARGO_PKG_NAME"), ")](https://docs.rs/", env!("CARGO_PKG_NAME"), ")",
    " ",
    "![license](https://img.shields.io/crates/l/", env!("CARGO_PKG_NAME"), ")"
)]
#![doc = ""]
#![doc = env!("CARGO_PKG_DESCRIPTION")]
//!

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(
    missing_docs,
    clippy::unwrap_used,
    clippy::panic,
    clippy::unimplemented,
    clippy::todo,
    clippy::undocumented_unsafe_blocks
)]
#![forbid(unsafe_code)]

const SERVICE_NAME: &str = "ssh-connection";

mod connect;
pub use connect::Connect;
pub use connect::{channel_open, global_request};

pub mod channel;

mod error;
pub use error::{Error, Result};

/// The [`ssh-connection`](https://datatracker.ietf.org/doc/html/rfc4254) service.
///
/// Request it from a [`assh::Session`] (optionally layered behind
/// `assh-auth`'s `Auth`) to multiplex channels over the transport.
pub struct Service;

impl assh::service::Request for Service {
    type Err = assh::Error;
    type Ok<IO: assh::Pipe> = Connect<IO>;

    const SERVICE_NAME: &'static str = SERVICE_NAME;

    async fn on_accept<IO: assh::Pipe>(
        &mut self,
        session: assh::Session<IO>,
    ) -> Result<Self::Ok<IO>, Self::Err> {
        Ok(Connect::new(session))
    }
}
