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
//! This is the crate an application actually depends on: it binds the four
//! reusable protocol layers — [`assh`] (transport), [`assh_auth`]
//! (`ssh-userauth`), [`assh_connect`] (`ssh-connection` multiplexing) and
//! [`assh_sftp`] (the `sftp` subsystem) — into the single [`Connection`]
//! type exposing the callable surface a caller actually wants: `connect`,
//! `login`, `exec`, `open_sftp`, ...
//!
//! ```no_run
//! # async fn go() -> Result<(), Box<dyn std::error::Error>> {
//! use assh_client::{Client, Credentials};
//!
//! let mut connection = Client::default()
//!     .connect(("localhost", 22))
//!     .await?
//!     .login("alice", Credentials::default().password("hunter2"))
//!     .await?;
//!
//! let outcome = connection
//!     .exec("echo hi", &[], None, &mut Vec::new(), &mut Vec::new())
//!     .await?;
//! assert_eq!(outcome.exit_status, Some(0));
//! # Ok(()) }
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(
    missing_docs,
    clippy::unwrap_used,
    clippy::panic,
    clippy::unimplemented,
    clippy::todo
)]
#![forbid(unsafe_code)]

mod error;
pub use error::{Error, Result};

mod config;
pub use config::{Client, Credentials, PendingSession};

mod connection;
pub use connection::Connection;

mod exec;
pub use exec::{ExecOutcome, Pty, Shell};

mod hostkey;
pub use hostkey::{Fingerprint, HashAlg};

#[doc(no_inline)]
pub use assh::{HostKeyVerifier, TrustEveryone};
#[doc(no_inline)]
pub use assh_auth::client::{Prompt, Prompter};
#[doc(no_inline)]
pub use assh_auth::Methods;
#[doc(no_inline)]
pub use assh_sftp::{Progress, Sftp};
