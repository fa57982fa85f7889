#![doc = concat!(
    "[![crates.io](https://img.shields.io/crates/v/", env!("CARGO_PKG_NAME"), ")](https://crates.io/crates/", env!("CARGO_PKG_NAME"), ")",
    " ",
    "[![docs.rs](https://img.shields.io/docsrs/", env!("CARGO_PKG_NAME"), ")](https://docs.rs/", env!("CARGO_PKG_NAME"), ")",
)]
#![doc = ""]
#![doc = env!("CARGO_PKG_DESCRIPTION")]
//!
//! This crate implements only the **transport** layer of SSH-2
//! (identification exchange, the binary packet protocol, key-exchange and
//! rekeying — [RFC 4253]), client side only. Authentication (`ssh-userauth`)
//! and the connection protocol (`ssh-connection`) live in the sibling
//! `assh-auth` and `assh-connect` crates, layered on top via
//! [`Session::request`]-style service exchange.
//!
//! ### Supported algorithms
//!
//! - Key-exchange: see [`algorithm::Kex`].
//! - Encryption: see [`algorithm::Cipher`].
//! - MAC: see [`algorithm::Hmac`].
//! - Compression: see [`algorithm::Compress`].
//!
//! [RFC 4253]: https://datatracker.ietf.org/doc/html/rfc4253

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

pub mod algorithm;
mod stream;

mod client;
pub use client::{Algorithms, Client, HostKeyVerifier, TrustEveryone};

mod session;
pub use session::{Pipe, Session};

pub mod service;

#[doc(no_inline)]
pub use ssh_packet::Id;
