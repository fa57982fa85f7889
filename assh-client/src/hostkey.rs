//! Host-key fingerprinting.
//!
//! The actual trust decision is [`assh::HostKeyVerifier`], invoked once per
//! connection during the key-exchange; this module only re-exports the
//! fingerprint types `ssh-key` already provides so callers aren't forced to
//! depend on it directly.

#[doc(no_inline)]
pub use ssh_key::{Fingerprint, HashAlg};
