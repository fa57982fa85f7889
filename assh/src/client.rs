//! Client-side session configuration.

use std::time::Duration;

use async_trait::async_trait;
use futures_time::time::Duration as Timeout;
use rand::RngCore;
use ssh_packet::{arch::NameList, trans::KexInit};

use crate::{
    algorithm::{Cipher, Compress, Hmac, Kex, Key},
    Result,
};

#[doc(no_inline)]
pub use ssh_packet::Id;

/// Called once per connection, right after the key-exchange derives the
/// server's host key, to decide whether it should be trusted.
///
/// This is the seam a caller hooks into to implement a known-hosts style
/// repository; [`assh`](crate) itself ships no persistence.
#[async_trait]
pub trait HostKeyVerifier: Send + Sync {
    /// Decide whether `key` (the server's host key, already verified to have
    /// signed the exchange hash) should be trusted.
    async fn accept(&self, key: &ssh_key::PublicKey) -> bool;
}

/// A [`HostKeyVerifier`] that accepts every host key unconditionally.
///
/// Intended for tests and demos only — using this in production defeats the
/// point of host-key verification (trivially allows MITM).
#[derive(Debug, Default, Clone, Copy)]
pub struct TrustEveryone;

#[async_trait]
impl HostKeyVerifier for TrustEveryone {
    async fn accept(&self, _key: &ssh_key::PublicKey) -> bool {
        true
    }
}

/// A _client_-side session configuration.
pub struct Client {
    /// [`Id`] advertised to the peer for this session.
    pub id: Id,

    /// Timeout for sending and receiving packets.
    pub timeout: Duration,

    /// The algorithms enabled for this session, in preference order.
    pub algorithms: Algorithms,

    /// Callback deciding whether to trust the server's host key.
    pub verifier: Box<dyn HostKeyVerifier>,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("id", &self.id)
            .field("timeout", &self.timeout)
            .field("algorithms", &self.algorithms)
            .finish_non_exhaustive()
    }
}

impl Default for Client {
    fn default() -> Self {
        Self {
            id: Id::v2(
                concat!(env!("CARGO_PKG_NAME"), "@client:", env!("CARGO_PKG_VERSION")),
                None::<&str>,
            ),
            timeout: Duration::from_secs(120),
            algorithms: Default::default(),
            verifier: Box::new(TrustEveryone),
        }
    }
}

/// Ordered preference lists for the four negotiated algorithm categories.
#[derive(Debug, Clone)]
pub struct Algorithms {
    /// Enabled algorithms for _key-exchange_.
    pub kexs: Vec<Kex>,

    /// Enabled algorithms for _server host key_ verification.
    pub keys: Vec<Key>,

    /// Enabled algorithms for _encryption & decryption_.
    pub ciphers: Vec<Cipher>,

    /// Enabled algorithms for _message integrity_.
    pub macs: Vec<Hmac>,

    /// Enabled algorithms for _compression_.
    pub compressions: Vec<Compress>,
}

impl Default for Algorithms {
    fn default() -> Self {
        Self {
            kexs: vec![Kex::Curve25519Sha256, Kex::Curve25519Sha256Libssh],
            // RSA is biased towards the newer, collision-resistant sha2 variants: an
            // implementation offering only `ssh-rsa` (sha-1) still interops, but we
            // never prefer it over sha2-512/256 when the peer advertises both.
            keys: vec![
                Key::Ed25519,
                Key::Ecdsa {
                    curve: ssh_key::EcdsaCurve::NistP384,
                },
                Key::Ecdsa {
                    curve: ssh_key::EcdsaCurve::NistP256,
                },
                Key::Rsa {
                    hash: Some(ssh_key::HashAlg::Sha512),
                },
                Key::Rsa {
                    hash: Some(ssh_key::HashAlg::Sha256),
                },
                Key::Rsa { hash: None },
                Key::Dsa,
            ],
            ciphers: vec![
                Cipher::Aes256Ctr,
                Cipher::Aes192Ctr,
                Cipher::Aes128Ctr,
                Cipher::Aes256Cbc,
                Cipher::Aes192Cbc,
                Cipher::Aes128Cbc,
                Cipher::TDesCbc,
            ],
            macs: vec![
                Hmac::HmacSha512ETM,
                Hmac::HmacSha256ETM,
                Hmac::HmacSha512,
                Hmac::HmacSha256,
                Hmac::HmacSha1ETM,
                Hmac::HmacSha1,
            ],
            compressions: vec![Compress::None, Compress::Zlib, Compress::ZlibOpenssh],
        }
    }
}

impl Client {
    pub(crate) fn timeout(&self) -> Timeout {
        self.timeout.into()
    }

    pub(crate) fn kexinit(&self) -> KexInit<'static> {
        let mut cookie = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut cookie);

        KexInit {
            cookie,
            kex_algorithms: NameList::from_iter(&self.algorithms.kexs),
            server_host_key_algorithms: NameList::from_iter(&self.algorithms.keys),
            encryption_algorithms_client_to_server: NameList::from_iter(&self.algorithms.ciphers),
            encryption_algorithms_server_to_client: NameList::from_iter(&self.algorithms.ciphers),
            mac_algorithms_client_to_server: NameList::from_iter(&self.algorithms.macs),
            mac_algorithms_server_to_client: NameList::from_iter(&self.algorithms.macs),
            compression_algorithms_client_to_server: NameList::from_iter(&self.algorithms.compressions),
            compression_algorithms_server_to_client: NameList::from_iter(&self.algorithms.compressions),
            languages_client_to_server: Default::default(),
            languages_server_to_client: Default::default(),
            first_kex_packet_follows: false.into(),
        }
    }

    /// Run the key-exchange against `stream`, installing the resulting
    /// transport algorithms and keys on success.
    pub(crate) async fn kex(
        &self,
        stream: &mut crate::stream::Stream<impl crate::Pipe>,
        peer_id: &Id,
    ) -> Result<()> {
        use ssh_packet::trans::NewKeys;

        tracing::debug!("Starting key-exchange procedure");

        let kexinit = self.kexinit();
        stream.send(&kexinit).await?;

        let peerkexinit = stream.recv().await?.to::<KexInit>()?;

        let kex = crate::algorithm::negociate_kex(&kexinit, &peerkexinit)?;

        let (transport, host_key) = kex
            .client(stream, &self.id, peer_id, kexinit, peerkexinit, &*self.verifier)
            .await?;

        stream.send(&NewKeys).await?;
        stream.recv().await?.to::<NewKeys>()?;

        tracing::debug!("Key exchange completed successfully");

        stream.with_transport(transport);
        stream.with_host_key(host_key);

        Ok(())
    }
}
