//! Primitives to manipulate binary data to extract and encode
//! messages from/to a [`Pipe`] stream.

use std::time::Instant;

use futures::{AsyncBufReadExt, AsyncWriteExt, FutureExt};
use futures_time::{future::FutureExt as _, time::Duration};
use ssh_packet::IntoPacket;

use crate::{Pipe, Result};

mod counter;
use counter::IoCounter;

mod transport;
pub(crate) use transport::{Transport, TransportPair};

mod keys;
pub(crate) use keys::Keys;

#[doc(no_inline)]
pub use ssh_packet::Packet;

/// Re-key after 1GiB of exchanged data, as recommended by [RFC 4253 §9](https://datatracker.ietf.org/doc/html/rfc4253#section-9).
pub(crate) const REKEY_BYTES_THRESHOLD: usize = 0x40000000;

/// Re-key after an hour has elapsed since the last key-exchange, regardless
/// of traffic volume.
pub(crate) const REKEY_TIME_THRESHOLD: std::time::Duration = std::time::Duration::from_secs(3600);

/// A wrapper around a [`Pipe`] to interface with the SSH binary packet protocol.
pub(crate) struct Stream<S> {
    inner: IoCounter<S>,
    timeout: Duration,

    /// The pair of transport algorithms and keys computed from the key exchange.
    transport: TransportPair,

    /// The session identifier derived from the first key exchange.
    session: Option<Vec<u8>>,

    /// The peer's host key, verified during the last completed key exchange.
    host_key: Option<ssh_key::PublicKey>,

    /// Sequence number for the `tx` side.
    txseq: u32,

    /// Sequence number for the `rx` side.
    rxseq: u32,

    /// A buffer for the `peek` method.
    buffer: Option<Packet>,

    /// When the last key-exchange completed, used for the time-based rekey
    /// threshold.
    kex_at: Option<Instant>,

    /// Whether `ssh-userauth` has completed, so a `zlib@openssh.com`
    /// compressor negotiated by a post-authentication rekey starts active
    /// instead of re-deferring.
    authenticated: bool,
}

impl<S> Stream<S>
where
    S: Pipe,
{
    pub fn new(stream: S, timeout: Duration) -> Self {
        Self {
            inner: IoCounter::new(stream),
            timeout,
            transport: Default::default(),
            session: None,
            host_key: None,
            txseq: 0,
            rxseq: 0,
            buffer: None,
            kex_at: None,
            authenticated: false,
        }
    }

    /// Whether a rekey is due: either this is the first key-exchange, or the
    /// byte-count or time thresholds of the rekey policy are met, or the
    /// peer initiated one (detected by the caller peeking a `KexInit`).
    pub fn is_rekeyable(&self) -> bool {
        self.session.is_none()
            || self.inner.count() > REKEY_BYTES_THRESHOLD
            || self
                .kex_at
                .is_some_and(|at| at.elapsed() >= REKEY_TIME_THRESHOLD)
    }

    pub fn with_transport(&mut self, mut transport: TransportPair) {
        if self.authenticated {
            transport.activate_compression();
        }

        self.transport = transport;
        self.inner.reset();
        self.kex_at = Some(Instant::now());
    }

    /// Mark authentication as completed, activating any deferred
    /// `zlib@openssh.com` compressor.
    pub fn mark_authenticated(&mut self) {
        self.authenticated = true;
        self.transport.activate_compression();
    }

    pub fn with_session(&mut self, session: &[u8]) -> &[u8] {
        self.session.get_or_insert_with(|| session.to_vec())
    }

    pub fn session_id(&self) -> Option<&[u8]> {
        self.session.as_deref()
    }

    pub fn with_host_key(&mut self, host_key: ssh_key::PublicKey) {
        self.host_key = Some(host_key);
    }

    pub fn host_key(&self) -> Option<&ssh_key::PublicKey> {
        self.host_key.as_ref()
    }

    /// The algorithms negotiated by the last completed key-exchange.
    pub fn negotiated(&self) -> Option<crate::algorithm::NegotiatedAlgorithms> {
        self.session.as_ref().map(|_| crate::algorithm::NegotiatedAlgorithms {
            cipher_tx: self.transport.tx.cipher,
            cipher_rx: self.transport.rx.cipher,
            hmac_tx: self.transport.tx.hmac,
            hmac_rx: self.transport.rx.hmac,
            compress_tx: self.transport.tx.compress,
            compress_rx: self.transport.rx.compress,
        })
    }

    pub async fn fill_buf(&mut self) -> Result<()> {
        self.inner.fill_buf().await?;

        Ok(())
    }

    /// Poll the stream to detect whether data is immediately readable.
    pub async fn is_readable(&mut self) -> Result<bool> {
        futures::select_biased! {
            buf = self.inner.fill_buf().fuse() => {
                buf?;

                Ok(true)
            }
            _ = futures::future::ready(()).fuse() => {
                Ok(false)
            }
        }
    }

    /// Receive and decrypt a _packet_ from the peer without removing it from the queue.
    pub async fn peek(&mut self) -> Result<&Packet> {
        let packet = self.recv().await?;

        Ok(self.buffer.insert(packet))
    }

    /// Receive and decrypt a _packet_ from the peer.
    pub async fn recv(&mut self) -> Result<Packet> {
        match self.buffer.take() {
            Some(packet) => Ok(packet),
            None => {
                let packet = Packet::from_reader(&mut self.inner, &mut self.transport.rx, self.rxseq)
                    .timeout(self.timeout)
                    .await??;

                tracing::trace!(
                    "<~- #{}: ^{:#x} ({} bytes)",
                    self.rxseq,
                    packet.payload[0],
                    packet.payload.len(),
                );

                self.rxseq = self.rxseq.wrapping_add(1);

                Ok(packet)
            }
        }
    }

    /// Encrypt and send a _packet_ to the peer.
    pub async fn send(&mut self, packet: impl IntoPacket) -> Result<()> {
        let packet = packet.into_packet();

        packet
            .to_writer(&mut self.inner, &mut self.transport.tx, self.txseq)
            .timeout(self.timeout)
            .await??;
        self.inner.flush().await?;

        tracing::trace!(
            "-~> #{}: ^{:#x} ({} bytes)",
            self.txseq,
            packet.payload[0],
            packet.payload.len(),
        );

        self.txseq = self.txseq.wrapping_add(1);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use futures::io::{BufReader, Cursor};

    use super::*;

    fn stream() -> Stream<BufReader<Cursor<Vec<u8>>>> {
        Stream::new(
            BufReader::new(Cursor::new(Vec::new())),
            Duration::from_secs(30),
        )
    }

    #[test]
    fn is_rekeyable_before_first_kex() {
        assert!(stream().is_rekeyable());
    }

    #[test]
    fn is_rekeyable_false_right_after_kex() {
        let mut stream = stream();
        stream.with_transport(TransportPair::default());
        stream.with_session(b"session-id");

        assert!(!stream.is_rekeyable());
    }

    #[test]
    fn is_rekeyable_true_past_time_threshold() {
        let mut stream = stream();
        stream.with_transport(TransportPair::default());
        stream.with_session(b"session-id");

        stream.kex_at = Instant::now().checked_sub(REKEY_TIME_THRESHOLD).map(|at| {
            at.checked_sub(std::time::Duration::from_secs(1))
                .unwrap_or(at)
        });

        assert!(stream.is_rekeyable());
    }

    #[test]
    fn with_session_keeps_first_value() {
        let mut stream = stream();

        assert_eq!(stream.with_session(b"first"), b"first");
        assert_eq!(stream.with_session(b"second"), b"first");
        assert_eq!(stream.session_id(), Some(b"first".as_slice()));
    }
}
