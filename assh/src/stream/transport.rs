use secrecy::ExposeSecret;
use ssh_packet::Packet;

use crate::{
    algorithm::{self, Cipher, CipherState},
    Result,
};

use super::Keys;

/// The pair of per-direction [`Transport`]s resulting from a key-exchange.
#[derive(Debug, Default)]
pub(super) struct TransportPair {
    /// Transmit direction (what we send to the peer).
    pub tx: Transport,

    /// Receive direction (what we read from the peer).
    pub rx: Transport,
}

impl TransportPair {
    /// Activate any deferred `zlib@openssh.com` compressor in either
    /// direction, see [`Transport::activate_compression`].
    pub fn activate_compression(&mut self) {
        self.tx.activate_compression();
        self.rx.activate_compression();
    }
}

/// The negotiated algorithms and derived keys for one direction of traffic.
#[derive(Debug, Default)]
pub(super) struct Transport {
    pub compress: algorithm::Compress,
    pub cipher: algorithm::Cipher,
    pub hmac: algorithm::Hmac,

    pub state: Option<CipherState>,
    pub chain: Keys,

    /// Whether `compress` is actually applied to traffic yet. `zlib@openssh.com`
    /// negotiates at key-exchange time but stays inert until authentication
    /// completes; every other algorithm is active immediately.
    pub compress_active: bool,
}

impl Transport {
    pub fn block_size(&self) -> usize {
        self.cipher.block_size()
    }

    pub fn decrypt<B: AsMut<[u8]>>(&mut self, mut buf: B) -> Result<()> {
        if self.cipher != Cipher::None {
            self.cipher.decrypt(
                &mut self.state,
                self.chain.key.expose_secret(),
                self.chain.iv.expose_secret(),
                buf.as_mut(),
            )?;
        }

        Ok(())
    }

    pub fn open<B: AsRef<[u8]>>(&mut self, buf: B, mac: Vec<u8>, seq: u32) -> Result<()> {
        if self.hmac.size() > 0 {
            self.hmac
                .verify(seq, buf.as_ref(), self.chain.hmac.expose_secret(), &mac)?;
        }

        Ok(())
    }

    pub fn decompress(&mut self, buf: Vec<u8>) -> Result<Vec<u8>> {
        if self.compress_active {
            self.compress.decompress(buf)
        } else {
            Ok(buf)
        }
    }

    pub fn compress<B: AsRef<[u8]>>(&mut self, buf: B) -> Result<Vec<u8>> {
        if self.compress_active {
            self.compress.compress(buf.as_ref())
        } else {
            Ok(buf.as_ref().into())
        }
    }

    /// Activate a deferred `zlib@openssh.com` compressor once authentication
    /// has completed. A no-op for every other algorithm, which is already
    /// active from the moment it's negotiated.
    pub fn activate_compression(&mut self) {
        self.compress_active = true;
    }

    fn padding(&self, payload: usize) -> u8 {
        const MIN_PAD_SIZE: usize = 4;
        const MIN_ALIGN: usize = 8;

        let align = self.block_size().max(MIN_ALIGN);

        let size = if self.hmac.etm() {
            std::mem::size_of::<u8>() + payload
        } else {
            std::mem::size_of::<u32>() + std::mem::size_of::<u8>() + payload
        };
        let padding = align - size % align;

        let padding = if padding < MIN_PAD_SIZE {
            padding + align
        } else {
            padding
        };

        if size + padding < self.block_size().max(Packet::MIN_SIZE) {
            (padding + align) as u8
        } else {
            padding as u8
        }
    }

    pub fn pad(&mut self, mut buf: Vec<u8>) -> Result<Vec<u8>> {
        let mut rng = rand::thread_rng();

        let padding = self.padding(buf.len());

        let mut padded = vec![padding];
        padded.append(&mut buf);

        padded.resize_with(padded.len() + padding as usize, || rand::Rng::gen(&mut rng));

        Ok(padded)
    }

    pub fn encrypt<B: AsMut<[u8]>>(&mut self, mut buf: B) -> Result<()> {
        if self.cipher != Cipher::None {
            self.cipher.encrypt(
                &mut self.state,
                self.chain.key.expose_secret(),
                self.chain.iv.expose_secret(),
                buf.as_mut(),
            )?;
        }

        Ok(())
    }

    pub fn seal<B: AsRef<[u8]>>(&mut self, buf: B, seq: u32) -> Result<Vec<u8>> {
        Ok(self
            .hmac
            .sign(seq, buf.as_ref(), self.chain.hmac.expose_secret()))
    }
}
